use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, JSONSchemaProps, ValidationRule,
};

use crate::{
    cel::{
        self, CelErrorKind, CelSchemaContext, DeclType, STATIC_ESTIMATED_COST_LIMIT,
        STATIC_ESTIMATED_CRD_COST_LIMIT,
    },
    comparators::{CrdValidator, version_prefix},
    crd::{crd_name, version_schema},
    path::{FieldError, FieldPath},
    results::ComparisonResults,
    walk::walk_version_schema,
};

const RULE_COST_NAME: &str = "estimated rule cost";
const MESSAGE_EXPRESSION_COST_NAME: &str = "estimated messageExpression cost";
const SCHEMA_COST_NAME: &str =
    "x-kubernetes-validations estimated rule cost total for entire OpenAPIv3 schema";

/// Flags CEL validation rules whose estimated cost exceeds the budget of the
/// API server.
///
/// The cost of a rule is its worst case cost for a single evaluation, times
/// the number of times it can be evaluated for one object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MustNotExceedCostBudget {
    per_rule_limit: u64,
    per_crd_limit: u64,
}

impl Default for MustNotExceedCostBudget {
    fn default() -> Self {
        Self {
            per_rule_limit: STATIC_ESTIMATED_COST_LIMIT,
            per_crd_limit: STATIC_ESTIMATED_CRD_COST_LIMIT,
        }
    }
}

impl MustNotExceedCostBudget {
    /// Overrides the budget of a single rule.
    pub fn with_per_rule_limit(mut self, per_rule_limit: u64) -> Self {
        self.per_rule_limit = per_rule_limit;
        self
    }

    /// Overrides the budget of all rules of a single CRD version.
    pub fn with_per_crd_limit(mut self, per_crd_limit: u64) -> Self {
        self.per_crd_limit = per_crd_limit;
        self
    }

    fn validate_schema(&self, prefix: &str, schema: &JSONSchemaProps) -> Vec<String> {
        let mut errors = Vec::new();
        let mut contexts: Vec<CelSchemaContext> = Vec::new();
        let mut total_cost = 0u64;

        walk_version_schema(schema, |node| {
            contexts.truncate(node.depth());
            let context = match (contexts.last(), node.parent()) {
                (Some(parent_context), Some(parent)) => parent_context.child(parent, node.edge),
                _ => CelSchemaContext::root(),
            };
            contexts.push(context);

            let rules = node.schema.x_kubernetes_validations.as_deref().unwrap_or_default();
            if rules.is_empty() {
                return false;
            }

            let decl = match DeclType::from_schema(node.schema) {
                Ok(decl) => decl,
                Err(error) => {
                    errors.push(format!(
                        "{prefix} field/{}: failed to convert schema for CEL validation: {error}",
                        node.simple_location
                    ));
                    return true;
                }
            };

            let rules_path = node.simple_location.child("x-kubernetes-validations");

            for (index, rule) in rules.iter().enumerate() {
                let rule_path = rules_path.index(index);
                let compiled = cel::compile(rule, &decl);
                let cardinality = context
                    .max_cardinality()
                    .unwrap_or(compiled.max_cardinality);

                let field_errors = self.rule_errors(rule, &compiled, cardinality, &rule_path);
                errors.extend(
                    field_errors
                        .into_iter()
                        .map(|error| format!("{prefix} field/{error}")),
                );

                if compiled.error.is_none() {
                    total_cost =
                        total_cost.saturating_add(expression_cost(compiled.max_cost, cardinality));
                }
            }

            false
        });

        if total_cost > self.per_crd_limit {
            let error = FieldError::forbidden(
                FieldPath::root(),
                cost_error_message(SCHEMA_COST_NAME, total_cost, self.per_crd_limit),
            );
            errors.push(format!("{prefix} field/{error}"));
        }

        errors
    }

    fn rule_errors(
        &self,
        rule: &ValidationRule,
        compiled: &cel::CompilationResult,
        cardinality: u64,
        rule_path: &FieldPath,
    ) -> Vec<FieldError> {
        let mut errors = Vec::new();

        let rule_field = rule_path.child("rule");
        match &compiled.error {
            Some(error) if error.kind == CelErrorKind::Required => {
                errors.push(FieldError::required(rule_field, &error.detail));
            }
            Some(error) => {
                errors.push(FieldError::invalid(rule_field, &rule.rule, &error.detail));
            }
            None => {
                let cost = expression_cost(compiled.max_cost, cardinality);
                if cost > self.per_rule_limit {
                    errors.push(FieldError::forbidden(
                        rule_field,
                        cost_error_message(RULE_COST_NAME, cost, self.per_rule_limit),
                    ));
                }
            }
        }

        let message_expression_field = rule_path.child("messageExpression");
        match &compiled.message_expression_error {
            Some(error) if error.kind == CelErrorKind::Required => {
                errors.push(FieldError::required(message_expression_field, &error.detail));
            }
            Some(error) => {
                let expression = rule.message_expression.as_deref().unwrap_or_default();
                errors.push(FieldError::invalid(
                    message_expression_field,
                    expression,
                    &error.detail,
                ));
            }
            None if rule.message_expression.is_some() => {
                let cost = expression_cost(compiled.message_expression_max_cost, cardinality);
                if cost > self.per_rule_limit {
                    errors.push(FieldError::forbidden(
                        message_expression_field,
                        cost_error_message(MESSAGE_EXPRESSION_COST_NAME, cost, self.per_rule_limit),
                    ));
                }
            }
            None => {}
        }

        errors
    }
}

impl CrdValidator for MustNotExceedCostBudget {
    fn name(&self) -> &'static str {
        "MustNotExceedCostBudget"
    }

    fn why_it_matters(&self) -> &'static str {
        "CEL validation rules whose estimated cost exceeds the budget cause the API server to \
         reject the CRD. Bounding arrays, maps and strings with maxItems, maxProperties and \
         maxLength keeps the estimate low."
    }

    #[tracing::instrument(skip_all, fields(crd = crd_name(crd)))]
    fn validate(&self, crd: &CustomResourceDefinition) -> ComparisonResults {
        let mut errors = Vec::new();

        for version in &crd.spec.versions {
            let Some(schema) = version_schema(version) else {
                tracing::debug!(version = %version.name, "version has no schema, skipping");
                continue;
            };

            let prefix = version_prefix(crd, &version.name);
            errors.extend(self.validate_schema(&prefix, schema));
        }

        ComparisonResults::new(self.name(), self.why_it_matters()).with_errors(errors)
    }
}

ratcheting_comparator!(MustNotExceedCostBudget);

/// Returns the total cost of a rule evaluated `cardinality` times.
pub fn expression_cost(max_cost: u64, cardinality: u64) -> u64 {
    max_cost.saturating_mul(cardinality)
}

/// Describes by how much `cost` exceeds `limit`.
pub fn cost_error_message(cost_name: &str, cost: u64, limit: u64) -> String {
    let exceed_factor = cost as f64 / limit as f64;

    let factor = if exceed_factor > 100.0 {
        "more than 100x".to_owned()
    } else if exceed_factor < 1.5 {
        format!("{exceed_factor:.6}x")
    } else {
        format!("{exceed_factor:.1}x")
    };

    format!(
        "{cost_name} exceeds budget by factor of {factor} (try simplifying the rule, or adding \
         maxItems, maxProperties, and maxLength where arrays, maps, and strings are declared)"
    )
}
