//! A static front end for the CEL validation rules of CRD schemas.
//!
//! Rules are parsed and type checked against the schema of the node they are
//! declared on, and the worst case cost of evaluating them is estimated the way
//! the Kubernetes API server estimates it before admitting a CRD. Expressions
//! are never evaluated.

use std::fmt::Display;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::ValidationRule;

use crate::cel::{
    checker::{CheckedExpr, Env},
    types::{Kind, Type},
};

pub mod ast;
pub mod checker;
pub mod context;
pub mod cost;
pub mod decl;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod types;

pub use context::CelSchemaContext;
pub use decl::DeclType;

/// The cost limit of a single function call at runtime.
pub const PER_CALL_LIMIT: u64 = 1_000_000;

/// The cost limit of evaluating all rules of a single request at runtime.
pub const RUNTIME_CEL_COST_BUDGET: u64 = 10_000_000;

/// The estimated cost limit of a single rule, including the number of times it
/// can be evaluated.
pub const STATIC_ESTIMATED_COST_LIMIT: u64 = 10_000_000;

/// The estimated cost limit of all rules of a single CRD version.
pub const STATIC_ESTIMATED_CRD_COST_LIMIT: u64 = 100_000_000;

/// The largest request the API server accepts.
pub const MAX_REQUEST_SIZE_BYTES: u64 = 3 * 1024 * 1024;

/// Whether a rule was missing or is malformed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CelErrorKind {
    Required,
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CelError {
    pub kind: CelErrorKind,
    pub detail: String,
}

impl CelError {
    fn required(detail: impl Into<String>) -> Self {
        Self {
            kind: CelErrorKind::Required,
            detail: detail.into(),
        }
    }

    fn invalid(detail: impl Into<String>) -> Self {
        Self {
            kind: CelErrorKind::Invalid,
            detail: detail.into(),
        }
    }
}

impl Display for CelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail)
    }
}

/// The outcome of compiling a single validation rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompilationResult {
    /// The estimated cost of a single evaluation of the rule.
    pub max_cost: u64,

    /// How many times the rule could be evaluated if the whole request
    /// consisted of values of the node the rule is declared on.
    pub max_cardinality: u64,

    pub error: Option<CelError>,

    /// Whether the rule is a transition rule, i.e. refers to `oldSelf`.
    pub uses_old_self: bool,

    pub message_expression_max_cost: u64,
    pub message_expression_error: Option<CelError>,
}

/// Compiles `rule` against the type of the schema node it is declared on.
pub fn compile(rule: &ValidationRule, decl: &DeclType) -> CompilationResult {
    let mut result = CompilationResult {
        max_cardinality: decl.max_cardinality(),
        ..CompilationResult::default()
    };

    let old_self_type = if rule.optional_old_self == Some(true) {
        Type::optional(decl.ty.clone())
    } else {
        decl.ty.clone()
    };
    let env = Env {
        self_type: decl.ty.clone(),
        old_self_type: Some(old_self_type),
    };

    if rule.rule.trim().is_empty() {
        result.error = Some(CelError::required("rule is not specified"));
    } else {
        match compile_expression(&rule.rule, &env, &Kind::Bool, "bool") {
            Ok(checked) => {
                result.max_cost = checked.cost.max;
                result.uses_old_self = checked.uses_old_self;
            }
            Err(error) => result.error = Some(error),
        }
    }

    if let Some(message_expression) = &rule.message_expression {
        if message_expression.trim().is_empty() {
            result.message_expression_error = Some(CelError::required(
                "messageExpression is not specified",
            ));
        } else {
            match compile_expression(message_expression, &env, &Kind::String, "string") {
                Ok(checked) => result.message_expression_max_cost = checked.cost.max,
                Err(error) => result.message_expression_error = Some(error),
            }
        }
    }

    tracing::trace!(
        rule = rule.rule.as_str(),
        max_cost = result.max_cost,
        max_cardinality = result.max_cardinality,
        error = ?result.error,
        "compiled validation rule"
    );

    result
}

fn compile_expression(
    expression: &str,
    env: &Env,
    expected: &Kind,
    expected_name: &str,
) -> Result<CheckedExpr, CelError> {
    let compilation_failed = |message: &str, offset: usize| {
        CelError::invalid(format!(
            "compilation failed: {}",
            render_error(expression, message, offset)
        ))
    };

    let expr = parser::parse(expression)
        .map_err(|error| compilation_failed(&error.to_string(), error.offset))?;
    let checked = checker::check(&expr, env)
        .map_err(|error| compilation_failed(&error.message, error.offset))?;

    if checked.ty.kind != *expected && !checked.ty.is_dyn() {
        return Err(CelError::invalid(format!(
            "cel expression must evaluate to a {expected_name}"
        )));
    }

    Ok(checked)
}

/// Renders an error the way cel-go does, pointing at the offending column:
///
/// ```text
/// ERROR: <input>:1:5: undefined field 'foo'
///  | self.foo == 1
///  | ....^
/// ```
fn render_error(expression: &str, message: &str, offset: usize) -> String {
    let (line, column) = parser::line_and_column(expression, offset);
    let source_line = expression.lines().nth(line - 1).unwrap_or_default();

    format!(
        "ERROR: <input>:{line}:{column}: {message}\n | {source_line}\n | {}^",
        ".".repeat(column - 1)
    )
}
