//! Validators for the Kubernetes API conventions.
//!
//! All of them are ratcheting: a field which already broke a convention in
//! the existing revision keeps being accepted.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, JSONSchemaProps, JSONSchemaPropsOrBool,
};

use crate::{
    comparators::{CrdValidator, version_prefix},
    crd::{crd_name, version_schema},
    results::ComparisonResults,
    walk::walk_version_schema,
};

/// Flags arrays which don't tell server-side apply how to merge them.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListsMustHaveSsaTags;

/// Flags boolean fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBools;

/// Flags floating point fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFloats;

/// Flags free-form maps.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMaps;

impl CrdValidator for ListsMustHaveSsaTags {
    fn name(&self) -> &'static str {
        "ListsMustHaveSsaTags"
    }

    fn why_it_matters(&self) -> &'static str {
        "Lists without x-kubernetes-list-type are treated as atomic by server-side apply, so \
         two managers setting entries of the same list overwrite each other."
    }

    #[tracing::instrument(skip_all, fields(crd = crd_name(crd)))]
    fn validate(&self, crd: &CustomResourceDefinition) -> ComparisonResults {
        let errors = findings(crd, |schema| {
            if schema.type_.as_deref() != Some("array") {
                return None;
            }

            match schema.x_kubernetes_list_type.as_deref() {
                None => Some("must set x-kubernetes-list-type"),
                Some("map")
                    if schema
                        .x_kubernetes_list_map_keys
                        .as_ref()
                        .is_none_or(Vec::is_empty) =>
                {
                    Some("must set x-kubernetes-list-map-keys when x-kubernetes-list-type is map")
                }
                Some(_) => None,
            }
        });

        ComparisonResults::new(self.name(), self.why_it_matters()).with_errors(errors)
    }
}

impl CrdValidator for NoBools {
    fn name(&self) -> &'static str {
        "NoBools"
    }

    fn why_it_matters(&self) -> &'static str {
        "Booleans can't grow a third state. Many fields that start as a boolean later need more \
         options, which a string enum supports without a breaking change."
    }

    #[tracing::instrument(skip_all, fields(crd = crd_name(crd)))]
    fn validate(&self, crd: &CustomResourceDefinition) -> ComparisonResults {
        let errors = findings(crd, |schema| {
            (schema.type_.as_deref() == Some("boolean"))
                .then_some("may not be a boolean, use a string enum instead")
        });

        ComparisonResults::new(self.name(), self.why_it_matters()).with_errors(errors)
    }
}

impl CrdValidator for NoFloats {
    fn name(&self) -> &'static str {
        "NoFloats"
    }

    fn why_it_matters(&self) -> &'static str {
        "Floating point values don't round-trip reliably across languages and encodings, so \
         clients can observe different values than the ones they stored."
    }

    #[tracing::instrument(skip_all, fields(crd = crd_name(crd)))]
    fn validate(&self, crd: &CustomResourceDefinition) -> ComparisonResults {
        let errors = findings(crd, |schema| {
            (schema.type_.as_deref() == Some("number")).then_some(
                "may not be a float, use an integer or a resource.Quantity string instead",
            )
        });

        ComparisonResults::new(self.name(), self.why_it_matters()).with_errors(errors)
    }
}

impl CrdValidator for NoMaps {
    fn name(&self) -> &'static str {
        "NoMaps"
    }

    fn why_it_matters(&self) -> &'static str {
        "Free-form maps can't be extended with more structure later and aren't merged per entry \
         by server-side apply the way keyed lists are."
    }

    #[tracing::instrument(skip_all, fields(crd = crd_name(crd)))]
    fn validate(&self, crd: &CustomResourceDefinition) -> ComparisonResults {
        let errors = findings(crd, |schema| {
            is_map(schema).then_some("may not be a map, use a list with x-kubernetes-list-type=map instead")
        });

        ComparisonResults::new(self.name(), self.why_it_matters()).with_errors(errors)
    }
}

ratcheting_comparator!(ListsMustHaveSsaTags, NoBools, NoFloats, NoMaps);

/// Returns whether `schema` is an object whose keys are chosen by the user.
fn is_map(schema: &JSONSchemaProps) -> bool {
    let additional_properties = match &schema.additional_properties {
        Some(JSONSchemaPropsOrBool::Schema(_)) => true,
        Some(JSONSchemaPropsOrBool::Bool(allowed)) => *allowed,
        None => false,
    };

    additional_properties && schema.properties.as_ref().is_none_or(|properties| properties.is_empty())
}

/// Runs `check` against every node of every version of `crd` and formats the
/// returned problems.
fn findings<F>(crd: &CustomResourceDefinition, check: F) -> Vec<String>
where
    F: Fn(&JSONSchemaProps) -> Option<&'static str>,
{
    let mut errors = Vec::new();

    for version in &crd.spec.versions {
        let Some(schema) = version_schema(version) else {
            continue;
        };

        let prefix = version_prefix(crd, &version.name);
        walk_version_schema(schema, |node| {
            if let Some(problem) = check(node.schema) {
                errors.push(format!("{prefix} field/{} {problem}", node.simple_location));
            }
            false
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{CrdComparator, test_utils::crd_v1};

    fn with_field(field: serde_json::Value) -> CustomResourceDefinition {
        crd_v1(json!({
            "type": "object",
            "properties": {"spec": {"type": "object", "properties": {"field": field}}}
        }))
    }

    #[rstest]
    #[case(json!({"type": "array", "items": {"type": "string"}}), &["crd/X version/v1 field/spec.field must set x-kubernetes-list-type"])]
    #[case(json!({"type": "array", "x-kubernetes-list-type": "set", "items": {"type": "string"}}), &[])]
    #[case(
        json!({"type": "array", "x-kubernetes-list-type": "map", "items": {"type": "object"}}),
        &["crd/X version/v1 field/spec.field must set x-kubernetes-list-map-keys when x-kubernetes-list-type is map"]
    )]
    #[case(
        json!({"type": "array", "x-kubernetes-list-type": "map", "x-kubernetes-list-map-keys": ["name"], "items": {"type": "object"}}),
        &[]
    )]
    #[case(json!({"type": "string"}), &[])]
    fn lists_must_have_ssa_tags(#[case] field: serde_json::Value, #[case] expected: &[&str]) {
        assert_eq!(ListsMustHaveSsaTags.validate(&with_field(field)).errors, expected);
    }

    #[rstest]
    #[case(json!({"type": "boolean"}), 1)]
    #[case(json!({"type": "string", "enum": ["On", "Off"]}), 0)]
    fn no_bools(#[case] field: serde_json::Value, #[case] expected: usize) {
        assert_eq!(NoBools.validate(&with_field(field)).errors.len(), expected);
    }

    #[rstest]
    #[case(json!({"type": "number"}), 1)]
    #[case(json!({"type": "integer"}), 0)]
    fn no_floats(#[case] field: serde_json::Value, #[case] expected: usize) {
        assert_eq!(NoFloats.validate(&with_field(field)).errors.len(), expected);
    }

    #[rstest]
    #[case(json!({"type": "object", "additionalProperties": {"type": "string"}}), 1)]
    #[case(json!({"type": "object", "additionalProperties": true}), 1)]
    #[case(json!({"type": "object", "additionalProperties": false}), 0)]
    #[case(json!({"type": "object", "properties": {"name": {"type": "string"}}}), 0)]
    fn no_maps(#[case] field: serde_json::Value, #[case] expected: usize) {
        assert_eq!(NoMaps.validate(&with_field(field)).errors.len(), expected);
    }

    #[test]
    fn existing_bools_are_ratcheted() {
        let existing = with_field(json!({"type": "boolean"}));
        let new = crd_v1(json!({
            "type": "object",
            "properties": {"spec": {"type": "object", "properties": {
                "field": {"type": "boolean"},
                "other": {"type": "boolean"}
            }}}
        }));

        assert_eq!(
            NoBools.compare(Some(&existing), &new).errors,
            vec!["crd/X version/v1 field/spec.other may not be a boolean, use a string enum instead"]
        );
    }
}
