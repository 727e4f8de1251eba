use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

use crate::{
    comparators::{CrdComparator, version_prefix},
    crd::{crd_name, shared_version_schemas},
    results::ComparisonResults,
    walk::{index_by_simple_location, walk_version_schema},
};

/// Flags fields which exist in both revisions of a version but changed their
/// `type`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDataTypeChange;

impl CrdComparator for NoDataTypeChange {
    fn name(&self) -> &'static str {
        "NoDataTypeChange"
    }

    fn why_it_matters(&self) -> &'static str {
        "If the type of a field changes, then existing clients can no longer decode it and \
         stored objects no longer match the schema."
    }

    #[tracing::instrument(skip_all, fields(crd = crd_name(new)))]
    fn compare(
        &self,
        existing: Option<&CustomResourceDefinition>,
        new: &CustomResourceDefinition,
    ) -> ComparisonResults {
        let mut results = ComparisonResults::new(self.name(), self.why_it_matters());
        let Some(existing) = existing else {
            return results;
        };

        for (version, existing_schema, new_schema) in shared_version_schemas(existing, new) {
            let prefix = version_prefix(new, version);
            let existing_nodes = index_by_simple_location(existing_schema);

            walk_version_schema(new_schema, |node| {
                let location = node.simple_location.to_string();
                let Some(existing) = existing_nodes.get(&location) else {
                    // Everything below a new field is new as well.
                    return true;
                };

                match (existing.type_.as_deref(), node.schema.type_.as_deref()) {
                    (Some(old_type), Some(new_type)) if old_type != new_type => {
                        results.errors.push(format!(
                            "{prefix} field/{location} has changed type from {old_type} to {new_type}"
                        ));
                    }
                    _ => {}
                }

                false
            });
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::crd_v1;

    fn spec_foo(foo: serde_json::Value) -> CustomResourceDefinition {
        crd_v1(json!({
            "type": "object",
            "properties": {"spec": {"type": "object", "properties": {"foo": foo}}}
        }))
    }

    #[test]
    fn changed_type() {
        let existing = spec_foo(json!({"type": "string"}));
        let new = spec_foo(json!({"type": "integer"}));

        assert_eq!(
            NoDataTypeChange.compare(Some(&existing), &new).errors,
            vec!["crd/X version/v1 field/spec.foo has changed type from string to integer"]
        );
    }

    #[test]
    fn unchanged_and_untyped_fields_are_fine() {
        let existing = spec_foo(json!({"type": "string"}));
        assert!(NoDataTypeChange.compare(Some(&existing), &existing).is_empty());

        let int_or_string = spec_foo(json!({"x-kubernetes-int-or-string": true}));
        assert!(NoDataTypeChange.compare(Some(&int_or_string), &existing).is_empty());
        assert!(NoDataTypeChange.compare(None, &existing).is_empty());
    }
}
