use std::collections::BTreeSet;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, JSONSchemaProps,
};

use crate::{
    comparators::{CrdComparator, version_prefix},
    crd::{crd_name, shared_version_schemas},
    results::ComparisonResults,
    walk::walk_version_schema,
};

/// Flags fields which exist in the existing revision of a version but not in
/// the new one.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFieldRemoval;

impl CrdComparator for NoFieldRemoval {
    fn name(&self) -> &'static str {
        "NoFieldRemoval"
    }

    fn why_it_matters(&self) -> &'static str {
        "If fields are removed, then clients will fail to round-trip the data they stored and \
         values persisted in etcd are silently dropped on the next update."
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
            let existing_fields = simple_locations(existing_schema);
            let new_fields = simple_locations(new_schema);
            let prefix = version_prefix(new, version);

            let removed = existing_fields.difference(&new_fields);
            results.errors.extend(
                removed.map(|field| format!("{prefix} field/{field} may not be removed")),
            );
        }

        tracing::debug!(errors = results.errors.len(), "compared fields");
        results
    }
}

fn simple_locations(schema: &JSONSchemaProps) -> BTreeSet<String> {
    let mut locations = BTreeSet::new();

    walk_version_schema(schema, |node| {
        locations.insert(node.simple_location.to_string());
        false
    });

    locations
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::{crd, crd_v1};

    fn spec(properties: serde_json::Value) -> CustomResourceDefinition {
        crd_v1(json!({
            "type": "object",
            "properties": {
                "spec": {"type": "object", "properties": properties}
            }
        }))
    }

    #[test]
    fn new_crds_have_nothing_to_remove() {
        let new = spec(json!({"foo": {"type": "string"}}));
        let results = NoFieldRemoval.compare(None, &new);

        assert!(results.is_empty());
        assert_eq!(results.name, "NoFieldRemoval");
    }

    #[test]
    fn removed_field() {
        let existing = spec(json!({"foo": {"type": "string"}, "bar": {"type": "string"}}));
        let new = spec(json!({"foo": {"type": "string"}}));

        let results = NoFieldRemoval.compare(Some(&existing), &new);

        assert_eq!(
            results.errors,
            vec!["crd/X version/v1 field/spec.bar may not be removed"]
        );
    }

    #[test]
    fn removed_subtree_reports_every_path_sorted() {
        let existing = spec(json!({
            "list": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}, "age": {"type": "integer"}}
                }
            },
            "keep": {"type": "string"}
        }));
        let new = spec(json!({"keep": {"type": "string"}}));

        let results = NoFieldRemoval.compare(Some(&existing), &new);

        assert_eq!(
            results.errors,
            vec![
                "crd/X version/v1 field/spec.list may not be removed",
                "crd/X version/v1 field/spec.list[*] may not be removed",
                "crd/X version/v1 field/spec.list[*].age may not be removed",
                "crd/X version/v1 field/spec.list[*].name may not be removed",
            ]
        );
    }

    #[test]
    fn added_fields_are_fine() {
        let existing = spec(json!({"foo": {"type": "string"}}));
        let new = spec(json!({"foo": {"type": "string"}, "bar": {"type": "string"}}));

        assert!(NoFieldRemoval.compare(Some(&existing), &new).is_empty());
    }

    #[test]
    fn only_shared_versions_are_compared() {
        let existing = crd(
            "X",
            vec![
                ("v1", json!({"type": "object", "properties": {"a": {"type": "string"}}})),
                ("v2", json!({"type": "object", "properties": {"b": {"type": "string"}}})),
            ],
        );
        let new = crd(
            "X",
            vec![
                ("v1", json!({"type": "object", "properties": {"a": {"type": "string"}}})),
                ("v3", json!({"type": "object"})),
            ],
        );

        assert!(NoFieldRemoval.compare(Some(&existing), &new).is_empty());
    }
}
