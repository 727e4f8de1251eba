use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

use crate::{
    comparators::{CrdComparator, version_prefix},
    crd::{crd_name, shared_version_schemas},
    results::ComparisonResults,
    walk::{index_by_simple_location, walk_version_schema},
};

/// Flags enum values which are allowed by the existing revision of a field but
/// not by the new one.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEnumRemoval;

impl CrdComparator for NoEnumRemoval {
    fn name(&self) -> &'static str {
        "NoEnumRemoval"
    }

    fn why_it_matters(&self) -> &'static str {
        "If enum values are removed, then objects which are stored with one of these values \
         fail validation on their next update and clients relying on the value break."
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
                    return true;
                };

                // A field which wasn't restricted before, or isn't restricted
                // anymore, can't lose values.
                let (Some(old_values), Some(new_values)) = (&existing.enum_, &node.schema.enum_)
                else {
                    return false;
                };

                for removed in old_values.iter().filter(|value| !new_values.contains(value)) {
                    results.errors.push(format!(
                        "{prefix} field/{location} enum value {} may not be removed",
                        removed.0
                    ));
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

    fn mode(values: &[&str]) -> CustomResourceDefinition {
        crd_v1(json!({
            "type": "object",
            "properties": {"spec": {"type": "object", "properties": {
                "mode": {"type": "string", "enum": values}
            }}}
        }))
    }

    #[test]
    fn removed_values() {
        let existing = mode(&["Foo", "Bar", "Baz"]);
        let new = mode(&["Foo"]);

        assert_eq!(
            NoEnumRemoval.compare(Some(&existing), &new).errors,
            vec![
                "crd/X version/v1 field/spec.mode enum value \"Bar\" may not be removed",
                "crd/X version/v1 field/spec.mode enum value \"Baz\" may not be removed",
            ]
        );
    }

    #[test]
    fn added_values_are_fine() {
        let existing = mode(&["Foo"]);
        let new = mode(&["Foo", "Bar"]);

        assert!(NoEnumRemoval.compare(Some(&existing), &new).is_empty());
    }

    #[test]
    fn lifting_the_restriction_is_fine() {
        let existing = mode(&["Foo"]);
        let new = crd_v1(json!({
            "type": "object",
            "properties": {"spec": {"type": "object", "properties": {"mode": {"type": "string"}}}}
        }));

        assert!(NoEnumRemoval.compare(Some(&existing), &new).is_empty());
    }
}
