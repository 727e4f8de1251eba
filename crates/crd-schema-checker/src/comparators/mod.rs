//! Rules which compare two revisions of a CRD, or validate a single revision.
//!
//! Every rule reports its findings as messages inside [`ComparisonResults`].
//! Problems with the input schemas are findings too, they never abort a run.

use std::collections::BTreeSet;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

use crate::{crd::crd_name, results::ComparisonResults};

/// Implements [`CrdComparator`] for validators by ratcheting against the
/// existing revision.
macro_rules! ratcheting_comparator {
    ($($validator:ty),+ $(,)?) => {
        $(
            impl $crate::comparators::CrdComparator for $validator {
                fn name(&self) -> &'static str {
                    $crate::comparators::CrdValidator::name(self)
                }

                fn why_it_matters(&self) -> &'static str {
                    $crate::comparators::CrdValidator::why_it_matters(self)
                }

                fn compare(
                    &self,
                    existing: Option<&k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition>,
                    new: &k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
                ) -> $crate::results::ComparisonResults {
                    $crate::comparators::ratchet_compare(self, existing, new)
                }
            }
        )+
    };
}

pub(crate) use ratcheting_comparator;

mod conventions;
mod cost_budget;
mod no_data_type_change;
mod no_enum_removal;
mod no_field_removal;
mod no_new_required_fields;

pub use conventions::{ListsMustHaveSsaTags, NoBools, NoFloats, NoMaps};
pub use cost_budget::{MustNotExceedCostBudget, cost_error_message, expression_cost};
pub use no_data_type_change::NoDataTypeChange;
pub use no_enum_removal::NoEnumRemoval;
pub use no_field_removal::NoFieldRemoval;
pub use no_new_required_fields::{NoNewRequiredFields, NodeFacts, is_any_ancestor_new_and_nullable};

/// A rule comparing an existing CRD revision with a proposed one.
pub trait CrdComparator {
    /// A stable, unique name used in reports and configuration.
    fn name(&self) -> &'static str;

    fn why_it_matters(&self) -> &'static str;

    /// Compares `existing` with `new`. `existing` is [`None`] if the CRD is
    /// introduced by `new`.
    fn compare(
        &self,
        existing: Option<&CustomResourceDefinition>,
        new: &CustomResourceDefinition,
    ) -> ComparisonResults;
}

/// A rule validating a single CRD revision.
///
/// Validators are turned into comparators with [`ratchet_compare`], which
/// only reports findings the existing revision did not already have.
pub trait CrdValidator {
    fn name(&self) -> &'static str;

    fn why_it_matters(&self) -> &'static str;

    fn validate(&self, crd: &CustomResourceDefinition) -> ComparisonResults;
}

/// Validates both revisions and only keeps the findings of `new` which are
/// not present for `existing`, so existing debt doesn't fail the check.
pub fn ratchet_compare<V>(
    validator: &V,
    existing: Option<&CustomResourceDefinition>,
    new: &CustomResourceDefinition,
) -> ComparisonResults
where
    V: CrdValidator + ?Sized,
{
    let existing_results = existing
        .map(|existing| validator.validate(existing))
        .unwrap_or_default();
    let new_results = validator.validate(new);

    ComparisonResults {
        name: validator.name().to_owned(),
        why_it_matters: validator.why_it_matters().to_owned(),
        errors: new_findings(new_results.errors, &existing_results.errors),
        warnings: new_findings(new_results.warnings, &existing_results.warnings),
        infos: new_findings(new_results.infos, &existing_results.infos),
    }
}

/// Returns the prefix every finding about a version of a CRD starts with.
pub(crate) fn version_prefix(crd: &CustomResourceDefinition, version: &str) -> String {
    format!("crd/{} version/{version}", crd_name(crd))
}

fn new_findings(new: Vec<String>, existing: &[String]) -> Vec<String> {
    let existing: BTreeSet<&str> = existing.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();

    new.into_iter()
        .filter(|finding| !existing.contains(finding.as_str()))
        .filter(|finding| seen.insert(finding.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::crd_v1;

    /// Flags every CRD whose schema has a `status` property.
    struct HasStatus;

    impl CrdValidator for HasStatus {
        fn name(&self) -> &'static str {
            "HasStatus"
        }

        fn why_it_matters(&self) -> &'static str {
            "testing"
        }

        fn validate(&self, crd: &CustomResourceDefinition) -> ComparisonResults {
            let has_status = crd.spec.versions.iter().any(|version| {
                crate::crd::version_schema(version)
                    .and_then(|schema| schema.properties.as_ref())
                    .is_some_and(|properties| properties.contains_key("status"))
            });

            let errors = if has_status {
                vec![format!("crd/{} has status", crd_name(crd))]
            } else {
                vec![]
            };

            ComparisonResults::new(self.name(), self.why_it_matters()).with_errors(errors)
        }
    }

    #[test]
    fn ratchet_reports_new_findings() {
        let existing = crd_v1(serde_json::json!({"type": "object"}));
        let new = crd_v1(serde_json::json!({"type": "object", "properties": {"status": {"type": "object"}}}));

        let results = ratchet_compare(&HasStatus, Some(&existing), &new);
        assert_eq!(results.errors, vec!["crd/X has status"]);
        assert_eq!(results.name, "HasStatus");
    }

    #[test]
    fn ratchet_ignores_existing_findings() {
        let existing = crd_v1(serde_json::json!({"type": "object", "properties": {"status": {"type": "object"}}}));

        let results = ratchet_compare(&HasStatus, Some(&existing), &existing);
        assert!(results.errors.is_empty());
    }

    #[test]
    fn ratchet_without_existing_reports_everything() {
        let new = crd_v1(serde_json::json!({"type": "object", "properties": {"status": {"type": "object"}}}));

        let results = ratchet_compare(&HasStatus, None, &new);
        assert_eq!(results.errors.len(), 1);
    }
}
