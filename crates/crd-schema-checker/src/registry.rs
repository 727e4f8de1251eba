//! An explicitly assembled set of comparators.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

use crate::{
    comparators::{
        CrdComparator, ListsMustHaveSsaTags, MustNotExceedCostBudget, NoBools, NoDataTypeChange,
        NoEnumRemoval, NoFieldRemoval, NoFloats, NoMaps, NoNewRequiredFields,
    },
    crd::crd_name,
    results::ComparisonResults,
};

type BoxedComparator = Box<dyn CrdComparator + Send + Sync>;

/// The comparators run for every pair of CRD revisions, in registration
/// order.
///
/// ```
/// use crd_schema_checker::{
///     ComparatorRegistry,
///     comparators::{NoFieldRemoval, NoNewRequiredFields},
/// };
///
/// let registry = ComparatorRegistry::builder()
///     .with(NoFieldRemoval)
///     .with(NoNewRequiredFields)
///     .build();
///
/// assert_eq!(registry.names(), ["NoFieldRemoval", "NoNewRequiredFields"]);
/// ```
pub struct ComparatorRegistry {
    comparators: Vec<BoxedComparator>,
}

impl ComparatorRegistry {
    pub fn builder() -> ComparatorRegistryBuilder {
        ComparatorRegistryBuilder::default()
    }

    /// Returns a registry holding every comparator with its default settings.
    pub fn all() -> Self {
        Self::all_with_cost_budget(MustNotExceedCostBudget::default())
    }

    /// Returns a registry holding every comparator, using `cost_budget` to
    /// check CEL rule costs.
    pub fn all_with_cost_budget(cost_budget: MustNotExceedCostBudget) -> Self {
        Self::builder()
            .with(NoFieldRemoval)
            .with(NoNewRequiredFields)
            .with(NoDataTypeChange)
            .with(NoEnumRemoval)
            .with(cost_budget)
            .with(ListsMustHaveSsaTags)
            .with(NoBools)
            .with(NoFloats)
            .with(NoMaps)
            .build()
    }

    /// Removes the comparator called `name`. Returns `false` if there was
    /// none.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.comparators.len();
        self.comparators
            .retain(|comparator| comparator.name() != name);

        before != self.comparators.len()
    }

    /// Returns the registry without the comparator called `name`.
    pub fn without(mut self, name: &str) -> Self {
        self.remove(name);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.comparators
            .iter()
            .any(|comparator| comparator.name() == name)
    }

    /// Returns the names of all comparators in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.comparators
            .iter()
            .map(|comparator| comparator.name())
            .collect()
    }

    pub fn comparators(&self) -> impl Iterator<Item = &dyn CrdComparator> {
        self.comparators
            .iter()
            .map(|comparator| comparator.as_ref() as &dyn CrdComparator)
    }

    /// Runs every comparator against `existing` and `new`.
    #[tracing::instrument(skip_all, fields(crd = crd_name(new)))]
    pub fn compare(
        &self,
        existing: Option<&CustomResourceDefinition>,
        new: &CustomResourceDefinition,
    ) -> Vec<ComparisonResults> {
        self.comparators
            .iter()
            .map(|comparator| {
                let results = comparator.compare(existing, new);
                tracing::debug!(
                    comparator = comparator.name(),
                    errors = results.errors.len(),
                    warnings = results.warnings.len(),
                    "ran comparator"
                );
                results
            })
            .collect()
    }
}

impl std::fmt::Debug for ComparatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparatorRegistry")
            .field("comparators", &self.names())
            .finish()
    }
}

#[derive(Default)]
pub struct ComparatorRegistryBuilder {
    comparators: Vec<BoxedComparator>,
}

impl ComparatorRegistryBuilder {
    pub fn with<C>(mut self, comparator: C) -> Self
    where
        C: CrdComparator + Send + Sync + 'static,
    {
        self.comparators.push(Box::new(comparator));
        self
    }

    pub fn build(self) -> ComparatorRegistry {
        ComparatorRegistry {
            comparators: self.comparators,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::crd_v1;

    #[test]
    fn all_holds_every_comparator_once() {
        let registry = ComparatorRegistry::all();

        assert_eq!(
            registry.names(),
            vec![
                "NoFieldRemoval",
                "NoNewRequiredFields",
                "NoDataTypeChange",
                "NoEnumRemoval",
                "MustNotExceedCostBudget",
                "ListsMustHaveSsaTags",
                "NoBools",
                "NoFloats",
                "NoMaps",
            ]
        );
    }

    #[test]
    fn comparators_can_be_dropped_by_name() {
        let mut registry = ComparatorRegistry::all().without("NoBools");

        assert!(!registry.contains("NoBools"));
        assert!(registry.remove("NoMaps"));
        assert!(!registry.remove("NoMaps"));
        assert!(!registry.remove("DoesNotExist"));
        assert_eq!(registry.comparators().count(), 7);
    }

    #[test]
    fn compare_returns_results_in_registration_order() {
        let registry = ComparatorRegistry::builder()
            .with(NoNewRequiredFields)
            .with(NoFieldRemoval)
            .build();

        let existing = crd_v1(json!({
            "type": "object",
            "properties": {"spec": {"type": "object", "properties": {"foo": {"type": "string"}, "bar": {"type": "string"}}}}
        }));
        let new = crd_v1(json!({
            "type": "object",
            "properties": {"spec": {"type": "object", "required": ["foo"], "properties": {"foo": {"type": "string"}}}}
        }));

        let results = registry.compare(Some(&existing), &new);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "NoNewRequiredFields");
        assert_eq!(
            results[0].errors,
            vec!["crd/X version/v1 field/spec.foo is new and may not be required"]
        );
        assert_eq!(results[1].name, "NoFieldRemoval");
        assert_eq!(
            results[1].errors,
            vec!["crd/X version/v1 field/spec.bar may not be removed"]
        );
    }
}
