use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps;

use crate::walk::Edge;

/// Tracks how many times the validation rules of a schema node can be
/// evaluated for a single object.
///
/// A rule on the items of a list runs once per item, so its cost is multiplied
/// by the number of items the list can hold, and so on for every list or map
/// above it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CelSchemaContext {
    max_cardinality: Option<u64>,
}

impl CelSchemaContext {
    /// The context of a schema root, which is evaluated exactly once.
    pub fn root() -> Self {
        Self {
            max_cardinality: Some(1),
        }
    }

    /// The maximum number of evaluations, or [`None`] if it is unbounded.
    pub fn max_cardinality(&self) -> Option<u64> {
        self.max_cardinality
    }

    /// Returns the context of the node reached from `parent` through `edge`.
    #[must_use]
    pub fn child(&self, parent: &JSONSchemaProps, edge: Edge<'_>) -> Self {
        let multiplier = match edge {
            Edge::Root | Edge::Property(_) => Some(1),
            Edge::Items | Edge::ItemsAt(_) => parent.max_items,
            Edge::AdditionalProperties => parent.max_properties,
        };

        let max_cardinality = self
            .max_cardinality
            .zip(multiplier.and_then(|multiplier| u64::try_from(multiplier).ok()))
            .map(|(cardinality, multiplier)| cardinality.saturating_mul(multiplier));

        Self { max_cardinality }
    }
}
