//! Backward-compatibility checks for Kubernetes CustomResourceDefinitions.
//!
//! The crate compares two revisions of a CRD and reports schema changes that
//! would break existing clients or stored objects, such as removed fields or
//! fields which became required. It additionally estimates the worst-case cost
//! of the CEL validation rules (`x-kubernetes-validations`) embedded in a
//! schema and flags rules which exceed the API server's budget.
//!
//! ## Usage
//!
//! ```
//! use crd_schema_checker::ComparatorRegistry;
//! # use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
//! # fn run(existing: &CustomResourceDefinition, new: &CustomResourceDefinition) {
//! let registry = ComparatorRegistry::all();
//!
//! for results in registry.compare(Some(existing), new) {
//!     for error in &results.errors {
//!         eprintln!("{}: {error}", results.name);
//!     }
//! }
//! # }
//! ```

pub mod cel;
pub mod comparators;
pub mod crd;
pub mod path;
pub mod registry;
pub mod results;
pub mod walk;

#[cfg(test)]
pub(crate) mod test_utils;

pub use comparators::{CrdComparator, CrdValidator, ratchet_compare};
pub use registry::ComparatorRegistry;
pub use results::ComparisonResults;
