use serde::Serialize;

/// The findings of a single comparator run.
///
/// Errors fail the check, warnings and infos are informational. A fresh value
/// is created for every comparator invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResults {
    pub name: String,
    pub why_it_matters: String,

    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub infos: Vec<String>,
}

impl ComparisonResults {
    /// Creates empty results for the comparator with the given `name`.
    pub fn new(name: impl Into<String>, why_it_matters: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            why_it_matters: why_it_matters.into(),
            ..Default::default()
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if there are no errors, warnings or infos.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.infos.is_empty()
    }

    /// Appends all findings of `other` to `self`, keeping the name of `self`.
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.infos.extend(other.infos);
    }
}
