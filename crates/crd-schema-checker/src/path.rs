//! Field paths and field errors rendered the way the Kubernetes API server
//! renders them, e.g. `spec.containers[*].name` or
//! `openAPIV3Schema.properties[spec].items`.

use std::fmt::{Display, Write};

/// A single segment of a [`FieldPath`].
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
enum Element {
    /// A named child, rendered as `.name`.
    Child(String),

    /// A map key, rendered as `[key]`.
    Key(String),

    /// A list index, rendered as `[index]`.
    Index(usize),
}

/// An immutable path to a field.
///
/// Every builder method returns a new path and leaves `self` untouched, which
/// allows handing the same parent path to every child during a schema walk.
///
/// ```
/// use crd_schema_checker::path::FieldPath;
///
/// let path = FieldPath::root().child("spec").child("ports").key("*");
/// assert_eq!(path.to_string(), "spec.ports[*]");
/// assert_eq!(FieldPath::root().to_string(), "^");
/// ```
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FieldPath {
    elements: Vec<Element>,
}

impl FieldPath {
    /// Returns the empty path, rendered as `^`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a path consisting of a single named element.
    pub fn new(name: impl Into<String>) -> Self {
        Self::root().child(name)
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        self.with(Element::Child(name.into()))
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        self.with(Element::Key(key.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.with(Element::Index(index))
    }

    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the number of segments of this path.
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    fn with(&self, element: Element) -> Self {
        let mut elements = Vec::with_capacity(self.elements.len() + 1);
        elements.extend_from_slice(&self.elements);
        elements.push(element);

        Self { elements }
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.elements.is_empty() {
            return f.write_char('^');
        }

        for (index, element) in self.elements.iter().enumerate() {
            match element {
                Element::Child(name) if index == 0 => f.write_str(name)?,
                Element::Child(name) => write!(f, ".{name}")?,
                Element::Key(key) => write!(f, "[{key}]")?,
                Element::Index(i) => write!(f, "[{i}]")?,
            }
        }

        Ok(())
    }
}

/// A validation finding attached to a [`FieldPath`].
///
/// The rendering mirrors the Kubernetes `field.Error` type, so messages read
/// exactly like the ones returned by the API server when a CRD is rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldError {
    Required { path: FieldPath, detail: String },
    Invalid {
        path: FieldPath,
        value: String,
        detail: String,
    },
    Forbidden { path: FieldPath, detail: String },
}

impl FieldError {
    pub fn required(path: FieldPath, detail: impl Into<String>) -> Self {
        Self::Required {
            path,
            detail: detail.into(),
        }
    }

    pub fn invalid(path: FieldPath, value: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Invalid {
            path,
            value: value.into(),
            detail: detail.into(),
        }
    }

    pub fn forbidden(path: FieldPath, detail: impl Into<String>) -> Self {
        Self::Forbidden {
            path,
            detail: detail.into(),
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required { path, detail } => write!(f, "{path}: Required value: {detail}"),
            Self::Invalid {
                path,
                value,
                detail,
            } => write!(f, "{path}: Invalid value: {value:?}: {detail}"),
            Self::Forbidden { path, detail } => write!(f, "{path}: Forbidden: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(FieldPath::root(), "^")]
    #[case(FieldPath::root().child("spec"), "spec")]
    #[case(FieldPath::root().child("spec").child("foo"), "spec.foo")]
    #[case(FieldPath::root().child("spec").key("*").child("name"), "spec[*].name")]
    #[case(FieldPath::new("openAPIV3Schema").child("properties").key("spec"), "openAPIV3Schema.properties[spec]")]
    #[case(FieldPath::new("items").index(2), "items[2]")]
    fn display(#[case] input: FieldPath, #[case] expected: &str) {
        assert_eq!(input.to_string(), expected);
    }

    #[test]
    fn builders_do_not_mutate_parent() {
        let parent = FieldPath::new("spec");
        let _child = parent.child("foo");

        assert_eq!(parent.to_string(), "spec");
        assert_eq!(parent.depth(), 1);
    }

    #[rstest]
    #[case(
        FieldError::required(FieldPath::new("spec").child("rule"), "rule is not specified"),
        "spec.rule: Required value: rule is not specified"
    )]
    #[case(
        FieldError::invalid(FieldPath::new("rule"), "self.foo", "compilation failed"),
        "rule: Invalid value: \"self.foo\": compilation failed"
    )]
    #[case(
        FieldError::forbidden(FieldPath::root(), "too expensive"),
        "^: Forbidden: too expensive"
    )]
    fn field_error_display(#[case] input: FieldError, #[case] expected: &str) {
        assert_eq!(input.to_string(), expected);
    }
}
