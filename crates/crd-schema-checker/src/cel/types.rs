//! Static types of CEL values, annotated with size bounds.

use std::{collections::BTreeMap, fmt::Display, sync::Arc};

use crate::cel::cost::UNBOUNDED;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Dyn,
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    Duration,
    Timestamp,
    List(Arc<Type>),
    Map(Arc<Type>, Arc<Type>),

    /// An object with a fixed set of (escaped) field names.
    Object(Arc<BTreeMap<String, Type>>),

    Optional(Arc<Type>),

    /// The type of a type value, as returned by `type(x)`.
    Type,

    /// A value of an extension library, such as `kubernetes.URL`.
    Opaque(&'static str),
}

/// A CEL type with an upper bound on the size of its values.
///
/// The size is the length in bytes for strings and bytes and the number of
/// elements for lists and maps. It is meaningless for every other kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Type {
    pub kind: Kind,
    pub max_size: u64,
}

impl Type {
    pub const DYN: Self = Self::scalar(Kind::Dyn);
    pub const NULL: Self = Self::scalar(Kind::Null);
    pub const BOOL: Self = Self::scalar(Kind::Bool);
    pub const INT: Self = Self::scalar(Kind::Int);
    pub const UINT: Self = Self::scalar(Kind::Uint);
    pub const DOUBLE: Self = Self::scalar(Kind::Double);
    pub const DURATION: Self = Self::scalar(Kind::Duration);
    pub const TIMESTAMP: Self = Self::scalar(Kind::Timestamp);
    pub const TYPE: Self = Self::scalar(Kind::Type);

    const fn scalar(kind: Kind) -> Self {
        Self { kind, max_size: 1 }
    }

    pub const fn opaque(name: &'static str) -> Self {
        Self::scalar(Kind::Opaque(name))
    }

    pub fn string(max_size: u64) -> Self {
        Self {
            kind: Kind::String,
            max_size,
        }
    }

    pub fn bytes(max_size: u64) -> Self {
        Self {
            kind: Kind::Bytes,
            max_size,
        }
    }

    pub fn list(element: Self, max_size: u64) -> Self {
        Self {
            kind: Kind::List(Arc::new(element)),
            max_size,
        }
    }

    pub fn map(key: Self, value: Self, max_size: u64) -> Self {
        Self {
            kind: Kind::Map(Arc::new(key), Arc::new(value)),
            max_size,
        }
    }

    pub fn object(fields: BTreeMap<String, Self>) -> Self {
        let max_size = fields.len() as u64;
        Self {
            kind: Kind::Object(Arc::new(fields)),
            max_size,
        }
    }

    pub fn optional(inner: Self) -> Self {
        Self::scalar(Kind::Optional(Arc::new(inner)))
    }

    /// Returns the same type with an unknown size.
    #[must_use]
    pub fn unbounded(self) -> Self {
        self.with_max_size(UNBOUNDED)
    }

    #[must_use]
    pub fn with_max_size(self, max_size: u64) -> Self {
        Self { max_size, ..self }
    }

    pub fn is_dyn(&self) -> bool {
        self.kind == Kind::Dyn
    }

    /// Returns whether values of `self` can be passed where `expected` is
    /// declared, ignoring sizes.
    pub fn is_assignable_to(&self, expected: &Self) -> bool {
        match (&self.kind, &expected.kind) {
            (Kind::Dyn, _) | (_, Kind::Dyn) => true,
            (Kind::Null, Kind::Null | Kind::Object(_) | Kind::Optional(_)) => true,
            (Kind::List(a), Kind::List(b)) | (Kind::Optional(a), Kind::Optional(b)) => {
                a.is_assignable_to(b)
            }
            (Kind::Map(ak, av), Kind::Map(bk, bv)) => {
                ak.is_assignable_to(bk) && av.is_assignable_to(bv)
            }
            // Objects of different schema nodes are structurally compared by
            // the runtime.
            (Kind::Object(_), Kind::Object(_)) => true,
            (a, b) => a == b,
        }
    }

    /// Returns whether values of both types could be compared with `==`.
    pub fn is_comparable_with(&self, other: &Self) -> bool {
        matches!(other.kind, Kind::Null)
            || matches!(self.kind, Kind::Null)
            || self.is_assignable_to(other)
            || other.is_assignable_to(self)
    }

    /// Returns the most specific type both `self` and `other` are assignable
    /// to, with the larger of both sizes.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        let max_size = self.max_size.max(other.max_size);

        if self.is_dyn() || other.kind == Kind::Null {
            return self.clone().with_max_size(max_size);
        }
        if other.is_dyn() || self.kind == Kind::Null {
            return other.clone().with_max_size(max_size);
        }

        match (&self.kind, &other.kind) {
            (Kind::List(a), Kind::List(b)) => Self::list(a.join(b), max_size),
            (Kind::Map(ak, av), Kind::Map(bk, bv)) => Self::map(ak.join(bk), av.join(bv), max_size),
            _ if self.is_assignable_to(other) => self.clone().with_max_size(max_size),
            _ => Self::DYN,
        }
    }

    /// Returns whether values of this type can be compared with `<`.
    pub fn is_orderable(&self) -> bool {
        matches!(
            self.kind,
            Kind::Dyn
                | Kind::Bool
                | Kind::Int
                | Kind::Uint
                | Kind::Double
                | Kind::String
                | Kind::Bytes
                | Kind::Duration
                | Kind::Timestamp
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, Kind::Int | Kind::Uint | Kind::Double)
    }

    /// Returns whether this type has a size, i.e. can be passed to `size()`.
    pub fn is_sized(&self) -> bool {
        matches!(
            self.kind,
            Kind::String | Kind::Bytes | Kind::List(_) | Kind::Map(..)
        )
    }

    /// Returns whether values of this type may be used as map keys.
    pub fn is_valid_map_key(&self) -> bool {
        matches!(
            self.kind,
            Kind::Dyn | Kind::Bool | Kind::Int | Kind::Uint | Kind::String
        )
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Kind::Dyn => f.write_str("dyn"),
            Kind::Null => f.write_str("null_type"),
            Kind::Bool => f.write_str("bool"),
            Kind::Int => f.write_str("int"),
            Kind::Uint => f.write_str("uint"),
            Kind::Double => f.write_str("double"),
            Kind::String => f.write_str("string"),
            Kind::Bytes => f.write_str("bytes"),
            Kind::Duration => f.write_str("google.protobuf.Duration"),
            Kind::Timestamp => f.write_str("google.protobuf.Timestamp"),
            Kind::List(element) => write!(f, "list({element})"),
            Kind::Map(key, value) => write!(f, "map({key}, {value})"),
            Kind::Object(_) => f.write_str("object"),
            Kind::Optional(inner) => write!(f, "optional_type({inner})"),
            Kind::Type => f.write_str("type"),
            Kind::Opaque(name) => f.write_str(name),
        }
    }
}
