//! Conversion of OpenAPI v3 schemas into CEL types.

use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    JSONSchemaProps, JSONSchemaPropsOrArray, JSONSchemaPropsOrBool,
};
use snafu::{Snafu, ensure};

use crate::{
    cel::{MAX_REQUEST_SIZE_BYTES, lexer::RESERVED_WORDS, types::Type},
    path::FieldPath,
};

/// Identifiers which must be escaped when used as property names, on top of
/// the [`RESERVED_WORDS`].
const RESERVED_LITERALS: &[&str] = &["true", "false", "null", "in"];

/// Largest size a single string can have: the whole request minus the quotes.
const MAX_STRING_SIZE: u64 = MAX_REQUEST_SIZE_BYTES - 2;

/// Longest serializations of the well-known string formats.
const MAX_DURATION_SIZE: u64 = 32;
const MAX_DATE_SIZE: u64 = 10;
const MAX_DATE_TIME_SIZE: u64 = 64;

/// Smallest serializations of the scalar kinds (`""`, `0`, `true`).
const MIN_STRING_SIZE: u64 = 2;
const MIN_NUMBER_SIZE: u64 = 1;
const MIN_BOOL_SIZE: u64 = 4;

/// Smallest serialization of an empty list (`[]`) or object (`{}`).
const MIN_CONTAINER_SIZE: u64 = 2;

/// The bytes an object entry adds on top of its value: the quoted key of at
/// least one character, a colon and a comma (`"k":v,`).
const MAP_ENTRY_OVERHEAD: u64 = 6;

pub type Result<T, E = ConversionError> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ConversionError {
    #[snafu(display("{path}: unsupported type {type_:?}"))]
    UnsupportedType { path: FieldPath, type_: String },

    #[snafu(display("{path}: arrays must declare items"))]
    MissingItems { path: FieldPath },

    #[snafu(display("{path}: arrays with a list of item schemas are not supported"))]
    TupleItems { path: FieldPath },

    #[snafu(display("{path}: {keyword} must not be negative, got {value}"))]
    NegativeBound {
        path: FieldPath,
        keyword: &'static str,
        value: i64,
    },

    #[snafu(display(
        "{path}: a type is required unless x-kubernetes-int-or-string or x-kubernetes-preserve-unknown-fields is set"
    ))]
    MissingType { path: FieldPath },
}

/// The CEL view of a schema node: its type and how small a serialized value
/// of it can be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclType {
    pub ty: Type,
    pub min_serialized_size: u64,
}

impl DeclType {
    /// Converts `schema` and all of its descendants.
    pub fn from_schema(schema: &JSONSchemaProps) -> Result<Self> {
        convert(schema, &FieldPath::root())
    }

    /// The number of values of this type which fit into a single request.
    pub fn max_cardinality(&self) -> u64 {
        MAX_REQUEST_SIZE_BYTES / self.min_serialized_size.saturating_add(1)
    }
}

fn convert(schema: &JSONSchemaProps, path: &FieldPath) -> Result<DeclType> {
    if schema.x_kubernetes_int_or_string == Some(true) {
        return Ok(DeclType {
            ty: Type::DYN.with_max_size(MAX_STRING_SIZE),
            min_serialized_size: MIN_NUMBER_SIZE,
        });
    }

    let preserve_unknown_fields = schema.x_kubernetes_preserve_unknown_fields == Some(true);

    match schema.type_.as_deref() {
        Some("object") => convert_object(schema, path),
        Some("array") => convert_array(schema, path),
        Some("string") => convert_string(schema, path),
        Some("integer") => Ok(DeclType {
            ty: Type::INT,
            min_serialized_size: MIN_NUMBER_SIZE,
        }),
        Some("number") => Ok(DeclType {
            ty: Type::DOUBLE,
            min_serialized_size: MIN_NUMBER_SIZE,
        }),
        Some("boolean") => Ok(DeclType {
            ty: Type::BOOL,
            min_serialized_size: MIN_BOOL_SIZE,
        }),
        None | Some("") if preserve_unknown_fields => Ok(DeclType {
            ty: Type::DYN.with_max_size(MAX_STRING_SIZE),
            min_serialized_size: MIN_NUMBER_SIZE,
        }),
        None | Some("") => MissingTypeSnafu { path: path.clone() }.fail(),
        Some(type_) => UnsupportedTypeSnafu {
            path: path.clone(),
            type_,
        }
        .fail(),
    }
}

fn convert_object(schema: &JSONSchemaProps, path: &FieldPath) -> Result<DeclType> {
    if let Some(JSONSchemaPropsOrBool::Schema(value_schema)) = &schema.additional_properties {
        let value = convert(value_schema, &path.key("*"))?;
        let max_size = match bound(schema.max_properties, "maxProperties", path)? {
            Some(max_properties) => max_properties,
            None => MAX_STRING_SIZE / value.min_serialized_size.saturating_add(MAP_ENTRY_OVERHEAD),
        };

        return Ok(DeclType {
            ty: Type::map(Type::string(MAX_STRING_SIZE), value.ty, max_size),
            min_serialized_size: MIN_CONTAINER_SIZE,
        });
    }

    let mut fields = BTreeMap::new();

    for (name, property) in schema.properties.iter().flatten() {
        let converted = convert(property, &path.child(name.as_str()))?;

        match escape(name) {
            Some(escaped) => {
                fields.insert(escaped, converted.ty);
            }
            None => tracing::trace!(property = %name, "property name is not accessible from CEL"),
        }
    }

    if schema.x_kubernetes_embedded_resource == Some(true) {
        add_embedded_resource_fields(&mut fields);
    }

    let ty = if fields.is_empty() && schema.x_kubernetes_preserve_unknown_fields == Some(true) {
        Type::DYN.with_max_size(MAX_STRING_SIZE)
    } else {
        Type::object(fields)
    };

    Ok(DeclType {
        ty,
        min_serialized_size: MIN_CONTAINER_SIZE,
    })
}

/// Embedded resources always expose their type and object metadata, even if
/// the schema doesn't spell it out.
fn add_embedded_resource_fields(fields: &mut BTreeMap<String, Type>) {
    fields
        .entry("apiVersion".to_owned())
        .or_insert_with(|| Type::string(MAX_STRING_SIZE));
    fields
        .entry("kind".to_owned())
        .or_insert_with(|| Type::string(MAX_STRING_SIZE));
    fields.entry("metadata".to_owned()).or_insert_with(|| {
        Type::object(BTreeMap::from([
            ("name".to_owned(), Type::string(MAX_STRING_SIZE)),
            ("generateName".to_owned(), Type::string(MAX_STRING_SIZE)),
        ]))
    });
}

fn convert_array(schema: &JSONSchemaProps, path: &FieldPath) -> Result<DeclType> {
    let items = match &schema.items {
        Some(JSONSchemaPropsOrArray::Schema(items)) => items,
        Some(JSONSchemaPropsOrArray::Schemas(_)) => {
            return TupleItemsSnafu { path: path.clone() }.fail();
        }
        None => return MissingItemsSnafu { path: path.clone() }.fail(),
    };

    let element = convert(items, &path.key("*"))?;
    let max_size = match bound(schema.max_items, "maxItems", path)? {
        Some(max_items) => max_items,
        None => MAX_STRING_SIZE / element.min_serialized_size.saturating_add(1),
    };

    Ok(DeclType {
        ty: Type::list(element.ty, max_size),
        min_serialized_size: MIN_CONTAINER_SIZE,
    })
}

fn convert_string(schema: &JSONSchemaProps, path: &FieldPath) -> Result<DeclType> {
    let max_length = bound(schema.max_length, "maxLength", path)?;

    let ty = match schema.format.as_deref() {
        Some("byte") => Type::bytes(max_length.unwrap_or(MAX_STRING_SIZE)),
        Some("duration") => Type::DURATION.with_max_size(max_length.unwrap_or(MAX_DURATION_SIZE)),
        Some("date") => Type::TIMESTAMP.with_max_size(max_length.unwrap_or(MAX_DATE_SIZE)),
        Some("date-time") => Type::TIMESTAMP.with_max_size(max_length.unwrap_or(MAX_DATE_TIME_SIZE)),
        _ => Type::string(max_length.unwrap_or(MAX_STRING_SIZE)),
    };

    Ok(DeclType {
        ty,
        min_serialized_size: MIN_STRING_SIZE,
    })
}

fn bound(value: Option<i64>, keyword: &'static str, path: &FieldPath) -> Result<Option<u64>> {
    let Some(value) = value else {
        return Ok(None);
    };

    ensure!(
        value >= 0,
        NegativeBoundSnafu {
            path: path.clone(),
            keyword,
            value
        }
    );

    Ok(u64::try_from(value).ok())
}

/// Escapes a property name so it can be used as a CEL identifier.
///
/// Returns [`None`] for names which cannot be expressed as an identifier.
pub fn escape(name: &str) -> Option<String> {
    if RESERVED_WORDS.contains(&name) || RESERVED_LITERALS.contains(&name) {
        return Some(format!("__{name}__"));
    }

    let mut chars = name.chars();
    let first = chars.next()?;
    let valid_first = first.is_ascii_alphabetic() || matches!(first, '_' | '.' | '-' | '/');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'));
    if !valid_first || !valid_rest {
        return None;
    }

    let mut escaped = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(c) = rest.chars().next() {
        if let Some(remaining) = rest.strip_prefix("__") {
            escaped.push_str("__underscores__");
            rest = remaining;
            continue;
        }

        match c {
            '.' => escaped.push_str("__dot__"),
            '-' => escaped.push_str("__dash__"),
            '/' => escaped.push_str("__slash__"),
            c => escaped.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }

    Some(escaped)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{cel::types::Kind, test_utils::schema};

    #[rstest]
    #[case("foo", Some("foo"))]
    #[case("foo-bar", Some("foo__dash__bar"))]
    #[case("foo.bar", Some("foo__dot__bar"))]
    #[case("foo/bar", Some("foo__slash__bar"))]
    #[case("foo__bar", Some("foo__underscores__bar"))]
    #[case("foo_bar", Some("foo_bar"))]
    #[case("namespace", Some("__namespace__"))]
    #[case("true", Some("__true__"))]
    #[case("int", Some("int"))]
    #[case("1foo", None)]
    #[case("foo bar", None)]
    #[case("", None)]
    fn property_name_escaping(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(escape(name).as_deref(), expected);
    }

    #[test]
    fn object_fields_are_escaped() {
        let decl = DeclType::from_schema(&schema(json!({
            "type": "object",
            "properties": {
                "foo-bar": {"type": "string", "maxLength": 5},
                "bad key": {"type": "integer"}
            }
        })))
        .expect("schema must convert");

        let Kind::Object(fields) = &decl.ty.kind else {
            panic!("expected an object, got {:?}", decl.ty);
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["foo__dash__bar"], Type::string(5));
    }

    #[rstest]
    #[case(json!({"type": "array", "items": {"type": "integer"}, "maxItems": 7}), 7)]
    #[case(json!({"type": "array", "items": {"type": "integer"}}), (MAX_REQUEST_SIZE_BYTES - 2) / 2)]
    #[case(json!({"type": "array", "items": {"type": "string"}}), (MAX_REQUEST_SIZE_BYTES - 2) / 3)]
    #[case(json!({"type": "object", "additionalProperties": {"type": "boolean"}}), (MAX_REQUEST_SIZE_BYTES - 2) / 10)]
    #[case(json!({"type": "object", "additionalProperties": {"type": "boolean"}, "maxProperties": 4}), 4)]
    #[case(json!({"type": "string", "maxLength": 63}), 63)]
    #[case(json!({"type": "string"}), MAX_REQUEST_SIZE_BYTES - 2)]
    fn size_bounds(#[case] value: serde_json::Value, #[case] expected: u64) {
        let decl = DeclType::from_schema(&schema(value)).expect("schema must convert");
        assert_eq!(decl.ty.max_size, expected);
    }

    #[test]
    fn formats() {
        let convert = |format: &str| {
            DeclType::from_schema(&schema(json!({"type": "string", "format": format})))
                .expect("schema must convert")
                .ty
        };

        assert_eq!(convert("date-time"), Type::TIMESTAMP.with_max_size(64));
        assert_eq!(convert("date"), Type::TIMESTAMP.with_max_size(10));
        assert_eq!(convert("duration"), Type::DURATION.with_max_size(32));
        assert_eq!(convert("byte").kind, Kind::Bytes);
        assert_eq!(convert("email"), Type::string(MAX_REQUEST_SIZE_BYTES - 2));
    }

    #[test]
    fn dynamic_types() {
        let int_or_string = schema(json!({"x-kubernetes-int-or-string": true}));
        let decl = DeclType::from_schema(&int_or_string).expect("schema must convert");
        assert_eq!(decl.ty.kind, Kind::Dyn);
        assert_eq!(decl.min_serialized_size, 1);

        let preserved = schema(json!({"type": "object", "x-kubernetes-preserve-unknown-fields": true}));
        let decl = DeclType::from_schema(&preserved).expect("schema must convert");
        assert_eq!(decl.ty.kind, Kind::Dyn);
    }

    #[test]
    fn cardinality_from_min_size() {
        let decl = DeclType::from_schema(&schema(json!({"type": "boolean"}))).expect("schema must convert");
        assert_eq!(decl.max_cardinality(), MAX_REQUEST_SIZE_BYTES / 5);
    }

    #[rstest]
    #[case(json!({"type": "array"}), "^: arrays must declare items")]
    #[case(json!({"type": "foo"}), "^: unsupported type \"foo\"")]
    #[case(json!({"type": "string", "maxLength": -1}), "^: maxLength must not be negative, got -1")]
    #[case(json!({"properties": {}}), "^: a type is required unless x-kubernetes-int-or-string or x-kubernetes-preserve-unknown-fields is set")]
    #[case(json!({"type": "object", "properties": {"a": {"type": "array"}}}), "a: arrays must declare items")]
    fn conversion_errors(#[case] value: serde_json::Value, #[case] expected: &str) {
        let error = DeclType::from_schema(&schema(value)).expect_err("schema must not convert");
        assert_eq!(error.to_string(), expected);
    }
}
