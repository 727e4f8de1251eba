//! Depth-first traversal over OpenAPI v3 schema trees.
//!
//! CRD schemas describe types, not instances: arrays are entered once through
//! their `items` schema and maps once through their `additionalProperties`
//! schema, no matter how many elements a conforming object could hold.

use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    JSONSchemaProps, JSONSchemaPropsOrArray, JSONSchemaPropsOrBool,
};

use crate::path::FieldPath;

/// Describes how a node was reached from its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge<'a> {
    /// The node is the root of the walk.
    Root,

    /// The node is the named entry of the parent's `properties`.
    Property(&'a str),

    /// The node is the parent's single `items` schema.
    Items,

    /// The node is one entry of the parent's `items` schema list.
    ItemsAt(usize),

    /// The node is the parent's `additionalProperties` schema.
    AdditionalProperties,
}

/// A schema node handed to the visitor of [`walk_schema`].
#[derive(Debug)]
pub struct SchemaNode<'a, 'p> {
    pub schema: &'a JSONSchemaProps,

    /// The raw path through the schema, including `properties`, `items` and
    /// `additionalProperties` segments.
    pub field_path: &'p FieldPath,

    /// The path a user of the custom resource would use to address the field.
    pub simple_location: &'p FieldPath,

    /// Every strict ancestor of the node, root first.
    pub ancestors: &'p [&'a JSONSchemaProps],

    pub edge: Edge<'a>,
}

impl SchemaNode<'_, '_> {
    /// Returns the number of ancestors of this node, which is `0` for the root.
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn parent(&self) -> Option<&JSONSchemaProps> {
        self.ancestors.last().copied()
    }
}

/// Walks `schema` in pre-order, calling `visitor` for every node including the
/// root.
///
/// A parent is always visited before any of its children and properties are
/// visited in name order. When the visitor returns `true` the subtree below
/// the current node is skipped, its siblings are still visited.
pub fn walk_schema<'a, F>(
    schema: &'a JSONSchemaProps,
    field_path: &FieldPath,
    simple_location: &FieldPath,
    mut visitor: F,
) where
    F: FnMut(&SchemaNode<'a, '_>) -> bool,
{
    let mut ancestors = Vec::new();
    walk(
        schema,
        Edge::Root,
        field_path,
        simple_location,
        &mut ancestors,
        &mut visitor,
    );
}

fn walk<'a, F>(
    schema: &'a JSONSchemaProps,
    edge: Edge<'a>,
    field_path: &FieldPath,
    simple_location: &FieldPath,
    ancestors: &mut Vec<&'a JSONSchemaProps>,
    visitor: &mut F,
) where
    F: FnMut(&SchemaNode<'a, '_>) -> bool,
{
    let skip_children = {
        let node = SchemaNode {
            schema,
            field_path,
            simple_location,
            ancestors: ancestors.as_slice(),
            edge,
        };
        visitor(&node)
    };

    if skip_children {
        return;
    }

    ancestors.push(schema);

    match &schema.items {
        Some(JSONSchemaPropsOrArray::Schema(items)) => walk(
            items,
            Edge::Items,
            &field_path.child("items"),
            &simple_location.key("*"),
            ancestors,
            visitor,
        ),
        Some(JSONSchemaPropsOrArray::Schemas(items)) => {
            for (index, items) in items.iter().enumerate() {
                walk(
                    items,
                    Edge::ItemsAt(index),
                    &field_path.child("items").index(index),
                    &simple_location.index(index),
                    ancestors,
                    visitor,
                );
            }
        }
        None => {}
    }

    if let Some(properties) = &schema.properties {
        for (name, property) in properties {
            walk(
                property,
                Edge::Property(name),
                &field_path.child("properties").key(name.as_str()),
                &simple_location.child(name.as_str()),
                ancestors,
                visitor,
            );
        }
    }

    if let Some(JSONSchemaPropsOrBool::Schema(value)) = &schema.additional_properties {
        walk(
            value,
            Edge::AdditionalProperties,
            &field_path.child("additionalProperties"),
            &simple_location.key("*"),
            ancestors,
            visitor,
        );
    }

    ancestors.pop();
}

/// The raw field path of a CRD version's schema root.
pub const SCHEMA_ROOT: &str = "openAPIV3Schema";

/// Walks the schema of a CRD version, starting the raw field path at
/// [`SCHEMA_ROOT`] and the simple location at the empty root.
pub fn walk_version_schema<'a, F>(schema: &'a JSONSchemaProps, visitor: F)
where
    F: FnMut(&SchemaNode<'a, '_>) -> bool,
{
    walk_schema(
        schema,
        &FieldPath::new(SCHEMA_ROOT),
        &FieldPath::root(),
        visitor,
    );
}

/// Returns every node of `schema` keyed by its rendered simple location.
pub fn index_by_simple_location(schema: &JSONSchemaProps) -> BTreeMap<String, &JSONSchemaProps> {
    let mut index = BTreeMap::new();

    walk_version_schema(schema, |node| {
        index.insert(node.simple_location.to_string(), node.schema);
        false
    });

    index
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::test_utils::schema;

    fn sample() -> JSONSchemaProps {
        schema(serde_json::json!({
            "type": "object",
            "properties": {
                "spec": {
                    "type": "object",
                    "properties": {
                        "list": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" }
                                }
                            }
                        },
                        "labels": {
                            "type": "object",
                            "additionalProperties": { "type": "string" }
                        },
                        "count": { "type": "integer" }
                    }
                },
                "status": { "type": "object" }
            }
        }))
    }

    fn locations(schema: &JSONSchemaProps) -> Vec<String> {
        let mut visited = Vec::new();
        walk_schema(schema, &FieldPath::new("openAPIV3Schema"), &FieldPath::root(), |node| {
            visited.push(node.simple_location.to_string());
            false
        });
        visited
    }

    #[test]
    fn visits_every_node_once_in_pre_order() {
        let schema = sample();

        assert_eq!(
            locations(&schema),
            vec![
                "^",
                "spec",
                "spec.count",
                "spec.labels",
                "spec.labels[*]",
                "spec.list",
                "spec.list[*]",
                "spec.list[*].name",
                "status",
            ]
        );
    }

    #[test]
    fn parents_are_visited_before_children() {
        let schema = sample();
        let mut seen = BTreeSet::new();

        walk_schema(&schema, &FieldPath::root(), &FieldPath::root(), |node| {
            for ancestor in node.ancestors {
                assert!(seen.contains(&std::ptr::from_ref(*ancestor)));
            }
            assert!(seen.insert(std::ptr::from_ref(node.schema)));
            false
        });

        assert_eq!(seen.len(), 9);
    }

    #[test]
    fn raw_field_paths_and_edges() {
        let schema = sample();
        let mut visited = Vec::new();

        walk_schema(&schema, &FieldPath::new("openAPIV3Schema"), &FieldPath::root(), |node| {
            visited.push((node.field_path.to_string(), node.edge, node.depth()));
            false
        });

        assert!(visited.contains(&("openAPIV3Schema".to_owned(), Edge::Root, 0)));
        assert!(visited.contains(&(
            "openAPIV3Schema.properties[spec].properties[list].items".to_owned(),
            Edge::Items,
            3
        )));
        assert!(visited.contains(&(
            "openAPIV3Schema.properties[spec].properties[labels].additionalProperties".to_owned(),
            Edge::AdditionalProperties,
            3
        )));
        assert!(visited.contains(&(
            "openAPIV3Schema.properties[spec].properties[count]".to_owned(),
            Edge::Property("count"),
            2
        )));
    }

    #[test]
    fn returning_true_skips_subtree_but_not_siblings() {
        let schema = sample();
        let mut visited = Vec::new();

        walk_schema(&schema, &FieldPath::root(), &FieldPath::root(), |node| {
            visited.push(node.simple_location.to_string());
            node.simple_location.to_string() == "spec.list"
        });

        assert!(visited.contains(&"spec.list".to_owned()));
        assert!(!visited.contains(&"spec.list[*]".to_owned()));
        assert!(visited.contains(&"status".to_owned()));
        assert!(visited.contains(&"spec.labels[*]".to_owned()));
    }

    #[test]
    fn index_contains_every_location() {
        let schema = sample();
        let index = index_by_simple_location(&schema);

        assert_eq!(index.len(), 9);
        assert_eq!(index["spec.count"].type_.as_deref(), Some("integer"));
        assert_eq!(index["spec.labels[*]"].type_.as_deref(), Some("string"));
    }

    #[test]
    fn tuple_items_are_indexed() {
        let schema = schema(serde_json::json!({
            "type": "array",
            "items": [{ "type": "string" }, { "type": "integer" }]
        }));

        assert_eq!(locations(&schema), vec!["^", "[0]", "[1]"]);
    }
}
