use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, JSONSchemaProps,
};

use crate::{
    comparators::{CrdComparator, version_prefix},
    crd::{crd_name, shared_version_schemas},
    results::ComparisonResults,
    walk::{Edge, SchemaNode, index_by_simple_location, walk_version_schema},
};

/// What is known about a node of the new schema while walking it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeFacts {
    /// The node has no counterpart at the same location in the existing
    /// schema.
    pub is_new: bool,

    /// Objects may omit the node, either because it is nullable or because its
    /// parent doesn't require it.
    pub nullable_or_optional: bool,
}

/// Flags requirements which objects stored with the existing revision could
/// violate: newly required fields and arrays which newly require items.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNewRequiredFields;

impl CrdComparator for NoNewRequiredFields {
    fn name(&self) -> &'static str {
        "NoNewRequiredFields"
    }

    fn why_it_matters(&self) -> &'static str {
        "If new fields are required, then old clients will not function properly and objects \
         stored with the existing revision fail validation on their next update. New fields \
         may only be required inside new, optional parents."
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
            results
                .errors
                .extend(compare_schemas(&prefix, existing_schema, new_schema));
        }

        tracing::debug!(errors = results.errors.len(), "compared required fields");
        results
    }
}

fn compare_schemas(
    prefix: &str,
    existing_schema: &JSONSchemaProps,
    new_schema: &JSONSchemaProps,
) -> Vec<String> {
    let existing_nodes = index_by_simple_location(existing_schema);
    let mut errors = Vec::new();
    let mut facts: Vec<NodeFacts> = Vec::new();

    walk_version_schema(new_schema, |node| {
        facts.truncate(node.depth());

        let location = node.simple_location;
        let existing = existing_nodes.get(&location.to_string()).copied();
        let node_facts = NodeFacts {
            is_new: existing.is_none(),
            nullable_or_optional: is_nullable_or_optional(node),
        };
        let any_ancestor_new_and_nullable = is_any_ancestor_new_and_nullable(&facts);

        if requires_items(node.schema)
            && !existing.is_some_and(requires_items)
            && !any_ancestor_new_and_nullable
        {
            errors.push(format!(
                "{prefix} field/{location} may not newly require a non-empty list"
            ));
        }

        let declaring_node_escapes = node_facts.is_new && node_facts.nullable_or_optional;
        if !declaring_node_escapes && !any_ancestor_new_and_nullable {
            let existing_required = existing
                .and_then(|existing| existing.required.as_deref())
                .unwrap_or_default();

            for child in node.schema.required.iter().flatten() {
                if !existing_required.contains(child) {
                    errors.push(format!(
                        "{prefix} field/{} is new and may not be required",
                        location.child(child.as_str())
                    ));
                }
            }
        }

        facts.push(node_facts);
        false
    });

    errors
}

/// Returns whether `schema` is an array which must hold at least one item.
fn requires_items(schema: &JSONSchemaProps) -> bool {
    schema.type_.as_deref() == Some("array") && schema.min_items.is_some_and(|min| min > 0)
}

fn is_nullable_or_optional(node: &SchemaNode<'_, '_>) -> bool {
    if node.schema.nullable == Some(true) {
        return true;
    }

    let Some(parent) = node.parent() else {
        return false;
    };

    match node.edge {
        Edge::Root => false,
        Edge::Property(name) => !parent
            .required
            .iter()
            .flatten()
            .any(|required| required == name),
        Edge::Items | Edge::ItemsAt(_) => !parent.min_items.is_some_and(|min| min > 0),
        Edge::AdditionalProperties => !parent.min_properties.is_some_and(|min| min > 0),
    }
}

/// Searches the `ancestors` of a node, nearest first, for one which is new
/// and may be omitted.
///
/// The search stops with `false` at the first ancestor which already existed,
/// since all of its own ancestors existed as well.
pub fn is_any_ancestor_new_and_nullable(ancestors: &[NodeFacts]) -> bool {
    for ancestor in ancestors.iter().rev() {
        if !ancestor.is_new {
            return false;
        }
        if ancestor.nullable_or_optional {
            return true;
        }
    }

    false
}
