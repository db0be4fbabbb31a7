//! Data node classification
//!
//! Every top-level key of the data tree carries its node type as a
//! two-character prefix. Keys are classified once into a [`NodeKey`] and then
//! processed in [`NodeKind`] order.

use crate::scanner::Placeholder;
use serde_json::{Map, Value};
use std::fmt;

/// Kind of a data node, in processing order
///
/// Containers run before images and scalars because they change the layout
/// that coordinate-based substitution works against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    /// `s:` sheet scope (reserved)
    SheetScope,
    /// `b:` repeating paragraph block
    Block,
    /// `t:` repeating table row
    Row,
    /// `i:` embedded image
    Image,
    /// No prefix
    Scalar,
}

impl NodeKind {
    /// Key prefix for this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::SheetScope => "s:",
            NodeKind::Block => "b:",
            NodeKind::Row => "t:",
            NodeKind::Image => "i:",
            NodeKind::Scalar => "",
        }
    }

    /// Whether nodes of this kind repeat a region of the document
    pub fn is_container(&self) -> bool {
        matches!(self, NodeKind::Block | NodeKind::Row)
    }
}

/// A classified data key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub name: String,
}

impl NodeKey {
    /// Classify a raw data key; unknown prefixes are scalars
    pub fn parse(key: &str) -> Self {
        let kinds = [
            NodeKind::SheetScope,
            NodeKind::Block,
            NodeKind::Row,
            NodeKind::Image,
        ];
        for kind in kinds {
            if let Some(name) = key.strip_prefix(kind.prefix()) {
                return Self {
                    kind,
                    name: name.to_string(),
                };
            }
        }
        Self {
            kind: NodeKind::Scalar,
            name: key.to_string(),
        }
    }

    /// Same key addressing the `index`-th copy of a cloned region (`name#index`)
    pub fn indexed(&self, index: usize) -> Self {
        Self {
            kind: self.kind,
            name: format!("{}#{}", self.name, index),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.name)
    }
}

/// Classify and order the keys of a data object
///
/// The sort is stable: keys of the same kind keep the caller's order.
pub fn sorted_nodes(data: &Map<String, Value>) -> Vec<(NodeKey, &Value)> {
    let mut nodes: Vec<(NodeKey, &Value)> = data
        .iter()
        .map(|(key, value)| (NodeKey::parse(key), value))
        .collect();
    nodes.sort_by_key(|(key, _)| key.kind);
    nodes
}

/// Per-iteration data of a container node
///
/// An array yields one iteration per element, an object a single iteration,
/// `true` a single empty iteration, and `null`/`false` none at all.
pub fn iterations(value: &Value) -> Vec<Map<String, Value>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => map.clone(),
                other => {
                    tracing::warn!(value = %other, "container iteration is not an object");
                    Map::new()
                }
            })
            .collect(),
        Value::Object(map) => vec![map.clone()],
        Value::Bool(true) => vec![Map::new()],
        Value::Null | Value::Bool(false) => Vec::new(),
        other => {
            tracing::warn!(value = %other, "container value is not a list");
            Vec::new()
        }
    }
}

/// How a placeholder relates to a repeating container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership<'a> {
    /// Bare marker naming the container (`${rows}`, `${t:rows}`)
    Anchor,
    /// Qualified iteration field (`${rows->qty}`, `${t:rows->qty:arg}`)
    Field { field: &'a str, args: &'a str },
    /// Unrelated placeholder
    Unrelated,
}

impl Membership<'_> {
    /// Whether the placeholder marks the container's location
    pub fn marks_container(&self) -> bool {
        !matches!(self, Membership::Unrelated)
    }
}

/// Classify a placeholder against a container of the given kind
///
/// An inline prefix only counts when it matches the kind: `${t:rows}` marks
/// a row container, `${b:rows}` does not.
pub fn membership<'a>(
    placeholder: &Placeholder<'a>,
    kind: NodeKind,
    container: &str,
) -> Membership<'a> {
    // `${t:rows->qty}` scans as name `t` with arguments `rows->qty`
    let inline = kind.is_container() && kind.prefix().strip_suffix(':') == Some(placeholder.name);
    let (head, args) = if inline {
        match placeholder.args.split_once(':') {
            Some((head, rest)) => (head, rest),
            None => (placeholder.args, ""),
        }
    } else {
        (placeholder.name, placeholder.args)
    };

    if head == container {
        return Membership::Anchor;
    }

    match head
        .strip_prefix(container)
        .and_then(|rest| rest.strip_prefix("->"))
    {
        Some(field) if !field.is_empty() => Membership::Field { field, args },
        _ => Membership::Unrelated,
    }
}

/// Whether a scanned name is a container prefix written inside the braces (`${t:rows->f}`)
pub(crate) fn is_container_prefix(name: &str) -> bool {
    name == "t" || name == "b"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_prefixes() {
        assert_eq!(NodeKey::parse("t:rows").kind, NodeKind::Row);
        assert_eq!(NodeKey::parse("t:rows").name, "rows");
        assert_eq!(NodeKey::parse("b:section").kind, NodeKind::Block);
        assert_eq!(NodeKey::parse("i:logo").kind, NodeKind::Image);
        assert_eq!(NodeKey::parse("s:Sheet1").kind, NodeKind::SheetScope);

        let scalar = NodeKey::parse("name");
        assert_eq!(scalar.kind, NodeKind::Scalar);
        assert_eq!(scalar.name, "name");
    }

    #[test]
    fn test_unknown_prefix_is_scalar() {
        let key = NodeKey::parse("x:thing");
        assert_eq!(key.kind, NodeKind::Scalar);
        assert_eq!(key.name, "x:thing");
    }

    #[test]
    fn test_indexed_and_display() {
        let key = NodeKey::parse("i:photo").indexed(3);
        assert_eq!(key.name, "photo#3");
        assert_eq!(key.to_string(), "i:photo#3");
    }

    #[test]
    fn test_sorted_nodes_order() {
        let data = json!({
            "name": "A",
            "i:logo": "logo.png",
            "t:rows": [],
            "total": "42",
            "b:section": [],
            "s:Sheet1": {},
            "t:other": []
        });
        let sorted = sorted_nodes(data.as_object().unwrap());
        let keys: Vec<String> = sorted.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(
            keys,
            vec!["s:Sheet1", "b:section", "t:rows", "t:other", "i:logo", "name", "total"]
        );
    }

    #[test]
    fn test_iterations_shapes() {
        assert_eq!(iterations(&json!([{"a": 1}, {"a": 2}])).len(), 2);
        assert_eq!(iterations(&json!({"a": 1})).len(), 1);
        assert_eq!(iterations(&json!(true)), vec![Map::new()]);
        assert!(iterations(&json!(false)).is_empty());
        assert!(iterations(&json!(null)).is_empty());
        assert!(iterations(&json!([])).is_empty());
        assert_eq!(iterations(&json!(["x"])), vec![Map::new()]);
    }

    #[test]
    fn test_membership() {
        let found: Vec<_> =
            scan("${rows} ${t:rows} ${rows->qty} ${t:rows->name:60x40} ${rowsx} ${t:other->a} ${qty}")
                .collect();
        let kinds: Vec<Membership> =
            found.iter().map(|p| membership(p, NodeKind::Row, "rows")).collect();

        assert_eq!(kinds[0], Membership::Anchor);
        assert_eq!(kinds[1], Membership::Anchor);
        assert_eq!(kinds[2], Membership::Field { field: "qty", args: "" });
        assert_eq!(kinds[3], Membership::Field { field: "name", args: "60x40" });
        assert_eq!(kinds[4], Membership::Unrelated);
        assert_eq!(kinds[5], Membership::Unrelated);
        assert_eq!(kinds[6], Membership::Unrelated);
        assert!(kinds[3].marks_container());
    }

    #[test]
    fn test_membership_prefix_must_match_kind() {
        let found: Vec<_> = scan("${t:section} ${b:section} ${b:rows->f} ${section->f}").collect();

        assert_eq!(membership(&found[0], NodeKind::Block, "section"), Membership::Unrelated);
        assert_eq!(membership(&found[1], NodeKind::Block, "section"), Membership::Anchor);
        assert_eq!(membership(&found[2], NodeKind::Row, "rows"), Membership::Unrelated);
        assert_eq!(
            membership(&found[3], NodeKind::Block, "section"),
            Membership::Field { field: "f", args: "" }
        );
    }
}
