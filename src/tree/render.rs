//! Structural rendering hooks for ResultTree.
//!
//! Output formats live outside the crate. A renderer implements
//! [`TreeVisitor`] and receives identifying fields (`id`, `name`,
//! `internalTypeName`) as node attributes and every other field as a child
//! value, depth first. JSON output goes through `serde::Serialize`.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::{NodeId, ResultTree, ID_FIELD, NAME_FIELD, TYPE_FIELD};
use crate::value::Value;

/// Callbacks for a depth-first walk over a [`ResultTree`].
pub trait TreeVisitor {
    fn start_node(&mut self, type_name: &str, attributes: &[(&str, &Value)]);

    fn field(&mut self, name: &str, value: &Value);

    fn end_node(&mut self, type_name: &str);
}

fn is_attribute(name: &str) -> bool {
    name == ID_FIELD || name == NAME_FIELD || name == TYPE_FIELD
}

impl ResultTree {
    /// Walk the whole tree, root first.
    pub fn walk(&self, visitor: &mut dyn TreeVisitor) {
        self.walk_node(self.root(), visitor);
    }

    fn walk_node(&self, id: NodeId, visitor: &mut dyn TreeVisitor) {
        let Some(node) = self.get(id) else {
            return;
        };

        let attributes: Vec<(&str, &Value)> = node
            .fields()
            .iter()
            .filter(|(name, _)| is_attribute(name))
            .map(|(name, value)| (name.as_str(), value))
            .collect();

        visitor.start_node(node.type_name(), &attributes);
        for (name, value) in node.fields() {
            if !is_attribute(name) {
                visitor.field(name, value);
            }
        }
        for child in node.children() {
            self.walk_node(*child, visitor);
        }
        visitor.end_node(node.type_name());
    }
}

struct NodeSer<'a> {
    tree: &'a ResultTree,
    id: NodeId,
}

struct FieldsSer<'a>(&'a [(String, Value)]);

impl Serialize for FieldsSer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, value) in self.0.iter().filter(|(name, _)| !is_attribute(name)) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for NodeSer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(node) = self.tree.get(self.id) else {
            return serializer.serialize_none();
        };

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", node.type_name())?;
        if let Some(id) = node.field(ID_FIELD) {
            map.serialize_entry("id", id)?;
        }
        if let Some(name) = node.field(NAME_FIELD) {
            map.serialize_entry("name", name)?;
        }
        map.serialize_entry("fields", &FieldsSer(node.fields()))?;

        let children: Vec<NodeSer> = node
            .children()
            .iter()
            .map(|&id| NodeSer { tree: self.tree, id })
            .collect();
        map.serialize_entry("children", &children)?;
        map.end()
    }
}

impl Serialize for ResultTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeSer {
            tree: self,
            id: self.root(),
        }
        .serialize(serializer)
    }
}
