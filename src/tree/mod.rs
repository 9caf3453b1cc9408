//! ResultTree - the ordered hierarchical output of a report.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Each node has one
//! parent, so an entity instance reachable from several parents appears as
//! several distinct nodes with identical content. Fields keep insertion order.
//!
//! - `render`: [`TreeVisitor`] walk and `serde::Serialize`
//! - flattening into one row per leaf path lives here with the arena

mod render;


pub use render::TreeVisitor;

use crate::error::{ReportError, ReportResult};
use crate::value::Value;

/// Synthetic field holding a node's primary key.
pub const ID_FIELD: &str = "id";
/// Synthetic field holding a node's display name.
pub const NAME_FIELD: &str = "name";
/// Synthetic field holding a node's type name.
pub const TYPE_FIELD: &str = "internalTypeName";

/// Handle to a node in one [`ResultTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A node's content, before it is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl NodeData {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.into(),
            fields: vec![],
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        set_field(&mut self.fields, name, value.into());
        self
    }
}

/// Anything a caller may try to append as a child.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeItem {
    Node(NodeData),
    Scalar(Value),
}

impl From<NodeData> for TreeItem {
    fn from(node: NodeData) -> Self {
        TreeItem::Node(node)
    }
}

impl From<Value> for TreeItem {
    fn from(value: Value) -> Self {
        TreeItem::Scalar(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn type_name(&self) -> &str {
        &self.data.type_name
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.data.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn id(&self) -> Option<&Value> {
        self.field(ID_FIELD)
    }
}

fn into_node(item: TreeItem) -> ReportResult<NodeData> {
    match item {
        TreeItem::Node(node) => Ok(node),
        TreeItem::Scalar(value) => Err(ReportError::TypeMismatch {
            expected: "tree node".into(),
            found: format!("scalar '{}'", value),
        }),
    }
}

fn set_field(fields: &mut Vec<(String, Value)>, name: &str, value: Value) {
    match fields.iter_mut().find(|(n, _)| n == name) {
        Some((_, slot)) => *slot = value,
        None => fields.push((name.to_string(), value)),
    }
}

/// Rows produced by [`ResultTree::flatten`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTable {
    /// `Type.field` column names, in first-seen order
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// An arena-backed ordered tree of report nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTree {
    nodes: Vec<Node>,
}

impl ResultTree {
    /// A tree holding only a root node of the given type.
    pub fn new(root_type: &str) -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::new(root_type),
                parent: None,
                children: vec![],
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_ref(&self, id: NodeId) -> ReportResult<&Node> {
        self.get(id)
            .ok_or_else(|| ReportError::InvalidTarget(format!("no node #{} in tree", id.0)))
    }

    /// Total number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the root has no children.
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.get(id) {
            Some(node) => node.children(),
            None => &[],
        }
    }

    /// The `index`-th child of a node.
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn field(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.get(id)?.field(name)
    }

    /// Set a field, keeping its original position if it already exists.
    pub fn set_field(&mut self, id: NodeId, name: &str, value: impl Into<Value>) -> ReportResult<()> {
        self.node_ref(id)?;
        set_field(&mut self.nodes[id.0].data.fields, name, value.into());
        Ok(())
    }

    fn check_sibling_type(&self, parent: NodeId, node: &NodeData, pending_type: Option<&str>) -> ReportResult<()> {
        let sibling_type = self
            .node_ref(parent)?
            .children
            .first()
            .map(|c| self.nodes[c.0].type_name())
            .or(pending_type);

        match sibling_type {
            Some(expected) if expected != node.type_name => Err(ReportError::TypeMismatch {
                expected: expected.to_string(),
                found: node.type_name.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn attach(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: vec![],
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append one child.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the item is not a node, or its type differs from
    /// the parent's existing children.
    pub fn append(&mut self, parent: NodeId, item: impl Into<TreeItem>) -> ReportResult<NodeId> {
        let node = into_node(item.into())?;
        self.check_sibling_type(parent, &node, None)?;
        Ok(self.attach(parent, node))
    }

    /// Append several children; nothing is attached if any item is rejected.
    pub fn append_all<I, T>(&mut self, parent: NodeId, items: I) -> ReportResult<Vec<NodeId>>
    where
        I: IntoIterator<Item = T>,
        T: Into<TreeItem>,
    {
        let nodes = items
            .into_iter()
            .map(|item| into_node(item.into()))
            .collect::<ReportResult<Vec<_>>>()?;

        let pending_type = nodes.first().map(|n| n.type_name.clone());
        for node in &nodes {
            self.check_sibling_type(parent, node, pending_type.as_deref())?;
        }

        Ok(nodes.into_iter().map(|node| self.attach(parent, node)).collect())
    }

    /// Nodes from the root down to `id`, both included.
    pub fn ancestry(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.get(current).and_then(|n| n.parent) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Leaf nodes in depth-first order. The root alone is not a leaf.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack: Vec<NodeId> = self.children(self.root()).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let children = self.children(id);
            if children.is_empty() {
                leaves.push(id);
            } else {
                stack.extend(children.iter().rev().copied());
            }
        }
        leaves
    }

    /// One row per leaf path.
    ///
    /// Each row carries the fields of every node from the root to the leaf,
    /// under `Type.field` column names. Columns a path lacks are `NULL`.
    pub fn flatten(&self) -> FlatTable {
        let mut table = FlatTable::default();
        let mut rows: Vec<Vec<(usize, Value)>> = Vec::new();

        for leaf in self.leaves() {
            let mut row = Vec::new();
            for id in self.ancestry(leaf) {
                let node = &self.nodes[id.0];
                for (name, value) in node.fields() {
                    let column = format!("{}.{}", node.type_name(), name);
                    let index = match table.columns.iter().position(|c| *c == column) {
                        Some(i) => i,
                        None => {
                            table.columns.push(column);
                            table.columns.len() - 1
                        }
                    };
                    row.push((index, value.clone()));
                }
            }
            rows.push(row);
        }

        let width = table.columns.len();
        table.rows = rows
            .into_iter()
            .map(|cells| {
                let mut row = vec![Value::Null; width];
                for (index, value) in cells {
                    row[index] = value;
                }
                row
            })
            .collect();
        table
    }
}
