//! Gene-rooted feature trees.
//!
//! A tree is a small arena: every node lives in one `Vec` and refers to its
//! parent and children by index, so a whole gene is dropped as a unit.

use std::collections::HashMap;

use crate::feature::{Feature, Record};
use crate::status::RemapStatus;

/// Index of a node inside its [`FeatureTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One feature plus its place in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FeatureNode {
    feature: Feature,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    status: RemapStatus,
}

/// A gene, its transcripts and their leaf features.
///
/// Children keep insertion order, which is file order for assembled trees.
/// Passthrough lines met inside the gene group are anchored to the feature
/// read just before them and written right after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureTree {
    nodes: Vec<FeatureNode>,
    lines: Vec<(NodeId, String)>,
}

impl FeatureTree {
    /// Creates a tree holding only its root.
    pub fn new(root: Feature) -> Self {
        Self {
            nodes: vec![FeatureNode {
                feature: root,
                parent: None,
                children: Vec::new(),
                status: RemapStatus::None,
            }],
            lines: Vec::new(),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Appends `feature` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, feature: Feature) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(FeatureNode {
            feature,
            parent: Some(parent),
            children: Vec::new(),
            status: RemapStatus::None,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    #[inline]
    pub fn feature(&self, id: NodeId) -> &Feature {
        &self.nodes[id.0].feature
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[inline]
    pub fn status(&self, id: NodeId) -> RemapStatus {
        self.nodes[id.0].status
    }

    pub fn set_status(&mut self, id: NodeId, status: RemapStatus) {
        self.nodes[id.0].status = status;
    }

    /// Number of ancestors: 0 for the gene, 1 for transcripts, 2 for leaves.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.parent(parent);
        }
        depth
    }

    /// The gene feature.
    pub fn gene(&self) -> &Feature {
        self.feature(self.root())
    }

    /// Transcript nodes in file order.
    pub fn transcripts(&self) -> &[NodeId] {
        self.children(self.root())
    }

    /// Number of features in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`; a tree holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in pre-order: each parent before its children.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Every feature of the tree, mutably, in arena order.
    pub fn features_mut(&mut self) -> impl Iterator<Item = &mut Feature> {
        self.nodes.iter_mut().map(|node| &mut node.feature)
    }

    /// Passthrough lines captured inside the gene group, in file order.
    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.lines.iter().map(|(_, line)| line.as_str())
    }

    /// Passthrough lines that follow the row of `id`.
    pub fn lines_after(&self, id: NodeId) -> impl Iterator<Item = &str> + '_ {
        self.lines
            .iter()
            .filter(move |(anchor, _)| *anchor == id)
            .map(|(_, line)| line.as_str())
    }

    /// Anchors a passthrough line to the most recently added feature.
    pub fn push_line(&mut self, line: impl Into<String>) {
        let anchor = NodeId(self.nodes.len() - 1);
        self.lines.push((anchor, line.into()));
    }

    /// Copies the passthrough lines of `source`, a tree this one was derived
    /// from. `moved` maps source nodes to their last copy here; a line whose
    /// anchor was not carried over moves up to the closest carried node
    /// before it in pre-order.
    pub fn carry_lines(&mut self, source: &FeatureTree, moved: &HashMap<NodeId, NodeId>) {
        if source.lines.is_empty() {
            return;
        }
        let order = source.preorder();
        for (anchor, line) in &source.lines {
            let pos = order.iter().position(|id| id == anchor).unwrap_or(0);
            let target = order[..=pos]
                .iter()
                .rev()
                .find_map(|id| moved.get(id).copied())
                .unwrap_or_else(|| self.root());
            self.lines.push((target, line.clone()));
        }
    }

    /// The features in pre-order, each followed by its passthrough lines, as
    /// records.
    pub fn records(&self) -> Vec<Record> {
        let mut records = Vec::with_capacity(self.nodes.len() + self.lines.len());
        for id in self.preorder() {
            records.push(Record::Feature(self.feature(id).clone()));
            records.extend(self.lines_after(id).map(|line| Record::Line(line.to_string())));
        }
        records
    }
}
