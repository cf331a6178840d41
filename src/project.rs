//! LiveNode trees: positioned instantiations of Activities inside projects.
//!
//! A [`ProjectTree`] is an arena of [`LiveNode`] records keyed by
//! [`NodeId`], with parent/child links stored as ids rather than object
//! references. Every structural walk in the crate — building, diffing,
//! cycle checking, routing, layout — runs over this arena with an explicit
//! work stack, never recursion, so tree depth cannot overflow the call
//! stack on deep or malformed graphs.
//!
//! Derived fields (`parent_id`, `project_id`, `tree_depth`, `leaf_count`,
//! `provides_output_to`, `dependency_slot`, the resolved `activity`) are
//! recomputed as a unit by the sync engine's derive pipeline and are
//! read-only outside this crate.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::activity::Activity;
use crate::types::{NodeId, SlotId, Urn};

/// One positioned instantiation of an Activity inside a project tree.
///
/// User-editable state (contextual overrides, expansion, lock, drag
/// position) is public; everything derived is accessed through getters and
/// owned by the derive pipeline.
#[derive(Clone, Debug)]
pub struct LiveNode {
    pub(crate) id: NodeId,
    pub(crate) urn: Urn,
    pub(crate) slot_id: Option<SlotId>,
    pub(crate) parent_id: Option<NodeId>,
    pub(crate) project_id: NodeId,
    pub(crate) activity: Option<Arc<Activity>>,
    pub(crate) children: Vec<NodeId>,

    /// Per-instance display name override.
    pub contextual_name: Option<String>,
    /// Per-instance description override.
    pub contextual_description: Option<String>,
    /// Per-instance expected duration, free text, numerically coerced for
    /// roll-up (non-numeric counts as 0).
    pub contextual_expected_duration: Option<String>,
    pub is_expanded: bool,
    pub is_locked: bool,
    /// Layout position; written only by the layout engine or user drag.
    pub x: f64,
    pub y: f64,

    pub(crate) tree_depth: usize,
    pub(crate) leaf_count: usize,
    pub(crate) provides_output_to: Vec<NodeId>,
    pub(crate) dependency_slot: usize,
}

impl LiveNode {
    /// Create a fresh, detached node instantiating `urn`.
    ///
    /// The new node is its own project until attached elsewhere.
    #[must_use]
    pub fn new(urn: Urn, slot_id: Option<SlotId>) -> Self {
        let id = NodeId::fresh();
        Self {
            id,
            urn,
            slot_id,
            parent_id: None,
            project_id: id,
            activity: None,
            children: Vec::new(),
            contextual_name: None,
            contextual_description: None,
            contextual_expected_duration: None,
            is_expanded: true,
            is_locked: false,
            x: 0.0,
            y: 0.0,
            tree_depth: 0,
            leaf_count: 1,
            provides_output_to: Vec::new(),
            dependency_slot: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Which parent child-slot this node fills; `None` for roots.
    #[must_use]
    pub fn slot_id(&self) -> Option<SlotId> {
        self.slot_id
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    /// The root node's id, shared by every node in the tree.
    #[must_use]
    pub fn project_id(&self) -> NodeId {
        self.project_id
    }

    /// The resolved Activity this node instantiates, if the store could
    /// resolve it during the last derive pass.
    #[must_use]
    pub fn activity(&self) -> Option<&Arc<Activity>> {
        self.activity.as_ref()
    }

    /// Ordered child node ids.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Distance from the root (root = 0).
    #[must_use]
    pub fn tree_depth(&self) -> usize {
        self.tree_depth
    }

    /// Number of leaves in this node's subtree (a leaf counts itself).
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Sibling nodes this node feeds data to, in binding order.
    #[must_use]
    pub fn provides_output_to(&self) -> &[NodeId] {
        &self.provides_output_to
    }

    /// Position within the deepest dependency chain this node participates
    /// in; orders layout left-to-right.
    #[must_use]
    pub fn dependency_slot(&self) -> usize {
        self.dependency_slot
    }

    /// Effective display name: contextual override, else the Activity's
    /// name, else the URN.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if let Some(name) = &self.contextual_name {
            return name;
        }
        if let Some(activity) = &self.activity {
            return &activity.name;
        }
        self.urn.as_str()
    }

    /// Numeric coercion of the contextual expected duration; non-numeric
    /// contributes 0.
    #[must_use]
    pub fn expected_duration_value(&self) -> f64 {
        self.contextual_expected_duration
            .as_deref()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// Arena of LiveNodes forming one project tree.
///
/// The project id of the tree is the root node's own id.
#[derive(Clone, Debug, Default)]
pub struct ProjectTree {
    root: Option<NodeId>,
    nodes: FxHashMap<NodeId, LiveNode>,
}

impl ProjectTree {
    /// Create a tree holding a single root node.
    #[must_use]
    pub fn new(mut root: LiveNode) -> Self {
        root.parent_id = None;
        root.slot_id = None;
        root.project_id = root.id;
        let root_id = root.id;
        let mut nodes = FxHashMap::default();
        nodes.insert(root_id, root);
        Self {
            root: Some(root_id),
            nodes,
        }
    }

    /// The root node's id (== the project id).
    ///
    /// # Panics
    ///
    /// Never panics on trees produced by this crate; a defaulted, empty
    /// `ProjectTree` has no root and is only an intermediate state.
    #[must_use]
    pub fn root_id(&self) -> NodeId {
        self.root.expect("project tree has a root")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&LiveNode> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut LiveNode> {
        self.nodes.get_mut(&id)
    }

    /// Like [`get`](Self::get), but an absent id is an error.
    pub fn node(&self, id: NodeId) -> Result<&LiveNode, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::UnknownNode { id })
    }

    /// Like [`get_mut`](Self::get_mut), but an absent id is an error.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut LiveNode, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode { id })
    }

    /// Ordered child ids of `id`; empty for unknown ids.
    #[must_use]
    pub fn child_ids(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Insert a detached node into the arena without linking it.
    ///
    /// The caller is responsible for wiring `children`/`parent_id`; the
    /// sync engine uses this while assembling subtrees.
    pub(crate) fn insert(&mut self, node: LiveNode) {
        if self.root.is_none() {
            self.root = Some(node.id);
        }
        self.nodes.insert(node.id, node);
    }

    /// Iterate `(id, node)` pairs in arbitrary arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &LiveNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// Depth-first preorder over the tree, parents before children,
    /// children in order. Explicit stack; no recursion.
    #[must_use]
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: self.root.into_iter().collect(),
        }
    }

    /// Preorder ids collected up front, for loops that mutate while
    /// walking.
    #[must_use]
    pub fn preorder_ids(&self) -> Vec<NodeId> {
        self.preorder().collect()
    }

    /// Walk from `id` up through `parent_id` links to the root, inclusive
    /// of `id`.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.contains(id).then_some(id),
        }
    }

    /// All ids in the subtree rooted at `id` (inclusive), preorder.
    #[must_use]
    pub fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let children = self.child_ids(current);
            for child in children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// The child of `parent` filling `slot`, if any.
    #[must_use]
    pub fn find_child_by_slot(&self, parent: NodeId, slot: SlotId) -> Option<NodeId> {
        self.child_ids(parent)
            .iter()
            .copied()
            .find(|child| self.get(*child).and_then(LiveNode::slot_id) == Some(slot))
    }

    /// Move every node of `subtree` into this arena without linking it.
    ///
    /// Returns the absorbed subtree's root id; the caller wires
    /// `parent_id`/`children` (the sync engine controls child ordering).
    pub(crate) fn absorb(&mut self, mut subtree: ProjectTree) -> Option<NodeId> {
        let sub_root = subtree.root?;
        for (_, node) in subtree.nodes.drain() {
            self.nodes.insert(node.id, node);
        }
        Some(sub_root)
    }

    /// Move every node of `subtree` into this arena and link its root as
    /// the last child of `parent`.
    ///
    /// Derived fields of the moved nodes are stale until the next derive
    /// pass.
    pub fn attach_subtree(
        &mut self,
        parent: NodeId,
        subtree: ProjectTree,
        slot: Option<SlotId>,
    ) -> Result<NodeId, TreeError> {
        if !self.contains(parent) {
            return Err(TreeError::UnknownNode { id: parent });
        }
        let sub_root = self
            .absorb(subtree)
            .ok_or(TreeError::UnknownNode { id: parent })?;
        {
            let root_node = self.node_mut(sub_root)?;
            root_node.parent_id = Some(parent);
            root_node.slot_id = slot;
        }
        self.node_mut(parent)?.children.push(sub_root);
        Ok(sub_root)
    }

    /// Detach the subtree rooted at `id` and promote it to a standalone
    /// project: `parent_id` cleared, its own id becomes the new project id.
    ///
    /// Detaching the root is rejected; a root has nothing to detach from.
    pub fn detach_subtree(&mut self, id: NodeId) -> Result<ProjectTree, TreeError> {
        let parent = self
            .node(id)?
            .parent_id
            .ok_or(TreeError::CannotDetachRoot { id })?;
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|child| *child != id);
        }

        let mut nodes = FxHashMap::default();
        for member in self.subtree_ids(id) {
            if let Some(node) = self.nodes.remove(&member) {
                nodes.insert(member, node);
            }
        }
        let root_node = nodes.get_mut(&id).ok_or(TreeError::UnknownNode { id })?;
        root_node.parent_id = None;
        root_node.slot_id = None;
        root_node.project_id = id;

        Ok(ProjectTree {
            root: Some(id),
            nodes,
        })
    }
}

/// Iterative preorder traversal over a [`ProjectTree`].
pub struct Preorder<'a> {
    tree: &'a ProjectTree,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        let children = self.tree.child_ids(current);
        for child in children.iter().rev() {
            self.stack.push(*child);
        }
        Some(current)
    }
}

/// Iterator over the ancestor chain of a node, inclusive, ending at the
/// root.
pub struct Ancestors<'a> {
    tree: &'a ProjectTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.get(current).and_then(LiveNode::parent_id);
        Some(current)
    }
}

/// Errors raised by arena operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum TreeError {
    /// The id does not name a node in this tree.
    #[error("no node {id} in this project tree")]
    #[diagnostic(code(jagtree::tree::unknown_node))]
    UnknownNode { id: NodeId },

    /// Roots cannot be detached from themselves.
    #[error("node {id} is the project root and cannot be detached")]
    #[diagnostic(code(jagtree::tree::cannot_detach_root))]
    CannotDetachRoot { id: NodeId },
}
