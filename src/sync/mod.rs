//! Tree Synchronization Engine.
//!
//! Owns LiveNode tree construction and mutation: building a tree from an
//! Activity, propagating an Activity's structural edits into every
//! affected LiveNode tree without destroying unrelated subtrees, and the
//! guarded attach/detach edits users make directly on a tree.
//!
//! The engine is constructed over an injected [`ActivityStore`] — the
//! synchronous resolution path — and never performs I/O itself. Every
//! mutating operation returns a [`ChangeSet`] naming what changed; nothing
//! is signalled implicitly. Callers persist and re-derive
//! ([`TreeSync::derive_project_data`]) after each structural mutation; a
//! tree is not consistent until the full derive pipeline has run.
//!
//! Store definitions are kept acyclic by the cycle guard at edit time, so
//! every traversal here is finite.
//!
//! # Examples
//!
//! ```rust
//! use jagtree::activity::Activity;
//! use jagtree::store::ActivityStore;
//! use jagtree::sync::TreeSync;
//! use jagtree::types::Urn;
//!
//! let mut store = ActivityStore::new();
//! let leaf = Urn::parse("urn:demo:leaf").unwrap();
//! store.insert(Activity::new(leaf.clone(), "Leaf")).unwrap();
//!
//! let mut mission = Activity::new(Urn::parse("urn:demo:mission").unwrap(), "Mission");
//! mission.add_child(leaf.clone());
//! mission.add_child(leaf);
//! let mission = store.insert(mission).unwrap();
//!
//! let sync = TreeSync::new(&store);
//! let mut outcome = sync.build_tree(&mission.urn, true).unwrap();
//! assert!(outcome.missing.is_empty());
//! assert_eq!(outcome.tree.len(), 3);
//!
//! sync.derive_project_data(&mut outcome.tree).unwrap();
//! ```

mod derive;

pub use derive::DeriveReport;

use miette::Diagnostic;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::activity::Activity;
use crate::cycle::loop_detection;
use crate::project::{LiveNode, ProjectTree, TreeError};
use crate::store::ActivityStore;
use crate::types::{NodeId, SlotId, Urn};

/// A per-node unresolvable-URN condition, surfaced instead of silently
/// producing a dangling reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingActivity {
    pub node: NodeId,
    pub urn: Urn,
}

/// What a synchronization pass changed.
///
/// Affected node ids, not implicit events: consumers (renderer,
/// persistence, library panels) decide what to do with each entry.
/// Promoted orphan trees are carried whole — they are new projects now.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Roots of newly attached subtrees.
    pub attached: Vec<NodeId>,
    /// Roots of detached subtrees (now roots of `promoted` trees).
    pub detached: Vec<NodeId>,
    /// Nodes whose child list changed.
    pub touched: Vec<NodeId>,
    /// Unresolvable URNs encountered while instantiating.
    pub missing: Vec<MissingActivity>,
    /// Orphan subtrees promoted to standalone projects.
    pub promoted: Vec<ProjectTree>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
            && self.detached.is_empty()
            && self.touched.is_empty()
            && self.missing.is_empty()
            && self.promoted.is_empty()
    }
}

/// A freshly built tree plus the URNs that would not resolve.
#[derive(Debug)]
pub struct BuildOutcome {
    pub tree: ProjectTree,
    pub missing: Vec<MissingActivity>,
}

/// Errors raised by synchronization operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SyncError {
    /// The root URN of a build (or an explicit attach) is not in the
    /// store.
    #[error("activity {urn} is not in the store")]
    #[diagnostic(
        code(jagtree::sync::unknown_activity),
        help("Warm the activity store (load or insert) before building trees.")
    )]
    UnknownActivity { urn: Urn },

    /// The proposed attach would allow unbounded recursive expansion.
    #[error("attaching {urn} under {parent} would create a cycle")]
    #[diagnostic(code(jagtree::sync::cycle))]
    CycleDetected { parent: NodeId, urn: Urn },

    /// The parent already has a child in that slot.
    #[error("slot {slot} under {parent} is already filled")]
    #[diagnostic(code(jagtree::sync::slot_occupied))]
    SlotOccupied { parent: NodeId, slot: SlotId },

    /// The arena rejected an operation.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Tree(#[from] TreeError),
}

/// The synchronization engine. Cheap to construct; holds only the store
/// reference it resolves URNs through.
pub struct TreeSync<'a> {
    store: &'a ActivityStore,
}

impl<'a> TreeSync<'a> {
    #[must_use]
    pub fn new(store: &'a ActivityStore) -> Self {
        Self { store }
    }

    /// The store this engine resolves URNs through.
    #[must_use]
    pub fn store(&self) -> &ActivityStore {
        self.store
    }

    /// Instantiate a whole LiveNode tree from the Activity named by
    /// `root_urn`.
    ///
    /// Iterative work-stack walk over the Activity's child graph; one
    /// LiveNode per child-slot, `parent_id`/`project_id` wired as the
    /// walk goes. A child URN absent from the store is reported in the
    /// outcome and the node is created unresolved and unexpanded; only a
    /// missing root fails the build.
    #[instrument(skip(self), fields(urn = %root_urn))]
    pub fn build_tree(&self, root_urn: &Urn, expanded: bool) -> Result<BuildOutcome, SyncError> {
        let root_activity =
            self.store
                .resolve(root_urn)
                .ok_or_else(|| SyncError::UnknownActivity {
                    urn: root_urn.clone(),
                })?;

        let mut root = LiveNode::new(root_urn.clone(), None);
        root.is_expanded = expanded;
        root.activity = Some(root_activity.clone());
        let root_id = root.id();
        let mut tree = ProjectTree::new(root);
        let mut missing = Vec::new();

        let mut work = vec![(root_id, root_activity)];
        while let Some((parent_id, activity)) = work.pop() {
            for slot in &activity.children {
                let mut child = LiveNode::new(slot.urn.clone(), Some(slot.slot_id));
                child.parent_id = Some(parent_id);
                child.project_id = root_id;
                child.is_expanded = expanded;
                let child_id = child.id();
                match self.store.resolve(&slot.urn) {
                    Some(child_activity) => {
                        child.activity = Some(child_activity.clone());
                        work.push((child_id, child_activity));
                    }
                    None => {
                        child.is_expanded = false;
                        missing.push(MissingActivity {
                            node: child_id,
                            urn: slot.urn.clone(),
                        });
                    }
                }
                tree.insert(child);
                tree.node_mut(parent_id)?.children.push(child_id);
            }
        }

        debug!(nodes = tree.len(), missing = missing.len(), "tree built");
        Ok(BuildOutcome { tree, missing })
    }

    /// Attach an instance of `child_urn` under `parent`, in `slot`.
    ///
    /// Runs the cycle guard first; a rejected edit leaves the tree
    /// untouched. The child arrives as a whole built subtree.
    pub fn attach_child(
        &self,
        tree: &mut ProjectTree,
        parent: NodeId,
        child_urn: &Urn,
        slot: SlotId,
    ) -> Result<ChangeSet, SyncError> {
        if tree.find_child_by_slot(parent, slot).is_some() {
            return Err(SyncError::SlotOccupied { parent, slot });
        }
        if loop_detection(tree, parent, child_urn, self.store) {
            return Err(SyncError::CycleDetected {
                parent,
                urn: child_urn.clone(),
            });
        }
        let outcome = self.build_tree(child_urn, true)?;
        let sub_root = tree.attach_subtree(parent, outcome.tree, Some(slot))?;
        Ok(ChangeSet {
            attached: vec![sub_root],
            touched: vec![parent],
            missing: outcome.missing,
            ..ChangeSet::default()
        })
    }

    /// Detach the subtree rooted at `node` and promote it to a new
    /// standalone project.
    pub fn detach_node(
        &self,
        tree: &mut ProjectTree,
        node: NodeId,
    ) -> Result<ChangeSet, SyncError> {
        let parent = tree.node(node)?.parent_id();
        let orphan = tree.detach_subtree(node)?;
        Ok(ChangeSet {
            detached: vec![node],
            touched: parent.into_iter().collect(),
            promoted: vec![orphan],
            ..ChangeSet::default()
        })
    }

    /// Propagate a changed Activity's child structure into every instance
    /// of it inside `tree`.
    ///
    /// At each node whose URN matches, the node's children are diffed
    /// against the Activity's child-slots by `{urn, slot}` equality:
    /// added slots are instantiated as built subtrees, removed slots are
    /// detached by slot id (never URN — several slots may share a URN)
    /// and promoted to standalone projects once the walk completes.
    /// Detachment is deferred so removal never invalidates the stack
    /// being walked. Nodes with a non-matching URN are not mutated.
    ///
    /// The caller must have admitted the changed Activity to the store
    /// already, and re-derives both this tree and every promoted orphan
    /// afterwards.
    #[instrument(skip(self, tree, changed), fields(urn = %changed.urn))]
    pub fn update_tree_with_activity_change(
        &self,
        changed: &Activity,
        tree: &mut ProjectTree,
    ) -> Result<ChangeSet, SyncError> {
        self.apply_child_diff(tree, Some(&changed.urn))
    }

    /// Re-apply the child-slot diff at every node against its own stored
    /// Activity.
    ///
    /// The full-refresh path for trees arriving from an unknown origin
    /// (import, external reload): where the targeted update walks one
    /// URN, this walks them all.
    #[instrument(skip(self, tree))]
    pub fn full_resynchronize(&self, tree: &mut ProjectTree) -> Result<ChangeSet, SyncError> {
        self.apply_child_diff(tree, None)
    }

    fn apply_child_diff(
        &self,
        tree: &mut ProjectTree,
        target: Option<&Urn>,
    ) -> Result<ChangeSet, SyncError> {
        let mut change = ChangeSet::default();
        let mut detach_queue: Vec<NodeId> = Vec::new();
        let mut detach_set: FxHashSet<NodeId> = FxHashSet::default();

        let mut stack = vec![tree.root_id()];
        while let Some(current) = stack.pop() {
            let node_urn = tree.node(current)?.urn().clone();
            let applies = target.is_none_or(|wanted| *wanted == node_urn);
            if applies
                && let Some(activity) = self.store.resolve(&node_urn)
            {
                self.diff_children(
                    tree,
                    current,
                    &activity,
                    &mut change,
                    &mut detach_queue,
                    &mut detach_set,
                )?;
            }
            // Walk surviving, pre-existing children; freshly attached
            // subtrees were built from current definitions already.
            for child in tree.child_ids(current) {
                if !detach_set.contains(child) && !change.attached.contains(child) {
                    stack.push(*child);
                }
            }
        }

        for orphan_root in detach_queue {
            let orphan = tree.detach_subtree(orphan_root)?;
            change.detached.push(orphan_root);
            change.promoted.push(orphan);
        }
        Ok(change)
    }

    /// Diff one node's children against its Activity's child-slots and
    /// apply additions/removals. Removals are only queued here.
    fn diff_children(
        &self,
        tree: &mut ProjectTree,
        parent: NodeId,
        activity: &Activity,
        change: &mut ChangeSet,
        detach_queue: &mut Vec<NodeId>,
        detach_set: &mut FxHashSet<NodeId>,
    ) -> Result<(), SyncError> {
        let current: Vec<(NodeId, Option<SlotId>, Urn)> = tree
            .child_ids(parent)
            .iter()
            .map(|child| {
                let node = tree.node(*child)?;
                Ok((*child, node.slot_id(), node.urn().clone()))
            })
            .collect::<Result<_, TreeError>>()?;

        let mut kept: FxHashSet<NodeId> = FxHashSet::default();
        let mut new_children: Vec<NodeId> = Vec::with_capacity(activity.children.len());
        let mut mutated = false;

        for slot in &activity.children {
            let existing = current.iter().find(|(id, slot_id, urn)| {
                !kept.contains(id) && *slot_id == Some(slot.slot_id) && urn == &slot.urn
            });
            if let Some((id, _, _)) = existing {
                kept.insert(*id);
                new_children.push(*id);
                continue;
            }

            // Added entry: instantiate as a whole built subtree, or as an
            // unresolved placeholder when the store cannot resolve it.
            mutated = true;
            let child_id = match self.store.resolve(&slot.urn) {
                Some(_) => {
                    let outcome = self.build_tree(&slot.urn, true)?;
                    change.missing.extend(outcome.missing);
                    tree.absorb(outcome.tree)
                        .ok_or(TreeError::UnknownNode { id: parent })?
                }
                None => {
                    let mut placeholder = LiveNode::new(slot.urn.clone(), Some(slot.slot_id));
                    placeholder.is_expanded = false;
                    let id = placeholder.id();
                    tree.insert(placeholder);
                    change.missing.push(MissingActivity {
                        node: id,
                        urn: slot.urn.clone(),
                    });
                    id
                }
            };
            {
                let project = tree.root_id();
                let node = tree.node_mut(child_id)?;
                node.parent_id = Some(parent);
                node.slot_id = Some(slot.slot_id);
                node.project_id = project;
            }
            change.attached.push(child_id);
            new_children.push(child_id);
        }

        for (id, _, _) in &current {
            if !kept.contains(id) {
                mutated = true;
                detach_queue.push(*id);
                detach_set.insert(*id);
            }
        }

        if mutated {
            tree.node_mut(parent)?.children = new_children;
            change.touched.push(parent);
        }
        Ok(())
    }
}
