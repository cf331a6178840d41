//! The derived-data pipeline.
//!
//! Everything a LiveNode carries beyond user-owned state is recomputed
//! here, as a unit, in a fixed order — later steps depend on earlier ones
//! being correct. Any caller that mutates structure must run the full
//! pipeline on the affected tree before it is considered consistent;
//! partial application is undefined behavior. The pipeline is idempotent
//! on an unchanged tree.

use tracing::instrument;

use crate::project::ProjectTree;
use crate::routes::{routes_from_bindings, sibling_dependencies};
use crate::types::NodeId;

use super::{MissingActivity, SyncError, TreeSync};

/// What a derive pass could not resolve.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeriveReport {
    pub missing: Vec<MissingActivity>,
}

impl TreeSync<'_> {
    /// Recompute every derived field of `tree`.
    ///
    /// Fixed order:
    /// 1. parent links (top-down)
    /// 2. activity resolution through the store (top-down)
    /// 3. project id stamping (top-down)
    /// 4. tree depth (top-down, needs 1)
    /// 5. sibling interdependency: `provides_output_to` wiring and
    ///    dependency slots via the router
    /// 6. expected duration roll-up (bottom-up, numeric coercion)
    /// 7. spatial re-sort of children by ascending `y` (stable)
    /// 8. leaf counts (bottom-up, over the final arrangement)
    #[instrument(skip(self, tree), fields(nodes = tree.len()))]
    pub fn derive_project_data(&self, tree: &mut ProjectTree) -> Result<DeriveReport, SyncError> {
        let order = tree.preorder_ids();
        let mut report = DeriveReport::default();

        repopulate_parent(tree, &order)?;
        self.repopulate_activity(tree, &order, &mut report)?;
        repopulate_project(tree, &order)?;
        repopulate_depth(tree, &order)?;
        self.establish_child_interdependency(tree, &order)?;
        repopulate_expected_duration(tree, &order)?;
        resort_children_spatially(tree, &order)?;
        repopulate_leaf_count(tree, &order)?;

        Ok(report)
    }

    /// Step 2: re-resolve each node's Activity by URN, handling the case
    /// where the Activity object itself was replaced in the store.
    fn repopulate_activity(
        &self,
        tree: &mut ProjectTree,
        order: &[NodeId],
        report: &mut DeriveReport,
    ) -> Result<(), SyncError> {
        for id in order {
            let urn = tree.node(*id)?.urn().clone();
            let resolved = self.store().resolve(&urn);
            if resolved.is_none() {
                report.missing.push(MissingActivity {
                    node: *id,
                    urn: urn.clone(),
                });
            }
            tree.node_mut(*id)?.activity = resolved;
        }
        Ok(())
    }

    /// Step 5: wire producer → consumer among each node's direct children
    /// from its Activity's bindings, then assign dependency slots from
    /// the enumerated routes.
    fn establish_child_interdependency(
        &self,
        tree: &mut ProjectTree,
        order: &[NodeId],
    ) -> Result<(), SyncError> {
        for id in order {
            let node = tree.node_mut(*id)?;
            node.provides_output_to.clear();
            node.dependency_slot = 0;
        }
        for id in order {
            let pairs = sibling_dependencies(tree, *id);
            for (producer, consumer) in &pairs {
                tree.node_mut(*producer)?.provides_output_to.push(*consumer);
            }
            if pairs.is_empty() {
                continue;
            }
            let routes = routes_from_bindings(tree, *id);
            for child in tree.child_ids(*id).to_vec() {
                tree.node_mut(child)?.dependency_slot = routes.slot(child);
            }
        }
        Ok(())
    }
}

/// Step 1: each child's `parent_id` is its parent's id; the root has none.
fn repopulate_parent(tree: &mut ProjectTree, order: &[NodeId]) -> Result<(), SyncError> {
    let root = tree.root_id();
    tree.node_mut(root)?.parent_id = None;
    for id in order {
        for child in tree.child_ids(*id).to_vec() {
            tree.node_mut(child)?.parent_id = Some(*id);
        }
    }
    Ok(())
}

/// Step 3: every node in the tree carries the root's id as its project.
fn repopulate_project(tree: &mut ProjectTree, order: &[NodeId]) -> Result<(), SyncError> {
    let project = tree.root_id();
    for id in order {
        tree.node_mut(*id)?.project_id = project;
    }
    Ok(())
}

/// Step 4: `tree_depth = parent.tree_depth + 1`, root 0. Preorder
/// guarantees the parent is settled before its children.
fn repopulate_depth(tree: &mut ProjectTree, order: &[NodeId]) -> Result<(), SyncError> {
    for id in order {
        let depth = match tree.node(*id)?.parent_id() {
            Some(parent) => tree.node(parent)?.tree_depth() + 1,
            None => 0,
        };
        tree.node_mut(*id)?.tree_depth = depth;
    }
    Ok(())
}

/// Step 6: a non-leaf's duration is the sum of its children's; children
/// precede parents in reverse preorder.
fn repopulate_expected_duration(tree: &mut ProjectTree, order: &[NodeId]) -> Result<(), SyncError> {
    for id in order.iter().rev() {
        let children = tree.child_ids(*id).to_vec();
        if children.is_empty() {
            continue;
        }
        let mut total = 0.0;
        for child in children {
            total += tree.node(child)?.expected_duration_value();
        }
        tree.node_mut(*id)?.contextual_expected_duration = Some(total.to_string());
    }
    Ok(())
}

/// Step 7: stable-sort each child list by ascending `y`.
fn resort_children_spatially(tree: &mut ProjectTree, order: &[NodeId]) -> Result<(), SyncError> {
    for id in order.iter().rev() {
        let mut keyed: Vec<(NodeId, f64)> = Vec::new();
        for child in tree.child_ids(*id) {
            keyed.push((*child, tree.node(*child)?.y));
        }
        keyed.sort_by(|a, b| a.1.total_cmp(&b.1));
        tree.node_mut(*id)?.children = keyed.into_iter().map(|(child, _)| child).collect();
    }
    Ok(())
}

/// Step 8: a leaf counts itself; everything else sums its children.
fn repopulate_leaf_count(tree: &mut ProjectTree, order: &[NodeId]) -> Result<(), SyncError> {
    for id in order.iter().rev() {
        let children = tree.child_ids(*id).to_vec();
        let count = if children.is_empty() {
            1
        } else {
            let mut total = 0;
            for child in &children {
                total += tree.node(*child)?.leaf_count();
            }
            total
        };
        tree.node_mut(*id)?.leaf_count = count;
    }
    Ok(())
}
