//! Cycle guard for structural edits.
//!
//! Attaching a subtree whose descendants include an ancestor's URN would
//! make expansion non-terminating if that ancestor were ever expanded from
//! the newly attached position. Because the same Activity URN may
//! legitimately appear in unrelated branches of a tree, identity-based
//! checks are insufficient; the guard is URN-reachability-based.

use rustc_hash::FxHashSet;

use crate::project::ProjectTree;
use crate::store::ActivityStore;
use crate::types::{NodeId, Urn};

/// Would attaching an instance of `candidate_child` under
/// `candidate_parent` create an unbounded expansion?
///
/// Computes (a) the set of URNs reachable downward from the candidate
/// child through Activity definitions in the store (inclusive) and (b) the
/// URNs on the path from the candidate parent up to the tree root
/// (inclusive), and returns `true` — reject the edit — iff the two sets
/// intersect.
///
/// Removal never introduces reachability, so orphan promotion needs no
/// guard.
#[must_use]
pub fn loop_detection(
    tree: &ProjectTree,
    candidate_parent: NodeId,
    candidate_child: &Urn,
    store: &ActivityStore,
) -> bool {
    let downward = store.descendant_closure(candidate_child);

    let mut upward: FxHashSet<&Urn> = FxHashSet::default();
    for ancestor in tree.ancestors(candidate_parent) {
        if let Some(node) = tree.get(ancestor) {
            upward.insert(node.urn());
        }
    }

    downward.iter().any(|urn| upward.contains(urn))
}
