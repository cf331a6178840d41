mod common;

use common::*;
use jagtree::activity::Activity;
use jagtree::routes::routes_from_bindings;
use jagtree::store::ActivityStore;
use jagtree::sync::TreeSync;
use jagtree::types::NodeId;
use proptest::prelude::*;

/// Build a two-level store: the mission has one child per entry of
/// `grandchildren`, and child `i` has `grandchildren[i]` leaf children of
/// its own. `edges` become forward bindings (`i -> j`, `i < j`) among the
/// mission's children, so the sibling graph is acyclic by construction.
fn arbitrary_store(
    grandchildren: &[usize],
    edges: &[(usize, usize)],
) -> (ActivityStore, jagtree::types::Urn) {
    let mut store = ActivityStore::new();
    let mut child_urns = Vec::new();
    for (i, count) in grandchildren.iter().enumerate() {
        let child_urn = urn(&format!("urn:prop:c{i}"));
        let mut child = Activity::new(child_urn.clone(), format!("c{i}"));
        for k in 0..*count {
            let leaf = urn(&format!("urn:prop:c{i}:g{k}"));
            store
                .insert(Activity::new(leaf.clone(), format!("g{k}")))
                .unwrap();
            child.add_child(leaf);
        }
        store.insert(child).unwrap();
        child_urns.push(child_urn);
    }
    let mission = urn("urn:prop:mission");
    let mut root = Activity::new(mission.clone(), "mission");
    for child_urn in &child_urns {
        root.add_child(child_urn.clone());
    }
    store.insert(root).unwrap();
    for (i, j) in edges {
        if i < j && *j < child_urns.len() {
            bind(&mut store, &mission, &child_urns[*i], &child_urns[*j]);
        }
    }
    (store, mission)
}

proptest! {
    #[test]
    fn derive_is_idempotent_on_arbitrary_shapes(
        grandchildren in proptest::collection::vec(0usize..4, 0..5),
        edges in proptest::collection::vec((0usize..5, 0usize..5), 0..8),
    ) {
        let (store, mission) = arbitrary_store(&grandchildren, &edges);
        let sync = TreeSync::new(&store);
        let mut tree = build_derived(&store, &mission);

        let snapshot = |tree: &jagtree::project::ProjectTree| -> Vec<(NodeId, usize, usize, Vec<NodeId>, usize)> {
            tree.preorder()
                .map(|id| {
                    let n = tree.get(id).unwrap();
                    (
                        id,
                        n.tree_depth(),
                        n.leaf_count(),
                        n.provides_output_to().to_vec(),
                        n.dependency_slot(),
                    )
                })
                .collect()
        };

        let first = snapshot(&tree);
        sync.derive_project_data(&mut tree).unwrap();
        prop_assert_eq!(first, snapshot(&tree));
    }

    #[test]
    fn leaf_counts_sum_over_the_frontier(
        grandchildren in proptest::collection::vec(0usize..4, 0..5),
    ) {
        let (store, mission) = arbitrary_store(&grandchildren, &[]);
        let tree = build_derived(&store, &mission);

        let expected: usize = if grandchildren.is_empty() {
            1
        } else {
            grandchildren.iter().map(|g| (*g).max(1)).sum()
        };
        prop_assert_eq!(tree.get(tree.root_id()).unwrap().leaf_count(), expected);
    }

    #[test]
    fn dependency_slots_never_decrease_along_routes(
        grandchildren in proptest::collection::vec(0usize..3, 2..5),
        edges in proptest::collection::vec((0usize..5, 0usize..5), 1..8),
    ) {
        let (store, mission) = arbitrary_store(&grandchildren, &edges);
        let tree = build_derived(&store, &mission);

        let set = routes_from_bindings(&tree, tree.root_id());
        for route in &set.routes {
            for pair in route.nodes.windows(2) {
                prop_assert!(set.slot(pair[0]) < set.slot(pair[1]));
            }
        }
    }
}
