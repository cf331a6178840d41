mod common;

use common::*;
use jagtree::activity::Activity;
use jagtree::store::ActivityStore;
use jagtree::sync::{SyncError, TreeSync};
use jagtree::types::SlotId;

#[test]
fn build_instantiates_one_node_per_slot() {
    let mut store = ActivityStore::new();
    let step = leaf_activity(&mut store, "urn:test:step");
    // Two slots for the same URN.
    let mission = parent_activity(&mut store, "urn:test:mission", &[&step, &step]);

    let sync = TreeSync::new(&store);
    let outcome = sync.build_tree(&mission, true).unwrap();
    assert_eq!(outcome.tree.len(), 3);

    let root = outcome.tree.root_id();
    let children = outcome.tree.child_ids(root);
    assert_eq!(children.len(), 2);
    let slots: Vec<Option<SlotId>> = children
        .iter()
        .map(|c| outcome.tree.get(*c).unwrap().slot_id())
        .collect();
    assert_eq!(slots, vec![Some(SlotId(0)), Some(SlotId(1))]);
    for child in children {
        let node = outcome.tree.get(*child).unwrap();
        assert_eq!(node.parent_id(), Some(root));
        assert_eq!(node.project_id(), root);
        assert_eq!(node.urn(), &step);
    }
}

#[test]
fn build_reports_missing_child_urns_without_aborting() {
    let mut store = ActivityStore::new();
    let known = leaf_activity(&mut store, "urn:test:known");
    let ghost = urn("urn:test:ghost");
    let mut mission = Activity::new(urn("urn:test:mission"), "Mission");
    mission.add_child(known.clone());
    mission.add_child(ghost.clone());
    let mission = store.insert(mission).unwrap();

    let sync = TreeSync::new(&store);
    let outcome = sync.build_tree(&mission.urn, true).unwrap();
    assert_eq!(outcome.tree.len(), 3);
    assert_eq!(outcome.missing.len(), 1);
    assert_eq!(outcome.missing[0].urn, ghost);

    let ghost_node = outcome.tree.get(outcome.missing[0].node).unwrap();
    assert!(ghost_node.activity().is_none());
    assert!(!ghost_node.is_expanded);
}

#[test]
fn build_fails_only_for_missing_root() {
    let store = ActivityStore::new();
    let sync = TreeSync::new(&store);
    let err = sync.build_tree(&urn("urn:test:absent"), true).unwrap_err();
    assert!(matches!(err, SyncError::UnknownActivity { .. }));
}

#[test]
fn update_adds_new_child_slots_to_every_instance() {
    let mut store = ActivityStore::new();
    let old = leaf_activity(&mut store, "urn:test:old");
    let fresh = leaf_activity(&mut store, "urn:test:fresh");
    let team = parent_activity(&mut store, "urn:test:team", &[&old]);
    let mission = parent_activity(&mut store, "urn:test:mission", &[&team, &team]);

    let mut tree = build_derived(&store, &mission);
    assert_eq!(tree.len(), 5);

    // Grow `team` by one slot and propagate.
    let mut changed = store.resolve(&team).unwrap().as_ref().clone();
    changed.add_child(fresh.clone());
    let changed = store.insert(changed).unwrap();

    let sync = TreeSync::new(&store);
    let change = sync
        .update_tree_with_activity_change(&changed, &mut tree)
        .unwrap();
    sync.derive_project_data(&mut tree).unwrap();

    assert_eq!(change.attached.len(), 2);
    assert!(change.detached.is_empty());
    assert_eq!(tree.len(), 7);

    // Every instance's child-slot set now matches the Activity exactly.
    let root = tree.root_id();
    for team_node in tree.child_ids(root).to_vec() {
        let pairs: Vec<_> = tree
            .child_ids(team_node)
            .iter()
            .map(|c| {
                let n = tree.get(*c).unwrap();
                (n.slot_id().unwrap(), n.urn().clone())
            })
            .collect();
        assert_eq!(
            pairs,
            vec![(SlotId(0), old.clone()), (SlotId(1), fresh.clone())]
        );
    }
}

#[test]
fn update_leaves_unrelated_subtrees_untouched() {
    let mut store = ActivityStore::new();
    let old = leaf_activity(&mut store, "urn:test:old");
    let fresh = leaf_activity(&mut store, "urn:test:fresh");
    let team = parent_activity(&mut store, "urn:test:team", &[&old]);
    let bystander = parent_activity(&mut store, "urn:test:bystander", &[&old]);
    let mission = parent_activity(&mut store, "urn:test:mission", &[&team, &bystander]);

    let mut tree = build_derived(&store, &mission);

    let root = tree.root_id();
    let bystander_node = tree.child_ids(root)[1];
    let bystander_children_before = tree.child_ids(bystander_node).to_vec();

    let mut changed = store.resolve(&team).unwrap().as_ref().clone();
    changed.add_child(fresh);
    let changed = store.insert(changed).unwrap();
    let sync = TreeSync::new(&store);
    let change = sync
        .update_tree_with_activity_change(&changed, &mut tree)
        .unwrap();

    assert_eq!(change.attached.len(), 1);
    assert!(!change.touched.contains(&bystander_node));
    assert_eq!(
        tree.child_ids(bystander_node),
        bystander_children_before.as_slice()
    );
}

#[test]
fn update_removes_by_slot_and_promotes_orphans() {
    let mut store = ActivityStore::new();
    let step = leaf_activity(&mut store, "urn:test:step");
    // Two slots sharing one URN; removal must pick the right slot.
    let mission = parent_activity(&mut store, "urn:test:mission", &[&step, &step]);

    let mut tree = build_derived(&store, &mission);
    let root = tree.root_id();
    let second = tree.find_child_by_slot(root, SlotId(1)).unwrap();

    let mut changed = store.resolve(&mission).unwrap().as_ref().clone();
    changed.remove_child(SlotId(1)).unwrap();
    let changed = store.insert(changed).unwrap();

    let sync = TreeSync::new(&store);
    let mut change = sync
        .update_tree_with_activity_change(&changed, &mut tree)
        .unwrap();
    sync.derive_project_data(&mut tree).unwrap();

    assert_eq!(change.detached, vec![second]);
    assert_eq!(tree.len(), 2);
    assert_eq!(
        tree.find_child_by_slot(root, SlotId(0)).is_some(),
        true,
        "slot 0 must survive"
    );

    // The orphan is a standalone project now.
    let mut orphan = change.promoted.pop().unwrap();
    sync.derive_project_data(&mut orphan).unwrap();
    let orphan_root = orphan.root_id();
    assert_eq!(orphan_root, second);
    let node = orphan.get(orphan_root).unwrap();
    assert_eq!(node.parent_id(), None);
    assert_eq!(node.project_id(), second);
    assert_eq!(node.tree_depth(), 0);
}

#[test]
fn detach_updates_former_siblings_counts() {
    let mut store = ActivityStore::new();
    let x = leaf_activity(&mut store, "urn:test:x");
    let y = leaf_activity(&mut store, "urn:test:y");
    let inner = parent_activity(&mut store, "urn:test:inner", &[&x, &y]);
    let mission = parent_activity(&mut store, "urn:test:mission", &[&inner, &x]);

    let sync = TreeSync::new(&store);
    let mut tree = build_derived(&store, &mission);
    let root = tree.root_id();
    assert_eq!(tree.get(root).unwrap().leaf_count(), 3);

    let inner_node = tree.find_child_by_slot(root, SlotId(0)).unwrap();
    let change = sync.detach_node(&mut tree, inner_node).unwrap();
    sync.derive_project_data(&mut tree).unwrap();

    assert_eq!(tree.get(root).unwrap().leaf_count(), 1);
    assert_eq!(tree.len(), 2);

    let orphan = &change.promoted[0];
    assert_eq!(orphan.root_id(), inner_node);
    assert_eq!(orphan.get(inner_node).unwrap().project_id(), inner_node);
    assert_eq!(orphan.len(), 3);
}

#[test]
fn full_resynchronize_applies_diff_at_every_node() {
    let mut store = ActivityStore::new();
    let a = leaf_activity(&mut store, "urn:test:a");
    let b = leaf_activity(&mut store, "urn:test:b");
    let team = parent_activity(&mut store, "urn:test:team", &[&a]);
    let mission = parent_activity(&mut store, "urn:test:mission", &[&team]);

    let mut tree = build_derived(&store, &mission);
    assert_eq!(tree.len(), 3);

    // Both definitions change behind the tree's back (external reload).
    let mut team_changed = store.resolve(&team).unwrap().as_ref().clone();
    team_changed.add_child(b.clone());
    store.insert(team_changed).unwrap();
    let mut mission_changed = store.resolve(&mission).unwrap().as_ref().clone();
    mission_changed.add_child(b.clone());
    store.insert(mission_changed).unwrap();

    let sync = TreeSync::new(&store);
    let change = sync.full_resynchronize(&mut tree).unwrap();
    sync.derive_project_data(&mut tree).unwrap();

    assert_eq!(change.attached.len(), 2);
    assert_eq!(tree.len(), 5);
}

#[test]
fn attach_child_rejects_occupied_slot() {
    let mut store = ActivityStore::new();
    let step = leaf_activity(&mut store, "urn:test:step");
    let extra = leaf_activity(&mut store, "urn:test:extra");
    let mission = parent_activity(&mut store, "urn:test:mission", &[&step]);

    let sync = TreeSync::new(&store);
    let mut tree = build_derived(&store, &mission);
    let root = tree.root_id();

    let err = sync
        .attach_child(&mut tree, root, &extra, SlotId(0))
        .unwrap_err();
    assert!(matches!(err, SyncError::SlotOccupied { .. }));

    let change = sync
        .attach_child(&mut tree, root, &extra, SlotId(1))
        .unwrap();
    assert_eq!(change.attached.len(), 1);
    assert_eq!(tree.len(), 3);
}
