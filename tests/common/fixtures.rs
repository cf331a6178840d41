#![allow(dead_code)]

use jagtree::activity::{Activity, EndpointRef};
use jagtree::project::ProjectTree;
use jagtree::store::ActivityStore;
use jagtree::sync::TreeSync;
use jagtree::types::{ExecutionMode, Urn};

pub fn urn(s: &str) -> Urn {
    Urn::parse(s).unwrap()
}

/// Insert a childless Activity and return its URN.
pub fn leaf_activity(store: &mut ActivityStore, name: &str) -> Urn {
    let u = urn(name);
    store.insert(Activity::new(u.clone(), name)).unwrap();
    u
}

/// Insert an Activity with the given children (one slot each, in order).
pub fn parent_activity(store: &mut ActivityStore, name: &str, children: &[&Urn]) -> Urn {
    let u = urn(name);
    let mut act = Activity::new(u.clone(), name);
    for child in children {
        act.add_child((*child).clone());
    }
    store.insert(act).unwrap();
    u
}

/// Like [`parent_activity`], with an execution mode.
pub fn parent_activity_with_mode(
    store: &mut ActivityStore,
    name: &str,
    children: &[&Urn],
    mode: ExecutionMode,
) -> Urn {
    let u = urn(name);
    let mut act = Activity::new(u.clone(), name).with_execution(mode);
    for child in children {
        act.add_child((*child).clone());
    }
    store.insert(act).unwrap();
    u
}

/// Add a `from.out -> to.in` binding to an already-stored Activity.
pub fn bind(store: &mut ActivityStore, parent: &Urn, from: &Urn, to: &Urn) {
    let mut act = store.resolve(parent).unwrap().as_ref().clone();
    act.add_binding(
        EndpointRef::new(from.clone(), "out"),
        EndpointRef::new(to.clone(), "in"),
    )
    .unwrap();
    store.insert(act).unwrap();
}

/// Build a tree from `root` and run the full derive pipeline on it.
pub fn build_derived(store: &ActivityStore, root: &Urn) -> ProjectTree {
    let sync = TreeSync::new(store);
    let mut outcome = sync.build_tree(root, true).unwrap();
    assert!(outcome.missing.is_empty(), "fixture store should be warm");
    sync.derive_project_data(&mut outcome.tree).unwrap();
    outcome.tree
}

/// A store with three leaves `a`, `b`, `c` under `mission`, bound
/// `a -> b -> c`. Returns (store, mission, a, b, c).
pub fn chained_mission() -> (ActivityStore, Urn, Urn, Urn, Urn) {
    let mut store = ActivityStore::new();
    let a = leaf_activity(&mut store, "urn:test:a");
    let b = leaf_activity(&mut store, "urn:test:b");
    let c = leaf_activity(&mut store, "urn:test:c");
    let mission = parent_activity(&mut store, "urn:test:mission", &[&a, &b, &c]);
    bind(&mut store, &mission, &a, &b);
    bind(&mut store, &mission, &b, &c);
    (store, mission, a, b, c)
}
