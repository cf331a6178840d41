mod common;

use std::time::Duration;

use common::*;
use jagtree::events::{Event, EventBus, MemorySink, events_from_change_set};
use jagtree::store::ActivityStore;
use jagtree::sync::TreeSync;
use jagtree::types::SlotId;

#[test]
fn change_set_translates_to_events_in_change_order() {
    let mut store = ActivityStore::new();
    let old = leaf_activity(&mut store, "urn:test:old");
    let fresh = leaf_activity(&mut store, "urn:test:fresh");
    let mission = parent_activity(&mut store, "urn:test:mission", &[&old]);

    let mut tree = build_derived(&store, &mission);
    let root = tree.root_id();
    let old_node = tree.find_child_by_slot(root, SlotId(0)).unwrap();

    // Replace the only child: one attach, one detach.
    let mut changed = store.resolve(&mission).unwrap().as_ref().clone();
    changed.remove_child(SlotId(0)).unwrap();
    changed.add_child(fresh);
    let changed = store.insert(changed).unwrap();
    let sync = TreeSync::new(&store);
    let change = sync
        .update_tree_with_activity_change(&changed, &mut tree)
        .unwrap();

    let events = events_from_change_set(root, &change);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::NodeAttached { project, .. } if project == root));
    assert!(
        matches!(events[1], Event::NodeDetached { node, project } if node == old_node && project == root)
    );
}

#[test]
fn event_kinds_are_stable_labels() {
    let (store, mission, ..) = chained_mission();
    let tree = build_derived(&store, &mission);
    let root = tree.root_id();

    assert_eq!(
        Event::ActivityChanged { urn: mission }.kind(),
        "activity-changed"
    );
    assert_eq!(
        Event::LayoutComputed {
            project: root,
            nodes: tree.len(),
        }
        .kind(),
        "layout-computed"
    );
}

#[test]
fn events_serialize_with_kind_tag() {
    let (store, mission, ..) = chained_mission();
    let tree = build_derived(&store, &mission);

    let event = Event::LayoutComputed {
        project: tree.root_id(),
        nodes: tree.len(),
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["kind"], "layout-computed");
    assert_eq!(value["nodes"], 4);

    let json = event.to_json_value();
    assert_eq!(json["kind"], "layout-computed");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn bus_broadcasts_to_sinks() {
    let (store, mission, ..) = chained_mission();
    let tree = build_derived(&store, &mission);
    let root = tree.root_id();

    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    bus.listen();

    let sender = bus.sender();
    sender
        .send(Event::ActivityChanged {
            urn: mission.clone(),
        })
        .unwrap();
    sender
        .send(Event::LayoutComputed {
            project: root,
            nodes: tree.len(),
        })
        .unwrap();

    // Drain before asserting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    bus.shutdown().await;

    let seen = sink.snapshot();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], Event::ActivityChanged { urn: mission });
    assert_eq!(seen[0].kind(), "activity-changed");
}

#[tokio::test]
async fn late_sinks_receive_later_events() {
    let sink_a = MemorySink::new();
    let bus = EventBus::with_sink(sink_a.clone());
    bus.listen();

    let (store, mission, ..) = chained_mission();
    let tree = build_derived(&store, &mission);
    let root = tree.root_id();

    bus.sender()
        .send(Event::NodeAttached {
            node: root,
            project: root,
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let sink_b = MemorySink::new();
    bus.add_sink(sink_b.clone());
    bus.sender()
        .send(Event::ActivityChanged { urn: mission })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    bus.shutdown().await;

    assert_eq!(sink_a.snapshot().len(), 2);
    assert_eq!(sink_b.snapshot().len(), 1);
}
