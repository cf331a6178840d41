//! Dependency router: enumerates data-flow paths among an Activity's
//! children.
//!
//! Bindings declare producer/consumer edges between sibling LiveNodes.
//! The router turns those edges into the full set of source-to-sink
//! [`Route`]s and assigns each sibling its dependency slot — the deepest
//! position it occupies in any chain — which orders layout left-to-right.
//!
//! Pure functions over a tree snapshot; no state is kept between calls.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::project::ProjectTree;
use crate::types::NodeId;

/// One producer→…→consumer chain among siblings.
///
/// Ephemeral: recomputed on demand and consumed by layout. `shifted`
/// places each member at its dependency slot (empty slots where another
/// route's member occupies the depth); `max_height` is filled in by the
/// layout engine while sizing fan groups.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub nodes: Vec<NodeId>,
    pub shifted: Vec<Option<NodeId>>,
    pub max_height: f64,
}

impl Route {
    /// First node of the chain (its source).
    #[must_use]
    pub fn start(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Last node of the chain (its sink).
    #[must_use]
    pub fn end(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

/// All routes under one parent, plus the shared slot assignment.
#[derive(Clone, Debug, Default)]
pub struct RouteSet {
    pub routes: Vec<Route>,
    slots: FxHashMap<NodeId, usize>,
}

impl RouteSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The dependency slot of `id`; nodes outside every route sit at 0.
    #[must_use]
    pub fn slot(&self, id: NodeId) -> usize {
        self.slots.get(&id).copied().unwrap_or(0)
    }

    /// Number of occupied depth slots.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.slots.values().max().map_or(0, |max| max + 1)
    }

    /// Unique nodes per depth slot, in route visitation order.
    #[must_use]
    pub fn columns(&self) -> Vec<Vec<NodeId>> {
        let mut columns: Vec<Vec<NodeId>> = vec![Vec::new(); self.depth()];
        let mut placed: FxHashSet<NodeId> = FxHashSet::default();
        for route in &self.routes {
            for node in &route.nodes {
                if placed.insert(*node) {
                    columns[self.slot(*node)].push(*node);
                }
            }
        }
        columns
    }
}

/// Producer→consumer pairs among the direct children of `node`, derived
/// from its Activity's bindings.
///
/// A binding names URNs, so a producer feeds every direct sibling
/// instantiating the consumer URN. Binding endpoints on the parent itself
/// are not sibling edges. Pair order follows binding order; duplicates
/// collapse.
#[must_use]
pub fn sibling_dependencies(tree: &ProjectTree, node: NodeId) -> Vec<(NodeId, NodeId)> {
    let Some(parent) = tree.get(node) else {
        return Vec::new();
    };
    let Some(activity) = parent.activity() else {
        return Vec::new();
    };

    let children: Vec<NodeId> = parent.children().to_vec();
    let mut pairs = Vec::new();
    let mut seen: FxHashSet<(NodeId, NodeId)> = FxHashSet::default();
    for binding in &activity.bindings {
        if binding.from.urn == activity.urn || binding.to.urn == activity.urn {
            continue;
        }
        for producer in &children {
            let Some(producer_node) = tree.get(*producer) else {
                continue;
            };
            if producer_node.urn() != &binding.from.urn {
                continue;
            }
            for consumer in &children {
                if producer == consumer {
                    continue;
                }
                let Some(consumer_node) = tree.get(*consumer) else {
                    continue;
                };
                if consumer_node.urn() == &binding.to.urn && seen.insert((*producer, *consumer)) {
                    pairs.push((*producer, *consumer));
                }
            }
        }
    }
    pairs
}

/// Enumerate every source-to-sink route through the sibling dependency
/// graph under `node`.
///
/// A child that is not the consumer side of any sibling edge starts a
/// route; a child with nothing left to feed ends one. Backtracking DFS
/// over an explicit frame stack, so one producer feeding several
/// consumers yields multiple routes sharing a prefix. Children outside
/// every binding become singleton routes so layout still places them.
#[must_use]
pub fn routes_from_bindings(tree: &ProjectTree, node: NodeId) -> RouteSet {
    let children: Vec<NodeId> = tree.child_ids(node).to_vec();
    let pairs = sibling_dependencies(tree, node);

    let mut edges: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    let mut consumers: FxHashSet<NodeId> = FxHashSet::default();
    for (producer, consumer) in &pairs {
        edges.entry(*producer).or_default().push(*consumer);
        consumers.insert(*consumer);
    }

    let mut routes = Vec::new();
    for source in children.iter().filter(|child| !consumers.contains(child)) {
        collect_routes(*source, &edges, &mut routes);
    }

    let mut set = RouteSet {
        routes,
        slots: FxHashMap::default(),
    };
    dependency_shift_right(&mut set);
    set
}

/// Backtracking DFS from one source. Frames carry (node, next successor
/// index, spawned-a-deeper-path); a frame that exhausts its successors
/// without ever descending is a sink, and the frame stack at that moment
/// is one complete route.
fn collect_routes(
    source: NodeId,
    edges: &FxHashMap<NodeId, Vec<NodeId>>,
    routes: &mut Vec<Route>,
) {
    let mut frames: Vec<(NodeId, usize, bool)> = vec![(source, 0, false)];
    let mut on_path: FxHashSet<NodeId> = FxHashSet::default();
    on_path.insert(source);

    while let Some(frame) = frames.last().copied() {
        let (current, mut next_index, descended) = frame;
        let successors = edges.get(&current).map(Vec::as_slice).unwrap_or(&[]);

        let mut advance = None;
        while next_index < successors.len() {
            let candidate = successors[next_index];
            next_index += 1;
            // Skip members already on the path; a malformed binding loop
            // must not hang the enumeration.
            if !on_path.contains(&candidate) {
                advance = Some(candidate);
                break;
            }
        }

        match advance {
            Some(next) => {
                if let Some(top) = frames.last_mut() {
                    top.1 = next_index;
                    top.2 = true;
                }
                frames.push((next, 0, false));
                on_path.insert(next);
            }
            None => {
                if !descended {
                    let nodes: Vec<NodeId> = frames.iter().map(|f| f.0).collect();
                    routes.push(Route {
                        nodes,
                        shifted: Vec::new(),
                        max_height: 0.0,
                    });
                }
                on_path.remove(&current);
                frames.pop();
            }
        }
    }
}

/// Assign each routed node its deepest observed position across all
/// routes, then rebuild every route's `shifted` array around the final
/// slots.
///
/// A node shared by several chains must never be drawn before anything
/// that feeds it in any of them.
pub fn dependency_shift_right(set: &mut RouteSet) {
    set.slots.clear();
    for route in &set.routes {
        for (index, node) in route.nodes.iter().enumerate() {
            let slot = set.slots.entry(*node).or_insert(index);
            if *slot < index {
                *slot = index;
            }
        }
    }
    let slots = set.slots.clone();
    for route in &mut set.routes {
        // The deepest member bounds the span; with malformed binding
        // loops that is not always the route's last node.
        let span = route
            .nodes
            .iter()
            .filter_map(|node| slots.get(node))
            .max()
            .map_or(0, |slot| slot + 1);
        let mut shifted: Vec<Option<NodeId>> = vec![None; span];
        for node in &route.nodes {
            if let Some(slot) = slots.get(node) {
                shifted[*slot] = Some(*node);
            }
        }
        route.shifted = shifted;
    }
}
