//! Dependency-routed placement for `none`-connector children.
//!
//! Horizontal order comes from route accumulation (`earliest possible x`),
//! vertical order from stacking unique nodes per dependency slot, with
//! fan-out/fan-in start and end nodes growing to encompass the branches
//! between them.

use rustc_hash::FxHashMap;

use crate::project::ProjectTree;
use crate::routes::routes_from_bindings;
use crate::types::{Extent, NodeId};

use super::LayoutConfig;

/// Lay out the direct children of `parent` by their dependency routes.
///
/// Returns the parent's extent and each child's offset relative to the
/// parent's top-left corner.
pub(super) fn route_layout(
    tree: &ProjectTree,
    parent: NodeId,
    label: Extent,
    extents: &FxHashMap<NodeId, Extent>,
    config: &LayoutConfig,
) -> (Extent, Vec<(NodeId, f64, f64)>) {
    let mut set = routes_from_bindings(tree, parent);
    let children: Vec<NodeId> = tree.child_ids(parent).to_vec();
    let width_of = |node: NodeId| extents.get(&node).map_or(0.0, |e| e.width);
    let height_of = |node: NodeId| extents.get(&node).map_or(0.0, |e| e.height);

    // Horizontal placement: walk each route accumulating width + margin;
    // a shared node keeps the maximum — it must clear the widest prefix
    // across every route feeding it.
    let mut x: FxHashMap<NodeId, f64> = FxHashMap::default();
    for route in &set.routes {
        let mut acc = 0.0;
        for node in &route.nodes {
            let entry = x.entry(*node).or_insert(0.0);
            if acc > *entry {
                *entry = acc;
            }
            acc += width_of(*node) + config.inner_margin;
        }
    }

    // Vertical sizing: routes sharing a (start, end) pair form a fan
    // group. Depth by depth, sum the distinct occupants (a standard row
    // height stands in where a route has no member at that depth); the
    // tallest depth grows both endpoints so they span their branches.
    let mut apparent: FxHashMap<NodeId, f64> = FxHashMap::default();
    for child in &children {
        apparent.insert(*child, height_of(*child));
    }

    let mut groups: FxHashMap<(NodeId, NodeId), Vec<usize>> = FxHashMap::default();
    for (index, route) in set.routes.iter().enumerate() {
        if let (Some(start), Some(end)) = (route.start(), route.end()) {
            groups.entry((start, end)).or_default().push(index);
        }
    }
    for ((start, end), members) in &groups {
        // A lone route has no parallel branches to span.
        if members.len() < 2 {
            continue;
        }
        let span = members
            .iter()
            .map(|index| set.routes[*index].shifted.len())
            .max()
            .unwrap_or(0);
        let mut tallest = 0.0f64;
        for depth in 0..span {
            let mut occupants: Vec<NodeId> = Vec::new();
            let mut total = 0.0;
            for index in members {
                match set.routes[*index].shifted.get(depth) {
                    Some(Some(node)) => {
                        if !occupants.contains(node) {
                            occupants.push(*node);
                            total += height_of(*node);
                        }
                    }
                    _ => total += config.row_height,
                }
            }
            tallest = tallest.max(total);
        }
        for index in members {
            set.routes[*index].max_height = tallest;
        }
        *apparent.entry(*start).or_insert(0.0) += tallest;
        *apparent.entry(*end).or_insert(0.0) += tallest;
    }

    // Final sweep: stack unique nodes per depth slot in visitation
    // order, one running cursor per slot.
    let mut y: FxHashMap<NodeId, f64> = FxHashMap::default();
    let mut content_height = 0.0f64;
    for column in set.columns() {
        let mut cursor = 0.0;
        for node in column {
            y.insert(node, cursor);
            cursor += apparent.get(&node).copied().unwrap_or(0.0) + config.row_spacing;
        }
        content_height = content_height.max(cursor - config.row_spacing);
    }

    // Children outside every route (possible only with malformed binding
    // loops) still need a place: continue the first slot's stack.
    let mut spill = content_height;
    for child in &children {
        if !y.contains_key(child) {
            spill += config.row_spacing;
            y.insert(*child, spill);
            spill += height_of(*child);
            content_height = content_height.max(spill);
        }
    }

    let mut child_offsets = Vec::with_capacity(children.len());
    let mut content_width = 0.0f64;
    for child in &children {
        let cx = x.get(child).copied().unwrap_or(0.0);
        let cy = y.get(child).copied().unwrap_or(0.0);
        child_offsets.push((
            *child,
            config.padding + cx,
            config.row_height + config.padding + cy,
        ));
        content_width = content_width.max(cx + width_of(*child));
    }

    let extent = Extent::new(
        label.width.max(content_width + 2.0 * config.padding),
        config.row_height + content_height + 2.0 * config.padding,
    );
    (extent, child_offsets)
}
