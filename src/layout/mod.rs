//! Timeline Layout Engine.
//!
//! Assigns every LiveNode an abstract position and size consistent with
//! both tree structure and dependency ordering. Box dimensions come from
//! the renderer through the [`SizeOracle`]; this engine only adds and
//! compares them — it draws nothing and performs no pixel rounding.
//!
//! There is no incremental layout state: every call to
//! [`TimelineLayout::compute`] is a pure recomputation over the tree, run
//! after any structural or dimension change (and always after a derive
//! pass, so dependency data is current).
//!
//! Strategy per node:
//! - leaves, collapsed nodes, and the trivial single-child case under a
//!   `none` connector get a simple label-sized box
//! - `sequential` children stack as a row, `parallel` children as a
//!   column — their order is fixed, not data-dependent
//! - `none` children with bindings are dependency-routed (see
//!   [`timeline`]): left-to-right by dependency slot, stacked per slot

mod timeline;

use rustc_hash::FxHashMap;

use crate::project::ProjectTree;
use crate::types::{ExecutionMode, Extent, NodeId};

/// Box-size oracle supplied by the renderer.
///
/// Queried once per node per layout pass for the node's label-sized box.
pub trait SizeOracle {
    fn size_of(&self, node: NodeId) -> Extent;
}

/// Oracle giving every node the same box. Handy for tests and previews.
#[derive(Clone, Copy, Debug)]
pub struct UniformOracle {
    pub extent: Extent,
}

impl UniformOracle {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            extent: Extent::new(width, height),
        }
    }
}

impl SizeOracle for UniformOracle {
    fn size_of(&self, _node: NodeId) -> Extent {
        self.extent
    }
}

/// Spacing parameters for the layout pass.
#[derive(Clone, Copy, Debug)]
pub struct LayoutConfig {
    /// Horizontal gap between a producer and what it feeds.
    pub inner_margin: f64,
    /// Standard row height: node headers and empty route slots.
    pub row_height: f64,
    /// Vertical gap between stacked siblings.
    pub row_spacing: f64,
    /// Inset between a composite node's edge and its content.
    pub padding: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            inner_margin: 10.0,
            row_height: 30.0,
            row_spacing: 6.0,
            padding: 8.0,
        }
    }
}

impl LayoutConfig {
    #[must_use]
    pub fn with_inner_margin(mut self, inner_margin: f64) -> Self {
        self.inner_margin = inner_margin;
        self
    }

    #[must_use]
    pub fn with_row_height(mut self, row_height: f64) -> Self {
        self.row_height = row_height;
        self
    }

    #[must_use]
    pub fn with_row_spacing(mut self, row_spacing: f64) -> Self {
        self.row_spacing = row_spacing;
        self
    }

    #[must_use]
    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }
}

/// One node's computed position and size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The computed layout: a frame per visible node.
///
/// Children of collapsed nodes are not laid out and carry no frame.
#[derive(Clone, Debug, Default)]
pub struct LayoutResult {
    frames: FxHashMap<NodeId, Frame>,
}

impl LayoutResult {
    #[must_use]
    pub fn frame(&self, id: NodeId) -> Option<&Frame> {
        self.frames.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Frame)> {
        self.frames.iter().map(|(id, frame)| (*id, frame))
    }

    /// Write the computed positions back onto the tree.
    ///
    /// The only mutation path for `x`/`y` besides user drag.
    pub fn apply(&self, tree: &mut ProjectTree) {
        for (id, frame) in &self.frames {
            if let Some(node) = tree.get_mut(*id) {
                node.x = frame.x;
                node.y = frame.y;
            }
        }
    }
}

/// The layout engine itself: an oracle plus spacing configuration.
pub struct TimelineLayout<'a, O: SizeOracle> {
    oracle: &'a O,
    config: LayoutConfig,
}

impl<'a, O: SizeOracle> TimelineLayout<'a, O> {
    #[must_use]
    pub fn new(oracle: &'a O) -> Self {
        Self {
            oracle,
            config: LayoutConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LayoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Compute a frame for every visible node of `tree`.
    ///
    /// Bottom-up measuring pass (children sized before parents), then a
    /// top-down placement pass translating child offsets into absolute
    /// coordinates, root at the origin. Both passes are iterative over
    /// collected preorder.
    #[must_use]
    pub fn compute(&self, tree: &ProjectTree) -> LayoutResult {
        let order = tree.preorder_ids();

        let mut extents: FxHashMap<NodeId, Extent> = FxHashMap::default();
        let mut offsets: FxHashMap<NodeId, Vec<(NodeId, f64, f64)>> = FxHashMap::default();

        for id in order.iter().rev() {
            let Some(node) = tree.get(*id) else { continue };
            let label = self.oracle.size_of(*id);
            let children = node.children();

            let execution = node
                .activity()
                .map(|activity| activity.connector.execution)
                .unwrap_or_default();

            let composite = node.is_expanded
                && !children.is_empty()
                && !(execution == ExecutionMode::None && children.len() == 1);
            if !composite {
                extents.insert(*id, label);
                continue;
            }

            let (extent, child_offsets) = match execution {
                ExecutionMode::Sequential => self.row_layout(children, label, &extents),
                ExecutionMode::Parallel => self.column_layout(children, label, &extents),
                ExecutionMode::None => {
                    timeline::route_layout(tree, *id, label, &extents, &self.config)
                }
            };
            extents.insert(*id, extent);
            offsets.insert(*id, child_offsets);
        }

        let mut result = LayoutResult::default();
        let root = tree.root_id();
        if let Some(extent) = extents.get(&root) {
            result.frames.insert(
                root,
                Frame {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width,
                    height: extent.height,
                },
            );
        }
        for id in &order {
            let Some(parent_frame) = result.frames.get(id).copied() else {
                continue;
            };
            let Some(child_offsets) = offsets.get(id) else {
                continue;
            };
            for (child, dx, dy) in child_offsets {
                let extent = extents.get(child).copied().unwrap_or_default();
                result.frames.insert(
                    *child,
                    Frame {
                        x: parent_frame.x + dx,
                        y: parent_frame.y + dy,
                        width: extent.width,
                        height: extent.height,
                    },
                );
            }
        }
        result
    }

    /// Sequential connector: children in one row, left to right.
    fn row_layout(
        &self,
        children: &[NodeId],
        label: Extent,
        extents: &FxHashMap<NodeId, Extent>,
    ) -> (Extent, Vec<(NodeId, f64, f64)>) {
        let c = &self.config;
        let mut child_offsets = Vec::with_capacity(children.len());
        let mut cursor = c.padding;
        let mut tallest = 0.0f64;
        for child in children {
            let extent = extents.get(child).copied().unwrap_or_default();
            child_offsets.push((*child, cursor, c.row_height + c.padding));
            cursor += extent.width + c.inner_margin;
            tallest = tallest.max(extent.height);
        }
        let content_width = cursor - c.inner_margin + c.padding;
        let extent = Extent::new(
            label.width.max(content_width),
            c.row_height + tallest + 2.0 * c.padding,
        );
        (extent, child_offsets)
    }

    /// Parallel connector: children in one column, top to bottom.
    fn column_layout(
        &self,
        children: &[NodeId],
        label: Extent,
        extents: &FxHashMap<NodeId, Extent>,
    ) -> (Extent, Vec<(NodeId, f64, f64)>) {
        let c = &self.config;
        let mut child_offsets = Vec::with_capacity(children.len());
        let mut cursor = c.row_height + c.padding;
        let mut widest = 0.0f64;
        for child in children {
            let extent = extents.get(child).copied().unwrap_or_default();
            child_offsets.push((*child, c.padding, cursor));
            cursor += extent.height + c.row_spacing;
            widest = widest.max(extent.width);
        }
        let content_height = cursor - c.row_spacing + c.padding;
        let extent = Extent::new(
            label.width.max(widest + 2.0 * c.padding),
            label.height.max(content_height),
        );
        (extent, child_offsets)
    }
}
