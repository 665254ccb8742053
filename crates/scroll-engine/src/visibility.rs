//! Visibility
//!
//! The "near the bottom" test that gates loading more pages, and a stacked
//! block layout that answers it for hosts without a layout engine.

use std::cell::Cell;

use scroll_dom::{DOMRect, DomTree, NodeData, NodeId, Viewport};

/// Geometry source for the trigger layer.
///
/// The DOM is borrowed for the duration of each call, so implementations
/// must not try to mutate it.
pub trait GeometryProbe {
    /// Box of `node` relative to the viewport's top-left corner
    fn bounding_client_rect(&self, dom: &DomTree, node: NodeId) -> DOMRect;

    /// Current viewport
    fn viewport(&self) -> Viewport;
}

/// Whether the tracked box's bottom edge is within `threshold` pixels of the
/// viewport's bottom edge (or above it).
#[inline]
pub fn near_bottom(rect: &DOMRect, viewport: &Viewport, threshold: f64) -> bool {
    rect.bottom() - threshold < viewport.height
}

/// Vertical block layout.
///
/// Children stack top to bottom from a fixed document offset. An element's
/// height is its `data-height` attribute when present (plain number or
/// `px`), otherwise the sum of its children; a non-blank text run is one
/// line. Empty placeholders therefore take no space.
#[derive(Debug)]
pub struct StackedLayout {
    top: f64,
    line_height: f64,
    viewport: Cell<Viewport>,
}

impl StackedLayout {
    /// Layout whose tracked box starts `top` px into the document
    pub fn new(top: f64, viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            top,
            line_height: 20.0,
            viewport: Cell::new(Viewport::new(0.0, 0.0, viewport_width, viewport_height)),
        }
    }

    pub fn with_line_height(mut self, line_height: f64) -> Self {
        self.line_height = line_height;
        self
    }

    /// Scroll to an absolute offset (clamped at the top)
    pub fn scroll_to(&self, y: f64) {
        let mut viewport = self.viewport.get();
        viewport.y = y.max(0.0);
        self.viewport.set(viewport);
    }

    /// Scroll by a relative amount
    pub fn scroll_by(&self, dy: f64) {
        self.scroll_to(self.scroll_y() + dy);
    }

    /// Current scroll offset
    pub fn scroll_y(&self) -> f64 {
        self.viewport.get().y
    }

    /// Change the visible size
    pub fn resize(&self, width: f64, height: f64) {
        let mut viewport = self.viewport.get();
        viewport.width = width;
        viewport.height = height;
        self.viewport.set(viewport);
    }

    /// Laid-out height of a single node
    pub fn node_height(&self, dom: &DomTree, node: NodeId) -> f64 {
        match dom.get(node).map(|n| &n.data) {
            Some(NodeData::Text(text)) if !text.content.trim().is_empty() => self.line_height,
            Some(NodeData::Element(elem)) => elem.get_attr("data-height")
                .and_then(parse_px)
                .unwrap_or_else(|| self.content_height(dom, node)),
            Some(NodeData::Document) => self.content_height(dom, node),
            _ => 0.0,
        }
    }

    /// Sum of the children's heights
    pub fn content_height(&self, dom: &DomTree, node: NodeId) -> f64 {
        dom.children(node)
            .map(|(child, _)| self.node_height(dom, child))
            .sum()
    }
}

impl GeometryProbe for StackedLayout {
    fn bounding_client_rect(&self, dom: &DomTree, node: NodeId) -> DOMRect {
        let viewport = self.viewport.get();
        DOMRect::from_xywh(
            -viewport.x,
            self.top - viewport.y,
            viewport.width,
            self.content_height(dom, node),
        )
    }

    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }
}

fn parse_px(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").trim().parse().ok()
}
