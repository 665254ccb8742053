//! Scroll DOM - Document Object Model
//!
//! Arena-based DOM tree that paged content is appended into. Nodes are
//! addressed by [`NodeId`] indices rather than pointers, and detached
//! [`Fragment`]s carry parsed page content until it is imported.

mod node;
mod tree;
mod fragment;
mod geometry;

pub use node::{Node, NodeData, ElementData, TextData, Attribute};
pub use tree::{DomTree, Children, DomError, DomResult};
pub use fragment::Fragment;
pub use geometry::{DOMRect, Viewport};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID
    pub const ROOT: NodeId = NodeId(0);

    /// Sentinel for "no node" in sibling/parent links
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Whether this ID points at a node
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
