//! Document fragment - detached node collection
//!
//! A fragment owns a small arena of its own whose root's children are the
//! fragment's top-level nodes. Importing a fragment copies it, so the same
//! fragment can be appended any number of times and cached fragments are never
//! emptied by use. Clones share storage until one of them is mutated.

use std::rc::Rc;

use crate::{DomTree, NodeId};

/// Detached, ordered node collection
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    tree: Rc<DomTree>,
}

impl Fragment {
    /// Create an empty fragment
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a tree whose root children form the fragment
    pub fn from_tree(tree: DomTree) -> Self {
        Self { tree: Rc::new(tree) }
    }

    /// Backing tree (top-level nodes are children of [`NodeId::ROOT`])
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Mutable access; copies the arena first if it is shared
    pub fn tree_mut(&mut self) -> &mut DomTree {
        Rc::make_mut(&mut self.tree)
    }

    /// Top-level node IDs in order
    pub fn roots(&self) -> Vec<NodeId> {
        self.tree.child_ids(NodeId::ROOT)
    }

    /// Number of top-level nodes
    pub fn len(&self) -> usize {
        self.tree.children(NodeId::ROOT).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an element (optionally holding text) at the top level
    pub fn append_element(&mut self, tag: &str, text: Option<&str>) -> NodeId {
        self.insert_element(None, tag, text)
    }

    /// Insert an element at top-level position `index` (clamped to the end)
    pub fn insert_element_at(&mut self, index: usize, tag: &str, text: Option<&str>) -> NodeId {
        let reference = self.roots().get(index).copied();
        self.insert_element(reference, tag, text)
    }

    fn insert_element(&mut self, reference: Option<NodeId>, tag: &str, text: Option<&str>) -> NodeId {
        let tree = self.tree_mut();
        let id = tree.create_element(tag);
        if let Some(text) = text {
            let text_id = tree.create_text(text);
            // both nodes were just created, linking cannot fail
            let _ = tree.append_child(id, text_id);
        }
        let _ = tree.insert_before(NodeId::ROOT, id, reference);
        id
    }

    /// Text of the whole fragment
    pub fn text_content(&self) -> String {
        self.tree.text_content(NodeId::ROOT)
    }

    /// Whether two fragments share storage
    pub fn ptr_eq(&self, other: &Fragment) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.tree == *other.tree
    }
}
