//! DOM Tree (arena-based allocation)
//!
//! Core node manipulation: appendChild, insertBefore, removeChild, and the
//! fragment import used to swap a placeholder for real content in place.
//! Detached nodes stay in the arena; the tree never frees slots.

use crate::{Fragment, Node, NodeData, NodeId};

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NotFound(NodeId),

    #[error("Hierarchy request error: {child} cannot be inserted into {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("Node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
}

/// Arena-based DOM tree for memory efficiency
#[derive(Debug, Clone, PartialEq)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a tree holding only the document root
    pub fn new() -> Self {
        Self { nodes: vec![Node::document()] }
    }

    /// Root (document) node
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Number of nodes in the arena, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the arena holds nothing but the root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::element(tag))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(Node::text(content))
    }

    /// Create a detached comment
    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.push(Node::comment(content))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NotFound(id))
    }

    fn ensure_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.node(parent)?;
        if self.node(child)?.parent != parent {
            return Err(DomError::NotAChild { parent, child });
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`, moving it if attached
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or at the end when `None`)
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        self.node(parent)?;
        self.node(child)?;
        if child == NodeId::ROOT || self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            self.ensure_child(parent, reference)?;
            if reference == child {
                return Ok(());
            }
        }

        self.detach(child);
        self.link_before(parent, child, reference);
        Ok(())
    }

    /// Remove `child` from `parent`; the node stays in the arena
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.ensure_child(parent, child)?;
        self.detach(child);
        Ok(child)
    }

    /// Detach every child of `parent`, returning how many were removed
    pub fn clear_children(&mut self, parent: NodeId) -> DomResult<usize> {
        self.node(parent)?;
        let children = self.child_ids(parent);
        for &child in &children {
            self.detach(child);
        }
        tracing::trace!("Cleared {} children of {}", children.len(), parent);
        Ok(children.len())
    }

    /// Copy a fragment's top-level nodes to the end of `parent`
    pub fn import_fragment(&mut self, parent: NodeId, fragment: &Fragment) -> DomResult<Vec<NodeId>> {
        self.node(parent)?;
        Ok(self.insert_fragment(parent, fragment, None))
    }

    /// Replace `old` with a copy of `fragment`, keeping its position.
    ///
    /// The fragment's nodes land exactly where `old` was, in fragment order,
    /// and `old` is detached afterwards. An empty fragment simply removes `old`.
    pub fn replace_child_with_fragment(
        &mut self,
        parent: NodeId,
        fragment: &Fragment,
        old: NodeId,
    ) -> DomResult<Vec<NodeId>> {
        self.ensure_child(parent, old)?;
        let ids = self.insert_fragment(parent, fragment, Some(old));
        self.detach(old);
        Ok(ids)
    }

    fn insert_fragment(&mut self, parent: NodeId, fragment: &Fragment, reference: Option<NodeId>) -> Vec<NodeId> {
        let source = fragment.tree();
        source.child_ids(NodeId::ROOT)
            .into_iter()
            .map(|root| {
                let id = self.import_subtree(source, root);
                self.link_before(parent, id, reference);
                id
            })
            .collect()
    }

    fn import_subtree(&mut self, source: &DomTree, node: NodeId) -> NodeId {
        let data = source.get(node)
            .map(|n| n.data.clone())
            .unwrap_or(NodeData::Comment(String::new()));
        let id = self.push(Node::with_data(data));
        for child in source.child_ids(node) {
            let copy = self.import_subtree(source, child);
            self.link_before(id, copy, None);
        }
        id
    }

    /// Unlink a node from its parent and siblings
    fn detach(&mut self, child: NodeId) {
        let (parent, prev, next) = {
            let node = &self.nodes[child.index()];
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        if !parent.is_valid() {
            return;
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = next;
        } else {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = prev;
        } else {
            self.nodes[parent.index()].last_child = prev;
        }

        let node = &mut self.nodes[child.index()];
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
    }

    /// Link a detached node; all IDs must already be validated
    fn link_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let prev = match reference {
            Some(r) => self.nodes[r.index()].prev_sibling,
            None => self.nodes[parent.index()].last_child,
        };
        let next = reference.unwrap_or(NodeId::NONE);

        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = next;
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = child;
        } else {
            self.nodes[parent.index()].last_child = child;
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = node;
        while current.is_valid() {
            if current == ancestor {
                return true;
            }
            current = match self.get(current) {
                Some(n) => n.parent,
                None => return false,
            };
        }
        false
    }

    /// Iterate over the children of `parent` in order
    pub fn children(&self, parent: NodeId) -> Children<'_> {
        let first = self.get(parent).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        Children { tree: self, next: first }
    }

    /// Child IDs of `parent` in order
    pub fn child_ids(&self, parent: NodeId) -> Vec<NodeId> {
        self.children(parent).map(|(id, _)| id).collect()
    }

    /// Concatenated text of a node and its descendants
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.get(node).map(|n| &n.data) {
            Some(NodeData::Text(t)) => out.push_str(&t.content),
            Some(NodeData::Element(_)) | Some(NodeData::Document) => {
                for (child, _) in self.children(node) {
                    self.collect_text(child, out);
                }
            }
            Some(NodeData::Comment(_)) | None => {}
        }
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a node's children
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.next.is_valid() {
            return None;
        }
        let id = self.next;
        let node = self.tree.get(id)?;
        self.next = node.next_sibling;
        Some((id, node))
    }
}
