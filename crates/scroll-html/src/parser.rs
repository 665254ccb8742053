//! HTML5 fragment parser
//!
//! Uses html5ever's fragment algorithm with a `<div>` context, the same
//! thing assigning `innerHTML` on a detached `<div>` does, and converts the
//! result from RcDom into our arena. Elements that a full document would
//! hoist into `<head>` (`<style>`, `<script>`, `<link>`, `<meta>`) stay where
//! they were written. Markup is never rejected: whatever html5ever recovers
//! is what we keep.

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, ns, parse_fragment, QualName};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use scroll_dom::{DomTree, Fragment, NodeId};

/// Markup-to-fragment parser
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentParser {
    keep_comments: bool,
}

impl FragmentParser {
    /// Create a parser that drops comments
    pub fn new() -> Self {
        Self { keep_comments: false }
    }

    /// Keep comment nodes in the output
    pub fn keep_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    /// Parse a markup snippet into a detached fragment
    pub fn parse(&self, markup: &str) -> Fragment {
        let context = QualName::new(None, ns!(html), local_name!("div"));
        let dom = parse_fragment(RcDom::default(), Default::default(), context, Vec::new(), false)
            .one(markup);

        // The fragment algorithm parents its output on an `<html>` wrapper
        let mut tree = DomTree::new();
        if let Some(wrapper) = dom.document.children.borrow().first() {
            self.convert_children(wrapper, &mut tree, NodeId::ROOT);
        }

        let fragment = Fragment::from_tree(tree);
        tracing::debug!("Parsed fragment with {} top-level nodes", fragment.len());
        fragment
    }

    /// Convert the children of `handle` into `tree` under `parent`.
    ///
    /// Whitespace-only text between two siblings separates them (`<b>a</b>
    /// <i>b</i>`) and is kept; at either edge of the child list it is layout
    /// noise and dropped.
    fn convert_children(&self, handle: &Handle, tree: &mut DomTree, parent: NodeId) {
        let children = handle.children.borrow();
        let last = children.len().saturating_sub(1);
        for (index, child) in children.iter().enumerate() {
            let interior = index > 0 && index < last;
            self.convert_node(child, tree, parent, interior);
        }
    }

    /// Convert an RcDom node (and its subtree) into `tree` under `parent`
    fn convert_node(&self, handle: &Handle, tree: &mut DomTree, parent: NodeId, interior: bool) {
        match &handle.data {
            RcNodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if interior || !text.trim().is_empty() {
                    let id = tree.create_text(&text);
                    self.attach(tree, parent, id);
                }
            }
            RcNodeData::Comment { contents } => {
                if self.keep_comments {
                    let id = tree.create_comment(&contents.to_string());
                    self.attach(tree, parent, id);
                }
            }
            RcNodeData::Element { name, attrs, .. } => {
                let id = tree.create_element(&name.local);
                if let Some(elem) = tree.get_mut(id).and_then(|n| n.as_element_mut()) {
                    for attr in attrs.borrow().iter() {
                        elem.set_attr(&attr.name.local, &attr.value);
                    }
                }
                self.attach(tree, parent, id);
                self.convert_children(handle, tree, id);
            }
            RcNodeData::Document
            | RcNodeData::Doctype { .. }
            | RcNodeData::ProcessingInstruction { .. } => {}
        }
    }

    fn attach(&self, tree: &mut DomTree, parent: NodeId, child: NodeId) {
        if let Err(err) = tree.append_child(parent, child) {
            tracing::debug!("Dropping node during conversion: {}", err);
        }
    }
}
