//! # Live Document Capabilities
//!
//! The narrow interface a host document must offer for live patching.
//! Browser bindings implement it over real DOM calls; [`ArenaDom`] implements
//! it in memory for headless rendering and tests.
//!
//! Queries are scoped to the direct children of the node passed in: a match
//! is only ever looked for within one parent's child list. Hosts with a
//! native `querySelectorAll` can prefix the selector's `Display` form with
//! `:scope > `.
//!
//! Text nodes accept attributes as host-side metadata (`uid`, `hash` and
//! [`REMOVED_ATTR`]). They are never rendered; a browser host keeps them in
//! a side table keyed by node.
//!
//! Nodes carrying [`REMOVED_ATTR`] stay in their parent's child list but are
//! left out of [`LiveDom::outer_markup`], like the serializer's default mode.
//!
//! [`ArenaDom`]: crate::ArenaDom

use crate::error::DomError;
use std::fmt;
use weft_trees::Selector;

/// Marks a soft-deleted node
pub const REMOVED_ATTR: &str = "removed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

pub trait LiveDom {
    type Node: Clone + PartialEq + fmt::Debug;

    fn kind(&self, node: &Self::Node) -> Option<NodeKind>;

    /// Tag name of an element, `None` for text or an unknown node
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn get_attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn has_attribute(&self, node: &Self::Node, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }

    /// All attributes in document order
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), DomError>;

    fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), DomError>;

    fn child_nodes(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;

    fn replace_child(
        &mut self,
        parent: &Self::Node,
        new_child: &Self::Node,
        old_child: &Self::Node,
    ) -> Result<(), DomError>;

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;

    /// Replace every child of `node` with the nodes described by `raw` markup
    fn set_inner_content(&mut self, node: &Self::Node, raw: &str) -> Result<(), DomError>;

    fn create_element(&mut self, tag: &str, auto_closed: bool) -> Self::Node;

    fn create_text(&mut self, value: &str) -> Self::Node;

    /// Canonical rendering of a node, in the serializer's format
    fn outer_markup(&self, node: &Self::Node) -> String;

    fn query_selector_all(&self, root: &Self::Node, selector: &Selector) -> Vec<Self::Node> {
        self.child_nodes(root)
            .into_iter()
            .filter(|node| {
                selector.matches(self.tag_name(node).as_deref(), |name| self.get_attribute(node, name))
            })
            .collect()
    }

    fn query_selector(&self, root: &Self::Node, selector: &Selector) -> Option<Self::Node> {
        self.query_selector_all(root, selector).into_iter().next()
    }
}
