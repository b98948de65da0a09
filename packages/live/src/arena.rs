//! In-memory host document.
//!
//! Nodes live in a flat arena addressed by [`NodeId`]. Detached nodes are
//! never freed; an `ArenaDom` is meant for one render or one test.

use crate::dom::{LiveDom, NodeKind, REMOVED_ATTR};
use crate::error::{DomError, DomResult};
use crate::fragment;
use weft_trees::selector::{HASH_ATTR, UID_ATTR};

const STYLE_ATTR: &str = "style";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum ArenaNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<NodeId>,
        auto_closed: bool,
    },
    Text {
        value: String,
        /// Metadata only, never rendered
        attributes: Vec<(String, String)>,
    },
}

impl ArenaNode {
    fn attributes(&self) -> &[(String, String)] {
        match self {
            ArenaNode::Element { attributes, .. } | ArenaNode::Text { attributes, .. } => attributes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArenaDom {
    nodes: Vec<ArenaNode>,
}

impl ArenaDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children rendered and joined the way the serializer joins them
    pub fn inner_markup(&self, node: &NodeId) -> String {
        let mut output = String::new();
        self.write_children(&self.child_nodes(node), &mut output);
        output
    }

    pub fn text(&self, node: &NodeId) -> Option<&str> {
        match self.nodes.get(node.0)? {
            ArenaNode::Text { value, .. } => Some(value.as_str()),
            ArenaNode::Element { .. } => None,
        }
    }

    fn is_removed(&self, node: &NodeId) -> bool {
        self.has_attribute(node, REMOVED_ATTR)
    }

    fn push(&mut self, node: ArenaNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn children_mut(&mut self, parent: &NodeId) -> DomResult<&mut Vec<NodeId>> {
        match self.nodes.get_mut(parent.0) {
            Some(ArenaNode::Element { children, .. }) => Ok(children),
            Some(ArenaNode::Text { .. }) => Err(DomError::NotAnElement),
            None => Err(DomError::UnknownNode),
        }
    }

    fn attributes_mut(&mut self, node: &NodeId) -> DomResult<&mut Vec<(String, String)>> {
        match self.nodes.get_mut(node.0) {
            Some(ArenaNode::Element { attributes, .. }) | Some(ArenaNode::Text { attributes, .. }) => {
                Ok(attributes)
            }
            None => Err(DomError::UnknownNode),
        }
    }

    fn check(&self, node: &NodeId) -> DomResult<()> {
        if node.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(DomError::UnknownNode)
        }
    }

    fn write_children(&self, children: &[NodeId], output: &mut String) {
        let mut first = true;
        for child in children.iter().filter(|child| !self.is_removed(child)) {
            if !first {
                output.push('\n');
            }
            first = false;
            self.write_node(child, output);
        }
    }

    fn write_node(&self, node: &NodeId, output: &mut String) {
        match self.nodes.get(node.0) {
            Some(ArenaNode::Text { value, .. }) => output.push_str(value),
            Some(ArenaNode::Element {
                tag,
                attributes,
                children,
                auto_closed,
            }) => {
                output.push('<');
                output.push_str(tag);

                // Identity first, style last, like the model serializer.
                for name in [HASH_ATTR, UID_ATTR] {
                    if let Some((_, value)) = attributes.iter().find(|(n, _)| n == name) {
                        output.push_str(&format!(" {}='{}'", name, value));
                    }
                }
                for (name, value) in attributes {
                    if ![HASH_ATTR, UID_ATTR, STYLE_ATTR, REMOVED_ATTR].contains(&name.as_str()) {
                        output.push_str(&format!(" {}='{}'", name, value));
                    }
                }
                if let Some((_, value)) = attributes.iter().find(|(n, _)| n == STYLE_ATTR) {
                    output.push_str(&format!(" {}=\"{}\"", STYLE_ATTR, value));
                }

                if *auto_closed {
                    output.push_str("/>");
                    return;
                }
                output.push('>');
                self.write_children(children, output);
                output.push_str("</");
                output.push_str(tag);
                output.push('>');
            }
            None => {}
        }
    }
}

impl LiveDom for ArenaDom {
    type Node = NodeId;

    fn kind(&self, node: &NodeId) -> Option<NodeKind> {
        match self.nodes.get(node.0)? {
            ArenaNode::Element { .. } => Some(NodeKind::Element),
            ArenaNode::Text { .. } => Some(NodeKind::Text),
        }
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match self.nodes.get(node.0)? {
            ArenaNode::Element { tag, .. } => Some(tag.clone()),
            ArenaNode::Text { .. } => None,
        }
    }

    fn get_attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.nodes
            .get(node.0)?
            .attributes()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.clone())
    }

    fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
        self.nodes
            .get(node.0)
            .map(|node| node.attributes().to_vec())
            .unwrap_or_default()
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> DomResult<()> {
        let attributes = self.attributes_mut(node)?;
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some(attr) => attr.1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) -> DomResult<()> {
        self.attributes_mut(node)?.retain(|(n, _)| n != name);
        Ok(())
    }

    fn child_nodes(&self, node: &NodeId) -> Vec<NodeId> {
        match self.nodes.get(node.0) {
            Some(ArenaNode::Element { children, .. }) => children.clone(),
            _ => Vec::new(),
        }
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> DomResult<()> {
        self.check(child)?;
        self.children_mut(parent)?.push(*child);
        Ok(())
    }

    fn replace_child(&mut self, parent: &NodeId, new_child: &NodeId, old_child: &NodeId) -> DomResult<()> {
        self.check(new_child)?;
        let children = self.children_mut(parent)?;
        let slot = children
            .iter_mut()
            .find(|child| *child == old_child)
            .ok_or(DomError::NotAChild)?;
        *slot = *new_child;
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> DomResult<()> {
        let children = self.children_mut(parent)?;
        let index = children
            .iter()
            .position(|c| c == child)
            .ok_or(DomError::NotAChild)?;
        children.remove(index);
        Ok(())
    }

    fn set_inner_content(&mut self, node: &NodeId, raw: &str) -> DomResult<()> {
        self.children_mut(node)?;
        let nodes = fragment::read(self, raw)?;
        *self.children_mut(node)? = nodes;
        Ok(())
    }

    fn create_element(&mut self, tag: &str, auto_closed: bool) -> NodeId {
        self.push(ArenaNode::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            auto_closed,
        })
    }

    fn create_text(&mut self, value: &str) -> NodeId {
        self.push(ArenaNode::Text {
            value: value.to_string(),
            attributes: Vec::new(),
        })
    }

    fn outer_markup(&self, node: &NodeId) -> String {
        let mut output = String::new();
        self.write_node(node, &mut output);
        output
    }
}
