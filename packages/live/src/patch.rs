use crate::dom::{LiveDom, NodeKind, REMOVED_ATTR};
use crate::error::DomResult;
use tracing::{debug, instrument};
use weft_trees::selector::{HASH_ATTR, UID_ATTR};
use weft_trees::{
    reconcile_into, style_declarations, Element, Markup, Node, PatchError, PatchTarget,
    ReconcileConfig, ReconcileReport, Selector,
};

const STYLE_ATTR: &str = "style";

/// [`PatchTarget`] over a host document
pub struct LiveTarget<'d, D: LiveDom> {
    dom: &'d mut D,
}

impl<'d, D: LiveDom> LiveTarget<'d, D> {
    pub fn new(dom: &'d mut D) -> Self {
        Self { dom }
    }

    pub fn dom(&self) -> &D {
        &*self.dom
    }

    /// Create host nodes for `markup`. Removed nodes are kept and flagged with
    /// [`REMOVED_ATTR`] so the host mirrors the tree's child lists.
    fn materialize(&mut self, markup: &Markup) -> DomResult<D::Node> {
        let node = match markup {
            Markup::Text(text) => {
                let node = self.dom.create_text(text.value());
                if text.is_tracked() {
                    self.dom.set_attribute(&node, HASH_ATTR, text.hash().as_str())?;
                    self.dom.set_attribute(&node, UID_ATTR, text.uid().as_str())?;
                }
                node
            }
            Markup::Element(element) => {
                let node = self.dom.create_element(element.tag(), element.auto_closed());
                if element.is_tracked() {
                    self.dom.set_attribute(&node, HASH_ATTR, element.hash().as_str())?;
                    self.dom.set_attribute(&node, UID_ATTR, element.uid().as_str())?;
                }
                for attr in element.attributes() {
                    self.dom.set_attribute(&node, &attr.name, &attr.value)?;
                }
                if let Some(declarations) = style_declarations(element.styles()) {
                    self.dom.set_attribute(&node, STYLE_ATTR, &declarations)?;
                }
                for child in element.children() {
                    let child_node = self.materialize(child)?;
                    self.dom.append_child(&node, &child_node)?;
                }
                node
            }
        };
        if markup.is_removed() {
            self.dom.set_attribute(&node, REMOVED_ATTR, "")?;
        }
        Ok(node)
    }
}

impl<D: LiveDom> PatchTarget for LiveTarget<'_, D> {
    type Node = D::Node;

    fn child_nodes(&self, parent: &D::Node) -> Vec<D::Node> {
        self.dom.child_nodes(parent)
    }

    fn tag_name(&self, node: &D::Node) -> Option<String> {
        match self.dom.kind(node)? {
            NodeKind::Element => self.dom.tag_name(node),
            NodeKind::Text => None,
        }
    }

    fn attribute(&self, node: &D::Node, name: &str) -> Option<String> {
        self.dom.get_attribute(node, name)
    }

    fn is_removed(&self, node: &D::Node) -> bool {
        self.dom.has_attribute(node, REMOVED_ATTR)
    }

    fn outer_markup(&self, node: &D::Node) -> String {
        self.dom.outer_markup(node)
    }

    fn append(&mut self, parent: &D::Node, markup: &Markup) -> Result<(), PatchError> {
        let node = self.materialize(markup)?;
        self.dom.append_child(parent, &node)?;
        Ok(())
    }

    fn replace(&mut self, parent: &D::Node, old: &D::Node, markup: &Markup) -> Result<(), PatchError> {
        let node = self.materialize(markup)?;
        self.dom.replace_child(parent, &node, old)?;
        Ok(())
    }

    fn remove(&mut self, parent: &D::Node, old: &D::Node) -> Result<(), PatchError> {
        self.dom.remove_child(parent, old)?;
        Ok(())
    }

    fn adopt(&mut self, node: &D::Node, source: &Element) -> Result<(), PatchError> {
        let stale: Vec<String> = self
            .dom
            .attributes(node)
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| {
                ![HASH_ATTR, UID_ATTR, STYLE_ATTR, REMOVED_ATTR].contains(&name.as_str())
                    && source.attribute(name).is_none()
            })
            .collect();
        for name in &stale {
            self.dom.remove_attribute(node, name)?;
        }
        for attr in source.attributes() {
            self.dom.set_attribute(node, &attr.name, &attr.value)?;
        }
        match style_declarations(source.styles()) {
            Some(declarations) => self.dom.set_attribute(node, STYLE_ATTR, &declarations)?,
            None => self.dom.remove_attribute(node, STYLE_ATTR)?,
        }
        if source.is_tracked() {
            self.dom.set_attribute(node, HASH_ATTR, source.hash().as_str())?;
        }
        Ok(())
    }

    fn query_all(&self, parent: &D::Node, selector: &Selector) -> Vec<D::Node> {
        self.dom.query_selector_all(parent, selector)
    }
}

/// Renders a tree into a host document and keeps it patched.
///
/// ```rust,ignore
/// let patcher = LivePatcher::new();
/// patcher.mount(&mut dom, &root, &tree)?;
/// // ... tree changes ...
/// let report = patcher.patch(&mut dom, &root, &tree);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LivePatcher {
    config: ReconcileConfig,
}

impl LivePatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Replace the content of `root` with the children of `tree`.
    ///
    /// Nodes are built directly from the tree, so removed children and
    /// adjacent text runs come through one host node per tree node.
    #[instrument(skip_all, fields(tag = %tree.tag(), children = tree.children().len()))]
    pub fn mount<D: LiveDom>(&self, dom: &mut D, root: &D::Node, tree: &Element) -> DomResult<()> {
        dom.set_inner_content(root, "")?;
        let mut target = LiveTarget::new(dom);
        for child in tree.children() {
            let node = target.materialize(child)?;
            target.dom.append_child(root, &node)?;
        }
        debug!("Mounted");
        Ok(())
    }

    /// Reconcile the children of `root` against `authoritative`
    pub fn patch<D: LiveDom>(&self, dom: &mut D, root: &D::Node, authoritative: &Element) -> ReconcileReport {
        let mut target = LiveTarget::new(dom);
        reconcile_into(&mut target, root, authoritative, &self.config)
    }
}
