//! # Reconciler
//!
//! Mutates a target tree so it reflects an authoritative [`Element`] while
//! keeping as much of the target's node identity as it can.
//!
//! ## Algorithm
//!
//! One call handles one child list. For every child `n` of the
//! authoritative element, its identifying attributes pick a [`MatchRule`]:
//!
//! 1. **Structural** (no id, class, uid or hash): find a target child whose
//!    canonical rendering equals `n`'s. Equal content is already in place;
//!    otherwise `n` is appended.
//! 2. **Selector** (id or class, no uid/hash): the first `#id` or `.class`
//!    match is replaced by `n`; no match appends.
//! 3. **Identity** (uid and hash): the `tag[uid]` match is skipped when the
//!    hashes agree. When they differ the match is merged one level deeper,
//!    or replaced outright once [`ReconcileConfig::max_depth`] is reached.
//!    No match appends.
//!
//! Text children publish their uid and hash too and are looked up by uid
//! among the parent's text children: an equal hash is skipped, a changed one
//! is replaced in place. A text with no uid counterpart falls back to
//! structural equality, so independently built trees do not duplicate
//! identical text.
//!
//! Merging a matched element takes over the authoritative attributes, drops
//! the ones it no longer has and replaces its styles and hash.
//!
//! A removed marker on `n` or on its match deletes the match from the
//! target instead. Ambiguous selectors resolve to the first match in child
//! order; a selector with no match is always an append.
//!
//! The algorithm is written once against [`PatchTarget`]. [`MemoryTarget`]
//! implements it for in-memory trees; the live adapter implements it for a
//! host document, so both paths make identical decisions.

use crate::config::ReconcileConfig;
use crate::error::PatchError;
use crate::identity::Token;
use crate::markup::{Element, Markup, Node, Text};
use crate::selector::{Identifiers, MatchRule, Selector, HASH_ATTR, UID_ATTR};
use crate::serializer::Serializer;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// A tree the reconciler can inspect and mutate.
///
/// Handles are only used between two mutations of the same child list; the
/// reconciler re-queries children after every change.
pub trait PatchTarget {
    type Node: Clone + fmt::Debug;

    fn child_nodes(&self, parent: &Self::Node) -> Vec<Self::Node>;

    /// Tag name of an element node, `None` for text
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn is_removed(&self, node: &Self::Node) -> bool;

    /// Canonical rendering, compared for structural equality
    fn outer_markup(&self, node: &Self::Node) -> String;

    fn append(&mut self, parent: &Self::Node, markup: &Markup) -> Result<(), PatchError>;

    fn replace(&mut self, parent: &Self::Node, old: &Self::Node, markup: &Markup) -> Result<(), PatchError>;

    fn remove(&mut self, parent: &Self::Node, old: &Self::Node) -> Result<(), PatchError>;

    /// Bring a node's own attributes, styles and version in line with `source`
    fn adopt(&mut self, node: &Self::Node, source: &Element) -> Result<(), PatchError>;

    /// Direct children of `parent` matching `selector`, in child order
    fn query_all(&self, parent: &Self::Node, selector: &Selector) -> Vec<Self::Node> {
        self.child_nodes(parent)
            .into_iter()
            .filter(|node| {
                selector.matches(self.tag_name(node).as_deref(), |name| self.attribute(node, name))
            })
            .collect()
    }

    fn query(&self, parent: &Self::Node, selector: &Selector) -> Option<Self::Node> {
        self.query_all(parent, selector).into_iter().next()
    }
}

/// A step that failed and was skipped
#[derive(Debug, Clone, PartialEq)]
pub struct PatchFailure {
    pub uid: Token,
    pub error: PatchError,
}

/// What a reconciliation did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub appended: usize,
    pub replaced: usize,
    pub merged: usize,
    pub skipped: usize,
    pub removed: usize,
    pub failures: Vec<PatchFailure>,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.appended + self.replaced + self.merged + self.removed > 0
    }
}

/// Identifying attribute of a model element, as a target would publish it
pub fn model_attribute(element: &Element, name: &str) -> Option<String> {
    if element.is_tracked() {
        match name {
            UID_ATTR => return Some(element.uid().to_string()),
            HASH_ATTR => return Some(element.hash().to_string()),
            _ => {}
        }
    }
    element.attribute(name).map(str::to_string)
}

/// Identifying attribute of a model text node. Only uid and hash exist.
pub fn text_attribute(text: &Text, name: &str) -> Option<String> {
    if !text.is_tracked() {
        return None;
    }
    match name {
        UID_ATTR => Some(text.uid().to_string()),
        HASH_ATTR => Some(text.hash().to_string()),
        _ => None,
    }
}

/// Identifiers of an authoritative node
pub fn markup_identifiers(markup: &Markup) -> Identifiers {
    match markup {
        Markup::Element(element) => {
            Identifiers::read(Some(element.tag()), |name| model_attribute(element, name))
        }
        Markup::Text(text) => Identifiers::read(None, |name| text_attribute(text, name)),
    }
}

fn structural_match<T: PatchTarget>(target: &T, parent: &T::Node, child: &Markup) -> Option<T::Node> {
    let rendered = Serializer::new().serialize_markup(child);
    target
        .child_nodes(parent)
        .into_iter()
        .find(|node| target.outer_markup(node) == rendered)
}

/// Reconcile the children of `parent` in `target` against `authoritative`.
#[instrument(skip_all, fields(tag = %authoritative.tag(), children = authoritative.children().len(), max_depth = config.max_depth))]
pub fn reconcile_into<T: PatchTarget>(
    target: &mut T,
    parent: &T::Node,
    authoritative: &Element,
    config: &ReconcileConfig,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    reconcile_level(target, parent, authoritative, 0, config, &mut report);

    info!(
        appended = report.appended,
        replaced = report.replaced,
        merged = report.merged,
        skipped = report.skipped,
        removed = report.removed,
        failures = report.failures.len(),
        "Reconciliation complete"
    );
    report
}

fn reconcile_level<T: PatchTarget>(
    target: &mut T,
    parent: &T::Node,
    authoritative: &Element,
    depth: usize,
    config: &ReconcileConfig,
    report: &mut ReconcileReport,
) {
    for child in authoritative.children() {
        if let Err(error) = reconcile_child(target, parent, child, depth, config, report) {
            warn!(uid = %child.uid(), name = %child.name(), %error, "Reconciliation step failed, continuing");
            report.failures.push(PatchFailure {
                uid: child.uid().clone(),
                error,
            });
        }
    }
}

fn reconcile_child<T: PatchTarget>(
    target: &mut T,
    parent: &T::Node,
    child: &Markup,
    depth: usize,
    config: &ReconcileConfig,
    report: &mut ReconcileReport,
) -> Result<(), PatchError> {
    let rule = markup_identifiers(child).rule();

    let found = match &rule {
        MatchRule::Structural => structural_match(target, parent, child),
        MatchRule::Selector(selector) => target.query(parent, selector),
        MatchRule::Identity { selector, .. } => target.query(parent, selector).or_else(|| {
            if child.is_text() && !child.is_removed() {
                structural_match(&*target, parent, child)
            } else {
                None
            }
        }),
    };

    let Some(node) = found else {
        if child.is_removed() {
            debug!(uid = %child.uid(), rule = rule.label(), "Removed node has no counterpart");
            report.skipped += 1;
        } else {
            debug!(uid = %child.uid(), rule = rule.label(), depth, "Appending");
            target.append(parent, child)?;
            report.appended += 1;
        }
        return Ok(());
    };

    if child.is_removed() || target.is_removed(&node) {
        debug!(uid = %child.uid(), rule = rule.label(), depth, "Removing");
        target.remove(parent, &node)?;
        report.removed += 1;
        return Ok(());
    }

    match (&rule, child) {
        (MatchRule::Structural, _) => {
            debug!(uid = %child.uid(), depth, "Structurally equal, keeping target");
            report.skipped += 1;
        }
        (MatchRule::Selector(_), _) => {
            debug!(uid = %child.uid(), depth, "Replacing selector match");
            target.replace(parent, &node, child)?;
            report.replaced += 1;
        }
        (MatchRule::Identity { hash, .. }, Markup::Element(element)) => {
            if target.attribute(&node, HASH_ATTR).as_deref() == Some(hash.as_str()) {
                debug!(uid = %child.uid(), depth, "Hash unchanged, skipping");
                report.skipped += 1;
            } else if depth >= config.max_depth {
                debug!(uid = %child.uid(), depth, "Hash changed at depth limit, replacing");
                target.replace(parent, &node, child)?;
                report.replaced += 1;
            } else {
                debug!(uid = %child.uid(), depth, "Hash changed, merging");
                target.adopt(&node, element)?;
                reconcile_level(target, &node, element, depth + 1, config, report);
                report.merged += 1;
            }
        }
        (MatchRule::Identity { hash, .. }, Markup::Text(text)) => {
            if target.attribute(&node, HASH_ATTR).as_deref() == Some(hash.as_str())
                || target.outer_markup(&node) == text.value()
            {
                debug!(uid = %child.uid(), depth, "Text unchanged, skipping");
                report.skipped += 1;
            } else {
                debug!(uid = %child.uid(), depth, "Text changed, replacing");
                target.replace(parent, &node, child)?;
                report.replaced += 1;
            }
        }
    }
    Ok(())
}

/// Position of a node below the root of a [`MemoryTarget`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodePath(pub Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    fn split_last(&self) -> Option<(&[usize], usize)> {
        self.0.split_last().map(|(last, parent)| (parent, *last))
    }
}

enum Resolved<'a> {
    Element(&'a Element),
    Text(&'a Text),
}

/// In-memory [`PatchTarget`] over an owned [`Element`]
pub struct MemoryTarget<'a> {
    root: &'a mut Element,
}

impl<'a> MemoryTarget<'a> {
    pub fn new(root: &'a mut Element) -> Self {
        Self { root }
    }

    fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let mut current: &Element = &*self.root;
        for &index in path {
            current = current.child(index)?.as_element().ok()?;
        }
        Some(current)
    }

    fn element_at_mut(&mut self, path: &[usize]) -> Result<&mut Element, PatchError> {
        let mut current: &mut Element = &mut *self.root;
        for &index in path {
            current = current
                .children_mut()
                .get_mut(index)
                .ok_or(PatchError::StaleHandle)?
                .as_element_mut()?;
        }
        Ok(current)
    }

    fn resolve(&self, node: &NodePath) -> Option<Resolved<'_>> {
        match node.split_last() {
            None => Some(Resolved::Element(&*self.root)),
            Some((parent, index)) => match self.element_at(parent)?.child(index)? {
                Markup::Element(element) => Some(Resolved::Element(element)),
                Markup::Text(text) => Some(Resolved::Text(text)),
            },
        }
    }

    /// Index of `old` within `parent`, checking the handle still belongs there
    fn slot(parent: &NodePath, old: &NodePath) -> Result<usize, PatchError> {
        match old.split_last() {
            Some((old_parent, index)) if old_parent == parent.0.as_slice() => Ok(index),
            _ => Err(PatchError::StaleHandle),
        }
    }
}

impl PatchTarget for MemoryTarget<'_> {
    type Node = NodePath;

    fn child_nodes(&self, parent: &NodePath) -> Vec<NodePath> {
        match self.element_at(&parent.0) {
            Some(element) => (0..element.children().len()).map(|i| parent.child(i)).collect(),
            None => Vec::new(),
        }
    }

    fn tag_name(&self, node: &NodePath) -> Option<String> {
        match self.resolve(node)? {
            Resolved::Element(element) => Some(element.tag().to_string()),
            Resolved::Text(_) => None,
        }
    }

    fn attribute(&self, node: &NodePath, name: &str) -> Option<String> {
        match self.resolve(node)? {
            Resolved::Element(element) => model_attribute(element, name),
            Resolved::Text(text) => text_attribute(text, name),
        }
    }

    fn is_removed(&self, node: &NodePath) -> bool {
        match self.resolve(node) {
            Some(Resolved::Element(element)) => element.is_removed(),
            Some(Resolved::Text(text)) => text.is_removed(),
            None => false,
        }
    }

    fn outer_markup(&self, node: &NodePath) -> String {
        match self.resolve(node) {
            Some(Resolved::Element(element)) => Serializer::new().serialize(element),
            Some(Resolved::Text(text)) => text.value().to_string(),
            None => String::new(),
        }
    }

    fn append(&mut self, parent: &NodePath, markup: &Markup) -> Result<(), PatchError> {
        self.element_at_mut(&parent.0)?
            .children_mut()
            .push(markup.clone());
        Ok(())
    }

    fn replace(&mut self, parent: &NodePath, old: &NodePath, markup: &Markup) -> Result<(), PatchError> {
        let index = Self::slot(parent, old)?;
        let slot = self
            .element_at_mut(&parent.0)?
            .children_mut()
            .get_mut(index)
            .ok_or(PatchError::StaleHandle)?;
        *slot = markup.clone();
        Ok(())
    }

    fn remove(&mut self, parent: &NodePath, old: &NodePath) -> Result<(), PatchError> {
        let index = Self::slot(parent, old)?;
        let children = self.element_at_mut(&parent.0)?.children_mut();
        if index >= children.len() {
            return Err(PatchError::StaleHandle);
        }
        children.remove(index);
        Ok(())
    }

    fn adopt(&mut self, node: &NodePath, source: &Element) -> Result<(), PatchError> {
        self.element_at_mut(&node.0)?.adopt(source);
        Ok(())
    }
}

impl Element {
    /// Reconcile this element's children against `authoritative` with the
    /// default configuration.
    pub fn reconcile(&mut self, authoritative: &Element) -> ReconcileReport {
        self.reconcile_with(authoritative, &ReconcileConfig::default())
    }

    pub fn reconcile_with(&mut self, authoritative: &Element, config: &ReconcileConfig) -> ReconcileReport {
        let report = {
            let mut target = MemoryTarget::new(self);
            reconcile_into(&mut target, &NodePath::root(), authoritative, config)
        };
        if report.changed() {
            self.mark_dirty();
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::Factory;
    use crate::identity::SequentialTokens;
    use crate::markup::Attribute;
    use crate::serializer::serialize;

    fn factory(seed: &str) -> Factory {
        Factory::new(SequentialTokens::from_seed(seed))
    }

    #[test]
    fn test_identity_match_with_equal_hash_is_skipped() {
        let f = factory("r");
        let live = f.ul([f.li([f.text("a").into()]).into()]);
        let mut target = live.clone();
        let li_before = target.children()[0].as_element().unwrap().clone();

        let report = target.reconcile(&live);

        assert_eq!(report.skipped, 1);
        assert!(!report.changed());
        let li_after = target.children()[0].as_element().unwrap();
        assert_eq!(li_after.uid(), li_before.uid());
        assert_eq!(li_after.hash(), li_before.hash());
    }

    #[test]
    fn test_unknown_uid_is_appended_at_the_end() {
        let f = factory("r");
        let mut target = f.ul([f.li([f.text("a").into()]).into()]);
        let authoritative = f.ul([f.li([f.text("b").into()]).into()]);
        let new_uid = authoritative.children()[0].uid().clone();

        let report = target.reconcile(&authoritative);

        assert_eq!(report.appended, 1);
        assert_eq!(target.children().len(), 2);
        assert_eq!(target.children()[1].uid(), &new_uid);
    }

    #[test]
    fn test_changed_hash_merges_then_replaces_at_depth_limit() {
        let f = factory("r");
        let authoritative = f.div([f.ul([f.li([f.text("x").into()]).into()]).into()]);
        let mut target = authoritative.clone();

        // Mutate the authoritative li and bubble the change up to ul.
        let mut authoritative = authoritative;
        authoritative.update_child(0, |ul| {
            let ul = ul.as_element_mut().unwrap();
            ul.update_child(0, |li| li.as_element_mut().unwrap().apply(Attribute::new("class", "hot")));
        });

        let report = target.reconcile(&authoritative);

        assert_eq!(report.merged, 1);
        assert_eq!(report.replaced, 1);
        let ul = target.children()[0].as_element().unwrap();
        assert_eq!(ul.hash(), authoritative.children()[0].hash());
        assert_eq!(
            ul.children()[0].as_element().unwrap().attribute("class"),
            Some("hot")
        );
    }

    #[test]
    fn test_deeper_config_merges_further() {
        let f = factory("r");
        let mut authoritative = f.div([f.ul([f.li([f.text("x").into()]).into()]).into()]);
        let mut target = authoritative.clone();
        authoritative.update_child(0, |ul| {
            let ul = ul.as_element_mut().unwrap();
            ul.update_child(0, |li| li.as_element_mut().unwrap().apply(Attribute::new("class", "hot")));
        });

        let report = target.reconcile_with(&authoritative, &ReconcileConfig { max_depth: 2 });

        assert_eq!(report.merged, 2);
        assert_eq!(report.replaced, 0);
    }

    #[test]
    fn test_replace_keeps_position() {
        let f = factory("r");
        let mut target = f
            .div([
                f.span([Attribute::new("id", "first").into()]).anonymous().into(),
                f.span([Attribute::new("id", "second").into()]).anonymous().into(),
                f.span([Attribute::new("id", "third").into()]).anonymous().into(),
            ])
            .anonymous();
        let authoritative = f
            .div([f
                .span([Attribute::new("id", "second").into(), f.text("new").into()])
                .anonymous()
                .into()])
            .anonymous();

        let report = target.reconcile(&authoritative);

        assert_eq!(report.replaced, 1);
        assert_eq!(
            serialize(&target),
            "<div><span id='first'></span>\n<span id='second'>new</span>\n<span id='third'></span></div>"
        );
    }

    #[test]
    fn test_class_only_child_uses_class_matching() {
        let f = factory("r");
        let mut target = f
            .div([
                f.span([Attribute::new("class", "note").into(), f.text("old").into()]).anonymous().into(),
                f.span([Attribute::new("class", "note").into(), f.text("older").into()]).anonymous().into(),
            ])
            .anonymous();
        let authoritative = f
            .div([f
                .span([Attribute::new("class", "note").into(), f.text("fresh").into()])
                .anonymous()
                .into()])
            .anonymous();

        let report = target.reconcile(&authoritative);

        // Structural matching would have appended; class matching replaces the first.
        assert_eq!(report.replaced, 1);
        assert_eq!(report.appended, 0);
        assert_eq!(
            serialize(&target),
            "<div><span class='note'>fresh</span>\n<span class='note'>older</span></div>"
        );
    }

    #[test]
    fn test_structural_fallback_for_text() {
        let f = factory("r");
        let mut target = f.paragraph([f.text("same").into()]);
        let authoritative = f.paragraph([f.text("same").into(), f.text("extra").into()]);

        let report = target.reconcile(&authoritative);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.appended, 1);
        assert_eq!(target.children().len(), 2);
    }

    #[test]
    fn test_changed_text_is_replaced_in_place_and_converges() {
        let f = factory("r");
        let mut authoritative = f.div([f.paragraph([f.text("old").into()]).into()]);
        let mut target = authoritative.clone();
        authoritative.update_child(0, |p| {
            p.as_element_mut()
                .unwrap()
                .update_child(0, |text| text.as_text_mut().unwrap().set("new"));
        });

        let report = target.reconcile(&authoritative);

        assert_eq!(report.merged, 1);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.appended, 0);
        let serializer = Serializer::new();
        assert_eq!(
            serializer.serialize_children(&target),
            serializer.serialize_children(&authoritative)
        );
        assert!(!target.reconcile(&authoritative).changed());
    }

    #[test]
    fn test_equal_text_without_uid_match_is_kept() {
        let f = factory("r");
        let mut target = f.paragraph([f.text("shared").into()]);
        let authoritative = f.paragraph([f.text("shared").into()]);

        let report = target.reconcile(&authoritative);

        assert_eq!(report.skipped, 1);
        assert_eq!(target.children().len(), 1);
    }

    #[test]
    fn test_merge_drops_attributes_the_authoritative_lacks() {
        let f = factory("r");
        let authoritative = f.div([f.span([Attribute::new("title", "t").into()]).into()]);
        let mut target = authoritative.clone();
        target.update_child(0, |span| {
            span.as_element_mut()
                .unwrap()
                .apply(Attribute::new("data-stale", "1"))
        });

        let report = target.reconcile(&authoritative);

        assert_eq!(report.merged, 1);
        let span = target.children()[0].as_element().unwrap();
        assert_eq!(span.attribute("data-stale"), None);
        assert_eq!(span.attribute("title"), Some("t"));
        assert_eq!(span.hash(), authoritative.children()[0].hash());
    }

    #[test]
    fn test_removed_authoritative_node_deletes_match_regardless_of_hash() {
        let f = factory("r");
        let mut authoritative = f.ul([f.li([]).into(), f.li([]).into()]);
        let mut target = authoritative.clone();
        let gone = authoritative.children()[0].uid().clone();

        authoritative.children_mut()[0].remove();
        let report = target.reconcile(&authoritative);

        assert_eq!(report.removed, 1);
        assert_eq!(target.children().len(), 1);
        assert!(target.find(&gone).is_err());
    }

    #[test]
    fn test_removed_target_node_is_dropped_not_merged() {
        let f = factory("r");
        let authoritative = f.ul([f.li([]).into()]);
        let mut target = authoritative.clone();
        target.children_mut()[0].remove();

        let report = target.reconcile(&authoritative);

        assert_eq!(report.removed, 1);
        assert!(target.children().is_empty());
    }

    #[test]
    fn test_top_level_change_marks_target_dirty() {
        let f = factory("r");
        let mut target = f.ul([]);
        let hash = target.hash().clone();

        target.reconcile(&f.ul([f.li([]).into()]));
        assert_ne!(target.hash(), &hash);

        let hash = target.hash().clone();
        let unchanged = target.clone();
        target.reconcile(&unchanged);
        assert_eq!(target.hash(), &hash);
    }

    #[test]
    fn test_stale_handle_is_reported() {
        let f = factory("r");
        let mut root = f.div([f.text("a").into()]);
        let mut target = MemoryTarget::new(&mut root);

        let err = target
            .replace(&NodePath::root(), &NodePath(vec![5]), &Markup::Text(f.text("b")))
            .unwrap_err();
        assert_eq!(err, PatchError::StaleHandle);

        let err = target
            .append(&NodePath(vec![0]), &Markup::Text(f.text("b")))
            .unwrap_err();
        assert!(matches!(err, PatchError::Tree(_)));
    }
}
