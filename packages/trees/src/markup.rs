//! # Markup Tree Model
//!
//! A markup tree is a closed set of two node kinds, [`Element`] and
//! [`Text`], wrapped in the [`Markup`] sum type. [`Attribute`] and [`Style`]
//! are plain name/value pairs that apply themselves onto an element's
//! attribute or style list; they carry no identity of their own.
//!
//! ## Deletion
//!
//! Deletion is two-phase. [`Node::remove`] flips a node to
//! [`Presence::Removed`] but leaves it in its parent's child list, so the
//! parent's child count does not change. [`Element::clean_removed`] later
//! drops every removed child, recursively. Seen from a parent, a child slot is
//! therefore [`SlotState::Present`], [`SlotState::Removed`] or
//! [`SlotState::Absent`].

use crate::error::{TreeError, TreeResult};
use crate::identity::{Change, Identification, MutationEvent, Token, TokenSource, Versioned};
use crate::serializer::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const TEXT_NAME: &str = "#text";

/// Name/value pair rendered as `name='value'`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Inline style declaration rendered as `name:value;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    pub name: String,
    pub value: String,
}

impl Style {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Soft-delete state carried by every node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Presence {
    #[default]
    Present,
    Removed,
}

/// State of a child slot as seen from its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Present,
    /// Still in the child list, waiting for [`Element::clean_removed`]
    Removed,
    Absent,
}

/// Capabilities shared by both node kinds
pub trait Node {
    fn versioned(&self) -> &Versioned;
    fn versioned_mut(&mut self) -> &mut Versioned;

    /// Display name: the tag for elements, `#text` for text nodes
    fn name(&self) -> &str;

    fn presence(&self) -> Presence;
    fn set_presence(&mut self, presence: Presence);

    fn uid(&self) -> &Token {
        self.versioned().uid()
    }

    fn hash(&self) -> &Token {
        self.versioned().hash()
    }

    fn observe(&mut self, observer: impl Fn(&MutationEvent) + Send + Sync + 'static)
    where
        Self: Sized,
    {
        self.versioned_mut().observe(observer);
    }

    fn is_removed(&self) -> bool {
        self.presence() == Presence::Removed
    }

    /// Soft-delete this node. Siblings and the parent's child count are untouched.
    fn remove(&mut self) {
        if self.is_removed() {
            return;
        }
        self.set_presence(Presence::Removed);
        self.versioned_mut().announce(Change::Removed);
    }
}

/// Anything that can be attached to a parent element
pub trait Apply {
    fn apply_to(self, parent: &mut Element);
}

/// Element node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    tag: String,
    attributes: Vec<Attribute>,
    styles: Vec<Style>,
    children: Vec<Markup>,
    /// Rendered as `<tag .../>` instead of a paired tag
    auto_closed: bool,
    #[serde(default)]
    presence: Presence,
    versioned: Versioned,
}

/// Text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    value: String,
    #[serde(default)]
    presence: Presence,
    versioned: Versioned,
}

/// A node in a markup tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Markup {
    Element(Element),
    Text(Text),
}

/// One argument to [`Element::augment`]: a child node, an attribute or a style
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Markup(Markup),
    Attribute(Attribute),
    Style(Style),
}

impl Element {
    pub fn new(tag: impl Into<String>, source: Arc<dyn TokenSource>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            styles: Vec::new(),
            children: Vec::new(),
            auto_closed: false,
            presence: Presence::Present,
            versioned: Versioned::new(source),
        }
    }

    /// Attach a part while building, without minting a new hash.
    pub fn with(mut self, part: impl Into<Part>) -> Self {
        match part.into() {
            Part::Markup(child) => self.children.push(child),
            Part::Attribute(attr) => self.attributes.push(attr),
            Part::Style(style) => self.styles.push(style),
        }
        self
    }

    pub fn with_parts(self, parts: impl IntoIterator<Item = Part>) -> Self {
        parts.into_iter().fold(self, |element, part| element.with(part))
    }

    pub fn auto_closing(mut self) -> Self {
        self.auto_closed = true;
        self
    }

    /// Stop publishing uid/hash; the node is matched like hand-authored markup.
    pub fn anonymous(mut self) -> Self {
        self.versioned.set_identification(Identification::Anonymous);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn styles(&self) -> &[Style] {
        &self.styles
    }

    pub fn children(&self) -> &[Markup] {
        &self.children
    }

    /// Direct access to the child list. Callers that change a child's value
    /// are expected to [`mark_dirty`](Self::mark_dirty) afterwards.
    pub fn children_mut(&mut self) -> &mut Vec<Markup> {
        &mut self.children
    }

    pub fn child(&self, index: usize) -> Option<&Markup> {
        self.children.get(index)
    }

    pub fn auto_closed(&self) -> bool {
        self.auto_closed
    }

    pub fn is_tracked(&self) -> bool {
        self.versioned.is_tracked()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// The `id` attribute, unless it is missing or blank
    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Class names from the `class` attribute
    pub fn class_names(&self) -> Vec<&str> {
        self.attribute("class")
            .map(|classes| classes.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Append a node, attribute or style to this element and mint a new hash.
    ///
    /// Not idempotent: applying the same part twice appends it twice.
    pub fn apply(&mut self, part: impl Apply) {
        part.apply_to(self);
    }

    pub fn augment(&mut self, parts: impl IntoIterator<Item = Part>) {
        for part in parts {
            part.apply_to(self);
        }
    }

    pub fn mark_dirty(&mut self) {
        self.versioned.commit(Change::Dirty);
    }

    /// Run `f` on one child; if the child's hash moved, this element is
    /// marked dirty as well.
    pub fn update_child<R>(&mut self, index: usize, f: impl FnOnce(&mut Markup) -> R) -> Option<R> {
        let child = self.children.get_mut(index)?;
        let before = child.hash().clone();
        let result = f(child);
        if child.hash() != &before {
            self.mark_dirty();
        }
        Some(result)
    }

    /// Physically drop every removed child, recursively. Returns how many
    /// nodes were dropped (counting only the removed roots).
    pub fn clean_removed(&mut self) -> usize {
        let before = self.children.len();
        self.children.retain(|child| !child.is_removed());
        let mut dropped = before - self.children.len();

        for child in &mut self.children {
            if let Markup::Element(element) = child {
                dropped += element.clean_removed();
            }
        }
        dropped
    }

    pub fn slot_state(&self, uid: &Token) -> SlotState {
        match self.children.iter().find(|child| child.uid() == uid) {
            Some(child) if child.is_removed() => SlotState::Removed,
            Some(_) => SlotState::Present,
            None => SlotState::Absent,
        }
    }

    /// Depth-first lookup of a descendant by uid
    pub fn find(&self, uid: &Token) -> TreeResult<&Markup> {
        self.find_descendant(uid)
            .ok_or_else(|| TreeError::not_found(uid))
    }

    fn find_descendant(&self, uid: &Token) -> Option<&Markup> {
        for child in &self.children {
            if child.uid() == uid {
                return Some(child);
            }
            if let Markup::Element(element) = child {
                if let Some(found) = element.find_descendant(uid) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Depth-first collection of this element and every descendant element
    /// whose tag equals `tag`.
    pub fn elements_with_tag(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_with_tag(tag, &mut found);
        found
    }

    fn collect_with_tag<'a>(&'a self, tag: &str, found: &mut Vec<&'a Element>) {
        if self.tag == tag {
            found.push(self);
        }
        for child in &self.children {
            if let Markup::Element(element) = child {
                element.collect_with_tag(tag, found);
            }
        }
    }

    /// Visit every element with `tag` (depth-first, this element first) and
    /// let `f` mutate it. Ancestors of a visited element whose hash changed
    /// are marked dirty on the way back up.
    pub fn visit_tag_mut(&mut self, tag: &str, f: &mut impl FnMut(&mut Element)) {
        if self.tag == tag {
            f(self);
        }

        let mut child_changed = false;
        for child in &mut self.children {
            if let Markup::Element(element) = child {
                let before = element.hash().clone();
                element.visit_tag_mut(tag, f);
                child_changed |= element.hash() != &before;
            }
        }
        if child_changed {
            self.mark_dirty();
        }
    }

    /// Set or overwrite an attribute by name, without minting a hash.
    pub(crate) fn upsert_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value.to_string(),
            None => self.attributes.push(Attribute::new(name, value)),
        }
    }

    /// Take over `source`'s own content (attributes, styles, closing form and
    /// version). Attributes `source` lacks are dropped; the rest keep their
    /// position. Children are left to the reconciler.
    pub(crate) fn adopt(&mut self, source: &Element) {
        self.attributes
            .retain(|attr| source.attribute(&attr.name).is_some());
        for attr in &source.attributes {
            self.upsert_attribute(&attr.name, &attr.value);
        }
        self.styles = source.styles.clone();
        self.auto_closed = source.auto_closed;
        self.versioned.adopt_hash(source.hash());
    }
}

impl Node for Element {
    fn versioned(&self) -> &Versioned {
        &self.versioned
    }

    fn versioned_mut(&mut self) -> &mut Versioned {
        &mut self.versioned
    }

    fn name(&self) -> &str {
        &self.tag
    }

    fn presence(&self) -> Presence {
        self.presence
    }

    fn set_presence(&mut self, presence: Presence) {
        self.presence = presence;
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Serializer::new().serialize(self))
    }
}

impl Text {
    pub fn new(value: impl Into<String>, source: Arc<dyn TokenSource>) -> Self {
        Self {
            value: value.into(),
            presence: Presence::Present,
            versioned: Versioned::new(source),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_tracked(&self) -> bool {
        self.versioned.is_tracked()
    }

    /// Replace the payload. An identical value is not a mutation.
    pub fn set(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value == self.value {
            return;
        }
        self.value = value.clone();
        self.versioned.commit(Change::Text { value });
    }

    /// Derive a new payload from the current one. A handler error is
    /// delivered to observers and leaves the node untouched.
    pub fn try_update<E: fmt::Display>(&mut self, f: impl FnOnce(&str) -> Result<String, E>) {
        match f(&self.value) {
            Ok(value) => self.set(value),
            Err(err) => self.versioned.reject(err.to_string()),
        }
    }
}

impl Node for Text {
    fn versioned(&self) -> &Versioned {
        &self.versioned
    }

    fn versioned_mut(&mut self) -> &mut Versioned {
        &mut self.versioned
    }

    fn name(&self) -> &str {
        TEXT_NAME
    }

    fn presence(&self) -> Presence {
        self.presence
    }

    fn set_presence(&mut self, presence: Presence) {
        self.presence = presence;
    }
}

impl Markup {
    pub fn is_element(&self) -> bool {
        matches!(self, Markup::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Markup::Text(_))
    }

    pub fn as_element(&self) -> TreeResult<&Element> {
        match self {
            Markup::Element(element) => Ok(element),
            Markup::Text(text) => Err(TreeError::not_an_element(text.name())),
        }
    }

    pub fn as_element_mut(&mut self) -> TreeResult<&mut Element> {
        match self {
            Markup::Element(element) => Ok(element),
            Markup::Text(text) => Err(TreeError::not_an_element(text.name())),
        }
    }

    pub fn into_element(self) -> TreeResult<Element> {
        match self {
            Markup::Element(element) => Ok(element),
            Markup::Text(text) => Err(TreeError::not_an_element(text.name())),
        }
    }

    pub fn as_text(&self) -> TreeResult<&Text> {
        match self {
            Markup::Text(text) => Ok(text),
            Markup::Element(element) => Err(TreeError::not_text(element.name())),
        }
    }

    pub fn as_text_mut(&mut self) -> TreeResult<&mut Text> {
        match self {
            Markup::Text(text) => Ok(text),
            Markup::Element(element) => Err(TreeError::not_text(element.name())),
        }
    }
}

impl Node for Markup {
    fn versioned(&self) -> &Versioned {
        match self {
            Markup::Element(element) => element.versioned(),
            Markup::Text(text) => text.versioned(),
        }
    }

    fn versioned_mut(&mut self) -> &mut Versioned {
        match self {
            Markup::Element(element) => element.versioned_mut(),
            Markup::Text(text) => text.versioned_mut(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Markup::Element(element) => element.name(),
            Markup::Text(text) => text.name(),
        }
    }

    fn presence(&self) -> Presence {
        match self {
            Markup::Element(element) => element.presence(),
            Markup::Text(text) => text.presence(),
        }
    }

    fn set_presence(&mut self, presence: Presence) {
        match self {
            Markup::Element(element) => element.set_presence(presence),
            Markup::Text(text) => text.set_presence(presence),
        }
    }
}

impl Apply for Markup {
    fn apply_to(self, parent: &mut Element) {
        let name = self.name().to_string();
        parent.children.push(self);
        parent.versioned.commit(Change::ChildAppended { name });
    }
}

impl Apply for Element {
    fn apply_to(self, parent: &mut Element) {
        Markup::Element(self).apply_to(parent);
    }
}

impl Apply for Text {
    fn apply_to(self, parent: &mut Element) {
        Markup::Text(self).apply_to(parent);
    }
}

impl Apply for Attribute {
    fn apply_to(self, parent: &mut Element) {
        let change = Change::Attribute {
            name: self.name.clone(),
            value: self.value.clone(),
        };
        parent.attributes.push(self);
        parent.versioned.commit(change);
    }
}

impl Apply for Style {
    fn apply_to(self, parent: &mut Element) {
        let change = Change::Style {
            name: self.name.clone(),
            value: self.value.clone(),
        };
        parent.styles.push(self);
        parent.versioned.commit(change);
    }
}

impl Apply for Part {
    fn apply_to(self, parent: &mut Element) {
        match self {
            Part::Markup(markup) => markup.apply_to(parent),
            Part::Attribute(attr) => attr.apply_to(parent),
            Part::Style(style) => style.apply_to(parent),
        }
    }
}

impl From<Element> for Markup {
    fn from(element: Element) -> Self {
        Markup::Element(element)
    }
}

impl From<Text> for Markup {
    fn from(text: Text) -> Self {
        Markup::Text(text)
    }
}

impl From<Markup> for Part {
    fn from(markup: Markup) -> Self {
        Part::Markup(markup)
    }
}

impl From<Element> for Part {
    fn from(element: Element) -> Self {
        Part::Markup(Markup::Element(element))
    }
}

impl From<Text> for Part {
    fn from(text: Text) -> Self {
        Part::Markup(Markup::Text(text))
    }
}

impl From<Attribute> for Part {
    fn from(attr: Attribute) -> Self {
        Part::Attribute(attr)
    }
}

impl From<Style> for Part {
    fn from(style: Style) -> Self {
        Part::Style(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SequentialTokens;
    use std::sync::Mutex;

    fn source() -> Arc<dyn TokenSource> {
        Arc::new(SequentialTokens::from_seed("m"))
    }

    fn list() -> Element {
        let source = source();
        Element::new("ul", source.clone())
            .with(Element::new("li", source.clone()).with(Text::new("one", source.clone())))
            .with(Element::new("li", source.clone()).with(Text::new("two", source.clone())))
            .with(Text::new("tail", source))
    }

    #[test]
    fn test_apply_attribute_and_child_mints_hash() {
        let source = source();
        let mut element = Element::new("div", source.clone());
        let uid = element.uid().clone();
        let first = element.hash().clone();

        element.apply(Attribute::new("class", "box"));
        let second = element.hash().clone();
        element.apply(Text::new("hi", source));

        assert_eq!(element.uid(), &uid);
        assert_ne!(first, second);
        assert_ne!(element.hash(), &second);
        assert_eq!(element.attribute("class"), Some("box"));
        assert_eq!(element.children().len(), 1);
    }

    #[test]
    fn test_apply_is_not_idempotent() {
        let mut element = Element::new("div", source());
        let style = Style::new("color", "red");

        element.apply(style.clone());
        element.apply(style);

        assert_eq!(element.styles().len(), 2);
    }

    #[test]
    fn test_apply_to_and_inherent_apply_agree() {
        let mut by_trait = Element::new("div", source());
        let mut by_method = Element::new("div", source());

        Part::from(Style::new("color", "red")).apply_to(&mut by_trait);
        by_method.apply(Style::new("color", "red"));

        assert_eq!(by_trait.styles(), by_method.styles());
    }

    #[test]
    fn test_remove_then_clean() {
        let mut ul = list();
        let uid = ul.children()[0].uid().clone();

        ul.children_mut()[0].remove();
        assert_eq!(ul.children().len(), 3);
        assert_eq!(ul.slot_state(&uid), SlotState::Removed);

        assert_eq!(ul.clean_removed(), 1);
        assert_eq!(ul.children().len(), 2);
        assert_eq!(ul.slot_state(&uid), SlotState::Absent);
    }

    #[test]
    fn test_clean_removed_recurses_into_retained_children() {
        let mut ul = list();
        ul.children_mut()[1]
            .as_element_mut()
            .unwrap()
            .children_mut()[0]
            .remove();

        assert_eq!(ul.clean_removed(), 1);
        assert_eq!(ul.children().len(), 3);
        assert!(ul.children()[1].as_element().unwrap().children().is_empty());
    }

    #[test]
    fn test_text_set_notifies_and_ignores_same_value() {
        let mut text = Text::new("a", source());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        text.observe(move |event| sink.lock().unwrap().push(event.outcome.clone()));

        text.set("a");
        text.set("b");

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], Ok(Change::Text { value: "b".to_string() }));
    }

    #[test]
    fn test_try_update_failure_reaches_observer_only() {
        let mut text = Text::new("7", source());
        let hash = text.hash().clone();
        let failures = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&failures);
        text.observe(move |event| {
            if event.outcome.is_err() {
                *sink.lock().unwrap() += 1;
            }
        });

        text.try_update(|current| {
            current
                .parse::<u8>()
                .ok()
                .and_then(|n| n.checked_mul(100))
                .map(|n| n.to_string())
                .ok_or("overflow")
        });
        text.try_update(|_| Err::<String, _>("nope"));

        assert_eq!(text.value(), "7");
        assert_eq!(text.hash(), &hash);
        assert_eq!(*failures.lock().unwrap(), 2);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let markup = Markup::Text(Text::new("x", source()));

        assert_eq!(
            markup.as_element().unwrap_err(),
            TreeError::not_an_element(TEXT_NAME)
        );
        assert!(markup.as_text().is_ok());
    }

    #[test]
    fn test_elements_with_tag_includes_root() {
        let ul = list();

        assert_eq!(ul.elements_with_tag("ul").len(), 1);
        assert_eq!(ul.elements_with_tag("li").len(), 2);
        assert!(ul.elements_with_tag("p").is_empty());
    }

    #[test]
    fn test_visit_tag_mut_bubbles_dirty() {
        let mut ul = list();
        let root_hash = ul.hash().clone();

        ul.visit_tag_mut("li", &mut |li: &mut Element| li.apply(Attribute::new("class", "item")));

        assert_ne!(ul.hash(), &root_hash);
        for li in ul.elements_with_tag("li") {
            assert_eq!(li.attribute("class"), Some("item"));
        }
    }

    #[test]
    fn test_find_by_uid() {
        let ul = list();
        let li = ul.children()[1].as_element().unwrap();
        let text_uid = li.children()[0].uid().clone();

        assert_eq!(ul.find(&text_uid).unwrap().name(), TEXT_NAME);
        assert_eq!(
            ul.find(&Token::from("missing")).unwrap_err(),
            TreeError::not_found(&Token::from("missing"))
        );
    }

    #[test]
    fn test_clone_is_structurally_identical() {
        let ul = list();
        let copy = ul.clone();

        assert_eq!(copy, ul);
        assert_eq!(copy.uid(), ul.uid());
    }
}
