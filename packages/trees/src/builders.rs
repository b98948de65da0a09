//! Node construction.
//!
//! A [`Factory`] owns the token source every node it creates draws from, so
//! a whole tree can be built with deterministic identities in tests and
//! random ones in production.
//!
//! ```rust,ignore
//! let f = Factory::new(SequentialTokens::new("/form"));
//! let form = f.form([
//!     f.paragraph([f.text("Pick one").into()]).into(),
//!     f.select(f.options(["shops", "janitor"])).into(),
//! ]);
//! ```

use crate::identity::{RandomTokens, TokenSource};
use crate::markup::{Attribute, Element, Part, Text};
use std::sync::Arc;

#[derive(Clone)]
pub struct Factory {
    source: Arc<dyn TokenSource>,
}

impl Factory {
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    pub fn from_source(source: Arc<dyn TokenSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn TokenSource> {
        &self.source
    }

    pub fn element(&self, tag: &str) -> Element {
        Element::new(tag, Arc::clone(&self.source))
    }

    /// Element rendered as `<tag .../>`
    pub fn void_element(&self, tag: &str) -> Element {
        self.element(tag).auto_closing()
    }

    pub fn text(&self, value: impl Into<String>) -> Text {
        Text::new(value, Arc::clone(&self.source))
    }

    pub fn build(&self, tag: &str, parts: impl IntoIterator<Item = Part>) -> Element {
        self.element(tag).with_parts(parts)
    }

    pub fn div(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("div", parts)
    }

    pub fn span(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("span", parts)
    }

    pub fn form(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("form", parts)
    }

    pub fn paragraph(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("p", parts)
    }

    pub fn label(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("label", parts)
    }

    pub fn button(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("button", parts)
    }

    pub fn ul(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("ul", parts)
    }

    pub fn li(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("li", parts)
    }

    pub fn select(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("select", parts)
    }

    pub fn option(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.build("option", parts)
    }

    pub fn input(&self, parts: impl IntoIterator<Item = Part>) -> Element {
        self.void_element("input").with_parts(parts)
    }

    /// One `<option value='v'>v</option>` per value
    pub fn options<'a>(&self, values: impl IntoIterator<Item = &'a str>) -> Vec<Part> {
        values
            .into_iter()
            .map(|value| {
                self.option([Attribute::new("value", value).into(), self.text(value).into()])
                    .into()
            })
            .collect()
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::new(RandomTokens)
    }
}
