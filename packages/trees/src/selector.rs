//! Selectors used to find a node's counterpart among a parent's children.
//!
//! A node is classified by the identifying attributes it publishes:
//!
//! | uid + hash | id / class | rule                                   |
//! |------------|------------|----------------------------------------|
//! | both       | any        | [`MatchRule::Identity`] (`tag[uid='…']`) |
//! | both, text | none       | [`MatchRule::Identity`] (`#text[uid='…']`) |
//! | neither    | id         | [`MatchRule::Selector`] (`#id`)          |
//! | neither    | class      | [`MatchRule::Selector`] (`.a.b`)         |
//! | neither    | neither    | [`MatchRule::Structural`]                |
//!
//! A blank attribute counts as absent, and so does a uid without a hash (or
//! the reverse): half an identity cannot be trusted for the hash short-circuit.

use std::fmt;

pub const UID_ATTR: &str = "uid";
pub const HASH_ATTR: &str = "hash";
pub const ID_ATTR: &str = "id";
pub const CLASS_ATTR: &str = "class";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `#id`
    Id(String),
    /// `.a.b`: every listed class must be present
    Class(Vec<String>),
    /// `tag[uid='U']`
    TagUid { tag: String, uid: String },
    /// A text node with uid `U`, written `#text[uid='U']`
    TextUid(String),
}

impl Selector {
    /// Test a node given its tag (None for text) and an attribute lookup.
    pub fn matches<F>(&self, tag: Option<&str>, attribute: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Selector::Id(id) => attribute(ID_ATTR).as_deref().map(str::trim) == Some(id.as_str()),
            Selector::Class(wanted) => match attribute(CLASS_ATTR) {
                Some(classes) => {
                    let present: Vec<&str> = classes.split_whitespace().collect();
                    !wanted.is_empty() && wanted.iter().all(|class| present.contains(&class.as_str()))
                }
                None => false,
            },
            Selector::TagUid { tag: wanted, uid } => {
                tag == Some(wanted.as_str()) && attribute(UID_ATTR).as_deref() == Some(uid.as_str())
            }
            Selector::TextUid(uid) => tag.is_none() && attribute(UID_ATTR).as_deref() == Some(uid.as_str()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "#{}", id),
            Selector::Class(classes) => {
                for class in classes {
                    write!(f, ".{}", class)?;
                }
                Ok(())
            }
            Selector::TagUid { tag, uid } => write!(f, "{}[{}='{}']", tag, UID_ATTR, uid),
            Selector::TextUid(uid) => write!(f, "#text[{}='{}']", UID_ATTR, uid),
        }
    }
}

/// Identifying attributes published by a node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifiers {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub uid: Option<String>,
    pub hash: Option<String>,
}

impl Identifiers {
    /// Read identifiers through an attribute lookup, treating blanks as absent.
    pub fn read<F>(tag: Option<&str>, attribute: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| {
            attribute(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut uid = present(UID_ATTR);
        let mut hash = present(HASH_ATTR);
        if uid.is_none() || hash.is_none() {
            uid = None;
            hash = None;
        }

        Self {
            tag: tag.map(str::to_string),
            id: present(ID_ATTR),
            classes: attribute(CLASS_ATTR)
                .map(|classes| classes.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            uid,
            hash,
        }
    }

    pub fn rule(&self) -> MatchRule {
        if let (Some(uid), Some(hash)) = (&self.uid, &self.hash) {
            let selector = match &self.tag {
                Some(tag) => Selector::TagUid {
                    tag: tag.clone(),
                    uid: uid.clone(),
                },
                None => Selector::TextUid(uid.clone()),
            };
            return MatchRule::Identity {
                selector,
                hash: hash.clone(),
            };
        }
        if let Some(id) = &self.id {
            return MatchRule::Selector(Selector::Id(id.clone()));
        }
        if !self.classes.is_empty() {
            return MatchRule::Selector(Selector::Class(self.classes.clone()));
        }
        MatchRule::Structural
    }
}

/// How a node finds its counterpart in the target tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    /// No identifying attributes: compare rendered markup
    Structural,
    /// id or class only: replace the first selector match
    Selector(Selector),
    /// uid and hash: merge or skip the unique tag+uid match
    Identity { selector: Selector, hash: String },
}

impl MatchRule {
    pub fn label(&self) -> &'static str {
        match self {
            MatchRule::Structural => "structural",
            MatchRule::Selector(_) => "selector",
            MatchRule::Identity { .. } => "identity",
        }
    }
}
