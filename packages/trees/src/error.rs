use crate::identity::Token;
use thiserror::Error;

pub type TreeResult<T> = Result<T, TreeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Node '{name}' is not an element")]
    NotAnElement { name: String },

    #[error("Node '{name}' is not a text node")]
    NotText { name: String },

    #[error("No node with uid {uid}")]
    NotFound { uid: Token },
}

impl TreeError {
    pub fn not_an_element(name: impl Into<String>) -> Self {
        Self::NotAnElement { name: name.into() }
    }

    pub fn not_text(name: impl Into<String>) -> Self {
        Self::NotText { name: name.into() }
    }

    pub fn not_found(uid: &Token) -> Self {
        Self::NotFound { uid: uid.clone() }
    }
}

/// A mutation handler refused to produce a new value.
///
/// Delivered to the node's observers; the mutating call itself never fails.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Mutation of {node} rejected: {reason}")]
pub struct MutationError {
    pub node: Token,
    pub reason: String,
}

/// A single reconciliation step that a patch target could not carry out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("Host rejected operation: {0}")]
    Host(String),

    #[error("Node handle no longer points into the tree")]
    StaleHandle,

    #[error(transparent)]
    Tree(#[from] TreeError),
}
