use thiserror::Error;
use weft_trees::PatchError;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("Unknown node")]
    UnknownNode,

    #[error("Node is not a child of the given parent")]
    NotAChild,

    #[error("Node is not an element")]
    NotAnElement,

    #[error("Malformed markup at {pos}: {message}")]
    Malformed { pos: usize, message: String },

    #[error("Host error: {0}")]
    Host(String),
}

impl DomError {
    pub fn malformed(pos: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            pos,
            message: message.into(),
        }
    }
}

impl From<DomError> for PatchError {
    fn from(err: DomError) -> Self {
        match err {
            DomError::UnknownNode | DomError::NotAChild => PatchError::StaleHandle,
            other => PatchError::Host(other.to_string()),
        }
    }
}
