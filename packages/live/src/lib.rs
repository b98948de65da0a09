//! # Weft Live
//!
//! Applies the weft-trees reconciler to an external document instead of an
//! in-memory tree. Hosts implement [`LiveDom`]; [`LivePatcher`] mounts a tree
//! into it once and patches it afterwards.
//!
//! ```text
//! Element ──mount──▶ LiveTarget::materialize ─────▶ host nodes
//! Element ──patch──▶ reconcile_into(LiveTarget) ───▶ host nodes
//! ```
//!
//! The patch step runs the same generic algorithm as
//! `Element::reconcile`, so a host document patched with a tree renders the
//! same text as an in-memory copy reconciled with that tree.

pub mod arena;
pub mod dom;
pub mod error;
pub mod fragment;
pub mod patch;

pub use arena::{ArenaDom, NodeId};
pub use dom::{LiveDom, NodeKind, REMOVED_ATTR};
pub use error::{DomError, DomResult};
pub use patch::{LivePatcher, LiveTarget};
