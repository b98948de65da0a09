//! # Weft Trees
//!
//! Versioned markup trees and the reconciler that keeps one tree in line
//! with another.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ identity: uid / hash tokens, observers      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ markup: Element / Text / Attribute / Style  │
//! │  - apply, augment, remove, clean_removed    │
//! └─────────────────────────────────────────────┘
//!           ↓                         ↓
//! ┌──────────────────────┐  ┌──────────────────────┐
//! │ reconcile            │  │ serializer           │
//! │  PatchTarget         │  │  canonical text      │
//! │  MemoryTarget        │  │  removed on/off      │
//! └──────────────────────┘  └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use weft_trees::{Factory, SequentialTokens};
//!
//! let f = Factory::new(SequentialTokens::new("/form"));
//! let desired = f.form([f.select(f.options(["shops", "janitor"])).into()]);
//! let mut live = desired.clone();
//!
//! // ... desired changes ...
//! let report = live.reconcile(&desired);
//! println!("{}", live);
//! ```

pub mod builders;
pub mod config;
pub mod error;
pub mod identity;
pub mod markup;
pub mod reconcile;
pub mod selector;
pub mod serializer;

pub use builders::Factory;
pub use config::{ReconcileConfig, SerializerOptions};
pub use error::{MutationError, PatchError, TreeError, TreeResult};
pub use identity::{
    Change, Identification, MutationEvent, Observer, RandomTokens, SequentialTokens, Token,
    TokenSource, Versioned,
};
pub use markup::{Apply, Attribute, Element, Markup, Node, Part, Presence, SlotState, Style, Text, TEXT_NAME};
pub use reconcile::{
    markup_identifiers, model_attribute, reconcile_into, text_attribute, MemoryTarget, NodePath, PatchFailure,
    PatchTarget, ReconcileReport,
};
pub use selector::{Identifiers, MatchRule, Selector};
pub use serializer::{serialize, style_declarations, Serializer};
