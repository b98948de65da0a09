//! # Identity & Versioning
//!
//! Every node carries two tokens:
//!
//! - **uid**: assigned once at construction, never changes. Reconciliation
//!   uses it to find "the same node" in another tree.
//! - **hash**: a content-version token. Regenerated on every accepted
//!   mutation, so two nodes sharing a uid and a hash are equivalent and the
//!   reconciler can skip them without looking at their subtrees.
//!
//! Tokens come from an injectable [`TokenSource`]. Production trees use
//! [`RandomTokens`]; tests use [`SequentialTokens`] so serialized output is
//! reproducible.

use crate::error::MutationError;
use crc32fast::Hasher;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

const UID_LEN: usize = 12;
const HASH_LEN: usize = 16;

/// Opaque identity or version token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Strategy for minting uid and hash tokens
pub trait TokenSource: Send + Sync {
    fn uid(&self) -> Token;
    fn hash(&self) -> Token;
}

/// Random alphanumeric tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl RandomTokens {
    fn token(len: usize) -> Token {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Token(value)
    }
}

impl TokenSource for RandomTokens {
    fn uid(&self) -> Token {
        Self::token(UID_LEN)
    }

    fn hash(&self) -> Token {
        Self::token(HASH_LEN)
    }
}

/// Deterministic tokens: `<seed>-u<n>` and `<seed>-h<n>`.
///
/// The seed is the CRC32 of a caller-chosen name, so two sources created
/// with the same name produce the same sequence.
#[derive(Debug)]
pub struct SequentialTokens {
    seed: String,
    count: AtomicU64,
}

impl SequentialTokens {
    pub fn new(name: &str) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(name.as_bytes());
        Self::from_seed(format!("{:x}", hasher.finalize()))
    }

    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: AtomicU64::new(0),
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    fn next(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl TokenSource for SequentialTokens {
    fn uid(&self) -> Token {
        Token(format!("{}-u{}", self.seed, self.next()))
    }

    fn hash(&self) -> Token {
        Token(format!("{}-h{}", self.seed, self.next()))
    }
}

pub(crate) fn default_source() -> Arc<dyn TokenSource> {
    Arc::new(RandomTokens)
}

/// Whether a node publishes its uid/hash as identifying attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Identification {
    /// Machine-generated node: uid and hash are published and serialized
    #[default]
    Tracked,
    /// Hand-authored fragment: identity stays internal, matching falls back
    /// to id/class selectors or structural equality
    Anonymous,
}

/// What an accepted mutation changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    Text { value: String },
    Attribute { name: String, value: String },
    Style { name: String, value: String },
    ChildAppended { name: String },
    Removed,
    Dirty,
    Reconciled,
}

/// Notification delivered to observers after a mutation attempt
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEvent {
    pub uid: Token,
    /// Hash after the attempt (unchanged when the mutation was rejected)
    pub hash: Token,
    pub outcome: Result<Change, MutationError>,
}

pub type Observer = Arc<dyn Fn(&MutationEvent) + Send + Sync>;

/// Identity, version and change channel owned by each node.
///
/// Cloning keeps uid and hash but starts with no observers: a clone is a new
/// value, not a second handle on the original's subscriptions.
#[derive(Serialize, Deserialize)]
pub struct Versioned {
    uid: Token,
    hash: Token,
    #[serde(default)]
    identification: Identification,
    #[serde(skip, default = "default_source")]
    source: Arc<dyn TokenSource>,
    #[serde(skip)]
    observers: Vec<Observer>,
}

impl Versioned {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            uid: source.uid(),
            hash: source.hash(),
            identification: Identification::Tracked,
            source,
            observers: Vec::new(),
        }
    }

    pub fn uid(&self) -> &Token {
        &self.uid
    }

    pub fn hash(&self) -> &Token {
        &self.hash
    }

    pub fn identification(&self) -> Identification {
        self.identification
    }

    pub fn is_tracked(&self) -> bool {
        self.identification == Identification::Tracked
    }

    pub fn set_identification(&mut self, identification: Identification) {
        self.identification = identification;
    }

    pub fn source(&self) -> &Arc<dyn TokenSource> {
        &self.source
    }

    /// Register an observer. Observers run synchronously, in registration order.
    pub fn observe(&mut self, observer: impl Fn(&MutationEvent) + Send + Sync + 'static) {
        self.observers.push(Arc::new(observer));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Accept a mutation: mint a new hash and notify observers.
    pub fn commit(&mut self, change: Change) {
        self.hash = self.source.hash();
        trace!(uid = %self.uid, hash = %self.hash, ?change, "Mutation committed");
        self.notify(Ok(change));
    }

    /// Report a rejected mutation to observers. The hash is left alone.
    pub fn reject(&mut self, reason: impl Into<String>) {
        let error = MutationError {
            node: self.uid.clone(),
            reason: reason.into(),
        };
        trace!(uid = %self.uid, %error, "Mutation rejected");
        self.notify(Err(error));
    }

    /// Notify without touching the hash (soft removal).
    pub(crate) fn announce(&mut self, change: Change) {
        self.notify(Ok(change));
    }

    /// Take over another node's version after a merge made the two equivalent.
    pub(crate) fn adopt_hash(&mut self, hash: &Token) {
        if &self.hash == hash {
            return;
        }
        self.hash = hash.clone();
        self.notify(Ok(Change::Reconciled));
    }

    fn notify(&self, outcome: Result<Change, MutationError>) {
        if self.observers.is_empty() {
            return;
        }
        let event = MutationEvent {
            uid: self.uid.clone(),
            hash: self.hash.clone(),
            outcome,
        };
        for observer in &self.observers {
            observer(&event);
        }
    }
}

impl Clone for Versioned {
    fn clone(&self) -> Self {
        Self {
            uid: self.uid.clone(),
            hash: self.hash.clone(),
            identification: self.identification,
            source: Arc::clone(&self.source),
            observers: Vec::new(),
        }
    }
}

// Observers and the token source are not part of a node's value.
impl PartialEq for Versioned {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.hash == other.hash
            && self.identification == other.identification
    }
}

impl fmt::Debug for Versioned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Versioned")
            .field("uid", &self.uid)
            .field("hash", &self.hash)
            .field("identification", &self.identification)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_sequential_tokens_are_reproducible() {
        let a = SequentialTokens::new("/form.pc");
        let b = SequentialTokens::new("/form.pc");

        assert_eq!(a.seed(), b.seed());
        assert_eq!(a.uid(), b.uid());
        assert_eq!(a.hash(), b.hash());

        let c = SequentialTokens::new("/other.pc");
        assert_ne!(a.seed(), c.seed());
    }

    #[test]
    fn test_random_tokens_differ() {
        let source = RandomTokens;
        let first = source.uid();
        let second = source.uid();

        assert_eq!(first.as_str().len(), UID_LEN);
        assert_eq!(source.hash().as_str().len(), HASH_LEN);
        assert_ne!(first, second);
    }

    #[test]
    fn test_commit_regenerates_hash_and_notifies_in_order() {
        let mut versioned = Versioned::new(Arc::new(SequentialTokens::from_seed("t")));
        let uid = versioned.uid().clone();
        let before = versioned.hash().clone();

        let log = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second"] {
            let log = Arc::clone(&log);
            versioned.observe(move |event| {
                log.lock().unwrap().push((label, event.hash.clone()));
            });
        }

        versioned.commit(Change::Dirty);

        assert_eq!(versioned.uid(), &uid);
        assert_ne!(versioned.hash(), &before);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, "first");
        assert_eq!(log[1].0, "second");
        assert_eq!(&log[0].1, versioned.hash());
    }

    #[test]
    fn test_reject_keeps_hash() {
        let mut versioned = Versioned::new(Arc::new(SequentialTokens::from_seed("t")));
        let before = versioned.hash().clone();

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        versioned.observe(move |event| {
            *sink.lock().unwrap() = Some(event.outcome.clone());
        });

        versioned.reject("value out of range");

        assert_eq!(versioned.hash(), &before);
        let outcome = seen.lock().unwrap().take();
        match outcome {
            Some(Err(err)) => assert_eq!(err.reason, "value out of range"),
            other => panic!("Expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_clone_keeps_identity_but_drops_observers() {
        let mut versioned = Versioned::new(Arc::new(SequentialTokens::from_seed("t")));
        versioned.observe(|_| {});

        let copy = versioned.clone();

        assert_eq!(copy, versioned);
        assert_eq!(copy.observer_count(), 0);
    }
}
