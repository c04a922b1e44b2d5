//! Identity generation for thresholds, owners and stored services.
//!
//! Callers receive an [`IdGenerator`] instead of minting ids themselves, so tests
//! can substitute [`SequentialIds`] and assert on exact identities.

use std::sync::atomic::{AtomicU64, Ordering};

/// Mints fresh identities.
pub trait IdGenerator: Send + Sync {
    /// Returns an id not handed out before by this generator.
    fn new_id(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `"<prefix>-<n>"` ids starting at 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    /// Creates a generator yielding `prefix-1`, `prefix-2`, ...
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGenerator for SequentialIds {
    fn new_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}
