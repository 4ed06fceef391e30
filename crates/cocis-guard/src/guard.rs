//! Singleton guard
//!
//! Issues at most one [`GuardToken`] per [`TypeKey`] for the lifetime of the
//! guard, and holds the canonical instance slot for each guarded type.

use crate::token::{GuardToken, TokenRecord, TypeKey};
use cocis_types::{ConstructionError, ConstructionResult, ViolationReason};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Route through which a token is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPath {
    /// Normal construction API
    #[default]
    Direct,

    /// Out-of-band construction that circumvents the normal API.
    /// Never authorized.
    Privileged,

    /// Re-materialization from durable storage
    Restore,
}

/// Per-type state: the one issuance plus the canonical instance slot
pub(crate) struct GuardEntry {
    pub(crate) record: Arc<TokenRecord>,
    pub(crate) instance: OnceCell<Arc<dyn Any + Send + Sync>>,
}

/// Enforces at most one live token per guarded type
///
/// Issuance is serialized by a single lock, so concurrent first-time
/// `acquire` calls for one type yield exactly one token; every other caller
/// observes [`ConstructionError::PolicyViolation`].
pub struct SingletonGuard {
    entries: Mutex<HashMap<TypeKey, Arc<GuardEntry>>>,
    violations: AtomicU64,
}

static GLOBAL: Lazy<Arc<SingletonGuard>> = Lazy::new(|| Arc::new(SingletonGuard::new()));

impl SingletonGuard {
    /// Create an isolated guard
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            violations: AtomicU64::new(0),
        }
    }

    /// The process-wide guard
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Acquire the token for `type_key`
    ///
    /// # Errors
    /// Returns `PolicyViolation` if the token was already issued.
    #[inline]
    pub fn acquire(&self, type_key: &TypeKey) -> ConstructionResult<GuardToken> {
        self.acquire_via(type_key, AccessPath::Direct)
    }

    /// Acquire the token for `type_key` through an explicit access path
    ///
    /// `Restore` behaves like [`resolve_after_restore`](Self::resolve_after_restore).
    ///
    /// # Errors
    /// Returns `PolicyViolation` for a `Privileged` path, and for a `Direct`
    /// path once the token was already issued.
    pub fn acquire_via(
        &self,
        type_key: &TypeKey,
        path: AccessPath,
    ) -> ConstructionResult<GuardToken> {
        match path {
            AccessPath::Privileged => Err(self.violation(type_key, ViolationReason::BypassRejected)),
            AccessPath::Restore => Ok(self.resolve_after_restore(type_key)),
            AccessPath::Direct => {
                let mut entries = self.entries.lock();
                if entries.contains_key(type_key) {
                    drop(entries);
                    return Err(self.violation(type_key, ViolationReason::AlreadyAcquired));
                }
                let entry = Self::mint(type_key);
                let token = GuardToken::from_record(&entry.record);
                entries.insert(type_key.clone(), entry);
                tracing::debug!(%type_key, token = %token.id(), "guard token issued");
                Ok(token)
            }
        }
    }

    /// Resolve the canonical token after restoring a guarded product
    ///
    /// Returns the existing token when one was issued; otherwise issues it,
    /// as a first-ever restore into a fresh process must.
    pub fn resolve_after_restore(&self, type_key: &TypeKey) -> GuardToken {
        let mut entries = self.entries.lock();
        let entry = entries.entry(type_key.clone()).or_insert_with(|| {
            tracing::debug!(%type_key, "guard token issued on restore");
            Self::mint(type_key)
        });
        GuardToken::from_record(&entry.record)
    }

    /// Check whether the token for `type_key` was issued
    #[inline]
    #[must_use]
    pub fn is_acquired(&self, type_key: &TypeKey) -> bool {
        self.entries.lock().contains_key(type_key)
    }

    /// Number of tokens issued
    #[inline]
    #[must_use]
    pub fn issued_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Keys with an issued token, sorted
    #[must_use]
    pub fn issued_keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of rejected acquisitions
    #[inline]
    #[must_use]
    pub fn violation_count(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    pub(crate) fn entry(&self, type_key: &TypeKey) -> Option<Arc<GuardEntry>> {
        self.entries.lock().get(type_key).cloned()
    }

    fn mint(type_key: &TypeKey) -> Arc<GuardEntry> {
        Arc::new(GuardEntry {
            record: TokenRecord::mint(type_key.clone()),
            instance: OnceCell::new(),
        })
    }

    fn violation(&self, type_key: &TypeKey, reason: ViolationReason) -> ConstructionError {
        self.violations.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(%type_key, %reason, "guarded construction refused");
        ConstructionError::policy_violation(type_key.as_str(), reason)
    }
}

impl Default for SingletonGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SingletonGuard {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonGuard")
            .field("issued", &self.issued_keys())
            .field("violations", &self.violation_count())
            .finish()
    }
}
