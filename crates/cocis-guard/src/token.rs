//! Guard tokens and guarded type identities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Stable identity of a guarded type
///
/// [`TypeKey::of`] uses the Rust type name, which is stable within one build.
/// Records persisted across builds should use [`TypeKey::named`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(String);

impl TypeKey {
    /// Key derived from a Rust type
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// Key with an explicit name
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key as a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable issuance record shared by every handle to one token
#[derive(Debug)]
pub(crate) struct TokenRecord {
    pub(crate) id: Uuid,
    pub(crate) type_key: TypeKey,
    pub(crate) issued_at: DateTime<Utc>,
}

impl TokenRecord {
    pub(crate) fn mint(type_key: TypeKey) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            type_key,
            issued_at: Utc::now(),
        })
    }
}

/// Capability proving authorized construction of a guarded type
///
/// Only [`SingletonGuard`](crate::SingletonGuard) can mint one; there is no
/// public constructor and the type is not `Clone`. Every handle the guard
/// hands out for a type refers to the same issuance, and handles compare
/// equal exactly when they do.
pub struct GuardToken {
    record: Arc<TokenRecord>,
}

impl GuardToken {
    pub(crate) fn from_record(record: &Arc<TokenRecord>) -> Self {
        Self {
            record: Arc::clone(record),
        }
    }

    /// Unique id of this issuance
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.record.id
    }

    /// Guarded type this token authorizes
    #[inline]
    #[must_use]
    pub fn type_key(&self) -> &TypeKey {
        &self.record.type_key
    }

    /// When the token was issued
    #[inline]
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.record.issued_at
    }

    /// Check if both handles refer to the same issuance
    #[inline]
    #[must_use]
    pub fn same_token(&self, other: &GuardToken) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

impl PartialEq for GuardToken {
    fn eq(&self, other: &Self) -> bool {
        self.same_token(other)
    }
}

impl Eq for GuardToken {}

impl Debug for GuardToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardToken")
            .field("id", &self.record.id)
            .field("type_key", &self.record.type_key)
            .field("issued_at", &self.record.issued_at)
            .finish()
    }
}
