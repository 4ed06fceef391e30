//! Canonical instance holder for a guarded type
//!
//! [`SingletonCell`] is the typed view of one guarded type. Construction
//! requires the type's [`GuardToken`], and persisted state can only come back
//! through [`SingletonCell::restore`], which resolves to the live instance
//! whenever one exists.

use crate::guard::{GuardEntry, SingletonGuard};
use crate::token::{GuardToken, TypeKey};
use cocis_types::{ConstructionError, ConstructionResult};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Durable form of a guarded product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSingleton<T> {
    /// Guarded type the state belongs to
    pub type_key: TypeKey,
    /// Id of the token held when the state was persisted
    pub token_id: Uuid,
    /// Serialized product
    pub state: T,
}

impl<T: Serialize> PersistedSingleton<T> {
    /// Encode as JSON
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the state cannot be encoded
    pub fn to_json(&self) -> ConstructionResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ConstructionError::invalid_argument(self.type_key.as_str(), e.to_string()))
    }
}

impl<T: DeserializeOwned> PersistedSingleton<T> {
    /// Decode from JSON
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the input is not a valid record
    pub fn from_json(json: &str) -> ConstructionResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ConstructionError::invalid_argument("persisted singleton", e.to_string()))
    }
}

/// Holder of the one canonical instance of a guarded type
///
/// # Invariants
/// - The instance is built at most once per guard and type key, by the
///   caller holding the type's token; concurrent first callers block and
///   observe the same instance.
/// - A failed construction installs nothing; the cell keeps its token so a
///   later call can retry.
/// - A second cell for an already-guarded type cannot acquire the token.
pub struct SingletonCell<T: ?Sized> {
    guard: Arc<SingletonGuard>,
    type_key: TypeKey,
    token: OnceCell<GuardToken>,
    _marker: std::marker::PhantomData<fn() -> Arc<T>>,
}

impl<T> SingletonCell<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// Create a cell for `type_key` under `guard`
    #[inline]
    #[must_use]
    pub fn new(guard: Arc<SingletonGuard>, type_key: TypeKey) -> Self {
        Self {
            guard,
            type_key,
            token: OnceCell::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Create a cell keyed by `T`'s type name
    #[inline]
    #[must_use]
    pub fn for_type(guard: Arc<SingletonGuard>) -> Self {
        Self::new(guard, TypeKey::of::<T>())
    }

    /// Guarded type this cell holds
    #[inline]
    #[must_use]
    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    /// Token held by this cell, if it acquired one
    #[inline]
    #[must_use]
    pub fn token(&self) -> Option<&GuardToken> {
        self.token.get()
    }

    /// Canonical instance, if constructed or restored
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the slot holds a different Rust type
    pub fn get(&self) -> ConstructionResult<Option<Arc<T>>> {
        match self.guard.entry(&self.type_key) {
            Some(entry) => match entry.instance.get() {
                Some(stored) => self.downcast(stored).map(Some),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Canonical instance, constructing it on first use
    ///
    /// The constructor receives the type's token and runs at most once.
    ///
    /// # Errors
    /// - `PolicyViolation` if another holder owns the type's token and no
    ///   instance exists yet
    /// - whatever the constructor returns
    pub fn get_or_try_init<F>(&self, constructor: F) -> ConstructionResult<Arc<T>>
    where
        F: FnOnce(&GuardToken) -> ConstructionResult<Arc<T>>,
    {
        if let Some(existing) = self.get()? {
            return Ok(existing);
        }

        let token = self
            .token
            .get_or_try_init(|| self.guard.acquire(&self.type_key))?;
        let entry = self.entry()?;
        let stored = entry.instance.get_or_try_init(|| {
            tracing::debug!(type_key = %self.type_key, "constructing canonical instance");
            constructor(token).map(|instance| Arc::new(instance) as Arc<dyn Any + Send + Sync>)
        })?;
        self.downcast(stored)
    }

    fn entry(&self) -> ConstructionResult<Arc<GuardEntry>> {
        self.guard
            .entry(&self.type_key)
            .ok_or_else(|| ConstructionError::NotFound(self.type_key.to_string()))
    }

    fn downcast(&self, stored: &Arc<dyn Any + Send + Sync>) -> ConstructionResult<Arc<T>> {
        stored.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
            ConstructionError::invalid_argument(
                self.type_key.as_str(),
                "canonical instance has a different type",
            )
        })
    }
}

impl<T> SingletonCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Snapshot the canonical instance for durable storage
    ///
    /// # Errors
    /// Returns `NotFound` if no instance exists yet
    pub fn persist(&self) -> ConstructionResult<PersistedSingleton<T>> {
        let entry = self.entry()?;
        let instance = self
            .get()?
            .ok_or_else(|| ConstructionError::NotFound(self.type_key.to_string()))?;
        Ok(PersistedSingleton {
            type_key: self.type_key.clone(),
            token_id: entry.record.id,
            state: (*instance).clone(),
        })
    }

    /// Restore a persisted product, resolving to the canonical instance
    ///
    /// When a live instance exists it is returned and the persisted state is
    /// discarded. Otherwise the persisted state becomes the canonical
    /// instance under the type's existing (or newly issued) token.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the record belongs to another type key
    pub fn restore(&self, record: PersistedSingleton<T>) -> ConstructionResult<Arc<T>> {
        if record.type_key != self.type_key {
            return Err(ConstructionError::invalid_argument(
                self.type_key.as_str(),
                format!("record belongs to {}", record.type_key),
            ));
        }

        let token = self
            .token
            .get_or_init(|| self.guard.resolve_after_restore(&self.type_key));
        let entry = self.entry()?;
        let mut restored = false;
        let stored = entry.instance.get_or_init(|| {
            restored = true;
            Arc::new(Arc::new(record.state)) as Arc<dyn Any + Send + Sync>
        });
        tracing::debug!(
            type_key = %self.type_key,
            token = %token.id(),
            restored,
            "persisted singleton resolved"
        );
        self.downcast(stored)
    }

    /// Restore from a JSON record produced by [`PersistedSingleton::to_json`]
    ///
    /// # Errors
    /// Returns `InvalidArgument` for malformed input or a foreign type key
    pub fn restore_json(&self, json: &str) -> ConstructionResult<Arc<T>>
    where
        T: DeserializeOwned,
    {
        self.restore(PersistedSingleton::from_json(json)?)
    }
}

impl<T: ?Sized> Debug for SingletonCell<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonCell")
            .field("type_key", &self.type_key)
            .field("token", &self.token.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cocis_types::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Settings {
        name: String,
        level: u8,
    }

    fn settings() -> Settings {
        Settings {
            name: "primary".to_string(),
            level: 3,
        }
    }

    #[test]
    fn constructor_receives_the_cells_token() {
        let cell = SingletonCell::<Settings>::for_type(Arc::new(SingletonGuard::new()));

        let instance = cell
            .get_or_try_init(|token| {
                assert_eq!(token.type_key(), &TypeKey::of::<Settings>());
                Ok(Arc::new(settings()))
            })
            .unwrap();

        assert_eq!(*instance, settings());
        assert!(cell.token().is_some());
    }

    #[test]
    fn constructor_runs_once() {
        let cell = SingletonCell::<Settings>::for_type(Arc::new(SingletonGuard::new()));
        let calls = AtomicUsize::new(0);

        let a = cell
            .get_or_try_init(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(settings()))
            })
            .unwrap();
        let b = cell
            .get_or_try_init(|_| unreachable!("instance already constructed"))
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_construction_keeps_token_for_retry() {
        let guard = Arc::new(SingletonGuard::new());
        let cell = SingletonCell::<Settings>::for_type(Arc::clone(&guard));

        let err = cell
            .get_or_try_init(|_| Err(ConstructionError::producer_failed("settings", "disk busy")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProducerFailed);
        assert!(cell.get().unwrap().is_none());

        let instance = cell.get_or_try_init(|_| Ok(Arc::new(settings()))).unwrap();
        assert_eq!(instance.level, 3);
        assert_eq!(guard.issued_count(), 1);
    }

    #[test]
    fn second_cell_cannot_construct() {
        let guard = Arc::new(SingletonGuard::new());
        let first = SingletonCell::<Settings>::for_type(Arc::clone(&guard));
        let second = SingletonCell::<Settings>::for_type(Arc::clone(&guard));

        // Token held by the first cell, nothing constructed yet.
        let _ = first.get_or_try_init(|_| Err(ConstructionError::producer_failed("s", "later")));

        let err = second
            .get_or_try_init(|_| Ok(Arc::new(settings())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);
    }

    #[test]
    fn second_cell_observes_the_canonical_instance() {
        let guard = Arc::new(SingletonGuard::new());
        let first = SingletonCell::<Settings>::for_type(Arc::clone(&guard));
        let second = SingletonCell::<Settings>::for_type(Arc::clone(&guard));

        let live = first.get_or_try_init(|_| Ok(Arc::new(settings()))).unwrap();
        let seen = second
            .get_or_try_init(|_| unreachable!("canonical instance exists"))
            .unwrap();
        assert!(Arc::ptr_eq(&live, &seen));
    }

    #[test]
    fn persisted_record_carries_key_token_and_state() {
        let cell = SingletonCell::<Settings>::new(
            Arc::new(SingletonGuard::new()),
            TypeKey::named("settings"),
        );
        cell.get_or_try_init(|_| Ok(Arc::new(settings()))).unwrap();

        let record = cell.persist().unwrap();
        assert_eq!(record.type_key.as_str(), cell.type_key().as_str());
        assert_eq!(Some(record.token_id), cell.token().map(GuardToken::id));
        assert_eq!(record.state, settings());
    }

    #[test]
    fn restore_returns_the_live_instance() {
        let cell = SingletonCell::<Settings>::for_type(Arc::new(SingletonGuard::new()));
        let live = cell.get_or_try_init(|_| Ok(Arc::new(settings()))).unwrap();

        let json = cell.persist().unwrap().to_json().unwrap();
        let mut record = PersistedSingleton::<Settings>::from_json(&json).unwrap();
        record.state.level = 9;

        let restored = cell.restore(record).unwrap();
        assert!(Arc::ptr_eq(&live, &restored));
        assert_eq!(restored.level, 3);
    }

    #[test]
    fn restore_into_fresh_guard_installs_state() {
        let original = SingletonCell::<Settings>::for_type(Arc::new(SingletonGuard::new()));
        original.get_or_try_init(|_| Ok(Arc::new(settings()))).unwrap();
        let json = original.persist().unwrap().to_json().unwrap();

        let fresh_guard = Arc::new(SingletonGuard::new());
        let fresh = SingletonCell::<Settings>::for_type(Arc::clone(&fresh_guard));
        let restored = fresh.restore_json(&json).unwrap();
        let again = fresh.restore_json(&json).unwrap();

        assert_eq!(*restored, settings());
        assert!(Arc::ptr_eq(&restored, &again));
        assert_eq!(fresh_guard.issued_count(), 1);
        assert!(fresh
            .get_or_try_init(|_| unreachable!("restored instance is canonical"))
            .is_ok());
    }

    #[test]
    fn restore_rejects_foreign_type_key() {
        let cell = SingletonCell::<Settings>::new(
            Arc::new(SingletonGuard::new()),
            TypeKey::named("settings"),
        );
        let record = PersistedSingleton {
            type_key: TypeKey::named("other"),
            token_id: Uuid::new_v4(),
            state: settings(),
        };

        let err = cell.restore(record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn persist_without_instance_is_not_found() {
        let cell = SingletonCell::<Settings>::for_type(Arc::new(SingletonGuard::new()));
        assert_eq!(cell.persist().unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        const THREADS: usize = 16;
        let cell = Arc::new(SingletonCell::<Settings>::for_type(Arc::new(
            SingletonGuard::new(),
        )));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cell.get_or_try_init(|_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Arc::new(settings()))
                    })
                    .unwrap()
                })
            })
            .collect();

        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    }
}
