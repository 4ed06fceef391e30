//! Factory registry
//!
//! Provides [`FactoryRegistry`] for binding symbolic names to constructors and
//! creating products under a per-name [`Policy`].

use crate::product::{Instance, Product};
use cocis_cache::{CacheStats, InstanceCache};
use cocis_guard::{GuardToken, SingletonCell, SingletonGuard, TypeKey};
use cocis_types::{CacheKey, ConstructionError, ConstructionResult, Params};
use indexmap::map::Entry;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Construction policy declared at registration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Always construct a new product
    #[default]
    Fresh,

    /// Intern by `(name, params)` through the instance cache
    Cached,

    /// One process-wide product per name, enforced by the singleton guard
    Singleton,
}

impl Policy {
    /// Whether products under this policy compare by identity
    #[inline]
    #[must_use]
    pub fn is_instance_controlled(self) -> bool {
        !matches!(self, Self::Fresh)
    }

    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Cached => "cached",
            Self::Singleton => "singleton",
        }
    }
}

impl Display for Policy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fresh" => Ok(Self::Fresh),
            "cached" => Ok(Self::Cached),
            "singleton" => Ok(Self::Singleton),
            other => Err(ConstructionError::invalid_argument(
                "policy",
                format!("unknown policy '{other}'"),
            )),
        }
    }
}

/// Inputs handed to a constructor
#[derive(Debug, Clone, Copy)]
pub struct ConstructionContext<'a> {
    name: &'a str,
    params: &'a Params,
    token: Option<&'a GuardToken>,
}

impl<'a> ConstructionContext<'a> {
    /// Registered name being created
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Parameters passed to `create`
    #[inline]
    #[must_use]
    pub fn params(&self) -> &'a Params {
        self.params
    }

    /// Guard token, present only under [`Policy::Singleton`]
    #[inline]
    #[must_use]
    pub fn token(&self) -> Option<&'a GuardToken> {
        self.token
    }

    /// Required integer parameter
    ///
    /// # Errors
    /// Returns `InvalidArgument` if absent or not an integer
    pub fn int(&self, param: &str) -> ConstructionResult<i64> {
        self.params
            .get(param)
            .and_then(cocis_types::Value::as_int)
            .ok_or_else(|| ConstructionError::invalid_argument(param, "expected int parameter"))
    }

    /// Required text parameter
    ///
    /// # Errors
    /// Returns `InvalidArgument` if absent or not text
    pub fn text(&self, param: &str) -> ConstructionResult<&'a str> {
        self.params
            .get(param)
            .and_then(cocis_types::Value::as_text)
            .ok_or_else(|| ConstructionError::invalid_argument(param, "expected text parameter"))
    }
}

type Constructor =
    Box<dyn Fn(&ConstructionContext<'_>) -> ConstructionResult<Arc<dyn Product>> + Send + Sync>;

struct Registration {
    policy: Policy,
    constructor: Constructor,
    singleton: Option<SingletonCell<dyn Product>>,
}

impl Registration {
    fn construct(
        &self,
        name: &str,
        params: &Params,
        token: Option<&GuardToken>,
    ) -> ConstructionResult<Arc<dyn Product>> {
        (self.constructor)(&ConstructionContext {
            name,
            params,
            token,
        })
    }
}

/// Registry of named constructors
///
/// # Concurrency
/// - `register` checks and inserts under one write lock, so the loser of a
///   concurrent registration of one name observes `DuplicateRegistration`.
/// - `create` releases the registry lock before invoking a constructor;
///   constructors may call back into the registry for other names.
///
/// # Example
/// ```
/// use cocis_factory::{FactoryRegistry, Policy, Product, product};
/// use cocis_guard::SingletonGuard;
/// use cocis_types::Params;
/// use std::any::Any;
/// use std::sync::Arc;
///
/// #[derive(Debug, PartialEq)]
/// struct Pool;
///
/// impl Product for Pool {
///     fn kind(&self) -> &str { "pool" }
///     fn as_any(&self) -> &dyn Any { self }
///     fn value_eq(&self, other: &dyn Product) -> bool { product::value_eq(self, other) }
/// }
///
/// let registry = FactoryRegistry::with_guard(Arc::new(SingletonGuard::new()));
/// registry.register("pool", Policy::Singleton, |_ctx| Ok(Pool)).unwrap();
///
/// let a = registry.create("pool", &Params::new()).unwrap();
/// let b = registry.create("pool", &Params::new()).unwrap();
/// assert!(a.same_instance(&b));
/// ```
pub struct FactoryRegistry {
    registrations: RwLock<IndexMap<String, Arc<Registration>>>,
    interned: InstanceCache<CacheKey, Instance>,
    guard: Arc<SingletonGuard>,
}

impl FactoryRegistry {
    /// Create an empty registry bound to the process-wide guard
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_guard(SingletonGuard::global())
    }

    /// Create an empty registry bound to `guard`
    #[must_use]
    pub fn with_guard(guard: Arc<SingletonGuard>) -> Self {
        Self {
            registrations: RwLock::new(IndexMap::new()),
            interned: InstanceCache::new(),
            guard,
        }
    }

    /// Bind `name` to `constructor` under `policy`
    ///
    /// # Errors
    /// - `InvalidArgument` for an empty name
    /// - `DuplicateRegistration` if `name` is already bound
    pub fn register<P, F>(
        &self,
        name: impl Into<String>,
        policy: Policy,
        constructor: F,
    ) -> ConstructionResult<()>
    where
        P: Product,
        F: Fn(&ConstructionContext<'_>) -> ConstructionResult<P> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConstructionError::invalid_argument(
                "name",
                "factory name must not be empty",
            ));
        }

        let constructor: Constructor = Box::new(move |ctx: &ConstructionContext<'_>| {
            constructor(ctx).map(|product| Arc::new(product) as Arc<dyn Product>)
        });
        let singleton = matches!(policy, Policy::Singleton).then(|| {
            SingletonCell::new(Arc::clone(&self.guard), TypeKey::named(format!("factory:{name}")))
        });

        let mut registrations = self.registrations.write();
        match registrations.entry(name) {
            Entry::Occupied(entry) => {
                tracing::warn!(name = %entry.key(), "duplicate factory registration");
                Err(ConstructionError::DuplicateRegistration(entry.key().clone()))
            }
            Entry::Vacant(entry) => {
                tracing::debug!(name = %entry.key(), %policy, "factory registered");
                entry.insert(Arc::new(Registration {
                    policy,
                    constructor,
                    singleton,
                }));
                Ok(())
            }
        }
    }

    /// Create the product bound to `name`
    ///
    /// # Errors
    /// - `NotFound` if `name` is not registered
    /// - `PolicyViolation` if the singleton token for `name` is held elsewhere
    /// - whatever the constructor returns
    pub fn create(&self, name: &str, params: &Params) -> ConstructionResult<Instance> {
        let registration = self
            .registrations
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConstructionError::NotFound(name.to_string()))?;

        match (registration.policy, &registration.singleton) {
            (Policy::Fresh, _) => {
                tracing::debug!(name, "creating fresh product");
                let product = registration.construct(name, params, None)?;
                Ok(Instance::new(product, Policy::Fresh))
            }
            (Policy::Cached, _) => {
                let key = CacheKey::derive(name, params);
                self.interned.get_or_create(key, || {
                    registration
                        .construct(name, params, None)
                        .map(|product| Instance::new(product, Policy::Cached))
                })
            }
            (Policy::Singleton, Some(cell)) => {
                let product = cell.get_or_try_init(|token| {
                    registration.construct(name, params, Some(token))
                })?;
                Ok(Instance::new(product, Policy::Singleton))
            }
            (Policy::Singleton, None) => Err(ConstructionError::NotFound(name.to_string())),
        }
    }

    /// Check if `name` is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.registrations.read().contains_key(name)
    }

    /// Policy declared for `name`
    #[inline]
    #[must_use]
    pub fn policy_of(&self, name: &str) -> Option<Policy> {
        self.registrations.read().get(name).map(|r| r.policy)
    }

    /// Registered names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.registrations.read().keys().cloned().collect()
    }

    /// Number of registered names
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    /// Check if nothing is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    /// Statistics of the interning cache used by `Cached` names
    #[inline]
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.interned.stats()
    }

    /// Guard enforcing `Singleton` names
    #[inline]
    #[must_use]
    pub fn guard(&self) -> &Arc<SingletonGuard> {
        &self.guard
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for FactoryRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let registrations = self.registrations.read();
        f.debug_struct("FactoryRegistry")
            .field(
                "registrations",
                &registrations
                    .iter()
                    .map(|(name, r)| (name.as_str(), r.policy))
                    .collect::<Vec<_>>(),
            )
            .field("cache", &self.interned.stats())
            .finish()
    }
}
