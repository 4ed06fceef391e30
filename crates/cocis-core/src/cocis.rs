//! COCIS facade
//!
//! [`Cocis`] ties one configuration, one singleton guard and one factory
//! registry together, and hands out builder sessions and singleton cells bound
//! to the same guard.

use crate::config::{CocisConfig, GuardScope};
use crate::error::CocisResult;
use cocis_builder::{Buildable, BuilderSchema, BuilderSession, TypedSession};
use cocis_factory::{ConstructionContext, FactoryRegistry, Instance, Policy, Product};
use cocis_guard::{SingletonCell, SingletonGuard, TypeKey};
use cocis_types::{ConstructionResult, Params};
use std::sync::Arc;

/// Entry point to every COCIS discipline
#[derive(Debug)]
pub struct Cocis {
    config: CocisConfig,
    guard: Arc<SingletonGuard>,
    registry: FactoryRegistry,
}

impl Cocis {
    /// Create a facade per `config`
    #[must_use]
    pub fn new(config: CocisConfig) -> Self {
        let guard = match config.guard.scope {
            GuardScope::Process => SingletonGuard::global(),
            GuardScope::Isolated => Arc::new(SingletonGuard::new()),
        };
        tracing::debug!(scope = ?config.guard.scope, "cocis facade created");
        Self {
            registry: FactoryRegistry::with_guard(Arc::clone(&guard)),
            config,
            guard,
        }
    }

    /// Facade with a private guard and default settings
    #[must_use]
    pub fn isolated() -> Self {
        Self::new(CocisConfig::default().with_guard_scope(GuardScope::Isolated))
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &CocisConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn guard(&self) -> &Arc<SingletonGuard> {
        &self.guard
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    /// Bind `name` to `constructor` under `policy`
    ///
    /// # Errors
    /// See [`FactoryRegistry::register`]
    pub fn register<P, F>(&self, name: &str, policy: Policy, constructor: F) -> CocisResult<()>
    where
        P: Product,
        F: Fn(&ConstructionContext<'_>) -> ConstructionResult<P> + Send + Sync + 'static,
    {
        Ok(self.registry.register(name, policy, constructor)?)
    }

    /// Create the product bound to `name`
    ///
    /// # Errors
    /// See [`FactoryRegistry::create`]
    pub fn create(&self, name: &str, params: &Params) -> CocisResult<Instance> {
        Ok(self.registry.create(name, params)?)
    }

    /// Singleton cell for `type_key` under this facade's guard
    #[must_use]
    pub fn singleton<T>(&self, type_key: TypeKey) -> SingletonCell<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        SingletonCell::new(Arc::clone(&self.guard), type_key)
    }

    /// Builder session with required fields supplied up front
    ///
    /// # Errors
    /// See [`BuilderSession::new`]
    pub fn session(&self, schema: Arc<BuilderSchema>, required: Params) -> CocisResult<BuilderSession> {
        Ok(BuilderSession::new(schema, required)?)
    }

    /// Empty typed session for `T`
    ///
    /// # Errors
    /// Returns `T`'s schema declaration error
    pub fn builder<T: Buildable>(&self) -> CocisResult<TypedSession<T>> {
        Ok(TypedSession::staged()?)
    }
}

impl Default for Cocis {
    fn default() -> Self {
        Self::new(CocisConfig::default())
    }
}
