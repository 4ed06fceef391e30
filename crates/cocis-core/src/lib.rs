//! COCIS Core - Controlled Object Construction and Identity Subsystem
//!
//! The facade over every construction discipline:
//! - Named factory production with fresh, cached and singleton policies
//! - Staged builder validation with immediate and deferred field groups
//! - Singleton enforcement across normal construction, privileged bypass
//!   attempts and persistence round trips
//!
//! Plus the ambient layers: TOML configuration, tracing setup, and the
//! scenario and stress harness behind the `cocis` binary.
//!
//! # Example
//!
//! ```
//! use cocis_core::prelude::*;
//! use std::any::Any;
//!
//! #[derive(Debug, PartialEq)]
//! struct Pool;
//!
//! impl Product for Pool {
//!     fn kind(&self) -> &str { "pool" }
//!     fn as_any(&self) -> &dyn Any { self }
//!     fn value_eq(&self, other: &dyn Product) -> bool {
//!         cocis_factory::product::value_eq(self, other)
//!     }
//! }
//!
//! let cocis = Cocis::isolated();
//! cocis.register("pool-connection", Policy::Singleton, |_ctx| Ok(Pool)).unwrap();
//!
//! let a = cocis.create("pool-connection", &Params::new()).unwrap();
//! let b = cocis.create("pool-connection", &Params::new()).unwrap();
//! assert!(a.same_instance(&b));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cocis;
pub mod config;
pub mod error;
pub mod harness;
pub mod telemetry;

pub use cocis::Cocis;
pub use config::{CocisConfig, GuardConfig, GuardScope, LogFormat, StressConfig, TelemetryConfig};
pub use error::{CocisError, CocisResult};
pub use harness::{run_demo, run_stress, DemoReport, ScenarioOutcome, StressReport};

/// Common imports for COCIS users
pub mod prelude {
    pub use crate::{Cocis, CocisConfig, CocisError, CocisResult};
    pub use cocis_cache::CacheStats;
    pub use cocis_builder::{
        Buildable, BuilderSchema, BuilderSession, Record, TypedSession, ValidationMode,
    };
    pub use cocis_factory::{ConstructionContext, FactoryRegistry, Instance, Policy, Product};
    pub use cocis_guard::{
        AccessPath, GuardToken, PersistedSingleton, SingletonCell, SingletonGuard, TypeKey,
    };
    pub use cocis_types::{ConstructionError, ConstructionResult, ErrorKind, Params, Value};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
