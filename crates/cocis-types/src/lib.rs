//! COCIS Types
//!
//! Shared vocabulary for the construction and identity subsystem.
//!
//! # Core Concepts
//!
//! - [`ConstructionError`]: typed failure taxonomy, classified by [`ErrorKind`]
//! - [`Value`] / [`Params`]: dynamic construction parameters and field values
//! - [`CacheKey`]: deterministic Blake3 key derived from construction parameters
//!
//! # Example
//!
//! ```
//! use cocis_types::{CacheKey, Params};
//!
//! let params = Params::new().with("host", "db").with("port", 5432);
//! let key = CacheKey::derive("pool-connection", &params);
//! assert_eq!(key, CacheKey::derive("pool-connection", &params));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod key;
mod value;

pub use error::{ConstructionError, ConstructionResult, ErrorKind, MissingReason, ViolationReason};
pub use key::CacheKey;
pub use value::{Params, Value, ValueKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
