//! COCIS Singleton Guard
//!
//! At-most-one-instance enforcement for guarded types.
//!
//! # Overview
//!
//! - [`SingletonGuard`]: issues one [`GuardToken`] per [`TypeKey`]; second
//!   acquisitions and privileged bypass attempts fail with `PolicyViolation`
//! - [`SingletonCell`]: typed holder of a guarded type's canonical instance;
//!   construction requires the token
//! - [`PersistedSingleton`]: durable record that restores through
//!   [`SingletonGuard::resolve_after_restore`] instead of minting a new token
//!
//! # Example
//!
//! ```
//! use cocis_guard::{SingletonCell, SingletonGuard, TypeKey};
//! use std::sync::Arc;
//!
//! let guard = Arc::new(SingletonGuard::new());
//! let cell = SingletonCell::<String>::new(Arc::clone(&guard), TypeKey::named("motd"));
//!
//! let live = cell.get_or_try_init(|_token| Ok(Arc::new("hello".to_string()))).unwrap();
//! let json = cell.persist().unwrap().to_json().unwrap();
//! let restored = cell.restore_json(&json).unwrap();
//! assert!(Arc::ptr_eq(&live, &restored));
//!
//! assert!(guard.acquire(&TypeKey::named("motd")).is_err());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cell;
mod guard;
mod token;

pub use cell::{PersistedSingleton, SingletonCell};
pub use guard::{AccessPath, SingletonGuard};
pub use token::{GuardToken, TypeKey};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
