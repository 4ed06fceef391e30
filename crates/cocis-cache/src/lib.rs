//! COCIS Instance Cache
//!
//! Keyed identity store for interned products.
//!
//! # Overview
//!
//! - [`InstanceCache`]: maps a construction key to the one shared instance
//!   produced for it, running the producer at most once per key even under
//!   concurrent first use
//! - [`CacheStats`]: hit/miss/wait/failure counters
//!
//! # Example
//!
//! ```
//! use cocis_cache::InstanceCache;
//! use std::sync::Arc;
//!
//! let cache: InstanceCache<&str, Arc<String>> = InstanceCache::new();
//! let a = cache.get_or_create("greeting", || Ok(Arc::new("hello".to_string()))).unwrap();
//! let b = cache.get_or_create("greeting", || unreachable!()).unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod cache;

pub use cache::{CacheStats, InstanceCache};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
