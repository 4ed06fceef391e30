//! COCIS Factory
//!
//! Named construction behind an abstract product interface.
//!
//! # Overview
//!
//! - [`FactoryRegistry`]: binds names to constructors; `create` routes each
//!   name through its [`Policy`]
//! - [`Product`]: capability set every product exposes to callers
//! - [`Instance`]: shared product handle; identity equality for
//!   instance-controlled policies, value equality for `Fresh`
//!
//! # Policies
//!
//! | Policy      | Construction                         | Equality |
//! |-------------|--------------------------------------|----------|
//! | `Fresh`     | every call                           | value    |
//! | `Cached`    | once per `(name, params)`            | identity |
//! | `Singleton` | once per name, guard token required  | identity |

#![warn(unreachable_pub)]

pub mod product;
mod registry;

pub use product::{Instance, Product};
pub use registry::{ConstructionContext, FactoryRegistry, Policy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
