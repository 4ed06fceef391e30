//! COCIS Builder
//!
//! Staged construction of immutable products.
//!
//! # Overview
//!
//! - [`BuilderSchema`] / [`SchemaBuilder`]: field declarations, defaults,
//!   ranges and field groups with cross-field invariants
//! - [`BuilderSession`]: single-owner accumulator; `build` validates and
//!   produces a [`Record`], consuming the session
//! - [`Buildable`] / [`TypedSession`]: typed products converted from records
//!
//! # Validation modes
//!
//! Fields in an [`ValidationMode::Immediate`] group fail fast in the setter.
//! Everything else is validated by `build`.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod record;
mod schema;
mod session;
mod typed;

pub use record::Record;
pub use schema::{BuilderSchema, FieldGroup, FieldSpec, FieldView, SchemaBuilder, ValidationMode};
pub use session::BuilderSession;
pub use typed::{Buildable, TypedSession};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
