//! Testing utilities for the COCIS workspace
//!
//! Shared fixtures: builder products, factory products and counting
//! constructors.

#![allow(missing_docs)]

use cocis_builder::{BuilderSchema, Buildable, Record, TypedSession, ValidationMode};
use cocis_factory::{product, FactoryRegistry, Policy, Product};
use cocis_guard::SingletonGuard;
use cocis_types::{ConstructionResult, Params};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const MAX_SIDE: i64 = 10_000;
pub const MAX_AREA: i64 = 1_000_000;

/// Rectangle with required sides, an optional color and a deferred area limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rectangle {
    pub width: i64,
    pub height: i64,
    pub color: String,
}

static RECTANGLE_SCHEMA: Lazy<ConstructionResult<Arc<BuilderSchema>>> = Lazy::new(|| {
    BuilderSchema::builder("rectangle")
        .required_int("width", 1, MAX_SIDE)
        .required_int("height", 1, MAX_SIDE)
        .optional("color", "black")
        .group(
            "area",
            &["width", "height"],
            ValidationMode::Deferred,
            |v| match (v.int("width"), v.int("height")) {
                (Some(w), Some(h)) if w * h > MAX_AREA => {
                    Err(format!("area {} exceeds {MAX_AREA}", w * h))
                }
                _ => Ok(()),
            },
        )
        .finish()
});

impl Buildable for Rectangle {
    fn schema() -> ConstructionResult<Arc<BuilderSchema>> {
        RECTANGLE_SCHEMA.clone()
    }

    fn from_record(record: &Record) -> ConstructionResult<Self> {
        Ok(Self {
            width: record.int("width")?,
            height: record.int("height")?,
            color: record.text("color")?.to_string(),
        })
    }
}

impl Rectangle {
    pub fn builder() -> RectangleBuilder {
        RectangleBuilder::default()
    }

    pub fn area(&self) -> i64 {
        self.width * self.height
    }
}

/// Typed setters over a staged rectangle session
#[derive(Debug)]
pub struct RectangleBuilder {
    session: ConstructionResult<TypedSession<Rectangle>>,
}

impl Default for RectangleBuilder {
    fn default() -> Self {
        Self {
            session: TypedSession::staged(),
        }
    }
}

impl RectangleBuilder {
    pub fn with_width(&mut self, width: i64) -> &mut Self {
        self.stage("width", width)
    }

    pub fn with_height(&mut self, height: i64) -> &mut Self {
        self.stage("height", height)
    }

    pub fn with_color(&mut self, color: &str) -> &mut Self {
        self.stage("color", color)
    }

    pub fn build(&mut self) -> ConstructionResult<Rectangle> {
        match &mut self.session {
            Ok(session) => session.build(),
            Err(error) => Err(error.clone()),
        }
    }

    fn stage(&mut self, field: &str, value: impl Into<cocis_types::Value>) -> &mut Self {
        if let Ok(session) = &mut self.session {
            session.stage(field, value);
        }
        self
    }
}

/// Viewport whose zoom bounds are validated as soon as they are set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub zoom_min: i64,
    pub zoom_max: i64,
    pub title: String,
}

static VIEWPORT_SCHEMA: Lazy<ConstructionResult<Arc<BuilderSchema>>> = Lazy::new(|| {
    BuilderSchema::builder("viewport")
        .optional_int("zoom_min", 1, 1, 100)
        .optional_int("zoom_max", 10, 1, 100)
        .optional("title", "untitled")
        .group(
            "zoom",
            &["zoom_min", "zoom_max"],
            ValidationMode::Immediate,
            |v| match (v.int("zoom_min"), v.int("zoom_max")) {
                (Some(lo), Some(hi)) if lo > hi => {
                    Err(format!("zoom_min {lo} exceeds zoom_max {hi}"))
                }
                _ => Ok(()),
            },
        )
        .finish()
});

impl Buildable for Viewport {
    fn schema() -> ConstructionResult<Arc<BuilderSchema>> {
        VIEWPORT_SCHEMA.clone()
    }

    fn from_record(record: &Record) -> ConstructionResult<Self> {
        Ok(Self {
            zoom_min: record.int("zoom_min")?,
            zoom_max: record.int("zoom_max")?,
            title: record.text("title")?.to_string(),
        })
    }
}

/// Factory product standing in for a pooled connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConnection {
    pub host: String,
    pub serial: usize,
}

impl Product for PoolConnection {
    fn kind(&self) -> &str {
        "pool-connection"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_eq(&self, other: &dyn Product) -> bool {
        product::value_eq(self, other)
    }
}

/// Value-like factory product
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Product for Point {
    fn kind(&self) -> &str {
        "point"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_eq(&self, other: &dyn Product) -> bool {
        product::value_eq(self, other)
    }
}

/// Number of constructor invocations
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Increment, returning the previous count
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Registry bound to a fresh guard, isolated from every other test
pub fn isolated_registry() -> FactoryRegistry {
    FactoryRegistry::with_guard(Arc::new(SingletonGuard::new()))
}

/// Register a counting [`PoolConnection`] constructor under `name`
pub fn register_pool_connection(
    registry: &FactoryRegistry,
    name: &str,
    policy: Policy,
) -> ConstructionResult<CallCounter> {
    let counter = CallCounter::new();
    let calls = counter.clone();
    registry.register(name, policy, move |ctx| {
        Ok(PoolConnection {
            host: ctx.text("host").unwrap_or("localhost").to_string(),
            serial: calls.bump(),
        })
    })?;
    Ok(counter)
}

/// Register a counting [`Point`] constructor under `name`
pub fn register_point(
    registry: &FactoryRegistry,
    name: &str,
    policy: Policy,
) -> ConstructionResult<CallCounter> {
    let counter = CallCounter::new();
    let calls = counter.clone();
    registry.register(name, policy, move |ctx| {
        calls.bump();
        Ok(Point {
            x: ctx.int("x")?,
            y: ctx.int("y")?,
        })
    })?;
    Ok(counter)
}

pub fn point_params(x: i64, y: i64) -> Params {
    Params::new().with("x", x).with("y", y)
}
