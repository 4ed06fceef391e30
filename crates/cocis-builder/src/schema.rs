//! Builder schemas
//!
//! A [`BuilderSchema`] declares the fields of one product: which are required,
//! their kinds, inclusive integer ranges, defaults for optional fields, and
//! field groups carrying a cross-field invariant.

use cocis_types::{ConstructionError, ConstructionResult, MissingReason, Value, ValueKind};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// When a field group's invariant is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Setters validate kind, range and the group invariant and fail fast
    Immediate,

    /// Setters store unconditionally; `build` validates
    #[default]
    Deferred,
}

/// Declaration of one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    kind: ValueKind,
    required: bool,
    range: Option<(i64, i64)>,
    default: Option<Value>,
}

impl FieldSpec {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Inclusive integer range, if declared
    #[inline]
    #[must_use]
    pub fn range(&self) -> Option<(i64, i64)> {
        self.range
    }

    /// Default for an optional field
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Check kind and range of `value` against this declaration
    ///
    /// # Errors
    /// Returns the structural reason `value` does not fit
    pub fn check(&self, value: &Value) -> Result<(), MissingReason> {
        if value.kind() != self.kind {
            return Err(MissingReason::WrongKind {
                expected: self.kind.name(),
                actual: value.kind().name(),
            });
        }
        if let (Some((min, max)), Some(v)) = (self.range, value.as_int()) {
            if v < min || v > max {
                return Err(MissingReason::OutOfRange { value: v, min, max });
            }
        }
        Ok(())
    }
}

/// Read-only view of a session's effective field values
///
/// A field's effective value is the one set on the session, or its default.
#[derive(Clone, Copy)]
pub struct FieldView<'a> {
    schema: &'a BuilderSchema,
    values: &'a BTreeMap<String, Value>,
}

impl<'a> FieldView<'a> {
    pub(crate) fn new(schema: &'a BuilderSchema, values: &'a BTreeMap<String, Value>) -> Self {
        Self { schema, values }
    }

    /// Whether `field` holds a value written by a setter, not its default
    #[inline]
    #[must_use]
    pub fn is_set(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Effective value of `field`
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.values
            .get(field)
            .or_else(|| self.schema.field(field).and_then(FieldSpec::default_value))
    }

    #[must_use]
    pub fn int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_int)
    }

    #[must_use]
    pub fn float(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_float)
    }

    #[must_use]
    pub fn text(&self, field: &str) -> Option<&'a str> {
        self.get(field).and_then(Value::as_text)
    }

    #[must_use]
    pub fn bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }
}

impl Debug for FieldView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.schema
                    .fields()
                    .filter_map(|spec| self.get(spec.name()).map(|v| (spec.name(), v))),
            )
            .finish()
    }
}

type Invariant = Arc<dyn Fn(&FieldView<'_>) -> Result<(), String> + Send + Sync>;

/// Named set of fields sharing a cross-field invariant
#[derive(Clone)]
pub struct FieldGroup {
    name: String,
    fields: Vec<String>,
    mode: ValidationMode,
    invariant: Invariant,
}

impl FieldGroup {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Whether every member was written by a setter
    ///
    /// Defaults do not count: a group with a defaulted member is left to the
    /// final check in `build`.
    #[must_use]
    pub fn is_fully_set(&self, view: &FieldView<'_>) -> bool {
        self.fields.iter().all(|f| view.is_set(f))
    }

    /// Evaluate the invariant
    ///
    /// # Errors
    /// Returns `InvalidArgument` naming the group when the invariant fails
    pub fn validate(&self, view: &FieldView<'_>) -> ConstructionResult<()> {
        (self.invariant)(view).map_err(|reason| {
            tracing::debug!(group = %self.name, %reason, "field group invariant failed");
            ConstructionError::invalid_argument(self.name.clone(), reason)
        })
    }
}

impl Debug for FieldGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldGroup")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Validated declaration of one product's fields
#[derive(Debug)]
pub struct BuilderSchema {
    product: String,
    fields: IndexMap<String, FieldSpec>,
    groups: Vec<FieldGroup>,
}

impl BuilderSchema {
    /// Start declaring a schema for `product`
    #[inline]
    #[must_use]
    pub fn builder(product: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(product)
    }

    /// Product name recorded in every built [`Record`](crate::Record)
    #[inline]
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    /// Required fields in declaration order
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values().filter(|f| f.required)
    }

    #[inline]
    #[must_use]
    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    /// Groups that include `field`
    pub fn groups_of<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldGroup> + 'a {
        self.groups.iter().filter(move |g| g.contains(field))
    }

    /// Whether a setter on `field` validates immediately
    #[must_use]
    pub fn is_immediate(&self, field: &str) -> bool {
        self.groups_of(field)
            .any(|g| g.mode == ValidationMode::Immediate)
    }
}

/// Chained declaration of a [`BuilderSchema`]
///
/// The first declaration error is latched and reported by
/// [`finish`](Self::finish).
///
/// # Example
/// ```
/// use cocis_builder::{BuilderSchema, ValidationMode};
///
/// let schema = BuilderSchema::builder("viewport")
///     .required_int("zoom_min", 1, 100)
///     .required_int("zoom_max", 1, 100)
///     .optional("title", "untitled")
///     .group("zoom", &["zoom_min", "zoom_max"], ValidationMode::Immediate, |v| {
///         match (v.int("zoom_min"), v.int("zoom_max")) {
///             (Some(lo), Some(hi)) if lo > hi => Err(format!("{lo} > {hi}")),
///             _ => Ok(()),
///         }
///     })
///     .finish()
///     .unwrap();
///
/// assert_eq!(schema.required_fields().count(), 2);
/// ```
#[derive(Debug)]
pub struct SchemaBuilder {
    product: String,
    fields: IndexMap<String, FieldSpec>,
    groups: Vec<FieldGroup>,
    error: Option<ConstructionError>,
}

impl SchemaBuilder {
    /// Create an empty declaration for `product`
    #[must_use]
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            fields: IndexMap::new(),
            groups: Vec::new(),
            error: None,
        }
    }

    /// Declare a required field of `kind`
    #[must_use]
    pub fn required(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.field(name.into(), kind, true, None, None)
    }

    /// Declare a required integer field within `[min, max]`
    #[must_use]
    pub fn required_int(self, name: impl Into<String>, min: i64, max: i64) -> Self {
        self.field(name.into(), ValueKind::Int, true, Some((min, max)), None)
    }

    /// Declare an optional field; its kind is the kind of `default`
    #[must_use]
    pub fn optional(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        let default = default.into();
        self.field(name.into(), default.kind(), false, None, Some(default))
    }

    /// Declare an optional integer field within `[min, max]`
    #[must_use]
    pub fn optional_int(self, name: impl Into<String>, default: i64, min: i64, max: i64) -> Self {
        self.field(
            name.into(),
            ValueKind::Int,
            false,
            Some((min, max)),
            Some(Value::Int(default)),
        )
    }

    /// Declare a field group with a cross-field invariant
    #[must_use]
    pub fn group<F>(
        mut self,
        name: impl Into<String>,
        fields: &[&str],
        mode: ValidationMode,
        invariant: F,
    ) -> Self
    where
        F: Fn(&FieldView<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        if self.error.is_some() {
            return self;
        }
        let name = name.into();
        if fields.is_empty() {
            self.error = Some(ConstructionError::invalid_argument(
                name,
                "field group has no fields",
            ));
            return self;
        }
        if let Some(unknown) = fields.iter().find(|f| !self.fields.contains_key(**f)) {
            self.error = Some(ConstructionError::invalid_argument(
                name,
                format!("field group names unknown field '{unknown}'"),
            ));
            return self;
        }
        if self.groups.iter().any(|g| g.name == name) {
            self.error = Some(ConstructionError::invalid_argument(
                name,
                "duplicate field group",
            ));
            return self;
        }
        self.groups.push(FieldGroup {
            name,
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            mode,
            invariant: Arc::new(invariant),
        });
        self
    }

    /// Validate the declaration
    ///
    /// # Errors
    /// Returns the first declaration error as `InvalidArgument`
    pub fn finish(self) -> ConstructionResult<Arc<BuilderSchema>> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.product.trim().is_empty() {
            return Err(ConstructionError::invalid_argument(
                "product",
                "product name must not be empty",
            ));
        }
        Ok(Arc::new(BuilderSchema {
            product: self.product,
            fields: self.fields,
            groups: self.groups,
        }))
    }

    fn field(
        mut self,
        name: String,
        kind: ValueKind,
        required: bool,
        range: Option<(i64, i64)>,
        default: Option<Value>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        if name.trim().is_empty() {
            self.error = Some(ConstructionError::invalid_argument(
                "field",
                "field name must not be empty",
            ));
            return self;
        }
        if self.fields.contains_key(&name) {
            self.error = Some(ConstructionError::invalid_argument(name, "duplicate field"));
            return self;
        }
        if let Some((min, max)) = range {
            if min > max {
                self.error = Some(ConstructionError::invalid_argument(
                    name,
                    format!("empty range [{min}, {max}]"),
                ));
                return self;
            }
        }

        let spec = FieldSpec {
            name: name.clone(),
            kind,
            required,
            range,
            default,
        };
        if let Some(default) = &spec.default {
            if let Err(reason) = spec.check(default) {
                self.error = Some(ConstructionError::invalid_argument(
                    name,
                    format!("default does not fit its own declaration: {reason}"),
                ));
                return self;
            }
        }
        self.fields.insert(name, spec);
        self
    }
}
