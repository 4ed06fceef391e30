//! Staged construction sessions
//!
//! A [`BuilderSession`] accumulates field values for one product and turns
//! them into an immutable [`Record`] once every required field is present and
//! every field-group invariant holds.

use crate::record::Record;
use crate::schema::{BuilderSchema, FieldView, ValidationMode};
use cocis_types::{ConstructionError, ConstructionResult, MissingReason, Params, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Mutable accumulator for one product
///
/// # Validation
/// - Fields in an [`Immediate`](ValidationMode::Immediate) group are checked by
///   the setter (kind, range, and the group invariant once every member of
///   the group was explicitly set); a rejected value is not stored.
/// - A group invariant that depends on a default is checked by `build` only,
///   so the outcome never depends on the order of writes to distinct fields.
/// - Every other field is stored as given and checked by [`build`](Self::build).
///
/// # Lifecycle
/// A successful `build` consumes the session; afterwards every setter and
/// `build` return `BuilderAlreadyConsumed`. A failed `build` leaves the
/// session as it was.
///
/// # Example
/// ```
/// use cocis_builder::{BuilderSchema, BuilderSession};
/// use cocis_types::Params;
///
/// let schema = BuilderSchema::builder("rectangle")
///     .required_int("width", 1, 1000)
///     .required_int("height", 1, 1000)
///     .optional("color", "black")
///     .finish()
///     .unwrap();
///
/// let mut session =
///     BuilderSession::new(schema, Params::new().with("width", 4).with("height", 3)).unwrap();
/// let rect = session.set("color", "red").unwrap().build().unwrap();
/// assert_eq!(rect.text("color").unwrap(), "red");
/// ```
#[derive(Debug)]
pub struct BuilderSession {
    schema: Arc<BuilderSchema>,
    values: BTreeMap<String, Value>,
    consumed: bool,
}

impl BuilderSession {
    /// Create a session with its required fields supplied up front
    ///
    /// Entries of `required` naming optional fields are applied as setters.
    ///
    /// # Errors
    /// - `MissingRequiredField` if a required value is absent, of the wrong
    ///   kind, or out of range
    /// - `InvalidArgument` for unknown fields, or an immediate group whose
    ///   invariant already fails
    pub fn new(schema: Arc<BuilderSchema>, required: Params) -> ConstructionResult<Self> {
        let mut session = Self::staged(schema);

        for spec in session.schema.required_fields() {
            let value = required
                .get(spec.name())
                .ok_or_else(|| ConstructionError::missing(spec.name(), MissingReason::Absent))?;
            spec.check(value)
                .map_err(|reason| ConstructionError::missing(spec.name(), reason))?;
            session.values.insert(spec.name().to_string(), value.clone());
        }

        for (name, value) in required.iter() {
            if !session.values.contains_key(name) {
                session.set(name, value.clone())?;
            }
        }

        session.check_immediate_groups()?;
        Ok(session)
    }

    /// Create an empty session; required fields are checked by `build`
    #[must_use]
    pub fn staged(schema: Arc<BuilderSchema>) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
            consumed: false,
        }
    }

    /// Set `field`, replacing any earlier value
    ///
    /// # Errors
    /// - `BuilderAlreadyConsumed` after a successful `build`
    /// - `InvalidArgument` for an unknown field, or an immediate-group field
    ///   whose value or group invariant is rejected
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> ConstructionResult<&mut Self> {
        if self.consumed {
            return Err(ConstructionError::BuilderAlreadyConsumed);
        }
        let spec = self.schema.field(field).ok_or_else(|| {
            ConstructionError::invalid_argument(
                field,
                format!("unknown field for {}", self.schema.product()),
            )
        })?;
        let value = value.into();

        if !self.schema.is_immediate(field) {
            self.values.insert(field.to_string(), value);
            return Ok(self);
        }

        spec.check(&value)
            .map_err(|reason| ConstructionError::invalid_argument(field, reason.to_string()))?;

        let previous = self.values.insert(field.to_string(), value);
        let view = FieldView::new(&self.schema, &self.values);
        let verdict = self
            .schema
            .groups_of(field)
            .filter(|g| g.mode() == ValidationMode::Immediate && g.is_fully_set(&view))
            .try_for_each(|g| g.validate(&view));

        if let Err(error) = verdict {
            match previous {
                Some(previous) => self.values.insert(field.to_string(), previous),
                None => self.values.remove(field),
            };
            return Err(error);
        }
        Ok(self)
    }

    /// Validate every field and produce the immutable product
    ///
    /// # Errors
    /// - `BuilderAlreadyConsumed` if this session already built its product
    /// - `MissingRequiredField` for an absent or structurally invalid
    ///   required field
    /// - `InvalidArgument` for an invalid optional field or a failing group
    ///   invariant
    pub fn build(&mut self) -> ConstructionResult<Record> {
        if self.consumed {
            return Err(ConstructionError::BuilderAlreadyConsumed);
        }

        let mut fields = BTreeMap::new();
        for spec in self.schema.fields() {
            let value = match (self.values.get(spec.name()), spec.default_value()) {
                (Some(value), _) => {
                    spec.check(value).map_err(|reason| {
                        if spec.is_required() {
                            ConstructionError::missing(spec.name(), reason)
                        } else {
                            ConstructionError::invalid_argument(spec.name(), reason.to_string())
                        }
                    })?;
                    value
                }
                (None, Some(default)) => default,
                (None, None) => {
                    return Err(ConstructionError::missing(
                        spec.name(),
                        MissingReason::Absent,
                    ))
                }
            };
            fields.insert(spec.name().to_string(), value.clone());
        }

        let view = FieldView::new(&self.schema, &self.values);
        for group in self.schema.groups() {
            group.validate(&view)?;
        }

        self.consumed = true;
        tracing::debug!(
            product = %self.schema.product(),
            fields = fields.len(),
            "builder session produced record"
        );
        Ok(Record::new(self.schema.product().to_string(), fields))
    }

    /// Effective value of `field`: the set value or its default
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        FieldView::new(&self.schema, &self.values).get(field)
    }

    #[inline]
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<BuilderSchema> {
        &self.schema
    }

    fn check_immediate_groups(&self) -> ConstructionResult<()> {
        let view = FieldView::new(&self.schema, &self.values);
        self.schema
            .groups()
            .iter()
            .filter(|g| g.mode() == ValidationMode::Immediate && g.is_fully_set(&view))
            .try_for_each(|g| g.validate(&view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cocis_types::ErrorKind;
    use pretty_assertions::assert_eq;

    fn rectangle() -> Arc<BuilderSchema> {
        BuilderSchema::builder("rectangle")
            .required_int("width", 1, 1000)
            .required_int("height", 1, 1000)
            .optional("color", "black")
            .finish()
            .unwrap()
    }

    fn zoom() -> Arc<BuilderSchema> {
        BuilderSchema::builder("viewport")
            .optional_int("zoom_min", 1, 1, 100)
            .optional_int("zoom_max", 10, 1, 100)
            .group(
                "zoom",
                &["zoom_min", "zoom_max"],
                ValidationMode::Immediate,
                |v| match (v.int("zoom_min"), v.int("zoom_max")) {
                    (Some(lo), Some(hi)) if lo > hi => Err(format!("zoom_min {lo} > zoom_max {hi}")),
                    _ => Ok(()),
                },
            )
            .finish()
            .unwrap()
    }

    fn size(width: i64, height: i64) -> Params {
        Params::new().with("width", width).with("height", height)
    }

    #[test]
    fn new_applies_defaults() {
        let record = BuilderSession::new(rectangle(), size(4, 3))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(record.int("width").unwrap(), 4);
        assert_eq!(record.int("height").unwrap(), 3);
        assert_eq!(record.text("color").unwrap(), "black");
        assert_eq!(record.product(), "rectangle");
    }

    #[test]
    fn new_rejects_absent_required_field() {
        let err = BuilderSession::new(rectangle(), Params::new().with("width", 4)).unwrap_err();
        assert_eq!(err, ConstructionError::missing("height", MissingReason::Absent));
    }

    #[test]
    fn new_rejects_structurally_invalid_required_field() {
        let err = BuilderSession::new(rectangle(), size(0, 3)).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::missing(
                "width",
                MissingReason::OutOfRange {
                    value: 0,
                    min: 1,
                    max: 1000
                }
            )
        );

        let err = BuilderSession::new(
            rectangle(),
            Params::new().with("width", "wide").with("height", 3),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredField);
    }

    #[test]
    fn new_rejects_unknown_field() {
        let err = BuilderSession::new(rectangle(), size(1, 1).with("depth", 2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn staged_build_reports_missing_field() {
        let mut session = BuilderSession::staged(rectangle());
        session.set("height", 3).unwrap();

        let err = session.build().unwrap_err();
        assert_eq!(err, ConstructionError::missing("width", MissingReason::Absent));
        assert!(!session.is_consumed());

        let record = session.set("width", 2).unwrap().build().unwrap();
        assert_eq!(record.int("width").unwrap(), 2);
    }

    #[test]
    fn build_consumes_session() {
        let mut session = BuilderSession::new(rectangle(), size(4, 3)).unwrap();
        session.build().unwrap();

        assert_eq!(
            session.build().unwrap_err(),
            ConstructionError::BuilderAlreadyConsumed
        );
        assert_eq!(
            session.set("color", "red").unwrap_err(),
            ConstructionError::BuilderAlreadyConsumed
        );
    }

    #[test]
    fn last_write_wins() {
        let mut session = BuilderSession::new(rectangle(), size(4, 3)).unwrap();
        session.set("color", "red").unwrap().set("color", "blue").unwrap();
        assert_eq!(session.build().unwrap().text("color").unwrap(), "blue");
    }

    #[test]
    fn deferred_field_errors_surface_at_build() {
        let mut session = BuilderSession::new(rectangle(), size(4, 3)).unwrap();
        session.set("color", 7).unwrap();

        let err = session.build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!session.is_consumed());
    }

    #[test]
    fn immediate_group_fails_fast_without_storing() {
        let mut session = BuilderSession::staged(zoom());
        session.set("zoom_max", 20).unwrap();

        let err = session.set("zoom_min", 50).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(session.get("zoom_min"), Some(&Value::Int(1)));

        let err = session.set("zoom_max", 500).unwrap_err();
        assert!(err.to_string().contains("zoom_max"));
        assert_eq!(session.get("zoom_max"), Some(&Value::Int(20)));
    }

    #[test]
    fn immediate_rejection_restores_previous_value() {
        let mut session = BuilderSession::staged(zoom());
        session.set("zoom_min", 5).unwrap();
        session.set("zoom_max", 6).unwrap();

        assert!(session.set("zoom_min", 7).is_err());
        assert_eq!(session.get("zoom_min"), Some(&Value::Int(5)));

        let record = session.build().unwrap();
        assert_eq!(record.int("zoom_min").unwrap(), 5);
    }

    #[test]
    fn defaults_do_not_trigger_immediate_invariant() {
        let mut forward = BuilderSession::staged(zoom());
        forward.set("zoom_min", 50).unwrap().set("zoom_max", 60).unwrap();

        let mut backward = BuilderSession::staged(zoom());
        backward.set("zoom_max", 60).unwrap().set("zoom_min", 50).unwrap();

        assert_eq!(forward.build().unwrap(), backward.build().unwrap());
    }

    #[test]
    fn invariant_against_default_is_checked_at_build() {
        let mut session = BuilderSession::staged(zoom());
        session.set("zoom_min", 50).unwrap();

        let err = session.build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!session.is_consumed());

        session.set("zoom_max", 80).unwrap();
        assert_eq!(session.build().unwrap().int("zoom_max").unwrap(), 80);
    }

    #[test]
    fn deferred_group_fails_at_build() {
        let schema = BuilderSchema::builder("rectangle")
            .required_int("width", 1, 1000)
            .required_int("height", 1, 1000)
            .group(
                "area",
                &["width", "height"],
                ValidationMode::Deferred,
                |v| match (v.int("width"), v.int("height")) {
                    (Some(w), Some(h)) if w * h > 10_000 => Err(format!("area {} too large", w * h)),
                    _ => Ok(()),
                },
            )
            .finish()
            .unwrap();

        let mut session = BuilderSession::new(schema, size(200, 100)).unwrap();
        let err = session.build().unwrap_err();
        assert_eq!(err, ConstructionError::invalid_argument("area", "area 20000 too large"));

        session.set("height", 50).unwrap();
        assert_eq!(session.build().unwrap().int("height").unwrap(), 50);
    }
}
