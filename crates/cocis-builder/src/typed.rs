//! Typed products on top of [`BuilderSession`]

use crate::record::Record;
use crate::schema::BuilderSchema;
use crate::session::BuilderSession;
use cocis_types::{ConstructionError, ConstructionResult, Params, Value};
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

/// A product type built from a validated [`Record`]
pub trait Buildable: Sized {
    /// Schema every session for this type uses
    ///
    /// # Errors
    /// Returns the schema's declaration error
    fn schema() -> ConstructionResult<Arc<BuilderSchema>>;

    /// Convert a record that passed the schema's validation
    ///
    /// # Errors
    /// Returns `InvalidArgument` if a field cannot be converted
    fn from_record(record: &Record) -> ConstructionResult<Self>;
}

/// Builder session producing `T`
///
/// [`stage`](Self::stage) keeps the first setter error and reports it from
/// [`build`](Self::build), which lets typed `with_<field>` setters return
/// `&mut Self`.
pub struct TypedSession<T: Buildable> {
    session: BuilderSession,
    latched: Option<ConstructionError>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Buildable> TypedSession<T> {
    /// Session with required fields supplied up front
    ///
    /// # Errors
    /// See [`BuilderSession::new`]
    pub fn new(required: Params) -> ConstructionResult<Self> {
        Ok(Self::wrap(BuilderSession::new(T::schema()?, required)?))
    }

    /// Empty session
    ///
    /// # Errors
    /// Returns the schema's declaration error
    pub fn staged() -> ConstructionResult<Self> {
        Ok(Self::wrap(BuilderSession::staged(T::schema()?)))
    }

    fn wrap(session: BuilderSession) -> Self {
        Self {
            session,
            latched: None,
            _marker: PhantomData,
        }
    }

    /// Set `field`, failing fast
    ///
    /// # Errors
    /// See [`BuilderSession::set`]
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> ConstructionResult<&mut Self> {
        self.session.set(field, value)?;
        Ok(self)
    }

    /// Set `field`, deferring any error to `build`
    ///
    /// Once an error is latched, later stages are ignored.
    pub fn stage(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        if self.latched.is_none() {
            if let Err(error) = self.session.set(field, value) {
                tracing::debug!(field, %error, "staged setter rejected");
                self.latched = Some(error);
            }
        }
        self
    }

    /// First error latched by [`stage`](Self::stage)
    #[inline]
    #[must_use]
    pub fn latched_error(&self) -> Option<&ConstructionError> {
        self.latched.as_ref()
    }

    /// Build the typed product
    ///
    /// # Errors
    /// The latched setter error if any, otherwise see
    /// [`BuilderSession::build`] and [`Buildable::from_record`]
    pub fn build(&mut self) -> ConstructionResult<T> {
        if let Some(error) = &self.latched {
            return Err(error.clone());
        }
        let record = self.session.build()?;
        T::from_record(&record)
    }

    /// Build, returning the record alongside the typed product
    ///
    /// # Errors
    /// Same as [`build`](Self::build)
    pub fn build_with_record(&mut self) -> ConstructionResult<(T, Record)> {
        if let Some(error) = &self.latched {
            return Err(error.clone());
        }
        let record = self.session.build()?;
        Ok((T::from_record(&record)?, record))
    }

    #[inline]
    #[must_use]
    pub fn session(&self) -> &BuilderSession {
        &self.session
    }
}

impl<T: Buildable> Debug for TypedSession<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSession")
            .field("product", &std::any::type_name::<T>())
            .field("session", &self.session)
            .field("latched", &self.latched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValidationMode;
    use cocis_types::ErrorKind;

    #[derive(Debug, PartialEq)]
    struct Span {
        start: i64,
        end: i64,
    }

    impl Buildable for Span {
        fn schema() -> ConstructionResult<Arc<BuilderSchema>> {
            BuilderSchema::builder("span")
                .required_int("start", 0, 100)
                .required_int("end", 0, 100)
                .group("order", &["start", "end"], ValidationMode::Deferred, |v| {
                    match (v.int("start"), v.int("end")) {
                        (Some(s), Some(e)) if s > e => Err("start after end".into()),
                        _ => Ok(()),
                    }
                })
                .finish()
        }

        fn from_record(record: &Record) -> ConstructionResult<Self> {
            Ok(Self {
                start: record.int("start")?,
                end: record.int("end")?,
            })
        }
    }

    #[test]
    fn staged_setters_chain() {
        let span = TypedSession::<Span>::staged()
            .unwrap()
            .stage("start", 3)
            .stage("end", 9)
            .build()
            .unwrap();
        assert_eq!(span, Span { start: 3, end: 9 });
    }

    #[test]
    fn stage_latches_first_error() {
        let mut session = TypedSession::<Span>::staged().unwrap();
        session.stage("middle", 1).stage("start", 2).stage("end", 1);

        let err = session.build().unwrap_err();
        assert!(err.to_string().contains("middle"));
        assert_eq!(session.latched_error(), Some(&err));
    }

    #[test]
    fn invariant_checked_at_build() {
        let mut session = TypedSession::<Span>::new(Params::new().with("start", 9).with("end", 2)).unwrap();
        assert_eq!(session.build().unwrap_err().kind(), ErrorKind::InvalidArgument);

        session.set("end", 20).unwrap();
        let (span, record) = session.build_with_record().unwrap();
        assert_eq!(span.end, 20);
        assert_eq!(record.product(), "span");
    }
}
