//! Error taxonomy shared by every COCIS component
//!
//! Every failure is a typed [`ConstructionError`] distinguishable by
//! [`ErrorKind`]. The enum is `Clone` so that a single producer failure can be
//! handed to every caller that was waiting on the same in-flight key.

use std::fmt::{self, Display, Formatter};

/// Why a required builder field is not usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    /// No value was supplied
    Absent,

    /// A value was supplied but has the wrong kind
    WrongKind {
        expected: &'static str,
        actual: &'static str,
    },

    /// A value was supplied but lies outside the declared range
    OutOfRange { value: i64, min: i64, max: i64 },
}

impl Display for MissingReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "no value supplied"),
            Self::WrongKind { expected, actual } => {
                write!(f, "expected {expected}, got {actual}")
            }
            Self::OutOfRange { value, min, max } => {
                write!(f, "{value} outside [{min}, {max}]")
            }
        }
    }
}

/// Why a guarded construction was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationReason {
    /// The type's guard token was already issued
    AlreadyAcquired,

    /// An out-of-band construction path was attempted
    BypassRejected,
}

impl Display for ViolationReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyAcquired => write!(f, "guard token already issued"),
            Self::BypassRejected => write!(f, "privileged construction path rejected"),
        }
    }
}

/// Errors raised by factories, builders, caches and guards
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// A supplied parameter or field value violates a declared constraint
    #[error("invalid argument '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    /// A required builder field is absent or structurally invalid
    #[error("missing required field '{field}': {reason}")]
    MissingRequiredField {
        field: String,
        reason: MissingReason,
    },

    /// `build` was invoked on a session that already produced its product
    #[error("builder already consumed")]
    BuilderAlreadyConsumed,

    /// A factory name was registered twice
    #[error("duplicate registration: '{0}'")]
    DuplicateRegistration(String),

    /// `create` was invoked with an unregistered name
    #[error("not found: '{0}'")]
    NotFound(String),

    /// A second instance of a guarded type was attempted
    #[error("policy violation for {type_key}: {reason}")]
    PolicyViolation {
        type_key: String,
        reason: ViolationReason,
    },

    /// A constructor or producer reported its own failure
    #[error("producer for '{name}' failed: {reason}")]
    ProducerFailed { name: String, reason: String },
}

impl ConstructionError {
    /// Create invalid argument error
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create missing required field error
    pub fn missing(field: impl Into<String>, reason: MissingReason) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            reason,
        }
    }

    /// Create policy violation error
    pub fn policy_violation(type_key: impl Into<String>, reason: ViolationReason) -> Self {
        Self::PolicyViolation {
            type_key: type_key.into(),
            reason,
        }
    }

    /// Create producer failure error
    pub fn producer_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProducerFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Field-less classification of this error
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::MissingRequiredField { .. } => ErrorKind::MissingRequiredField,
            Self::BuilderAlreadyConsumed => ErrorKind::BuilderAlreadyConsumed,
            Self::DuplicateRegistration(_) => ErrorKind::DuplicateRegistration,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PolicyViolation { .. } => ErrorKind::PolicyViolation,
            Self::ProducerFailed { .. } => ErrorKind::ProducerFailed,
        }
    }

    /// Whether the caller may retry the same operation
    ///
    /// Only producer failures leave no committed state behind.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProducerFailed { .. })
    }
}

/// Classification of [`ConstructionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    MissingRequiredField,
    BuilderAlreadyConsumed,
    DuplicateRegistration,
    NotFound,
    PolicyViolation,
    ProducerFailed,
}

/// Result alias for construction operations
pub type ConstructionResult<T> = Result<T, ConstructionError>;
