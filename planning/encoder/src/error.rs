use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Kind of entity referenced by an index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EntityKind {
    Literal,
    Fluent,
    Action,
    Layer,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Literal => write!(f, "literal"),
            EntityKind::Fluent => write!(f, "fluent"),
            EntityKind::Action => write!(f, "action"),
            EntityKind::Layer => write!(f, "layer"),
        }
    }
}

/// Failure to build a formula.
///
/// Apart from [`EncodingError::HorizonCeiling`] and [`EncodingError::InexactValue`], all variants
/// denote a defect of the input problem or of the caller, and are not expected to disappear on a retry.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum EncodingError {
    #[error("{kind} index {index} is out of range (size: {size})")]
    IndexOutOfRange { kind: EntityKind, index: usize, size: usize },
    #[error("index space mismatch: {0}")]
    IndexSpaceMismatch(String),
    #[error("{node} is not allowed in {context}")]
    ModeMismatch { context: String, node: &'static str },
    #[error("malformed duration for action `{action}`: {reason}")]
    MalformedDuration { action: String, reason: String },
    #[error("fluent `{0}` has no initial value")]
    UndefinedFluent(String),
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0} is out of the representable range")]
    NumericRange(String),
    #[error("horizon {horizon} exceeds the configured ceiling {ceiling}")]
    HorizonCeiling { horizon: usize, ceiling: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no formula has been encoded")]
    NotEncoded,
    #[error("the solution gives `{0}` a value that is not a 64-bit rational")]
    InexactValue(String),
}

impl EncodingError {
    /// True if the error denotes the exhaustion of a configured resource rather than a structural defect.
    pub fn is_resource(&self) -> bool {
        matches!(self, EncodingError::HorizonCeiling { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_errors() {
        assert!(EncodingError::HorizonCeiling { horizon: 5, ceiling: 4 }.is_resource());
        assert!(!EncodingError::DivisionByZero.is_resource());
        assert_eq!(
            EncodingError::IndexOutOfRange {
                kind: EntityKind::Fluent,
                index: 3,
                size: 2
            }
            .to_string(),
            "fluent index 3 is out of range (size: 2)"
        );
    }
}
