use thiserror::Error;

/// Why a native function refused its arguments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("expected {expected} argument(s), found {found}")]
    Arity { expected: usize, found: usize },
    #[error("argument {index} must be {expected}")]
    Type { index: usize, expected: &'static str },
}

impl CallError {
    pub(crate) fn arity(expected: usize, found: usize) -> Self {
        CallError::Arity { expected, found }
    }

    pub(crate) fn ty(index: usize, expected: &'static str) -> Self {
        CallError::Type { index, expected }
    }
}

/// A statement-level evaluation failure. Only the failing statement loses its value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("{name}: {source}")]
    Call { name: String, source: CallError },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no formula has been parsed")]
    NotParsed,
    #[error("parsing was aborted")]
    Aborted,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
