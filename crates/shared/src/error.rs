use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidQuery,
    InvalidOperand,
    NonFiniteResult,
    DivisionByZero,
    UnknownOperation,
    StorageUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::StorageUnavailable, err.to_string())
    }
}

/// Failures of the arithmetic evaluator. None of them touch the history.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("operand `{name}` is not a finite number: {raw:?}")]
    InvalidOperand { name: &'static str, raw: String },
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result of {operation} is not finite")]
    NonFiniteResult { operation: &'static str },
}

impl EvalError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EvalError::InvalidOperand { .. } => ErrorCode::InvalidOperand,
            EvalError::UnknownOperation(_) => ErrorCode::UnknownOperation,
            EvalError::DivisionByZero => ErrorCode::DivisionByZero,
            EvalError::NonFiniteResult { .. } => ErrorCode::NonFiniteResult,
        }
    }
}

impl From<EvalError> for ApiError {
    fn from(value: EvalError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
