use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[serde(rename = "sum")]
    Add,
    #[serde(rename = "rest")]
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    /// Wire token, shared by the route segment and the stored history column.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Add => "sum",
            Operation::Subtract => "rest",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = EvalError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == token)
            .ok_or_else(|| EvalError::UnknownOperation(token.to_string()))
    }
}

/// Folds `-0.0` into `0.0`. SQLite keeps integral REALs as integers and
/// drops the sign, so every value that is echoed or stored goes through here.
pub fn canonical_number(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// One appended entry of the calculation log. Never mutated after the store
/// hands it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub operation: Operation,
    pub a: f64,
    pub b: f64,
    pub result: f64,
    pub date: DateTime<Utc>,
}
