use serde::{Deserialize, Serialize};

use crate::domain::HistoryRecord;

/// Raw operands as they arrive on the query string. Kept as text so that a
/// missing or malformed value is reported by the evaluator, not the extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperandsQuery {
    #[serde(default)]
    pub a: Option<String>,
    #[serde(default)]
    pub b: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeResponse {
    pub a: f64,
    pub b: f64,
    pub resultado: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryRecord>,
}
