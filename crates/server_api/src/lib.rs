use std::sync::Arc;

use shared::{
    domain::HistoryRecord,
    error::ApiError,
    protocol::{ComputeResponse, OperandsQuery},
};
use storage::HistoryStore;
use tracing::{debug, error, info, warn};

pub mod evaluator;

use evaluator::evaluate_raw;

#[derive(Clone)]
pub struct ApiContext {
    pub history: Arc<dyn HistoryStore>,
}

impl ApiContext {
    pub fn new(history: impl HistoryStore + 'static) -> Self {
        Self {
            history: Arc::new(history),
        }
    }
}

/// Evaluates `token` over the query operands and appends the outcome.
///
/// Evaluation failures return before the history is touched.
pub async fn compute(
    ctx: &ApiContext,
    token: &str,
    query: &OperandsQuery,
) -> Result<ComputeResponse, ApiError> {
    let evaluation =
        evaluate_raw(token, query.a.as_deref(), query.b.as_deref()).map_err(|err| {
            warn!(operation = token, %err, "evaluation rejected");
            ApiError::from(err)
        })?;

    ctx.history
        .append(
            evaluation.operation,
            evaluation.a,
            evaluation.b,
            evaluation.result,
        )
        .await
        .map_err(|err| {
            error!(
                operation = token,
                error = %format!("{err:#}"),
                "failed to append history record"
            );
            unavailable()
        })?;

    info!(
        operation = token,
        a = evaluation.a,
        b = evaluation.b,
        result = evaluation.result,
        "operation succeeded"
    );
    Ok(ComputeResponse {
        a: evaluation.a,
        b: evaluation.b,
        resultado: evaluation.result,
    })
}

/// Snapshot of the log, oldest first, optionally cut to the newest `limit`.
pub async fn history(
    ctx: &ApiContext,
    limit: Option<u32>,
) -> Result<Vec<HistoryRecord>, ApiError> {
    let records = match limit {
        Some(limit) => ctx.history.recent(limit).await,
        None => ctx.history.list().await,
    }
    .map_err(|err| {
        error!(error = %format!("{err:#}"), "failed to read history");
        unavailable()
    })?;
    debug!(count = records.len(), ?limit, "history read");
    Ok(records)
}

// Callers log the cause; the client only learns that storage is down.
fn unavailable() -> ApiError {
    ApiError::storage("history storage unavailable")
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
