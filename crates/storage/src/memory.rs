use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{canonical_number, HistoryRecord, Operation};
use tokio::sync::RwLock;

use crate::{next_timestamp, HistoryStore};

/// Process-local history. Lost on restart.
#[derive(Clone, Default)]
pub struct MemoryHistory {
    records: Arc<RwLock<Vec<HistoryRecord>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(
        &self,
        operation: Operation,
        a: f64,
        b: f64,
        result: f64,
    ) -> Result<HistoryRecord> {
        let mut records = self.records.write().await;
        let record = HistoryRecord {
            operation,
            a: canonical_number(a),
            b: canonical_number(b),
            result: canonical_number(result),
            date: next_timestamp(records.last().map(|r| r.date)),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<HistoryRecord>> {
        let records = self.records.read().await;
        let skip = records.len().saturating_sub(limit as usize);
        Ok(records[skip..].to_vec())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
