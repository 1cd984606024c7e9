//! Market data node: populates the fetched-data keys the personas read

use crate::metrics;
use async_trait::async_trait;
use quorum_core::{AnalysisNode, NodeError, NodeOutput, StatePatch, StateSnapshot};
use quorum_data::{DataAdapter, DataError};
use std::sync::Arc;
use tracing::debug;

/// Fetches the committee's metric set through the data adapter
///
/// Required metrics (price data) fail the node when unavailable, which skips
/// every dependent persona; optional metrics are stored as null so personas
/// can degrade per criterion instead.
pub struct MarketDataNode {
    adapter: Arc<dyn DataAdapter>,
    metric_keys: Vec<String>,
}

impl MarketDataNode {
    pub const ID: &'static str = "market_data";

    /// Node fetching the standard committee metric set
    pub fn new(adapter: Arc<dyn DataAdapter>) -> Self {
        Self::with_metrics(adapter, metrics::standard_set())
    }

    /// Node fetching a custom metric set
    pub fn with_metrics(adapter: Arc<dyn DataAdapter>, metric_keys: Vec<String>) -> Self {
        Self {
            adapter,
            metric_keys,
        }
    }
}

#[async_trait]
impl AnalysisNode for MarketDataNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn produces(&self) -> Vec<String> {
        self.metric_keys.clone()
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let mut patch = StatePatch::new();
        for key in &self.metric_keys {
            match self
                .adapter
                .fetch(&state.instrument_id, key, state.as_of_time)
                .await
            {
                Ok(value) => patch.insert_fetched(key.clone(), value),
                Err(err @ DataError::Unavailable { .. })
                    if !metrics::REQUIRED.contains(&key.as_str()) =>
                {
                    debug!(metric = %key, error = %err, "optional metric unavailable");
                    patch.insert_fetched(key.clone(), serde_json::Value::Null);
                }
                Err(err) => return Err(NodeError::evaluation(err)),
            }
        }
        Ok(NodeOutput::default().with_patch(patch))
    }
}
