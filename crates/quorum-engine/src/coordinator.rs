//! The run coordinator: one end-to-end execution per call

use crate::engine::{EngineConfig, ExecutionEngine};
use crate::result::{RunResult, RunStatus};
use chrono::{DateTime, Utc};
use quorum_core::{AnalysisState, Decision, keys};
use quorum_graph::DependencyGraph;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything a run starts from: instrument identity, point in time, and any
/// externally supplied seed values (e.g. portfolio context)
#[derive(Debug, Clone)]
pub struct RunSeed {
    pub instrument_id: String,
    pub as_of_time: DateTime<Utc>,
    values: HashMap<String, serde_json::Value>,
}

impl RunSeed {
    /// Seed for analyzing `instrument_id` as of `as_of_time`
    pub fn new(instrument_id: impl Into<String>, as_of_time: DateTime<Utc>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            as_of_time,
            values: HashMap::new(),
        }
    }

    /// Seed for analyzing `instrument_id` as of now
    pub fn now(instrument_id: impl Into<String>) -> Self {
        Self::new(instrument_id, Utc::now())
    }

    /// Add an externally supplied seed value
    ///
    /// The key must be declared via `GraphBuilder::seed_key` for nodes to
    /// depend on it.
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Add a typed seed value; fails only on a serialization contract
    /// violation by the caller
    pub fn with_value_typed<T: serde::Serialize>(
        self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        let json_value = serde_json::to_value(value)?;
        Ok(self.with_value(key, json_value))
    }

    fn into_state(self) -> AnalysisState {
        let mut state = AnalysisState::new(self.instrument_id, self.as_of_time);
        for (key, value) in self.values {
            state = state.with_seed_value(key, value);
        }
        state
    }
}

/// Orchestrates one end-to-end run: seeds the state, delegates to the
/// execution engine, extracts the decision and packages the result
///
/// The coordinator never retries; retry policy belongs to the caller, which
/// may re-invoke `execute` with a fresh seed. Node-level problems never
/// surface as errors here: callers always receive a [`RunResult`] with
/// failure detail inside `node_failures`.
pub struct RunCoordinator {
    engine: ExecutionEngine,
    run_timeout: Option<Duration>,
}

impl Default for RunCoordinator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RunCoordinator {
    /// Create a coordinator with the given engine configuration
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: ExecutionEngine::new(config),
            run_timeout: None,
        }
    }

    /// Bound the whole run; on expiry the run is cancelled at the next wave
    /// boundary and reported as partial
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Execute one run to completion (or cancellation)
    pub async fn execute(&self, graph: &DependencyGraph, seed: RunSeed) -> RunResult {
        let cancel = CancellationToken::new();
        self.execute_with_cancellation(graph, seed, &cancel).await
    }

    /// Execute one run under a caller-supplied cancellation token
    ///
    /// Cancellation lets already-dispatched nodes finish their wave (bounded
    /// by their timeout) rather than killing them mid-write; pending nodes
    /// are recorded as `Cancelled`.
    pub async fn execute_with_cancellation(
        &self,
        graph: &DependencyGraph,
        seed: RunSeed,
        cancel: &CancellationToken,
    ) -> RunResult {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            instrument = %seed.instrument_id,
            nodes = graph.len(),
            "starting analysis run"
        );

        let deadline_guard = self.run_timeout.map(|limit| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!(?limit, "run deadline reached, cancelling pending waves");
                cancel.cancel();
            })
        });

        let outcome = self.engine.run(graph, seed.into_state(), cancel).await;

        if let Some(guard) = deadline_guard {
            guard.abort();
        }

        let decision = match outcome.state.get_typed::<Decision>(keys::DECISION) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(error = %err, "decision state entry has unexpected shape");
                None
            }
        };

        let status = if outcome.cancelled {
            RunStatus::Partial
        } else if outcome.failures.is_empty() {
            RunStatus::Complete
        } else if decision.is_some() {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        };

        info!(
            %run_id,
            ?status,
            signals = outcome.state.signals().len(),
            failures = outcome.failures.len(),
            "analysis run finished"
        );

        RunResult {
            run_id,
            status,
            decision,
            all_signals: outcome.state.signals().to_vec(),
            node_failures: outcome.failures,
        }
    }
}
