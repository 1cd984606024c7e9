//! Shared per-run analysis state and the patch-based merge model
//!
//! One `AnalysisState` exists per run. Nodes never hold a writable alias to
//! it: they receive a read-only snapshot (`Arc<AnalysisState>`) of the state
//! as of the start of their wave and propose writes as a `StatePatch`, which
//! the engine applies at the wave barrier.

use crate::error::NodeError;
use crate::signal::Signal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Well-known state keys
pub mod keys {
    /// Instrument under analysis, always present in the seed
    pub const INSTRUMENT_ID: &str = "instrument_id";
    /// Point in time the run analyzes, always present in the seed
    pub const AS_OF_TIME: &str = "as_of_time";
    /// Reserved key the aggregation stage writes the final `Decision` under
    pub const DECISION: &str = "decision";
}

/// Read-only handle onto a consistent state snapshot for one wave
pub type StateSnapshot = Arc<AnalysisState>;

/// Key-scoped write set a node proposes against the shared state
///
/// Fetched data (externally sourced values) and derived metrics (computed
/// analysis output) live in separate sections, mirroring the two maps of
/// `AnalysisState`. Keys are bare names; a key may appear in either section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatePatch {
    fetched: HashMap<String, serde_json::Value>,
    derived: HashMap<String, serde_json::Value>,
}

impl StatePatch {
    /// Create an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a write into the fetched-data section
    pub fn insert_fetched(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.fetched.insert(key.into(), value);
    }

    /// Stage a write into the derived-metrics section
    pub fn insert_derived(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.derived.insert(key.into(), value);
    }

    /// Stage a typed write into the derived-metrics section
    pub fn insert_derived_typed<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), NodeError> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| NodeError::MalformedOutput(format!("failed to serialize patch value: {e}")))?;
        self.derived.insert(key.into(), json_value);
        Ok(())
    }

    /// All keys this patch writes, across both sections
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fetched.keys().chain(self.derived.keys()).map(String::as_str)
    }

    /// Number of staged writes
    pub fn len(&self) -> usize {
        self.fetched.len() + self.derived.len()
    }

    /// Whether the patch stages no writes
    pub fn is_empty(&self) -> bool {
        self.fetched.is_empty() && self.derived.is_empty()
    }

    pub(crate) fn into_sections(
        self,
    ) -> (
        HashMap<String, serde_json::Value>,
        HashMap<String, serde_json::Value>,
    ) {
        (self.fetched, self.derived)
    }
}

/// Mutable document shared across the nodes of one run
///
/// Mutation goes exclusively through [`AnalysisState::apply_patch`] and
/// [`AnalysisState::insert_signal`], both called only by the engine at wave
/// barriers. The state is destroyed at end of run unless the coordinator
/// retains it for audit.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisState {
    /// Instrument under analysis
    pub instrument_id: String,
    /// Point in time the run analyzes
    pub as_of_time: DateTime<Utc>,
    fetched_data: HashMap<String, serde_json::Value>,
    derived_metrics: HashMap<String, serde_json::Value>,
    signals: Vec<Signal>,
}

impl AnalysisState {
    /// Create the seed state for one run
    pub fn new(instrument_id: impl Into<String>, as_of_time: DateTime<Utc>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            as_of_time,
            fetched_data: HashMap::new(),
            derived_metrics: HashMap::new(),
            signals: Vec::new(),
        }
    }

    /// Seed an externally supplied value (e.g. portfolio context) before the run
    pub fn with_seed_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fetched_data.insert(key.into(), value);
        self
    }

    /// Look up a key across the seed fields, fetched data and derived metrics
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            keys::INSTRUMENT_ID => Some(serde_json::Value::String(self.instrument_id.clone())),
            keys::AS_OF_TIME => serde_json::to_value(self.as_of_time).ok(),
            _ => self
                .fetched_data
                .get(key)
                .or_else(|| self.derived_metrics.get(key))
                .cloned(),
        }
    }

    /// Look up a key and deserialize it into `T`
    ///
    /// `Ok(None)` means the key is absent or explicitly null; a present value
    /// that does not deserialize is an evaluation error for the caller.
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>, NodeError> {
        match self.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value(value).map_err(|e| {
                    NodeError::Evaluation(format!("state key '{key}' has unexpected shape: {e}"))
                })?;
                Ok(Some(typed))
            }
        }
    }

    /// Look up a numeric key
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    /// Whether a key is present (seed, fetched or derived)
    pub fn contains_key(&self, key: &str) -> bool {
        key == keys::INSTRUMENT_ID
            || key == keys::AS_OF_TIME
            || self.fetched_data.contains_key(key)
            || self.derived_metrics.contains_key(key)
    }

    /// Signals merged so far, in committee registration order
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// The signal emitted by a given node, if merged
    pub fn signal_from(&self, node_id: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.source == node_id)
    }

    /// Apply a node's patch; called by the engine at the wave barrier
    pub fn apply_patch(&mut self, patch: StatePatch) {
        let (fetched, derived) = patch.into_sections();
        self.fetched_data.extend(fetched);
        self.derived_metrics.extend(derived);
    }

    /// Insert a merged signal at `position`; called by the engine, which
    /// maintains registration order across waves
    pub fn insert_signal(&mut self, position: usize, signal: Signal) {
        let position = position.min(self.signals.len());
        self.signals.insert(position, signal);
    }
}
