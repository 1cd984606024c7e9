//! The wave scheduler: concurrent dispatch, barrier merge, failure isolation

use futures::FutureExt;
use quorum_core::{AnalysisState, NodeError, NodeFailure, NodeOutput};
use quorum_graph::DependencyGraph;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for the execution engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default per-node evaluation timeout
    pub node_timeout: Duration,

    /// Operator-supplied per-node timeout overrides, keyed by node id.
    /// Takes precedence over a node's own declared timeout.
    pub timeout_overrides: HashMap<String, Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_timeout: Duration::from_secs(30),
            timeout_overrides: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Effective timeout for one node evaluation
    pub fn timeout_for(&self, node_id: &str, node_declared: Option<Duration>) -> Duration {
        self.timeout_overrides
            .get(node_id)
            .copied()
            .or(node_declared)
            .unwrap_or(self.node_timeout)
    }
}

/// Builder for [`EngineConfig`]
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    node_timeout: Option<Duration>,
    timeout_overrides: HashMap<String, Duration>,
}

impl EngineConfigBuilder {
    /// Set the default per-node timeout
    pub fn node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    /// Override the timeout for one node
    pub fn timeout_override(mut self, node_id: impl Into<String>, timeout: Duration) -> Self {
        self.timeout_overrides.insert(node_id.into(), timeout);
        self
    }

    /// Build the configuration
    pub fn build(self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            node_timeout: self.node_timeout.unwrap_or(defaults.node_timeout),
            timeout_overrides: self.timeout_overrides,
        }
    }
}

/// What one engine run yields: final merged state, per-node failures, and
/// whether cancellation cut the run short
#[derive(Debug)]
pub struct EngineOutcome {
    /// Final merged state; signals are in registration order
    pub state: AnalysisState,
    /// Per-node failures, keyed by node id
    pub failures: BTreeMap<String, NodeFailure>,
    /// Whether the run was cancelled before all waves completed
    pub cancelled: bool,
}

/// Schedules a finalized graph in synchronized waves
///
/// Within a wave every ready node evaluates concurrently against the same
/// read-only snapshot; patches and signals merge at the barrier, in node
/// registration order, before the next wave is computed. A node therefore
/// never observes a partial write from a sibling, and the recorded signal
/// sequence is identical across runs no matter which sibling finished first.
pub struct ExecutionEngine {
    config: EngineConfig,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ExecutionEngine {
    /// Create an engine with the given configuration
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Execute every node of `graph` against `seed_state`
    ///
    /// Never returns an error: node-level problems are recorded in the
    /// outcome's failure map. Cancellation is honored at wave boundaries
    /// only, so in-flight nodes always finish (bounded by their timeout)
    /// before the run stops admitting work.
    pub async fn run(
        &self,
        graph: &DependencyGraph,
        seed_state: AnalysisState,
        cancel: &CancellationToken,
    ) -> EngineOutcome {
        let mut state = seed_state;
        let mut completed: HashSet<String> = HashSet::new();
        let mut failures: BTreeMap<String, NodeFailure> = BTreeMap::new();
        let mut pending: Vec<String> = graph.node_ids().to_vec();
        let mut cancelled = false;
        let mut wave = 0usize;

        loop {
            // A failed dependency disqualifies the whole branch below it,
            // transitively: iterate until no new skip appears.
            loop {
                let skips: Vec<(String, String)> = pending
                    .iter()
                    .filter_map(|id| {
                        graph
                            .dependencies(id)
                            .iter()
                            .find(|dep| failures.contains_key(dep.as_str()))
                            .map(|dep| (id.clone(), dep.clone()))
                    })
                    .collect();
                if skips.is_empty() {
                    break;
                }
                for (id, dep) in skips {
                    debug!(node = %id, dependency = %dep, "skipping node after dependency failure");
                    failures.insert(id.clone(), NodeFailure::skipped(&dep));
                    pending.retain(|p| p != &id);
                }
            }

            if cancel.is_cancelled() && !pending.is_empty() {
                for id in pending.drain(..) {
                    failures.insert(id, NodeFailure::cancelled());
                }
                cancelled = true;
                break;
            }

            // Frontier: pending nodes whose every dependency has completed.
            // `pending` keeps registration order, so the frontier does too.
            let ready: Vec<String> = pending
                .iter()
                .filter(|id| {
                    graph
                        .dependencies(id)
                        .iter()
                        .all(|dep| completed.contains(dep))
                })
                .cloned()
                .collect();
            if ready.is_empty() {
                break;
            }
            pending.retain(|id| !ready.contains(id));

            wave += 1;
            debug!(wave, nodes = ready.len(), "dispatching wave");

            let snapshot = Arc::new(state.clone());
            let mut join_set = JoinSet::new();
            for id in &ready {
                let Some(node) = graph.node(id) else {
                    continue;
                };
                let node = Arc::clone(node);
                let snapshot = Arc::clone(&snapshot);
                let limit = self.config.timeout_for(id, node.timeout());
                let node_id = id.clone();
                join_set.spawn(async move {
                    let guarded = AssertUnwindSafe(node.evaluate(snapshot)).catch_unwind();
                    let outcome = match tokio::time::timeout(limit, guarded).await {
                        Err(_) => Err(NodeFailure::timeout(limit)),
                        Ok(Err(_)) => Err(NodeFailure::execution("node evaluation panicked")),
                        Ok(Ok(Err(err))) => Err(NodeFailure::from(err)),
                        Ok(Ok(Ok(output))) => Ok(output),
                    };
                    (node_id, outcome)
                });
            }

            let mut outputs: HashMap<String, Result<NodeOutput, NodeFailure>> = HashMap::new();
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((id, outcome)) => {
                        outputs.insert(id, outcome);
                    }
                    Err(err) => {
                        warn!(error = %err, "wave task could not be joined");
                    }
                }
            }

            // Barrier: merge in registration order so the recorded signal
            // sequence does not depend on completion timing.
            for id in &ready {
                match outputs.remove(id) {
                    Some(Ok(output)) => match Self::merge_output(graph, &mut state, id, output) {
                        Ok(()) => {
                            completed.insert(id.clone());
                        }
                        Err(failure) => {
                            warn!(node = %id, error = %failure, "node output rejected");
                            failures.insert(id.clone(), failure);
                        }
                    },
                    Some(Err(failure)) => {
                        warn!(node = %id, error = %failure, "node failed");
                        failures.insert(id.clone(), failure);
                    }
                    None => {
                        failures.insert(
                            id.clone(),
                            NodeFailure::execution("node produced no result"),
                        );
                    }
                }
            }
        }

        debug!(
            completed = completed.len(),
            failed = failures.len(),
            cancelled,
            "engine run finished"
        );
        EngineOutcome {
            state,
            failures,
            cancelled,
        }
    }

    /// Validate and apply one node's output at the wave barrier
    fn merge_output(
        graph: &DependencyGraph,
        state: &mut AnalysisState,
        id: &str,
        output: NodeOutput,
    ) -> Result<(), NodeFailure> {
        let declared: HashSet<String> = graph
            .node(id)
            .map(|node| node.produces().into_iter().collect())
            .unwrap_or_default();
        if let Some(key) = output.patch.keys().find(|key| !declared.contains(*key)) {
            return Err(NodeError::UndeclaredWrite {
                key: key.to_string(),
            }
            .into());
        }
        if let Some(signal) = &output.signal {
            if signal.source != id {
                return Err(NodeError::MalformedOutput(format!(
                    "signal source '{}' does not match node id '{id}'",
                    signal.source
                ))
                .into());
            }
        }

        state.apply_patch(output.patch);
        if let Some(signal) = output.signal {
            let index = graph.registration_index(id).unwrap_or(usize::MAX);
            let position = state.signals().partition_point(|existing| {
                graph
                    .registration_index(&existing.source)
                    .unwrap_or(usize::MAX)
                    < index
            });
            state.insert_signal(position, signal);
        }
        Ok(())
    }
}
