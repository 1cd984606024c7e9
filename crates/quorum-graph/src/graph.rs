//! Graph construction, validation, and topological layering

use crate::error::{GraphError, Result};
use quorum_core::{AnalysisNode, keys};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Accumulates node registrations before validation
///
/// The builder is the only mutable stage of a graph's life. `finalize`
/// consumes it and returns an immutable [`DependencyGraph`]; the execution
/// engine only accepts finalized graphs, so running an unvalidated graph is
/// not expressible.
pub struct GraphBuilder {
    nodes: HashMap<String, Arc<dyn AnalysisNode>>,
    order: Vec<String>,
    seed_keys: HashSet<String>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Create a builder with the standard seed schema
    /// (`instrument_id`, `as_of_time`)
    pub fn new() -> Self {
        let mut seed_keys = HashSet::new();
        seed_keys.insert(keys::INSTRUMENT_ID.to_string());
        seed_keys.insert(keys::AS_OF_TIME.to_string());
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            seed_keys,
        }
    }

    /// Declare an additional key the run coordinator seeds before execution
    pub fn seed_key(mut self, key: impl Into<String>) -> Self {
        self.seed_keys.insert(key.into());
        self
    }

    /// Register a node
    ///
    /// Registration order is significant: it is the deterministic secondary
    /// ordering for signals in the run result.
    pub fn register(&mut self, node: Arc<dyn AnalysisNode>) -> Result<()> {
        let id = node.id().to_string();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.order.push(id.clone());
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Validate the declared contracts and freeze the graph
    ///
    /// Performs, in order: write-conflict detection (each produced key has
    /// exactly one producer), dependency resolution (every read must name a
    /// seed key, a produced key, or a node id), and topological layering
    /// with cycle extraction.
    pub fn finalize(self) -> Result<DependencyGraph> {
        // Each produced key maps to its single producer.
        let mut producers: HashMap<String, String> = HashMap::new();
        for id in &self.order {
            for key in self.nodes[id].produces() {
                if let Some(first) = producers.get(&key) {
                    return Err(GraphError::WriteConflict {
                        key,
                        first: first.clone(),
                        second: id.clone(),
                    });
                }
                producers.insert(key, id.clone());
            }
        }

        // Resolve declared reads into node-to-node edges. Seed keys induce
        // no edge; node ids take precedence over produced keys of the same
        // name.
        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for id in &self.order {
            let mut deps: Vec<String> = Vec::new();
            for read in self.nodes[id].reads() {
                let upstream = if self.nodes.contains_key(&read) {
                    Some(read.clone())
                } else if let Some(producer) = producers.get(&read) {
                    Some(producer.clone())
                } else if self.seed_keys.contains(&read) {
                    None
                } else {
                    return Err(GraphError::UnknownDependency {
                        node: id.clone(),
                        dependency: read,
                    });
                };
                if let Some(upstream) = upstream {
                    if !deps.contains(&upstream) {
                        deps.push(upstream);
                    }
                }
            }
            for dep in &deps {
                dependents.entry(dep.clone()).or_default().push(id.clone());
            }
            dependencies.insert(id.clone(), deps);
        }

        let layers = Self::layer(&self.order, &dependencies, &dependents)?;
        debug!(nodes = self.order.len(), layers = layers.len(), "graph finalized");

        let indices = self
            .order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        Ok(DependencyGraph {
            nodes: self.nodes,
            order: self.order,
            indices,
            dependencies,
            dependents,
            layers,
            seed_keys: self.seed_keys,
        })
    }

    /// Kahn layering; on leftover nodes, extract and name the cycle members
    fn layer(
        order: &[String],
        dependencies: &HashMap<String, Vec<String>>,
        dependents: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<Vec<String>>> {
        let mut in_degree: HashMap<&str, usize> = order
            .iter()
            .map(|id| (id.as_str(), dependencies[id].len()))
            .collect();

        let mut layers: Vec<Vec<String>> = Vec::new();
        let mut placed: HashSet<&str> = HashSet::new();

        loop {
            // Registration order within a layer keeps layering deterministic.
            let layer: Vec<&str> = order
                .iter()
                .map(String::as_str)
                .filter(|id| !placed.contains(*id) && in_degree[*id] == 0)
                .collect();
            if layer.is_empty() {
                break;
            }
            for id in &layer {
                placed.insert(*id);
                for dependent in dependents.get(*id).map_or(&[][..], Vec::as_slice) {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                    }
                }
            }
            layers.push(layer.iter().map(|id| (*id).to_string()).collect());
        }

        if placed.len() < order.len() {
            // Leftover nodes are either on a cycle or downstream of one.
            // Trim nodes with no outgoing edge inside the leftover set until
            // only cycle members remain.
            let mut remaining: HashSet<&str> = order
                .iter()
                .map(String::as_str)
                .filter(|id| !placed.contains(id))
                .collect();
            loop {
                let trimmed: Vec<&str> = remaining
                    .iter()
                    .filter(|id| {
                        dependents
                            .get(**id)
                            .map_or(&[][..], Vec::as_slice)
                            .iter()
                            .all(|d| !remaining.contains(d.as_str()))
                    })
                    .copied()
                    .collect();
                if trimmed.is_empty() {
                    break;
                }
                for id in trimmed {
                    remaining.remove(id);
                }
            }
            let mut cycle: Vec<String> = order
                .iter()
                .filter(|id| remaining.contains(id.as_str()))
                .cloned()
                .collect();
            if cycle.is_empty() {
                // Degenerate fallback; every leftover node participates.
                cycle = order
                    .iter()
                    .filter(|id| !placed.contains(id.as_str()))
                    .cloned()
                    .collect();
            }
            return Err(GraphError::CycleDetected(cycle));
        }

        Ok(layers)
    }
}

/// A validated, immutable analysis committee graph
///
/// Validated once at construction and never re-validated per run; the same
/// graph instance can drive any number of concurrent runs.
pub struct DependencyGraph {
    nodes: HashMap<String, Arc<dyn AnalysisNode>>,
    order: Vec<String>,
    indices: HashMap<String, usize>,
    dependencies: HashMap<String, Vec<String>>,
    dependents: HashMap<String, Vec<String>>,
    layers: Vec<Vec<String>>,
    seed_keys: HashSet<String>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("order", &self.order)
            .field("indices", &self.indices)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("layers", &self.layers)
            .field("seed_keys", &self.seed_keys)
            .finish_non_exhaustive()
    }
}

impl DependencyGraph {
    /// Start building a graph
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Arc<dyn AnalysisNode>> {
        self.nodes.get(id)
    }

    /// Node ids in registration order
    pub fn node_ids(&self) -> &[String] {
        &self.order
    }

    /// Upstream node ids a node waits on
    pub fn dependencies(&self, id: &str) -> &[String] {
        self.dependencies.get(id).map_or(&[][..], Vec::as_slice)
    }

    /// Downstream node ids that wait on a node
    pub fn dependents(&self, id: &str) -> &[String] {
        self.dependents.get(id).map_or(&[][..], Vec::as_slice)
    }

    /// Position of a node in registration order
    pub fn registration_index(&self, id: &str) -> Option<usize> {
        self.indices.get(id).copied()
    }

    /// Topological layers: nodes in layer `n` depend only on layers `< n`
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    /// Keys the run coordinator must seed before execution
    pub fn seed_keys(&self) -> &HashSet<String> {
        &self.seed_keys
    }

    /// A node is ready once every node it depends on is in `completed`
    ///
    /// The engine passes the union of completed and failed nodes here and
    /// separately converts failed dependencies into skips.
    pub fn is_ready(&self, id: &str, completed: &HashSet<String>) -> bool {
        self.dependencies(id).iter().all(|dep| completed.contains(dep))
    }
}
