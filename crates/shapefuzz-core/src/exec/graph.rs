//! Dependency-graph interpreter.
//!
//! A graph is evaluated from its sinks. Each node's inputs run depth-first in ascending
//! `evaluationOrder` and every node runs at most once per execution, however many
//! consumers it has. The visit order is computed up front and then replayed, so the
//! async part is a flat loop.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use anyhow::{anyhow, bail, ensure, Result};
use shapefuzz_types::{Graph, NodeId, NodePayload, Schema};
use tracing::debug;

use super::data::materialize;
use super::invoke::invoke;
use super::oracle::{with_oracle, Oracle, Verdict};
use super::Abort;
use crate::config::WorkerConfig;
use crate::reflect::{load_schema, Endpoints, LoadedSchema};
use crate::runtime::{ModuleLoader, Value};

/// Reject graphs the interpreter cannot execute.
pub fn validate_graph(graph: &Graph) -> Result<()> {
    for (id, node) in &graph.nodes {
        ensure!(
            *id == node.id,
            "node keyed {} carries id {}",
            id,
            node.id
        );
        for edge in &node.incoming {
            ensure!(
                graph.nodes.contains_key(&edge.src),
                "node {} has an input from unknown node {}",
                id,
                edge.src
            );
        }
        for edge in &node.outgoing {
            ensure!(
                graph.nodes.contains_key(&edge.dst),
                "node {} feeds unknown node {}",
                id,
                edge.dst
            );
        }

        match &node.payload {
            NodePayload::Constant { .. } => ensure!(
                node.incoming.is_empty(),
                "constant node {} has incoming edges",
                id
            ),
            NodePayload::Api { name, signature } => {
                let ports: BTreeSet<usize> = node.incoming.iter().map(|e| e.port).collect();
                let argc = signature.args.len();
                ensure!(
                    ports.len() == node.incoming.len() && ports.iter().copied().eq(0..argc),
                    "node {} ({}) takes {} arguments but its inputs cover ports {:?}",
                    id,
                    name,
                    argc,
                    node.incoming.iter().map(|e| e.port).collect::<Vec<_>>()
                );
            }
        }
    }

    if let Some(root) = graph.root {
        ensure!(graph.nodes.contains_key(&root), "root node {} does not exist", root);
    }
    ensure!(graph.sinks().next().is_some(), "graph has no sink node");
    ensure_acyclic(graph)
}

fn ensure_acyclic(graph: &Graph) -> Result<()> {
    let mut consumers: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut pending: HashMap<NodeId, usize> = HashMap::new();
    for node in graph.nodes.values() {
        pending.insert(node.id, node.incoming.len());
        for edge in &node.incoming {
            consumers.entry(edge.src).or_default().push(node.id);
        }
    }

    let mut ready: Vec<NodeId> = pending
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut resolved = 0;
    while let Some(id) = ready.pop() {
        resolved += 1;
        for consumer in consumers.get(&id).into_iter().flatten() {
            if let Some(n) = pending.get_mut(consumer) {
                *n -= 1;
                if *n == 0 {
                    ready.push(*consumer);
                }
            }
        }
    }
    if resolved != graph.nodes.len() {
        bail!("graph contains a cycle");
    }
    Ok(())
}

/// Nodes in the order a depth-first evaluation from every sink reaches them, each
/// once, inputs before consumers.
fn schedule(graph: &Graph) -> Result<Vec<NodeId>> {
    let mut order = Vec::with_capacity(graph.nodes.len());
    let mut done: HashSet<NodeId> = HashSet::new();

    for sink in graph.sinks() {
        let mut stack = vec![(sink.id, false)];
        while let Some((id, expanded)) = stack.pop() {
            if done.contains(&id) {
                continue;
            }
            if expanded {
                done.insert(id);
                order.push(id);
                continue;
            }
            stack.push((id, true));

            let node = graph
                .nodes
                .get(&id)
                .ok_or_else(|| anyhow!("node {} does not exist", id))?;
            let mut inputs = node.incoming.clone();
            inputs.sort_by_key(|edge| edge.evaluation_order);
            for edge in inputs.iter().rev() {
                if !done.contains(&edge.src) {
                    stack.push((edge.src, false));
                }
            }
        }
    }
    Ok(order)
}

async fn interpret(
    endpoints: &Endpoints,
    graph: &Graph,
    heavy_assertions: bool,
) -> Result<(), Abort> {
    let order = schedule(graph)?;
    let mut results: BTreeMap<NodeId, Value> = BTreeMap::new();

    for id in order {
        let node = &graph.nodes[&id];
        let value = match &node.payload {
            NodePayload::Constant { value, .. } => materialize(value),
            NodePayload::Api { name, signature } => {
                let endpoint = endpoints
                    .get(name)
                    .ok_or_else(|| Abort::violation(format!("no endpoint named {}", name)))?;
                let mut args = vec![Value::Undefined; node.incoming.len()];
                for edge in &node.incoming {
                    let input = results.get(&edge.src).ok_or_else(|| {
                        Abort::violation(format!(
                            "node {} evaluated before its input {}",
                            id, edge.src
                        ))
                    })?;
                    let slot = args.get_mut(edge.port).ok_or_else(|| {
                        Abort::violation(format!("node {} has no port {}", id, edge.port))
                    })?;
                    *slot = input.clone();
                }
                debug!(node = id, endpoint = %name, "graph call");
                invoke(name, endpoint, signature.callconv, args).await?
            }
        };
        results.insert(id, value);
    }

    if heavy_assertions {
        let missed: Vec<NodeId> = graph
            .nodes
            .keys()
            .filter(|id| !results.contains_key(id))
            .copied()
            .collect();
        if !missed.is_empty() {
            return Err(Abort::violation(format!(
                "nodes {:?} were never evaluated",
                missed
            )));
        }
    }
    Ok(())
}

/// Long-lived worker executing dependency graphs against one loaded module.
pub struct GraphExecutor {
    loaded: LoadedSchema,
    config: WorkerConfig,
    oracle: Box<dyn Oracle>,
}

impl GraphExecutor {
    /// Load `specifier` and bind its endpoints, deriving or refining `schema`.
    pub async fn init(
        loader: &dyn ModuleLoader,
        specifier: &str,
        schema: Option<Schema>,
        config: WorkerConfig,
        oracle: Box<dyn Oracle>,
    ) -> Result<Self> {
        let loaded = load_schema(loader, specifier, schema, &config).await?;
        Ok(Self::from_loaded(loaded, config, oracle))
    }

    pub fn from_loaded(
        loaded: LoadedSchema,
        config: WorkerConfig,
        oracle: Box<dyn Oracle>,
    ) -> Self {
        Self {
            loaded,
            config,
            oracle,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.loaded.schema
    }

    /// Execute one graph. Malformed graphs are errors; library exceptions are verdicts.
    pub async fn execute(&self, graph: &Graph) -> Result<Verdict> {
        validate_graph(graph)?;
        with_oracle(
            self.oracle.as_ref(),
            self.config.log_errors,
            interpret(&self.loaded.endpoints, graph, self.config.heavy_assertions),
        )
        .await
    }
}
