//! Generic DAG task scheduler
//!
//! A fixed set of named nodes with happens-before edges. The runner
//! validates the topology (cycles, unknown dependencies), then executes:
//! every node whose dependencies have completed is spawned onto a
//! `JoinSet`, so independent nodes run concurrently. Each node runs at
//! most once.
//!
//! Failure policy is per-node: a *fatal* node error aborts the whole run
//! (remaining nodes never start); a non-fatal error is logged at the node
//! boundary and treated as completed-with-skip, so dependents still run.
//! Cancellation is cooperative: once the token fires, no further node is
//! started and the run returns a cancellation error after in-flight nodes
//! settle.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type NodeFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type NodeFn<C> = Box<dyn Fn(Arc<C>) -> NodeFuture + Send + Sync>;

struct NodeSpec<C> {
    name: String,
    deps: Vec<usize>,
    fatal: bool,
    run: NodeFn<C>,
}

/// Outcome of a graph run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphOutcome {
    /// All nodes ran (some may have skipped non-fatally)
    Completed,
}

/// A directed acyclic graph of async tasks over a shared context
pub struct TaskGraph<C> {
    nodes: Vec<NodeSpec<C>>,
    index: HashMap<String, usize>,
}

impl<C: Send + Sync + 'static> TaskGraph<C> {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), index: HashMap::new() }
    }

    /// Register a node. Dependencies must already be registered.
    pub fn add_node<F, Fut>(&mut self, name: &str, deps: &[&str], fatal: bool, f: F) -> Result<()>
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if self.index.contains_key(name) {
            return Err(anyhow!("Node already exists: {name}"));
        }
        let mut dep_ids = Vec::with_capacity(deps.len());
        for dep in deps {
            let id = self
                .index
                .get(*dep)
                .copied()
                .ok_or_else(|| anyhow!("Unknown dependency {dep} for node {name}"))?;
            dep_ids.push(id);
        }
        self.index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(NodeSpec {
            name: name.to_string(),
            deps: dep_ids,
            fatal,
            run: Box::new(move |ctx| Box::pin(f(ctx))),
        });
        Ok(())
    }

    /// Kahn toposort over node ids; errors on cycles
    fn topo_order(&self) -> Result<Vec<usize>> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (id, node) in self.nodes.iter().enumerate() {
            indegree[id] = node.deps.len();
            for &dep in &node.deps {
                dependents[dep].push(id);
            }
        }
        let mut queue: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(id) = queue.pop() {
            order.push(id);
            for &next in &dependents[id] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    queue.push(next);
                }
            }
        }
        if order.len() != n {
            return Err(anyhow!("Cycle detected in task graph"));
        }
        Ok(order)
    }

    /// Execute the graph to completion.
    pub async fn run(&self, ctx: Arc<C>, cancel: &CancellationToken) -> Result<GraphOutcome> {
        // Validates the topology up front; execution below re-derives the
        // ready set dynamically so independent nodes overlap.
        let _ = self.topo_order()?;

        let n = self.nodes.len();
        let mut remaining: Vec<usize> = self.nodes.iter().map(|node| node.deps.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (id, node) in self.nodes.iter().enumerate() {
            for &dep in &node.deps {
                dependents[dep].push(id);
            }
        }

        let mut started = vec![false; n];
        let mut completed = 0usize;
        let mut running: JoinSet<(usize, Result<()>)> = JoinSet::new();
        let mut fatal_failure: Option<anyhow::Error> = None;
        let mut aborted = false;

        let mut ready: Vec<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();

        loop {
            // In-flight nodes observe cancellation at their next await
            // point; nodes not yet started never start
            if (fatal_failure.is_some() || cancel.is_cancelled()) && !aborted {
                running.abort_all();
                aborted = true;
            }

            if !aborted {
                for id in ready.drain(..) {
                    if started[id] {
                        continue;
                    }
                    started[id] = true;
                    let name = self.nodes[id].name.clone();
                    debug!("Starting node {name}");
                    let fut = (self.nodes[id].run)(ctx.clone());
                    running.spawn(async move { (id, fut.await) });
                }
            } else {
                ready.clear();
            }

            if completed == n {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled(), if !aborted => continue,
                joined = running.join_next() => joined,
            };

            let Some(joined) = joined else {
                // Nothing running and not all nodes completed: either we
                // are aborting or the graph stalled
                break;
            };

            let (id, result) = match joined {
                Ok(pair) => pair,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => return Err(anyhow!("Node task panicked: {e}")),
            };
            completed += 1;

            match result {
                Ok(()) => {
                    for &next in &dependents[id] {
                        remaining[next] -= 1;
                        if remaining[next] == 0 {
                            ready.push(next);
                        }
                    }
                }
                Err(e) if self.nodes[id].fatal => {
                    warn!("Fatal node {} failed: {e:#}", self.nodes[id].name);
                    cancel.cancel();
                    fatal_failure = Some(e);
                }
                Err(e) => {
                    // Skippable: dependents still run with this node's
                    // output absent
                    warn!("Node {} failed, continuing: {e:#}", self.nodes[id].name);
                    for &next in &dependents[id] {
                        remaining[next] -= 1;
                        if remaining[next] == 0 {
                            ready.push(next);
                        }
                    }
                }
            }
        }

        running.abort_all();
        while running.join_next().await.is_some() {}

        if let Some(e) = fatal_failure {
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(anyhow!("Pipeline cancelled"));
        }
        if completed != n {
            return Err(anyhow!("Pipeline stalled before completing all nodes"));
        }
        Ok(GraphOutcome::Completed)
    }
}

impl<C: Send + Sync + 'static> Default for TaskGraph<C> {
    fn default() -> Self {
        Self::new()
    }
}
