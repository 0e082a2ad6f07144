use crate::config::RunConfig;
use crate::error::{FlowError, Result};
use crate::flow::Flow;
use crate::graph::{GraphRef, LineageId, NodeId};
use crate::step::{Completion, Step};
use crate::value::Truthy;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Handle to a run in progress.
///
/// Dropping it does not stop the run.
pub struct RunHandle<V> {
    trace_id: String,
    task: JoinHandle<Result<Option<V>>>,
}

impl<V> RunHandle<V> {
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to reach a terminal node.
    ///
    /// `Ok(Some(v))` is a clean finish with the last value, `Ok(None)` a finish
    /// after an error was delivered to `on_error` handlers, and `Err` an error
    /// no handler was registered for.
    pub async fn join(self) -> Result<Option<V>> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(FlowError::Aborted(err.to_string())),
        }
    }
}

enum Transition<V> {
    Continue(NodeId, V),
    Finished(Option<V>),
}

struct Runner<V, C> {
    graph: GraphRef<V, C>,
    context: C,
    trace_id: String,
    detailed: bool,
}

impl<V, C> Runner<V, C>
where
    V: Truthy + Send + 'static,
    C: Clone + Send + Sync + 'static,
{
    async fn drive(self, entry: NodeId, value: V) -> Result<Option<V>> {
        let mut node = entry;
        let mut value = value;
        loop {
            if self.detailed {
                tracing::debug!(node = %node, "running node");
            }
            let outcome = self.run_node(node, value).await;
            match self.resolve(node, outcome)? {
                Transition::Continue(next, result) => {
                    // Hand the thread back before every hop so long and
                    // looping flows never nest.
                    tokio::task::yield_now().await;
                    node = next;
                    value = result;
                }
                Transition::Finished(result) => {
                    if self.detailed {
                        tracing::debug!(node = %node, "flow finished");
                    }
                    return Ok(result);
                }
            }
        }
    }

    async fn run_node(&self, node: NodeId, value: V) -> Result<V> {
        let action = self.graph.read(|g| g.node(node).action.clone());
        match action {
            None => Ok(value),
            Some(Step::Sync(f)) => f(value, &self.context).map_err(FlowError::Action),
            Some(Step::Callback(f)) => {
                let (done, rx) = Completion::new();
                f(value, &self.context, done);
                match rx.await {
                    Ok(result) => result.map_err(FlowError::Action),
                    Err(_) => {
                        // A dropped completion can never fire: park like a
                        // continuation that is never called.
                        tracing::warn!(
                            trace_id = %self.trace_id,
                            node = %node,
                            "step dropped its completion, run is stalled"
                        );
                        std::future::pending().await
                    }
                }
            }
        }
    }

    fn resolve(&self, node: NodeId, outcome: Result<V>) -> Result<Transition<V>> {
        let branch = match &outcome {
            Ok(value) => {
                let (yes, no) = self.graph.read(|g| {
                    let n = g.node(node);
                    (n.yes, n.no)
                });
                if value.is_truthy() {
                    yes
                } else {
                    no
                }
            }
            Err(_) => None,
        };
        if self.detailed && branch.is_some() {
            tracing::debug!(node = %node, to = ?branch, "taking branch");
        }
        self.advance(node, outcome, branch)
    }

    fn advance(
        &self,
        node: NodeId,
        outcome: Result<V>,
        next: Option<NodeId>,
    ) -> Result<Transition<V>> {
        // A failed goto keeps the value it carried; a failed step has none.
        let (mut value, mut error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(err) => (None, Some(err)),
        };
        let mut acting = node;
        let mut next = next;
        // Each lineage observes a given error once, even when a branch of
        // that lineage returns it to its declaring node.
        let mut notified: Vec<LineageId> = Vec::new();

        loop {
            let exit = self.graph.read(|g| g.exit(acting));
            next = next.or(exit.next);

            if next.is_none() && error.is_none() {
                if let Some((label, target)) = exit.goto {
                    match target {
                        Some(target) => next = Some(target),
                        None => error = Some(FlowError::LabelNotFound(label)),
                    }
                }
            }

            match error {
                Some(err) if exit.error_handlers.is_empty() && exit.return_to.is_none() => {
                    tracing::error!(
                        trace_id = %self.trace_id,
                        node = %acting,
                        error = %err,
                        "unhandled flow error"
                    );
                    return Err(err);
                }
                Some(ref err) => {
                    if !notified.contains(&exit.lineage) {
                        for handler in &exit.error_handlers {
                            handler(err, &self.context);
                        }
                        notified.push(exit.lineage);
                    }
                }
                None => {
                    if let Some(target) = next {
                        if let Some(value) = value {
                            return Ok(Transition::Continue(target, value));
                        }
                    }
                }
            }

            for handler in &exit.cleanup_handlers {
                handler(value.as_ref(), &self.context);
            }

            match (next, exit.return_to) {
                (None, Some(enclosing)) => {
                    if self.detailed {
                        tracing::debug!(node = %acting, enclosing = %enclosing, "branch returned");
                    }
                    // Resume the enclosing node's own wiring; its branch
                    // decision is already spent.
                    acting = enclosing;
                }
                _ => {
                    let result = match error {
                        Some(_) => None,
                        None => value.take(),
                    };
                    return Ok(Transition::Finished(result));
                }
            }
        }
    }
}

impl<V, C> Flow<V, C>
where
    V: Truthy + Send + 'static,
    C: Clone + Send + Sync + 'static,
{
    /// Starts the flow at this lineage's first node on the current tokio runtime.
    ///
    /// Returns as soon as the run is scheduled; no step runs inline.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn run(&self, value: V, context: C) -> RunHandle<V> {
        self.run_with_config(value, context, RunConfig::default())
    }

    /// Like [`run`](Self::run) with the context set by [`bind`](Self::bind).
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn run_bound(&self, value: V) -> Result<RunHandle<V>> {
        let context = self.bound_context().ok_or(FlowError::Unbound)?;
        Ok(self.run(value, context))
    }

    /// Like [`run`](Self::run) with a name and trace id for the run span.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn run_with_config(&self, value: V, context: C, config: RunConfig) -> RunHandle<V> {
        let trace_id = config
            .trace_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let entry = self.graph.read(|g| g.lineage_of(self.node).first);
        let span = tracing::info_span!(
            "flow_run",
            trace_id = %trace_id,
            flow = %config.name.as_deref().unwrap_or("flow")
        );

        let runner = Runner {
            graph: self.graph.clone(),
            context,
            trace_id: trace_id.clone(),
            detailed: config.detailed_logging,
        };
        let task = tokio::spawn(runner.drive(entry, value).instrument(span));

        RunHandle { trace_id, task }
    }
}
