use crate::error::FlowError;
use crate::flow::Flow;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

pub type SyncFn<V, C> = Arc<dyn Fn(V, &C) -> Result<V> + Send + Sync>;
pub type CallbackFn<V, C> = Arc<dyn Fn(V, &C, Completion<V>) + Send + Sync>;
pub type ErrorHandler<C> = Arc<dyn Fn(&FlowError, &C) + Send + Sync>;
pub type CleanupHandler<V, C> = Arc<dyn Fn(Option<&V>, &C) + Send + Sync>;

/// The action of a single node.
///
/// A step is either a plain value transform or a step that reports its
/// result through a [`Completion`]. Which one is fixed when the step is built.
pub enum Step<V, C> {
    Sync(SyncFn<V, C>),
    Callback(CallbackFn<V, C>),
}

impl<V, C> Clone for Step<V, C> {
    fn clone(&self) -> Self {
        match self {
            Step::Sync(f) => Step::Sync(f.clone()),
            Step::Callback(f) => Step::Callback(f.clone()),
        }
    }
}

impl<V, C> std::fmt::Debug for Step<V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Sync(_) => f.write_str("Step::Sync"),
            Step::Callback(_) => f.write_str("Step::Callback"),
        }
    }
}

impl<V, C> Step<V, C>
where
    V: Send + 'static,
    C: Clone + Send + Sync + 'static,
{
    /// A step whose return value is its result.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(V, &C) -> Result<V> + Send + Sync + 'static,
    {
        Step::Sync(Arc::new(f))
    }

    /// A step that must eventually call `done.complete(..)`.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(V, &C, Completion<V>) + Send + Sync + 'static,
    {
        Step::Callback(Arc::new(f))
    }

    /// Runs the returned future on the current runtime and completes with its output.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(V, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        Step::callback(move |value, ctx: &C, done| {
            let fut = f(value, ctx.clone());
            tokio::spawn(async move {
                done.complete(fut.await);
            });
        })
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, Step::Sync(_))
    }
}

/// One-shot continuation handed to callback steps.
pub struct Completion<V> {
    tx: oneshot::Sender<Result<V>>,
}

impl<V> Completion<V> {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Result<V>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn complete(self, result: Result<V>) {
        // The receiver only goes away when the run task itself is gone.
        let _ = self.tx.send(result);
    }

    pub fn ok(self, value: V) {
        self.complete(Ok(value));
    }

    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.complete(Err(err.into()));
    }
}

/// What a builder call attaches: a fresh step or an already-built flow.
pub enum Link<V, C> {
    Step(Step<V, C>),
    Flow(Flow<V, C>),
}

impl<V, C> From<Step<V, C>> for Link<V, C> {
    fn from(step: Step<V, C>) -> Self {
        Link::Step(step)
    }
}

impl<V, C> From<Flow<V, C>> for Link<V, C> {
    fn from(flow: Flow<V, C>) -> Self {
        Link::Flow(flow)
    }
}

impl<V, C> From<&Flow<V, C>> for Link<V, C> {
    fn from(flow: &Flow<V, C>) -> Self {
        Link::Flow(flow.clone())
    }
}
