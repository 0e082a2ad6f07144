use crate::error::FlowError;
use crate::graph::{GraphRef, LineageId, NodeId};
use crate::step::{Completion, Link, Step};
use crate::value::Truthy;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;

/// Handle to one node of a flow graph, used to keep building from that node.
///
/// Every builder call returns a handle; the graph itself is shared, so
/// handles are cheap to clone and all of them see later additions.
pub struct Flow<V, C> {
    pub(crate) graph: GraphRef<V, C>,
    pub(crate) node: NodeId,
}

impl<V, C> Clone for Flow<V, C> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            node: self.node,
        }
    }
}

impl<V, C> std::fmt::Debug for Flow<V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow").field("node", &self.node).finish()
    }
}

impl<V, C> Default for Flow<V, C>
where
    V: Truthy + Send + 'static,
    C: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C> Flow<V, C>
where
    V: Truthy + Send + 'static,
    C: Clone + Send + Sync + 'static,
{
    /// Creates a new lineage whose first node has no action yet.
    pub fn new() -> Self {
        let graph = GraphRef::new();
        let node = graph.write(|g| g.new_lineage());
        Self { graph, node }
    }

    fn at(&self, node: NodeId) -> Self {
        Self {
            graph: self.graph.clone(),
            node,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn lineage_id(&self) -> LineageId {
        self.graph.read(|g| g.node(self.node).lineage)
    }

    /// Handle to the first node of this lineage, where `run` starts.
    pub fn entry(&self) -> Self {
        let first = self.graph.read(|g| g.lineage_of(self.node).first);
        self.at(first)
    }

    /// Adds a step after this node, or splices in a built flow.
    ///
    /// A step lands on this node when it has no action yet; otherwise a new
    /// node is created as `next`. A flow is attached by its entry node and the
    /// returned handle is the attached flow's own handle.
    pub fn chain_step(&self, link: impl Into<Link<V, C>>) -> Self {
        match link.into() {
            Link::Step(step) => {
                let node = self.graph.write(|g| {
                    let target = if g.node(self.node).action.is_none() {
                        self.node
                    } else {
                        g.append(self.node)
                    };
                    g.node_mut(target).action = Some(step);
                    target
                });
                self.at(node)
            }
            Link::Flow(other) => {
                let entry = self.attach(&other);
                self.graph.write(|g| g.link_next(self.node, entry));
                other
            }
        }
    }

    /// Alias of [`chain_step`](Self::chain_step).
    pub fn step(&self, link: impl Into<Link<V, C>>) -> Self {
        self.chain_step(link)
    }

    /// Adds a value-transforming step.
    pub fn then<F>(&self, f: F) -> Self
    where
        F: Fn(V, &C) -> Result<V> + Send + Sync + 'static,
    {
        self.chain_step(Step::sync(f))
    }

    /// Adds a predicate step; its result steers `on_true` / `on_false`.
    pub fn check<F>(&self, f: F) -> Self
    where
        F: Fn(V, &C) -> Result<V> + Send + Sync + 'static,
    {
        self.then(f)
    }

    /// Adds a step that reports its result through a [`Completion`].
    pub fn then_async<F>(&self, f: F) -> Self
    where
        F: Fn(V, &C, Completion<V>) + Send + Sync + 'static,
    {
        self.chain_step(Step::callback(f))
    }

    /// Adds a step backed by a future.
    pub fn then_future<F, Fut>(&self, f: F) -> Self
    where
        F: Fn(V, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.chain_step(Step::future(f))
    }

    /// Runs `link` instead of `next` when this node's result is truthy.
    pub fn on_true(&self, link: impl Into<Link<V, C>>) -> Self {
        self.branch(true, link.into())
    }

    /// Runs `link` instead of `next` when this node's result is falsy.
    pub fn on_false(&self, link: impl Into<Link<V, C>>) -> Self {
        self.branch(false, link.into())
    }

    fn branch(&self, is_yes: bool, link: Link<V, C>) -> Self {
        let target = match link {
            Link::Step(step) => self.graph.write(|g| {
                let node = g.add_node(self.node);
                g.node_mut(node).action = Some(step);
                node
            }),
            Link::Flow(other) => self.attach(&other),
        };

        self.graph.write(|g| {
            let terminal = g.terminal_of(target);
            g.node_mut(terminal).return_to = Some(self.node);
            let node = g.node_mut(self.node);
            if is_yes {
                node.yes = Some(target);
            } else {
                node.no = Some(target);
            }
        });
        self.clone()
    }

    /// Moves `other` into this arena, merges label scopes and returns its entry node.
    fn attach(&self, other: &Flow<V, C>) -> NodeId {
        self.graph.absorb(&other.graph);
        self.graph.write(|g| {
            let ours = g.node(self.node).lineage;
            let theirs = g.node(other.node).lineage;
            g.merge_scopes(ours, theirs);
            g.lineage_of(other.node).first
        })
    }

    /// Adds an empty node that `goto(name)` can jump to.
    pub fn label(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        let node = self.graph.write(|g| {
            let node = g.append(self.node);
            g.register_label(node, name);
            node
        });
        self.at(node)
    }

    /// Adds an empty node that continues at the node labeled `name`.
    pub fn goto(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        let node = self.graph.write(|g| {
            let node = g.append(self.node);
            g.node_mut(node).goto = Some(name);
            node
        });
        self.at(node)
    }

    /// Registers an error observer for every node of this lineage.
    pub fn on_error<F>(&self, handler: F) -> Self
    where
        F: Fn(&FlowError, &C) + Send + Sync + 'static,
    {
        self.graph
            .write(|g| g.lineage_of_mut(self.node).error_handlers.push(Arc::new(handler)));
        self.clone()
    }

    /// Registers a cleanup callback run whenever a chain segment of this
    /// lineage ends. It receives the value present there, or `None` when a
    /// step failed and left no value.
    pub fn always<F>(&self, handler: F) -> Self
    where
        F: Fn(Option<&V>, &C) + Send + Sync + 'static,
    {
        self.graph
            .write(|g| g.lineage_of_mut(self.node).cleanup_handlers.push(Arc::new(handler)));
        self.clone()
    }

    /// Sets the context used by [`run_bound`](Self::run_bound).
    pub fn bind(&self, context: C) -> Self {
        self.graph
            .write(|g| g.lineage_of_mut(self.node).context = Some(context));
        self.clone()
    }

    pub fn bound_context(&self) -> Option<C> {
        self.graph.read(|g| g.lineage_of(self.node).context.clone())
    }
}
