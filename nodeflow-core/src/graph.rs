//! # NodeFlow Core - node arena
//!
//! Nodes, lineages and label scopes live in one arena per flow and refer to
//! each other by id. Back edges (`return_to`, label targets) are plain ids, so
//! a looping flow never forms an ownership cycle.
//!
//! Attaching a flow built in another arena absorbs that arena and leaves a
//! forwarding slot behind, which keeps every outstanding handle valid.

use crate::step::{CleanupHandler, ErrorHandler, Step};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Handle of one node. Unique across every arena in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Handle of the shared state of one chain of builder calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineageId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ScopeId(u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

pub(crate) struct Node<V, C> {
    pub action: Option<Step<V, C>>,
    pub next: Option<NodeId>,
    pub yes: Option<NodeId>,
    pub no: Option<NodeId>,
    pub goto: Option<String>,
    pub return_to: Option<NodeId>,
    pub lineage: LineageId,
}

impl<V, C> Node<V, C> {
    fn empty(lineage: LineageId) -> Self {
        Self {
            action: None,
            next: None,
            yes: None,
            no: None,
            goto: None,
            return_to: None,
            lineage,
        }
    }
}

pub(crate) struct Lineage<V, C> {
    pub first: NodeId,
    pub error_handlers: Vec<ErrorHandler<C>>,
    pub cleanup_handlers: Vec<CleanupHandler<V, C>>,
    /// Index 0 is this lineage's own scope; merged scopes follow in merge order.
    pub scopes: Vec<ScopeId>,
    pub context: Option<C>,
}

/// Everything the executor needs to leave a node, copied out under the read lock.
pub(crate) struct Exit<V, C> {
    pub lineage: LineageId,
    pub next: Option<NodeId>,
    pub goto: Option<(String, Option<NodeId>)>,
    pub return_to: Option<NodeId>,
    pub error_handlers: Vec<ErrorHandler<C>>,
    pub cleanup_handlers: Vec<CleanupHandler<V, C>>,
}

pub(crate) struct Graph<V, C> {
    nodes: HashMap<NodeId, Node<V, C>>,
    lineages: HashMap<LineageId, Lineage<V, C>>,
    scopes: HashMap<ScopeId, HashMap<String, NodeId>>,
}

// Ids are only ever minted by the arena that stores them and arenas are merged,
// never split, so indexing by an id obtained from a live handle cannot miss.
impl<V, C> Graph<V, C> {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            lineages: HashMap::new(),
            scopes: HashMap::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> &Node<V, C> {
        &self.nodes[&id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<V, C> {
        self.nodes.get_mut(&id).expect("node id from a live handle")
    }

    pub fn lineage_of(&self, id: NodeId) -> &Lineage<V, C> {
        &self.lineages[&self.node(id).lineage]
    }

    pub fn lineage_of_mut(&mut self, id: NodeId) -> &mut Lineage<V, C> {
        let lineage = self.node(id).lineage;
        self.lineages
            .get_mut(&lineage)
            .expect("lineage id from a live node")
    }

    /// Creates a lineage with its own label scope and returns its first node.
    pub fn new_lineage(&mut self) -> NodeId {
        let lineage = LineageId(next_id());
        let scope = ScopeId(next_id());
        let first = NodeId(next_id());

        self.nodes.insert(first, Node::empty(lineage));
        self.scopes.insert(scope, HashMap::new());
        self.lineages.insert(
            lineage,
            Lineage {
                first,
                error_handlers: Vec::new(),
                cleanup_handlers: Vec::new(),
                scopes: vec![scope],
                context: None,
            },
        );
        first
    }

    /// A detached node in the same lineage as `sibling`.
    pub fn add_node(&mut self, sibling: NodeId) -> NodeId {
        let id = NodeId(next_id());
        let lineage = self.node(sibling).lineage;
        self.nodes.insert(id, Node::empty(lineage));
        id
    }

    /// Creates a node in `from`'s lineage and wires it as `from.next`.
    pub fn append(&mut self, from: NodeId) -> NodeId {
        let id = self.add_node(from);
        self.link_next(from, id);
        id
    }

    /// Sets `from.next`. A branch-return carried by `from` or by the tail of
    /// the replaced chain moves to the new terminal.
    pub fn link_next(&mut self, from: NodeId, to: NodeId) {
        let node = self.node_mut(from);
        let carried = match node.next.replace(to) {
            None => node.return_to.take(),
            Some(old) => {
                let old_tail = self.terminal_of(old);
                self.node_mut(old_tail).return_to.take()
            }
        };
        if let Some(ret) = carried {
            let terminal = self.terminal_of(to);
            self.node_mut(terminal).return_to = Some(ret);
        }
    }

    /// Follows `next` edges from `start` to the last node of the chain.
    pub fn terminal_of(&self, start: NodeId) -> NodeId {
        let mut seen = HashSet::new();
        let mut current = start;
        while let Some(next) = self.node(current).next {
            if !seen.insert(current) {
                break;
            }
            current = next;
        }
        current
    }

    /// Makes the label scopes of two lineages mutually visible.
    pub fn merge_scopes(&mut self, a: LineageId, b: LineageId) {
        if a == b {
            return;
        }
        let a_scopes = self.lineages[&a].scopes.clone();
        let b_scopes = self.lineages[&b].scopes.clone();

        if let Some(lineage) = self.lineages.get_mut(&b) {
            for scope in &a_scopes {
                if !lineage.scopes.contains(scope) {
                    lineage.scopes.push(*scope);
                }
            }
        }
        if let Some(lineage) = self.lineages.get_mut(&a) {
            for scope in &b_scopes {
                if !lineage.scopes.contains(scope) {
                    lineage.scopes.push(*scope);
                }
            }
        }
    }

    pub fn register_label(&mut self, at: NodeId, name: String) {
        let own = self.lineage_of(at).scopes[0];
        if let Some(scope) = self.scopes.get_mut(&own) {
            scope.insert(name, at);
        }
    }

    pub fn find_label(&self, lineage: LineageId, name: &str) -> Option<NodeId> {
        self.lineages[&lineage]
            .scopes
            .iter()
            .find_map(|scope| self.scopes.get(scope)?.get(name).copied())
    }

    pub fn exit(&self, id: NodeId) -> Exit<V, C> {
        let node = self.node(id);
        let lineage = &self.lineages[&node.lineage];
        Exit {
            lineage: node.lineage,
            next: node.next,
            goto: node
                .goto
                .as_ref()
                .map(|name| (name.clone(), self.find_label(node.lineage, name))),
            return_to: node.return_to,
            error_handlers: lineage.error_handlers.clone(),
            cleanup_handlers: lineage.cleanup_handlers.clone(),
        }
    }

    fn absorb(&mut self, other: Graph<V, C>) {
        self.nodes.extend(other.nodes);
        self.lineages.extend(other.lineages);
        self.scopes.extend(other.scopes);
    }
}

enum Slot<V, C> {
    Live(Graph<V, C>),
    Forwarded(GraphRef<V, C>),
}

/// Shared, possibly forwarded, reference to an arena.
pub(crate) struct GraphRef<V, C> {
    slot: Arc<RwLock<Slot<V, C>>>,
}

impl<V, C> Clone for GraphRef<V, C> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<V, C> GraphRef<V, C> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot::Live(Graph::new()))),
        }
    }

    /// Follows forwarding slots to the arena that currently holds the nodes.
    fn live(&self) -> GraphRef<V, C> {
        let mut current = self.clone();
        loop {
            let forward = {
                let guard = current.slot.read().unwrap_or_else(PoisonError::into_inner);
                match &*guard {
                    Slot::Live(_) => None,
                    Slot::Forwarded(to) => Some(to.clone()),
                }
            };
            match forward {
                Some(to) => current = to,
                None => return current,
            }
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Graph<V, C>) -> R) -> R {
        let mut f = Some(f);
        loop {
            let live = self.live();
            let guard = live.slot.read().unwrap_or_else(PoisonError::into_inner);
            if let Slot::Live(graph) = &*guard {
                if let Some(f) = f.take() {
                    return f(graph);
                }
            }
        }
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Graph<V, C>) -> R) -> R {
        let mut f = Some(f);
        loop {
            let live = self.live();
            let mut guard = live.slot.write().unwrap_or_else(PoisonError::into_inner);
            if let Slot::Live(graph) = &mut *guard {
                if let Some(f) = f.take() {
                    return f(graph);
                }
            }
        }
    }

    /// Moves `other`'s arena into this one unless they already share it.
    pub fn absorb(&self, other: &GraphRef<V, C>) {
        let into = self.live();
        let from = other.live();
        if Arc::ptr_eq(&into.slot, &from.slot) {
            return;
        }

        let taken = {
            let mut guard = from.slot.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, Slot::Forwarded(into.clone()))
        };
        if let Slot::Live(graph) = taken {
            into.write(|g| g.absorb(graph));
        }
    }
}
