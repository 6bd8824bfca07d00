//! Audio graph - owns nodes and the connections between them
//!
//! Nodes live in a stable-index arena; a [`NodeId`] stays valid until the
//! node is destroyed. Every connection holds one retain on its source, so a
//! node survives as long as a script reference or a consumer keeps it.

use alloc::vec::Vec;

use itertools::Itertools;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::node::{Node, NodeId, NodeKind};

/// Most inputs a single node accepts; further connects are dropped.
pub const MAX_INPUTS: usize = 16;

/// Edge weight: connection order, so a node's inputs keep the order they were connected in.
#[derive(Clone, Copy, Debug)]
struct Connection {
    order: u64,
}

type InnerGraph = StableGraph<Node, Connection>;

/// The node arena and its connections.
///
/// ```
/// use tonwerk::graph::AudioGraph;
/// use tonwerk::NodeKind;
///
/// let mut graph = AudioGraph::new();
/// let osc = graph.add(NodeKind::Oscillator);
/// let gain = graph.add(NodeKind::Gain);
/// graph.connect(osc, gain).unwrap();
///
/// // the connection still holds the oscillator
/// graph.release(osc).unwrap();
/// assert!(graph.contains(osc));
/// ```
pub struct AudioGraph {
    graph: InnerGraph,
    next_order: u64,
    /// Never released below one reference.
    pinned: Option<NodeId>,
}

impl AudioGraph {
    pub fn new() -> Self {
        Self {
            graph: InnerGraph::with_capacity(64, 64),
            next_order: 0,
            pinned: None,
        }
    }

    /// Keep one reference on `id` for the lifetime of the graph. Releases
    /// that would take it to zero leave it at one.
    pub fn pin(&mut self, id: NodeId) {
        self.pinned = Some(id);
    }

    /// Add a node with a refcount of one.
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.graph.add_node(Node::new(kind)));
        debug!(node = id.index(), ?kind, "node created");
        id
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id.0)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node_weight(id.0)
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.graph.node_weight_mut(id.0)
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.graph
            .node_weight_mut(id.0)
            .ok_or(Error::BadArgument("unknown node"))
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices().map(NodeId)
    }

    /// Inputs of `id` in the order they were connected.
    pub fn inputs(&self, id: NodeId) -> Vec<NodeId> {
        self.graph
            .edges_directed(id.0, Direction::Incoming)
            .sorted_by_key(|e| e.weight().order)
            .map(|e| NodeId(e.source()))
            .collect()
    }

    #[inline]
    pub fn input_count(&self, id: NodeId) -> usize {
        self.graph.edges_directed(id.0, Direction::Incoming).count()
    }

    /// Nodes that have `id` as an input.
    pub fn consumers(&self, id: NodeId) -> Vec<NodeId> {
        self.graph
            .edges_directed(id.0, Direction::Outgoing)
            .map(|e| NodeId(e.target()))
            .collect()
    }

    #[inline]
    pub fn is_connected(&self, src: NodeId, dst: NodeId) -> bool {
        self.graph.find_edge(src.0, dst.0).is_some()
    }

    pub fn retain(&mut self, id: NodeId) -> Result<()> {
        let node = self.get_mut(id)?;
        node.refcount = node.refcount.saturating_add(1);
        Ok(())
    }

    /// Drop one reference. A node reaching zero is destroyed and releases
    /// the retain it held on each of its inputs, which may cascade.
    pub fn release(&mut self, id: NodeId) -> Result<()> {
        self.get_mut(id)?;

        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let pinned = self.pinned == Some(id);
            let node = match self.graph.node_weight_mut(id.0) {
                Some(node) => node,
                None => continue,
            };
            if pinned && node.refcount <= 1 {
                continue;
            }
            node.refcount = node.refcount.saturating_sub(1);
            if node.refcount > 0 {
                continue;
            }

            let inputs = self.inputs(id);
            if let Some(node) = self.graph.remove_node(id.0) {
                debug!(node = id.index(), kind = ?node.kind(), "node destroyed");
            }
            pending.extend(inputs);
        }
        Ok(())
    }

    /// Make `src` an input of `dst`.
    ///
    /// Duplicate connections and connections beyond [`MAX_INPUTS`] are
    /// silently ignored. Cycles are allowed but logged.
    pub fn connect(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        if !self.contains(src) || !self.contains(dst) {
            return Err(Error::BadArgument("unknown node"));
        }
        if self.is_connected(src, dst) {
            return Ok(());
        }
        if self.input_count(dst) >= MAX_INPUTS {
            warn!(src = src.index(), dst = dst.index(), "input capacity reached, connection dropped");
            return Ok(());
        }
        if src == dst || petgraph::algo::has_path_connecting(&self.graph, dst.0, src.0, None) {
            warn!(src = src.index(), dst = dst.index(), "connection closes a cycle");
        }

        let order = self.next_order;
        self.next_order += 1;
        self.graph.add_edge(src.0, dst.0, Connection { order });
        self.retain(src)?;
        debug!(src = src.index(), dst = dst.index(), "connected");
        Ok(())
    }

    /// Remove `src` from the inputs of `dst`, releasing the connection's retain.
    pub fn disconnect(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        if !self.contains(src) || !self.contains(dst) {
            return Err(Error::BadArgument("unknown node"));
        }
        if let Some(edge) = self.graph.find_edge(src.0, dst.0) {
            self.graph.remove_edge(edge);
            debug!(src = src.index(), dst = dst.index(), "disconnected");
            self.release(src)?;
        }
        Ok(())
    }

    /// Remove `src` from the inputs of every node it feeds.
    pub fn disconnect_all(&mut self, src: NodeId) -> Result<()> {
        if !self.contains(src) {
            return Err(Error::BadArgument("unknown node"));
        }
        for dst in self.consumers(src) {
            // `src` may already be gone if the last edge held its only reference.
            if !self.contains(src) {
                break;
            }
            self.disconnect(src, dst)?;
        }
        Ok(())
    }
}

impl Default for AudioGraph {
    fn default() -> Self {
        Self::new()
    }
}
