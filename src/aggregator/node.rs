//! The aggregated call tree and its push/pop primitives.
//!
//! Nodes live in a flat arena owned by [`CallTree`]; parent and child
//! edges are indices into that arena, so the tree needs no reference
//! counting and no unsafe back-pointers. Node 0 is always the synthetic
//! root: it carries no event identity and only acts as a container.

use crate::aggregator::event::{EventKind, EventSubType, ProfilerEvent};
use std::sync::Arc;

/// Index of a node inside its owning [`CallTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Id of the synthetic root node of every tree.
    pub const ROOT: NodeId = NodeId(0);
}

/// One aggregated call-tree node.
///
/// **Public** - read by snapshot consumers; mutated only through
/// [`CallTree`] operations
#[derive(Debug, Clone)]
pub struct AggregatedEventNode {
    /// Session the node belongs to
    pub session_id: i32,

    /// Owning object type; empty for non-AL nodes and the root
    pub object_type: Arc<str>,

    /// Owning object id; 0 for non-AL nodes and the root
    pub object_id: i32,

    /// Source line number; 0 unless created by a statement event
    pub line_no: i32,

    /// Statement text; the root's label is built incrementally
    pub statement: Arc<str>,

    /// Kind of the event that created this node; fixed at creation
    pub original_kind: EventKind,

    /// Current kind; a statement node is promoted to a start node once
    /// its matching start event is observed at the same position
    pub evaluated_kind: EventKind,

    /// AL, SQL, or system origin
    pub sub_type: EventSubType,

    /// Cumulative duration across all occurrences, in milliseconds
    pub duration_msec: f64,

    /// Shortest single occurrence; 0 means no occurrence closed yet
    pub min_duration_msec: f64,

    /// Longest single occurrence
    pub max_duration_msec: f64,

    /// Number of occurrences of this identity at this position
    pub hit_count: u32,

    /// Timestamp the current occurrence was opened at
    pub open_timestamp_msec: f64,

    /// Timestamp of the last open or close touching this node
    pub last_timestamp_msec: f64,

    /// Earliest activity anywhere in this subtree; computed at finalize
    pub min_relative_timestamp_msec: f64,

    /// Latest activity anywhere in this subtree; computed at finalize
    pub max_relative_timestamp_msec: f64,

    /// 0 at the root, parent depth + 1 below
    pub depth: u32,

    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl AggregatedEventNode {
    fn new_root(label: Arc<str>) -> Self {
        AggregatedEventNode {
            session_id: 0,
            object_type: Arc::from(""),
            object_id: 0,
            line_no: 0,
            statement: label,
            original_kind: EventKind::StartMethod,
            evaluated_kind: EventKind::StartMethod,
            sub_type: EventSubType::None,
            duration_msec: 0.0,
            min_duration_msec: 0.0,
            max_duration_msec: 0.0,
            hit_count: 0,
            open_timestamp_msec: 0.0,
            last_timestamp_msec: 0.0,
            min_relative_timestamp_msec: 0.0,
            max_relative_timestamp_msec: 0.0,
            depth: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    /// True for nodes created by application-layer events.
    pub fn is_al_event(&self) -> bool {
        let is_al = self.sub_type == EventSubType::AlEvent;
        debug_assert_eq!(is_al, self.object_id != 0);
        is_al
    }

    fn matches(&self, event: &ProfilerEvent) -> bool {
        self.session_id == event.session_id
            && self.object_type == event.object_type
            && self.object_id == event.object_id
            && self.line_no == event.line_no
            && self.statement == event.statement
    }
}

/// Arena-backed aggregated call tree for one session.
///
/// **Public** - owned by the session aggregator; tests drive it directly
/// through the push/pop primitives
#[derive(Debug)]
pub struct CallTree {
    nodes: Vec<AggregatedEventNode>,
}

impl CallTree {
    /// Create a tree holding only a root labeled `root_label`.
    pub fn new(root_label: &str) -> Self {
        CallTree {
            nodes: vec![AggregatedEventNode::new_root(Arc::from(root_label))],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &AggregatedEventNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut AggregatedEventNode {
        &mut self.nodes[id.0]
    }

    /// Ids of a node's direct children, in first-seen order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Append to the root's label. Used once per session to attach the
    /// user or connection identity to the session container node.
    pub fn append_root_label(&mut self, suffix: &str) {
        let root = &mut self.nodes[NodeId::ROOT.0];
        let combined = format!("{}{}", root.statement, suffix);
        root.statement = Arc::from(combined.as_str());
    }

    /// Push an event onto the call stack under `parent`.
    ///
    /// Looks for a child with the event's identity tuple; a match is
    /// re-opened (kind re-evaluated, open timestamp reset, hit count
    /// incremented), otherwise a new child is appended. Never fails and
    /// is the only operation that grows a child list.
    pub fn push_child(&mut self, parent: NodeId, event: &ProfilerEvent) -> NodeId {
        debug_assert!(matches!(
            event.kind,
            EventKind::StartMethod | EventKind::Statement
        ));

        let existing = self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child.0].matches(event));

        if let Some(child) = existing {
            let node = &mut self.nodes[child.0];
            // Re-opening must reset the open state, otherwise the next
            // pop charges time from a stale occurrence.
            node.evaluated_kind = event.kind;
            node.open_timestamp_msec = event.timestamp_msec;
            node.last_timestamp_msec = event.timestamp_msec;
            node.hit_count += 1;
            return child;
        }

        let depth = self.nodes[parent.0].depth + 1;
        let child = NodeId(self.nodes.len());
        self.nodes.push(AggregatedEventNode {
            session_id: event.session_id,
            object_type: Arc::clone(&event.object_type),
            object_id: event.object_id,
            line_no: event.line_no,
            statement: Arc::clone(&event.statement),
            original_kind: event.kind,
            evaluated_kind: event.kind,
            sub_type: event.sub_type,
            duration_msec: 0.0,
            min_duration_msec: 0.0,
            max_duration_msec: 0.0,
            hit_count: 1,
            open_timestamp_msec: event.timestamp_msec,
            last_timestamp_msec: event.timestamp_msec,
            min_relative_timestamp_msec: 0.0,
            max_relative_timestamp_msec: 0.0,
            depth,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(child);
        child
    }

    /// Close the occurrence opened on `id` and fold its duration into
    /// the node's statistics. Returns the parent, which becomes the new
    /// top of stack. Must never be called on the root.
    pub fn pop_and_accumulate(&mut self, id: NodeId, end_timestamp_msec: f64) -> NodeId {
        let node = &mut self.nodes[id.0];
        let delta = end_timestamp_msec - node.open_timestamp_msec;

        if node.min_duration_msec <= 0.0 || node.min_duration_msec > delta {
            node.min_duration_msec = delta;
        }
        if node.max_duration_msec < delta {
            node.max_duration_msec = delta;
        }

        node.duration_msec += delta;
        node.last_timestamp_msec = end_timestamp_msec;

        debug_assert!(node.parent.is_some(), "cannot pop the root node");
        node.parent.unwrap_or(NodeId::ROOT)
    }

    /// Compute the min/max relative-timestamp aggregate over every
    /// subtree, post-order. A leaf's bounds are its own last timestamp;
    /// an inner node's bounds are the extremes over its children.
    pub fn compute_min_max_relative(&mut self, id: NodeId) {
        let children = self.nodes[id.0].children.clone();

        if children.is_empty() {
            let node = &mut self.nodes[id.0];
            node.min_relative_timestamp_msec = node.last_timestamp_msec;
            node.max_relative_timestamp_msec = node.last_timestamp_msec;
            return;
        }

        for &child in &children {
            self.compute_min_max_relative(child);
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &child in &children {
            min = min.min(self.nodes[child.0].min_relative_timestamp_msec);
            max = max.max(self.nodes[child.0].max_relative_timestamp_msec);
        }

        let node = &mut self.nodes[id.0];
        node.min_relative_timestamp_msec = min;
        node.max_relative_timestamp_msec = max;
    }

    /// Drop every direct-child subtree whose accumulated duration is
    /// below `threshold_msec`, recursing into survivors. Evaluated
    /// top-down only: a heavy grandchild under a light child is pruned
    /// along with its ancestor. A non-positive threshold is a no-op.
    pub fn reduce(&mut self, threshold_msec: f64) {
        if threshold_msec <= 0.0 {
            return;
        }
        self.reduce_node(NodeId::ROOT, threshold_msec);
    }

    fn reduce_node(&mut self, id: NodeId, threshold_msec: f64) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        let mut kept = Vec::with_capacity(children.len());

        for child in children {
            if self.nodes[child.0].duration_msec < threshold_msec {
                // Detaching unlinks the whole subtree; the arena slots
                // become unreachable and are never traversed again.
                continue;
            }
            kept.push(child);
            self.reduce_node(child, threshold_msec);
        }

        self.nodes[id.0].children = kept;
    }

    /// Recompute the root's duration as the sum of its direct children.
    /// The root is a container, not a measured call, so its duration is
    /// only meaningful as this sum.
    pub fn refresh_root_duration(&mut self) {
        let total: f64 = self.nodes[NodeId::ROOT.0]
            .children
            .iter()
            .map(|&child| self.nodes[child.0].duration_msec)
            .sum();
        self.nodes[NodeId::ROOT.0].duration_msec = total;
    }

    /// Pre-order traversal starting at the root.
    pub fn iter(&self) -> PreOrderIter<'_> {
        self.iter_with_offset(0)
    }

    /// Pre-order traversal with every reported depth shifted by
    /// `depth_offset`. Used when a session tree is presented as a
    /// subtree of a virtual multi-session root.
    pub fn iter_with_offset(&self, depth_offset: u32) -> PreOrderIter<'_> {
        PreOrderIter {
            tree: self,
            stack: vec![NodeId::ROOT],
            depth_offset,
        }
    }
}

/// Read view over one node produced by a traversal.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    node: &'a AggregatedEventNode,
    depth: u32,
}

impl<'a> NodeView<'a> {
    pub fn node(&self) -> &'a AggregatedEventNode {
        self.node
    }

    /// Depth including any multi-session offset.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Milliseconds between this subtree's last activity and the end of
    /// the capture (`global_max_msec` is the capture-wide maximum
    /// relative timestamp).
    pub fn last_active_msec(&self, global_max_msec: f64) -> f64 {
        global_max_msec - self.node.max_relative_timestamp_msec
    }
}

/// Lazy, restartable pre-order walk over a [`CallTree`].
pub struct PreOrderIter<'a> {
    tree: &'a CallTree,
    stack: Vec<NodeId>,
    depth_offset: u32,
}

impl<'a> Iterator for PreOrderIter<'a> {
    type Item = NodeView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);

        // Reversed so the first child is visited first.
        self.stack.extend(node.children.iter().rev());

        Some(NodeView {
            node,
            depth: node.depth + self.depth_offset,
        })
    }
}
