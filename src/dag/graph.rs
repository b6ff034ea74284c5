// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::dag::TaskName;
use crate::dag::task::TaskNode;
use crate::errors::{BuildError, Result};

/// Kind of relationship an edge was derived from.
///
/// Every edge points from the task that must be terminal first to the task
/// that waits for it:
/// - `DependsOn`: dependency -> dependent
/// - `MustRunAfter`: earlier -> later
/// - `FinalizedBy`: finalized task -> finalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    DependsOn,
    MustRunAfter,
    FinalizedBy,
}

/// Graph node: the declared task plus its declaration index (tie-breaker).
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub task: Arc<TaskNode>,
    pub declaration_index: usize,
}

/// Directed graph over the tasks selected for one build.
///
/// Built by the plan builder from the dependency closure; this type only
/// knows about edges and ordering, not about execution state.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    graph: DiGraph<GraphNode, EdgeKind>,
    index: HashMap<TaskName, NodeIndex>,
}

/// DFS marker for cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl DagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task node. Adding the same name twice returns the existing index.
    pub fn add_task(&mut self, task: Arc<TaskNode>, declaration_index: usize) -> NodeIndex {
        if let Some(idx) = self.index.get(&task.name) {
            return *idx;
        }
        let name = task.name.clone();
        let idx = self.graph.add_node(GraphNode {
            task,
            declaration_index,
        });
        self.index.insert(name, idx);
        idx
    }

    /// Add an edge `from -> to`. Both tasks must already be present.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> Result<()> {
        let from_idx = self.node_index(from)?;
        let to_idx = self.node_index(to)?;
        self.graph.add_edge(from_idx, to_idx, kind);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub fn node_index(&self, name: &str) -> Result<NodeIndex> {
        self.index.get(name).copied().ok_or_else(|| {
            BuildError::InternalState(format!("task '{name}' is not part of the graph"))
        })
    }

    /// Immediate predecessors of `idx` through edges of `kind`, sorted by
    /// declaration order.
    pub fn predecessors(&self, idx: NodeIndex, kind: EdgeKind) -> Vec<NodeIndex> {
        self.neighbors(idx, kind, Direction::Incoming)
    }

    /// Immediate successors of `idx` through edges of `kind`, sorted by
    /// declaration order.
    pub fn successors(&self, idx: NodeIndex, kind: EdgeKind) -> Vec<NodeIndex> {
        self.neighbors(idx, kind, Direction::Outgoing)
    }

    fn neighbors(&self, idx: NodeIndex, kind: EdgeKind, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, dir)
            .filter(|e| *e.weight() == kind)
            .map(|e| match dir {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
            .collect();
        out.sort_by_key(|n| self.graph[*n].declaration_index);
        out.dedup();
        out
    }

    /// All successors regardless of edge kind, sorted by declaration order.
    fn all_successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        out.sort_by_key(|n| self.graph[*n].declaration_index);
        out.dedup();
        out
    }

    fn nodes_in_declaration_order(&self) -> Vec<NodeIndex> {
        let mut nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        nodes.sort_by_key(|n| self.graph[*n].declaration_index);
        nodes
    }

    /// Fail with [`BuildError::Cycle`] if any cycle exists.
    ///
    /// Depth-first search with a three-colour marker. When an in-progress
    /// node is reached again, the members of the cycle are the suffix of the
    /// current DFS path starting at that node. Iterative, so deep chains do
    /// not depend on the caller's stack size.
    pub fn check_acyclic(&self) -> Result<()> {
        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];

        for start in self.nodes_in_declaration_order() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }

            // Each frame: node plus its sorted successors and a cursor.
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = Vec::new();
            marks[start.index()] = Mark::InProgress;
            stack.push((start, self.all_successors(start), 0));

            while let Some((node, succs, cursor)) = stack.last_mut() {
                if *cursor >= succs.len() {
                    marks[node.index()] = Mark::Done;
                    stack.pop();
                    continue;
                }

                let next = succs[*cursor];
                *cursor += 1;

                match marks[next.index()] {
                    Mark::Unvisited => {
                        marks[next.index()] = Mark::InProgress;
                        let next_succs = self.all_successors(next);
                        stack.push((next, next_succs, 0));
                    }
                    Mark::InProgress => {
                        let members = stack
                            .iter()
                            .map(|(n, _, _)| *n)
                            .skip_while(|n| *n != next)
                            .map(|n| self.graph[n].task.name.clone())
                            .collect();
                        return Err(BuildError::Cycle { members });
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(())
    }

    /// Topological order with ties broken by declaration order.
    ///
    /// Kahn's algorithm over a min-heap keyed by declaration index, so the
    /// same graph always yields the same order. Assumes [`check_acyclic`]
    /// passed; a leftover node is reported as an internal error.
    ///
    /// [`check_acyclic`]: DagGraph::check_acyclic
    pub fn topological_order(&self) -> Result<Vec<NodeIndex>> {
        let mut in_degree: Vec<usize> = vec![0; self.graph.node_count()];
        for edge in self.graph.edge_references() {
            in_degree[edge.target().index()] += 1;
        }

        let mut heap = BinaryHeap::new();
        for idx in self.graph.node_indices() {
            if in_degree[idx.index()] == 0 {
                heap.push(Reverse((self.graph[idx].declaration_index, idx)));
            }
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, idx))) = heap.pop() {
            order.push(idx);
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let target = edge.target();
                in_degree[target.index()] -= 1;
                if in_degree[target.index()] == 0 {
                    heap.push(Reverse((self.graph[target].declaration_index, target)));
                }
            }
        }

        if order.len() != self.graph.node_count() {
            return Err(BuildError::InternalState(
                "topological sort left nodes unordered; graph was not acyclic".to_string(),
            ));
        }

        Ok(order)
    }
}
