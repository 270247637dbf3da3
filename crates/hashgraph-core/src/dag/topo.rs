//! Deterministic topological sort over forward edges.
//!
//! The sort is a depth-first walk from an origin (the root by default) along
//! dependency → dependent edges, optionally restricted to a subgraph. The
//! reversed post-order is a linear extension of the causal order.
//!
//! # Determinism
//!
//! Children are explored in descending hash order so that, after the final
//! reversal, concurrent siblings come out in ascending hash order. Two
//! replicas holding the same vertex set therefore produce the same order no
//! matter how the vertices arrived.

use std::collections::HashSet;

use super::graph::HashGraph;
use crate::error::HashGraphError;
use crate::timing::{self, Phase};
use crate::vertex::VertexHash;

struct Frame {
    hash: VertexHash,
    children: Vec<VertexHash>,
    next: usize,
}

impl HashGraph {
    /// Topologically sort the whole graph from the root.
    ///
    /// # Errors
    ///
    /// Returns [`HashGraphError::CycleDetected`] if the forward edges contain
    /// a cycle.
    pub fn topological_sort(&self) -> Result<Vec<VertexHash>, HashGraphError> {
        self.dfs_order(&VertexHash::root(), None)
    }

    /// Topologically sort the vertices reachable from `origin` through
    /// members of `subgraph`. `origin` itself is always first.
    ///
    /// # Errors
    ///
    /// - [`HashGraphError::VertexNotFound`] if `origin` is unknown.
    /// - [`HashGraphError::CycleDetected`] if the forward edges contain a
    ///   cycle.
    pub fn topological_sort_from(
        &self,
        origin: &VertexHash,
        subgraph: &HashSet<VertexHash>,
    ) -> Result<Vec<VertexHash>, HashGraphError> {
        self.require(origin)?;
        self.dfs_order(origin, Some(subgraph))
    }

    /// Sort the whole graph and rebuild the reachability index from the
    /// result.
    ///
    /// # Errors
    ///
    /// Same as [`HashGraph::topological_sort`].
    pub fn topological_sort_with_index(&mut self) -> Result<Vec<VertexHash>, HashGraphError> {
        let order = self.topological_sort()?;
        self.rebuild_index(&order, true);
        Ok(order)
    }

    /// Scoped variant of [`HashGraph::topological_sort_with_index`]. The
    /// index afterwards covers only the returned vertices, and only paths
    /// that stay inside them. Public causal queries rebuild it over the
    /// whole graph before answering.
    ///
    /// # Errors
    ///
    /// Same as [`HashGraph::topological_sort_from`].
    pub fn topological_sort_with_index_from(
        &mut self,
        origin: &VertexHash,
        subgraph: &HashSet<VertexHash>,
    ) -> Result<Vec<VertexHash>, HashGraphError> {
        let order = self.topological_sort_from(origin, subgraph)?;
        self.rebuild_index(&order, false);
        Ok(order)
    }

    fn dfs_order(
        &self,
        origin: &VertexHash,
        subgraph: Option<&HashSet<VertexHash>>,
    ) -> Result<Vec<VertexHash>, HashGraphError> {
        timing::measure(Phase::TopoSort, || {
            let in_scope = |h: &VertexHash| subgraph.is_none_or(|s| s.contains(h));
            let capacity = subgraph.map_or(self.vertices.len(), HashSet::len);

            let mut finished: Vec<VertexHash> = Vec::with_capacity(capacity);
            let mut visited: HashSet<VertexHash> = HashSet::with_capacity(capacity);
            let mut on_stack: HashSet<VertexHash> = HashSet::new();
            let mut stack = vec![self.frame(origin)];
            visited.insert(origin.clone());
            on_stack.insert(origin.clone());

            while let Some(top) = stack.last_mut() {
                if let Some(child) = top.children.get(top.next).cloned() {
                    top.next += 1;
                    if on_stack.contains(&child) {
                        tracing::error!(hash = %child, "dependency cycle in forward edges");
                        return Err(HashGraphError::CycleDetected(child));
                    }
                    if !in_scope(&child) || !visited.insert(child.clone()) {
                        continue;
                    }
                    on_stack.insert(child.clone());
                    stack.push(self.frame(&child));
                } else if let Some(done) = stack.pop() {
                    on_stack.remove(&done.hash);
                    finished.push(done.hash);
                }
            }

            finished.reverse();
            Ok(finished)
        })
    }

    fn frame(&self, hash: &VertexHash) -> Frame {
        let mut children = self.forward_edges.get(hash).cloned().unwrap_or_default();
        children.sort_unstable_by(|a, b| b.cmp(a));
        Frame {
            hash: hash.clone(),
            children,
            next: 0,
        }
    }
}
