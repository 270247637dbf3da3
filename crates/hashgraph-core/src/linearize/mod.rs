//! Linearization: partial order plus conflict policy to a total order.
//!
//! Both semantics walk the indexed topological order. Each surviving vertex
//! (the anchor) is compared against the vertices after it; whenever a later
//! vertex is concurrent with the anchor the graph's [`ConflictPolicies`]
//! decide which of them survive. The origin of the order (the root, for a
//! whole-graph linearization) is never emitted.
//!
//! - [`SemanticsType::Multiple`]: the policy sees a maximal set of mutually
//!   concurrent vertices starting with the anchor.
//! - [`SemanticsType::Pair`]: the policy sees exactly the anchor and one
//!   concurrent candidate.
//!
//! The result depends only on the vertex set and the (pure) policies, so
//! replicas that hold the same vertices emit the same sequence.
//!
//! [`ConflictPolicies`]: crate::resolve::ConflictPolicies

mod multiple;
mod pair;

use std::collections::{HashMap, HashSet};

use crate::config::SemanticsType;
use crate::dag::graph::HashGraph;
use crate::error::HashGraphError;
use crate::resolve::{ActionType, Resolution};
use crate::timing::{self, Phase};
use crate::vertex::{Vertex, VertexHash};

impl HashGraph {
    /// Linearize the whole graph.
    ///
    /// # Errors
    ///
    /// Returns [`HashGraphError::CycleDetected`] if the store is corrupt.
    pub fn linearize_vertices(&mut self) -> Result<Vec<Vertex>, HashGraphError> {
        let order = self.topological_sort_with_index()?;
        self.linearize_order(&order)
    }

    /// Linearize the part of `subgraph` reachable from `origin`. `origin`
    /// itself is excluded from the result.
    ///
    /// # Errors
    ///
    /// - [`HashGraphError::VertexNotFound`] if `origin` is unknown.
    /// - [`HashGraphError::CycleDetected`] if the store is corrupt.
    pub fn linearize_vertices_from(
        &mut self,
        origin: &VertexHash,
        subgraph: &HashSet<VertexHash>,
    ) -> Result<Vec<Vertex>, HashGraphError> {
        let order = self.topological_sort_with_index_from(origin, subgraph)?;
        self.linearize_order(&order)
    }

    fn linearize_order(&mut self, order: &[VertexHash]) -> Result<Vec<Vertex>, HashGraphError> {
        timing::measure(Phase::Linearize, || {
            let out = if self.policies().is_empty() {
                Ok(self.collect(order.iter().skip(1)))
            } else {
                match self.semantics() {
                    SemanticsType::Multiple => multiple::linearize(self, order),
                    SemanticsType::Pair => pair::linearize(self, order),
                }
            }?;
            tracing::debug!(
                semantics = %self.semantics(),
                ordered = order.len(),
                emitted = out.len(),
                "linearized"
            );
            Ok(out)
        })
    }

    fn collect<'a>(&self, hashes: impl Iterator<Item = &'a VertexHash>) -> Vec<Vertex> {
        hashes.filter_map(|h| self.get_vertex(h).cloned()).collect()
    }
}

/// Drop bookkeeping shared by both scans.
struct DropMask {
    dropped: Vec<bool>,
}

impl DropMask {
    fn new(len: usize) -> Self {
        Self {
            dropped: vec![false; len],
        }
    }

    fn is_dropped(&self, position: usize) -> bool {
        self.dropped.get(position).copied().unwrap_or(true)
    }

    /// Apply a policy decision to the vertices that were shown to it.
    /// Returns `true` if any new vertex was dropped. References to hashes
    /// outside `shown` are ignored.
    fn apply(&mut self, resolution: &Resolution, shown: &HashMap<VertexHash, usize>) -> bool {
        if resolution.action != ActionType::Drop {
            return false;
        }
        let mut changed = false;
        for hash in &resolution.vertices {
            match shown.get(hash) {
                Some(&position) if !self.dropped[position] => {
                    self.dropped[position] = true;
                    changed = true;
                }
                Some(_) => {}
                None => tracing::warn!(%hash, "policy dropped a vertex it was not shown"),
            }
        }
        changed
    }
}

/// Owned copies of the vertices at the given positions, for a policy call.
fn vertices_at(graph: &HashGraph, order: &[VertexHash], positions: &[usize]) -> Vec<Vertex> {
    positions
        .iter()
        .filter_map(|&p| graph.get_vertex(&order[p]).cloned())
        .collect()
}
