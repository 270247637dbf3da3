//! Causal relation queries.
//!
//! Two vertices are causally related when one is an ancestor of the other.
//! The fast path consults the bit-vector index built by an indexed
//! topological sort: bit `i` of a vertex's vector is set when the vertex at
//! position `i` is one of its ancestors. The BFS variant walks dependencies
//! directly and serves as the reference answer.

use std::collections::{HashSet, VecDeque};

use fixedbitset::FixedBitSet;

use super::graph::HashGraph;
use crate::error::HashGraphError;
use crate::timing::{self, Phase};
use crate::vertex::VertexHash;

impl HashGraph {
    /// Returns `true` if `a` precedes `b`, `b` precedes `a`, or `a == b`.
    ///
    /// Rebuilds the index over the whole graph first unless the current one
    /// is fresh and complete. A scoped index misses ancestry through
    /// vertices outside its subgraph, so it is never trusted here.
    ///
    /// # Errors
    ///
    /// - [`HashGraphError::VertexNotFound`] if either hash is unknown.
    /// - [`HashGraphError::CycleDetected`] from the rebuild.
    pub fn are_causally_related_using_bitsets(
        &mut self,
        a: &VertexHash,
        b: &VertexHash,
    ) -> Result<bool, HashGraphError> {
        self.require(a)?;
        self.require(b)?;
        if a == b {
            return Ok(true);
        }

        if !self.is_index_full() {
            tracing::debug!(
                fresh = self.predecessors_fresh,
                full = self.index_is_full,
                "rebuilding reachability index"
            );
            self.topological_sort_with_index()?;
        }

        Ok(self.has_ancestor(a, b) || self.has_ancestor(b, a))
    }

    /// Relation as seen by the current index, scoped or not. Used while
    /// linearizing a scoped order, where only paths inside the scope count.
    /// Falls back to a full rebuild if the index is stale or misses a vertex.
    pub(crate) fn are_causally_related_in_index(
        &mut self,
        a: &VertexHash,
        b: &VertexHash,
    ) -> Result<bool, HashGraphError> {
        if a == b {
            return Ok(true);
        }
        let covered =
            self.topo_sorted_index.contains_key(a) && self.topo_sorted_index.contains_key(b);
        if !self.predecessors_fresh || !covered {
            self.require(a)?;
            self.require(b)?;
            self.topological_sort_with_index()?;
        }
        Ok(self.has_ancestor(a, b) || self.has_ancestor(b, a))
    }

    /// Index-free variant of [`HashGraph::are_causally_related_using_bitsets`].
    ///
    /// # Errors
    ///
    /// Returns [`HashGraphError::VertexNotFound`] if either hash is unknown.
    pub fn are_causally_related_using_bfs(
        &self,
        a: &VertexHash,
        b: &VertexHash,
    ) -> Result<bool, HashGraphError> {
        self.require(a)?;
        self.require(b)?;
        Ok(self.reaches(a, b) || self.reaches(b, a))
    }

    /// Exchange the stored reachability vectors of two vertices. Does
    /// nothing unless both are indexed.
    pub fn swap_reachable_predecessors(&mut self, a: &VertexHash, b: &VertexHash) {
        if a == b
            || !self.reachable_predecessors.contains_key(a)
            || !self.reachable_predecessors.contains_key(b)
        {
            return;
        }
        if let (Some(bits_a), Some(bits_b)) = (
            self.reachable_predecessors.remove(a),
            self.reachable_predecessors.remove(b),
        ) {
            self.reachable_predecessors.insert(a.clone(), bits_b);
            self.reachable_predecessors.insert(b.clone(), bits_a);
        }
    }

    /// Position of `hash` in the last indexed topological order.
    #[must_use]
    pub fn topo_position(&self, hash: &VertexHash) -> Option<usize> {
        self.topo_sorted_index.get(hash).copied()
    }

    pub(crate) fn rebuild_index(&mut self, order: &[VertexHash], full: bool) {
        timing::measure(Phase::BitsetBuild, || {
            self.reachable_predecessors.clear();
            self.topo_sorted_index.clear();

            while self.bitset_capacity < order.len() {
                self.bitset_capacity *= 2;
            }

            for (position, hash) in order.iter().enumerate() {
                self.topo_sorted_index.insert(hash.clone(), position);

                let mut bits = FixedBitSet::with_capacity(self.bitset_capacity);
                let deps = self
                    .vertices
                    .get(hash)
                    .map(|v| v.dependencies.as_slice())
                    .unwrap_or_default();
                for dep in deps {
                    let Some(&dep_position) = self.topo_sorted_index.get(dep) else {
                        continue;
                    };
                    bits.insert(dep_position);
                    if let Some(dep_bits) = self.reachable_predecessors.get(dep) {
                        bits.union_with(dep_bits);
                    }
                }
                self.reachable_predecessors.insert(hash.clone(), bits);
            }

            self.predecessors_fresh = true;
            self.index_is_full = full;
            tracing::debug!(
                vertices = order.len(),
                full,
                capacity = self.bitset_capacity,
                "reachability index rebuilt"
            );
        });
    }

    // `ancestor` is in the indexed past of `of`.
    fn has_ancestor(&self, of: &VertexHash, ancestor: &VertexHash) -> bool {
        match (
            self.reachable_predecessors.get(of),
            self.topo_sorted_index.get(ancestor),
        ) {
            (Some(bits), Some(&position)) => bits.contains(position),
            _ => false,
        }
    }

    // BFS from `start` along dependencies looking for `target`.
    pub(crate) fn reaches(&self, start: &VertexHash, target: &VertexHash) -> bool {
        let mut visited: HashSet<&VertexHash> = HashSet::new();
        let mut queue: VecDeque<&VertexHash> = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(vertex) = self.vertices.get(current) {
                queue.extend(vertex.dependencies.iter().filter(|d| !visited.contains(d)));
            }
        }
        false
    }
}
