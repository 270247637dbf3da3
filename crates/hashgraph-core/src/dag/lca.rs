//! Lowest common ancestor search over distance-from-root metadata.
//!
//! # Algorithm
//!
//! Each vertex records its shortest distance to the root and the dependency
//! that achieves it. The pair walk keeps two cursors and repeatedly moves
//! the deeper one one step rootward along its closest dependency. Each side
//! remembers the vertices it passed; the walk stops when a cursor lands on a
//! vertex the other side already passed. That vertex is a common ancestor,
//! and both walks always reach the root, so the walk terminates.
//!
//! A closest-dependency path can skip over a nearer common ancestor (a merge
//! vertex may depend on the root directly as well as on a branch). The
//! meeting point is therefore refined: while one of its dependents is still
//! an ancestor (or equal) of every input, descend to it. The common
//! ancestors form a set closed under taking ancestors, so once no dependent
//! qualifies, no common ancestor lies strictly below the result.
//!
//! Dependencies the walk skips over are reported through the `targets`
//! list for callers that want to widen a search.

use std::collections::HashSet;

use super::graph::HashGraph;
use crate::error::HashGraphError;
use crate::timing::{self, Phase};
use crate::vertex::VertexHash;

impl HashGraph {
    /// Lowest common ancestor of two vertices.
    ///
    /// Every vertex the walk passes is added to `visited`; skipped
    /// dependencies that are not yet visited are appended to `targets`.
    /// Returns `None`, after logging, if distance metadata is missing for a
    /// vertex on the path.
    pub fn lowest_common_ancestor_pair_vertices(
        &self,
        hash1: &VertexHash,
        hash2: &VertexHash,
        visited: &mut HashSet<VertexHash>,
        targets: &mut Vec<VertexHash>,
    ) -> Option<VertexHash> {
        let meeting = self.walk_to_meeting(hash1, hash2, visited, targets)?;
        Some(self.descend_to_lowest(meeting, &[hash1, hash2]))
    }

    /// Lowest common ancestor of a set of vertices.
    ///
    /// Folds the pair walk over the inputs to reach a common ancestor of all
    /// of them, then refines it against the whole set.
    ///
    /// Returns `Ok(None)` if the pair walk hit a gap in the distance
    /// metadata.
    ///
    /// # Errors
    ///
    /// - [`HashGraphError::EmptyLcaInput`] if `hashes` is empty.
    /// - [`HashGraphError::VertexNotFound`] if any input is unknown.
    pub fn lowest_common_ancestor_multiple_vertices(
        &self,
        hashes: &[VertexHash],
        visited: &mut HashSet<VertexHash>,
    ) -> Result<Option<VertexHash>, HashGraphError> {
        timing::measure(Phase::Lca, || {
            let Some((first, rest)) = hashes.split_first() else {
                return Err(HashGraphError::EmptyLcaInput);
            };
            for hash in hashes {
                self.require(hash)?;
            }
            visited.insert(first.clone());
            if rest.is_empty() {
                return Ok(Some(first.clone()));
            }

            let mut skipped = Vec::new();
            let mut meeting = first.clone();
            for hash in rest {
                match self.walk_to_meeting(&meeting, hash, visited, &mut skipped) {
                    Some(found) => meeting = found,
                    None => return Ok(None),
                }
            }
            tracing::trace!(skipped = skipped.len(), "LCA walk finished");

            let inputs: Vec<&VertexHash> = hashes.iter().collect();
            Ok(Some(self.descend_to_lowest(meeting, &inputs)))
        })
    }

    // Distance-guided walk. Returns a common ancestor of `hash1` and `hash2`.
    fn walk_to_meeting(
        &self,
        hash1: &VertexHash,
        hash2: &VertexHash,
        visited: &mut HashSet<VertexHash>,
        targets: &mut Vec<VertexHash>,
    ) -> Option<VertexHash> {
        let mut current1 = hash1.clone();
        let mut current2 = hash2.clone();
        let mut seen1 = HashSet::from([current1.clone()]);
        let mut seen2 = HashSet::from([current2.clone()]);
        visited.insert(current1.clone());
        visited.insert(current2.clone());

        loop {
            if current1 == current2 || seen2.contains(&current1) {
                return Some(current1);
            }
            if seen1.contains(&current2) {
                return Some(current2);
            }

            let Some(d1) = self.vertex_distances.get(&current1) else {
                tracing::error!(hash = %current1, "LCA: no distance metadata for vertex");
                return None;
            };
            let Some(d2) = self.vertex_distances.get(&current2) else {
                tracing::error!(hash = %current2, "LCA: no distance metadata for vertex");
                return None;
            };

            let (cursor, seen, step) = if d1.distance > d2.distance {
                (&mut current1, &mut seen1, d1)
            } else {
                (&mut current2, &mut seen2, d2)
            };

            let Some(closest) = step.closest_dependency.clone() else {
                tracing::error!(hash = %cursor, "LCA: no closest dependency for vertex");
                return None;
            };
            if let Some(vertex) = self.vertices.get(&*cursor) {
                targets.extend(
                    vertex
                        .dependencies
                        .iter()
                        .filter(|dep| **dep != closest && !visited.contains(*dep))
                        .cloned(),
                );
            }

            visited.insert(closest.clone());
            seen.insert(closest.clone());
            *cursor = closest;
        }
    }

    // Move from a common ancestor to a dependent that is still a common
    // ancestor, smallest hash first, until none is.
    fn descend_to_lowest(&self, mut lca: VertexHash, inputs: &[&VertexHash]) -> VertexHash {
        loop {
            let mut dependents = self.get_dependents(&lca).map(<[_]>::to_vec).unwrap_or_default();
            dependents.sort_unstable();
            let next = dependents
                .into_iter()
                .find(|d| inputs.iter().all(|input| self.reaches(input, d)));
            match next {
                Some(lower) => lca = lower,
                None => return lca,
            }
        }
    }
}
