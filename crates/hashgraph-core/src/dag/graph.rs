//! In-memory hashgraph store.
//!
//! [`HashGraph`] owns every vertex a replica has accepted, plus the derived
//! structures the ordering algorithms need: the frontier, forward edges
//! (dependency → dependents), per-vertex distance from the root, and the
//! cached reachability index.
//!
//! # Insertion
//!
//! [`HashGraph::add_vertex`] expects causal delivery: every dependency must
//! already be present. Violations are rejected and leave the graph untouched.
//! Re-adding a known hash is a no-op.

use std::collections::HashMap;

use fixedbitset::FixedBitSet;

use crate::config::{HashGraphConfig, SemanticsType};
use crate::error::HashGraphError;
use crate::resolve::{ConflictPolicies, Resolution};
use crate::timing::{self, Phase};
use crate::vertex::{Operation, Vertex, VertexHash};

// ---------------------------------------------------------------------------
// VertexDistance
// ---------------------------------------------------------------------------

/// Distance-from-root metadata used by the LCA walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexDistance {
    /// Length of the shortest dependency path to the root.
    pub distance: u64,
    /// The dependency that path goes through. `None` only for the root.
    pub closest_dependency: Option<VertexHash>,
}

// ---------------------------------------------------------------------------
// HashGraph
// ---------------------------------------------------------------------------

/// A replica's local view of the causal history.
///
/// Mutation and index rebuilds take `&mut self`; the graph is single-writer
/// and callers synchronize externally.
#[derive(Debug)]
pub struct HashGraph {
    peer_id: String,
    semantics: SemanticsType,
    policies: ConflictPolicies,

    pub(crate) vertices: HashMap<VertexHash, Vertex>,
    pub(crate) frontier: Vec<VertexHash>,
    pub(crate) forward_edges: HashMap<VertexHash, Vec<VertexHash>>,
    pub(crate) vertex_distances: HashMap<VertexHash, VertexDistance>,

    // Reachability index. Valid only while `predecessors_fresh` is set, and
    // complete only when it was built from the root over the whole graph.
    pub(crate) reachable_predecessors: HashMap<VertexHash, FixedBitSet>,
    pub(crate) topo_sorted_index: HashMap<VertexHash, usize>,
    pub(crate) predecessors_fresh: bool,
    pub(crate) index_is_full: bool,
    pub(crate) bitset_capacity: usize,
}

impl HashGraph {
    /// Create a graph containing only the root, with default configuration
    /// and no conflict policies.
    #[must_use]
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self::with_config(peer_id, &HashGraphConfig::default())
    }

    /// Create a graph containing only the root.
    #[must_use]
    pub fn with_config(peer_id: impl Into<String>, config: &HashGraphConfig) -> Self {
        let root = Vertex::root();
        let root_hash = root.hash.clone();

        let mut vertices = HashMap::new();
        vertices.insert(root_hash.clone(), root);
        let mut forward_edges = HashMap::new();
        forward_edges.insert(root_hash.clone(), Vec::new());
        let mut vertex_distances = HashMap::new();
        vertex_distances.insert(
            root_hash.clone(),
            VertexDistance {
                distance: 0,
                closest_dependency: None,
            },
        );

        Self {
            peer_id: peer_id.into(),
            semantics: config.semantics,
            policies: ConflictPolicies::none(),
            vertices,
            frontier: vec![root_hash],
            forward_edges,
            vertex_distances,
            reachable_predecessors: HashMap::new(),
            topo_sorted_index: HashMap::new(),
            predecessors_fresh: false,
            index_is_full: false,
            bitset_capacity: config.initial_bitset_capacity.max(1).next_power_of_two(),
        }
    }

    /// Install the conflict policies consulted during linearization.
    #[must_use]
    pub fn with_policies(mut self, policies: ConflictPolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Override the linearization semantics.
    #[must_use]
    pub const fn with_semantics(mut self, semantics: SemanticsType) -> Self {
        self.semantics = semantics;
        self
    }

    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    #[must_use]
    pub const fn semantics(&self) -> SemanticsType {
        self.semantics
    }

    #[must_use]
    pub const fn policies(&self) -> &ConflictPolicies {
        &self.policies
    }

    /// Build a vertex authored by this replica. Does not insert it.
    #[must_use]
    pub fn create_vertex(
        &self,
        operation: Operation,
        dependencies: Vec<VertexHash>,
        timestamp: i64,
    ) -> Vertex {
        Vertex::new(self.peer_id.clone(), operation, dependencies, timestamp)
    }

    /// Insert a causally-ready vertex.
    ///
    /// Returns `Ok(true)` when the vertex was inserted and `Ok(false)` when
    /// its hash was already present.
    ///
    /// # Errors
    ///
    /// - [`HashGraphError::EmptyDependencies`] if a non-root vertex lists no
    ///   dependencies.
    /// - [`HashGraphError::MissingDependency`] if any dependency is not in
    ///   the graph.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<bool, HashGraphError> {
        timing::measure(Phase::AddVertex, || self.insert_vertex(vertex))
    }

    fn insert_vertex(&mut self, vertex: Vertex) -> Result<bool, HashGraphError> {
        if self.vertices.contains_key(&vertex.hash) {
            tracing::trace!(hash = %vertex.hash, "duplicate vertex ignored");
            return Ok(false);
        }
        if vertex.dependencies.is_empty() {
            tracing::warn!(hash = %vertex.hash, "rejected vertex without dependencies");
            return Err(HashGraphError::EmptyDependencies(vertex.hash));
        }
        if let Some(missing) = vertex
            .dependencies
            .iter()
            .find(|dep| !self.vertices.contains_key(*dep))
        {
            tracing::warn!(hash = %vertex.hash, dependency = %missing, "rejected vertex with missing dependency");
            return Err(HashGraphError::MissingDependency {
                vertex: vertex.hash.clone(),
                dependency: missing.clone(),
            });
        }

        let hash = vertex.hash.clone();

        for dep in &vertex.dependencies {
            let dependents = self.forward_edges.entry(dep.clone()).or_default();
            if !dependents.contains(&hash) {
                dependents.push(hash.clone());
            }
        }
        self.forward_edges.entry(hash.clone()).or_default();

        let distance = self.distance_through(&vertex.dependencies);
        self.vertex_distances.insert(hash.clone(), distance);

        self.frontier.retain(|h| !vertex.dependencies.contains(h));
        self.frontier.push(hash.clone());

        self.vertices.insert(hash.clone(), vertex);
        self.predecessors_fresh = false;

        tracing::trace!(%hash, frontier = self.frontier.len(), "vertex added");
        Ok(true)
    }

    // First minimum wins, so ties follow dependency order.
    fn distance_through(&self, dependencies: &[VertexHash]) -> VertexDistance {
        let mut best = VertexDistance {
            distance: u64::MAX,
            closest_dependency: None,
        };
        for dep in dependencies {
            if let Some(d) = self.vertex_distances.get(dep) {
                let candidate = d.distance.saturating_add(1);
                if candidate < best.distance {
                    best.distance = candidate;
                    best.closest_dependency = Some(dep.clone());
                }
            }
        }
        best
    }

    /// Route a concurrent set to the ACL or DRP policy, by the tag of its
    /// first vertex.
    #[must_use]
    pub fn resolve_conflicts(&self, vertices: &[Vertex]) -> Resolution {
        self.policies.resolve(vertices)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Vertices with no known dependents, in the order they became tips.
    #[must_use]
    pub fn get_frontier(&self) -> Vec<VertexHash> {
        self.frontier.clone()
    }

    /// Dependencies of a vertex, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`HashGraphError::VertexNotFound`] for an unknown hash.
    pub fn get_dependencies(&self, hash: &VertexHash) -> Result<Vec<VertexHash>, HashGraphError> {
        self.vertices
            .get(hash)
            .map(|v| v.dependencies.clone())
            .ok_or_else(|| HashGraphError::VertexNotFound(hash.clone()))
    }

    /// Vertices that list `hash` as a dependency, in arrival order.
    #[must_use]
    pub fn get_dependents(&self, hash: &VertexHash) -> Option<&[VertexHash]> {
        self.forward_edges.get(hash).map(Vec::as_slice)
    }

    #[must_use]
    pub fn get_vertex(&self, hash: &VertexHash) -> Option<&Vertex> {
        self.vertices.get(hash)
    }

    /// Every vertex, root included, sorted by hash.
    #[must_use]
    pub fn get_all_vertices(&self) -> Vec<Vertex> {
        let mut all: Vec<Vertex> = self.vertices.values().cloned().collect();
        all.sort_by(|a, b| a.hash.cmp(&b.hash));
        all
    }

    #[must_use]
    pub fn contains(&self, hash: &VertexHash) -> bool {
        self.vertices.contains_key(hash)
    }

    /// Number of vertices, root included. Never zero.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn vertex_distance(&self, hash: &VertexHash) -> Option<&VertexDistance> {
        self.vertex_distances.get(hash)
    }

    /// Current bit-vector capacity of the reachability index.
    #[must_use]
    pub const fn current_bitset_size(&self) -> usize {
        self.bitset_capacity
    }

    /// Returns `true` while the reachability index matches the store.
    #[must_use]
    pub const fn is_index_fresh(&self) -> bool {
        self.predecessors_fresh
    }

    /// Returns `true` when the index is fresh and covers the whole graph
    /// rather than a scoped subgraph.
    #[must_use]
    pub const fn is_index_full(&self) -> bool {
        self.predecessors_fresh && self.index_is_full
    }

    pub(crate) fn require(&self, hash: &VertexHash) -> Result<(), HashGraphError> {
        if self.vertices.contains_key(hash) {
            Ok(())
        } else {
            Err(HashGraphError::VertexNotFound(hash.clone()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::resolve::ActionType;
    use serde_json::json;

    fn op(n: i64) -> Operation {
        Operation::drp("set", json!(n))
    }

    fn add(graph: &mut HashGraph, deps: &[&VertexHash], ts: i64) -> VertexHash {
        let v = graph.create_vertex(op(ts), deps.iter().map(|d| (*d).clone()).collect(), ts);
        let hash = v.hash.clone();
        assert!(graph.add_vertex(v).unwrap());
        hash
    }

    #[test]
    fn new_graph_holds_only_root() {
        let graph = HashGraph::new("p1");
        let root = VertexHash::root();
        assert_eq!(graph.vertex_count(), 1);
        assert_eq!(graph.get_frontier(), vec![root.clone()]);
        assert!(graph.get_dependencies(&root).unwrap().is_empty());
        assert_eq!(graph.vertex_distance(&root).unwrap().distance, 0);
        assert_eq!(graph.get_dependents(&root), Some(&[][..]));
        assert_eq!(graph.semantics(), SemanticsType::Multiple);
        assert_eq!(graph.current_bitset_size(), 1);
    }

    #[test]
    fn create_vertex_is_pure() {
        let graph = HashGraph::new("p1");
        let v = graph.create_vertex(op(1), vec![VertexHash::root()], 1);
        assert_eq!(v.peer_id, "p1");
        assert!(!graph.contains(&v.hash));
        assert_eq!(graph.vertex_count(), 1);
    }

    #[test]
    fn add_vertex_updates_frontier_and_edges() {
        let mut graph = HashGraph::new("p1");
        let root = VertexHash::root();
        let a = add(&mut graph, &[&root], 1);
        let b = add(&mut graph, &[&root], 2);
        assert_eq!(graph.get_frontier(), vec![a.clone(), b.clone()]);

        let c = add(&mut graph, &[&a, &b], 3);
        assert_eq!(graph.get_frontier(), vec![c.clone()]);
        assert_eq!(graph.get_dependents(&root).unwrap(), &[a.clone(), b.clone()]);
        assert_eq!(graph.get_dependents(&a).unwrap(), &[c.clone()]);
        assert_eq!(graph.get_dependencies(&c).unwrap(), vec![a, b]);
    }

    #[test]
    fn distance_prefers_first_minimum() {
        let mut graph = HashGraph::new("p1");
        let root = VertexHash::root();
        let a = add(&mut graph, &[&root], 1);
        let b = add(&mut graph, &[&root], 2);
        let deep = add(&mut graph, &[&a], 3);

        let merge = add(&mut graph, &[&deep, &b, &a], 4);
        let d = graph.vertex_distance(&merge).unwrap();
        assert_eq!(d.distance, 2);
        assert_eq!(d.closest_dependency.as_ref(), Some(&b));

        let merge2 = add(&mut graph, &[&a, &b], 5);
        let d2 = graph.vertex_distance(&merge2).unwrap();
        assert_eq!(d2.closest_dependency.as_ref(), Some(&a));
    }

    #[test]
    fn duplicate_add_is_noop() {
        let mut graph = HashGraph::new("p1");
        let v = graph.create_vertex(op(1), vec![VertexHash::root()], 1);
        assert!(graph.add_vertex(v.clone()).unwrap());
        let frontier = graph.get_frontier();

        assert!(!graph.add_vertex(v.clone()).unwrap());
        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.get_frontier(), frontier);
        assert_eq!(graph.get_dependents(&VertexHash::root()).unwrap(), &[v.hash]);
    }

    #[test]
    fn re_adding_root_is_noop() {
        let mut graph = HashGraph::new("p1");
        assert!(!graph.add_vertex(Vertex::root()).unwrap());
        assert_eq!(graph.vertex_count(), 1);
    }

    #[test]
    fn missing_dependency_is_rejected() {
        let mut graph = HashGraph::new("p1");
        let ghost = VertexHash::new_unchecked("blake3:ghost");
        let v = graph.create_vertex(op(1), vec![VertexHash::root(), ghost.clone()], 1);
        let err = graph.add_vertex(v.clone()).unwrap_err();
        assert_eq!(
            err,
            HashGraphError::MissingDependency {
                vertex: v.hash.clone(),
                dependency: ghost,
            }
        );
        assert_eq!(err.code(), ErrorCode::MissingDependency);
        assert!(!graph.contains(&v.hash));
        assert_eq!(graph.get_frontier(), vec![VertexHash::root()]);
        assert_eq!(graph.get_dependents(&VertexHash::root()), Some(&[][..]));
    }

    #[test]
    fn empty_dependencies_are_rejected() {
        let mut graph = HashGraph::new("p1");
        let v = graph.create_vertex(op(1), Vec::new(), 1);
        let err = graph.add_vertex(v).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyDependencies);
        assert_eq!(graph.vertex_count(), 1);
    }

    #[test]
    fn add_vertex_marks_index_stale() {
        let mut graph = HashGraph::new("p1");
        graph.topological_sort_with_index().unwrap();
        assert!(graph.is_index_fresh());
        add(&mut graph, &[&VertexHash::root()], 1);
        assert!(!graph.is_index_fresh());
    }

    #[test]
    fn unknown_vertex_lookups() {
        let graph = HashGraph::new("p1");
        let ghost = VertexHash::new_unchecked("blake3:ghost");
        assert!(graph.get_vertex(&ghost).is_none());
        assert_eq!(
            graph.get_dependencies(&ghost).unwrap_err(),
            HashGraphError::VertexNotFound(ghost)
        );
    }

    #[test]
    fn get_all_vertices_is_sorted_and_includes_root() {
        let mut graph = HashGraph::new("p1");
        let root = VertexHash::root();
        add(&mut graph, &[&root], 1);
        add(&mut graph, &[&root], 2);
        let all = graph.get_all_vertices();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].hash < w[1].hash));
        assert!(all.iter().any(Vertex::is_root));
    }

    #[test]
    fn config_sets_semantics_and_rounds_capacity() {
        let config = HashGraphConfig {
            semantics: SemanticsType::Pair,
            initial_bitset_capacity: 5,
        };
        let graph = HashGraph::with_config("p1", &config);
        assert_eq!(graph.semantics(), SemanticsType::Pair);
        assert_eq!(graph.current_bitset_size(), 8);

        let zero = HashGraphConfig {
            initial_bitset_capacity: 0,
            ..HashGraphConfig::default()
        };
        assert_eq!(HashGraph::with_config("p1", &zero).current_bitset_size(), 1);
    }

    #[test]
    fn resolve_conflicts_uses_installed_policy() {
        let graph = HashGraph::new("p1").with_policies(ConflictPolicies {
            acl: None,
            drp: Some(Box::new(|vs: &[Vertex]| {
                Resolution::drop_vertices(vec![vs[0].hash.clone()])
            })),
        });
        let v = graph.create_vertex(op(1), vec![VertexHash::root()], 1);
        let r = graph.resolve_conflicts(&[v]);
        assert_eq!(r.action, ActionType::Drop);
    }
}
