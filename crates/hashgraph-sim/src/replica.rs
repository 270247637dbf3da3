//! A simulated replica: a [`HashGraph`] behind a causal delivery buffer.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use hashgraph_core::{
    ConflictPolicies, HashGraph, Operation, Resolution, SemanticsType, Vertex, VertexHash,
    verify_vertex_hash,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Index of a replica within a simulation.
pub type ReplicaId = usize;

/// Outcome of handing a received vertex to a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Receipt {
    /// Inserted, along with this many previously buffered vertices.
    Applied { unblocked: usize },
    /// Already known, or already waiting in the buffer.
    Duplicate,
    /// Waiting for dependencies.
    Buffered,
    /// Content hash did not match; discarded.
    Rejected,
}

/// Comparable end-of-run view of a replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaState {
    /// Which replica this is.
    pub id: ReplicaId,
    /// Every vertex in the replica's graph, root included.
    pub vertices: BTreeSet<VertexHash>,
    /// Vertices nothing else depends on yet.
    pub frontier: BTreeSet<VertexHash>,
    /// Full-graph linearization after conflict resolution.
    pub linearization: Vec<VertexHash>,
    /// Vertices still waiting on missing dependencies.
    pub buffered: usize,
}

/// Concurrent writes resolve to the one with the latest timestamp; ties go
/// to the larger hash. Everything else in the set is dropped.
#[must_use]
pub fn last_writer_wins(vertices: &[Vertex]) -> Resolution {
    let Some(winner) = vertices
        .iter()
        .max_by(|a, b| (a.timestamp, &a.hash).cmp(&(b.timestamp, &b.hash)))
    else {
        return Resolution::nop();
    };
    Resolution::drop_vertices(
        vertices
            .iter()
            .filter(|v| v.hash != winner.hash)
            .map(|v| v.hash.clone())
            .collect(),
    )
}

/// One simulated peer.
///
/// Received vertices go into the graph once all of their dependencies are
/// present. Until then they wait in a buffer, which is retried after every
/// insertion.
#[derive(Debug)]
pub struct Replica {
    id: ReplicaId,
    /// Graph with last-writer-wins conflict resolution.
    graph: HashGraph,
    /// Verified vertices waiting for their dependencies.
    buffer: Vec<Vertex>,
    /// Vertices authored so far. Keeps payloads distinct between rounds.
    emitted: u64,
}

impl Replica {
    #[must_use]
    pub fn new(id: ReplicaId, semantics: SemanticsType) -> Self {
        let graph = HashGraph::new(format!("replica-{id}"))
            .with_semantics(semantics)
            .with_policies(ConflictPolicies {
                acl: None,
                drp: Some(Box::new(last_writer_wins)),
            });
        Self {
            id,
            graph,
            buffer: Vec::new(),
            emitted: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ReplicaId {
        self.id
    }

    #[must_use]
    pub const fn graph(&self) -> &HashGraph {
        &self.graph
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Author a write on top of the local frontier and apply it.
    ///
    /// # Errors
    ///
    /// Fails only if the local graph rejects its own vertex.
    pub fn emit(&mut self, round: u64) -> Result<Vertex> {
        self.emitted += 1;
        let op = Operation::drp("set", json!({ "replica": self.id, "n": self.emitted }));
        let timestamp = i64::try_from(round).unwrap_or(i64::MAX);
        let vertex = self
            .graph
            .create_vertex(op, self.graph.get_frontier(), timestamp);
        self.graph
            .add_vertex(vertex.clone())
            .with_context(|| format!("replica {} rejected its own vertex", self.id))?;
        Ok(vertex)
    }

    /// Accept a vertex from the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph reports a structural violation for a
    /// vertex whose dependencies are all present.
    pub fn receive(&mut self, vertex: Vertex) -> Result<Receipt> {
        if !verify_vertex_hash(&vertex) {
            tracing::warn!(replica = self.id, hash = %vertex.hash, "discarding vertex with bad hash");
            return Ok(Receipt::Rejected);
        }
        if self.graph.contains(&vertex.hash) || self.buffer.iter().any(|b| b.hash == vertex.hash) {
            return Ok(Receipt::Duplicate);
        }
        if !self.is_ready(&vertex) {
            tracing::trace!(replica = self.id, hash = %vertex.hash, "buffering vertex");
            self.buffer.push(vertex);
            return Ok(Receipt::Buffered);
        }

        self.apply(vertex)?;
        let unblocked = self.flush_buffer()?;
        Ok(Receipt::Applied { unblocked })
    }

    /// Vertices `other` holds that this replica does not, in an order this
    /// replica can apply directly.
    ///
    /// # Errors
    ///
    /// Propagates a topological sort failure from `other`.
    pub fn missing_from(&self, other: &Self) -> Result<Vec<Vertex>> {
        let order = other.graph.topological_sort()?;
        Ok(order
            .iter()
            .filter(|h| !self.graph.contains(h))
            .filter_map(|h| other.graph.get_vertex(h).cloned())
            .collect())
    }

    /// # Errors
    ///
    /// Propagates linearization failures.
    pub fn snapshot(&mut self) -> Result<ReplicaState> {
        let linearization = self
            .graph
            .linearize_vertices()?
            .into_iter()
            .map(|v| v.hash)
            .collect();
        Ok(ReplicaState {
            id: self.id,
            vertices: self.graph.get_all_vertices().into_iter().map(|v| v.hash).collect(),
            frontier: self.graph.get_frontier().into_iter().collect(),
            linearization,
            buffered: self.buffer.len(),
        })
    }

    fn is_ready(&self, vertex: &Vertex) -> bool {
        vertex.dependencies.iter().all(|d| self.graph.contains(d))
    }

    fn apply(&mut self, vertex: Vertex) -> Result<()> {
        let hash = vertex.hash.clone();
        self.graph
            .add_vertex(vertex)
            .with_context(|| format!("replica {} failed to add {hash}", self.id))?;
        Ok(())
    }

    // Apply buffered vertices until none is ready.
    fn flush_buffer(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Some(pos) = self.buffer.iter().position(|v| self.is_ready(v)) {
            let vertex = self.buffer.swap_remove(pos);
            self.apply(vertex)?;
            applied += 1;
        }
        Ok(applied)
    }
}
