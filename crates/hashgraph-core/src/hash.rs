//! Content-addressed vertex hashing.
//!
//! # Hash input
//!
//! The hash covers the four identity fields of a vertex, tab separated and
//! newline terminated:
//!
//! ```text
//! {peer_id}\t{canonical operation json}\t{dependencies joined by ","}\t{timestamp}\n
//! ```
//!
//! - Dependencies keep the order the creator listed them in. That order is
//!   part of the identity because it decides `closest_dependency` ties.
//! - The operation is encoded with [`canonical_operation_json`].
//! - Output format: `blake3:<64 lowercase hex>`.
//!
//! Changing any of this breaks vertex-identity agreement between replicas.

use std::collections::HashSet;

use crate::canonical::canonical_operation_json;
use crate::vertex::{Operation, Vertex, VertexHash};

/// Hash of the root vertex: empty peer, root operation, no dependencies,
/// timestamp `-1`. Peers bootstrap an empty graph from it.
pub const ROOT_HASH: &str =
    "blake3:ea0546e08c9b61a5ed0af3a618c72b180e15acca3571c938aa07b938d3b25d46";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Machine-readable codes for [`HashError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashErrorCode {
    /// The stored hash on a vertex does not match its computed hash.
    HashMismatch,
    /// A vertex references a dependency not found in the vertex set.
    UnknownDependency,
}

/// Errors from vertex hash verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    /// The stored vertex hash does not match the recomputed hash.
    #[error("vertex hash mismatch: stored={stored} expected={expected}")]
    HashMismatch {
        /// The hash carried by the vertex.
        stored: VertexHash,
        /// The hash recomputed from the vertex content.
        expected: VertexHash,
    },

    /// A dependency referenced by a vertex is not in the vertex set.
    #[error("vertex {vertex} references unknown dependency {dependency}")]
    UnknownDependency {
        /// The vertex with the dangling reference.
        vertex: VertexHash,
        /// The dependency that could not be resolved.
        dependency: VertexHash,
    },
}

impl HashError {
    /// Return the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> HashErrorCode {
        match self {
            Self::HashMismatch { .. } => HashErrorCode::HashMismatch,
            Self::UnknownDependency { .. } => HashErrorCode::UnknownDependency,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute `H(peer_id, operation, dependencies, timestamp)`.
#[must_use]
pub fn compute_vertex_hash(
    peer_id: &str,
    operation: &Operation,
    dependencies: &[VertexHash],
    timestamp: i64,
) -> VertexHash {
    let deps = dependencies
        .iter()
        .map(VertexHash::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let op_json = canonical_operation_json(operation);

    let hash_input = format!("{peer_id}\t{op_json}\t{deps}\t{timestamp}\n");
    let hash = blake3::hash(hash_input.as_bytes());
    VertexHash::new_unchecked(format!("blake3:{hash}"))
}

/// Returns `true` if the vertex's stored hash matches its content.
#[must_use]
pub fn verify_vertex_hash(vertex: &Vertex) -> bool {
    vertex.hash
        == compute_vertex_hash(
            &vertex.peer_id,
            &vertex.operation,
            &vertex.dependencies,
            vertex.timestamp,
        )
}

/// Verify the Merkle integrity of a batch of vertices.
///
/// Every vertex must carry the hash of its own content, and every dependency
/// must be either another vertex in the batch or the root. Vertices may be
/// given in any order.
///
/// # Errors
///
/// Returns the first [`HashError`] found, checking vertices in slice order.
pub fn verify_chain(vertices: &[&Vertex]) -> Result<(), HashError> {
    let known: HashSet<&str> = vertices.iter().map(|v| v.hash.as_str()).collect();

    for vertex in vertices {
        if !verify_vertex_hash(vertex) {
            return Err(HashError::HashMismatch {
                stored: vertex.hash.clone(),
                expected: compute_vertex_hash(
                    &vertex.peer_id,
                    &vertex.operation,
                    &vertex.dependencies,
                    vertex.timestamp,
                ),
            });
        }

        for dep in &vertex.dependencies {
            if !dep.is_root() && !known.contains(dep.as_str()) {
                return Err(HashError::UnknownDependency {
                    vertex: vertex.hash.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    Ok(())
}
