//! Vertex data model for the hashgraph.
//!
//! A [`Vertex`] is the immutable, content-addressed record of one replica
//! operation plus the hashes of the vertices it causally depends on. Its
//! [`VertexHash`] is its only identity: every index in the graph is keyed by
//! it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::hash::{ROOT_HASH, compute_vertex_hash};

/// Operation type carried by the root vertex.
pub const ROOT_OP_TYPE: &str = "-1";

// ---------------------------------------------------------------------------
// VertexHash
// ---------------------------------------------------------------------------

/// Content hash identifying a vertex, in `blake3:<hex>` format.
///
/// Ordering is plain lexicographic string order. The topological sorter
/// relies on it to break ties between concurrent siblings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexHash(String);

impl VertexHash {
    /// Wrap a raw hash string without validating its format.
    #[must_use]
    pub fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The well-known hash of the root vertex.
    #[must_use]
    pub fn root() -> Self {
        Self(ROOT_HASH.to_string())
    }

    /// Returns `true` for the root vertex hash.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_HASH
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VertexHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VertexHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// DrpType
// ---------------------------------------------------------------------------

/// Which conflict-resolution policy an operation is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DrpType {
    /// Access-control operation (grant, revoke, ...).
    Acl,
    /// Application operation on the replicated object.
    Drp,
}

/// Error returned when parsing an unknown operation tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown drp type '{raw}': expected ACL or DRP")]
pub struct UnknownDrpType {
    /// The unrecognised input string.
    pub raw: String,
}

impl DrpType {
    /// Return the wire string for this tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Acl => "ACL",
            Self::Drp => "DRP",
        }
    }
}

impl fmt::Display for DrpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrpType {
    type Err = UnknownDrpType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACL" => Ok(Self::Acl),
            "DRP" => Ok(Self::Drp),
            _ => Err(UnknownDrpType { raw: s.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Tagged operation payload carried by a vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Policy tag. `None` only for the root no-op.
    pub drp_type: Option<DrpType>,
    /// Operation name, e.g. `"set"` or `"grant"`. `"-1"` marks the root.
    pub op_type: String,
    /// Operation arguments, opaque to the graph.
    pub value: serde_json::Value,
}

impl Operation {
    /// Build an operation with the given tag, name and arguments.
    pub fn new(drp_type: DrpType, op_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            drp_type: Some(drp_type),
            op_type: op_type.into(),
            value,
        }
    }

    /// Shorthand for an application operation.
    pub fn drp(op_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(DrpType::Drp, op_type, value)
    }

    /// Shorthand for an access-control operation.
    pub fn acl(op_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(DrpType::Acl, op_type, value)
    }

    /// The no-op operation carried by the root vertex.
    #[must_use]
    pub fn root() -> Self {
        Self {
            drp_type: None,
            op_type: ROOT_OP_TYPE.to_string(),
            value: serde_json::Value::Null,
        }
    }

    /// Returns `true` when this operation is routed to the ACL policy.
    #[must_use]
    pub fn is_acl(&self) -> bool {
        self.drp_type == Some(DrpType::Acl)
    }
}

// ---------------------------------------------------------------------------
// Vertex
// ---------------------------------------------------------------------------

/// An immutable unit of causal history.
///
/// `hash` is derived from `(peer_id, operation, dependencies, timestamp)`;
/// `signature` is carried along but never inspected by the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    /// Content hash and identity of this vertex.
    pub hash: VertexHash,
    /// Replica that created the vertex. Empty for the root.
    pub peer_id: String,
    /// The operation payload.
    pub operation: Operation,
    /// Hashes of the vertices this one causally follows, in creation order.
    pub dependencies: Vec<VertexHash>,
    /// Creation time in milliseconds. `-1` for the root.
    pub timestamp: i64,
    /// Opaque authentication bytes.
    #[serde(default)]
    pub signature: Vec<u8>,
}

impl Vertex {
    /// Build an unsigned vertex and stamp its content hash.
    #[must_use]
    pub fn new(
        peer_id: impl Into<String>,
        operation: Operation,
        dependencies: Vec<VertexHash>,
        timestamp: i64,
    ) -> Self {
        let peer_id = peer_id.into();
        let hash = compute_vertex_hash(&peer_id, &operation, &dependencies, timestamp);
        Self {
            hash,
            peer_id,
            operation,
            dependencies,
            timestamp,
            signature: Vec::new(),
        }
    }

    /// The root vertex shared by every graph.
    #[must_use]
    pub fn root() -> Self {
        Self {
            hash: VertexHash::root(),
            peer_id: String::new(),
            operation: Operation::root(),
            dependencies: Vec::new(),
            timestamp: -1,
            signature: Vec::new(),
        }
    }

    /// Attach a signature, returning the updated vertex.
    #[must_use]
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    /// Returns `true` for the root vertex.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.hash.is_root()
    }
}
