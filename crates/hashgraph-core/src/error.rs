use std::fmt;

use crate::vertex::VertexHash;

/// Machine-readable error codes for operators and diagnostics tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    VertexNotFound,
    MissingDependency,
    EmptyDependencies,
    CycleDetected,
    EmptyLcaInput,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::VertexNotFound => "E2001",
            Self::MissingDependency => "E3001",
            Self::EmptyDependencies => "E3002",
            Self::CycleDetected => "E3003",
            Self::EmptyLcaInput => "E3004",
        }
    }

    /// Short human-facing summary for logs.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::VertexNotFound => "Vertex not found",
            Self::MissingDependency => "Vertex dependency not present",
            Self::EmptyDependencies => "Non-root vertex without dependencies",
            Self::CycleDetected => "Dependency cycle detected",
            Self::EmptyLcaInput => "LCA requested for an empty vertex set",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::VertexNotFound => None,
            Self::MissingDependency => {
                Some("Buffer the vertex until all of its dependencies have been delivered.")
            }
            Self::EmptyDependencies => Some("Every vertex except the root must depend on the frontier."),
            Self::CycleDetected => Some("The vertex store is corrupt; discard and resync the object."),
            Self::EmptyLcaInput => Some("Pass at least one vertex hash."),
        }
    }

    /// Structural violations indicate corrupt or malicious input, as opposed
    /// to routine lookups of vertices that have not arrived yet.
    #[must_use]
    pub const fn is_structural(self) -> bool {
        !matches!(self, Self::VertexNotFound)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors returned by [`crate::HashGraph`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashGraphError {
    /// A queried vertex is not in the store.
    #[error("vertex not found: {0}")]
    VertexNotFound(VertexHash),

    /// `add_vertex` was handed a vertex before one of its dependencies.
    #[error("vertex {vertex} depends on {dependency}, which is not in the graph")]
    MissingDependency {
        /// The rejected vertex.
        vertex: VertexHash,
        /// The first dependency that could not be found.
        dependency: VertexHash,
    },

    /// A non-root vertex declared no dependencies.
    #[error("vertex {0} has no dependencies")]
    EmptyDependencies(VertexHash),

    /// Traversal revisited a vertex that was still on the DFS stack.
    #[error("dependency cycle detected at {0}")]
    CycleDetected(VertexHash),

    /// LCA search was called with no hashes.
    #[error("lowest common ancestor requested for an empty vertex set")]
    EmptyLcaInput,
}

impl HashGraphError {
    /// Return the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::VertexNotFound(_) => ErrorCode::VertexNotFound,
            Self::MissingDependency { .. } => ErrorCode::MissingDependency,
            Self::EmptyDependencies(_) => ErrorCode::EmptyDependencies,
            Self::CycleDetected(_) => ErrorCode::CycleDetected,
            Self::EmptyLcaInput => ErrorCode::EmptyLcaInput,
        }
    }
}
