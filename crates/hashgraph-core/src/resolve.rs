//! Conflict resolution policies.
//!
//! A policy sees a set of mutually concurrent vertices and decides which of
//! them (if any) to drop from the linearization. Policies must be pure
//! functions of the vertex set they are shown: that is what makes every
//! replica that has observed the same vertices agree on the same history.
//!
//! A graph holds at most two policies, one for ACL operations and one for
//! application (DRP) operations, and routes each concurrent set by the tag of
//! its first vertex. Any `Fn(&[Vertex]) -> Resolution` closure is a policy.

use crate::vertex::{Vertex, VertexHash};

/// What a policy wants done with a concurrent set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Keep every vertex.
    Nop,
    /// Drop the vertices listed in [`Resolution::vertices`].
    Drop,
}

/// A policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The requested action.
    pub action: ActionType,
    /// Vertices to drop. Ignored for [`ActionType::Nop`].
    pub vertices: Vec<VertexHash>,
}

impl Resolution {
    /// Keep everything.
    #[must_use]
    pub const fn nop() -> Self {
        Self {
            action: ActionType::Nop,
            vertices: Vec::new(),
        }
    }

    /// Drop the given vertices.
    #[must_use]
    pub fn drop_vertices(vertices: Vec<VertexHash>) -> Self {
        Self {
            action: ActionType::Drop,
            vertices,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::nop()
    }
}

/// Strategy deciding the fate of a set of concurrent vertices.
///
/// `vertices` is never empty. Implementations must not depend on anything but
/// the vertex set (no clocks, no randomness, no replica-local state).
pub trait ConflictPolicy: Send + Sync {
    /// Resolve one concurrent set.
    fn resolve(&self, vertices: &[Vertex]) -> Resolution;
}

impl<F> ConflictPolicy for F
where
    F: Fn(&[Vertex]) -> Resolution + Send + Sync,
{
    fn resolve(&self, vertices: &[Vertex]) -> Resolution {
        self(vertices)
    }
}

/// The pair of policies injected into a graph.
#[derive(Default)]
pub struct ConflictPolicies {
    /// Policy for sets whose first vertex is tagged ACL.
    pub acl: Option<Box<dyn ConflictPolicy>>,
    /// Policy for every other set.
    pub drp: Option<Box<dyn ConflictPolicy>>,
}

impl ConflictPolicies {
    /// No policies: every concurrent set resolves to [`ActionType::Nop`].
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` when neither policy is configured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.acl.is_none() && self.drp.is_none()
    }

    /// Route a concurrent set to the matching policy.
    #[must_use]
    pub fn resolve(&self, vertices: &[Vertex]) -> Resolution {
        let Some(first) = vertices.first() else {
            return Resolution::nop();
        };
        let policy = if first.operation.is_acl() {
            self.acl.as_deref()
        } else {
            self.drp.as_deref()
        };
        policy.map_or_else(Resolution::nop, |p| p.resolve(vertices))
    }
}

impl std::fmt::Debug for ConflictPolicies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictPolicies")
            .field("acl", &self.acl.is_some())
            .field("drp", &self.drp.is_some())
            .finish()
    }
}
