//! End-of-run invariant checks over replica snapshots.

use std::collections::BTreeSet;
use std::fmt;

use hashgraph_core::VertexHash;
use serde::{Deserialize, Serialize};

use crate::replica::{ReplicaId, ReplicaState};

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResult {
    /// `true` when `violations` is empty.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    #[must_use]
    fn merge(mut self, other: Self) -> Self {
        self.passed &= other.passed;
        self.violations.extend(other.violations);
        self
    }
}

/// One failed check, with enough context to locate the divergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvariantViolation {
    /// Two replicas hold different vertex sets after quiescence.
    VertexSetDivergence {
        replica_a: ReplicaId,
        replica_b: ReplicaId,
        only_in_a: Vec<VertexHash>,
        only_in_b: Vec<VertexHash>,
    },
    /// Same vertices, different frontier.
    FrontierDivergence {
        replica_a: ReplicaId,
        replica_b: ReplicaId,
    },
    /// Same vertices, different linearization. Reports the first index
    /// where the sequences differ.
    LinearizationDivergence {
        replica_a: ReplicaId,
        replica_b: ReplicaId,
        first_difference: usize,
    },
    /// An authored vertex never reached this replica.
    MissingVertex {
        replica: ReplicaId,
        vertex: VertexHash,
    },
    /// A vertex appears more than once in one linearization.
    DuplicateInLinearization {
        replica: ReplicaId,
        vertex: VertexHash,
    },
    /// Vertices still waiting on dependencies after full delivery.
    BufferNotEmpty { replica: ReplicaId, buffered: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VertexSetDivergence {
                replica_a,
                replica_b,
                only_in_a,
                only_in_b,
            } => write!(
                f,
                "vertex sets diverge between replica {replica_a} and {replica_b} \
                 ({} only in {replica_a}, {} only in {replica_b})",
                only_in_a.len(),
                only_in_b.len()
            ),
            Self::FrontierDivergence {
                replica_a,
                replica_b,
            } => write!(f, "frontiers diverge between replica {replica_a} and {replica_b}"),
            Self::LinearizationDivergence {
                replica_a,
                replica_b,
                first_difference,
            } => write!(
                f,
                "linearizations of replica {replica_a} and {replica_b} differ at index {first_difference}"
            ),
            Self::MissingVertex { replica, vertex } => {
                write!(f, "replica {replica} never received {vertex}")
            }
            Self::DuplicateInLinearization { replica, vertex } => {
                write!(f, "replica {replica} linearizes {vertex} more than once")
            }
            Self::BufferNotEmpty { replica, buffered } => {
                write!(f, "replica {replica} still buffers {buffered} vertices")
            }
        }
    }
}

// ── Oracle ───────────────────────────────────────────────────────────────────

/// Checks run after every replica has seen every delivered vertex:
///
/// 1. Replicas agree on vertex set, frontier and linearization.
/// 2. Every authored vertex reached every replica.
/// 3. No linearization repeats a vertex.
/// 4. No replica is left holding undeliverable vertices.
pub struct ConvergenceOracle;

impl ConvergenceOracle {
    #[must_use]
    pub fn check_all(states: &[ReplicaState], emitted: &BTreeSet<VertexHash>) -> OracleResult {
        Self::check_agreement(states)
            .merge(Self::check_delivery(states, emitted))
            .merge(Self::check_linearization_unique(states))
            .merge(Self::check_buffers_drained(states))
    }

    /// Every replica is compared against the first one.
    #[must_use]
    pub fn check_agreement(states: &[ReplicaState]) -> OracleResult {
        let Some((reference, rest)) = states.split_first() else {
            return OracleResult::pass();
        };

        let mut violations = Vec::new();
        for other in rest {
            if reference.vertices != other.vertices {
                violations.push(InvariantViolation::VertexSetDivergence {
                    replica_a: reference.id,
                    replica_b: other.id,
                    only_in_a: reference.vertices.difference(&other.vertices).cloned().collect(),
                    only_in_b: other.vertices.difference(&reference.vertices).cloned().collect(),
                });
                // Frontier and order follow from the set; nothing more to learn.
                continue;
            }
            if reference.frontier != other.frontier {
                violations.push(InvariantViolation::FrontierDivergence {
                    replica_a: reference.id,
                    replica_b: other.id,
                });
            }
            if reference.linearization != other.linearization {
                let first_difference = reference
                    .linearization
                    .iter()
                    .zip(&other.linearization)
                    .position(|(a, b)| a != b)
                    .unwrap_or_else(|| {
                        reference.linearization.len().min(other.linearization.len())
                    });
                violations.push(InvariantViolation::LinearizationDivergence {
                    replica_a: reference.id,
                    replica_b: other.id,
                    first_difference,
                });
            }
        }
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_delivery(states: &[ReplicaState], emitted: &BTreeSet<VertexHash>) -> OracleResult {
        let violations = states
            .iter()
            .flat_map(|state| {
                emitted
                    .difference(&state.vertices)
                    .map(|vertex| InvariantViolation::MissingVertex {
                        replica: state.id,
                        vertex: vertex.clone(),
                    })
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_linearization_unique(states: &[ReplicaState]) -> OracleResult {
        let mut violations = Vec::new();
        for state in states {
            let mut seen = BTreeSet::new();
            for hash in &state.linearization {
                if !seen.insert(hash) {
                    violations.push(InvariantViolation::DuplicateInLinearization {
                        replica: state.id,
                        vertex: hash.clone(),
                    });
                }
            }
        }
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_buffers_drained(states: &[ReplicaState]) -> OracleResult {
        let violations = states
            .iter()
            .filter(|s| s.buffered > 0)
            .map(|s| InvariantViolation::BufferNotEmpty {
                replica: s.id,
                buffered: s.buffered,
            })
            .collect();
        OracleResult::from_violations(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> VertexHash {
        VertexHash::new_unchecked(format!("blake3:{n:02x}"))
    }

    fn state(id: ReplicaId, vertices: &[u8], linearization: &[u8]) -> ReplicaState {
        let vertices: BTreeSet<_> = vertices.iter().copied().map(h).collect();
        ReplicaState {
            id,
            frontier: vertices.iter().last().cloned().into_iter().collect(),
            vertices,
            linearization: linearization.iter().copied().map(h).collect(),
            buffered: 0,
        }
    }

    #[test]
    fn identical_states_pass() {
        let states = vec![state(0, &[1, 2, 3], &[2, 3]), state(1, &[1, 2, 3], &[2, 3])];
        let emitted = [h(2), h(3)].into_iter().collect();
        let result = ConvergenceOracle::check_all(&states, &emitted);
        assert!(result.passed, "{:?}", result.violations);
    }

    #[test]
    fn empty_input_passes() {
        assert!(ConvergenceOracle::check_all(&[], &BTreeSet::new()).passed);
    }

    #[test]
    fn set_divergence_reports_both_sides() {
        let states = vec![state(0, &[1, 2], &[2]), state(1, &[1, 3], &[3])];
        let result = ConvergenceOracle::check_agreement(&states);
        assert!(!result.passed);
        assert_eq!(
            result.violations,
            vec![InvariantViolation::VertexSetDivergence {
                replica_a: 0,
                replica_b: 1,
                only_in_a: vec![h(2)],
                only_in_b: vec![h(3)],
            }]
        );
    }

    #[test]
    fn order_divergence_points_at_first_mismatch() {
        let states = vec![state(0, &[1, 2, 3], &[2, 3]), state(1, &[1, 2, 3], &[3, 2])];
        let result = ConvergenceOracle::check_agreement(&states);
        assert_eq!(
            result.violations,
            vec![InvariantViolation::LinearizationDivergence {
                replica_a: 0,
                replica_b: 1,
                first_difference: 0,
            }]
        );
    }

    #[test]
    fn missing_duplicate_and_buffered_accumulate() {
        let mut s = state(0, &[1, 2], &[2, 2]);
        s.buffered = 3;
        let emitted = [h(2), h(9)].into_iter().collect();
        let result = ConvergenceOracle::check_all(&[s], &emitted);
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 3);
        let text: Vec<String> = result.violations.iter().map(ToString::to_string).collect();
        assert!(text[0].contains("never received"));
        assert!(text[1].contains("more than once"));
        assert!(text[2].contains("buffers 3"));
    }
}
