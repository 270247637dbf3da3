//! hashgraph-core library.
//!
//! A causally-ordered, content-addressed operation graph. Every replica
//! mutation becomes an immutable [`Vertex`]; replicas exchange vertices and
//! each one rebuilds the same conflict-resolved linear history from the
//! partial order.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`HashGraphError`]; config loading
//!   uses `anyhow::Result`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod canonical;
pub mod config;
pub mod dag;
pub mod error;
pub mod hash;
pub mod linearize;
pub mod resolve;
pub mod timing;
pub mod vertex;

pub use config::{HashGraphConfig, SemanticsType};
pub use dag::graph::{HashGraph, VertexDistance};
pub use error::{ErrorCode, HashGraphError};
pub use hash::{ROOT_HASH, compute_vertex_hash, verify_chain, verify_vertex_hash};
pub use resolve::{ActionType, ConflictPolicies, ConflictPolicy, Resolution};
pub use vertex::{DrpType, Operation, Vertex, VertexHash};
