//! The hashgraph: vertex store, causal index and ancestor queries.
//!
//! # Graph Properties
//!
//! - **Content-addressed**: every vertex is keyed by its BLAKE3 hash; edges
//!   are hash lookups, never pointers.
//! - **Single root**: every graph starts with [`crate::ROOT_HASH`] and every
//!   other vertex transitively depends on it.
//! - **Causal delivery**: a vertex is only accepted once all of its
//!   dependencies are present, so the dependency relation stays acyclic.
//! - **Lazy index**: the bit-vector reachability index is rebuilt on demand
//!   after any mutation.
//!
//! # Sub-modules
//!
//! - [`graph`]: the [`HashGraph`](graph::HashGraph) store, frontier and
//!   distance metadata.
//! - [`topo`]: deterministic topological sort, optionally refreshing the index.
//! - [`causal`]: ancestor queries over the bit-vector index, with a BFS
//!   fallback.
//! - [`lca`]: lowest common ancestor via distance-from-root metadata.

pub mod causal;
pub mod graph;
pub mod lca;
pub mod topo;
