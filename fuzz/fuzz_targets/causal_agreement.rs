#![no_main]

use hashgraph_core::{HashGraph, Operation, VertexHash};
use libfuzzer_sys::fuzz_target;
use serde_json::json;

// Each pair of bytes adds one vertex: the first picks up to two parents
// among existing vertices, the second picks the writer.
fuzz_target!(|data: &[u8]| {
    let mut graph = HashGraph::new("fuzz");
    let mut known = vec![VertexHash::root()];

    for (n, chunk) in data.chunks_exact(2).take(64).enumerate() {
        let a = known[usize::from(chunk[0]) % known.len()].clone();
        let b = known[usize::from(chunk[0] >> 4) % known.len()].clone();
        let mut deps = vec![a];
        if b != deps[0] {
            deps.push(b);
        }
        let vertex = hashgraph_core::Vertex::new(
            format!("w{}", chunk[1] % 4),
            Operation::drp("set", json!(n)),
            deps,
            i64::from(chunk[1]),
        );
        if graph.add_vertex(vertex.clone()).unwrap_or(false) {
            known.push(vertex.hash);
        }
    }

    for x in &known {
        for y in &known {
            let fast = graph.are_causally_related_using_bitsets(x, y).unwrap();
            let slow = graph.are_causally_related_using_bfs(x, y).unwrap();
            assert_eq!(fast, slow, "{x} vs {y}");
        }
    }
});
