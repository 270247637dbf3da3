#![no_main]

use hashgraph_core::{ConflictPolicies, HashGraph, Operation, Resolution, Vertex, VertexHash};
use libfuzzer_sys::fuzz_target;
use serde_json::json;

fn graph() -> HashGraph {
    HashGraph::new("fuzz").with_policies(ConflictPolicies {
        acl: None,
        drp: Some(Box::new(|vs: &[Vertex]| {
            let loser = vs.iter().map(|v| v.hash.clone()).min();
            Resolution::drop_vertices(loser.into_iter().collect())
        })),
    })
}

// Build a DAG, then replay its vertices in a second causal order chosen by
// the input. Both replicas must linearize identically.
fuzz_target!(|data: &[u8]| {
    let (shape, order) = data.split_at(data.len() / 2);

    let mut first = graph();
    let mut authored = Vec::new();
    let mut known = vec![VertexHash::root()];
    for (n, &byte) in shape.iter().take(48).enumerate() {
        let deps = vec![known[usize::from(byte) % known.len()].clone()];
        let vertex = Vertex::new(format!("w{}", byte % 3), Operation::drp("set", json!(n)), deps, 0);
        if first.add_vertex(vertex.clone()).unwrap_or(false) {
            known.push(vertex.hash.clone());
            authored.push(vertex);
        }
    }

    let mut second = graph();
    let mut pending = authored.clone();
    let mut picks = order.iter().cycle();
    while !pending.is_empty() {
        let ready: Vec<usize> = (0..pending.len())
            .filter(|&i| pending[i].dependencies.iter().all(|d| second.contains(d)))
            .collect();
        let pick = picks.next().map_or(0, |&b| usize::from(b)) % ready.len();
        let vertex = pending.swap_remove(ready[pick]);
        second.add_vertex(vertex).unwrap();
    }

    let a: Vec<_> = first.linearize_vertices().unwrap().into_iter().map(|v| v.hash).collect();
    let b: Vec<_> = second.linearize_vertices().unwrap().into_iter().map(|v| v.hash).collect();
    assert_eq!(a, b);
});
