use std::collections::HashMap;

use super::{DropMask, vertices_at};
use crate::dag::graph::HashGraph;
use crate::error::HashGraphError;
use crate::vertex::{Vertex, VertexHash};

/// Scan `order` (origin first), resolving one concurrent pair at a time.
pub(super) fn linearize(
    graph: &mut HashGraph,
    order: &[VertexHash],
) -> Result<Vec<Vertex>, HashGraphError> {
    let mut mask = DropMask::new(order.len());
    let mut result = Vec::with_capacity(order.len().saturating_sub(1));

    for i in 1..order.len() {
        if mask.is_dropped(i) {
            continue;
        }
        let anchor = &order[i];

        let mut j = i + 1;
        while j < order.len() {
            if mask.is_dropped(j) || graph.are_causally_related_in_index(anchor, &order[j])? {
                j += 1;
                continue;
            }

            let pair = [i, j];
            let shown: HashMap<VertexHash, usize> =
                pair.iter().map(|&p| (order[p].clone(), p)).collect();
            let resolution = graph.resolve_conflicts(&vertices_at(graph, order, &pair));

            if !mask.apply(&resolution, &shown) {
                j += 1;
                continue;
            }
            if mask.is_dropped(i) {
                break;
            }
        }

        if mask.is_dropped(i) {
            continue;
        }
        if let Some(vertex) = graph.get_vertex(anchor) {
            result.push(vertex.clone());
        }
    }

    Ok(result)
}
