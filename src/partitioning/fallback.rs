//! Always-available partitioner: Cuthill-McKee ordering cut into chunks.
//!
//! Breadth-first search from a pseudo-peripheral node, neighbours visited by
//! increasing degree, keeps consecutive nodes close in the graph; cutting the
//! ordering into `nparts` contiguous chunks of near-equal size then gives
//! compact, non-empty parts whenever there are at least `nparts` nodes.

use super::RankAssignment;
use crate::adjacency::Graph;
use std::collections::VecDeque;

struct Levels {
    order: Vec<usize>,
    last_level: Vec<usize>,
    depth: usize,
}

/// BFS from `root` over unvisited nodes, neighbours by increasing degree.
fn bfs(graph: &Graph, root: usize, visited: &mut [bool], degree: &[usize]) -> Levels {
    let mut order = vec![root];
    let mut last_level = vec![root];
    let mut depth = 0;
    visited[root] = true;
    let mut queue = VecDeque::from([(root, 0usize)]);
    while let Some((v, d)) = queue.pop_front() {
        let mut next: Vec<usize> = graph.image(v).iter().copied().filter(|&w| !visited[w]).collect();
        next.sort_by_key(|&w| (degree[w], w));
        for w in next {
            visited[w] = true;
            order.push(w);
            if d + 1 > depth {
                depth = d + 1;
                last_level.clear();
            }
            last_level.push(w);
            queue.push_back((w, d + 1));
        }
    }
    Levels {
        order,
        last_level,
        depth,
    }
}

/// George-Liu search for a node of (locally) maximal eccentricity in the
/// component of `start`.
pub fn pseudo_peripheral_node(graph: &Graph, start: usize, degree: &[usize]) -> usize {
    let n = graph.num_domain();
    let mut root = start;
    let mut levels = bfs(graph, root, &mut vec![false; n], degree);
    loop {
        let Some(&cand) = levels.last_level.iter().min_by_key(|&&w| (degree[w], w)) else {
            return root;
        };
        let next = bfs(graph, cand, &mut vec![false; n], degree);
        if next.depth <= levels.depth {
            return root;
        }
        root = cand;
        levels = next;
    }
}

/// Cuthill-McKee ordering of all nodes, component by component.
pub fn cuthill_mckee_order(graph: &Graph) -> Vec<usize> {
    let n = graph.num_domain();
    let degree = graph.degrees();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut by_degree: Vec<usize> = (0..n).collect();
    by_degree.sort_by_key(|&v| (degree[v], v));
    for v in by_degree {
        if visited[v] {
            continue;
        }
        let root = pseudo_peripheral_node(graph, v, &degree);
        order.extend(bfs(graph, root, &mut visited, &degree).order);
    }
    order
}

pub fn partition(graph: &Graph, nparts: usize) -> Option<RankAssignment> {
    let n = graph.num_domain();
    if nparts == 0 || n < nparts {
        return None;
    }
    let order = cuthill_mckee_order(graph);
    let mut rank_at_elem = vec![0; n];
    for (pos, &v) in order.iter().enumerate() {
        rank_at_elem[v] = pos * nparts / n;
    }
    Some(RankAssignment::new(rank_at_elem, nparts))
}
