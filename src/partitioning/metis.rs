//! METIS k-way partitioning of a dual graph (feature `metis-support`).

use super::RankAssignment;
use crate::adjacency::Graph;
use metis::Idx;

pub fn partition(graph: &Graph, nparts: usize) -> Option<RankAssignment> {
    let n = graph.num_domain();
    if nparts == 0 || n < nparts {
        return None;
    }
    if nparts == 1 {
        return Some(RankAssignment::new(vec![0; n], 1));
    }
    let to_idx = |v: usize| Idx::try_from(v).ok();
    let mut xadj: Vec<Idx> = graph.domain_ptr().iter().map(|&v| to_idx(v)).collect::<Option<_>>()?;
    let mut adjncy: Vec<Idx> = graph.image_idx().iter().map(|&v| to_idx(v)).collect::<Option<_>>()?;
    let mut part = vec![0 as Idx; n];
    let Ok(mut metis_graph) = metis::Graph::new(1, to_idx(nparts)?, &mut xadj, &mut adjncy) else {
        log::warn!("METIS rejected the dual graph");
        return None;
    };
    if let Err(e) = metis_graph.part_kway(&mut part) {
        log::warn!("METIS k-way partitioning failed: {e:?}");
        return None;
    }
    let rank_at_elem = part
        .into_iter()
        .map(|p| usize::try_from(p).ok().filter(|&r| r < nparts))
        .collect::<Option<Vec<_>>>()?;
    Some(RankAssignment::new(rank_at_elem, nparts))
}
