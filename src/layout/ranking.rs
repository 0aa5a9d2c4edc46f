use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Longest-path layer for every member of a scope. Cycles are broken by
/// taking the remaining member earliest in scope order as the next source,
/// treating its incoming edges as back-edges.
pub(super) fn compute_ranks(len: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); len];
    let mut indeg = vec![0usize; len];
    for &(from, to) in edges {
        if from >= len || to >= len || from == to {
            continue;
        }
        adj[from].push(to);
        indeg[to] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = BinaryHeap::new();
    for (idx, deg) in indeg.iter().enumerate() {
        if *deg == 0 {
            ready.push(Reverse(idx));
        }
    }

    let mut order = Vec::with_capacity(len);
    let mut processed = vec![false; len];
    loop {
        while let Some(Reverse(idx)) = ready.pop() {
            if processed[idx] {
                continue;
            }
            order.push(idx);
            processed[idx] = true;
            for &next in &adj[idx] {
                if processed[next] {
                    continue;
                }
                indeg[next] = indeg[next].saturating_sub(1);
                if indeg[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() >= len {
            break;
        }
        match (0..len).find(|idx| !processed[*idx]) {
            Some(idx) => ready.push(Reverse(idx)),
            None => break,
        }
    }

    let mut order_index = vec![0usize; len];
    for (pos, idx) in order.iter().enumerate() {
        order_index[*idx] = pos;
    }

    let mut ranks = vec![0usize; len];
    for &node in &order {
        let rank = ranks[node];
        for &next in &adj[node] {
            if order_index[next] <= order_index[node] {
                continue;
            }
            ranks[next] = ranks[next].max(rank + 1);
        }
    }
    ranks
}

/// Groups members by rank, keeping scope order inside each bucket.
pub(super) fn rank_buckets(ranks: &[usize]) -> Vec<Vec<usize>> {
    let depth = ranks.iter().copied().max().map_or(0, |max| max + 1);
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for (idx, rank) in ranks.iter().enumerate() {
        buckets[*rank].push(idx);
    }
    buckets
}

/// Median heuristic sweeps, alternating downward (by predecessors) and
/// upward (by successors), to reduce crossings between adjacent ranks.
pub(super) fn order_rank_nodes(rank_nodes: &mut [Vec<usize>], edges: &[(usize, usize)], passes: usize) {
    if rank_nodes.len() <= 1 {
        return;
    }
    let len = rank_nodes
        .iter()
        .flatten()
        .copied()
        .max()
        .map_or(0, |max| max + 1);
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); len];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); len];
    for &(from, to) in edges {
        if from < len && to < len {
            outgoing[from].push(to);
            incoming[to].push(from);
        }
    }

    let mut positions = vec![0usize; len];
    let update_positions = |rank_nodes: &[Vec<usize>], positions: &mut Vec<usize>| {
        for bucket in rank_nodes {
            for (pos, idx) in bucket.iter().enumerate() {
                positions[*idx] = pos;
            }
        }
    };
    update_positions(&*rank_nodes, &mut positions);

    let sort_bucket = |bucket: &mut Vec<usize>, neighbors: &[Vec<usize>], positions: &[usize]| {
        let mut keyed: Vec<(usize, usize, f32)> = bucket
            .iter()
            .enumerate()
            .map(|(pos, idx)| (*idx, pos, median_position(*idx, pos, neighbors, positions)))
            .collect();
        keyed.sort_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        *bucket = keyed.into_iter().map(|(idx, _, _)| idx).collect();
    };

    for _ in 0..passes.max(1) {
        for rank in 1..rank_nodes.len() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &incoming, &positions);
            update_positions(&*rank_nodes, &mut positions);
        }
        for rank in (0..rank_nodes.len().saturating_sub(1)).rev() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &outgoing, &positions);
            update_positions(&*rank_nodes, &mut positions);
        }
    }
}

fn median_position(idx: usize, current: usize, neighbors: &[Vec<usize>], positions: &[usize]) -> f32 {
    let mut values: Vec<f32> = neighbors[idx].iter().map(|n| positions[*n] as f32).collect();
    if values.is_empty() {
        return current as f32;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_longest_path() {
        // a -> b -> d, a -> d, c isolated
        let ranks = compute_ranks(4, &[(0, 1), (1, 3), (0, 3)]);
        assert_eq!(ranks, vec![0, 1, 0, 2]);
    }

    #[test]
    fn cycles_do_not_hang() {
        let ranks = compute_ranks(3, &[(0, 1), (1, 2), (2, 0)]);
        assert_eq!(ranks.len(), 3);
        assert_eq!(ranks[0], 0);
        assert_eq!(ranks[1], 1);
        assert_eq!(ranks[2], 2);
    }

    #[test]
    fn buckets_preserve_scope_order() {
        let buckets = rank_buckets(&[0, 1, 0, 1]);
        assert_eq!(buckets, vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn ordering_uncrosses_simple_pair() {
        // 0 -> 3, 1 -> 2 crosses when rank 1 is [2, 3].
        let mut buckets = vec![vec![0, 1], vec![2, 3]];
        order_rank_nodes(&mut buckets, &[(0, 3), (1, 2)], 2);
        let pos_of = |idx: usize| buckets[1].iter().position(|n| *n == idx).unwrap();
        let first_top = buckets[0][0];
        let child_of_first = if first_top == 0 { 3 } else { 2 };
        assert_eq!(pos_of(child_of_first), 0);
    }
}
