//! Dependency ordering for initialization and service evaluation.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Topological order of nodes `0..n` given `(from, to)` edges, meaning `from`
/// must be evaluated before `to`.
///
/// Ties are broken by the smallest index, so declaration order is kept
/// wherever dependencies allow. On a cycle, returns the nodes that could not
/// be ordered.
pub fn evaluation_order(n: usize, edges: &[(usize, usize)]) -> Result<Vec<usize>, Vec<usize>> {
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0_usize; n];

    for &(from, to) in edges {
        adj[from].push(to);
        in_degree[to] += 1;
    }

    // Kahn's algorithm with a min-heap for determinism
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, deg)| **deg == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &next in &adj[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != n {
        let stuck = (0..n).filter(|i| in_degree[*i] > 0).collect();
        return Err(stuck);
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order_without_edges() {
        assert_eq!(evaluation_order(3, &[]).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn respects_dependencies() {
        // 2 -> 0 -> 1
        let order = evaluation_order(3, &[(2, 0), (0, 1)]).unwrap();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn reports_cycle_members() {
        // 0 <-> 1, 2 free
        let stuck = evaluation_order(3, &[(0, 1), (1, 0)]).unwrap_err();
        assert_eq!(stuck, vec![0, 1]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        assert_eq!(evaluation_order(1, &[(0, 0)]).unwrap_err(), vec![0]);
    }
}
