//! Capacitated bipartite matching.
//!
//! # Algorithm
//! Kuhn's augmenting-path method where each right vertex accepts up to
//! `capacity` partners. O(V·E) per run, which is ample for
//! projects × slots.
//!
//! # Reference
//! - Kuhn (1955), "The Hungarian method for the assignment problem"

/// Size of a maximum matching of left vertices into right vertices.
///
/// `adjacency[u]` lists the right vertices left vertex `u` may use;
/// out-of-range entries are ignored.
pub fn max_matching(adjacency: &[Vec<usize>], right_count: usize, capacity: usize) -> usize {
    max_matching_with(adjacency, &vec![capacity; right_count])
}

/// Like [`max_matching`], with a capacity per right vertex.
pub fn max_matching_with(adjacency: &[Vec<usize>], capacities: &[usize]) -> usize {
    let mut holders: Vec<Vec<usize>> = vec![Vec::new(); capacities.len()];
    let mut matched = 0;
    for u in 0..adjacency.len() {
        let mut visited = vec![false; capacities.len()];
        if augment(u, adjacency, capacities, &mut holders, &mut visited) {
            matched += 1;
        }
    }
    matched
}

fn augment(
    u: usize,
    adjacency: &[Vec<usize>],
    capacities: &[usize],
    holders: &mut [Vec<usize>],
    visited: &mut [bool],
) -> bool {
    for &r in &adjacency[u] {
        if r >= holders.len() || visited[r] || capacities[r] == 0 {
            continue;
        }
        visited[r] = true;
        if holders[r].len() < capacities[r] {
            holders[r].push(u);
            return true;
        }
        for i in 0..holders[r].len() {
            let w = holders[r][i];
            if augment(w, adjacency, capacities, holders, visited) {
                holders[r][i] = u;
                return true;
            }
        }
    }
    false
}
