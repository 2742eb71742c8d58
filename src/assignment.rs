//! Hand-rolled Hungarian / Kuhn-Munkres assignment solver (spec.md §4.4).
//!
//! Not delegated to a generic crate (e.g. `pathfinding`'s `kuhn_munkres`):
//! the spec pins down a specific tie-break rule (deterministic row-major
//! "first qualifying zero wins") and an exact total-cost contract that a
//! generic implementation does not promise to preserve (see DESIGN.md).

const ZERO_EPS: f64 = 1e-7;

fn is_zero(v: f64) -> bool {
    v.abs() < ZERO_EPS
}

/// Solves the assignment problem for an `m x n` cost matrix. Returns
/// `(assign, reverse, total)`: `assign[i] = Some(j)` iff row `i` is
/// assigned to column `j` (`None` = unassigned); `reverse[j]` is the
/// inverse mapping. `total` is the sum of costs over matched pairs, taken
/// from the original (untransposed, unnegated) `cost` matrix.
///
/// `m = 0` or `n = 0` returns empty assignments and a total of 0.
pub fn solve(cost: &[Vec<f32>], maximize: bool) -> (Vec<Option<usize>>, Vec<Option<usize>>, f32) {
    let m = cost.len();
    let n = if m == 0 { 0 } else { cost[0].len() };
    if m == 0 || n == 0 {
        return (vec![None; m], vec![None; n], 0.0);
    }

    for row in cost {
        debug_assert_eq!(row.len(), n, "AssignmentSolver::solve: ragged cost matrix");
        for &v in row {
            debug_assert!(v.is_finite(), "AssignmentSolver::solve: non-finite cost");
        }
    }

    let sign = if maximize { -1.0 } else { 1.0 };
    let s = m.max(n);

    let mut real_max = f64::NEG_INFINITY;
    for row in cost {
        for &v in row {
            let signed = sign * v as f64;
            if signed > real_max {
                real_max = signed;
            }
        }
    }
    if !real_max.is_finite() {
        real_max = 0.0;
    }
    let sentinel = real_max + 1.0e6;

    let mut work = vec![vec![sentinel; s]; s];
    for (i, row) in cost.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            work[i][j] = sign * v as f64;
        }
    }

    let assign_full = munkres_min(work, s);

    let mut assign = vec![None; m];
    let mut reverse = vec![None; n];
    let mut total = 0.0f32;
    for i in 0..m {
        let j = assign_full[i];
        if j < n {
            assign[i] = Some(j);
            reverse[j] = Some(i);
            total += cost[i][j];
        }
    }

    (assign, reverse, total)
}

/// Classic six-step Munkres algorithm on a square `n x n` matrix. Returns
/// `assign[i]` = the column row `i` is matched to (always `< n`, square
/// matrices always admit a full assignment).
fn munkres_min(mut cost: Vec<Vec<f64>>, n: usize) -> Vec<usize> {
    // Step 1: row reduction.
    for row in cost.iter_mut() {
        let min = row.iter().cloned().fold(f64::INFINITY, f64::min);
        if min.is_finite() {
            for v in row.iter_mut() {
                *v -= min;
            }
        }
    }

    let mut star = vec![vec![false; n]; n];
    let mut prime = vec![vec![false; n]; n];
    let mut row_cover = vec![false; n];
    let mut col_cover = vec![false; n];

    // Step 2: star zeros, row-major, first qualifying zero per column.
    let mut col_starred = vec![false; n];
    for i in 0..n {
        for j in 0..n {
            if is_zero(cost[i][j]) && !col_starred[j] {
                star[i][j] = true;
                col_starred[j] = true;
                break;
            }
        }
    }

    loop {
        // Step 3: cover columns containing a starred zero.
        for j in 0..n {
            col_cover[j] = (0..n).any(|i| star[i][j]);
        }
        if col_cover.iter().filter(|&&c| c).count() >= n {
            break;
        }

        'augment: loop {
            // Step 4: find an uncovered zero, deterministic row-major scan.
            let mut found = None;
            for i in 0..n {
                if row_cover[i] {
                    continue;
                }
                for j in 0..n {
                    if !col_cover[j] && is_zero(cost[i][j]) {
                        found = Some((i, j));
                        break;
                    }
                }
                if found.is_some() {
                    break;
                }
            }

            match found {
                None => {
                    // Step 6: adjust by the smallest uncovered entry.
                    let mut delta = f64::INFINITY;
                    for i in 0..n {
                        if row_cover[i] {
                            continue;
                        }
                        for j in 0..n {
                            if !col_cover[j] && cost[i][j] < delta {
                                delta = cost[i][j];
                            }
                        }
                    }
                    for i in 0..n {
                        if row_cover[i] {
                            for v in cost[i].iter_mut() {
                                *v += delta;
                            }
                        }
                    }
                    for j in 0..n {
                        if !col_cover[j] {
                            for row in cost.iter_mut() {
                                row[j] -= delta;
                            }
                        }
                    }
                }
                Some((i, j)) => {
                    // Step 4 (continued): prime the zero.
                    prime[i][j] = true;
                    match (0..n).find(|&jj| star[i][jj]) {
                        Some(jj) => {
                            row_cover[i] = true;
                            col_cover[jj] = false;
                        }
                        None => {
                            // Step 5: augmenting path starting at (i, j).
                            let mut path = vec![(i, j)];
                            loop {
                                let (_, col) = *path.last().unwrap();
                                match (0..n).find(|&r| star[r][col]) {
                                    Some(r) => {
                                        path.push((r, col));
                                        let c2 = (0..n)
                                            .find(|&c| prime[r][c])
                                            .expect("augmenting path: starred row must carry a prime");
                                        path.push((r, c2));
                                    }
                                    None => break,
                                }
                            }
                            for &(r, c) in &path {
                                star[r][c] = prime[r][c];
                            }
                            for row in prime.iter_mut() {
                                row.iter_mut().for_each(|p| *p = false);
                            }
                            row_cover.iter_mut().for_each(|x| *x = false);
                            col_cover.iter_mut().for_each(|x| *x = false);
                            break 'augment;
                        }
                    }
                }
            }
        }
    }

    let mut assign = vec![usize::MAX; n];
    for i in 0..n {
        for j in 0..n {
            if star[i][j] {
                assign[i] = j;
            }
        }
    }
    assign
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matrix_returns_zero_total() {
        let cost: Vec<Vec<f32>> = vec![];
        let (assign, reverse, total) = solve(&cost, false);
        assert!(assign.is_empty());
        assert!(reverse.is_empty());
        assert_eq!(total, 0.0);
    }

    #[test]
    fn zero_columns_returns_empty() {
        let cost: Vec<Vec<f32>> = vec![vec![], vec![]];
        let (assign, reverse, total) = solve(&cost, false);
        assert_eq!(assign, vec![None, None]);
        assert!(reverse.is_empty());
        assert_eq!(total, 0.0);
    }

    /// Scenario D (spec.md §8): 5x4 rectangular minimization.
    #[test]
    fn rectangular_minimization_scenario_d() {
        let cost: Vec<Vec<f32>> = vec![
            vec![5.0, 10.0, 15.0, 20.0],
            vec![15.0, 20.0, 30.0, 10.0],
            vec![10.0, 20.0, 15.0, 30.0],
            vec![20.0, 10.0, 10.0, 45.0],
            vec![50.0, 50.0, 50.0, 50.0],
        ];
        let (assign, _reverse, total) = solve(&cost, false);
        assert_eq!(assign, vec![Some(0), Some(3), Some(2), Some(1), None]);
        assert_eq!(total, 40.0);
    }

    /// Property 6 (spec.md §8): total equals the sum over the assignment,
    /// and the assignment is an injective partial function.
    #[test]
    fn total_matches_assignment_and_is_injective() {
        let cost: Vec<Vec<f32>> = vec![vec![4.0, 1.0, 3.0], vec![2.0, 0.0, 5.0], vec![3.0, 2.0, 2.0]];
        let (assign, _reverse, total) = solve(&cost, false);
        let mut seen_cols = std::collections::HashSet::new();
        let mut recomputed = 0.0f32;
        for (i, maybe_j) in assign.iter().enumerate() {
            if let Some(j) = maybe_j {
                assert!(seen_cols.insert(*j), "column {} assigned twice", j);
                recomputed += cost[i][*j];
            }
        }
        assert!((recomputed - total).abs() < 1e-4);
    }

    /// Property 9 (spec.md §8): solving the transpose yields the transposed
    /// assignment.
    #[test]
    fn transpose_yields_transposed_assignment() {
        let cost: Vec<Vec<f32>> = vec![vec![4.0, 1.0, 3.0], vec![2.0, 0.0, 5.0], vec![3.0, 2.0, 2.0]];
        let transposed: Vec<Vec<f32>> = (0..3).map(|j| (0..3).map(|i| cost[i][j]).collect()).collect();

        let (assign, _, total) = solve(&cost, false);
        let (assign_t, _, total_t) = solve(&transposed, false);

        assert!((total - total_t).abs() < 1e-4);
        for (i, maybe_j) in assign.iter().enumerate() {
            if let Some(j) = maybe_j {
                assert_eq!(assign_t[*j], Some(i));
            }
        }
    }

    #[test]
    fn maximize_negates_the_search_but_reports_the_real_total() {
        let cost: Vec<Vec<f32>> = vec![vec![0.9, 0.1], vec![0.2, 0.8]];
        let (assign, _reverse, total) = solve(&cost, true);
        assert_eq!(assign, vec![Some(0), Some(1)]);
        assert!((total - 1.7).abs() < 1e-4);
    }

    #[test]
    fn single_cell_matrix() {
        let cost: Vec<Vec<f32>> = vec![vec![7.0]];
        let (assign, reverse, total) = solve(&cost, false);
        assert_eq!(assign, vec![Some(0)]);
        assert_eq!(reverse, vec![Some(0)]);
        assert_eq!(total, 7.0);
    }
}
