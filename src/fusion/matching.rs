//! Minimum-weight bipartite matching on distance matrices.

use ndarray::Array2;
use tracing::warn;

use crate::error::{Error, Result};

/// Largest side handled by the exhaustive fallback when `lapjv` fails.
const EXHAUSTIVE_LIMIT: usize = 8;

/// Relative tolerance under which two matching costs count as tied.
const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentResult {
    /// Matched (row, column) pairs, sorted by row.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

impl AssignmentResult {
    pub fn total_cost(&self, cost_matrix: &Array2<f64>) -> f64 {
        self.matches.iter().map(|&(r, c)| cost_matrix[[r, c]]).sum()
    }
}

/// Solve the assignment exactly, matching `min(rows, cols)` pairs.
///
/// The matrix is padded to a square and solved with Jonker-Volgenant. Among
/// optimal matchings of equal cost, lower rows are paired with lower
/// columns, so the result does not depend on solver internals.
pub fn linear_assignment(cost_matrix: &Array2<f64>) -> Result<AssignmentResult> {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return Ok(AssignmentResult {
            matches: vec![],
            unmatched_rows: (0..num_rows).collect(),
            unmatched_cols: (0..num_cols).collect(),
        });
    }
    if cost_matrix.iter().any(|c| !c.is_finite()) {
        return Err(Error::assignment("cost matrix contains non-finite values"));
    }

    let row_to_col = if num_rows == 1 && num_cols == 1 {
        vec![0]
    } else {
        let size = num_rows.max(num_cols);
        let max_cost = cost_matrix.iter().cloned().fold(0.0_f64, f64::max);
        let mut padded = Array2::<f64>::from_elem((size, size), max_cost + 1.0);
        for i in 0..num_rows {
            for j in 0..num_cols {
                padded[[i, j]] = cost_matrix[[i, j]];
            }
        }

        match lapjv::lapjv(&padded) {
            Ok((row_to_col, _)) => row_to_col,
            Err(err) if size <= EXHAUSTIVE_LIMIT => {
                warn!(?err, size, "lapjv failed, falling back to exhaustive search");
                exhaustive_assignment(&padded)
            }
            Err(err) => return Err(Error::assignment(format!("lapjv failed: {err:?}"))),
        }
    };

    let mut matches: Vec<(usize, usize)> = row_to_col
        .iter()
        .enumerate()
        .filter(|&(row, &col)| row < num_rows && col < num_cols)
        .map(|(row, &col)| (row, col))
        .collect();
    prefer_lower_indices(cost_matrix, &mut matches);

    Ok(build_result(matches, num_rows, num_cols))
}

fn build_result(
    mut matches: Vec<(usize, usize)>,
    num_rows: usize,
    num_cols: usize,
) -> AssignmentResult {
    matches.sort_unstable();
    let mut row_used = vec![false; num_rows];
    let mut col_used = vec![false; num_cols];
    for &(r, c) in &matches {
        row_used[r] = true;
        col_used[c] = true;
    }
    AssignmentResult {
        matches,
        unmatched_rows: (0..num_rows).filter(|&r| !row_used[r]).collect(),
        unmatched_cols: (0..num_cols).filter(|&c| !col_used[c]).collect(),
    }
}

fn tied(a: f64, b: f64) -> bool {
    a <= b + TIE_EPSILON * (1.0 + b.abs())
}

/// Exchange partners between matched pairs, or move a pair onto a free
/// row or column, whenever the cost does not grow and the lower index gets
/// the lower partner.
fn prefer_lower_indices(cost: &Array2<f64>, matches: &mut Vec<(usize, usize)>) {
    let (num_rows, num_cols) = cost.dim();
    let max_rounds = 4 * num_rows.max(num_cols).pow(2) + 1;

    for _ in 0..max_rounds {
        matches.sort_unstable();
        let mut changed = false;

        'scan: for i in 0..matches.len() {
            let (ri, ci) = matches[i];
            for k in (i + 1)..matches.len() {
                let (rk, ck) = matches[k];
                if ci > ck
                    && tied(
                        cost[[ri, ck]] + cost[[rk, ci]],
                        cost[[ri, ci]] + cost[[rk, ck]],
                    )
                {
                    matches[i] = (ri, ck);
                    matches[k] = (rk, ci);
                    changed = true;
                    break 'scan;
                }
            }

            let free_col = (0..ci).find(|&c| {
                !matches.iter().any(|&(_, mc)| mc == c) && tied(cost[[ri, c]], cost[[ri, ci]])
            });
            if let Some(c) = free_col {
                matches[i] = (ri, c);
                changed = true;
                break 'scan;
            }

            let free_row = (0..ri).find(|&r| {
                !matches.iter().any(|&(mr, _)| mr == r) && tied(cost[[r, ci]], cost[[ri, ci]])
            });
            if let Some(r) = free_row {
                matches[i] = (r, ci);
                changed = true;
                break 'scan;
            }
        }

        if !changed {
            return;
        }
    }
}

/// Exact assignment of a small square matrix by enumerating permutations.
fn exhaustive_assignment(cost: &Array2<f64>) -> Vec<usize> {
    fn search(
        cost: &Array2<f64>,
        row: usize,
        used: &mut [bool],
        current: &mut Vec<usize>,
        acc: f64,
        best: &mut (f64, Vec<usize>),
    ) {
        let n = cost.nrows();
        if acc >= best.0 {
            return;
        }
        if row == n {
            *best = (acc, current.clone());
            return;
        }
        for col in 0..n {
            if !used[col] {
                used[col] = true;
                current.push(col);
                search(cost, row + 1, used, current, acc + cost[[row, col]], best);
                current.pop();
                used[col] = false;
            }
        }
    }

    let n = cost.nrows();
    let mut best = (f64::INFINITY, (0..n).collect());
    search(cost, 0, &mut vec![false; n], &mut Vec::with_capacity(n), 0.0, &mut best);
    best.1
}
