use itertools::Itertools;
use nalgebra::DMatrix;
use pathfinding::kuhn_munkres::kuhn_munkres;
use pathfinding::matrix::Matrix;

/// Default minimal bid increment of the auction solver
pub const DEFAULT_AUCTION_EPSILON: f32 = 1e-3;

const F32_I64_MULT: f32 = 1_000_000.0;

/// Maximum-weight assignment between the rows and the columns of a benefit matrix.
///
/// The result has one entry per row: the column assigned to it or `None`. A column is never
/// assigned to more than one row.
///
pub trait AssignmentSolver {
    fn solve(&self, benefit: &DMatrix<f32>) -> Vec<Option<usize>>;
}

/// Available assignment methods
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentMethod {
    /// Iterative auction bounded by the iteration cap, approximate
    #[default]
    Auction,
    /// Exact Hungarian (Kuhn-Munkres) solution on a fixed-point copy of the matrix
    KuhnMunkres,
}

/// Forward auction (Gauss-Seidel variant) maximizing the total benefit.
///
/// The smaller side of the matrix bids for the larger side. One iteration lets every
/// currently unassigned bidder place one bid. Bidders left without an object after `max_iter`
/// iterations take, in index order, their most valuable free object, so the matching is
/// always complete. The outcome depends only on the matrix, the cap and `epsilon`.
///
#[derive(Debug, Clone)]
pub struct AuctionSolver {
    max_iter: usize,
    epsilon: f32,
}

impl AuctionSolver {
    pub fn new(max_iter: usize) -> Self {
        Self {
            max_iter,
            epsilon: DEFAULT_AUCTION_EPSILON,
        }
    }

    /// Minimal price increment, the solution is within `n * epsilon` of the optimum
    ///
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        assert!(epsilon > 0.0, "Auction epsilon must be positive");
        self.epsilon = epsilon;
        self
    }

    fn auction<F>(&self, bidders: usize, objects: usize, value: F) -> Vec<Option<usize>>
    where
        F: Fn(usize, usize) -> f32,
    {
        let mut prices = vec![0.0_f32; objects];
        let mut owners: Vec<Option<usize>> = vec![None; objects];
        let mut assigned: Vec<Option<usize>> = vec![None; bidders];

        for iteration in 0..self.max_iter {
            let unassigned = (0..bidders)
                .filter(|b| assigned[*b].is_none())
                .collect::<Vec<_>>();
            if unassigned.is_empty() {
                log::trace!("Auction converged after {} iterations", iteration);
                break;
            }

            for bidder in unassigned {
                let mut best: Option<(usize, f32)> = None;
                let mut second: Option<f32> = None;
                for (object, price) in prices.iter().enumerate() {
                    let net = value(bidder, object) - price;
                    match best {
                        Some((_, best_net)) if net <= best_net => {
                            if second.map_or(true, |s| net > s) {
                                second = Some(net);
                            }
                        }
                        _ => {
                            second = best.map(|(_, n)| n);
                            best = Some((object, net));
                        }
                    }
                }

                let (object, best_net) = match best {
                    Some(b) => b,
                    None => continue,
                };
                prices[object] += best_net - second.unwrap_or(best_net) + self.epsilon;
                if let Some(previous) = owners[object].replace(bidder) {
                    assigned[previous] = None;
                }
                assigned[bidder] = Some(object);
            }
        }

        for bidder in 0..bidders {
            if assigned[bidder].is_some() {
                continue;
            }
            let free = (0..objects)
                .filter(|o| owners[*o].is_none())
                .fold(None, |best: Option<(usize, f32)>, o| {
                    let v = value(bidder, o);
                    match best {
                        Some((_, bv)) if v <= bv => best,
                        _ => Some((o, v)),
                    }
                });
            if let Some((object, _)) = free {
                log::debug!(
                    "Auction cap of {} reached, bidder {} takes free object {}",
                    self.max_iter,
                    bidder,
                    object
                );
                owners[object] = Some(bidder);
                assigned[bidder] = Some(object);
            }
        }

        assigned
    }
}

impl AssignmentSolver for AuctionSolver {
    fn solve(&self, benefit: &DMatrix<f32>) -> Vec<Option<usize>> {
        let (rows, cols) = benefit.shape();
        if rows == 0 || cols == 0 {
            return vec![None; rows];
        }
        if rows <= cols {
            self.auction(rows, cols, |r, c| benefit[(r, c)])
        } else {
            let by_column = self.auction(cols, rows, |c, r| benefit[(r, c)]);
            invert(&by_column, rows)
        }
    }
}

/// Exact solver backed by `pathfinding`
///
#[derive(Debug, Clone, Default)]
pub struct KuhnMunkresSolver;

impl AssignmentSolver for KuhnMunkresSolver {
    fn solve(&self, benefit: &DMatrix<f32>) -> Vec<Option<usize>> {
        let (rows, cols) = benefit.shape();
        if rows == 0 || cols == 0 {
            return vec![None; rows];
        }
        let transposed = rows > cols;
        let (n, m) = if transposed { (cols, rows) } else { (rows, cols) };

        let mut weights = Matrix::new(n, m, 0i64);
        for (i, j) in (0..n).cartesian_product(0..m) {
            let v = if transposed {
                benefit[(j, i)]
            } else {
                benefit[(i, j)]
            };
            weights[(i, j)] = (v * F32_I64_MULT) as i64;
        }

        let (_, solution) = kuhn_munkres(&weights);
        let solution = solution.into_iter().map(Some).collect::<Vec<_>>();
        if transposed {
            invert(&solution, rows)
        } else {
            solution
        }
    }
}

fn invert(assignment: &[Option<usize>], len: usize) -> Vec<Option<usize>> {
    let mut res = vec![None; len];
    for (from, to) in assignment.iter().enumerate() {
        if let Some(to) = to {
            res[*to] = Some(from);
        }
    }
    res
}

/// Total benefit of an assignment
///
pub fn assignment_benefit(benefit: &DMatrix<f32>, assignment: &[Option<usize>]) -> f32 {
    assignment
        .iter()
        .enumerate()
        .filter_map(|(r, c)| c.map(|c| benefit[(r, c)]))
        .sum()
}

#[cfg(test)]
mod tests {
    use crate::utils::linear_sum_assignment::{
        assignment_benefit, AssignmentSolver, AuctionSolver, KuhnMunkresSolver,
        DEFAULT_AUCTION_EPSILON,
    };
    use nalgebra::DMatrix;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn assert_valid(assignment: &[Option<usize>], rows: usize, cols: usize) {
        assert_eq!(assignment.len(), rows);
        let mut used = HashSet::new();
        for c in assignment.iter().flatten() {
            assert!(*c < cols);
            assert!(used.insert(*c), "column {c} assigned twice");
        }
    }

    fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> DMatrix<f32> {
        DMatrix::from_fn(rows, cols, |_, _| rng.gen_range(0.0..2.0))
    }

    #[test]
    fn empty_matrices() {
        let a = AuctionSolver::new(100);
        assert_eq!(a.solve(&DMatrix::zeros(3, 0)), vec![None; 3]);
        assert!(a.solve(&DMatrix::zeros(0, 4)).is_empty());
        assert_eq!(KuhnMunkresSolver.solve(&DMatrix::zeros(2, 0)), vec![None; 2]);
    }

    #[test]
    fn obvious_assignment() {
        let benefit = DMatrix::from_row_slice(3, 3, &[0.9, 0.1, 0.2, 0.1, 0.8, 0.3, 0.2, 0.4, 0.7]);
        let expected = vec![Some(0), Some(1), Some(2)];
        assert_eq!(AuctionSolver::new(100).solve(&benefit), expected);
        assert_eq!(KuhnMunkresSolver.solve(&benefit), expected);
    }

    #[test]
    fn contested_column() {
        // both rows prefer column 0, the global optimum gives it to row 1
        let benefit = DMatrix::from_row_slice(2, 2, &[1.0, 0.9, 1.0, 0.1]);
        let expected = vec![Some(1), Some(0)];
        assert_eq!(AuctionSolver::new(100).solve(&benefit), expected);
        assert_eq!(KuhnMunkresSolver.solve(&benefit), expected);
    }

    #[test]
    fn more_rows_than_columns() {
        let benefit = DMatrix::from_row_slice(3, 1, &[0.2, 0.9, 0.5]);
        assert_eq!(
            AuctionSolver::new(100).solve(&benefit),
            vec![None, Some(0), None]
        );
        assert_eq!(KuhnMunkresSolver.solve(&benefit), vec![None, Some(0), None]);
    }

    #[test]
    fn iteration_cap() {
        let benefit = DMatrix::from_row_slice(2, 2, &[0.2, 0.9, 0.3, 0.1]);
        assert_eq!(AuctionSolver::new(0).solve(&benefit), vec![Some(1), Some(0)]);
        let one = AuctionSolver::new(1).solve(&DMatrix::from_element(2, 2, 1.0));
        assert_valid(&one, 2, 2);
        assert_eq!(one.iter().flatten().count(), 2);
    }

    #[test]
    fn capped_price_war_completes_the_matching() {
        let benefit = DMatrix::from_row_slice(
            3,
            3,
            &[1.0, 1.0, 0.5, 1.0, 1.0, 0.5, 1.0, 1.0, 0.5],
        );
        for cap in [1, 5, 100] {
            let a = AuctionSolver::new(cap).solve(&benefit);
            assert_valid(&a, 3, 3);
            assert_eq!(a.iter().flatten().count(), 3);
            assert!((assignment_benefit(&benefit, &a) - 2.5).abs() < 1e-6);
        }
        let wide = DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 0.5, 1.0, 1.0, 0.5]);
        let a = AuctionSolver::new(3).solve(&wide);
        assert_valid(&a, 2, 3);
        assert_eq!(a.iter().flatten().count(), 2);
    }

    #[test]
    fn random_assignments_are_valid_and_near_optimal() {
        let mut rng = StdRng::seed_from_u64(7);
        let auction = AuctionSolver::new(100_000);
        for _ in 0..200 {
            let rows = rng.gen_range(0..7);
            let cols = rng.gen_range(0..7);
            let benefit = random_matrix(&mut rng, rows, cols);

            let a = auction.solve(&benefit);
            let k = KuhnMunkresSolver.solve(&benefit);
            assert_valid(&a, rows, cols);
            assert_valid(&k, rows, cols);
            assert_eq!(a.iter().flatten().count(), rows.min(cols));
            assert_eq!(k.iter().flatten().count(), rows.min(cols));

            let optimum = assignment_benefit(&benefit, &k);
            let approx = assignment_benefit(&benefit, &a);
            let slack = rows.min(cols) as f32 * DEFAULT_AUCTION_EPSILON + 1e-3;
            assert!(approx <= optimum + 1e-3);
            assert!(approx >= optimum - slack, "{approx} vs {optimum}");
        }
    }

    #[test]
    fn deterministic() {
        let mut rng = StdRng::seed_from_u64(11);
        let benefit = random_matrix(&mut rng, 6, 4);
        let auction = AuctionSolver::new(50).with_epsilon(0.01);
        assert_eq!(auction.solve(&benefit), auction.solve(&benefit));
    }
}
