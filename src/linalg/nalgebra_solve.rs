use super::sparse_matrix::SparseMatrix;
use super::{LinearSolver, SolveError};

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

// TODO: use Nalgebra's Sparse crate
pub const MAX_DENSE_SIZE: usize = 1000;

/// Reference solver: casts the sparse matrix as a dense nalgebra matrix and uses its LU decomposition
///
/// This is only recommended for small problems; the dense matrix uses a very large amount of memory when
/// the system is large.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseLuSolver;

impl LinearSolver for DenseLuSolver {
    fn solve(&self, matrix: &SparseMatrix, rhs: &[f64]) -> Result<Vec<f64>, SolveError> {
        let dimension = matrix.dimension;
        if dimension > MAX_DENSE_SIZE {
            return Err(SolveError::ProblemTooLarge {
                dimension,
                max: MAX_DENSE_SIZE,
            });
        }
        if rhs.len() != dimension {
            return Err(SolveError::DimensionMismatch {
                dimension,
                rhs: rhs.len(),
            });
        }
        if dimension > MAX_DENSE_SIZE / 2 {
            warn!("Solving a {}x{} system with a dense LU decomposition", dimension, dimension);
        }
        debug!("dense LU solve of {} equations ({} entries)", dimension, matrix.num_entries());

        let dense: DMatrix<f64> = matrix.into();
        dense
            .lu()
            .solve(&DVector::from_column_slice(rhs))
            .map(|x| x.iter().copied().collect())
            .ok_or(SolveError::Singular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn solve_small_system() {
        let mut m = SparseMatrix::new(3);
        m.insert_group(vec![
            ([0, 0], 4.0),
            ([0, 1], 1.0),
            ([1, 0], 2.0),
            ([1, 1], 3.0),
            ([1, 2], -1.0),
            ([2, 2], 2.0),
        ]);

        let x = DenseLuSolver.solve(&m, &[6.0, 3.0, 4.0]).unwrap();
        let b = m.mul_vec(&x);
        for (bi, expected) in b.iter().zip([6.0, 3.0, 4.0]) {
            assert_relative_eq!(*bi, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn solver_errors() {
        let mut m = SparseMatrix::new(2);
        m.insert([0, 0], 1.0);
        m.insert([0, 1], 2.0);
        assert_eq!(DenseLuSolver.solve(&m, &[1.0, 1.0]), Err(SolveError::Singular));
        assert!(matches!(
            DenseLuSolver.solve(&m, &[1.0]),
            Err(SolveError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            DenseLuSolver.solve(&SparseMatrix::new(MAX_DENSE_SIZE + 1), &[]),
            Err(SolveError::ProblemTooLarge { .. })
        ));
    }
}
