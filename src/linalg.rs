/// Use Nalgebra's dense LU decomposition to solve a linear system
pub mod nalgebra_solve;
/// Sparsely Packed Matrix
pub mod sparse_matrix;

use crate::assembly::{Assembler, AssemblyMode};
use crate::config::SimParams;
use crate::domain::Domain;
use crate::error::FemError;
use crate::physics::Physics;

use log::{debug, info};
use rayon::prelude::*;
use sparse_matrix::{AIJMatrixBinary, SparseMatrix};
use std::sync::mpsc::channel;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("Matrix Exceeded Maximum Size ({max}x{max}); Cannot Solve a {dimension}x{dimension} system!")]
    ProblemTooLarge { dimension: usize, max: usize },
    #[error("Right hand side has length {rhs} but the matrix has dimension {dimension}; Cannot Solve!")]
    DimensionMismatch { dimension: usize, rhs: usize },
    #[error("Matrix is singular; Cannot Solve!")]
    Singular,
    #[error("The system was assembled without a Jacobian; Cannot take a Newton step!")]
    MissingJacobian,
    #[error("Newton iterations did not converge after {iterations} steps (residual norm {residual_norm:.3e})")]
    NotConverged { iterations: usize, residual_norm: f64 },
}

/// Strategy used to solve the linearized system `J x = b`
pub trait LinearSolver: Send + Sync {
    fn solve(&self, matrix: &SparseMatrix, rhs: &[f64]) -> Result<Vec<f64>, SolveError>;
}

/// Scattered contribution of one Elem to the global system
#[derive(Debug, Clone, Default)]
pub struct Contribution {
    pub residual: Vec<(usize, f64)>,
    pub jacobian: Vec<([usize; 2], f64)>,
}

/// Global residual vector and (optional) Jacobian matrix, indexed by equation number
#[derive(Debug, Clone)]
pub struct LinearSystem {
    pub residual: Vec<f64>,
    pub jacobian: Option<SparseMatrix>,
}

impl LinearSystem {
    pub fn new(num_equations: usize, with_jacobian: bool) -> Self {
        Self {
            residual: vec![0.0; num_equations],
            jacobian: with_jacobian.then(|| SparseMatrix::new(num_equations)),
        }
    }

    pub fn dimension(&self) -> usize {
        self.residual.len()
    }

    /// Largest absolute entry of the residual
    pub fn residual_norm(&self) -> f64 {
        self.residual.iter().fold(0.0, |max, r| f64::max(max, r.abs()))
    }

    /// Sum a scattered contribution into the system
    pub fn add(&mut self, contribution: Contribution) {
        for (eqn, value) in contribution.residual {
            self.residual[eqn] += value;
        }
        if let Some(jacobian) = self.jacobian.as_mut() {
            jacobian.insert_group(contribution.jacobian);
        }
    }

    /// Compute contributions in parallel and sum them through a single consumer
    ///
    /// Every contribution is computed; the first error received is returned.
    pub fn par_accumulate<I, E>(&mut self, contributions: I) -> Result<(), E>
    where
        I: IntoParallelIterator<Item = Result<Contribution, E>>,
        E: Send,
    {
        let (sender, receiver) = channel();

        contributions
            .into_par_iter()
            .for_each_with(sender, |s, contribution| {
                // the receiver outlives every sender
                let _ = s.send(contribution);
            });

        let mut first_error = None;
        for contribution in receiver.iter() {
            match contribution {
                Ok(c) if first_error.is_none() => self.add(c),
                Ok(_) => (),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Write the Jacobian in PETSc's binary AIJ format
    pub fn print_jacobian_to_petsc_binary_file(&self, path: impl AsRef<str>) -> Result<(), FemError> {
        let jacobian = self.jacobian.as_ref().ok_or(SolveError::MissingJacobian)?;
        AIJMatrixBinary::from(jacobian).print_to_petsc_binary_file(path)?;
        Ok(())
    }
}

impl ParallelExtend<Contribution> for LinearSystem {
    fn par_extend<I>(&mut self, contributions: I)
    where
        I: IntoParallelIterator<Item = Contribution>,
    {
        let (sender, receiver) = channel();

        contributions
            .into_par_iter()
            .for_each_with(sender, |s, contribution| {
                let _ = s.send(contribution);
            });

        receiver.iter().for_each(|contribution| self.add(contribution));
    }
}

/// Summary of a converged Newton solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonReport {
    /// Number of linear solves performed
    pub iterations: usize,
    pub residual_norm: f64,
}

/// Plain Newton iterations: assemble, solve `J du = -R`, update, until the residual norm drops below
/// `params.newton_tolerance`
pub fn newton_solve(
    domain: &mut Domain,
    physics: &dyn Physics,
    solver: &dyn LinearSolver,
    params: &SimParams,
) -> Result<NewtonReport, FemError> {
    let mut residual_norm = f64::INFINITY;

    for iteration in 0..=params.max_newton_iterations {
        let system = {
            let assembler = Assembler::new(domain, physics).with_quadrature_boost(params.quadrature_boost);
            if params.parallel_assembly {
                assembler.assemble_parallel(AssemblyMode::ResidualAndJacobian)?
            } else {
                assembler.assemble(AssemblyMode::ResidualAndJacobian)?
            }
        };

        residual_norm = system.residual_norm();
        debug!("Newton iteration {}: residual norm {:.3e}", iteration, residual_norm);

        if residual_norm < params.newton_tolerance {
            info!(
                "Newton converged in {} iterations ({} equations)",
                iteration,
                system.dimension()
            );
            return Ok(NewtonReport {
                iterations: iteration,
                residual_norm,
            });
        }
        if iteration == params.max_newton_iterations {
            break;
        }

        let jacobian = system.jacobian.as_ref().ok_or(SolveError::MissingJacobian)?;
        let rhs: Vec<f64> = system.residual.iter().map(|r| -r).collect();
        let delta = solver.solve(jacobian, &rhs)?;
        domain.apply_update(&delta);
    }

    Err(SolveError::NotConverged {
        iterations: params.max_newton_iterations,
        residual_norm,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_contributions() {
        let contributions: Vec<Contribution> = (0..20)
            .map(|i| Contribution {
                residual: vec![(i % 4, 1.0)],
                jacobian: vec![([i % 4, (i + 1) % 4], 0.5)],
            })
            .collect();

        let mut serial = LinearSystem::new(4, true);
        for c in contributions.iter().cloned() {
            serial.add(c);
        }

        let mut parallel = LinearSystem::new(4, true);
        parallel.par_extend(contributions.clone());

        assert_eq!(serial.residual, vec![5.0; 4]);
        assert_eq!(parallel.residual, serial.residual);
        let [a, b] = [&serial, &parallel].map(|s| s.jacobian.as_ref().unwrap().iter().collect::<Vec<_>>());
        assert_eq!(a, b);
        assert_eq!(a[0], ([0, 1], 2.5));
    }

    #[test]
    fn first_error_is_returned() {
        let contributions: Vec<Result<Contribution, usize>> = (0..8)
            .map(|i| if i == 5 { Err(i) } else { Ok(Contribution::default()) })
            .collect();

        let mut system = LinearSystem::new(2, false);
        assert_eq!(system.par_accumulate(contributions), Err(5));
        assert!(system.print_jacobian_to_petsc_binary_file("./test_output/none.bin").is_err());
    }
}
