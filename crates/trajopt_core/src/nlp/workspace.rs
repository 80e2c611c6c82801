use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::problem::NlpProblem;
use crate::error::{Error, Result};

/// Scratch storage for one solve, sized from a problem's dimensions.
#[derive(Debug, Clone)]
pub struct Workspace {
    nx: usize,
    constraint_dims: Vec<usize>,
    /// Condensed primal KKT matrix (merit Hessian model).
    pub kkt_matrix: DMatrix<f64>,
    pub cost_gradient: DVector<f64>,
    pub merit_gradient: DVector<f64>,
    pub constraint_values: Vec<DVector<f64>>,
    pub constraint_jacobians: Vec<DMatrix<f64>>,
    /// First-order multiplier estimates `Π(c + μλ) / μ`.
    pub projected_multipliers: Vec<DVector<f64>>,
    /// Scaled constraint values `c + μλ` before projection.
    pub shifted_constraints: Vec<DVector<f64>>,
    pub step: DVector<f64>,
}

impl Workspace {
    pub fn new(problem: &NlpProblem) -> Self {
        let nx = problem.nx();
        let constraint_dims: Vec<usize> = problem.constraints().iter().map(|c| c.nr()).collect();
        let vectors = || constraint_dims.iter().map(|&nr| DVector::zeros(nr)).collect::<Vec<_>>();
        Self {
            nx,
            kkt_matrix: DMatrix::zeros(nx, nx),
            cost_gradient: DVector::zeros(nx),
            merit_gradient: DVector::zeros(nx),
            constraint_values: vectors(),
            constraint_jacobians: constraint_dims
                .iter()
                .map(|&nr| DMatrix::zeros(nr, nx))
                .collect(),
            projected_multipliers: vectors(),
            shifted_constraints: vectors(),
            step: DVector::zeros(nx),
            constraint_dims,
        }
    }

    /// Rejects a workspace allocated for a problem of different shape.
    pub fn check(&self, problem: &NlpProblem) -> Result<()> {
        let same_blocks = self.constraint_dims.len() == problem.num_constraints()
            && self
                .constraint_dims
                .iter()
                .zip(problem.constraints())
                .all(|(&nr, c)| nr == c.nr());
        if self.nx != problem.nx() || !same_blocks {
            return Err(Error::WorkspaceShape {
                expected: self.nx,
                expected_constraints: self.constraint_dims.iter().sum(),
                actual: problem.nx(),
                actual_constraints: problem.total_constraint_dim(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Converged,
    MaxIterationsExceeded,
    NumericalFailure,
}

/// Outcome of a solver run. `x_opt` is the last iterate whatever the status.
#[derive(Debug, Clone)]
pub struct SolverResults {
    pub status: SolveStatus,
    pub x_opt: DVector<f64>,
    pub lams_opt: Vec<DVector<f64>>,
    pub value: f64,
    pub primal_infeasibility: f64,
    pub dual_infeasibility: f64,
    pub iterations: usize,
    pub outer_iterations: usize,
    pub mu: f64,
    pub rho: f64,
}
