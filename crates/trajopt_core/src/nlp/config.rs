use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinesearchStrategy {
    /// Backtracking by a constant contraction factor.
    Armijo,
    /// Backtracking with safeguarded quadratic/cubic interpolation of the merit.
    CubicInterpolation,
}

/// Tuning of the augmented Lagrangian solver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Converged when primal and dual infeasibility are both below this.
    pub tol: f64,
    pub mu_init: f64,
    pub rho_init: f64,
    pub max_iters: usize,
    pub use_gauss_newton: bool,
    pub linesearch: LinesearchStrategy,
    /// Penalty decrease on a failed outer iteration.
    pub mu_factor: f64,
    /// Floor on the penalty; a `mu_init` below it acts as the floor instead.
    pub mu_min: f64,
    pub prim_alpha: f64,
    pub prim_beta: f64,
    pub dual_alpha: f64,
    pub dual_beta: f64,
    pub alpha_min: f64,
    pub armijo_c1: f64,
    pub ls_contraction: f64,
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tol: 1e-6,
            mu_init: 1e-2,
            rho_init: 1e-8,
            max_iters: 100,
            use_gauss_newton: true,
            linesearch: LinesearchStrategy::Armijo,
            mu_factor: 0.1,
            mu_min: 1e-9,
            prim_alpha: 0.1,
            prim_beta: 0.9,
            dual_alpha: 1.0,
            dual_beta: 1.0,
            alpha_min: 1e-7,
            armijo_c1: 1e-4,
            ls_contraction: 0.5,
            verbose: false,
        }
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl SolverConfig {
    /// Smallest penalty the outer loop may reach.
    pub fn mu_floor(&self) -> f64 {
        self.mu_min.min(self.mu_init)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason| Err(Error::InvalidConfig { reason });
        if !positive(self.tol) {
            return invalid("tol must be positive");
        }
        if !positive(self.mu_init) {
            return invalid("mu_init must be positive");
        }
        if !positive(self.rho_init) {
            return invalid("rho_init must be positive");
        }
        if self.max_iters == 0 {
            return invalid("max_iters must be greater than zero");
        }
        if !(positive(self.mu_factor) && self.mu_factor < 1.0) {
            return invalid("mu_factor must lie in (0, 1)");
        }
        if !positive(self.mu_min) {
            return invalid("mu_min must be positive");
        }
        if !(positive(self.prim_alpha) && positive(self.prim_beta)) {
            return invalid("prim_alpha and prim_beta must be positive");
        }
        if !(positive(self.dual_alpha) && positive(self.dual_beta)) {
            return invalid("dual_alpha and dual_beta must be positive");
        }
        if !(positive(self.alpha_min) && self.alpha_min < 1.0) {
            return invalid("alpha_min must lie in (0, 1)");
        }
        if !(positive(self.armijo_c1) && self.armijo_c1 < 0.5) {
            return invalid("armijo_c1 must lie in (0, 0.5)");
        }
        if !(positive(self.ls_contraction) && self.ls_contraction < 1.0) {
            return invalid("ls_contraction must lie in (0, 1)");
        }
        Ok(())
    }
}
