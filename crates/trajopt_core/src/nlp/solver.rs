//! Primal-dual proximal augmented Lagrangian solver.
//!
//! Outer iterations follow a bound-constrained Lagrangian schedule: when the
//! inner minimization reaches the current primal tolerance, multipliers are
//! updated and the tolerances tightened; otherwise the penalty `μ` is
//! decreased. Inner iterations are Newton steps on the merit
//!
//! `M(x) = f(x) + Σ ‖Π(c(x) + μλ)‖² / 2μ + ρ‖x - x_prox‖² / 2`
//!
//! globalized by a backtracking line search.

use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};

use super::config::SolverConfig;
use super::linesearch;
use super::observer::{IterationObserver, IterationRecord};
use super::problem::{ConstraintKind, NlpProblem};
use super::workspace::{SolveStatus, SolverResults, Workspace};
use crate::error::Result;

const PRIM_TOL0: f64 = 1.0;
const INNER_TOL0: f64 = 1.0;
const REG_INIT: f64 = 1e-8;
const REG_MAX: f64 = 1e8;
const REG_GROWTH: f64 = 10.0;

/// The capability the trajectory driver needs from an NLP backend.
pub trait NlpSolver {
    fn register_observer(&mut self, observer: Box<dyn IterationObserver>);

    fn clear_observers(&mut self);

    /// Runs from `x0` with multipliers `lams0` (one vector per constraint).
    ///
    /// Errors only on malformed inputs; failure to converge is reported in
    /// the returned status.
    fn solve(
        &mut self,
        workspace: &mut Workspace,
        problem: &NlpProblem,
        x0: &DVector<f64>,
        lams0: &[DVector<f64>],
    ) -> Result<SolverResults>;
}

pub struct ProxAlSolver {
    config: SolverConfig,
    observers: Vec<Box<dyn IterationObserver>>,
}

/// Optimality measures at one iterate.
#[derive(Debug, Clone, Copy)]
struct Evaluation {
    value: f64,
    merit: f64,
    primal: f64,
    dual: f64,
    merit_gradient_norm: f64,
}

impl Evaluation {
    fn is_finite(&self) -> bool {
        self.value.is_finite()
            && self.merit.is_finite()
            && self.primal.is_finite()
            && self.dual.is_finite()
            && self.merit_gradient_norm.is_finite()
    }
}

/// Penalty state shared by the merit and its derivatives.
struct Penalty<'a> {
    lams: &'a [DVector<f64>],
    x_prox: &'a DVector<f64>,
    mu: f64,
    rho: f64,
}

impl ProxAlSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn notify(&mut self, record: &IterationRecord) {
        for observer in self.observers.iter_mut() {
            observer.observe(record);
        }
    }

    /// Merit value only, for line-search trials.
    fn merit(problem: &NlpProblem, x: &DVector<f64>, penalty: &Penalty) -> f64 {
        let mut merit = problem.cost().value(x);
        for (constraint, lam) in problem.constraints().iter().zip(penalty.lams) {
            let mut c = DVector::zeros(constraint.nr());
            constraint.function.evaluate(x, &mut c);
            let sq: f64 = c
                .iter()
                .zip(lam.iter())
                .map(|(ci, li)| constraint.kind.project(ci + penalty.mu * li).powi(2))
                .sum();
            merit += sq / (2.0 * penalty.mu);
        }
        merit + 0.5 * penalty.rho * (x - penalty.x_prox).norm_squared()
    }

    /// Fills values, Jacobians, multiplier estimates and the merit gradient.
    fn evaluate(
        ws: &mut Workspace,
        problem: &NlpProblem,
        x: &DVector<f64>,
        penalty: &Penalty,
    ) -> Evaluation {
        let cost = problem.cost();
        let value = cost.value(x);
        cost.gradient(x, &mut ws.cost_gradient);

        let mut penalty_term = 0.0;
        let mut primal: f64 = 0.0;
        let mut lagrangian_gradient = ws.cost_gradient.clone();

        for (i, (constraint, lam)) in problem.constraints().iter().zip(penalty.lams).enumerate() {
            constraint.function.evaluate(x, &mut ws.constraint_values[i]);
            constraint
                .function
                .jacobian(x, &mut ws.constraint_jacobians[i]);

            let c = &ws.constraint_values[i];
            let shifted = c + lam * penalty.mu;
            let projected = shifted.map(|s| constraint.kind.project(s));
            penalty_term += projected.norm_squared() / (2.0 * penalty.mu);
            let lam_plus = projected / penalty.mu;

            let violation = match constraint.kind {
                ConstraintKind::Equality => c.amax(),
                ConstraintKind::Inequality => c
                    .iter()
                    .zip(lam_plus.iter())
                    .map(|(&ci, &li)| ci.max(-li).abs())
                    .fold(0.0, f64::max),
            };
            primal = primal.max(violation);

            lagrangian_gradient += ws.constraint_jacobians[i].tr_mul(&lam_plus);
            ws.shifted_constraints[i] = shifted;
            ws.projected_multipliers[i] = lam_plus;
        }

        let prox = x - penalty.x_prox;
        ws.merit_gradient = &lagrangian_gradient + &prox * penalty.rho;

        Evaluation {
            value,
            merit: value + penalty_term + 0.5 * penalty.rho * prox.norm_squared(),
            primal,
            dual: lagrangian_gradient.amax(),
            merit_gradient_norm: ws.merit_gradient.amax(),
        }
    }

    /// Assembles the merit Hessian model at `x` into `ws.kkt_matrix`.
    /// Relies on the Jacobians and multiplier estimates from [`Self::evaluate`].
    fn assemble_kkt(&self, ws: &mut Workspace, problem: &NlpProblem, x: &DVector<f64>, penalty: &Penalty) {
        let n = problem.nx();
        let model = problem
            .cost()
            .second_order_model(x, self.config.use_gauss_newton);
        ws.kkt_matrix.copy_from(&model.hessian);

        let mut curvature = DMatrix::zeros(n, n);
        for (i, constraint) in problem.constraints().iter().enumerate() {
            let jac = &ws.constraint_jacobians[i];
            let mut active = jac.clone();
            for (r, mut row) in active.row_iter_mut().enumerate() {
                if constraint.kind == ConstraintKind::Inequality
                    && ws.shifted_constraints[i][r] <= 0.0
                {
                    row.fill(0.0);
                }
            }
            ws.kkt_matrix += jac.tr_mul(&active) / penalty.mu;

            if !self.config.use_gauss_newton && !constraint.function.is_affine() {
                constraint.function.vector_hessian_product(
                    x,
                    &ws.projected_multipliers[i],
                    &mut curvature,
                );
                ws.kkt_matrix += &curvature;
            }
        }

        for d in 0..n {
            ws.kkt_matrix[(d, d)] += penalty.rho;
        }
    }

    /// Solves `K d = -∇M` with increasing diagonal regularization until the
    /// factorization succeeds. Returns false when no regularization works.
    fn compute_step(ws: &mut Workspace) -> bool {
        let n = ws.kkt_matrix.nrows();
        let mut reg = 0.0;
        loop {
            let mut matrix = ws.kkt_matrix.clone();
            for d in 0..n {
                matrix[(d, d)] += reg;
            }
            if let Some(chol) = matrix.cholesky() {
                ws.step = -chol.solve(&ws.merit_gradient);
                return ws.step.iter().all(|v| v.is_finite());
            }
            reg = if reg == 0.0 { REG_INIT } else { reg * REG_GROWTH };
            if reg > REG_MAX {
                return false;
            }
        }
    }
}

impl NlpSolver for ProxAlSolver {
    fn register_observer(&mut self, observer: Box<dyn IterationObserver>) {
        self.observers.push(observer);
    }

    fn clear_observers(&mut self) {
        self.observers.clear();
    }

    fn solve(
        &mut self,
        ws: &mut Workspace,
        problem: &NlpProblem,
        x0: &DVector<f64>,
        lams0: &[DVector<f64>],
    ) -> Result<SolverResults> {
        let config = self.config;
        config.validate()?;
        ws.check(problem)?;
        problem.check_decision(x0)?;
        problem.check_multipliers(lams0)?;

        info!(
            "Solving NLP with {} variables and {} constraint rows in {} blocks",
            problem.nx(),
            problem.total_constraint_dim(),
            problem.num_constraints()
        );

        let mut x = x0.clone();
        let mut lams = lams0.to_vec();
        let mut x_prox = x.clone();
        let mut mu = config.mu_init;
        let mu_floor = config.mu_floor();
        let rho = config.rho_init;
        let mut prim_tol = PRIM_TOL0;
        let mut inner_tol = INNER_TOL0;
        let mut iterations = 0usize;
        let mut outer = 0usize;
        let mut last = None;

        let status = 'outer: loop {
            if outer >= config.max_iters {
                break SolveStatus::MaxIterationsExceeded;
            }
            outer += 1;

            let eval = loop {
                let penalty = Penalty {
                    lams: &lams,
                    x_prox: &x_prox,
                    mu,
                    rho,
                };
                let eval = Self::evaluate(ws, problem, &x, &penalty);
                last = Some(eval);

                if !eval.is_finite() {
                    break 'outer SolveStatus::NumericalFailure;
                }
                if eval.primal <= config.tol && eval.dual <= config.tol {
                    lams.clone_from(&ws.projected_multipliers);
                    break 'outer SolveStatus::Converged;
                }
                if eval.merit_gradient_norm <= inner_tol {
                    break eval;
                }
                if iterations >= config.max_iters {
                    break 'outer SolveStatus::MaxIterationsExceeded;
                }

                self.assemble_kkt(ws, problem, &x, &penalty);
                if !Self::compute_step(ws) {
                    warn!("Merit Hessian could not be factorized at iteration {iterations}");
                    break 'outer SolveStatus::NumericalFailure;
                }
                let dphi0 = ws.merit_gradient.dot(&ws.step);
                if dphi0.is_nan() || dphi0 >= 0.0 {
                    warn!("Step is not a descent direction (slope {dphi0:e})");
                    break 'outer SolveStatus::NumericalFailure;
                }

                let step = linesearch::search(
                    &config,
                    |alpha| Self::merit(problem, &(&x + &ws.step * alpha), &penalty),
                    eval.merit,
                    dphi0,
                );
                x.axpy(step.alpha, &ws.step, 1.0);
                iterations += 1;

                let record = IterationRecord {
                    iteration: iterations,
                    primal_infeasibility: eval.primal,
                    dual_infeasibility: eval.dual,
                    step_size: step.alpha,
                    merit: step.value,
                    mu,
                };
                if config.verbose {
                    info!(
                        "[{:4}] merit {:.6e} prim {:.3e} dual {:.3e} alpha {:.3e} mu {:.1e}",
                        iterations, step.value, eval.primal, eval.dual, step.alpha, mu
                    );
                } else {
                    debug!(
                        "[{:4}] merit {:.6e} prim {:.3e} dual {:.3e} alpha {:.3e} mu {:.1e}",
                        iterations, step.value, eval.primal, eval.dual, step.alpha, mu
                    );
                }
                self.notify(&record);
            };

            if eval.primal <= prim_tol {
                lams.clone_from(&ws.projected_multipliers);
                prim_tol = (prim_tol * mu.powf(config.prim_beta)).max(config.tol);
                inner_tol = (inner_tol * mu.powf(config.dual_beta)).max(config.tol);
            } else {
                mu = (mu * config.mu_factor).max(mu_floor);
                prim_tol = (PRIM_TOL0 * mu.powf(config.prim_alpha)).max(config.tol);
                inner_tol = (INNER_TOL0 * mu.powf(config.dual_alpha)).max(config.tol);
            }
            x_prox.copy_from(&x);
            debug!("Outer iteration {outer}: mu {mu:.1e} prim_tol {prim_tol:.1e} inner_tol {inner_tol:.1e}");
        };

        let (value, primal, dual) = match last {
            Some(eval) => (eval.value, eval.primal, eval.dual),
            None => (f64::NAN, f64::NAN, f64::NAN),
        };

        match status {
            SolveStatus::Converged => info!(
                "Converged after {iterations} iterations: value {value:.6e}, prim {primal:.2e}, dual {dual:.2e}"
            ),
            _ => warn!(
                "Solver stopped with {status:?} after {iterations} iterations: prim {primal:.2e}, dual {dual:.2e}"
            ),
        }

        Ok(SolverResults {
            status,
            x_opt: x,
            lams_opt: lams,
            value,
            primal_infeasibility: primal,
            dual_infeasibility: dual,
            iterations,
            outer_iterations: outer,
            mu,
            rho,
        })
    }
}
