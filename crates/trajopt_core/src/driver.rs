//! Runs a transcribed problem through an NLP backend and decodes the outcome.

use log::{info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::nlp::{
    DiagnosticsHistory, HistoryCallback, IterationObserver, NlpSolver, ProxAlSolver, SolveStatus,
    SolverConfig, Workspace,
};
use crate::traits::Dynamics;
use crate::transcription::{MultipleShootingProblem, Trajectory};

/// Everything a caller needs after a solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Optimization {
    pub status: SolveStatus,
    pub iterations: usize,
    pub trajectory: Trajectory,
    /// Final decision vector, laid out as the problem's [`DecisionLayout`](crate::transcription::DecisionLayout).
    pub decision: Vec<f64>,
    /// One multiplier vector per constraint, in registration order.
    pub multipliers: Vec<Vec<f64>>,
    pub value: f64,
    pub primal_infeasibility: f64,
    pub dual_infeasibility: f64,
    pub terminal_deviation: f64,
    pub history: DiagnosticsHistory,
}

impl Optimization {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Owns a solver backend and drives one solve per call.
pub struct SolveDriver<S = ProxAlSolver> {
    solver: S,
}

impl SolveDriver<ProxAlSolver> {
    pub fn new(config: SolverConfig) -> Self {
        Self::with_solver(ProxAlSolver::new(config))
    }
}

impl<S: NlpSolver> SolveDriver<S> {
    pub fn with_solver(solver: S) -> Self {
        Self { solver }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Solves from `guess` with zero multipliers.
    pub fn solve<D: Dynamics + 'static>(
        &mut self,
        problem: &MultipleShootingProblem<D>,
        guess: &DVector<f64>,
    ) -> Result<Optimization> {
        self.solve_with(problem, guess, None, Vec::new())
    }

    /// Solves with optional multiplier guesses (one vector per constraint,
    /// dynamics first) and extra observers attached for this run only.
    pub fn solve_with<D: Dynamics + 'static>(
        &mut self,
        problem: &MultipleShootingProblem<D>,
        guess: &DVector<f64>,
        multipliers: Option<Vec<DVector<f64>>>,
        observers: Vec<Box<dyn IterationObserver>>,
    ) -> Result<Optimization> {
        let nlp = problem.nlp_problem()?;
        problem.layout().check(guess)?;
        let lams0 = match multipliers {
            Some(lams) => {
                nlp.check_multipliers(&lams)?;
                lams
            }
            None => nlp.zero_multipliers(),
        };

        let callback = HistoryCallback::new();
        let history = callback.history();
        self.solver.clear_observers();
        self.solver.register_observer(Box::new(callback));
        for observer in observers {
            self.solver.register_observer(observer);
        }

        let mut workspace = Workspace::new(&nlp);
        let outcome = self.solver.solve(&mut workspace, &nlp, guess, &lams0);
        self.solver.clear_observers();
        let results = outcome?;

        let trajectory = problem.decode(&results.x_opt)?;
        let terminal_deviation = problem.terminal_deviation(&results.x_opt)?;
        match results.status {
            SolveStatus::Converged => info!(
                "Trajectory optimized in {} iterations, terminal deviation {:.3e}",
                results.iterations, terminal_deviation
            ),
            status => warn!(
                "Trajectory solve ended with {:?}; returning last iterate (terminal deviation {:.3e})",
                status, terminal_deviation
            ),
        }

        let history = history.borrow().clone();
        Ok(Optimization {
            status: results.status,
            iterations: results.iterations,
            trajectory,
            decision: results.x_opt.as_slice().to_vec(),
            multipliers: results
                .lams_opt
                .iter()
                .map(|lam| lam.as_slice().to_vec())
                .collect(),
            value: results.value,
            primal_infeasibility: results.primal_infeasibility,
            dual_infeasibility: results.dual_infeasibility,
            terminal_deviation,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{DoublePendulum, PointMass};
    use crate::nlp::{IterationRecord, LinesearchStrategy};
    use crate::traits::Manifold;
    use crate::transcription::{TrackingWeights, TranscriptionSettings};
    use nalgebra::DMatrix;
    use std::cell::Cell;
    use std::f64::consts::PI;
    use std::rc::Rc;
    use std::sync::Arc;

    fn point_mass_problem(x_init: Vec<f64>) -> MultipleShootingProblem<PointMass> {
        let model = PointMass::new(1.0, 1);
        let space = Arc::new(model.phase_space());
        let weights = TrackingWeights::position_heavy(&space, 1e-2, 1e-1, 10.0, 1.0);
        MultipleShootingProblem::new(
            space,
            Arc::new(model),
            DMatrix::identity(1, 1),
            x_init,
            vec![0.0, 0.0],
            TranscriptionSettings::new(1.0, 0.1, 10.0, weights),
        )
        .expect("point mass problem should build")
    }

    fn pendulum_problem(angles: [f64; 2], horizon: f64, dt: f64) -> MultipleShootingProblem<DoublePendulum> {
        let model = DoublePendulum::default();
        let space = Arc::new(model.phase_space());
        let weights = TrackingWeights::position_heavy(&space, 1e-3, 1e-2, 2.0, 1e-3);
        let x_init = space.state(&angles, &[0.0, 0.0]);
        let x_target = space.neutral();
        MultipleShootingProblem::new(
            space,
            Arc::new(model),
            DMatrix::from_column_slice(2, 1, &[0.0, 1.0]),
            x_init,
            x_target,
            TranscriptionSettings::new(horizon, dt, 0.25, weights),
        )
        .expect("pendulum problem should build")
    }

    fn gauss_newton(tol: f64, max_iters: usize) -> SolverConfig {
        SolverConfig {
            tol,
            max_iters,
            use_gauss_newton: true,
            ..SolverConfig::default()
        }
    }

    #[test]
    fn resting_pendulum_converges_immediately() {
        let problem = pendulum_problem([0.0, 0.0], 1.2, 1.0 / 30.0);
        let config = gauss_newton(1e-6, 10);
        let mut driver = SolveDriver::new(config);
        let outcome = driver
            .solve(&problem, &problem.neutral_guess())
            .expect("inputs should be well formed");

        assert!(outcome.converged());
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.history.is_empty());
        assert_eq!(outcome.decision.len(), 37 * 4 + 36);
        assert_eq!(outcome.trajectory.states.len(), 37);
        assert_eq!(outcome.trajectory.controls.len(), 36);
        assert!(outcome.terminal_deviation <= config.tol);
    }

    #[test]
    fn point_mass_reaches_dynamically_consistent_optimum() {
        let problem = point_mass_problem(vec![1.0, 0.0]);
        let mut driver = SolveDriver::new(gauss_newton(1e-6, 100));
        let outcome = driver
            .solve(&problem, &problem.neutral_guess())
            .expect("inputs should be well formed");

        assert_eq!(outcome.status, SolveStatus::Converged);
        assert!(outcome.primal_infeasibility <= 1e-6);
        assert_eq!(outcome.history.len(), outcome.iterations);
        assert_eq!(outcome.multipliers.len(), 2);

        // The optimal controls replayed through the integrator give the optimal states.
        let replay = problem
            .rollout(&outcome.trajectory.controls)
            .expect("control count should match");
        for (a, b) in replay.states.iter().flatten().zip(outcome.trajectory.states.iter().flatten()) {
            assert!((a - b).abs() < 1e-4, "replayed {a} vs optimized {b}");
        }
        // Moving toward the target is cheaper than staying put.
        assert!(outcome.terminal_deviation < 1.0);
        assert!(outcome.trajectory.controls[0][0] < 0.0);
    }

    #[test]
    fn small_swing_converges_near_rest() {
        let problem = pendulum_problem([0.05, 0.0], 0.5, 0.05);
        let mut driver = SolveDriver::new(gauss_newton(1e-6, 300));
        let guess = problem
            .guess_from_state(problem.x_init())
            .expect("state length should match");
        let outcome = driver.solve(&problem, &guess).expect("inputs should be well formed");

        assert!(outcome.converged(), "status {:?}", outcome.status);
        let replay = problem
            .rollout(&outcome.trajectory.controls)
            .expect("control count should match");
        for (a, b) in replay.states.iter().flatten().zip(outcome.trajectory.states.iter().flatten()) {
            assert!((a - b).abs() < 1e-4, "replayed {a} vs optimized {b}");
        }
        let controls_ok = outcome
            .trajectory
            .controls
            .iter()
            .flatten()
            .all(|u| u.abs() <= 0.25 + 1e-6);
        assert!(controls_ok);
    }

    #[test]
    fn inverted_swing_converges_with_bounded_torque() {
        let problem = pendulum_problem([PI, 0.0], 1.2, 1.0 / 30.0);
        assert_eq!(problem.horizon().nsteps(), 36);
        let config = SolverConfig {
            tol: 1e-5,
            mu_init: 0.1,
            rho_init: 1e-7,
            max_iters: 1500,
            use_gauss_newton: true,
            linesearch: LinesearchStrategy::Armijo,
            ..SolverConfig::default()
        };
        let guess = problem
            .guess_from_state(problem.x_init())
            .expect("state length should match");
        let outcome = SolveDriver::new(config)
            .solve(&problem, &guess)
            .expect("inputs should be well formed");

        assert!(outcome.converged(), "status {:?} after {} iterations", outcome.status, outcome.iterations);
        assert!(outcome.primal_infeasibility <= config.tol);
        assert!(outcome.dual_infeasibility <= config.tol);
        assert_eq!(outcome.history.len(), outcome.iterations);

        let max_control = outcome
            .trajectory
            .controls
            .iter()
            .flatten()
            .fold(0.0_f64, |acc, u| acc.max(u.abs()));
        assert!(max_control <= 0.25 + config.tol, "max |u| = {max_control}");

        // Per-step defects below tol grow along the unstable upright motion.
        let replay = problem
            .rollout(&outcome.trajectory.controls)
            .expect("control count should match");
        assert_eq!(replay.states.len(), outcome.trajectory.states.len());
        for (a, b) in replay.states.iter().flatten().zip(outcome.trajectory.states.iter().flatten()) {
            assert!((a - b).abs() < 1e-1, "replayed {a} vs optimized {b}");
        }
    }

    #[test]
    fn single_iteration_budget_is_reported() {
        let problem = point_mass_problem(vec![5.0, 0.0]);
        let mut driver = SolveDriver::new(gauss_newton(1e-8, 1));
        let outcome = driver
            .solve(&problem, &problem.neutral_guess())
            .expect("inputs should be well formed");
        assert_eq!(outcome.status, SolveStatus::MaxIterationsExceeded);
        assert_eq!(outcome.decision.len(), problem.layout().len());
        assert_eq!(outcome.trajectory.states.len(), problem.layout().num_states());
    }

    #[test]
    fn extra_observers_see_each_iteration() {
        let problem = point_mass_problem(vec![1.0, 0.0]);
        let mut driver = SolveDriver::new(gauss_newton(1e-6, 100));
        let count = Rc::new(Cell::new(0usize));
        let seen = Rc::clone(&count);
        let observer: Box<dyn IterationObserver> =
            Box::new(move |_: &IterationRecord| seen.set(seen.get() + 1));

        let outcome = driver
            .solve_with(&problem, &problem.neutral_guess(), None, vec![observer])
            .expect("inputs should be well formed");
        assert_eq!(count.get(), outcome.iterations);

        // Observers from a previous run are not carried over.
        let again = driver
            .solve(&problem, &problem.neutral_guess())
            .expect("inputs should be well formed");
        assert_eq!(count.get(), outcome.iterations);
        assert_eq!(again.history.len(), again.iterations);
    }

    #[test]
    fn warm_start_with_optimal_multipliers() {
        let problem = point_mass_problem(vec![1.0, 0.0]);
        let mut driver = SolveDriver::new(gauss_newton(1e-6, 100));
        let cold = driver
            .solve(&problem, &problem.neutral_guess())
            .expect("inputs should be well formed");
        assert!(cold.converged());

        let z = DVector::from_vec(cold.decision.clone());
        let lams = cold
            .multipliers
            .iter()
            .map(|lam| DVector::from_vec(lam.clone()))
            .collect();
        let warm = driver
            .solve_with(&problem, &z, Some(lams), Vec::new())
            .expect("inputs should be well formed");
        assert!(warm.converged());
        for (a, b) in warm.decision.iter().zip(&cold.decision) {
            assert!((a - b).abs() < 1e-2);
        }
    }

    #[test]
    fn malformed_guesses_are_rejected() {
        let problem = point_mass_problem(vec![1.0, 0.0]);
        let mut driver = SolveDriver::new(SolverConfig::default());
        let len = problem.layout().len();

        assert_eq!(
            driver.solve(&problem, &DVector::zeros(len - 1)).err(),
            Some(Error::DecisionLength {
                expected: len,
                actual: len - 1
            })
        );

        let lams = vec![DVector::zeros(problem.layout().num_states() * 2), DVector::zeros(3)];
        assert!(matches!(
            driver.solve_with(&problem, &DVector::zeros(len), Some(lams), Vec::new()),
            Err(Error::MultiplierShape { index: 1, .. })
        ));

        let bad_config = SolverConfig {
            max_iters: 0,
            ..SolverConfig::default()
        };
        assert!(matches!(
            SolveDriver::new(bad_config).solve(&problem, &DVector::zeros(len)),
            Err(Error::InvalidConfig { .. })
        ));
    }
}
