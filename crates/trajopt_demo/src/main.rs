//! # Double Pendulum Swing
//!
//! Starts an underactuated double pendulum with its first link inverted and
//! optimizes a 1.2 s trajectory that brings it back to rest, with a bounded
//! torque on the second joint only.
//!
//! ```sh
//! RUST_LOG=info cargo run -p trajopt_demo
//! ```

use std::f64::consts::PI;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use nalgebra::DMatrix;
use serde::Serialize;
use trajopt_core::manifold::PhaseSpace;
use trajopt_core::models::DoublePendulum;
use trajopt_core::nlp::{LinesearchStrategy, SolveStatus, SolverConfig};
use trajopt_core::traits::Manifold;
use trajopt_core::transcription::{
    MultipleShootingProblem, TrackingWeights, TranscriptionSettings,
};
use trajopt_core::SolveDriver;

const HORIZON: f64 = 1.2;
const DT: f64 = 1.0 / 30.0;
const U_BOUND: f64 = 0.25;
const W_STATE: f64 = 1e-3;
const W_CONTROL: f64 = 1e-2;
const W_TERMINAL_POSITION: f64 = 2.0;
const W_TERMINAL_VELOCITY: f64 = 1e-3;

#[derive(Debug, Serialize)]
struct Report {
    status: SolveStatus,
    iterations: usize,
    nsteps: usize,
    realized_horizon: f64,
    value: f64,
    primal_infeasibility: f64,
    dual_infeasibility: f64,
    terminal_deviation: f64,
    max_abs_control: f64,
    final_state: Vec<f64>,
    controls: Vec<f64>,
}

fn build_problem() -> Result<MultipleShootingProblem<DoublePendulum>> {
    let model = DoublePendulum::default();
    let space: Arc<PhaseSpace> = Arc::new(model.phase_space());
    let weights = TrackingWeights::position_heavy(
        &space,
        W_STATE,
        W_CONTROL,
        W_TERMINAL_POSITION,
        W_TERMINAL_VELOCITY,
    );
    let x_init = space.state(&[PI, 0.0], &[0.0, 0.0]);
    let x_target = space.neutral();
    let input = DMatrix::from_column_slice(2, 1, &[0.0, 1.0]);

    MultipleShootingProblem::new(
        Arc::clone(&space),
        Arc::new(model),
        input,
        x_init,
        x_target,
        TranscriptionSettings::new(HORIZON, DT, U_BOUND, weights),
    )
    .context("Failed to transcribe the double pendulum problem")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let problem = build_problem()?;
    let config = SolverConfig {
        tol: 1e-5,
        mu_init: 0.1,
        rho_init: 1e-7,
        max_iters: 1500,
        use_gauss_newton: true,
        linesearch: LinesearchStrategy::Armijo,
        verbose: true,
        ..SolverConfig::default()
    };

    let guess = problem
        .guess_from_state(problem.x_init())
        .context("Failed to build the initial guess")?;
    let mut driver = SolveDriver::new(config);
    let outcome = driver
        .solve(&problem, &guess)
        .context("Solver rejected the transcribed problem")?;

    if outcome.status != SolveStatus::Converged {
        warn!("Reporting a non-converged trajectory ({:?})", outcome.status);
    }

    let controls: Vec<f64> = outcome.trajectory.controls.iter().flatten().copied().collect();
    let report = Report {
        status: outcome.status,
        iterations: outcome.iterations,
        nsteps: problem.horizon().nsteps(),
        realized_horizon: problem.horizon().realized(),
        value: outcome.value,
        primal_infeasibility: outcome.primal_infeasibility,
        dual_infeasibility: outcome.dual_infeasibility,
        terminal_deviation: outcome.terminal_deviation,
        max_abs_control: controls.iter().fold(0.0, |acc: f64, u| acc.max(u.abs())),
        final_state: outcome.trajectory.final_state().map(<[f64]>::to_vec).unwrap_or_default(),
        controls,
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => warn!("Failed to serialize the report: {err}"),
    }
    info!(
        "Done: {:?} in {} iterations",
        report.status, report.iterations
    );
    Ok(())
}
