use std::sync::Arc;

use log::info;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::bounds::ControlBounds;
use super::cost::{TrackingResidual, TrackingWeights};
use super::defect::DynamicsDefect;
use super::horizon::Horizon;
use super::layout::{DecisionLayout, Trajectory};
use crate::autodiff::{Differentiated, Differentiation};
use crate::error::{Error, Result};
use crate::function::QuadraticResidualCost;
use crate::integrator;
use crate::manifold::PhaseSpace;
use crate::nlp::{ConstraintKind, NlpProblem};
use crate::traits::{Dynamics, Manifold};

/// Name of the continuity equality constraint.
pub const DYNAMICS_CONSTRAINT: &str = "dynamics";
/// Name of the control box inequality constraint.
pub const CONTROL_BOUNDS_CONSTRAINT: &str = "control_bounds";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    /// Requested horizon length in seconds.
    pub horizon: f64,
    pub dt: f64,
    pub u_bound: f64,
    pub weights: TrackingWeights,
    #[serde(default)]
    pub differentiation: Differentiation,
}

impl TranscriptionSettings {
    pub fn new(horizon: f64, dt: f64, u_bound: f64, weights: TrackingWeights) -> Self {
        Self {
            horizon,
            dt,
            u_bound,
            weights,
            differentiation: Differentiation::default(),
        }
    }
}

/// Fixed-horizon multiple-shooting transcription of a mechanical system.
///
/// Immutable once built. The phase space and model are shared handles and
/// are checked against each other at construction.
pub struct MultipleShootingProblem<D> {
    space: Arc<PhaseSpace>,
    model: Arc<D>,
    input: DMatrix<f64>,
    x_init: Vec<f64>,
    x_target: Vec<f64>,
    horizon: Horizon,
    layout: DecisionLayout,
    settings: TranscriptionSettings,
}

impl<D: Dynamics> MultipleShootingProblem<D> {
    pub fn new(
        space: Arc<PhaseSpace>,
        model: Arc<D>,
        input: DMatrix<f64>,
        x_init: Vec<f64>,
        x_target: Vec<f64>,
        settings: TranscriptionSettings,
    ) -> Result<Self> {
        let horizon = Horizon::from_duration(settings.horizon, settings.dt)?;

        if model.nq() != space.nq() {
            return Err(Error::DimensionMismatch {
                what: "model configuration",
                expected: space.nq(),
                actual: model.nq(),
            });
        }
        if model.nv() != space.nv() {
            return Err(Error::DimensionMismatch {
                what: "model velocity",
                expected: space.nv(),
                actual: model.nv(),
            });
        }
        if input.nrows() != model.nv() || input.ncols() == 0 {
            return Err(Error::InputMatrixShape {
                expected_rows: model.nv(),
                rows: input.nrows(),
                cols: input.ncols(),
            });
        }
        for (what, state) in [("initial state", &x_init), ("target state", &x_target)] {
            if state.len() != space.nx() {
                return Err(Error::DimensionMismatch {
                    what,
                    expected: space.nx(),
                    actual: state.len(),
                });
            }
        }
        settings.weights.validate(space.ndx())?;
        if !(settings.u_bound.is_finite() && settings.u_bound > 0.0) {
            return Err(Error::InvalidBound {
                bound: settings.u_bound,
            });
        }

        let layout = DecisionLayout::new(horizon.nsteps(), space.nx(), input.ncols());
        info!(
            "Transcribed horizon {:.4}s into {} steps of {:.4}s (realized {:.4}s), {} decision variables",
            settings.horizon,
            horizon.nsteps(),
            horizon.dt(),
            horizon.realized(),
            layout.len()
        );

        Ok(Self {
            space,
            model,
            input,
            x_init,
            x_target,
            horizon,
            layout,
            settings,
        })
    }

    pub fn space(&self) -> &Arc<PhaseSpace> {
        &self.space
    }

    pub fn model(&self) -> &Arc<D> {
        &self.model
    }

    pub fn input(&self) -> &DMatrix<f64> {
        &self.input
    }

    pub fn nu(&self) -> usize {
        self.input.ncols()
    }

    pub fn x_init(&self) -> &[f64] {
        &self.x_init
    }

    pub fn x_target(&self) -> &[f64] {
        &self.x_target
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn layout(&self) -> &DecisionLayout {
        &self.layout
    }

    pub fn settings(&self) -> &TranscriptionSettings {
        &self.settings
    }

    pub fn dynamics_defect(&self) -> DynamicsDefect<D> {
        DynamicsDefect::new(
            Arc::clone(&self.space),
            Arc::clone(&self.model),
            self.input.clone(),
            self.x_init.clone(),
            self.layout,
            self.horizon.dt(),
        )
    }

    pub fn tracking_residual(&self) -> TrackingResidual {
        TrackingResidual::new(Arc::clone(&self.space), self.x_target.clone(), self.layout)
    }

    pub fn control_bounds(&self) -> ControlBounds {
        ControlBounds::new(self.layout, self.settings.u_bound)
    }

    pub fn cost(&self) -> QuadraticResidualCost {
        let weights = self
            .settings
            .weights
            .residual_weights(&self.layout, self.horizon.dt());
        QuadraticResidualCost::new(
            Box::new(Differentiated::new(
                self.tracking_residual(),
                self.settings.differentiation,
            )),
            weights,
        )
    }

    /// Hands the transcription to the NLP layer: the tracking cost, then the
    /// dynamics equality and the control-bound inequality, in that order.
    pub fn nlp_problem(&self) -> Result<NlpProblem>
    where
        D: 'static,
    {
        let strategy = self.settings.differentiation;
        let mut problem = NlpProblem::new(Box::new(self.cost()));
        problem.add_constraint(
            DYNAMICS_CONSTRAINT,
            ConstraintKind::Equality,
            Box::new(Differentiated::new(self.dynamics_defect(), strategy)),
        )?;
        problem.add_constraint(
            CONTROL_BOUNDS_CONSTRAINT,
            ConstraintKind::Inequality,
            Box::new(Differentiated::new(self.control_bounds(), strategy)),
        )?;
        Ok(problem)
    }

    /// Every state at the neutral point, every control zero.
    pub fn neutral_guess(&self) -> DVector<f64> {
        let neutral = self.space.neutral();
        let mut z = DVector::zeros(self.layout.len());
        for t in 0..self.layout.num_states() {
            z.as_mut_slice()[self.layout.state_range(t)].copy_from_slice(&neutral);
        }
        z
    }

    /// `state` repeated at every knot, zero controls.
    pub fn guess_from_state(&self, state: &[f64]) -> Result<DVector<f64>> {
        if state.len() != self.space.nx() {
            return Err(Error::DimensionMismatch {
                what: "guess state",
                expected: self.space.nx(),
                actual: state.len(),
            });
        }
        let mut z = DVector::zeros(self.layout.len());
        for t in 0..self.layout.num_states() {
            z.as_mut_slice()[self.layout.state_range(t)].copy_from_slice(state);
        }
        Ok(z)
    }

    /// Simulates `controls` from `x_init` with the transcription's integrator.
    pub fn rollout(&self, controls: &[Vec<f64>]) -> Result<Trajectory> {
        if controls.len() != self.layout.nsteps || controls.iter().any(|u| u.len() != self.nu()) {
            return Err(Error::TrajectoryShape {
                expected_states: self.layout.num_states(),
                expected_controls: self.layout.nsteps,
                states: controls.len() + 1,
                controls: controls.len(),
            });
        }
        let states = integrator::rollout(
            &self.space,
            self.model.as_ref(),
            &self.input,
            &self.x_init,
            controls,
            self.horizon.dt(),
        );
        Ok(Trajectory {
            states,
            controls: controls.to_vec(),
            dt: self.horizon.dt(),
        })
    }

    pub fn decode(&self, z: &DVector<f64>) -> Result<Trajectory> {
        self.layout.decode(z, self.horizon.dt())
    }

    pub fn encode(&self, trajectory: &Trajectory) -> Result<DVector<f64>> {
        self.layout.encode(trajectory)
    }

    /// Euclidean norm of `x_N ⊖ x_target`.
    pub fn terminal_deviation(&self, z: &DVector<f64>) -> Result<f64> {
        self.layout.check(z)?;
        let mut dx = vec![0.0; self.space.ndx()];
        let x_final = self.layout.state(z.as_slice(), self.layout.nsteps);
        self.space.difference(&self.x_target, x_final, &mut dx);
        Ok(dx.iter().map(|v| v * v).sum::<f64>().sqrt())
    }
}
