use std::sync::Arc;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::layout::DecisionLayout;
use crate::autodiff::ResidualFunction;
use crate::error::{Error, Result};
use crate::manifold::PhaseSpace;
use crate::traits::{Manifold, Scalar};

/// Weights of the tracking cost
/// `½ w_x dt Σ|x_t|² + ½ w_u dt Σ|u_t|² + ½ (x_N ⊖ x*)ᵀ diag(w_term) (x_N ⊖ x*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingWeights {
    pub state: f64,
    pub control: f64,
    /// One entry per tangent coordinate of the phase space.
    pub terminal: Vec<f64>,
}

impl TrackingWeights {
    /// Terminal weight `position` on the `nv` configuration directions and
    /// `velocity` on the remaining ones.
    pub fn position_heavy(
        space: &PhaseSpace,
        state: f64,
        control: f64,
        position: f64,
        velocity: f64,
    ) -> Self {
        let nv = space.nv();
        let terminal = (0..space.ndx())
            .map(|i| if i < nv { position } else { velocity })
            .collect();
        Self {
            state,
            control,
            terminal,
        }
    }

    pub fn validate(&self, ndx: usize) -> Result<()> {
        let ok = |w: f64| w.is_finite() && w >= 0.0;
        if !ok(self.state) || !ok(self.control) || !self.terminal.iter().all(|&w| ok(w)) {
            return Err(Error::InvalidWeights {
                reason: "weights must be finite and non-negative",
            });
        }
        if self.terminal.len() != ndx {
            return Err(Error::InvalidWeights {
                reason: "terminal weight length must equal the tangent dimension",
            });
        }
        Ok(())
    }

    /// Per-entry weights matching [`TrackingResidual`]'s output.
    pub fn residual_weights(&self, layout: &DecisionLayout, dt: f64) -> DVector<f64> {
        let running_states = layout.control_offset();
        let running_controls = layout.len() - running_states;
        let weights: Vec<f64> = std::iter::repeat(self.state * dt)
            .take(running_states)
            .chain(std::iter::repeat(self.control * dt).take(running_controls))
            .chain(self.terminal.iter().copied())
            .collect();
        DVector::from_vec(weights)
    }
}

/// Stacked residual `[z; x_N ⊖ x_target]`; its weighted square is the tracking cost.
pub struct TrackingResidual {
    space: Arc<PhaseSpace>,
    x_target: Vec<f64>,
    layout: DecisionLayout,
}

impl TrackingResidual {
    pub fn new(space: Arc<PhaseSpace>, x_target: Vec<f64>, layout: DecisionLayout) -> Self {
        Self {
            space,
            x_target,
            layout,
        }
    }
}

impl ResidualFunction for TrackingResidual {
    fn nx(&self) -> usize {
        self.layout.len()
    }

    fn nr(&self) -> usize {
        self.layout.len() + self.space.ndx()
    }

    fn evaluate<T: Scalar>(&self, z: &[T], out: &mut [T]) {
        let n = self.layout.len();
        out[..n].copy_from_slice(z);
        let target: Vec<T> = self.x_target.iter().map(|&v| T::constant(v)).collect();
        let x_final = self.layout.state(z, self.layout.nsteps);
        self.space.difference(&target, x_final, &mut out[n..]);
    }
}
