use std::sync::Arc;

use nalgebra::DMatrix;

use super::layout::DecisionLayout;
use crate::autodiff::ResidualFunction;
use crate::integrator::SemiImplicitEuler;
use crate::manifold::PhaseSpace;
use crate::traits::{Dynamics, Manifold, Scalar};

/// Multiple-shooting continuity residual.
///
/// Block 0 is `x_0 ⊖ x_init`; block `t + 1` is `x_{t+1} ⊖ step(x_t, u_t)`.
/// The residual vanishes exactly on trajectories of the discrete dynamics
/// that start at `x_init`.
pub struct DynamicsDefect<D> {
    space: Arc<PhaseSpace>,
    model: Arc<D>,
    input: DMatrix<f64>,
    x_init: Vec<f64>,
    layout: DecisionLayout,
    dt: f64,
}

impl<D: Dynamics> DynamicsDefect<D> {
    pub fn new(
        space: Arc<PhaseSpace>,
        model: Arc<D>,
        input: DMatrix<f64>,
        x_init: Vec<f64>,
        layout: DecisionLayout,
        dt: f64,
    ) -> Self {
        Self {
            space,
            model,
            input,
            x_init,
            layout,
            dt,
        }
    }
}

impl<D: Dynamics> ResidualFunction for DynamicsDefect<D> {
    fn nx(&self) -> usize {
        self.layout.len()
    }

    fn nr(&self) -> usize {
        self.layout.num_states() * self.space.ndx()
    }

    fn evaluate<T: Scalar>(&self, z: &[T], out: &mut [T]) {
        let ndx = self.space.ndx();
        let x_init: Vec<T> = self.x_init.iter().map(|&v| T::constant(v)).collect();
        self.space
            .difference(&x_init, self.layout.state(z, 0), &mut out[..ndx]);

        let dt = T::constant(self.dt);
        let mut stepper = SemiImplicitEuler::new(self.space.nv());
        let mut predicted = vec![T::zero(); self.space.nx()];
        for t in 0..self.layout.nsteps {
            stepper.step(
                &self.space,
                self.model.as_ref(),
                &self.input,
                self.layout.state(z, t),
                self.layout.control(z, t),
                dt,
                &mut predicted,
            );
            let block = (t + 1) * ndx..(t + 2) * ndx;
            self.space
                .difference(&predicted, self.layout.state(z, t + 1), &mut out[block]);
        }
    }
}
