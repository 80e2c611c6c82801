use crate::manifold::PhaseSpace;
use crate::traits::{Dynamics, Manifold, Scalar};
use nalgebra::DMatrix;

/// Semi-implicit (symplectic) Euler step on a phase space.
///
/// `v⁺ = v + dt a(q, v, B u)` then `q⁺ = q ⊕ dt v⁺`.
pub struct SemiImplicitEuler<T: Scalar> {
    tau: Vec<T>,
    acc: Vec<T>,
    dv: Vec<T>,
}

impl<T: Scalar> SemiImplicitEuler<T> {
    pub fn new(nv: usize) -> Self {
        let z = T::zero();
        Self {
            tau: vec![z; nv],
            acc: vec![z; nv],
            dv: vec![z; 2 * nv],
        }
    }

    /// Writes the successor of state `x` under control `u` into `out`.
    #[allow(clippy::too_many_arguments)]
    pub fn step<D: Dynamics>(
        &mut self,
        space: &PhaseSpace,
        model: &D,
        input: &DMatrix<f64>,
        x: &[T],
        u: &[T],
        dt: T,
        out: &mut [T],
    ) {
        let nv = space.nv();
        let (q, v) = space.split(x);

        // tau = B u
        for (i, tau_i) in self.tau.iter_mut().enumerate() {
            let mut acc = T::zero();
            for (j, &u_j) in u.iter().enumerate() {
                acc = acc + T::constant(input[(i, j)]) * u_j;
            }
            *tau_i = acc;
        }

        model.acceleration(q, v, &self.tau, &mut self.acc);

        // Tangent increment (dt v⁺, dt a) taking x to its successor.
        for i in 0..nv {
            let v_next = v[i] + dt * self.acc[i];
            self.dv[i] = dt * v_next;
            self.dv[nv + i] = dt * self.acc[i];
        }
        space.integrate(x, &self.dv, out);
    }
}

/// Forward simulation of a control sequence from `x0` with the semi-implicit
/// Euler step. Returns `controls.len() + 1` states.
pub fn rollout<D: Dynamics>(
    space: &PhaseSpace,
    model: &D,
    input: &DMatrix<f64>,
    x0: &[f64],
    controls: &[Vec<f64>],
    dt: f64,
) -> Vec<Vec<f64>> {
    let mut stepper = SemiImplicitEuler::<f64>::new(space.nv());
    let mut states = Vec::with_capacity(controls.len() + 1);
    states.push(x0.to_vec());
    for u in controls {
        let mut next = vec![0.0; space.nx()];
        if let Some(x) = states.last() {
            stepper.step(space, model, input, x, u, dt, &mut next);
        }
        states.push(next);
    }
    states
}
