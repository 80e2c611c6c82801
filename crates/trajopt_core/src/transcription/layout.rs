use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// State and control sequences of a discretized trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub states: Vec<Vec<f64>>,
    pub controls: Vec<Vec<f64>>,
    pub dt: f64,
}

impl Trajectory {
    pub fn nsteps(&self) -> usize {
        self.controls.len()
    }

    pub fn final_state(&self) -> Option<&[f64]> {
        self.states.last().map(Vec::as_slice)
    }
}

/// Placement of states and controls in the flat decision vector:
/// `[x_0, ..., x_N, u_0, ..., u_{N-1}]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionLayout {
    pub nsteps: usize,
    pub nx: usize,
    pub nu: usize,
}

impl DecisionLayout {
    pub fn new(nsteps: usize, nx: usize, nu: usize) -> Self {
        Self { nsteps, nx, nu }
    }

    pub fn num_states(&self) -> usize {
        self.nsteps + 1
    }

    /// Offset of the first control block.
    pub fn control_offset(&self) -> usize {
        self.num_states() * self.nx
    }

    pub fn len(&self) -> usize {
        self.control_offset() + self.nsteps * self.nu
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state_range(&self, t: usize) -> std::ops::Range<usize> {
        t * self.nx..(t + 1) * self.nx
    }

    pub fn control_range(&self, t: usize) -> std::ops::Range<usize> {
        let start = self.control_offset() + t * self.nu;
        start..start + self.nu
    }

    pub fn state<'a, T>(&self, z: &'a [T], t: usize) -> &'a [T] {
        &z[self.state_range(t)]
    }

    pub fn control<'a, T>(&self, z: &'a [T], t: usize) -> &'a [T] {
        &z[self.control_range(t)]
    }

    pub fn check(&self, z: &DVector<f64>) -> Result<()> {
        if z.len() != self.len() {
            return Err(Error::DecisionLength {
                expected: self.len(),
                actual: z.len(),
            });
        }
        Ok(())
    }

    /// Flattens a trajectory. Every block must have the layout's size.
    pub fn encode(&self, trajectory: &Trajectory) -> Result<DVector<f64>> {
        let shape_ok = trajectory.states.len() == self.num_states()
            && trajectory.controls.len() == self.nsteps
            && trajectory.states.iter().all(|x| x.len() == self.nx)
            && trajectory.controls.iter().all(|u| u.len() == self.nu);
        if !shape_ok {
            return Err(Error::TrajectoryShape {
                expected_states: self.num_states(),
                expected_controls: self.nsteps,
                states: trajectory.states.len(),
                controls: trajectory.controls.len(),
            });
        }

        let mut z = DVector::zeros(self.len());
        for (t, x) in trajectory.states.iter().enumerate() {
            z.as_mut_slice()[self.state_range(t)].copy_from_slice(x);
        }
        for (t, u) in trajectory.controls.iter().enumerate() {
            z.as_mut_slice()[self.control_range(t)].copy_from_slice(u);
        }
        Ok(z)
    }

    /// Splits a decision vector back into state and control blocks.
    pub fn decode(&self, z: &DVector<f64>, dt: f64) -> Result<Trajectory> {
        self.check(z)?;
        let (states, controls) = z.as_slice().split_at(self.control_offset());
        Ok(Trajectory {
            states: states.chunks(self.nx.max(1)).map(<[f64]>::to_vec).collect(),
            controls: controls.chunks(self.nu.max(1)).map(<[f64]>::to_vec).collect(),
            dt,
        })
    }
}
