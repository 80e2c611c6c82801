//! Configuration and phase spaces of mechanical systems.
//!
//! Joints are either Euclidean (one coordinate) or continuous planar rotations
//! stored as `(cos θ, sin θ)`, in which case the point representation is larger
//! than the tangent space.

use crate::traits::{Manifold, Scalar};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Joint {
    /// A single unconstrained coordinate.
    Euclidean,
    /// A rotation without joint limits, represented by its cosine and sine.
    Continuous,
}

impl Joint {
    pub fn nq(self) -> usize {
        match self {
            Joint::Euclidean => 1,
            Joint::Continuous => 2,
        }
    }

    pub fn nv(self) -> usize {
        1
    }
}

/// Product of one-dimensional joints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSpace {
    joints: Vec<Joint>,
}

impl ConfigurationSpace {
    pub fn new(joints: Vec<Joint>) -> Self {
        Self { joints }
    }

    pub fn euclidean(dim: usize) -> Self {
        Self::new(vec![Joint::Euclidean; dim])
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Builds a configuration from joint angles/coordinates.
    pub fn from_coordinates(&self, coords: &[f64]) -> Vec<f64> {
        let mut q = Vec::with_capacity(self.nx());
        for (joint, &c) in self.joints.iter().zip(coords) {
            match joint {
                Joint::Euclidean => q.push(c),
                Joint::Continuous => {
                    q.push(c.cos());
                    q.push(c.sin());
                }
            }
        }
        q
    }
}

impl Manifold for ConfigurationSpace {
    fn nx(&self) -> usize {
        self.joints.iter().map(|j| j.nq()).sum()
    }

    fn ndx(&self) -> usize {
        self.joints.len()
    }

    fn neutral(&self) -> Vec<f64> {
        self.from_coordinates(&vec![0.0; self.joints.len()])
    }

    fn integrate<T: Scalar>(&self, x: &[T], v: &[T], out: &mut [T]) {
        let mut iq = 0;
        for (iv, joint) in self.joints.iter().enumerate() {
            match joint {
                Joint::Euclidean => out[iq] = x[iq] + v[iv],
                Joint::Continuous => {
                    let (c, s) = (x[iq], x[iq + 1]);
                    let (dc, ds) = (v[iv].cos(), v[iv].sin());
                    out[iq] = c * dc - s * ds;
                    out[iq + 1] = s * dc + c * ds;
                }
            }
            iq += joint.nq();
        }
    }

    fn difference<T: Scalar>(&self, x0: &[T], x1: &[T], out: &mut [T]) {
        let mut iq = 0;
        for (iv, joint) in self.joints.iter().enumerate() {
            match joint {
                Joint::Euclidean => out[iv] = x1[iq] - x0[iq],
                Joint::Continuous => {
                    let (c0, s0) = (x0[iq], x0[iq + 1]);
                    let (c1, s1) = (x1[iq], x1[iq + 1]);
                    out[iv] = (c0 * s1 - s0 * c1).atan2(c0 * c1 + s0 * s1);
                }
            }
            iq += joint.nq();
        }
    }
}

/// Tangent bundle `(q, v)` of a configuration space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpace {
    configuration: ConfigurationSpace,
}

impl PhaseSpace {
    pub fn new(configuration: ConfigurationSpace) -> Self {
        Self { configuration }
    }

    pub fn euclidean(dof: usize) -> Self {
        Self::new(ConfigurationSpace::euclidean(dof))
    }

    pub fn configuration(&self) -> &ConfigurationSpace {
        &self.configuration
    }

    pub fn nq(&self) -> usize {
        self.configuration.nx()
    }

    pub fn nv(&self) -> usize {
        self.configuration.ndx()
    }

    /// Splits a state into configuration and velocity.
    pub fn split<'a, T>(&self, x: &'a [T]) -> (&'a [T], &'a [T]) {
        x.split_at(self.nq())
    }

    /// Builds a state from joint coordinates and velocities.
    pub fn state(&self, coords: &[f64], velocity: &[f64]) -> Vec<f64> {
        let mut x = self.configuration.from_coordinates(coords);
        x.extend_from_slice(velocity);
        x
    }
}

impl Manifold for PhaseSpace {
    fn nx(&self) -> usize {
        self.nq() + self.nv()
    }

    fn ndx(&self) -> usize {
        2 * self.nv()
    }

    fn neutral(&self) -> Vec<f64> {
        let mut x = self.configuration.neutral();
        x.extend(std::iter::repeat(0.0).take(self.nv()));
        x
    }

    fn integrate<T: Scalar>(&self, x: &[T], v: &[T], out: &mut [T]) {
        let (nq, nv) = (self.nq(), self.nv());
        self.configuration
            .integrate(&x[..nq], &v[..nv], &mut out[..nq]);
        for i in 0..nv {
            out[nq + i] = x[nq + i] + v[nv + i];
        }
    }

    fn difference<T: Scalar>(&self, x0: &[T], x1: &[T], out: &mut [T]) {
        let (nq, nv) = (self.nq(), self.nv());
        self.configuration
            .difference(&x0[..nq], &x1[..nq], &mut out[..nv]);
        for i in 0..nv {
            out[nv + i] = x1[nq + i] - x0[nq + i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn mixed_space() -> PhaseSpace {
        PhaseSpace::new(ConfigurationSpace::new(vec![
            Joint::Continuous,
            Joint::Euclidean,
        ]))
    }

    #[test]
    fn dimensions_follow_joint_kinds() {
        let space = mixed_space();
        assert_eq!(space.nq(), 3);
        assert_eq!(space.nv(), 2);
        assert_eq!(space.nx(), 5);
        assert_eq!(space.ndx(), 4);
        assert_eq!(space.neutral(), vec![1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn difference_inverts_integrate() {
        let space = mixed_space();
        let x0 = space.state(&[2.5, -0.3], &[0.1, 0.2]);
        let v = [0.4, -1.2, 0.5, 0.0];
        let mut x1 = vec![0.0; space.nx()];
        space.integrate(&x0, &v, &mut x1);

        let mut back = vec![0.0; space.ndx()];
        space.difference(&x0, &x1, &mut back);
        for (a, b) in back.iter().zip(v.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn continuous_joint_difference_wraps_around() {
        let config = ConfigurationSpace::new(vec![Joint::Continuous]);
        let a = config.from_coordinates(&[PI - 0.1]);
        let b = config.from_coordinates(&[-PI + 0.1]);
        let mut d = [0.0];
        config.difference(&a, &b, &mut d);
        assert_relative_eq!(d[0], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn euclidean_phase_space_is_plain_subtraction() {
        let space = PhaseSpace::euclidean(2);
        let x0 = [1.0, 2.0, 3.0, 4.0];
        let x1 = [0.5, 2.5, 3.0, 5.0];
        let mut d = [0.0; 4];
        space.difference(&x0, &x1, &mut d);
        assert_eq!(d, [-0.5, 0.5, 0.0, 1.0]);
    }
}
