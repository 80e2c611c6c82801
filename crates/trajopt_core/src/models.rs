//! Concrete dynamics models.

use crate::manifold::{ConfigurationSpace, Joint, PhaseSpace};
use crate::traits::{Dynamics, Scalar};
use serde::{Deserialize, Serialize};

/// Planar double pendulum with point masses at the link tips.
///
/// Angles are measured from the downward vertical; the second angle is
/// relative to the first link. The neutral configuration hangs at rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoublePendulum {
    pub masses: [f64; 2],
    pub lengths: [f64; 2],
    pub gravity: f64,
    joint: Joint,
}

impl Default for DoublePendulum {
    fn default() -> Self {
        Self::new([1.0, 1.0], [0.5, 0.5], 9.81)
    }
}

impl DoublePendulum {
    pub fn new(masses: [f64; 2], lengths: [f64; 2], gravity: f64) -> Self {
        Self {
            masses,
            lengths,
            gravity,
            joint: Joint::Euclidean,
        }
    }

    /// Uses `(cos θ, sin θ)` coordinates for both joints.
    pub fn with_continuous_joints(mut self) -> Self {
        self.joint = Joint::Continuous;
        self
    }

    /// The phase space matching this model's configuration representation.
    pub fn phase_space(&self) -> PhaseSpace {
        PhaseSpace::new(ConfigurationSpace::new(vec![self.joint; 2]))
    }

    fn joint_trig<T: Scalar>(&self, q: &[T], index: usize) -> (T, T) {
        match self.joint {
            Joint::Euclidean => (q[index].cos(), q[index].sin()),
            Joint::Continuous => (q[2 * index], q[2 * index + 1]),
        }
    }
}

impl Dynamics for DoublePendulum {
    fn nq(&self) -> usize {
        2 * self.joint.nq()
    }

    fn nv(&self) -> usize {
        2
    }

    fn acceleration<T: Scalar>(&self, q: &[T], v: &[T], tau: &[T], out: &mut [T]) {
        let m1 = T::constant(self.masses[0]);
        let m2 = T::constant(self.masses[1]);
        let l1 = T::constant(self.lengths[0]);
        let l2 = T::constant(self.lengths[1]);
        let g = T::constant(self.gravity);
        let two = T::constant(2.0);

        let (c1, s1) = self.joint_trig(q, 0);
        let (c2, s2) = self.joint_trig(q, 1);
        let s12 = s1 * c2 + c1 * s2;

        // Mass matrix
        let m11 = m1 * l1 * l1 + m2 * (l1 * l1 + l2 * l2 + two * l1 * l2 * c2);
        let m12 = m2 * (l2 * l2 + l1 * l2 * c2);
        let m22 = m2 * l2 * l2;

        // Coriolis, centrifugal and gravity terms
        let h = m2 * l1 * l2 * s2;
        let b1 = -h * (two * v[0] * v[1] + v[1] * v[1]) + (m1 + m2) * g * l1 * s1 + m2 * g * l2 * s12;
        let b2 = h * v[0] * v[0] + m2 * g * l2 * s12;

        let r1 = tau[0] - b1;
        let r2 = tau[1] - b2;
        let det = m11 * m22 - m12 * m12;
        out[0] = (m22 * r1 - m12 * r2) / det;
        out[1] = (m11 * r2 - m12 * r1) / det;
    }
}

/// Fully actuated point mass, `q̈ = τ / m` in every coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointMass {
    pub mass: f64,
    pub dof: usize,
}

impl PointMass {
    pub fn new(mass: f64, dof: usize) -> Self {
        Self { mass, dof }
    }

    pub fn phase_space(&self) -> PhaseSpace {
        PhaseSpace::euclidean(self.dof)
    }
}

impl Dynamics for PointMass {
    fn nq(&self) -> usize {
        self.dof
    }

    fn nv(&self) -> usize {
        self.dof
    }

    fn acceleration<T: Scalar>(&self, _q: &[T], _v: &[T], tau: &[T], out: &mut [T]) {
        let inv_mass = T::constant(1.0 / self.mass);
        for (a, &f) in out.iter_mut().zip(tau) {
            *a = f * inv_mass;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Manifold;
    use approx::assert_relative_eq;

    fn total_energy(model: &DoublePendulum, q: &[f64], v: &[f64]) -> f64 {
        let [m1, m2] = model.masses;
        let [l1, l2] = model.lengths;
        let g = model.gravity;
        let c2 = q[1].cos();
        let kinetic = 0.5 * (m1 + m2) * l1 * l1 * v[0] * v[0]
            + 0.5 * m2 * l2 * l2 * (v[0] + v[1]).powi(2)
            + m2 * l1 * l2 * c2 * v[0] * (v[0] + v[1]);
        let potential = -(m1 + m2) * g * l1 * q[0].cos() - m2 * g * l2 * (q[0] + q[1]).cos();
        kinetic + potential
    }

    #[test]
    fn hanging_pendulum_is_an_equilibrium() {
        let model = DoublePendulum::default();
        let mut a = [1.0; 2];
        model.acceleration(&[0.0, 0.0], &[0.0, 0.0], &[0.0, 0.0], &mut a);
        assert_eq!(a, [0.0, 0.0]);
    }

    #[test]
    fn gravity_restores_toward_hanging() {
        let model = DoublePendulum::default();
        let mut a = [0.0; 2];
        model.acceleration(&[0.2, 0.0], &[0.0, 0.0], &[0.0, 0.0], &mut a);
        assert!(a[0] < 0.0);
    }

    #[test]
    fn power_balance_matches_energy_rate() {
        // dE/dt = τ · v along any trajectory.
        let model = DoublePendulum::new([0.7, 1.3], [0.4, 0.6], 9.81);
        let q = [0.9, -0.4];
        let v = [0.3, -1.1];
        let tau = [0.2, -0.5];
        let mut a = [0.0; 2];
        model.acceleration(&q, &v, &tau, &mut a);

        let h = 1e-6;
        let q_plus = [q[0] + h * v[0], q[1] + h * v[1]];
        let v_plus = [v[0] + h * a[0], v[1] + h * a[1]];
        let q_minus = [q[0] - h * v[0], q[1] - h * v[1]];
        let v_minus = [v[0] - h * a[0], v[1] - h * a[1]];
        let rate = (total_energy(&model, &q_plus, &v_plus) - total_energy(&model, &q_minus, &v_minus))
            / (2.0 * h);
        assert_relative_eq!(rate, tau[0] * v[0] + tau[1] * v[1], epsilon = 1e-5);
    }

    #[test]
    fn continuous_joints_match_angle_coordinates() {
        let plain = DoublePendulum::default();
        let wrapped = DoublePendulum::default().with_continuous_joints();
        let space = wrapped.phase_space();
        assert_eq!(space.nx(), 6);
        assert_eq!(wrapped.nq(), 4);

        let angles = [1.1, -0.7];
        let v = [0.5, 0.25];
        let tau = [0.0, 0.3];
        let mut a_plain = [0.0; 2];
        let mut a_wrapped = [0.0; 2];
        plain.acceleration(&angles, &v, &tau, &mut a_plain);
        let q = space.configuration().from_coordinates(&angles);
        wrapped.acceleration(&q, &v, &tau, &mut a_wrapped);
        assert_relative_eq!(a_plain[0], a_wrapped[0], epsilon = 1e-12);
        assert_relative_eq!(a_plain[1], a_wrapped[1], epsilon = 1e-12);
    }

    #[test]
    fn point_mass_scales_force() {
        let model = PointMass::new(2.0, 3);
        let mut a = [0.0; 3];
        model.acceleration(&[0.0; 3], &[0.0; 3], &[1.0, -2.0, 4.0], &mut a);
        assert_eq!(a, [0.5, -1.0, 2.0]);
    }
}
