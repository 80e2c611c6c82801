use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can flow through dynamics, manifold and residual evaluations.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {
    /// Lifts a constant (model parameter, weight, step size) into the scalar type.
    fn constant(value: f64) -> Self;
}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {
    fn constant(value: f64) -> Self {
        T::from_f64(value).unwrap_or_else(T::nan)
    }
}

/// A (possibly curved) state space with an increment operator.
///
/// Points have `nx` coordinates, tangent vectors have `ndx`. Both operations
/// are generic over the scalar so that residuals built on top of them can be
/// differentiated with dual numbers.
pub trait Manifold {
    /// Dimension of the point representation.
    fn nx(&self) -> usize;

    /// Dimension of the tangent space.
    fn ndx(&self) -> usize;

    /// Default point of the space (zero angles, zero velocities).
    fn neutral(&self) -> Vec<f64>;

    /// out = x ⊕ v
    fn integrate<T: Scalar>(&self, x: &[T], v: &[T], out: &mut [T]);

    /// out = x1 ⊖ x0, the tangent vector taking `x0` to `x1`.
    fn difference<T: Scalar>(&self, x0: &[T], x1: &[T], out: &mut [T]);
}

/// Second-order mechanical dynamics `q̈ = a(q, v, τ)`.
pub trait Dynamics {
    /// Size of the configuration representation.
    fn nq(&self) -> usize;

    /// Number of degrees of freedom (velocity and generalized-force dimension).
    fn nv(&self) -> usize;

    /// Evaluates the forward dynamics.
    /// q: configuration
    /// v: generalized velocity
    /// tau: generalized force
    /// out: buffer to write the acceleration
    fn acceleration<T: Scalar>(&self, q: &[T], v: &[T], tau: &[T], out: &mut [T]);
}
