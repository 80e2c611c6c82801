//! Derivatives for transcription functions.
//!
//! Residuals are written once, generic over [`Scalar`], and never differentiated
//! by hand. The [`Differentiated`] adapter turns such a residual into a
//! [`C1Function`] by either forward-mode dual numbers or central finite
//! differences, as selected by a [`Differentiation`] strategy.

use crate::function::C1Function;
use crate::traits::Scalar;
use nalgebra::{DMatrix, DVector};
use num_traits::{Float, FromPrimitive, Num, NumCast, One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

/// Simple Dual Number for Forward Mode AD
/// val: real part
/// eps: infinitesimal part
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Dual {
    pub val: f64,
    pub eps: f64,
}

impl Dual {
    pub fn new(val: f64, eps: f64) -> Self {
        Self { val, eps }
    }

    pub fn constant(val: f64) -> Self {
        Self::new(val, 0.0)
    }

    /// Applies a scalar function with known derivative `df` at `self.val`.
    fn chain(self, f: f64, df: f64) -> Self {
        Self::new(f, df * self.eps)
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::constant(0.0)
    }
    fn is_zero(&self) -> bool {
        self.val == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl Div for Dual {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let denom = rhs.val * rhs.val;
        Self::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / denom,
        )
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl Rem for Dual {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        // d/dx (x mod y) = 1 away from the jumps.
        Self::new(self.val % rhs.val, self.eps)
    }
}

macro_rules! assign_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for Dual {
            fn $method(&mut self, rhs: Self) {
                *self = *self $op rhs;
            }
        }
    };
}

assign_op!(AddAssign, add_assign, +);
assign_op!(SubAssign, sub_assign, -);
assign_op!(MulAssign, mul_assign, *);
assign_op!(DivAssign, div_assign, /);
assign_op!(RemAssign, rem_assign, %);

impl Num for Dual {
    type FromStrRadixErr = ();
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        f64::from_str_radix(str, radix)
            .map(Self::constant)
            .map_err(|_| ())
    }
}

impl ToPrimitive for Dual {
    fn to_i64(&self) -> Option<i64> {
        self.val.to_i64()
    }
    fn to_u64(&self) -> Option<u64> {
        self.val.to_u64()
    }
    fn to_f64(&self) -> Option<f64> {
        Some(self.val)
    }
}

impl FromPrimitive for Dual {
    fn from_i64(n: i64) -> Option<Self> {
        Some(Self::constant(n as f64))
    }
    fn from_u64(n: u64) -> Option<Self> {
        Some(Self::constant(n as f64))
    }
    fn from_f64(n: f64) -> Option<Self> {
        Some(Self::constant(n))
    }
}

impl NumCast for Dual {
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        n.to_f64().map(Self::constant)
    }
}

impl Float for Dual {
    fn nan() -> Self {
        Self::constant(f64::NAN)
    }
    fn infinity() -> Self {
        Self::constant(f64::INFINITY)
    }
    fn neg_infinity() -> Self {
        Self::constant(f64::NEG_INFINITY)
    }
    fn neg_zero() -> Self {
        Self::new(-0.0, -0.0)
    }
    fn min_value() -> Self {
        Self::constant(f64::MIN)
    }
    fn min_positive_value() -> Self {
        Self::constant(f64::MIN_POSITIVE)
    }
    fn max_value() -> Self {
        Self::constant(f64::MAX)
    }
    fn is_nan(self) -> bool {
        self.val.is_nan()
    }
    fn is_infinite(self) -> bool {
        self.val.is_infinite()
    }
    fn is_finite(self) -> bool {
        self.val.is_finite()
    }
    fn is_normal(self) -> bool {
        self.val.is_normal()
    }
    fn classify(self) -> std::num::FpCategory {
        self.val.classify()
    }
    fn floor(self) -> Self {
        Self::constant(self.val.floor())
    }
    fn ceil(self) -> Self {
        Self::constant(self.val.ceil())
    }
    fn round(self) -> Self {
        Self::constant(self.val.round())
    }
    fn trunc(self) -> Self {
        Self::constant(self.val.trunc())
    }
    fn fract(self) -> Self {
        Self::new(self.val.fract(), self.eps)
    }
    fn abs(self) -> Self {
        if self.val >= 0.0 {
            self
        } else {
            -self
        }
    }
    fn signum(self) -> Self {
        Self::constant(self.val.signum())
    }
    fn is_sign_positive(self) -> bool {
        self.val.is_sign_positive()
    }
    fn is_sign_negative(self) -> bool {
        self.val.is_sign_negative()
    }
    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }
    fn recip(self) -> Self {
        Self::one() / self
    }

    fn powi(self, n: i32) -> Self {
        self.chain(self.val.powi(n), (n as f64) * self.val.powi(n - 1))
    }

    fn powf(self, n: Self) -> Self {
        // x^y = exp(y * ln(x))
        let val_pow = self.val.powf(n.val);
        let eps_new = val_pow * (n.eps * self.val.ln() + n.val * self.eps / self.val);
        Self::new(val_pow, eps_new)
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        self.chain(s, 0.5 / s)
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        self.chain(e, e)
    }

    fn exp2(self) -> Self {
        let e = self.val.exp2();
        self.chain(e, e * std::f64::consts::LN_2)
    }
    fn ln(self) -> Self {
        self.chain(self.val.ln(), 1.0 / self.val)
    }
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }
    fn log2(self) -> Self {
        self.chain(self.val.log2(), 1.0 / (self.val * std::f64::consts::LN_2))
    }
    fn log10(self) -> Self {
        self.chain(self.val.log10(), 1.0 / (self.val * std::f64::consts::LN_10))
    }

    fn max(self, other: Self) -> Self {
        if self.val > other.val {
            self
        } else {
            other
        }
    }
    fn min(self, other: Self) -> Self {
        if self.val < other.val {
            self
        } else {
            other
        }
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.val > other.val {
            self - other
        } else {
            Self::zero()
        }
    }

    fn cbrt(self) -> Self {
        let c = self.val.cbrt();
        self.chain(c, 1.0 / (3.0 * c * c))
    }
    fn hypot(self, other: Self) -> Self {
        let h = self.val.hypot(other.val);
        Self::new(h, (self.val * self.eps + other.val * other.eps) / h)
    }

    fn sin(self) -> Self {
        self.chain(self.val.sin(), self.val.cos())
    }
    fn cos(self) -> Self {
        self.chain(self.val.cos(), -self.val.sin())
    }
    fn tan(self) -> Self {
        let t = self.val.tan();
        self.chain(t, 1.0 + t * t)
    }
    fn asin(self) -> Self {
        self.chain(self.val.asin(), 1.0 / (1.0 - self.val * self.val).sqrt())
    }
    fn acos(self) -> Self {
        self.chain(self.val.acos(), -1.0 / (1.0 - self.val * self.val).sqrt())
    }
    fn atan(self) -> Self {
        self.chain(self.val.atan(), 1.0 / (1.0 + self.val * self.val))
    }
    fn atan2(self, other: Self) -> Self {
        // self = y, other = x
        let denom = self.val * self.val + other.val * other.val;
        Self::new(
            self.val.atan2(other.val),
            (other.val * self.eps - self.val * other.eps) / denom,
        )
    }
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }

    fn exp_m1(self) -> Self {
        self.chain(self.val.exp_m1(), self.val.exp())
    }
    fn ln_1p(self) -> Self {
        self.chain(self.val.ln_1p(), 1.0 / (1.0 + self.val))
    }
    fn sinh(self) -> Self {
        self.chain(self.val.sinh(), self.val.cosh())
    }
    fn cosh(self) -> Self {
        self.chain(self.val.cosh(), self.val.sinh())
    }
    fn tanh(self) -> Self {
        let t = self.val.tanh();
        self.chain(t, 1.0 - t * t)
    }
    fn asinh(self) -> Self {
        self.chain(self.val.asinh(), 1.0 / (self.val * self.val + 1.0).sqrt())
    }
    fn acosh(self) -> Self {
        self.chain(self.val.acosh(), 1.0 / (self.val * self.val - 1.0).sqrt())
    }
    fn atanh(self) -> Self {
        self.chain(self.val.atanh(), 1.0 / (1.0 - self.val * self.val))
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.val.integer_decode()
    }
}

// --- Residuals and differentiation strategies ---

/// A vector-valued function `R^nx -> R^nr` written once for any scalar type.
pub trait ResidualFunction {
    /// Input dimension.
    fn nx(&self) -> usize;

    /// Output dimension.
    fn nr(&self) -> usize;

    /// Writes f(x) into `out` (length `nr`).
    fn evaluate<T: Scalar>(&self, x: &[T], out: &mut [T]);

    /// True when the function is affine in `x`.
    fn is_affine(&self) -> bool {
        false
    }
}

/// How first derivatives of a [`ResidualFunction`] are obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Differentiation {
    /// Forward-mode dual numbers, one sweep per input coordinate. Exact up to rounding.
    #[default]
    Dual,
    /// Central differences with the given step.
    FiniteDifference { eps: f64 },
}

/// Wraps a residual so that it satisfies the [`C1Function`] contract.
#[derive(Debug, Clone)]
pub struct Differentiated<F> {
    pub inner: F,
    pub strategy: Differentiation,
}

impl<F: ResidualFunction> Differentiated<F> {
    pub fn new(inner: F, strategy: Differentiation) -> Self {
        Self { inner, strategy }
    }
}

impl<F: ResidualFunction> C1Function for Differentiated<F> {
    fn nx(&self) -> usize {
        self.inner.nx()
    }

    fn nr(&self) -> usize {
        self.inner.nr()
    }

    fn evaluate(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        self.inner.evaluate(x.as_slice(), out.as_mut_slice());
    }

    fn is_affine(&self) -> bool {
        self.inner.is_affine()
    }

    fn jacobian(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        match self.strategy {
            Differentiation::Dual => dual_jacobian(&self.inner, x.as_slice(), jac),
            Differentiation::FiniteDifference { eps } => {
                central_difference_jacobian(&self.inner, x.as_slice(), eps, jac)
            }
        }
    }
}

/// Computes the Jacobian column by column with dual numbers.
pub fn dual_jacobian<F: ResidualFunction>(func: &F, x: &[f64], jac: &mut DMatrix<f64>) {
    let n = func.nx();
    let m = func.nr();
    let mut dual_x: Vec<Dual> = x.iter().map(|&v| Dual::constant(v)).collect();
    let mut dual_out = vec![Dual::zero(); m];

    for j in 0..n {
        dual_x[j].eps = 1.0;
        func.evaluate(&dual_x, &mut dual_out);
        for i in 0..m {
            jac[(i, j)] = dual_out[i].eps;
        }
        dual_x[j].eps = 0.0;
    }
}

/// Computes the Jacobian by central differences of step `eps`.
pub fn central_difference_jacobian<F: ResidualFunction>(
    func: &F,
    x: &[f64],
    eps: f64,
    jac: &mut DMatrix<f64>,
) {
    let n = func.nx();
    let m = func.nr();
    let mut perturbed = x.to_vec();
    let mut plus = vec![0.0; m];
    let mut minus = vec![0.0; m];

    for j in 0..n {
        perturbed[j] = x[j] + eps;
        func.evaluate(&perturbed, &mut plus);
        perturbed[j] = x[j] - eps;
        func.evaluate(&perturbed, &mut minus);
        perturbed[j] = x[j];
        for i in 0..m {
            jac[(i, j)] = (plus[i] - minus[i]) / (2.0 * eps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Polar;

    impl ResidualFunction for Polar {
        fn nx(&self) -> usize {
            2
        }

        fn nr(&self) -> usize {
            3
        }

        fn evaluate<T: Scalar>(&self, x: &[T], out: &mut [T]) {
            out[0] = x[0] * x[1].cos();
            out[1] = x[0] * x[1].sin();
            out[2] = x[1].atan2(x[0]) + x[0].powi(3);
        }
    }

    #[test]
    fn dual_chain_rule_matches_closed_form() {
        let x = Dual::new(0.3, 1.0);
        assert_relative_eq!(x.sin().eps, 0.3_f64.cos(), epsilon = 1e-15);
        assert_relative_eq!(x.exp2().eps, 0.3_f64.exp2() * std::f64::consts::LN_2, epsilon = 1e-15);
        assert_relative_eq!(x.atan().eps, 1.0 / (1.0 + 0.09), epsilon = 1e-15);
        assert_relative_eq!(x.tanh().eps, 1.0 - 0.3_f64.tanh().powi(2), epsilon = 1e-15);
        assert_relative_eq!(x.cbrt().eps, 1.0 / (3.0 * 0.3_f64.cbrt().powi(2)), epsilon = 1e-12);
    }

    #[test]
    fn dual_atan2_derivatives() {
        let y = Dual::new(1.0, 1.0);
        let x = Dual::new(2.0, 0.0);
        // d/dy atan2(y, x) = x / (x^2 + y^2)
        assert_relative_eq!(y.atan2(x).eps, 2.0 / 5.0, epsilon = 1e-15);
        let y = Dual::new(1.0, 0.0);
        let x = Dual::new(2.0, 1.0);
        // d/dx atan2(y, x) = -y / (x^2 + y^2)
        assert_relative_eq!(y.atan2(x).eps, -1.0 / 5.0, epsilon = 1e-15);
    }

    #[test]
    fn dual_and_finite_difference_jacobians_agree() {
        let x = [1.3, 0.4];
        let mut exact = DMatrix::zeros(3, 2);
        let mut approx = DMatrix::zeros(3, 2);
        dual_jacobian(&Polar, &x, &mut exact);
        central_difference_jacobian(&Polar, &x, 1e-6, &mut approx);

        assert_relative_eq!(exact[(0, 0)], 0.4_f64.cos(), epsilon = 1e-14);
        assert_relative_eq!(exact[(0, 1)], -1.3 * 0.4_f64.sin(), epsilon = 1e-14);
        for (a, b) in exact.iter().zip(approx.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-7);
        }
    }

    #[test]
    fn differentiated_dispatches_on_strategy() {
        let x = DVector::from_vec(vec![0.7, -0.2]);
        let dual = Differentiated::new(Polar, Differentiation::Dual);
        let fd = Differentiated::new(Polar, Differentiation::FiniteDifference { eps: 1e-6 });

        let mut value = DVector::zeros(3);
        dual.evaluate(&x, &mut value);
        assert_relative_eq!(value[0], 0.7 * (-0.2_f64).cos(), epsilon = 1e-15);

        let mut j_dual = DMatrix::zeros(3, 2);
        let mut j_fd = DMatrix::zeros(3, 2);
        dual.jacobian(&x, &mut j_dual);
        fd.jacobian(&x, &mut j_fd);
        assert!((j_dual - j_fd).amax() < 1e-7);
    }
}
