//! Object-safe function contracts consumed by the NLP solver.

use nalgebra::{DMatrix, DVector};

/// Step used when second derivatives are approximated from Jacobians.
const HESSIAN_FD_EPS: f64 = 1e-6;

/// A vector function with a first derivative.
pub trait C1Function {
    /// Input dimension.
    fn nx(&self) -> usize;

    /// Output dimension.
    fn nr(&self) -> usize;

    fn evaluate(&self, x: &DVector<f64>, out: &mut DVector<f64>);

    /// Writes the `nr x nx` Jacobian into `jac`.
    fn jacobian(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>);

    /// True when the Jacobian does not depend on `x`.
    fn is_affine(&self) -> bool {
        false
    }

    /// Hessian of `x -> vᵀ f(x)`, by central differences of the Jacobian.
    fn vector_hessian_product(&self, x: &DVector<f64>, v: &DVector<f64>, out: &mut DMatrix<f64>) {
        if self.is_affine() {
            out.fill(0.0);
            return;
        }
        let n = self.nx();
        let m = self.nr();
        let mut perturbed = x.clone();
        let mut j_plus = DMatrix::zeros(m, n);
        let mut j_minus = DMatrix::zeros(m, n);

        for i in 0..n {
            perturbed[i] = x[i] + HESSIAN_FD_EPS;
            self.jacobian(&perturbed, &mut j_plus);
            perturbed[i] = x[i] - HESSIAN_FD_EPS;
            self.jacobian(&perturbed, &mut j_minus);
            perturbed[i] = x[i];

            let column = (&j_plus - &j_minus).tr_mul(v) / (2.0 * HESSIAN_FD_EPS);
            out.set_column(i, &column);
        }

        let symmetric = (&*out + out.transpose()) * 0.5;
        out.copy_from(&symmetric);
    }
}

/// Local second-order model of a cost around a point.
#[derive(Debug, Clone)]
pub struct CostModel {
    pub value: f64,
    pub gradient: DVector<f64>,
    pub hessian: DMatrix<f64>,
}

/// A scalar objective with gradient and curvature.
pub trait CostFunction {
    fn nx(&self) -> usize;

    fn value(&self, x: &DVector<f64>) -> f64;

    fn gradient(&self, x: &DVector<f64>, out: &mut DVector<f64>);

    /// Exact Hessian.
    fn hessian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>);

    /// Positive-semidefinite curvature approximation. Defaults to the exact Hessian.
    fn gauss_newton_hessian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) {
        self.hessian(x, out);
    }

    fn second_order_model(&self, x: &DVector<f64>, gauss_newton: bool) -> CostModel {
        let n = self.nx();
        let mut gradient = DVector::zeros(n);
        let mut hessian = DMatrix::zeros(n, n);
        self.gradient(x, &mut gradient);
        if gauss_newton {
            self.gauss_newton_hessian(x, &mut hessian);
        } else {
            self.hessian(x, &mut hessian);
        }
        CostModel {
            value: self.value(x),
            gradient,
            hessian,
        }
    }
}

/// Cost `½ r(x)ᵀ diag(w) r(x)` of a residual `r`.
pub struct QuadraticResidualCost {
    residual: Box<dyn C1Function>,
    weights: DVector<f64>,
}

impl QuadraticResidualCost {
    /// `weights` must have one entry per residual output.
    pub fn new(residual: Box<dyn C1Function>, weights: DVector<f64>) -> Self {
        debug_assert_eq!(residual.nr(), weights.len());
        Self { residual, weights }
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    pub fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut r = DVector::zeros(self.residual.nr());
        self.residual.evaluate(x, &mut r);
        r
    }

    fn residual_jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.residual.nr(), self.residual.nx());
        self.residual.jacobian(x, &mut jac);
        jac
    }
}

impl CostFunction for QuadraticResidualCost {
    fn nx(&self) -> usize {
        self.residual.nx()
    }

    fn value(&self, x: &DVector<f64>) -> f64 {
        let r = self.residual(x);
        0.5 * r
            .iter()
            .zip(self.weights.iter())
            .map(|(ri, wi)| wi * ri * ri)
            .sum::<f64>()
    }

    fn gradient(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        let weighted = self.residual(x).component_mul(&self.weights);
        let jac = self.residual_jacobian(x);
        out.copy_from(&jac.tr_mul(&weighted));
    }

    fn hessian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) {
        self.gauss_newton_hessian(x, out);
        let weighted = self.residual(x).component_mul(&self.weights);
        let mut curvature = DMatrix::zeros(self.nx(), self.nx());
        self.residual
            .vector_hessian_product(x, &weighted, &mut curvature);
        *out += curvature;
    }

    fn gauss_newton_hessian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) {
        let jac = self.residual_jacobian(x);
        let mut weighted_jac = jac.clone();
        for (i, mut row) in weighted_jac.row_iter_mut().enumerate() {
            row *= self.weights[i];
        }
        out.copy_from(&jac.tr_mul(&weighted_jac));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// r(x) = [x0^2, x0 * x1]
    struct Bilinear;

    impl C1Function for Bilinear {
        fn nx(&self) -> usize {
            2
        }

        fn nr(&self) -> usize {
            2
        }

        fn evaluate(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
            out[0] = x[0] * x[0];
            out[1] = x[0] * x[1];
        }

        fn jacobian(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) {
            jac[(0, 0)] = 2.0 * x[0];
            jac[(0, 1)] = 0.0;
            jac[(1, 0)] = x[1];
            jac[(1, 1)] = x[0];
        }
    }

    #[test]
    fn vector_hessian_product_matches_analytic() {
        let x = DVector::from_vec(vec![0.5, -1.0]);
        let v = DVector::from_vec(vec![2.0, 3.0]);
        let mut h = DMatrix::zeros(2, 2);
        Bilinear.vector_hessian_product(&x, &v, &mut h);
        // ∇²(2 x0² + 3 x0 x1) = [[4, 3], [3, 0]]
        assert_relative_eq!(h[(0, 0)], 4.0, epsilon = 1e-6);
        assert_relative_eq!(h[(0, 1)], 3.0, epsilon = 1e-6);
        assert_relative_eq!(h[(1, 0)], 3.0, epsilon = 1e-6);
        assert_relative_eq!(h[(1, 1)], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn quadratic_residual_cost_value_gradient_and_models() {
        let cost = QuadraticResidualCost::new(
            Box::new(Bilinear),
            DVector::from_vec(vec![1.0, 2.0]),
        );
        let x = DVector::from_vec(vec![1.0, 2.0]);
        // r = [1, 2], value = 0.5 * (1 + 2 * 4)
        assert_relative_eq!(cost.value(&x), 4.5, epsilon = 1e-14);

        let mut g = DVector::zeros(2);
        cost.gradient(&x, &mut g);
        // Jᵀ W r = [[2, 2], [0, 1]] * [1, 4]
        assert_relative_eq!(g[0], 10.0, epsilon = 1e-14);
        assert_relative_eq!(g[1], 4.0, epsilon = 1e-14);

        let gn = cost.second_order_model(&x, true);
        let exact = cost.second_order_model(&x, false);
        assert_relative_eq!(gn.value, exact.value);
        // The Gauss-Newton model is PSD and drops the residual curvature.
        assert!(gn.hessian.clone().cholesky().is_some());
        // Exact adds ∇²(1 * x0² + 4 * x0 x1) = [[2, 4], [4, 0]]
        let diff = &exact.hessian - &gn.hessian;
        assert_relative_eq!(diff[(0, 0)], 2.0, epsilon = 1e-5);
        assert_relative_eq!(diff[(0, 1)], 4.0, epsilon = 1e-5);
        assert_relative_eq!(diff[(1, 1)], 0.0, epsilon = 1e-5);
    }
}
