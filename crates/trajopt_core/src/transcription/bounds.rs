use super::layout::DecisionLayout;
use crate::autodiff::ResidualFunction;
use crate::traits::Scalar;

/// Box constraint `|u_t| <= bound` as the inequality `g(z) <= 0`.
///
/// Per step the block is `[u_t - bound, -u_t - bound]`.
pub struct ControlBounds {
    layout: DecisionLayout,
    bound: f64,
}

impl ControlBounds {
    pub fn new(layout: DecisionLayout, bound: f64) -> Self {
        Self { layout, bound }
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }
}

impl ResidualFunction for ControlBounds {
    fn nx(&self) -> usize {
        self.layout.len()
    }

    fn nr(&self) -> usize {
        2 * self.layout.nu * self.layout.nsteps
    }

    fn evaluate<T: Scalar>(&self, z: &[T], out: &mut [T]) {
        let nu = self.layout.nu;
        let bound = T::constant(self.bound);
        for t in 0..self.layout.nsteps {
            let u = self.layout.control(z, t);
            let block = &mut out[2 * nu * t..2 * nu * (t + 1)];
            for (i, &ui) in u.iter().enumerate() {
                block[i] = ui - bound;
                block[nu + i] = -ui - bound;
            }
        }
    }

    fn is_affine(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::{Differentiated, Differentiation};
    use crate::function::C1Function;
    use nalgebra::{DMatrix, DVector};

    fn residual(bounds: &ControlBounds, controls: &[f64]) -> Vec<f64> {
        let layout = bounds.layout;
        let mut z = vec![0.0; layout.len()];
        z[layout.control_offset()..].copy_from_slice(controls);
        let mut out = vec![0.0; bounds.nr()];
        bounds.evaluate(&z, &mut out);
        out
    }

    #[test]
    fn block_ordering_is_upper_then_lower() {
        let layout = DecisionLayout::new(2, 2, 2);
        let bounds = ControlBounds::new(layout, 1.0);
        let out = residual(&bounds, &[0.5, -0.25, 0.0, 1.0]);
        assert_eq!(out, vec![-0.5, -1.25, -1.5, -0.75, -1.0, 0.0, -1.0, -2.0]);
    }

    #[test]
    fn feasible_iff_controls_within_bound() {
        let layout = DecisionLayout::new(3, 2, 1);
        let bounds = ControlBounds::new(layout, 0.25);
        assert!(residual(&bounds, &[0.25, -0.25, 0.1]).iter().all(|&g| g <= 0.0));

        let out = residual(&bounds, &[0.0, 0.25 + 1e-3, 0.0]);
        let positive: Vec<_> = out.iter().filter(|&&g| g > 0.0).collect();
        assert_eq!(positive.len(), 1);
        assert!((out[2] - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn bounds_carry_no_curvature() {
        let layout = DecisionLayout::new(3, 2, 1);
        let bounds = Differentiated::new(ControlBounds::new(layout, 0.25), Differentiation::Dual);
        assert!(bounds.is_affine());

        let z = DVector::from_element(layout.len(), 0.3);
        let v = DVector::from_element(bounds.nr(), 1.0);
        let mut h = DMatrix::from_element(layout.len(), layout.len(), 7.0);
        bounds.vector_hessian_product(&z, &v, &mut h);
        assert_eq!(h.amax(), 0.0);
    }
}
