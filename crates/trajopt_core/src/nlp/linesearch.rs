//! Backtracking line searches on a one-dimensional merit `φ(α)`.

use super::config::{LinesearchStrategy, SolverConfig};

/// Accepted step of a line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinesearchStep {
    pub alpha: f64,
    pub value: f64,
    /// Number of merit evaluations performed.
    pub trials: usize,
}

/// Interpolation keeps the new trial inside this fraction of the previous one.
const SAFEGUARD_LOW: f64 = 0.1;
const SAFEGUARD_HIGH: f64 = 0.5;

/// Searches for `α ∈ [alpha_min, 1]` with `φ(α) <= φ(0) + c1 α φ'(0)`.
///
/// `dphi0` must be negative. Non-finite merit values count as insufficient
/// decrease. When no trial above `alpha_min` is accepted, `alpha_min` is
/// returned regardless.
pub fn search<F>(config: &SolverConfig, mut phi: F, phi0: f64, dphi0: f64) -> LinesearchStep
where
    F: FnMut(f64) -> f64,
{
    let c1 = config.armijo_c1;
    let sufficient = |alpha: f64, value: f64| value.is_finite() && value <= phi0 + c1 * alpha * dphi0;

    let mut alpha = 1.0;
    let mut value = phi(alpha);
    let mut trials = 1;
    // Previous trial, used by cubic interpolation.
    let mut previous: Option<(f64, f64)> = None;

    while !sufficient(alpha, value) {
        let next = match config.linesearch {
            LinesearchStrategy::Armijo => alpha * config.ls_contraction,
            LinesearchStrategy::CubicInterpolation => {
                let candidate = if value.is_finite() {
                    match previous {
                        None => quadratic_minimizer(phi0, dphi0, alpha, value),
                        Some((alpha_prev, value_prev)) => {
                            cubic_minimizer(phi0, dphi0, alpha, value, alpha_prev, value_prev)
                        }
                    }
                } else {
                    f64::NAN
                };
                if candidate.is_finite() {
                    candidate.clamp(SAFEGUARD_LOW * alpha, SAFEGUARD_HIGH * alpha)
                } else {
                    SAFEGUARD_HIGH * alpha
                }
            }
        };

        if next < config.alpha_min {
            let value = phi(config.alpha_min);
            return LinesearchStep {
                alpha: config.alpha_min,
                value,
                trials: trials + 1,
            };
        }

        previous = Some((alpha, value));
        alpha = next;
        value = phi(alpha);
        trials += 1;
    }

    LinesearchStep {
        alpha,
        value,
        trials,
    }
}

/// Minimizer of the quadratic matching `φ(0)`, `φ'(0)` and `φ(α)`.
fn quadratic_minimizer(phi0: f64, dphi0: f64, alpha: f64, value: f64) -> f64 {
    let denom = 2.0 * (value - phi0 - dphi0 * alpha);
    -dphi0 * alpha * alpha / denom
}

/// Minimizer of the cubic matching `φ(0)`, `φ'(0)` and the two latest trials.
fn cubic_minimizer(phi0: f64, dphi0: f64, a1: f64, v1: f64, a0: f64, v0: f64) -> f64 {
    let r1 = v1 - phi0 - dphi0 * a1;
    let r0 = v0 - phi0 - dphi0 * a0;
    let scale = 1.0 / (a0 * a0 * a1 * a1 * (a1 - a0));
    let a = scale * (a0 * a0 * r1 - a1 * a1 * r0);
    let b = scale * (-a0 * a0 * a0 * r1 + a1 * a1 * a1 * r0);
    let disc = b * b - 3.0 * a * dphi0;
    if disc < 0.0 {
        return f64::NAN;
    }
    let s = disc.sqrt();
    // Rationalized root avoids cancellation when the cubic term is tiny.
    if b > 0.0 {
        -dphi0 / (b + s)
    } else {
        (-b + s) / (3.0 * a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(linesearch: LinesearchStrategy) -> SolverConfig {
        SolverConfig {
            linesearch,
            ..SolverConfig::default()
        }
    }

    #[test]
    fn full_step_accepted_on_quadratic_with_unit_minimizer() {
        // φ(α) = (α - 1)^2, φ(0) = 1, φ'(0) = -2
        let step = search(
            &config(LinesearchStrategy::Armijo),
            |a| (a - 1.0) * (a - 1.0),
            1.0,
            -2.0,
        );
        assert_eq!(step.alpha, 1.0);
        assert_eq!(step.trials, 1);
    }

    #[test]
    fn backtracking_satisfies_sufficient_decrease() {
        // Minimizer at 0.05, so the unit step overshoots badly.
        let phi = |a: f64| 100.0 * (a - 0.05).powi(2);
        let phi0 = phi(0.0);
        let dphi0 = -10.0;
        for strategy in [LinesearchStrategy::Armijo, LinesearchStrategy::CubicInterpolation] {
            let cfg = config(strategy);
            let step = search(&cfg, phi, phi0, dphi0);
            assert!(step.alpha < 1.0);
            assert!(step.alpha >= cfg.alpha_min);
            assert!(step.value <= phi0 + cfg.armijo_c1 * step.alpha * dphi0);
        }
    }

    #[test]
    fn quadratic_interpolation_recovers_minimizer() {
        let phi = |a: f64| 100.0 * (a - 0.3).powi(2) - 9.0;
        let phi0 = phi(0.0);
        let dphi0 = -60.0;
        // Exact quadratic: first interpolated trial is the minimizer, clamped to [0.1, 0.5].
        let step = search(&config(LinesearchStrategy::CubicInterpolation), phi, phi0, dphi0);
        assert!((step.alpha - 0.3).abs() < 1e-12);
        assert_eq!(step.trials, 2);
    }

    #[test]
    fn non_finite_merit_is_rejected() {
        let phi = |a: f64| if a > 0.2 { f64::NAN } else { 1.0 - a };
        let step = search(&config(LinesearchStrategy::CubicInterpolation), phi, 1.0, -1.0);
        assert!(step.value.is_finite());
        assert!(step.alpha <= 0.2);
    }

    #[test]
    fn falls_back_to_alpha_min() {
        // Ascent direction mislabelled as descent never satisfies the condition.
        let cfg = config(LinesearchStrategy::Armijo);
        let step = search(&cfg, |a| a, 0.0, -1.0);
        assert_eq!(step.alpha, cfg.alpha_min);
    }
}
