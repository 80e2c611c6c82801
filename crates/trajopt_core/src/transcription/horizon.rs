use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest step count a horizon may discretize to.
pub const MAX_STEPS: usize = 1 << 24;

/// Fixed-step time grid of a transcription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Horizon {
    nsteps: usize,
    dt: f64,
}

impl Horizon {
    /// Discretizes `duration` with `nsteps = round(duration / dt)`.
    pub fn from_duration(duration: f64, dt: f64) -> Result<Self> {
        if !(duration.is_finite() && dt.is_finite() && duration > 0.0 && dt > 0.0) {
            return Err(Error::InvalidHorizon {
                horizon: duration,
                dt,
            });
        }
        let ratio = (duration / dt).round();
        if !ratio.is_finite() || ratio > MAX_STEPS as f64 {
            return Err(Error::InvalidHorizon {
                horizon: duration,
                dt,
            });
        }
        let nsteps = ratio as usize;
        if nsteps == 0 {
            return Err(Error::EmptyHorizon {
                horizon: duration,
                dt,
            });
        }
        Ok(Self { nsteps, dt })
    }

    pub fn new(nsteps: usize, dt: f64) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) || nsteps > MAX_STEPS {
            return Err(Error::InvalidHorizon {
                horizon: nsteps as f64 * dt,
                dt,
            });
        }
        if nsteps == 0 {
            return Err(Error::EmptyHorizon { horizon: 0.0, dt });
        }
        Ok(Self { nsteps, dt })
    }

    pub fn nsteps(&self) -> usize {
        self.nsteps
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Duration actually covered, `nsteps * dt`.
    pub fn realized(&self) -> f64 {
        self.nsteps as f64 * self.dt
    }

    /// Knot times `0, dt, ..., nsteps * dt`.
    pub fn times(&self) -> Vec<f64> {
        (0..=self.nsteps).map(|i| i as f64 * self.dt).collect()
    }
}
