use thiserror::Error;

/// Errors raised while building a problem or handing data across the solver boundary.
///
/// Solver non-convergence is not an error: it is reported through
/// [`SolveStatus`](crate::nlp::SolveStatus) together with the last iterate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("horizon {horizon} and time step {dt} must be finite and positive")]
    InvalidHorizon { horizon: f64, dt: f64 },

    #[error("horizon {horizon} with time step {dt} rounds to zero steps")]
    EmptyHorizon { horizon: f64, dt: f64 },

    #[error("input matrix must be {expected_rows} x nu with nu >= 1, got {rows} x {cols}")]
    InputMatrixShape {
        expected_rows: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{what}: expected dimension {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid weights: {reason}")]
    InvalidWeights { reason: &'static str },

    #[error("control bound must be finite and positive, got {bound}")]
    InvalidBound { bound: f64 },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },

    #[error("decision vector has length {actual}, expected {expected}")]
    DecisionLength { expected: usize, actual: usize },

    #[error("expected {expected} multiplier blocks, got {actual}")]
    MultiplierCount { expected: usize, actual: usize },

    #[error("multiplier block {index} has length {actual}, expected {expected}")]
    MultiplierShape {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error(
        "trajectory has {states} states and {controls} controls, expected {expected_states} and {expected_controls}"
    )]
    TrajectoryShape {
        expected_states: usize,
        expected_controls: usize,
        states: usize,
        controls: usize,
    },

    #[error("workspace was sized for {expected} variables and {expected_constraints} constraints, problem has {actual} and {actual_constraints}")]
    WorkspaceShape {
        expected: usize,
        expected_constraints: usize,
        actual: usize,
        actual_constraints: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
