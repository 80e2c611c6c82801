pub mod bounds;
pub mod cost;
pub mod defect;
pub mod horizon;
pub mod layout;
pub mod problem;

pub use bounds::ControlBounds;
pub use cost::{TrackingResidual, TrackingWeights};
pub use defect::DynamicsDefect;
pub use horizon::Horizon;
pub use layout::{DecisionLayout, Trajectory};
pub use problem::{
    MultipleShootingProblem, TranscriptionSettings, CONTROL_BOUNDS_CONSTRAINT,
    DYNAMICS_CONSTRAINT,
};
