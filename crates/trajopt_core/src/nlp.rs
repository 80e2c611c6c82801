pub mod config;
pub mod linesearch;
pub mod observer;
pub mod problem;
pub mod solver;
pub mod workspace;

pub use config::{LinesearchStrategy, SolverConfig};
pub use observer::{DiagnosticsHistory, HistoryCallback, IterationObserver, IterationRecord};
pub use problem::{Constraint, ConstraintKind, NlpProblem};
pub use solver::{NlpSolver, ProxAlSolver};
pub use workspace::{SolveStatus, SolverResults, Workspace};
