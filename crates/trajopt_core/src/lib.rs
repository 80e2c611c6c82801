pub mod autodiff;
pub mod driver;
pub mod error;
pub mod function;
pub mod integrator;
pub mod manifold;
pub mod models;
pub mod nlp;
/// The `trajopt_core` crate turns a mechanical system and a tracking objective into
/// a finite-dimensional NLP by multiple shooting, solves it, and decodes the result.
/// Transcription functions are written once, generic over `Scalar`, and differentiated
/// with Dual numbers or finite differences.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `Manifold` (state spaces), `Dynamics` (forward dynamics).
/// - **Transcription**: Horizon, decision layout, dynamics defect, tracking cost and control bounds.
/// - **NLP**: Problem container, `NlpSolver` interface and the proximal augmented Lagrangian solver.
/// - **Driver**: `SolveDriver`, which runs a transcription end to end and reports an `Optimization`.
pub mod traits;
pub mod transcription;

pub use driver::{Optimization, SolveDriver};
pub use error::{Error, Result};
