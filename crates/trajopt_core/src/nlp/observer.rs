use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Snapshot reported to observers after every solver iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub primal_infeasibility: f64,
    pub dual_infeasibility: f64,
    pub step_size: f64,
    pub merit: f64,
    pub mu: f64,
}

/// Receives one [`IterationRecord`] per solver iteration.
///
/// Observers only watch: they cannot alter or stop the solve. Closures
/// implement this trait, and `()` is a no-op observer.
pub trait IterationObserver {
    fn observe(&mut self, record: &IterationRecord);
}

impl<F> IterationObserver for F
where
    F: FnMut(&IterationRecord),
{
    fn observe(&mut self, record: &IterationRecord) {
        self(record)
    }
}

impl IterationObserver for () {
    fn observe(&mut self, _record: &IterationRecord) {}
}

/// Per-iteration series, appended in solver order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsHistory {
    pub primal_infeasibility: Vec<f64>,
    pub dual_infeasibility: Vec<f64>,
    pub step_size: Vec<f64>,
    pub merit: Vec<f64>,
    pub mu: Vec<f64>,
}

impl DiagnosticsHistory {
    pub fn push(&mut self, record: &IterationRecord) {
        self.primal_infeasibility.push(record.primal_infeasibility);
        self.dual_infeasibility.push(record.dual_infeasibility);
        self.step_size.push(record.step_size);
        self.merit.push(record.merit);
        self.mu.push(record.mu);
    }

    pub fn len(&self) -> usize {
        self.primal_infeasibility.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primal_infeasibility.is_empty()
    }
}

/// Observer that records into a history shared with its creator.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Rc<RefCell<DiagnosticsHistory>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the recorded history, readable after the solve.
    pub fn history(&self) -> Rc<RefCell<DiagnosticsHistory>> {
        Rc::clone(&self.history)
    }
}

impl IterationObserver for HistoryCallback {
    fn observe(&mut self, record: &IterationRecord) {
        self.history.borrow_mut().push(record);
    }
}
