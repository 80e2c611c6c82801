use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::function::{C1Function, CostFunction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// `c(x) = 0`
    Equality,
    /// `c(x) <= 0`
    Inequality,
}

impl ConstraintKind {
    /// Projection onto the normal cone of the constraint set.
    pub fn project(self, value: f64) -> f64 {
        match self {
            ConstraintKind::Equality => value,
            ConstraintKind::Inequality => value.max(0.0),
        }
    }
}

pub struct Constraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub function: Box<dyn C1Function>,
}

impl Constraint {
    pub fn nr(&self) -> usize {
        self.function.nr()
    }
}

/// A cost and an ordered set of constraints over one decision vector.
pub struct NlpProblem {
    cost: Box<dyn CostFunction>,
    constraints: Vec<Constraint>,
}

impl NlpProblem {
    pub fn new(cost: Box<dyn CostFunction>) -> Self {
        Self {
            cost,
            constraints: Vec::new(),
        }
    }

    /// Appends a constraint. Its input dimension must match the cost's.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        kind: ConstraintKind,
        function: Box<dyn C1Function>,
    ) -> Result<()> {
        if function.nx() != self.nx() {
            return Err(Error::DimensionMismatch {
                what: "constraint input",
                expected: self.nx(),
                actual: function.nx(),
            });
        }
        self.constraints.push(Constraint {
            name: name.into(),
            kind,
            function,
        });
        Ok(())
    }

    pub fn nx(&self) -> usize {
        self.cost.nx()
    }

    pub fn cost(&self) -> &dyn CostFunction {
        self.cost.as_ref()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn total_constraint_dim(&self) -> usize {
        self.constraints.iter().map(Constraint::nr).sum()
    }

    /// One zero vector per constraint.
    pub fn zero_multipliers(&self) -> Vec<DVector<f64>> {
        self.constraints
            .iter()
            .map(|c| DVector::zeros(c.nr()))
            .collect()
    }

    pub fn check_decision(&self, x: &DVector<f64>) -> Result<()> {
        if x.len() != self.nx() {
            return Err(Error::DecisionLength {
                expected: self.nx(),
                actual: x.len(),
            });
        }
        Ok(())
    }

    pub fn check_multipliers(&self, lams: &[DVector<f64>]) -> Result<()> {
        if lams.len() != self.constraints.len() {
            return Err(Error::MultiplierCount {
                expected: self.constraints.len(),
                actual: lams.len(),
            });
        }
        for (index, (lam, c)) in lams.iter().zip(&self.constraints).enumerate() {
            if lam.len() != c.nr() {
                return Err(Error::MultiplierShape {
                    index,
                    expected: c.nr(),
                    actual: lam.len(),
                });
            }
        }
        Ok(())
    }
}
