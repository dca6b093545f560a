//! Read-only view of a satisfying assignment, in terms of the planning problem.

use crate::error::{EncodingError, EntityKind};
use crate::problem::{ActionId, ActionKind, FluentId, GroundProblem, Instant, LitId};
use crate::vars::{Label, Phase, Variables};
use num_rational::Rational64;
use std::sync::Arc;
use strata::model::{BVar, RVar, SavedAssignment};

/// Start or end of an action at a given layer of the plan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Happening {
    pub layer: usize,
    pub time: Rational64,
    pub action: ActionId,
    pub instant: Instant,
}

#[derive(Clone)]
pub struct PlanModel {
    problem: Arc<GroundProblem>,
    vars: Variables,
    assignment: Arc<SavedAssignment>,
    horizon: usize,
}

impl PlanModel {
    pub(crate) fn new(
        problem: Arc<GroundProblem>,
        vars: Variables,
        assignment: Arc<SavedAssignment>,
        horizon: usize,
    ) -> Self {
        PlanModel {
            problem,
            vars,
            assignment,
            horizon,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn problem(&self) -> &GroundProblem {
        &self.problem
    }

    fn check_layer(&self, h: usize) -> Result<(), EncodingError> {
        if h <= self.horizon {
            Ok(())
        } else {
            Err(EncodingError::IndexOutOfRange {
                kind: EntityKind::Layer,
                index: h,
                size: self.horizon + 1,
            })
        }
    }

    fn real(&self, var: RVar, label: Label) -> Result<Rational64, EncodingError> {
        self.assignment
            .real_value(var)
            .ok_or_else(|| EncodingError::InexactValue(label.to_string()))
    }

    fn holds(&self, var: BVar) -> bool {
        self.assignment.bool_value(var).unwrap_or(false)
    }

    pub fn time(&self, h: usize) -> Result<Rational64, EncodingError> {
        self.check_layer(h)?;
        self.real(self.vars.time(h)?, Label::Time(h))
    }

    pub fn starts(&self, a: ActionId, h: usize) -> Result<bool, EncodingError> {
        self.check_layer(h)?;
        Ok(self.holds(self.vars.occurrence(a, h)?.start))
    }

    pub fn ends(&self, a: ActionId, h: usize) -> Result<bool, EncodingError> {
        self.check_layer(h)?;
        Ok(self.holds(self.vars.occurrence(a, h)?.end))
    }

    pub fn running(&self, a: ActionId, h: usize) -> Result<bool, EncodingError> {
        self.check_layer(h)?;
        Ok(self.vars.occurrence(a, h)?.running.is_some_and(|r| self.holds(r)))
    }

    /// Remaining duration of the action at the layer, zero for actions without duration.
    pub fn duration(&self, a: ActionId, h: usize) -> Result<Rational64, EncodingError> {
        self.check_layer(h)?;
        match self.vars.occurrence(a, h)?.duration {
            Some(d) => self.real(d, Label::Duration(a, h)),
            None => Ok(Rational64::from_integer(0)),
        }
    }

    pub fn literal(&self, l: LitId, h: usize, phase: Phase) -> Result<bool, EncodingError> {
        self.check_layer(h)?;
        Ok(self.holds(self.vars.literal(l, h, phase)?))
    }

    pub fn fluent(&self, f: FluentId, h: usize, phase: Phase) -> Result<Rational64, EncodingError> {
        self.check_layer(h)?;
        self.real(self.vars.fluent(f, h, phase)?, Label::Fluent(f, h, phase))
    }

    /// All starts and ends of actions, by increasing layer.
    /// Actions without duration only appear with their start.
    pub fn happenings(&self) -> Result<Vec<Happening>, EncodingError> {
        let mut happenings = Vec::new();
        for h in 0..self.horizon {
            let layer = self.vars.layer(h)?;
            let time = self.real(layer.time, Label::Time(h))?;
            for (a, action) in self.problem.actions.entries() {
                let occ = layer.occurrences[a];
                if self.holds(occ.start) {
                    happenings.push(Happening {
                        layer: h,
                        time,
                        action: a,
                        instant: Instant::Start,
                    });
                }
                if matches!(action.kind, ActionKind::Durative(_)) && self.holds(occ.end) {
                    happenings.push(Happening {
                        layer: h,
                        time,
                        action: a,
                        instant: Instant::End,
                    });
                }
            }
        }
        Ok(happenings)
    }
}
