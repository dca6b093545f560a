//! Persistent solving context shared by the successive horizons of an encoder.

use crate::error::EncodingError;
use crate::vars::{Label, Variables};
use hashbrown::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use strata::model::{BVar, Model, SavedAssignment};
use strata::params::Limits;
use strata::solver::stats::Stats;
use strata::solver::{Interrupt, SolveResult, Solver};
use z3::Context;

/// Why the solver could not decide the satisfiability of a formula.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum UnknownReason {
    Timeout,
    ResourceLimit,
    /// The solver gave up, typically on non-linear arithmetic.
    Incomplete(String),
}

impl From<Interrupt> for UnknownReason {
    fn from(i: Interrupt) -> Self {
        match i {
            Interrupt::Timeout => UnknownReason::Timeout,
            Interrupt::ResourceLimit => UnknownReason::ResourceLimit,
            Interrupt::Incomplete(reason) => UnknownReason::Incomplete(reason),
        }
    }
}

impl Display for UnknownReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnknownReason::Timeout => write!(f, "timeout"),
            UnknownReason::ResourceLimit => write!(f, "resource limit"),
            UnknownReason::Incomplete(reason) => write!(f, "incomplete: {reason}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum SolveOutcome {
    Satisfiable,
    Unsatisfiable,
    Unknown(UnknownReason),
}

impl Display for SolveOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveOutcome::Satisfiable => write!(f, "SAT"),
            SolveOutcome::Unsatisfiable => write!(f, "UNSAT"),
            SolveOutcome::Unknown(reason) => write!(f, "UNKNOWN ({reason})"),
        }
    }
}

/// Owns the solver together with the variables of all encoded layers.
///
/// Constraints of the layers are permanent. The constraints specific to a bound (closing layer and goal)
/// are only enforced under the activation literal of this bound, which is assumed when solving.
pub struct SolverSession<'ctx> {
    pub(crate) solver: Solver<'ctx, Label>,
    pub(crate) vars: Variables,
    /// Number of layers whose constraints have been posted.
    pub(crate) encoded_layers: usize,
    activations: HashMap<usize, BVar>,
    horizon: Option<usize>,
    assignment: Option<Arc<SavedAssignment>>,
}

impl<'ctx> SolverSession<'ctx> {
    pub fn new(ctx: &'ctx Context, limits: Limits, max_horizon: usize) -> Self {
        SolverSession {
            solver: Solver::new(Model::new(ctx)).with_limits(limits),
            vars: Variables::new(max_horizon),
            encoded_layers: 0,
            activations: HashMap::new(),
            horizon: None,
            assignment: None,
        }
    }

    pub fn model(&mut self) -> &mut Model<'ctx, Label> {
        &mut self.solver.model
    }

    /// Number of constraints posted so far, over all layers and bounds.
    pub fn num_constraints(&self) -> usize {
        self.solver.model.constraints().len()
    }

    /// Limits of the next solve calls.
    pub fn set_limits(&mut self, limits: Limits) {
        self.solver.set_limits(limits);
    }

    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    /// The bound targeted by the next solve call.
    pub fn horizon(&self) -> Option<usize> {
        self.horizon
    }

    /// Activation literal of a bound, if its closing constraints were already posted.
    pub fn activation(&self, horizon: usize) -> Option<BVar> {
        self.activations.get(&horizon).copied()
    }

    pub(crate) fn new_activation(&mut self, horizon: usize) -> BVar {
        let var = self.solver.model.new_bvar(Label::Activation(horizon));
        self.activations.insert(horizon, var);
        var
    }

    pub(crate) fn set_horizon(&mut self, horizon: usize) {
        self.horizon = Some(horizon);
        self.assignment = None;
    }

    /// Checks the satisfiability of the formula of the current bound.
    pub fn solve(&mut self) -> Result<SolveOutcome, EncodingError> {
        let horizon = self.horizon.ok_or(EncodingError::NotEncoded)?;
        let activation = self.activation(horizon).ok_or(EncodingError::NotEncoded)?;
        let outcome = match self.solver.solve_with_assumptions(&[activation]) {
            SolveResult::Sat(assignment) => {
                self.assignment = Some(assignment);
                SolveOutcome::Satisfiable
            }
            SolveResult::Unsat => {
                self.assignment = None;
                SolveOutcome::Unsatisfiable
            }
            SolveResult::Unknown(interrupt) => {
                self.assignment = None;
                SolveOutcome::Unknown(interrupt.into())
            }
        };
        tracing::debug!(
            horizon,
            %outcome,
            variables = self.solver.stats.num_variables,
            constraints = self.solver.stats.num_constraints
        );
        Ok(outcome)
    }

    pub fn stats(&self) -> &Stats {
        &self.solver.stats
    }

    /// Assignment found by the last solve call, if it was satisfiable.
    pub fn assignment(&self) -> Option<&Arc<SavedAssignment>> {
        self.assignment.as_ref()
    }
}
