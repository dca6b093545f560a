//! Incremental solving of a [`Model`] with z3, under assumptions and resource limits.

use crate::model::{BVar, Label, Model, SavedAssignment};
use crate::params::Limits;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use z3::ast::Bool;
use z3::{Params, SatResult};

pub mod stats;

use stats::Stats;

/// Reason for which a solve call stopped before reaching a conclusion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Interrupt {
    Timeout,
    ResourceLimit,
    /// The solver gave up, e.g. on non-linear arithmetic it could not decide.
    Incomplete(String),
}

impl Interrupt {
    /// Classifies the reason reported by z3 for an `unknown` answer.
    pub fn from_reason(reason: &str) -> Interrupt {
        if reason.contains("resource") {
            Interrupt::ResourceLimit
        } else if reason.contains("timeout") || reason.contains("canceled") {
            Interrupt::Timeout
        } else {
            Interrupt::Incomplete(reason.to_string())
        }
    }
}

impl Display for Interrupt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Interrupt::Timeout => write!(f, "timeout"),
            Interrupt::ResourceLimit => write!(f, "resource limit reached"),
            Interrupt::Incomplete(reason) => write!(f, "incomplete: {reason}"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum SolveResult {
    Sat(Arc<SavedAssignment>),
    Unsat,
    Unknown(Interrupt),
}

impl SolveResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolveResult::Sat(_))
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, SolveResult::Unsat)
    }
}

pub struct Solver<'ctx, Lbl> {
    pub model: Model<'ctx, Lbl>,
    limits: Limits,
    z3: z3::Solver<'ctx>,
    /// Index of the first constraint of the model that has not been asserted yet.
    next_unposted_constraint: usize,
    pub stats: Stats,
}

impl<'ctx, Lbl: Label> Solver<'ctx, Lbl> {
    pub fn new(model: Model<'ctx, Lbl>) -> Self {
        let z3 = z3::Solver::new(model.context());
        let mut solver = Solver {
            model,
            limits: Limits::unlimited(),
            z3,
            next_unposted_constraint: 0,
            stats: Stats::default(),
        };
        solver.set_limits(Limits::default());
        solver
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.set_limits(limits);
        self
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Sets the limits of all later solve calls. A limit set to `None` lifts any previous one.
    pub fn set_limits(&mut self, limits: Limits) {
        let mut params = Params::new(self.model.context());
        // z3 reads u32::MAX as no timeout and 0 as no resource limit
        let timeout = limits
            .timeout
            .map_or(u32::MAX, |t| u32::try_from(t.as_millis()).unwrap_or(u32::MAX - 1).max(1));
        params.set_u32("timeout", timeout);
        params.set_u32("rlimit", limits.resource_limit.unwrap_or(0));
        self.z3.set_params(&params);
        self.limits = limits;
    }

    fn post_constraints(&mut self) {
        let constraints = self.model.constraints();
        for c in &constraints[self.next_unposted_constraint..] {
            self.z3.assert(c);
        }
        self.next_unposted_constraint = constraints.len();
        self.stats.num_constraints = constraints.len();
        self.stats.num_variables = self.model.num_variables();
    }

    /// Searches for a solution of the model.
    pub fn solve(&mut self) -> SolveResult {
        self.solve_with_assumptions(&[])
    }

    /// Searches for a solution in which all assumptions hold.
    ///
    /// Constraints added to the model since the previous call are asserted first. Assumptions
    /// only hold for this call, so that a later call may drop them.
    pub fn solve_with_assumptions(&mut self, assumptions: &[BVar]) -> SolveResult {
        let _span = tracing::debug_span!("solve", assumptions = assumptions.len()).entered();
        let start = Instant::now();
        self.post_constraints();
        let assumptions: Vec<Bool<'ctx>> = assumptions.iter().map(|&v| self.model.lit(v)).collect();
        self.stats.num_solves += 1;
        let result = match self.z3.check_assumptions(&assumptions) {
            SatResult::Sat => match self.z3.get_model() {
                Some(solution) => SolveResult::Sat(Arc::new(SavedAssignment::read(&self.model, &solution))),
                None => SolveResult::Unknown(Interrupt::Incomplete("no model produced".to_string())),
            },
            SatResult::Unsat => SolveResult::Unsat,
            SatResult::Unknown => {
                let reason = self.z3.get_reason_unknown().unwrap_or_default();
                SolveResult::Unknown(Interrupt::from_reason(&reason))
            }
        };
        if matches!(result, SolveResult::Unknown(_)) {
            self.stats.num_unknown += 1;
        }
        self.stats.solve_time += start.elapsed();
        tracing::debug!(
            constraints = self.stats.num_constraints,
            "solve result: {}",
            match &result {
                SolveResult::Sat(_) => "SAT".to_string(),
                SolveResult::Unsat => "UNSAT".to_string(),
                SolveResult::Unknown(i) => format!("UNKNOWN ({i})"),
            }
        );
        result
    }
}
