//! Grounded planning problems: index space, syntax trees of conditions, expressions and effects.
//!
//! Problems are produced by an external grounder. Quantified constructs are already expanded
//! into their instances, and all references point into a flat [`IndexSpace`].

use crate::error::{EncodingError, EntityKind};
use num_rational::Rational64;
use std::fmt::{Debug, Formatter};
use strata::collections::ref_store::RefVec;
use strata::create_ref_type;

create_ref_type!(LitId);
create_ref_type!(FluentId);
create_ref_type!(ActionId);

impl Debug for LitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "l{}", self.to_u32())
    }
}
impl Debug for FluentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "f{}", self.to_u32())
    }
}
impl Debug for ActionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "a{}", self.to_u32())
    }
}

/// Sizes of the ground entities of a problem.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct IndexSpace {
    pub literals: usize,
    pub fluents: usize,
    pub actions: usize,
}

impl IndexSpace {
    pub fn literals(&self) -> impl Iterator<Item = LitId> {
        (0..self.literals).map(LitId::from)
    }
    pub fn fluents(&self) -> impl Iterator<Item = FluentId> {
        (0..self.fluents).map(FluentId::from)
    }
    pub fn actions(&self) -> impl Iterator<Item = ActionId> {
        (0..self.actions).map(ActionId::from)
    }

    pub fn check_literal(&self, l: LitId) -> Result<(), EncodingError> {
        check(EntityKind::Literal, usize::from(l), self.literals)
    }
    pub fn check_fluent(&self, f: FluentId) -> Result<(), EncodingError> {
        check(EntityKind::Fluent, usize::from(f), self.fluents)
    }
    pub fn check_action(&self, a: ActionId) -> Result<(), EncodingError> {
        check(EntityKind::Action, usize::from(a), self.actions)
    }
}

fn check(kind: EntityKind, index: usize, size: usize) -> Result<(), EncodingError> {
    if index < size {
        Ok(())
    } else {
        Err(EncodingError::IndexOutOfRange { kind, index, size })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CmpOp {
    Lt,
    Leq,
    Eq,
    Geq,
    Gt,
}

/// Temporal qualifier of a condition of a durative action.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TimeSpec {
    AtStart,
    AtEnd,
    OverAll,
}

/// Instant of a durative action at which an effect applies.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Instant {
    Start,
    End,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    True,
    False,
    Literal(LitId),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Imply(Box<Condition>, Box<Condition>),
    /// Expanded instances of a universally quantified condition.
    Forall(Vec<Condition>),
    /// Expanded instances of an existentially quantified condition.
    Exists(Vec<Condition>),
    Compare(CmpOp, Expr, Expr),
    Timed(TimeSpec, Box<Condition>),
}

impl Condition {
    pub fn lit(l: LitId) -> Self {
        Condition::Literal(l)
    }

    pub fn not(c: Condition) -> Self {
        Condition::Not(Box::new(c))
    }

    pub fn imply(a: Condition, b: Condition) -> Self {
        Condition::Imply(Box::new(a), Box::new(b))
    }

    pub fn compare(op: CmpOp, lhs: Expr, rhs: Expr) -> Self {
        Condition::Compare(op, lhs, rhs)
    }

    pub fn timed(spec: TimeSpec, c: Condition) -> Self {
        Condition::Timed(spec, Box::new(c))
    }
}

/// Arithmetic expressions over numeric fluents.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Const(Rational64),
    Fluent(FluentId),
    /// The duration of the enclosing durative action (`?duration`).
    Duration,
    Add(Vec<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Vec<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Const(Rational64::from_integer(value))
    }

    pub fn ratio(numer: i64, denom: i64) -> Self {
        Expr::Const(Rational64::new(numer, denom))
    }

    pub fn fluent(f: FluentId) -> Self {
        Expr::Fluent(f)
    }

    pub fn sub(a: Expr, b: Expr) -> Self {
        Expr::Sub(Box::new(a), Box::new(b))
    }

    pub fn div(a: Expr, b: Expr) -> Self {
        Expr::Div(Box::new(a), Box::new(b))
    }

    /// All fluents read by the expression.
    pub fn fluents(&self) -> Vec<FluentId> {
        let mut fluents = Vec::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            match e {
                Expr::Const(_) | Expr::Duration => {}
                Expr::Fluent(f) => fluents.push(*f),
                Expr::Add(es) | Expr::Mul(es) => stack.extend(es),
                Expr::Sub(a, b) | Expr::Div(a, b) => stack.extend([a.as_ref(), b.as_ref()]),
                Expr::Neg(a) => stack.push(a),
            }
        }
        fluents
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AssignOp {
    Assign,
    Increase,
    Decrease,
    ScaleUp,
    ScaleDown,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FlowDir {
    Increase,
    Decrease,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Add(LitId),
    Delete(LitId),
    Assign(AssignOp, FluentId, Expr),
    /// Conditional effect, whose guard is evaluated in the state preceding the effect.
    When(Condition, Vec<Effect>),
    /// Expanded instances of a universally quantified effect.
    Forall(Vec<Effect>),
    Timed(Instant, Vec<Effect>),
    /// Continuous change of a fluent while a durative action runs, at the given rate per time unit.
    Continuous(FlowDir, FluentId, Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DurationConstraint {
    Fixed(Expr),
    Bounded { min: Expr, max: Expr },
    /// Arbitrary constraint on the duration, referenced as [`Expr::Duration`].
    Constrained(Condition),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ActionKind {
    Instantaneous,
    Durative(DurationConstraint),
    /// A timed initial literal: happens exactly once, at the given absolute time.
    Timed(Rational64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroundAction {
    pub name: String,
    pub kind: ActionKind,
    pub condition: Condition,
    pub effects: Vec<Effect>,
}

impl GroundAction {
    pub fn instantaneous(name: impl Into<String>, condition: Condition, effects: Vec<Effect>) -> Self {
        GroundAction {
            name: name.into(),
            kind: ActionKind::Instantaneous,
            condition,
            effects,
        }
    }

    pub fn durative(
        name: impl Into<String>,
        duration: DurationConstraint,
        condition: Condition,
        effects: Vec<Effect>,
    ) -> Self {
        GroundAction {
            name: name.into(),
            kind: ActionKind::Durative(duration),
            condition,
            effects,
        }
    }

    pub fn timed_literal(name: impl Into<String>, at: Rational64, effects: Vec<Effect>) -> Self {
        GroundAction {
            name: name.into(),
            kind: ActionKind::Timed(at),
            condition: Condition::True,
            effects,
        }
    }

    pub fn is_durative(&self) -> bool {
        matches!(self.kind, ActionKind::Durative(_))
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct InitialState {
    /// Literals that are true in the initial state, all others being false.
    pub literals: Vec<LitId>,
    pub fluents: Vec<(FluentId, Rational64)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroundProblem {
    pub space: IndexSpace,
    pub literal_names: RefVec<LitId, String>,
    pub fluent_names: RefVec<FluentId, String>,
    pub actions: RefVec<ActionId, GroundAction>,
    pub init: InitialState,
    pub goal: Condition,
}

/// Split of the condition of a durative action by temporal qualifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimedConditions {
    pub at_start: Vec<Condition>,
    pub at_end: Vec<Condition>,
    pub over_all: Vec<Condition>,
}

impl TimedConditions {
    /// Untimed conditions are interpreted as holding at start.
    pub fn split(condition: &Condition) -> TimedConditions {
        let mut split = TimedConditions::default();
        split.add(condition);
        split
    }

    fn add(&mut self, condition: &Condition) {
        match condition {
            Condition::True => {}
            Condition::And(cs) | Condition::Forall(cs) => cs.iter().for_each(|c| self.add(c)),
            Condition::Timed(TimeSpec::AtStart, c) => self.at_start.push(c.as_ref().clone()),
            Condition::Timed(TimeSpec::AtEnd, c) => self.at_end.push(c.as_ref().clone()),
            Condition::Timed(TimeSpec::OverAll, c) => self.over_all.push(c.as_ref().clone()),
            c => self.at_start.push(c.clone()),
        }
    }
}

impl GroundProblem {
    pub fn literal_name(&self, l: LitId) -> &str {
        self.literal_names.get(l).map(|s| s.as_str()).unwrap_or("?")
    }

    pub fn fluent_name(&self, f: FluentId) -> &str {
        self.fluent_names.get(f).map(|s| s.as_str()).unwrap_or("?")
    }

    pub fn action_name(&self, a: ActionId) -> &str {
        self.actions.get(a).map(|act| act.name.as_str()).unwrap_or("?")
    }

    /// Checks that the problem is consistent with its index space and that all constructs appear
    /// where they can be encoded.
    pub fn validate(&self) -> Result<(), EncodingError> {
        let mismatch = |what: &str, actual: usize, expected: usize| {
            if actual != expected {
                Err(EncodingError::IndexSpaceMismatch(format!(
                    "{actual} {what} declared for an index space of {expected}"
                )))
            } else {
                Ok(())
            }
        };
        mismatch("literal names", self.literal_names.len(), self.space.literals)?;
        mismatch("fluent names", self.fluent_names.len(), self.space.fluents)?;
        mismatch("actions", self.actions.len(), self.space.actions)?;

        for action in self.actions.values() {
            self.validate_action(action)?;
        }

        self.check_condition(&self.goal, "the goal")?;
        for &l in &self.init.literals {
            self.space.check_literal(l)?;
        }
        let mut initialized = RefVec::with_values(self.space.fluents, false);
        for &(f, _) in &self.init.fluents {
            self.space.check_fluent(f)?;
            initialized[f] = true;
        }
        for f in self.space.fluents() {
            if !initialized[f] {
                return Err(EncodingError::UndefinedFluent(self.fluent_name(f).to_string()));
            }
        }
        Ok(())
    }

    fn validate_action(&self, action: &GroundAction) -> Result<(), EncodingError> {
        let context = format!("action `{}`", action.name);
        match &action.kind {
            ActionKind::Durative(duration) => {
                let split = TimedConditions::split(&action.condition);
                for c in split.at_start.iter().chain(&split.at_end).chain(&split.over_all) {
                    self.check_condition(c, &context)?;
                }
                match duration {
                    DurationConstraint::Fixed(e) => {
                        self.check_expr(e, &context)?;
                        if let Expr::Const(d) = e {
                            if *d < Rational64::from_integer(0) {
                                return Err(EncodingError::MalformedDuration {
                                    action: action.name.clone(),
                                    reason: format!("negative duration {d}"),
                                });
                            }
                        }
                    }
                    DurationConstraint::Bounded { min, max } => {
                        self.check_expr(min, &context)?;
                        self.check_expr(max, &context)?;
                        if let (Expr::Const(min), Expr::Const(max)) = (min, max) {
                            if min > max {
                                return Err(EncodingError::MalformedDuration {
                                    action: action.name.clone(),
                                    reason: format!("minimal duration {min} exceeds maximal duration {max}"),
                                });
                            }
                        }
                    }
                    DurationConstraint::Constrained(c) => self.check_condition(c, &context)?,
                }
                for e in &action.effects {
                    self.check_durative_effect(e, &context)?;
                }
            }
            ActionKind::Instantaneous | ActionKind::Timed(_) => {
                self.check_condition(&action.condition, &context)?;
                for e in &action.effects {
                    self.check_effect(e, &context)?;
                }
                if let ActionKind::Timed(at) = action.kind {
                    if at < Rational64::from_integer(0) {
                        return Err(EncodingError::Unsupported(format!(
                            "timed literal `{}` scheduled before time zero",
                            action.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Top-level effect of a durative action: must be timed, continuous or a quantification over such effects.
    fn check_durative_effect(&self, effect: &Effect, context: &str) -> Result<(), EncodingError> {
        match effect {
            Effect::Timed(_, effs) => effs.iter().try_for_each(|e| self.check_effect(e, context)),
            Effect::Forall(effs) => effs.iter().try_for_each(|e| self.check_durative_effect(e, context)),
            Effect::Continuous(_, f, rate) => {
                self.space.check_fluent(*f)?;
                self.check_expr(rate, context)
            }
            _ => Err(EncodingError::ModeMismatch {
                context: context.to_string(),
                node: "an effect without instant",
            }),
        }
    }

    /// Discrete effect, happening at a single instant.
    fn check_effect(&self, effect: &Effect, context: &str) -> Result<(), EncodingError> {
        match effect {
            Effect::Add(l) | Effect::Delete(l) => self.space.check_literal(*l),
            Effect::Assign(_, f, e) => {
                self.space.check_fluent(*f)?;
                self.check_expr(e, context)
            }
            Effect::When(c, effs) => {
                self.check_condition(c, context)?;
                effs.iter().try_for_each(|e| self.check_effect(e, context))
            }
            Effect::Forall(effs) => effs.iter().try_for_each(|e| self.check_effect(e, context)),
            Effect::Timed(_, _) => Err(EncodingError::ModeMismatch {
                context: context.to_string(),
                node: "a timed effect",
            }),
            Effect::Continuous(_, _, _) => Err(EncodingError::ModeMismatch {
                context: context.to_string(),
                node: "a continuous effect",
            }),
        }
    }

    fn check_condition(&self, condition: &Condition, context: &str) -> Result<(), EncodingError> {
        match condition {
            Condition::True | Condition::False => Ok(()),
            Condition::Literal(l) => self.space.check_literal(*l),
            Condition::Not(c) => self.check_condition(c, context),
            Condition::And(cs) | Condition::Or(cs) | Condition::Forall(cs) | Condition::Exists(cs) => {
                cs.iter().try_for_each(|c| self.check_condition(c, context))
            }
            Condition::Imply(a, b) => {
                self.check_condition(a, context)?;
                self.check_condition(b, context)
            }
            Condition::Compare(_, a, b) => {
                self.check_expr(a, context)?;
                self.check_expr(b, context)
            }
            Condition::Timed(_, _) => Err(EncodingError::ModeMismatch {
                context: context.to_string(),
                node: "a nested timed condition",
            }),
        }
    }

    fn check_expr(&self, expr: &Expr, context: &str) -> Result<(), EncodingError> {
        match expr {
            Expr::Const(_) | Expr::Duration => Ok(()),
            Expr::Fluent(f) => self.space.check_fluent(*f),
            Expr::Add(es) | Expr::Mul(es) => es.iter().try_for_each(|e| self.check_expr(e, context)),
            Expr::Sub(a, b) | Expr::Div(a, b) => {
                self.check_expr(a, context)?;
                self.check_expr(b, context)
            }
            Expr::Neg(e) => self.check_expr(e, context),
        }
    }
}

/// Incremental construction of a [`GroundProblem`], used by grounders and tests.
#[derive(Clone, Debug, Default)]
pub struct ProblemBuilder {
    literal_names: RefVec<LitId, String>,
    fluent_names: RefVec<FluentId, String>,
    actions: RefVec<ActionId, GroundAction>,
    init: InitialState,
    goal: Vec<Condition>,
}

impl ProblemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn literal(&mut self, name: impl Into<String>) -> LitId {
        self.literal_names.push(name.into())
    }

    pub fn fluent(&mut self, name: impl Into<String>, initial_value: Rational64) -> FluentId {
        let f = self.fluent_names.push(name.into());
        self.init.fluents.push((f, initial_value));
        f
    }

    /// Declares a fluent without initial value.
    pub fn undefined_fluent(&mut self, name: impl Into<String>) -> FluentId {
        self.fluent_names.push(name.into())
    }

    pub fn action(&mut self, action: GroundAction) -> ActionId {
        self.actions.push(action)
    }

    pub fn initially(&mut self, l: LitId) -> &mut Self {
        self.init.literals.push(l);
        self
    }

    pub fn goal(&mut self, c: Condition) -> &mut Self {
        self.goal.push(c);
        self
    }

    pub fn build(self) -> GroundProblem {
        GroundProblem {
            space: IndexSpace {
                literals: self.literal_names.len(),
                fluents: self.fluent_names.len(),
                actions: self.actions.len(),
            },
            literal_names: self.literal_names,
            fluent_names: self.fluent_names,
            actions: self.actions,
            init: self.init,
            goal: Condition::And(self.goal),
        }
    }
}
