//! Encoding of a ground problem into constraints, layer by layer.

use crate::effects::{EffectId, EffectIndex, EffectKind};
use crate::error::EncodingError;
use crate::numeric::Term;
use crate::params::EncoderConfig;
use crate::plan::PlanModel;
use crate::problem::*;
use crate::session::{SolveOutcome, SolverSession};
use crate::translate::{Mode, Translator};
use crate::vars::{Label, OccurrenceVars, Phase, Variables};
use num_rational::Rational64;
use num_traits::Zero;
use std::sync::Arc;
use strata::collections::ref_store::RefVec;
use strata::model::{BVar, Model, RVar};
use strata::params::Limits;
use z3::ast::{Ast, Bool, Real};
use z3::Context;

/// Builds and solves the formula of a ground problem for a given horizon.
///
/// Successive calls to [`Encoder::encode`] with increasing horizons extend the same formula:
/// only the new layers are encoded, and the constraints that only hold for a particular horizon
/// (closing layer and goal) are enforced under an activation literal that is assumed when solving.
pub struct Encoder<'ctx> {
    ctx: &'ctx Context,
    problem: Arc<GroundProblem>,
    effects: Arc<EffectIndex>,
    config: EncoderConfig,
    session: Option<SolverSession<'ctx>>,
}

impl<'ctx> Encoder<'ctx> {
    pub fn new(ctx: &'ctx Context, problem: GroundProblem, config: EncoderConfig) -> Result<Self, EncodingError> {
        problem.validate()?;
        let effects = EffectIndex::build(&problem)?;
        Self::with_shared(ctx, Arc::new(problem), Arc::new(effects), config)
    }

    /// Creates an encoder reusing an already validated problem and its effect index,
    /// e.g., to encode several horizons in parallel.
    pub fn with_shared(
        ctx: &'ctx Context,
        problem: Arc<GroundProblem>,
        effects: Arc<EffectIndex>,
        config: EncoderConfig,
    ) -> Result<Self, EncodingError> {
        if effects.space() != problem.space {
            return Err(EncodingError::IndexSpaceMismatch(format!(
                "effect index built for {:?}, problem has {:?}",
                effects.space(),
                problem.space
            )));
        }
        config.validate()?;
        Ok(Encoder {
            ctx,
            problem,
            effects,
            config,
            session: None,
        })
    }

    pub fn problem(&self) -> &Arc<GroundProblem> {
        &self.problem
    }

    pub fn effects(&self) -> &Arc<EffectIndex> {
        &self.effects
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Limits of the next solve calls, including those on an already encoded formula.
    pub fn set_limits(&mut self, limits: Limits) {
        self.config.timeout = limits.timeout;
        self.config.resource_limit = limits.resource_limit;
        if let Some(session) = self.session.as_mut() {
            session.set_limits(limits);
        }
    }

    /// Horizon of the last successful call to [`Encoder::encode`].
    pub fn horizon(&self) -> Option<usize> {
        self.session.as_ref().and_then(|s| s.horizon())
    }

    pub fn session(&self) -> Option<&SolverSession<'ctx>> {
        self.session.as_ref()
    }

    /// Builds the formula for the given horizon: layers `0..=horizon`, with the goal on the last one.
    ///
    /// Fails on structural errors only, never because the formula is unsatisfiable.
    /// On failure, the partial encoding is discarded.
    pub fn encode(&mut self, horizon: usize) -> Result<(), EncodingError> {
        let span = tracing::span!(tracing::Level::DEBUG, "ENCODING", horizon);
        let _span = span.enter();
        if horizon > self.config.max_horizon {
            return Err(EncodingError::HorizonCeiling {
                horizon,
                ceiling: self.config.max_horizon,
            });
        }
        let mut session = match self.session.take() {
            Some(session) if session.encoded_layers <= horizon + 1 => session,
            previous => {
                if previous.is_some() {
                    tracing::debug!("horizon lower than the encoded layers, rebuilding from scratch");
                }
                SolverSession::new(self.ctx, self.config.limits(), self.config.max_horizon)
            }
        };
        match self.extend(&mut session, horizon) {
            Ok(()) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                tracing::debug!("encoding failed: {e}");
                Err(e)
            }
        }
    }

    fn extend(&self, session: &mut SolverSession<'ctx>, horizon: usize) -> Result<(), EncodingError> {
        let num_constraints = session.num_constraints();
        let new_layers = session
            .vars
            .allocate(&mut session.solver.model, &self.problem, &self.effects, horizon)?;
        tracing::debug!("#new layers: {}", new_layers.len());

        // the closing constraints of a bound are posted once, on its first encoding
        let activation = match session.activation(horizon) {
            Some(_) => None,
            None => Some(session.new_activation(horizon)),
        };
        let first = session.encoded_layers;
        let mut layers = LayerEncoder {
            problem: &self.problem,
            effects: &self.effects,
            vars: &session.vars,
            model: &mut session.solver.model,
        };
        for h in first..=horizon {
            layers.encode_layer(h)?;
        }
        if let Some(activation) = activation {
            layers.closing(horizon, activation)?;
        }
        session.encoded_layers = session.encoded_layers.max(horizon + 1);
        session.set_horizon(horizon);

        let num_constraints = session.num_constraints() - num_constraints;
        let num_variables = session.solver.model.num_variables();
        tracing::debug!(%num_constraints, %num_variables);
        Ok(())
    }

    /// Checks whether a plan exists for the last encoded horizon.
    pub fn solve(&mut self) -> Result<SolveOutcome, EncodingError> {
        let span = tracing::span!(tracing::Level::DEBUG, "SOLVING");
        let _span = span.enter();
        self.session.as_mut().ok_or(EncodingError::NotEncoded)?.solve()
    }

    /// Values of the plan found by the last call to [`Encoder::solve`], if it was satisfiable.
    pub fn plan_model(&self) -> Option<PlanModel> {
        let session = self.session.as_ref()?;
        let assignment = session.assignment()?;
        Some(PlanModel::new(
            self.problem.clone(),
            session.variables().clone(),
            assignment.clone(),
            session.horizon()?,
        ))
    }

    /// Translates a condition in the current encoding, returning a formula that holds iff the condition holds.
    pub fn translate_condition(&self, cond: &Condition, mode: Mode) -> Result<Bool<'ctx>, EncodingError> {
        let session = self.session.as_ref().ok_or(EncodingError::NotEncoded)?;
        Translator::new(&session.solver.model, &session.vars).condition(cond, mode)
    }
}

/// Posts the constraints of individual layers.
struct LayerEncoder<'a, 'ctx> {
    problem: &'a GroundProblem,
    effects: &'a EffectIndex,
    vars: &'a Variables,
    model: &'a mut Model<'ctx, Label>,
}

impl<'ctx> LayerEncoder<'_, 'ctx> {
    fn translator(&self) -> Translator<'_, 'ctx> {
        Translator::new(&*self.model, self.vars)
    }

    fn lit(&self, var: BVar) -> Bool<'ctx> {
        self.model.lit(var)
    }

    /// A literal that is false when there is no variable.
    fn opt_lit(&self, var: Option<BVar>) -> Bool<'ctx> {
        match var {
            Some(var) => self.model.lit(var),
            None => self.model.constant(false),
        }
    }

    fn real(&self, var: RVar) -> Real<'ctx> {
        self.model.real(var)
    }

    fn constant(&self, value: Rational64) -> Result<Real<'ctx>, EncodingError> {
        Term::Const(value).into_real(&*self.model)
    }

    fn zero(&self) -> Result<Real<'ctx>, EncodingError> {
        self.constant(Rational64::zero())
    }

    /// Time elapsed between the previous layer and layer `h`, zero for the first one.
    fn elapsed(&self, h: usize) -> Result<Real<'ctx>, EncodingError> {
        match self.vars.elapsed(h)? {
            Some(e) => Ok(self.real(e)),
            None => self.zero(),
        }
    }

    fn remaining(&self, a: ActionId, occ: &OccurrenceVars) -> Result<Real<'ctx>, EncodingError> {
        match occ.duration {
            Some(d) => Ok(self.real(d)),
            None => Err(EncodingError::MalformedDuration {
                action: self.problem.action_name(a).to_string(),
                reason: "no duration variable for a durative action".to_string(),
            }),
        }
    }

    /// Enforces `a = b` whenever all literals of the scope hold.
    fn enforce_eq(&mut self, a: &Real<'ctx>, b: &Real<'ctx>, scope: &[Bool<'ctx>]) {
        self.model.enforce(a._eq(b), scope);
    }

    /// Permanent constraints of layer `h`, valid for any horizon `>= h`.
    fn encode_layer(&mut self, h: usize) -> Result<(), EncodingError> {
        let problem = self.problem;
        let span = tracing::span!(tracing::Level::TRACE, "layer", h);
        let _span = span.enter();
        let start = self.model.constraints().len();
        if h == 0 {
            self.initial_state()?;
        } else {
            self.timing(h)?;
        }
        for (a, action) in problem.actions.entries() {
            let occ = self.vars.occurrence(a, h)?;
            match &action.kind {
                ActionKind::Instantaneous => {
                    let cond = self.translator().condition(&action.condition, pre(h))?;
                    let start = self.lit(occ.start);
                    self.model.enforce(cond, &[start]);
                }
                ActionKind::Timed(at) => self.timed_literal(a, h, occ, *at, &action.condition)?,
                ActionKind::Durative(duration) => self.durative(a, h, occ, duration, &action.condition)?,
            }
        }
        let triggers = self.triggers(h)?;
        self.literal_support(h, &triggers)?;
        if h > 0 {
            self.flows(h)?;
        }
        self.fluent_support(h, &triggers)?;
        tracing::trace!(num_constraints = self.model.constraints().len() - start);
        Ok(())
    }

    fn initial_state(&mut self) -> Result<(), EncodingError> {
        let problem = self.problem;
        let time = self.real(self.vars.time(0)?);
        let zero = self.zero()?;
        self.enforce_eq(&time, &zero, &[]);

        let mut initially_true = RefVec::with_values(problem.space.literals, false);
        for &l in &problem.init.literals {
            initially_true[l] = true;
        }
        for l in problem.space.literals() {
            let lit = self.lit(self.vars.literal(l, 0, Phase::Pre)?);
            let value = if initially_true[l] { lit } else { self.model.not(&lit) };
            self.model.enforce(value, &[]);
        }
        for &(f, value) in &problem.init.fluents {
            let var = self.real(self.vars.fluent(f, 0, Phase::Pre)?);
            let value = self.constant(value).map_err(|_| {
                EncodingError::NumericRange(format!("initial value {value} of fluent `{}`", problem.fluent_name(f)))
            })?;
            self.enforce_eq(&var, &value, &[]);
        }
        Ok(())
    }

    /// `time(h) = time(h-1) + elapsed(h)` with a non-negative `elapsed(h)`.
    fn timing(&mut self, h: usize) -> Result<(), EncodingError> {
        let time = self.real(self.vars.time(h)?);
        let prev = self.real(self.vars.time(h - 1)?);
        let elapsed = self.elapsed(h)?;
        let zero = self.zero()?;
        let next = Real::add(self.model.context(), &[&prev, &elapsed]);
        self.enforce_eq(&time, &next, &[]);
        self.model.enforce(elapsed.ge(&zero), &[]);
        Ok(())
    }

    fn timed_literal(
        &mut self,
        a: ActionId,
        h: usize,
        occ: OccurrenceVars,
        at: Rational64,
        condition: &Condition,
    ) -> Result<(), EncodingError> {
        let fired_before = self.opt_lit(self.vars.running_before(a, h)?);
        let start = self.lit(occ.start);
        let fired = self.opt_lit(occ.running);
        let time = self.real(self.vars.time(h)?);
        let at = self.constant(at)?;

        let fired_now = self.model.or(&[fired_before.clone(), start.clone()]);
        self.model.bind(fired_now, &fired);
        let once = self.model.not(&fired_before);
        self.model.enforce(once, &[start.clone()]);
        self.model.enforce(time._eq(&at), &[start.clone()]);
        let not_yet_due = self.model.or(&[time.le(&at), fired_before]);
        self.model.enforce(not_yet_due, &[]);

        let cond = self.translator().condition(condition, pre(h))?;
        self.model.enforce(cond, &[start]);
        Ok(())
    }

    fn durative(
        &mut self,
        a: ActionId,
        h: usize,
        occ: OccurrenceVars,
        duration: &DurationConstraint,
        condition: &Condition,
    ) -> Result<(), EncodingError> {
        let running_before = self.opt_lit(self.vars.running_before(a, h)?);
        let idle_before = self.model.not(&running_before);
        let (start, end) = (self.lit(occ.start), self.lit(occ.end));
        let running = self.opt_lit(occ.running);

        // running over (h, h+1) iff started now or running before, and not ending now
        let started = self.model.or(&[start.clone(), running_before.clone()]);
        let not_ending = self.model.not(&end);
        let running_after = self.model.and(&[started, not_ending]);
        self.model.bind(running_after, &running);
        self.model.enforce(running_before.clone(), &[end.clone()]);
        self.model.enforce(idle_before.clone(), &[start.clone()]);

        // remaining duration
        let remaining = self.remaining(a, &occ)?;
        let zero = self.zero()?;
        self.model.enforce(remaining.ge(&zero), &[]);
        self.duration(a, h, &start, &remaining, duration)?;
        if h > 0 {
            let previous = self.remaining(a, &self.vars.occurrence(a, h - 1)?)?;
            let elapsed = self.elapsed(h)?;
            let decreased = Real::sub(self.model.context(), &[&previous, &elapsed]);
            self.enforce_eq(&remaining, &decreased, &[running_before.clone()]);
        }
        let not_starting = self.model.not(&start);
        self.enforce_eq(&remaining, &zero, &[end.clone()]);
        self.enforce_eq(&remaining, &zero, &[not_starting, idle_before]);

        let conditions = TimedConditions::split(condition);
        for c in &conditions.at_start {
            let cond = self.translator().condition(c, pre(h))?;
            self.model.enforce(cond, &[start.clone()]);
        }
        for c in &conditions.at_end {
            let cond = self.translator().condition(c, pre(h))?;
            self.model.enforce(cond, &[end.clone()]);
        }
        for c in &conditions.over_all {
            let after = self.translator().condition(c, Mode::Condition { layer: h, phase: Phase::Post })?;
            self.model.enforce(after, &[running.clone()]);
            if h > 0 {
                let before = self.translator().condition(c, pre(h))?;
                self.model.enforce(before, &[running_before.clone()]);
            }
        }
        Ok(())
    }

    /// Constraint on the total duration, placed on the remaining duration at the start layer.
    fn duration(
        &mut self,
        a: ActionId,
        h: usize,
        start: &Bool<'ctx>,
        remaining: &Real<'ctx>,
        constraint: &DurationConstraint,
    ) -> Result<(), EncodingError> {
        let problem = self.problem;
        let mode = Mode::Duration { action: a, layer: h };
        let malformed = |reason: String| EncodingError::MalformedDuration {
            action: problem.action_name(a).to_string(),
            reason,
        };
        let scope = [start.clone()];
        match constraint {
            DurationConstraint::Fixed(e) => {
                let value = self.translator().expr(e, mode)?;
                if let Some(c) = value.as_constant() {
                    if c < Rational64::zero() {
                        return Err(malformed(format!("negative duration {c}")));
                    }
                }
                let value = value.into_real(&*self.model)?;
                self.enforce_eq(remaining, &value, &scope);
            }
            DurationConstraint::Bounded { min, max } => {
                let min = self.translator().expr(min, mode)?;
                let max = self.translator().expr(max, mode)?;
                if let (Some(lo), Some(hi)) = (min.as_constant(), max.as_constant()) {
                    if lo > hi {
                        return Err(malformed(format!("minimal duration {lo} exceeds maximal duration {hi}")));
                    }
                }
                let min = min.into_real(&*self.model)?;
                let max = max.into_real(&*self.model)?;
                self.model.enforce(min.le(remaining), &scope);
                self.model.enforce(remaining.le(&max), &scope);
            }
            DurationConstraint::Constrained(c) => {
                let cond = self.translator().condition(c, mode)?;
                self.model.enforce(cond, &scope);
            }
        }
        Ok(())
    }

    /// For each discrete effect, a formula that holds iff the effect applies at layer `h`.
    fn triggers(&mut self, h: usize) -> Result<RefVec<EffectId, Bool<'ctx>>, EncodingError> {
        let effects = self.effects;
        let mut triggers = RefVec::new();
        for (_, record) in effects.effects() {
            let trigger = match record.kind {
                EffectKind::Flow { .. } => self.model.constant(false),
                _ => {
                    let occ = self.vars.occurrence(record.action, h)?;
                    let happening = match record.instant {
                        Instant::Start => self.lit(occ.start),
                        Instant::End => self.lit(occ.end),
                    };
                    let guard = self.translator().condition(&record.guard, Mode::Effect { layer: h })?;
                    self.model.and(&[happening, guard])
                }
            };
            triggers.push(trigger);
        }
        Ok(triggers)
    }

    /// `post(l) <=> add(l) | (pre(l) & !del(l))` for every literal touched by an effect.
    fn literal_support(&mut self, h: usize, triggers: &RefVec<EffectId, Bool<'ctx>>) -> Result<(), EncodingError> {
        let (problem, effects) = (self.problem, self.effects);
        for l in problem.space.literals() {
            if !effects.touches_literal(l) {
                continue;
            }
            let added: Vec<Bool> = effects.adders(l).iter().map(|&e| triggers[e].clone()).collect();
            let deleted: Vec<Bool> = effects.deleters(l).iter().map(|&e| triggers[e].clone()).collect();
            let add = self.model.or(&added);
            let kept_if = self.model.or(&deleted);
            let kept_if = self.model.not(&kept_if);
            let pre = self.lit(self.vars.literal(l, h, Phase::Pre)?);
            let post = self.lit(self.vars.literal(l, h, Phase::Post)?);
            let kept = self.model.and(&[pre, kept_if]);
            let supported = self.model.or(&[add, kept]);
            self.model.bind(supported, &post);
        }
        Ok(())
    }

    /// Continuous change of fluents over the interval `(h-1, h)`.
    ///
    /// A rate is read in the state at the beginning of the interval. It may depend on fluents that
    /// do not change continuously, and is then constant over the interval.
    fn flows(&mut self, h: usize) -> Result<(), EncodingError> {
        let (problem, effects) = (self.problem, self.effects);
        let elapsed = Term::Var(self.elapsed(h)?);
        let zero = self.zero()?;
        let interval_start = Mode::Condition {
            layer: h - 1,
            phase: Phase::Post,
        };
        for f in problem.space.fluents() {
            let flows = effects.flows(f);
            if flows.is_empty() {
                continue;
            }
            let pre = self.real(self.vars.fluent(f, h, Phase::Pre)?);
            let mut terms = vec![self.real(self.vars.fluent(f, h - 1, Phase::Post)?)];
            for &e in flows {
                let record = effects.effect(e);
                let EffectKind::Flow { rate, .. } = &record.kind else {
                    continue;
                };
                if let Some(g) = rate.fluents().into_iter().find(|g| !effects.flows(*g).is_empty()) {
                    return Err(EncodingError::Unsupported(format!(
                        "rate of a continuous change of `{}` depends on `{}`, which changes continuously",
                        problem.fluent_name(f),
                        problem.fluent_name(g)
                    )));
                }
                let rate = self.translator().expr(rate, interval_start)?;
                let change = rate.times(elapsed.clone(), &*self.model)?.into_real(&*self.model)?;
                let running = self.opt_lit(self.vars.running_before(record.action, h)?);
                terms.push(running.ite(&change, &zero));
            }
            let next = Real::add(self.model.context(), &terms.iter().collect::<Vec<_>>());
            self.enforce_eq(&pre, &next, &[]);
        }
        Ok(())
    }

    /// Discrete changes of fluents at layer `h`.
    fn fluent_support(&mut self, h: usize, triggers: &RefVec<EffectId, Bool<'ctx>>) -> Result<(), EncodingError> {
        let (problem, effects) = (self.problem, self.effects);
        let mode = Mode::Effect { layer: h };
        let zero = self.zero()?;
        for f in problem.space.fluents() {
            let assigners = effects.assigners(f);
            if assigners.is_empty() {
                continue;
            }
            let pre = self.real(self.vars.fluent(f, h, Phase::Pre)?);
            let post = self.real(self.vars.fluent(f, h, Phase::Post)?);
            let mut additive = Vec::new();
            let mut absolute = Vec::new();
            // value after all additive effects applying at this layer
            let mut frame = vec![pre];
            for &e in assigners {
                let EffectKind::Assign { op, value, .. } = &effects.effect(e).kind else {
                    continue;
                };
                let trigger = triggers[e].clone();
                let new_value = match op {
                    AssignOp::Increase | AssignOp::Decrease => {
                        let mut delta = self.translator().expr(value, mode)?;
                        if *op == AssignOp::Decrease {
                            delta = delta.neg()?;
                        }
                        let delta = delta.into_real(&*self.model)?;
                        frame.push(trigger.ite(&delta, &zero));
                        additive.push(trigger);
                        continue;
                    }
                    AssignOp::Assign => self.translator().expr(value, mode)?,
                    AssignOp::ScaleUp => {
                        let scaled = Expr::Mul(vec![Expr::Fluent(f), value.clone()]);
                        self.translator().expr(&scaled, mode)?
                    }
                    AssignOp::ScaleDown => {
                        let scaled = Expr::div(Expr::Fluent(f), value.clone());
                        self.translator().expr(&scaled, mode)?
                    }
                };
                let new_value = new_value.into_real(&*self.model)?;
                self.enforce_eq(&post, &new_value, &[trigger.clone()]);
                absolute.push(trigger);
            }
            let frame = Real::add(self.model.context(), &frame.iter().collect::<Vec<_>>());
            let assigned = self.model.or(&absolute);
            let unassigned = self.model.not(&assigned);
            self.enforce_eq(&post, &frame, &[unassigned]);
            for abs in &absolute {
                for add in &additive {
                    let exclusive = self.model.or(&[self.model.not(abs), self.model.not(add)]);
                    self.model.enforce(exclusive, &[]);
                }
            }
        }
        Ok(())
    }

    /// Constraints of the last layer of a horizon, enforced under its activation literal.
    fn closing(&mut self, horizon: usize, activation: BVar) -> Result<(), EncodingError> {
        let problem = self.problem;
        let span = tracing::span!(tracing::Level::TRACE, "closing", horizon);
        let _span = span.enter();
        let scope = [self.lit(activation)];
        for (a, action) in problem.actions.entries() {
            let occ = self.vars.occurrence(a, horizon)?;
            let mut idle = vec![self.lit(occ.start)];
            if action.is_durative() {
                idle.push(self.lit(occ.end));
                idle.push(self.opt_lit(occ.running));
            }
            for lit in idle {
                let not = self.model.not(&lit);
                self.model.enforce(not, &scope);
            }
        }
        let goal = self
            .translator()
            .condition(&problem.goal, Mode::Goal { horizon })?;
        self.model.enforce(goal, &scope);
        Ok(())
    }
}

fn pre(layer: usize) -> Mode {
    Mode::Condition {
        layer,
        phase: Phase::Pre,
    }
}
