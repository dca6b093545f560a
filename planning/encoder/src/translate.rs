//! Translation of condition and expression trees into solver formulas and real-valued terms.
//!
//! The same trees are translated under different [`Mode`]s, which decide which variables
//! the references to literals, fluents and durations resolve to.

use crate::error::EncodingError;
use crate::numeric::Term;
use crate::problem::{ActionId, CmpOp, Condition, Expr, FluentId, LitId};
use crate::vars::{Label, Phase, Variables};
use strata::model::Model;
use z3::ast::Bool;

/// Role of the formula being built.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    /// References resolve to the post-values of the final layer.
    Goal { horizon: usize },
    /// References resolve to the values of a layer in the given phase.
    Condition { layer: usize, phase: Phase },
    /// Constraint on the duration of an action starting at a layer. `?duration` resolves to its duration
    /// variable and fluents to their pre-values.
    Duration { action: ActionId, layer: usize },
    /// Right-hand side or guard of an effect happening at a layer, read against its pre-values.
    Effect { layer: usize },
}

impl Mode {
    fn describe(&self) -> String {
        match self {
            Mode::Goal { horizon } => format!("the goal of horizon {horizon}"),
            Mode::Condition { layer, phase } => format!("a condition on layer {layer} ({phase:?})"),
            Mode::Duration { action, layer } => format!("the duration of {action:?} on layer {layer}"),
            Mode::Effect { layer } => format!("an effect on layer {layer}"),
        }
    }

    fn mismatch(&self, node: &'static str) -> EncodingError {
        EncodingError::ModeMismatch {
            context: self.describe(),
            node,
        }
    }
}

pub struct Translator<'a, 'ctx> {
    model: &'a Model<'ctx, Label>,
    vars: &'a Variables,
}

impl<'a, 'ctx> Translator<'a, 'ctx> {
    pub fn new(model: &'a Model<'ctx, Label>, vars: &'a Variables) -> Self {
        Translator { model, vars }
    }

    fn literal(&self, l: LitId, mode: Mode) -> Result<Bool<'ctx>, EncodingError> {
        let var = match mode {
            Mode::Goal { horizon } => self.vars.literal(l, horizon, Phase::Post)?,
            Mode::Condition { layer, phase } => self.vars.literal(l, layer, phase)?,
            Mode::Duration { layer, .. } | Mode::Effect { layer } => self.vars.literal(l, layer, Phase::Pre)?,
        };
        Ok(self.model.lit(var))
    }

    fn fluent(&self, f: FluentId, mode: Mode) -> Result<Term<'ctx>, EncodingError> {
        let var = match mode {
            Mode::Goal { horizon } => self.vars.fluent(f, horizon, Phase::Post)?,
            Mode::Condition { layer, phase } => self.vars.fluent(f, layer, phase)?,
            Mode::Duration { layer, .. } | Mode::Effect { layer } => self.vars.fluent(f, layer, Phase::Pre)?,
        };
        Ok(Term::Var(self.model.real(var)))
    }

    /// Returns a formula that holds iff the condition holds.
    pub fn condition(&self, cond: &Condition, mode: Mode) -> Result<Bool<'ctx>, EncodingError> {
        match cond {
            Condition::True => Ok(self.model.constant(true)),
            Condition::False => Ok(self.model.constant(false)),
            Condition::Literal(l) => self.literal(*l, mode),
            Condition::Not(c) => Ok(self.model.not(&self.condition(c, mode)?)),
            Condition::And(cs) | Condition::Forall(cs) => Ok(self.model.and(&self.conditions(cs, mode)?)),
            Condition::Or(cs) | Condition::Exists(cs) => Ok(self.model.or(&self.conditions(cs, mode)?)),
            Condition::Imply(a, b) => {
                let a = self.condition(a, mode)?;
                let b = self.condition(b, mode)?;
                Ok(self.model.or(&[self.model.not(&a), b]))
            }
            Condition::Compare(op, lhs, rhs) => self.comparison(*op, lhs, rhs, mode),
            Condition::Timed(_, _) => Err(mode.mismatch("a timed condition")),
        }
    }

    fn conditions(&self, conds: &[Condition], mode: Mode) -> Result<Vec<Bool<'ctx>>, EncodingError> {
        conds.iter().map(|c| self.condition(c, mode)).collect()
    }

    /// Returns a formula that holds iff the comparison holds. Strict comparisons stay strict.
    pub fn comparison(&self, op: CmpOp, lhs: &Expr, rhs: &Expr, mode: Mode) -> Result<Bool<'ctx>, EncodingError> {
        let lhs = self.expr(lhs, mode)?;
        let rhs = self.expr(rhs, mode)?;
        Term::compare(op, lhs, rhs, self.model)
    }

    /// Translates an arithmetic expression into a term over the real variables of the model.
    pub fn expr(&self, expr: &Expr, mode: Mode) -> Result<Term<'ctx>, EncodingError> {
        match expr {
            Expr::Const(c) => Ok(Term::Const(*c)),
            Expr::Fluent(f) => self.fluent(*f, mode),
            Expr::Duration => match mode {
                Mode::Duration { action, layer } => match self.vars.occurrence(action, layer)?.duration {
                    Some(d) => Ok(Term::Var(self.model.real(d))),
                    None => Err(mode.mismatch("`?duration` of an action without duration")),
                },
                _ => Err(mode.mismatch("`?duration`")),
            },
            Expr::Add(es) => Term::sum(self.exprs(es, mode)?, self.model),
            Expr::Sub(a, b) => self.expr(a, mode)?.minus(self.expr(b, mode)?, self.model),
            Expr::Neg(e) => self.expr(e, mode)?.neg(),
            Expr::Mul(es) => Term::product(self.exprs(es, mode)?, self.model),
            Expr::Div(a, b) => self.expr(a, mode)?.div(self.expr(b, mode)?, self.model),
        }
    }

    fn exprs(&self, exprs: &[Expr], mode: Mode) -> Result<Vec<Term<'ctx>>, EncodingError> {
        exprs.iter().map(|e| self.expr(e, mode)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectIndex;
    use crate::problem::*;
    use num_rational::Rational64;
    use strata::params::Limits;
    use strata::solver::Solver;
    use z3::ast::Ast;
    use z3::{Config, Context};

    fn setup(ctx: &Context) -> (GroundProblem, Model<'_, Label>, Variables) {
        let mut b = ProblemBuilder::new();
        let x = b.literal("x");
        let fuel = b.fluent("fuel", Rational64::from_integer(10));
        b.action(GroundAction::instantaneous(
            "refuel",
            Condition::True,
            vec![Effect::Add(x), Effect::Assign(AssignOp::Increase, fuel, Expr::int(1))],
        ));
        let pb = b.build();
        let effects = EffectIndex::build(&pb).unwrap();
        let mut model = Model::new(ctx);
        let mut vars = Variables::new(10);
        vars.allocate(&mut model, &pb, &effects, 2).unwrap();
        (pb, model, vars)
    }

    #[test]
    fn modes_resolve_to_distinct_variables() {
        let ctx = Context::new(&Config::new());
        let (_, model, vars) = setup(&ctx);
        let x = Condition::lit(LitId::from(0usize));
        let tr = Translator::new(&model, &vars);
        let goal = tr.condition(&x, Mode::Goal { horizon: 2 }).unwrap();
        let pre0 = tr.condition(&x, Mode::Condition { layer: 0, phase: Phase::Pre }).unwrap();
        let post0 = tr.condition(&x, Mode::Condition { layer: 0, phase: Phase::Post }).unwrap();
        let pre1 = tr.condition(&x, Mode::Condition { layer: 1, phase: Phase::Pre }).unwrap();
        assert_ne!(goal, pre0);
        assert_ne!(pre0, post0);
        // the value after the happenings of a layer is the one before the next layer
        assert_eq!(post0, pre1);
        assert_eq!(goal, model.lit(vars.literal(LitId::from(0usize), 2, Phase::Post).unwrap()));
    }

    #[test]
    fn nary_connectives() {
        let ctx = Context::new(&Config::new());
        let (_, model, vars) = setup(&ctx);
        let mode = Mode::Condition { layer: 1, phase: Phase::Pre };
        let x = model.lit(vars.literal(LitId::from(0usize), 1, Phase::Pre).unwrap());
        let tr = Translator::new(&model, &vars);
        assert_eq!(tr.condition(&Condition::And(vec![]), mode).unwrap(), model.constant(true));
        assert_eq!(tr.condition(&Condition::Exists(vec![]), mode).unwrap(), model.constant(false));
        let single = Condition::Forall(vec![Condition::lit(LitId::from(0usize))]);
        assert_eq!(tr.condition(&single, mode).unwrap(), x);
        let neg = Condition::not(Condition::Or(vec![Condition::False, Condition::lit(LitId::from(0usize))]));
        assert_eq!(tr.condition(&neg, mode).unwrap(), x.not());
        let vacuous = Condition::imply(Condition::False, Condition::lit(LitId::from(0usize)));
        assert_eq!(tr.condition(&vacuous, mode).unwrap(), model.constant(true));
    }

    #[test]
    fn comparisons() {
        let ctx = Context::new(&Config::new());
        let (_, mut model, vars) = setup(&ctx);
        let mode = Mode::Condition { layer: 0, phase: Phase::Pre };
        let fuel = model.real(vars.fluent(FluentId::from(0usize), 0, Phase::Pre).unwrap());
        // 2 * fuel / 4 <= 5 holds up to a fuel of 10
        let lhs = Expr::div(Expr::Mul(vec![Expr::int(2), Expr::fluent(FluentId::from(0usize))]), Expr::int(4));
        let tr = Translator::new(&model, &vars);
        let leq = tr.comparison(CmpOp::Leq, &lhs, &Expr::int(5), mode).unwrap();
        // constant comparisons are decided at translation time
        assert_eq!(tr.comparison(CmpOp::Lt, &Expr::int(2), &Expr::ratio(5, 2), mode).unwrap(), model.constant(true));
        assert_eq!(tr.comparison(CmpOp::Eq, &Expr::int(2), &Expr::ratio(5, 2), mode).unwrap(), model.constant(false));

        let ten = model.new_bvar(Label::Activation(10));
        let eleven = model.new_bvar(Label::Activation(11));
        let value = |v: i64| model.rational(Rational64::from_integer(v)).unwrap();
        let (is_ten, is_eleven) = (fuel._eq(&value(10)), fuel._eq(&value(11)));
        model.enforce(leq, &[]);
        model.enforce(is_ten, &[model.lit(ten)]);
        model.enforce(is_eleven, &[model.lit(eleven)]);
        let mut solver = Solver::new(model).with_limits(Limits::unlimited());
        assert!(solver.solve_with_assumptions(&[ten]).is_sat());
        assert!(solver.solve_with_assumptions(&[eleven]).is_unsat());
    }

    #[test]
    fn non_linear_terms() {
        let ctx = Context::new(&Config::new());
        let (_, model, vars) = setup(&ctx);
        let mode = Mode::Effect { layer: 0 };
        let fuel = Expr::fluent(FluentId::from(0usize));
        let tr = Translator::new(&model, &vars);
        assert!(matches!(
            tr.expr(&Expr::Mul(vec![fuel.clone(), fuel.clone()]), mode),
            Ok(Term::Var(_))
        ));
        assert!(matches!(tr.expr(&Expr::div(Expr::int(1), fuel.clone()), mode), Ok(Term::Var(_))));
        assert_eq!(
            tr.expr(&Expr::Mul(vec![Expr::int(0), fuel.clone(), fuel]), mode),
            Ok(Term::zero())
        );
    }

    #[test]
    fn translation_errors() {
        let ctx = Context::new(&Config::new());
        let (_, model, vars) = setup(&ctx);
        let mode = Mode::Effect { layer: 0 };
        let fuel = Expr::fluent(FluentId::from(0usize));
        let tr = Translator::new(&model, &vars);
        assert_eq!(tr.expr(&Expr::div(fuel, Expr::int(0)), mode), Err(EncodingError::DivisionByZero));
        assert!(matches!(
            tr.expr(&Expr::Duration, mode),
            Err(EncodingError::ModeMismatch { .. })
        ));
        assert!(matches!(
            tr.condition(&Condition::timed(TimeSpec::AtEnd, Condition::True), mode),
            Err(EncodingError::ModeMismatch { .. })
        ));
        assert!(matches!(
            tr.condition(&Condition::lit(LitId::from(4usize)), mode),
            Err(EncodingError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            tr.condition(&Condition::lit(LitId::from(0usize)), Mode::Goal { horizon: 3 }),
            Err(EncodingError::IndexOutOfRange { .. })
        ));
    }
}
