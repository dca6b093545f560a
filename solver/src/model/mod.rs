//! Description of a problem: labelled boolean and real variables and the constraints posted on them.

use crate::collections::ref_store::RefVec;
use crate::create_ref_type;
use num_rational::Rational64;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use z3::ast::{Ast, Bool, Real};
use z3::Context;

pub mod assignment;

pub use assignment::SavedAssignment;

/// Trait for labels that can be attached to the variables of a model.
///
/// The textual representation of a label names the variable in the solver, hence two variables
/// of the same model must never have the same label.
pub trait Label: Debug + Display + Clone + Eq + Hash + Send + Sync + 'static {}
impl<T> Label for T where T: Debug + Display + Clone + Eq + Hash + Send + Sync + 'static {}

create_ref_type!(BVar);
create_ref_type!(RVar);

impl Debug for BVar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.to_u32())
    }
}

impl Debug for RVar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.to_u32())
    }
}

/// A model is append-only: variables and constraints can be added but never removed.
pub struct Model<'ctx, Lbl> {
    ctx: &'ctx Context,
    bools: RefVec<BVar, (Lbl, Bool<'ctx>)>,
    reals: RefVec<RVar, (Lbl, Real<'ctx>)>,
    constraints: Vec<Bool<'ctx>>,
}

impl<'ctx, Lbl: Label> Model<'ctx, Lbl> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Model {
            ctx,
            bools: RefVec::new(),
            reals: RefVec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    pub fn new_bvar(&mut self, label: impl Into<Lbl>) -> BVar {
        let label = label.into();
        let var = Bool::new_const(self.ctx, label.to_string());
        self.bools.push((label, var))
    }

    pub fn new_rvar(&mut self, label: impl Into<Lbl>) -> RVar {
        let label = label.into();
        let var = Real::new_const(self.ctx, label.to_string());
        self.reals.push((label, var))
    }

    pub fn bool_label(&self, var: BVar) -> &Lbl {
        &self.bools[var].0
    }

    pub fn real_label(&self, var: RVar) -> &Lbl {
        &self.reals[var].0
    }

    pub fn num_variables(&self) -> usize {
        self.bools.len() + self.reals.len()
    }

    pub(crate) fn bool_vars(&self) -> impl Iterator<Item = &Bool<'ctx>> {
        self.bools.values().map(|(_, v)| v)
    }

    pub(crate) fn real_vars(&self) -> impl Iterator<Item = &Real<'ctx>> {
        self.reals.values().map(|(_, v)| v)
    }

    pub fn constraints(&self) -> &[Bool<'ctx>] {
        &self.constraints
    }

    /// The solver term of a boolean variable.
    pub fn lit(&self, var: BVar) -> Bool<'ctx> {
        self.bools[var].1.clone()
    }

    /// The solver term of a real variable.
    pub fn real(&self, var: RVar) -> Real<'ctx> {
        self.reals[var].1.clone()
    }

    pub fn constant(&self, value: bool) -> Bool<'ctx> {
        Bool::from_bool(self.ctx, value)
    }

    /// An exact real constant, or `None` if z3 cannot represent it.
    pub fn rational(&self, value: Rational64) -> Option<Real<'ctx>> {
        let (num, den) = (*value.numer(), *value.denom());
        match (i32::try_from(num), i32::try_from(den)) {
            (Ok(n), Ok(d)) => Some(Real::from_real(self.ctx, n, d)),
            _ => Real::from_real_str(self.ctx, &num.to_string(), &den.to_string()),
        }
    }

    /// Conjunction of the literals, with `true` operands dropped and a `false` operand absorbing.
    pub fn and(&self, lits: &[Bool<'ctx>]) -> Bool<'ctx> {
        if lits.iter().any(|l| l.as_bool() == Some(false)) {
            return self.constant(false);
        }
        let lits: Vec<&Bool<'ctx>> = lits.iter().filter(|l| l.as_bool() != Some(true)).collect();
        match lits.as_slice() {
            [] => self.constant(true),
            [l] => (*l).clone(),
            _ => Bool::and(self.ctx, &lits),
        }
    }

    /// Disjunction of the literals, with `false` operands dropped and a `true` operand absorbing.
    pub fn or(&self, lits: &[Bool<'ctx>]) -> Bool<'ctx> {
        if lits.iter().any(|l| l.as_bool() == Some(true)) {
            return self.constant(true);
        }
        let lits: Vec<&Bool<'ctx>> = lits.iter().filter(|l| l.as_bool() != Some(false)).collect();
        match lits.as_slice() {
            [] => self.constant(false),
            [l] => (*l).clone(),
            _ => Bool::or(self.ctx, &lits),
        }
    }

    pub fn not(&self, lit: &Bool<'ctx>) -> Bool<'ctx> {
        match lit.as_bool() {
            Some(value) => self.constant(!value),
            None => lit.not(),
        }
    }

    fn add_constraint(&mut self, c: Bool<'ctx>) {
        tracing::trace!("Adding constraint: {}", c);
        self.constraints.push(c)
    }

    /// Enforces that the expression holds whenever all literals of the scope are true.
    pub fn enforce(&mut self, expr: Bool<'ctx>, scope: &[Bool<'ctx>]) {
        if expr.as_bool() == Some(true) {
            return;
        }
        let scope = self.and(scope);
        match scope.as_bool() {
            Some(false) => {}
            Some(true) => self.add_constraint(expr),
            None => self.add_constraint(scope.implies(&expr)),
        }
    }

    /// Enforces `lit <=> expr`.
    pub fn bind(&mut self, expr: Bool<'ctx>, lit: &Bool<'ctx>) {
        if &expr != lit {
            self.add_constraint(lit._eq(&expr));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::Config;

    #[test]
    fn trivial_connectives_are_folded() {
        let ctx = Context::new(&Config::new());
        let mut model: Model<&'static str> = Model::new(&ctx);
        let a = model.new_bvar("a");
        let b = model.new_bvar("b");
        let (la, lb) = (model.lit(a), model.lit(b));
        assert_eq!(model.and(&[]), model.constant(true));
        assert_eq!(model.or(&[]), model.constant(false));
        assert_eq!(model.and(&[model.constant(true), la.clone()]), la);
        assert_eq!(model.or(&[la.clone(), model.constant(true)]), model.constant(true));
        assert_eq!(model.not(&model.constant(false)), model.constant(true));
        assert_eq!(model.or(&[la.clone(), lb.clone()]), Bool::or(&ctx, &[&la, &lb]));
        assert_eq!(model.bool_label(b), &"b");
        assert_eq!(model.num_variables(), 2);
    }

    #[test]
    fn vacuous_enforcement() {
        let ctx = Context::new(&Config::new());
        let mut model: Model<&'static str> = Model::new(&ctx);
        let a = model.new_bvar("a");
        let a = model.lit(a);
        model.enforce(model.constant(true), &[]);
        model.enforce(a.clone(), &[model.constant(false)]);
        assert!(model.constraints().is_empty());
        model.enforce(a.clone(), &[model.constant(true)]);
        assert_eq!(model.constraints(), &[a.clone()]);
        model.bind(a.clone(), &a);
        assert_eq!(model.constraints().len(), 1);
    }

    #[test]
    fn exact_constants() {
        let ctx = Context::new(&Config::new());
        let model: Model<&'static str> = Model::new(&ctx);
        let third = model.rational(Rational64::new(1, 3)).unwrap();
        assert_eq!(third.as_real(), Some((1, 3)));
        let big = model.rational(Rational64::new(i64::MAX, 2)).unwrap();
        assert_eq!(big.as_real(), Some((i64::MAX, 2)));
    }
}
