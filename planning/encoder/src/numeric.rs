//! Exact arithmetic on real-valued quantities.
//!
//! Times, durations and numeric fluents are real variables of the solver. Expressions are folded
//! into rational constants as long as they do not involve any variable, and only become solver
//! terms afterwards. Products and quotients of variables are kept as non-linear terms.

use crate::error::EncodingError;
use crate::problem::CmpOp;
use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedMul, CheckedSub, One, Zero};
use strata::model::{Label, Model};
use z3::ast::{Ast, Bool, Real};

fn overflow(what: &str) -> EncodingError {
    EncodingError::NumericRange(what.to_string())
}

/// A real-valued quantity: either known at translation time or a term over solver variables.
#[derive(Clone, Debug, PartialEq)]
pub enum Term<'ctx> {
    Const(Rational64),
    Var(Real<'ctx>),
}

impl<'ctx> Term<'ctx> {
    pub fn zero() -> Self {
        Term::Const(Rational64::zero())
    }

    pub fn as_constant(&self) -> Option<Rational64> {
        match self {
            Term::Const(c) => Some(*c),
            Term::Var(_) => None,
        }
    }

    pub fn into_real<L: Label>(self, model: &Model<'ctx, L>) -> Result<Real<'ctx>, EncodingError> {
        match self {
            Term::Const(c) => model
                .rational(c)
                .ok_or_else(|| EncodingError::NumericRange(format!("constant {c}"))),
            Term::Var(v) => Ok(v),
        }
    }

    /// Sum of all terms. Constant parts are added exactly before reaching the solver.
    pub fn sum<L: Label>(terms: Vec<Term<'ctx>>, model: &Model<'ctx, L>) -> Result<Self, EncodingError> {
        let mut constant = Rational64::zero();
        let mut vars = Vec::new();
        for t in terms {
            match t {
                Term::Const(c) => constant = constant.checked_add(&c).ok_or_else(|| overflow("sum"))?,
                Term::Var(v) => vars.push(v),
            }
        }
        if vars.is_empty() {
            return Ok(Term::Const(constant));
        }
        if !constant.is_zero() {
            vars.push(Term::Const(constant).into_real(model)?);
        }
        Ok(Term::Var(match vars.as_slice() {
            [v] => v.clone(),
            _ => Real::add(model.context(), &vars.iter().collect::<Vec<_>>()),
        }))
    }

    pub fn plus<L: Label>(self, other: Term<'ctx>, model: &Model<'ctx, L>) -> Result<Self, EncodingError> {
        Term::sum(vec![self, other], model)
    }

    pub fn neg(self) -> Result<Self, EncodingError> {
        match self {
            Term::Const(c) => Rational64::zero()
                .checked_sub(&c)
                .map(Term::Const)
                .ok_or_else(|| overflow("negation")),
            Term::Var(v) => Ok(Term::Var(v.unary_minus())),
        }
    }

    pub fn minus<L: Label>(self, other: Term<'ctx>, model: &Model<'ctx, L>) -> Result<Self, EncodingError> {
        self.plus(other.neg()?, model)
    }

    /// Product of all factors. It is a non-linear term when several factors involve variables.
    pub fn product<L: Label>(factors: Vec<Term<'ctx>>, model: &Model<'ctx, L>) -> Result<Self, EncodingError> {
        let mut constant = Rational64::one();
        let mut vars = Vec::new();
        for t in factors {
            match t {
                Term::Const(c) => constant = constant.checked_mul(&c).ok_or_else(|| overflow("product"))?,
                Term::Var(v) => vars.push(v),
            }
        }
        if vars.is_empty() || constant.is_zero() {
            return Ok(Term::Const(constant));
        }
        if !constant.is_one() {
            vars.insert(0, Term::Const(constant).into_real(model)?);
        }
        Ok(Term::Var(match vars.as_slice() {
            [v] => v.clone(),
            _ => Real::mul(model.context(), &vars.iter().collect::<Vec<_>>()),
        }))
    }

    pub fn times<L: Label>(self, other: Term<'ctx>, model: &Model<'ctx, L>) -> Result<Self, EncodingError> {
        Term::product(vec![self, other], model)
    }

    /// Quotient of two terms. A divisor known to be zero is an error, a non-constant divisor
    /// yields a non-linear term.
    pub fn div<L: Label>(self, divisor: Term<'ctx>, model: &Model<'ctx, L>) -> Result<Self, EncodingError> {
        match divisor {
            Term::Const(d) if d.is_zero() => Err(EncodingError::DivisionByZero),
            Term::Const(d) => self.times(Term::Const(d.recip()), model),
            Term::Var(d) => {
                let numerator = self.into_real(model)?;
                Ok(Term::Var(numerator.div(&d)))
            }
        }
    }

    /// Truth value of `lhs op rhs`, decided at translation time when both sides are constant.
    pub fn compare<L: Label>(
        op: CmpOp,
        lhs: Term<'ctx>,
        rhs: Term<'ctx>,
        model: &Model<'ctx, L>,
    ) -> Result<Bool<'ctx>, EncodingError> {
        if let (Some(l), Some(r)) = (lhs.as_constant(), rhs.as_constant()) {
            let holds = match op {
                CmpOp::Lt => l < r,
                CmpOp::Leq => l <= r,
                CmpOp::Eq => l == r,
                CmpOp::Geq => l >= r,
                CmpOp::Gt => l > r,
            };
            return Ok(model.constant(holds));
        }
        let l = lhs.into_real(model)?;
        let r = rhs.into_real(model)?;
        Ok(match op {
            CmpOp::Lt => l.lt(&r),
            CmpOp::Leq => l.le(&r),
            CmpOp::Eq => l._eq(&r),
            CmpOp::Geq => l.ge(&r),
            CmpOp::Gt => l.gt(&r),
        })
    }
}
