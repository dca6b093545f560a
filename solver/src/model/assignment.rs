use crate::collections::ref_store::RefVec;
use crate::model::{BVar, Label, Model, RVar};
use num_rational::Rational64;

/// Values of all variables of a model, read from a solution of the solver.
///
/// A real variable has no value when the solver assigned it an irrational number or a rational
/// that does not fit on 64 bits.
#[derive(Clone, Debug)]
pub struct SavedAssignment {
    bools: RefVec<BVar, Option<bool>>,
    reals: RefVec<RVar, Option<Rational64>>,
}

impl SavedAssignment {
    pub(crate) fn read<'ctx, Lbl: Label>(model: &Model<'ctx, Lbl>, solution: &z3::Model<'ctx>) -> Self {
        let bools = model
            .bool_vars()
            .map(|v| solution.eval(v, true).and_then(|value| value.as_bool()))
            .collect();
        let reals = model
            .real_vars()
            .map(|v| {
                let (num, den) = solution.eval(v, true)?.as_real()?;
                (den != 0).then(|| Rational64::new(num, den))
            })
            .collect();
        SavedAssignment { bools, reals }
    }

    pub fn bool_value(&self, var: BVar) -> Option<bool> {
        self.bools.get(var).copied().flatten()
    }

    pub fn real_value(&self, var: RVar) -> Option<Rational64> {
        self.reals.get(var).copied().flatten()
    }
}
