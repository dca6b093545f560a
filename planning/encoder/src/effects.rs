//! Index from the targets of effects to the actions that affect them.

use crate::error::EncodingError;
use crate::problem::*;
use itertools::Itertools;
use strata::collections::ref_store::RefVec;
use strata::create_ref_type;

create_ref_type!(EffectId);

impl std::fmt::Debug for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.to_u32())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EffectKind {
    Add(LitId),
    Delete(LitId),
    Assign { op: AssignOp, fluent: FluentId, value: Expr },
    /// Continuous change, the rate being already signed according to the direction of the flow.
    Flow { fluent: FluentId, rate: Expr },
}

/// A flattened effect: an atomic change with all its enclosing guards collected.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectRecord {
    pub action: ActionId,
    pub instant: Instant,
    /// Condition on the state preceding the effect, `Condition::True` for unconditional effects.
    pub guard: Condition,
    pub kind: EffectKind,
}

/// Immutable inverted index of all effects of a problem, shared by all horizons.
#[derive(Clone, Debug)]
pub struct EffectIndex {
    space: IndexSpace,
    effects: RefVec<EffectId, EffectRecord>,
    adders: RefVec<LitId, Vec<EffectId>>,
    deleters: RefVec<LitId, Vec<EffectId>>,
    assigners: RefVec<FluentId, Vec<EffectId>>,
    flows: RefVec<FluentId, Vec<EffectId>>,
    by_action: RefVec<ActionId, Vec<EffectId>>,
}

impl EffectIndex {
    pub fn build(problem: &GroundProblem) -> Result<EffectIndex, EncodingError> {
        let space = problem.space;
        if problem.actions.len() != space.actions {
            return Err(EncodingError::IndexSpaceMismatch(format!(
                "{} actions for an index space of {}",
                problem.actions.len(),
                space.actions
            )));
        }
        let mut index = EffectIndex {
            space,
            effects: RefVec::new(),
            adders: RefVec::with_values(space.literals, Vec::new()),
            deleters: RefVec::with_values(space.literals, Vec::new()),
            assigners: RefVec::with_values(space.fluents, Vec::new()),
            flows: RefVec::with_values(space.fluents, Vec::new()),
            by_action: RefVec::with_values(space.actions, Vec::new()),
        };
        for (a, action) in problem.actions.entries() {
            let mut records = Vec::new();
            for eff in &action.effects {
                flatten(a, Instant::Start, &[], eff, &mut records);
            }
            for record in records {
                index.insert(record)?;
            }
        }
        tracing::debug!(num_effects = index.effects.len(), "effect index built");
        Ok(index)
    }

    fn insert(&mut self, record: EffectRecord) -> Result<(), EncodingError> {
        let id = EffectId::from(self.effects.len());
        match &record.kind {
            EffectKind::Add(l) => {
                self.space.check_literal(*l)?;
                self.adders[*l].push(id)
            }
            EffectKind::Delete(l) => {
                self.space.check_literal(*l)?;
                self.deleters[*l].push(id)
            }
            EffectKind::Assign { fluent, .. } => {
                self.space.check_fluent(*fluent)?;
                self.assigners[*fluent].push(id)
            }
            EffectKind::Flow { fluent, .. } => {
                self.space.check_fluent(*fluent)?;
                self.flows[*fluent].push(id)
            }
        }
        self.by_action[record.action].push(id);
        self.effects.push(record);
        Ok(())
    }

    pub fn space(&self) -> IndexSpace {
        self.space
    }

    pub fn num_effects(&self) -> usize {
        self.effects.len()
    }

    pub fn effect(&self, id: EffectId) -> &EffectRecord {
        &self.effects[id]
    }

    pub fn effects(&self) -> impl Iterator<Item = (EffectId, &EffectRecord)> {
        self.effects.entries()
    }

    pub fn adders(&self, l: LitId) -> &[EffectId] {
        self.adders.get(l).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn deleters(&self, l: LitId) -> &[EffectId] {
        self.deleters.get(l).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Discrete effects on a fluent.
    pub fn assigners(&self, f: FluentId) -> &[EffectId] {
        self.assigners.get(f).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Continuous effects on a fluent.
    pub fn flows(&self, f: FluentId) -> &[EffectId] {
        self.flows.get(f).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn effects_of(&self, a: ActionId) -> &[EffectId] {
        self.by_action.get(a).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn touches_literal(&self, l: LitId) -> bool {
        !self.adders(l).is_empty() || !self.deleters(l).is_empty()
    }

    /// Actions with one of the given effects at the given instant, in increasing order.
    pub fn actions_at(&self, effects: &[EffectId], instant: Instant) -> Vec<ActionId> {
        effects
            .iter()
            .map(|&e| self.effect(e))
            .filter(|r| r.instant == instant)
            .map(|r| r.action)
            .sorted()
            .dedup()
            .collect()
    }
}

fn guarded(guards: &[Condition]) -> Condition {
    match guards {
        [] => Condition::True,
        [g] => g.clone(),
        _ => Condition::And(guards.to_vec()),
    }
}

fn flatten(action: ActionId, instant: Instant, guards: &[Condition], effect: &Effect, out: &mut Vec<EffectRecord>) {
    let mut record = |kind| {
        out.push(EffectRecord {
            action,
            instant,
            guard: guarded(guards),
            kind,
        })
    };
    match effect {
        Effect::Add(l) => record(EffectKind::Add(*l)),
        Effect::Delete(l) => record(EffectKind::Delete(*l)),
        Effect::Assign(op, fluent, value) => record(EffectKind::Assign {
            op: *op,
            fluent: *fluent,
            value: value.clone(),
        }),
        Effect::Continuous(dir, fluent, rate) => {
            let rate = match dir {
                FlowDir::Increase => rate.clone(),
                FlowDir::Decrease => Expr::Neg(Box::new(rate.clone())),
            };
            record(EffectKind::Flow { fluent: *fluent, rate })
        }
        Effect::When(cond, effs) => {
            let mut guards = guards.to_vec();
            guards.push(cond.clone());
            for e in effs {
                flatten(action, instant, &guards, e, out);
            }
        }
        Effect::Forall(effs) => {
            for e in effs {
                flatten(action, instant, guards, e, out);
            }
        }
        Effect::Timed(instant, effs) => {
            for e in effs {
                flatten(action, *instant, guards, e, out);
            }
        }
    }
}
