//! Allocation of the solver variables of each layer.

use crate::effects::EffectIndex;
use crate::error::{EncodingError, EntityKind};
use crate::problem::{ActionId, ActionKind, FluentId, GroundProblem, LitId};
use std::fmt::{Display, Formatter};
use std::ops::Range;
use strata::collections::ref_store::RefVec;
use strata::model::{BVar, Model, RVar};

/// Whether a value is read before or after the happenings of a layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

/// Labels attached to the variables of the solver model.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Label {
    Time(usize),
    Elapsed(usize),
    Start(ActionId, usize),
    End(ActionId, usize),
    Running(ActionId, usize),
    Duration(ActionId, usize),
    Literal(LitId, usize, Phase),
    Fluent(FluentId, usize, Phase),
    /// Literal enabling the closing constraints of a bound.
    Activation(usize),
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let phase = |p: &Phase| match p {
            Phase::Pre => "pre",
            Phase::Post => "post",
        };
        match self {
            Label::Time(h) => write!(f, "time@{h}"),
            Label::Elapsed(h) => write!(f, "elapsed@{h}"),
            Label::Start(a, h) => write!(f, "start_a{}@{h}", usize::from(*a)),
            Label::End(a, h) => write!(f, "end_a{}@{h}", usize::from(*a)),
            Label::Running(a, h) => write!(f, "running_a{}@{h}", usize::from(*a)),
            Label::Duration(a, h) => write!(f, "duration_a{}@{h}", usize::from(*a)),
            Label::Literal(l, h, p) => write!(f, "l{}@{h}.{}", usize::from(*l), phase(p)),
            Label::Fluent(x, h, p) => write!(f, "f{}@{h}.{}", usize::from(*x), phase(p)),
            Label::Activation(h) => write!(f, "closing@{h}"),
        }
    }
}

/// Variables of an action at one layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OccurrenceVars {
    pub start: BVar,
    /// Same variable as `start` for actions without duration.
    pub end: BVar,
    /// For durative actions: running over the interval following the layer.
    /// For timed literals: fired at or before the layer.
    /// Always false for instantaneous actions.
    pub running: Option<BVar>,
    /// Remaining duration of a durative action.
    pub duration: Option<RVar>,
}

#[derive(Clone, Debug)]
pub struct LayerVars {
    pub time: RVar,
    /// Time elapsed since the previous layer, absent on the first layer.
    pub elapsed: Option<RVar>,
    pub occurrences: RefVec<ActionId, OccurrenceVars>,
    literals: RefVec<LitId, (BVar, BVar)>,
    fluents: RefVec<FluentId, (RVar, RVar)>,
}

impl LayerVars {
    pub fn literal(&self, l: LitId, phase: Phase) -> BVar {
        let (pre, post) = self.literals[l];
        match phase {
            Phase::Pre => pre,
            Phase::Post => post,
        }
    }

    pub fn fluent(&self, f: FluentId, phase: Phase) -> RVar {
        let (pre, post) = self.fluents[f];
        match phase {
            Phase::Pre => pre,
            Phase::Post => post,
        }
    }
}

/// Variables of all layers allocated so far.
///
/// Allocation is append-only: extending the horizon never changes the variables of existing layers.
/// Some variables are shared between phases and layers:
///  - `pre(l, h)` is `post(l, h-1)` for every literal;
///  - `post(x, h)` is `pre(x, h)` for literals and fluents that no discrete effect touches;
///  - `pre(f, h)` is `post(f, h-1)` for fluents without continuous change.
#[derive(Clone, Debug)]
pub struct Variables {
    max_horizon: usize,
    layers: Vec<LayerVars>,
}

impl Variables {
    pub fn new(max_horizon: usize) -> Self {
        Variables {
            max_horizon,
            layers: Vec::new(),
        }
    }

    /// Number of allocated layers. Layers `0..num_layers()` are available.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Ensures that all layers `0..=horizon` exist and returns the range of newly created layers.
    pub fn allocate(
        &mut self,
        model: &mut Model<'_, Label>,
        problem: &GroundProblem,
        effects: &EffectIndex,
        horizon: usize,
    ) -> Result<Range<usize>, EncodingError> {
        if horizon > self.max_horizon {
            return Err(EncodingError::HorizonCeiling {
                horizon,
                ceiling: self.max_horizon,
            });
        }
        if effects.space() != problem.space {
            return Err(EncodingError::IndexSpaceMismatch(format!(
                "effect index built for {:?}, problem has {:?}",
                effects.space(),
                problem.space
            )));
        }
        let first = self.layers.len();
        for h in first..=horizon {
            let layer = self.new_layer(model, problem, effects, h);
            self.layers.push(layer);
        }
        Ok(first..self.layers.len())
    }

    fn new_layer(
        &self,
        model: &mut Model<'_, Label>,
        problem: &GroundProblem,
        effects: &EffectIndex,
        h: usize,
    ) -> LayerVars {
        let prev = if h > 0 { self.layers.get(h - 1) } else { None };
        let time = model.new_rvar(Label::Time(h));
        let elapsed = prev.map(|_| model.new_rvar(Label::Elapsed(h)));

        let mut occurrences = RefVec::new();
        for (a, action) in problem.actions.entries() {
            let start = model.new_bvar(Label::Start(a, h));
            let occ = match action.kind {
                ActionKind::Instantaneous => OccurrenceVars {
                    start,
                    end: start,
                    running: None,
                    duration: None,
                },
                ActionKind::Timed(_) => OccurrenceVars {
                    start,
                    end: start,
                    running: Some(model.new_bvar(Label::Running(a, h))),
                    duration: None,
                },
                ActionKind::Durative(_) => OccurrenceVars {
                    start,
                    end: model.new_bvar(Label::End(a, h)),
                    running: Some(model.new_bvar(Label::Running(a, h))),
                    duration: Some(model.new_rvar(Label::Duration(a, h))),
                },
            };
            occurrences.push(occ);
        }

        let mut literals = RefVec::new();
        for l in problem.space.literals() {
            let pre = match prev {
                Some(prev) => prev.literal(l, Phase::Post),
                None => model.new_bvar(Label::Literal(l, h, Phase::Pre)),
            };
            let post = if effects.touches_literal(l) {
                model.new_bvar(Label::Literal(l, h, Phase::Post))
            } else {
                pre
            };
            literals.push((pre, post));
        }

        let mut fluents = RefVec::new();
        for f in problem.space.fluents() {
            let pre = match prev {
                Some(prev) if effects.flows(f).is_empty() => prev.fluent(f, Phase::Post),
                _ => model.new_rvar(Label::Fluent(f, h, Phase::Pre)),
            };
            let post = if effects.assigners(f).is_empty() {
                pre
            } else {
                model.new_rvar(Label::Fluent(f, h, Phase::Post))
            };
            fluents.push((pre, post));
        }

        LayerVars {
            time,
            elapsed,
            occurrences,
            literals,
            fluents,
        }
    }

    pub fn layer(&self, h: usize) -> Result<&LayerVars, EncodingError> {
        self.layers.get(h).ok_or(EncodingError::IndexOutOfRange {
            kind: EntityKind::Layer,
            index: h,
            size: self.layers.len(),
        })
    }

    pub fn time(&self, h: usize) -> Result<RVar, EncodingError> {
        Ok(self.layer(h)?.time)
    }

    pub fn elapsed(&self, h: usize) -> Result<Option<RVar>, EncodingError> {
        Ok(self.layer(h)?.elapsed)
    }

    pub fn occurrence(&self, a: ActionId, h: usize) -> Result<OccurrenceVars, EncodingError> {
        let layer = self.layer(h)?;
        layer
            .occurrences
            .get(a)
            .copied()
            .ok_or(EncodingError::IndexOutOfRange {
                kind: EntityKind::Action,
                index: usize::from(a),
                size: layer.occurrences.len(),
            })
    }

    /// Running status of an action over the interval preceding layer `h` (`None` when always false).
    pub fn running_before(&self, a: ActionId, h: usize) -> Result<Option<BVar>, EncodingError> {
        if h == 0 {
            Ok(None)
        } else {
            Ok(self.occurrence(a, h - 1)?.running)
        }
    }

    pub fn literal(&self, l: LitId, h: usize, phase: Phase) -> Result<BVar, EncodingError> {
        let layer = self.layer(h)?;
        if usize::from(l) >= layer.literals.len() {
            return Err(EncodingError::IndexOutOfRange {
                kind: EntityKind::Literal,
                index: usize::from(l),
                size: layer.literals.len(),
            });
        }
        Ok(layer.literal(l, phase))
    }

    pub fn fluent(&self, f: FluentId, h: usize, phase: Phase) -> Result<RVar, EncodingError> {
        let layer = self.layer(h)?;
        if usize::from(f) >= layer.fluents.len() {
            return Err(EncodingError::IndexOutOfRange {
                kind: EntityKind::Fluent,
                index: usize::from(f),
                size: layer.fluents.len(),
            });
        }
        Ok(layer.fluent(f, phase))
    }
}
