use num_rational::Rational64;
use std::sync::Arc;
use std::time::Duration;
use strata::params::Limits;
use strata_planning::effects::EffectIndex;
use strata_planning::error::EntityKind;
use strata_planning::problem::*;
use strata_planning::samples;
use strata_planning::translate::Mode;
use strata_planning::vars::Phase;
use strata_planning::{Encoder, EncoderConfig, EncodingError, SolveOutcome};

mod common;
use common::*;

fn with_goal(goal: Condition) -> GroundProblem {
    let mut b = ProblemBuilder::new();
    let x = b.literal("x");
    b.action(GroundAction::instantaneous("set-x", Condition::True, vec![Effect::Add(x)]));
    b.goal(goal);
    b.build()
}

fn with_fluent_condition(condition: Condition) -> GroundProblem {
    let mut b = ProblemBuilder::new();
    let done = b.literal("done");
    b.fluent("speed", Rational64::from_integer(2));
    b.action(GroundAction::instantaneous("go", condition, vec![Effect::Add(done)]));
    b.goal(Condition::lit(done));
    b.build()
}

#[test]
fn horizon_ceiling() {
    let ctx = context();
    let mut enc = encoder(&ctx, samples::reach());
    let err = enc.encode(9).unwrap_err();
    assert_eq!(err, EncodingError::HorizonCeiling { horizon: 9, ceiling: 8 });
    assert!(err.is_resource());
    assert!(enc.encode(8).is_ok());
}

#[test]
fn nothing_encoded() {
    let ctx = context();
    let mut enc = encoder(&ctx, samples::reach());
    assert_eq!(enc.solve(), Err(EncodingError::NotEncoded));
    assert_eq!(
        enc.translate_condition(&Condition::True, Mode::Goal { horizon: 0 }),
        Err(EncodingError::NotEncoded)
    );
    assert!(enc.plan_model().is_none());
}

#[test]
fn malformed_durations() {
    let durative = |constraint| {
        let mut b = ProblemBuilder::new();
        let done = b.literal("done");
        b.action(GroundAction::durative(
            "work",
            constraint,
            Condition::True,
            vec![Effect::Timed(Instant::End, vec![Effect::Add(done)])],
        ));
        b.goal(Condition::lit(done));
        b.build()
    };
    let ctx = context();
    let inverted = durative(DurationConstraint::Bounded {
        min: Expr::int(10),
        max: Expr::int(5),
    });
    assert!(matches!(
        Encoder::new(&ctx, inverted, config()),
        Err(EncodingError::MalformedDuration { action, .. }) if action == "work"
    ));
    let negative = durative(DurationConstraint::Fixed(Expr::int(-1)));
    assert!(matches!(
        Encoder::new(&ctx, negative, config()),
        Err(EncodingError::MalformedDuration { .. })
    ));
    // only detected once the expression is folded
    let negative = durative(DurationConstraint::Fixed(Expr::sub(Expr::int(1), Expr::int(2))));
    let mut enc = encoder(&ctx, negative);
    assert!(matches!(enc.encode(1), Err(EncodingError::MalformedDuration { .. })));
}

#[test]
fn out_of_range_goal() {
    let problem = with_goal(Condition::lit(LitId::from(5usize)));
    let ctx = context();
    assert_eq!(
        Encoder::new(&ctx, problem, config()).err(),
        Some(EncodingError::IndexOutOfRange {
            kind: EntityKind::Literal,
            index: 5,
            size: 1
        })
    );
}

#[test]
fn division_by_zero() {
    let speed = FluentId::from(0usize);
    let problem = with_fluent_condition(Condition::compare(
        CmpOp::Geq,
        Expr::div(Expr::fluent(speed), Expr::int(0)),
        Expr::int(1),
    ));
    let ctx = context();
    let mut enc = encoder(&ctx, problem);
    assert_eq!(enc.encode(1), Err(EncodingError::DivisionByZero));
    // the partial encoding is discarded
    assert_eq!(enc.horizon(), None);
    assert!(enc.session().is_none());
}

#[test]
fn non_linear_expressions() {
    let speed = FluentId::from(0usize);
    let squared = |bound| {
        with_fluent_condition(Condition::compare(
            CmpOp::Geq,
            Expr::Mul(vec![Expr::fluent(speed), Expr::fluent(speed)]),
            Expr::int(bound),
        ))
    };
    let ctx = context();
    let mut enc = encoder(&ctx, squared(4));
    assert_eq!(solve_at(&mut enc, 1), SolveOutcome::Satisfiable);
    let mut enc = encoder(&ctx, squared(5));
    assert_eq!(solve_at(&mut enc, 1), SolveOutcome::Unsatisfiable);

    // the divisor is only known to the solver
    let problem = with_fluent_condition(Condition::compare(
        CmpOp::Eq,
        Expr::div(Expr::int(1), Expr::fluent(speed)),
        Expr::ratio(1, 2),
    ));
    let mut enc = encoder(&ctx, problem);
    assert_eq!(solve_at(&mut enc, 1), SolveOutcome::Satisfiable);
}

#[test]
fn rate_of_changing_fluent() {
    let mut b = ProblemBuilder::new();
    let level = b.fluent("level", Rational64::from_integer(0));
    let speed = b.fluent("speed", Rational64::from_integer(1));
    b.action(GroundAction::durative(
        "accelerate",
        DurationConstraint::Fixed(Expr::int(2)),
        Condition::True,
        vec![
            Effect::Continuous(FlowDir::Increase, speed, Expr::int(1)),
            Effect::Continuous(FlowDir::Increase, level, Expr::fluent(speed)),
        ],
    ));
    b.goal(Condition::compare(CmpOp::Geq, Expr::fluent(level), Expr::int(4)));
    let ctx = context();
    let mut enc = encoder(&ctx, b.build());
    assert!(matches!(enc.encode(1), Err(EncodingError::Unsupported(_))));
    assert!(enc.session().is_none());
}

#[test]
fn initial_values() {
    let mut b = ProblemBuilder::new();
    let third = b.fluent("third", Rational64::new(1, 3));
    let huge = b.fluent("huge", Rational64::new(i64::MAX, 3));
    b.goal(Condition::compare(CmpOp::Lt, Expr::fluent(third), Expr::fluent(huge)));
    let ctx = context();
    let mut enc = encoder(&ctx, b.build());
    assert_eq!(solve_at(&mut enc, 0), SolveOutcome::Satisfiable);
    let plan = enc.plan_model().unwrap();
    assert_eq!(plan.fluent(third, 0, Phase::Pre).unwrap(), Rational64::new(1, 3));
    assert_eq!(plan.fluent(huge, 0, Phase::Post).unwrap(), Rational64::new(i64::MAX, 3));

    let mut b = ProblemBuilder::new();
    b.undefined_fluent("speed");
    assert_eq!(
        Encoder::new(&ctx, b.build(), config()).err(),
        Some(EncodingError::UndefinedFluent("speed".to_string()))
    );
}

#[test]
fn invalid_config() {
    let ctx = context();
    let no_time = EncoderConfig {
        timeout: Some(Duration::ZERO),
        ..config()
    };
    assert!(matches!(
        Encoder::new(&ctx, samples::reach(), no_time),
        Err(EncodingError::InvalidConfig(_))
    ));
    let no_resource = EncoderConfig {
        resource_limit: Some(0),
        ..config()
    };
    assert!(matches!(
        Encoder::new(&ctx, samples::reach(), no_resource),
        Err(EncodingError::InvalidConfig(_))
    ));
}

#[test]
fn effect_without_instant() {
    let mut b = ProblemBuilder::new();
    let done = b.literal("done");
    b.action(GroundAction::durative(
        "work",
        DurationConstraint::Fixed(Expr::int(1)),
        Condition::True,
        vec![Effect::Add(done)],
    ));
    let ctx = context();
    assert!(matches!(
        Encoder::new(&ctx, b.build(), config()),
        Err(EncodingError::ModeMismatch { .. })
    ));
}

#[test]
fn index_space_mismatch() {
    let work = samples::work();
    let effects = Arc::new(EffectIndex::build(&work).unwrap());
    let burn = Arc::new(samples::burn());
    let ctx = context();
    assert!(matches!(
        Encoder::with_shared(&ctx, burn, effects, config()),
        Err(EncodingError::IndexSpaceMismatch(_))
    ));
}

#[test]
fn limited_then_unlimited_solve() {
    let ctx = context();
    let config = EncoderConfig {
        resource_limit: Some(1),
        ..config()
    };
    // two burns are needed, a single layer only allows one
    let mut enc = Encoder::new(&ctx, samples::burn(), config).unwrap();
    let outcome = solve_at(&mut enc, 1);
    assert!(
        matches!(outcome, SolveOutcome::Unsatisfiable | SolveOutcome::Unknown(_)),
        "{outcome}"
    );
    assert!(enc.plan_model().is_none());

    enc.set_limits(Limits::unlimited());
    assert_eq!(enc.solve().unwrap(), SolveOutcome::Unsatisfiable);
    assert_eq!(enc.solve().unwrap(), SolveOutcome::Unsatisfiable);
    assert!(enc.plan_model().is_none());
    assert_eq!(solve_at(&mut enc, 2), SolveOutcome::Satisfiable);
}
