use num_rational::Rational64;
use strata_planning::problem::*;
use strata_planning::samples;
use strata_planning::vars::Phase;
use strata_planning::SolveOutcome;

mod common;
use common::*;

fn r(n: i64) -> Rational64 {
    Rational64::from_integer(n)
}

#[test]
fn instantaneous_action_reaches_goal() {
    let ctx = context();
    let mut enc = encoder(&ctx, samples::reach());
    let reach = action(&enc, "reach");
    assert_eq!(solve_at(&mut enc, 1), SolveOutcome::Satisfiable);
    let plan = enc.plan_model().unwrap();
    assert!(plan.starts(reach, 0).unwrap());
    assert!(plan.ends(reach, 0).unwrap());
    assert!(!plan.starts(reach, 1).unwrap());
    assert!(plan.literal(LitId::from(0usize), 1, Phase::Post).unwrap());
    let happenings = plan.happenings().unwrap();
    assert_eq!(happenings.len(), 1);
    assert_eq!(happenings[0].layer, 0);
    assert_eq!(happenings[0].instant, Instant::Start);
}

#[test]
fn no_room_for_actions() {
    let ctx = context();
    let mut enc = encoder(&ctx, samples::reach());
    assert_eq!(solve_at(&mut enc, 0), SolveOutcome::Unsatisfiable);
    assert!(enc.plan_model().is_none());
}

#[test]
fn durative_action_within_bounds() {
    let ctx = context();
    let mut enc = encoder(&ctx, samples::work());
    let work = action(&enc, "work");
    assert_eq!(solve_at(&mut enc, 2), SolveOutcome::Satisfiable);
    let plan = enc.plan_model().unwrap();
    assert!(plan.starts(work, 0).unwrap());
    assert!(plan.ends(work, 1).unwrap());
    assert!(plan.running(work, 0).unwrap());
    assert!(!plan.running(work, 1).unwrap());
    let elapsed = plan.time(1).unwrap() - plan.time(0).unwrap();
    assert!(elapsed >= r(5) && elapsed <= r(10), "duration {elapsed}");
    assert_eq!(plan.duration(work, 0).unwrap(), elapsed);
    assert_eq!(plan.duration(work, 1).unwrap(), r(0));

    let happenings = plan.happenings().unwrap();
    assert_eq!(happenings.len(), 2);
    assert_eq!((happenings[0].layer, happenings[0].instant), (0, Instant::Start));
    assert_eq!((happenings[1].layer, happenings[1].instant), (1, Instant::End));
    assert_eq!(happenings[1].time - happenings[0].time, elapsed);
}

#[test]
fn durative_action_needs_two_layers() {
    let ctx = context();
    let mut enc = encoder(&ctx, samples::work());
    assert_eq!(solve_at(&mut enc, 1), SolveOutcome::Unsatisfiable);
}

#[test]
fn two_applications_required() {
    let ctx = context();
    let mut enc = encoder(&ctx, samples::burn());
    let burn = action(&enc, "burn");
    let fuel = FluentId::from(0usize);
    assert_eq!(solve_at(&mut enc, 0), SolveOutcome::Unsatisfiable);
    assert_eq!(solve_at(&mut enc, 1), SolveOutcome::Unsatisfiable);
    assert_eq!(solve_at(&mut enc, 2), SolveOutcome::Satisfiable);

    let plan = enc.plan_model().unwrap();
    let happenings = plan.happenings().unwrap();
    assert_eq!(happenings.len(), 2);
    assert!(happenings.iter().all(|h| h.action == burn));
    assert_eq!(plan.fluent(fuel, 0, Phase::Pre).unwrap(), r(10));
    assert_eq!(plan.fluent(fuel, 0, Phase::Post).unwrap(), r(7));
    assert_eq!(plan.fluent(fuel, 2, Phase::Post).unwrap(), r(4));
}

#[test]
fn timed_initial_literal() {
    let ctx = context();
    let mut enc = encoder(&ctx, samples::door());
    let open = action(&enc, "open-door");
    let walk = action(&enc, "walk-through");
    // the door opens at time 4, which cannot be the time of the first layer
    assert_eq!(solve_at(&mut enc, 2), SolveOutcome::Unsatisfiable);
    assert_eq!(solve_at(&mut enc, 3), SolveOutcome::Satisfiable);

    let plan = enc.plan_model().unwrap();
    assert!(plan.starts(open, 1).unwrap());
    assert_eq!(plan.time(1).unwrap(), r(4));
    assert!(plan.starts(walk, 2).unwrap());
    assert!(plan.time(2).unwrap() >= r(4));
    assert!(!plan.running(open, 0).unwrap());
    assert!(plan.running(open, 2).unwrap());
}

#[test]
fn continuous_flow() {
    let ctx = context();
    let mut enc = encoder(&ctx, samples::tank());
    let fill = action(&enc, "fill");
    let level = FluentId::from(0usize);
    assert_eq!(solve_at(&mut enc, 2), SolveOutcome::Satisfiable);

    let plan = enc.plan_model().unwrap();
    assert!(plan.starts(fill, 0).unwrap());
    assert!(plan.ends(fill, 1).unwrap());
    assert_eq!(plan.time(1).unwrap(), r(5));
    assert_eq!(plan.fluent(level, 0, Phase::Post).unwrap(), r(0));
    assert_eq!(plan.fluent(level, 1, Phase::Pre).unwrap(), r(10));
    assert_eq!(plan.fluent(level, 2, Phase::Post).unwrap(), r(10));
}

/// A single durative action achieving `done`, of the given duration.
fn single_durative(duration: DurationConstraint) -> GroundProblem {
    let mut b = ProblemBuilder::new();
    let done = b.literal("done");
    b.action(GroundAction::durative(
        "work",
        duration,
        Condition::True,
        vec![Effect::Timed(Instant::End, vec![Effect::Add(done)])],
    ));
    b.goal(Condition::lit(done));
    b.build()
}

#[test]
fn narrow_open_duration_window() {
    let window = Condition::And(vec![
        Condition::compare(CmpOp::Gt, Expr::Duration, Expr::int(5)),
        Condition::compare(CmpOp::Lt, Expr::Duration, Expr::ratio(1001, 200)),
    ]);
    let ctx = context();
    let mut enc = encoder(&ctx, single_durative(DurationConstraint::Constrained(window)));
    assert_eq!(solve_at(&mut enc, 2), SolveOutcome::Satisfiable);
    let plan = enc.plan_model().unwrap();
    let duration = plan.time(1).unwrap() - plan.time(0).unwrap();
    assert!(duration > r(5), "duration {duration}");
    assert!(duration < Rational64::new(1001, 200), "duration {duration}");
}

#[test]
fn empty_open_duration_window() {
    let window = Condition::And(vec![
        Condition::compare(CmpOp::Gt, Expr::Duration, Expr::int(5)),
        Condition::compare(CmpOp::Lt, Expr::Duration, Expr::int(5)),
    ]);
    let ctx = context();
    let mut enc = encoder(&ctx, single_durative(DurationConstraint::Constrained(window)));
    assert_eq!(solve_at(&mut enc, 2), SolveOutcome::Unsatisfiable);
}

#[test]
fn fractional_duration() {
    let ctx = context();
    let mut enc = encoder(&ctx, single_durative(DurationConstraint::Fixed(Expr::ratio(1, 3))));
    let work = action(&enc, "work");
    assert_eq!(solve_at(&mut enc, 2), SolveOutcome::Satisfiable);
    let plan = enc.plan_model().unwrap();
    assert_eq!(plan.time(1).unwrap(), Rational64::new(1, 3));
    assert_eq!(plan.duration(work, 0).unwrap(), Rational64::new(1, 3));
    let happenings = plan.happenings().unwrap();
    assert_eq!(happenings[1].time, Rational64::new(1, 3));
}

/// Fluents `x = 2` and `y = 3`, with a goal `x * y >= target`.
fn product_goal(target: i64) -> GroundProblem {
    let mut b = ProblemBuilder::new();
    let x = b.fluent("x", r(2));
    let y = b.fluent("y", r(3));
    b.goal(Condition::compare(
        CmpOp::Geq,
        Expr::Mul(vec![Expr::fluent(x), Expr::fluent(y)]),
        Expr::int(target),
    ));
    b.build()
}

#[test]
fn product_of_fluents() {
    let ctx = context();
    let mut enc = encoder(&ctx, product_goal(6));
    assert_eq!(solve_at(&mut enc, 0), SolveOutcome::Satisfiable);
    let plan = enc.plan_model().unwrap();
    assert_eq!(plan.fluent(FluentId::from(0usize), 0, Phase::Pre).unwrap(), r(2));
    assert_eq!(plan.fluent(FluentId::from(1usize), 0, Phase::Pre).unwrap(), r(3));

    let mut enc = encoder(&ctx, product_goal(7));
    assert_eq!(solve_at(&mut enc, 0), SolveOutcome::Unsatisfiable);
}

#[test]
fn quotient_of_fluents() {
    let mut b = ProblemBuilder::new();
    let x = b.fluent("x", r(3));
    let y = b.fluent("y", r(4));
    b.goal(Condition::compare(
        CmpOp::Eq,
        Expr::div(Expr::fluent(x), Expr::fluent(y)),
        Expr::ratio(3, 4),
    ));
    let ctx = context();
    let mut enc = encoder(&ctx, b.build());
    assert_eq!(solve_at(&mut enc, 0), SolveOutcome::Satisfiable);
}

#[test]
fn flow_rate_read_from_fluent() {
    let mut b = ProblemBuilder::new();
    let level = b.fluent("level", r(0));
    let speed = b.fluent("speed", r(2));
    b.action(GroundAction::durative(
        "fill",
        DurationConstraint::Fixed(Expr::int(5)),
        Condition::True,
        vec![Effect::Continuous(FlowDir::Increase, level, Expr::fluent(speed))],
    ));
    b.goal(Condition::compare(CmpOp::Geq, Expr::fluent(level), Expr::int(10)));
    let ctx = context();
    let mut enc = encoder(&ctx, b.build());
    let fill = action(&enc, "fill");
    assert_eq!(solve_at(&mut enc, 1), SolveOutcome::Unsatisfiable);
    assert_eq!(solve_at(&mut enc, 2), SolveOutcome::Satisfiable);

    let plan = enc.plan_model().unwrap();
    assert!(plan.starts(fill, 0).unwrap());
    assert!(plan.ends(fill, 1).unwrap());
    assert_eq!(plan.time(1).unwrap(), r(5));
    assert_eq!(plan.fluent(level, 1, Phase::Pre).unwrap(), r(10));
    assert_eq!(plan.fluent(speed, 1, Phase::Pre).unwrap(), r(2));
}
