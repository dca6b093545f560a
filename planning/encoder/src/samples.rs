//! Small ground problems, used by the tests and the demonstration binary.

use crate::problem::*;
use num_rational::Rational64;

/// One instantaneous action reaching the goal.
pub fn reach() -> GroundProblem {
    let mut b = ProblemBuilder::new();
    let at_goal = b.literal("at-goal");
    b.action(GroundAction::instantaneous(
        "reach",
        Condition::True,
        vec![Effect::Add(at_goal)],
    ));
    b.goal(Condition::lit(at_goal));
    b.build()
}

/// A durative action of duration in `[5, 10]` achieving the goal at its end.
pub fn work() -> GroundProblem {
    let mut b = ProblemBuilder::new();
    let done = b.literal("done");
    b.action(GroundAction::durative(
        "work",
        DurationConstraint::Bounded {
            min: Expr::int(5),
            max: Expr::int(10),
        },
        Condition::True,
        vec![Effect::Timed(Instant::End, vec![Effect::Add(done)])],
    ));
    b.goal(Condition::lit(done));
    b.build()
}

/// Each burn consumes 3 units of fuel, two of them are needed to go from 10 to at most 5.
pub fn burn() -> GroundProblem {
    let mut b = ProblemBuilder::new();
    let fuel = b.fluent("fuel", Rational64::from_integer(10));
    b.action(GroundAction::instantaneous(
        "burn",
        Condition::True,
        vec![Effect::Assign(
            AssignOp::Assign,
            fuel,
            Expr::sub(Expr::fluent(fuel), Expr::int(3)),
        )],
    ));
    b.goal(Condition::compare(CmpOp::Leq, Expr::fluent(fuel), Expr::int(5)));
    b.build()
}

/// A door opens at time 4 (timed initial literal) and must be open to walk through it.
pub fn door() -> GroundProblem {
    let mut b = ProblemBuilder::new();
    let open = b.literal("door-open");
    let outside = b.literal("outside");
    b.action(GroundAction::timed_literal(
        "open-door",
        Rational64::from_integer(4),
        vec![Effect::Add(open)],
    ));
    b.action(GroundAction::instantaneous(
        "walk-through",
        Condition::lit(open),
        vec![Effect::Add(outside)],
    ));
    b.goal(Condition::lit(outside));
    b.build()
}

/// Filling a tank at a rate of 2 units per time unit for 5 time units.
pub fn tank() -> GroundProblem {
    let mut b = ProblemBuilder::new();
    let level = b.fluent("level", Rational64::from_integer(0));
    let filling = b.literal("filling");
    b.action(GroundAction::durative(
        "fill",
        DurationConstraint::Fixed(Expr::int(5)),
        Condition::timed(TimeSpec::AtStart, Condition::not(Condition::lit(filling))),
        vec![
            Effect::Timed(Instant::Start, vec![Effect::Add(filling)]),
            Effect::Timed(Instant::End, vec![Effect::Delete(filling)]),
            Effect::Continuous(FlowDir::Increase, level, Expr::int(2)),
        ],
    ));
    b.goal(Condition::And(vec![
        Condition::compare(CmpOp::Geq, Expr::fluent(level), Expr::int(10)),
        Condition::not(Condition::lit(filling)),
    ]));
    b.build()
}

/// Names of the sample problems, as accepted by [`by_name`].
pub const NAMES: [&str; 5] = ["reach", "work", "burn", "door", "tank"];

pub fn by_name(name: &str) -> Option<GroundProblem> {
    match name {
        "reach" => Some(reach()),
        "work" => Some(work()),
        "burn" => Some(burn()),
        "door" => Some(door()),
        "tank" => Some(tank()),
        _ => None,
    }
}
