#![allow(dead_code)]

use std::time::Duration;
use strata_planning::problem::{ActionId, GroundProblem};
use strata_planning::{Encoder, EncoderConfig, SolveOutcome};
use z3::{Config, Context};

pub fn context() -> Context {
    Context::new(&Config::new())
}

/// A configuration independent of the environment.
pub fn config() -> EncoderConfig {
    EncoderConfig {
        max_horizon: 8,
        timeout: Some(Duration::from_secs(60)),
        resource_limit: None,
    }
}

pub fn encoder(ctx: &Context, problem: GroundProblem) -> Encoder<'_> {
    Encoder::new(ctx, problem, config()).unwrap()
}

pub fn solve_at(encoder: &mut Encoder<'_>, horizon: usize) -> SolveOutcome {
    encoder.encode(horizon).unwrap();
    encoder.solve().unwrap()
}

pub fn action(encoder: &Encoder<'_>, name: &str) -> ActionId {
    encoder
        .problem()
        .actions
        .entries()
        .find(|(_, a)| a.name == name)
        .map(|(id, _)| id)
        .unwrap()
}
