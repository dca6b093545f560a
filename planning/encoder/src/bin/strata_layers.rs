use anyhow::{Context, Result};
use strata_planning::plan::PlanModel;
use strata_planning::problem::Instant;
use strata_planning::samples;
use strata_planning::{EncoderConfig, Encoder, SolveOutcome};
use structopt::StructOpt;

/// Encodes one of the sample planning problems over a bounded number of layers and solves it.
#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "strata-layers", rename_all = "kebab-case")]
pub struct Opt {
    /// Sample problem to solve: one of "reach", "work", "burn", "door", "tank"
    problem: String,

    /// Horizon to encode. If absent, all horizons from `--min-horizon` to `--max-horizon` are tried in order.
    #[structopt(long)]
    horizon: Option<usize>,
    #[structopt(long, default_value = "0")]
    min_horizon: usize,
    #[structopt(long, default_value = "10")]
    max_horizon: usize,

    /// Maximal time of a single solve call, in seconds.
    #[structopt(long)]
    timeout: Option<f64>,

    /// Maximal amount of solver resource units spent in a single solve call.
    #[structopt(long)]
    resource_limit: Option<u32>,

    /// Logging level to use: one of "error", "warn", "info", "debug", "trace"
    #[structopt(short, long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let opt: Opt = Opt::from_args();

    // set up logger
    let subscriber = tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::Uptime::from(std::time::Instant::now()))
        .with_max_level(opt.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let problem = samples::by_name(&opt.problem)
        .with_context(|| format!("Unknown problem `{}`, expected one of {:?}", opt.problem, samples::NAMES))?;
    let timeout = match opt.timeout {
        Some(secs) => Some(std::time::Duration::try_from_secs_f64(secs).context("Invalid timeout")?),
        None => None,
    };
    let defaults = EncoderConfig::default();
    let config = EncoderConfig {
        timeout: timeout.or(defaults.timeout),
        resource_limit: opt.resource_limit.or(defaults.resource_limit),
        ..defaults
    };
    let ctx = z3::Context::new(&z3::Config::new());
    let mut encoder = Encoder::new(&ctx, problem, config)?;

    let horizons = match opt.horizon {
        Some(h) => h..=h,
        None => opt.min_horizon..=opt.max_horizon,
    };
    for horizon in horizons {
        encoder.encode(horizon)?;
        let outcome = encoder.solve()?;
        println!("horizon {horizon}: {outcome}");
        if outcome == SolveOutcome::Satisfiable {
            let plan = encoder.plan_model().context("No model available for a satisfiable formula")?;
            print_happenings(&plan)?;
            break;
        }
    }
    if let Some(session) = encoder.session() {
        tracing::info!("solver statistics:\n{}", session.stats());
    }
    Ok(())
}

fn print_happenings(plan: &PlanModel) -> Result<()> {
    for happening in plan.happenings()? {
        let action = plan.problem().action_name(happening.action);
        let instant = match happening.instant {
            Instant::Start => "start",
            Instant::End => "end",
        };
        println!(
            "{:>4} {:>10}  {action} ({instant})",
            happening.layer,
            happening.time.to_string()
        );
    }
    Ok(())
}
