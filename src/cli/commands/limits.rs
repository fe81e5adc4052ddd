use crate::limiter::RateLimitPolicy;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_BURST: &str = "rate-limit-burst";
pub const ARG_REFILL: &str = "rate-limit-refill";
pub const ARG_IDLE: &str = "rate-limit-idle-seconds";
pub const ARG_SWEEP: &str = "rate-limit-sweep-seconds";

/// Build the per-address admission policy from the parsed flags.
///
/// # Errors
/// Returns an error if a value is missing or the refill rate is not positive.
pub fn policy(matches: &ArgMatches) -> Result<RateLimitPolicy> {
    let burst = matches
        .get_one::<u32>(ARG_BURST)
        .copied()
        .context("missing required argument: --rate-limit-burst")?;
    let refill = matches
        .get_one::<f64>(ARG_REFILL)
        .copied()
        .context("missing required argument: --rate-limit-refill")?;
    if !(refill.is_finite() && refill > 0.0) {
        anyhow::bail!("--rate-limit-refill must be a positive number, got {refill}");
    }
    let idle = matches
        .get_one::<u64>(ARG_IDLE)
        .copied()
        .context("missing required argument: --rate-limit-idle-seconds")?;
    let sweep = matches
        .get_one::<u64>(ARG_SWEEP)
        .copied()
        .context("missing required argument: --rate-limit-sweep-seconds")?;

    Ok(RateLimitPolicy::new()
        .with_burst(burst)
        .with_refill_per_second(refill)
        .with_idle_after(Duration::from_secs(idle))
        .with_sweep_every(Duration::from_secs(sweep)))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BURST)
                .long("rate-limit-burst")
                .help("Requests a single address may make back to back")
                .env("CUSTODIAN_RATE_LIMIT_BURST")
                .default_value("4")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFILL)
                .long("rate-limit-refill")
                .help("Tokens returned to each address per second")
                .env("CUSTODIAN_RATE_LIMIT_REFILL")
                .default_value("2.0")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_IDLE)
                .long("rate-limit-idle-seconds")
                .help("Forget an address after this many idle seconds")
                .env("CUSTODIAN_RATE_LIMIT_IDLE_SECONDS")
                .default_value("180")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SWEEP)
                .long("rate-limit-sweep-seconds")
                .help("Interval between idle address sweeps")
                .env("CUSTODIAN_RATE_LIMIT_SWEEP_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
