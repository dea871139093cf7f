mod args;
mod backend;
mod driver;
mod logging;
mod model;
mod oracle;
mod scheduler;

use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::args::{Args, SimConfig};

fn main() -> ExitCode {
    let config = SimConfig::from_args(Args::parse());
    if let Err(err) = logging::install(config.log.clone()) {
        eprintln!("cannot set up logging: {err}");
        return ExitCode::FAILURE;
    }

    match serde_json::to_string(&config) {
        Ok(json) => tracing::info!(config = %json, "starting simulation"),
        Err(err) => tracing::warn!(error = %err, "cannot serialize simulation config"),
    }

    let seed = config.seed;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    match driver::run(config, &mut rng) {
        Ok(()) => ExitCode::SUCCESS,
        Err(reason) => {
            eprintln!("simulation failed (seed {seed}): {reason}");
            ExitCode::FAILURE
        }
    }
}
