use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic mailbox-sqlite simulator")]
pub(crate) struct Args {
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) duration: Option<Duration>,
    #[arg(long)]
    pub(crate) iterations: Option<u64>,
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Logical callers competing for the handle's lock.
    #[arg(long, default_value_t = 4)]
    pub(crate) tasks: usize,
    /// Number of distinct config keys the callers write.
    #[arg(long, default_value_t = 8)]
    pub(crate) keys: usize,
    #[arg(long, default_value_t = 4)]
    pub(crate) max_depth: u32,
    #[arg(long, default_value_t = 0.01)]
    pub(crate) reopen_rate: f64,
    #[arg(long, default_value_t = 0.05)]
    pub(crate) sleep_rate: f64,
    #[arg(long, default_value_t = 0.25)]
    pub(crate) release_rate: f64,
    /// Database file; a per-seed file in the temp directory when omitted.
    #[arg(long)]
    pub(crate) db: Option<PathBuf>,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
    #[arg(long)]
    pub(crate) stress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) duration_ms: Option<u64>,
    pub(crate) iterations: Option<u64>,
    pub(crate) seed: u64,
    pub(crate) tasks: usize,
    pub(crate) keys: usize,
    pub(crate) max_depth: u32,
    pub(crate) reopen_rate: f64,
    pub(crate) sleep_rate: f64,
    pub(crate) release_rate: f64,
    pub(crate) db: PathBuf,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
    pub(crate) first_steps: usize,
    pub(crate) tail_steps: usize,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let seed = args.seed.unwrap_or_else(random_seed);
        let mut config = SimConfig {
            duration_ms: args.duration.map(|d| d.as_millis() as u64),
            iterations: args.iterations,
            seed,
            tasks: args.tasks.max(1),
            keys: args.keys.max(1),
            max_depth: args.max_depth.max(1),
            reopen_rate: clamp_rate(args.reopen_rate),
            sleep_rate: clamp_rate(args.sleep_rate),
            release_rate: clamp_rate(args.release_rate),
            db: args.db.unwrap_or_else(|| default_db_path(seed)),
            log: args.log,
            preset: None,
            first_steps: 30,
            tail_steps: 80,
        };

        if args.quick {
            config.apply_quick();
        }
        if args.stress {
            config.apply_stress();
        }

        config
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.iterations = Some(10_000);
        self.duration_ms = None;
        self.tasks = 2;
        self.keys = 4;
        self.max_depth = 3;
        self.reopen_rate = 0.01;
        self.sleep_rate = 0.05;
        self.release_rate = 0.25;
    }

    fn apply_stress(&mut self) {
        self.preset = Some("stress".to_string());
        self.iterations = Some(250_000);
        self.duration_ms = None;
        self.tasks = 16;
        self.keys = 32;
        self.max_depth = 8;
        self.reopen_rate = 0.02;
        self.sleep_rate = 0.08;
        self.release_rate = 0.4;
    }
}

fn default_db_path(seed: u64) -> PathBuf {
    std::env::temp_dir().join(format!("mailbox-sim-{seed}.db"))
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value < 0.0 {
        0.0
    } else if value > 1.0 {
        1.0
    } else {
        value
    }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ (now.subsec_nanos() as u64)
}
