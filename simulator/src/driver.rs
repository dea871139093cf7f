use std::path::Path;

use mailbox_sqlite::SqliteHandle;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::args::SimConfig;
use crate::backend::{BackendShim, SimError};
use crate::logging::EventLog;
use crate::model::{Op, StoreModel, TaskState};
use crate::oracle::Oracle;
use crate::scheduler::Scheduler;

pub(crate) fn run(config: SimConfig, rng: &mut ChaCha8Rng) -> Result<(), String> {
    remove_db_files(&config.db);
    let handle = SqliteHandle::new(format!("simulator-{}", config.seed));
    let mut events = EventLog::new(config.first_steps, config.tail_steps);
    let result = simulate(&handle, &config, &mut events, rng);
    if let Err(reason) = &result {
        events.dump_failure(reason);
    }
    drop(handle);
    remove_db_files(&config.db);
    result
}

fn simulate(
    handle: &SqliteHandle,
    config: &SimConfig,
    events: &mut EventLog,
    rng: &mut ChaCha8Rng,
) -> Result<(), String> {
    let mut backend = BackendShim::new(handle, &config.db)?;
    let mut tasks: Vec<TaskState> = (0..config.tasks)
        .map(|id| TaskState {
            id,
            holds_lock: false,
        })
        .collect();
    let mut scheduler = Scheduler::new(config.tasks);

    let max_steps = config.iterations.unwrap_or(u64::MAX);
    let max_time = config.duration_ms.unwrap_or(u64::MAX);

    let mut step: u64 = 0;
    while step < max_steps && scheduler.clock.now_ms <= max_time {
        let Some(task_id) = scheduler.next_ready(rng) else {
            return Err(format!(
                "no runnable task; {} parked on the lock",
                scheduler.parked()
            ));
        };
        let op = next_op(&tasks[task_id], &backend.model, config, rng);
        let op_display = format_op(&op);
        let outcome = backend.apply(&mut tasks[task_id], op.clone())?;

        match (&op, &outcome.result) {
            (Op::Sleep(ms), _) => scheduler.sleep(task_id, *ms),
            (_, Err(SimError::Contended)) => scheduler.park(task_id),
            (Op::Unlock, Ok(())) => {
                scheduler.unpark_all();
                scheduler.mark_ready(task_id);
            }
            _ => scheduler.mark_ready(task_id),
        }

        let result_label = match &outcome.result {
            Ok(()) => "Ok".to_string(),
            Err(err) => format!("Err({err:?})"),
        };
        let observed_label = outcome.observed.as_deref().unwrap_or("-");
        events.record(format!(
            "step={} time={}ms task={} op={} depth={} result={} observed={}",
            step,
            scheduler.clock.now_ms,
            task_id,
            op_display,
            backend.model.depth,
            result_label,
            observed_label
        ));

        let observed = backend.observe()?;
        Oracle::check(&tasks, &backend.model, &observed)?;
        scheduler.advance_time(1);
        step += 1;
    }

    let stats = backend.model.stats;
    let committed_keys = backend.model.committed.len();
    backend.finish()?;

    tracing::info!(
        "complete: steps={} time={}ms tasks={} begins={} commits={} rollbacks={} keys={}",
        step,
        scheduler.clock.now_ms,
        config.tasks,
        stats.begins,
        stats.commits,
        stats.rollbacks,
        committed_keys
    );
    Ok(())
}

fn next_op(task: &TaskState, model: &StoreModel, config: &SimConfig, rng: &mut ChaCha8Rng) -> Op {
    if rng.random::<f64>() < config.sleep_rate {
        return Op::Sleep(rng.random_range(1..=50));
    }

    if !task.holds_lock {
        return Op::Lock;
    }

    let key = format!("k{}", rng.random_range(0..config.keys));
    let value: i32 = rng.random();
    let mut weights = vec![
        (Op::Set { key: key.clone(), value }, 0.25),
        (Op::Get { key: key.clone() }, 0.20),
        (Op::Delete { key }, 0.05),
        (Op::Reopen, config.reopen_rate),
    ];
    if model.depth < config.max_depth {
        weights.push((Op::Begin, 0.15));
    }
    if model.depth > 0 {
        weights.push((Op::Commit, 0.12));
        weights.push((Op::Rollback, 0.06));
    } else {
        weights.push((Op::Unlock, config.release_rate));
        // unbalanced calls must be harmless no-ops
        weights.push((Op::Commit, 0.01));
        weights.push((Op::Rollback, 0.01));
    }
    choose_weighted(&weights, rng)
}

fn choose_weighted(items: &[(Op, f64)], rng: &mut ChaCha8Rng) -> Op {
    let total: f64 = items.iter().map(|(_, weight)| weight.max(0.0)).sum();
    if total <= f64::EPSILON {
        return items
            .first()
            .map(|(op, _)| op.clone())
            .unwrap_or(Op::Sleep(1));
    }
    let mut target = rng.random::<f64>() * total;
    for (op, weight) in items {
        let w = weight.max(0.0);
        if w > 0.0 && target <= w {
            return op.clone();
        }
        target -= w;
    }
    items
        .last()
        .map(|(op, _)| op.clone())
        .unwrap_or(Op::Sleep(1))
}

fn format_op(op: &Op) -> String {
    match op {
        Op::Sleep(ms) => format!("Sleep({ms}ms)"),
        Op::Set { key, value } => format!("Set({key}={value})"),
        Op::Get { key } => format!("Get({key})"),
        Op::Delete { key } => format!("Delete({key})"),
        other => format!("{other:?}"),
    }
}

fn remove_db_files(path: &Path) {
    let _ = std::fs::remove_file(path);
    for suffix in ["-journal", "-wal", "-shm"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        let _ = std::fs::remove_file(side);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::path::PathBuf;

    fn config(db: PathBuf, seed: u64) -> SimConfig {
        SimConfig {
            duration_ms: None,
            iterations: Some(2_000),
            seed,
            tasks: 3,
            keys: 4,
            max_depth: 3,
            reopen_rate: 0.02,
            sleep_rate: 0.05,
            release_rate: 0.3,
            db,
            log: None,
            preset: None,
            first_steps: 10,
            tail_steps: 20,
        }
    }

    #[test]
    fn seeded_runs_pass_the_oracle() {
        let dir = std::env::temp_dir();
        for seed in [1_u64, 42, 9_001] {
            let db = dir.join(format!("mailbox-sim-test-{}-{seed}.db", std::process::id()));
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            run(config(db.clone(), seed), &mut rng).unwrap();
            assert!(!db.exists());
        }
    }

    #[test]
    fn weighted_choice_skips_zero_weights() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            let op = choose_weighted(&[(Op::Reopen, 0.0), (Op::Begin, 1.0)], &mut rng);
            assert!(matches!(op, Op::Begin));
        }
    }
}
