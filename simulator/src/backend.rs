use std::path::{Path, PathBuf};

use mailbox_sqlite::{SqliteHandle, SqliteLock, TransactionStats};

use crate::model::{Op, StoreModel, TaskState};

const MISSING: &str = "<missing>";

#[derive(Debug, Clone)]
pub(crate) enum SimError {
    /// Another task holds the lock.
    Contended,
}

#[derive(Debug, Clone)]
pub(crate) struct StepOutcome {
    pub(crate) result: Result<(), SimError>,
    pub(crate) observed: Option<String>,
}

impl StepOutcome {
    fn ok() -> Self {
        Self {
            result: Ok(()),
            observed: None,
        }
    }

    fn observed(value: impl Into<String>) -> Self {
        Self {
            result: Ok(()),
            observed: Some(value.into()),
        }
    }
}

/// What the real handle reports after a step.
#[derive(Debug, Clone)]
pub(crate) struct Observation {
    pub(crate) locked: bool,
    pub(crate) depth: u32,
    pub(crate) physical: bool,
    pub(crate) stats: TransactionStats,
}

struct Held<'h> {
    task: usize,
    lock: SqliteLock<'h>,
}

/// Applies simulated operations to a real handle and keeps the model in step.
pub(crate) struct BackendShim<'h> {
    handle: &'h SqliteHandle,
    path: PathBuf,
    held: Option<Held<'h>>,
    pub(crate) model: StoreModel,
}

impl<'h> BackendShim<'h> {
    pub(crate) fn new(handle: &'h SqliteHandle, path: &Path) -> Result<Self, String> {
        handle
            .lock()
            .open(path)
            .map_err(|err| format!("cannot open {}: {err}", path.display()))?;
        Ok(Self {
            handle,
            path: path.to_path_buf(),
            held: None,
            model: StoreModel::default(),
        })
    }

    pub(crate) fn apply(&mut self, task: &mut TaskState, op: Op) -> Result<StepOutcome, String> {
        match op {
            Op::Sleep(_) => Ok(StepOutcome::ok()),
            Op::Lock => self.lock(task),
            Op::Unlock => self.unlock(task),
            other => self.run_locked(task, other),
        }
    }

    fn lock(&mut self, task: &mut TaskState) -> Result<StepOutcome, String> {
        if task.holds_lock {
            return Err(format!("task {} locked twice; this would deadlock", task.id));
        }
        match self.handle.try_lock() {
            Some(lock) => {
                if let Some(owner) = self.model.lock_owner {
                    return Err(format!(
                        "task {} acquired the lock while task {owner} holds it",
                        task.id
                    ));
                }
                self.held = Some(Held {
                    task: task.id,
                    lock,
                });
                self.model.lock_owner = Some(task.id);
                task.holds_lock = true;
                Ok(StepOutcome::ok())
            }
            None if self.model.lock_owner.is_none() => {
                Err("lock unavailable although no task holds it".to_string())
            }
            None => Ok(StepOutcome {
                result: Err(SimError::Contended),
                observed: None,
            }),
        }
    }

    fn unlock(&mut self, task: &mut TaskState) -> Result<StepOutcome, String> {
        match self.held.take() {
            Some(held) if held.task == task.id => {
                if held.lock.transaction_depth() > 0 {
                    return Err(format!("task {} released the lock inside a transaction", task.id));
                }
                held.lock.unlock();
                self.model.lock_owner = None;
                task.holds_lock = false;
                Ok(StepOutcome::ok())
            }
            Some(held) => Err(format!(
                "task {} unlocked while task {} holds the lock",
                task.id, held.task
            )),
            None => Err(format!("task {} unlocked without holding the lock", task.id)),
        }
    }

    fn run_locked(&mut self, task: &TaskState, op: Op) -> Result<StepOutcome, String> {
        let held = match self.held.as_mut() {
            Some(held) if held.task == task.id => held,
            Some(held) => {
                return Err(format!(
                    "task {} touched the database while task {} holds the lock",
                    task.id, held.task
                ));
            }
            None => return Err(format!("task {} touched the database unlocked", task.id)),
        };
        let db = &mut held.lock;
        let model = &mut self.model;

        match op {
            Op::Begin => {
                db.begin_transaction();
                model.begin();
                Ok(StepOutcome::ok())
            }
            Op::Commit => {
                db.commit().map_err(|err| format!("commit failed: {err}"))?;
                model.commit();
                Ok(StepOutcome::ok())
            }
            Op::Rollback => {
                db.rollback().map_err(|err| format!("rollback failed: {err}"))?;
                model.rollback();
                Ok(StepOutcome::ok())
            }
            Op::Set { key, value } => {
                db.set_int(&key, value)
                    .map_err(|err| format!("set {key} failed: {err}"))?;
                model.set(&key, value.to_string());
                Ok(StepOutcome::ok())
            }
            Op::Get { key } => {
                let got = db.get(&key, MISSING);
                let expected = model.visible(&key).unwrap_or(MISSING);
                if got != expected {
                    return Err(format!("get {key}: expected {expected}, got {got}"));
                }
                Ok(StepOutcome::observed(got))
            }
            Op::Delete { key } => {
                let removed = db
                    .delete(&key)
                    .map_err(|err| format!("delete {key} failed: {err}"))?;
                let expected = model.delete(&key);
                if removed != expected {
                    return Err(format!("delete {key}: expected removed={expected}, got {removed}"));
                }
                Ok(StepOutcome::observed(removed.to_string()))
            }
            Op::Reopen => {
                db.close();
                model.reopen();
                db.open(&self.path)
                    .map_err(|err| format!("reopen failed: {err}"))?;
                verify_committed(db, model)?;
                Ok(StepOutcome::observed(model.committed.len().to_string()))
            }
            Op::Sleep(_) | Op::Lock | Op::Unlock => unreachable!("handled by apply"),
        }
    }

    pub(crate) fn observe(&self) -> Result<Observation, String> {
        let locked = self.handle.is_locked();
        let snapshot = |lock: &SqliteLock<'_>| Observation {
            locked,
            depth: lock.transaction_depth(),
            physical: lock.in_physical_transaction(),
            stats: lock.transaction_stats(),
        };
        match &self.held {
            Some(held) => Ok(snapshot(&held.lock)),
            None => self
                .handle
                .try_lock()
                .map(|lock| snapshot(&lock))
                .ok_or_else(|| "handle is locked but no task holds it".to_string()),
        }
    }

    /// Release any held lock, check the file one last time, and close it.
    pub(crate) fn finish(mut self) -> Result<(), String> {
        let mut db = match self.held.take() {
            Some(held) => held.lock,
            None => self.handle.lock(),
        };
        if db.transaction_depth() > 0 {
            db.close();
            self.model.reopen();
            db.open(&self.path)
                .map_err(|err| format!("final reopen failed: {err}"))?;
        }
        let result = verify_committed(&mut db, &self.model);
        db.close();
        result
    }
}

/// Every committed key reads back, and the table holds no extra rows.
fn verify_committed(db: &mut SqliteLock<'_>, model: &StoreModel) -> Result<(), String> {
    for (key, expected) in &model.committed {
        let got = db.get(key, MISSING);
        if &got != expected {
            return Err(format!("after reopen {key}: expected {expected}, got {got}"));
        }
    }
    let rows: i64 = db
        .prepare_ad_hoc("SELECT COUNT(*) FROM config;")
        .map_err(|err| err.to_string())?
        .query_row([], |row| row.get(0))
        .map_err(|err| err.to_string())?;
    if rows != model.committed.len() as i64 {
        return Err(format!(
            "config holds {rows} rows, expected {}",
            model.committed.len()
        ));
    }
    Ok(())
}
