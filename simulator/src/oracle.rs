use crate::backend::Observation;
use crate::model::{StoreModel, TaskState};

pub(crate) struct Oracle;

impl Oracle {
    pub(crate) fn check(
        tasks: &[TaskState],
        model: &StoreModel,
        observed: &Observation,
    ) -> Result<(), String> {
        let holders: Vec<usize> = tasks.iter().filter(|t| t.holds_lock).map(|t| t.id).collect();
        if holders.len() > 1 {
            return Err(format!("tasks {holders:?} hold the lock at once"));
        }
        if holders.first().copied() != model.lock_owner {
            return Err(format!(
                "lock holders {holders:?} disagree with model owner {:?}",
                model.lock_owner
            ));
        }
        if observed.locked != model.lock_owner.is_some() {
            return Err(format!(
                "handle locked={} but model owner is {:?}",
                observed.locked, model.lock_owner
            ));
        }
        if model.depth > 0 && model.lock_owner.is_none() {
            return Err(format!("transaction depth {} without a lock holder", model.depth));
        }
        if observed.depth != model.depth {
            return Err(format!(
                "transaction depth {} but model expects {}",
                observed.depth, model.depth
            ));
        }
        if observed.physical != (model.depth > 0) {
            return Err(format!(
                "physical transaction active={} at depth {}",
                observed.physical, model.depth
            ));
        }
        if observed.stats != model.stats {
            return Err(format!(
                "physical statements {:?} but model expects {:?}",
                observed.stats, model.stats
            ));
        }
        Ok(())
    }
}
