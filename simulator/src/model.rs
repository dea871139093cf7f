use std::collections::BTreeMap;

use mailbox_sqlite::TransactionStats;

#[derive(Debug, Clone)]
pub(crate) enum Op {
    Lock,
    Unlock,
    Begin,
    Commit,
    Rollback,
    Set { key: String, value: i32 },
    Get { key: String },
    Delete { key: String },
    Reopen,
    Sleep(u64),
}

#[derive(Debug, Clone)]
pub(crate) struct TaskState {
    pub(crate) id: usize,
    pub(crate) holds_lock: bool,
}

/// What the handle should look like after every step.
///
/// Writes made inside a transaction sit in `pending` until the outermost
/// level commits. Inner rollbacks discard nothing; only the outermost level
/// decides.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreModel {
    pub(crate) committed: BTreeMap<String, String>,
    pub(crate) pending: BTreeMap<String, Option<String>>,
    pub(crate) depth: u32,
    pub(crate) lock_owner: Option<usize>,
    pub(crate) stats: TransactionStats,
}

impl StoreModel {
    pub(crate) fn begin(&mut self) {
        if self.depth == 0 {
            self.stats.begins += 1;
        }
        self.depth += 1;
    }

    pub(crate) fn commit(&mut self) {
        match self.depth {
            0 => {}
            1 => {
                self.depth = 0;
                self.stats.commits += 1;
                for (key, value) in std::mem::take(&mut self.pending) {
                    match value {
                        Some(value) => self.committed.insert(key, value),
                        None => self.committed.remove(&key),
                    };
                }
            }
            _ => self.depth -= 1,
        }
    }

    pub(crate) fn rollback(&mut self) {
        match self.depth {
            0 => {}
            1 => {
                self.depth = 0;
                self.stats.rollbacks += 1;
                self.pending.clear();
            }
            _ => self.depth -= 1,
        }
    }

    pub(crate) fn set(&mut self, key: &str, value: String) {
        if self.depth == 0 {
            self.committed.insert(key.to_string(), value);
        } else {
            self.pending.insert(key.to_string(), Some(value));
        }
    }

    /// Returns whether the key was visible before the delete.
    pub(crate) fn delete(&mut self, key: &str) -> bool {
        let existed = self.visible(key).is_some();
        if self.depth == 0 {
            self.committed.remove(key);
        } else {
            self.pending.insert(key.to_string(), None);
        }
        existed
    }

    pub(crate) fn visible(&self, key: &str) -> Option<&str> {
        match self.pending.get(key) {
            Some(value) => value.as_deref(),
            None => self.committed.get(key).map(String::as_str),
        }
    }

    /// Closing the connection discards the open transaction.
    pub(crate) fn reopen(&mut self) {
        self.depth = 0;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_rollback_keeps_pending_writes() {
        let mut model = StoreModel::default();
        model.begin();
        model.set("a", "1".into());
        model.begin();
        model.set("b", "2".into());
        model.rollback();
        assert_eq!(model.visible("b"), Some("2"));
        model.commit();
        assert_eq!(model.committed.get("a").map(String::as_str), Some("1"));
        assert_eq!(model.committed.get("b").map(String::as_str), Some("2"));
        assert_eq!(model.stats.begins, 1);
        assert_eq!(model.stats.commits, 1);
        assert_eq!(model.stats.rollbacks, 0);
    }

    #[test]
    fn outer_rollback_discards_everything() {
        let mut model = StoreModel::default();
        model.set("kept", "1".into());
        model.begin();
        model.delete("kept");
        model.begin();
        model.set("lost", "2".into());
        model.commit();
        assert_eq!(model.visible("kept"), None);
        model.rollback();
        assert_eq!(model.visible("kept"), Some("1"));
        assert_eq!(model.visible("lost"), None);
        assert_eq!(model.depth, 0);
    }

    #[test]
    fn unbalanced_commit_is_ignored() {
        let mut model = StoreModel::default();
        model.commit();
        model.rollback();
        assert_eq!(model.depth, 0);
        assert_eq!(model.stats, TransactionStats::default());
    }
}
