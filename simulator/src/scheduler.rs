use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

pub(crate) struct FakeClock {
    pub(crate) now_ms: u64,
}

/// Picks which logical caller runs next.
///
/// Tasks are either ready, sleeping until a simulated time, or parked
/// waiting for the handle's lock. Parked tasks only become ready again when
/// the lock holder releases it.
pub(crate) struct Scheduler {
    ready: Vec<usize>,
    timers: BTreeMap<u64, Vec<usize>>,
    parked: Vec<usize>,
    pub(crate) clock: FakeClock,
}

impl Scheduler {
    pub(crate) fn new(task_count: usize) -> Self {
        Self {
            ready: (0..task_count).collect(),
            timers: BTreeMap::new(),
            parked: Vec::new(),
            clock: FakeClock { now_ms: 0 },
        }
    }

    pub(crate) fn sleep(&mut self, task_id: usize, duration_ms: u64) {
        let wake_at = self.clock.now_ms.saturating_add(duration_ms.max(1));
        self.timers.entry(wake_at).or_default().push(task_id);
    }

    pub(crate) fn park(&mut self, task_id: usize) {
        self.parked.push(task_id);
    }

    /// The lock was released: every parked task gets to retry.
    pub(crate) fn unpark_all(&mut self) {
        self.ready.append(&mut self.parked);
    }

    pub(crate) fn parked(&self) -> usize {
        self.parked.len()
    }

    pub(crate) fn advance_time(&mut self, elapsed_ms: u64) {
        self.clock.now_ms = self.clock.now_ms.saturating_add(elapsed_ms.max(1));
        self.wake_due();
    }

    pub(crate) fn next_ready(&mut self, rng: &mut ChaCha8Rng) -> Option<usize> {
        if self.ready.is_empty() {
            let (wake_at, mut tasks) = self.timers.pop_first()?;
            self.clock.now_ms = self.clock.now_ms.max(wake_at);
            self.ready.append(&mut tasks);
            self.wake_due();
        }
        let idx = rng.random_range(0..self.ready.len());
        Some(self.ready.swap_remove(idx))
    }

    pub(crate) fn mark_ready(&mut self, task_id: usize) {
        self.ready.push(task_id);
    }

    fn wake_due(&mut self) {
        while let Some(entry) = self.timers.first_entry() {
            if *entry.key() > self.clock.now_ms {
                break;
            }
            let mut tasks = entry.remove();
            self.ready.append(&mut tasks);
        }
    }
}
