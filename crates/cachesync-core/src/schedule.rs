use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::target::TargetRole;

/// Key identifying one coalesced unit of pending work.
///
/// The archive backend debounces per whole target; the object backend uses a
/// single drain timer over the pending-directory queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKey {
    Target(TargetRole),
    Drain,
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKey::Target(role) => write!(f, "target:{role}"),
            JobKey::Drain => f.write_str("pending-directories"),
        }
    }
}

/// Quiet-period expiry notification sent by an armed timer.
///
/// The generation lets the receiver discard an expiry that raced a re-arm:
/// only the most recently armed timer for a key is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub key: JobKey,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct JobState {
    timer: Option<JoinHandle<()>>,
    generation: u64,
    in_flight: bool,
    rerun: bool,
}

/// Coalesces bursts of change events into one push per key.
///
/// Every `schedule` cancels and replaces the pending timer for its key, so a
/// push fires only after a full quiet period with no further events. A key
/// whose timer expires while a push for it is still running is merged into a
/// follow-up cycle instead of starting a second concurrent push.
///
/// Owned by the orchestrator task; no locking.
#[derive(Debug)]
pub struct DebounceScheduler {
    quiet_period: Duration,
    tx: mpsc::UnboundedSender<Expiry>,
    jobs: HashMap<JobKey, JobState>,
}

impl DebounceScheduler {
    pub fn new(quiet_period: Duration, tx: mpsc::UnboundedSender<Expiry>) -> Self {
        Self {
            quiet_period,
            tx,
            jobs: HashMap::new(),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Arm (or re-arm) the quiet-period timer for `key`.
    pub fn schedule(&mut self, key: JobKey) {
        let state = self.jobs.entry(key.clone()).or_default();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        let generation = state.generation;
        let quiet_period = self.quiet_period;
        let tx = self.tx.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            let _ = tx.send(Expiry { key, generation });
        }));
    }

    /// Handle a timer expiry. Returns `true` when the caller should start a
    /// push now; `false` when the expiry is stale or the key is already in
    /// flight (in which case the work merges into the next cycle).
    pub fn begin(&mut self, expiry: &Expiry) -> bool {
        let Some(state) = self.jobs.get_mut(&expiry.key) else {
            return false;
        };
        if expiry.generation != state.generation {
            // Superseded by a re-arm after this timer fired.
            return false;
        }
        state.timer = None;
        if state.in_flight {
            state.rerun = true;
            false
        } else {
            state.in_flight = true;
            true
        }
    }

    /// Record completion of the in-flight push for `key`. Returns `true`
    /// when a merged job is pending and the caller should re-schedule.
    pub fn complete(&mut self, key: &JobKey) -> bool {
        let Some(state) = self.jobs.get_mut(key) else {
            return false;
        };
        state.in_flight = false;
        std::mem::take(&mut state.rerun)
    }

    /// Drop the bookkeeping for a key whose expiry produced no work.
    pub fn cancel(&mut self, key: &JobKey) {
        if let Some(state) = self.jobs.get_mut(key) {
            state.in_flight = false;
        }
    }
}

/// Deduplicating, ordered set of directories awaiting a diff sync.
///
/// Each directory appears at most once. Entries are removed before being
/// processed, so an event arriving mid-drain re-queues the directory for the
/// next cycle rather than racing the current one.
#[derive(Debug, Default)]
pub struct PendingTargetQueue {
    pending: BTreeSet<PathBuf>,
}

impl PendingTargetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a directory. Returns `false` when it was already pending.
    pub fn push(&mut self, dir: PathBuf) -> bool {
        self.pending.insert(dir)
    }

    /// Remove and return the first pending directory.
    pub fn pop(&mut self) -> Option<PathBuf> {
        self.pending.pop_first()
    }

    /// Remove and return every pending directory.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
