use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::SyncError;
use crate::event::ChangeEvent;
use crate::machine::{SyncAction, SyncSignal, SyncStateMachine};
use crate::replicator::{CoalesceMode, PushUnit, Replicator};
use crate::retry::with_retry;
use crate::schedule::{DebounceScheduler, Expiry, JobKey, PendingTargetQueue};
use crate::target::WatchTarget;
use crate::watcher::WatcherMessage;

/// Messages multiplexed into the control loop from outside the watcher:
/// the host's bootstrap-finished signal and push-task completions.
#[derive(Debug)]
pub enum LoopMsg {
    BootstrapFinished,
    PushDone {
        key: JobKey,
        result: Result<(), SyncError>,
    },
}

/// Cheap handle for signalling the running orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<LoopMsg>,
}

impl OrchestratorHandle {
    /// Host-supplied "initial build finished" signal. Gates log verbosity
    /// only.
    pub fn bootstrap_finished(&self) {
        let _ = self.tx.send(LoopMsg::BootstrapFinished);
    }
}

/// Wires watcher, state machine, scheduler and replicator together.
///
/// All in-memory state (machine, scheduler, pending queue) is owned by the
/// single `run` task; watcher callbacks, timers and transfers only ever talk
/// to it over channels, so none of it needs locking. Transfers run
/// concurrently with continued watching and their completions are folded
/// back into the loop.
pub struct SyncOrchestrator {
    targets: Vec<WatchTarget>,
    replicator: Arc<dyn Replicator>,
    machine: SyncStateMachine,
    scheduler: DebounceScheduler,
    queue: PendingTargetQueue,
    watch_rx: mpsc::UnboundedReceiver<WatcherMessage>,
    loop_tx: mpsc::UnboundedSender<LoopMsg>,
    loop_rx: mpsc::UnboundedReceiver<LoopMsg>,
    expiry_rx: mpsc::UnboundedReceiver<Expiry>,
}

impl SyncOrchestrator {
    pub fn new(
        targets: Vec<WatchTarget>,
        replicator: Arc<dyn Replicator>,
        quiet_period: Duration,
        watch_rx: mpsc::UnboundedReceiver<WatcherMessage>,
    ) -> Self {
        let (loop_tx, loop_rx) = mpsc::unbounded_channel();
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Self {
            targets,
            replicator,
            machine: SyncStateMachine::new(),
            scheduler: DebounceScheduler::new(quiet_period, expiry_tx),
            queue: PendingTargetQueue::new(),
            watch_rx,
            loop_tx,
            loop_rx,
            expiry_rx,
        }
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            tx: self.loop_tx.clone(),
        }
    }

    /// Run the control loop until every input channel closes.
    pub async fn run(mut self) -> Result<(), SyncError> {
        info!(
            "watching {} target(s), quiet period {:?}",
            self.targets.len(),
            self.scheduler.quiet_period()
        );
        loop {
            tokio::select! {
                Some(msg) = self.watch_rx.recv() => self.on_watcher(msg),
                Some(expiry) = self.expiry_rx.recv() => self.on_expiry(expiry),
                Some(msg) = self.loop_rx.recv() => self.on_loop(msg),
                else => break,
            }
        }
        Ok(())
    }

    fn on_watcher(&mut self, msg: WatcherMessage) {
        match msg {
            WatcherMessage::ScanComplete => {
                self.machine.dispatch(SyncSignal::ScanComplete);
                info!("initial scan complete; watching for changes");
            }
            WatcherMessage::Event(event) => {
                // Bootstrap gating affects verbosity only: the build host's
                // own churn is noise until its first build finishes.
                if self.machine.bootstrapped() {
                    info!(
                        "{} {} at {}",
                        event.op.as_str(),
                        event.kind.as_str(),
                        event.path.display()
                    );
                } else {
                    debug!(
                        "{} {} at {}",
                        event.op.as_str(),
                        event.kind.as_str(),
                        event.path.display()
                    );
                }
                if let SyncAction::Schedule(event) =
                    self.machine.dispatch(SyncSignal::Change(event))
                {
                    self.schedule_event(&event);
                }
            }
        }
    }

    fn schedule_event(&mut self, event: &ChangeEvent) {
        let Some(target) = self.targets.iter().find(|t| t.owns(&event.path)) else {
            debug!("event outside watched targets: {}", event.path.display());
            return;
        };
        match self.replicator.coalesce_mode() {
            CoalesceMode::WholeTarget => {
                self.scheduler.schedule(JobKey::Target(target.role));
            }
            CoalesceMode::DirectoryGranular => {
                let dir = containing_directory(event, &target.local_path);
                if self.queue.push(dir.clone()) {
                    debug!("queued directory {}", dir.display());
                }
                self.scheduler.schedule(JobKey::Drain);
            }
        }
    }

    fn on_expiry(&mut self, expiry: Expiry) {
        if !self.scheduler.begin(&expiry) {
            return;
        }
        let unit = match &expiry.key {
            JobKey::Target(role) => {
                match self.targets.iter().find(|t| t.role == *role) {
                    Some(target) => PushUnit::Target(target.clone()),
                    None => {
                        self.scheduler.cancel(&expiry.key);
                        return;
                    }
                }
            }
            JobKey::Drain => {
                let dirs = self.queue.drain();
                if dirs.is_empty() {
                    self.scheduler.cancel(&expiry.key);
                    return;
                }
                PushUnit::Directories(dirs)
            }
        };
        self.spawn_push(expiry.key, unit);
    }

    fn spawn_push(&self, key: JobKey, unit: PushUnit) {
        debug!("quiet period elapsed for {key}, pushing");
        let replicator = Arc::clone(&self.replicator);
        let tx = self.loop_tx.clone();
        tokio::spawn(async move {
            let what = format!("push of {key}");
            let result = with_retry(&what, || {
                let replicator = Arc::clone(&replicator);
                let unit = unit.clone();
                async move { replicator.push(&unit).await }
            })
            .await;
            let _ = tx.send(LoopMsg::PushDone { key, result });
        });
    }

    fn on_loop(&mut self, msg: LoopMsg) {
        match msg {
            LoopMsg::BootstrapFinished => {
                self.machine.dispatch(SyncSignal::BootstrapFinished);
                info!("host bootstrap finished");
            }
            LoopMsg::PushDone { key, result } => {
                match result {
                    Ok(()) => info!("push of {key} complete"),
                    // Steady-state exhaustion is reported only; the watcher
                    // keeps running and the next cycle may succeed.
                    Err(err) => error!("push of {key} failed: {err}"),
                }
                if self.scheduler.complete(&key) {
                    debug!("re-scheduling merged work for {key}");
                    self.scheduler.schedule(key);
                }
            }
        }
    }
}

/// The directory whose contents a change invalidates, clamped to the
/// target's root.
fn containing_directory(event: &ChangeEvent, root: &Path) -> PathBuf {
    match event.path.parent() {
        Some(parent) if parent.starts_with(root) => parent.to_path_buf(),
        _ => root.to_path_buf(),
    }
}
