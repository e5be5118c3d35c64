use crate::event::ChangeEvent;

/// Bootstrap region: gated on the host's "initial build finished" signal.
/// Only affects log verbosity of subsequent change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    Bootstrapping,
    Bootstrapped,
}

/// Watch region: gated on the watcher's initial-scan-complete signal. While
/// `NotReady`, change events are accepted but produce no side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    NotReady,
    Ready,
}

#[derive(Debug, Clone)]
pub enum SyncSignal {
    BootstrapFinished,
    ScanComplete,
    Change(ChangeEvent),
}

/// Side effect requested by a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    None,
    Schedule(ChangeEvent),
}

/// Two independent state regions evaluated over the same signal stream.
///
/// Both regions are monotonic: created once per process, never reset. Events
/// delivered before the scan completes are redundant by construction — the
/// bootstrap pull already established a consistent local baseline.
#[derive(Debug)]
pub struct SyncStateMachine {
    bootstrap: BootstrapPhase,
    watch: WatchPhase,
}

impl Default for SyncStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStateMachine {
    pub fn new() -> Self {
        Self {
            bootstrap: BootstrapPhase::Bootstrapping,
            watch: WatchPhase::NotReady,
        }
    }

    pub fn bootstrap_phase(&self) -> BootstrapPhase {
        self.bootstrap
    }

    pub fn watch_phase(&self) -> WatchPhase {
        self.watch
    }

    pub fn bootstrapped(&self) -> bool {
        self.bootstrap == BootstrapPhase::Bootstrapped
    }

    pub fn ready(&self) -> bool {
        self.watch == WatchPhase::Ready
    }

    /// Advance both regions on one signal and report the side effect.
    pub fn dispatch(&mut self, signal: SyncSignal) -> SyncAction {
        match signal {
            SyncSignal::BootstrapFinished => {
                self.bootstrap = BootstrapPhase::Bootstrapped;
                SyncAction::None
            }
            SyncSignal::ScanComplete => {
                self.watch = WatchPhase::Ready;
                SyncAction::None
            }
            SyncSignal::Change(event) => {
                if self.ready() {
                    SyncAction::Schedule(event)
                } else {
                    SyncAction::None
                }
            }
        }
    }
}
