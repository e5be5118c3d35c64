//! Core traits and engine for cachesync cache replication backends.
//!
//! This crate defines the abstractions shared between the archive (Google
//! Drive) and object (S3) backends, plus the engine that drives them:
//! - `RemoteStore`: find/create/put/get/delete against a remote container
//! - `Replicator`: backend-polymorphic bootstrap pull and coalesced push
//! - `ChangeDetector`: recursive filesystem watcher with an initial scan
//! - `SyncStateMachine`: bootstrap/watch gating of event side effects
//! - `DebounceScheduler` / `PendingTargetQueue`: burst coalescing
//! - `SyncOrchestrator`: the single control loop wiring it all together

mod bootstrap;
mod config;
mod error;
mod event;
mod machine;
mod orchestrator;
mod progress;
mod replicator;
mod retry;
mod schedule;
mod store;
mod target;
mod watcher;

pub use bootstrap::BootstrapLoader;
pub use config::SyncSettings;
pub use error::SyncError;
pub use event::{ChangeEvent, ChangeOp, EntryKind};
pub use machine::{BootstrapPhase, SyncAction, SyncSignal, SyncStateMachine, WatchPhase};
pub use orchestrator::{LoopMsg, OrchestratorHandle, SyncOrchestrator};
pub use progress::ProgressReporter;
pub use replicator::{CoalesceMode, PushUnit, Replicator};
pub use retry::{with_retry, MAX_ATTEMPTS};
pub use schedule::{DebounceScheduler, Expiry, JobKey, PendingTargetQueue};
pub use store::{HandleCache, RemoteHandle, RemoteStore};
pub use target::{TargetRole, WatchTarget};
pub use watcher::{build_ignore_set, ChangeDetector, WatcherMessage, DEFAULT_IGNORES};
