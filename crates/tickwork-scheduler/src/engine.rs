//! Trigger engine interface.
//!
//! A trigger engine owns the clock: it accepts a calendar expression and a
//! callback, and invokes the callback on its own workers whenever the
//! expression matches. The [`TaskManager`](crate::TaskManager) only talks to
//! engines through this trait.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::error::EngineError;

/// Callback installed into an engine. Each invocation yields a fresh future.
pub type TriggerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque identifier of one registered expression/callback pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerHandle(u64);

impl TriggerHandle {
    /// Wrap a raw engine-assigned value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Trigger engine contract.
///
/// Implementations must uphold the following, which the task manager relies
/// on while holding its registry lock:
///
/// - `register` and `cancel` never block and never run a callback inline.
/// - `cancel` succeeds immediately even when called from inside the very
///   callback it cancels; it removes the entry from future scheduling and
///   leaves any running invocation alone.
/// - Entries registered while dispatch is stopped do not fire until
///   `start_dispatch` is called.
#[async_trait]
pub trait TriggerEngine: Send + Sync {
    /// Register a callback to run at every instant matching `expression`.
    fn register(
        &self,
        expression: &str,
        callback: TriggerCallback,
    ) -> Result<TriggerHandle, EngineError>;

    /// Remove an entry from future scheduling.
    fn cancel(&self, handle: TriggerHandle) -> Result<(), EngineError>;

    /// Begin issuing invocations.
    fn start_dispatch(&self);

    /// Stop issuing new invocations. Running callbacks are not interrupted.
    fn stop_dispatch(&self);

    /// Whether invocations are currently being issued.
    fn is_dispatching(&self) -> bool;

    /// Number of live (registered, not cancelled) entries.
    fn live_entries(&self) -> usize;

    /// Next instant at which the entry is due, if any.
    fn next_fire_time(&self, handle: TriggerHandle) -> Option<DateTime<Utc>>;

    /// Wait until every in-flight callback has finished.
    async fn drain(&self);
}
