//! CronEngine - cron expression based trigger engine.
//!
//! Every registered entry is driven by its own tokio task which sleeps until
//! the next instant matching the entry's schedule and then hands the callback
//! to a task tracker. Callbacks therefore run concurrently with each other,
//! with their own driver, and with the code registering or cancelling entries.

use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace};

use crate::engine::{TriggerCallback, TriggerEngine, TriggerHandle};
use crate::error::EngineError;

/// A registered expression/callback pair.
struct CronEntry {
    handle: TriggerHandle,

    /// Cron expression string (for display).
    expression: String,

    schedule: Schedule,

    callback: TriggerCallback,

    /// Cancelled when the entry is removed.
    cancelled: CancellationToken,

    /// Number of invocations issued.
    fire_count: AtomicU64,
}

struct EngineState {
    entries: DashMap<TriggerHandle, Arc<CronEntry>>,
    next_handle: AtomicU64,
    dispatching: watch::Sender<bool>,
    in_flight: TaskTracker,
}

/// Trigger engine backed by the `cron` crate and the tokio runtime.
///
/// # Cron Expression Format
///
/// Expressions use the 6-field (optionally 7-field) format:
/// `second minute hour day_of_month month day_of_week [year]`
///
/// Examples:
/// - `"0 0 * * * *"` - Every hour at minute 0
/// - `"*/5 * * * * *"` - Every 5 seconds
/// - `"0 0 9 * * MON-FRI"` - 9 AM on weekdays
///
/// All instants are evaluated in UTC.
#[derive(Clone)]
pub struct CronEngine {
    state: Arc<EngineState>,
}

impl CronEngine {
    /// Create an engine with dispatch stopped.
    pub fn new() -> Self {
        let (dispatching, _) = watch::channel(false);
        Self {
            state: Arc::new(EngineState {
                entries: DashMap::new(),
                next_handle: AtomicU64::new(1),
                dispatching,
                in_flight: TaskTracker::new(),
            }),
        }
    }

    /// Cron expression of a live entry.
    pub fn expression(&self, handle: TriggerHandle) -> Option<String> {
        self.state
            .entries
            .get(&handle)
            .map(|entry| entry.expression.clone())
    }

    /// Number of invocations issued for a live entry.
    pub fn fire_count(&self, handle: TriggerHandle) -> Option<u64> {
        self.state
            .entries
            .get(&handle)
            .map(|entry| entry.fire_count.load(Ordering::SeqCst))
    }

    /// Number of callbacks currently running.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.len()
    }
}

impl Default for CronEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TriggerEngine for CronEngine {
    fn register(
        &self,
        expression: &str,
        callback: TriggerCallback,
    ) -> Result<TriggerHandle, EngineError> {
        let schedule = Schedule::from_str(expression).map_err(|e| {
            EngineError::InvalidExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            }
        })?;
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let handle =
            TriggerHandle::from_raw(self.state.next_handle.fetch_add(1, Ordering::SeqCst));
        let entry = Arc::new(CronEntry {
            handle,
            expression: expression.to_string(),
            schedule,
            callback,
            cancelled: CancellationToken::new(),
            fire_count: AtomicU64::new(0),
        });
        self.state.entries.insert(handle, entry.clone());

        runtime.spawn(drive(
            entry,
            self.state.dispatching.subscribe(),
            self.state.in_flight.clone(),
        ));

        debug!("CronEngine registered {} for '{}'", handle, expression);
        Ok(handle)
    }

    fn cancel(&self, handle: TriggerHandle) -> Result<(), EngineError> {
        let (_, entry) = self
            .state
            .entries
            .remove(&handle)
            .ok_or(EngineError::UnknownHandle(handle))?;
        entry.cancelled.cancel();
        debug!("CronEngine cancelled {}", handle);
        Ok(())
    }

    fn start_dispatch(&self) {
        let started = self.state.dispatching.send_if_modified(|on| {
            let changed = !*on;
            *on = true;
            changed
        });
        if started {
            info!("CronEngine dispatch started");
        }
    }

    fn stop_dispatch(&self) {
        let stopped = self.state.dispatching.send_if_modified(|on| {
            let changed = *on;
            *on = false;
            changed
        });
        if stopped {
            info!("CronEngine dispatch stopped");
        }
    }

    fn is_dispatching(&self) -> bool {
        *self.state.dispatching.borrow()
    }

    fn live_entries(&self) -> usize {
        self.state.entries.len()
    }

    fn next_fire_time(&self, handle: TriggerHandle) -> Option<DateTime<Utc>> {
        let entry = self.state.entries.get(&handle)?;
        entry.schedule.upcoming(Utc).next()
    }

    async fn drain(&self) {
        let tracker = &self.state.in_flight;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }
}

/// Drive one entry until it is cancelled, its schedule is exhausted, or the
/// engine is dropped.
async fn drive(
    entry: Arc<CronEntry>,
    mut dispatching: watch::Receiver<bool>,
    in_flight: TaskTracker,
) {
    // Last instant handed out, so a single instant never fires twice even if
    // the wall clock lags the timer wheel.
    let mut last_fired: Option<DateTime<Utc>> = None;

    loop {
        let active = *dispatching.borrow_and_update();
        if !active {
            tokio::select! {
                _ = entry.cancelled.cancelled() => break,
                resumed = dispatching.wait_for(|on| *on) => {
                    if resumed.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        let now = Utc::now();
        let from = match last_fired {
            Some(last) if last > now => last,
            _ => now,
        };
        let Some(next) = entry.schedule.after(&from).next() else {
            debug!("CronEngine {} has no upcoming schedule", entry.handle);
            break;
        };
        let delay = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = entry.cancelled.cancelled() => break,
            changed = dispatching.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if entry.cancelled.is_cancelled() || !*dispatching.borrow() {
            continue;
        }

        last_fired = Some(next);
        trace!("CronEngine {} firing for {}", entry.handle, next.to_rfc3339());
        in_flight.spawn(invoke(entry.clone()));
        entry.fire_count.fetch_add(1, Ordering::SeqCst);
    }

    trace!("CronEngine driver for {} exited", entry.handle);
}

async fn invoke(entry: Arc<CronEntry>) {
    let invocation = AssertUnwindSafe(async { (entry.callback)().await });
    if invocation.catch_unwind().await.is_err() {
        error!(
            "CronEngine callback {} ('{}') panicked",
            entry.handle, entry.expression
        );
    }
}

#[cfg(test)]
#[path = "cron_engine_tests.rs"]
mod tests;
