//! Test double for [`TriggerEngine`].

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::engine::{TriggerCallback, TriggerEngine, TriggerHandle};
use crate::error::EngineError;

/// Engine that never fires on its own; tests fire entries explicitly.
pub(crate) struct ManualEngine {
    entries: Mutex<BTreeMap<TriggerHandle, (String, TriggerCallback)>>,
    next_handle: AtomicU64,
    dispatching: AtomicBool,
    reject_cancel: AtomicBool,
    cancelled: Mutex<Vec<TriggerHandle>>,
    exhausted: Mutex<HashSet<TriggerHandle>>,
}

impl ManualEngine {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            next_handle: AtomicU64::new(1),
            dispatching: AtomicBool::new(false),
            reject_cancel: AtomicBool::new(false),
            cancelled: Mutex::new(Vec::new()),
            exhausted: Mutex::new(HashSet::new()),
        }
    }

    /// Run one invocation of the entry, as a dispatch worker would.
    pub(crate) async fn fire(&self, handle: TriggerHandle) -> bool {
        match self.callback(handle) {
            Some(callback) => {
                callback().await;
                true
            }
            None => false,
        }
    }

    /// Clone an entry's callback, e.g. to invoke it after the entry is
    /// cancelled like an invocation that was already in flight.
    pub(crate) fn callback(&self, handle: TriggerHandle) -> Option<TriggerCallback> {
        self.entries
            .lock()
            .get(&handle)
            .map(|(_, callback)| callback.clone())
    }

    pub(crate) fn expression(&self, handle: TriggerHandle) -> Option<String> {
        self.entries
            .lock()
            .get(&handle)
            .map(|(expression, _)| expression.clone())
    }

    pub(crate) fn is_live(&self, handle: TriggerHandle) -> bool {
        self.entries.lock().contains_key(&handle)
    }

    pub(crate) fn cancelled(&self) -> Vec<TriggerHandle> {
        self.cancelled.lock().clone()
    }

    /// Make a live entry report that it will never fire again.
    pub(crate) fn exhaust(&self, handle: TriggerHandle) {
        self.exhausted.lock().insert(handle);
    }

    pub(crate) fn set_reject_cancel(&self, reject: bool) {
        self.reject_cancel.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl TriggerEngine for ManualEngine {
    fn register(
        &self,
        expression: &str,
        callback: TriggerCallback,
    ) -> Result<TriggerHandle, EngineError> {
        if expression.trim().is_empty() || expression.contains("invalid") {
            return Err(EngineError::InvalidExpression {
                expression: expression.to_string(),
                reason: "rejected by test engine".to_string(),
            });
        }
        let handle = TriggerHandle::from_raw(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.entries
            .lock()
            .insert(handle, (expression.to_string(), callback));
        Ok(handle)
    }

    fn cancel(&self, handle: TriggerHandle) -> Result<(), EngineError> {
        if self.reject_cancel.load(Ordering::SeqCst) {
            return Err(EngineError::UnknownHandle(handle));
        }
        self.entries
            .lock()
            .remove(&handle)
            .ok_or(EngineError::UnknownHandle(handle))?;
        self.cancelled.lock().push(handle);
        Ok(())
    }

    fn start_dispatch(&self) {
        self.dispatching.store(true, Ordering::SeqCst);
    }

    fn stop_dispatch(&self) {
        self.dispatching.store(false, Ordering::SeqCst);
    }

    fn is_dispatching(&self) -> bool {
        self.dispatching.load(Ordering::SeqCst)
    }

    fn live_entries(&self) -> usize {
        self.entries.lock().len()
    }

    fn next_fire_time(&self, handle: TriggerHandle) -> Option<DateTime<Utc>> {
        let upcoming = self.is_live(handle) && !self.exhausted.lock().contains(&handle);
        upcoming.then(Utc::now)
    }

    async fn drain(&self) {}
}
