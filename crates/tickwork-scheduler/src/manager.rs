//! Task lifecycle manager.
//!
//! Owns the registry mapping task names to their trigger handles and wires
//! each task into a [`TriggerEngine`] through a wrapped callback. The wrapped
//! callback re-checks expiration at fire time, runs the task's action, and
//! removes one-shot or expired tasks from inside the engine's own worker.
//!
//! # Locking
//!
//! The registry is guarded by a single mutex. Engine `register`/`cancel`
//! calls are made while it is held, so a name check, its registration and
//! the map insert (or cancel and map delete) happen as one step. This is
//! sound only because [`TriggerEngine`] implementations never block in
//! those calls and never run a callback inline. An engine that could would
//! need these calls moved outside the lock with a re-check afterwards.
//! Callbacks take the lock only for short map reads and writes.
//!
//! [`TaskManager::stop`] waits for in-flight callbacks, except when it is
//! called from inside one, where it only cancels.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::engine::{TriggerCallback, TriggerEngine, TriggerHandle};
use crate::error::{SchedulerError, SchedulerResult};
use crate::oneshot::one_shot_expression;
use crate::task::Task;

tokio::task_local! {
    /// Set while a wrapped callback runs on the current task.
    static IN_CALLBACK: ();
}

/// One registry entry.
struct Registration {
    task: Task,
    handle: TriggerHandle,
    /// Distinguishes successive registrations under the same name.
    generation: u64,
}

struct ManagerInner {
    engine: Arc<dyn TriggerEngine>,
    registry: Mutex<HashMap<String, Registration>>,
    next_generation: AtomicU64,
    /// Handed to wrapped callbacks.
    this: Weak<ManagerInner>,
}

/// Public entry point for adding, replacing and removing scheduled tasks.
///
/// Cloning is cheap; all clones share the same registry and engine.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

impl TaskManager {
    /// Create a manager on top of a trigger engine.
    pub fn new(engine: Arc<dyn TriggerEngine>) -> Self {
        Self {
            inner: Arc::new_cyclic(|this| ManagerInner {
                engine,
                registry: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                this: this.clone(),
            }),
        }
    }

    /// Register a task.
    ///
    /// Fails without touching the registry if the name is taken, the task has
    /// already expired, or the engine rejects the expression. An unset start
    /// time defaults to now. An empty spec makes a one-shot task that fires at
    /// its start time and removes itself afterwards.
    pub fn add(&self, mut task: Task) -> SchedulerResult<TriggerHandle> {
        let now = Utc::now();
        let mut registry = self.inner.registry.lock();

        if registry.contains_key(&task.name) {
            return Err(SchedulerError::DuplicateName(task.name));
        }
        if let Some(expire_time) = task.expire_time.filter(|_| task.is_expired_at(now)) {
            return Err(SchedulerError::AlreadyExpired {
                name: task.name,
                expire_time,
            });
        }

        let start_time = *task.start_time.get_or_insert(now);
        let expression = if task.is_one_shot() {
            one_shot_expression(start_time, now)
        } else {
            task.spec.clone()
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let callback = wrap_callback(self.inner.this.clone(), task.name.clone(), generation);
        let handle = self
            .inner
            .engine
            .register(&expression, callback)
            .map_err(|source| SchedulerError::RegistrationFailed {
                name: task.name.clone(),
                source,
            })?;

        task.id = Some(handle);
        info!(
            "Added task {} ({}) as {} with '{}'",
            task.name,
            if task.is_one_shot() { "one-shot" } else { "recurring" },
            handle,
            expression
        );
        registry.insert(
            task.name.clone(),
            Registration {
                task,
                handle,
                generation,
            },
        );
        Ok(handle)
    }

    /// Remove a task by name, cancelling its trigger.
    ///
    /// Safe to call from inside the task's own action.
    pub fn remove(&self, name: &str) -> SchedulerResult<()> {
        self.inner.remove(name, None)
    }

    /// Replace a registered task with a new descriptor under the same name.
    ///
    /// This is remove-then-add, not an atomic swap: if the new descriptor is
    /// rejected, the old task is already gone and nothing replaces it.
    pub fn update(&self, task: Task) -> SchedulerResult<TriggerHandle> {
        if !self.contains(&task.name) {
            return Err(SchedulerError::UnknownName(task.name));
        }
        self.remove(&task.name)?;
        self.add(task)
    }

    /// Start dispatching trigger events.
    ///
    /// One-shot tasks whose instant passed while dispatch was stopped are
    /// re-armed to fire one second from now.
    pub fn start(&self) {
        self.inner.rearm_overdue_one_shots();
        self.inner.engine.start_dispatch();
        info!("TaskManager started with {} tasks", self.len());
    }

    /// Stop dispatching, remove every task, and wait for running actions.
    ///
    /// Called from inside a task's action, it does not wait, since that
    /// action is itself one of the running ones.
    pub async fn stop(&self) {
        self.inner.engine.stop_dispatch();

        let removed = {
            let mut registry = self.inner.registry.lock();
            let removed = registry.len();
            for (name, registration) in registry.drain() {
                if let Err(e) = self.inner.engine.cancel(registration.handle) {
                    warn!("Failed to cancel task {} during stop: {}", name, e);
                }
            }
            removed
        };

        if IN_CALLBACK.try_with(|_| ()).is_ok() {
            debug!("TaskManager stopped from inside a task, not draining");
        } else {
            self.inner.engine.drain().await;
        }
        info!("TaskManager stopped, removed {} tasks", removed);
    }

    /// Whether the engine is dispatching.
    pub fn is_running(&self) -> bool {
        self.inner.engine.is_dispatching()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.registry.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.lock().is_empty()
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.registry.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of a registered task, with its handle filled in.
    pub fn task(&self, name: &str) -> Option<Task> {
        self.inner
            .registry
            .lock()
            .get(name)
            .map(|registration| registration.task.clone())
    }

    /// Next instant the named task is due, as reported by the engine.
    pub fn next_run(&self, name: &str) -> Option<DateTime<Utc>> {
        let handle = self.inner.registry.lock().get(name)?.handle;
        self.inner.engine.next_fire_time(handle)
    }
}

impl ManagerInner {
    /// Re-register one-shot tasks the engine reports as never firing again.
    fn rearm_overdue_one_shots(&self) {
        let now = Utc::now();
        let mut registry = self.registry.lock();

        for (name, registration) in registry.iter_mut() {
            if !registration.task.is_one_shot()
                || self.engine.next_fire_time(registration.handle).is_some()
            {
                continue;
            }
            let Some(start_time) = registration.task.start_time else {
                continue;
            };

            let expression = one_shot_expression(start_time, now);
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            let callback = wrap_callback(self.this.clone(), name.clone(), generation);
            let handle = match self.engine.register(&expression, callback) {
                Ok(handle) => handle,
                Err(e) => {
                    warn!("Failed to re-arm overdue task {}: {}", name, e);
                    continue;
                }
            };
            if let Err(e) = self.engine.cancel(registration.handle) {
                debug!("Overdue task {} had no live trigger: {}", name, e);
            }

            info!(
                "Re-armed overdue task {} as {} with '{}'",
                name, handle, expression
            );
            registration.handle = handle;
            registration.generation = generation;
            registration.task.id = Some(handle);
        }
    }

    /// Remove `name`, optionally only if it still belongs to `generation`.
    ///
    /// If the engine refuses the cancel, the entry stays in the registry so a
    /// later explicit remove can retry.
    fn remove(&self, name: &str, generation: Option<u64>) -> SchedulerResult<()> {
        let mut registry = self.registry.lock();

        let handle = match registry.get(name) {
            Some(registration)
                if generation.is_none_or(|expected| expected == registration.generation) =>
            {
                registration.handle
            }
            _ => return Err(SchedulerError::UnknownName(name.to_string())),
        };

        self.engine
            .cancel(handle)
            .map_err(|source| SchedulerError::CancelFailed {
                name: name.to_string(),
                source,
            })?;
        registry.remove(name);
        info!("Removed task {} ({})", name, handle);
        Ok(())
    }

    /// Body of the wrapped callback.
    async fn fire(&self, name: &str, generation: u64) {
        let task = {
            let registry = self.registry.lock();
            match registry.get(name) {
                Some(registration) if registration.generation == generation => {
                    registration.task.clone()
                }
                _ => {
                    debug!("Skipping stale trigger for task {}", name);
                    return;
                }
            }
        };

        let now = Utc::now();
        if task.is_expired_at(now) {
            info!("Task {} expired, removing", name);
            self.auto_remove(name, generation);
            return;
        }
        if !task.is_one_shot() && task.is_pending_at(now) {
            debug!("Task {} not yet started, skipping", name);
            return;
        }

        debug!("Running task {}", name);
        let outcome = IN_CALLBACK
            .scope((), AssertUnwindSafe(task.action().run()).catch_unwind())
            .await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{:#}", e)),
            Err(_) => Some("action panicked".to_string()),
        };
        if let Some(message) = failure {
            let error = SchedulerError::ActionFailed {
                name: name.to_string(),
                message,
            };
            warn!("{}", error);
        }

        if task.is_one_shot() {
            self.auto_remove(name, generation);
        }
    }

    /// Removal triggered from inside a callback; errors are only reported.
    fn auto_remove(&self, name: &str, generation: u64) {
        match self.remove(name, Some(generation)) {
            Ok(()) => {}
            Err(SchedulerError::UnknownName(_)) => {
                debug!("Task {} was already removed", name);
            }
            Err(e) => warn!("Automatic removal of task {} failed: {}", name, e),
        }
    }
}

/// Build the callback installed into the engine for one registration.
///
/// Holds the manager weakly so the engine's entries never keep it alive.
fn wrap_callback(manager: Weak<ManagerInner>, name: String, generation: u64) -> TriggerCallback {
    Arc::new(move || {
        let manager = manager.clone();
        let name = name.clone();
        async move {
            if let Some(manager) = manager.upgrade() {
                manager.fire(&name, generation).await;
            }
        }
        .boxed()
    })
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
