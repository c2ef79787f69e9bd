//! Task descriptor and action abstraction.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::engine::TriggerHandle;

/// Unit of work invoked when a task fires.
#[async_trait]
pub trait TaskAction: Send + Sync {
    /// Run the action once.
    async fn run(&self) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`TaskAction`].
pub struct FnAction<F>(pub F);

#[async_trait]
impl<F, Fut> TaskAction for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self.0)().await
    }
}

/// A named unit of scheduled work.
///
/// An empty `spec` marks a one-shot task that fires once at `start_time`;
/// a non-empty `spec` is a cron expression for a recurring task.
#[derive(Clone)]
pub struct Task {
    pub(crate) id: Option<TriggerHandle>,
    pub(crate) name: String,
    pub(crate) start_time: Option<DateTime<Utc>>,
    pub(crate) expire_time: Option<DateTime<Utc>>,
    pub(crate) spec: String,
    pub(crate) action: Arc<dyn TaskAction>,
}

impl Task {
    /// Create a one-shot task that runs `action` as soon as possible.
    pub fn new<A>(name: impl Into<String>, action: A) -> Self
    where
        A: TaskAction + 'static,
    {
        Self {
            id: None,
            name: name.into(),
            start_time: None,
            expire_time: None,
            spec: String::new(),
            action: Arc::new(action),
        }
    }

    /// Create a task from an async closure.
    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(name, FnAction(f))
    }

    /// Set the cron expression, making this a recurring task.
    pub fn with_spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = spec.into();
        self
    }

    /// Set the instant after which the task may run.
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Set the instant after which the task must no longer run.
    pub fn with_expire_time(mut self, expire_time: DateTime<Utc>) -> Self {
        self.expire_time = Some(expire_time);
        self
    }

    /// Trigger handle, assigned once the task is registered.
    pub fn id(&self) -> Option<TriggerHandle> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn expire_time(&self) -> Option<DateTime<Utc>> {
        self.expire_time
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Whether this task fires exactly once.
    pub fn is_one_shot(&self) -> bool {
        self.spec.is_empty()
    }

    /// Whether the task's expire time has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_time.is_some_and(|expire| now > expire)
    }

    /// Whether the task is not yet eligible to run at `now`.
    pub fn is_pending_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time.is_some_and(|start| now < start)
    }

    pub(crate) fn action(&self) -> Arc<dyn TaskAction> {
        self.action.clone()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("start_time", &self.start_time)
            .field("expire_time", &self.expire_time)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
