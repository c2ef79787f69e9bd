//! Batch registration.
//!
//! A [`TaskRegistrar`] collects registration functions during process
//! bootstrap; [`init_all`] runs them in order, adds every task they produce,
//! and then starts the manager.

use tracing::info;

use crate::error::{SchedulerError, SchedulerResult};
use crate::manager::TaskManager;
use crate::task::Task;

type RegisterFn = Box<dyn FnOnce() -> anyhow::Result<Vec<Task>> + Send>;

/// Ordered collection of task registration functions.
#[derive(Default)]
pub struct TaskRegistrar {
    registrations: Vec<RegisterFn>,
}

impl TaskRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration function producing any number of tasks.
    pub fn register<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Vec<Task>> + Send + 'static,
    {
        self.registrations.push(Box::new(f));
        self
    }

    /// Append a single, already built task.
    pub fn task(self, task: Task) -> Self {
        self.register(move || Ok(vec![task]))
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Run every registration function, add the resulting tasks, then start.
///
/// Only recurring tasks are accepted here; a task with an empty spec fails
/// with [`SchedulerError::MissingSpec`]. Stops at the first error, leaving
/// tasks added before it registered and the manager not started.
pub fn init_all(manager: &TaskManager, registrar: TaskRegistrar) -> SchedulerResult<usize> {
    let mut tasks = Vec::new();
    for (index, register) in registrar.registrations.into_iter().enumerate() {
        let produced = register().map_err(|e| SchedulerError::HookFailed {
            index,
            message: format!("{:#}", e),
        })?;
        tasks.extend(produced);
    }

    let count = tasks.len();
    for task in tasks {
        if task.is_one_shot() {
            return Err(SchedulerError::MissingSpec(task.name));
        }
        manager.add(task)?;
    }

    manager.start();
    info!("Initialized {} scheduled tasks", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::testing::ManualEngine;

    fn noop(name: &str) -> Task {
        Task::from_fn(name, || async { Ok(()) }).with_spec("0 * * * * *")
    }

    fn setup() -> TaskManager {
        TaskManager::new(Arc::new(ManualEngine::new()))
    }

    #[test]
    fn test_registrar_counts_functions() {
        let registrar = TaskRegistrar::new()
            .task(noop("a"))
            .register(|| Ok(vec![noop("b"), noop("c")]));
        assert_eq!(registrar.len(), 2);
        assert!(!registrar.is_empty());
        assert!(TaskRegistrar::new().is_empty());
    }

    #[tokio::test]
    async fn test_init_all_adds_and_starts() {
        let manager = setup();
        let registrar = TaskRegistrar::new()
            .task(noop("a"))
            .register(|| Ok(vec![noop("b"), noop("c")]));

        let count = init_all(&manager, registrar).unwrap();

        assert_eq!(count, 3);
        assert_eq!(manager.names(), vec!["a", "b", "c"]);
        assert!(manager.is_running());
    }

    #[tokio::test]
    async fn test_init_all_runs_in_registration_order() {
        let manager = setup();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registrar = TaskRegistrar::new();
        for i in 0..4 {
            let order = order.clone();
            registrar = registrar.register(move || {
                order.lock().push(i);
                Ok(vec![noop(&format!("task-{}", i))])
            });
        }

        init_all(&manager, registrar).unwrap();

        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_init_all_rejects_one_shot() {
        let manager = setup();
        let registrar = TaskRegistrar::new()
            .task(noop("recurring"))
            .task(Task::from_fn("one-shot", || async { Ok(()) }));

        let result = init_all(&manager, registrar);

        assert!(matches!(result, Err(SchedulerError::MissingSpec(name)) if name == "one-shot"));
        assert!(!manager.is_running());
        assert!(!manager.contains("one-shot"));
    }

    #[tokio::test]
    async fn test_init_all_surfaces_hook_failure() {
        let manager = setup();
        let registrar = TaskRegistrar::new()
            .task(noop("a"))
            .register(|| Err(anyhow::anyhow!("database unavailable")));

        let result = init_all(&manager, registrar);

        match result {
            Err(SchedulerError::HookFailed { index, message }) => {
                assert_eq!(index, 1);
                assert!(message.contains("database unavailable"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_init_all_propagates_duplicates() {
        let manager = setup();
        let registrar = TaskRegistrar::new().task(noop("dup")).task(noop("dup"));

        let result = init_all(&manager, registrar);

        assert!(matches!(result, Err(SchedulerError::DuplicateName(_))));
        assert!(!manager.is_running());
    }
}
