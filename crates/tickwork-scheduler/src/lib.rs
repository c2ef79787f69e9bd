//! # Tickwork Scheduler
//!
//! Registry of named, time-triggered tasks.
//!
//! - One-shot tasks (empty spec) fire once at their start time and then
//!   remove themselves.
//! - Recurring tasks fire whenever their cron expression matches, until they
//!   are removed or their expire time passes.
//!
//! ## Key Components
//!
//! - [`TaskManager`]: add, update, remove, start and stop tasks
//! - [`Task`]: task descriptor
//! - [`TriggerEngine`]: interface to the component that owns the clock
//! - [`CronEngine`]: tokio + `cron` backed trigger engine
//! - [`TaskRegistrar`] / [`init_all`]: batch registration at bootstrap
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tickwork_scheduler::{CronEngine, Task, TaskManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = TaskManager::new(Arc::new(CronEngine::new()));
//!
//!     manager.add(
//!         Task::from_fn("heartbeat", || async {
//!             println!("alive");
//!             Ok(())
//!         })
//!         .with_spec("*/10 * * * * *"),
//!     )?;
//!
//!     manager.start();
//!     tokio::signal::ctrl_c().await?;
//!     manager.stop().await;
//!     Ok(())
//! }
//! ```

pub mod cron_engine;
pub mod engine;
pub mod error;
pub mod manager;
pub mod oneshot;
pub mod registrar;
pub mod task;

#[cfg(test)]
mod testing;

pub use cron_engine::CronEngine;
pub use engine::{TriggerCallback, TriggerEngine, TriggerHandle};
pub use error::{EngineError, SchedulerError, SchedulerResult};
pub use manager::TaskManager;
pub use oneshot::{one_shot_expression, ONE_SHOT_LEAD};
pub use registrar::{init_all, TaskRegistrar};
pub use task::{FnAction, Task, TaskAction};
