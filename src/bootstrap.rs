//! Turns configured `[[tasks]]` entries into scheduler tasks.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use tickwork_config::{Config, TaskConfig};
use tickwork_scheduler::{Task, TaskRegistrar};

use crate::command::CommandAction;

/// Build a recurring task that runs the configured shell command.
pub(crate) fn task_from_config(config: &TaskConfig) -> Task {
    let mut action = CommandAction::new(
        &config.name,
        &config.command,
        Duration::from_secs(config.timeout_secs),
    );
    if let Some(dir) = &config.work_dir {
        action = action.with_work_dir(dir);
    }

    let mut task = Task::new(&config.name, action).with_spec(&config.spec);
    if let Some(start) = config.start_time {
        task = task.with_start_time(start);
    }
    if let Some(expire) = config.expire_time {
        task = task.with_expire_time(expire);
    }
    task
}

/// Registrar holding one registration function for the configured tasks.
pub(crate) fn registrar(config: &Config) -> TaskRegistrar {
    let tasks = config.tasks.clone();
    TaskRegistrar::new().register(move || Ok(tasks.iter().map(task_from_config).collect()))
}

/// Next time a configured task would run, honoring its start and expire times.
pub(crate) fn next_fire_time(config: &TaskConfig, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let schedule = Schedule::from_str(&config.spec).ok()?;
    let from = config.start_time.map_or(now, |start| start.max(now));
    // `after` is exclusive; step back so a fire exactly at `start_time` counts.
    let from = if from > now {
        from - chrono::Duration::nanoseconds(1)
    } else {
        from
    };
    let next = schedule.after(&from).next()?;
    match config.expire_time {
        Some(expire) if next > expire => None,
        _ => Some(next),
    }
}
