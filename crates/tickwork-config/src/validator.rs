//! Configuration validation.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::ConfigError;
use crate::schema::Config;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error, if any, into a [`ConfigError::InvalidValue`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration against the current time.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        Self::validate_at(config, Utc::now())
    }

    /// Validate the configuration, treating `now` as the current time.
    pub fn validate_at(
        config: &Config,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_scheduler(config, &mut result);
        Self::validate_logging(config, &mut result);
        Self::validate_tasks(config, now, &mut result);

        Ok(result)
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        if config.scheduler.shutdown_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "scheduler.shutdown_timeout_secs",
                "shutdown_timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let level = config.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            result.add_error(ValidationError::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', expected one of {}",
                    config.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
            result.add_error(ValidationError::new(
                "logging.format",
                format!(
                    "Unknown log format '{}', expected 'text' or 'json'",
                    config.logging.format
                ),
            ));
        }

        if config.logging.directory.is_some() && config.logging.max_log_files == 0 {
            result.add_warning(ValidationWarning::new(
                "logging.max_log_files",
                "max_log_files is 0, old log files will never be pruned",
            ));
        }
    }

    fn validate_tasks(config: &Config, now: DateTime<Utc>, result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, task) in config.tasks.iter().enumerate() {
            let path = format!("tasks[{}]", i);

            if task.name.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    "Task name cannot be empty",
                ));
            } else if !seen.insert(task.name.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    format!("Duplicate task name '{}'", task.name),
                ));
            }

            if task.spec.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.spec", path),
                    "Configured tasks must have a cron expression",
                ));
            } else if let Err(e) = Schedule::from_str(&task.spec) {
                result.add_error(ValidationError::new(
                    format!("{}.spec", path),
                    format!("Invalid cron expression '{}': {}", task.spec, e),
                ));
            }

            if task.command.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.command", path),
                    "Command cannot be empty",
                ));
            }

            if task.timeout_secs == 0 {
                result.add_error(ValidationError::new(
                    format!("{}.timeout_secs", path),
                    "timeout_secs must be greater than 0",
                ));
            }

            if let Some(expire) = task.expire_time {
                if let Some(start) = task.start_time {
                    if expire <= start {
                        result.add_error(ValidationError::new(
                            format!("{}.expire_time", path),
                            "expire_time must be after start_time",
                        ));
                    }
                }
                if expire < now {
                    result.add_error(ValidationError::new(
                        format!("{}.expire_time", path),
                        format!(
                            "Task '{}' already expired at {}",
                            task.name,
                            expire.to_rfc3339()
                        ),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
