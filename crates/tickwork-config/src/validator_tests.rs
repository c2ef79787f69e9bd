    use super::*;
    use crate::schema::TaskConfig;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn task(name: &str) -> TaskConfig {
        TaskConfig {
            name: name.to_string(),
            spec: "0 */5 * * * *".to_string(),
            command: "echo hello".to_string(),
            start_time: None,
            expire_time: None,
            timeout_secs: 30,
            work_dir: None,
        }
    }

    fn config_with(tasks: Vec<TaskConfig>) -> Config {
        Config {
            tasks,
            ..Config::default()
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_good_tasks() {
        let config = config_with(vec![task("a"), task("b")]);
        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_validate_zero_shutdown_timeout() {
        let mut config = Config::default();
        config.scheduler.shutdown_timeout_secs = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert!(result
            .errors
            .iter()
            .any(|e| e.path == "scheduler.shutdown_timeout_secs"));
    }

    #[test]
    fn test_validate_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "logging.level"));
    }

    #[test]
    fn test_validate_log_level_case_insensitive() {
        let mut config = Config::default();
        config.logging.level = "DEBUG".to_string();

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_validate_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "logging.format"));
    }

    #[test]
    fn test_validate_zero_max_log_files_warning() {
        let mut config = Config::default();
        config.logging.directory = Some("/tmp/tickwork".into());
        config.logging.max_log_files = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.path == "logging.max_log_files"));
    }

    #[test]
    fn test_validate_empty_name() {
        let config = config_with(vec![task("  ")]);

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "tasks[0].name"));
    }

    #[test]
    fn test_validate_duplicate_name() {
        let config = config_with(vec![task("dup"), task("other"), task("dup")]);

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "tasks[2].name");
        assert!(result.errors[0].message.contains("dup"));
    }

    #[test]
    fn test_validate_missing_spec() {
        let mut t = task("no-spec");
        t.spec = String::new();
        let config = config_with(vec![t]);

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "tasks[0].spec"));
    }

    #[test]
    fn test_validate_unparseable_spec() {
        let mut t = task("bad-spec");
        t.spec = "every tuesday".to_string();
        let config = config_with(vec![t]);

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        let error = result
            .errors
            .iter()
            .find(|e| e.path == "tasks[0].spec")
            .unwrap();
        assert!(error.message.contains("every tuesday"));
    }

    #[test]
    fn test_validate_empty_command() {
        let mut t = task("no-command");
        t.command = " ".to_string();
        let config = config_with(vec![t]);

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "tasks[0].command"));
    }

    #[test]
    fn test_validate_zero_task_timeout() {
        let mut t = task("instant");
        t.timeout_secs = 0;
        let config = config_with(vec![t]);

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        assert!(result
            .errors
            .iter()
            .any(|e| e.path == "tasks[0].timeout_secs"));
    }

    #[test]
    fn test_validate_expire_before_start() {
        let mut t = task("window");
        t.start_time = Some(now() + Duration::hours(2));
        t.expire_time = Some(now() + Duration::hours(1));
        let config = config_with(vec![t]);

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        assert!(result
            .errors
            .iter()
            .any(|e| e.path == "tasks[0].expire_time"));
    }

    #[test]
    fn test_validate_already_expired_task() {
        let mut t = task("stale");
        t.expire_time = Some(now() - Duration::minutes(1));
        let config = config_with(vec![task("fresh"), t]);

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "tasks[1].expire_time");
        assert!(result.errors[0].message.contains("stale"));
    }

    #[test]
    fn test_validate_expire_time_equal_to_now_is_accepted() {
        let mut t = task("edge");
        t.expire_time = Some(now());
        let config = config_with(vec![t]);

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_into_result_reports_first_error() {
        let mut config = config_with(vec![task("")]);
        config.logging.format = "xml".to_string();

        let result = ConfigValidator::validate_at(&config, now()).unwrap();
        match result.into_result() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "logging.format"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_into_result_returns_warnings() {
        let mut config = Config::default();
        config.logging.directory = Some("/tmp/tickwork".into());
        config.logging.max_log_files = 0;

        let warnings = ConfigValidator::validate_at(&config, now())
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, "logging.max_log_files");
    }
