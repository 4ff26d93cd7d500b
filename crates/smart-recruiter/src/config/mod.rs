use std::env;
use std::fmt;

use crate::workflows::assessments::{
    AnalyticsConfig, ScoringConfig, WorkflowConfig, DEFAULT_QUALIFICATION_THRESHOLD,
    DEFAULT_QUESTION_WEIGHT,
};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let default_weight = positive_number("SCORING_DEFAULT_WEIGHT", DEFAULT_QUESTION_WEIGHT)?;
        let threshold = number("QUALIFICATION_THRESHOLD", DEFAULT_QUALIFICATION_THRESHOLD)?;
        let trial_marker = marker("ANALYTICS_TRIAL_MARKER", "trial")?;
        let real_marker = marker("ANALYTICS_REAL_MARKER", "real")?;

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig {
                scoring: ScoringConfig::new(default_weight),
                analytics: AnalyticsConfig {
                    qualification_threshold: threshold,
                    trial_marker,
                    real_marker,
                },
            },
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

fn number(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or(ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn positive_number(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value = number(key, default)?;
    if value <= 0.0 {
        return Err(ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn marker(key: &'static str, default: &str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Err(ConfigError::EmptyMarker { key }),
        Ok(raw) => Ok(raw.trim().to_string()),
        Err(_) => Ok(default.to_string()),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    EmptyMarker { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a valid number, got '{value}'")
            }
            ConfigError::EmptyMarker { key } => write!(f, "{key} must not be blank"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("SCORING_DEFAULT_WEIGHT");
        env::remove_var("QUALIFICATION_THRESHOLD");
        env::remove_var("ANALYTICS_TRIAL_MARKER");
        env::remove_var("ANALYTICS_REAL_MARKER");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.workflow.scoring.default_question_weight, 10.0);
        assert_eq!(config.workflow.analytics.qualification_threshold, 50.0);
        assert_eq!(config.workflow.analytics.trial_marker, "trial");
        assert_eq!(config.workflow.analytics.real_marker, "real");
    }

    #[test]
    fn reads_workflow_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        env::set_var("SCORING_DEFAULT_WEIGHT", "5");
        env::set_var("QUALIFICATION_THRESHOLD", " 65.5 ");
        env::set_var("ANALYTICS_TRIAL_MARKER", "Practice");
        let config = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.workflow.scoring.default_question_weight, 5.0);
        assert_eq!(config.workflow.analytics.qualification_threshold, 65.5);
        assert_eq!(config.workflow.analytics.trial_marker, "Practice");
    }

    #[test]
    fn rejects_non_numeric_threshold() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("QUALIFICATION_THRESHOLD", "half");
        let result = AppConfig::load();
        reset_env();

        match result {
            Err(ConfigError::InvalidNumber { key, .. }) => {
                assert_eq!(key, "QUALIFICATION_THRESHOLD")
            }
            other => panic!("expected invalid number, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_weight_and_blank_marker() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCORING_DEFAULT_WEIGHT", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber { .. })
        ));

        reset_env();
        env::set_var("ANALYTICS_REAL_MARKER", "   ");
        let result = AppConfig::load();
        reset_env();
        assert!(matches!(result, Err(ConfigError::EmptyMarker { .. })));
    }
}
