use serde::Deserialize;
use std::time::Duration;

use crate::batch::{BatchPolicy, RowFailurePolicy};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store_base_url: String,
    pub store_api_token: String,
    pub request_timeout_secs: u64,
    pub row_failure_policy: RowFailurePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let row_failure_policy = match std::env::var("ROW_FAILURE_POLICY")
            .unwrap_or_else(|_| "continue".to_string())
            .to_lowercase()
            .as_str()
        {
            "continue" => RowFailurePolicy::ContinueOnError,
            "halt" => RowFailurePolicy::HaltOnError,
            other => {
                return Err(config::ConfigError::Message(format!(
                    "ROW_FAILURE_POLICY must be 'continue' or 'halt', got '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            store_base_url: std::env::var("STORE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            store_api_token: std::env::var("STORE_API_TOKEN").unwrap_or_default(),
            request_timeout_secs: std::env::var("STORE_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(30),
            row_failure_policy,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            on_row_failure: self.row_failure_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the environment is process-wide shared state
    #[test]
    fn test_env_parsing() {
        std::env::remove_var("ROW_FAILURE_POLICY");
        std::env::remove_var("STORE_TIMEOUT_SECS");
        let config = Config::from_env().unwrap();
        assert_eq!(config.row_failure_policy, RowFailurePolicy::ContinueOnError);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));

        std::env::set_var("ROW_FAILURE_POLICY", "halt");
        let config = Config::from_env().unwrap();
        assert_eq!(config.row_failure_policy, RowFailurePolicy::HaltOnError);
        assert_eq!(
            config.batch_policy().on_row_failure,
            RowFailurePolicy::HaltOnError
        );

        std::env::set_var("ROW_FAILURE_POLICY", "sometimes");
        assert!(Config::from_env().is_err());
        std::env::remove_var("ROW_FAILURE_POLICY");
    }
}
