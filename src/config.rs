use std::time::Duration;

use log::warn;

use crate::quiz::QuizError;

pub const CHATGPT_API_KEY: &str = "CHATGPT_API_KEY";
pub const TELOXIDE_TOKEN: &str = "TELOXIDE_TOKEN";
pub const MODEL_TIMEOUT_SECS: &str = "QUIZ_MODEL_TIMEOUT_SECS";

const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Config {
    pub chatgpt_api_key: String,
    pub telegram_token: String,
    pub model_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, QuizError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, so tests need not touch the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, QuizError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| QuizError::MissingCredentials(name.to_string()))
        };

        let chatgpt_api_key = required(CHATGPT_API_KEY)?;
        let telegram_token = required(TELOXIDE_TOKEN)?;

        let model_timeout = match lookup(MODEL_TIMEOUT_SECS) {
            None => DEFAULT_MODEL_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(
                        "Ignoring {}={:?}, using {}s",
                        MODEL_TIMEOUT_SECS,
                        raw,
                        DEFAULT_MODEL_TIMEOUT.as_secs()
                    );
                    DEFAULT_MODEL_TIMEOUT
                }
            },
        };

        Ok(Self {
            chatgpt_api_key,
            telegram_token,
            model_timeout,
        })
    }
}
