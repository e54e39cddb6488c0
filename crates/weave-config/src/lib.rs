//! Engine configuration: defaults plus environment overrides.

use serde::{Deserialize, Serialize};

pub use weave_core::OutputFormat;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_SECS: u64 = 2;

/// Options consumed by the invocation layer and the workflow patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaveConfig {
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_secs: u64,
    pub output_format: OutputFormat,
    pub verbose: bool,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_secs: DEFAULT_BACKOFF_SECS,
            output_format: OutputFormat::Text,
            verbose: false,
        }
    }
}

impl WeaveConfig {
    /// Loads configuration from the environment, falling back to defaults for
    /// anything unset or unparseable. Reads a `.env` file if one exists.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(model) = std::env::var("WEAVE_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }
        if let Some(secs) = parse_var("WEAVE_TIMEOUT_SECS") {
            config.timeout_secs = secs;
        }
        if let Some(retries) = parse_var("WEAVE_MAX_RETRIES") {
            config.max_retries = retries;
        }
        if let Some(secs) = parse_var("WEAVE_BACKOFF_SECS") {
            config.backoff_secs = secs;
        }
        if let Ok(format) = std::env::var("WEAVE_OUTPUT_FORMAT") {
            if format.eq_ignore_ascii_case("json") {
                config.output_format = OutputFormat::Json;
            }
        }
        if let Ok(verbose) = std::env::var("WEAVE_VERBOSE") {
            config.verbose = matches!(verbose.as_str(), "1" | "true" | "yes");
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
