use clap::Parser;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::gemini::{GeminiConfig, DEFAULT_BASE_URL};

/// Runtime configuration, read from flags or the environment (`.env` included).
#[derive(Parser, Clone)]
#[command(name = "site-inspection")]
#[command(version, about = "Civil Engineering Insight Studio", long_about = None)]
pub struct Config {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    /// Address the web UI listens on
    #[arg(long, env = "INSPECTION_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Base URL of the Generative Language API
    #[arg(long, env = "GEMINI_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// Number of finished reports kept for identical resubmissions
    #[arg(long, env = "INSPECTION_CACHE_CAPACITY", default_value = "64")]
    pub cache_capacity: NonZeroUsize,

    /// Per-call timeout in seconds; unset leaves the transport default
    #[arg(long, env = "INSPECTION_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("api_base_url", &self.api_base_url)
            .field("cache_capacity", &self.cache_capacity)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn client_config(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key.clone(),
            base_url: self.api_base_url.clone(),
            timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}
