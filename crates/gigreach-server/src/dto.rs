use serde::{Deserialize, Serialize};

use gigreach_core::config::ScrapeConfig;
use gigreach_core::status::RunStatus;

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StartRunResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatusResponse {
    pub is_running: bool,
    pub progress: u8,
    pub current_phase: String,
    pub current_city: Option<String>,
    pub last_completed: Option<String>,
    pub completed: bool,
    pub error: bool,
    pub no_results: bool,
}

impl From<RunStatus> for StatusResponse {
    fn from(status: RunStatus) -> Self {
        Self {
            is_running: status.is_running,
            progress: status.progress,
            current_phase: status.phase.as_str().to_string(),
            current_city: status.current_city,
            last_completed: status.last_completed,
            completed: status.completed,
            error: status.error,
            no_results: status.no_results,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CleanupResponse {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ConfigResponse {
    pub search_urls: Vec<String>,
    pub keywords: Vec<String>,
    pub remote_keywords: Vec<String>,
    pub non_remote_keywords: Vec<String>,
    pub blacklist: Vec<String>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub headless: bool,
}

impl From<ScrapeConfig> for ConfigResponse {
    fn from(config: ScrapeConfig) -> Self {
        Self {
            search_urls: config.search_urls,
            keywords: config.keywords,
            remote_keywords: config.remote_keywords,
            non_remote_keywords: config.non_remote_keywords,
            blacklist: config.blacklist,
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            headless: config.headless,
        }
    }
}

/// Partial config update; only the provided fields change.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateConfigRequest {
    pub search_urls: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub remote_keywords: Option<Vec<String>>,
    pub non_remote_keywords: Option<Vec<String>>,
    pub blacklist: Option<Vec<String>>,
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
    pub headless: Option<bool>,
}

impl UpdateConfigRequest {
    pub fn apply(self, config: &mut ScrapeConfig) {
        if let Some(urls) = self.search_urls {
            config.search_urls = urls;
        }
        if let Some(keywords) = self.keywords {
            config.keywords = keywords;
        }
        if let Some(remote) = self.remote_keywords {
            config.remote_keywords = remote;
        }
        if let Some(non_remote) = self.non_remote_keywords {
            config.non_remote_keywords = non_remote;
        }
        if let Some(blacklist) = self.blacklist {
            config.blacklist = blacklist;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(headless) = self.headless {
            config.headless = headless;
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
