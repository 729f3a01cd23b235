use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::filter::DEFAULT_BLACKLIST;

/// Full pipeline configuration: search targets, matching rules, pacing,
/// and checkpoint file locations.
///
/// Loaded from defaults + environment, optionally persisted as JSON so
/// the control surface can update it between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Search-results URLs, one per city/category, processed in order.
    pub search_urls: Vec<String>,
    /// Titles must match at least one of these.
    pub keywords: Vec<String>,
    /// Description substrings that classify a posting as remote.
    pub remote_keywords: Vec<String>,
    /// Description substrings that classify a posting as on-site.
    pub non_remote_keywords: Vec<String>,
    /// Disqualifying substrings for titles and descriptions.
    pub blacklist: Vec<String>,
    /// Results are checkpointed every this many enriched records.
    pub batch_size: usize,
    /// Page-load attempts before a URL is given up on.
    pub max_retries: u32,
    /// Run the browser headless. A CAPTCHA escalates to a headed session.
    pub headless: bool,
    pub links_file: PathBuf,
    pub results_file: PathBuf,
    pub history_file: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            search_urls: vec![
                "https://newyork.craigslist.org/search/web".to_string(),
                "https://chicago.craigslist.org/search/web".to_string(),
                "https://seattle.craigslist.org/search/web".to_string(),
            ],
            keywords: vec![
                "web developer".to_string(),
                "software developer".to_string(),
                "web designer".to_string(),
                "wordpress".to_string(),
                "full stack".to_string(),
                "programmer".to_string(),
            ],
            remote_keywords: vec![
                "remote".to_string(),
                "work from home".to_string(),
                "wfh".to_string(),
                "telecommute".to_string(),
                "anywhere".to_string(),
            ],
            non_remote_keywords: vec![
                "on-site".to_string(),
                "onsite".to_string(),
                "on site".to_string(),
                "in person".to_string(),
                "in-person".to_string(),
                "in office".to_string(),
            ],
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
            batch_size: 10,
            max_retries: 3,
            headless: false,
            links_file: PathBuf::from("output/links.csv"),
            results_file: PathBuf::from("output/results.csv"),
            history_file: PathBuf::from("history_links.csv"),
        }
    }
}

impl ScrapeConfig {
    /// Defaults overridden by environment variables where set.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GIGREACH_HEADLESS") {
            config.headless = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Ok(v) = std::env::var("GIGREACH_BATCH_SIZE")
            && let Ok(n) = v.parse()
        {
            config.batch_size = n;
        }
        if let Ok(v) = std::env::var("GIGREACH_MAX_RETRIES")
            && let Ok(n) = v.parse()
        {
            config.max_retries = n;
        }
        if let Ok(v) = std::env::var("GIGREACH_LINKS_FILE") {
            config.links_file = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("GIGREACH_RESULTS_FILE") {
            config.results_file = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("GIGREACH_HISTORY_FILE") {
            config.history_file = PathBuf::from(v);
        }

        config
    }

    /// Load a JSON config file. A missing file is not an error: defaults
    /// apply until the control surface persists an update.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Ok(Self::from_env());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid config {}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.search_urls.is_empty() {
            return Err(AppError::ConfigError("no search URLs configured".into()));
        }
        if self.keywords.is_empty() {
            return Err(AppError::ConfigError("no keywords configured".into()));
        }
        if self.batch_size == 0 {
            return Err(AppError::ConfigError("batch_size must be positive".into()));
        }
        Ok(())
    }
}
