use std::path::PathBuf;
use std::sync::RwLock;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use gigreach_core::config::ScrapeConfig;
use gigreach_core::status::StatusHandle;

/// Shared application state, available to all route handlers via
/// `State<Arc<AppState>>`.
pub struct AppState {
    /// Read-only window into the running (or last) pipeline.
    pub status: StatusHandle,
    /// Current scraper configuration; updated via the config endpoints.
    pub config: RwLock<ScrapeConfig>,
    /// Where config updates are persisted.
    pub config_path: PathBuf,
    /// Cancellation token of the active run, if any.
    pub cancel: Mutex<Option<CancellationToken>>,
    /// Admin API key for protecting endpoints (None = admin endpoints disabled).
    pub admin_token: Option<String>,
}
