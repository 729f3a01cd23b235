use std::sync::{Arc, RwLock};

use axum::Router;
use tempfile::TempDir;
use tokio::sync::Mutex;

use gigreach_core::config::ScrapeConfig;
use gigreach_core::status::StatusHandle;
use gigreach_server::routes;
use gigreach_server::state::AppState;

pub const TEST_API_KEY: &str = "test-secret-key";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    // Working files live here; dropped with the test.
    #[allow(dead_code)]
    pub dir: TempDir,
}

fn build(admin_token: Option<String>) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ScrapeConfig {
        links_file: dir.path().join("links.csv"),
        results_file: dir.path().join("results.csv"),
        history_file: dir.path().join("history_links.csv"),
        ..ScrapeConfig::default()
    };

    let state = Arc::new(AppState {
        status: StatusHandle::new(),
        config: RwLock::new(config),
        config_path: dir.path().join("gigreach.json"),
        cancel: Mutex::new(None),
        admin_token,
    });

    TestApp {
        router: routes::router(state.clone()),
        state,
        dir,
    }
}

pub fn setup_test_app() -> TestApp {
    build(Some(TEST_API_KEY.to_string()))
}

pub fn setup_test_app_no_auth() -> TestApp {
    build(None)
}
