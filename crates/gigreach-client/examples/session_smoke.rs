/// Smoke-test for `ChromiumSessionManager`.
///
/// Launches a headless Chromium, verifies the session against the target
/// site, loads example.com, and prints the rendered HTML size.
///
/// Run with:
///   cargo run --example session_smoke
use std::time::Duration;

use gigreach_client::ChromiumSessionManager;
use gigreach_core::traits::{PageDriver, SessionManager, WaitUntil};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("Launching headless browser…");
    let manager =
        ChromiumSessionManager::new(true).with_verify_url("https://example.com");
    let session = manager.acquire().await?;

    let url = "https://example.com";
    println!("Fetching {url} …");
    session
        .navigate(url, WaitUntil::DocumentReady, Duration::from_secs(30))
        .await?;
    let html = session.content().await?;

    assert!(
        html.contains("<h1>Example Domain</h1>"),
        "Expected <h1> not found in rendered HTML"
    );
    println!("OK: got {} bytes of rendered HTML", html.len());

    manager.release(session).await;
    Ok(())
}
