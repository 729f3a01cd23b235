//! Chromium-backed implementation of the browser session traits.
//!
//! Each session is one isolated Chromium process with its own scratch
//! profile directory, a randomized user agent, and automation fingerprints
//! disabled. The CDP connection is driven by a background handler task
//! that lives exactly as long as the session.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tempfile::TempDir;
use uuid::Uuid;

use gigreach_core::delay::random_index;
use gigreach_core::error::AppError;
use gigreach_core::traits::{PageDriver, SessionManager, WaitUntil};

/// Loaded once after launch to prove the session can reach the site.
const DEFAULT_VERIFY_URL: &str = "https://www.craigslist.org";

const VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the detail-page wait re-probes for its content region.
const ELEMENT_POLL: Duration = Duration::from_millis(500);

/// Real desktop user agents, rotated per session to avoid a stable
/// automation fingerprint.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:90.0) Gecko/20100101 Firefox/90.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36",
];

fn pick_user_agent() -> &'static str {
    USER_AGENTS[random_index(USER_AGENTS.len())]
}

/// One live Chromium session: browser process, its single page, the CDP
/// handler task, and the scratch profile that dies with it.
pub struct ChromiumSession {
    id: Uuid,
    browser: Browser,
    page: Page,
    profile_dir: TempDir,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromiumSession {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl PageDriver for ChromiumSession {
    async fn navigate(
        &self,
        url: &str,
        wait: WaitUntil<'_>,
        timeout: Duration,
    ) -> Result<(), AppError> {
        match wait {
            WaitUntil::DocumentReady => {
                let nav = tokio::time::timeout(timeout, async {
                    self.page
                        .goto(url)
                        .await
                        .map_err(|e| AppError::NavigationError(format!("{url}: {e}")))?;
                    self.page
                        .wait_for_navigation()
                        .await
                        .map_err(|e| AppError::NavigationError(format!("{url}: {e}")))?;
                    Ok::<(), AppError>(())
                })
                .await;
                match nav {
                    Ok(inner) => inner,
                    Err(_) => Err(AppError::Timeout(timeout.as_secs())),
                }
            }
            WaitUntil::ElementPresent(selector) => {
                let deadline = tokio::time::Instant::now() + timeout;

                // A load-complete timeout is fine for detail pages as long
                // as the content region made it into the DOM.
                match tokio::time::timeout(timeout, self.page.goto(url)).await {
                    Ok(Err(e)) => {
                        return Err(AppError::NavigationError(format!("{url}: {e}")));
                    }
                    Ok(Ok(_)) => {}
                    Err(_) => {
                        tracing::debug!(%url, "Partial load, checking for content region");
                    }
                }

                loop {
                    if self.page.find_element(selector).await.is_ok() {
                        return Ok(());
                    }
                    if tokio::time::Instant::now() + ELEMENT_POLL > deadline {
                        return Err(AppError::Timeout(timeout.as_secs()));
                    }
                    tokio::time::sleep(ELEMENT_POLL).await;
                }
            }
        }
    }

    async fn content(&self) -> Result<String, AppError> {
        self.page
            .content()
            .await
            .map_err(|e| AppError::SessionLost(format!("Failed to read page content: {e}")))
    }

    async fn current_url(&self) -> Result<String, AppError> {
        match self.page.url().await {
            Ok(url) => Ok(url.unwrap_or_default()),
            Err(e) => Err(AppError::SessionLost(format!("Location probe failed: {e}"))),
        }
    }

    async fn click_first(&self, selectors: &[&str]) -> Result<bool, AppError> {
        for selector in selectors {
            let quoted = serde_json::to_string(selector)?;
            let expr = format!(
                "(function() {{ const el = document.querySelector({quoted}); \
                 if (!el) return false; el.click(); return true; }})()"
            );
            let clicked = self
                .page
                .evaluate(expr)
                .await
                .map_err(|e| AppError::BrowserError(format!("Click eval failed: {e}")))?
                .into_value::<bool>()
                .unwrap_or(false);
            if clicked {
                tracing::debug!(%selector, "Clicked");
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn count(&self, selector: &str) -> Result<usize, AppError> {
        let quoted = serde_json::to_string(selector)?;
        let expr = format!("document.querySelectorAll({quoted}).length");
        let count = self
            .page
            .evaluate(expr)
            .await
            .map_err(|e| AppError::BrowserError(format!("Count eval failed: {e}")))?
            .into_value::<u64>()
            .unwrap_or(0);
        Ok(count as usize)
    }
}

/// Launches and tears down [`ChromiumSession`]s.
#[derive(Clone)]
pub struct ChromiumSessionManager {
    headless: bool,
    verify_url: String,
}

impl ChromiumSessionManager {
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            verify_url: DEFAULT_VERIFY_URL.to_string(),
        }
    }

    /// Override the known-good URL loaded to verify a fresh session.
    pub fn with_verify_url(mut self, url: impl Into<String>) -> Self {
        self.verify_url = url.into();
        self
    }

    async fn launch(&self, headed: bool) -> Result<ChromiumSession, AppError> {
        let profile_dir = tempfile::Builder::new()
            .prefix("gigreach-profile-")
            .tempdir()
            .map_err(|e| AppError::BrowserError(format!("Scratch profile dir: {e}")))?;

        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();
        if let Some(bin) = find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }
        if headed {
            builder = builder.with_head();
        } else {
            builder = builder.arg("--headless=new");
        }

        let config = builder
            .user_data_dir(profile_dir.path())
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-notifications")
            .arg("--deny-permission-prompts")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--window-size=1920,1080")
            .arg(format!("--user-agent={}", pick_user_agent()))
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection
        // to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(AppError::BrowserError(format!("Failed to open page: {e}")));
            }
        };

        let id = Uuid::new_v4();
        tracing::info!(session_id = %id, headed, "Browser session launched");
        Ok(ChromiumSession {
            id,
            browser,
            page,
            profile_dir,
            handler_task,
        })
    }
}

impl SessionManager for ChromiumSessionManager {
    type Driver = ChromiumSession;

    async fn acquire(&self) -> Result<ChromiumSession, AppError> {
        let session = self.launch(!self.headless).await?;

        // Prove the session can actually render the site before handing
        // it out.
        if let Err(e) = session
            .navigate(&self.verify_url, WaitUntil::DocumentReady, VERIFY_TIMEOUT)
            .await
        {
            tracing::error!(error = %e, "Fresh session failed verification");
            self.release(session).await;
            return Err(e);
        }
        Ok(session)
    }

    async fn acquire_visible(&self, url: &str) -> Result<ChromiumSession, AppError> {
        let session = self.launch(true).await?;
        if !url.is_empty()
            && let Err(e) = session
                .navigate(url, WaitUntil::DocumentReady, VERIFY_TIMEOUT)
                .await
        {
            // The operator can still navigate by hand; keep the session.
            tracing::warn!(%url, error = %e, "Visible session could not return to page");
        }
        Ok(session)
    }

    async fn is_healthy(&self, driver: &ChromiumSession) -> bool {
        driver.current_url().await.is_ok()
    }

    async fn release(&self, driver: ChromiumSession) {
        let ChromiumSession {
            id,
            mut browser,
            page,
            profile_dir,
            handler_task,
        } = driver;

        if let Err(e) = page.close().await {
            tracing::debug!(session_id = %id, "Page close failed: {e}");
        }
        if let Err(e) = browser.close().await {
            tracing::warn!(session_id = %id, "Browser close failed: {e}");
        }
        handler_task.abort();

        // TempDir removes the scratch profile; surface a failure instead
        // of silently leaking disk.
        if let Err(e) = profile_dir.close() {
            tracing::warn!(session_id = %id, "Failed to remove scratch profile: {e}");
        }
        tracing::info!(session_id = %id, "Browser session released");
    }
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// Snap-packaged Chromium exposes a wrapper that strips unknown CLI flags,
/// breaking headless mode; look for the real binary inside the snap first,
/// then fall back to well-known system paths. `None` lets chromiumoxide do
/// its own lookup. `CHROME_BIN` overrides everything.
fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    let candidates: &[&str] = &[
        // Snap (Ubuntu default)
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        // Flatpak
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        // Common apt / manual installs
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}
