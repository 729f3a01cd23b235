use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// What "loaded" means for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil<'a> {
    /// The document-ready (load complete) signal fired.
    DocumentReady,
    /// A specific content region matching this CSS selector appeared.
    /// A load-complete timeout is tolerated as long as the region is there.
    ElementPresent(&'a str),
}

/// One live browser page, driven over an automation protocol.
///
/// Everything the pipeline does to a page goes through this trait so the
/// crawl/extraction logic can be exercised against scripted mock drivers.
pub trait PageDriver: Send + Sync {
    /// Navigate to `url` and block until `wait` is satisfied or `timeout`
    /// elapses.
    fn navigate(
        &self,
        url: &str,
        wait: WaitUntil<'_>,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// The fully-rendered HTML of the current page.
    fn content(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// The page's current location. Doubles as the session liveness probe.
    fn current_url(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Dispatch a JavaScript click on the first element matching any
    /// selector in `selectors`, tried in order. Returns false when nothing
    /// matched. A JS-dispatched click bypasses overlay interception that
    /// defeats protocol-level clicks.
    fn click_first(
        &self,
        selectors: &[&str],
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Number of elements currently matching `selector`.
    fn count(&self, selector: &str) -> impl Future<Output = Result<usize, AppError>> + Send;
}

/// Owns the lifetime of browser sessions: creation with anti-detection
/// options, liveness checks, and best-effort teardown.
///
/// All other components acquire sessions through this trait rather than
/// constructing them directly, so crash recovery lives in one place.
pub trait SessionManager: Send + Sync + Clone {
    type Driver: PageDriver;

    /// Create a fresh isolated session. Construction failures propagate:
    /// a run that cannot get any session at all is fatal.
    fn acquire(&self) -> impl Future<Output = Result<Self::Driver, AppError>> + Send;

    /// Create a visible (headed) session restored to `url`. Used when a
    /// CAPTCHA needs a human and the current session is headless.
    fn acquire_visible(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Driver, AppError>> + Send;

    /// Lightweight liveness probe. On false the caller must discard the
    /// session and reacquire.
    fn is_healthy(&self, driver: &Self::Driver) -> impl Future<Output = bool> + Send;

    /// Best-effort teardown: terminate the browser process and remove the
    /// scratch profile. Failures are logged and swallowed; teardown never
    /// blocks shutdown.
    fn release(&self, driver: Self::Driver) -> impl Future<Output = ()> + Send;
}
