//! Test utilities: scripted mock implementations of the browser traits
//! plus HTML fixtures for the target site's page shapes.
//!
//! Handwritten mocks with `Arc<Mutex<_>>` interior mutability so tests can
//! script behavior up front and assert on recorded calls afterwards.
//! Clones share state: a "fresh" session from [`MockSessionManager`] sees
//! the same scripted pages, which keeps multi-session tests simple.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::Listing;
use crate::traits::{PageDriver, SessionManager, WaitUntil};

/// Outcome of one scripted `click_first` call.
#[derive(Debug, Clone)]
pub struct ClickOutcome {
    pub clicked: bool,
    /// Replacement page content after the click (e.g. a revealed email
    /// panel). None leaves the page as-is.
    pub then_content: Option<String>,
}

impl ClickOutcome {
    pub fn miss() -> Self {
        Self {
            clicked: false,
            then_content: None,
        }
    }

    pub fn hit() -> Self {
        Self {
            clicked: true,
            then_content: None,
        }
    }

    pub fn hit_revealing(content: impl Into<String>) -> Self {
        Self {
            clicked: true,
            then_content: Some(content.into()),
        }
    }
}

/// Scripted page driver.
#[derive(Clone)]
pub struct MockDriver {
    pages: Arc<Mutex<HashMap<String, String>>>,
    default_page: Arc<Mutex<String>>,
    fail_next: Arc<Mutex<u32>>,
    fail_all: Arc<Mutex<bool>>,
    current_url: Arc<Mutex<String>>,
    current_content: Arc<Mutex<String>>,
    clicks: Arc<Mutex<VecDeque<ClickOutcome>>>,
    counts: Arc<Mutex<HashMap<String, usize>>>,
    healthy: Arc<Mutex<bool>>,
    fail_content: Arc<Mutex<bool>>,
    /// Every URL passed to `navigate`, in order.
    pub nav_log: Arc<Mutex<Vec<String>>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(HashMap::new())),
            default_page: Arc::new(Mutex::new("<html><body></body></html>".to_string())),
            fail_next: Arc::new(Mutex::new(0)),
            fail_all: Arc::new(Mutex::new(false)),
            current_url: Arc::new(Mutex::new(String::new())),
            current_content: Arc::new(Mutex::new(String::new())),
            clicks: Arc::new(Mutex::new(VecDeque::new())),
            counts: Arc::new(Mutex::new(HashMap::new())),
            healthy: Arc::new(Mutex::new(true)),
            fail_content: Arc::new(Mutex::new(false)),
            nav_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve `html` when `url` is navigated to.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.lock().unwrap().insert(url.into(), html.into());
        self
    }

    /// Serve `html` for any URL without an explicit page.
    pub fn with_default_page(self, html: impl Into<String>) -> Self {
        *self.default_page.lock().unwrap() = html.into();
        *self.current_content.lock().unwrap() = self.default_page.lock().unwrap().clone();
        self
    }

    /// Fail the next `n` navigations with a navigation error.
    pub fn fail_next_navigations(&self, n: u32) {
        *self.fail_next.lock().unwrap() = n;
    }

    /// Fail every navigation.
    pub fn fail_all_navigations(&self, fail: bool) {
        *self.fail_all.lock().unwrap() = fail;
    }

    /// Script the outcome of upcoming `click_first` calls, in order. An
    /// exhausted script answers "nothing matched".
    pub fn push_click(&self, outcome: ClickOutcome) {
        self.clicks.lock().unwrap().push_back(outcome);
    }

    pub fn set_count(&self, selector: &str, n: usize) {
        self.counts.lock().unwrap().insert(selector.to_string(), n);
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().unwrap() = healthy;
    }

    pub fn is_healthy_flag(&self) -> bool {
        *self.healthy.lock().unwrap()
    }

    /// Overwrite the current page content directly.
    pub fn set_content(&self, html: impl Into<String>) {
        *self.current_content.lock().unwrap() = html.into();
    }

    /// Make `content()` fail, simulating a renderer crash mid-listing.
    pub fn fail_content_reads(&self, fail: bool) {
        *self.fail_content.lock().unwrap() = fail;
    }
}

impl PageDriver for MockDriver {
    async fn navigate(
        &self,
        url: &str,
        _wait: WaitUntil<'_>,
        _timeout: Duration,
    ) -> Result<(), AppError> {
        self.nav_log.lock().unwrap().push(url.to_string());

        if *self.fail_all.lock().unwrap() {
            return Err(AppError::NavigationError("scripted failure".into()));
        }
        {
            let mut fail_next = self.fail_next.lock().unwrap();
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(AppError::NavigationError("scripted failure".into()));
            }
        }

        let html = self
            .pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_page.lock().unwrap().clone());
        *self.current_url.lock().unwrap() = url.to_string();
        *self.current_content.lock().unwrap() = html;
        Ok(())
    }

    async fn content(&self) -> Result<String, AppError> {
        if *self.fail_content.lock().unwrap() {
            return Err(AppError::SessionLost("scripted renderer crash".into()));
        }
        Ok(self.current_content.lock().unwrap().clone())
    }

    async fn current_url(&self) -> Result<String, AppError> {
        if !*self.healthy.lock().unwrap() {
            return Err(AppError::SessionLost("scripted dead session".into()));
        }
        Ok(self.current_url.lock().unwrap().clone())
    }

    async fn click_first(&self, _selectors: &[&str]) -> Result<bool, AppError> {
        let outcome = self.clicks.lock().unwrap().pop_front();
        match outcome {
            Some(o) => {
                if let Some(content) = o.then_content {
                    *self.current_content.lock().unwrap() = content;
                }
                Ok(o.clicked)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, selector: &str) -> Result<usize, AppError> {
        Ok(self
            .counts
            .lock()
            .unwrap()
            .get(selector)
            .copied()
            .unwrap_or(0))
    }
}

/// Scripted session manager handing out clones of a template driver.
#[derive(Clone)]
pub struct MockSessionManager {
    template: MockDriver,
    fail_acquire: Arc<Mutex<bool>>,
    pub acquired: Arc<Mutex<usize>>,
    pub released: Arc<Mutex<usize>>,
    /// URLs passed to `acquire_visible`.
    pub visible_urls: Arc<Mutex<Vec<String>>>,
}

impl MockSessionManager {
    pub fn new(template: MockDriver) -> Self {
        Self {
            template,
            fail_acquire: Arc::new(Mutex::new(false)),
            acquired: Arc::new(Mutex::new(0)),
            released: Arc::new(Mutex::new(0)),
            visible_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Manager whose every acquisition fails.
    pub fn failing() -> Self {
        let manager = Self::new(MockDriver::new());
        *manager.fail_acquire.lock().unwrap() = true;
        manager
    }

    /// The shared scripted driver state.
    pub fn driver(&self) -> &MockDriver {
        &self.template
    }
}

impl SessionManager for MockSessionManager {
    type Driver = MockDriver;

    async fn acquire(&self) -> Result<MockDriver, AppError> {
        if *self.fail_acquire.lock().unwrap() {
            return Err(AppError::BrowserError("scripted launch failure".into()));
        }
        *self.acquired.lock().unwrap() += 1;
        Ok(self.template.clone())
    }

    async fn acquire_visible(&self, url: &str) -> Result<MockDriver, AppError> {
        if *self.fail_acquire.lock().unwrap() {
            return Err(AppError::BrowserError("scripted launch failure".into()));
        }
        *self.acquired.lock().unwrap() += 1;
        self.visible_urls.lock().unwrap().push(url.to_string());
        let driver = self.template.clone();
        *driver.current_url.lock().unwrap() = url.to_string();
        Ok(driver)
    }

    async fn is_healthy(&self, driver: &MockDriver) -> bool {
        driver.is_healthy_flag()
    }

    async fn release(&self, _driver: MockDriver) {
        *self.released.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// HTML fixtures
// ---------------------------------------------------------------------------

/// A search-results page with one row per `(title, link, date)` entry.
pub fn search_results_html(rows: &[(&str, &str, &str)]) -> String {
    let mut body = String::new();
    for (title, link, date) in rows {
        body.push_str(&format!(
            concat!(
                "<div class=\"result-info\">",
                "<a class=\"posting-title\" href=\"{link}\">",
                "<span class=\"label\">{title}</span></a>",
                "<span title=\"{date}\">{date}</span>",
                "</div>"
            ),
            title = title,
            link = link,
            date = date,
        ));
    }
    format!("<html><body>{body}</body></html>")
}

/// A detail page with the posting body and a reply button.
pub fn detail_page_html(description: &str) -> String {
    format!(
        concat!(
            "<html><body>",
            "<section id=\"postingbody\">{description}</section>",
            "<button class=\"reply-button\">reply</button>",
            "</body></html>"
        ),
        description = description,
    )
}

/// A detail page after the email reveal, with webmail deep links.
pub fn email_reveal_html(email: &str) -> String {
    format!(
        concat!(
            "<html><body>",
            "<section id=\"postingbody\">see below</section>",
            "<div class=\"reply-content-email\">",
            "<div class=\"reply-email-address\">",
            "<a href=\"mailto:{email}\">{email}</a></div>",
            "<a class=\"webmail-gmail\" href=\"https://mail.google.com/mail/?to={email}\">gmail</a>",
            "<a class=\"webmail-yahoo\" href=\"https://compose.mail.yahoo.com/?to={email}\">yahoo</a>",
            "<a class=\"webmail-outlook\" href=\"https://outlook.live.com/?to={email}\">outlook</a>",
            "<a class=\"webmail-aol\" href=\"https://mail.aol.com/?to={email}\">aol</a>",
            "</div>",
            "</body></html>"
        ),
        email = email,
    )
}

/// A listing with sensible defaults for tests.
pub fn make_listing(title: &str, link: &str) -> Listing {
    Listing {
        city: "newyork".to_string(),
        title: title.to_string(),
        link: link.to_string(),
        post_date: "2025-06-01".to_string(),
        processed: false,
    }
}
