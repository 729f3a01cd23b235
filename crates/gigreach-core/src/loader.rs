//! Resilient page loading: retry with exponential backoff, session
//! recreation on death, and a defense check after every successful load.

use std::time::Duration;

use crate::defense::DefenseHandler;
use crate::error::AppError;
use crate::selectors;
use crate::traits::{PageDriver, SessionManager, WaitUntil};

/// The two page shapes the loader knows about. Search pages need the full
/// load-complete signal; detail pages only need the posting body to be
/// there and tolerate a partial-load timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    Search,
    Detail,
}

impl PageClass {
    pub fn wait(&self) -> WaitUntil<'static> {
        match self {
            PageClass::Search => WaitUntil::DocumentReady,
            PageClass::Detail => WaitUntil::ElementPresent(selectors::DESCRIPTION_REGION_ANY),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            PageClass::Search => Duration::from_secs(30),
            PageClass::Detail => Duration::from_secs(15),
        }
    }
}

pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Loads pages through a managed browser session, surviving transient
/// failures and session death.
pub struct PageLoader<M: SessionManager> {
    manager: M,
    driver: Option<M::Driver>,
    defense: DefenseHandler,
    max_retries: u32,
    backoff_base: Duration,
}

impl<M: SessionManager> PageLoader<M> {
    /// Acquire the initial session. Failure here means no browser at all,
    /// fatal for the run, so it propagates.
    pub async fn connect(
        manager: M,
        defense: DefenseHandler,
        max_retries: u32,
    ) -> Result<Self, AppError> {
        let driver = manager.acquire().await?;
        Ok(Self {
            manager,
            driver: Some(driver),
            defense,
            max_retries,
            backoff_base: DEFAULT_BACKOFF_BASE,
        })
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn driver(&self) -> Option<&M::Driver> {
        self.driver.as_ref()
    }

    /// Load `url`, retrying up to `max_retries` attempts with exponential
    /// backoff (base × 2^attempt) between them. Returns false only after
    /// every attempt failed. A dead session is recreated between attempts;
    /// the defense handler runs after each successful load.
    pub async fn load(&mut self, url: &str, class: PageClass) -> bool {
        for attempt in 0..self.max_retries {
            if self.driver.is_none() {
                match self.manager.acquire().await {
                    Ok(d) => self.driver = Some(d),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to acquire browser session");
                    }
                }
            }

            let nav_result = match self.driver.as_ref() {
                Some(d) => Some(d.navigate(url, class.wait(), class.timeout()).await),
                None => None,
            };

            match nav_result {
                Some(Ok(())) => {
                    self.check_defenses().await;
                    return true;
                }
                Some(Err(e)) => {
                    tracing::warn!(%url, attempt = attempt + 1, error = %e, "Page load failed");
                }
                None => {}
            }

            let unhealthy = match self.driver.as_ref() {
                Some(d) => !self.manager.is_healthy(d).await,
                None => false,
            };
            if unhealthy {
                tracing::warn!("Browser session unhealthy, recreating");
                self.recreate().await;
            }

            if attempt + 1 < self.max_retries {
                let backoff = self.backoff_base * 2u32.pow(attempt);
                tokio::time::sleep(backoff).await;
            }
        }

        tracing::error!(%url, retries = self.max_retries, "Giving up on page after all retries");
        false
    }

    /// Run the defense handler against the current page. True when
    /// blocking was detected (and handled best-effort).
    pub async fn check_defenses(&mut self) -> bool {
        self.defense
            .check_and_handle(&self.manager, &mut self.driver)
            .await
    }

    /// Tear down the current session and acquire a fresh one. Acquisition
    /// failure is logged; the next `load` attempt will retry it.
    pub async fn recreate(&mut self) {
        if let Some(old) = self.driver.take() {
            self.manager.release(old).await;
        }
        match self.manager.acquire().await {
            Ok(d) => self.driver = Some(d),
            Err(e) => tracing::error!(error = %e, "Failed to recreate browser session"),
        }
    }

    /// Release the session. Safe to call twice.
    pub async fn shutdown(&mut self) {
        if let Some(d) = self.driver.take() {
            self.manager.release(d).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusHandle;
    use crate::testutil::{MockDriver, MockSessionManager};
    use tokio::time::Instant;

    fn loader_parts(driver: MockDriver) -> (MockSessionManager, DefenseHandler) {
        let manager = MockSessionManager::new(driver);
        let defense = DefenseHandler::new(StatusHandle::new(), false);
        (manager, defense)
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_succeeds_first_try() {
        let driver = MockDriver::new().with_page(
            "https://newyork.craigslist.org/search/web",
            "<html><body>rows</body></html>",
        );
        let (manager, defense) = loader_parts(driver);
        let mut loader = PageLoader::connect(manager.clone(), defense, 3)
            .await
            .unwrap();

        assert!(
            loader
                .load("https://newyork.craigslist.org/search/web", PageClass::Search)
                .await
        );
        assert_eq!(manager.driver().nav_log.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_three_attempts_two_backoffs() {
        let driver = MockDriver::new();
        driver.fail_all_navigations(true);
        let (manager, defense) = loader_parts(driver);
        let mut loader = PageLoader::connect(manager.clone(), defense, 3)
            .await
            .unwrap()
            .with_backoff_base(Duration::from_millis(100));

        let start = Instant::now();
        let ok = loader.load("https://example.org/page", PageClass::Search).await;
        let elapsed = start.elapsed();

        assert!(!ok);
        // Exactly 3 attempts.
        assert_eq!(manager.driver().nav_log.lock().unwrap().len(), 3);
        // Exactly 2 backoff waits: 100ms + 200ms (virtual clock).
        assert_eq!(elapsed, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_recovers_after_transient_failures() {
        let driver = MockDriver::new()
            .with_page("https://example.org/page", "<html><body>ok</body></html>");
        driver.fail_next_navigations(2);
        let (manager, defense) = loader_parts(driver);
        let mut loader = PageLoader::connect(manager.clone(), defense, 3)
            .await
            .unwrap()
            .with_backoff_base(Duration::from_millis(50));

        assert!(loader.load("https://example.org/page", PageClass::Search).await);
        assert_eq!(manager.driver().nav_log.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_session_is_recreated_between_attempts() {
        let driver = MockDriver::new()
            .with_page("https://example.org/page", "<html><body>ok</body></html>");
        driver.fail_next_navigations(1);
        driver.set_healthy(false);
        let (manager, defense) = loader_parts(driver);
        let mut loader = PageLoader::connect(manager.clone(), defense, 3)
            .await
            .unwrap()
            .with_backoff_base(Duration::from_millis(50));

        // First attempt fails, health probe reports dead, session recreated.
        // (Mock clones share state, so keep it unhealthy; reacquisition
        // still goes through the manager each time.)
        let ok = loader.load("https://example.org/page", PageClass::Detail).await;
        assert!(ok);
        assert!(*manager.released.lock().unwrap() >= 1);
        assert!(*manager.acquired.lock().unwrap() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_once() {
        let (manager, defense) = loader_parts(MockDriver::new());
        let mut loader = PageLoader::connect(manager.clone(), defense, 3)
            .await
            .unwrap();

        loader.shutdown().await;
        loader.shutdown().await;
        assert_eq!(*manager.released.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_propagates_acquire_failure() {
        let manager = MockSessionManager::failing();
        let defense = DefenseHandler::new(StatusHandle::new(), false);
        let result = PageLoader::connect(manager, defense, 3).await;
        assert!(matches!(result, Err(AppError::BrowserError(_))));
    }
}
