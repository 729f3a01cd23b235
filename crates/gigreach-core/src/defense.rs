//! Detection and handling of the target site's anti-automation defenses.
//!
//! Detection is a case-insensitive substring scan of the rendered page
//! against a fixed set of block indicators. A CAPTCHA cannot be solved
//! automatically: the handler escalates a headless session to a visible
//! one, alerts the operator, and waits (bounded) for a human. Handling is
//! always best-effort: a block that outlives the wait degrades extraction
//! quality but never kills the run.

use std::time::Duration;

use tokio::time::Instant;

use crate::selectors;
use crate::status::{Phase, StatusHandle};
use crate::traits::{PageDriver, SessionManager};

/// Phrases the site serves when it is blocking or throttling us.
pub const BLOCK_INDICATORS: [&str; 4] = [
    "IP has been automatically blocked",
    "please solve the CAPTCHA below",
    "your connection has been limited",
    "detected unusual activity",
];

/// Tokens whose presence means a CAPTCHA challenge is still on screen.
pub const CAPTCHA_TEXT_TOKENS: [&str; 4] =
    ["captcha", "robot", "human verification", "prove you're human"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Human-required challenge.
    Captcha,
    /// Rate limiting / IP block without a challenge to solve.
    Throttled,
}

/// Classify page content against the block-indicator set.
pub fn detect_block(content: &str) -> Option<BlockKind> {
    let lower = content.to_lowercase();
    for indicator in BLOCK_INDICATORS {
        if lower.contains(&indicator.to_lowercase()) {
            if indicator.to_lowercase().contains("captcha") {
                return Some(BlockKind::Captcha);
            }
            return Some(BlockKind::Throttled);
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct DefenseConfig {
    /// How often to re-check whether the challenge is gone.
    pub poll_interval: Duration,
    /// How long to wait for a human before giving up and continuing.
    pub max_wait: Duration,
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Inspects loaded pages for blocking and owns the escalate-and-wait flow.
#[derive(Clone)]
pub struct DefenseHandler {
    config: DefenseConfig,
    status: StatusHandle,
    headless: bool,
}

impl DefenseHandler {
    pub fn new(status: StatusHandle, headless: bool) -> Self {
        Self {
            config: DefenseConfig::default(),
            status,
            headless,
        }
    }

    pub fn with_config(mut self, config: DefenseConfig) -> Self {
        self.config = config;
        self
    }

    /// Check the current page; on a block, handle it best-effort. Returns
    /// true when blocking was detected.
    ///
    /// `slot` is the caller's session; a CAPTCHA under a headless session
    /// replaces it with a visible one at the same URL.
    pub async fn check_and_handle<M: SessionManager>(
        &self,
        manager: &M,
        slot: &mut Option<M::Driver>,
    ) -> bool {
        let Some(driver) = slot.as_ref() else {
            return false;
        };
        let Ok(content) = driver.content().await else {
            return false;
        };
        let Some(kind) = detect_block(&content) else {
            return false;
        };
        tracing::warn!(?kind, "Anti-automation defense triggered");

        if kind == BlockKind::Captcha && self.headless {
            let url = match driver.current_url().await {
                Ok(u) => u,
                Err(_) => String::new(),
            };
            if let Some(old) = slot.take() {
                manager.release(old).await;
            }
            match manager.acquire_visible(&url).await {
                Ok(d) => *slot = Some(d),
                Err(e) => {
                    tracing::error!(error = %e, "Could not open visible session for CAPTCHA");
                    return true;
                }
            }
        }

        alert_operator();
        let prev_phase = self.status.phase();
        self.status.set_phase(Phase::WaitingForCaptcha);
        if let Some(driver) = slot.as_ref() {
            self.wait_for_resolution(driver).await;
        }
        self.status.set_phase(prev_phase);
        true
    }

    /// Poll until the CAPTCHA is gone or the wait budget runs out.
    /// Returns true when it resolved in time.
    pub async fn wait_for_resolution<D: PageDriver>(&self, driver: &D) -> bool {
        let deadline = Instant::now() + self.config.max_wait;
        let challenge_url = driver.current_url().await.unwrap_or_default();
        tracing::info!("Waiting for CAPTCHA to be solved...");

        loop {
            if captcha_cleared(driver, &challenge_url).await {
                tracing::info!("CAPTCHA appears to be solved, continuing");
                return true;
            }
            if Instant::now() + self.config.poll_interval > deadline {
                tracing::warn!(
                    waited_secs = self.config.max_wait.as_secs(),
                    "CAPTCHA wait timed out, continuing anyway"
                );
                return false;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// A challenge counts as cleared when no CAPTCHA elements or text tokens
/// remain, or when the session has navigated off the challenge page onto
/// one free of CAPTCHA tokens.
async fn captcha_cleared<D: PageDriver>(driver: &D, challenge_url: &str) -> bool {
    let content = match driver.content().await {
        Ok(c) => c,
        Err(_) => return false,
    };
    let lower = content.to_lowercase();
    if CAPTCHA_TEXT_TOKENS.iter().any(|t| lower.contains(t)) {
        return false;
    }

    let canvases = driver
        .count(selectors::CAPTCHA_CANVAS)
        .await
        .unwrap_or(usize::MAX);
    let inputs = driver
        .count(selectors::CAPTCHA_INPUT)
        .await
        .unwrap_or(usize::MAX);
    let iframes = driver
        .count(selectors::CAPTCHA_IFRAMES)
        .await
        .unwrap_or(usize::MAX);
    if canvases == 0 && inputs == 0 && iframes == 0 {
        return true;
    }

    match driver.current_url().await {
        Ok(url) => !url.is_empty() && url != challenge_url,
        Err(_) => false,
    }
}

fn alert_operator() {
    // BEL rings the terminal the operator is watching.
    eprint!("\x07\x07\x07");
    tracing::warn!("CAPTCHA detected, solve it in the browser window to continue");
}
