//! Phase 2, step 2: visit each surviving listing's detail page and enrich
//! it with description, remote classification, and the revealed reply
//! email.
//!
//! Per-listing state machine: Pending → PageLoaded → DescriptionExtracted
//! → EmailRevealAttempted → Recorded. Any failure short-circuits to
//! Recorded with sentinel values; one bad listing never aborts the batch.

use std::time::Duration;

use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointStore;
use crate::config::ScrapeConfig;
use crate::delay::sleep_between;
use crate::error::AppError;
use crate::filter::is_blacklisted;
use crate::loader::{PageClass, PageLoader};
use crate::models::{
    DESCRIPTION_NOT_FOUND, EnrichedListing, Listing, PAGE_LOAD_FAILED, RemoteStatus, WebmailLinks,
};
use crate::selectors;
use crate::status::StatusHandle;
use crate::traits::{PageDriver, SessionManager};

/// The reveal control is polled for up to cycles × interval = 30 s.
const REVEAL_POLL_CYCLES: usize = 15;
const REVEAL_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Classify a description as remote / on-site / unspecified. Remote
/// keywords win when both lists match.
pub fn classify_remote(
    text: &str,
    remote_keywords: &[String],
    non_remote_keywords: &[String],
) -> RemoteStatus {
    if text.is_empty() {
        return RemoteStatus::NotSpecified;
    }
    let lower = text.to_lowercase();
    for keyword in remote_keywords {
        if lower.contains(&keyword.to_lowercase()) {
            return RemoteStatus::Remote;
        }
    }
    for keyword in non_remote_keywords {
        if lower.contains(&keyword.to_lowercase()) {
            return RemoteStatus::NonRemote;
        }
    }
    RemoteStatus::NotSpecified
}

/// Pull the posting description out of a rendered detail page.
pub(crate) fn extract_description(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    for sel in selectors::DESCRIPTION_REGIONS {
        let Ok(sel) = Selector::parse(sel) else {
            continue;
        };
        if let Some(el) = doc.select(&sel).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Read the revealed reply address and webmail deep links. None when the
/// reveal container is absent.
pub(crate) fn extract_email_info(html: &str) -> Option<(Option<String>, WebmailLinks)> {
    let doc = Html::parse_document(html);

    let container = selectors::EMAIL_CONTAINERS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| doc.select(&sel).next())?;

    let mut email = None;
    let mut links = WebmailLinks::default();

    let anchor = selectors::EMAIL_ANCHORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| container.select(&sel).next());

    if let Some(anchor) = anchor {
        let href = anchor.value().attr("href").unwrap_or("");
        let mut addr = anchor.text().collect::<String>().trim().to_string();

        // Obfuscated reveals sometimes leave the visible text empty;
        // the mailto target still carries the address.
        if (addr.is_empty() || !addr.contains('@'))
            && let Some(target) = href.strip_prefix("mailto:")
        {
            addr = target.split('?').next().unwrap_or("").to_string();
        }
        if href.starts_with("mailto:") {
            links.default_mail = href.to_string();
        }
        if !addr.is_empty() && addr.contains('@') {
            email = Some(addr);
        }
    }

    if let Ok(webmail_sel) = Selector::parse(selectors::WEBMAIL_ANCHORS) {
        for anchor in container.select(&webmail_sel) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let class = anchor.value().attr("class").unwrap_or("");
            if class.contains("gmail") {
                links.gmail = href.to_string();
            } else if class.contains("yahoo") {
                links.yahoo = href.to_string();
            } else if class.contains("outlook") {
                links.outlook = href.to_string();
            } else if class.contains("aol") {
                links.aol = href.to_string();
            }
        }
    }

    Some((email, links))
}

/// Enrich unprocessed listings from `start_index` on, prepending any
/// previously checkpointed results. `max_count` bounds how many new
/// listings are processed. Progress is checkpointed every
/// `config.batch_size` records and once more at the end.
#[allow(clippy::too_many_arguments)]
pub async fn enrich<M: SessionManager>(
    loader: &mut PageLoader<M>,
    listings: &[Listing],
    config: &ScrapeConfig,
    status: &StatusHandle,
    store: &CheckpointStore,
    cancel: &CancellationToken,
    start_index: usize,
    max_count: Option<usize>,
) -> Result<Vec<EnrichedListing>, AppError> {
    let mut results = if start_index > 0 {
        store.load_results().unwrap_or_default()
    } else {
        Vec::new()
    };
    let mut processed_new = 0usize;

    for listing in listings.iter().skip(start_index) {
        if cancel.is_cancelled() {
            tracing::info!("Cancellation requested, stopping detail extraction");
            break;
        }
        if let Some(max) = max_count
            && processed_new >= max
        {
            break;
        }
        if listing.processed {
            continue;
        }

        status.set_city(&listing.city);
        tracing::info!(title = %listing.title, link = %listing.link, "Extracting listing details");

        let mut rec = EnrichedListing::from_listing(listing);
        let keep = match extract_one(loader, listing, &mut rec, config).await {
            Ok(keep) => keep,
            Err(e) => {
                tracing::warn!(
                    link = %listing.link,
                    error = %e,
                    "Unexpected failure mid-listing, recreating session"
                );
                loader.recreate().await;
                true
            }
        };
        rec.processed = true;
        processed_new += 1;

        if keep {
            results.push(rec);
            if results.len() % config.batch_size == 0 {
                store.save_results(&results)?;
            }
        }

        sleep_between(Duration::from_secs(2), Duration::from_secs(5)).await;
    }

    store.save_results(&results)?;
    Ok(results)
}

/// Process one listing into `rec`. Ok(false) means the record is dropped
/// (blacklisted description); an Err is an unexpected mid-listing failure
/// the caller contains.
async fn extract_one<M: SessionManager>(
    loader: &mut PageLoader<M>,
    listing: &Listing,
    rec: &mut EnrichedListing,
    config: &ScrapeConfig,
) -> Result<bool, AppError> {
    if !loader.load(&listing.link, PageClass::Detail).await {
        rec.description = PAGE_LOAD_FAILED.to_string();
        return Ok(true);
    }

    sleep_between(Duration::from_secs(2), Duration::from_secs(5)).await;

    let html = match loader.driver() {
        Some(driver) => driver.content().await?,
        None => return Err(AppError::SessionLost("no session after load".into())),
    };

    match extract_description(&html) {
        Some(description) => {
            if is_blacklisted(&description, &config.blacklist) {
                tracing::info!(
                    title = %listing.title,
                    "Skipping listing with blacklisted keyword in description"
                );
                return Ok(false);
            }
            rec.remote = classify_remote(
                &description,
                &config.remote_keywords,
                &config.non_remote_keywords,
            );
            rec.description = description;
        }
        None => {
            rec.description = DESCRIPTION_NOT_FOUND.to_string();
        }
    }

    attempt_email_reveal(loader, listing, rec).await;
    Ok(true)
}

/// The multi-step reveal: click reply, survive any CAPTCHA it triggers,
/// poll for the reveal control, then read the disclosed address. Every
/// failure leaves the email fields at their sentinels.
async fn attempt_email_reveal<M: SessionManager>(
    loader: &mut PageLoader<M>,
    listing: &Listing,
    rec: &mut EnrichedListing,
) {
    let clicked_reply = match loader.driver() {
        Some(driver) => matches!(
            driver.click_first(&selectors::REPLY_BUTTONS).await,
            Ok(true)
        ),
        None => false,
    };
    if !clicked_reply {
        tracing::debug!(link = %listing.link, "No reply control found");
        return;
    }

    // The reply click is what usually trips the CAPTCHA. After it clears,
    // reload and click through again.
    if loader.check_defenses().await && loader.load(&listing.link, PageClass::Detail).await {
        if let Some(driver) = loader.driver() {
            let _ = driver.click_first(&selectors::REPLY_BUTTONS).await;
        }
    }

    let mut revealed = false;
    for _ in 0..REVEAL_POLL_CYCLES {
        let hit = match loader.driver() {
            Some(driver) => matches!(
                driver.click_first(&selectors::REVEAL_BUTTONS).await,
                Ok(true)
            ),
            None => false,
        };
        if hit {
            revealed = true;
            break;
        }
        tokio::time::sleep(REVEAL_POLL_INTERVAL).await;
        loader.check_defenses().await;
    }
    if !revealed {
        tracing::debug!(link = %listing.link, "Email reveal control never appeared");
        return;
    }

    let html = match loader.driver() {
        Some(driver) => driver.content().await.unwrap_or_default(),
        None => return,
    };
    if let Some((email, links)) = extract_email_info(&html) {
        if let Some(address) = email {
            rec.email = address;
        }
        rec.set_webmail(links);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defense::DefenseHandler;
    use crate::models::EMAIL_NOT_AVAILABLE;
    use crate::testutil::{
        ClickOutcome, MockDriver, MockSessionManager, detail_page_html, email_reveal_html,
        make_listing,
    };

    fn test_config() -> ScrapeConfig {
        ScrapeConfig {
            batch_size: 2,
            ..ScrapeConfig::default()
        }
    }

    async fn test_loader(driver: MockDriver) -> (MockSessionManager, PageLoader<MockSessionManager>) {
        let manager = MockSessionManager::new(driver);
        let loader = PageLoader::connect(
            manager.clone(),
            DefenseHandler::new(StatusHandle::new(), false),
            3,
        )
        .await
        .unwrap()
        .with_backoff_base(Duration::from_millis(10));
        (manager, loader)
    }

    fn stores(dir: &tempfile::TempDir) -> CheckpointStore {
        CheckpointStore::new(dir.path().join("links.csv"), dir.path().join("results.csv"))
    }

    #[test]
    fn test_classify_remote_prefers_remote_keywords() {
        let config = test_config();
        assert_eq!(
            classify_remote("fully remote position", &config.remote_keywords, &config.non_remote_keywords),
            RemoteStatus::Remote
        );
        assert_eq!(
            classify_remote("strictly on-site role", &config.remote_keywords, &config.non_remote_keywords),
            RemoteStatus::NonRemote
        );
        // Both present: remote wins because it is checked first.
        assert_eq!(
            classify_remote("remote possible, otherwise on-site", &config.remote_keywords, &config.non_remote_keywords),
            RemoteStatus::Remote
        );
        assert_eq!(
            classify_remote("", &config.remote_keywords, &config.non_remote_keywords),
            RemoteStatus::NotSpecified
        );
    }

    #[test]
    fn test_extract_description_selector_chain() {
        assert_eq!(
            extract_description(&detail_page_html("We need a web developer")).as_deref(),
            Some("We need a web developer")
        );
        let variant = "<html><body><div data-testid='postingbody'>Variant body</div></body></html>";
        assert_eq!(extract_description(variant).as_deref(), Some("Variant body"));
        assert_eq!(extract_description("<html><body>nothing here</body></html>"), None);
    }

    #[test]
    fn test_extract_email_info_prefers_text_falls_back_to_mailto() {
        let html = email_reveal_html("hire@example.com");
        let (email, links) = extract_email_info(&html).unwrap();
        assert_eq!(email.as_deref(), Some("hire@example.com"));
        assert_eq!(links.default_mail, "mailto:hire@example.com");
        assert!(links.gmail.contains("mail.google.com"));
        assert!(links.yahoo.contains("yahoo"));
        assert!(links.outlook.contains("outlook"));
        assert!(links.aol.contains("aol"));

        // Empty visible text: the address comes from the mailto href.
        let obfuscated = concat!(
            "<html><body><div class=\"reply-info\">",
            "<a href=\"mailto:owner@example.com?subject=re\"></a>",
            "</div></body></html>"
        );
        let (email, links) = extract_email_info(obfuscated).unwrap();
        assert_eq!(email.as_deref(), Some("owner@example.com"));
        assert_eq!(links.default_mail, "mailto:owner@example.com?subject=re");

        assert!(extract_email_info("<html><body>no panel</body></html>").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_full_reveal_happy_path() {
        let listing = make_listing("Remote Software Developer Needed", "https://x.org/web/1.html");
        let driver = MockDriver::new()
            .with_page(&listing.link, detail_page_html("This is a fully remote position"));
        driver.push_click(ClickOutcome::hit()); // reply
        driver.push_click(ClickOutcome::hit_revealing(email_reveal_html("hire@example.com")));
        let (_, mut loader) = test_loader(driver).await;

        let dir = tempfile::tempdir().unwrap();
        let store = stores(&dir);
        let results = enrich(
            &mut loader,
            &[listing],
            &test_config(),
            &StatusHandle::new(),
            &store,
            &CancellationToken::new(),
            0,
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        let rec = &results[0];
        assert_eq!(rec.remote, RemoteStatus::Remote);
        assert_eq!(rec.email, "hire@example.com");
        assert_eq!(rec.default_mail, "mailto:hire@example.com");
        assert!(rec.processed);
        assert_eq!(store.load_results().unwrap(), results);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_blacklisted_description_drops_record() {
        let listing = make_listing("Remote Software Developer Needed", "https://x.org/web/2.html");
        let driver = MockDriver::new()
            .with_page(&listing.link, detail_page_html("This is a paid research opportunity"));
        let (_, mut loader) = test_loader(driver).await;

        let dir = tempfile::tempdir().unwrap();
        let store = stores(&dir);
        let results = enrich(
            &mut loader,
            &[listing],
            &test_config(),
            &StatusHandle::new(),
            &store,
            &CancellationToken::new(),
            0,
            None,
        )
        .await
        .unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_reveal_timeout_keeps_record_with_sentinel() {
        let listing = make_listing("Web Developer", "https://x.org/web/3.html");
        let driver = MockDriver::new()
            .with_page(&listing.link, detail_page_html("Help with our remote site"));
        driver.push_click(ClickOutcome::hit()); // reply opens, reveal never shows
        let (_, mut loader) = test_loader(driver).await;

        let dir = tempfile::tempdir().unwrap();
        let store = stores(&dir);
        let results = enrich(
            &mut loader,
            &[listing],
            &test_config(),
            &StatusHandle::new(),
            &store,
            &CancellationToken::new(),
            0,
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].email, EMAIL_NOT_AVAILABLE);
        assert_eq!(results[0].remote, RemoteStatus::Remote);
        assert_eq!(results[0].description, "Help with our remote site");
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_load_failure_emits_error_sentinels() {
        let listing = make_listing("Web Developer", "https://x.org/web/4.html");
        let driver = MockDriver::new();
        driver.fail_all_navigations(true);
        let (_, mut loader) = test_loader(driver).await;

        let dir = tempfile::tempdir().unwrap();
        let store = stores(&dir);
        let results = enrich(
            &mut loader,
            &[listing],
            &test_config(),
            &StatusHandle::new(),
            &store,
            &CancellationToken::new(),
            0,
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].description, PAGE_LOAD_FAILED);
        assert_eq!(results[0].remote, RemoteStatus::NotSpecified);
        assert_eq!(results[0].email, EMAIL_NOT_AVAILABLE);
        assert!(results[0].processed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_resumes_from_checkpoint() {
        // 10 already-checkpointed records + 5 new unprocessed ones.
        let dir = tempfile::tempdir().unwrap();
        let store = stores(&dir);

        let mut listings = Vec::new();
        let mut prior = Vec::new();
        for i in 0..10 {
            let mut l = make_listing(&format!("Old Job {i}"), &format!("https://x.org/old/{i}.html"));
            l.processed = true;
            let mut rec = EnrichedListing::from_listing(&l);
            rec.description = format!("old description {i}");
            rec.processed = true;
            prior.push(rec);
            listings.push(l);
        }
        store.save_results(&prior).unwrap();

        let driver = MockDriver::new().with_default_page(detail_page_html("new remote role"));
        for i in 0..5 {
            listings.push(make_listing(
                &format!("New Job {i}"),
                &format!("https://x.org/new/{i}.html"),
            ));
        }
        let (_, mut loader) = test_loader(driver).await;

        let results = enrich(
            &mut loader,
            &listings,
            &test_config(),
            &StatusHandle::new(),
            &store,
            &CancellationToken::new(),
            10,
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 15);
        assert_eq!(&results[..10], &prior[..]);
        for rec in &results[10..] {
            assert_eq!(rec.description, "new remote role");
            assert!(rec.processed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_contains_mid_listing_crash_and_recreates_session() {
        let first = make_listing("Web Developer", "https://x.org/web/5.html");
        let second = make_listing("Rust Developer", "https://x.org/web/6.html");
        let driver = MockDriver::new().with_default_page(detail_page_html("an on-site role"));
        driver.fail_content_reads(true);
        let (manager, mut loader) = test_loader(driver).await;

        // Heal the renderer after the first listing's content read has
        // failed (that read happens within 5s of virtual time) but before
        // the second listing reads content (6s at the earliest).
        let probe = manager.driver().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5500)).await;
            probe.fail_content_reads(false);
        });

        let dir = tempfile::tempdir().unwrap();
        let store = stores(&dir);
        let results = enrich(
            &mut loader,
            &[first, second],
            &test_config(),
            &StatusHandle::new(),
            &store,
            &CancellationToken::new(),
            0,
            None,
        )
        .await
        .unwrap();

        // First record kept with partial data, session recreated, second fine.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].description, "");
        assert_eq!(results[0].email, EMAIL_NOT_AVAILABLE);
        assert_eq!(results[1].description, "an on-site role");
        assert_eq!(results[1].remote, RemoteStatus::NonRemote);
        assert!(*manager.released.lock().unwrap() >= 1);
        assert!(*manager.acquired.lock().unwrap() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_checkpoints_every_batch() {
        let driver = MockDriver::new().with_default_page(detail_page_html("plain role"));
        let (_, mut loader) = test_loader(driver).await;

        let listings: Vec<_> = (0..3)
            .map(|i| make_listing(&format!("Job {i}"), &format!("https://x.org/b/{i}.html")))
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let store = stores(&dir);
        // batch_size 2: one mid-run checkpoint plus the final save.
        let results = enrich(
            &mut loader,
            &listings,
            &test_config(),
            &StatusHandle::new(),
            &store,
            &CancellationToken::new(),
            0,
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(store.load_results().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_max_count_bounds_new_work() {
        let driver = MockDriver::new().with_default_page(detail_page_html("role"));
        let (_, mut loader) = test_loader(driver).await;

        let listings: Vec<_> = (0..5)
            .map(|i| make_listing(&format!("Job {i}"), &format!("https://x.org/m/{i}.html")))
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let store = stores(&dir);
        let results = enrich(
            &mut loader,
            &listings,
            &test_config(),
            &StatusHandle::new(),
            &store,
            &CancellationToken::new(),
            0,
            Some(2),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
    }
}
