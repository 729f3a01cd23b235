//! Phase 1: crawl the configured search URLs and emit keyword-matched,
//! blacklist-filtered listings.
//!
//! Page structure is parsed from rendered-HTML snapshots so the extraction
//! itself is a pure function over a string; only navigation goes through
//! the browser session.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Local;
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{CheckpointStore, HistoryLedger};
use crate::config::ScrapeConfig;
use crate::delay::sleep_between;
use crate::error::AppError;
use crate::filter::{has_keyword, is_blacklisted};
use crate::loader::{PageClass, PageLoader};
use crate::models::{Listing, city_from_url, parse_post_date};
use crate::selectors;
use crate::status::StatusHandle;
use crate::traits::{PageDriver, SessionManager};

/// One raw search-result row before filtering.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub title: String,
    pub link: String,
    pub date_raw: Option<String>,
}

/// Extract candidate rows from a rendered search-results page, tolerating
/// the site's A/B DOM variants via the selector chains.
pub(crate) fn parse_search_rows(html: &str) -> Vec<Candidate> {
    let doc = Html::parse_document(html);
    let mut candidates = Vec::new();

    let rows: Vec<_> = selectors::RESULT_ROWS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .map(|sel| doc.select(&sel).collect::<Vec<_>>())
        .find(|rows| !rows.is_empty())
        .unwrap_or_default();

    let anchor_sels: Vec<Selector> = selectors::TITLE_ANCHORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();
    let label_sel = Selector::parse(selectors::TITLE_LABEL).ok();
    let date_sels: Vec<Selector> = selectors::POST_DATES
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();

    for row in rows {
        let Some(anchor) = anchor_sels.iter().find_map(|sel| row.select(sel).next()) else {
            continue;
        };

        let mut title = anchor.text().collect::<String>().trim().to_string();
        if title.is_empty()
            && let Some(label_sel) = &label_sel
            && let Some(label) = row.select(label_sel).next()
        {
            title = label.text().collect::<String>().trim().to_string();
        }
        if title.is_empty() {
            continue;
        }

        let Some(link) = anchor.value().attr("href") else {
            continue;
        };

        let date_raw = date_sels.iter().find_map(|sel| {
            row.select(sel).next().map(|el| {
                el.value()
                    .attr("title")
                    .map(str::to_string)
                    .unwrap_or_else(|| el.text().collect::<String>().trim().to_string())
            })
        });

        candidates.push(Candidate {
            title,
            link: link.to_string(),
            date_raw,
        });
    }

    candidates
}

/// Crawl every configured search URL in order and return the surviving
/// listings. A URL that fails to load is skipped, never fatal. Listings
/// are checkpointed and the history ledger extended after each URL.
pub async fn discover<M: SessionManager>(
    loader: &mut PageLoader<M>,
    config: &ScrapeConfig,
    status: &StatusHandle,
    store: &CheckpointStore,
    history: &HistoryLedger,
    cancel: &CancellationToken,
    max_listings: Option<usize>,
) -> Result<Vec<Listing>, AppError> {
    let mut all_listings: Vec<Listing> = Vec::new();
    let mut seen_links: HashSet<String> = HashSet::new();
    let known_links = history.known_links()?;

    'urls: for url in &config.search_urls {
        if cancel.is_cancelled() {
            break;
        }

        let city = city_from_url(url);
        status.set_city(&city);
        tracing::info!(%url, %city, "Scanning search page");

        if !loader.load(url, PageClass::Search).await {
            tracing::warn!(%url, "Skipping URL after failed load");
            continue;
        }

        sleep_between(Duration::from_secs(2), Duration::from_secs(5)).await;

        let html = match loader.driver() {
            Some(driver) => match driver.content().await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(%url, error = %e, "Could not read search page content");
                    continue;
                }
            },
            None => continue,
        };

        let candidates = parse_search_rows(&html);
        if candidates.is_empty() {
            tracing::info!(%url, "No listings found on search page");
            continue;
        }
        tracing::info!(%url, count = candidates.len(), "Found candidate listings");

        let today = Local::now().date_naive();
        for candidate in candidates {
            if cancel.is_cancelled() {
                break 'urls;
            }

            if known_links.contains(&candidate.link) || seen_links.contains(&candidate.link) {
                tracing::debug!(link = %candidate.link, "Skipping already-seen link");
                continue;
            }

            if !has_keyword(&candidate.title, &config.keywords) {
                continue;
            }
            if is_blacklisted(&candidate.title, &config.blacklist) {
                tracing::info!(title = %candidate.title, "Skipping blacklisted title");
                continue;
            }

            tracing::info!(title = %candidate.title, %city, "Adding listing");
            seen_links.insert(candidate.link.clone());
            all_listings.push(Listing {
                city: city.clone(),
                title: candidate.title,
                link: candidate.link,
                post_date: parse_post_date(candidate.date_raw.as_deref().unwrap_or(""), today),
                processed: false,
            });

            if let Some(max) = max_listings
                && all_listings.len() >= max
            {
                break;
            }

            sleep_between(Duration::from_millis(500), Duration::from_millis(1500)).await;
        }

        store.save_listings(&all_listings)?;
        let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        history.append_new(&all_listings, &now)?;

        if let Some(max) = max_listings
            && all_listings.len() >= max
        {
            break;
        }

        sleep_between(Duration::from_secs(5), Duration::from_secs(10)).await;
    }

    Ok(all_listings)
}
