use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

/// Sentinel written when a detail page renders but carries no recognizable
/// description region.
pub const DESCRIPTION_NOT_FOUND: &str = "Description Not Found";

/// Sentinel written when the detail page never loaded despite all retries.
pub const PAGE_LOAD_FAILED: &str = "Error: Failed to load page";

/// Sentinel written when the reply-email reveal produced no address.
pub const EMAIL_NOT_AVAILABLE: &str = "Not Available";

/// One discovered job posting, as emitted by listing discovery.
///
/// Serde renames match the links checkpoint CSV header exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Title")]
    pub title: String,
    /// Unique key within a run.
    #[serde(rename = "Link")]
    pub link: String,
    /// ISO date, best-effort; falls back to the discovery date.
    #[serde(rename = "Post Date")]
    pub post_date: String,
    #[serde(rename = "Processed")]
    pub processed: bool,
}

/// Remote-work classification derived from the posting description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteStatus {
    #[serde(rename = "Remote")]
    Remote,
    #[serde(rename = "Non-Remote")]
    NonRemote,
    #[serde(rename = "Not Specified")]
    NotSpecified,
}

impl RemoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::Remote => "Remote",
            RemoteStatus::NonRemote => "Non-Remote",
            RemoteStatus::NotSpecified => "Not Specified",
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RemoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Remote" => Ok(RemoteStatus::Remote),
            "Non-Remote" => Ok(RemoteStatus::NonRemote),
            "Not Specified" => Ok(RemoteStatus::NotSpecified),
            _ => Err(format!("Unknown remote status: {}", s)),
        }
    }
}

/// Webmail deep links revealed alongside the reply address.
///
/// Each field is a URL or empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebmailLinks {
    pub default_mail: String,
    pub gmail: String,
    pub yahoo: String,
    pub outlook: String,
    pub aol: String,
}

/// A [`Listing`] enriched by detail extraction.
///
/// `remote` and `email` are always populated: either a real value or the
/// sentinel from their domain, never absent. Serde renames match the
/// results checkpoint CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedListing {
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Link")]
    pub link: String,
    #[serde(rename = "Post Date")]
    pub post_date: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Remote")]
    pub remote: RemoteStatus,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Default Mail")]
    pub default_mail: String,
    #[serde(rename = "Gmail")]
    pub gmail: String,
    #[serde(rename = "Yahoo")]
    pub yahoo: String,
    #[serde(rename = "Outlook")]
    pub outlook: String,
    #[serde(rename = "AOL")]
    pub aol: String,
    #[serde(rename = "Processed")]
    pub processed: bool,
}

impl EnrichedListing {
    /// Start from a discovered listing with every enrichment field at its
    /// "not yet extracted" sentinel.
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            city: listing.city.clone(),
            title: listing.title.clone(),
            link: listing.link.clone(),
            post_date: listing.post_date.clone(),
            description: String::new(),
            remote: RemoteStatus::NotSpecified,
            email: EMAIL_NOT_AVAILABLE.to_string(),
            default_mail: String::new(),
            gmail: String::new(),
            yahoo: String::new(),
            outlook: String::new(),
            aol: String::new(),
            processed: false,
        }
    }

    /// Record for a detail page that never loaded.
    pub fn load_failed(listing: &Listing) -> Self {
        let mut rec = Self::from_listing(listing);
        rec.description = PAGE_LOAD_FAILED.to_string();
        rec.processed = true;
        rec
    }

    pub fn set_webmail(&mut self, links: WebmailLinks) {
        self.default_mail = links.default_mail;
        self.gmail = links.gmail;
        self.yahoo = links.yahoo;
        self.outlook = links.outlook;
        self.aol = links.aol;
    }
}

/// One row of the cross-run history ledger. Immutable once written;
/// unique by link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub link: String,
    pub city: String,
    pub title: String,
    pub date_scraped: String,
}

/// Derive the city name from a search URL's first host segment,
/// e.g. `https://newyork.craigslist.org/search/web` → `newyork`.
pub fn city_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .and_then(|host| host.split('.').next().map(str::to_string))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Best-effort parse of a posting date into ISO `YYYY-MM-DD`.
///
/// Accepts the bare ISO form and the site's `YYYY-MM-DD HH:MM` title
/// attribute; anything else falls back to the discovery date.
pub fn parse_post_date(raw: &str, today: NaiveDate) -> String {
    let trimmed = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return d.format("%Y-%m-%d").to_string();
    }
    if let Some((date_part, _)) = trimmed.split_once(' ')
        && let Ok(d) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
    {
        return d.format("%Y-%m-%d").to_string();
    }
    today.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_roundtrip() {
        for status in [
            RemoteStatus::Remote,
            RemoteStatus::NonRemote,
            RemoteStatus::NotSpecified,
        ] {
            let s = status.as_str();
            let parsed: RemoteStatus = s.parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_city_from_url() {
        assert_eq!(
            city_from_url("https://newyork.craigslist.org/search/web"),
            "newyork"
        );
        assert_eq!(
            city_from_url("https://sfbay.craigslist.org/search/sof?query=rust"),
            "sfbay"
        );
        assert_eq!(city_from_url("not a url"), "unknown");
    }

    #[test]
    fn test_parse_post_date() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(parse_post_date("2025-05-28", today), "2025-05-28");
        assert_eq!(parse_post_date("2025-05-28 14:30", today), "2025-05-28");
        assert_eq!(parse_post_date("3 days ago", today), "2025-06-01");
        assert_eq!(parse_post_date("", today), "2025-06-01");
    }

    #[test]
    fn test_enriched_sentinels_always_populated() {
        let listing = Listing {
            city: "newyork".into(),
            title: "Web Developer".into(),
            link: "https://newyork.craigslist.org/web/1.html".into(),
            post_date: "2025-05-28".into(),
            processed: false,
        };
        let rec = EnrichedListing::from_listing(&listing);
        assert_eq!(rec.email, EMAIL_NOT_AVAILABLE);
        assert_eq!(rec.remote, RemoteStatus::NotSpecified);

        let failed = EnrichedListing::load_failed(&listing);
        assert_eq!(failed.description, PAGE_LOAD_FAILED);
        assert!(failed.processed);
    }
}
