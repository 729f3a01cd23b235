//! Keyword matching, blacklist filtering, and title deduplication.

use std::collections::HashSet;

use crate::models::Listing;

/// Terms that disqualify a listing regardless of keyword match.
///
/// Checked case-insensitively against titles at discovery and cleaning,
/// and against descriptions at detail extraction.
pub const DEFAULT_BLACKLIST: [&str; 19] = [
    "paid research",
    "get paid",
    "paid wellness",
    "sis4",
    "research",
    "study",
    "studies",
    "make america",
    "thinking about drinking less",
    "paid cash",
    "survey",
    "cash relief",
    "local",
    "extra income",
    "daily pay",
    "easiest money online",
    "paid to post",
    "paid for your opinions",
    "online survey",
];

/// Normalize a title for comparison: strip non-ASCII (emojis), collapse
/// whitespace, lowercase. The original title is never mutated.
pub fn normalize_title(title: &str) -> String {
    let ascii: String = title.chars().filter(char::is_ascii).collect();
    ascii
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when `title` matches the keyword rules: case-insensitive substring
/// match against any keyword, or any space-separated keyword component
/// longer than 3 characters equal to a whole word of the title. The
/// subword rule catches compound matches ("developer" inside
/// "web developer") without firing on short noise words.
pub fn has_keyword(title: &str, keywords: &[String]) -> bool {
    if title.is_empty() {
        return false;
    }
    let text = title.to_lowercase();

    for keyword in keywords {
        if text.contains(&keyword.to_lowercase()) {
            return true;
        }
    }

    let words: HashSet<&str> = text.split_whitespace().collect();
    for keyword in keywords {
        for part in keyword.to_lowercase().split_whitespace() {
            if part.len() > 3 && words.contains(part) {
                return true;
            }
        }
    }

    false
}

/// True when `text` contains any blacklisted term, case-insensitively.
pub fn is_blacklisted(text: &str, blacklist: &[String]) -> bool {
    if text.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    blacklist
        .iter()
        .any(|term| lower.contains(&term.to_lowercase()))
}

/// Drop exact duplicates by normalized title (keeping first occurrence)
/// and re-apply the blacklist over both normalized and original titles.
/// Idempotent: cleaning a cleaned set is a no-op.
pub fn clean_listings(listings: Vec<Listing>, blacklist: &[String]) -> Vec<Listing> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(listings.len());

    for listing in listings {
        let normalized = normalize_title(&listing.title);
        if seen.contains(&normalized) {
            tracing::debug!(title = %listing.title, "Dropping duplicate listing");
            continue;
        }
        if is_blacklisted(&normalized, blacklist) || is_blacklisted(&listing.title, blacklist) {
            tracing::info!(title = %listing.title, "Filtering out blacklisted listing");
            continue;
        }
        seen.insert(normalized);
        kept.push(listing);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    fn listing(title: &str) -> Listing {
        Listing {
            city: "newyork".into(),
            title: title.into(),
            link: format!("https://newyork.craigslist.org/{}", title.len()),
            post_date: "2025-06-01".into(),
            processed: false,
        }
    }

    #[test]
    fn test_keyword_substring_match_is_case_insensitive() {
        let keywords = kw(&["developer"]);
        assert!(has_keyword("Senior DEVELOPER wanted", &keywords));
        assert!(has_keyword("web developer needed", &keywords));
        assert!(!has_keyword("plumber needed", &keywords));
    }

    #[test]
    fn test_keyword_subword_match_requires_length_over_three() {
        // "web" (len 3) must not match as a subword, "developer" must.
        let keywords = kw(&["web developer"]);
        assert!(has_keyword("developer position", &keywords));
        assert!(!has_keyword("web of intrigue", &keywords));
        // Full-phrase substring still matches.
        assert!(has_keyword("junior web developer role", &keywords));
    }

    #[test]
    fn test_keyword_subword_matches_whole_words_only() {
        let keywords = kw(&["game developer"]);
        // "developers" is a different word; substring rule doesn't apply
        // ("game developer" isn't contained), subword rule needs equality.
        assert!(!has_keyword("developers conference", &keywords));
        assert!(has_keyword("developer conference", &keywords));
    }

    #[test]
    fn test_empty_title_never_matches() {
        assert!(!has_keyword("", &kw(&["developer"])));
    }

    #[test]
    fn test_blacklist_overrides_keyword_match() {
        let blacklist = kw(&["paid research"]);
        assert!(is_blacklisted("Developer for PAID RESEARCH study", &blacklist));
        assert!(!is_blacklisted("Developer for startup", &blacklist));
    }

    #[test]
    fn test_normalize_title_strips_emoji_and_spaces() {
        assert_eq!(
            normalize_title("🚀 Web   Developer \u{2014} Remote 🚀"),
            "web developer remote"
        );
    }

    #[test]
    fn test_clean_drops_duplicates_keeping_first() {
        let input = vec![
            listing("Web Developer"),
            listing("web   developer"),
            listing("🔥 WEB DEVELOPER"),
            listing("Backend Engineer"),
        ];
        let cleaned = clean_listings(input, &[]);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].title, "Web Developer");
        assert_eq!(cleaned[1].title, "Backend Engineer");
    }

    #[test]
    fn test_clean_applies_blacklist() {
        let blacklist = kw(&["survey"]);
        let input = vec![listing("Online Survey Taker"), listing("Web Developer")];
        let cleaned = clean_listings(input, &blacklist);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].title, "Web Developer");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let blacklist = kw(&["survey", "study"]);
        let input = vec![
            listing("Web Developer"),
            listing("WEB DEVELOPER"),
            listing("Paid Survey"),
            listing("Rust Engineer"),
        ];
        let once = clean_listings(input, &blacklist);
        let twice = clean_listings(once.clone(), &blacklist);
        assert_eq!(once, twice);
    }
}
