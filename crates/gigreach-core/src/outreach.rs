//! Outreach contracts: the cleaned job record handed to the email
//! composer, and the composer/mailer traits the client crate implements.

use std::future::Future;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::EnrichedListing;

/// Strip non-ASCII characters and collapse whitespace runs.
pub fn clean_text(text: &str) -> String {
    let ascii: String = text.chars().filter(char::is_ascii).collect();
    ascii.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a date string to ISO `YYYY-MM-DD`.
///
/// Accepts the JavaScript `Date` prefix (`Tue Jun 03 2025 14:30:00`) the
/// original front end produced, plus bare ISO; anything else passes
/// through trimmed.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(prefix) = trimmed.get(..24)
        && let Ok(parsed) = NaiveDateTime::parse_from_str(prefix, "%a %b %d %Y %H:%M:%S")
    {
        return parsed.format("%Y-%m-%d").to_string();
    }
    trimmed.to_string()
}

/// Collapse newlines out of a subject line; SMTP treats them as header
/// injection.
pub fn sanitize_subject(subject: &str) -> String {
    let cleaned = subject
        .split(['\r', '\n'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    if cleaned.is_empty() {
        "No Subject".to_string()
    } else {
        cleaned
    }
}

/// Split generated email text into (subject, body) using its `Subject:`
/// line. Without one, the whole text becomes the body under a generic
/// subject.
pub fn split_subject(text: &str) -> (String, String) {
    for (idx, line) in text.lines().enumerate() {
        if let Some(subject) = line.trim().strip_prefix("Subject:") {
            let body = text
                .lines()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, l)| l)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();
            return (sanitize_subject(subject), body);
        }
    }
    ("Job Application".to_string(), text.trim().to_string())
}

/// The cleaned record handed to the outreach generator: exactly the
/// fields of the generation contract, pre-cleaned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachRecord {
    pub title: String,
    pub description: String,
    pub post_date: String,
    pub link: String,
    pub city: String,
    pub persona_name: String,
}

impl OutreachRecord {
    pub fn from_listing(listing: &EnrichedListing, persona_name: &str) -> Self {
        Self {
            title: clean_text(&listing.title),
            description: clean_text(&listing.description),
            post_date: normalize_date(&listing.post_date),
            link: listing.link.clone(),
            city: clean_text(&listing.city),
            persona_name: persona_name.to_string(),
        }
    }
}

/// Persona fed to the composer: who the email claims to be from and the
/// system prompt shaping its voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    pub system_prompt: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Alex".to_string(),
            system_prompt: concat!(
                "You are a freelance web developer writing a short, warm, ",
                "professional first-contact email about a job posting. ",
                "Start with a 'Subject:' line. Reference the posting ",
                "specifically, keep it under 200 words, and close with the ",
                "sender's name."
            )
            .to_string(),
        }
    }
}

impl PersonaConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid persona {}: {e}", path.display())))
    }
}

/// Generates outreach email text for a cleaned job record. Free-form text
/// out; expected to contain a subject line and a job-reference marker.
pub trait Composer: Send + Sync {
    fn compose(
        &self,
        record: &OutreachRecord,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Delivers one email. Returns the delivery service's message on success.
pub trait Mailer: Send + Sync {
    fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}
