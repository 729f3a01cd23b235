//! Durable snapshots of in-progress results and the cross-run history
//! ledger.
//!
//! Checkpoint files are overwritten wholesale via write-temp-then-rename,
//! so a crash mid-write never corrupts the previous snapshot. The history
//! ledger is append-only with its header written exactly once.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::models::{EnrichedListing, HistoryRecord, Listing};

/// Links + results checkpoint files for one pipeline run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    links_path: PathBuf,
    results_path: PathBuf,
    null_sentinels: bool,
}

impl CheckpointStore {
    pub fn new(links_path: impl Into<PathBuf>, results_path: impl Into<PathBuf>) -> Self {
        Self {
            links_path: links_path.into(),
            results_path: results_path.into(),
            null_sentinels: false,
        }
    }

    /// Write the literal string `null` into empty result cells instead of
    /// leaving them blank. Off by default.
    pub fn with_null_sentinels(mut self) -> Self {
        self.null_sentinels = true;
        self
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn save_listings(&self, listings: &[Listing]) -> Result<(), AppError> {
        write_csv_atomic(&self.links_path, listings)?;
        tracing::info!(count = listings.len(), path = %self.links_path.display(), "Saved links checkpoint");
        Ok(())
    }

    pub fn load_listings(&self) -> Result<Vec<Listing>, AppError> {
        read_csv(&self.links_path)
    }

    pub fn save_results(&self, results: &[EnrichedListing]) -> Result<(), AppError> {
        if self.null_sentinels {
            let filled: Vec<EnrichedListing> =
                results.iter().map(fill_empty_with_null).collect();
            write_csv_atomic(&self.results_path, &filled)?;
        } else {
            write_csv_atomic(&self.results_path, results)?;
        }
        tracing::info!(count = results.len(), path = %self.results_path.display(), "Saved results checkpoint");
        Ok(())
    }

    pub fn load_results(&self) -> Result<Vec<EnrichedListing>, AppError> {
        read_csv(&self.results_path)
    }

    /// Remove both checkpoint files. Missing files are fine.
    pub fn clear(&self) -> Result<(), AppError> {
        for path in [&self.links_path, &self.results_path] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn fill_empty_with_null(rec: &EnrichedListing) -> EnrichedListing {
    let mut rec = rec.clone();
    for field in [
        &mut rec.description,
        &mut rec.default_mail,
        &mut rec.gmail,
        &mut rec.yahoo,
        &mut rec.outlook,
        &mut rec.aol,
    ] {
        if field.is_empty() {
            *field = "null".to_string();
        }
    }
    rec
}

fn write_csv_atomic<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AppError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Append-only ledger of every link ever discovered, used to skip
/// re-discovered postings on later runs.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    path: PathBuf,
}

impl HistoryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the ledger file with its header if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<(), AppError> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, "link,city,title,date_scraped\n")?;
        Ok(())
    }

    /// Every link already recorded.
    pub fn known_links(&self) -> Result<HashSet<String>, AppError> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut links = HashSet::new();
        for row in reader.deserialize::<HistoryRecord>() {
            links.insert(row?.link);
        }
        Ok(links)
    }

    /// Append listings whose links are not yet in the ledger. Returns how
    /// many were added.
    pub fn append_new(&self, listings: &[Listing], date_scraped: &str) -> Result<usize, AppError> {
        self.ensure_exists()?;
        let mut known = self.known_links()?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let mut added = 0;
        for listing in listings {
            if known.contains(&listing.link) {
                continue;
            }
            writer.serialize(HistoryRecord {
                link: listing.link.clone(),
                city: listing.city.clone(),
                title: listing.title.clone(),
                date_scraped: date_scraped.to_string(),
            })?;
            known.insert(listing.link.clone());
            added += 1;
        }
        writer.flush()?;

        if added > 0 {
            tracing::info!(added, path = %self.path.display(), "Appended new links to history ledger");
        }
        Ok(added)
    }

    /// All records, oldest first.
    pub fn records(&self) -> Result<Vec<HistoryRecord>, AppError> {
        read_csv(&self.path)
    }
}
