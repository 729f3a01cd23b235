//! Orchestrates one full run: discover → clean → enrich, with phase and
//! progress transitions surfaced through the status handle.

use tokio_util::sync::CancellationToken;

use crate::checkpoint::{CheckpointStore, HistoryLedger};
use crate::config::ScrapeConfig;
use crate::defense::DefenseHandler;
use crate::detail::enrich;
use crate::discover::discover;
use crate::error::AppError;
use crate::filter::clean_listings;
use crate::loader::PageLoader;
use crate::status::{Phase, StatusHandle};
use crate::traits::SessionManager;

/// One pipeline run over a browser session manager.
///
/// Owns the run's config, checkpoint store, and history ledger. The
/// status handle passed at construction is the only window the control
/// surface gets into a running pipeline.
pub struct Pipeline<M: SessionManager> {
    manager: M,
    config: ScrapeConfig,
    status: StatusHandle,
    store: CheckpointStore,
    history: HistoryLedger,
}

impl<M: SessionManager> Pipeline<M> {
    pub fn new(manager: M, config: ScrapeConfig, status: StatusHandle) -> Self {
        let store = CheckpointStore::new(&config.links_file, &config.results_file);
        let history = HistoryLedger::new(&config.history_file);
        Self {
            manager,
            config,
            status,
            store,
            history,
        }
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }

    /// Run to completion (or cancellation). Any error below fatal has
    /// already been contained by the phases; what escapes here is fatal
    /// for the run and is reflected in the status before propagating.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), AppError> {
        self.status.reset();
        self.status
            .begin_phase(Phase::Discovery, 0, "Starting Phase 1");
        tracing::info!("Phase 1: Starting to scrape listings");

        let result = self.run_inner(&cancel).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Scraping run failed");
            self.status.finish_error(format!("Error: {e}"));
        }
        result
    }

    async fn run_inner(&self, cancel: &CancellationToken) -> Result<(), AppError> {
        self.config.validate()?;
        self.history.ensure_exists()?;

        let defense = DefenseHandler::new(self.status.clone(), self.config.headless);
        let mut loader =
            PageLoader::connect(self.manager.clone(), defense, self.config.max_retries).await?;

        let outcome = self.run_phases(&mut loader, cancel).await;
        loader.shutdown().await;
        outcome
    }

    async fn run_phases(
        &self,
        loader: &mut PageLoader<M>,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        let listings = discover(
            loader,
            &self.config,
            &self.status,
            &self.store,
            &self.history,
            cancel,
            None,
        )
        .await?;

        if cancel.is_cancelled() {
            self.status.mark_stopped("Cancelled");
            return Ok(());
        }
        if listings.is_empty() {
            tracing::info!("No listings found, scraping complete");
            self.status.finish_completed(true, "No listings found");
            return Ok(());
        }

        tracing::info!(count = listings.len(), "Phase 2: Cleaning listings");
        self.status.begin_phase(
            Phase::Cleaning,
            30,
            format!("Found {} listings", listings.len()),
        );
        let cleaned = clean_listings(listings, &self.config.blacklist);
        self.store.save_listings(&cleaned)?;

        tracing::info!(count = cleaned.len(), "Phase 2: Scraping details");
        self.status.begin_phase(
            Phase::Enriching,
            50,
            format!("Processing {} listings", cleaned.len()),
        );
        let results = enrich(
            loader,
            &cleaned,
            &self.config,
            &self.status,
            &self.store,
            cancel,
            0,
            None,
        )
        .await?;

        if cancel.is_cancelled() {
            self.status.mark_stopped("Cancelled");
            return Ok(());
        }

        tracing::info!(total = results.len(), "Scraping complete");
        self.status.finish_completed(false, "Scraping Complete");
        Ok(())
    }
}
