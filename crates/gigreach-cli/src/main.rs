use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gigreach_client::{ChromiumSessionManager, HttpMailer, LlmComposer};
use gigreach_core::checkpoint::CheckpointStore;
use gigreach_core::config::ScrapeConfig;
use gigreach_core::models::EnrichedListing;
use gigreach_core::outreach::{Composer, Mailer, OutreachRecord, PersonaConfig, split_subject};
use gigreach_core::pipeline::Pipeline;
use gigreach_core::status::StatusHandle;

#[derive(Parser)]
#[command(name = "gigreach", version, about = "Job-posting discovery and outreach scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the configured search pages and enrich matching listings
    Run {
        /// JSON config file (defaults + environment otherwise)
        #[arg(short, long, env = "GIGREACH_CONFIG_FILE")]
        config: Option<PathBuf>,

        /// Force a headless browser for this run
        #[arg(long)]
        headless: bool,
    },

    /// Generate an outreach email for one scraped result
    Compose {
        /// Results CSV produced by `run`
        #[arg(short, long, default_value = "output/results.csv")]
        results: PathBuf,

        /// Zero-based row index into the results file
        #[arg(short, long, default_value_t = 0)]
        index: usize,

        /// Persona JSON (name + system prompt)
        #[arg(short, long)]
        persona: Option<PathBuf>,

        /// LLM model to use (e.g., "gpt-4o-mini")
        #[arg(short, long, env = "GIGREACH_MODEL", default_value = "gpt-4o-mini")]
        model: String,

        /// OpenAI-compatible API base URL
        #[arg(
            short,
            long,
            env = "GIGREACH_BASE_URL",
            default_value = "https://api.openai.com/v1"
        )]
        base_url: String,

        /// API key (reads from GIGREACH_API_KEY env var if not provided)
        #[arg(short, long, env = "GIGREACH_API_KEY")]
        api_key: String,
    },

    /// Deliver an email through the delivery service
    Send {
        /// Recipient address
        #[arg(short, long)]
        to: String,

        /// Subject line (derived from the body's Subject: line if omitted)
        #[arg(short, long)]
        subject: Option<String>,

        /// Email body text
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the body from a file (e.g., the output of `compose`)
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// Delivery service base URL
        #[arg(long, env = "GIGREACH_MAILER_URL", default_value = "http://localhost:8001")]
        mailer_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gigreach=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, headless } => cmd_run(config, headless).await?,
        Commands::Compose {
            results,
            index,
            persona,
            model,
            base_url,
            api_key,
        } => cmd_compose(&results, index, persona, &model, &base_url, &api_key).await?,
        Commands::Send {
            to,
            subject,
            body,
            body_file,
            mailer_url,
        } => cmd_send(&to, subject, body, body_file, &mailer_url).await?,
    }

    Ok(())
}

async fn cmd_run(config_path: Option<PathBuf>, headless: bool) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => ScrapeConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => ScrapeConfig::from_env(),
    };
    if headless {
        config.headless = true;
    }

    tracing::info!(
        urls = config.search_urls.len(),
        headless = config.headless,
        "Starting scraping run"
    );

    let manager = ChromiumSessionManager::new(config.headless);
    let pipeline = Pipeline::new(manager, config.clone(), StatusHandle::new());

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Stop requested, finishing the current listing");
            ctrl_c_cancel.cancel();
        }
    });

    pipeline.run(cancel).await.map_err(|e| anyhow::anyhow!(e))?;

    let results = CheckpointStore::new(&config.links_file, &config.results_file)
        .load_results()
        .map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(total = results.len(), "Run finished");
    println!(
        "Scraping complete: {} results in {}",
        results.len(),
        config.results_file.display()
    );

    Ok(())
}

async fn cmd_compose(
    results_path: &PathBuf,
    index: usize,
    persona_path: Option<PathBuf>,
    model: &str,
    base_url: &str,
    api_key: &str,
) -> Result<()> {
    let mut reader = csv::Reader::from_path(results_path)
        .with_context(|| format!("Failed to open results file: {}", results_path.display()))?;
    let records: Vec<EnrichedListing> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .context("Invalid results file")?;

    let listing = records
        .get(index)
        .with_context(|| format!("No record at index {index} ({} rows)", records.len()))?;

    let persona = match persona_path {
        Some(path) => PersonaConfig::load(&path).map_err(|e| anyhow::anyhow!(e))?,
        None => PersonaConfig::default(),
    };

    let record = OutreachRecord::from_listing(listing, &persona.name);
    tracing::info!(title = %record.title, model, "Composing outreach email");

    let composer = LlmComposer::with_base_url(api_key, model, base_url)
        .map_err(|e| anyhow::anyhow!(e))?
        .with_persona(persona);
    let text = composer.compose(&record).await.map_err(|e| anyhow::anyhow!(e))?;

    println!("{text}");
    Ok(())
}

async fn cmd_send(
    to: &str,
    subject: Option<String>,
    body: Option<String>,
    body_file: Option<PathBuf>,
    mailer_url: &str,
) -> Result<()> {
    let raw_body = match (body, body_file) {
        (Some(body), _) => body,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read body file: {}", path.display()))?,
        (None, None) => anyhow::bail!("Provide --body or --body-file"),
    };

    // Composed text carries its own Subject: line; split it out unless
    // the caller gave one explicitly.
    let (subject, body) = match subject {
        Some(subject) => (subject, raw_body),
        None => split_subject(&raw_body),
    };

    let mailer = HttpMailer::new(mailer_url).map_err(|e| anyhow::anyhow!(e))?;
    let message = mailer
        .send(to, &subject, &body)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("{message}");
    Ok(())
}
