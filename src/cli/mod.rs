//! Command-line interface for hnbrief.
//!
//! Provides commands for running a story job to completion, checking a
//! job's status, listing jobs and showing the resolved configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use crate::adapters::{
    FabricSummarizer, HackerNewsClient, HeadlessRenderer, HtmlTextExtractor, HttpFetcher,
    WebResolver,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{drive, DriverConfig, JobDeps, JobError, Orchestrator};
use crate::domain::Story;
use crate::format;

/// hnbrief - Resumable Hacker News story briefings
#[derive(Parser, Debug)]
#[command(name = "hnbrief")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start or attach to a job and drive it until every story is summarized
    Run {
        /// Job identity
        #[arg(short, long, env = "HNBRIEF_JOB")]
        job: String,

        /// Topic to search for (only applied while the job has none)
        #[arg(short, long)]
        topic: Option<String>,

        /// Reset the job before running
        #[arg(long)]
        fresh: bool,

        /// Output format for the final result
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Show the status of a job
    Status {
        /// Job identity
        #[arg(short, long)]
        job: String,
    },

    /// List known jobs
    Jobs,

    /// Show resolved configuration (debug)
    Config,
}

/// Output format for `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                job,
                topic,
                fresh,
                format,
            } => run_job(&job, topic, fresh, format).await,
            Commands::Status { job } => show_status(&job).await,
            Commands::Jobs => list_jobs().await,
            Commands::Config => show_config(),
        }
    }
}

/// Build the production collaborators from configuration
fn build_deps(cfg: &ResolvedConfig) -> Result<JobDeps> {
    let lister = HackerNewsClient::new(cfg.listing.clone(), cfg.job.listing_timeout())?;

    let renderer = cfg
        .render
        .enabled
        .then(|| HeadlessRenderer::new(cfg.render.executable.clone()));
    let resolver = WebResolver::new(renderer, HttpFetcher::new()?);

    let extractor = HtmlTextExtractor::new()?;

    Ok(
        JobDeps::new(Arc::new(lister), Arc::new(resolver), Arc::new(extractor))
            .with_settings(cfg.job.clone()),
    )
}

fn build_summarizer(cfg: &ResolvedConfig) -> FabricSummarizer {
    let settings = &cfg.summarizer;
    let timeout = Duration::from_secs(settings.timeout_seconds);

    match &settings.binary {
        Some(binary) => FabricSummarizer::with_binary_path(binary, &settings.pattern, timeout),
        None => FabricSummarizer::new(&settings.pattern, timeout),
    }
}

fn open_registry(cfg: &ResolvedConfig) -> Result<Orchestrator> {
    Ok(Orchestrator::new(cfg.jobs_dir(), build_deps(cfg)?))
}

/// Run a job to completion and print its result
async fn run_job(
    job_id: &str,
    topic: Option<String>,
    fresh: bool,
    output: OutputFormat,
) -> Result<()> {
    let cfg = config::config()?;
    let orchestrator = open_registry(cfg)?;
    let job = orchestrator.start_or_attach(job_id).await?;

    if fresh {
        let generation = job.reset_final_result_ready().await?;
        info!(job = job_id, generation, "Job reset");
    }

    if let Some(topic) = topic {
        match job.set_topic(topic.as_str()).await {
            Ok(()) => {}
            Err(JobError::TopicAlreadySet(current)) if current == topic.trim() => {}
            Err(JobError::TopicAlreadySet(current)) => {
                warn!(%current, requested = %topic, "Job already has a topic, keeping it");
            }
            Err(e) => {
                orchestrator.shutdown().await;
                return Err(e.into());
            }
        }
    }

    if job.get_topic().is_none() {
        orchestrator.shutdown().await;
        anyhow::bail!("Job '{}' has no topic yet. Pass --topic to start it", job_id);
    }

    let summarizer = Arc::new(build_summarizer(cfg));
    let driver = DriverConfig {
        concurrency: cfg.summarizer.concurrency,
    };

    let result = tokio::select! {
        result = drive(&job, summarizer, &driver) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!(job = job_id, "Interrupted, progress is saved and resumes on the next run");
            orchestrator.shutdown().await;
            return Ok(());
        }
    };

    orchestrator.shutdown().await;

    match result {
        Ok(stories) => print_result(&stories, output),
        Err(e @ JobError::ListingFailed(_)) => {
            println!("{}", serde_json::to_string_pretty(&e.payload())?);
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_result(stories: &[Story], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(stories)?),
        OutputFormat::Markdown => println!("{}", format::to_markdown(stories)),
    }
    Ok(())
}

/// Show the status of a job
async fn show_status(job_id: &str) -> Result<()> {
    let cfg = config::config()?;
    let orchestrator = open_registry(cfg)?;

    let Some(snapshot) = orchestrator.job_status(job_id).await? else {
        anyhow::bail!("No job found with identity '{}'", job_id);
    };

    let summarized = snapshot.stories.iter().filter(|s| s.is_terminal()).count();

    println!("Job: {}", snapshot.identity);
    println!("Phase: {}", snapshot.phase);
    println!("Generation: {}", snapshot.generation);
    println!("Topic: {}", snapshot.topic.as_deref().unwrap_or("(not set)"));
    println!("Stories: {} ({} summarized)", snapshot.stories.len(), summarized);
    println!("Pending previews: {}", snapshot.previews.len());
    if let Some(failure) = &snapshot.failure {
        println!("Failure: {}", failure);
    }

    Ok(())
}

/// List known jobs
async fn list_jobs() -> Result<()> {
    let cfg = config::config()?;
    let orchestrator = open_registry(cfg)?;
    let jobs = orchestrator.list_jobs().await?;

    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    println!("{:<30} {:<26} {:<10} {:<8}", "JOB", "CREATED", "PHASE", "STORIES");
    println!("{}", "-".repeat(77));

    for meta in jobs {
        let (phase, stories) = match orchestrator.job_status(&meta.identity).await {
            Ok(Some(snapshot)) => (snapshot.phase.to_string(), snapshot.stories.len()),
            Ok(None) => ("new".to_string(), 0),
            Err(e) => {
                warn!(job = %meta.identity, error = %e, "Failed to replay job");
                ("unreadable".to_string(), 0)
            }
        };
        println!(
            "{:<30} {:<26} {:<10} {:<8}",
            meta.identity,
            meta.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            phase,
            stories
        );
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("hnbrief configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home: {}", cfg.home.display());
    println!("  Jobs: {}", cfg.jobs_dir().display());
    println!();
    println!("Listing:");
    println!("  Endpoint:        {}", cfg.listing.endpoint);
    println!("  Tags:            {}", cfg.listing.tags);
    println!("  Numeric filters: {}", cfg.listing.numeric_filters);
    println!("  Page size:       {}", cfg.job.page_size);
    println!("  Page:            {}", cfg.job.page);
    println!("  Timeout:         {}s", cfg.job.listing_timeout_seconds);
    println!("  Max attempts:    {}", cfg.job.listing_retry.max_attempts);
    println!();
    println!("Resolver:");
    println!(
        "  Headless render: {}",
        if cfg.render.enabled { "enabled" } else { "disabled" }
    );
    println!("  Render timeout:  {}s", cfg.job.render_timeout_seconds);
    println!("  Fetch timeout:   {}s", cfg.job.fetch_timeout_seconds);
    println!();
    println!("Summarizer:");
    println!(
        "  Binary:      {}",
        cfg.summarizer.binary.as_deref().unwrap_or("(autodetect)")
    );
    println!("  Pattern:     {}", cfg.summarizer.pattern);
    println!("  Timeout:     {}s", cfg.summarizer.timeout_seconds);
    println!("  Concurrency: {}", cfg.summarizer.concurrency);
    println!();
    println!("Reset policy: {:?}", cfg.job.reset_policy);

    Ok(())
}
