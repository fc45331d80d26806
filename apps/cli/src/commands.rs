//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sitekb_artifacts::OutputFormat;
use sitekb_core::{JobOverrides, OutputTarget};
use sitekb_crawler::{CrawlState, PageProgress, ProgressReporter, Termination};
use sitekb_shared::{
    AppConfig, FetchMode, FetchStatus, config_file_path, init_config, load_config,
    load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitekb: turn a website into a knowledge base for retrieval pipelines.
#[derive(Parser)]
#[command(
    name = "sitekb",
    version,
    about = "Crawl a website into chunked, entity-annotated knowledge-base records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json. Logs go to stderr.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.sitekb/sitekb.toml.
    #[arg(long = "config", global = true, env = "SITEKB_CONFIG")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a site breadth-first and emit its knowledge base.
    Crawl {
        /// Root URL. `https://` is assumed when no scheme is given.
        url: String,

        #[command(flatten)]
        job: JobArgs,

        /// Output format: json, jsonl or text.
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,

        /// Write output here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// List each page's links in the text report.
        #[arg(long)]
        include_links: bool,
    },

    /// Fetch and process a single page without following links.
    Scrape {
        url: String,

        #[command(flatten)]
        job: JobArgs,

        /// Print the page's links after its text.
        #[arg(long)]
        include_links: bool,

        /// Write the report here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Per-job settings. Unset flags fall back to the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct JobArgs {
    /// Maximum link depth from the root.
    #[arg(short = 'd', long)]
    pub max_depth: Option<u32>,

    /// Maximum number of pages to scrape.
    #[arg(short = 'n', long)]
    pub max_pages: Option<usize>,

    /// Minimum delay between requests, in milliseconds.
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Fetch mode: static or rendered.
    #[arg(short, long)]
    pub mode: Option<FetchMode>,

    /// Maximum characters per chunk.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters repeated between consecutive chunks.
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Concurrent page workers.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Per-request timeout, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Stop dequeuing after this many seconds.
    #[arg(long)]
    pub deadline: Option<u64>,

    /// User-Agent header.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Only follow paths matching this glob (repeatable).
    #[arg(long = "include")]
    pub include: Vec<String>,

    /// Never follow paths matching this glob (repeatable).
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Skip responses whose Content-Type is not text.
    #[arg(long)]
    pub mime_check: bool,

    /// Show the browser window in rendered mode.
    #[arg(long)]
    pub headed: bool,
}

impl From<JobArgs> for JobOverrides {
    fn from(args: JobArgs) -> Self {
        Self {
            max_depth: args.max_depth,
            max_pages: args.max_pages,
            delay_ms: args.delay_ms,
            fetch_mode: args.mode,
            chunk_size: args.chunk_size,
            chunk_overlap: args.chunk_overlap,
            workers: args.workers,
            timeout_secs: args.timeout,
            deadline_secs: args.deadline,
            user_agent: args.user_agent,
            include_patterns: args.include,
            exclude_patterns: args.exclude,
            mime_check: args.mime_check,
            headed: args.headed,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init,
    /// Show the resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. `RUST_LOG` wins when set.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitekb=info",
        1 => "sitekb=debug",
        _ => "sitekb=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_file;
    match cli.command {
        Command::Crawl {
            url,
            job,
            format,
            output,
            include_links,
        } => {
            let config = resolve_config(config_path.as_ref())?;
            cmd_crawl(&url, &config, job.into(), format, output, include_links).await
        }
        Command::Scrape {
            url,
            job,
            include_links,
            output,
        } => {
            let config = resolve_config(config_path.as_ref())?;
            cmd_scrape(&url, &config, job.into(), include_links, output).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_ref()),
        },
    }
}

fn resolve_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

fn output_target(output: Option<PathBuf>) -> OutputTarget {
    output.map_or(OutputTarget::Stdout, OutputTarget::File)
}

async fn cmd_crawl(
    url: &str,
    config: &AppConfig,
    overrides: JobOverrides,
    format: OutputFormat,
    output: Option<PathBuf>,
    include_links: bool,
) -> Result<()> {
    let job = sitekb_core::build_job(url, config, &overrides)?;
    info!(
        url = %job.root_url,
        max_depth = job.max_depth,
        max_pages = job.max_pages,
        mode = ?job.fetch_mode,
        "crawling site"
    );

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight pages");
                cancel.cancel();
            }
        })
    };

    let reporter = CliProgress::new();
    let report = sitekb_core::run_crawl(job, &reporter, &cancel).await;
    ctrl_c.abort();
    let report = report?;
    reporter.finish();

    // A cancelled crawl still writes what it has.
    sitekb_core::write_knowledge_base(
        &report.knowledge_base,
        format,
        include_links,
        &output_target(output),
    )?;

    let kb = &report.knowledge_base;
    eprintln!();
    eprintln!("  Pages:    {}", kb.total_pages);
    eprintln!("  Chunks:   {}", kb.total_chunks);
    eprintln!("  Tokens:   {}", kb.total_tokens);
    eprintln!("  Failures: {}", kb.failures.len());
    eprintln!("  Warnings: {}", report.warnings.len());
    eprintln!("  Stopped:  {}", termination_label(report.termination));
    eprintln!("  Time:     {:.1}s", report.duration.as_secs_f64());
    eprintln!();

    if report.state == CrawlState::Failed {
        return Err(eyre!("no page could be scraped from {}", kb.root_url));
    }
    Ok(())
}

fn termination_label(termination: Termination) -> &'static str {
    match termination {
        Termination::FrontierExhausted => "no more pages in scope",
        Termination::PageLimit => "page limit reached",
        Termination::Cancelled => "cancelled",
        Termination::Deadline => "deadline reached",
    }
}

async fn cmd_scrape(
    url: &str,
    config: &AppConfig,
    overrides: JobOverrides,
    include_links: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let job = sitekb_core::build_job(url, config, &overrides)?;
    info!(url = %job.root_url, mode = ?job.fetch_mode, "scraping page");

    let scrape = sitekb_core::scrape_page(&job).await?;
    for warning in &scrape.warnings {
        warn!(kind = ?warning.kind, "{}", warning.message);
    }

    let report = sitekb_artifacts::render_page_report(&scrape.record, include_links);
    sitekb_core::emit(&report, &output_target(output))?;
    eprintln!("  {} chunks", scrape.chunks.len());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&PathBuf>) -> Result<()> {
    let config = resolve_config(path)?;
    let source = match path {
        Some(p) => p.clone(),
        None => config_file_path()?,
    };
    println!("# {}", source.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner on stderr, updated after every page.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn state_changed(&self, state: CrawlState) {
        match state {
            CrawlState::Running => self.spinner.set_message("Crawling"),
            CrawlState::Completed | CrawlState::Failed => self.finish(),
            CrawlState::Idle => {}
        }
    }

    fn page_done(&self, page: &PageProgress) {
        let marker = match page.status {
            FetchStatus::Ok => "ok",
            FetchStatus::Skipped => "skipped",
            FetchStatus::Failed => "failed",
        };
        self.spinner.set_message(format!(
            "[{} scraped, {} queued] {marker} {}",
            page.pages_scraped, page.queued, page.url
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawl_flags_parse_into_overrides() {
        let cli = Cli::try_parse_from([
            "sitekb",
            "crawl",
            "example.com",
            "-d",
            "1",
            "--max-pages",
            "3",
            "--mode",
            "rendered",
            "--include",
            "/docs/**",
            "--include",
            "/blog/*",
            "--format",
            "jsonl",
        ])
        .unwrap();

        let Command::Crawl { job, format, .. } = cli.command else {
            panic!("expected crawl");
        };
        assert_eq!(format, OutputFormat::Jsonl);

        let overrides = JobOverrides::from(job);
        assert_eq!(overrides.max_depth, Some(1));
        assert_eq!(overrides.max_pages, Some(3));
        assert_eq!(overrides.fetch_mode, Some(FetchMode::Rendered));
        assert_eq!(overrides.include_patterns.len(), 2);
        assert!(overrides.chunk_size.is_none());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let result = Cli::try_parse_from(["sitekb", "crawl", "example.com", "--format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn scrape_takes_job_flags_and_links_switch() {
        let cli = Cli::try_parse_from([
            "sitekb",
            "-v",
            "scrape",
            "https://example.com/about",
            "--include-links",
            "--timeout",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Scrape {
            url,
            job,
            include_links,
            ..
        } = cli.command
        else {
            panic!("expected scrape");
        };
        assert_eq!(url, "https://example.com/about");
        assert!(include_links);
        assert_eq!(job.timeout, Some(10));
    }
}
