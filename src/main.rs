//! CLI front end: parses flags, builds a [`civic_crawler::CrawlConfig`],
//! runs the crawl, and prints the closing summary.

use std::path::PathBuf;

use civic_crawler::{crawl, CrawlConfig, CrawlOutcome, FetcherBackend};
use clap::Parser;

/// Polite, resumable web crawler for RAG content ingestion.
#[derive(Debug, Parser)]
#[command(name = "civic-crawler", about = "Crawl a site into canonical annotated text for a RAG pipeline.")]
struct Cli {
    /// Base URL to start crawling from.
    #[arg(long, short = 'u')]
    url: String,

    /// Output directory for crawled pages.
    #[arg(long, short = 'o', default_value = "output")]
    output: PathBuf,

    /// Maximum crawl depth from the base URL.
    #[arg(long, short = 'd', default_value_t = 3)]
    depth: u32,

    /// Minimum seconds between requests to the same host.
    #[arg(long, short = 'r', default_value_t = 1.0)]
    rate_limit: f64,

    /// Request timeout in seconds.
    #[arg(long, short = 't', default_value_t = 30)]
    timeout: u64,

    /// Maximum retry attempts for transient fetch failures.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Maximum pages to crawl before stopping.
    #[arg(long, default_value_t = 1_000)]
    max_pages: usize,

    /// Use the headless-browser backend for JavaScript-rendered sites.
    #[arg(long, short = 'b')]
    browser: bool,

    /// Show the browser window (only meaningful with --browser).
    #[arg(long)]
    no_headless: bool,

    /// Ignore robots.txt rules.
    #[arg(long)]
    no_robots: bool,

    /// User agent string sent with every request.
    #[arg(long)]
    user_agent: Option<String>,

    /// Download PDFs and documents linked from crawled pages.
    #[arg(long)]
    download_files: bool,

    /// Enable verbose (debug) logging.
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Write logs to this file in addition to stdout.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn setup_logging(verbose: bool, log_file: Option<&PathBuf>) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);

    if let Some(path) = log_file {
        if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
    }

    builder.init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.log_file.as_ref());

    let mode = if cli.browser { "Browser (headless Chrome)" } else { "HTTP (static)" };
    println!("\n{}", "=".repeat(60));
    println!("Civic Crawler");
    println!("{}", "=".repeat(60));
    println!("URL:        {}", cli.url);
    println!("Depth:      {}", cli.depth);
    println!("Output:     {}", cli.output.display());
    println!("Rate Limit: {}s", cli.rate_limit);
    println!("Mode:       {mode}");
    println!("{}\n", "=".repeat(60));

    let mut config = CrawlConfig::new(&cli.url)
        .with_output_dir(cli.output.clone())
        .with_max_depth(cli.depth)
        .with_max_pages(cli.max_pages)
        .with_rate_limit(cli.rate_limit)
        .with_timeout(cli.timeout)
        .with_max_retries(cli.max_retries)
        .with_respect_robots(!cli.no_robots)
        .with_download_files(cli.download_files)
        .with_fetcher_backend(if cli.browser { FetcherBackend::Browser } else { FetcherBackend::Http })
        .with_browser_headless(!cli.no_headless);

    if let Some(user_agent) = cli.user_agent {
        config = config.with_user_agent(user_agent);
    }

    let (stats, outcome) = match crawl(config).await {
        Ok(result) => result,
        Err(err) => {
            log::error!("crawl failed: {err:#}");
            return std::process::ExitCode::FAILURE;
        }
    };

    println!("\n\n{}", "=".repeat(60));
    println!("Crawl Complete!");
    println!("{}", "=".repeat(60));
    println!("Pages Crawled:  {}", stats.pages_crawled);
    println!("Pages Saved:    {}", stats.pages_saved);
    println!("Pages Skipped:  {} (unchanged / filtered)", stats.pages_skipped);
    println!("Pages Failed:   {}", stats.pages_failed);
    println!("Total Words:    {}", stats.total_words);
    println!("Duration:       {:.1} seconds", stats.duration().as_secs_f64());
    println!("{}", "=".repeat(60));

    println!("\nOutput Directory: {}", cli.output.display());

    if stats.total_errors() > 0 {
        println!("\n{} errors occurred (see log for details)", stats.total_errors());
    }

    if stats.files_downloaded > 0 {
        println!("\nFiles Downloaded: {}", stats.files_downloaded);
    }

    if stats.links_extracted > 0 {
        println!("\nLinks Extracted (saved to links.json): {}", stats.links_extracted);
    }

    if outcome == CrawlOutcome::Interrupted {
        println!("\nInterrupted before completion; resume by re-running the same command.");
        std::process::ExitCode::FAILURE
    } else {
        std::process::ExitCode::SUCCESS
    }
}
