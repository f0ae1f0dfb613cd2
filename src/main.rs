mod completeness;
mod config;
mod error;
mod input;
mod output;
mod pipeline;
mod retry;
mod scraper;
mod summary;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::output::{OutputWriter, DEFAULT_OUT_DIR};
use crate::scraper::{FirecrawlClient, ScrapeClient};

#[derive(Parser)]
#[command(name = "md_harvest", about = "Scrape a list of pages to markdown via Firecrawl")]
struct Cli {
    /// File of `Name,URL` lines (blank lines and `#` comments ignored)
    #[arg(short, long)]
    input: PathBuf,

    /// Scrape every page with scroll/wait actions instead of retrying on thin content
    #[arg(short, long)]
    enhanced: bool,

    /// Crawl from each URL instead, saving up to N pages per entry as `<name>_<n>.md`
    #[arg(long, value_name = "N", conflicts_with = "enhanced", value_parser = clap::value_parser!(u32).range(1..))]
    crawl_limit: Option<u32>,

    /// Directory for the `<name>.md` files
    #[arg(short, long, default_value = DEFAULT_OUT_DIR)]
    out_dir: PathBuf,

    /// Also write a `<name>.json` record next to each markdown file
    #[arg(long)]
    json: bool,

    /// Remove markdown image syntax before writing
    #[arg(long)]
    strip_images: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Variables already set in the environment win over `.env`.
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring .env: {}", e),
    }

    let t0 = Instant::now();
    let cli = Cli::parse();

    let code = run_cli(&cli, |key| std::env::var(key).ok(), FirecrawlClient::new).await?;

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(ExitCode::from(code))
}

/// Everything after argument parsing. The credential is checked before the
/// input is read or a client exists; returns the process exit code.
async fn run_cli<C, L, F>(cli: &Cli, lookup: L, connect: F) -> anyhow::Result<u8>
where
    C: ScrapeClient,
    L: Fn(&str) -> Option<String>,
    F: FnOnce(&Config) -> anyhow::Result<C>,
{
    let config = Config::from_lookup(lookup)?;
    let loaded = input::load_entries(&cli.input)?;
    if loaded.entries.is_empty() {
        println!("No entries in {}.", cli.input.display());
        if !loaded.malformed.is_empty() {
            println!("Skipped {} malformed input line(s).", loaded.malformed.len());
        }
        return Ok(0);
    }

    let client = connect(&config)?;
    let writer = OutputWriter::new(&cli.out_dir)
        .with_json(cli.json)
        .with_strip_images(cli.strip_images);

    info!("Using Firecrawl at {}", config.api_url);
    let mut summary = match cli.crawl_limit {
        Some(limit) => {
            println!(
                "Crawling {} sites (up to {} pages each) into {}...",
                loaded.entries.len(),
                limit,
                writer.dir().display()
            );
            pipeline::run_crawl(&client, &loaded.entries, &writer, limit).await?
        }
        None => {
            let mode = if cli.enhanced { "enhanced" } else { "auto" };
            println!(
                "Scraping {} pages ({} mode) into {}...",
                loaded.entries.len(),
                mode,
                writer.dir().display()
            );
            pipeline::run(&client, &loaded.entries, &writer, cli.enhanced).await?
        }
    };
    summary.malformed_lines = loaded.malformed.len();
    summary.overwritten_files = writer.overwritten();
    summary.print();

    Ok(summary.exit_code())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
