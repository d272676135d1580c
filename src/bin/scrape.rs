//! One-shot scrape runner
//!
//! Runs a single site workflow from the command line and prints the terminal
//! result as JSON. The exit code follows the result's success flag.

use clap::Parser;
use rod_scrape::artifact::FsStore;
use rod_scrape::engine::{ChromeEngine, ChromeOptions};
use rod_scrape::orchestrator::Scraper;
use rod_scrape::workflow::sites;
use rod_scrape::ScrapeConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scrape")]
#[command(version)]
#[command(about = "Scrape a county land-record site and store the exported document", long_about = None)]
struct Cli {
    /// Target site identifier
    #[arg(long, default_value = "chatham-rod")]
    site: String,

    /// How many days back the search window reaches (1-365)
    #[arg(long, default_value_t = 30)]
    days_back: u32,

    /// Record/instrument type filter (site default when omitted)
    #[arg(long)]
    record_type: Option<String>,

    /// Directory documents are stored under
    #[arg(long, value_name = "DIR", default_value = "./records")]
    store_dir: PathBuf,

    /// Launch the browser in headed mode (useful for debugging)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to a custom Chrome/Chromium executable
    #[arg(long, value_name = "PATH")]
    chrome_path: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let workflow = sites::site_workflow(&cli.site).ok_or_else(|| {
        anyhow::anyhow!("unknown site '{}'; known sites: {}", cli.site, sites::known_sites().join(", "))
    })?;

    let mut options = ChromeOptions::new().headless(!cli.headed);
    if let Some(path) = cli.chrome_path {
        options = options.chrome_path(path);
    }

    eprintln!("rod-scrape v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("site: {}", workflow.id);
    eprintln!("browser mode: {}", if cli.headed { "headed" } else { "headless" });

    let scraper = Scraper::new(ChromeEngine::new(options), FsStore::new(cli.store_dir), workflow);
    let config = ScrapeConfig { days_back: cli.days_back, record_type: cli.record_type };

    let result = scraper.execute(&config);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
