//! HTTP boundary for the scrape engine
//!
//! Thin inbound collaborator: validates the request, invokes the core's
//! `execute`, and maps the terminal result to a JSON response. POST only;
//! malformed input is rejected before any browser session opens. Each
//! request runs its own session, so concurrent requests are isolated.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use clap::Parser;
use rod_scrape::artifact::FsStore;
use rod_scrape::engine::{ChromeEngine, ChromeOptions};
use rod_scrape::orchestrator::Scraper;
use rod_scrape::workflow::sites;
use rod_scrape::ScrapeConfig;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rod-scrape-server")]
#[command(version)]
#[command(about = "HTTP boundary for the land-record scrape engine", long_about = None)]
struct Cli {
    /// Target site identifier
    #[arg(long, default_value = "chatham-rod")]
    site: String,

    /// Port to listen on
    #[arg(long, short = 'p', default_value_t = 3000)]
    port: u16,

    /// Directory documents are stored under
    #[arg(long, value_name = "DIR", default_value = "./records")]
    store_dir: PathBuf,

    /// Launch browsers in headed mode
    #[arg(long, short = 'H')]
    headed: bool,
}

struct AppState {
    scraper: Scraper<ChromeEngine, FsStore>,
}

#[derive(Serialize)]
struct ScrapeResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn scrape(
    State(state): State<Arc<AppState>>,
    Json(config): Json<ScrapeConfig>,
) -> (StatusCode, Json<ScrapeResponse>) {
    // Reject malformed input before a browser session is opened
    if let Err(e) = config.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ScrapeResponse {
                ok: false,
                message: None,
                locator: None,
                error: Some(e.to_string()),
            }),
        );
    }

    // The engine blocks on browser I/O; keep it off the async workers
    let state = state.clone();
    let result = tokio::task::spawn_blocking(move || state.scraper.execute(&config)).await;

    match result {
        Ok(result) if result.success => (
            StatusCode::OK,
            Json(ScrapeResponse {
                ok: true,
                message: Some("scrape completed successfully".to_string()),
                locator: result.locator,
                error: None,
            }),
        ),
        Ok(result) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ScrapeResponse {
                ok: false,
                message: None,
                locator: None,
                error: result.error.or_else(|| Some("scrape failed".to_string())),
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ScrapeResponse {
                ok: false,
                message: None,
                locator: None,
                error: Some(format!("scrape task panicked: {}", e)),
            }),
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let workflow = sites::site_workflow(&cli.site).ok_or_else(|| {
        anyhow::anyhow!("unknown site '{}'; known sites: {}", cli.site, sites::known_sites().join(", "))
    })?;

    let engine = ChromeEngine::new(ChromeOptions::new().headless(!cli.headed));
    let scraper = Scraper::new(engine, FsStore::new(cli.store_dir), workflow);
    let state = Arc::new(AppState { scraper });

    let app = Router::new().route("/scrape", post(scrape)).with_state(state);

    let addr = format!("0.0.0.0:{}", cli.port);
    eprintln!("rod-scrape-server v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
