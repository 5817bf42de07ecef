use clap::Parser;
use pracuj_applier::config::{ConfigStore, DataPaths, Selectors};
use pracuj_applier::cookies::CookieStore;
use pracuj_applier::types::{BrowserConfig, Viewport};
use pracuj_applier::{apply, cli, scrape, ApplyOrchestrator, BrowserSession, LoginFlow, SessionConfig};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "pracuj-applier", about = "Automated job applications on pracuj.pl")]
struct Args {
    /// Data directory holding configs, cookies and CVs
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Skip the interactive menu and run this user's stored config
    #[arg(long)]
    user: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pracuj_applier=debug,info".into()),
        )
        .init();

    let args = Args::parse();
    let paths = DataPaths::new(&args.data_dir);
    paths.ensure_layout()?;

    let config = match &args.user {
        Some(user) => {
            let configs = ConfigStore::open(&paths).load_all();
            match configs.get(user) {
                Some(config) => config.clone(),
                None => {
                    error!("No stored config for user '{user}'");
                    std::process::exit(1);
                }
            }
        }
        None => cli::collect_config_interactive(&paths).await?,
    };

    run(config, paths).await
}

async fn run(config: SessionConfig, paths: DataPaths) -> anyhow::Result<()> {
    let selectors = Selectors::load(&paths);

    let browser_config = BrowserConfig {
        headless: config.headless,
        kind: config.browser,
        viewport: Viewport {
            width: 1280,
            height: 720,
        },
        user_agent: None,
        wait_timeout_ms: 15_000,
    };

    let session = BrowserSession::launch(browser_config.clone())?;
    let cookie_store = CookieStore::new(paths.cookies_file(&config.username));
    LoginFlow::new(&config, &selectors, cookie_store)
        .login(&session)
        .await?;

    let pages = scrape::run_scraper(&browser_config, &selectors, &config.filtered_job_url).await;
    let failed_pages = pages.iter().filter(|p| p.outcome.is_err()).count();
    if failed_pages > 0 {
        warn!("{failed_pages} page(s) failed to scrape and are missing from the results");
    }
    let offers = scrape::collect_offer_urls(&pages);
    if offers.is_empty() {
        info!("No offers found for {}", config.filtered_job_url);
        return Ok(());
    }

    let orchestrator = ApplyOrchestrator::new(&session, &config, &selectors, &paths);
    let records: Vec<apply::ExternalApplication> = orchestrator.apply(&offers).await?;
    info!(
        "Run complete: {} offers visited, {} external applications",
        offers.len(),
        records.len()
    );

    Ok(())
}
