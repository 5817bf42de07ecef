use crate::browser::BrowserSession;
use crate::config::{ConfigStore, DataPaths, LlmProvider, SessionConfig};
use crate::errors::Result;
use crate::types::{BrowserConfig, BrowserKind};
use std::io::{self, Write};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

const FILTER_START_URL: &str = "https://pracuj.pl/praca";
const FILTER_WAIT: Duration = Duration::from_secs(60);

fn prompt(message: &str) -> Result<String> {
    print!("{message} ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_bool(message: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let answer = prompt(&format!("{message} {hint}"))?;
    Ok(match answer.to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    })
}

fn prompt_select<T: AsRef<str>>(message: &str, choices: &[T]) -> Result<usize> {
    println!("{message}");
    for (i, choice) in choices.iter().enumerate() {
        println!("  {}) {}", i + 1, choice.as_ref());
    }
    loop {
        let answer = prompt(">")?;
        match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= choices.len() => return Ok(n - 1),
            _ => println!("Enter a number between 1 and {}", choices.len()),
        }
    }
}

/// Runs the interactive menu and returns the configuration to run with.
/// Mirrors the stored-config lifecycle: reuse, create, refresh filters,
/// inspect, or exit.
pub async fn collect_config_interactive(paths: &DataPaths) -> Result<SessionConfig> {
    let store = ConfigStore::open(paths);
    let configs = store.load_all();

    if !configs.is_empty() {
        let action = prompt_select(
            "What would you like to do?",
            &[
                "Run with existing config",
                "Add new config",
                "Choose another filters for job",
                "Show config",
                "EXIT",
            ],
        )?;
        let usernames: Vec<String> = configs.keys().cloned().collect();

        match action {
            0 => {
                let which = prompt_select("Which user config to run?", &usernames)?;
                return Ok(configs[&usernames[which]].clone());
            }
            2 => {
                let which =
                    prompt_select("Which user config to change filtered job?", &usernames)?;
                let mut config = configs[&usernames[which]].clone();
                match capture_filtered_url(config.browser).await {
                    Ok(url) => {
                        config.filtered_job_url = url;
                        store.save_for_user(&config.username.clone(), &config)?;
                        info!("Filtered URL for '{}' updated", config.username);
                    }
                    Err(e) => error!("Could not get the filtered URL, no changes made: {e}"),
                }
                return Ok(config);
            }
            3 => {
                let which = prompt_select("Which user config you want to see?", &usernames)?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&configs[&usernames[which]])?
                );
                std::process::exit(0);
            }
            4 => std::process::exit(0),
            _ => {} // fall through to new-config setup
        }
    }

    println!("New configuration setup");
    println!("{}", "=".repeat(50));

    let username = prompt("Enter username:")?;
    let email = prompt("Enter email:")?;
    let password = prompt("Enter password:")?;
    let apply_with_ai = prompt_bool("Apply to external offers with AI?", true)?;
    let headless = prompt_bool("Run in headless mode?", true)?;
    let browser = match prompt_select("Select browser:", &["chrome", "chromium"])? {
        0 => BrowserKind::Chrome,
        _ => BrowserKind::Chromium,
    };

    let mut model_name = None;
    let mut provider = None;
    let mut base_url = None;
    let mut api_key = None;
    if apply_with_ai {
        model_name = Some(prompt("Enter model name:")?);
        let names: Vec<String> = LlmProvider::ALL.iter().map(|p| p.to_string()).collect();
        let chosen = LlmProvider::from_str(&names[prompt_select("Select provider:", &names)?])?;
        provider = Some(chosen);
        if chosen.requires_base_url() {
            base_url = Some(prompt("Enter base URL:")?);
            api_key = Some(prompt("Enter API key:")?);
        }
    }

    println!();
    println!("--- ATTENTION ---");
    println!("Please manually apply the desired filters on the page that just opened.");
    println!("After selecting your filters, click the 'Wyszukaj' (Find) button.");
    println!("The script will detect when the page reloads with new results.");
    println!("Waiting for the URL to change (max 60 seconds)...");

    let filtered_job_url = capture_filtered_url(browser).await?;

    let config = SessionConfig {
        email,
        password,
        filtered_job_url,
        username: if username.is_empty() {
            "main".to_string()
        } else {
            username
        },
        apply_with_ai,
        headless,
        browser,
        model_name,
        base_url,
        provider,
        api_key,
    };

    store.save_for_user(&config.username.clone(), &config)?;
    info!("Configuration for '{}' saved", config.username);
    Ok(config)
}

/// Opens the job board visibly, lets the user pick filters by hand, and
/// captures the URL once the search reloads the page.
pub async fn capture_filtered_url(browser: BrowserKind) -> Result<String> {
    let config = BrowserConfig {
        headless: false,
        kind: browser,
        ..Default::default()
    };

    let session = BrowserSession::launch(config)?;
    session.navigate(FILTER_START_URL)?;
    let initial = session.current_url();

    let url = session.wait_for_url_change(&initial, FILTER_WAIT).await?;
    info!("Successfully captured the new URL: {url}");
    Ok(url)
}
