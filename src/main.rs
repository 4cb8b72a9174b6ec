use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

mod auth;
mod browser;
mod daterange;
mod error;
mod export;
mod extract;
mod navigate;
mod normalize;
mod run;
mod search;
mod store;
mod types;
mod webdriver;

use auth::Credentials;
use store::RecordStore;
use types::SearchCriteria;
use webdriver::SessionConfig;

const DEFAULT_DB: &str = "records.db";

#[derive(Parser)]
#[command(name = "eclerks-scraper")]
#[command(about = "Scrape Louisiana eClerks criminal case records into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, search a filing-date range, and persist every result row
    Run {
        /// Start of the search range (MM/DD/YYYY)
        #[arg(long, default_value = "01/01/2020")]
        from_date: String,
        /// End of the search range (MM/DD/YYYY); defaults to today
        #[arg(long)]
        to_date: Option<String>,
        /// Maximum number of result pages to walk
        #[arg(long, default_value_t = 1)]
        max_pages: u32,
        /// Run the browser without a visible window
        #[arg(long)]
        headless: bool,
        /// SQLite database file
        #[arg(long, default_value = DEFAULT_DB)]
        db: String,
        /// CSV export file for this run's records
        #[arg(long, default_value = run::DEFAULT_EXPORT_FILE)]
        output: PathBuf,
        /// WebDriver endpoint
        #[arg(long, default_value = webdriver::DEFAULT_WEBDRIVER_URL)]
        webdriver_url: String,
    },
    /// Verify credentials, the WebDriver endpoint, and the database
    Check {
        #[arg(long, default_value = DEFAULT_DB)]
        db: String,
        #[arg(long, default_value = webdriver::DEFAULT_WEBDRIVER_URL)]
        webdriver_url: String,
    },
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn parse_cli_date(raw: &str, flag: &str) -> Result<chrono::NaiveDate> {
    normalize::parse_date(raw)
        .with_context(|| format!("{flag} '{raw}' is not a recognized date (MM/DD/YYYY)"))
}

fn run_scrape(
    from_date: String,
    to_date: Option<String>,
    max_pages: u32,
    headless: bool,
    db: String,
    output: PathBuf,
    webdriver_url: String,
) -> Result<()> {
    if max_pages == 0 {
        bail!("--max-pages must be at least 1");
    }
    let from = parse_cli_date(&from_date, "--from-date")?;
    let to = match to_date {
        Some(raw) => parse_cli_date(&raw, "--to-date")?,
        None => Local::now().date_naive(),
    };
    if from > to {
        bail!("--from-date is after --to-date");
    }

    // Credentials are validated before any browser resource exists.
    let credentials = Credentials::from_env()?;
    let store = RecordStore::open(&db).with_context(|| format!("opening database {db}"))?;

    let criteria = SearchCriteria {
        from_date: from,
        to_date: to,
        max_pages,
    };
    let session_config = SessionConfig {
        webdriver_url,
        headless,
        ..SessionConfig::default()
    };
    let runner_config = run::RunnerConfig {
        export_path: output,
        ..run::RunnerConfig::default()
    };

    let report = run::run(credentials, criteria, &store, session_config, &runner_config);

    println!();
    for (phase, outcome) in &report.phases {
        println!("  {:<10} {}", phase.as_str(), outcome.as_str());
    }
    println!();
    println!(
        "Processed {} record(s) over {} page(s): {} created, {} updated.",
        report.records_scraped,
        report.pages_processed,
        report.records_created,
        report.records_updated
    );
    if report.degraded_date_filter {
        println!("Note: date filter could not be applied; results are unfiltered.");
    }
    println!("Database now holds {} record(s).", store.count()?);

    match report.error {
        None => Ok(()),
        Some(error) => bail!("run failed: {error}"),
    }
}

fn run_check(db: String, webdriver_url: String) -> Result<()> {
    let mut failures = 0;

    match Credentials::from_env() {
        Ok(credentials) => {
            let shown: String = credentials.email.chars().take(3).collect();
            println!("ok   credentials present ({shown}***)");
        }
        Err(e) => {
            println!("FAIL credentials: {e}");
            failures += 1;
        }
    }

    match webdriver::endpoint_ready(&webdriver_url) {
        Ok(true) => println!("ok   webdriver endpoint ready at {webdriver_url}"),
        Ok(false) => {
            println!("FAIL webdriver endpoint at {webdriver_url} is not ready");
            failures += 1;
        }
        Err(e) => {
            println!("FAIL webdriver endpoint at {webdriver_url}: {e}");
            failures += 1;
        }
    }

    match RecordStore::open(&db).and_then(|store| store.count()) {
        Ok(count) => println!("ok   database {db} opens ({count} record(s))"),
        Err(e) => {
            println!("FAIL database {db}: {e}");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    println!("All checks passed.");
    Ok(())
}

fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            from_date,
            to_date,
            max_pages,
            headless,
            db,
            output,
            webdriver_url,
        } => run_scrape(
            from_date,
            to_date,
            max_pages,
            headless,
            db,
            output,
            webdriver_url,
        ),
        Commands::Check { db, webdriver_url } => run_check(db, webdriver_url),
    }
}
