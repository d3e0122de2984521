use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use rss_aggregator::config::Config;
use rss_aggregator::feed::{build_http_client, validate_feed_url};
use rss_aggregator::scraper::Scheduler;
use rss_aggregator::storage::{Database, StoreError};

/// Get the default config file path (~/.config/rss-aggregator/config.toml)
fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("rss-aggregator")
            .join("config.toml"),
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "rss-aggregator",
    version,
    about = "Periodically scrape RSS feeds into SQLite"
)]
struct Cli {
    /// Config file (defaults to ~/.config/rss-aggregator/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database path, overrides the config file
    #[arg(long, global = true, env = "DB_PATH", value_name = "PATH")]
    database: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scraper (default)
    Run(RunArgs),
    /// Register a feed to scrape
    AddFeed {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Owning user id in the API layer
        #[arg(long)]
        owner: Option<String>,
    },
    /// Stop tracking a feed and delete its posts
    RemoveFeed { id: i64 },
    /// List tracked feeds with their last fetch time
    ListFeeds,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Seconds between scrape cycles
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Feeds fetched concurrently per cycle
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

fn load_config(cli: &Cli, run: Option<&RunArgs>) -> Result<Config> {
    let mut config = match cli.config.as_ref().cloned().or_else(default_config_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(database) = &cli.database {
        config.database_path = database.clone();
    }
    if let Some(run) = run {
        if let Some(interval) = run.interval {
            config.scrape_interval_secs = interval;
        }
        if let Some(concurrency) = run.concurrency {
            config.concurrency = concurrency;
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let run_args = match &cli.command {
        Some(Command::Run(args)) => Some(args),
        _ => None,
    };

    let config = load_config(&cli, run_args)?;

    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path))?;

    let result = match &cli.command {
        None | Some(Command::Run(_)) => {
            let once = run_args.is_some_and(|args| args.once);
            run_scraper(&db, &config, once).await
        }
        Some(Command::AddFeed { name, url, owner }) => {
            add_feed(&db, name, url, owner.as_deref()).await
        }
        Some(Command::RemoveFeed { id }) => remove_feed(&db, *id).await,
        Some(Command::ListFeeds) => list_feeds(&db).await,
    };

    db.close().await;
    result
}

async fn run_scraper(db: &Database, config: &Config, once: bool) -> Result<()> {
    let client = build_http_client(&config.user_agent, config.request_timeout())
        .context("Failed to build HTTP client")?;
    let scheduler = Scheduler::new(db.clone(), client, config.scraper_config());

    if once {
        let summary = scheduler.run_cycle().await;
        if summary.skipped {
            anyhow::bail!("Feed selection failed; see log for details");
        }
        println!(
            "Fetched {} feeds ({} ok, {} failed), {} new posts",
            summary.selected,
            summary.succeeded,
            summary.failed + summary.crashed + summary.aborted,
            summary.inserted
        );
        return Ok(());
    }

    tokio::select! {
        _ = scheduler.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested, stopping scraper");
        }
    }
    Ok(())
}

async fn add_feed(db: &Database, name: &str, url: &str, owner: Option<&str>) -> Result<()> {
    let url = validate_feed_url(url).context("Refusing feed URL")?;
    match db.insert_feed(name, url.as_str(), owner).await {
        Ok(feed) => {
            println!("Added feed {} ({})", feed.id, feed.url);
            Ok(())
        }
        Err(StoreError::UniqueViolation(_)) => {
            anyhow::bail!("A feed with URL {} is already tracked", url)
        }
        Err(e) => Err(e).context("Failed to add feed"),
    }
}

async fn remove_feed(db: &Database, id: i64) -> Result<()> {
    if db.delete_feed(id).await.context("Failed to remove feed")? {
        println!("Removed feed {}", id);
        Ok(())
    } else {
        anyhow::bail!("No feed with id {}", id)
    }
}

async fn list_feeds(db: &Database) -> Result<()> {
    let feeds = db.get_feeds().await.context("Failed to list feeds")?;
    if feeds.is_empty() {
        println!("No feeds tracked. Add one with: rss-aggregator add-feed --name NAME --url URL");
        return Ok(());
    }

    for feed in feeds {
        let fetched = feed
            .last_fetched_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("{:>5}  {:<30}  {:<24}  {}", feed.id, feed.name, fetched, feed.url);
    }
    Ok(())
}
