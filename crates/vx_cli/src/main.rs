use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;
use vx_core::{ArticleStorage, NewNote, WritePolicy};
use vx_scrapers::logging::{init_logging, Logger};
use vx_scrapers::{FetchConfig, ScraperManager, SiteProfile};
use vx_storage::{create_storage, ArticleService, StorageKind};
use vx_web::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = num
                    .checked_mul(unit)
                    .and_then(|secs| total_seconds.checked_add(secs))
                    .ok_or_else(|| format!("Duration too large: {}", s))?;
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // Trailing bare number counts as seconds
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds
                .checked_add(num)
                .ok_or_else(|| format!("Duration too large: {}", s))?;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }
        if total_seconds == 0 {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

/// Accepts a plain path or a `sqlite:` / `sqlite://` URL.
fn parse_database_path(s: &str) -> std::result::Result<PathBuf, String> {
    let path = s
        .strip_prefix("sqlite://")
        .or_else(|| s.strip_prefix("sqlite:"))
        .unwrap_or(s);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(format!("Empty database path in {}", s));
    }
    Ok(PathBuf::from(path))
}

fn parse_source_url(s: &str) -> std::result::Result<String, String> {
    let url = Url::parse(s).map_err(|e| format!("Invalid source URL: {}", e))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(format!("Unsupported scheme: {}", other)),
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape Vox teasers, store them, and annotate them with notes", long_about = None)]
pub struct Cli {
    #[arg(long, env = "VX_STORAGE", value_enum, default_value_t = StorageKind::Memory)]
    storage: StorageKind,
    /// SQLite database file (sqlite storage only)
    #[arg(long, env = "DATABASE_URL", value_parser = parse_database_path)]
    database: Option<PathBuf>,
    /// Listing page to scrape; overrides the profile's source URL
    #[arg(long, env = "VX_SOURCE_URL", value_parser = parse_source_url)]
    source_url: Option<String>,
    #[arg(long, env = "VX_FETCH_TIMEOUT", default_value = "30s")]
    fetch_timeout: HumanDuration,
    /// JSON site profile; defaults to the built-in Vox profile
    #[arg(long, env = "VX_PROFILE")]
    profile: Option<PathBuf>,
    #[arg(long, env = "VX_WRITE_POLICY", value_enum, default_value_t = WritePolicy::Upsert)]
    write_policy: WritePolicy,
    /// Stored as the author when no byline is found
    #[arg(long, env = "VX_AUTHOR_SENTINEL")]
    author_sentinel: Option<String>,
    #[arg(long, env = "VX_LOG", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service
    Serve {
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
    /// Scrape the listing page once, or periodically with --interval (e.g. 1h, 30m, 1h15m30s)
    Scrape {
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    List,
    Show {
        id: i64,
    },
    Annotate {
        id: i64,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        body: String,
    },
    /// Print the active site profile as JSON
    Profile,
}

impl Cli {
    fn site_profile(&self) -> anyhow::Result<SiteProfile> {
        let mut profile = match &self.profile {
            Some(path) => SiteProfile::load(path)
                .with_context(|| format!("Failed to load profile {}", path.display()))?,
            None => SiteProfile::vox(),
        };
        if let Some(url) = &self.source_url {
            profile = profile.with_source_url(url.clone());
        }
        Ok(profile.with_author_default(self.author_sentinel.clone()))
    }

    fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: self.fetch_timeout.0,
            ..FetchConfig::default()
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn shutdown_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            token.cancel();
        }
    });
}

async fn run_periodic(manager: &ScraperManager, interval: Duration, logger: &Logger) {
    let shutdown = manager.shutdown_token();
    info!("Running in periodic mode with {}s interval", interval.as_secs());
    loop {
        info!("Starting scrape cycle");
        match manager.scrape().await {
            Ok(summary) => info!(
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                "Scrape cycle finished"
            ),
            Err(e) => logger.warn(&format!("Scrape cycle failed: {}", e)),
        }
        info!("Waiting {}s before next scrape", interval.as_secs());
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

fn log_manager(manager: &ScraperManager, logger: &Logger) {
    logger.info(&format!(
        "Scraping {} ({}) with {:?} writes",
        manager.profile().source_url,
        manager.profile().name,
        manager.policy()
    ));
}

async fn open_storage(cli: &Cli, logger: &Logger) -> anyhow::Result<Arc<dyn ArticleStorage>> {
    let storage = create_storage(cli.storage, cli.database.as_deref())
        .await
        .context("Failed to open storage")?;
    logger.info(&format!("Storage initialized (using {})", cli.storage));
    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = init_logging(&cli.log_level).with_prefix("vx".to_string());
    let profile = cli.site_profile()?;
    let fetch = cli.fetch_config();

    match &cli.command {
        Commands::Profile => println!("{}", profile.to_json()?),
        Commands::Serve { port, host } => {
            let storage = open_storage(&cli, &logger).await?;
            let manager = ScraperManager::new(storage.clone(), profile, fetch)?
                .with_policy(cli.write_policy);
            log_manager(&manager, &logger);
            let shutdown = manager.shutdown_token();
            shutdown_on_ctrl_c(shutdown.clone());

            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
            let state = AppState {
                service: ArticleService::new(storage),
                manager: Arc::new(manager),
            };
            vx_web::serve(addr, state, shutdown).await?;
            logger.info("Server stopped");
        }
        Commands::Scrape { interval } => {
            let storage = open_storage(&cli, &logger).await?;
            let manager = ScraperManager::new(storage, profile, fetch)?
                .with_policy(cli.write_policy);
            log_manager(&manager, &logger);
            shutdown_on_ctrl_c(manager.shutdown_token());
            match interval {
                Some(interval) => run_periodic(&manager, interval.0, &logger).await,
                None => print_json(&manager.scrape().await?)?,
            }
        }
        Commands::List => {
            let service = ArticleService::new(open_storage(&cli, &logger).await?);
            print_json(&service.list_articles().await?)?
        }
        Commands::Show { id } => {
            let service = ArticleService::new(open_storage(&cli, &logger).await?);
            print_json(&service.get_article(*id).await?)?
        }
        Commands::Annotate { id, title, body } => {
            let service = ArticleService::new(open_storage(&cli, &logger).await?);
            let note = NewNote {
                title: title.clone(),
                body: body.clone(),
            };
            print_json(&service.annotate(*id, &note).await?)?
        }
    }

    Ok(())
}
