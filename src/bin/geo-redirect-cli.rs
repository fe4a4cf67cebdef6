use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use geo_redirect::config::{load_config, load_routing};
use geo_redirect::geo::{CountryRecord, GeoLookup, MaxMindLookup, StaticLookup, UnavailableLookup};
use geo_redirect::redirect::{DecisionEngine, Outcome, RequestContext};
use geo_redirect::session::SessionData;

/// Stands in for the client when only `--country` is given.
const PLACEHOLDER_IP: &str = "192.0.2.1";

#[derive(Parser)]
#[command(name = "geo-redirect-cli")]
#[command(about = "Operator tooling for the geo-redirect server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a server config and the routing file it points at
    CheckConfig {
        /// Server configuration file
        config: PathBuf,
    },
    /// Show what the engine decides for one request with an empty session
    Resolve {
        /// Routing file (TOML or YAML)
        #[arg(short, long)]
        routing: PathBuf,
        /// MaxMind country database
        #[arg(long)]
        db: Option<PathBuf>,
        /// Pretend every address resolves to this country
        #[arg(long, conflicts_with = "db")]
        country: Option<String>,
        /// Client address
        #[arg(long)]
        ip: Option<IpAddr>,
        /// Requested URL
        #[arg(short, long)]
        url: Url,
    },
    /// Download a GeoIP database and install it once it opens cleanly
    FetchDb {
        /// Download location
        #[arg(short, long)]
        url: String,
        /// Destination path
        dest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { config } => check_config(&config)?,
        Commands::Resolve {
            routing,
            db,
            country,
            ip,
            url,
        } => resolve(&routing, db.as_deref(), country, ip, url)?,
        Commands::FetchDb { url, dest } => fetch_db(&url, &dest).await?,
    }

    Ok(())
}

fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let routing = load_routing(Path::new(&config.redirect.routing_path))?;

    println!("{}: ok", path.display());
    println!("{}: {} entries", config.redirect.routing_path, routing.len());
    for (key, entry) in routing.iter() {
        let countries: Vec<&str> = entry.countries.iter().map(|c| c.as_str()).collect();
        if countries.is_empty() {
            println!("  {:<12} {}", key, entry.hostname);
        } else {
            println!("  {:<12} {}  [{}]", key, entry.hostname, countries.join(", "));
        }
    }

    if !Path::new(&config.geoip.database_path).exists() {
        eprintln!(
            "warning: GeoIP database {} not found; country matching will be disabled",
            config.geoip.database_path
        );
    }
    Ok(())
}

fn resolve(
    routing: &Path,
    db: Option<&Path>,
    country: Option<String>,
    ip: Option<IpAddr>,
    url: Url,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = load_routing(routing)?;

    let geo: Arc<dyn GeoLookup> = match (db, &country) {
        (Some(path), _) => Arc::new(MaxMindLookup::open(path)?),
        (None, Some(code)) => Arc::new(StaticLookup::new().with_fallback(CountryRecord::new(1, code.as_str()))),
        (None, None) => Arc::new(UnavailableLookup),
    };

    let ip = match (ip, &country) {
        (Some(ip), _) => Some(ip.to_string()),
        (None, Some(_)) => Some(PLACEHOLDER_IP.to_string()),
        (None, None) => None,
    };

    let engine = DecisionEngine::new(table).with_geo(geo);
    let mut ctx = RequestContext::new(url);
    if let Some(ip) = ip {
        ctx = ctx.with_client_ip(ip);
    }

    let mut session = SessionData::default();
    let decision = engine.decide(&ctx, &mut session);

    println!("source:   {}", decision.source.as_str());
    match &decision.outcome {
        Outcome::Pass => println!("outcome:  pass"),
        Outcome::RedirectTo {
            hostname,
            rewrite_origin_host,
            location,
        } => {
            println!("outcome:  redirect");
            println!("hostname: {}", hostname);
            println!("forced:   {}", rewrite_origin_host);
            println!("location: {}", location);
        }
    }
    println!("session:  {}", serde_json::to_string(&session)?);
    Ok(())
}

async fn fetch_db(url: &str, dest: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Downloading {}", url);
    let response = reqwest::get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&partial, &bytes)?;

    match MaxMindLookup::open(&partial) {
        Ok(lookup) => {
            std::fs::rename(&partial, dest)?;
            println!(
                "Installed {} ({} bytes, {})",
                dest.display(),
                bytes.len(),
                lookup.database_type()
            );
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(format!("downloaded file is not a usable database: {}", e).into())
        }
    }
}
