//! Command line entry point.
//!
//! Enriches an Overland payload read from a file or stdin and prints the
//! result as JSON, or resolves a single coordinate pair.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::info;

use geotrail::{
    GeoPoint, GeotrailConfig, GeotrailError, NominatimClient, OverlandPayload, ReverseGeocoder,
    TokioSleeper, enrich_payload, logging,
};

#[derive(Parser, Debug)]
#[command(name = "geotrail", version)]
#[command(about = "Reverse-geocoding enrichment for Overland GPS batches")]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Force debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enrich an Overland payload and print the locations as JSON
    Enrich {
        /// Payload file; reads stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Reverse geocode a single coordinate pair
    Reverse {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        if let Some(geotrail_err) = err.downcast_ref::<GeotrailError>() {
            eprintln!("{}", geotrail_err.user_message());
        }
        return Err(err);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = GeotrailConfig::load_from_path(cli.config.as_deref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    logging::init(&config.logging)?;

    let client = match config.geocoding.nominatim_config() {
        Some(nominatim) => Some(NominatimClient::new(
            nominatim,
            config.geocoding.reverse_geocode_options(),
        )?),
        None => {
            info!("No geocoding user agent configured, enrichment disabled");
            None
        }
    };

    match cli.command {
        Command::Enrich { input } => {
            let raw = read_input(input).await?;
            let payload = OverlandPayload::from_json(&raw)?;

            let geocoder = client.as_ref().map(|c| c as &dyn ReverseGeocoder);
            let enriched = enrich_payload(
                payload,
                geocoder,
                &TokioSleeper,
                &config.enrichment.settings(),
            )
            .await;

            println!("{}", serde_json::to_string_pretty(&enriched)?);
        }
        Command::Reverse { lat, lon } => {
            let point = GeoPoint::validated(0, lat, lon)?;
            let Some(client) = client else {
                bail!("Set geocoding.user_agent (or GEOTRAIL_GEOCODING__USER_AGENT) to enable geocoding");
            };
            let result = client.try_reverse_geocode(point.lat, point.lon).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

async fn read_input(input: Option<PathBuf>) -> geotrail::Result<String> {
    let raw = match input {
        Some(path) => tokio::fs::read_to_string(&path).await?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            raw
        }
    };
    Ok(raw)
}
