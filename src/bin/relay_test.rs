//! Backend connectivity check
//!
//! Lists garages and levels, resolves the backend id of one level and posts a
//! single test entry event. Each step is reported independently so one
//! failing endpoint does not hide the others.

use clap::Parser;
use garage_occupancy::infra::Config;
use garage_occupancy::io::backend::{find_level_id, BackendClient};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Level id used when the backend does not list the requested level
const FALLBACK_LEVEL_ID: i64 = 101;

#[derive(Parser, Debug)]
#[command(name = "relay-test", about = "Parking backend connectivity test")]
struct Args {
    /// Backend base URL (defaults to the one in the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,

    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    #[arg(long, default_value = "1")]
    garage_id: i64,

    #[arg(long, default_value = "1")]
    level_number: i64,

    /// Only run the GET checks
    #[arg(long)]
    no_post: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();
    let base_url = match args.base_url {
        Some(url) => url,
        None => Config::load_from_path(&args.config)?.relay_base_url().to_string(),
    };

    info!(base_url = %base_url, "relay_test_starting");
    let client = BackendClient::new(&base_url, Duration::from_millis(args.timeout_ms))?;

    match client.get_garages().await {
        Ok(garages) => info!(response = %garages, "get_garages_ok"),
        Err(e) => error!(error = %e, "get_garages_failed"),
    }

    let levels = match client.get_levels().await {
        Ok(levels) => {
            info!(response = %levels, "get_levels_ok");
            Some(levels)
        }
        Err(e) => {
            error!(error = %e, "get_levels_failed");
            None
        }
    };

    let level_id = levels
        .and_then(|levels| find_level_id(&levels.0, args.garage_id, args.level_number))
        .unwrap_or_else(|| {
            warn!(fallback = %FALLBACK_LEVEL_ID, "level_id_not_found");
            FALLBACK_LEVEL_ID
        });
    info!(
        garage_id = %args.garage_id,
        level_number = %args.level_number,
        level_id = %level_id,
        "level_id_resolved"
    );

    if args.no_post {
        info!("relay_test_complete");
        return Ok(());
    }

    tokio::time::sleep(Duration::from_secs(1)).await;

    match client.send_sensor_event(level_id, "entry").await {
        Ok(response) => info!(response = %response, "post_event_ok"),
        Err(e) => error!(error = %e, "post_event_failed"),
    }

    info!("relay_test_complete");
    Ok(())
}
