use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ecosphere::{
    campaign::{Autopilot, Campaign},
    config::AppConfig,
    engine::Engine,
    persistence::{FileStore, MemoryStore, SaveSlot},
    rng::RngManager,
    web::{self, ServerSettings},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "EcoSphere climate-policy simulation")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the master seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Override the storage directory
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Play a campaign headlessly with the greedy autopilot
    Run {
        #[arg(long)]
        years: Option<u32>,
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        region: Option<String>,
        /// Keep the campaign in memory instead of the storage directory
        #[arg(long)]
        ephemeral: bool,
    },
    /// Serve the JSON API over the stored campaign
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the stored campaign
    Status,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn draws(config: &AppConfig) -> RngManager {
    match config.seed {
        Some(seed) => RngManager::new(seed),
        None => RngManager::from_entropy(),
    }
}

fn file_slot(config: &AppConfig) -> Result<SaveSlot<FileStore>> {
    let store = FileStore::new(&config.storage_dir).with_context(|| {
        format!(
            "Failed to open storage directory {}",
            config.storage_dir.display()
        )
    })?;
    Ok(SaveSlot::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }
    init_tracing(&config.logging.level);

    let catalog = Arc::new(config.catalog()?);
    let engine = Engine::new(catalog, draws(&config));

    match cli.command {
        Mode::Run {
            years,
            mode,
            region,
            ephemeral,
        } => {
            let pilot = Autopilot::new(
                mode.unwrap_or(config.autoplay.mode.clone()),
                region.unwrap_or(config.autoplay.region.clone()),
            );
            let years = years.unwrap_or(config.autoplay.years);
            let reports = if ephemeral {
                let mut campaign = Campaign::open(engine, SaveSlot::new(MemoryStore::new()));
                pilot.play(&mut campaign, years)
            } else {
                let mut campaign = Campaign::open(engine, file_slot(&config)?);
                let reports = pilot.play(&mut campaign, years);
                campaign.flush().context("Failed to save campaign")?;
                reports
            };
            for report in &reports {
                println!(
                    "{} [{:?}] CO₂ {:.1} ppm: {}",
                    report.year, report.evaluation.outcome, report.co2_ppm, report.evaluation.narrative
                );
            }
            if let Some(last) = reports.last() {
                println!("Campaign status after {}: {:?}", last.year, last.status);
            }
        }
        Mode::Serve { host, port } => {
            let campaign = Campaign::open(engine, file_slot(&config)?);
            let settings = ServerSettings {
                host: host.unwrap_or(config.server.host.clone()),
                port: port.unwrap_or(config.server.port),
                event_buffer: config.server.event_buffer,
            };
            web::run(campaign, settings).await?;
        }
        Mode::Status => {
            let campaign = Campaign::open(engine, file_slot(&config)?);
            let view = campaign.view();
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }
    Ok(())
}
