//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::gateway::CommandMailTransport;
use crate::pipeline::Pipeline;
use crate::rules::RuleSet;

#[derive(Parser, Debug)]
#[command(name = "doc-triage")]
#[command(version)]
#[command(about = "Rule-driven triage for a watched document folder", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Triage everything currently in the watched folder
    Run {
        /// Dry run mode (don't move, copy, or stage anything)
        #[arg(long)]
        dry_run: bool,

        /// Skip the outbound delivery pass after the batch
        #[arg(long)]
        no_flush: bool,
    },

    /// Only attempt delivery of previously staged outbound files
    FlushOutbound,

    /// Check configuration and rules without touching any files
    Validate,

    /// Write an example configuration file
    InitConfig,
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run { dry_run, no_flush } => {
            let mut config = Config::load(&cli.config).await?;
            if dry_run {
                config.execution.dry_run = true;
            }
            let rules = RuleSet::load(&config.watch.rules_file).await?;
            let pipeline = Pipeline::new(&config, &rules);

            let summary = pipeline.run().await?;
            println!(
                "Classified {}, unmatched {}, skipped {}, failed {}",
                summary.classified, summary.unmatched, summary.skipped, summary.failed
            );

            if !no_flush && !config.execution.dry_run {
                flush(&config, &pipeline).await?;
            }
        }

        Commands::FlushOutbound => {
            let config = Config::load(&cli.config).await?;
            let rules = RuleSet::default();
            let pipeline = Pipeline::new(&config, &rules);
            flush(&config, &pipeline).await?;
        }

        Commands::Validate => {
            let config = Config::load(&cli.config).await?;
            config.validate()?;
            let rules = RuleSet::load(&config.watch.rules_file).await?;
            println!("Configuration OK, {} rules loaded", rules.len());
        }

        Commands::InitConfig => {
            Config::create_example(&cli.config).await?;
            println!("Wrote example configuration to {}", cli.config.display());
        }
    }

    Ok(())
}

async fn flush(config: &Config, pipeline: &Pipeline<'_>) -> anyhow::Result<()> {
    if config.outbound.command.is_empty() {
        warn!("No outbound.command configured, leaving staged files for an external agent");
        return Ok(());
    }

    let transport = CommandMailTransport::new(
        config.outbound.command.clone(),
        Duration::from_secs(config.outbound.timeout_secs),
    );
    pipeline.flush_outbound(transport).await?;
    info!("Outbound flush complete");
    Ok(())
}
