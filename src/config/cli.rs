use crate::config::{ServiceConfig, StorageBackend};
use crate::core::policy::PolicyPreset;
use crate::utils::error::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "credits-relay")]
#[command(about = "Serve a filtered Grist table as cached JSON")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for the local snapshot store
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Filter/dedup preset (location, composite, display_name_context, passthrough)
    #[arg(long, global = true)]
    pub policy: Option<PolicyPreset>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve the snapshot over HTTP and refresh it on a timer
    Serve {
        /// Override server.bind_addr
        #[arg(long)]
        bind: Option<String>,

        /// Disable the periodic refresh loop
        #[arg(long)]
        no_schedule: bool,

        /// Keep the snapshot in memory instead of on disk
        #[arg(long)]
        memory: bool,
    },
    /// Fetch, filter and store the snapshot once
    Refresh,
    /// Fetch and filter, print the result, store nothing
    Fetch {
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl CliConfig {
    /// Config file (if any), then environment, then command-line flags.
    pub fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = ServiceConfig::load(self.config.as_deref())?;

        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if let Some(preset) = self.policy {
            config.policy = preset.policy();
        }
        if let Command::Serve {
            bind,
            no_schedule,
            memory,
        } = &self.command
        {
            if let Some(bind) = bind {
                config.server.bind_addr = bind.clone();
            }
            if *no_schedule {
                config.schedule.refresh_interval_secs = 0;
            }
            if *memory {
                config.storage.backend = StorageBackend::Memory;
            }
        }

        Ok(config)
    }
}
