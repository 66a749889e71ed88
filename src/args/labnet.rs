use std::path::PathBuf;

use labnet::{
    config::{Config, ConfigError},
    orchestrator::OrchestratorOptions,
    session::SessionOptions,
};

#[derive(clap::Parser)]
#[clap(author, version, about = "Emulated network labs with routing, NAT and WireGuard", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub scenario: ScenarioKind,

    /// Path to a config file to read
    #[clap(short = 'c', long = "config", global = true)]
    config_file: Option<PathBuf>,

    /// Directory to write private keys to
    #[clap(long, global = true)]
    key_dir: Option<PathBuf>,

    /// Give up priming the tunnel after this many probes (0 never gives up)
    #[clap(long, global = true)]
    prime_attempts: Option<u32>,

    /// Milliseconds to wait between priming probes
    #[clap(long, global = true)]
    prime_interval: Option<u64>,

    /// Exit once provisioning is done instead of opening the inspection shell
    #[clap(long, global = true)]
    pub no_cli: bool,

    /// Print the topology and exit without touching the system
    #[clap(long, global = true)]
    pub dry_run: bool,

    /// Prefix for the names of created namespaces, bridges and bridge ports
    #[clap(long, global = true, default_value_t = ("labnet-").to_string())]
    pub namespace_prefix: String,

    /// Enable verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,
}

/// The labs that can be built
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::Subcommand)]
pub enum ScenarioKind {
    /// Two sites joined by a WireGuard tunnel
    Vpn,
    /// Two identical LANs made reachable with NETMAP
    Netmap,
    /// A host fronting a container network
    Docker,
}

impl Args {
    /// Read the config file, if any, and lay the CLI overrides on top
    pub fn config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config_file {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(key_dir) = &self.key_dir {
            config.key_dir = Some(key_dir.clone());
        }
        if let Some(attempts) = self.prime_attempts {
            config.priming.max_attempts = Some(attempts);
        }
        if let Some(interval) = self.prime_interval {
            config.priming.interval_ms = interval;
        }
        Ok(config)
    }

    /// Session settings for a loaded config
    pub fn session_options(&self, config: &Config) -> SessionOptions {
        SessionOptions {
            orchestrator: OrchestratorOptions {
                key_dir: config.key_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
                primer: config.priming,
            },
            interactive: !self.no_cli,
        }
    }
}
