use args::labnet::{Args, ScenarioKind};
use clap::Parser;
use common::{logging::enable_logger, permissions::ensure_root};
use labnet::{
    config::ConfigError,
    emulator::NetnsEmulator,
    orchestrator::WgKeyTool,
    scenarios::{DockerLab, NetmapLab, Scenario, VpnLab},
    session::{self, SessionError, SessionOptions},
};

mod args;
mod common;

#[derive(Debug, thiserror::Error)]
enum LaunchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid scenario configuration: {0}")]
    Scenario(#[from] addrplan::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    if let Err(error) = enable_logger(args.verbose) {
        eprintln!("Failed to set up logging: {error}");
        std::process::exit(1);
    }

    if let Err(error) = launch(&args).await {
        log::error!("{}", error);
        if let LaunchError::Session(SessionError::Provision(error)) = &error {
            // The message above already carries the status and stderr
            if let Some(failure) = error.command_failure() {
                if !failure.stdout.trim().is_empty() {
                    log::debug!("Output of the failed command:\n{}", failure.stdout.trim_end());
                }
            }
        }
        std::process::exit(1);
    }
}

async fn launch(args: &Args) -> Result<(), LaunchError> {
    let config = args.config()?;
    let options = args.session_options(&config);

    match args.scenario {
        ScenarioKind::Vpn => run(args, &options, VpnLab::new(config.vpn)?).await,
        ScenarioKind::Netmap => run(args, &options, NetmapLab::new(config.netmap)).await,
        ScenarioKind::Docker => run(args, &options, DockerLab::new(config.docker)).await,
    }
}

async fn run<S: Scenario>(args: &Args, options: &SessionOptions, mut scenario: S) -> Result<(), LaunchError> {
    if args.dry_run {
        match scenario.topology() {
            Ok(topology) => print!("{topology}"),
            Err(source) => {
                return Err(SessionError::Build {
                    scenario: scenario.name(),
                    source,
                }
                .into())
            }
        }
        return Ok(());
    }

    // Namespaces, bridges and iptables all need root
    ensure_root();

    let mut emulator = NetnsEmulator::new(&args.namespace_prefix);
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            log::warn!("Unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    session::run(&mut emulator, &mut scenario, &mut WgKeyTool, options, shutdown).await?;
    Ok(())
}
