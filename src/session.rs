//! One complete lab run: build, start, provision, inspect and always tear down

use std::{future::Future, panic::AssertUnwindSafe};

use futures::FutureExt;
use tokio::io::BufReader;

use crate::{
    emulator::{Emulator, EmulatorError},
    orchestrator::{KeyTool, Orchestrator, OrchestratorOptions, ProvisionError},
    scenarios::Scenario,
    shell,
    topology::Topology,
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to lay out the {scenario} lab: {source}")]
    Build {
        scenario: &'static str,
        source: ProvisionError,
    },
    #[error("Failed to start the emulated network: {0}")]
    Start(#[source] EmulatorError),
    #[error(transparent)]
    Provision(ProvisionError),
    #[error("Inspection shell failed: {0}")]
    Shell(#[source] std::io::Error),
    #[error("Interrupted")]
    Interrupted,
    #[error("Failed to tear down the emulated network: {0}")]
    Teardown(#[source] EmulatorError),
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub orchestrator: OrchestratorOptions,
    /// Attach the inspection shell to stdin once provisioning is done
    pub interactive: bool,
}

/// Run a scenario from start to finish.
///
/// Once the topology is laid out, `stop` is called exactly once, whether the
/// run succeeds, fails, is interrupted by `shutdown` or panics. A failure of
/// the run itself is reported in preference to a failed teardown.
pub async fn run<E, S, K>(
    emulator: &mut E,
    scenario: &mut S,
    keys: &mut K,
    options: &SessionOptions,
    shutdown: impl Future<Output = ()>,
) -> Result<(), SessionError>
where
    E: Emulator,
    S: Scenario,
    K: KeyTool,
{
    let name = scenario.name();
    let topology = scenario
        .topology()
        .map_err(|source| SessionError::Build {
            scenario: name,
            source,
        })?;
    log::info!(
        "Starting {} lab with {} hosts and {} switches",
        name,
        topology.hosts().len(),
        topology.switches().len()
    );

    let body = async {
        tokio::select! {
            biased;
            () = shutdown => Err(SessionError::Interrupted),
            result = drive(emulator, &topology, scenario, keys, options) => result,
        }
    };
    let outcome = AssertUnwindSafe(body).catch_unwind().await;

    log::info!("Stopping the {} lab", name);
    let teardown = emulator.stop().await;

    let result = match outcome {
        Ok(result) => result,
        Err(panic) => {
            if let Err(error) = teardown {
                log::warn!("Teardown after panic failed: {}", error);
            }
            std::panic::resume_unwind(panic);
        }
    };

    match (result, teardown) {
        (Err(error), Err(teardown_error)) => {
            log::warn!("Teardown also failed: {}", teardown_error);
            Err(error)
        }
        (Err(error), Ok(())) => Err(error),
        (Ok(()), Err(teardown_error)) => Err(SessionError::Teardown(teardown_error)),
        (Ok(()), Ok(())) => Ok(()),
    }
}

async fn drive<E, S, K>(
    emulator: &mut E,
    topology: &Topology,
    scenario: &mut S,
    keys: &mut K,
    options: &SessionOptions,
) -> Result<(), SessionError>
where
    E: Emulator,
    S: Scenario,
    K: KeyTool,
{
    emulator.start(topology).await.map_err(SessionError::Start)?;

    let mut orchestrator = Orchestrator::new(emulator, topology, &options.orchestrator);
    scenario
        .provision(&mut orchestrator, keys)
        .await
        .map_err(SessionError::Provision)?;
    log::info!("{} lab is ready", scenario.name());

    if options.interactive {
        shell::run(
            emulator,
            topology,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await
        .map_err(SessionError::Shell)?;
    }
    Ok(())
}
