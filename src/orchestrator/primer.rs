use std::{net::Ipv4Addr, time::Duration};

use netcmd::probe::ping_once;
use serde::Deserialize;

use super::{Orchestrator, ProvisionError};
use crate::emulator::Emulator;

/// How hard to try before a path counts as dead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrimerConfig {
    /// Pause between probes, in milliseconds
    pub interval_ms: u64,
    /// Give up after this many probes. `None` or `0` probes forever
    pub max_attempts: Option<u32>,
}

impl Default for PrimerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: Some(60),
        }
    }
}

impl PrimerConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn limit(&self) -> Option<u32> {
        self.max_attempts.filter(|attempts| *attempts > 0)
    }
}

impl<E: Emulator> Orchestrator<'_, E> {
    /// Probe `target` from `from` until it answers, returning how many probes it took.
    ///
    /// A failed probe only means the path is not up yet. Engine errors still abort.
    pub async fn prime(&mut self, from: &str, target: Ipv4Addr) -> Result<u32, ProvisionError> {
        let host = self.topology.host(from)?;
        let config = self.options.primer;
        let probe = ping_once(target);
        log::info!("Waiting for {} to reach {}", from, target);

        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = self.emulator.execute(host, &probe).await?;
            if result.success() {
                log::info!("{} reached {} after {} attempt(s)", from, target, attempts);
                return Ok(attempts);
            }
            log::debug!(
                "Probe {} from {} to {} failed with status {}",
                attempts,
                from,
                target,
                result.exit_code
            );

            if config.limit().is_some_and(|limit| attempts >= limit) {
                return Err(ProvisionError::PrimingTimeout {
                    host: from.to_owned(),
                    target,
                    attempts,
                });
            }
            tokio::time::sleep(config.interval()).await;
        }
    }
}
