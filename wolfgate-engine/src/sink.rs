//! Drain a manager to a target number of updates.

use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::errors::{EngineError, Result};
use crate::manager::{Manager, ManagerHooks};

/// Count refresh signals until the manager stops producing them.
///
/// Once `min_updates` signals have been seen the manager is closed in the
/// background and any updates already pending are still counted. If the
/// manager has not closed by `timeout` it is closed here and the outcome is
/// [`EngineError::Timeout`]. Otherwise the outcome is the manager's fatal
/// error, if it recorded one.
///
/// The update count is returned alongside the outcome in every case.
pub async fn sink_manager<H: ManagerHooks>(
    manager: &Manager<H>,
    timeout: Duration,
    min_updates: usize,
) -> (usize, Result<()>) {
    let deadline = Instant::now() + timeout;
    let mut updates = 0;
    let mut closing = false;

    loop {
        if !closing && updates >= min_updates {
            closing = true;
            let manager = manager.clone();
            tokio::spawn(async move { manager.close().await });
        }

        match timeout_at(deadline, manager.refresh()).await {
            Ok(true) => updates += 1,
            Ok(false) => {
                manager.close().await;
                let outcome = match manager.fatal_error() {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
                return (updates, outcome);
            }
            Err(_) => {
                manager.close().await;
                let err = EngineError::Timeout(format!(
                    "{updates} of {min_updates} updates received within {timeout:?}"
                ));
                return (updates, Err(err));
            }
        }
    }
}
