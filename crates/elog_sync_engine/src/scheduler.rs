//! Periodic mirror passes.

use crate::engine::{PassOptions, SyncEngine};
use crate::transport::MirrorTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Runs a pass every `interval` until the returned task is aborted.
///
/// Passes run on the blocking pool. A tick that comes due while a pass is
/// still running is delayed, not stacked. Failed passes are logged and
/// retried on the next tick.
///
/// Must be called from within a tokio runtime.
pub fn spawn_periodic<T>(
    engine: Arc<SyncEngine<T>>,
    interval: Duration,
    options: PassOptions,
) -> JoinHandle<()>
where
    T: MirrorTransport + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let pass_engine = Arc::clone(&engine);
            match tokio::task::spawn_blocking(move || pass_engine.run_pass(options)).await {
                Ok(Ok(report)) => {
                    debug!(
                        logbook = %report.logbook,
                        transfers = report.transfers(),
                        "periodic mirror pass done"
                    );
                }
                Ok(Err(err)) => {
                    warn!(logbook = %engine.config().logbook, error = %err, "periodic mirror pass failed");
                }
                Err(err) => {
                    warn!(logbook = %engine.config().logbook, error = %err, "periodic mirror pass panicked");
                }
            }
        }
    })
}

/// Starts periodic passes at the engine's configured interval, if any.
pub fn spawn_configured<T>(engine: Arc<SyncEngine<T>>, options: PassOptions) -> Option<JoinHandle<()>>
where
    T: MirrorTransport + 'static,
{
    let interval = engine.config().sync_interval?;
    Some(spawn_periodic(engine, interval, options))
}
