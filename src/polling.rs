//! Generic polling loop trait and runner.
//!
//! The ingestion pipeline and the standalone deletion pass both run as
//! polling processors: prepare a unit of work, process it, sleep, repeat
//! until shutdown.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of a single processing iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationResult {
    /// Items were processed successfully.
    ProcessedItems,
    /// No items were available to process.
    NoItems,
    /// Shutdown was requested.
    Shutdown,
}

/// Trait for implementing a polling-based processor.
#[async_trait]
pub trait PollingProcessor {
    /// The state type prepared for each iteration.
    type State: Send;
    /// The error type for this processor.
    type Error: std::error::Error + Send;

    /// Prepare state for a processing iteration.
    ///
    /// Returns `None` if there is no work to do.
    async fn prepare(&mut self) -> Result<Option<Self::State>, Self::Error>;

    /// Process the prepared state.
    async fn process(&mut self, state: Self::State) -> Result<IterationResult, Self::Error>;
}

/// Run a polling loop with the given processor.
///
/// Each iteration calls `prepare()`, then `process()` if there is work,
/// then waits for the poll interval or a shutdown signal. `prepare()` and
/// the sleep race against the shutdown token; `process()` runs to
/// completion and is expected to honor the token at its own safe points,
/// so an in-flight write is never torn down mid-operation.
pub async fn run_polling_loop<P: PollingProcessor>(
    processor: &mut P,
    poll_interval: Duration,
    shutdown: CancellationToken,
    name: &str,
) -> Result<(), P::Error> {
    loop {
        let state = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(target = name, "Shutdown requested during initialization");
                return Ok(());
            }

            result = processor.prepare() => result?,
        };

        let result = match state {
            Some(s) => processor.process(s).await?,
            None => {
                debug!(target = name, "No items to process");
                IterationResult::NoItems
            }
        };

        if result == IterationResult::Shutdown {
            break;
        }
        debug!(
            target = name,
            "Iteration complete, waiting {}s before next poll",
            poll_interval.as_secs()
        );

        if shutdown
            .run_until_cancelled(tokio::time::sleep(poll_interval))
            .await
            .is_none()
        {
            info!(target = name, "Shutdown requested during poll wait");
            break;
        }
    }

    Ok(())
}
