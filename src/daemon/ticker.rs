use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::utils::clock::Clock;

use super::processing::event::TrackerEvent;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Keeps `done` current when nothing else happens by sending an empty update on a fixed
/// schedule.
pub struct TickModule {
    next: mpsc::Sender<TrackerEvent>,
    shutdown: CancellationToken,
    interval: Duration,
    time_provider: Box<dyn Clock>,
}

impl TickModule {
    pub fn new(
        next: mpsc::Sender<TrackerEvent>,
        shutdown: CancellationToken,
        interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            shutdown,
            interval,
            time_provider,
        }
    }

    /// Executes the tick loop.
    pub async fn run(self) -> Result<()> {
        let mut tick_point = self.time_provider.instant();
        loop {
            tick_point += self.interval;

            tokio::select! {
                // Cancellation drops the sender, which lets the tracker finish once the other
                // producers are gone too.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(tick_point) => ()
            }

            self.next
                .send(TrackerEvent::tick())
                .await
                .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
            debug!("Sent tick");
        }
    }
}
