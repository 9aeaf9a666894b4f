use anyhow::Result;
use tokio::sync::{mpsc::Receiver, watch};
use tracing::{debug, info};

use crate::{
    storage::state_store::StateStore,
    tracker::{
        audit::AuditLog,
        state::{StateDelta, ViewState},
        Tracker,
    },
    utils::clock::Clock,
};

use event::TrackerEvent;

pub mod event;

/// Owns the tracker and applies events one at a time in arrival order. This is the only place
/// the state is changed from, every producer goes through the channel.
pub struct TrackerModule<S, A> {
    receiver: Receiver<TrackerEvent>,
    tracker: Tracker<S, A>,
    clock: Box<dyn Clock>,
    views: watch::Sender<ViewState>,
}

impl<S: StateStore, A: AuditLog> TrackerModule<S, A> {
    /// Runs the startup transitions and returns the module together with a receiver of every
    /// view produced from now on.
    pub async fn start(
        receiver: Receiver<TrackerEvent>,
        mut tracker: Tracker<S, A>,
        clock: Box<dyn Clock>,
    ) -> (Self, watch::Receiver<ViewState>) {
        let now = clock.time();
        tracker.apply(StateDelta::default(), now, true).await;
        // Whoever started the daemon did it from an unlocked session.
        let view = tracker.apply(StateDelta::lock(false), now, false).await;

        let (views, view_receiver) = watch::channel(view);
        (
            Self {
                receiver,
                tracker,
                clock,
                views,
            },
            view_receiver,
        )
    }

    /// Processes events until every sender is dropped.
    pub async fn run(mut self) -> Result<()> {
        while let Some(TrackerEvent { delta, reply }) = self.receiver.recv().await {
            debug!("Processing event {:?}", delta);
            let view = self.tracker.apply(delta, self.clock.time(), false).await;
            self.views.send_replace(view);
            if let Some(reply) = reply {
                if reply.send(view).is_err() {
                    debug!("Requester left before the view was ready");
                }
            }
        }

        info!("All event sources are closed");
        Ok(())
    }
}
