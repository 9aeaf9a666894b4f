use tokio::sync::oneshot;

use crate::tracker::state::{StateDelta, ViewState};

/// A request to run one transition. Producers only describe the change, the time is taken when
/// the event is applied so transitions stay ordered.
#[derive(Debug)]
pub struct TrackerEvent {
    pub delta: StateDelta,
    pub reply: Option<oneshot::Sender<ViewState>>,
}

impl TrackerEvent {
    /// Periodic update that only accrues elapsed time.
    pub fn tick() -> Self {
        Self {
            delta: StateDelta::default(),
            reply: None,
        }
    }

    /// Event whose resulting view is sent back through the returned receiver.
    pub fn update(delta: StateDelta) -> (Self, oneshot::Receiver<ViewState>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                delta,
                reply: Some(sender),
            },
            receiver,
        )
    }
}
