//! Best-effort broadcast of the pool value to every connected client.
//!
//! No acknowledgement, retry, or sequencing. A lost message is corrected by
//! the next mutation or by a client re-reading persisted state.

use contracts::{DisplayCue, ReplicationMessage, TriggerConfig};

use crate::presentation::TrackerView;

pub trait Relay: Send {
    fn publish(&mut self, message: ReplicationMessage);
}

/// Apply a received update to a display. Receipt never persists anything and
/// never authorizes a mutation.
pub fn apply_to_view(
    view: &mut TrackerView,
    message: &ReplicationMessage,
    config: &TriggerConfig,
) -> Option<DisplayCue> {
    match message {
        ReplicationMessage::UpdateTracker { pool_value } => view.apply(*pool_value, config),
    }
}
