//! Event dispatch: one inbound event in, at most one appended line out.

use crate::event;
use crate::resolver::{ChannelNames, Directory, UserNames};
use crate::sink::{ArchiveError, FileSink};
use serde_json::Value;
use tracing::{debug, warn};

/// What to do with an event that carries no channel identifier.
///
/// The platform delivers some events that belong to no channel; they cannot
/// be routed, so the only question is whether dropping them is observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Drop without a trace.
    #[default]
    Silent,
    /// Drop, but say so at warn level.
    Warn,
}

/// Routes inbound events to per-channel log files.
///
/// Pure dispatch, invoked once per event: extract the channel ID, annotate
/// the payload, resolve the file name, append. Holds no state beyond the
/// name caches and the sink.
pub struct Router {
    channels: ChannelNames,
    users: UserNames,
    sink: FileSink,
    drop_policy: DropPolicy,
}

impl Router {
    pub fn new(sink: FileSink, drop_policy: DropPolicy) -> Self {
        Self {
            channels: ChannelNames::new(),
            users: UserNames::new(),
            sink,
            drop_policy,
        }
    }

    /// Handles one inbound event.
    ///
    /// Unroutable events are absorbed here per the configured policy; only
    /// sink failures propagate, and those are fatal to the caller.
    pub async fn handle<D: Directory>(
        &mut self,
        directory: &D,
        mut event: Value,
    ) -> Result<(), ArchiveError> {
        let Some(channel_id) = event::channel_id(&event).map(str::to_owned) else {
            match self.drop_policy {
                DropPolicy::Silent => {}
                DropPolicy::Warn => warn!("dropping event without channel id: {event}"),
            }
            return Ok(());
        };

        event::annotate_timestamp(&mut event);
        if let Some(user_id) = event::user_id(&event).map(str::to_owned) {
            if let Some(name) = self.users.resolve(directory, &user_id).await {
                event::annotate_user(&mut event, &name);
            }
        }

        let channel_name = self.channels.resolve(directory, &channel_id).await;
        debug!("archiving event from {channel_id} to {channel_name}.log");
        self.sink.append(&channel_name, &event)
    }
}
