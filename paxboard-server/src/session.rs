//! Subscription bookkeeping for one client connection.

use paxboard_shared::{Channel, ClientMessage};
use std::collections::HashSet;
use tracing::debug;

use crate::hub::{Hub, SessionId};

/// A connection's view of its subscriptions. Starts empty; a reconnecting
/// client gets a new session and has to subscribe again.
pub struct Session {
    id: SessionId,
    subscriptions: HashSet<Channel>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            subscriptions: HashSet::new(),
        }
    }

    pub fn subscriptions(&self) -> &HashSet<Channel> {
        &self.subscriptions
    }

    /// Applies one inbound text frame. Malformed frames and unknown channels
    /// are ignored so that older or newer clients keep working.
    pub async fn handle_text(&mut self, hub: &Hub, text: &str) {
        let msg = match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(session = %self.id, "Ignoring malformed control frame: {e}");
                return;
            }
        };

        match msg {
            ClientMessage::Subscribe { channel } => {
                let Some(channel) = self.resolve(&channel) else {
                    return;
                };
                if hub.subscribe(self.id, channel).await {
                    self.subscriptions.insert(channel);
                } else {
                    debug!(session = %self.id, %channel, "Channel not served, ignoring subscribe");
                }
            }
            ClientMessage::Unsubscribe { channel } => {
                let Some(channel) = self.resolve(&channel) else {
                    return;
                };
                hub.unsubscribe(self.id, channel).await;
                self.subscriptions.remove(&channel);
            }
        }
    }

    fn resolve(&self, name: &str) -> Option<Channel> {
        match name.parse::<Channel>() {
            Ok(channel) => Some(channel),
            Err(e) => {
                debug!(session = %self.id, "Ignoring control frame: {e}");
                None
            }
        }
    }

    /// Leaves every channel.
    pub async fn close(self, hub: &Hub) {
        hub.remove_session(self.id).await;
        debug!(
            session = %self.id,
            subscriptions = self.subscriptions.len(),
            "session closed"
        );
    }
}
