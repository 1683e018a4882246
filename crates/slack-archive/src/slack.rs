//! Slack glue: Socket Mode delivery and Web API directory lookups.
//!
//! Connection lifecycle (handshake, reconnects, envelope acks) belongs to
//! the SDK. This module only turns pushed events back into opaque JSON and
//! forwards them over an mpsc queue; the archiving loop in `main` is the
//! single consumer.

use anyhow::Context;
use archive_core::{Directory, event};
use rvstruct::ValueStruct;
use serde_json::Value;
use slack_morphism::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Sender half of the event queue, stashed in the listener's user state so
/// the push callback can reach it.
#[derive(Clone)]
pub struct EventTx(pub UnboundedSender<Value>);

/// Live Slack connection: Web API access plus the Socket Mode listener.
pub struct SlackConnection {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
    listener: SlackClientSocketModeListener<SlackClientHyperHttpsConnector>,
}

impl SlackConnection {
    /// Authenticates and starts the Socket Mode listener.
    ///
    /// Inbound events are serialized back to JSON and pushed into `events`.
    /// Both a rejected bot token and a failed Socket Mode handshake are
    /// startup failures; reconnects after that are the SDK's business.
    pub async fn connect(
        bot_token: &str,
        app_token: &str,
        events: EventTx,
    ) -> anyhow::Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("cannot build Slack connector")?,
        ));
        let token = SlackApiToken::new(bot_token.to_string().into());

        let identity = client
            .open_session(&token)
            .auth_test()
            .await
            .context("auth.test failed; check the bot token")?;
        info!("connected as bot user {}", identity.user_id.value());

        let environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(client.clone()).with_user_state(events),
        );
        let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(on_push_event);
        let listener = SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            environment,
            callbacks,
        );
        listener
            .listen_for(&SlackApiToken::new(app_token.to_string().into()))
            .await
            .context("Socket Mode handshake failed; check the app token")?;

        Ok(Self {
            client,
            token,
            listener,
        })
    }

    /// Runs the Socket Mode listener. Resolves only if the SDK stops
    /// serving; reconnects along the way are its business, not ours.
    pub async fn serve(&self) {
        self.listener.serve().await;
    }

    /// Directory view over this connection, for name lookups.
    pub fn directory(&self) -> SlackDirectory {
        SlackDirectory {
            client: self.client.clone(),
            token: self.token.clone(),
        }
    }

    /// Marks an archived message with a floppy-disk reaction.
    ///
    /// Failures are logged and ignored.
    pub async fn react(&self, channel: &str, ts: &str) {
        let session = self.client.open_session(&self.token);
        let request = SlackApiReactionsAddRequest::new(
            channel.to_string().into(),
            SlackReactionName::new("floppy_disk".into()),
            ts.to_string().into(),
        );
        if let Err(err) = session.reactions_add(&request).await {
            warn!("reaction on {channel}/{ts} failed: {err}");
        }
    }
}

/// Web API name lookups with the bot token.
pub struct SlackDirectory {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
}

impl Directory for SlackDirectory {
    async fn channel_name(&self, id: &str) -> anyhow::Result<Option<String>> {
        let session = self.client.open_session(&self.token);
        let response = session
            .conversations_info(&SlackApiConversationsInfoRequest::new(id.to_string().into()))
            .await
            .context("conversations.info failed")?;
        Ok(response.channel.name)
    }

    async fn user_name(&self, id: &str) -> anyhow::Result<Option<String>> {
        let session = self.client.open_session(&self.token);
        let response = session
            .users_info(&SlackApiUsersInfoRequest::new(id.to_string().into()))
            .await
            .context("users.info failed")?;
        Ok(response.user.name)
    }
}

/// Push-event callback: re-serialize the typed event body and enqueue it.
async fn on_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> UserCallbackResult<()> {
    debug!("push event: {:?}", event.event);
    let payload = serde_json::to_value(&event.event)?;
    let states = states.read().await;
    if let Some(EventTx(tx)) = states.get_user_state::<EventTx>() {
        // A closed queue just means the consumer is shutting down.
        let _ = tx.send(payload);
    }
    Ok(())
}

/// Picks out the channel and timestamp to react to.
///
/// Only plain user messages qualify; joins, edits, and other subtyped
/// events get no emoji.
pub fn reaction_target(event: &Value) -> Option<(String, String)> {
    if event.get("type").and_then(Value::as_str) != Some("message") {
        return None;
    }
    if event.get("subtype").is_some() {
        return None;
    }
    let channel = event::channel_id(event)?;
    let ts = event.get("ts").and_then(Value::as_str)?;
    Some((channel.to_string(), ts.to_string()))
}
