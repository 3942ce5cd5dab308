//! Realtime subscription
//!
//! Maintains a long-lived WebSocket connection joined to one channel and
//! forwards every change notification. Handles reconnection automatically
//! with exponential backoff.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use super::message::{channel_topic, reply_reason, Frame, Inbound, PROTOCOL_VSN};
use crate::config::Config;
use crate::models::ChangeEvent;

/// Errors from a realtime session
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// Store URL cannot be turned into a socket endpoint
    #[error("Invalid realtime URL: {0}")]
    InvalidUrl(String),

    /// Socket-level failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Frame could not be encoded
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// The server refused to join the channel
    #[error("Channel join rejected: {0}")]
    JoinRejected(String),

    /// No reply within the allowed time
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// The server stopped answering heartbeats
    #[error("Heartbeat not acknowledged; connection presumed dead")]
    HeartbeatTimeout,

    /// The server crashed or closed the channel
    #[error("Channel {0}")]
    ChannelLost(&'static str),
}

/// Commands sent to the subscription task
#[derive(Debug, Clone)]
enum Command {
    /// Leave the channel and stop
    Shutdown,
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Not connected, not trying
    Disconnected,
    /// Attempting to connect and join
    Connecting,
    /// Joined and receiving changes
    Subscribed,
}

/// Events emitted by the subscription task
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// Status changed
    StatusChanged(SubscriptionStatus),
    /// A row changed somewhere in the store
    Change(ChangeEvent),
    /// Error occurred; the task will reconnect
    Error(String),
}

/// Configuration for a realtime subscription
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Socket endpoint including apikey and vsn parameters
    pub endpoint: String,
    /// Key sent as the channel access token
    pub access_token: String,
    /// Channel name (topic is `realtime:<channel>`)
    pub channel: String,
    /// Interval between heartbeats
    pub heartbeat_interval: Duration,
    /// Time allowed for connect and join
    pub join_timeout: Duration,
    /// Initial reconnect delay
    pub initial_reconnect_delay: Duration,
    /// Maximum reconnect delay
    pub max_reconnect_delay: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: String::new(),
            channel: "any".to_string(),
            heartbeat_interval: Duration::from_secs(25),
            join_timeout: Duration::from_secs(10),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl RealtimeConfig {
    /// Build from the configured store URL and key
    pub fn from_config(config: &Config) -> Result<Self, RealtimeError> {
        let (url, key) = config
            .credentials()
            .map_err(|e| RealtimeError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            endpoint: socket_endpoint(url, key)?,
            access_token: key.to_string(),
            channel: config.channel.clone(),
            heartbeat_interval: Duration::from_secs(config.heartbeat_secs.max(1)),
            ..Self::default()
        })
    }
}

/// Turn `https://host` into `wss://host/realtime/v1/websocket?apikey=..&vsn=..`
pub fn socket_endpoint(base_url: &str, api_key: &str) -> Result<String, RealtimeError> {
    let base = base_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{}/realtime/v1/websocket", base))
        .map_err(|e| RealtimeError::InvalidUrl(format!("'{}': {}", base_url, e)))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(RealtimeError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RealtimeError::InvalidUrl(format!("cannot use scheme '{}'", scheme)))?;
    url.query_pairs_mut()
        .append_pair("apikey", api_key)
        .append_pair("vsn", PROTOCOL_VSN);

    Ok(url.to_string())
}

/// Handle owning a running subscription
///
/// Call `shutdown` to leave the channel cleanly. Dropping the handle
/// without it aborts the background task.
pub struct Subscription {
    command_tx: mpsc::Sender<Command>,
    event_rx: mpsc::Receiver<RealtimeEvent>,
    status_rx: watch::Receiver<SubscriptionStatus>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Connect and join in the background
    pub fn spawn(config: RealtimeConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(4);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (status_tx, status_rx) = watch::channel(SubscriptionStatus::Disconnected);

        let task = tokio::spawn(subscription_loop(config, command_rx, event_tx, status_tx));

        Self {
            command_tx,
            event_rx,
            status_rx,
            task: Some(task),
        }
    }

    /// Next event, or `None` once the task has stopped
    pub async fn next_event(&mut self) -> Option<RealtimeEvent> {
        self.event_rx.recv().await
    }

    /// Current status
    pub fn status(&self) -> SubscriptionStatus {
        *self.status_rx.borrow()
    }

    /// Leave the channel, close the socket and wait for the task to end
    pub async fn shutdown(mut self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(2), &mut task)
                .await
                .is_err()
            {
                warn!("Realtime task did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Main task loop with reconnection
async fn subscription_loop(
    config: RealtimeConfig,
    mut command_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<RealtimeEvent>,
    status_tx: watch::Sender<SubscriptionStatus>,
) {
    let mut reconnect_delay = config.initial_reconnect_delay;

    loop {
        set_status(&status_tx, &event_tx, SubscriptionStatus::Connecting).await;

        match run_session(&config, &mut command_rx, &event_tx, &status_tx).await {
            Ok(true) => {
                set_status(&status_tx, &event_tx, SubscriptionStatus::Disconnected).await;
                info!("Realtime subscription closed");
                return;
            }
            Ok(false) => {
                // Server closed normally, reset backoff
                reconnect_delay = config.initial_reconnect_delay;
            }
            Err(e) => {
                warn!("Realtime session ended: {}", e);
                let _ = event_tx.send(RealtimeEvent::Error(e.to_string())).await;
            }
        }

        set_status(&status_tx, &event_tx, SubscriptionStatus::Disconnected).await;

        // Wait before reconnecting, but check for shutdown command
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {
                reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay);
            }
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::Shutdown) | None => return,
                }
            }
        }
    }
}

/// Connect, join, and forward changes until disconnection or shutdown
///
/// Returns `Ok(true)` when shut down on request.
async fn run_session(
    config: &RealtimeConfig,
    command_rx: &mut mpsc::Receiver<Command>,
    event_tx: &mpsc::Sender<RealtimeEvent>,
    status_tx: &watch::Sender<SubscriptionStatus>,
) -> Result<bool, RealtimeError> {
    let topic = channel_topic(&config.channel);
    let mut refs = RefCounter::default();

    debug!("Connecting to realtime endpoint");
    let connect = connect_async(config.endpoint.as_str());
    let (ws_stream, _) = tokio::time::timeout(config.join_timeout, connect)
        .await
        .map_err(|_| RealtimeError::Timeout("connection"))??;
    let (mut write, mut read) = ws_stream.split();

    // Join the channel
    let join_ref = refs.next();
    let join = Frame::join(&topic, &join_ref, &config.access_token);
    write.send(Message::Text(join.encode()?)).await?;

    let deadline = tokio::time::Instant::now() + config.join_timeout;
    loop {
        let msg = tokio::time::timeout_at(deadline, read.next())
            .await
            .map_err(|_| RealtimeError::Timeout("channel join"))?;

        match msg {
            Some(Ok(Message::Text(text))) => {
                let Ok(frame) = Frame::decode(&text) else {
                    debug!("Ignoring undecodable frame during join");
                    continue;
                };
                match frame.classify() {
                    Inbound::Reply {
                        msg_ref,
                        ok,
                        response,
                        ..
                    } if msg_ref.as_deref() == Some(join_ref.as_str()) => {
                        if !ok {
                            return Err(RealtimeError::JoinRejected(reply_reason(&response)));
                        }
                        break;
                    }
                    _ => {}
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(RealtimeError::ChannelLost("closed during join"));
            }
            Some(Err(e)) => return Err(e.into()),
            _ => {}
        }
    }

    info!("Joined {}", topic);
    set_status(status_tx, event_tx, SubscriptionStatus::Subscribed).await;

    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );
    let mut pending_heartbeat: Option<String> = None;

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::Shutdown) | None => {
                        let leave = Frame::leave(&topic, &refs.next(), &join_ref);
                        if let Ok(text) = leave.encode() {
                            write.send(Message::Text(text)).await.ok();
                        }
                        write.close().await.ok();
                        return Ok(true);
                    }
                }
            }

            _ = heartbeat.tick() => {
                if pending_heartbeat.is_some() {
                    return Err(RealtimeError::HeartbeatTimeout);
                }
                let hb_ref = refs.next();
                write.send(Message::Text(Frame::heartbeat(&hb_ref).encode()?)).await?;
                pending_heartbeat = Some(hb_ref);
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame = match Frame::decode(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                debug!("Ignoring undecodable frame: {}", e);
                                continue;
                            }
                        };
                        match frame.classify() {
                            Inbound::Change { topic: t, change } if t == topic => {
                                debug!("Change received: {} {}.{}", change.kind, change.schema, change.table);
                                let _ = event_tx.send(RealtimeEvent::Change(change)).await;
                            }
                            Inbound::Reply { msg_ref, .. }
                                if msg_ref.is_some() && msg_ref == pending_heartbeat =>
                            {
                                pending_heartbeat = None;
                            }
                            Inbound::ChannelError { topic: t } if t == topic => {
                                return Err(RealtimeError::ChannelLost("crashed on server"));
                            }
                            Inbound::ChannelClosed { topic: t } if t == topic => {
                                return Ok(false);
                            }
                            Inbound::System { payload, .. } => {
                                debug!("System message: {}", payload);
                            }
                            Inbound::Malformed(reason) => {
                                warn!("Malformed realtime frame: {}", reason);
                            }
                            _ => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Ok(false);
                    }
                    Some(Err(e)) => {
                        return Err(e.into());
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn set_status(
    status_tx: &watch::Sender<SubscriptionStatus>,
    event_tx: &mpsc::Sender<RealtimeEvent>,
    status: SubscriptionStatus,
) {
    let _ = status_tx.send(status);
    let _ = event_tx.send(RealtimeEvent::StatusChanged(status)).await;
}

/// Message refs are decimal strings, unique per connection
#[derive(Default)]
struct RefCounter(u64);

impl RefCounter {
    fn next(&mut self) -> String {
        self.0 += 1;
        self.0.to_string()
    }
}
