//! Push channel for notification delivery.
//!
//! Notifications are pushed to subscribers keyed by user id. The wire
//! protocol is newline-delimited JSON over TCP: a client sends one command
//! per connection; a `subscribe` connection then stays open and receives
//! one `notification` line per event.
//!
//! `PushHub` is the in-process fan-out used by the relay server (and by
//! tests); `TcpPushChannel` subscribes to a remote relay.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::feed::NotificationRecord;

/// Buffered events per user before slow subscribers start lagging.
const HUB_CAPACITY: usize = 64;

/// Commands a client sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PushCommand {
    /// Receive notifications for a user until the connection closes.
    Subscribe { user_id: String },
    /// Deliver a notification to a user's subscribers.
    Publish {
        user_id: String,
        notification: NotificationRecord,
    },
    /// Check that the relay is responsive.
    Ping,
}

/// Messages the relay sends back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// Subscription accepted.
    Subscribed { user_id: String },
    /// A notification for the subscribed user.
    Notification { notification: NotificationRecord },
    /// Publish acknowledgement with the number of live subscribers reached.
    Published { delivered: usize },
    /// Ping response.
    Pong,
    /// Error response.
    Error { message: String },
}

/// A live subscription. Dropping it tears down the forwarding task.
pub struct PushSubscription {
    user_id: String,
    receiver: mpsc::Receiver<NotificationRecord>,
    task: JoinHandle<()>,
}

impl PushSubscription {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Next pushed record, or `None` once the channel has closed.
    pub async fn recv(&mut self) -> Option<NotificationRecord> {
        self.receiver.recv().await
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        tracing::debug!(user_id = %self.user_id, "Unsubscribing from push channel");
        self.task.abort();
    }
}

/// Source of push subscriptions.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(&self, user_id: &str) -> Result<PushSubscription>;
}

/// In-process publish/subscribe keyed by user id.
#[derive(Default)]
pub struct PushHub {
    channels: Mutex<HashMap<String, broadcast::Sender<NotificationRecord>>>,
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<NotificationRecord>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw broadcast receiver for a user.
    ///
    /// Channels left without receivers are pruned first.
    pub fn receiver(&self, user_id: &str) -> broadcast::Receiver<NotificationRecord> {
        let mut channels = self.channels();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(HUB_CAPACITY).0)
            .subscribe()
    }

    /// Delivers a record to every current subscriber of `user_id`.
    ///
    /// Returns the number of subscribers reached. A user nobody listens for
    /// gets no channel, and a channel that reached nobody is removed.
    pub fn publish(&self, user_id: &str, record: NotificationRecord) -> usize {
        let mut channels = self.channels();
        let delivered = channels
            .get(user_id)
            .map(|sender| sender.send(record).unwrap_or(0))
            .unwrap_or(0);
        if delivered == 0 {
            channels.remove(user_id);
        }
        tracing::debug!(%user_id, delivered, "Published notification");
        delivered
    }

    /// Number of live subscribers for a user.
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.channels()
            .get(user_id)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    /// Number of users with a channel.
    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }
}

#[async_trait]
impl PushChannel for PushHub {
    async fn subscribe(&self, user_id: &str) -> Result<PushSubscription> {
        let mut source = self.receiver(user_id);
        let (tx, receiver) = mpsc::channel(HUB_CAPACITY);

        let task = tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(record) => {
                        if tx.send(record).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Push subscriber lagged, notifications dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(PushSubscription {
            user_id: user_id.to_string(),
            receiver,
            task,
        })
    }
}

/// Subscribes to a relay over TCP.
pub struct TcpPushChannel {
    addr: String,
}

impl TcpPushChannel {
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl PushChannel for TcpPushChannel {
    async fn subscribe(&self, user_id: &str) -> Result<PushSubscription> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .with_context(|| format!("Failed to connect to push relay at {}", self.addr))?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        write_line(
            &mut writer,
            &PushCommand::Subscribe {
                user_id: user_id.to_string(),
            },
        )
        .await?;

        match read_event(&mut reader).await? {
            Some(PushEvent::Subscribed { .. }) => {}
            Some(PushEvent::Error { message }) => bail!("Push relay refused subscription: {message}"),
            Some(other) => bail!("Unexpected push relay response: {other:?}"),
            None => bail!("Push relay closed the connection"),
        }
        tracing::info!(%user_id, addr = %self.addr, "Subscribed to push relay");

        let (tx, receiver) = mpsc::channel(HUB_CAPACITY);
        let task = tokio::spawn(async move {
            // Keep the write half alive so the relay sees an open connection
            let _writer = writer;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    event = read_event(&mut reader) => match event {
                        Ok(Some(PushEvent::Notification { notification })) => {
                            if tx.send(notification).await.is_err() {
                                break;
                            }
                        }
                        Ok(Some(other)) => tracing::debug!("Ignoring push event: {other:?}"),
                        Ok(None) => {
                            tracing::warn!("Push relay closed the subscription");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("Push channel error: {e}");
                            break;
                        }
                    }
                }
            }
        });

        Ok(PushSubscription {
            user_id: user_id.to_string(),
            receiver,
            task,
        })
    }
}

async fn write_line<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(message).context("Failed to serialize message")?;
    writer
        .write_all(json.as_bytes())
        .await
        .context("Failed to write message")?;
    writer
        .write_all(b"\n")
        .await
        .context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush writer")?;
    Ok(())
}

/// Reads one event line; `None` at end of stream.
async fn read_event<R>(reader: &mut R) -> Result<Option<PushEvent>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .await
        .context("Failed to read from push relay")?;
    if n == 0 {
        return Ok(None);
    }
    let event = serde_json::from_str(line.trim()).context("Failed to parse push event")?;
    Ok(Some(event))
}

/// Runs the relay on an already-bound listener.
///
/// Serves connections until `shutdown_rx` fires.
pub async fn run_relay(
    listener: TcpListener,
    hub: Arc<PushHub>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    tracing::info!("Push relay listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        let hub = hub.clone();
                        let shutdown = shutdown_rx.resubscribe();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, hub, shutdown).await {
                                tracing::warn!(%addr, "Error handling push connection: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Failed to accept connection: {e}");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("Push relay shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Handles a single client connection.
async fn handle_connection(
    stream: TcpStream,
    hub: Arc<PushHub>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // One command per connection
    reader
        .read_line(&mut line)
        .await
        .context("Failed to read from socket")?;

    let command: PushCommand = match serde_json::from_str(line.trim()) {
        Ok(command) => command,
        Err(e) => {
            let message = format!("Invalid command: {e}");
            write_line(&mut writer, &PushEvent::Error { message }).await?;
            return Ok(());
        }
    };

    tracing::debug!("Received push command: {:?}", command);

    match command {
        PushCommand::Ping => write_line(&mut writer, &PushEvent::Pong).await,
        PushCommand::Publish {
            user_id,
            notification,
        } => {
            let delivered = hub.publish(&user_id, notification);
            write_line(&mut writer, &PushEvent::Published { delivered }).await
        }
        PushCommand::Subscribe { user_id } => {
            let mut source = hub.receiver(&user_id);
            write_line(
                &mut writer,
                &PushEvent::Subscribed {
                    user_id: user_id.clone(),
                },
            )
            .await?;

            let mut rest = String::new();
            loop {
                tokio::select! {
                    received = source.recv() => match received {
                        Ok(notification) => {
                            write_line(&mut writer, &PushEvent::Notification { notification }).await?;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(%user_id, skipped, "Subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    // Any read result means the client hung up or misbehaved
                    _ = reader.read_line(&mut rest) => break,
                    _ = shutdown_rx.recv() => break,
                }
            }
            tracing::debug!(%user_id, "Subscriber disconnected");
            Ok(())
        }
    }
}

/// Sends a single command to a relay and returns its response.
pub async fn send_command(addr: &str, command: &PushCommand) -> Result<PushEvent> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to push relay at {addr}"))?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    write_line(&mut writer, command).await?;
    read_event(&mut reader)
        .await?
        .context("Push relay closed the connection without responding")
}
