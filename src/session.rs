//! Establishing the one server connection and getting into the channel.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::{error, info};

use crate::config::ConnectionSettings;
use crate::net::{ClientError, Connection, Event, EventHandler, Exhausted, HandlerRegistry, IrcSender, Retrier};
use crate::tui::bridge::UiBridge;

pub type ConnectError = Exhausted<ClientError>;

/// Connect with bounded retries. Registration is sent as part of each attempt.
pub async fn connect(
    settings: &ConnectionSettings,
    retrier: &Retrier,
) -> Result<Connection, ConnectError> {
    retrier
        .run(|attempt| {
            info!(attempt, address = %settings.address(), tls = settings.tls, "connecting");
            Connection::open(settings)
        })
        .await
}

/// Sends `JOIN` once the server confirms registration, and never before.
pub struct JoinOnWelcome {
    channel: String,
    sender: IrcSender,
    sent: AtomicBool,
}

impl JoinOnWelcome {
    pub fn new(channel: &str, sender: IrcSender) -> Self {
        Self {
            channel: channel.to_string(),
            sender,
            sent: AtomicBool::new(false),
        }
    }
}

impl EventHandler for JoinOnWelcome {
    fn handle(&self, _event: &Event) -> Result<()> {
        if self.sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(channel = %self.channel, "joining");
        self.sender.join(&self.channel)
    }
}

pub fn join_on_welcome(registry: &mut HandlerRegistry, channel: &str, sender: IrcSender) {
    registry.register("001", JoinOnWelcome::new(channel, sender));
}

/// Drive the read loop; when it ends, tell the UI.
pub async fn read_loop(connection: Connection, handlers: HandlerRegistry, bridge: UiBridge) {
    let reason = connection.run(handlers).await.to_string();
    error!(%reason, "read loop ended");
    let _ = bridge.connection_lost(reason);
}
