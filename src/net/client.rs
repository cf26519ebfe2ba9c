//! Connection to a single IRC server.
//!
//! Handles TLS and TCP setup, registration, an outgoing line queue and the
//! read loop that frames lines, parses them with `irc::proto` and feeds
//! registered handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use irc::proto::{Command, Message, Response};
use rustls::{pki_types::ServerName, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tracing::{debug, info, warn};

use super::event::Event;
use crate::config::ConnectionSettings;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 512 bytes for the message itself plus 8191 for tags.
pub const MAX_LINE_LEN: usize = 512 + 8191;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connecting to {address} timed out")]
    Timeout { address: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),
    #[error("server sent a line longer than {max} bytes")]
    LineTooLong { max: usize },
    #[error("connection closed by server")]
    Closed,
}

impl From<AnyDelimiterCodecError> for ClientError {
    fn from(err: AnyDelimiterCodecError) -> Self {
        match err {
            AnyDelimiterCodecError::MaxChunkLengthExceeded => ClientError::LineTooLong {
                max: MAX_LINE_LEN,
            },
            AnyDelimiterCodecError::Io(err) => ClientError::Io(err),
        }
    }
}

/// Anything a connection can be read from and written to.
trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

type BoxedTransport = Box<dyn Transport>;
type LineReader = FramedRead<ReadHalf<BoxedTransport>, AnyDelimiterCodec>;

/// A handler for inbound events.
///
/// Handlers are small values holding whatever they need (channel name, bridge,
/// sender) captured at registration time.
pub trait EventHandler: Send + Sync + 'static {
    fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// Command code -> handlers. `*` receives every event.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, code: &str, handler: impl EventHandler) {
        self.handlers
            .entry(code.to_ascii_uppercase())
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn handlers_for(&self, code: &str) -> Vec<Arc<dyn EventHandler>> {
        let exact = self.handlers.get(code).into_iter().flatten();
        let any = self.handlers.get("*").into_iter().flatten();
        exact.chain(any).cloned().collect()
    }

    /// Run every matching handler in its own task.
    ///
    /// A failing handler only loses the current event.
    pub fn dispatch(&self, event: Event) -> Vec<JoinHandle<()>> {
        let event = Arc::new(event);
        self.handlers_for(&event.code)
            .into_iter()
            .map(|handler| {
                let event = Arc::clone(&event);
                tokio::spawn(async move {
                    if let Err(err) = handler.handle(&event) {
                        warn!(code = %event.code, raw = %event.raw, error = %err, "dropping event");
                    }
                })
            })
            .collect()
    }
}

/// Clonable handle for queueing outgoing commands. Safe to use from any thread.
#[derive(Debug, Clone)]
pub struct IrcSender {
    tx: UnboundedSender<String>,
}

impl IrcSender {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Serialize and queue a command.
    pub fn send(&self, command: Command) -> anyhow::Result<()> {
        self.tx
            .send(wire_line(&command))
            .map_err(|_| anyhow::anyhow!("connection writer has stopped"))
    }

    pub fn privmsg(&self, target: &str, text: &str) -> anyhow::Result<()> {
        self.send(Command::PRIVMSG(target.to_string(), text.to_string()))
    }

    pub fn join(&self, channel: &str) -> anyhow::Result<()> {
        self.send(Command::JOIN(channel.to_string(), None, None))
    }

    pub fn nick(&self, nick: &str) -> anyhow::Result<()> {
        self.send(Command::NICK(nick.to_string()))
    }
}

/// One protocol line without its CRLF.
fn wire_line(command: &Command) -> String {
    let mut line = String::from(command);
    // A stray newline would let the remainder be read as a second command.
    line.retain(|c| c != '\r' && c != '\n');
    line
}

/// A live, registered-or-registering connection.
pub struct Connection {
    reader: LineReader,
    sender: IrcSender,
    nick: String,
    log_raw: bool,
}

impl Connection {
    /// Open the socket, start the writer and send registration.
    pub async fn open(settings: &ConnectionSettings) -> Result<Self, ClientError> {
        let transport = establish(settings).await?;
        let (read, write) = tokio::io::split(transport);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(write, rx, settings.log_raw));

        let codec =
            AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\r\n".to_vec(), MAX_LINE_LEN);
        let connection = Self {
            reader: FramedRead::new(read, codec),
            sender: IrcSender::new(tx),
            nick: settings.nick.clone(),
            log_raw: settings.log_raw,
        };
        connection.register(settings)?;
        Ok(connection)
    }

    fn register(&self, settings: &ConnectionSettings) -> Result<(), ClientError> {
        let closed = |_: anyhow::Error| ClientError::Closed;
        if let Some(password) = settings.password.as_deref() {
            self.sender
                .send(Command::PASS(password.to_string()))
                .map_err(closed)?;
        }
        self.sender.nick(&settings.nick).map_err(closed)?;
        self.sender
            .send(Command::Raw(
                "USER".to_string(),
                vec![
                    settings.user.clone(),
                    "0.0.0.0".to_string(),
                    "0.0.0.0".to_string(),
                    settings.user.clone(),
                ],
            ))
            .map_err(closed)?;
        Ok(())
    }

    pub fn sender(&self) -> IrcSender {
        self.sender.clone()
    }

    /// Read lines until the server goes away, dispatching each to `handlers`.
    ///
    /// Resolves to the reason the connection ended.
    pub async fn run(mut self, handlers: HandlerRegistry) -> ClientError {
        match self.serve(&handlers).await {
            Ok(()) => ClientError::Closed,
            Err(err) => err,
        }
    }

    async fn serve(&mut self, handlers: &HandlerRegistry) -> Result<(), ClientError> {
        let mut registered = false;

        while let Some(frame) = self.reader.next().await {
            let frame = frame?;
            let line = String::from_utf8_lossy(&frame);
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if self.log_raw {
                debug!(%line, "<-");
            }

            let message = match line.parse::<Message>() {
                Ok(message) => message,
                Err(err) => {
                    warn!(%line, error = %err, "skipping unparsable line");
                    continue;
                }
            };

            match &message.command {
                Command::PING(token, _) => {
                    self.sender
                        .send(Command::PONG(token.clone(), None))
                        .map_err(|_| ClientError::Closed)?;
                }
                Command::Response(Response::RPL_WELCOME, args) => {
                    registered = true;
                    if let Some(nick) = args.first() {
                        self.nick = nick.clone();
                    }
                    info!(nick = %self.nick, "registered");
                }
                Command::Response(Response::ERR_NICKNAMEINUSE, _) if !registered => {
                    self.nick.push('_');
                    warn!(nick = %self.nick, "nick in use, trying another");
                    self.sender
                        .nick(&self.nick)
                        .map_err(|_| ClientError::Closed)?;
                }
                _ => {}
            }

            handlers.dispatch(Event::from_message(line, &message));
        }
        Ok(())
    }
}

async fn write_loop(
    mut write: WriteHalf<BoxedTransport>,
    mut rx: UnboundedReceiver<String>,
    log_raw: bool,
) {
    while let Some(line) = rx.recv().await {
        if log_raw {
            debug!(%line, "->");
        }
        let framed = format!("{line}\r\n");
        if let Err(err) = write.write_all(framed.as_bytes()).await {
            warn!(error = %err, "write failed, stopping writer");
            break;
        }
        if let Err(err) = write.flush().await {
            warn!(error = %err, "flush failed, stopping writer");
            break;
        }
    }
}

/// Create a TLS connector restricted to TLS 1.2+ using webpki roots.
fn tls_connector() -> TlsConnector {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_protocol_versions(&[
        &rustls::version::TLS13,
        &rustls::version::TLS12,
    ])
    .with_root_certificates(root_store)
    .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

async fn establish(settings: &ConnectionSettings) -> Result<BoxedTransport, ClientError> {
    let address = settings.address();
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&address))
        .await
        .map_err(|_| ClientError::Timeout {
            address: address.clone(),
        })??;
    stream.set_nodelay(true)?;

    if !settings.tls {
        info!(%address, "connected");
        return Ok(Box::new(stream));
    }

    let server_name = ServerName::try_from(settings.host.clone())
        .map_err(|e| ClientError::InvalidServerName(e.to_string()))?;
    let tls_stream = tls_connector().connect(server_name, stream).await?;
    info!(%address, "connected with tls");
    Ok(Box::new(tls_stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn local(port: u16) -> ConnectionSettings {
        ConnectionSettings {
            host: "127.0.0.1".into(),
            port,
            tls: false,
            nick: "nako".into(),
            user: "nako".into(),
            password: None,
            log_raw: false,
        }
    }

    /// Accepts one client, reads its NICK and USER, then hands back the socket.
    async fn accept_registered(listener: TcpListener) -> TcpStream {
        let (socket, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(socket);
        let mut line = String::new();
        for _ in 0..2 {
            line.clear();
            reader.read_line(&mut line).await.unwrap();
        }
        reader.into_inner()
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl EventHandler for Recorder {
        fn handle(&self, event: &Event) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(event.code.clone());
            Ok(())
        }
    }

    struct Failing;

    impl EventHandler for Failing {
        fn handle(&self, _event: &Event) -> anyhow::Result<()> {
            anyhow::bail!("always fails")
        }
    }

    #[test]
    fn registry_matches_code_and_catch_all() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = HandlerRegistry::new();
        reg.register("privmsg", Recorder(seen.clone()));
        reg.register("*", Recorder(seen.clone()));

        assert_eq!(reg.handlers_for("PRIVMSG").len(), 2);
        assert_eq!(reg.handlers_for("JOIN").len(), 1);
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = HandlerRegistry::new();
        reg.register("PRIVMSG", Failing);
        reg.register("PRIVMSG", Recorder(seen.clone()));

        let event = Event::parse(":a!b@c PRIVMSG #x :hi").unwrap();
        for handle in reg.dispatch(event) {
            handle.await.unwrap();
        }

        assert_eq!(*seen.lock().unwrap(), vec!["PRIVMSG".to_string()]);
    }

    #[test]
    fn sender_strips_line_breaks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = IrcSender::new(tx);

        sender.privmsg("#test", "hi\r\nQUIT :bye").unwrap();

        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #test :hiQUIT :bye");
    }

    #[test]
    fn sender_fails_once_writer_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sender = IrcSender::new(tx);

        assert!(sender.join("#test").is_err());
    }

    #[test]
    fn join_is_serialized_as_a_join_command() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        IrcSender::new(tx).join("#test").unwrap();

        let message: Message = rx.try_recv().unwrap().parse().unwrap();
        assert_eq!(message.command, Command::JOIN("#test".into(), None, None));
    }

    #[tokio::test]
    async fn overlong_line_ends_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let mut socket = accept_registered(listener).await;
            socket
                .write_all(&vec![b'a'; MAX_LINE_LEN + 100])
                .await
                .unwrap();
            // Hold the socket open; only the size limit may end the read.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let connection = Connection::open(&local(port)).await.unwrap();
        let err = connection.run(HandlerRegistry::new()).await;

        assert!(matches!(err, ClientError::LineTooLong { max } if max == MAX_LINE_LEN));
        server.abort();
    }

    #[tokio::test]
    async fn end_of_stream_is_reported_as_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let mut socket = accept_registered(listener).await;
            socket.write_all(b":s NOTICE * :bye\r\n").await.unwrap();
            socket.shutdown().await.unwrap();
            // Keep the read side alive so nothing is reset.
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let connection = Connection::open(&local(port)).await.unwrap();
        let err = connection.run(HandlerRegistry::new()).await;

        assert!(matches!(err, ClientError::Closed));
        server.await.unwrap();
    }
}
