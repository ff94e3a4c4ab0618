//! A blocking client for the RouterOS management API.

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::protocol::{self, ProtocolError, Record, ReplyTag, Sentence, SentenceParser};

mod emitter;
mod transport;

pub use emitter::*;
use transport::Transport;

/// Default connect timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An error encountered by a [Client].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A command was issued before the transport was connected.
    #[error("Not connected")]
    NotConnected,
    /// The transport could not be opened, or timed out while opening.
    #[error("Failed to connect to {host}:{port}: {source}")]
    Connect {
        /// The router the connection was for.
        host: String,
        /// The port the connection was for.
        port: u16,
        /// The underlying socket or TLS failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The router rejected the command with `!trap`.
    #[error("{message}")]
    Trap {
        /// The router's `=message=` attribute, or `"Trap error"` when the
        /// trap carried none.
        message: String,
        /// The router's `=category=` attribute, when present.
        category: Option<String>,
    },
    /// The router aborted the connection with `!fatal`.
    #[error("Fatal error: {0}")]
    Fatal(String),
    /// The socket failed mid-command.
    #[error("{0}")]
    Transport(io::Error),
    /// The peer closed the connection mid-command.
    #[error("Connection closed")]
    ConnectionClosed,
    /// The peer ended its side of the stream mid-command.
    #[error("Connection ended")]
    ConnectionEnded,
    /// A failure raised while authenticating.
    #[error("Login failed: {0}")]
    LoginFailed(#[source] Box<ClientError>),
    /// Destroying the transport failed.
    #[error("Failed to close connection: {0}")]
    Close(#[source] io::Error),
    /// The router sent bytes that do not frame correctly.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// The result of a [Client] operation.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Connection options for a [Client].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    host: String,
    port: Option<u16>,
    ssl: bool,
    timeout: Duration,
}

impl ClientOptions {
    /// Creates options for the given router with the protocol defaults:
    /// plain TCP on port 8728 and a 30 second connect timeout.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            ssl: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the port. Without this, 8728 is used, or 8729 when
    /// [`ssl`](Self::ssl) is set.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Wraps the connection in TLS. The router's self-signed certificate
    /// is accepted without validation.
    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Overrides the connect timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn is_ssl(&self) -> bool {
        self.ssl
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.ssl {
            protocol::DEFAULT_TLS_PORT
        } else {
            protocol::DEFAULT_PORT
        })
    }
}

/// A RouterOS API client bound to a single router.
///
/// The client owns one transport and runs one command at a time; reply
/// rows are surfaced as [Record]s. Connection lifecycle is observable
/// through [Event] listeners registered with [on](Self::on) and
/// [once](Self::once).
pub struct Client {
    options: ClientOptions,
    transport: Option<Transport>,
    emitter: Emitter,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.options.host)
            .field("connected", &self.transport.is_some())
            .finish()
    }
}

impl Client {
    /// Creates a disconnected client for the given options.
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            transport: None,
            emitter: Emitter::new(),
        }
    }

    /// Opens the transport to the router.
    ///
    /// Emits [Event::Connect] once the socket, and the TLS handshake when
    /// enabled, is established.
    pub fn connect(&mut self) -> Result<()> {
        let host = self.options.host.clone();
        let port = self.options.effective_port();

        log::info!("connecting to router at {host}:{port}");
        let transport = Transport::open(&self.options)
            .map_err(|source| ClientError::Connect { host, port, source })?;

        self.transport = Some(transport);
        self.emitter.emit(&Event::Connect);
        Ok(())
    }

    /// Authenticates with the router.
    ///
    /// Routers running 6.43 or later accept the password on the first
    /// `/login`; older routers answer it with a `ret` challenge, which is
    /// answered in turn by an MD5 digest over the password. Both flows
    /// are handled transparently, and any failure is surfaced as
    /// [ClientError::LoginFailed].
    pub fn login(&mut self, user: &str, password: &str) -> Result<()> {
        self.login_exchange(user, password)
            .map_err(|err| ClientError::LoginFailed(Box::new(err)))
    }

    fn login_exchange(&mut self, user: &str, password: &str) -> Result<()> {
        let sentences = self.exchange("/login", &[("name", user), ("password", password)])?;

        // Only the legacy flow carries a challenge; it arrives on the
        // terminal `!done` sentence, not in a result row.
        let Some(challenge) = sentences.iter().find_map(|s| s.attribute("ret")) else {
            return Ok(());
        };

        let response = challenge_response(password, challenge)?;
        self.exchange("/login", &[("name", user), ("response", &response)])?;

        Ok(())
    }

    /// Runs a single API command and collects its reply rows.
    ///
    /// `path` is the absolute command path (e.g. `/interface/print`).
    /// Each `(key, value)` pair becomes an `=key=value` attribute word;
    /// keys already carrying a `?` or `.` prefix are forwarded verbatim
    /// as `key=value`.
    pub fn run_command(&mut self, path: &str, params: &[(&str, &str)]) -> Result<Vec<Record>> {
        let sentences = self.exchange(path, params)?;
        Ok(protocol::collect_records(&sentences))
    }

    /// Fetches the router's configured identity.
    pub fn get_system_identity(&mut self) -> Result<Vec<Record>> {
        self.run_command("/system/identity/print", &[])
    }

    /// Destroys the transport and emits [Event::Close].
    ///
    /// Closing a client that is not connected still emits the event. A
    /// shutdown failure is emitted as [Event::Error] and returned.
    pub fn close(&mut self) -> Result<()> {
        if let Some(transport) = self.transport.take() {
            if let Err(err) = transport.shutdown() {
                let err = ClientError::Close(err);
                self.emitter.emit(&Event::Error(&err));
                return Err(err);
            }
        }

        self.emitter.emit(&Event::Close);
        Ok(())
    }

    /// Registers a lifecycle listener. See [Emitter::on].
    pub fn on(&mut self, kind: EventKind, listener: Listener) -> &mut Self {
        self.emitter.on(kind, listener);
        self
    }

    /// Registers a lifecycle listener that fires at most once. See
    /// [Emitter::once].
    pub fn once(&mut self, kind: EventKind, listener: Listener) -> &mut Self {
        self.emitter.once(kind, listener);
        self
    }

    /// Removes a lifecycle listener. See [Emitter::off].
    pub fn off(&mut self, kind: EventKind, listener: &Listener) -> &mut Self {
        self.emitter.off(kind, listener);
        self
    }

    fn exchange(&mut self, path: &str, params: &[(&str, &str)]) -> Result<Vec<Sentence>> {
        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;
        let result = run_sentence_exchange(transport, path, params);

        if let Err(err) = &result {
            match err {
                ClientError::Transport(_) => {
                    self.emitter.emit(&Event::Error(err));
                }
                ClientError::ConnectionClosed => {
                    self.emitter.emit(&Event::Close);
                }
                ClientError::ConnectionEnded => {
                    self.emitter.emit(&Event::End);
                }
                _ => {}
            }
        }

        result
    }
}

/// Writes one request sentence and reads reply sentences until a terminal
/// one resolves the command.
///
/// Exactly one outcome is produced per call: the collected sentences up
/// to and including `!done`, or the error carried by `!trap` / `!fatal` /
/// the transport.
fn run_sentence_exchange<T: Read + Write>(
    transport: &mut T,
    path: &str,
    params: &[(&str, &str)],
) -> Result<Vec<Sentence>> {
    let mut words = Vec::with_capacity(1 + params.len());
    words.push(path.to_owned());
    for (key, value) in params {
        if key.starts_with(&['?', '.']) {
            words.push(format!("{key}={value}"));
        } else {
            words.push(format!("={key}={value}"));
        }
    }

    log::debug!("CLIENT: {words:?}");
    let request = protocol::encode_sentence(&words)?;
    transport.write_all(&request).map_err(disconnect_error)?;
    transport.flush().map_err(disconnect_error)?;

    let mut parser = SentenceParser::new();
    let mut collected = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = match transport.read(&mut chunk) {
            Ok(0) => return Err(ClientError::ConnectionEnded),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(disconnect_error(err)),
        };

        for sentence in parser.feed(&chunk[..n])? {
            log::debug!("SERVER: {:?}", sentence.words());

            match sentence.tag() {
                Some(ReplyTag::Trap) => return Err(trap_error(&sentence)),
                Some(ReplyTag::Fatal) => return Err(fatal_error(&sentence)),
                Some(ReplyTag::Done) => {
                    collected.push(sentence);
                    return Ok(collected);
                }
                _ => collected.push(sentence),
            }
        }

        if !parser.residual().is_empty() {
            log::trace!("partial read ({} bytes buffered)", parser.residual().len());
        }
    }
}

/// Computes the response word for the pre-6.43 login challenge: `"00"`
/// followed by the lowercase hex digest of
/// `md5(0x00 || password || challenge)`.
fn challenge_response(password: &str, challenge_hex: &str) -> Result<String> {
    let challenge = hex::decode(challenge_hex).map_err(ProtocolError::InvalidChallenge)?;

    let mut input = Vec::with_capacity(1 + password.len() + challenge.len());
    input.push(0x00);
    input.extend_from_slice(password.as_bytes());
    input.extend_from_slice(&challenge);

    Ok(format!("00{:x}", md5::compute(input)))
}

fn disconnect_error(err: io::Error) -> ClientError {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => ClientError::ConnectionClosed,
        _ => ClientError::Transport(err),
    }
}

fn trap_error(sentence: &Sentence) -> ClientError {
    ClientError::Trap {
        message: sentence
            .attribute("message")
            .unwrap_or("Trap error")
            .to_owned(),
        category: sentence.attribute("category").map(str::to_owned),
    }
}

fn fatal_error(sentence: &Sentence) -> ClientError {
    ClientError::Fatal(sentence.words()[1..].join(" "))
}
