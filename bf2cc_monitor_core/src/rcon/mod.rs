use std::{fmt::Display, io, time::Duration};

use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};

use crate::bf2cc;

pub mod queue;

pub use queue::{CommandQueue, QueueConsumer, QueueError};

pub const SEED_MARKER: &str = "### Digest seed:";
/// Exact text varies between server builds, but they all contain this.
pub const AUTH_SUCCESS_MARKER: &str = "Authentication successful";
pub const AUTH_FAILURE_MARKER: &str = "Authentication failed";

/// Prefixes every request line.
pub const STX: u8 = 0x02;
/// Terminates every response.
pub const EOT: u8 = 0x04;

#[derive(Debug, Error)]
pub enum RconError {
    #[error("Could not connect to {address} ({source})")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Connection lost ({0})")]
    TransportLost(#[from] io::Error),
    #[error("Session is {0}, not ready to send commands")]
    NotReady(SessionPhase),
    #[error("Session has failed")]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    SeedCaptured,
    Authenticating,
    Ready,
    Reconnecting,
    /// Terminal. Never retried automatically.
    Failed,
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// `hex(md5(seed + password))`, the login challenge response.
#[must_use]
pub fn digest(seed: &str, password: &str) -> String {
    format!("{:x}", md5::compute(format!("{seed}{password}")))
}

#[must_use]
pub fn frame_request(command: &str) -> Vec<u8> {
    let command = command.trim();
    let mut framed = Vec::with_capacity(command.len() + 2);
    framed.push(STX);
    framed.extend_from_slice(command.as_bytes());
    framed.push(b'\n');
    framed
}

/// Reads lines until the greeting carrying the digest seed is found.
///
/// # Errors
/// `Protocol` if the stream ends (or fails) before the seed is seen.
pub async fn read_seed<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, RconError> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| RconError::Protocol(format!("Failed to read greeting ({e})")))?;
        if read == 0 {
            return Err(RconError::Protocol(
                "Stream closed before the digest seed was received".into(),
            ));
        }

        let line = String::from_utf8_lossy(&buf);
        if let Some((_, seed)) = line.split_once(SEED_MARKER) {
            return Ok(seed.trim().to_owned());
        }
        tracing::trace!("Greeting: {}", line.trim_end());
    }
}

/// Reads one response frame and strips the terminator and surrounding whitespace.
///
/// # Errors
/// `TransportLost` if the stream fails or ends before the terminator.
pub async fn read_response<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, RconError> {
    let mut buf = Vec::new();
    reader.read_until(EOT, &mut buf).await?;
    if buf.pop() != Some(EOT) {
        return Err(RconError::TransportLost(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream closed mid-response",
        )));
    }

    Ok(String::from_utf8_lossy(&buf).trim().to_owned())
}

async fn read_login_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<(), RconError> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| RconError::Auth(format!("failed to read login reply ({e})")))?;
        if read == 0 {
            return Err(RconError::Auth(
                "connection closed before login was acknowledged".into(),
            ));
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_matches(|c: char| {
            c.is_whitespace() || c == char::from(STX) || c == char::from(EOT)
        });
        if line.contains(AUTH_SUCCESS_MARKER) {
            return Ok(());
        }
        if line.contains(AUTH_FAILURE_MARKER) {
            return Err(RconError::Auth(line.to_owned()));
        }
    }
}

/// One live stream plus the seed it was greeted with. Replaced wholesale on
/// every reconnect.
struct Connection {
    stream: BufReader<TcpStream>,
    seed: String,
}

impl Connection {
    async fn open(address: &str) -> Result<Self, RconError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| RconError::Connect {
                address: address.to_owned(),
                source,
            })?;
        let mut stream = BufReader::new(stream);
        let seed = read_seed(&mut stream).await?;

        Ok(Self { stream, seed })
    }

    async fn login(&mut self, password: &str) -> Result<(), RconError> {
        let line = format!("login {}\n", digest(&self.seed, password));
        self.stream
            .get_mut()
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RconError::Auth(format!("failed to send login ({e})")))?;

        read_login_reply(&mut self.stream).await
    }

    async fn authenticate(
        &mut self,
        password: &str,
        admin_name: Option<&str>,
    ) -> Result<(), RconError> {
        self.login(password).await?;
        if let Some(admin_name) = admin_name {
            self.exchange(&bf2cc::set_admin_name(admin_name))
                .await
                .map_err(|e| RconError::Auth(format!("failed to set admin name ({e})")))?;
        }
        Ok(())
    }

    /// Strictly one request in flight: write it, then read its whole response.
    async fn exchange(&mut self, command: &str) -> Result<String, RconError> {
        self.stream
            .get_mut()
            .write_all(&frame_request(command))
            .await?;
        read_response(&mut self.stream).await
    }
}

/// A BF2CC remote console session.
pub struct Rcon {
    address: String,
    password: String,
    admin_name: Option<String>,
    reconnect_wait: Option<Duration>,
    phase: SessionPhase,
    connection: Option<Connection>,
}

impl Rcon {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: String::new(),
            admin_name: None,
            reconnect_wait: None,
            phase: SessionPhase::Disconnected,
            connection: None,
        }
    }

    /// Reconnect after losing the connection, waiting `wait` before every
    /// attempt.
    pub fn auto_reconnect(&mut self, wait: Duration) {
        self.reconnect_wait = Some(wait);
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn seed(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.seed.as_str())
    }

    /// Opens the stream and captures the digest seed from the greeting.
    ///
    /// # Errors
    /// * `Connect` if the stream could not be opened
    /// * `Protocol` if the greeting never arrives
    pub async fn connect(&mut self) -> Result<(), RconError> {
        self.phase = SessionPhase::Connecting;
        self.connection = None;

        match Connection::open(&self.address).await {
            Ok(connection) => {
                tracing::debug!("Connected to {} (seed {})", self.address, connection.seed);
                self.connection = Some(connection);
                self.phase = SessionPhase::SeedCaptured;
                Ok(())
            }
            Err(e) => {
                self.phase = SessionPhase::Disconnected;
                Err(e)
            }
        }
    }

    /// Logs in with the captured seed. The credentials are kept for
    /// reconnection.
    ///
    /// # Errors
    /// `Auth` if the password was rejected or the login exchange failed
    pub async fn authenticate(
        &mut self,
        password: &str,
        admin_name: Option<&str>,
    ) -> Result<(), RconError> {
        password.clone_into(&mut self.password);
        self.admin_name = admin_name.filter(|n| !n.is_empty()).map(ToOwned::to_owned);
        self.login().await
    }

    async fn login(&mut self) -> Result<(), RconError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(RconError::NotReady(self.phase));
        };
        self.phase = SessionPhase::Authenticating;

        match connection
            .authenticate(&self.password, self.admin_name.as_deref())
            .await
        {
            Ok(()) => {
                tracing::info!("Authenticated with {}", self.address);
                self.phase = SessionPhase::Ready;
                Ok(())
            }
            Err(e) => {
                self.connection = None;
                self.phase = SessionPhase::Disconnected;
                Err(e)
            }
        }
    }

    /// Sends one command line and waits for its full response.
    ///
    /// # Errors
    /// * `NotReady` if the session hasn't authenticated
    /// * `TransportLost` if the connection dropped and reconnection is disabled
    /// * `Auth` if logging back in failed during reconnection
    /// * `Failed` if the session already failed
    pub async fn send(&mut self, command: &str) -> Result<String, RconError> {
        loop {
            match self.phase {
                SessionPhase::Ready => {}
                SessionPhase::Failed => return Err(RconError::Failed),
                phase => return Err(RconError::NotReady(phase)),
            }
            let Some(connection) = self.connection.as_mut() else {
                return Err(RconError::NotReady(self.phase));
            };

            match connection.exchange(command).await {
                Err(RconError::TransportLost(e)) => {
                    tracing::error!("Lost connection to {}: {e}", self.address);
                    self.connection = None;
                    let Some(wait) = self.reconnect_wait else {
                        self.phase = SessionPhase::Failed;
                        return Err(RconError::TransportLost(e));
                    };
                    self.reconnect(wait).await?;
                }
                result => return result,
            }
        }
    }

    async fn reconnect(&mut self, wait: Duration) -> Result<(), RconError> {
        loop {
            self.phase = SessionPhase::Reconnecting;
            tokio::time::sleep(wait).await;

            tracing::info!("Attempting reconnection to {}", self.address);
            if let Err(e) = self.connect().await {
                tracing::warn!("Reconnection attempt failed ({e}). Waiting.");
                continue;
            }

            if let Err(e) = self.login().await {
                tracing::error!("Login failed during reconnection: {e}");
                self.phase = SessionPhase::Failed;
                return Err(e);
            }

            tracing::info!("Reconnection successful.");
            return Ok(());
        }
    }
}
