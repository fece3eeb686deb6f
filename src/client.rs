//! Drop-in SSH client emulation.
//!
//! [`MockSshClient`] mirrors the call shape of a real SSH client: connect to
//! a host/port, execute commands over channels with separate stdin/stdout/
//! stderr streams, open a file-transfer session, close. Nothing here touches
//! the network; every call resolves against the bound [`MockEnviron`].

use crate::environ::{HostKey, MockEnviron};
use crate::error::{ConnectError, ExecError};
use crate::response::ExecOutput;
use crate::sftp::MockSftpClient;
use std::io::{Cursor, Read, Write};
use tracing::debug;

/// Connect-time options beyond host and port.
///
/// Only `username` and `password` affect mock behavior; the remaining knobs
/// exist so call sites written against a real client port over unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectOptions {
    /// Username presented for authentication.
    pub username: Option<String>,
    /// Password presented for authentication.
    pub password: Option<String>,
    /// Accepted and ignored.
    pub timeout_secs: Option<f64>,
    /// Accepted and ignored.
    pub look_for_keys: bool,
    /// Accepted and ignored.
    pub allow_agent: bool,
}

impl ConnectOptions {
    /// Options carrying a username/password pair.
    pub fn credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Set the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// One bound session.
#[derive(Debug, Clone)]
struct Session {
    key: HostKey,
    username: Option<String>,
}

/// Mock SSH client bound to an environment.
///
/// ```
/// use sshmock::{ExecOutput, MockEnviron, ResponseSet};
///
/// let env = MockEnviron::new();
/// env.add_responses_for_host(
///     "h",
///     22,
///     ResponseSet::new().literal("whoami", ExecOutput::stdout("root\n")),
/// )
/// .unwrap();
///
/// let mut client = env.client();
/// client.connect("h", 22).unwrap();
/// let mut streams = client.exec_command("whoami").unwrap();
/// assert_eq!(streams.stdout.text(), "root\n");
/// assert_eq!(streams.stdout.exit_status(), 0);
/// ```
#[derive(Debug)]
pub struct MockSshClient {
    env: MockEnviron,
    session: Option<Session>,
}

impl MockSshClient {
    /// Construct a client bound to `env`. Prefer [`MockEnviron::client`].
    pub fn new(env: &MockEnviron) -> Self {
        Self {
            env: env.clone(),
            session: None,
        }
    }

    /// Connect anonymously to `host:port`.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectError> {
        self.connect_with(host, port, ConnectOptions::default())
    }

    /// Connect to `host:port` with explicit options.
    ///
    /// Lookup, then injected failure, then credential check; on success the
    /// session binds to this endpoint. Reconnecting an already-connected
    /// client rebinds it. Execution history is never touched by connect.
    pub fn connect_with(
        &mut self,
        host: &str,
        port: u16,
        options: ConnectOptions,
    ) -> Result<(), ConnectError> {
        let key = HostKey::new(host, port);
        debug!("Mock connect to {}", key);
        self.env.resolve_connect(
            &key,
            options.username.as_deref(),
            options.password.as_deref(),
        )?;
        self.session = Some(Session {
            key,
            username: options.username,
        });
        Ok(())
    }

    /// True if a session is bound.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The endpoint of the bound session, if any.
    pub fn connected_to(&self) -> Option<(&str, u16)> {
        self.session
            .as_ref()
            .map(|s| (s.key.host.as_str(), s.key.port))
    }

    fn session(&self) -> Result<&Session, ExecError> {
        self.session.as_ref().ok_or(ExecError::NotConnected)
    }

    /// Execute a command, returning channel-style streams.
    ///
    /// The command is recorded in the execution history before routing, so a
    /// failed route still shows up in assertions.
    pub fn exec_command(&mut self, command: &str) -> Result<ExecStreams, ExecError> {
        let output = self.exec(command)?;
        Ok(ExecStreams::from_output(output))
    }

    /// Execute a command, returning the collected output directly.
    pub fn exec(&mut self, command: &str) -> Result<ExecOutput, ExecError> {
        let session = self.session()?.clone();
        debug!("Mock exec on {}: {}", session.key, command);
        self.env
            .execute(&session.key, session.username.as_deref(), command)
    }

    /// Open a file-transfer session against the connected host.
    pub fn open_sftp(&self) -> Result<MockSftpClient, ExecError> {
        let session = self.session()?;
        Ok(MockSftpClient::new(&self.env, session.key.clone()))
    }

    /// Drop the bound session. Environment state is unaffected.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Mock disconnect from {}", session.key);
        }
    }
}

/// Channel streams for one executed command.
///
/// Each call to `exec_command` yields fresh, independently positioned
/// streams, even for repeated executions of the same command.
#[derive(Debug)]
pub struct ExecStreams {
    /// Write end; bytes are accepted and discarded.
    pub stdin: StdinWriter,
    /// Read end of the command's stdout.
    pub stdout: ChannelReader,
    /// Read end of the command's stderr.
    pub stderr: ChannelReader,
}

impl ExecStreams {
    fn from_output(output: ExecOutput) -> Self {
        let exit_status = output.exit_status;
        Self {
            stdin: StdinWriter::default(),
            stdout: ChannelReader::new(output.stdout, exit_status),
            stderr: ChannelReader::new(output.stderr, exit_status),
        }
    }
}

/// Readable stream over one channel's buffered output.
#[derive(Debug)]
pub struct ChannelReader {
    cursor: Cursor<Vec<u8>>,
    exit_status: i32,
}

impl ChannelReader {
    fn new(content: Vec<u8>, exit_status: i32) -> Self {
        Self {
            cursor: Cursor::new(content),
            exit_status,
        }
    }

    /// Exit status of the command this channel belongs to.
    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// Remaining stream content decoded as UTF-8 (lossy). Consumes position.
    pub fn text(&mut self) -> String {
        let mut buffer = Vec::new();
        // Reading from an in-memory cursor cannot fail.
        let _ = self.cursor.read_to_end(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

/// Write end of the command channel; everything written is discarded.
#[derive(Debug, Default)]
pub struct StdinWriter {
    written: usize,
}

impl StdinWriter {
    /// Total bytes accepted so far.
    pub fn bytes_written(&self) -> usize {
        self.written
    }
}

impl Write for StdinWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
