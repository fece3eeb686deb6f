//! The mock environment coordinator.
//!
//! [`MockEnviron`] is the registry that binds per-host/port connection
//! behavior, routes issued commands, owns the local and per-host remote file
//! stores, and records execution history for assertions. It is an explicit
//! context object: clone it freely and hand it to every client construction
//! point; all clones share one registry guarded by a single lock.
//!
//! ```
//! use sshmock::{ExecOutput, MockEnviron, ResponseSet};
//!
//! let env = MockEnviron::new();
//! env.add_responses_for_host(
//!     "web-1",
//!     22,
//!     ResponseSet::new().literal("uptime", ExecOutput::stdout("up 3 days")),
//! )
//! .unwrap();
//!
//! let mut client = env.client();
//! client.connect("web-1", 22).unwrap();
//! let output = client.exec("uptime").unwrap();
//! assert_eq!(output.stdout_text(), "up 3 days");
//! env.assert_command_was_executed("web-1", 22, "uptime").unwrap();
//! ```

use crate::client::MockSshClient;
use crate::error::{AssertionFailure, ExecError, FileError, SetupError};
use crate::failure::ConnectionFailure;
use crate::fs::{FileRecord, FileStore};
use crate::response::{ExecOutput, ResponseSet, SessionContext};
use crate::router::CommandTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Default port used by the convenience failure setters.
const DEFAULT_SSH_PORT: u16 = 22;

/// (hostname, port) pair identifying one emulated endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostKey {
    /// Hostname.
    pub host: String,
    /// Port.
    pub port: u16,
}

impl HostKey {
    /// Create a key.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for HostKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One appended record of an issued command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Hostname the command was issued against.
    pub host: String,
    /// Port the command was issued against.
    pub port: u16,
    /// Full command string.
    pub command: String,
}

/// Optional credentials bound to a host profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Credentials {
    username: Option<String>,
    password: Option<String>,
}

impl Credentials {
    /// Accept when no credentials are registered, otherwise require equality.
    fn accept(&self, username: Option<&str>, password: Option<&str>) -> bool {
        if self.username.is_none() && self.password.is_none() {
            return true;
        }
        self.username.as_deref() == username && self.password.as_deref() == password
    }
}

/// Registration payload for one host.
///
/// ```
/// use sshmock::{ConnectionFailure, HostSetup, ResponseSet};
///
/// let setup = HostSetup::new(ResponseSet::new())
///     .with_credentials("root", "root")
///     .with_failure(ConnectionFailure::Timeout);
/// ```
#[derive(Debug, Default)]
pub struct HostSetup {
    responses: ResponseSet,
    username: Option<String>,
    password: Option<String>,
    failure: Option<ConnectionFailure>,
    fail_mkdir: bool,
}

impl HostSetup {
    /// Create a setup from a response set.
    pub fn new(responses: ResponseSet) -> Self {
        Self {
            responses,
            ..Self::default()
        }
    }

    /// Require these credentials at connect time.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Inject a connect-time failure; the command table is then never consulted.
    #[must_use]
    pub fn with_failure(mut self, failure: ConnectionFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Make `mkdir` fail on this host's transfer sessions.
    #[must_use]
    pub fn with_mkdir_failure(mut self) -> Self {
        self.fail_mkdir = true;
        self
    }
}

/// Full mock configuration bound to one [`HostKey`].
struct HostProfile {
    credentials: Credentials,
    commands: CommandTable,
    failure: Option<ConnectionFailure>,
    files: FileStore,
    fail_mkdir: bool,
}

#[derive(Default)]
struct EnvState {
    hosts: HashMap<HostKey, HostProfile>,
    local_files: FileStore,
    history: Vec<ExecutionRecord>,
}

impl EnvState {
    fn profile(&self, key: &HostKey) -> Result<&HostProfile, SetupError> {
        self.hosts.get(key).ok_or_else(|| SetupError::HostNotConfigured {
            host: key.host.clone(),
            port: key.port,
        })
    }

    fn profile_mut(&mut self, key: &HostKey) -> Result<&mut HostProfile, SetupError> {
        self.hosts
            .get_mut(key)
            .ok_or_else(|| SetupError::HostNotConfigured {
                host: key.host.clone(),
                port: key.port,
            })
    }

    fn host_history(&self, key: &HostKey) -> Vec<String> {
        self.history
            .iter()
            .filter(|record| record.host == key.host && record.port == key.port)
            .map(|record| record.command.clone())
            .collect()
    }
}

/// Process-wide mock-state registry and sole owner of mutable state.
///
/// Cloning is cheap and every clone shares the same registry; a fresh
/// environment per test scope keeps tests independent without any hidden
/// global coupling.
#[derive(Clone, Default)]
pub struct MockEnviron {
    inner: Arc<Mutex<EnvState>>,
}

impl MockEnviron {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EnvState> {
        self.inner.lock().unwrap()
    }

    /// Construct a client bound to this environment.
    pub fn client(&self) -> MockSshClient {
        MockSshClient::new(self)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register or wholesale-replace the profile for `host:port`.
    pub fn register(&self, host: &str, port: u16, setup: HostSetup) -> Result<(), SetupError> {
        if host.is_empty() {
            return Err(SetupError::EmptyHost);
        }
        if port == 0 {
            return Err(SetupError::InvalidPort {
                host: host.to_string(),
            });
        }
        let commands = CommandTable::compile(setup.responses)?;
        let profile = HostProfile {
            credentials: Credentials {
                username: setup.username,
                password: setup.password,
            },
            commands,
            failure: setup.failure,
            files: FileStore::default(),
            fail_mkdir: setup.fail_mkdir,
        };

        let key = HostKey::new(host, port);
        info!("Registering mock host {}", key);
        self.lock().hosts.insert(key, profile);
        Ok(())
    }

    /// Register a host with a command table and no credentials.
    pub fn add_responses_for_host(
        &self,
        host: &str,
        port: u16,
        responses: ResponseSet,
    ) -> Result<(), SetupError> {
        self.register(host, port, HostSetup::new(responses))
    }

    /// Register a host with a command table and required credentials.
    pub fn add_responses_for_host_with_credentials(
        &self,
        host: &str,
        port: u16,
        responses: ResponseSet,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<(), SetupError> {
        self.register(
            host,
            port,
            HostSetup::new(responses).with_credentials(username, password),
        )
    }

    // =========================================================================
    // Convenience failure setters
    // =========================================================================

    fn register_failure(
        &self,
        host: &str,
        port: u16,
        failure: ConnectionFailure,
    ) -> Result<(), SetupError> {
        self.register(
            host,
            port,
            HostSetup::new(ResponseSet::new()).with_failure(failure),
        )
    }

    /// Connects to `host` fail with a name-resolution error.
    pub fn dns_failure(&self, host: &str) -> Result<(), SetupError> {
        self.register_failure(host, DEFAULT_SSH_PORT, ConnectionFailure::Dns)
    }

    /// Connects to `host` fail with a timeout error.
    pub fn timeout_failure(&self, host: &str) -> Result<(), SetupError> {
        self.register_failure(host, DEFAULT_SSH_PORT, ConnectionFailure::Timeout)
    }

    /// Connects to `host` fail with an authentication error.
    pub fn auth_failure(&self, host: &str) -> Result<(), SetupError> {
        self.register_failure(host, DEFAULT_SSH_PORT, ConnectionFailure::Auth)
    }

    /// Connects to `host` fail with a connection-refused error.
    pub fn connection_refused(&self, host: &str) -> Result<(), SetupError> {
        self.register_failure(host, DEFAULT_SSH_PORT, ConnectionFailure::Refused)
    }

    /// Connects to `host` fail with a host-key mismatch using default keys.
    pub fn bad_host_key_failure(&self, host: &str) -> Result<(), SetupError> {
        self.register_failure(host, DEFAULT_SSH_PORT, ConnectionFailure::bad_host_key())
    }

    /// Connects to `host` fail with a host-key mismatch carrying these keys.
    pub fn bad_host_key_failure_with_keys(
        &self,
        host: &str,
        offered: impl Into<String>,
        expected: impl Into<String>,
    ) -> Result<(), SetupError> {
        self.register_failure(
            host,
            DEFAULT_SSH_PORT,
            ConnectionFailure::bad_host_key_with(offered, expected),
        )
    }

    /// Connects to `host:port` fail with this exact error message.
    pub fn custom_failure(
        &self,
        host: &str,
        port: u16,
        message: impl Into<String>,
    ) -> Result<(), SetupError> {
        self.register_failure(host, port, ConnectionFailure::custom(message))
    }

    // =========================================================================
    // Connect / execute (called by the client emulation layer)
    // =========================================================================

    /// Resolve a connect attempt: injected failure first, then credentials.
    pub(crate) fn resolve_connect(
        &self,
        key: &HostKey,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), crate::error::ConnectError> {
        let state = self.lock();
        let profile = state.profile(key)?;

        if let Some(failure) = &profile.failure {
            debug!("Injecting connection failure for {}", key);
            return Err(failure.synthesize(key, username));
        }

        if !profile.credentials.accept(username, password) {
            debug!("Rejecting credentials for {}", key);
            return Err(crate::error::ConnectError::AuthFailed {
                host: key.host.clone(),
                user: username.unwrap_or("unknown").to_string(),
            });
        }

        debug!("Mock connect accepted for {}", key);
        Ok(())
    }

    /// Append an execution record directly, without routing a command.
    ///
    /// Useful when a test drives a hand-rolled transport but still wants the
    /// history-based assertions.
    pub fn record_execution(&self, host: &str, port: u16, command: &str) {
        debug!("Recording execution on {}:{}: {}", host, port, command);
        self.lock().history.push(ExecutionRecord {
            host: host.to_string(),
            port,
            command: command.to_string(),
        });
    }

    /// Record the command, then route it through the host's command table.
    ///
    /// The record is appended before the responder runs, so assertions hold
    /// even when routing fails or the responder panics. The matched responder
    /// is invoked after the registry lock is released, so a custom callback
    /// may call back into the environment (history queries, file
    /// registration) without deadlocking.
    pub(crate) fn execute(
        &self,
        key: &HostKey,
        username: Option<&str>,
        command: &str,
    ) -> Result<ExecOutput, ExecError> {
        let responder = {
            let mut state = self.lock();
            state.history.push(ExecutionRecord {
                host: key.host.clone(),
                port: key.port,
                command: command.to_string(),
            });

            let profile = state.profile(key)?;
            profile
                .commands
                .find(command)
                .ok_or_else(|| ExecError::CommandNotMocked {
                    host: key.host.clone(),
                    port: key.port,
                    command: command.to_string(),
                    registered: profile.commands.registered(),
                })?
        };

        let context = SessionContext {
            host: key.host.clone(),
            port: key.port,
            username: username.map(str::to_string),
        };
        let output = responder.lock().unwrap().respond(&context, command);
        debug!(
            "Mock command on {} completed: exit={}",
            key, output.exit_status
        );
        Ok(output)
    }

    // =========================================================================
    // Local file store
    // =========================================================================

    /// Insert or overwrite a record in the global local namespace.
    pub fn add_local_file(&self, path: impl Into<String>, record: impl Into<FileRecord>) {
        let path = path.into();
        debug!("Registering local file {}", path);
        self.lock().local_files.insert(path, record.into());
    }

    /// Fetch a local record, or fail with "file not found".
    pub fn get_local_file(&self, path: &str) -> Result<FileRecord, FileError> {
        self.lock()
            .local_files
            .get(path)
            .cloned()
            .ok_or_else(|| FileError::NotFound {
                path: path.to_string(),
            })
    }

    /// Remove a local record, or fail if none exists.
    pub fn remove_local_file(&self, path: &str) -> Result<(), FileError> {
        self.lock()
            .local_files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| FileError::NotFound {
                path: path.to_string(),
            })
    }

    // =========================================================================
    // Per-host remote file stores
    // =========================================================================

    /// Insert or overwrite a record in `host:port`'s remote namespace.
    pub fn add_mock_file_for_host(
        &self,
        host: &str,
        port: u16,
        path: impl Into<String>,
        record: impl Into<FileRecord>,
    ) -> Result<(), SetupError> {
        let key = HostKey::new(host, port);
        let path = path.into();
        debug!("Registering remote file {} on {}", path, key);
        self.lock().profile_mut(&key)?.files.insert(path, record.into());
        Ok(())
    }

    /// Fetch a remote record for `host:port`.
    pub fn get_mock_file_for_host(
        &self,
        host: &str,
        port: u16,
        path: &str,
    ) -> Result<FileRecord, FileError> {
        let key = HostKey::new(host, port);
        let state = self.lock();
        state
            .profile(&key)?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| FileError::NotFound {
                path: path.to_string(),
            })
    }

    /// Remove a remote record for `host:port`.
    pub fn remove_mock_file_for_host(
        &self,
        host: &str,
        port: u16,
        path: &str,
    ) -> Result<(), FileError> {
        let key = HostKey::new(host, port);
        let mut state = self.lock();
        state
            .profile_mut(&key)?
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| FileError::NotFound {
                path: path.to_string(),
            })
    }

    // =========================================================================
    // Transfer-session backing operations
    // =========================================================================

    pub(crate) fn remote_read(&self, key: &HostKey, path: &str) -> Result<FileRecord, FileError> {
        let state = self.lock();
        state
            .profile(key)?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| FileError::NotFound {
                path: path.to_string(),
            })
    }

    /// Commit one open-for-write scope into the remote store.
    pub(crate) fn remote_commit(
        &self,
        key: &HostKey,
        path: &str,
        record: FileRecord,
    ) -> Result<(), FileError> {
        debug!("Committing write of {} bytes to {} on {}", record.content.len(), path, key);
        self.lock().profile_mut(key)?.files.insert(path, record);
        Ok(())
    }

    pub(crate) fn remote_list(&self, key: &HostKey, prefix: &str) -> Result<Vec<String>, FileError> {
        Ok(self.lock().profile(key)?.files.list(prefix))
    }

    pub(crate) fn remote_remove(&self, key: &HostKey, path: &str) -> Result<(), FileError> {
        self.lock()
            .profile_mut(key)?
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| FileError::NotFound {
                path: path.to_string(),
            })
    }

    pub(crate) fn mkdir_allowed(&self, key: &HostKey) -> Result<bool, FileError> {
        Ok(!self.lock().profile(key)?.fail_mkdir)
    }

    /// Copy a remote record's content into the local store (`get`).
    pub(crate) fn transfer_get(
        &self,
        key: &HostKey,
        remote_path: &str,
        local_path: &str,
    ) -> Result<(), FileError> {
        let mut state = self.lock();
        let record = state
            .profile(key)?
            .files
            .get(remote_path)
            .cloned()
            .ok_or_else(|| FileError::NotFound {
                path: remote_path.to_string(),
            })?;
        debug!("get {} -> {} ({} bytes)", remote_path, local_path, record.content.len());
        state.local_files.insert(local_path, FileRecord::new(record.content));
        Ok(())
    }

    /// Copy a local record's content into the remote store (`put`).
    pub(crate) fn transfer_put(
        &self,
        key: &HostKey,
        local_path: &str,
        remote_path: &str,
    ) -> Result<(), FileError> {
        let mut state = self.lock();
        let record = state
            .local_files
            .get(local_path)
            .cloned()
            .ok_or_else(|| FileError::NotFound {
                path: local_path.to_string(),
            })?;
        debug!("put {} -> {} ({} bytes)", local_path, remote_path, record.content.len());
        state
            .profile_mut(key)?
            .files
            .insert(remote_path, FileRecord::new(record.content));
        Ok(())
    }

    // =========================================================================
    // Assertions and history
    // =========================================================================

    /// Succeeds iff an exact-match record exists for `host:port`.
    pub fn assert_command_was_executed(
        &self,
        host: &str,
        port: u16,
        command: &str,
    ) -> Result<(), AssertionFailure> {
        let key = HostKey::new(host, port);
        let state = self.lock();
        let profile = state.profile(&key)?;
        let executed = state.host_history(&key);
        if executed.iter().any(|c| c == command) {
            return Ok(());
        }
        Err(AssertionFailure::CommandNotExecuted {
            host: key.host,
            port,
            command: command.to_string(),
            registered: profile.commands.registered(),
            executed,
        })
    }

    /// Succeeds iff no exact-match record exists for `host:port`.
    pub fn assert_command_was_not_executed(
        &self,
        host: &str,
        port: u16,
        command: &str,
    ) -> Result<(), AssertionFailure> {
        let key = HostKey::new(host, port);
        let state = self.lock();
        state.profile(&key)?;
        if state.host_history(&key).iter().any(|c| c == command) {
            return Err(AssertionFailure::CommandUnexpectedlyExecuted {
                host: key.host,
                port,
                command: command.to_string(),
            });
        }
        Ok(())
    }

    /// Succeeds iff the `index`-th command issued to `host:port` is `command`.
    pub fn assert_command_executed_on_index(
        &self,
        host: &str,
        port: u16,
        command: &str,
        index: usize,
    ) -> Result<(), AssertionFailure> {
        let key = HostKey::new(host, port);
        let state = self.lock();
        state.profile(&key)?;
        let executed = state.host_history(&key);
        let found = executed.get(index).cloned();
        if found.as_deref() == Some(command) {
            return Ok(());
        }
        Err(AssertionFailure::CommandNotAtIndex {
            host: key.host,
            port,
            command: command.to_string(),
            index,
            found,
            executed,
        })
    }

    /// Commands issued to `host:port`, in call order.
    pub fn command_history(&self, host: &str, port: u16) -> Vec<String> {
        self.lock().host_history(&HostKey::new(host, port))
    }

    /// Snapshot of every execution record, across hosts, in call order.
    pub fn execution_log(&self) -> Vec<ExecutionRecord> {
        self.lock().history.clone()
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Reset every profile, file store, and the execution log to empty.
    ///
    /// Idempotent and all-or-nothing: state is cleared in one locked section.
    pub fn cleanup_environment(&self) {
        info!("Cleaning up mock environment");
        let mut state = self.lock();
        state.hosts.clear();
        state.local_files.clear();
        state.history.clear();
    }
}

impl std::fmt::Debug for MockEnviron {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockEnviron")
            .field("hosts", &state.hosts.keys().collect::<Vec<_>>())
            .field("history_len", &state.history.len())
            .finish()
    }
}
