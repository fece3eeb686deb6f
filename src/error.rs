//! Error types for the mock environment.
//!
//! All public errors implement `Diagnostic` and follow the error code
//! convention `MOCK-Exxx`:
//!
//! - E00x: setup / registration errors
//! - E1xx: synthesized connection failures
//! - E2xx: command execution errors
//! - E3xx: mock file system errors
//! - E4xx: assertion failures
//!
//! Setup errors are deliberately distinct from injected connection failures
//! so a test can tell missing configuration apart from an intended failure.

use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Setup Errors
// =============================================================================

/// Errors raised while registering or looking up mock configuration.
///
/// Error code range: MOCK-E001 to MOCK-E004
#[derive(Error, Diagnostic, Debug)]
pub enum SetupError {
    /// Host name was empty at registration.
    #[error("cannot register a host with an empty hostname")]
    #[diagnostic(code("MOCK-E001"), help("Pass a non-empty hostname to register"))]
    EmptyHost,

    /// Port 0 is not a valid endpoint.
    #[error("cannot register '{host}' on port 0")]
    #[diagnostic(code("MOCK-E002"), help("Use a positive port number (SSH default is 22)"))]
    InvalidPort { host: String },

    /// A regex command pattern failed to compile.
    #[error("invalid regex command pattern '{pattern}'")]
    #[diagnostic(
        code("MOCK-E003"),
        help("Fix the pattern or register it as CommandPattern::Literal")
    )]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// No profile is registered under this host/port key.
    #[error("host {host}:{port} is not configured in the mock environment")]
    #[diagnostic(
        code("MOCK-E004"),
        help("Register the host first with add_responses_for_host (did you clean up too early?)")
    )]
    HostNotConfigured { host: String, port: u16 },
}

// =============================================================================
// Connection Failures
// =============================================================================

/// Synthesized connect-time failures.
///
/// Each variant mirrors the error an SSH client would surface for the
/// corresponding real-world condition. Deterministic: repeated connects to
/// the same host produce identical errors.
///
/// Error code range: MOCK-E100 to MOCK-E106
#[derive(Error, Diagnostic, Debug)]
pub enum ConnectError {
    /// The host was never registered (setup mistake, not an injected failure).
    #[error(transparent)]
    #[diagnostic(transparent)]
    NotConfigured(#[from] SetupError),

    /// Name resolution failure; the message embeds the hostname.
    #[error("could not resolve hostname {host}: Name or service not known")]
    #[diagnostic(code("MOCK-E101"))]
    DnsFailure { host: String },

    /// Connection attempt timed out.
    #[error("connection to {host}:{port} timed out")]
    #[diagnostic(code("MOCK-E102"))]
    Timeout { host: String, port: u16 },

    /// Authentication was rejected.
    #[error("authentication failed for {user}@{host}")]
    #[diagnostic(
        code("MOCK-E103"),
        help("Check the username/password registered for this host")
    )]
    AuthFailed { host: String, user: String },

    /// The host refused the connection.
    #[error("connection refused by {host}:{port}")]
    #[diagnostic(code("MOCK-E104"))]
    Refused { host: String, port: u16 },

    /// The offered host key did not match the expected one.
    #[error("host key mismatch for {host}: offered {offered}, expected {expected}")]
    #[diagnostic(code("MOCK-E105"))]
    HostKeyMismatch {
        host: String,
        offered: String,
        expected: String,
    },

    /// A test-supplied error value, surfaced unmodified.
    #[error("{0}")]
    #[diagnostic(code("MOCK-E106"))]
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

// =============================================================================
// Execution Errors
// =============================================================================

/// Errors raised by `exec_command` and `open_sftp`.
///
/// Error code range: MOCK-E200 to MOCK-E201
#[derive(Error, Diagnostic, Debug)]
pub enum ExecError {
    /// The client has no bound session.
    #[error("not connected to any host")]
    #[diagnostic(code("MOCK-E200"), help("Call connect before issuing commands"))]
    NotConnected,

    /// No registered pattern matched the issued command.
    #[error("no mocked response for command '{command}' on {host}:{port}")]
    #[diagnostic(
        code("MOCK-E201"),
        help("Registered command patterns: {registered:?}")
    )]
    CommandNotMocked {
        host: String,
        port: u16,
        command: String,
        registered: Vec<String>,
    },

    /// The host profile disappeared mid-session (cleanup raced the client).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Setup(#[from] SetupError),
}

// =============================================================================
// File System Errors
// =============================================================================

/// Errors raised by the local and remote file system mocks.
///
/// Error code range: MOCK-E300 to MOCK-E304
#[derive(Error, Diagnostic, Debug)]
pub enum FileError {
    /// No record exists at this path.
    #[error("file not found: {path}")]
    #[diagnostic(
        code("MOCK-E300"),
        help("Register the file first or open it for writing")
    )]
    NotFound { path: String },

    /// Read attempted on a write-mode handle.
    #[error("file handle for {path} is not open for reading")]
    #[diagnostic(code("MOCK-E301"))]
    NotReadable { path: String },

    /// Write attempted on a read-mode handle.
    #[error("file handle for {path} is not open for writing")]
    #[diagnostic(code("MOCK-E302"))]
    NotWritable { path: String },

    /// Unrecognized open-mode flag string.
    #[error("invalid open mode '{flags}'")]
    #[diagnostic(code("MOCK-E303"), help("Supported modes: r, rb, w, wb, a, ab"))]
    InvalidMode { flags: String },

    /// mkdir was configured to fail for this host.
    #[error("mkdir failed for {path}")]
    #[diagnostic(code("MOCK-E304"))]
    MkdirFailed { path: String },

    /// The backing host profile is gone.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Setup(#[from] SetupError),
}

// =============================================================================
// Assertion Failures
// =============================================================================

/// Failures raised by the verification interface.
///
/// The diagnostics carry the registered pattern set and the executed history
/// so a failing assertion is directly actionable.
///
/// Error code range: MOCK-E400 to MOCK-E402
#[derive(Error, Diagnostic, Debug)]
pub enum AssertionFailure {
    /// No exact-match execution record exists.
    #[error("command '{command}' was not executed on {host}:{port}")]
    #[diagnostic(
        code("MOCK-E400"),
        help("Registered patterns: {registered:?}; executed: {executed:?}")
    )]
    CommandNotExecuted {
        host: String,
        port: u16,
        command: String,
        registered: Vec<String>,
        executed: Vec<String>,
    },

    /// An execution record exists where none was expected.
    #[error("command '{command}' was unexpectedly executed on {host}:{port}")]
    #[diagnostic(code("MOCK-E401"))]
    CommandUnexpectedlyExecuted {
        host: String,
        port: u16,
        command: String,
    },

    /// The record at the given per-host index is not the expected command.
    #[error(
        "expected command '{command}' at index {index} on {host}:{port}, found {found:?}"
    )]
    #[diagnostic(code("MOCK-E402"), help("Executed history: {executed:?}"))]
    CommandNotAtIndex {
        host: String,
        port: u16,
        command: String,
        index: usize,
        found: Option<String>,
        executed: Vec<String>,
    },

    /// The host itself was never registered.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Setup(#[from] SetupError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Report;

    #[test]
    fn test_not_configured_distinct_from_injected_failure() {
        let missing = ConnectError::NotConfigured(SetupError::HostNotConfigured {
            host: "h".to_string(),
            port: 22,
        });
        let injected = ConnectError::Refused {
            host: "h".to_string(),
            port: 22,
        };
        assert!(matches!(missing, ConnectError::NotConfigured(_)));
        assert!(matches!(injected, ConnectError::Refused { .. }));
    }

    #[test]
    fn test_dns_failure_embeds_hostname() {
        let err = ConnectError::DnsFailure {
            host: "bad".to_string(),
        };
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_command_not_mocked_reports_registered_set() {
        let err = ExecError::CommandNotMocked {
            host: "h".to_string(),
            port: 22,
            command: "pwd".to_string(),
            registered: vec!["ls -l".to_string(), "re(docker .*)".to_string()],
        };
        let report = Report::new(err);
        let formatted = format!("{:?}", report);
        assert!(formatted.contains("pwd"));
        assert!(formatted.contains("ls -l"), "help should list patterns: {formatted}");
        let code = format!("{:?}", report).contains("MOCK-E201");
        assert!(code, "should carry the error code");
    }

    #[test]
    fn test_setup_error_passes_through_file_error() {
        let err = FileError::from(SetupError::HostNotConfigured {
            host: "h".to_string(),
            port: 2222,
        });
        assert!(err.to_string().contains("h:2222"));
    }
}
