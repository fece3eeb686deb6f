//! Mock SSH/SFTP client environment for deterministic tests.
//!
//! Code that drives remote machines over SSH is hard to test: real
//! connections are slow, flaky, and need live infrastructure. This crate
//! provides a drop-in client double backed by an in-memory environment. Tests
//! register hosts, canned command responses, failure injections, and mock
//! files up front; production-shaped code then connects, executes, and
//! transfers files against that registry; afterwards the test asserts on
//! exactly what was executed.
//!
//! ```
//! use sshmock::{ExecOutput, MockEnviron, ResponseSet};
//!
//! let env = MockEnviron::new();
//! env.add_responses_for_host(
//!     "build-01",
//!     22,
//!     ResponseSet::new()
//!         .literal("hostname", ExecOutput::stdout("build-01\n"))
//!         .regex(r"cargo build", ExecOutput::stdout("Finished dev\n")),
//! )?;
//!
//! let mut client = env.client();
//! client.connect("build-01", 22)?;
//! let out = client.exec("cargo build --release")?;
//! assert!(out.success());
//!
//! env.assert_command_was_executed("build-01", 22, "cargo build --release")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod environ;
pub mod error;
pub mod failure;
pub mod fs;
pub mod logging;
pub mod response;
mod router;
pub mod sftp;

pub use client::{ChannelReader, ConnectOptions, ExecStreams, MockSshClient, StdinWriter};
pub use environ::{ExecutionRecord, HostKey, HostSetup, MockEnviron};
pub use error::{AssertionFailure, ConnectError, ExecError, FileError, SetupError};
pub use failure::ConnectionFailure;
pub use fs::{FileAttributes, FileRecord};
pub use logging::{LogConfig, LogFormat, init_logging};
pub use response::{CommandPattern, ExecOutput, Responder, ResponderFn, ResponseSet, SessionContext};
pub use sftp::{MockSftpClient, MockSftpFile, OpenMode};
