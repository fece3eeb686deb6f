//! Command patterns and response generators.
//!
//! A registered host carries an ordered table of `(CommandPattern, Responder)`
//! pairs. Patterns are explicit tagged variants (literal vs. regex) so a
//! literal command whose text looks like a regex marker can never be
//! misinterpreted. Responders are either fixed output or a stateful callback
//! owned by the test author.

use serde::{Deserialize, Serialize};

/// Context handed to a custom responder for each invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Hostname the session is bound to.
    pub host: String,
    /// Port the session is bound to.
    pub port: u16,
    /// Username supplied at connect time, if any.
    pub username: Option<String>,
}

/// Output of one command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Bytes delivered on the stdout stream.
    pub stdout: Vec<u8>,
    /// Bytes delivered on the stderr stream.
    pub stderr: Vec<u8>,
    /// Exit status reported by the channel (0 unless set otherwise).
    pub exit_status: i32,
}

impl ExecOutput {
    /// Full constructor.
    pub fn new(stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>, exit_status: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status,
        }
    }

    /// Successful command with the given stdout and empty stderr.
    pub fn stdout(stdout: impl Into<Vec<u8>>) -> Self {
        Self::new(stdout, Vec::new(), 0)
    }

    /// Failed command with the given stderr and exit status.
    pub fn failure(stderr: impl Into<Vec<u8>>, exit_status: i32) -> Self {
        Self::new(Vec::new(), stderr, exit_status)
    }

    /// Successful command with no output at all.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), 0)
    }

    /// Check if the exit status is 0.
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// Stdout decoded as UTF-8 (lossy).
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded as UTF-8 (lossy).
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// How an issued command string is matched against a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandPattern {
    /// Exact string equality.
    Literal(String),
    /// Regex substring search (not anchored to the full command).
    Regex(String),
}

impl CommandPattern {
    /// Create a literal pattern.
    pub fn literal(command: impl Into<String>) -> Self {
        Self::Literal(command.into())
    }

    /// Create a regex pattern.
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex(pattern.into())
    }

    /// Human-readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Literal(command) => command.clone(),
            Self::Regex(pattern) => format!("re({})", pattern),
        }
    }
}

/// Type of the boxed custom responder callback.
pub type ResponderFn = dyn FnMut(&SessionContext, &str) -> ExecOutput + Send;

/// Generates command output on match.
///
/// `Static` yields a clone of its configured output on every invocation;
/// each execution gets independently-positioned streams. `Custom` invokes a
/// stateful callback with the session context and the full command string.
pub enum Responder {
    /// Fixed output.
    Static(ExecOutput),
    /// Test-author-owned callback.
    Custom(Box<ResponderFn>),
}

impl Responder {
    /// Wrap a callback as a custom responder.
    pub fn custom<F>(callback: F) -> Self
    where
        F: FnMut(&SessionContext, &str) -> ExecOutput + Send + 'static,
    {
        Self::Custom(Box::new(callback))
    }

    /// Produce output for one invocation.
    pub(crate) fn respond(&mut self, context: &SessionContext, command: &str) -> ExecOutput {
        match self {
            Self::Static(output) => output.clone(),
            Self::Custom(callback) => callback(context, command),
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(output) => f.debug_tuple("Static").field(output).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<ExecOutput> for Responder {
    fn from(output: ExecOutput) -> Self {
        Self::Static(output)
    }
}

/// Ordered set of command registrations for one host.
///
/// Registration order is the sole routing tie-break, so this is a `Vec`,
/// never a map.
#[derive(Debug, Default)]
pub struct ResponseSet {
    entries: Vec<(CommandPattern, Responder)>,
}

impl ResponseSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a literal command (builder style).
    #[must_use]
    pub fn literal(mut self, command: impl Into<String>, responder: impl Into<Responder>) -> Self {
        self.insert(CommandPattern::literal(command), responder.into());
        self
    }

    /// Register a regex command pattern (builder style).
    #[must_use]
    pub fn regex(mut self, pattern: impl Into<String>, responder: impl Into<Responder>) -> Self {
        self.insert(CommandPattern::regex(pattern), responder.into());
        self
    }

    /// Append a registration, preserving order.
    pub fn insert(&mut self, pattern: CommandPattern, responder: Responder) {
        self.entries.push((pattern, responder));
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the set has no registrations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(CommandPattern, Responder)> {
        self.entries
    }
}

impl From<Box<ResponderFn>> for Responder {
    fn from(callback: Box<ResponderFn>) -> Self {
        Self::Custom(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SessionContext {
        SessionContext {
            host: "h".to_string(),
            port: 22,
            username: Some("root".to_string()),
        }
    }

    #[test]
    fn test_exec_output_defaults() {
        let output = ExecOutput::stdout("ls output");
        assert_eq!(output.exit_status, 0);
        assert!(output.success());
        assert_eq!(output.stdout_text(), "ls output");
        assert!(output.stderr.is_empty());
    }

    #[test]
    fn test_exec_output_failure() {
        let output = ExecOutput::failure("boom", 2);
        assert!(!output.success());
        assert_eq!(output.stderr_text(), "boom");
    }

    #[test]
    fn test_static_responder_yields_clone_each_time() {
        let mut responder = Responder::from(ExecOutput::stdout("same"));
        let first = responder.respond(&context(), "ls");
        let second = responder.respond(&context(), "ls");
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_responder_keeps_private_state() {
        let mut calls = 0u32;
        let mut responder = Responder::custom(move |_ctx, _cmd| {
            calls += 1;
            ExecOutput::stdout(format!("call {}", calls))
        });
        assert_eq!(responder.respond(&context(), "x").stdout_text(), "call 1");
        assert_eq!(responder.respond(&context(), "x").stdout_text(), "call 2");
    }

    #[test]
    fn test_custom_responder_sees_context_and_command() {
        let mut responder = Responder::custom(|ctx, cmd| {
            ExecOutput::stdout(format!("{} {}", ctx.host, cmd))
        });
        let output = responder.respond(&context(), "ls -l");
        assert_eq!(output.stdout_text(), "h ls -l");
    }

    #[test]
    fn test_pattern_describe() {
        assert_eq!(CommandPattern::literal("ls -l").describe(), "ls -l");
        assert_eq!(CommandPattern::regex("docker .*").describe(), "re(docker .*)");
        // A literal that happens to look like the regex form stays literal.
        let odd = CommandPattern::literal("re(ls)");
        assert_eq!(odd, CommandPattern::Literal("re(ls)".to_string()));
    }

    #[test]
    fn test_response_set_preserves_order() {
        let set = ResponseSet::new()
            .literal("ls", ExecOutput::stdout("a"))
            .regex("ls.*", ExecOutput::stdout("b"));
        let entries = set.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, CommandPattern::literal("ls"));
        assert_eq!(entries[1].0, CommandPattern::regex("ls.*"));
    }
}
