//! Command routing: first registered match wins.
//!
//! Patterns are compiled once at registration time, so an invalid regex is a
//! setup error surfaced immediately, and matching never touches the pattern
//! registry itself.

use crate::error::SetupError;
use crate::response::{CommandPattern, Responder, ResponseSet};
use regex::Regex;
use std::sync::{Arc, Mutex};

enum Matcher {
    Literal(String),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, command: &str) -> bool {
        match self {
            // Literal patterns require exact equality.
            Self::Literal(expected) => expected == command,
            // Regex patterns match on substring search, unanchored.
            Self::Regex(regex) => regex.is_match(command),
        }
    }
}

struct TableEntry {
    pattern: CommandPattern,
    matcher: Matcher,
    responder: Arc<Mutex<Responder>>,
}

/// Compiled command table for one host profile.
#[derive(Default)]
pub(crate) struct CommandTable {
    entries: Vec<TableEntry>,
}

impl CommandTable {
    /// Compile a response set, rejecting invalid regex patterns.
    pub(crate) fn compile(set: ResponseSet) -> Result<Self, SetupError> {
        let mut entries = Vec::new();
        for (pattern, responder) in set.into_entries() {
            let matcher = match &pattern {
                CommandPattern::Literal(command) => Matcher::Literal(command.clone()),
                CommandPattern::Regex(raw) => {
                    let regex = Regex::new(raw).map_err(|source| SetupError::InvalidRegex {
                        pattern: raw.clone(),
                        source,
                    })?;
                    Matcher::Regex(regex)
                }
            };
            entries.push(TableEntry {
                pattern,
                matcher,
                responder: Arc::new(Mutex::new(responder)),
            });
        }
        Ok(Self { entries })
    }

    /// Find the first responder whose pattern matches the command.
    ///
    /// The responder is handed back rather than invoked here so the caller
    /// can run it without holding the registry lock; a custom callback is
    /// then free to call back into the environment. Returns `None` when no
    /// pattern matches; the caller turns that into a "command not mocked"
    /// error carrying [`CommandTable::registered`].
    pub(crate) fn find(&self, command: &str) -> Option<Arc<Mutex<Responder>>> {
        self.entries
            .iter()
            .find(|entry| entry.matcher.matches(command))
            .map(|entry| Arc::clone(&entry.responder))
    }

    /// Descriptions of every registered pattern, in registration order.
    pub(crate) fn registered(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.pattern.describe())
            .collect()
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTable")
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{ExecOutput, SessionContext};

    fn context() -> SessionContext {
        SessionContext {
            host: "h".to_string(),
            port: 22,
            username: None,
        }
    }

    fn table(set: ResponseSet) -> CommandTable {
        CommandTable::compile(set).expect("table should compile")
    }

    fn route(table: &CommandTable, command: &str) -> Option<ExecOutput> {
        table
            .find(command)
            .map(|responder| responder.lock().unwrap().respond(&context(), command))
    }

    #[test]
    fn test_literal_requires_exact_equality() {
        let table = table(ResponseSet::new().literal("ls -l", ExecOutput::stdout("out")));
        assert!(route(&table, "ls -l").is_some());
        assert!(route(&table, "ls -la").is_none());
        assert!(route(&table, "ls").is_none());
    }

    #[test]
    fn test_regex_matches_as_search() {
        let table = table(ResponseSet::new().regex("docker ps", ExecOutput::stdout("out")));
        // Unanchored: a match anywhere in the command counts.
        assert!(route(&table, "sudo docker ps -a").is_some());
        assert!(route(&table, "docker ps").is_some());
        assert!(route(&table, "docker images").is_none());
    }

    #[test]
    fn test_first_match_wins_in_registration_order() {
        let table = table(
            ResponseSet::new()
                .regex("ls.*", ExecOutput::stdout("regex"))
                .literal("ls -l", ExecOutput::stdout("literal")),
        );
        let output = route(&table, "ls -l").unwrap();
        assert_eq!(output.stdout_text(), "regex");
    }

    #[test]
    fn test_literal_before_regex_wins() {
        let table = table(
            ResponseSet::new()
                .literal("ls -l", ExecOutput::stdout("literal"))
                .regex("ls.*", ExecOutput::stdout("regex")),
        );
        let output = route(&table, "ls -l").unwrap();
        assert_eq!(output.stdout_text(), "literal");
    }

    #[test]
    fn test_invalid_regex_rejected_at_compile() {
        let result = CommandTable::compile(
            ResponseSet::new().regex("ls [unclosed", ExecOutput::empty()),
        );
        match result {
            Err(SetupError::InvalidRegex { pattern, .. }) => {
                assert_eq!(pattern, "ls [unclosed");
            }
            other => panic!("expected InvalidRegex, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_registered_descriptions_keep_order() {
        let table = table(
            ResponseSet::new()
                .literal("pwd", ExecOutput::empty())
                .regex("git .*", ExecOutput::empty()),
        );
        assert_eq!(table.registered(), vec!["pwd", "re(git .*)"]);
    }
}
