//! An in-memory emulator that records every command and answers from canned rules

use super::{Emulator, EmulatorError};
use crate::{
    command::CommandResult,
    topology::{Host, Topology},
};

/// A canned answer for commands containing `pattern`
#[derive(Debug)]
struct Rule {
    pattern: String,
    result: CommandResult,
    /// How many more times the rule applies. `None` means forever
    remaining: Option<u32>,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingEmulator {
    pub starts: usize,
    pub stops: usize,
    /// Every `(host, command)` pair in execution order
    pub commands: Vec<(String, String)>,
    rules: Vec<Rule>,
    fail_start: bool,
}

impl RecordingEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command containing `pattern` exits with `exit_code`
    pub fn fail_on(mut self, pattern: &str, exit_code: i32) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_owned(),
            result: CommandResult::new("", format!("{pattern}: simulated failure"), exit_code),
            remaining: None,
        });
        self
    }

    /// The first `times` commands containing `pattern` exit with status 1
    pub fn fail_times(mut self, pattern: &str, times: u32) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_owned(),
            result: CommandResult::new("", "unreachable", 1),
            remaining: Some(times),
        });
        self
    }

    /// Commands containing `pattern` succeed and print `stdout`
    pub fn respond(mut self, pattern: &str, stdout: &str) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_owned(),
            result: CommandResult::new(stdout, "", 0),
            remaining: None,
        });
        self
    }

    /// Make `start` fail after it has been counted
    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Commands issued on one host, in order
    pub fn commands_on(&self, host: &str) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|(name, _)| name == host)
            .map(|(_, command)| command.as_str())
            .collect()
    }

    /// Whether any command contains `pattern`
    pub fn ran(&self, pattern: &str) -> bool {
        self.commands.iter().any(|(_, command)| command.contains(pattern))
    }

    /// Position of the first command containing `pattern`
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.commands
            .iter()
            .position(|(_, command)| command.contains(pattern))
    }
}

impl Emulator for RecordingEmulator {
    async fn start(&mut self, _topology: &Topology) -> Result<(), EmulatorError> {
        self.starts += 1;
        if self.fail_start {
            return Err(EmulatorError::NotRunning("simulated".into()));
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EmulatorError> {
        self.stops += 1;
        Ok(())
    }

    async fn execute(&mut self, host: &Host, command: &str) -> Result<CommandResult, EmulatorError> {
        self.commands.push((host.name().to_owned(), command.to_owned()));
        for rule in &mut self.rules {
            if !command.contains(&rule.pattern) {
                continue;
            }
            match rule.remaining {
                Some(0) => continue,
                Some(ref mut remaining) => *remaining -= 1,
                None => {}
            }
            return Ok(rule.result.clone());
        }
        Ok(CommandResult::new("", "", 0))
    }
}
