//! Checked execution of external programs.
//!
//! Every collaborator (apt, pki, certbot, ufw, systemctl, ip) is reached
//! through [`CommandRunner`], so a non-zero exit can never be mistaken for
//! success and tests can replace the host with [`RecordingRunner`].

use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info};

/// A program invocation: name, arguments, optional stdin and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = Some(bytes);
        self
    }
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={value} ")?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {}: {stderr}", describe_status(.status))]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

pub trait CommandRunner {
    /// Run `spec` to completion and capture its output. Only failure to
    /// start is an error here; see [`run_checked`] for exit status checks.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Run `spec` and turn a non-zero exit into [`CommandError::Failed`].
pub fn run_checked(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
) -> Result<CommandOutput, CommandError> {
    info!(command = %spec, "running");
    let output = runner.run(spec)?;
    debug!(
        command = %spec,
        status = ?output.status,
        stdout_bytes = output.stdout.len(),
        "finished"
    );
    if output.is_success() {
        Ok(output)
    } else {
        Err(CommandError::Failed {
            command: spec.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Executes real processes on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let spawn_err = |source: std::io::Error| CommandError::Spawn {
            command: spec.to_string(),
            source,
        };

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k, v)))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(spawn_err)?;
        if let (Some(bytes), Some(mut pipe)) = (&spec.stdin, child.stdin.take()) {
            pipe.write_all(bytes).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Test double that records invocations and replays scripted outputs.
///
/// Responses are matched by the first rule whose program and argument
/// prefix fit the command; unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    rules: Mutex<Vec<(Vec<String>, VecDeque<CommandOutput>)>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to commands starting with `prefix` (program then args).
    /// Outputs are consumed in order; the last one repeats.
    pub fn respond<I, S>(&self, prefix: I, output: CommandOutput) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefix: Vec<String> = prefix.into_iter().map(Into::into).collect();
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        match rules.iter().position(|(p, _)| *p == prefix) {
            Some(idx) => rules[idx].1.push_back(output),
            None => rules.push((prefix, VecDeque::from([output]))),
        }
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Calls rendered as shell-like strings, for easy assertions.
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.clone());

        let words: Vec<&str> = std::iter::once(spec.program.as_str())
            .chain(spec.args.iter().map(String::as_str))
            .collect();
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        let matched = rules.iter_mut().find(|(prefix, _)| {
            prefix.len() <= words.len() && prefix.iter().zip(&words).all(|(p, w)| p == w)
        });

        Ok(match matched {
            Some((_, queue)) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some((_, queue)) => queue.front().cloned().unwrap_or_default(),
            None => CommandOutput::success(Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_args_with_spaces() {
        let spec = CommandSpec::new("pki")
            .args(["--dn", "CN=VPN root CA"])
            .env("LC_ALL", "C");
        assert_eq!(spec.to_string(), "LC_ALL=C pki --dn 'CN=VPN root CA'");
    }

    #[test]
    fn run_checked_rejects_nonzero_exit() {
        let runner = RecordingRunner::new();
        runner.respond(["ufw", "enable"], CommandOutput::failure(1, "ERROR: problem"));

        let err = run_checked(&runner, &CommandSpec::new("ufw").arg("enable")).unwrap_err();
        assert!(err.to_string().contains("status 1"));
        assert!(err.to_string().contains("ERROR: problem"));
    }

    #[test]
    fn recording_runner_uses_first_matching_prefix() {
        let runner = RecordingRunner::new();
        runner
            .respond(["ip", "route"], CommandOutput::success("default dev ens3"))
            .respond(["ip"], CommandOutput::failure(2, ""));

        let out = runner
            .run(&CommandSpec::new("ip").args(["route", "show", "default"]))
            .expect("run");
        assert_eq!(out.stdout_text(), "default dev ens3");
        assert_eq!(runner.call_lines(), vec!["ip route show default"]);
    }

    #[test]
    fn system_runner_captures_stdout_and_feeds_stdin() {
        let out = SystemRunner
            .run(&CommandSpec::new("cat").stdin(b"hello".to_vec()))
            .expect("cat should run");
        assert!(out.is_success());
        assert_eq!(out.stdout, b"hello");
    }
}
