//! Interactive fill-in for settings the operator did not supply.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::os::fd::AsFd;

use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use tracing::debug;

use crate::error::ProvisionError;
use crate::secret::Secret;
use crate::settings::{CertKind, SettingsLayer, UserEntry};

pub trait Prompter {
    fn ask(&mut self, question: &str) -> Result<String, ProvisionError>;

    /// Like [`Prompter::ask`], but the answer is not echoed back.
    fn ask_secret(&mut self, question: &str) -> Result<Secret, ProvisionError>;
}

/// Asks on stderr and reads answers from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl StdinPrompter {
    fn read_answer(&self, question: &str) -> Result<String, ProvisionError> {
        let mut stderr = io::stderr();
        write!(stderr, "{question}: ")
            .and_then(|_| stderr.flush())
            .map_err(|e| ProvisionError::io("<stderr>", e))?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| ProvisionError::io("<stdin>", e))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Prompter for StdinPrompter {
    fn ask(&mut self, question: &str) -> Result<String, ProvisionError> {
        Ok(self.read_answer(question)?.trim().to_string())
    }

    fn ask_secret(&mut self, question: &str) -> Result<Secret, ProvisionError> {
        let stdin = io::stdin();
        let guard = if is_terminal(&stdin) {
            EchoOff::engage()
        } else {
            None
        };

        let answer = self.read_answer(question);
        if guard.is_some() {
            drop(guard);
            eprintln!();
        }
        Ok(Secret::new(answer?))
    }
}

fn is_terminal(fd: &impl AsFd) -> bool {
    nix::unistd::isatty(fd.as_fd()).unwrap_or(false)
}

/// Current terminal attributes, or `None` when `fd` is not a terminal.
fn terminal_attrs(fd: &impl AsFd) -> Option<Termios> {
    termios::tcgetattr(fd.as_fd()).ok()
}

/// Terminal echo disabled on stdin until dropped.
struct EchoOff {
    saved: Termios,
}

impl EchoOff {
    fn engage() -> Option<Self> {
        let stdin = io::stdin();
        let saved = terminal_attrs(&stdin)?;
        let mut quiet = saved.clone();
        quiet.local_flags.remove(LocalFlags::ECHO);
        match termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &quiet) {
            Ok(()) => Some(Self { saved }),
            Err(err) => {
                debug!(error = %err, "could not disable terminal echo");
                None
            }
        }
    }
}

impl Drop for EchoOff {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, &self.saved);
    }
}

/// Replays fixed answers; for tests and non-interactive callers.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    fn next(&mut self, question: &str) -> String {
        self.asked.push(question.to_string());
        self.answers.pop_front().unwrap_or_default()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String, ProvisionError> {
        Ok(self.next(question).trim().to_string())
    }

    fn ask_secret(&mut self, question: &str) -> Result<Secret, ProvisionError> {
        Ok(Secret::new(self.next(question)))
    }
}

/// Ask for the domain, the Let's Encrypt email, a user and any missing
/// password. Answers are not validated here; empty ones are rejected when
/// the layer is turned into settings.
pub fn fill_missing(
    layer: &mut SettingsLayer,
    prompter: &mut dyn Prompter,
) -> Result<(), ProvisionError> {
    if blank(layer.domain.as_deref()) {
        layer.domain = Some(prompter.ask("Server domain name")?);
    }
    if layer.cert == Some(CertKind::Letsencrypt) && blank(layer.email.as_deref()) {
        layer.email = Some(prompter.ask("Email for Let's Encrypt")?);
    }
    if layer.users.is_empty() {
        let name = prompter.ask("VPN username")?;
        layer.users.push(UserEntry {
            name,
            password: None,
        });
    }
    for user in &mut layer.users {
        if user.password.as_ref().map_or(true, Secret::is_blank) {
            let question = format!("Password for {}", user.name);
            user.password = Some(prompter.ask_secret(&question)?);
        }
    }
    Ok(())
}

fn blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
