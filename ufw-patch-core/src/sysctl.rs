//! Single-line `key=value` toggles, as found in `/etc/ufw/sysctl.conf`.
//!
//! A toggle is the one-line case of a rule block whose anchor is its own
//! commented-out form. Each toggle ends up active exactly once:
//!
//! - `key=value` already active: left alone
//! - `key=other` active: rewritten in place
//! - `#key=value` commented: the `#` is stripped, spacing kept
//! - absent: appended

use serde::Serialize;
use tracing::debug;

use crate::patch::{BlockOutcome, PatchReport, Tracked};
use crate::target::TargetFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SysctlToggle {
    pub key: String,
    pub value: String,
}

impl SysctlToggle {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn line(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

enum LineState<'a> {
    Active { key: &'a str, value: &'a str },
    Commented { key: &'a str, value: &'a str },
    Other,
}

fn classify(line: &str) -> LineState<'_> {
    let trimmed = line.trim_start();
    let (commented, body) = match trimmed.strip_prefix('#') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let Some((key, value)) = body.split_once('=') else {
        return LineState::Other;
    };
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || key.contains(char::is_whitespace) {
        return LineState::Other;
    }
    if commented {
        LineState::Commented { key, value }
    } else {
        LineState::Active { key, value }
    }
}

/// Drop the first `#` and any blanks right after it. Leading indentation and
/// the rest of the line are kept as written.
fn uncomment(line: &str) -> String {
    match line.split_once('#') {
        Some((indent, rest)) => format!("{indent}{}", rest.trim_start()),
        None => line.to_string(),
    }
}

/// Make every toggle active exactly once in `original`.
pub fn apply_toggles(original: &TargetFile, toggles: &[SysctlToggle]) -> (TargetFile, PatchReport) {
    let mut work = Tracked::new(&original.lines);
    let mut report = PatchReport::default();

    for toggle in toggles {
        let name = toggle.line();
        let outcome = apply_one(&mut work, toggle);
        debug!(toggle = %name, ?outcome, "sysctl toggle");
        report.push(&name, outcome);
    }

    let (file, inserted) = work.finish(original);
    report.inserted = inserted;
    (file, report)
}

fn apply_one(work: &mut Tracked, toggle: &SysctlToggle) -> BlockOutcome {
    let mut active = None;
    let mut commented = None;

    for (idx, line) in work.lines.iter().enumerate() {
        match classify(line) {
            LineState::Active { key, value } if key == toggle.key => {
                if value == toggle.value {
                    return BlockOutcome::AlreadyPresent { line: idx };
                }
                active.get_or_insert(idx);
            }
            LineState::Commented { key, value }
                if key == toggle.key && value == toggle.value =>
            {
                commented.get_or_insert(idx);
            }
            _ => {}
        }
    }

    if let Some(idx) = active {
        let previous = std::mem::replace(&mut work.lines[idx], toggle.line());
        return BlockOutcome::Updated {
            line: idx,
            previous,
        };
    }

    if let Some(idx) = commented {
        work.lines[idx] = uncomment(&work.lines[idx]);
        return BlockOutcome::Uncommented { line: idx };
    }

    let at = work.append(&[toggle.line()]);
    BlockOutcome::Appended { at, len: 1 }
}

/// Report which toggles are already active without changing anything.
pub fn check_toggles(original: &TargetFile, toggles: &[SysctlToggle]) -> Vec<(String, bool)> {
    toggles
        .iter()
        .map(|toggle| {
            let active = original.lines.iter().any(|line| {
                matches!(
                    classify(line),
                    LineState::Active { key, value } if key == toggle.key && value == toggle.value
                )
            });
            (toggle.line(), active)
        })
        .collect()
}
