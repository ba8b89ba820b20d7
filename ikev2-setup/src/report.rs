use colored::Colorize;
use ufw_patch_core::{BlockOutcome, PatchReport, PersistOutcome};

use crate::firewall::{FileCheck, FileResult, FilePlan};
use crate::provision::ProvisionSummary;

/// Render one patch outcome as a short word plus location.
pub fn describe_outcome(outcome: &BlockOutcome) -> String {
    match outcome {
        BlockOutcome::AlreadyPresent { line } => format!("present (line {})", line + 1),
        BlockOutcome::Inserted { at, len } => format!("inserted {len} lines at {}", at + 1),
        BlockOutcome::Appended { at, len } => format!("appended {len} lines at {}", at + 1),
        BlockOutcome::Uncommented { line } => format!("uncommented line {}", line + 1),
        BlockOutcome::Updated { line, previous } => {
            format!("updated line {} (was '{previous}')", line + 1)
        }
    }
}

fn outcome_line(name: &str, outcome: &BlockOutcome) -> String {
    let text = format!("  {name}: {}", describe_outcome(outcome));
    if outcome.is_change() {
        text.green().to_string()
    } else {
        text.dimmed().to_string()
    }
}

fn report_lines(report: &PatchReport, out: &mut Vec<String>) {
    for entry in &report.entries {
        out.push(outcome_line(&entry.name, &entry.outcome));
    }
}

fn persisted_line(outcome: &PersistOutcome) -> String {
    match outcome {
        PersistOutcome::Unchanged => "  unchanged, not written".dimmed().to_string(),
        PersistOutcome::Written { backup: Some(backup) } => {
            format!("  written, backup at {}", backup.display())
        }
        PersistOutcome::Written { backup: None } => "  written".to_string(),
    }
}

/// Text for `patch` after writing.
pub fn render_results(results: &[FileResult]) -> String {
    let mut out = Vec::new();
    for result in results {
        out.push(result.path.display().to_string().bold().to_string());
        report_lines(&result.report, &mut out);
        out.push(persisted_line(&result.persisted));
    }
    out.join("\n")
}

/// Text for `patch --dry-run`: outcomes followed by a diff per changed file.
pub fn render_plans(plans: &[FilePlan]) -> String {
    let mut out = Vec::new();
    for plan in plans {
        out.push(plan.path.display().to_string().bold().to_string());
        report_lines(&plan.report, &mut out);
        if plan.changed() {
            out.push(pending_line(&plan.report));
            out.push(colorize_diff(&plan.diff()));
        } else {
            out.push("  no changes".dimmed().to_string());
        }
    }
    out.join("\n")
}

fn pending_line(report: &PatchReport) -> String {
    let names: Vec<_> = report.pending().map(|e| e.name.as_str()).collect();
    format!("  {} pending: {}", names.len(), names.join(", "))
        .yellow()
        .to_string()
}

fn colorize_diff(diff: &str) -> String {
    diff.lines()
        .map(|line| {
            if line.starts_with("+++") || line.starts_with("---") {
                line.bold().to_string()
            } else if line.starts_with('+') {
                line.green().to_string()
            } else if line.starts_with('-') {
                line.red().to_string()
            } else if line.starts_with("@@") {
                line.cyan().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text for `check`.
pub fn render_checks(checks: &[FileCheck]) -> String {
    let mut out = Vec::new();
    let mut missing = 0;
    for check in checks {
        out.push(check.path.display().to_string().bold().to_string());
        for item in &check.items {
            let line = match (item.present, item.line) {
                (true, Some(line)) => format!("  present  {} (line {})", item.name, line + 1)
                    .green()
                    .to_string(),
                (true, None) => format!("  present  {}", item.name).green().to_string(),
                (false, _) => format!("  missing  {}", item.name).yellow().to_string(),
            };
            out.push(line);
        }
        missing += check.missing();
    }
    out.push(format!("result missing={missing}").cyan().to_string());
    out.join("\n")
}

/// Text for a finished provisioning run. Contains no credentials.
pub fn render_summary(summary: &ProvisionSummary) -> String {
    let mut out = vec![
        "IKEv2 VPN server ready".green().bold().to_string(),
        format!("domain:      {}", summary.domain),
        format!("certificate: {} ({})", summary.cert_mode, summary.certs.server_cert.display()),
    ];
    if let Some(ca) = &summary.certs.ca_cert {
        out.push(format!("client CA:   {}", ca.display()));
    }
    out.push(format!("interface:   {}", summary.interface));
    out.push(format!("users:       {}", summary.users.join(", ")));

    for file in &summary.config_files {
        out.push(file.path.display().to_string().bold().to_string());
        out.push(persisted_line(&file.persisted));
    }
    for result in &summary.firewall {
        out.push(result.path.display().to_string().bold().to_string());
        report_lines(&result.report, &mut out);
        out.push(persisted_line(&result.persisted));
    }

    let backups = summary.backups();
    if !backups.is_empty() {
        out.push("backups:".bold().to_string());
        out.extend(backups.iter().map(|b| format!("  {}", b.display())));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ufw_patch_core::PatchEntry;

    #[test]
    fn pending_line_names_only_changed_entries() {
        colored::control::set_override(false);
        let report = PatchReport {
            entries: vec![
                PatchEntry {
                    name: "nat".to_string(),
                    outcome: BlockOutcome::AlreadyPresent { line: 0 },
                },
                PatchEntry {
                    name: "ipsec-forward".to_string(),
                    outcome: BlockOutcome::Inserted { at: 12, len: 2 },
                },
            ],
            inserted: vec![12, 13],
        };
        assert_eq!(pending_line(&report), "  1 pending: ipsec-forward");
    }

    #[test]
    fn outcomes_use_one_based_lines() {
        assert_eq!(
            describe_outcome(&BlockOutcome::Inserted { at: 0, len: 5 }),
            "inserted 5 lines at 1"
        );
        assert_eq!(
            describe_outcome(&BlockOutcome::Updated {
                line: 3,
                previous: "net/ipv4/ip_forward=0".to_string()
            }),
            "updated line 4 (was 'net/ipv4/ip_forward=0')"
        );
    }
}
