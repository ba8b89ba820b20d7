//! Patch plans for `before.rules` and `sysctl.conf`.
//!
//! A plan is computed entirely in memory so it can be shown as a diff,
//! checked, or written. Nothing touches disk until [`FilePlan::write`].

use std::path::{Path, PathBuf};

use ipnetwork::Ipv4Network;
use serde::Serialize;
use similar::TextDiff;
use tracing::info;
use ufw_patch_core::{
    apply_blocks, apply_toggles, check_blocks, check_toggles, persist, MissingAnchor,
    PatchReport, PersistOptions, PersistOutcome, TargetFile,
};

use crate::error::ProvisionError;
use crate::rules::{before_rules_blocks, sysctl_toggles};

/// The two UFW files touched by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallFiles {
    pub before_rules: PathBuf,
    pub sysctl_conf: PathBuf,
}

/// Routing parameters substituted into the rule blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParams {
    pub subnet: Ipv4Network,
    pub interface: String,
}

/// One file, before and after patching.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub path: PathBuf,
    pub original: TargetFile,
    pub patched: TargetFile,
    pub report: PatchReport,
}

impl FilePlan {
    pub fn changed(&self) -> bool {
        self.original != self.patched
    }

    /// Unified diff between the current and patched content.
    pub fn diff(&self) -> String {
        let old = self.original.render();
        let new = self.patched.render();
        let name = self.path.display().to_string();
        TextDiff::from_lines(&old, &new)
            .unified_diff()
            .context_radius(3)
            .header(&name, &name)
            .to_string()
    }

    pub fn write(&self, backup: bool) -> Result<PersistOutcome, ProvisionError> {
        let outcome = persist(
            &self.path,
            &self.patched,
            PersistOptions {
                backup,
                mode: None,
            },
        )?;
        info!(file = %self.path.display(), outcome = ?outcome, "patched");
        Ok(outcome)
    }
}

/// Result of writing one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub report: PatchReport,
    pub persisted: PersistOutcome,
}

/// Compute the patched content of both files.
///
/// A missing file reads as empty, so its blocks are simply appended.
pub fn plan(
    files: &FirewallFiles,
    route: &RouteParams,
    missing_anchor: MissingAnchor,
) -> Result<Vec<FilePlan>, ProvisionError> {
    let rules = read(&files.before_rules)?;
    let blocks = before_rules_blocks(&route.subnet, &route.interface);
    let (patched, report) =
        apply_blocks(&rules, &blocks, missing_anchor).map_err(|source| ProvisionError::Patch {
            file: files.before_rules.clone(),
            source,
        })?;
    let before_rules = FilePlan {
        path: files.before_rules.clone(),
        original: rules,
        patched,
        report,
    };

    let sysctl = read(&files.sysctl_conf)?;
    let (patched, report) = apply_toggles(&sysctl, &sysctl_toggles());
    let sysctl_conf = FilePlan {
        path: files.sysctl_conf.clone(),
        original: sysctl,
        patched,
        report,
    };

    Ok(vec![before_rules, sysctl_conf])
}

/// Plan and write both files in order, stopping at the first failure.
pub fn apply(
    files: &FirewallFiles,
    route: &RouteParams,
    missing_anchor: MissingAnchor,
    backup: bool,
) -> Result<Vec<FileResult>, ProvisionError> {
    let mut results = Vec::new();
    for file in plan(files, route, missing_anchor)? {
        let persisted = file.write(backup)?;
        results.push(FileResult {
            path: file.path,
            report: file.report,
            persisted,
        });
    }
    Ok(results)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckItem {
    pub name: String,
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheck {
    pub path: PathBuf,
    pub items: Vec<CheckItem>,
}

impl FileCheck {
    pub fn missing(&self) -> usize {
        self.items.iter().filter(|i| !i.present).count()
    }
}

/// Report which blocks and toggles are already in place. Read-only.
pub fn check(files: &FirewallFiles, route: &RouteParams) -> Result<Vec<FileCheck>, ProvisionError> {
    let rules = read(&files.before_rules)?;
    let blocks = before_rules_blocks(&route.subnet, &route.interface);
    let rule_items = check_blocks(&rules, &blocks)
        .into_iter()
        .map(|(name, line)| CheckItem {
            name,
            present: line.is_some(),
            line,
        })
        .collect();

    let sysctl = read(&files.sysctl_conf)?;
    let toggle_items = check_toggles(&sysctl, &sysctl_toggles())
        .into_iter()
        .map(|(name, present)| CheckItem {
            name,
            present,
            line: None,
        })
        .collect();

    Ok(vec![
        FileCheck {
            path: files.before_rules.clone(),
            items: rule_items,
        },
        FileCheck {
            path: files.sysctl_conf.clone(),
            items: toggle_items,
        },
    ])
}

fn read(path: &Path) -> Result<TargetFile, ProvisionError> {
    TargetFile::read(path).map_err(|e| ProvisionError::io(path, e))
}
