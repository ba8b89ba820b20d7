use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::block::RuleBlock;
use crate::pattern::AnchorPoint;
use crate::target::TargetFile;

/// What to do with a missing block whose anchor line cannot be found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAnchor {
    /// Return [`PatchError::AnchorNotFound`] and leave the file alone.
    #[default]
    Fail,
    /// Append the block at the end of the file and log a warning.
    Append,
}

/// Errors that can occur while patching an in-memory file.
#[derive(Debug, Error)]
pub enum PatchError {
    /// A missing block has no anchor line to attach to.
    #[error("cannot place block '{block}': no anchor line ({anchor})")]
    AnchorNotFound { block: String, anchor: AnchorPoint },
}

/// Result of applying one block or toggle.
///
/// Line indices refer to the file as it was at the moment of the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BlockOutcome {
    /// Marker already matched at `line`; nothing changed.
    AlreadyPresent { line: usize },
    /// `len` lines spliced in at `at` next to the anchor.
    Inserted { at: usize, len: usize },
    /// `len` lines added at the end of the file starting at `at`.
    Appended { at: usize, len: usize },
    /// Commented-out line at `line` was re-enabled.
    Uncommented { line: usize },
    /// Active line at `line` had a different value, now replaced.
    Updated { line: usize, previous: String },
}

impl BlockOutcome {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::AlreadyPresent { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchEntry {
    pub name: String,
    pub outcome: BlockOutcome,
}

/// Per-block outcomes of one patch call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    pub entries: Vec<PatchEntry>,
    /// Indices, in the patched file, of every line that was added.
    pub inserted: Vec<usize>,
}

impl PatchReport {
    pub fn changed(&self) -> bool {
        self.entries.iter().any(|e| e.outcome.is_change())
    }

    /// Entries that changed the file, in the order they were applied.
    pub fn pending(&self) -> impl Iterator<Item = &PatchEntry> {
        self.entries.iter().filter(|e| e.outcome.is_change())
    }

    pub(crate) fn push(&mut self, name: &str, outcome: BlockOutcome) {
        self.entries.push(PatchEntry {
            name: name.to_string(),
            outcome,
        });
    }
}

/// Working copy of a file that remembers which lines are new.
pub(crate) struct Tracked {
    pub(crate) lines: Vec<String>,
    added: Vec<bool>,
}

impl Tracked {
    pub(crate) fn new(lines: &[String]) -> Self {
        Self {
            lines: lines.to_vec(),
            added: vec![false; lines.len()],
        }
    }

    pub(crate) fn splice(&mut self, at: usize, new_lines: &[String]) {
        self.lines.splice(at..at, new_lines.iter().cloned());
        self.added
            .splice(at..at, std::iter::repeat(true).take(new_lines.len()));
    }

    pub(crate) fn append(&mut self, new_lines: &[String]) -> usize {
        let at = self.lines.len();
        self.splice(at, new_lines);
        at
    }

    pub(crate) fn finish(self, original: &TargetFile) -> (TargetFile, Vec<usize>) {
        let inserted = self
            .added
            .iter()
            .enumerate()
            .filter(|(_, added)| **added)
            .map(|(idx, _)| idx)
            .collect();
        let file = TargetFile {
            lines: self.lines,
            trailing_newline: original.trailing_newline || original.is_empty(),
        };
        (file, inserted)
    }
}

/// Insert every missing block into `original`.
///
/// Blocks are handled in order. A block whose marker already matches an
/// active, non-comment line (including lines inserted earlier in the same
/// call) is skipped. An empty
/// `original` is treated as a file that does not exist yet: missing blocks
/// are appended in order without looking for anchors.
pub fn apply_blocks(
    original: &TargetFile,
    blocks: &[RuleBlock],
    missing_anchor: MissingAnchor,
) -> Result<(TargetFile, PatchReport), PatchError> {
    let synthesize = original.is_empty();
    let mut work = Tracked::new(&original.lines);
    let mut report = PatchReport::default();

    for block in blocks {
        if let Some(line) = block.position_in(&work.lines) {
            debug!(block = %block.name, line, "block already present");
            report.push(&block.name, BlockOutcome::AlreadyPresent { line });
            continue;
        }

        let len = block.lines.len();
        if synthesize {
            let at = work.append(&block.lines);
            report.push(&block.name, BlockOutcome::Appended { at, len });
            continue;
        }

        match block.anchor.insertion_index(&work.lines) {
            Some(at) => {
                debug!(block = %block.name, at, "inserting block");
                work.splice(at, &block.lines);
                report.push(&block.name, BlockOutcome::Inserted { at, len });
            }
            None => match missing_anchor {
                MissingAnchor::Fail => {
                    return Err(PatchError::AnchorNotFound {
                        block: block.name.clone(),
                        anchor: block.anchor.clone(),
                    });
                }
                MissingAnchor::Append => {
                    warn!(
                        block = %block.name,
                        anchor = %block.anchor,
                        "anchor not found, appending block at end of file"
                    );
                    let at = work.append(&block.lines);
                    report.push(&block.name, BlockOutcome::Appended { at, len });
                }
            },
        }
    }

    let (file, inserted) = work.finish(original);
    report.inserted = inserted;
    Ok((file, report))
}

/// Report which blocks are present without changing anything.
pub fn check_blocks(original: &TargetFile, blocks: &[RuleBlock]) -> Vec<(String, Option<usize>)> {
    blocks
        .iter()
        .map(|block| (block.name.clone(), block.position_in(&original.lines)))
        .collect()
}
