//! Idempotent patching of line-oriented configuration files.
//!
//! A [`RuleBlock`] is inserted next to the first line matching its
//! [`AnchorPoint`] unless a line matching its detection marker already
//! exists. [`SysctlToggle`]s cover the single-line `key=value` case. All
//! transformations work on an in-memory [`TargetFile`]; [`persist`] writes
//! the result back with a timestamped backup and an atomic rename.

pub mod block;
pub mod patch;
pub mod pattern;
pub mod persist;
pub mod sysctl;
pub mod target;

pub use block::RuleBlock;
pub use patch::{
    apply_blocks, check_blocks, BlockOutcome, MissingAnchor, PatchEntry, PatchError, PatchReport,
};
pub use pattern::{AnchorPoint, InsertSide, LinePattern};
pub use persist::{
    backup_file, persist, write_atomic, write_secret_file, PersistError, PersistOptions,
    PersistOutcome,
};
pub use sysctl::{apply_toggles, check_toggles, SysctlToggle};
pub use target::TargetFile;
