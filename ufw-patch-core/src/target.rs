use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

/// In-memory contents of a line-oriented config file.
///
/// Lines are stored without their terminators. `trailing_newline` records
/// whether the source text ended with `\n` so that rendering an untouched
/// file reproduces it byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetFile {
    /// File lines in order, without `\n`.
    pub lines: Vec<String>,
    /// Whether the rendered text ends with a newline.
    pub trailing_newline: bool,
}

impl TargetFile {
    /// An empty file, as if the path did not exist yet.
    pub fn empty() -> Self {
        Self {
            lines: Vec::new(),
            trailing_newline: true,
        }
    }

    /// Split text into lines.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::empty();
        }

        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        let lines = body.split('\n').map(ToOwned::to_owned).collect();

        Self {
            lines,
            trailing_newline,
        }
    }

    /// Read a file from disk. A missing file yields [`TargetFile::empty`].
    pub fn read(path: &Path) -> io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::empty()),
            Err(err) => Err(err),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Render back to text.
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Return a copy without the lines at `indices` (positions in `self`).
    pub fn without_lines(&self, indices: &[usize]) -> Self {
        let lines = self
            .lines
            .iter()
            .enumerate()
            .filter(|(idx, _)| !indices.contains(idx))
            .map(|(_, line)| line.clone())
            .collect();
        Self {
            lines,
            trailing_newline: self.trailing_newline,
        }
    }
}

impl Display for TargetFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
