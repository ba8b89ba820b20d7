use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// How a single line is matched against a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum LinePattern {
    /// Whitespace-trimmed line equals the text.
    Exact(String),
    /// Line, with leading whitespace removed, starts with the text.
    Prefix(String),
    /// Line contains the text anywhere.
    Contains(String),
}

impl LinePattern {
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    pub fn prefix(text: impl Into<String>) -> Self {
        Self::Prefix(text.into())
    }

    pub fn contains(text: impl Into<String>) -> Self {
        Self::Contains(text.into())
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Exact(text) => line.trim() == text,
            Self::Prefix(text) => line.trim_start().starts_with(text.as_str()),
            Self::Contains(text) => line.contains(text.as_str()),
        }
    }

    /// Index of the first matching line.
    pub fn find(&self, lines: &[String]) -> Option<usize> {
        lines.iter().position(|line| self.matches(line))
    }

    /// Number of matching lines.
    pub fn count(&self, lines: &[String]) -> usize {
        lines.iter().filter(|line| self.matches(line)).count()
    }
}

impl Display for LinePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(text) => write!(f, "line == {text:?}"),
            Self::Prefix(text) => write!(f, "line starts with {text:?}"),
            Self::Contains(text) => write!(f, "line contains {text:?}"),
        }
    }
}

/// Which side of the anchor line a block goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertSide {
    Before,
    After,
}

/// Line used to locate where a block is inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorPoint {
    pub pattern: LinePattern,
    pub side: InsertSide,
}

impl AnchorPoint {
    pub fn before(pattern: LinePattern) -> Self {
        Self {
            pattern,
            side: InsertSide::Before,
        }
    }

    pub fn after(pattern: LinePattern) -> Self {
        Self {
            pattern,
            side: InsertSide::After,
        }
    }

    /// Position at which block lines are spliced in, if the anchor exists.
    pub fn insertion_index(&self, lines: &[String]) -> Option<usize> {
        let anchor = self.pattern.find(lines)?;
        Some(match self.side {
            InsertSide::Before => anchor,
            InsertSide::After => anchor + 1,
        })
    }
}

impl Display for AnchorPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            InsertSide::Before => "before",
            InsertSide::After => "after",
        };
        write!(f, "{side} first {}", self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::{AnchorPoint, LinePattern};

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_ignores_surrounding_whitespace() {
        assert!(LinePattern::exact("*nat").matches("  *nat \t"));
        assert!(!LinePattern::exact("*nat").matches("*nat extra"));
    }

    #[test]
    fn prefix_requires_line_start() {
        let p = LinePattern::prefix("*filter");
        assert!(p.matches("*filter"));
        assert!(!p.matches("# *filter is below"));
    }

    #[test]
    fn after_anchor_points_past_the_match() {
        let file = lines(&["a", ":ufw-not-local - [0:0]", "b"]);
        let anchor = AnchorPoint::after(LinePattern::contains(":ufw-not-local - [0:0]"));
        assert_eq!(anchor.insertion_index(&file), Some(2));
    }
}
