use serde::Serialize;

use crate::pattern::{AnchorPoint, LinePattern};

/// A named stanza of lines that must appear exactly once in a target file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleBlock {
    /// Short identifier used in reports and errors.
    pub name: String,
    /// Pattern that, when any non-comment line matches, means the block is
    /// already present.
    pub marker: LinePattern,
    /// Where the block goes when it is missing.
    pub anchor: AnchorPoint,
    /// Block contents in order.
    pub lines: Vec<String>,
}

impl RuleBlock {
    pub fn new<I, S>(
        name: impl Into<String>,
        marker: LinePattern,
        anchor: AnchorPoint,
        lines: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            marker,
            anchor,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Index of the first active line matching the marker. Comment lines
    /// never count, so a commented-out copy of the block is not "present".
    pub fn position_in(&self, lines: &[String]) -> Option<usize> {
        lines
            .iter()
            .position(|line| !is_comment(line) && self.marker.matches(line))
    }
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::RuleBlock;
    use crate::{AnchorPoint, LinePattern};

    fn forward() -> RuleBlock {
        RuleBlock::new(
            "forward",
            LinePattern::contains("--pol ipsec --dir in"),
            AnchorPoint::after(LinePattern::contains(":ufw-not-local")),
            ["-A ufw-before-forward --match policy --pol ipsec --dir in -j ACCEPT"],
        )
    }

    #[test]
    fn commented_copy_is_not_present() {
        let lines = vec![
            "  # -A ufw-before-forward --match policy --pol ipsec --dir in -j ACCEPT".to_string(),
        ];
        assert_eq!(forward().position_in(&lines), None);
    }

    #[test]
    fn active_copy_after_a_comment_is_found() {
        let lines = vec![
            "# -A ufw-before-forward --match policy --pol ipsec --dir in".to_string(),
            "-A ufw-before-forward --match policy --pol ipsec --dir in -j ACCEPT".to_string(),
        ];
        assert_eq!(forward().position_in(&lines), Some(1));
    }
}
