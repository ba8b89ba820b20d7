use std::path::PathBuf;

use pretty_assertions::assert_eq;
use ufw_patch_core::{
    apply_blocks, check_blocks, AnchorPoint, BlockOutcome, LinePattern, MissingAnchor, RuleBlock,
    TargetFile,
};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn before_rules() -> TargetFile {
    TargetFile::read(&fixture("fixtures/before.rules")).expect("fixture should load")
}

fn nat() -> RuleBlock {
    RuleBlock::new(
        "nat",
        LinePattern::exact("*nat"),
        AnchorPoint::before(LinePattern::prefix("*filter")),
        [
            "*nat",
            "-A POSTROUTING -s 10.10.10.0/24 -o eth0 -m policy --pol ipsec --dir out -j ACCEPT",
            "-A POSTROUTING -s 10.10.10.0/24 -o eth0 -j MASQUERADE",
            "COMMIT",
            "",
        ],
    )
}

fn forward() -> RuleBlock {
    RuleBlock::new(
        "ipsec-forward",
        LinePattern::contains("-A ufw-before-forward --match policy --pol ipsec --dir in"),
        AnchorPoint::after(LinePattern::contains(":ufw-not-local - [0:0]")),
        [
            "-A ufw-before-forward --match policy --pol ipsec --dir in --proto esp -s 10.10.10.0/24 -j ACCEPT",
            "-A ufw-before-forward --match policy --pol ipsec --dir out --proto esp -d 10.10.10.0/24 -j ACCEPT",
        ],
    )
}

#[test]
fn nat_block_lands_immediately_before_filter() {
    let original = before_rules();
    let filter_at = LinePattern::prefix("*filter")
        .find(&original.lines)
        .expect("fixture has *filter");

    let (patched, report) = apply_blocks(&original, &[nat()], MissingAnchor::Fail).expect("patch");

    let block = nat();
    let start = filter_at;
    assert_eq!(&patched.lines[start..start + block.lines.len()], &block.lines[..]);
    assert_eq!(patched.lines[start + block.lines.len()], "*filter");
    assert_eq!(patched.lines[start - 1], original.lines[filter_at - 1]);
    assert_eq!(
        report.entries[0].outcome,
        BlockOutcome::Inserted {
            at: filter_at,
            len: block.lines.len()
        }
    );
}

#[test]
fn rerun_is_byte_identical() {
    let blocks = [nat(), forward()];
    let (once, _) = apply_blocks(&before_rules(), &blocks, MissingAnchor::Fail).expect("first");
    let (twice, report) = apply_blocks(&once, &blocks, MissingAnchor::Fail).expect("second");

    assert_eq!(once.render(), twice.render());
    assert!(!report.changed());
    assert!(report.inserted.is_empty());
}

#[test]
fn removing_inserted_lines_restores_original() {
    let original = before_rules();
    let (patched, report) =
        apply_blocks(&original, &[nat(), forward()], MissingAnchor::Fail).expect("patch");

    assert_eq!(report.inserted.len(), nat().lines.len() + forward().lines.len());
    assert_eq!(patched.without_lines(&report.inserted), original);
}

#[test]
fn each_marker_appears_exactly_once() {
    let (patched, _) =
        apply_blocks(&before_rules(), &[nat(), forward()], MissingAnchor::Fail).expect("patch");

    for block in [nat(), forward()] {
        assert_eq!(block.marker.count(&patched.lines), 1, "{}", block.name);
    }
}

#[test]
fn forward_rules_follow_not_local_declaration() {
    let (patched, _) =
        apply_blocks(&before_rules(), &[forward()], MissingAnchor::Fail).expect("patch");
    let anchor = LinePattern::contains(":ufw-not-local - [0:0]")
        .find(&patched.lines)
        .expect("anchor");

    assert_eq!(patched.lines[anchor + 1], forward().lines[0]);
    assert_eq!(patched.lines[anchor + 2], forward().lines[1]);
    assert_eq!(patched.lines[anchor + 3], "# End required lines");
}

#[test]
fn existing_block_is_left_alone() {
    let text = "*nat\n-A POSTROUTING -j MASQUERADE\nCOMMIT\n*filter\nCOMMIT\n";
    let original = TargetFile::parse(text);
    let (patched, report) = apply_blocks(&original, &[nat()], MissingAnchor::Fail).expect("patch");

    assert_eq!(patched.render(), text);
    assert_eq!(
        report.entries[0].outcome,
        BlockOutcome::AlreadyPresent { line: 0 }
    );
}

#[test]
fn commented_out_rule_does_not_count_as_present() {
    let text = "*filter\n:ufw-not-local - [0:0]\n# -A ufw-before-forward --match policy --pol ipsec --dir in --proto esp -s 10.10.10.0/24 -j ACCEPT\nCOMMIT\n";
    let original = TargetFile::parse(text);

    assert_eq!(
        check_blocks(&original, &[forward()]),
        vec![("ipsec-forward".to_string(), None)]
    );

    let (patched, report) =
        apply_blocks(&original, &[forward()], MissingAnchor::Fail).expect("patch");
    assert_eq!(
        report.entries[0].outcome,
        BlockOutcome::Inserted { at: 2, len: 2 }
    );
    assert_eq!(patched.lines[2], forward().lines[0]);
    assert!(patched.lines[4].starts_with("# -A ufw-before-forward"));
}
