//! Line-diff computation and reverse patching
//!
//! Pure functions over full-text snapshots. Hunks keep the raw prefixed diff
//! lines with their own line endings, so a file whose final line lacks a
//! trailing newline round-trips exactly. Reverse patches are single-hunk
//! unified-diff text applied to the live content; a context mismatch is the
//! gate that stops a stale hunk from corrupting a page.

use similar::{ChangeTag, TextDiff};
use thiserror::Error;

use super::types::{ChangeHunk, FileStats};

/// Context lines kept around each hunk
const HUNK_CONTEXT: usize = 3;

/// Marker emitted after a diff line whose text does not end in a newline
const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Why a reverse patch could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// Patch text is not a well-formed single-hunk patch
    #[error("malformed patch: {0}")]
    Malformed(String),
    /// The content no longer matches the patch's context or removed lines
    #[error("context mismatch at content line {line}")]
    ContextMismatch { line: usize },
    /// The hunk addresses lines beyond the end of the content
    #[error("patch range {start}..{end} exceeds content of {len} lines")]
    OutOfBounds {
        start: usize,
        end: usize,
        len: usize,
    },
}

/// Count added and removed lines between two snapshots
pub fn compute_stats(before: &str, after: &str) -> FileStats {
    let diff = TextDiff::from_lines(before, after);
    let mut stats = FileStats::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.additions += 1,
            ChangeTag::Delete => stats.deletions += 1,
            ChangeTag::Equal => {}
        }
    }
    stats
}

/// Group the line diff into contiguous hunks with stable identifiers
///
/// The id incorporates old/new start offsets plus the hunk index, guarding
/// against collisions when degenerate edits yield identical offsets.
pub fn compute_hunks(path: &str, before: &str, after: &str) -> Vec<ChangeHunk> {
    let diff = TextDiff::from_lines(before, after);
    let mut hunks = Vec::new();

    for (index, group) in diff.grouped_ops(HUNK_CONTEXT).iter().enumerate() {
        let Some(first) = group.first() else {
            continue;
        };
        let old_range_start = first.old_range().start;
        let new_range_start = first.new_range().start;

        let mut old_lines = 0u64;
        let mut new_lines = 0u64;
        let mut lines = Vec::new();
        for op in group {
            for change in diff.iter_changes(op) {
                let prefix = match change.tag() {
                    ChangeTag::Equal => {
                        old_lines += 1;
                        new_lines += 1;
                        ' '
                    }
                    ChangeTag::Delete => {
                        old_lines += 1;
                        '-'
                    }
                    ChangeTag::Insert => {
                        new_lines += 1;
                        '+'
                    }
                };
                let mut line = String::with_capacity(change.value().len() + 1);
                line.push(prefix);
                line.push_str(change.value());
                lines.push(line);
            }
        }

        let old_start = header_start(old_range_start, old_lines);
        let new_start = header_start(new_range_start, new_lines);
        hunks.push(ChangeHunk {
            id: format!("{}:{}:{}:{}", path, old_start, new_start, index),
            old_start,
            old_lines,
            new_start,
            new_lines,
            lines,
        });
    }

    hunks
}

/// Unified-diff header start: 1-based for non-empty ranges, the preceding
/// line number for empty ones.
fn header_start(range_start: usize, count: u64) -> u64 {
    if count == 0 {
        range_start as u64
    } else {
        range_start as u64 + 1
    }
}

/// Build the patch that undoes one hunk when applied to the current
/// (after-state) content: header sides swapped, `+`/`-` prefixes flipped,
/// context untouched.
pub fn build_reverse_patch(hunk: &ChangeHunk) -> String {
    let mut patch = format!(
        "@@ -{},{} +{},{} @@\n",
        hunk.new_start, hunk.new_lines, hunk.old_start, hunk.old_lines
    );
    for line in &hunk.lines {
        let mut chars = line.chars();
        let Some(prefix) = chars.next() else {
            continue;
        };
        let text = chars.as_str();
        let flipped = match prefix {
            '+' => '-',
            '-' => '+',
            _ => ' ',
        };
        patch.push(flipped);
        patch.push_str(text);
        if !text.ends_with('\n') {
            patch.push('\n');
            patch.push_str(NO_NEWLINE_MARKER);
            patch.push('\n');
        }
    }
    patch
}

/// Apply a single-hunk unified-diff patch to text
///
/// Context and removed lines must match the content exactly, line endings
/// included. Returns the patched text or the reason it no longer applies.
pub fn apply_reverse_patch(content: &str, patch: &str) -> Result<String, PatchError> {
    let raw_lines: Vec<&str> = patch.split_inclusive('\n').collect();
    let header = raw_lines
        .first()
        .ok_or_else(|| PatchError::Malformed("empty patch".to_string()))?;
    let (old_start, old_count, new_count) = parse_header(header)?;

    // Collect (prefix, text) ops; a following no-newline marker strips the
    // newline the patch serialization added.
    let mut ops: Vec<(char, String)> = Vec::new();
    for (i, raw) in raw_lines.iter().enumerate().skip(1) {
        if raw.starts_with('\\') {
            continue;
        }
        let mut chars = raw.chars();
        let prefix = chars
            .next()
            .ok_or_else(|| PatchError::Malformed("empty diff line".to_string()))?;
        if !matches!(prefix, ' ' | '+' | '-') {
            return Err(PatchError::Malformed(format!(
                "unexpected diff line prefix '{}'",
                prefix
            )));
        }
        let mut text = chars.as_str().to_string();
        let next_is_marker = raw_lines.get(i + 1).is_some_and(|l| l.starts_with('\\'));
        if next_is_marker && text.ends_with('\n') {
            text.pop();
        }
        ops.push((prefix, text));
    }

    let declared_old = ops.iter().filter(|(p, _)| *p != '+').count() as u64;
    let declared_new = ops.iter().filter(|(p, _)| *p != '-').count() as u64;
    if declared_old != old_count || declared_new != new_count {
        return Err(PatchError::Malformed(
            "hunk body does not match declared counts".to_string(),
        ));
    }
    if old_count > 0 && old_start == 0 {
        return Err(PatchError::Malformed("zero start for non-empty range".to_string()));
    }

    let content_lines: Vec<&str> = content.split_inclusive('\n').collect();
    let start = if old_count == 0 {
        old_start as usize
    } else {
        old_start as usize - 1
    };
    let end = start + old_count as usize;
    if end > content_lines.len() || start > content_lines.len() {
        return Err(PatchError::OutOfBounds {
            start,
            end,
            len: content_lines.len(),
        });
    }

    let mut result = String::with_capacity(content.len());
    for line in &content_lines[..start] {
        result.push_str(line);
    }

    let mut cursor = start;
    for (prefix, text) in &ops {
        match prefix {
            ' ' | '-' => {
                let actual = content_lines[cursor];
                if actual != text {
                    return Err(PatchError::ContextMismatch { line: cursor + 1 });
                }
                if *prefix == ' ' {
                    result.push_str(actual);
                }
                cursor += 1;
            }
            _ => result.push_str(text),
        }
    }

    for line in &content_lines[end..] {
        result.push_str(line);
    }

    Ok(result)
}

fn parse_header(line: &str) -> Result<(u64, u64, u64), PatchError> {
    let malformed = || PatchError::Malformed(format!("bad hunk header: {}", line.trim_end()));
    let rest = line.trim_end().strip_prefix("@@ -").ok_or_else(malformed)?;
    let (old_part, rest) = rest.split_once(" +").ok_or_else(malformed)?;
    let (new_part, _) = rest.split_once(" @@").ok_or_else(malformed)?;

    let parse_side = |side: &str| -> Option<(u64, u64)> {
        match side.split_once(',') {
            Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
            None => Some((side.parse().ok()?, 1)),
        }
    };
    let (old_start, old_count) = parse_side(old_part).ok_or_else(malformed)?;
    let (_, new_count) = parse_side(new_part).ok_or_else(malformed)?;
    Ok((old_start, old_count, new_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Revert every hunk of (before, after) against `after`, bottom-up so
    /// earlier reverts cannot shift later hunk positions.
    fn revert_all_hunks(before: &str, after: &str) -> String {
        let mut hunks = compute_hunks("test.md", before, after);
        hunks.sort_by(|a, b| b.new_start.cmp(&a.new_start));
        let mut text = after.to_string();
        for hunk in &hunks {
            let patch = build_reverse_patch(hunk);
            text = apply_reverse_patch(&text, &patch).unwrap();
        }
        text
    }

    #[test]
    fn test_stats_identical_content() {
        let stats = compute_stats("a\nb\nc\n", "a\nb\nc\n");
        assert_eq!(stats, FileStats::default());
        assert_eq!(compute_stats("", ""), FileStats::default());
    }

    #[test]
    fn test_stats_addition_and_removal() {
        let stats = compute_stats("hello\n", "hello\nworld\n");
        assert_eq!(stats.additions, 1);
        assert_eq!(stats.deletions, 0);

        let stats = compute_stats("a\nb\nc\n", "a\nc\n");
        assert_eq!(stats.additions, 0);
        assert_eq!(stats.deletions, 1);
    }

    #[test]
    fn test_stats_trailing_newline_change_is_real() {
        // "b" and "b\n" are different lines; no phantom empty line appears
        let stats = compute_stats("a\nb", "a\nb\n");
        assert_eq!(stats.additions, 1);
        assert_eq!(stats.deletions, 1);
    }

    #[test]
    fn test_no_hunks_for_identical_content() {
        assert!(compute_hunks("x.md", "same\n", "same\n").is_empty());
        assert!(compute_hunks("x.md", "", "").is_empty());
    }

    #[test]
    fn test_single_hunk_shape() {
        let hunks = compute_hunks("notes.md", "hello\n", "hello\nworld\n");
        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert_eq!(hunk.id, "notes.md:1:1:0");
        assert_eq!(hunk.old_start, 1);
        assert_eq!(hunk.old_lines, 1);
        assert_eq!(hunk.new_start, 1);
        assert_eq!(hunk.new_lines, 2);
        assert_eq!(hunk.lines, vec![" hello\n".to_string(), "+world\n".to_string()]);
    }

    #[test]
    fn test_multiple_hunks_distant_changes() {
        let before = "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk\nl\n";
        let after = "A\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk\nL\n";
        let hunks = compute_hunks("x.md", before, after);
        assert_eq!(hunks.len(), 2);
        assert_ne!(hunks[0].id, hunks[1].id);
        assert!(hunks[0].id.ends_with(":0"));
        assert!(hunks[1].id.ends_with(":1"));
        assert!(hunks[0].new_start < hunks[1].new_start);
    }

    #[test]
    fn test_hunk_counts_match_line_prefixes() {
        let before = "one\ntwo\nthree\nfour\n";
        let after = "one\n2\nthree\nfour\nfive\n";
        for hunk in compute_hunks("x.md", before, after) {
            let old = hunk.lines.iter().filter(|l| !l.starts_with('+')).count() as u64;
            let new = hunk.lines.iter().filter(|l| !l.starts_with('-')).count() as u64;
            assert_eq!(hunk.old_lines, old);
            assert_eq!(hunk.new_lines, new);
        }
    }

    #[test]
    fn test_reverse_patch_round_trip_simple() {
        let before = "hello\n";
        let after = "hello\nworld\n";
        assert_eq!(revert_all_hunks(before, after), before);
    }

    #[test]
    fn test_reverse_patch_round_trip_multi_hunk() {
        let before = "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk\nl\n";
        let after = "A\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk\nL\nextra\n";
        assert_eq!(revert_all_hunks(before, after), before);
    }

    #[test]
    fn test_reverse_patch_round_trip_created_file() {
        let before = "";
        let after = "fresh\ncontent\n";
        assert_eq!(revert_all_hunks(before, after), before);
    }

    #[test]
    fn test_reverse_patch_round_trip_deleted_content() {
        let before = "fresh\ncontent\n";
        let after = "";
        assert_eq!(revert_all_hunks(before, after), before);
    }

    #[test]
    fn test_reverse_patch_round_trip_missing_trailing_newline() {
        let before = "a\nb";
        let after = "a\nb\nc";
        assert_eq!(revert_all_hunks(before, after), before);

        let before = "x\ny";
        let after = "x\n";
        assert_eq!(revert_all_hunks(before, after), before);
    }

    #[test]
    fn test_reverse_patch_conflict_on_divergence() {
        let before = "one\ntwo\nthree\n";
        let after = "one\nTWO\nthree\n";
        let hunks = compute_hunks("x.md", before, after);
        assert_eq!(hunks.len(), 1);
        let patch = build_reverse_patch(&hunks[0]);

        let diverged = "one\nsomething else\nthree\n";
        match apply_reverse_patch(diverged, &patch) {
            Err(PatchError::ContextMismatch { .. }) => {}
            other => panic!("expected context mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_rejects_malformed_patch() {
        assert!(matches!(
            apply_reverse_patch("a\n", "not a patch"),
            Err(PatchError::Malformed(_))
        ));
        assert!(matches!(
            apply_reverse_patch("a\n", "@@ -1,2 +1,1 @@\n a\n"),
            Err(PatchError::Malformed(_))
        ));
    }

    #[test]
    fn test_apply_rejects_out_of_bounds() {
        let patch = "@@ -10,1 +10,1 @@\n-z\n+y\n";
        assert!(matches!(
            apply_reverse_patch("a\n", patch),
            Err(PatchError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_apply_preserves_untouched_regions() {
        let before = "keep\nold\nkeep\ntail\n";
        let after = "keep\nnew\nkeep\ntail\n";
        let hunks = compute_hunks("x.md", before, after);
        let patch = build_reverse_patch(&hunks[0]);
        let restored = apply_reverse_patch(after, &patch).unwrap();
        assert_eq!(restored, before);
    }
}
