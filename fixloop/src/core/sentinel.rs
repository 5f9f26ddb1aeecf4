//! Sentinel detection over executor output.
//!
//! The external executor is expected to print a final status line. Scanning
//! only a trailing window bounds the cost and avoids false positives from a
//! marker quoted inside explanatory prose earlier in the output.

/// Marker printed by stage 2 once tests are on disk.
pub const TESTS_WRITTEN_SENTINEL: &str = "RESULT: TESTS_WRITTEN";

/// Marker printed by stage 3 when the generated tests pass.
pub const PASS_SENTINEL: &str = "RESULT: PASS";

/// Marker printed by stage 3 when the generated tests still fail.
///
/// The fix loop keys on [`PASS_SENTINEL`] only; an explicit FAIL line is
/// treated the same as no sentinel at all.
pub const FAIL_SENTINEL: &str = "RESULT: FAIL";

/// Number of trailing non-empty lines scanned for a sentinel.
const SENTINEL_WINDOW: usize = 3;

/// Returns true if `sentinel` appears as a full, standalone line within the
/// last [`SENTINEL_WINDOW`] non-empty lines of `output`.
///
/// Lines are compared case-insensitively after trimming whitespace on both
/// sides. Substring matches do not count; empty output never matches.
pub fn sentinel_in_output(output: &str, sentinel: &str) -> bool {
    let tail: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = tail.len().saturating_sub(SENTINEL_WINDOW);
    let sentinel = sentinel.trim();
    tail[start..]
        .iter()
        .any(|line| line.eq_ignore_ascii_case(sentinel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_sentinel_on_last_line() {
        let output = "some analysis\nmore text\nRESULT: PASS\n";
        assert!(sentinel_in_output(output, PASS_SENTINEL));
    }

    #[test]
    fn match_is_case_insensitive_and_trimmed() {
        let output = "work done\n  result: pass  \n";
        assert!(sentinel_in_output(output, PASS_SENTINEL));
    }

    #[test]
    fn substring_does_not_match() {
        let output = "the line RESULT: PASS appears mid-sentence here\n";
        assert!(!sentinel_in_output(output, PASS_SENTINEL));
    }

    #[test]
    fn sentinel_outside_window_is_ignored() {
        // Five non-empty lines, sentinel in the 4th-from-end position.
        let output = "one\nRESULT: PASS\nthree\nfour\nfive\n";
        assert!(!sentinel_in_output(output, PASS_SENTINEL));
    }

    #[test]
    fn blank_lines_do_not_consume_the_window() {
        // Only non-empty lines count toward the trailing window.
        let output = "RESULT: TESTS_WRITTEN\n\n\n\nextra\ntail\n";
        assert!(sentinel_in_output(output, TESTS_WRITTEN_SENTINEL));
    }

    #[test]
    fn short_output_scans_all_lines() {
        assert!(sentinel_in_output("RESULT: FAIL\n", FAIL_SENTINEL));
        assert!(sentinel_in_output("RESULT: FAIL\nmore\n", FAIL_SENTINEL));
    }

    #[test]
    fn empty_output_never_matches() {
        assert!(!sentinel_in_output("", PASS_SENTINEL));
        assert!(!sentinel_in_output("\n\n", PASS_SENTINEL));
    }

    #[test]
    fn wrong_sentinel_does_not_match() {
        let output = "done\nRESULT: FAIL\n";
        assert!(!sentinel_in_output(output, PASS_SENTINEL));
    }
}
