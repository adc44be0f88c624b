//! Advisory report extraction: scans the final assistant message for
//! coverage tokens, changed files and test counts. Signals only; nothing
//! here influences exit codes.

use std::sync::OnceLock;

use regex::Regex;

use crate::executor::types::TaskResult;
use crate::util::{safe_truncate, sanitize_output};

const KEY_OUTPUT_MAX_LINES: usize = 150;
const FILES_CHANGED_CAP: usize = 20;

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)%").unwrap())
}

fn tests_passed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s+(?:tests?\s+)?pass(?:ed|ing)").unwrap())
}

fn tests_failed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s+(?:tests?\s+)?fail(?:ed|ing)").unwrap())
}

/// Fills the advisory fields of a result from its message.
pub fn populate_report_fields(result: &mut TaskResult) {
    if result.message.is_empty() {
        return;
    }
    let clean = sanitize_output(&result.message);
    let lines: Vec<&str> = clean.lines().collect();

    result.coverage = extract_coverage_from_lines(&lines);
    result.coverage_num = extract_coverage_num(&result.coverage);
    result.files_changed = extract_files_changed_from_lines(&lines);
    let (passed, failed) = extract_test_results_from_lines(&lines);
    result.tests_passed = passed;
    result.tests_failed = failed;
    result.key_output = extract_key_output_from_lines(&lines, KEY_OUTPUT_MAX_LINES);
}

/// First percentage token on a line that talks about coverage.
pub fn extract_coverage_from_lines(lines: &[&str]) -> String {
    for line in lines {
        let lower = line.to_lowercase();
        if !lower.contains("coverage") && !lower.contains("covered") {
            continue;
        }
        if let Some(caps) = percent_re().captures(line) {
            return format!("{}%", &caps[1]);
        }
    }
    String::new()
}

pub fn extract_coverage_num(coverage: &str) -> f64 {
    coverage
        .trim_end_matches('%')
        .parse::<f64>()
        .unwrap_or(0.0)
}

/// Changed-file paths from `modified:`-style markers and diff headers.
pub fn extract_files_changed_from_lines(lines: &[&str]) -> Vec<String> {
    const MARKERS: &[&str] = &["modified:", "created:", "updated:", "deleted:", "changed:"];

    let mut files = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();

        let mut path = None;
        for marker in MARKERS {
            if let Some(rest) = lower.strip_prefix(marker) {
                let start = trimmed.len() - rest.len();
                path = Some(trimmed[start..].trim().to_string());
                break;
            }
        }
        if path.is_none() {
            if let Some(rest) = trimmed.strip_prefix("+++ b/") {
                path = Some(rest.trim().to_string());
            }
        }

        if let Some(path) = path {
            if !path.is_empty() && !files.contains(&path) {
                files.push(path);
                if files.len() == FILES_CHANGED_CAP {
                    break;
                }
            }
        }
    }
    files
}

/// Last reported pass/fail counters.
pub fn extract_test_results_from_lines(lines: &[&str]) -> (u32, u32) {
    let mut passed = 0;
    let mut failed = 0;
    for line in lines {
        if let Some(caps) = tests_passed_re().captures(line) {
            passed = caps[1].parse().unwrap_or(passed);
        }
        if let Some(caps) = tests_failed_re().captures(line) {
            failed = caps[1].parse().unwrap_or(failed);
        }
    }
    (passed, failed)
}

/// Bounded tail of non-empty lines, newest last.
pub fn extract_key_output_from_lines(lines: &[&str], max_lines: usize) -> String {
    let meaningful: Vec<&str> = lines
        .iter()
        .map(|l| l.trim_end())
        .filter(|l| !l.trim().is_empty())
        .collect();
    let skip = meaningful.len().saturating_sub(max_lines);
    meaningful[skip..].join("\n")
}

/// Condenses failure context out of a message for the `error` field:
/// lines that look like errors, with stack-frame runs collapsed, falling
/// back to the message tail.
pub fn extract_error_detail(message: &str, max_len: usize) -> String {
    if message.is_empty() || max_len == 0 {
        return String::new();
    }

    const SIGNALS: &[&str] = &[
        "error", "fail", "exception", "assert", "expected", "timeout", "not found", "cannot",
        "undefined",
    ];

    let lines: Vec<&str> = message.lines().collect();
    let mut error_lines: Vec<&str> = Vec::new();

    for line in &lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();

        // Collapse stack traces: keep only the first "at ..." frame of a run.
        if line.starts_with("at ") && line.contains('(') {
            if let Some(last) = error_lines.last() {
                if last.to_lowercase().starts_with("at ") {
                    continue;
                }
            }
        }

        if SIGNALS.iter().any(|s| lower.contains(s)) || line.starts_with("FAIL") {
            error_lines.push(line);
        }
    }

    if error_lines.is_empty() {
        let start = lines.len().saturating_sub(5);
        for line in &lines[start..] {
            let line = line.trim();
            if !line.is_empty() {
                error_lines.push(line);
            }
        }
    }

    safe_truncate(&error_lines.join(" | "), max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_token_extracted_from_coverage_line() {
        let lines = vec!["all done", "Line coverage: 92% of statements", "bye"];
        assert_eq!(extract_coverage_from_lines(&lines), "92%");
        assert_eq!(extract_coverage_num("92%"), 92.0);
    }

    #[test]
    fn coverage_ignores_unrelated_percentages() {
        let lines = vec!["progress 50% done", "no tests here"];
        assert_eq!(extract_coverage_from_lines(&lines), "");
        assert_eq!(extract_coverage_num(""), 0.0);
    }

    #[test]
    fn fractional_coverage_parses() {
        let lines = vec!["coverage: 87.5%"];
        assert_eq!(extract_coverage_from_lines(&lines), "87.5%");
        assert_eq!(extract_coverage_num("87.5%"), 87.5);
    }

    #[test]
    fn files_changed_from_markers_and_diff_headers() {
        let lines = vec![
            "Modified: src/lib.rs",
            "created: tests/new.rs",
            "+++ b/src/main.rs",
            "Modified: src/lib.rs",
            "nothing here",
        ];
        assert_eq!(
            extract_files_changed_from_lines(&lines),
            vec!["src/lib.rs", "tests/new.rs", "src/main.rs"]
        );
    }

    #[test]
    fn test_counts_take_last_report() {
        let lines = vec!["10 passed, 2 failed", "rerun:", "12 passed, 0 failed"];
        assert_eq!(extract_test_results_from_lines(&lines), (12, 0));
    }

    #[test]
    fn test_counts_match_wordy_forms() {
        let lines = vec!["7 tests passed", "1 test failed"];
        assert_eq!(extract_test_results_from_lines(&lines), (7, 1));
    }

    #[test]
    fn key_output_keeps_bounded_tail() {
        let many: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let out = extract_key_output_from_lines(&refs, 150);
        assert_eq!(out.lines().count(), 150);
        assert!(out.starts_with("line 50"));
        assert!(out.ends_with("line 199"));
    }

    #[test]
    fn key_output_drops_blank_lines() {
        let lines = vec!["a", "", "  ", "b"];
        assert_eq!(extract_key_output_from_lines(&lines, 150), "a\nb");
    }

    #[test]
    fn error_detail_prefers_signal_lines() {
        let msg = "starting\nError: connection refused\nat foo (bar.js:1)\nat baz (qux.js:2)\ndone";
        let detail = extract_error_detail(msg, 200);
        assert!(detail.contains("connection refused"));
        // Stack frames after the first are collapsed.
        assert!(!detail.contains("qux.js"));
    }

    #[test]
    fn error_detail_falls_back_to_tail() {
        let msg = "alpha\nbeta\ngamma";
        let detail = extract_error_detail(msg, 200);
        assert_eq!(detail, "alpha | beta | gamma");
    }

    #[test]
    fn populate_fills_all_advisory_fields() {
        let mut result = TaskResult {
            task_id: "t".into(),
            message: "coverage: 90%\nmodified: a.rs\n3 passed, 1 failed\ntail".into(),
            ..Default::default()
        };
        populate_report_fields(&mut result);
        assert_eq!(result.coverage, "90%");
        assert_eq!(result.coverage_num, 90.0);
        assert_eq!(result.files_changed, vec!["a.rs"]);
        assert_eq!(result.tests_passed, 3);
        assert_eq!(result.tests_failed, 1);
        assert!(result.key_output.contains("tail"));
    }
}
