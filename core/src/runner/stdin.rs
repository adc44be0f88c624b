/// Characters that make shell-style argument passing hazardous; any of them
/// routes the task through stdin instead.
pub const STDIN_SPECIAL_CHARS: &[char] = &['\n', '\\', '"', '\'', '`', '$'];

/// Maximum task length passed inline as an argument.
pub const STDIN_LENGTH_THRESHOLD: usize = 800;

/// Decides whether the task body goes to the child via stdin rather than as
/// a CLI argument.
pub fn should_use_stdin(task_text: &str, piped: bool) -> bool {
    if piped {
        return true;
    }
    if task_text.len() > STDIN_LENGTH_THRESHOLD {
        return true;
    }
    task_text.contains(STDIN_SPECIAL_CHARS)
}

/// Human-readable reasons for the stdin decision, for the log line.
pub fn stdin_reasons(task_text: &str, piped: bool, explicit: bool) -> Vec<&'static str> {
    let mut reasons = Vec::new();
    if piped {
        reasons.push("piped input");
    }
    if explicit {
        reasons.push("explicit \"-\"");
    }
    if task_text.contains('\n') {
        reasons.push("newline");
    }
    if task_text.contains('\\') {
        reasons.push("backslash");
    }
    if task_text.contains('"') {
        reasons.push("double-quote");
    }
    if task_text.contains('\'') {
        reasons.push("single-quote");
    }
    if task_text.contains('`') {
        reasons.push("backtick");
    }
    if task_text.contains('$') {
        reasons.push("dollar");
    }
    if task_text.len() > STDIN_LENGTH_THRESHOLD {
        reasons.push("length>800");
    }
    reasons
}
