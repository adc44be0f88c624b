//! Prompt-file resolution. Reads are confined to `~/.claude` and
//! `~/.codeagent/agents` after symlink resolution; anything else is refused
//! unless the caller explicitly allows outside reads.

use std::path::{Path, PathBuf};

use crate::error::RunnerError;

/// Reads and validates a prompt file. An empty path yields an empty prompt.
pub fn read_agent_prompt_file(path: &str, allow_outside: bool) -> Result<String, RunnerError> {
    let Some(home) = dirs::home_dir() else {
        if allow_outside {
            tracing::warn!("failed to resolve home directory for prompt file validation; proceeding without restriction");
            return read_prompt_contents(Path::new(path.trim()));
        }
        return Err(RunnerError::PromptFile(
            "cannot resolve home directory".to_string(),
        ));
    };
    read_agent_prompt_file_in(path, allow_outside, &home)
}

pub fn read_agent_prompt_file_in(
    path: &str,
    allow_outside: bool,
    home: &Path,
) -> Result<String, RunnerError> {
    let raw = path.trim();
    if raw.is_empty() {
        return Ok(String::new());
    }

    let expanded = expand_home(raw, home);
    let abs_path = absolutize(&expanded);

    let allowed_dirs = [home.join(".claude"), home.join(".codeagent").join("agents")];

    let within_allowed = allowed_dirs.iter().any(|dir| abs_path.starts_with(dir));

    if !allow_outside {
        if !within_allowed {
            tracing::warn!(
                path = %abs_path.display(),
                "refusing to read prompt file outside allowed dirs"
            );
            return Err(RunnerError::PromptFile(
                "prompt file must be under ~/.claude or ~/.codeagent/agents".to_string(),
            ));
        }

        // Re-check after resolving symlinks; a link inside an allowed dir
        // must not escape it.
        if let Ok(resolved) = std::fs::canonicalize(&abs_path) {
            let resolved_allowed: Vec<PathBuf> = allowed_dirs
                .iter()
                .filter_map(|dir| std::fs::canonicalize(dir).ok())
                .collect();
            if !resolved_allowed.is_empty()
                && !resolved_allowed.iter().any(|dir| resolved.starts_with(dir))
            {
                tracing::warn!(
                    path = %resolved.display(),
                    "refusing to read prompt file outside allowed dirs (resolved)"
                );
                return Err(RunnerError::PromptFile(
                    "prompt file must be under ~/.claude or ~/.codeagent/agents".to_string(),
                ));
            }
        }
    } else if !within_allowed {
        tracing::warn!(
            path = %abs_path.display(),
            "reading prompt file outside allowed dirs"
        );
    }

    read_prompt_contents(&abs_path)
}

fn read_prompt_contents(path: &Path) -> Result<String, RunnerError> {
    let data = std::fs::read_to_string(path)
        .map_err(|err| RunnerError::PromptFile(format!("{}: {err}", path.display())))?;
    Ok(data.trim_end_matches(['\r', '\n']).to_string())
}

fn expand_home(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Wraps the task body with the out-of-band agent prompt.
pub fn wrap_task_with_agent_prompt(prompt: &str, task: &str) -> String {
    format!("<agent-prompt>\n{prompt}\n</agent-prompt>\n\n{task}")
}
