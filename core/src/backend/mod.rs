//! Backend registry: the closed set of external AI CLIs this wrapper can
//! drive, with their argv and environment conventions.

mod claude;
mod codex;
mod gemini;
mod opencode;

use std::collections::HashMap;

pub use claude::{load_minimal_claude_settings, MinimalClaudeSettings};
pub use gemini::load_gemini_env;

use crate::config::WrapperConfig;
use crate::error::RunnerError;

/// Target argument value meaning "read the task from stdin".
pub const STDIN_SENTINEL: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Codex,
    Claude,
    Gemini,
    Opencode,
}

impl Backend {
    /// Resolves a backend by name. Matching is case-insensitive with
    /// surrounding whitespace ignored; the empty name selects codex.
    pub fn select(name: &str) -> Result<Self, RunnerError> {
        let key = name.trim().to_lowercase();
        match key.as_str() {
            "" | "codex" => Ok(Backend::Codex),
            "claude" => Ok(Backend::Claude),
            "gemini" => Ok(Backend::Gemini),
            "opencode" => Ok(Backend::Opencode),
            _ => Err(RunnerError::UnknownBackend(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Codex => "codex",
            Backend::Claude => "claude",
            Backend::Gemini => "gemini",
            Backend::Opencode => "opencode",
        }
    }

    /// The executable to invoke; assumed to be on PATH.
    pub fn command(&self) -> &'static str {
        self.name()
    }

    /// Builds the argv vector (excluding the command itself). `target_arg`
    /// is the task text, or [`STDIN_SENTINEL`] when stdin mode is in effect.
    pub fn build_args(&self, cfg: &WrapperConfig, target_arg: &str) -> Vec<String> {
        match self {
            Backend::Codex => codex::build_args(cfg, target_arg),
            Backend::Claude => claude::build_args(cfg, target_arg),
            Backend::Gemini => gemini::build_args(cfg, target_arg),
            Backend::Opencode => opencode::build_args(cfg, target_arg),
        }
    }

    /// Environment overlay for endpoint overrides. Backends without
    /// endpoint support return an empty overlay, as do empty inputs.
    pub fn env(&self, base_url: &str, api_key: &str) -> HashMap<String, String> {
        let base_url = base_url.trim();
        let api_key = api_key.trim();
        let mut env = HashMap::new();
        let (url_var, key_var) = match self {
            Backend::Codex => ("OPENAI_BASE_URL", "OPENAI_API_KEY"),
            Backend::Claude => ("ANTHROPIC_BASE_URL", "ANTHROPIC_API_KEY"),
            Backend::Gemini => ("GOOGLE_GEMINI_BASE_URL", "GEMINI_API_KEY"),
            Backend::Opencode => return env,
        };
        if !base_url.is_empty() {
            env.insert(url_var.to_string(), base_url.to_string());
        }
        if !api_key.is_empty() {
            env.insert(key_var.to_string(), api_key.to_string());
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> WrapperConfig {
        WrapperConfig {
            mode: "new".into(),
            workdir: "/work".into(),
            ..Default::default()
        }
    }

    #[test]
    fn select_is_case_insensitive_and_trims() {
        assert_eq!(Backend::select(" Claude ").unwrap(), Backend::Claude);
        assert_eq!(Backend::select("GEMINI").unwrap(), Backend::Gemini);
        assert_eq!(Backend::select("").unwrap(), Backend::Codex);
        assert!(Backend::select("cursor").is_err());
    }

    #[test]
    fn env_overlay_skips_empty_values() {
        let env = Backend::Codex.env("", "");
        assert!(env.is_empty());

        let env = Backend::Claude.env("https://relay", "");
        assert_eq!(env.len(), 1);
        assert_eq!(env["ANTHROPIC_BASE_URL"], "https://relay");

        let env = Backend::Codex.env("https://api", "sk-x");
        assert_eq!(env["OPENAI_BASE_URL"], "https://api");
        assert_eq!(env["OPENAI_API_KEY"], "sk-x");
    }

    #[test]
    fn opencode_has_no_env_overlay() {
        assert!(Backend::Opencode.env("https://x", "key").is_empty());
    }

    #[test]
    fn opencode_args_new_mode() {
        let mut c = cfg();
        c.model = "opencode/grok-code".into();
        let args = Backend::Opencode.build_args(&c, "do it");
        assert_eq!(
            args,
            vec!["run", "-m", "opencode/grok-code", "--format", "json", "do it"]
        );
    }

    #[test]
    fn opencode_args_omit_target_for_stdin() {
        let args = Backend::Opencode.build_args(&cfg(), STDIN_SENTINEL);
        assert_eq!(args, vec!["run", "--format", "json"]);
    }

    #[test]
    fn opencode_args_resume() {
        let mut c = cfg();
        c.mode = "resume".into();
        c.session_id = "S1".into();
        let args = Backend::Opencode.build_args(&c, "next");
        assert_eq!(args, vec!["run", "-s", "S1", "--format", "json", "next"]);
    }
}
