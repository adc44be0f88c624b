use std::collections::HashMap;
use std::path::Path;

use crate::config::{env_flag_default_true, WrapperConfig};

pub const MAX_CLAUDE_SETTINGS_BYTES: u64 = 1 << 20;

/// The minimal, validated subset imported from `~/.claude/settings.json`:
/// only string-typed `env` entries and a string `model`.
#[derive(Debug, Clone, Default)]
pub struct MinimalClaudeSettings {
    pub env: HashMap<String, String>,
    pub model: String,
}

/// Reads the minimal settings subset from the user's claude directory.
/// Missing files, oversized files and parse failures all yield the empty
/// settings; errors are never propagated.
pub fn load_minimal_claude_settings() -> MinimalClaudeSettings {
    let Some(home) = dirs::home_dir() else {
        return MinimalClaudeSettings::default();
    };
    load_minimal_claude_settings_in(&home)
}

pub fn load_minimal_claude_settings_in(home: &Path) -> MinimalClaudeSettings {
    let claude_dir = home.join(".claude");
    let setting_path = claude_dir.join("settings.json");
    if !setting_path.starts_with(&claude_dir) {
        return MinimalClaudeSettings::default();
    }

    let Ok(meta) = std::fs::metadata(&setting_path) else {
        return MinimalClaudeSettings::default();
    };
    if meta.len() > MAX_CLAUDE_SETTINGS_BYTES {
        return MinimalClaudeSettings::default();
    }

    let Ok(data) = std::fs::read(&setting_path) else {
        return MinimalClaudeSettings::default();
    };
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&data) else {
        return MinimalClaudeSettings::default();
    };

    let mut out = MinimalClaudeSettings::default();

    if let Some(model) = value.get("model").and_then(|m| m.as_str()) {
        out.model = model.trim().to_string();
    }

    if let Some(env) = value.get("env").and_then(|e| e.as_object()) {
        for (k, v) in env {
            if let Some(s) = v.as_str() {
                out.env.insert(k.clone(), s.to_string());
            }
        }
    }

    out
}

pub(super) fn build_args(cfg: &WrapperConfig, target_arg: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["-p".into()];

    // Skip permission prompts unless CODEAGENT_SKIP_PERMISSIONS=false.
    if cfg.skip_permissions || cfg.yolo || env_flag_default_true("CODEAGENT_SKIP_PERMISSIONS") {
        args.push("--dangerously-skip-permissions".into());
    }

    // Disable all setting sources so a CLAUDE.md or skill cannot re-enter
    // this wrapper recursively.
    args.push("--setting-sources".into());
    args.push(String::new());

    let model = cfg.model.trim();
    if !model.is_empty() {
        args.push("--model".into());
        args.push(model.to_string());
    }

    if cfg.mode == "resume" && !cfg.session_id.is_empty() {
        args.push("-r".into());
        args.push(cfg.session_id.clone());
    }

    args.push("--output-format".into());
    args.push("stream-json".into());
    args.push("--verbose".into());
    args.push(target_arg.to_string());

    args
}
