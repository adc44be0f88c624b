//! Settings resolution: explicit flag > `CODEAGENT_*` environment variable >
//! config file > agent preset > built-in default.

use serde::Deserialize;

use codeagent_core::api::{
    parse_bool_flag, resolve_agent_config, validate_agent_name, AgentResolution, CliError,
};

use crate::cli::{last_flag_index, Args};

fn usage(msg: impl Into<String>) -> CliError {
    CliError::Usage(msg.into())
}

pub const DEFAULT_BACKEND: &str = "codex";
pub const DEFAULT_WORKDIR: &str = ".";

/// Subset of `~/.codeagent/config.toml` the wrapper understands.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileConfig {
    pub backend: Option<String>,
    pub model: Option<String>,
    #[serde(alias = "reasoning-effort")]
    pub reasoning_effort: Option<String>,
    pub agent: Option<String>,
    #[serde(alias = "prompt-file")]
    pub prompt_file: Option<String>,
    #[serde(alias = "skip-permissions")]
    pub skip_permissions: Option<bool>,
    #[serde(alias = "full-output")]
    pub full_output: Option<bool>,
}

/// Loads the config file. An explicitly named file must parse; the default
/// location is optional.
pub fn load_file_config(explicit: Option<&str>) -> Result<FileConfig, CliError> {
    let (path, required) = match explicit {
        Some(p) if !p.trim().is_empty() => (std::path::PathBuf::from(p.trim()), true),
        _ => {
            let Some(home) = dirs::home_dir() else {
                return Ok(FileConfig::default());
            };
            (home.join(".codeagent").join("config.toml"), false)
        }
    };

    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(FileConfig::default())
        }
        Err(err) => {
            return Err(CliError::Config(format!(
                "failed to read config {}: {err}",
                path.display()
            )))
        }
    };

    toml::from_str(&data).map_err(|err| {
        CliError::Config(format!("failed to parse config {}: {err}", path.display()))
    })
}

/// Environment variable for a settings key: `backend` -> `CODEAGENT_BACKEND`,
/// `skip-permissions` -> `CODEAGENT_SKIP_PERMISSIONS`.
pub fn env_setting(key: &str) -> Option<String> {
    let var = format!("CODEAGENT_{}", key.to_uppercase().replace('-', "_"));
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fully resolved single-task invocation.
#[derive(Debug, Default, Clone)]
pub struct ResolvedSettings {
    pub backend: String,
    pub model: String,
    pub reasoning_effort: String,
    pub agent: String,
    pub prompt_file: String,
    pub prompt_file_explicit: bool,
    pub skip_permissions: bool,
    pub yolo: bool,

    pub mode: String,
    pub task: String,
    pub session_id: String,
    pub workdir: String,
    pub explicit_stdin: bool,
}

/// Implements the precedence table plus the position-aware rule: when both
/// `--agent` and an overlapping flag appear, the later token on the command
/// line wins.
pub fn resolve_settings(
    args: &Args,
    raw_argv: &[String],
    file: &FileConfig,
    positionals: &[String],
) -> Result<ResolvedSettings, CliError> {
    let agent_flag = args.agent.is_some();
    let agent = if let Some(value) = &args.agent {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(usage("--agent flag requires a value"));
        }
        validate_agent_name(&value).map_err(|e| usage(format!("--agent flag invalid value: {e}")))?;
        value
    } else {
        let value = env_setting("agent")
            .or_else(|| file.agent.clone())
            .unwrap_or_default()
            .trim()
            .to_string();
        if !value.is_empty() {
            validate_agent_name(&value).map_err(|e| usage(format!("--agent flag invalid value: {e}")))?;
        }
        value
    };

    let preset: AgentResolution = if agent.is_empty() {
        AgentResolution::default()
    } else {
        resolve_agent_config(&agent)
    };

    let mut out = ResolvedSettings {
        agent: agent.clone(),
        yolo: preset.yolo,
        workdir: DEFAULT_WORKDIR.to_string(),
        ..Default::default()
    };

    // prompt file
    if let Some(value) = &args.prompt_file {
        let value = value.trim();
        if value.is_empty() {
            return Err(usage("--prompt-file flag requires a value"));
        }
        out.prompt_file = value.to_string();
        out.prompt_file_explicit = true;
    } else if let Some(value) = env_setting("prompt-file").or_else(|| file.prompt_file.clone()) {
        let value = value.trim();
        if !value.is_empty() {
            out.prompt_file = value.to_string();
            out.prompt_file_explicit = true;
        }
    }
    if out.prompt_file.is_empty() {
        out.prompt_file = preset.prompt_file.clone();
    }

    // backend
    let backend_flag = args.backend.is_some();
    let mut backend = DEFAULT_BACKEND.to_string();
    if backend_flag {
        backend = args
            .backend
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string();
        if backend.is_empty() {
            return Err(usage("--backend flag requires a value"));
        }
    }
    if agent_flag
        && backend_flag
        && last_flag_index(raw_argv, "agent") > last_flag_index(raw_argv, "backend")
    {
        backend = preset.backend.clone();
    } else if !backend_flag && !agent.is_empty() {
        backend = preset.backend.clone();
    } else if !backend_flag {
        if let Some(value) = env_setting("backend").or_else(|| file.backend.clone()) {
            let value = value.trim();
            if !value.is_empty() {
                backend = value.to_string();
            }
        }
    }
    out.backend = backend;

    // model
    let model_flag = args.model.is_some();
    let mut model = String::new();
    if model_flag {
        model = args.model.as_deref().unwrap_or_default().trim().to_string();
        if model.is_empty() {
            return Err(usage("--model flag requires a value"));
        }
    }
    if agent_flag
        && model_flag
        && last_flag_index(raw_argv, "agent") > last_flag_index(raw_argv, "model")
    {
        model = preset.model.trim().to_string();
    } else if !model_flag && !agent.is_empty() {
        model = preset.model.trim().to_string();
    } else if !model_flag {
        model = env_setting("model")
            .or_else(|| file.model.clone())
            .unwrap_or_default()
            .trim()
            .to_string();
    }
    out.model = model;

    // reasoning effort
    if let Some(value) = &args.reasoning_effort {
        let value = value.trim();
        if value.is_empty() {
            return Err(usage("--reasoning-effort flag requires a value"));
        }
        out.reasoning_effort = value.to_string();
    } else if let Some(value) =
        env_setting("reasoning-effort").or_else(|| file.reasoning_effort.clone())
    {
        out.reasoning_effort = value.trim().to_string();
    } else if !agent.is_empty() {
        out.reasoning_effort = preset.reasoning.trim().to_string();
    }

    // skip permissions
    out.skip_permissions = if args.skip_permissions {
        true
    } else if let Some(value) = env_setting("skip-permissions") {
        parse_bool_flag(&value, false)
    } else {
        file.skip_permissions.unwrap_or(false)
    };

    // positionals: <task> [workdir] or resume <session_id> <task> [workdir]
    if positionals.is_empty() {
        return Err(usage("task required"));
    }

    if positionals[0] == "resume" {
        if positionals.len() < 3 {
            return Err(usage("resume mode requires: resume <session_id> <task>"));
        }
        out.mode = "resume".to_string();
        out.session_id = positionals[1].trim().to_string();
        if out.session_id.is_empty() {
            return Err(usage("resume mode requires non-empty session_id"));
        }
        out.task = positionals[2].clone();
        out.explicit_stdin = positionals[2] == "-";
        if let Some(workdir) = positionals.get(3) {
            if workdir == "-" {
                return Err(usage("invalid workdir: '-' is not a valid directory path"));
            }
            out.workdir = workdir.clone();
        }
    } else {
        out.mode = "new".to_string();
        out.task = positionals[0].clone();
        out.explicit_stdin = positionals[0] == "-";
        if let Some(workdir) = positionals.get(1) {
            if workdir == "-" {
                return Err(usage("invalid workdir: '-' is not a valid directory path"));
            }
            out.workdir = workdir.clone();
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> (Args, Vec<String>) {
        let full: Vec<String> = std::iter::once("codeagent".to_string())
            .chain(argv.iter().map(|s| s.to_string()))
            .collect();
        let args = Args::parse_from(&full);
        (args, full[1..].to_vec())
    }

    fn resolve_with(argv: &[&str], file: &FileConfig) -> Result<ResolvedSettings, CliError> {
        let (args, raw) = parse(argv);
        let positionals = args.args.clone();
        resolve_settings(&args, &raw, file, &positionals)
    }

    fn resolve(argv: &[&str]) -> Result<ResolvedSettings, CliError> {
        resolve_with(argv, &FileConfig::default())
    }

    #[test]
    fn plain_task_gets_defaults() {
        let s = resolve(&["do the thing"]).unwrap();
        assert_eq!(s.backend, DEFAULT_BACKEND);
        assert_eq!(s.mode, "new");
        assert_eq!(s.task, "do the thing");
        assert_eq!(s.workdir, ".");
        assert!(!s.explicit_stdin);
    }

    #[test]
    fn explicit_stdin_sentinel() {
        let s = resolve(&["-"]).unwrap();
        assert!(s.explicit_stdin);
        assert_eq!(s.task, "-");
    }

    #[test]
    fn workdir_positional() {
        let s = resolve(&["task", "/repo"]).unwrap();
        assert_eq!(s.workdir, "/repo");
    }

    #[test]
    fn dash_workdir_rejected() {
        assert!(resolve(&["task", "-"]).is_err());
    }

    #[test]
    fn resume_positional_form() {
        let s = resolve(&["resume", "S1", "carry on", "/w"]).unwrap();
        assert_eq!(s.mode, "resume");
        assert_eq!(s.session_id, "S1");
        assert_eq!(s.task, "carry on");
        assert_eq!(s.workdir, "/w");
    }

    #[test]
    fn resume_requires_session_and_task() {
        assert!(resolve(&["resume"]).is_err());
        assert!(resolve(&["resume", "S1"]).is_err());
        assert!(resolve(&["resume", "  ", "task"]).is_err());
    }

    #[test]
    fn missing_task_is_an_error() {
        assert!(resolve(&[]).is_err());
    }

    #[test]
    fn backend_flag_wins_over_file() {
        let file = FileConfig {
            backend: Some("gemini".into()),
            ..Default::default()
        };
        let s = resolve_with(&["--backend", "claude", "t"], &file).unwrap();
        assert_eq!(s.backend, "claude");
    }

    #[test]
    fn file_backend_used_without_flag() {
        let file = FileConfig {
            backend: Some("gemini".into()),
            model: Some("g-3".into()),
            ..Default::default()
        };
        let s = resolve_with(&["t"], &file).unwrap();
        assert_eq!(s.backend, "gemini");
        assert_eq!(s.model, "g-3");
    }

    #[test]
    fn agent_preset_supplies_backend_when_flag_absent() {
        // "oracle" is a built-in preset targeting claude.
        let s = resolve(&["--agent", "oracle", "t"]).unwrap();
        assert_eq!(s.backend, "claude");
        assert!(!s.prompt_file.is_empty());
        assert!(!s.prompt_file_explicit);
    }

    #[test]
    fn later_agent_flag_overrides_earlier_backend_flag() {
        let s = resolve(&["--backend", "codex", "--agent", "oracle", "t"]).unwrap();
        assert_eq!(s.backend, "claude");
    }

    #[test]
    fn later_backend_flag_overrides_earlier_agent_flag() {
        let s = resolve(&["--agent", "oracle", "--backend", "codex", "t"]).unwrap();
        assert_eq!(s.backend, "codex");
    }

    #[test]
    fn explicit_prompt_file_is_marked_explicit() {
        let s = resolve(&["--prompt-file", "/x/p.md", "t"]).unwrap();
        assert_eq!(s.prompt_file, "/x/p.md");
        assert!(s.prompt_file_explicit);
    }

    #[test]
    fn empty_flag_values_are_rejected() {
        assert!(resolve(&["--backend", "", "t"]).is_err());
        assert!(resolve(&["--model", "  ", "t"]).is_err());
        assert!(resolve(&["--agent", "", "t"]).is_err());
    }

    #[test]
    fn file_config_parses_toml_forms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "backend = \"claude\"\n\"reasoning-effort\" = \"high\"\nskip_permissions = true\n",
        )
        .unwrap();
        let cfg = load_file_config(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.backend.as_deref(), Some("claude"));
        assert_eq!(cfg.reasoning_effort.as_deref(), Some("high"));
        assert_eq!(cfg.skip_permissions, Some(true));
    }

    #[test]
    fn explicit_config_file_must_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "not [valid").unwrap();
        assert!(load_file_config(Some(path.to_str().unwrap())).is_err());
        assert!(load_file_config(Some(dir.path().join("absent.toml").to_str().unwrap())).is_err());
    }
}
