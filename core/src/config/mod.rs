pub mod agents;

pub use agents::{
    models_config, reset_models_config_cache_for_test, resolve_agent_config,
    resolve_backend_config, AgentResolution, ModelsConfig,
};

/// Resolved wrapper configuration for a single invocation.
///
/// Populated by the CLI from flags, `CODEAGENT_*` environment variables, the
/// config file and agent presets; consumed by the backend argv builders and
/// the process runner.
#[derive(Debug, Clone, Default)]
pub struct WrapperConfig {
    /// "new" or "resume".
    pub mode: String,
    pub task: String,
    pub session_id: String,
    pub workdir: String,
    pub model: String,
    pub reasoning_effort: String,
    pub explicit_stdin: bool,
    /// Per-task deadline in seconds; 0 means none.
    pub timeout: u64,
    pub backend: String,
    pub agent: String,
    pub prompt_file: String,
    pub prompt_file_explicit: bool,
    pub skip_permissions: bool,
    pub yolo: bool,
    pub max_parallel_workers: usize,
}

pub const MAX_PARALLEL_WORKERS_LIMIT: usize = 100;

/// Environment variable consulted for the global worker cap.
pub const MAX_PARALLEL_WORKERS_ENV: &str = "CODEAGENT_MAX_PARALLEL_WORKERS";

/// Environment variable consulted for the per-task timeout (seconds).
pub const TIMEOUT_ENV: &str = "CODEAGENT_TIMEOUT";

/// True when the variable exists and is not explicitly falsey
/// ("0/false/no/off" or empty).
pub fn env_flag_enabled(key: &str) -> bool {
    env_flag_enabled_from(key, |k| std::env::var(k).ok())
}

pub fn env_flag_enabled_from(key: &str, lookup: impl Fn(&str) -> Option<String>) -> bool {
    match lookup(key) {
        None => false,
        Some(val) => !matches!(
            val.trim().to_lowercase().as_str(),
            "" | "0" | "false" | "no" | "off"
        ),
    }
}

/// True unless the variable is explicitly set to a falsey value.
pub fn env_flag_default_true(key: &str) -> bool {
    env_flag_default_true_from(key, |k| std::env::var(k).ok())
}

pub fn env_flag_default_true_from(key: &str, lookup: impl Fn(&str) -> Option<String>) -> bool {
    match lookup(key) {
        None => true,
        Some(val) => parse_bool_flag(&val, true),
    }
}

pub fn parse_bool_flag(val: &str, default_value: bool) -> bool {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default_value,
    }
}

/// Reads the worker cap from the environment. Returns 0 for "unlimited";
/// blank, invalid and negative values also map to 0. Values above
/// [`MAX_PARALLEL_WORKERS_LIMIT`] are clamped.
pub fn resolve_max_parallel_workers() -> usize {
    resolve_max_parallel_workers_from(|k| std::env::var(k).ok())
}

pub fn resolve_max_parallel_workers_from(lookup: impl Fn(&str) -> Option<String>) -> usize {
    let raw = lookup(MAX_PARALLEL_WORKERS_ENV).unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    match raw.parse::<i64>() {
        Ok(v) if v < 0 => 0,
        Ok(v) => (v as usize).min(MAX_PARALLEL_WORKERS_LIMIT),
        Err(_) => 0,
    }
}

/// Reads the per-task timeout (seconds) from the environment.
/// Blank/invalid values resolve to 0, meaning no deadline.
pub fn resolve_timeout() -> u64 {
    resolve_timeout_from(|k| std::env::var(k).ok())
}

pub fn resolve_timeout_from(lookup: impl Fn(&str) -> Option<String>) -> u64 {
    let raw = lookup(TIMEOUT_ENV).unwrap_or_default();
    raw.trim().parse::<u64>().unwrap_or(0)
}

/// Agent names may only contain ASCII letters, digits, `-` and `_`.
pub fn validate_agent_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("agent name is empty".to_string());
    }
    for c in name.chars() {
        if !(c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(format!(
                "agent name {name:?} contains invalid character {c:?}"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |k| {
            pairs
                .iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn env_flag_enabled_requires_presence() {
        assert!(!env_flag_enabled_from("X", env(&[])));
        assert!(env_flag_enabled_from("X", env(&[("X", "1")])));
        assert!(env_flag_enabled_from("X", env(&[("X", "anything")])));
        assert!(!env_flag_enabled_from("X", env(&[("X", "0")])));
        assert!(!env_flag_enabled_from("X", env(&[("X", "OFF")])));
        assert!(!env_flag_enabled_from("X", env(&[("X", "")])));
    }

    #[test]
    fn env_flag_default_true_only_disabled_explicitly() {
        assert!(env_flag_default_true_from("X", env(&[])));
        assert!(env_flag_default_true_from("X", env(&[("X", "yes")])));
        assert!(!env_flag_default_true_from("X", env(&[("X", "false")])));
        assert!(!env_flag_default_true_from("X", env(&[("X", "0")])));
        // Unrecognized values keep the default.
        assert!(env_flag_default_true_from("X", env(&[("X", "maybe")])));
    }

    #[test]
    fn max_parallel_workers_resolution() {
        assert_eq!(resolve_max_parallel_workers_from(env(&[])), 0);
        assert_eq!(
            resolve_max_parallel_workers_from(env(&[(MAX_PARALLEL_WORKERS_ENV, "")])),
            0
        );
        assert_eq!(
            resolve_max_parallel_workers_from(env(&[(MAX_PARALLEL_WORKERS_ENV, "8")])),
            8
        );
        assert_eq!(
            resolve_max_parallel_workers_from(env(&[(MAX_PARALLEL_WORKERS_ENV, "-3")])),
            0
        );
        assert_eq!(
            resolve_max_parallel_workers_from(env(&[(MAX_PARALLEL_WORKERS_ENV, "bogus")])),
            0
        );
        assert_eq!(
            resolve_max_parallel_workers_from(env(&[(MAX_PARALLEL_WORKERS_ENV, "250")])),
            MAX_PARALLEL_WORKERS_LIMIT
        );
    }

    #[test]
    fn timeout_resolution() {
        assert_eq!(resolve_timeout_from(env(&[])), 0);
        assert_eq!(resolve_timeout_from(env(&[(TIMEOUT_ENV, "120")])), 120);
        assert_eq!(resolve_timeout_from(env(&[(TIMEOUT_ENV, "nah")])), 0);
    }

    #[test]
    fn agent_name_validation() {
        assert!(validate_agent_name("oracle").is_ok());
        assert!(validate_agent_name("my-agent_2").is_ok());
        assert!(validate_agent_name("").is_err());
        assert!(validate_agent_name("  ").is_err());
        assert!(validate_agent_name("bad/name").is_err());
        assert!(validate_agent_name("bad name").is_err());
    }
}
