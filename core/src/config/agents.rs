//! Agent preset resolution backed by `~/.codeagent/models.json`.
//!
//! The parsed config is process-wide, read-mostly state with one-time init;
//! tests reset it through [`reset_models_config_cache_for_test`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::Deserialize;

use super::validate_agent_name;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendEndpoint {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentPreset {
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt_file: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub yolo: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub default_backend: String,
    #[serde(default)]
    pub default_model: String,
    #[serde(default)]
    pub agents: HashMap<String, AgentPreset>,
    #[serde(default)]
    pub backends: HashMap<String, BackendEndpoint>,
}

/// Everything an agent preset contributes to a task.
#[derive(Debug, Clone, Default)]
pub struct AgentResolution {
    pub backend: String,
    pub model: String,
    pub prompt_file: String,
    pub reasoning: String,
    pub base_url: String,
    pub api_key: String,
    pub yolo: bool,
}

fn default_models_config() -> ModelsConfig {
    let mut agents = HashMap::new();
    agents.insert(
        "oracle".to_string(),
        AgentPreset {
            backend: "claude".into(),
            model: "claude-opus-4-5-20251101".into(),
            prompt_file: "~/.claude/skills/omo/references/oracle.md".into(),
            description: "Technical advisor".into(),
            ..Default::default()
        },
    );
    agents.insert(
        "librarian".to_string(),
        AgentPreset {
            backend: "claude".into(),
            model: "claude-sonnet-4-5-20250929".into(),
            prompt_file: "~/.claude/skills/omo/references/librarian.md".into(),
            description: "Researcher".into(),
            ..Default::default()
        },
    );
    agents.insert(
        "explore".to_string(),
        AgentPreset {
            backend: "opencode".into(),
            model: "opencode/grok-code".into(),
            prompt_file: "~/.claude/skills/omo/references/explore.md".into(),
            description: "Code search".into(),
            ..Default::default()
        },
    );
    agents.insert(
        "develop".to_string(),
        AgentPreset {
            backend: "codex".into(),
            prompt_file: "~/.claude/skills/omo/references/develop.md".into(),
            description: "Code development".into(),
            ..Default::default()
        },
    );
    agents.insert(
        "frontend-ui-ux-engineer".to_string(),
        AgentPreset {
            backend: "gemini".into(),
            prompt_file: "~/.claude/skills/omo/references/frontend-ui-ux-engineer.md".into(),
            description: "Frontend engineer".into(),
            ..Default::default()
        },
    );
    agents.insert(
        "document-writer".to_string(),
        AgentPreset {
            backend: "gemini".into(),
            prompt_file: "~/.claude/skills/omo/references/document-writer.md".into(),
            description: "Documentation".into(),
            ..Default::default()
        },
    );

    ModelsConfig {
        default_backend: "opencode".to_string(),
        default_model: "opencode/grok-code".to_string(),
        agents,
        backends: HashMap::new(),
    }
}

static MODELS_CACHE: RwLock<Option<Arc<ModelsConfig>>> = RwLock::new(None);

/// Returns the cached models config, loading it on first use.
pub fn models_config() -> Arc<ModelsConfig> {
    if let Ok(guard) = MODELS_CACHE.read() {
        if let Some(cfg) = guard.as_ref() {
            return cfg.clone();
        }
    }
    let mut guard = match MODELS_CACHE.write() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    // Another writer may have won the race.
    if let Some(cfg) = guard.as_ref() {
        return cfg.clone();
    }
    let loaded = Arc::new(load_models_config());
    *guard = Some(loaded.clone());
    loaded
}

pub fn reset_models_config_cache_for_test() {
    let mut guard = match MODELS_CACHE.write() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = None;
}

fn load_models_config() -> ModelsConfig {
    let Some(home) = dirs::home_dir() else {
        tracing::warn!("failed to resolve home directory for models config; using defaults");
        return default_models_config();
    };
    load_models_config_from(&home.join(".codeagent").join("models.json"))
}

/// Loads and merges a models config from an explicit path. Missing files and
/// parse failures fall back to the built-in defaults; parse failures are
/// warned.
pub fn load_models_config_from(path: &Path) -> ModelsConfig {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read models config; using defaults"
                );
            }
            return default_models_config();
        }
    };

    let mut cfg: ModelsConfig = match serde_json::from_slice(&data) {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse models config; using defaults"
            );
            return default_models_config();
        }
    };

    let defaults = default_models_config();
    cfg.default_backend = cfg.default_backend.trim().to_string();
    if cfg.default_backend.is_empty() {
        cfg.default_backend = defaults.default_backend.clone();
    }
    cfg.default_model = cfg.default_model.trim().to_string();
    if cfg.default_model.is_empty() {
        cfg.default_model = defaults.default_model.clone();
    }

    // User entries win; defaults fill the gaps.
    for (name, preset) in defaults.agents {
        cfg.agents.entry(name).or_insert(preset);
    }

    // Normalize backend keys so lookups can be case-insensitive.
    if !cfg.backends.is_empty() {
        let mut normalized = HashMap::with_capacity(cfg.backends.len());
        for (k, v) in cfg.backends.drain() {
            let key = k.trim().to_lowercase();
            if !key.is_empty() {
                normalized.insert(key, v);
            }
        }
        cfg.backends = normalized;
    }

    cfg
}

/// A dynamic agent is a bare prompt file at `~/.codeagent/agents/<name>.md`.
fn load_dynamic_agent(name: &str) -> Option<AgentPreset> {
    validate_agent_name(name).ok()?;
    let home = dirs::home_dir()?;
    let path: PathBuf = home.join(".codeagent").join("agents").join(format!("{name}.md"));
    let meta = std::fs::metadata(&path).ok()?;
    if meta.is_dir() {
        return None;
    }
    Some(AgentPreset {
        prompt_file: format!("~/.codeagent/agents/{name}.md"),
        ..Default::default()
    })
}

fn endpoint_for(cfg: &ModelsConfig, backend_name: &str) -> BackendEndpoint {
    if cfg.backends.is_empty() {
        return BackendEndpoint::default();
    }
    let mut key = backend_name.trim().to_lowercase();
    if key.is_empty() {
        key = cfg.default_backend.trim().to_lowercase();
    }
    if key.is_empty() {
        return BackendEndpoint::default();
    }
    cfg.backends.get(&key).cloned().unwrap_or_default()
}

/// Resolves the endpoint overlay (base URL, API key) for a backend from the
/// models config.
pub fn resolve_backend_config(backend_name: &str) -> (String, String) {
    let cfg = models_config();
    let endpoint = endpoint_for(&cfg, backend_name);
    (
        endpoint.base_url.trim().to_string(),
        endpoint.api_key.trim().to_string(),
    )
}

/// Resolves an agent preset by name. Unknown names fall back to the config
/// defaults so callers always get a usable backend/model pair.
pub fn resolve_agent_config(agent_name: &str) -> AgentResolution {
    let cfg = models_config();
    resolve_agent_config_in(&cfg, agent_name)
}

pub fn resolve_agent_config_in(cfg: &ModelsConfig, agent_name: &str) -> AgentResolution {
    if let Some(agent) = cfg.agents.get(agent_name) {
        let mut backend = agent.backend.trim().to_string();
        if backend.is_empty() {
            backend = cfg.default_backend.clone();
        }
        let endpoint = endpoint_for(cfg, &backend);

        let mut base_url = agent.base_url.trim().to_string();
        if base_url.is_empty() {
            base_url = endpoint.base_url.trim().to_string();
        }
        let mut api_key = agent.api_key.trim().to_string();
        if api_key.is_empty() {
            api_key = endpoint.api_key.trim().to_string();
        }

        return AgentResolution {
            backend,
            model: agent.model.trim().to_string(),
            prompt_file: agent.prompt_file.clone(),
            reasoning: agent.reasoning.clone(),
            base_url,
            api_key,
            yolo: agent.yolo,
        };
    }

    if let Some(dynamic) = load_dynamic_agent(agent_name) {
        let endpoint = endpoint_for(cfg, &cfg.default_backend);
        return AgentResolution {
            backend: cfg.default_backend.clone(),
            model: cfg.default_model.clone(),
            prompt_file: dynamic.prompt_file,
            reasoning: String::new(),
            base_url: endpoint.base_url.trim().to_string(),
            api_key: endpoint.api_key.trim().to_string(),
            yolo: false,
        };
    }

    let endpoint = endpoint_for(cfg, &cfg.default_backend);
    AgentResolution {
        backend: cfg.default_backend.clone(),
        model: cfg.default_model.clone(),
        prompt_file: String::new(),
        reasoning: String::new(),
        base_url: endpoint.base_url.trim().to_string(),
        api_key: endpoint.api_key.trim().to_string(),
        yolo: false,
    }
}
