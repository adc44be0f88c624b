use std::collections::HashMap;
use std::path::Path;

use crate::config::WrapperConfig;

/// Loads `KEY=VALUE` lines from `~/.gemini/.env`. Blank lines and `#`
/// comments are ignored. When an API key is present and no auth mechanism is
/// set, `GEMINI_API_KEY_AUTH_MECHANISM=bearer` is injected for third-party
/// endpoint compatibility. Any error yields an empty map.
pub fn load_gemini_env() -> HashMap<String, String> {
    let Some(home) = dirs::home_dir() else {
        return HashMap::new();
    };
    load_gemini_env_in(&home)
}

pub fn load_gemini_env_in(home: &Path) -> HashMap<String, String> {
    let env_dir = home.join(".gemini");
    let env_path = env_dir.join(".env");
    if !env_path.starts_with(&env_dir) {
        return HashMap::new();
    }

    let Ok(data) = std::fs::read_to_string(&env_path) else {
        return HashMap::new();
    };

    let mut env = HashMap::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if !key.is_empty() && !value.is_empty() {
            env.insert(key.to_string(), value.to_string());
        }
    }

    if env.contains_key("GEMINI_API_KEY") && !env.contains_key("GEMINI_API_KEY_AUTH_MECHANISM") {
        env.insert(
            "GEMINI_API_KEY_AUTH_MECHANISM".to_string(),
            "bearer".to_string(),
        );
    }

    env
}

pub(super) fn build_args(cfg: &WrapperConfig, target_arg: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["-o".into(), "stream-json".into(), "-y".into()];

    let model = cfg.model.trim();
    if !model.is_empty() {
        args.push("-m".into());
        args.push(model.to_string());
    }

    if cfg.mode == "resume" && !cfg.session_id.is_empty() {
        args.push("-r".into());
        args.push(cfg.session_id.clone());
    }

    // The task rides as a positional argument; `-p -` is only used to pull
    // it from stdin.
    if target_arg == super::STDIN_SENTINEL {
        args.push("-p".into());
        args.push(target_arg.to_string());
    } else {
        args.push(target_arg.to_string());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_target_in_new_mode() {
        let cfg = WrapperConfig {
            mode: "new".into(),
            ..Default::default()
        };
        let args = build_args(&cfg, "write docs");
        assert_eq!(args, vec!["-o", "stream-json", "-y", "write docs"]);
    }

    #[test]
    fn stdin_sentinel_uses_p_flag() {
        let cfg = WrapperConfig {
            mode: "new".into(),
            ..Default::default()
        };
        let args = build_args(&cfg, "-");
        assert_eq!(args, vec!["-o", "stream-json", "-y", "-p", "-"]);
    }

    #[test]
    fn model_and_resume_flags() {
        let cfg = WrapperConfig {
            mode: "resume".into(),
            session_id: "G7".into(),
            model: "gemini-3-pro".into(),
            ..Default::default()
        };
        let args = build_args(&cfg, "continue");
        assert_eq!(
            args,
            vec!["-o", "stream-json", "-y", "-m", "gemini-3-pro", "-r", "G7", "continue"]
        );
    }

    #[test]
    fn env_file_parsing_skips_comments_and_blanks() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join(".gemini");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(".env"),
            "# comment\n\nGEMINI_API_KEY=abc\nGOOGLE_GEMINI_BASE_URL = https://relay \nBROKEN\n=novalue\n",
        )
        .unwrap();

        let env = load_gemini_env_in(home.path());
        assert_eq!(env["GEMINI_API_KEY"], "abc");
        assert_eq!(env["GOOGLE_GEMINI_BASE_URL"], "https://relay");
        // Compatibility default injected alongside the key.
        assert_eq!(env["GEMINI_API_KEY_AUTH_MECHANISM"], "bearer");
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn env_file_respects_explicit_auth_mechanism() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join(".gemini");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(".env"),
            "GEMINI_API_KEY=abc\nGEMINI_API_KEY_AUTH_MECHANISM=oauth\n",
        )
        .unwrap();

        let env = load_gemini_env_in(home.path());
        assert_eq!(env["GEMINI_API_KEY_AUTH_MECHANISM"], "oauth");
    }

    #[test]
    fn missing_env_file_is_empty() {
        let home = tempfile::tempdir().unwrap();
        assert!(load_gemini_env_in(home.path()).is_empty());
    }
}
