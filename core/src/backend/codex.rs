use crate::config::{env_flag_default_true, WrapperConfig};

pub(super) fn build_args(cfg: &WrapperConfig, target_arg: &str) -> Vec<String> {
    let mut resume_session_id = String::new();
    let mut is_resume = cfg.mode == "resume";
    if is_resume {
        resume_session_id = cfg.session_id.trim().to_string();
        if resume_session_id.is_empty() {
            tracing::error!("invalid config: resume mode requires non-empty session_id");
            is_resume = false;
        }
    }

    let mut args: Vec<String> = vec!["e".into()];

    // Bypass the sandbox unless CODEX_BYPASS_SANDBOX=false.
    if cfg.yolo || env_flag_default_true("CODEX_BYPASS_SANDBOX") {
        tracing::warn!(
            "YOLO mode or CODEX_BYPASS_SANDBOX enabled: running without approval/sandbox protection"
        );
        args.push("--dangerously-bypass-approvals-and-sandbox".into());
    }

    let model = cfg.model.trim();
    if !model.is_empty() {
        args.push("--model".into());
        args.push(model.to_string());
    }

    let reasoning = cfg.reasoning_effort.trim();
    if !reasoning.is_empty() {
        args.push("-c".into());
        args.push(format!("model_reasoning_effort={reasoning}"));
    }

    args.push("--skip-git-repo-check".into());

    if is_resume {
        args.push("--json".into());
        args.push("resume".into());
        args.push(resume_session_id);
        args.push(target_arg.to_string());
        return args;
    }

    args.push("-C".into());
    args.push(cfg.workdir.clone());
    args.push("--json".into());
    args.push(target_arg.to_string());
    args
}
