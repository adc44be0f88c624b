use crate::config::WrapperConfig;

pub(super) fn build_args(cfg: &WrapperConfig, target_arg: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["run".into()];

    let model = cfg.model.trim();
    if !model.is_empty() {
        args.push("-m".into());
        args.push(model.to_string());
    }

    if cfg.mode == "resume" && !cfg.session_id.is_empty() {
        args.push("-s".into());
        args.push(cfg.session_id.clone());
    }

    args.push("--format".into());
    args.push("json".into());

    // stdin is implicit for opencode; the sentinel is never forwarded.
    if target_arg != super::STDIN_SENTINEL {
        args.push(target_arg.to_string());
    }

    args
}
