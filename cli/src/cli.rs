use clap::Parser;

/// `codeagent [flags] <task> [workdir]`
/// `codeagent resume <session_id> <task> [workdir]`
/// `codeagent --parallel` (task blocks on stdin)
#[derive(Parser, Debug, Clone)]
#[command(
    name = "codeagent",
    disable_version_flag = true,
    disable_help_subcommand = true,
    about = "Wrapper for AI CLI backends (codex, claude, gemini, opencode)"
)]
pub struct Args {
    /// Config file path (default: $HOME/.codeagent/config.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Print version and exit
    #[arg(short = 'v', long)]
    pub version: bool,

    /// Clean up old logs and exit
    #[arg(long)]
    pub cleanup: bool,

    /// Run tasks in parallel (config from stdin)
    #[arg(long)]
    pub parallel: bool,

    /// Parallel mode: include full task output in the report
    #[arg(long)]
    pub full_output: bool,

    /// Backend to use (codex, claude, gemini, opencode)
    #[arg(long)]
    pub backend: Option<String>,

    /// Model override
    #[arg(long)]
    pub model: Option<String>,

    /// Reasoning effort (backend-specific)
    #[arg(long)]
    pub reasoning_effort: Option<String>,

    /// Agent preset name (from ~/.codeagent/models.json)
    #[arg(long)]
    pub agent: Option<String>,

    /// Prompt file path
    #[arg(long)]
    pub prompt_file: Option<String>,

    /// Skip permission prompts (also via CODEAGENT_SKIP_PERMISSIONS)
    #[arg(long, alias = "dangerously-skip-permissions")]
    pub skip_permissions: bool,

    /// `<task> [workdir]`, `resume <session_id> <task> [workdir]`,
    /// `cleanup` or `version`
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Index of the last occurrence of `--<name>` (or `--<name>=...`) in the raw
/// argv. Used for the position-aware override between `--agent` and the
/// flags an agent preset also supplies.
pub fn last_flag_index(argv: &[String], name: &str) -> Option<usize> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let needle = format!("--{name}");
    let prefix = format!("{needle}=");
    let mut last = None;
    for (i, arg) in argv.iter().enumerate() {
        if arg == &needle || arg.starts_with(&prefix) {
            last = Some(i);
        }
    }
    last
}
