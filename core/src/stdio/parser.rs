//! Parser for the task-block document fed to `--parallel` on stdin.
//!
//! ```text
//! ---TASK---
//! id: build
//! workdir: /repo
//! dependencies: fmt, lint
//! ---CONTENT---
//! run the build and report failures
//! ```

use std::collections::HashSet;

use crate::config::{parse_bool_flag, resolve_agent_config, validate_agent_name};
use crate::error::TaskBlockError;
use crate::executor::types::{ParallelConfig, TaskSpec};

pub const TASK_MARKER: &str = "---TASK---";
pub const CONTENT_MARKER: &str = "---CONTENT---";

const DEFAULT_WORKDIR: &str = ".";

/// Parses and validates the full task-block document.
pub fn parse_parallel_config(data: &str) -> Result<ParallelConfig, TaskBlockError> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Err(TaskBlockError::EmptyInput);
    }

    let mut cfg = ParallelConfig::default();
    let mut seen: HashSet<String> = HashSet::new();

    let mut task_index = 0usize;
    for block in trimmed.split(TASK_MARKER) {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        task_index += 1;

        let Some((meta, content)) = block.split_once(CONTENT_MARKER) else {
            return Err(TaskBlockError::MissingContentMarker(task_index));
        };
        let meta = meta.trim();
        let content = content.trim();

        let mut task = TaskSpec {
            workdir: DEFAULT_WORKDIR.to_string(),
            ..Default::default()
        };
        let mut agent_specified = false;
        let mut prompt_file_explicit = false;

        for line in meta.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                // A bare key is only meaningful for the skip flag.
                if line == "skip_permissions" || line == "skip-permissions" {
                    task.skip_permissions = true;
                }
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "id" => task.id = value.to_string(),
                "workdir" => {
                    if value == "-" {
                        return Err(TaskBlockError::InvalidWorkdir(task_index));
                    }
                    task.workdir = value.to_string();
                }
                "session_id" => {
                    task.session_id = value.to_string();
                    task.mode = "resume".to_string();
                }
                "backend" => task.backend = value.to_string(),
                "model" => task.model = value.to_string(),
                "reasoning_effort" => task.reasoning_effort = value.to_string(),
                "prompt_file" => {
                    task.prompt_file = value.to_string();
                    task.prompt_file_explicit = !value.is_empty();
                    prompt_file_explicit = task.prompt_file_explicit;
                }
                "agent" => {
                    agent_specified = true;
                    task.agent = value.to_string();
                }
                "skip_permissions" | "skip-permissions" => {
                    if value.is_empty() {
                        task.skip_permissions = true;
                    } else {
                        task.skip_permissions = parse_bool_flag(value, false);
                    }
                }
                "dependencies" => {
                    for dep in value.split(',') {
                        let dep = dep.trim();
                        if !dep.is_empty() {
                            task.dependencies.push(dep.to_string());
                        }
                    }
                }
                // Unknown keys are ignored.
                _ => {}
            }
        }

        if task.mode.is_empty() {
            task.mode = "new".to_string();
        }

        if agent_specified {
            if task.agent.trim().is_empty() {
                return Err(TaskBlockError::EmptyAgent(task_index));
            }
            if let Err(reason) = validate_agent_name(&task.agent) {
                return Err(TaskBlockError::InvalidAgent {
                    index: task_index,
                    reason,
                });
            }
            let preset = resolve_agent_config(&task.agent);
            if task.backend.is_empty() {
                task.backend = preset.backend;
            }
            if task.model.is_empty() {
                task.model = preset.model;
            }
            if task.reasoning_effort.is_empty() {
                task.reasoning_effort = preset.reasoning;
            }
            if !prompt_file_explicit {
                task.prompt_file = preset.prompt_file;
            }
        }

        if task.id.is_empty() {
            return Err(TaskBlockError::MissingId(task_index));
        }
        if content.is_empty() {
            return Err(TaskBlockError::MissingContent {
                index: task_index,
                id: task.id,
            });
        }
        if task.mode == "resume" && task.session_id.trim().is_empty() {
            return Err(TaskBlockError::EmptySessionId {
                index: task_index,
                id: task.id,
            });
        }
        if !seen.insert(task.id.clone()) {
            return Err(TaskBlockError::DuplicateId {
                index: task_index,
                id: task.id,
            });
        }

        task.task = content.to_string();
        cfg.tasks.push(task);
    }

    if cfg.tasks.is_empty() {
        return Err(TaskBlockError::NoTasks);
    }

    Ok(cfg)
}
