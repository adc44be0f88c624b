use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::error::ExecutorError;
use crate::executor::cancel::{cancel_pair, CancelSignal};
use crate::executor::graph::TaskGraph;
use crate::executor::types::{ExecOptions, TaskResult, TaskSpec};

/// Runs a validated batch layer by layer.
///
/// Every task in a layer is started concurrently subject to the global
/// worker cap; the next layer starts only after the whole layer reached a
/// final state. Results come back in the batch's insertion order.
///
/// The runner closure owns the child process; the scheduler owns only task
/// identities, the layer plan, the semaphore and the result table.
pub async fn execute_batch<F, Fut>(
    tasks: Vec<TaskSpec>,
    opts: &ExecOptions,
    run_fn: F,
) -> Result<Vec<TaskResult>, ExecutorError>
where
    F: Fn(TaskSpec, u64, CancelSignal) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    let graph = TaskGraph::build(tasks)?;
    let layers = graph.layers()?;

    let order: Vec<String> = graph.tasks().iter().map(|t| t.id.clone()).collect();

    tracing::info!(
        tasks = graph.len(),
        layers = layers.len(),
        max_parallel = opts.max_parallel,
        "starting parallel execution"
    );

    let semaphore = if opts.max_parallel > 0 {
        Some(Arc::new(Semaphore::new(opts.max_parallel)))
    } else {
        None
    };

    let (cancel_handle, cancel_signal) = cancel_pair();

    let mut results: HashMap<String, TaskResult> = HashMap::with_capacity(graph.len());
    let mut aborted = false;

    for (layer_idx, layer) in layers.iter().enumerate() {
        if aborted {
            break;
        }

        tracing::info!(layer = layer_idx, tasks = ?layer, "layer start");

        let mut inflight = FuturesUnordered::new();
        for id in layer {
            let Some(task) = graph.task(id) else {
                continue;
            };
            let task = task.clone();
            let semaphore = semaphore.clone();
            let run_fn = run_fn.clone();
            let signal = cancel_signal.clone();
            let timeout = opts.timeout_secs;

            inflight.push(async move {
                let _permit = match semaphore {
                    Some(sem) => match sem.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            return TaskResult::failed(
                                task.id.clone(),
                                1,
                                "worker semaphore closed unexpectedly",
                            )
                        }
                    },
                    None => None,
                };

                if signal.is_cancelled() {
                    return TaskResult::failed(task.id.clone(), 130, "cancelled before start");
                }

                run_fn(task, timeout, signal).await
            });
        }

        while let Some(result) = inflight.next().await {
            tracing::info!(
                task_id = %result.task_id,
                exit_code = result.exit_code,
                "task finalized"
            );
            if opts.fail_fast && result.exit_code != 0 && !aborted {
                tracing::warn!(
                    task_id = %result.task_id,
                    "failure under fail-fast, cancelling outstanding tasks"
                );
                cancel_handle.cancel();
                aborted = true;
            }
            results.insert(result.task_id.clone(), result);
        }

        tracing::info!(layer = layer_idx, "layer complete");
    }

    // Aggregate in insertion order. Tasks never started (their layer was
    // skipped under fail-fast) get an explanatory placeholder.
    let mut ordered = Vec::with_capacity(order.len());
    for id in order {
        match results.remove(&id) {
            Some(result) => ordered.push(result),
            None => ordered.push(TaskResult::failed(
                id,
                1,
                "not started: an earlier dependency failed",
            )),
        }
    }

    Ok(ordered)
}
