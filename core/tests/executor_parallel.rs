//! Parser-to-scheduler integration: task-block documents through graph
//! validation and layered execution, with a scripted runner in place of
//! real backend processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use codeagent_core::api::{execute_batch, parse_parallel_config, ExecOptions, TaskResult};
use codeagent_core::error::ExecutorError;

fn ok(id: &str) -> TaskResult {
    TaskResult {
        task_id: id.to_string(),
        exit_code: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn linear_chain_respects_order_and_report_ordering() {
    let doc = "\
---TASK---
id: a
---CONTENT---
first
---TASK---
id: b
dependencies: a
---CONTENT---
second
---TASK---
id: c
dependencies: b
---CONTENT---
third";
    let cfg = parse_parallel_config(doc).unwrap();

    let spans: Arc<Mutex<HashMap<String, (Instant, Instant)>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let spans_in = spans.clone();

    let opts = ExecOptions {
        max_parallel: 10,
        ..Default::default()
    };
    let results = execute_batch(cfg.tasks, &opts, move |spec, _timeout, _cancel| {
        let spans = spans_in.clone();
        async move {
            let start = Instant::now();
            // 'a' outlives the others so finish order differs from id order.
            let delay = if spec.id == "a" { 60 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            spans
                .lock()
                .unwrap()
                .insert(spec.id.clone(), (start, Instant::now()));
            ok(&spec.id)
        }
    })
    .await
    .unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let spans = spans.lock().unwrap();
    assert!(spans["b"].0 >= spans["a"].1, "b started before a finished");
    assert!(spans["c"].0 >= spans["b"].1, "c started before b finished");
}

#[tokio::test]
async fn fan_out_fan_in_from_task_blocks() {
    let doc = "\
---TASK---
id: a
---CONTENT---
root
---TASK---
id: b
dependencies: a
---CONTENT---
left
---TASK---
id: c
dependencies: a
---CONTENT---
right
---TASK---
id: d
dependencies: b, c
---CONTENT---
join";
    let cfg = parse_parallel_config(doc).unwrap();

    let spans: Arc<Mutex<HashMap<String, (Instant, Instant)>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let spans_in = spans.clone();

    let results = execute_batch(cfg.tasks, &ExecOptions::default(), move |spec, _t, _c| {
        let spans = spans_in.clone();
        async move {
            let start = Instant::now();
            tokio::time::sleep(Duration::from_millis(25)).await;
            spans
                .lock()
                .unwrap()
                .insert(spec.id.clone(), (start, Instant::now()));
            ok(&spec.id)
        }
    })
    .await
    .unwrap();

    assert_eq!(results.len(), 4);
    let spans = spans.lock().unwrap();
    // b and c overlap; d starts only after both finished.
    assert!(spans["b"].0 < spans["c"].1 && spans["c"].0 < spans["b"].1);
    assert!(spans["d"].0 >= spans["b"].1);
    assert!(spans["d"].0 >= spans["c"].1);
}

#[tokio::test]
async fn cycle_is_rejected_before_launching_anything() {
    let doc = "\
---TASK---
id: a
dependencies: b
---CONTENT---
x
---TASK---
id: b
dependencies: a
---CONTENT---
y";
    let cfg = parse_parallel_config(doc).unwrap();

    let launched = Arc::new(Mutex::new(0usize));
    let counter = launched.clone();
    let err = execute_batch(cfg.tasks, &ExecOptions::default(), move |spec, _t, _c| {
        *counter.lock().unwrap() += 1;
        async move { ok(&spec.id) }
    })
    .await
    .unwrap_err();

    match err {
        ExecutorError::CircularDependency(path) => {
            assert!(path.contains('a') || path.contains('b'), "path: {path}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*launched.lock().unwrap(), 0);
}

#[tokio::test]
async fn worst_exit_code_in_insertion_order_wins() {
    let doc = "\
---TASK---
id: one
---CONTENT---
x
---TASK---
id: two
---CONTENT---
y
---TASK---
id: three
---CONTENT---
z";
    let cfg = parse_parallel_config(doc).unwrap();

    let results = execute_batch(cfg.tasks, &ExecOptions::default(), |spec, _t, _c| async move {
        match spec.id.as_str() {
            "one" => TaskResult::failed(spec.id.clone(), 2, "first failure"),
            "two" => TaskResult::failed(spec.id.clone(), 5, "second failure"),
            _ => ok(&spec.id),
        }
    })
    .await
    .unwrap();

    // The driver picks the last non-zero result in insertion order.
    let mut exit = 0;
    for r in &results {
        if r.exit_code != 0 {
            exit = r.exit_code;
        }
    }
    assert_eq!(exit, 5);
}

#[tokio::test]
async fn per_task_timeout_flows_through_runner_hook() {
    let doc = "\
---TASK---
id: t
---CONTENT---
body";
    let cfg = parse_parallel_config(doc).unwrap();

    let opts = ExecOptions {
        timeout_secs: 42,
        ..Default::default()
    };
    let results = execute_batch(cfg.tasks, &opts, |spec, timeout, _c| async move {
        assert_eq!(timeout, 42);
        ok(&spec.id)
    })
    .await
    .unwrap();
    assert_eq!(results[0].exit_code, 0);
}
