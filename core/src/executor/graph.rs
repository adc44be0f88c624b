use std::collections::HashMap;

use crate::error::ExecutorError;
use crate::executor::types::TaskSpec;

/// Validated task dependency graph.
///
/// Insertion order is preserved so layering and reporting stay stable across
/// runs regardless of hash-map iteration order.
#[derive(Debug)]
pub struct TaskGraph {
    tasks: Vec<TaskSpec>,
    /// task id -> position in `tasks`
    index: HashMap<String, usize>,
    /// per task: indices of its dependencies
    deps: Vec<Vec<usize>>,
    /// per task: indices of tasks depending on it
    dependents: Vec<Vec<usize>>,
}

impl TaskGraph {
    /// Builds the graph, rejecting duplicate IDs and edges that point at
    /// unknown tasks.
    pub fn build(tasks: Vec<TaskSpec>) -> Result<Self, ExecutorError> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), i).is_some() {
                return Err(ExecutorError::DuplicateTaskId(task.id.clone()));
            }
        }

        let mut deps = vec![Vec::new(); tasks.len()];
        let mut dependents = vec![Vec::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            for dep in &task.dependencies {
                let Some(&j) = index.get(dep.as_str()) else {
                    return Err(ExecutorError::DependencyNotFound {
                        task_id: task.id.clone(),
                        missing_dep: dep.clone(),
                    });
                };
                deps[i].push(j);
                dependents[j].push(i);
            }
        }

        Ok(Self {
            tasks,
            index,
            deps,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Stratifies the graph into execution layers: layer 0 holds tasks with
    /// no dependencies, layer k+1 holds tasks whose dependencies all live in
    /// layers 0..=k. Within a layer, tasks keep their insertion order.
    pub fn layers(&self) -> Result<Vec<Vec<String>>, ExecutorError> {
        let mut in_degree: Vec<usize> = self.deps.iter().map(Vec::len).collect();

        let mut current: Vec<usize> = (0..self.tasks.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();

        let mut layers = Vec::new();
        let mut placed = 0usize;

        while !current.is_empty() {
            current.sort_unstable();
            placed += current.len();
            layers.push(
                current
                    .iter()
                    .map(|&i| self.tasks[i].id.clone())
                    .collect::<Vec<_>>(),
            );

            let mut next = Vec::new();
            for &i in &current {
                for &dep in &self.dependents[i] {
                    in_degree[dep] -= 1;
                    if in_degree[dep] == 0 {
                        next.push(dep);
                    }
                }
            }
            current = next;
        }

        if placed != self.tasks.len() {
            return Err(ExecutorError::CircularDependency(self.cycle_path()));
        }

        Ok(layers)
    }

    /// Names one dependency cycle as `a -> b -> a` for the error message.
    fn cycle_path(&self) -> String {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }

        fn visit(
            graph: &TaskGraph,
            node: usize,
            marks: &mut Vec<Mark>,
            stack: &mut Vec<usize>,
        ) -> Option<Vec<usize>> {
            marks[node] = Mark::Grey;
            stack.push(node);
            for &dep in &graph.deps[node] {
                match marks[dep] {
                    Mark::Grey => {
                        let start = stack.iter().position(|&n| n == dep).unwrap_or(0);
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(dep);
                        return Some(cycle);
                    }
                    Mark::White => {
                        if let Some(cycle) = visit(graph, dep, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Black => {}
                }
            }
            stack.pop();
            marks[node] = Mark::Black;
            None
        }

        let mut marks = vec![Mark::White; self.tasks.len()];
        for i in 0..self.tasks.len() {
            if marks[i] == Mark::White {
                let mut stack = Vec::new();
                if let Some(cycle) = visit(self, i, &mut marks, &mut stack) {
                    return cycle
                        .iter()
                        .map(|&n| self.tasks[n].id.as_str())
                        .collect::<Vec<_>>()
                        .join(" -> ");
                }
            }
        }
        "cycle detected".to_string()
    }
}
