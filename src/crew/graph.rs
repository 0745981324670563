use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::crew::error::ConfigError;
use crate::task::Task;

/// How a dependent treats one of its dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeKind {
    /// Settled edges only order execution: any terminal state unblocks the
    /// dependent and a failure is reported in its context.
    Settled,
    /// Declared context: the dependency must complete or the dependent fails
    Completion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub task: usize,
    pub kind: EdgeKind,
}

/// Validated dependency structure of a crew's tasks, indexed by declaration
/// position.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    dependencies: Vec<Vec<Dependency>>,
    order: Vec<usize>,
}

impl TaskGraph {
    /// Resolve declared contexts, add ordering barriers and the manager's
    /// implicit edges, and reject anything that cannot be scheduled.
    ///
    /// Outside the manager's task, a task without `async_execution` waits for
    /// every earlier task, and an async task waits for the last earlier
    /// non-async one.
    pub fn build(tasks: &[Task], manager_task: Option<usize>) -> Result<Self, ConfigError> {
        let index: HashMap<&str, usize> = tasks.iter().enumerate().map(|(i, t)| (t.name.as_str(), i)).collect();

        let mut edges: Vec<BTreeMap<usize, EdgeKind>> = vec![BTreeMap::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            for dependency in &task.context {
                let dep = *index.get(dependency.as_str()).ok_or_else(|| ConfigError::UnknownDependency {
                    task: task.name.clone(),
                    dependency: dependency.clone(),
                })?;
                edges[i].insert(dep, EdgeKind::Completion);
            }
        }

        // The manager reports on every other task, failed ones included, so
        // its declared context is settled too.
        if let Some(manager) = manager_task {
            for other in (0..tasks.len()).filter(|&o| o != manager) {
                edges[manager].insert(other, EdgeKind::Settled);
            }
        }

        let adjacency: Vec<Vec<usize>> = edges.iter().map(|deps| deps.keys().copied().collect()).collect();
        if let Some(cycle) = detect_cycle(&adjacency) {
            return Err(ConfigError::CycleDetected(
                cycle.into_iter().map(|i| tasks[i].name.clone()).collect(),
            ));
        }

        for (i, task) in tasks.iter().enumerate() {
            if Some(i) == manager_task {
                continue;
            }
            if let Some((&dep, _)) = edges[i].iter().find(|(&dep, _)| dep > i) {
                return Err(ConfigError::ForwardDependency {
                    task: task.name.clone(),
                    dependency: tasks[dep].name.clone(),
                });
            }
        }

        let mut last_barrier = None;
        for (i, task) in tasks.iter().enumerate() {
            if Some(i) == manager_task {
                continue;
            }
            if task.async_execution {
                if let Some(barrier) = last_barrier {
                    edges[i].entry(barrier).or_insert(EdgeKind::Settled);
                }
            } else {
                for earlier in (0..i).filter(|&e| Some(e) != manager_task) {
                    edges[i].entry(earlier).or_insert(EdgeKind::Settled);
                }
                last_barrier = Some(i);
            }
        }

        let dependencies: Vec<Vec<Dependency>> = edges
            .into_iter()
            .map(|deps| deps.into_iter().map(|(task, kind)| Dependency { task, kind }).collect())
            .collect();
        let order = topological_order(&dependencies);

        Ok(Self { dependencies, order })
    }

    pub fn dependencies(&self, task: usize) -> &[Dependency] {
        &self.dependencies[task]
    }

    /// Task indices such that every task comes after its dependencies; ties
    /// keep declaration order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Detects cycles in a dependency graph using DFS. Returns the path that
/// closes the cycle, repeating its first node at the end.
pub(crate) fn detect_cycle(dependencies: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for node in 0..dependencies.len() {
        if dfs_cycle(node, dependencies, &mut visited, &mut rec_stack, &mut path) {
            let start = path.iter().position(|&n| Some(&n) == path.last()).unwrap_or(0);
            return Some(path.split_off(start));
        }
    }

    None
}

fn dfs_cycle(
    node: usize,
    graph: &[Vec<usize>],
    visited: &mut HashSet<usize>,
    rec_stack: &mut HashSet<usize>,
    path: &mut Vec<usize>,
) -> bool {
    if rec_stack.contains(&node) {
        path.push(node);
        return true;
    }

    if !visited.insert(node) {
        return false;
    }

    rec_stack.insert(node);
    path.push(node);

    for &dep in &graph[node] {
        if dfs_cycle(dep, graph, visited, rec_stack, path) {
            return true;
        }
    }

    rec_stack.remove(&node);
    path.pop();
    false
}

fn topological_order(dependencies: &[Vec<Dependency>]) -> Vec<usize> {
    let mut pending: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); dependencies.len()];
    for (task, deps) in dependencies.iter().enumerate() {
        for dep in deps {
            dependents[dep.task].push(task);
        }
    }

    let mut ready: VecDeque<usize> = (0..dependencies.len()).filter(|&t| pending[t] == 0).collect();
    let mut order = Vec::with_capacity(dependencies.len());
    while let Some(task) = ready.pop_front() {
        order.push(task);
        for &dependent in &dependents[task] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push_back(dependent);
            }
        }
    }
    order
}
