use std::collections::{HashMap, HashSet};

use crate::model::Job;

/// Dependency graph of the jobs in one stage.
///
/// Owned and mutated by a single executor. The ready frontier is reported in
/// the order jobs were first added.
#[derive(Debug, Clone, Default)]
pub struct JobGraph {
    /// Job nodes: name -> Job
    jobs: HashMap<String, Job>,

    /// Dependency edges: name -> names it depends on
    dependencies: HashMap<String, Vec<String>>,

    /// Reverse edges: name -> names that depend on it
    dependents: HashMap<String, Vec<String>>,

    completed: HashSet<String>,

    /// Original insertion order (for stable iteration)
    insertion_order: Vec<String>,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a stage's jobs: all nodes first, then all edges.
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let mut graph = Self::new();
        for job in jobs {
            graph.add_job(job.clone());
        }
        for job in jobs {
            for dep in &job.depends_on {
                graph.add_dependency(&job.name, dep);
            }
        }
        graph
    }

    /// Register a job. Re-adding a name replaces the job in place.
    pub fn add_job(&mut self, job: Job) {
        let name = job.name.clone();
        if !self.jobs.contains_key(&name) {
            self.insertion_order.push(name.clone());
        }
        self.dependencies.entry(name.clone()).or_default();
        self.dependents.entry(name.clone()).or_default();
        self.jobs.insert(name, job);
    }

    /// Record that `job` depends on `depends_on`. Neither has to exist yet.
    pub fn add_dependency(&mut self, job: &str, depends_on: &str) {
        self.dependencies
            .entry(job.to_string())
            .or_default()
            .push(depends_on.to_string());
        self.dependents
            .entry(depends_on.to_string())
            .or_default()
            .push(job.to_string());
    }

    pub fn has_cycles(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Detect circular dependencies using DFS
    ///
    /// Returns the offending path, e.g. `a -> b -> a`.
    pub fn find_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for name in &self.insertion_order {
            if !visited.contains(name.as_str()) && self.dfs_cycle(name, &mut visited, &mut stack)
            {
                return Some(format_cycle_path(&stack));
            }
        }

        None
    }

    fn dfs_cycle<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> bool {
        visited.insert(node);
        stack.push(node);

        if let Some(dependencies) = self.dependencies.get(node) {
            for dep in dependencies {
                // Dependency on the current path closes a cycle
                if let Some(pos) = stack.iter().position(|x| *x == dep.as_str()) {
                    stack.push(dep.as_str());
                    *stack = stack.split_off(pos);
                    return true;
                }

                if !visited.contains(dep.as_str()) && self.dfs_cycle(dep, visited, stack) {
                    return true;
                }
            }
        }

        stack.pop();
        false
    }

    /// Jobs not yet completed whose dependencies have all completed.
    pub fn get_ready_jobs(&self) -> Vec<Job> {
        self.insertion_order
            .iter()
            .filter(|name| !self.completed.contains(name.as_str()))
            .filter(|name| {
                self.dependencies
                    .get(name.as_str())
                    .map(|deps| deps.iter().all(|d| self.completed.contains(d)))
                    .unwrap_or(true)
            })
            .filter_map(|name| self.jobs.get(name).cloned())
            .collect()
    }

    pub fn mark_completed(&mut self, name: &str) {
        self.completed.insert(name.to_string());
    }

    pub fn is_job_completed(&self, name: &str) -> bool {
        self.completed.contains(name)
    }

    /// True once every registered job has completed.
    pub fn is_completed(&self) -> bool {
        self.jobs.keys().all(|name| self.completed.contains(name))
    }

    pub fn remaining_jobs(&self) -> Vec<Job> {
        self.insertion_order
            .iter()
            .filter(|name| !self.completed.contains(name.as_str()))
            .filter_map(|name| self.jobs.get(name).cloned())
            .collect()
    }

    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn format_cycle_path(stack: &[&str]) -> String {
    stack.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(jobs: &[Job]) -> Vec<&str> {
        jobs.iter().map(|j| j.name.as_str()).collect()
    }

    fn diamond() -> JobGraph {
        JobGraph::from_jobs(&[
            Job::new("a", "mock"),
            Job::new("b", "mock").depends_on(["a"]),
            Job::new("c", "mock").depends_on(["a"]),
            Job::new("d", "mock").depends_on(["b", "c"]),
        ])
    }

    #[test]
    fn test_ready_frontier_follows_dependencies() {
        let mut graph = diamond();
        assert_eq!(names(&graph.get_ready_jobs()), vec!["a"]);

        graph.mark_completed("a");
        assert_eq!(names(&graph.get_ready_jobs()), vec!["b", "c"]);

        graph.mark_completed("b");
        assert_eq!(names(&graph.get_ready_jobs()), vec!["c"]);

        graph.mark_completed("c");
        assert_eq!(names(&graph.get_ready_jobs()), vec!["d"]);
        assert!(!graph.is_completed());

        graph.mark_completed("d");
        assert!(graph.get_ready_jobs().is_empty());
        assert!(graph.is_completed());
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let mut graph = diamond();
        graph.mark_completed("a");
        graph.mark_completed("a");
        assert!(graph.is_job_completed("a"));
        assert_eq!(graph.remaining_jobs().len(), 3);
    }

    #[test]
    fn test_add_job_is_idempotent_on_name() {
        let mut graph = JobGraph::new();
        graph.add_job(Job::new("a", "first"));
        graph.add_job(Job::new("b", "mock"));
        graph.add_job(Job::new("a", "second"));

        assert_eq!(graph.len(), 2);
        let ready = graph.get_ready_jobs();
        assert_eq!(names(&ready), vec!["a", "b"]);
        assert_eq!(ready[0].job_type, "second");
    }

    #[test]
    fn test_cycle_detection() {
        assert!(!diamond().has_cycles());

        let graph = JobGraph::from_jobs(&[
            Job::new("a", "mock").depends_on(["c"]),
            Job::new("b", "mock").depends_on(["a"]),
            Job::new("c", "mock").depends_on(["b"]),
        ]);
        assert!(graph.has_cycles());
        assert_eq!(graph.find_cycle().as_deref(), Some("a -> c -> b -> a"));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let graph = JobGraph::from_jobs(&[Job::new("a", "mock").depends_on(["a"])]);
        assert_eq!(graph.find_cycle().as_deref(), Some("a -> a"));
    }

    #[test]
    fn test_missing_dependency_never_becomes_ready() {
        let mut graph = JobGraph::from_jobs(&[
            Job::new("a", "mock"),
            Job::new("b", "mock").depends_on(["ghost"]),
        ]);
        assert!(!graph.has_cycles());
        assert_eq!(names(&graph.get_ready_jobs()), vec!["a"]);

        graph.mark_completed("a");
        assert!(graph.get_ready_jobs().is_empty());
        assert!(!graph.is_completed());
        assert_eq!(names(&graph.remaining_jobs()), vec!["b"]);
    }

    #[test]
    fn test_dependents_are_tracked() {
        let graph = diamond();
        assert_eq!(graph.dependents_of("a"), ["b".to_string(), "c".to_string()]);
        assert!(graph.dependents_of("d").is_empty());
        assert!(graph.dependents_of("nope").is_empty());
    }
}
