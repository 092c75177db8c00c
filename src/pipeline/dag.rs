// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Job dependency graph
//!
//! Builds and validates the `needs` DAG of a pipeline, ensuring proper
//! execution order, detecting cycles, and rendering the graph for the
//! `graph` subcommand.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::errors::RosflowError;
use crate::pipeline::{JobDefinition, PipelineDefinition};

/// Dependency graph over job identifiers
pub struct JobGraph {
    graph: DiGraph<usize, ()>,
    id_to_index: HashMap<String, NodeIndex>,
    index_to_id: HashMap<NodeIndex, String>,
}

impl JobGraph {
    fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_to_index: HashMap::new(),
            index_to_id: HashMap::new(),
        }
    }

    /// Build the job graph for a pipeline
    pub fn build(pipeline: &PipelineDefinition) -> Result<Self, RosflowError> {
        Self::from_jobs(&pipeline.jobs)
    }

    /// Build a job graph from a job list
    pub fn from_jobs(jobs: &[JobDefinition]) -> Result<Self, RosflowError> {
        let mut graph = Self::new();

        for (idx, job) in jobs.iter().enumerate() {
            let node = graph.graph.add_node(idx);
            graph.id_to_index.insert(job.id.clone(), node);
            graph.index_to_id.insert(node, job.id.clone());
        }

        for job in jobs {
            let job_node = graph.id_to_index[&job.id];

            for need in &job.needs {
                let need_node =
                    graph.id_to_index.get(need).ok_or_else(|| RosflowError::UnknownNeed {
                        job: job.id.clone(),
                        need: need.clone(),
                    })?;

                graph.graph.add_edge(*need_node, job_node, ());
            }
        }

        graph.validate_acyclic()?;

        Ok(graph)
    }

    fn validate_acyclic(&self) -> Result<(), RosflowError> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let jobs = self.find_cycle_members(cycle.node_id());
                Err(RosflowError::CircularDependency { jobs })
            }
        }
    }

    /// Find all jobs involved in a cycle
    fn find_cycle_members(&self, start: NodeIndex) -> Vec<String> {
        use petgraph::visit::{depth_first_search, DfsEvent};

        let mut in_cycle = vec![self.index_to_id[&start].clone()];
        let mut visited = std::collections::HashSet::new();

        depth_first_search(&self.graph, Some(start), |event| {
            if let DfsEvent::Discover(node, _) = event {
                let id = &self.index_to_id[&node];
                if visited.contains(id) {
                    in_cycle.push(id.clone());
                    return petgraph::visit::Control::Break(());
                }
                visited.insert(id.clone());
                in_cycle.push(id.clone());
            }
            petgraph::visit::Control::Continue
        });

        in_cycle
    }

    /// Get topologically sorted job indices
    pub fn topological_order(&self) -> Result<Vec<usize>, RosflowError> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|cycle| {
                let jobs = self.find_cycle_members(cycle.node_id());
                RosflowError::CircularDependency { jobs }
            })
    }

    /// Jobs that must succeed before the given job runs
    pub fn needs_of(&self, job_id: &str) -> Option<Vec<String>> {
        let node = self.id_to_index.get(job_id)?;
        let needs: Vec<String> = self
            .graph
            .neighbors_directed(*node, petgraph::Direction::Incoming)
            .map(|n| self.index_to_id[&n].clone())
            .collect();
        Some(needs)
    }

    /// Generate a Mermaid diagram of the job graph
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for (id, _) in &self.id_to_index {
            out.push_str(&format!("    {}[{}]\n", id, id));
        }

        for edge in self.graph.edge_indices() {
            let (from, to) = self.graph.edge_endpoints(edge).unwrap();
            let from_id = &self.index_to_id[&from];
            let to_id = &self.index_to_id[&to];
            out.push_str(&format!("    {} --> {}\n", from_id, to_id));
        }

        out
    }

    /// Generate a DOT diagram of the job graph
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for edge in self.graph.edge_indices() {
            let (from, to) = self.graph.edge_endpoints(edge).unwrap();
            let from_id = &self.index_to_id[&from];
            let to_id = &self.index_to_id[&to];
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from_id, to_id));
        }

        for (id, node) in &self.id_to_index {
            if self.graph.neighbors_undirected(*node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", id));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate a text representation of execution order, with matrix fan-out
    pub fn to_text(&self, pipeline: &PipelineDefinition) -> Result<String, RosflowError> {
        let order = self.topological_order()?;
        let mut out = String::new();

        for (i, idx) in order.iter().enumerate() {
            let job = &pipeline.jobs[*idx];
            let needs = self.needs_of(&job.id).unwrap_or_default();

            out.push_str(&format!("{}. {}", i + 1, job.id));

            if let crate::pipeline::JobKind::Template { template, .. } = &job.kind {
                if let Some(tpl) = pipeline.templates.get(template) {
                    let solvers: Vec<String> =
                        tpl.matrix.solver.iter().map(|s| s.to_string()).collect();
                    out.push_str(&format!(" × [{}]", solvers.join(", ")));
                }
            }

            if !needs.is_empty() {
                out.push_str(&format!(" [needs: {}]", needs.join(", ")));
            }

            out.push('\n');
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{JobKind, Step, StepBody};

    fn make_jobs(jobs: Vec<(&str, Vec<&str>)>) -> Vec<JobDefinition> {
        jobs.into_iter()
            .map(|(id, needs)| JobDefinition {
                id: id.into(),
                needs: needs.into_iter().map(String::from).collect(),
                kind: JobKind::Inline {
                    steps: vec![Step {
                        name: "noop".into(),
                        guard: None,
                        always: false,
                        best_effort: false,
                        env: std::collections::HashMap::new(),
                        body: StepBody::Shell {
                            run: "true".into(),
                            shell: "bash".into(),
                        },
                    }],
                },
            })
            .collect()
    }

    fn ordered_ids(graph: &JobGraph, jobs: &[JobDefinition]) -> Vec<String> {
        graph
            .topological_order()
            .unwrap()
            .into_iter()
            .map(|idx| jobs[idx].id.clone())
            .collect()
    }

    #[test]
    fn test_linear_graph() {
        let jobs = make_jobs(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])]);

        let graph = JobGraph::from_jobs(&jobs).unwrap();
        let order = ordered_ids(&graph, &jobs);

        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_graph() {
        let jobs = make_jobs(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["a"]),
            ("d", vec!["b", "c"]),
        ]);

        let graph = JobGraph::from_jobs(&jobs).unwrap();
        let order = ordered_ids(&graph, &jobs);

        // a must come first, d must come last
        assert_eq!(order[0], "a");
        assert_eq!(order[3], "d");
        assert!(order[1] == "b" || order[1] == "c");
        assert!(order[2] == "b" || order[2] == "c");
    }

    #[test]
    fn test_cycle_detection() {
        let jobs = make_jobs(vec![("a", vec!["b"]), ("b", vec!["a"])]);

        let result = JobGraph::from_jobs(&jobs);
        assert!(matches!(result, Err(RosflowError::CircularDependency { .. })));
    }

    #[test]
    fn test_unknown_need() {
        let jobs = make_jobs(vec![("a", vec!["nonexistent"])]);

        let result = JobGraph::from_jobs(&jobs);
        assert!(matches!(result, Err(RosflowError::UnknownNeed { .. })));
    }

    #[test]
    fn test_needs_of() {
        let jobs = make_jobs(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["a", "b"])]);

        let graph = JobGraph::from_jobs(&jobs).unwrap();
        let mut needs = graph.needs_of("c").unwrap();
        needs.sort();

        assert_eq!(needs, vec!["a", "b"]);
        assert!(graph.needs_of("a").unwrap().is_empty());
    }

    #[test]
    fn test_mermaid_output() {
        let jobs = make_jobs(vec![("a", vec![]), ("b", vec!["a"])]);

        let graph = JobGraph::from_jobs(&jobs).unwrap();
        let mermaid = graph.to_mermaid();

        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("a --> b"));
    }
}
