//! Directed acyclic graph of topic prerequisites.
//!
//! The graph maps each topic to its **direct** prerequisites and provides:
//! - atomic insertion with cycle rejection,
//! - transitive closure / dependents queries,
//! - Kahn's topological sort,
//! - learning-path generation,
//! - a plain `topic -> [prerequisites]` serialization form.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::errors::curriculum_error::CurriculumError;

/// DAG of topic dependencies, keyed by topic id.
///
/// Backed by a `BTreeMap` so iteration (and therefore tie-breaking in the
/// topological sort) is deterministic. Tie order carries no meaning for
/// callers; only the relative order of dependent topics does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrerequisiteGraph {
    graph: BTreeMap<String, Vec<String>>,
}

impl PrerequisiteGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of topics in the graph.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// True if the graph holds no topics.
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Add a topic with its direct prerequisites.
    ///
    /// The insertion is atomic: if it would close a cycle the graph is
    /// left exactly as it was.
    ///
    /// # Errors
    /// `CircularDependency` if the edge set would no longer be acyclic.
    pub fn add_topic(
        &mut self,
        topic: impl Into<String>,
        prerequisites: Vec<String>,
    ) -> Result<(), CurriculumError> {
        let topic = topic.into();

        if self.would_create_cycle(&topic, &prerequisites) {
            return Err(CurriculumError::CircularDependency {
                topic,
                prerequisites,
            });
        }

        self.graph.insert(topic, prerequisites);
        Ok(())
    }

    /// All topic ids currently in the graph.
    pub fn all_topics(&self) -> Vec<String> {
        self.graph.keys().cloned().collect()
    }

    /// Direct prerequisites of `topic`. Unknown topics have none.
    pub fn prerequisites(&self, topic: &str) -> &[String] {
        self.graph.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transitive closure of prerequisites for `topic`, excluding the
    /// topic itself.
    pub fn all_prerequisites(&self, topic: &str) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        self.collect_prerequisites(topic, &mut visited);
        visited.remove(topic);
        visited
    }

    fn collect_prerequisites(&self, topic: &str, visited: &mut BTreeSet<String>) {
        let Some(prereqs) = self.graph.get(topic) else {
            return;
        };
        if !visited.insert(topic.to_string()) {
            return;
        }
        for prereq in prereqs {
            self.collect_prerequisites(prereq, visited);
        }
    }

    /// Topics that list `topic` as a direct prerequisite.
    pub fn dependents(&self, topic: &str) -> Vec<String> {
        self.graph
            .iter()
            .filter(|(_, prereqs)| prereqs.iter().any(|p| p == topic))
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// True if every (transitive) prerequisite of `topic` is completed.
    pub fn are_prerequisites_met(&self, topic: &str, completed: &BTreeSet<String>) -> bool {
        self.all_prerequisites(topic).is_subset(completed)
    }

    /// Prerequisites of `topic` that are not yet completed.
    pub fn missing_prerequisites(&self, topic: &str, completed: &BTreeSet<String>) -> Vec<String> {
        self.all_prerequisites(topic)
            .difference(completed)
            .cloned()
            .collect()
    }

    /// Topics in dependency order (prerequisites before dependents),
    /// via Kahn's algorithm.
    ///
    /// A topic whose prerequisite is missing from the graph never reaches
    /// in-degree zero and is therefore not emitted.
    pub fn topological_sort(&self) -> Vec<String> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .graph
            .iter()
            .map(|(topic, prereqs)| (topic.as_str(), prereqs.len()))
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(t, _)| *t)
            .collect();

        let mut result = Vec::with_capacity(self.graph.len());

        while let Some(topic) = queue.pop_front() {
            result.push(topic.to_string());

            for dependent in self.dependents(topic) {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        // Re-resolve to a key borrowed from the graph so the
                        // queue outlives this iteration's `dependent`.
                        if let Some((key, _)) = self.graph.get_key_value(dependent.as_str()) {
                            queue.push_back(key.as_str());
                        }
                    }
                }
            }
        }

        result
    }

    /// Ordered list of topics to study to reach `target_topic`, given the
    /// set of already `completed` topics. The target itself is last.
    pub fn learning_path(&self, target_topic: &str, completed: &BTreeSet<String>) -> Vec<String> {
        let mut needed: BTreeSet<String> = self
            .all_prerequisites(target_topic)
            .into_iter()
            .filter(|p| !completed.contains(p))
            .collect();
        needed.insert(target_topic.to_string());

        self.topological_sort()
            .into_iter()
            .filter(|t| needed.contains(t))
            .collect()
    }

    /// Check whether inserting `(new_topic, new_prerequisites)` would
    /// close a cycle, without mutating the graph.
    fn would_create_cycle(&self, new_topic: &str, new_prerequisites: &[String]) -> bool {
        let mut trial: BTreeMap<&str, &[String]> = self
            .graph
            .iter()
            .map(|(t, p)| (t.as_str(), p.as_slice()))
            .collect();
        trial.insert(new_topic, new_prerequisites);

        let mut visited = BTreeSet::new();
        let mut stack = BTreeSet::new();

        for topic in trial.keys() {
            if !visited.contains(*topic) && Self::has_cycle(&trial, topic, &mut visited, &mut stack)
            {
                return true;
            }
        }
        false
    }

    fn has_cycle<'a>(
        trial: &BTreeMap<&'a str, &'a [String]>,
        topic: &'a str,
        visited: &mut BTreeSet<&'a str>,
        stack: &mut BTreeSet<&'a str>,
    ) -> bool {
        visited.insert(topic);
        stack.insert(topic);

        for prereq in trial.get(topic).copied().unwrap_or(&[]) {
            if !visited.contains(prereq.as_str()) {
                if let Some((key, _)) = trial.get_key_value(prereq.as_str()) {
                    if Self::has_cycle(trial, key, visited, stack) {
                        return true;
                    }
                } else {
                    visited.insert(prereq.as_str());
                }
            } else if stack.contains(prereq.as_str()) {
                return true;
            }
        }

        stack.remove(topic);
        false
    }

    /// Plain `topic -> [prerequisites]` map form.
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.graph.clone()
    }

    /// Rebuild a graph from the map form, re-validating acyclicity.
    ///
    /// # Errors
    /// `CircularDependency` naming the first topic whose insertion would
    /// close a cycle.
    pub fn from_map(data: BTreeMap<String, Vec<String>>) -> Result<Self, CurriculumError> {
        let mut graph = Self::new();
        for (topic, prereqs) in data {
            graph.add_topic(topic, prereqs)?;
        }
        Ok(graph)
    }

    /// Serialize the map form as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, CurriculumError> {
        Ok(serde_json::to_string_pretty(&self.graph)?)
    }

    /// Parse a graph from the JSON map form.
    pub fn from_json(json_str: &str) -> Result<Self, CurriculumError> {
        let data: BTreeMap<String, Vec<String>> = serde_json::from_str(json_str)?;
        Self::from_map(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(topics: &[&str]) -> BTreeSet<String> {
        topics.iter().map(|t| t.to_string()).collect()
    }

    fn sample_graph() -> PrerequisiteGraph {
        let mut g = PrerequisiteGraph::new();
        g.add_topic("algebra", vec![]).unwrap();
        g.add_topic("functions", vec!["algebra".into()]).unwrap();
        g.add_topic("limits", vec!["algebra".into(), "functions".into()])
            .unwrap();
        g.add_topic("derivatives", vec!["limits".into()]).unwrap();
        g
    }

    #[test]
    fn add_and_query_direct_prerequisites() {
        let g = sample_graph();
        assert_eq!(g.prerequisites("limits"), ["algebra", "functions"]);
        assert!(g.prerequisites("unknown").is_empty());
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn transitive_closure_excludes_self() {
        let g = sample_graph();
        let closure = g.all_prerequisites("derivatives");
        assert!(closure.contains("algebra"));
        assert!(closure.contains("functions"));
        assert!(closure.contains("limits"));
        assert!(!closure.contains("derivatives"));
    }

    #[test]
    fn cycle_insertion_is_rejected_atomically() {
        let mut g = sample_graph();
        let before = g.to_map();

        let err = g
            .add_topic("algebra", vec!["derivatives".into()])
            .unwrap_err();
        assert!(matches!(err, CurriculumError::CircularDependency { .. }));

        // Graph unchanged after rejection.
        assert_eq!(g.to_map(), before);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut g = PrerequisiteGraph::new();
        let err = g.add_topic("a", vec!["a".into()]).unwrap_err();
        assert!(matches!(err, CurriculumError::CircularDependency { .. }));
        assert!(g.is_empty());
    }

    #[test]
    fn dependents_are_reverse_edges() {
        let g = sample_graph();
        assert_eq!(g.dependents("algebra"), ["functions", "limits"]);
        assert_eq!(g.dependents("limits"), ["derivatives"]);
        assert!(g.dependents("derivatives").is_empty());
    }

    #[test]
    fn prerequisite_check_uses_transitive_closure() {
        let g = sample_graph();
        assert!(!g.are_prerequisites_met("derivatives", &completed(&["limits"])));
        assert!(g.are_prerequisites_met(
            "derivatives",
            &completed(&["algebra", "functions", "limits"])
        ));

        let missing = g.missing_prerequisites("derivatives", &completed(&["algebra"]));
        assert_eq!(missing, ["functions", "limits"]);
    }

    #[test]
    fn topological_sort_respects_dependencies() {
        let g = sample_graph();
        let order = g.topological_sort();
        assert_eq!(order.len(), 4);

        let pos = |t: &str| order.iter().position(|x| x == t).unwrap();
        assert!(pos("algebra") < pos("functions"));
        assert!(pos("functions") < pos("limits"));
        assert!(pos("limits") < pos("derivatives"));
    }

    #[test]
    fn topic_with_unknown_prerequisite_is_not_emitted() {
        let mut g = PrerequisiteGraph::new();
        g.add_topic("b", vec!["a".into()]).unwrap(); // "a" never added
        assert!(g.topological_sort().is_empty());
    }

    #[test]
    fn learning_path_skips_completed_and_ends_at_target() {
        let g = sample_graph();
        let path = g.learning_path("derivatives", &completed(&["algebra"]));
        assert_eq!(path, ["functions", "limits", "derivatives"]);

        let full = g.learning_path("derivatives", &BTreeSet::new());
        assert_eq!(full.last().map(String::as_str), Some("derivatives"));
        assert_eq!(full.len(), 4);
    }

    #[test]
    fn map_and_json_round_trip() {
        let g = sample_graph();
        let rebuilt = PrerequisiteGraph::from_map(g.to_map()).unwrap();
        assert_eq!(rebuilt, g);

        let json = g.to_json().unwrap();
        let parsed = PrerequisiteGraph::from_json(&json).unwrap();
        assert_eq!(parsed, g);
    }

    #[test]
    fn from_map_rejects_cyclic_input() {
        let mut data = BTreeMap::new();
        data.insert("a".to_string(), vec!["b".to_string()]);
        data.insert("b".to_string(), vec!["a".to_string()]);
        assert!(PrerequisiteGraph::from_map(data).is_err());
    }
}
