//! Mission DAG: orders stages by their declared `depends_on`
//! edges and groups mutually-independent stages into batches so the
//! orchestrator can run each batch concurrently.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::stage::StageSpec;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DagError {
    #[error("duplicate stage id: {0}")]
    DuplicateId(String),
    #[error("stage {stage} depends on unknown stage {dependency}")]
    UnknownDependency { stage: String, dependency: String },
    #[error("cycle detected among stages: {0:?}")]
    Cycle(Vec<String>),
}

pub struct MissionDag {
    specs: HashMap<String, StageSpec>,
    order: Vec<String>,
}

impl MissionDag {
    /// Validates the design set (no duplicates, no dangling edges, no
    /// cycles) and precomputes a deterministic topological order.
    pub fn build(specs: Vec<StageSpec>) -> Result<Self, DagError> {
        let mut by_id: HashMap<String, StageSpec> = HashMap::new();
        for spec in specs {
            let id = spec.id.clone();
            if by_id.insert(id.clone(), spec).is_some() {
                return Err(DagError::DuplicateId(id));
            }
        }
        for spec in by_id.values() {
            for dep in &spec.depends_on {
                if !by_id.contains_key(dep) {
                    return Err(DagError::UnknownDependency {
                        stage: spec.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let order = topological_order(&by_id)?;
        Ok(Self { specs: by_id, order })
    }

    /// Groups stages into batches: batch N contains every stage whose
    /// dependencies are all satisfied by batches `0..N`. Stages within a
    /// batch have no edges between them and are safe to run concurrently.
    pub fn batches(&self) -> Vec<Vec<String>> {
        let mut satisfied: HashSet<String> = HashSet::new();
        let mut remaining: Vec<&String> = self.order.iter().collect();
        let mut batches = Vec::new();

        while !remaining.is_empty() {
            let (ready, not_ready): (Vec<&String>, Vec<&String>) = remaining.into_iter().partition(|id| {
                self.specs[*id].depends_on.iter().all(|d| satisfied.contains(d))
            });
            debug_assert!(!ready.is_empty(), "topological order guarantees progress every round");
            for id in &ready {
                satisfied.insert((*id).clone());
            }
            batches.push(ready.into_iter().cloned().collect());
            remaining = not_ready;
        }
        batches
    }

    pub fn stage_ids(&self) -> &[String] {
        &self.order
    }
}

fn topological_order(specs: &HashMap<String, StageSpec>) -> Result<Vec<String>, DagError> {
    let mut ids: Vec<&String> = specs.keys().collect();
    ids.sort();

    let mut visited: HashSet<String> = HashSet::new();
    let mut in_progress: HashSet<String> = HashSet::new();
    let mut order = Vec::with_capacity(specs.len());

    fn visit(
        id: &str,
        specs: &HashMap<String, StageSpec>,
        visited: &mut HashSet<String>,
        in_progress: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), DagError> {
        if visited.contains(id) {
            return Ok(());
        }
        if in_progress.contains(id) {
            return Err(DagError::Cycle(in_progress.iter().cloned().collect()));
        }
        in_progress.insert(id.to_string());
        let mut deps: Vec<&String> = specs[id].depends_on.iter().collect();
        deps.sort();
        for dep in deps {
            visit(dep, specs, visited, in_progress, order)?;
        }
        in_progress.remove(id);
        visited.insert(id.to_string());
        order.push(id.to_string());
        Ok(())
    }

    for id in ids {
        visit(id, specs, &mut visited, &mut in_progress, &mut order)?;
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_chain_is_one_stage_per_batch() {
        let dag = MissionDag::build(vec![
            StageSpec::root("a"),
            StageSpec::new("b", vec!["a".to_string()]),
            StageSpec::new("c", vec!["b".to_string()]),
        ])
        .expect("valid dag");
        let batches = dag.batches();
        assert_eq!(batches, vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]]);
    }

    #[test]
    fn independent_stages_share_a_batch() {
        let dag = MissionDag::build(vec![
            StageSpec::root("fetch"),
            StageSpec::new("memory_vector_write", vec!["fetch".to_string()]),
            StageSpec::new("memory_graph_write", vec!["fetch".to_string()]),
            StageSpec::new("synth", vec!["memory_vector_write".to_string(), "memory_graph_write".to_string()]),
        ])
        .expect("valid dag");
        let batches = dag.batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1].len(), 2);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = MissionDag::build(vec![StageSpec::new("a", vec!["ghost".to_string()])]).unwrap_err();
        assert_eq!(
            err,
            DagError::UnknownDependency {
                stage: "a".to_string(),
                dependency: "ghost".to_string()
            }
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let err = MissionDag::build(vec![
            StageSpec::new("a", vec!["b".to_string()]),
            StageSpec::new("b", vec!["a".to_string()]),
        ])
        .unwrap_err();
        assert!(matches!(err, DagError::Cycle(_)));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let err = MissionDag::build(vec![StageSpec::root("a"), StageSpec::root("a")]).unwrap_err();
        assert_eq!(err, DagError::DuplicateId("a".to_string()));
    }
}
