use std::collections::BTreeMap;

use dagc_core::dag::Dag;
use dagc_core::id::VertexId;
use dagc_core::property::ExecutionProperty;

use super::Annotation;

/// Sources run with a fixed parallelism; every other vertex runs as wide as
/// its widest non-side-input parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelismPass {
    pub source_parallelism: usize,
}

impl ParallelismPass {
    pub fn new(source_parallelism: usize) -> Self {
        Self { source_parallelism }
    }

    pub fn annotate(&self, dag: &Dag) -> Vec<Annotation> {
        let mut assigned: BTreeMap<VertexId, usize> = BTreeMap::new();
        for v in dag.topological_vertices() {
            let parallelism = if v.is_source() {
                self.source_parallelism
            } else {
                dag.incoming_edges_of(v.id())
                    .iter()
                    .filter(|e| !e.is_side_input())
                    .filter_map(|e| assigned.get(&e.src()).copied())
                    .max()
                    .unwrap_or_else(|| v.properties().parallelism())
            };
            assigned.insert(v.id(), parallelism);
        }
        assigned
            .into_iter()
            .map(|(v, p)| Annotation::Vertex(v, ExecutionProperty::Parallelism(p)))
            .collect()
    }
}
