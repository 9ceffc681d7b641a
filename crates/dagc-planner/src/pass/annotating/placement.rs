use std::collections::BTreeMap;

use dagc_core::dag::Dag;
use dagc_core::id::VertexId;
use dagc_core::property::{CommunicationPattern, ExecutionProperty, ExecutorPlacement};

use super::Annotation;

/// Puts cheap, restartable work on transient executors and everything that
/// receives redistributed data on reserved ones.
///
/// - sources are transient;
/// - a vertex with any shuffle or broadcast input is reserved;
/// - otherwise a vertex is reserved if a one-to-one parent is, else transient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourcePlacementPass;

impl ResourcePlacementPass {
    pub fn annotate(&self, dag: &Dag) -> Vec<Annotation> {
        let mut placed: BTreeMap<VertexId, ExecutorPlacement> = BTreeMap::new();
        for v in dag.topological_vertices() {
            let incoming = dag.incoming_edges_of(v.id());
            let placement = if v.is_source() {
                ExecutorPlacement::Transient
            } else if incoming
                .iter()
                .any(|e| e.pattern() != CommunicationPattern::OneToOne)
            {
                ExecutorPlacement::Reserved
            } else if incoming
                .iter()
                .any(|e| placed.get(&e.src()) == Some(&ExecutorPlacement::Reserved))
            {
                ExecutorPlacement::Reserved
            } else {
                ExecutorPlacement::Transient
            };
            placed.insert(v.id(), placement);
        }
        placed
            .into_iter()
            .map(|(v, p)| Annotation::Vertex(v, ExecutionProperty::ExecutorPlacement(p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::AnnotatingPass;
    use dagc_core::builder::DagBuilder;
    use dagc_core::ir::{Coder, Edge, Vertex};

    #[test]
    fn test_reserved_propagates_along_one_to_one() {
        let s = Vertex::source("in");
        let map = Vertex::operator("map");
        let reduce = Vertex::operator("reduce");
        let write = Vertex::operator("write");
        let mut builder = DagBuilder::new();
        for v in [&s, &map, &reduce, &write] {
            builder.add_vertex((*v).clone());
        }
        let link = |p, a: &Vertex, b: &Vertex| Edge::new(p, a.id(), b.id(), Coder::bytes());
        builder.connect_vertices(link(CommunicationPattern::OneToOne, &s, &map)).unwrap();
        builder.connect_vertices(link(CommunicationPattern::Shuffle, &map, &reduce)).unwrap();
        builder.connect_vertices(link(CommunicationPattern::OneToOne, &reduce, &write)).unwrap();

        let out = AnnotatingPass::from(ResourcePlacementPass)
            .apply(builder.build().unwrap())
            .unwrap();
        let placement = |v: &Vertex| out.vertex(v.id()).unwrap().properties().executor_placement();
        assert_eq!(placement(&s), ExecutorPlacement::Transient);
        assert_eq!(placement(&map), ExecutorPlacement::Transient);
        assert_eq!(placement(&reduce), ExecutorPlacement::Reserved);
        assert_eq!(placement(&write), ExecutorPlacement::Reserved);
    }
}
