//! Properties for edges around relay vertices: the sender pushes shuffle
//! output into the relay's serialized memory, and the relay spills it to
//! remote storage for the receivers.

use dagc_core::dag::Dag;
use dagc_core::ir::Edge;
use dagc_core::property::{
    CommunicationPattern, DataFlowModel, DataStore, ExecutionProperty, MetricCollection,
};

use super::Annotation;

fn into_relay(dag: &Dag, e: &Edge) -> bool {
    e.pattern() == CommunicationPattern::Shuffle && dag.vertex(e.dst()).map_or(false, |v| v.is_relay())
}

fn out_of_relay(dag: &Dag, e: &Edge) -> bool {
    dag.vertex(e.src()).map_or(false, |v| v.is_relay())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayDataStorePass;

impl RelayDataStorePass {
    pub fn annotate(&self, dag: &Dag) -> Vec<Annotation> {
        let mut out = Vec::new();
        for e in dag.edges() {
            if into_relay(dag, e) {
                out.push(Annotation::Edge(
                    e.id(),
                    ExecutionProperty::DataStore(DataStore::SerializedMemory),
                ));
            } else if out_of_relay(dag, e) {
                out.push(Annotation::Edge(
                    e.id(),
                    ExecutionProperty::DataStore(DataStore::RemoteFile),
                ));
            }
        }
        out
    }
}

/// Shuffle edges into a relay push. Edges already tagged for skew metric
/// collection keep pulling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayDataFlowModelPass;

impl RelayDataFlowModelPass {
    pub fn annotate(&self, dag: &Dag) -> Vec<Annotation> {
        dag.edges()
            .filter(|e| into_relay(dag, e))
            .filter(|e| e.properties().metric_collection() != Some(MetricCollection::DataSkew))
            .map(|e| Annotation::Edge(e.id(), ExecutionProperty::DataFlowModel(DataFlowModel::Push)))
            .collect()
    }
}
