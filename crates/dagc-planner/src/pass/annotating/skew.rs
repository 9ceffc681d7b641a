use dagc_core::dag::Dag;
use dagc_core::property::{
    CommunicationPattern, DataFlowModel, ExecutionProperty, MetricCollection,
};

use super::Annotation;

/// Tags every shuffle edge for data-skew metric collection. Pushed edges are
/// left alone: their data is never stored whole, so it cannot be measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkewMetricCollectionPass;

impl SkewMetricCollectionPass {
    pub fn annotate(&self, dag: &Dag) -> Vec<Annotation> {
        dag.edges()
            .filter(|e| e.pattern() == CommunicationPattern::Shuffle)
            .filter(|e| e.properties().data_flow_model() != DataFlowModel::Push)
            .map(|e| {
                Annotation::Edge(
                    e.id(),
                    ExecutionProperty::MetricCollection(MetricCollection::DataSkew),
                )
            })
            .collect()
    }
}
