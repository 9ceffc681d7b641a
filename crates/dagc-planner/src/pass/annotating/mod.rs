//! Annotating passes.
//!
//! Each pass inspects a `Dag` and emits a list of `Annotation`s. Applying the
//! pass writes them into the owning property maps and rebuilds, so the
//! topology is unchanged and re-applying the same pass is a no-op. Only
//! top-level vertices and edges are annotated; loop bodies are annotated once
//! they have been unrolled into the top level.

mod parallelism;
mod placement;
mod relay;
mod skew;
mod stage_id;

use dagc_core::dag::Dag;
use dagc_core::error::Result;
use dagc_core::id::{EdgeId, VertexId};
use dagc_core::property::ExecutionProperty;

pub use parallelism::ParallelismPass;
pub use placement::ResourcePlacementPass;
pub use relay::{RelayDataFlowModelPass, RelayDataStorePass};
pub use skew::SkewMetricCollectionPass;
pub use stage_id::StageIdPass;

/// A property to write onto one vertex or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    Vertex(VertexId, ExecutionProperty),
    Edge(EdgeId, ExecutionProperty),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotatingPass {
    Parallelism(ParallelismPass),
    SkewMetricCollection(SkewMetricCollectionPass),
    RelayDataStore(RelayDataStorePass),
    RelayDataFlowModel(RelayDataFlowModelPass),
    ResourcePlacement(ResourcePlacementPass),
    StageId(StageIdPass),
}

impl AnnotatingPass {
    pub fn name(&self) -> &'static str {
        match self {
            AnnotatingPass::Parallelism(_) => "parallelism",
            AnnotatingPass::SkewMetricCollection(_) => "skew-metric-collection",
            AnnotatingPass::RelayDataStore(_) => "relay-data-store",
            AnnotatingPass::RelayDataFlowModel(_) => "relay-data-flow-model",
            AnnotatingPass::ResourcePlacement(_) => "resource-placement",
            AnnotatingPass::StageId(_) => "stage-id",
        }
    }

    pub fn annotate(&self, dag: &Dag) -> Result<Vec<Annotation>> {
        match self {
            AnnotatingPass::Parallelism(p) => Ok(p.annotate(dag)),
            AnnotatingPass::SkewMetricCollection(p) => Ok(p.annotate(dag)),
            AnnotatingPass::RelayDataStore(p) => Ok(p.annotate(dag)),
            AnnotatingPass::RelayDataFlowModel(p) => Ok(p.annotate(dag)),
            AnnotatingPass::ResourcePlacement(p) => Ok(p.annotate(dag)),
            AnnotatingPass::StageId(p) => p.annotate(dag),
        }
    }

    pub fn apply(&self, dag: Dag) -> Result<Dag> {
        let annotations = self.annotate(&dag)?;
        let mut builder = dag.into_builder();
        for a in annotations {
            match a {
                Annotation::Vertex(id, p) => {
                    if let Some(v) = builder.vertex_mut(id) {
                        v.properties_mut().put(p);
                    }
                }
                Annotation::Edge(id, p) => {
                    if let Some(e) = builder.edge_mut(id) {
                        e.properties_mut().put(p);
                    }
                }
            }
        }
        builder.build()
    }
}

macro_rules! annotating_pass {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for AnnotatingPass {
                fn from(p: $ty) -> Self {
                    AnnotatingPass::$variant(p)
                }
            }

            impl From<$ty> for super::Pass {
                fn from(p: $ty) -> Self {
                    super::Pass::Annotating(AnnotatingPass::$variant(p))
                }
            }
        )*
    };
}

annotating_pass!(
    Parallelism(ParallelismPass),
    SkewMetricCollection(SkewMetricCollectionPass),
    RelayDataStore(RelayDataStorePass),
    RelayDataFlowModel(RelayDataFlowModelPass),
    ResourcePlacement(ResourcePlacementPass),
    StageId(StageIdPass),
);
