//! Pass framework.
//!
//! A pass maps one validated `Dag` to another. There are three closed kinds:
//! - annotating passes only write execution properties of existing
//!   vertices/edges and leave the topology alone;
//! - reshaping passes add, remove or rewire vertices and edges;
//! - composite passes run a list of passes in order.
//!
//! Every pass returns a `Dag` produced by a fresh `DagBuilder::build`, so the
//! integrity rules hold after each step.

pub mod annotating;
pub mod reshaping;

use dagc_core::dag::Dag;
use dagc_core::error::Result;
use tracing::debug;

pub use annotating::{
    AnnotatingPass, Annotation, ParallelismPass, RelayDataFlowModelPass, RelayDataStorePass,
    ResourcePlacementPass, SkewMetricCollectionPass, StageIdPass,
};
pub use reshaping::{
    LoopExtractionPass, LoopInvariantCodeMotionPass, LoopRollingPass, LoopUnrollingPass,
    RelayInsertionPass, ReshapingPass,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pass {
    Annotating(AnnotatingPass),
    Reshaping(ReshapingPass),
    Composite(CompositePass),
}

impl Pass {
    pub fn name(&self) -> &str {
        match self {
            Pass::Annotating(p) => p.name(),
            Pass::Reshaping(p) => p.name(),
            Pass::Composite(p) => p.name(),
        }
    }

    pub fn apply(&self, dag: Dag) -> Result<Dag> {
        let (vertices, edges) = (dag.vertex_count(), dag.edge_count());
        let out = match self {
            Pass::Annotating(p) => p.apply(dag)?,
            Pass::Reshaping(p) => p.apply(dag)?,
            Pass::Composite(p) => p.apply(dag)?,
        };
        debug!(
            pass = self.name(),
            vertices_before = vertices,
            vertices_after = out.vertex_count(),
            edges_before = edges,
            edges_after = out.edge_count(),
            "applied pass"
        );
        Ok(out)
    }
}

impl From<AnnotatingPass> for Pass {
    fn from(p: AnnotatingPass) -> Self {
        Pass::Annotating(p)
    }
}

impl From<ReshapingPass> for Pass {
    fn from(p: ReshapingPass) -> Self {
        Pass::Reshaping(p)
    }
}

impl From<CompositePass> for Pass {
    fn from(p: CompositePass) -> Self {
        Pass::Composite(p)
    }
}

/// An ordered list of passes applied one after another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositePass {
    name: String,
    passes: Vec<Pass>,
}

impl CompositePass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passes: Vec::new(),
        }
    }

    /// Append a pass; builder style.
    pub fn with(mut self, pass: impl Into<Pass>) -> Self {
        self.passes.push(pass.into());
        self
    }

    pub fn push(&mut self, pass: impl Into<Pass>) {
        self.passes.push(pass.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// The non-composite passes in application order, nested composites expanded.
    pub fn flattened(&self) -> Vec<Pass> {
        let mut out = Vec::new();
        for p in &self.passes {
            match p {
                Pass::Composite(c) => out.extend(c.flattened()),
                other => out.push(other.clone()),
            }
        }
        out
    }

    pub fn apply(&self, dag: Dag) -> Result<Dag> {
        self.passes.iter().try_fold(dag, |dag, pass| pass.apply(dag))
    }
}
