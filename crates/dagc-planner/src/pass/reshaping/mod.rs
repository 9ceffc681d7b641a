//! Reshaping passes: rewrites that change the topology.
//!
//! Each pass seeds a builder from its input, rewires it, and returns the
//! result of a full `build()`.

mod extraction;
mod licm;
mod relay;
mod rolling;
mod unrolling;

use std::collections::BTreeMap;

use dagc_core::dag::Dag;
use dagc_core::error::Result;
use dagc_core::id::VertexId;
use dagc_core::loop_vertex::LoopVertex;

pub use extraction::LoopExtractionPass;
pub use licm::LoopInvariantCodeMotionPass;
pub use relay::RelayInsertionPass;
pub use rolling::LoopRollingPass;
pub use unrolling::LoopUnrollingPass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReshapingPass {
    LoopExtraction(LoopExtractionPass),
    LoopRolling(LoopRollingPass),
    LoopInvariantCodeMotion(LoopInvariantCodeMotionPass),
    LoopUnrolling(LoopUnrollingPass),
    RelayInsertion(RelayInsertionPass),
}

impl ReshapingPass {
    pub fn name(&self) -> &'static str {
        match self {
            ReshapingPass::LoopExtraction(_) => "loop-extraction",
            ReshapingPass::LoopRolling(_) => "loop-rolling",
            ReshapingPass::LoopInvariantCodeMotion(_) => "loop-invariant-code-motion",
            ReshapingPass::LoopUnrolling(_) => "loop-unrolling",
            ReshapingPass::RelayInsertion(_) => "relay-insertion",
        }
    }

    pub fn apply(&self, dag: Dag) -> Result<Dag> {
        match self {
            ReshapingPass::LoopExtraction(p) => p.apply(dag),
            ReshapingPass::LoopRolling(p) => p.apply(dag),
            ReshapingPass::LoopInvariantCodeMotion(p) => p.apply(dag),
            ReshapingPass::LoopUnrolling(p) => p.apply(dag),
            ReshapingPass::RelayInsertion(p) => p.apply(dag),
        }
    }
}

/// Owned copies of every top-level loop vertex's body and bookkeeping.
pub(crate) fn loop_bodies(dag: &Dag) -> BTreeMap<VertexId, LoopVertex> {
    dag.loop_vertices()
        .into_iter()
        .filter_map(|v| v.as_loop().map(|l| (v.id(), l.clone())))
        .collect()
}

macro_rules! reshaping_pass {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for ReshapingPass {
                fn from(p: $ty) -> Self {
                    ReshapingPass::$variant(p)
                }
            }

            impl From<$ty> for super::Pass {
                fn from(p: $ty) -> Self {
                    super::Pass::Reshaping(ReshapingPass::$variant(p))
                }
            }
        )*
    };
}

reshaping_pass!(
    LoopExtraction(LoopExtractionPass),
    LoopRolling(LoopRollingPass),
    LoopInvariantCodeMotion(LoopInvariantCodeMotionPass),
    LoopUnrolling(LoopUnrollingPass),
    RelayInsertion(RelayInsertionPass),
);
