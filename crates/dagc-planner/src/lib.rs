#![forbid(unsafe_code)]
//! dagc-planner: validated DAG → optimized DAG → physical plan.
//!
//! Design:
//! - Passes are closed sum types (`Pass`, `AnnotatingPass`, `ReshapingPass`)
//!   dispatched by `match`; a `CompositePass` runs a list of them in order.
//! - Loop handling is a pipeline of reshaping passes: extraction, rolling,
//!   invariant code motion, unrolling. Annotating passes then set
//!   parallelism, placement, relay settings and stage ids.
//! - `policy` assembles the composite the config names; `compile` runs it and
//!   hands the result to `dagc-stage` for lowering.
//! - `dsl::yaml` loads a graph description into a `DagBuilder`.

pub mod dsl;
pub mod pass;
pub mod policy;

use dagc_core::builder::DagBuilder;
use dagc_core::config::CompilerConfig;
use dagc_core::dag::Dag;
use dagc_core::error::Result;
use dagc_stage::{lower_to_physical, verify_physical_plan, PhysicalPlan};
use tracing::info;

pub use dsl::yaml::{parse_yaml_graph, ParsedGraph};
pub use pass::{AnnotatingPass, Annotation, CompositePass, Pass, ReshapingPass};
pub use policy::policy_for;

/// Validate `builder` and run the configured policy over it.
pub fn optimize(builder: DagBuilder, config: &CompilerConfig) -> Result<Dag> {
    config.validate()?;
    let dag = builder.build()?;
    let policy = policy_for(config)?;
    let vertices = dag.vertex_count();
    let optimized = policy.apply(dag)?;
    info!(
        policy = policy.name(),
        vertices_before = vertices,
        vertices_after = optimized.vertex_count(),
        "optimized DAG"
    );
    Ok(optimized)
}

/// Compile a front-end graph into a physical plan.
pub fn compile(builder: DagBuilder, config: &CompilerConfig) -> Result<PhysicalPlan> {
    let optimized = optimize(builder, config)?;
    let plan = lower_to_physical(&optimized)?;
    if config.verify_stages {
        verify_physical_plan(&plan, &optimized)?;
    }
    Ok(plan)
}
