//! Stage-level verification helpers.
//!
//! These restate the logical DAG's shape rules over stages: the stage graph
//! is acyclic, every stage without inputs starts at a source, and every stage
//! without outputs ends at a non-source vertex. Every logical edge kept inside
//! a stage must be a one-to-one, non-side-input edge. They are cheap and run
//! after lowering unless the config disables them.

use std::collections::{BTreeMap, BTreeSet};

use dagc_core::dag::Dag;
use dagc_core::error::{Error, Result};
use dagc_core::id::{StageId, VertexId};
use dagc_core::property::CommunicationPattern;

use crate::physical::PhysicalPlan;

pub fn verify_physical_plan(plan: &PhysicalPlan, dag: &Dag) -> Result<()> {
    let order = plan.topological_stages();
    if order.len() != plan.stage_count() {
        let placed: BTreeSet<_> = order.into_iter().collect();
        let on_cycle: Vec<String> = plan
            .stages
            .keys()
            .filter(|s| !placed.contains(s))
            .map(|s| s.to_string())
            .collect();
        return Err(Error::Lowering(format!("stage graph has a cycle through {:?}", on_cycle)));
    }

    let mut seen: BTreeSet<VertexId> = BTreeSet::new();
    let mut stage_of: BTreeMap<VertexId, StageId> = BTreeMap::new();
    for stage in plan.stages.values() {
        let (Some(first), Some(last)) = (stage.first_vertex(), stage.last_vertex()) else {
            return Err(Error::Lowering(format!("stage {} is empty", stage.id)));
        };
        for v in &stage.vertices {
            if !seen.insert(*v) {
                return Err(Error::Lowering(format!("vertex {} is in more than one stage", v)));
            }
            stage_of.insert(*v, stage.id);
        }

        let is_source = |v: VertexId| dag.vertex(v).map_or(false, |x| x.is_source());
        if plan.incoming_stage_edges(stage.id).is_empty() && !is_source(first) {
            return Err(Error::Lowering(format!(
                "stage {} has no inputs but starts at non-source {}",
                stage.id, first
            )));
        }
        if plan.outgoing_stage_edges(stage.id).is_empty() && is_source(last) {
            return Err(Error::Lowering(format!(
                "stage {} has no outputs but ends at source {}",
                stage.id, last
            )));
        }
    }

    if seen.len() != dag.vertex_count() {
        return Err(Error::Lowering(format!(
            "{} of {} vertices were assigned to stages",
            seen.len(),
            dag.vertex_count()
        )));
    }

    for e in dag.edges() {
        let (Some(src), Some(dst)) = (stage_of.get(&e.src()), stage_of.get(&e.dst())) else {
            continue;
        };
        if src == dst && (e.pattern() != CommunicationPattern::OneToOne || e.is_side_input()) {
            return Err(Error::Lowering(format!(
                "stage {} holds {:?} edge {} ({} -> {})",
                src,
                e.pattern(),
                e.id(),
                e.src(),
                e.dst()
            )));
        }
    }
    Ok(())
}
