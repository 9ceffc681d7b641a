//! Loop-invariant code motion.
//!
//! A body vertex is invariant when nothing inside the body feeds it, no
//! loop-carried edge enters it, and every iteration reads the same outside
//! inputs. Such a vertex computes the same result in every iteration, so it
//! moves out of the loop and runs once.
//!
//! Moving a vertex touches three places that must stay in sync:
//! 1. the loop's edge bookkeeping (its internal outputs become loop inputs,
//!    its outside outputs leave the loop's outgoing set);
//! 2. the body builder (the vertex and its internal edges are removed);
//! 3. the enclosing builder (the vertex is added with its inputs, plus an
//!    edge into the loop, and the loop's boundary edges are recomputed).
//!
//! Hoisting repeats until no vertex qualifies. A body is never emptied.

use std::collections::{BTreeMap, BTreeSet};

use dagc_core::builder::DagBuilder;
use dagc_core::dag::Dag;
use dagc_core::error::{Error, Result};
use dagc_core::id::VertexId;
use dagc_core::ir::Edge;
use dagc_core::loop_vertex::LoopVertex;
use tracing::debug;

use super::loop_bodies;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopInvariantCodeMotionPass;

impl LoopInvariantCodeMotionPass {
    pub fn apply(&self, dag: Dag) -> Result<Dag> {
        let loops = loop_bodies(&dag);
        if loops.is_empty() {
            return Ok(dag);
        }
        let mut builder = dag.into_builder();
        for (loop_id, mut lv) in loops {
            let mut hoisted = 0;
            while let Some(v) = next_invariant(&lv)? {
                hoist(&mut builder, loop_id, &mut lv, v)?;
                hoisted += 1;
            }
            if hoisted > 0 {
                sync_boundary(&mut builder, loop_id, &lv)?;
                debug!(loop_id = %loop_id, hoisted, body_vertices = lv.builder().vertex_count(), "hoisted loop invariants");
            }
            let slot = builder
                .vertex_mut(loop_id)
                .and_then(|v| v.as_loop_mut())
                .ok_or(Error::MissingVertex(loop_id))?;
            *slot = lv;
        }
        builder.build()
    }
}

fn srcs(edges: Option<&Vec<Edge>>) -> BTreeSet<VertexId> {
    edges.into_iter().flatten().map(|e| e.src()).collect()
}

/// First invariant body vertex in body topological order, if any.
fn next_invariant(lv: &LoopVertex) -> Result<Option<VertexId>> {
    if lv.builder().vertex_count() <= 1 {
        return Ok(None);
    }
    let body = lv.dag()?;
    for v in body.topological_vertices() {
        let id = v.id();
        if v.is_loop() || !body.incoming_edges_of(id).is_empty() {
            continue;
        }
        if lv.iterative_incoming_edges().get(&id).map_or(false, |es| !es.is_empty()) {
            continue;
        }
        let every_iteration = srcs(lv.non_iterative_incoming_edges().get(&id));
        let first_iteration = srcs(lv.dag_incoming_edges().get(&id));
        if !every_iteration.is_empty() && every_iteration == first_iteration {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

/// Where an edge endpoint lives in the enclosing graph: the vertex itself, or
/// the loop vertex whose body holds it.
fn outer_endpoint(builder: &DagBuilder, v: VertexId) -> Option<VertexId> {
    if builder.contains(v) {
        return Some(v);
    }
    builder
        .vertices()
        .find(|x| x.as_loop().map_or(false, |l| l.contains(v)))
        .map(|x| x.id())
}

fn hoist(builder: &mut DagBuilder, loop_id: VertexId, lv: &mut LoopVertex, v: VertexId) -> Result<()> {
    // (1) bookkeeping
    let inputs = lv.take_dag_incoming_edges(v);
    lv.take_non_iterative_incoming_edges(v);
    let internal_outputs: Vec<Edge> = lv
        .builder()
        .outgoing_edges_of(v)
        .into_iter()
        .cloned()
        .collect();
    for e in &internal_outputs {
        lv.add_dag_incoming_edge(e.clone());
        lv.add_non_iterative_incoming_edge(e.clone());
    }
    let outside_outputs = lv.take_dag_outgoing_edges(v);

    // (2) body
    let vertex = lv.builder_mut().remove_vertex(v)?;

    // (3) enclosing graph
    builder.add_vertex(vertex);
    for e in inputs {
        let Some(src) = outer_endpoint(builder, e.src()) else {
            return Err(Error::MissingVertex(e.src()));
        };
        if src == e.src() {
            builder.connect_vertices(e)?;
        } else if !builder.has_edge_between(src, v) {
            builder.connect_vertices(e.reconnect(src, v))?;
        }
    }
    for e in outside_outputs {
        let Some(dst) = outer_endpoint(builder, e.dst()) else {
            return Err(Error::MissingVertex(e.dst()));
        };
        if dst == e.dst() {
            builder.connect_vertices(e)?;
        } else if !builder.has_edge_between(v, dst) {
            builder.connect_vertices(e.reconnect(v, dst))?;
        }
    }
    if let Some(e) = internal_outputs.first() {
        builder.connect_vertices(e.reconnect(v, loop_id))?;
    }
    Ok(())
}

/// Make the enclosing graph's edges around `loop_id` match its bookkeeping,
/// keeping edges that are still justified.
fn sync_boundary(builder: &mut DagBuilder, loop_id: VertexId, lv: &LoopVertex) -> Result<()> {
    let mut wanted_in: BTreeMap<VertexId, Edge> = BTreeMap::new();
    for e in lv
        .dag_incoming_edges()
        .values()
        .chain(lv.non_iterative_incoming_edges().values())
        .flatten()
    {
        if let Some(src) = outer_endpoint(builder, e.src()).filter(|s| *s != loop_id) {
            wanted_in.entry(src).or_insert_with(|| e.clone());
        }
    }
    let mut wanted_out: BTreeMap<VertexId, Edge> = BTreeMap::new();
    for e in lv.dag_outgoing_edges().values().flatten() {
        if let Some(dst) = outer_endpoint(builder, e.dst()).filter(|d| *d != loop_id) {
            wanted_out.entry(dst).or_insert_with(|| e.clone());
        }
    }

    let stale: Vec<_> = builder
        .incoming_edges_of(loop_id)
        .into_iter()
        .filter(|e| !wanted_in.contains_key(&e.src()))
        .chain(
            builder
                .outgoing_edges_of(loop_id)
                .into_iter()
                .filter(|e| !wanted_out.contains_key(&e.dst())),
        )
        .map(|e| e.id())
        .collect();
    for id in stale {
        builder.remove_edge(id);
    }

    for (src, template) in wanted_in {
        if !builder.has_edge_between(src, loop_id) {
            builder.connect_vertices(template.reconnect(src, loop_id))?;
        }
    }
    for (dst, template) in wanted_out {
        if !builder.has_edge_between(loop_id, dst) {
            builder.connect_vertices(template.reconnect(loop_id, dst))?;
        }
    }
    Ok(())
}
