//! Loop extraction: turn vertices the front end tagged with a loop context
//! into composite loop vertices.
//!
//! Loops are extracted innermost first. At each depth every edge is sorted
//! into one of four buckets:
//! - both ends outside any loop at this depth: kept as is;
//! - both ends in the same loop: moved into that loop's body;
//! - entering a loop: recorded as a `dag_incoming` edge, plus one stand-in
//!   edge to the loop vertex in the outer graph. Until rolling says
//!   otherwise every iteration reads it, so it is non-iterative as well;
//! - leaving a loop (possibly into another loop): recorded as a
//!   `dag_outgoing` edge (and `dag_incoming` on the receiving loop), plus a
//!   stand-in edge in the outer graph.

use std::collections::BTreeMap;

use dagc_core::builder::DagBuilder;
use dagc_core::dag::Dag;
use dagc_core::error::{Error, Result};
use dagc_core::id::VertexId;
use dagc_core::ir::{Edge, Vertex};
use dagc_core::loop_vertex::{LoopHeader, LoopVertex};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopExtractionPass;

impl LoopExtractionPass {
    pub fn apply(&self, mut dag: Dag) -> Result<Dag> {
        loop {
            let depth = dag.max_loop_depth();
            if depth == 0 {
                return Ok(dag);
            }
            dag = extract_depth(dag, depth)?;
        }
    }
}

fn extract_depth(dag: Dag, depth: usize) -> Result<Dag> {
    // loop id -> (header, loop under construction)
    let mut loops: BTreeMap<VertexId, (LoopHeader, LoopVertex)> = BTreeMap::new();
    let mut member_of: BTreeMap<VertexId, VertexId> = BTreeMap::new();
    let mut outer_vertices: Vec<Vertex> = Vec::new();

    for v in dag.topological_vertices() {
        match dag.assigned_loop_of(v.id()) {
            Some(header) if dag.loop_depth_of(v.id()) == depth => {
                let (_, body) = loops.entry(header.id()).or_insert_with(|| {
                    let lv = LoopVertex::new(header.name(), header.max_iterations());
                    (header.clone(), lv)
                });
                body.builder_mut().add_vertex(v.clone());
                member_of.insert(v.id(), header.id());
            }
            _ => outer_vertices.push(v.clone()),
        }
    }

    let mut outer_edges: Vec<Edge> = Vec::new();
    let mut stand_ins: Vec<Edge> = Vec::new();
    for e in dag.edges() {
        match (member_of.get(&e.src()).copied(), member_of.get(&e.dst()).copied()) {
            (None, None) => outer_edges.push(e.clone()),
            (Some(ls), Some(ld)) if ls == ld => {
                body_of(&mut loops, ls)?.builder_mut().connect_vertices(e.clone())?;
            }
            (None, Some(ld)) => {
                let body = body_of(&mut loops, ld)?;
                body.add_dag_incoming_edge(e.clone());
                body.add_non_iterative_incoming_edge(e.clone());
                stand_ins.push(e.reconnect(e.src(), ld));
            }
            (Some(ls), None) => {
                body_of(&mut loops, ls)?.add_dag_outgoing_edge(e.clone());
                stand_ins.push(e.reconnect(ls, e.dst()));
            }
            (Some(ls), Some(ld)) => {
                body_of(&mut loops, ls)?.add_dag_outgoing_edge(e.clone());
                let body = body_of(&mut loops, ld)?;
                body.add_dag_incoming_edge(e.clone());
                body.add_non_iterative_incoming_edge(e.clone());
                stand_ins.push(e.reconnect(ls, ld));
            }
        }
    }

    let mut builder = DagBuilder::new();
    for v in outer_vertices {
        builder.add_vertex_like(v, &dag);
    }
    let extracted = loops.len();
    for (id, (header, body)) in loops {
        debug!(loop_id = %id, name = header.name(), body_vertices = body.builder().vertex_count(), "extracted loop");
        let vertex = Vertex::looped(id, body);
        match header.enclosing() {
            Some(enclosing) => builder.add_vertex_in_loop(vertex, enclosing),
            None => builder.add_vertex(vertex),
        };
    }
    for e in outer_edges {
        builder.connect_vertices(e)?;
    }
    for e in stand_ins {
        if !builder.has_edge_between(e.src(), e.dst()) {
            builder.connect_vertices(e)?;
        }
    }
    debug!(depth, loops = extracted, "extracted loops at depth");
    builder.build()
}

fn body_of(
    loops: &mut BTreeMap<VertexId, (LoopHeader, LoopVertex)>,
    id: VertexId,
) -> Result<&mut LoopVertex> {
    loops
        .get_mut(&id)
        .map(|(_, body)| body)
        .ok_or(Error::MissingVertex(id))
}
