//! Loop unrolling: replace every loop vertex with `max_iterations` copies of
//! its body.
//!
//! Iteration 0 reads the loop's `dag_incoming` edges. Iteration `i > 0` reads
//! the non-iterative edges from their outside sources, and the iterative
//! edges from iteration `i - 1`. The last iteration feeds the `dag_outgoing`
//! destinations. Nested loops come out as loop vertices of the next round,
//! so the pass repeats until none are left.

use std::collections::BTreeMap;

use dagc_core::builder::DagBuilder;
use dagc_core::dag::Dag;
use dagc_core::error::{Error, Result};
use dagc_core::id::VertexId;
use dagc_core::ir::{Edge, Vertex};
use dagc_core::loop_vertex::LoopVertex;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopUnrollingPass;

impl LoopUnrollingPass {
    pub fn apply(&self, mut dag: Dag) -> Result<Dag> {
        let mut round = 0;
        while dag.contains_where(|v| v.is_loop()) {
            round += 1;
            dag = unroll_once(dag)?;
            debug!(round, vertices = dag.vertex_count(), "unrolled loops");
        }
        Ok(dag)
    }
}

#[derive(Debug, Default)]
struct Unrolled {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    /// Edges from the last iteration to outside vertices.
    outgoing: Vec<Edge>,
    /// body vertex -> its copy in the last iteration, over every loop so far
    last_clone: BTreeMap<VertexId, VertexId>,
}

impl Unrolled {
    /// Sources inside a loop unrolled earlier in this round now live in its
    /// last iteration.
    fn outside(&self, v: VertexId) -> VertexId {
        self.last_clone.get(&v).copied().unwrap_or(v)
    }
}

fn unroll_once(dag: Dag) -> Result<Dag> {
    let mut out = Unrolled::default();

    for v in dag.topological_vertices() {
        match v.as_loop() {
            Some(lv) => unroll_loop(&mut out, v.id(), lv)?,
            None => out.vertices.push(v.clone()),
        }
    }

    let mut builder = DagBuilder::new();
    for v in out.vertices {
        builder.add_vertex(v);
    }
    for e in dag.edges() {
        let loop_end = [e.src(), e.dst()]
            .iter()
            .any(|x| dag.vertex(*x).map_or(false, |v| v.is_loop()));
        if !loop_end {
            builder.connect_vertices(e.clone())?;
        }
    }
    for e in out.edges {
        builder.connect_vertices(e)?;
    }
    // Outgoing edges into another loop's body are already covered by that
    // loop's incoming bookkeeping.
    for e in out.outgoing {
        if builder.contains(e.dst()) {
            builder.connect_vertices(e)?;
        }
    }
    builder.build()
}

fn clone_of(clones: &BTreeMap<VertexId, VertexId>, v: VertexId) -> Result<VertexId> {
    clones.get(&v).copied().ok_or(Error::MissingVertex(v))
}

fn unroll_loop(out: &mut Unrolled, loop_id: VertexId, lv: &LoopVertex) -> Result<()> {
    let iterations = lv.max_iterations();
    if iterations == 0 {
        return Err(Error::PassPrecondition {
            pass: "loop-unrolling",
            reason: format!("loop {} ('{}') has zero iterations", loop_id, lv.name()),
        });
    }
    let body = lv.dag()?;

    let mut previous: Option<BTreeMap<VertexId, VertexId>> = None;
    for i in 0..iterations {
        let clones: BTreeMap<VertexId, VertexId> = body
            .topological_sort()
            .iter()
            .map(|v| (*v, VertexId::fresh()))
            .collect();

        let mut external = clones.clone();
        external.extend(out.last_clone.iter().map(|(k, v)| (*k, *v)));
        let in_body = |d: VertexId| {
            clones.contains_key(&d)
                || body.vertices().any(|x| x.as_loop().map_or(false, |l| l.contains(d)))
        };
        for v in body.topological_vertices() {
            let mut copy = v.copy_with_id(clone_of(&clones, v.id())?);
            if let Some(nested) = copy.as_loop_mut() {
                // Only the last iteration's nested results leave this loop.
                if i + 1 < iterations {
                    nested.retain_dag_outgoing_edges(|e| in_body(e.dst()));
                }
                nested.remap_external(&external);
            }
            out.vertices.push(copy);
        }
        for e in body.edges() {
            out.edges.push(e.reconnect(clone_of(&clones, e.src())?, clone_of(&clones, e.dst())?));
        }

        match &previous {
            None => {
                for e in lv.dag_incoming_edges().values().flatten() {
                    if let Some(dst) = clones.get(&e.dst()) {
                        out.edges.push(e.reconnect(out.outside(e.src()), *dst));
                    }
                }
            }
            Some(prev) => {
                for e in lv.non_iterative_incoming_edges().values().flatten() {
                    if let Some(dst) = clones.get(&e.dst()) {
                        out.edges.push(e.reconnect(out.outside(e.src()), *dst));
                    }
                }
                for e in lv.iterative_incoming_edges().values().flatten() {
                    if let (Some(src), Some(dst)) = (prev.get(&e.src()), clones.get(&e.dst())) {
                        out.edges.push(e.reconnect(*src, *dst));
                    }
                }
            }
        }

        if i + 1 == iterations {
            for e in lv.dag_outgoing_edges().values().flatten() {
                if let Some(src) = clones.get(&e.src()) {
                    out.outgoing.push(e.reconnect(*src, e.dst()));
                }
            }
        }
        previous = Some(clones);
    }

    if let Some(last) = previous {
        out.last_clone.extend(last);
    }
    debug!(loop_id = %loop_id, iterations, body_vertices = body.vertex_count(), "unrolled loop");
    Ok(())
}
