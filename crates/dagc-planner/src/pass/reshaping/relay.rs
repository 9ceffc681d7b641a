use dagc_core::builder::DagBuilder;
use dagc_core::dag::Dag;
use dagc_core::error::{Error, Result};
use dagc_core::ir::{Edge, Vertex};
use dagc_core::property::{CommunicationPattern, ExecutionProperty};
use tracing::debug;

/// Splits every shuffle edge `src -> dst` into `src -shuffle-> relay -one-to-one-> dst`.
///
/// The relay takes the receiver's parallelism and placement, so it can share
/// the receiver's stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayInsertionPass;

impl RelayInsertionPass {
    pub fn apply(&self, dag: Dag) -> Result<Dag> {
        let shuffles: Vec<&Edge> = dag
            .edges()
            .filter(|e| e.pattern() == CommunicationPattern::Shuffle)
            .collect();
        if shuffles.is_empty() {
            return Err(Error::PassPrecondition {
                pass: "relay-insertion",
                reason: "the DAG has no shuffle edge to relay".into(),
            });
        }

        let mut builder = DagBuilder::from_dag(&dag);
        for e in &shuffles {
            let receiver = dag.vertex(e.dst()).ok_or(Error::MissingVertex(e.dst()))?;
            let mut relay = Vertex::relay();
            relay
                .properties_mut()
                .put(ExecutionProperty::Parallelism(receiver.properties().parallelism()));
            relay.properties_mut().put(ExecutionProperty::ExecutorPlacement(
                receiver.properties().executor_placement(),
            ));
            let relay_id = relay.id();

            builder.remove_edge(e.id());
            builder.add_vertex(relay);
            builder.connect_vertices(e.reconnect(e.src(), relay_id))?;
            builder.connect_vertices(Edge::new(
                CommunicationPattern::OneToOne,
                relay_id,
                e.dst(),
                e.coder().clone(),
            ))?;
        }
        debug!(relays = shuffles.len(), "inserted relay vertices");
        builder.build()
    }
}
