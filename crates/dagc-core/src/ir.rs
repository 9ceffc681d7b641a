//! Vertex and edge IR.
//!
//! Vertices are a closed sum type (`VertexKind`): sources, operators, and
//! composite loops that own a nested body. Both vertices and edges carry their
//! own `ExecutionPropertyMap`.

use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, VertexId};
use crate::loop_vertex::LoopVertex;
use crate::property::{CommunicationPattern, ExecutionPropertyMap};

/// Serialization descriptor for the records flowing across an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coder(String);

impl Coder {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn bytes() -> Self {
        Self("bytes".into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Coder {
    fn default() -> Self {
        Self::bytes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceVertex {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorVertex {
    /// Name of the user transform this operator runs.
    pub transform: String,
    /// Set only on operators inserted by the compiler to relay a shuffle.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub relay: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VertexKind {
    Source(SourceVertex),
    Operator(OperatorVertex),
    Loop(Box<LoopVertex>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    id: VertexId,
    kind: VertexKind,
    properties: ExecutionPropertyMap,
}

impl Vertex {
    fn with_kind(id: VertexId, kind: VertexKind) -> Self {
        Self {
            id,
            kind,
            properties: ExecutionPropertyMap::for_vertex(id.to_string()),
        }
    }

    pub fn source(name: impl Into<String>) -> Self {
        Self::with_kind(VertexId::fresh(), VertexKind::Source(SourceVertex { name: name.into() }))
    }

    pub fn operator(transform: impl Into<String>) -> Self {
        Self::with_kind(
            VertexId::fresh(),
            VertexKind::Operator(OperatorVertex {
                transform: transform.into(),
                relay: false,
            }),
        )
    }

    /// A compiler-inserted relay operator. It is told apart from user
    /// operators by its marker, not its transform name.
    pub fn relay() -> Self {
        Self::with_kind(
            VertexId::fresh(),
            VertexKind::Operator(OperatorVertex {
                transform: "relay".into(),
                relay: true,
            }),
        )
    }

    /// Wrap a loop under the identity it was declared with.
    pub fn looped(id: VertexId, body: LoopVertex) -> Self {
        Self::with_kind(id, VertexKind::Loop(Box::new(body)))
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn kind(&self) -> &VertexKind {
        &self.kind
    }

    pub fn properties(&self) -> &ExecutionPropertyMap {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut ExecutionPropertyMap {
        &mut self.properties
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, VertexKind::Source(_))
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.kind, VertexKind::Operator(_))
    }

    pub fn is_relay(&self) -> bool {
        matches!(&self.kind, VertexKind::Operator(o) if o.relay)
    }

    pub fn is_loop(&self) -> bool {
        matches!(self.kind, VertexKind::Loop(_))
    }

    pub fn as_loop(&self) -> Option<&LoopVertex> {
        match &self.kind {
            VertexKind::Loop(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_loop_mut(&mut self) -> Option<&mut LoopVertex> {
        match &mut self.kind {
            VertexKind::Loop(l) => Some(l),
            _ => None,
        }
    }

    /// Human-readable label: source name, transform, or loop name.
    pub fn name(&self) -> &str {
        match &self.kind {
            VertexKind::Source(s) => &s.name,
            VertexKind::Operator(o) => &o.transform,
            VertexKind::Loop(l) => l.name(),
        }
    }

    /// Kind tag plus name; equal for vertices that do the same work.
    pub fn signature(&self) -> String {
        match &self.kind {
            VertexKind::Source(s) => format!("source:{}", s.name),
            VertexKind::Operator(o) if o.relay => format!("relay:{}", o.transform),
            VertexKind::Operator(o) => format!("operator:{}", o.transform),
            VertexKind::Loop(l) => format!("loop:{}", l.name()),
        }
    }

    /// Same kind and properties under a new identity.
    pub fn copy_with_id(&self, id: VertexId) -> Vertex {
        let mut properties = ExecutionPropertyMap::new(id.to_string());
        self.properties.copy_into(&mut properties);
        Vertex {
            id,
            kind: self.kind.clone(),
            properties,
        }
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Vertex {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    id: EdgeId,
    src: VertexId,
    dst: VertexId,
    coder: Coder,
    side_input: bool,
    properties: ExecutionPropertyMap,
}

impl Edge {
    pub fn new(pattern: CommunicationPattern, src: VertexId, dst: VertexId, coder: Coder) -> Self {
        let id = EdgeId::fresh();
        Self {
            id,
            src,
            dst,
            coder,
            side_input: false,
            properties: ExecutionPropertyMap::for_edge(id.to_string(), pattern),
        }
    }

    /// Mark this edge as a side input: consumed whole rather than streamed.
    pub fn as_side_input(mut self) -> Self {
        self.side_input = true;
        self
    }

    /// A new edge between `src` and `dst` carrying this edge's coder,
    /// side-input flag and properties.
    pub fn reconnect(&self, src: VertexId, dst: VertexId) -> Edge {
        let id = EdgeId::fresh();
        let mut properties = ExecutionPropertyMap::new(id.to_string());
        self.properties.copy_into(&mut properties);
        Edge {
            id,
            src,
            dst,
            coder: self.coder.clone(),
            side_input: self.side_input,
            properties,
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn src(&self) -> VertexId {
        self.src
    }

    pub fn dst(&self) -> VertexId {
        self.dst
    }

    pub fn coder(&self) -> &Coder {
        &self.coder
    }

    pub fn is_side_input(&self) -> bool {
        self.side_input
    }

    pub fn properties(&self) -> &ExecutionPropertyMap {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut ExecutionPropertyMap {
        &mut self.properties
    }

    /// Every edge is created with a pattern; a removed entry reads as one-to-one.
    pub fn pattern(&self) -> CommunicationPattern {
        self.properties
            .communication_pattern()
            .unwrap_or(CommunicationPattern::OneToOne)
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Edge {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{DataStore, ExecutionProperty};

    #[test]
    fn test_vertex_defaults() {
        let v = Vertex::operator("map");
        assert!(v.is_operator());
        assert_eq!(v.properties().parallelism(), 1);
        assert_eq!(v.name(), "map");
        assert_eq!(v.signature(), "operator:map");
    }

    #[test]
    fn test_reconnect_copies_properties_under_new_id() {
        let a = Vertex::source("in");
        let b = Vertex::operator("map");
        let c = Vertex::operator("reduce");
        let mut e = Edge::new(CommunicationPattern::Shuffle, a.id(), b.id(), Coder::new("kv")).as_side_input();
        e.properties_mut()
            .put(ExecutionProperty::DataStore(DataStore::RemoteFile));

        let moved = e.reconnect(a.id(), c.id());
        assert_ne!(moved.id(), e.id());
        assert_eq!(moved.dst(), c.id());
        assert_eq!(moved.coder().name(), "kv");
        assert!(moved.is_side_input());
        assert_eq!(moved.properties(), e.properties());
        assert_eq!(moved.properties().owner(), moved.id().to_string());
    }

    #[test]
    fn test_relay_marker_is_independent_of_name() {
        let relay = Vertex::relay();
        let user = Vertex::operator(relay.name());
        assert!(relay.is_operator() && relay.is_relay());
        assert!(!user.is_relay());
        assert_ne!(relay.signature(), user.signature());
        assert!(relay.copy_with_id(VertexId::fresh()).is_relay());
    }

    #[test]
    fn test_copy_with_id_keeps_kind() {
        let v = Vertex::operator("map");
        let id = VertexId::fresh();
        let copy = v.copy_with_id(id);
        assert_eq!(copy.id(), id);
        assert_eq!(copy.signature(), v.signature());
        assert_ne!(copy, v);
    }
}
