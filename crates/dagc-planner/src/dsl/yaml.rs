//! YAML graph descriptions → `DagBuilder`.
//!
//! Example:
//! ```yaml
//! loops:
//!   - { name: als, iterations: 10 }
//! vertices:
//!   - { name: ratings, kind: source }
//!   - { name: parse, kind: operator, parallelism: 4 }
//!   - { name: update, kind: operator, loop: als }
//!   - { name: write, kind: operator }
//! edges:
//!   - { from: ratings, to: parse }
//!   - { from: parse, to: update, pattern: shuffle, coder: kv }
//!   - { from: update, to: write }
//! ```
//!
//! Vertex names must be unique; an operator's transform defaults to its name.
//! Edges default to one-to-one with the `bytes` coder.

use std::collections::BTreeMap;

use dagc_core::builder::DagBuilder;
use dagc_core::error::{Error, Result};
use dagc_core::id::VertexId;
use dagc_core::ir::{Coder, Edge, Vertex};
use dagc_core::loop_vertex::LoopHeader;
use dagc_core::property::{
    CommunicationPattern, DataFlowModel, DataStore, ExecutionProperty, ExecutorPlacement,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDoc {
    #[serde(default)]
    pub loops: Vec<LoopDef>,
    pub vertices: Vec<VertexDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopDef {
    pub name: String,
    pub iterations: usize,
    /// Name of the enclosing loop, which must be declared earlier.
    #[serde(default)]
    pub within: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexKindDef {
    Source,
    Operator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VertexDef {
    pub name: String,
    pub kind: VertexKindDef,
    #[serde(default)]
    pub transform: Option<String>,
    #[serde(default, rename = "loop")]
    pub in_loop: Option<String>,
    #[serde(default)]
    pub parallelism: Option<usize>,
    #[serde(default)]
    pub placement: Option<String>,
    #[serde(default)]
    pub stage: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeDef {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub coder: Option<String>,
    #[serde(default)]
    pub side_input: bool,
    #[serde(default)]
    pub data_flow: Option<String>,
    #[serde(default)]
    pub data_store: Option<String>,
}

/// A builder plus the ids the document's names resolved to.
#[derive(Debug, Clone)]
pub struct ParsedGraph {
    pub builder: DagBuilder,
    pub vertices: BTreeMap<String, VertexId>,
    pub loops: BTreeMap<String, LoopHeader>,
}

impl ParsedGraph {
    pub fn id(&self, name: &str) -> Option<VertexId> {
        self.vertices.get(name).copied()
    }
}

fn parse_pattern(s: &str) -> Result<CommunicationPattern> {
    match s {
        "one_to_one" | "o2o" | "OneToOne" => Ok(CommunicationPattern::OneToOne),
        "broadcast" | "Broadcast" => Ok(CommunicationPattern::Broadcast),
        "shuffle" | "Shuffle" => Ok(CommunicationPattern::Shuffle),
        other => Err(Error::Dsl(format!("unknown communication pattern '{}'", other))),
    }
}

fn parse_placement(s: &str) -> Result<ExecutorPlacement> {
    match s {
        "any" | "Any" => Ok(ExecutorPlacement::Any),
        "transient" | "Transient" => Ok(ExecutorPlacement::Transient),
        "reserved" | "Reserved" => Ok(ExecutorPlacement::Reserved),
        "compute" | "Compute" => Ok(ExecutorPlacement::Compute),
        other => Err(Error::Dsl(format!("unknown executor placement '{}'", other))),
    }
}

fn parse_data_flow(s: &str) -> Result<DataFlowModel> {
    match s {
        "pull" | "Pull" => Ok(DataFlowModel::Pull),
        "push" | "Push" => Ok(DataFlowModel::Push),
        other => Err(Error::Dsl(format!("unknown data flow model '{}'", other))),
    }
}

fn parse_data_store(s: &str) -> Result<DataStore> {
    match s {
        "memory" | "Memory" => Ok(DataStore::Memory),
        "serialized_memory" | "SerializedMemory" => Ok(DataStore::SerializedMemory),
        "local_file" | "LocalFile" => Ok(DataStore::LocalFile),
        "remote_file" | "RemoteFile" => Ok(DataStore::RemoteFile),
        other => Err(Error::Dsl(format!("unknown data store '{}'", other))),
    }
}

/// Parse a YAML graph description into a `DagBuilder`. The builder is not
/// built yet, so integrity errors surface from the caller's `build()`.
pub fn parse_yaml_graph(yaml_src: &str) -> Result<ParsedGraph> {
    let doc: GraphDoc = serde_yaml::from_str(yaml_src).map_err(|e| Error::Dsl(e.to_string()))?;

    let mut loops: BTreeMap<String, LoopHeader> = BTreeMap::new();
    for l in &doc.loops {
        if loops.contains_key(&l.name) {
            return Err(Error::Dsl(format!("loop '{}' declared twice", l.name)));
        }
        let mut header = LoopHeader::new(l.name.clone(), l.iterations);
        if let Some(outer) = &l.within {
            let enclosing = loops
                .get(outer)
                .ok_or_else(|| Error::Dsl(format!("loop '{}' is within unknown loop '{}'", l.name, outer)))?;
            header = header.within(enclosing);
        }
        loops.insert(l.name.clone(), header);
    }

    let mut builder = DagBuilder::new();
    let mut names: BTreeMap<String, VertexId> = BTreeMap::new();
    for def in &doc.vertices {
        if names.contains_key(&def.name) {
            return Err(Error::Dsl(format!("vertex '{}' declared twice", def.name)));
        }
        let mut v = match def.kind {
            VertexKindDef::Source => Vertex::source(def.name.clone()),
            VertexKindDef::Operator => {
                Vertex::operator(def.transform.clone().unwrap_or_else(|| def.name.clone()))
            }
        };
        if let Some(p) = def.parallelism {
            v.properties_mut().put(ExecutionProperty::Parallelism(p));
        }
        if let Some(p) = &def.placement {
            v.properties_mut()
                .put(ExecutionProperty::ExecutorPlacement(parse_placement(p)?));
        }
        if let Some(s) = def.stage {
            v.properties_mut().put(ExecutionProperty::StageId(s));
        }
        names.insert(def.name.clone(), v.id());
        match &def.in_loop {
            Some(l) => {
                let header = loops
                    .get(l)
                    .ok_or_else(|| Error::Dsl(format!("vertex '{}' is in unknown loop '{}'", def.name, l)))?;
                builder.add_vertex_in_loop(v, header);
            }
            None => {
                builder.add_vertex(v);
            }
        }
    }

    let lookup = |name: &str| {
        names
            .get(name)
            .copied()
            .ok_or_else(|| Error::Dsl(format!("edge refers to unknown vertex '{}'", name)))
    };
    for def in &doc.edges {
        let pattern = match &def.pattern {
            Some(p) => parse_pattern(p)?,
            None => CommunicationPattern::OneToOne,
        };
        let coder = def.coder.as_deref().map(Coder::new).unwrap_or_default();
        let mut edge = Edge::new(pattern, lookup(&def.from)?, lookup(&def.to)?, coder);
        if def.side_input {
            edge = edge.as_side_input();
        }
        if let Some(m) = &def.data_flow {
            edge.properties_mut()
                .put(ExecutionProperty::DataFlowModel(parse_data_flow(m)?));
        }
        if let Some(s) = &def.data_store {
            edge.properties_mut()
                .put(ExecutionProperty::DataStore(parse_data_store(s)?));
        }
        builder.connect_vertices(edge)?;
    }

    debug!(
        loops = loops.len(),
        vertices = names.len(),
        edges = doc.edges.len(),
        "parsed YAML graph"
    );
    Ok(ParsedGraph {
        builder,
        vertices: names,
        loops,
    })
}
