//! Graph fixtures shared by the integration tests.
#![allow(dead_code)]

use dagc_core::prelude::*;

pub fn link(pattern: CommunicationPattern, a: &Vertex, b: &Vertex) -> Edge {
    Edge::new(pattern, a.id(), b.id(), Coder::bytes())
}

pub fn o2o(a: &Vertex, b: &Vertex) -> Edge {
    link(CommunicationPattern::OneToOne, a, b)
}

pub fn shuffle(a: &Vertex, b: &Vertex) -> Edge {
    link(CommunicationPattern::Shuffle, a, b)
}

/// `source -> op1 -> ... -> opN`, with the given pattern on each edge.
pub fn chain(patterns: &[CommunicationPattern]) -> (DagBuilder, Vec<Vertex>) {
    let mut vertices = vec![Vertex::source("in")];
    for i in 0..patterns.len() {
        vertices.push(Vertex::operator(format!("op{}", i + 1)));
    }
    let mut builder = DagBuilder::new();
    for v in &vertices {
        builder.add_vertex(v.clone());
    }
    for (i, p) in patterns.iter().enumerate() {
        builder
            .connect_vertices(link(*p, &vertices[i], &vertices[i + 1]))
            .unwrap();
    }
    (builder, vertices)
}

/// An alternating-least-squares job as a front end emits it: every iteration
/// gets its own one-iteration loop context.
///
/// ```text
/// ratings -> parse =shuffle=> userRatings ----------------\
///                  =shuffle=> itemRatings -> initFactors  |
///   per iteration i: userUpdate_i <= userRatings, (initFactors | itemUpdate_{i-1})
///                    itemUpdate_i <= itemRatings, userUpdate_i
/// itemUpdate_last -> write
/// ```
pub struct Als {
    pub builder: DagBuilder,
    pub ratings: Vertex,
    pub parse: Vertex,
    pub user_ratings: Vertex,
    pub item_ratings: Vertex,
    pub init_factors: Vertex,
    pub write: Vertex,
    pub headers: Vec<LoopHeader>,
    pub user_updates: Vec<Vertex>,
    pub item_updates: Vec<Vertex>,
}

impl Als {
    pub const OUTSIDE: usize = 6;

    pub fn new(iterations: usize) -> Self {
        let ratings = Vertex::source("ratings");
        let parse = Vertex::operator("parse");
        let user_ratings = Vertex::operator("userRatings");
        let item_ratings = Vertex::operator("itemRatings");
        let init_factors = Vertex::operator("initFactors");

        let mut builder = DagBuilder::new();
        for v in [&ratings, &parse, &user_ratings, &item_ratings, &init_factors] {
            builder.add_vertex(v.clone());
        }
        builder.connect_vertices(o2o(&ratings, &parse)).unwrap();
        builder.connect_vertices(shuffle(&parse, &user_ratings)).unwrap();
        builder.connect_vertices(shuffle(&parse, &item_ratings)).unwrap();
        builder.connect_vertices(o2o(&item_ratings, &init_factors)).unwrap();

        let mut headers = Vec::new();
        let mut user_updates: Vec<Vertex> = Vec::new();
        let mut item_updates: Vec<Vertex> = Vec::new();
        for i in 0..iterations {
            let header = LoopHeader::new("ALS", 1);
            let user = Vertex::operator("userUpdate");
            let item = Vertex::operator("itemUpdate");
            builder.add_vertex_in_loop(user.clone(), &header);
            builder.add_vertex_in_loop(item.clone(), &header);

            let previous = if i == 0 { &init_factors } else { &item_updates[i - 1] };
            builder.connect_vertices(shuffle(&user_ratings, &user)).unwrap();
            builder.connect_vertices(shuffle(previous, &user)).unwrap();
            builder.connect_vertices(shuffle(&item_ratings, &item)).unwrap();
            builder.connect_vertices(shuffle(&user, &item)).unwrap();

            headers.push(header);
            user_updates.push(user);
            item_updates.push(item);
        }

        let write = Vertex::operator("write");
        builder.add_vertex(write.clone());
        let last = item_updates.last().unwrap_or(&init_factors);
        builder.connect_vertices(o2o(last, &write)).unwrap();

        Self {
            builder,
            ratings,
            parse,
            user_ratings,
            item_ratings,
            init_factors,
            write,
            headers,
            user_updates,
            item_updates,
        }
    }

    pub fn dag(&self) -> Dag {
        self.builder.clone().build().unwrap()
    }

    /// Id of the loop vertex the first iteration is extracted into; rolling
    /// keeps it as the root.
    pub fn root_loop(&self) -> VertexId {
        self.headers[0].id()
    }
}

/// Names of all vertices, sorted; handy for comparing graphs whose ids differ.
pub fn signatures(dag: &Dag) -> Vec<String> {
    let mut names: Vec<String> = dag.vertices().map(|v| v.signature()).collect();
    names.sort();
    names
}
