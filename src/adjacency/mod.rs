//! Adjacency graphs: sparsity patterns, incidence relations and their compositions.

pub mod graph;

pub use graph::Graph;
