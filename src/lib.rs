pub mod codegraph;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod extraction;
pub mod graph;
pub mod resolution;
pub mod types;
