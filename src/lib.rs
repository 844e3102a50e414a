//! Transforms sorted DBpedia Databus N-Triples dumps into property-graph
//! JSONL for bulk loading. See `orchestrator::run` for the entry point.

pub mod config;
pub mod error;
pub mod namespace;
pub mod ntriples;
pub mod orchestrator;
pub mod partition;
pub mod samething;
pub mod sink;
