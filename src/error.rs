use crate::{ntriples, partition, sink};

/// Top-level error for the orchestrator's public API.
///
/// HTTP and per-line parse failures are deliberately absent: both are non-fatal
/// by design and are logged and recovered from at the point of failure rather
/// than propagated here.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error at {path}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("partitioning failed")]
    Partition(#[from] partition::Error),

    #[error("N-Triples streaming failed")]
    Ntriples(#[from] ntriples::Error),

    #[error("property-graph sink failed")]
    Sink(#[from] sink::Error),

    #[error("part {part_name} exceeded its {timeout_secs}s task timeout")]
    Timeout { part_name: String, timeout_secs: u64 },

    #[error("worker for part {part_name} panicked")]
    WorkerPanicked { part_name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
