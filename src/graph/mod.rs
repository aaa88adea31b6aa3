/// In-memory entity/edge store.
pub mod store;

/// Graph traversal algorithms for the code graph.
pub mod traversal;

pub use store::{CommitStats, GraphAssembler, Insertion, EXTERNAL_FILE};
pub use traversal::{GraphPath, GraphTraverser};
