//! Symbol resolution (Pass 2).
//!
//! Resolves the pending symbols recorded during extraction into
//! relationship edges: a structural name-index tier first, then an optional
//! external definition oracle.

pub mod oracle;
mod resolver;

pub use oracle::{
    DefinitionLocation, DefinitionOracle, FileBatch, OracleAnswer, OracleError, OracleMode, OracleQueue,
};
pub use resolver::{ResolutionReport, StructuralOutcome, SymbolResolver};
