//! Tree-sitter based entity extraction.
//!
//! Language specifics live behind [`GrammarAdapter`]; the [`EntityExtractor`]
//! walks any registered grammar the same way.

mod c_family;
mod extractor;
#[cfg(feature = "python")]
mod python;

use std::collections::HashSet;
use std::sync::Arc;

use tree_sitter::{Language, Node as TsNode};

pub use c_family::{CFamilyAdapter, Dialect};
pub use extractor::EntityExtractor;
#[cfg(feature = "python")]
pub use python::PythonAdapter;

use crate::errors::Result;
use crate::types::{EntityKind, PendingSymbol, Signature, SourcePosition, SymbolRole};

/// Placeholder name for constructs that legally have no name.
pub const ANONYMOUS: &str = "[anonymous]";

/// Placeholder name for constructs whose name could not be read.
pub const UNNAMED: &str = "[unnamed]";

/// An entity already created on the path from the file root to the node
/// being classified.
#[derive(Debug, Clone)]
pub struct ScopeFrame {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
}

/// Capability set every source language provides.
///
/// Everything the pipeline needs to know about a grammar goes through this
/// trait; the extractor, dependency discovery and resolver never branch on
/// the concrete language.
pub trait GrammarAdapter: Send + Sync {
    /// Human-readable language name.
    fn language_name(&self) -> &str;

    /// File extensions this adapter handles (without leading dot).
    fn extensions(&self) -> &[&str];

    /// The tree-sitter grammar.
    fn language(&self) -> Language;

    /// Grammar node kinds that may introduce an entity.
    fn entity_node_kinds(&self) -> &[&str];

    /// Whether this particular node defines an entity. Nodes of an entity kind
    /// that are only references (for example `struct Foo` used as a type, or
    /// a forward declaration) return `false`.
    fn declares_entity(&self, _node: TsNode<'_>, _source: &[u8]) -> bool {
        true
    }

    /// Categorizes an entity node. `scope` lists the enclosing entities,
    /// outermost first.
    ///
    /// Fails with `CodeGraphError::UnknownConstruct` when the node cannot be
    /// categorized; the extractor skips it and keeps walking its children.
    fn classify(&self, node: TsNode<'_>, source: &[u8], scope: &[ScopeFrame]) -> Result<EntityKind>;

    /// Extracts the entity name, falling back to [`ANONYMOUS`] or [`UNNAMED`].
    fn extract_name(&self, node: TsNode<'_>, source: &[u8]) -> String;

    /// Qualifier written on an out-of-line definition (`Widget` for
    /// `void Widget::draw()`); it becomes part of the qualified name.
    fn name_qualifier(&self, _node: TsNode<'_>, _source: &[u8]) -> Option<String> {
        None
    }

    /// Extracts a doc comment attached directly to the node.
    fn extract_doc(&self, node: TsNode<'_>, source: &[u8]) -> Option<String>;

    /// Extracts return type and parameters for callable entities.
    fn extract_signature(&self, _kind: EntityKind, _node: TsNode<'_>, _source: &[u8]) -> Option<Signature> {
        None
    }

    /// Records base classes, call targets and type references mentioned by
    /// the construct, deduplicated by source position.
    fn collect_pending_symbols(&self, kind: EntityKind, node: TsNode<'_>, source: &[u8]) -> Vec<PendingSymbol>;

    /// Raw paths of project-local includes/imports, in source order.
    /// System and third-party references are left out.
    fn local_includes(&self, source: &str) -> Vec<String>;

    /// File paths an include may refer to, most likely first.
    fn include_candidates(&self, raw: &str) -> Vec<String> {
        vec![raw.to_string()]
    }
}

/// Registry of language adapters, dispatching on file extension.
pub struct LanguageRegistry {
    adapters: Vec<Arc<dyn GrammarAdapter>>,
}

impl LanguageRegistry {
    /// Creates a new registry with all built-in adapters.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(CFamilyAdapter::new(Dialect::C)));
        registry.register(Arc::new(CFamilyAdapter::new(Dialect::Cpp)));
        #[cfg(feature = "python")]
        registry.register(Arc::new(PythonAdapter));
        registry
    }

    /// Creates a registry with no adapters.
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Registers an adapter. Later registrations win for shared extensions.
    pub fn register(&mut self, adapter: Arc<dyn GrammarAdapter>) {
        self.adapters.insert(0, adapter);
    }

    /// Returns the adapter for a file path based on its extension.
    pub fn adapter_for_file(&self, path: &str) -> Option<Arc<dyn GrammarAdapter>> {
        let file_name = path.rsplit(['/', '\\']).next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        self.adapters
            .iter()
            .find(|a| a.extensions().contains(&ext))
            .cloned()
    }

    /// Returns all supported file extensions across all adapters.
    pub fn supported_extensions(&self) -> Vec<&str> {
        self.adapters
            .iter()
            .flat_map(|a| a.extensions().iter().copied())
            .collect()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Gets the text of a tree-sitter node.
pub(crate) fn node_text(node: TsNode<'_>, source: &[u8]) -> String {
    node.utf8_text(source)
        .unwrap_or("<invalid utf8>")
        .to_string()
}

pub(crate) fn position_of(node: TsNode<'_>) -> SourcePosition {
    SourcePosition {
        line: node.start_position().row as u32,
        column: node.start_position().column as u32,
        byte: node.start_byte(),
    }
}

/// Accumulates pending symbols, dropping repeated mentions of the same
/// source position.
#[derive(Default)]
pub(crate) struct SymbolCollector {
    seen: HashSet<(SymbolRole, usize)>,
    symbols: Vec<PendingSymbol>,
}

impl SymbolCollector {
    pub(crate) fn push(&mut self, role: SymbolRole, name: String, node: TsNode<'_>) {
        let name = name.trim().to_string();
        if name.is_empty() {
            return;
        }
        let position = position_of(node);
        if self.seen.insert((role, position.byte)) {
            self.symbols.push(PendingSymbol {
                role,
                name,
                position,
            });
        }
    }

    pub(crate) fn finish(self) -> Vec<PendingSymbol> {
        self.symbols
    }
}

/// Returns `true` if `node` is a comment ending on the line right above
/// `next` (no blank line in between).
pub(crate) fn is_adjacent(comment: TsNode<'_>, next: TsNode<'_>) -> bool {
    comment.end_position().row + 1 >= next.start_position().row
}
