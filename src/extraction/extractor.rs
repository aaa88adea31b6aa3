//! Grammar-agnostic entity extraction (Pass 1).
//!
//! Walks a parse tree in document order, asks the adapter to classify every
//! entity-kind node, and emits entities plus `DEFINES` containment edges.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, trace, warn};
use tree_sitter::{Language, Node as TsNode, Parser, Tree};

use super::{node_text, GrammarAdapter, ScopeFrame};
use crate::config::CodeGraphConfig;
use crate::errors::{CodeGraphError, Result};
use crate::types::{generate_entity_id, Edge, Entity, EntityKind, FileExtraction, SkippedConstruct};

/// Extracts entities from single files using a [`GrammarAdapter`].
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    extract_docstrings: bool,
}

/// Internal state used during AST traversal.
struct ExtractionState<'a> {
    adapter: &'a dyn GrammarAdapter,
    entity_kinds: HashSet<&'a str>,
    entities: Vec<Entity>,
    edges: Vec<Edge>,
    skipped: Vec<SkippedConstruct>,
    /// Enclosing entities, file first.
    scope: Vec<ScopeFrame>,
    file_path: String,
    source: &'a [u8],
    extract_docstrings: bool,
}

impl ExtractionState<'_> {
    /// Returns the current parent entity ID (the file at top level).
    fn parent_id(&self) -> &str {
        self.scope.last().map(|f| f.id.as_str()).unwrap_or_default()
    }

    /// Qualified name of `name` in the current scope. Files and template
    /// wrappers do not contribute a component.
    fn qualified_name(&self, qualifier: Option<&str>, name: &str) -> String {
        let mut parts: Vec<&str> = self
            .scope
            .iter()
            .filter(|f| !matches!(f.kind, EntityKind::File | EntityKind::Template))
            .map(|f| f.name.as_str())
            .collect();
        parts.extend(qualifier);
        parts.push(name);
        parts.join("::")
    }

    fn skip(&mut self, node: TsNode<'_>, reason: String) {
        let line = node.start_position().row as u32;
        warn!(
            file = %self.file_path,
            line,
            node_kind = node.kind(),
            reason = %reason,
            "skipping construct"
        );
        self.skipped.push(SkippedConstruct {
            node_kind: node.kind().to_string(),
            line,
            reason,
        });
    }
}

/// Parses `source` with the given grammar.
pub(crate) fn parse_tree(language: &Language, source: &str) -> std::result::Result<Tree, String> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| format!("failed to load grammar: {e}"))?;
    parser
        .parse(source, None)
        .ok_or_else(|| "tree-sitter parse returned None".to_string())
}

impl EntityExtractor {
    pub fn new(config: &CodeGraphConfig) -> Self {
        Self {
            extract_docstrings: config.extract_docstrings,
        }
    }

    /// Extract entities and containment edges from one source file.
    ///
    /// `file_path` is the project-relative path used in entity IDs (not for
    /// I/O). Fails only when the grammar cannot produce a tree at all;
    /// malformed constructs are skipped and reported in
    /// [`FileExtraction::skipped`].
    pub fn extract(
        &self,
        adapter: &dyn GrammarAdapter,
        file_path: &str,
        source: &str,
    ) -> Result<FileExtraction> {
        let start = Instant::now();
        let tree = parse_tree(&adapter.language(), source).map_err(|message| {
            CodeGraphError::Parse {
                message,
                path: file_path.to_string(),
                line: None,
            }
        })?;

        let mut state = ExtractionState {
            adapter,
            entity_kinds: adapter.entity_node_kinds().iter().copied().collect(),
            entities: Vec::new(),
            edges: Vec::new(),
            skipped: Vec::new(),
            scope: Vec::new(),
            file_path: file_path.to_string(),
            source: source.as_bytes(),
            extract_docstrings: self.extract_docstrings,
        };

        let file_entity = Entity {
            id: generate_entity_id(file_path, EntityKind::File, file_path, 0),
            kind: EntityKind::File,
            name: file_path.to_string(),
            qualified_name: file_path.to_string(),
            file_path: Some(file_path.to_string()),
            start_line: 0,
            end_line: source.lines().count().saturating_sub(1) as u32,
            start_column: 0,
            end_column: 0,
            docstring: None,
            source_text: None,
            signature: None,
            parent_id: None,
            pending: Vec::new(),
        };
        state.scope.push(ScopeFrame {
            id: file_entity.id.clone(),
            kind: EntityKind::File,
            name: file_path.to_string(),
        });
        state.entities.push(file_entity);

        Self::visit_children(&mut state, tree.root_node());
        state.scope.pop();

        debug!(
            file = %file_path,
            language = adapter.language_name(),
            entities = state.entities.len(),
            skipped = state.skipped.len(),
            "extracted file"
        );

        Ok(FileExtraction {
            file_path: state.file_path,
            language: adapter.language_name().to_string(),
            entities: state.entities,
            edges: state.edges,
            skipped: state.skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Visit all children of a node in document order.
    fn visit_children(state: &mut ExtractionState<'_>, node: TsNode<'_>) {
        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                let child = cursor.node();
                Self::visit_node(state, child);
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
    }

    /// Visit a single AST node.
    fn visit_node(state: &mut ExtractionState<'_>, node: TsNode<'_>) {
        if node.is_error() {
            state.skip(node, "syntax error".to_string());
            return;
        }

        let is_entity = state.entity_kinds.contains(node.kind())
            && state.adapter.declares_entity(node, state.source);
        if !is_entity {
            Self::visit_children(state, node);
            return;
        }

        if node.has_error() {
            state.skip(node, "construct contains a syntax error".to_string());
            Self::visit_children(state, node);
            return;
        }

        match state.adapter.classify(node, state.source, &state.scope) {
            Ok(kind) => Self::visit_entity(state, node, kind),
            Err(CodeGraphError::UnknownConstruct { node_kind, line, .. }) => {
                let error = CodeGraphError::UnknownConstruct {
                    node_kind,
                    path: state.file_path.clone(),
                    line,
                };
                state.skip(node, error.to_string());
                Self::visit_children(state, node);
            }
            Err(e) => {
                state.skip(node, e.to_string());
                Self::visit_children(state, node);
            }
        }
    }

    /// Create the entity for `node`, then descend with it as the new scope.
    fn visit_entity(state: &mut ExtractionState<'_>, node: TsNode<'_>, kind: EntityKind) {
        let adapter = state.adapter;
        let name = adapter.extract_name(node, state.source);
        let start_line = node.start_position().row as u32;
        let end_line = node.end_position().row as u32;
        let id = generate_entity_id(&state.file_path, kind, &name, start_line);
        let parent_id = state.parent_id().to_string();
        let docstring = if state.extract_docstrings {
            adapter.extract_doc(node, state.source)
        } else {
            None
        };
        let signature = if kind.is_callable() {
            adapter.extract_signature(kind, node, state.source)
        } else {
            None
        };
        let pending = adapter.collect_pending_symbols(kind, node, state.source);
        trace!(
            file = %state.file_path,
            kind = kind.as_str(),
            name = %name,
            pending = pending.len(),
            "entity"
        );

        state.entities.push(Entity {
            id: id.clone(),
            kind,
            name: name.clone(),
            qualified_name: state.qualified_name(adapter.name_qualifier(node, state.source).as_deref(), &name),
            file_path: Some(state.file_path.clone()),
            start_line,
            end_line,
            start_column: node.start_position().column as u32,
            end_column: node.end_position().column as u32,
            docstring,
            source_text: Some(node_text(node, state.source)),
            signature,
            parent_id: Some(parent_id.clone()),
            pending,
        });
        state.edges.push(Edge::defines(&parent_id, &id, start_line));

        state.scope.push(ScopeFrame { id, kind, name });
        Self::visit_children(state, node);
        state.scope.pop();
    }
}
