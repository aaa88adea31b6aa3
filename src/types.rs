use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Kinds of entities in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Class,
    Struct,
    Union,
    Enum,
    Namespace,
    Function,
    Method,
    Constructor,
    Destructor,
    Field,
    TypeAlias,
    Template,
    UsingDirective,
}

#[allow(clippy::should_implement_trait)]
impl EntityKind {
    /// Returns the string representation of this entity kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::File => "file",
            EntityKind::Class => "class",
            EntityKind::Struct => "struct",
            EntityKind::Union => "union",
            EntityKind::Enum => "enum",
            EntityKind::Namespace => "namespace",
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Constructor => "constructor",
            EntityKind::Destructor => "destructor",
            EntityKind::Field => "field",
            EntityKind::TypeAlias => "type_alias",
            EntityKind::Template => "template",
            EntityKind::UsingDirective => "using_directive",
        }
    }

    /// Parses a string into an `EntityKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<EntityKind> {
        match s {
            "file" => Some(EntityKind::File),
            "class" => Some(EntityKind::Class),
            "struct" => Some(EntityKind::Struct),
            "union" => Some(EntityKind::Union),
            "enum" => Some(EntityKind::Enum),
            "namespace" => Some(EntityKind::Namespace),
            "function" => Some(EntityKind::Function),
            "method" => Some(EntityKind::Method),
            "constructor" => Some(EntityKind::Constructor),
            "destructor" => Some(EntityKind::Destructor),
            "field" => Some(EntityKind::Field),
            "type_alias" => Some(EntityKind::TypeAlias),
            "template" => Some(EntityKind::Template),
            "using_directive" => Some(EntityKind::UsingDirective),
            _ => None,
        }
    }

    /// Function-like kinds: valid targets of a `call` symbol.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            EntityKind::Function | EntityKind::Method | EntityKind::Constructor | EntityKind::Destructor
        )
    }

    /// Type-like kinds: valid targets of base-class and type symbols.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            EntityKind::Class
                | EntityKind::Struct
                | EntityKind::Enum
                | EntityKind::Union
                | EntityKind::TypeAlias
        )
    }

    /// Kinds whose members become methods (`Class`, `Struct`, `Union`).
    pub fn is_record(&self) -> bool {
        matches!(self, EntityKind::Class | EntityKind::Struct | EntityKind::Union)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of edges in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    Defines,
    Calls,
    Inherits,
    HasType,
}

#[allow(clippy::should_implement_trait)]
impl EdgeKind {
    /// Returns the string representation of this edge kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Defines => "DEFINES",
            EdgeKind::Calls => "CALLS",
            EdgeKind::Inherits => "INHERITS",
            EdgeKind::HasType => "HAS_TYPE",
        }
    }

    /// Parses a string into an `EdgeKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<EdgeKind> {
        match s {
            "DEFINES" => Some(EdgeKind::Defines),
            "CALLS" => Some(EdgeKind::Calls),
            "INHERITS" => Some(EdgeKind::Inherits),
            "HAS_TYPE" => Some(EdgeKind::HasType),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role a pending symbol plays for the entity that mentions it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolRole {
    BaseClass,
    ReturnType,
    ParameterType,
    FieldType,
    Call,
}

impl SymbolRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolRole::BaseClass => "base_class",
            SymbolRole::ReturnType => "return_type",
            SymbolRole::ParameterType => "parameter_type",
            SymbolRole::FieldType => "field_type",
            SymbolRole::Call => "call",
        }
    }

    /// The edge committed when a symbol with this role resolves.
    pub fn edge_kind(&self) -> EdgeKind {
        match self {
            SymbolRole::Call => EdgeKind::Calls,
            SymbolRole::BaseClass => EdgeKind::Inherits,
            SymbolRole::ReturnType | SymbolRole::ParameterType | SymbolRole::FieldType => {
                EdgeKind::HasType
            }
        }
    }

    /// Whether an entity of `kind` is an acceptable resolution target.
    pub fn accepts(&self, kind: EntityKind) -> bool {
        match self {
            SymbolRole::Call => kind.is_callable(),
            _ => kind.is_type(),
        }
    }
}

impl fmt::Display for SymbolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position inside a source file. Rows and columns are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
    pub byte: usize,
}

/// A name reference recorded during extraction, resolved in the second pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingSymbol {
    pub role: SymbolRole,
    pub name: String,
    pub position: SourcePosition,
}

/// A single parameter of a callable entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: Option<String>,
    pub type_name: Option<String>,
}

/// Signature data for functions, methods, constructors and destructors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub return_type: Option<String>,
    pub parameters: Vec<Parameter>,
}

/// An entity (node) of the code graph.
///
/// Stubs have no `file_path` and a zero span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub qualified_name: String,
    pub file_path: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    pub docstring: Option<String>,
    pub source_text: Option<String>,
    pub signature: Option<Signature>,
    /// Id of the containing entity; `None` only for File entities.
    pub parent_id: Option<String>,
    pub pending: Vec<PendingSymbol>,
}

impl Entity {
    /// Returns `true` for placeholder entities created during resolution.
    pub fn is_stub(&self) -> bool {
        self.file_path.is_none() && self.kind != EntityKind::File
    }

    /// Returns `true` if the (zero-based) `line` falls inside this entity's span.
    pub fn covers_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// A directed, typed edge between two entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub line: Option<u32>,
    /// How the edge was resolved; `None` for containment edges.
    pub resolved_by: Option<ResolutionTier>,
}

impl Edge {
    pub fn defines(parent: &str, child: &str, line: u32) -> Self {
        Edge {
            source: parent.to_string(),
            target: child.to_string(),
            kind: EdgeKind::Defines,
            line: Some(line),
            resolved_by: None,
        }
    }
}

/// Which resolution strategy produced a relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionTier {
    /// Unique match on a namespace-qualified name.
    Qualified,
    /// Unique match on an unqualified reference.
    Exact,
    /// Unique match after stripping namespace qualifiers (lower confidence).
    Stripped,
    /// Resolved through the external definition oracle.
    Oracle,
    /// No local definition; edge points at a stub entity.
    Stub,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Qualified => "qualified",
            ResolutionTier::Exact => "exact",
            ResolutionTier::Stripped => "stripped",
            ResolutionTier::Oracle => "oracle",
            ResolutionTier::Stub => "stub",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            ResolutionTier::Qualified => 0.95,
            ResolutionTier::Exact => 0.9,
            ResolutionTier::Oracle => 0.85,
            ResolutionTier::Stripped => 0.6,
            ResolutionTier::Stub => 0.3,
        }
    }
}

/// An entity-kind construct the extractor could not turn into an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedConstruct {
    pub node_kind: String,
    pub line: u32,
    pub reason: String,
}

/// Result of extracting entities from one file (Pass 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileExtraction {
    pub file_path: String,
    pub language: String,
    pub entities: Vec<Entity>,
    pub edges: Vec<Edge>,
    pub skipped: Vec<SkippedConstruct>,
    pub duration_ms: u64,
}

impl FileExtraction {
    /// The File entity at the root of this extraction.
    pub fn file_entity(&self) -> Option<&Entity> {
        self.entities.iter().find(|e| e.kind == EntityKind::File)
    }
}

/// A file that was left out of the graph, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome summary of a graph build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSummary {
    pub files_in_scope: usize,
    pub files_extracted: usize,
    pub external_files: usize,
    pub unresolved_includes: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub skipped_constructs: usize,
    pub entity_count: usize,
    pub edge_count: usize,
    pub pending_symbols: usize,
    pub resolved_structural: usize,
    pub resolved_oracle: usize,
    pub stubs_created: usize,
    pub unresolved: usize,
    pub unresolved_by_role: BTreeMap<String, usize>,
    pub oracle_failures: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Bulk export of the graph for downstream persistence or indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<Entity>,
    pub edges: Vec<Edge>,
}

/// A subgraph containing a subset of entities and edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subgraph {
    pub nodes: Vec<Entity>,
    pub edges: Vec<Edge>,
    pub roots: Vec<String>,
}

/// Direction for neighbour lookups and traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Options controlling graph traversal behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalOptions {
    pub max_depth: u32,
    pub edge_kinds: Option<Vec<EdgeKind>>,
    pub entity_kinds: Option<Vec<EntityKind>>,
    pub direction: Direction,
    pub limit: u32,
    pub include_start: bool,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        TraversalOptions {
            max_depth: 3,
            edge_kinds: None,
            entity_kinds: None,
            direction: Direction::Outgoing,
            limit: 100,
            include_start: true,
        }
    }
}

/// Statistics about the code graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: u64,
    pub edge_count: u64,
    pub file_count: u64,
    pub stub_count: u64,
    pub entities_by_kind: BTreeMap<String, u64>,
    pub edges_by_kind: BTreeMap<String, u64>,
}

/// Generates a deterministic entity ID from file path, kind, name, and line number.
///
/// The ID format is `"kind:32hexchars"` where the hex portion is the first 32
/// characters of the SHA-256 hash of the input components.
pub fn generate_entity_id(file_path: &str, kind: EntityKind, name: &str, line: u32) -> String {
    let input = format!("{}:{}:{}:{}", file_path, kind.as_str(), name, line);
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let hash = hasher.finalize();
    let hex_str = hex::encode(hash);
    format!("{}:{}", kind.as_str(), &hex_str[..32])
}
