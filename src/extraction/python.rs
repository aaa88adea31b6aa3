use tree_sitter::{Language, Node as TsNode};

use super::extractor::parse_tree;
use super::{node_text, GrammarAdapter, ScopeFrame, SymbolCollector, ANONYMOUS};
use crate::errors::{CodeGraphError, Result};
use crate::types::{EntityKind, Parameter, PendingSymbol, Signature, SymbolRole};

/// Builtin names never worth resolving as type references.
const BUILTIN_TYPES: &[&str] = &[
    "int", "float", "complex", "str", "bytes", "bytearray", "bool", "None", "object", "list",
    "dict", "set", "frozenset", "tuple", "type", "Any", "Optional", "Union", "List", "Dict",
    "Set", "FrozenSet", "Tuple", "Callable", "Iterable", "Iterator", "Sequence", "Mapping",
    "Type", "self",
];

/// Python grammar adapter: classes, functions/methods, and class-level
/// attribute assignments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonAdapter;

impl PythonAdapter {
    /// `x = ...` / `x: T = ...` directly inside a class body.
    fn is_class_attribute(node: TsNode<'_>) -> bool {
        let Some(statement) = node.parent().filter(|p| p.kind() == "expression_statement") else {
            return false;
        };
        let in_class_body = statement
            .parent()
            .filter(|b| b.kind() == "block")
            .and_then(|b| b.parent())
            .is_some_and(|c| c.kind() == "class_definition");
        in_class_body
            && node
                .child_by_field_name("left")
                .is_some_and(|l| l.kind() == "identifier")
    }

    /// The `b` of `a.b`; the node itself otherwise.
    fn name_anchor(node: TsNode<'_>) -> TsNode<'_> {
        match node.kind() {
            "attribute" => node.child_by_field_name("attribute").unwrap_or(node),
            _ => node,
        }
    }

    fn last_attribute(node: TsNode<'_>, source: &[u8]) -> Option<String> {
        match node.kind() {
            "identifier" => Some(node_text(node, source)),
            "attribute" => node
                .child_by_field_name("attribute")
                .map(|a| node_text(a, source)),
            _ => None,
        }
    }

    fn collect_type_refs(node: TsNode<'_>, source: &[u8], role: SymbolRole, collector: &mut SymbolCollector) {
        match node.kind() {
            "identifier" | "attribute" => {
                if let Some(name) = Self::last_attribute(node, source) {
                    if !BUILTIN_TYPES.contains(&name.as_str()) {
                        collector.push(role, name, Self::name_anchor(node));
                    }
                }
            }
            // forward references in quotes are not followed
            "string" => {}
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    Self::collect_type_refs(child, source, role, collector);
                }
            }
        }
    }

    fn collect_calls(node: TsNode<'_>, source: &[u8], collector: &mut SymbolCollector) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" | "class_definition" => continue,
                "call" => {
                    if let Some(function) = child.child_by_field_name("function") {
                        if let Some(name) = Self::last_attribute(function, source) {
                            collector.push(SymbolRole::Call, name, Self::name_anchor(function));
                        }
                    }
                }
                _ => {}
            }
            Self::collect_calls(child, source, collector);
        }
    }

    fn parameter(node: TsNode<'_>, source: &[u8]) -> Option<Parameter> {
        let text = |n: TsNode<'_>| node_text(n, source);
        match node.kind() {
            "identifier" => Some(Parameter {
                name: Some(text(node)),
                type_name: None,
            }),
            "typed_parameter" => {
                let mut cursor = node.walk();
                let name = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() != "type")
                    .map(text);
                Some(Parameter {
                    name,
                    type_name: node.child_by_field_name("type").map(text),
                })
            }
            "default_parameter" | "typed_default_parameter" => Some(Parameter {
                name: node.child_by_field_name("name").map(text),
                type_name: node.child_by_field_name("type").map(text),
            }),
            "list_splat_pattern" | "dictionary_splat_pattern" => Some(Parameter {
                name: Some(text(node)),
                type_name: None,
            }),
            _ => None,
        }
    }

    fn string_contents(node: TsNode<'_>, source: &[u8]) -> String {
        let mut cursor = node.walk();
        let parts: Vec<String> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "string_content")
            .map(|c| node_text(c, source))
            .collect();
        if !parts.is_empty() {
            return parts.concat();
        }
        let raw = node_text(node, source);
        let raw = raw.trim_start_matches(['r', 'R', 'b', 'B', 'u', 'U', 'f', 'F']);
        for quote in ["\"\"\"", "'''", "\"", "'"] {
            if let Some(inner) = raw.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
                return inner.to_string();
            }
        }
        raw.to_string()
    }
}

impl GrammarAdapter for PythonAdapter {
    fn language_name(&self) -> &str {
        "Python"
    }

    fn extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn language(&self) -> Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn entity_node_kinds(&self) -> &[&str] {
        &["class_definition", "function_definition", "assignment"]
    }

    fn declares_entity(&self, node: TsNode<'_>, _source: &[u8]) -> bool {
        node.kind() != "assignment" || Self::is_class_attribute(node)
    }

    fn classify(&self, node: TsNode<'_>, source: &[u8], scope: &[ScopeFrame]) -> Result<EntityKind> {
        match node.kind() {
            "class_definition" => Ok(EntityKind::Class),
            "assignment" => Ok(EntityKind::Field),
            "function_definition" => {
                let in_class = scope.last().is_some_and(|f| f.kind == EntityKind::Class);
                if !in_class {
                    return Ok(EntityKind::Function);
                }
                let name = self.extract_name(node, source);
                Ok(match name.as_str() {
                    "__init__" => EntityKind::Constructor,
                    "__del__" => EntityKind::Destructor,
                    _ => EntityKind::Method,
                })
            }
            other => Err(CodeGraphError::UnknownConstruct {
                node_kind: other.to_string(),
                path: String::new(),
                line: node.start_position().row as u32,
            }),
        }
    }

    fn extract_name(&self, node: TsNode<'_>, source: &[u8]) -> String {
        let field = if node.kind() == "assignment" { "left" } else { "name" };
        node.child_by_field_name(field)
            .map(|n| node_text(n, source))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string())
    }

    /// Docstring: a string literal as the first statement of the body.
    fn extract_doc(&self, node: TsNode<'_>, source: &[u8]) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let literal = first.named_child(0).filter(|n| n.kind() == "string")?;
        let text = Self::string_contents(literal, source);
        let cleaned = text
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    fn extract_signature(&self, _kind: EntityKind, node: TsNode<'_>, source: &[u8]) -> Option<Signature> {
        let params = node.child_by_field_name("parameters")?;
        let mut cursor = params.walk();
        let parameters = params
            .named_children(&mut cursor)
            .filter_map(|p| Self::parameter(p, source))
            .collect();
        Some(Signature {
            return_type: node
                .child_by_field_name("return_type")
                .map(|t| node_text(t, source)),
            parameters,
        })
    }

    fn collect_pending_symbols(&self, kind: EntityKind, node: TsNode<'_>, source: &[u8]) -> Vec<PendingSymbol> {
        let mut collector = SymbolCollector::default();
        match kind {
            EntityKind::Class => {
                if let Some(bases) = node.child_by_field_name("superclasses") {
                    let mut cursor = bases.walk();
                    for base in bases.named_children(&mut cursor) {
                        // keyword arguments (metaclass=...) are not bases
                        if let Some(name) = Self::last_attribute(base, source) {
                            collector.push(SymbolRole::BaseClass, name, Self::name_anchor(base));
                        }
                    }
                }
            }
            EntityKind::Field => {
                if let Some(ty) = node.child_by_field_name("type") {
                    Self::collect_type_refs(ty, source, SymbolRole::FieldType, &mut collector);
                }
            }
            k if k.is_callable() => {
                if let Some(ty) = node.child_by_field_name("return_type") {
                    Self::collect_type_refs(ty, source, SymbolRole::ReturnType, &mut collector);
                }
                if let Some(params) = node.child_by_field_name("parameters") {
                    let mut cursor = params.walk();
                    for param in params.named_children(&mut cursor) {
                        if let Some(ty) = param.child_by_field_name("type") {
                            Self::collect_type_refs(ty, source, SymbolRole::ParameterType, &mut collector);
                        }
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    Self::collect_calls(body, source, &mut collector);
                }
            }
            _ => {}
        }
        collector.finish()
    }

    /// Relative imports only; absolute imports may name installed packages.
    fn local_includes(&self, source: &str) -> Vec<String> {
        let Ok(tree) = parse_tree(&self.language(), source) else {
            return Vec::new();
        };
        let bytes = source.as_bytes();
        let mut includes = Vec::new();
        let root = tree.root_node();
        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            if statement.kind() != "import_from_statement" {
                continue;
            }
            let Some(module) = statement
                .child_by_field_name("module_name")
                .filter(|m| m.kind() == "relative_import")
            else {
                continue;
            };
            let text = node_text(module, bytes);
            let dots = text.chars().take_while(|c| *c == '.').count();
            let prefix = "../".repeat(dots.saturating_sub(1));
            let dotted = text[dots..].trim();
            if !dotted.is_empty() {
                includes.push(format!("{prefix}{}.py", dotted.replace('.', "/")));
                continue;
            }
            // `from . import a, b` imports sibling modules
            let mut names = statement.walk();
            for name in statement.children_by_field_name("name", &mut names) {
                let module_name = match name.kind() {
                    "aliased_import" => name.child_by_field_name("name"),
                    _ => Some(name),
                };
                if let Some(module_name) = module_name {
                    let module_name = node_text(module_name, bytes);
                    includes.push(format!("{prefix}{}.py", module_name.replace('.', "/")));
                }
            }
        }
        includes
    }

    /// `pkg.py` may also be the package `pkg/__init__.py`.
    fn include_candidates(&self, raw: &str) -> Vec<String> {
        let mut candidates = vec![raw.to_string()];
        if let Some(module) = raw.strip_suffix(".py") {
            candidates.push(format!("{module}/__init__.py"));
        }
        candidates
    }
}
