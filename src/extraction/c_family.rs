//! Grammar adapter for C and C++.
//!
//! Both dialects share node names for everything C has, so one adapter
//! serves both grammars; C++ adds classes, namespaces, templates, aliases
//! and using-declarations.

use tree_sitter::{Language, Node as TsNode};

use super::extractor::parse_tree;
use super::{is_adjacent, node_text, GrammarAdapter, ScopeFrame, SymbolCollector, ANONYMOUS, UNNAMED};
use crate::errors::{CodeGraphError, Result};
use crate::types::{EntityKind, Parameter, PendingSymbol, Signature, SymbolRole};

/// Which C-family grammar an adapter instance uses.
///
/// `.h` headers always go to the C++ grammar. A pure-C header that uses a
/// C++ keyword as an identifier (`class`, `new`, `template`) parses with
/// errors there, and the affected constructs are skipped as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    C,
    Cpp,
}

const C_ENTITY_KINDS: &[&str] = &[
    "function_definition",
    "struct_specifier",
    "union_specifier",
    "enum_specifier",
    "type_definition",
    "field_declaration",
];

const CPP_ENTITY_KINDS: &[&str] = &[
    "function_definition",
    "struct_specifier",
    "union_specifier",
    "enum_specifier",
    "type_definition",
    "field_declaration",
    "class_specifier",
    "namespace_definition",
    "template_declaration",
    "alias_declaration",
    "using_declaration",
];

const RECORD_SPECIFIERS: &[&str] = &[
    "class_specifier",
    "struct_specifier",
    "union_specifier",
    "enum_specifier",
];

/// Extracts C and C++ entities using tree-sitter.
#[derive(Debug, Clone)]
pub struct CFamilyAdapter {
    dialect: Dialect,
}

impl CFamilyAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn unknown(node: TsNode<'_>) -> CodeGraphError {
        CodeGraphError::UnknownConstruct {
            node_kind: node.kind().to_string(),
            path: String::new(),
            line: node.start_position().row as u32,
        }
    }

    fn is_entity_kind(&self, kind: &str) -> bool {
        self.entity_node_kinds().contains(&kind)
    }

    /// The declaration wrapped by a `template_declaration`.
    fn template_inner(node: TsNode<'_>) -> Option<TsNode<'_>> {
        let mut cursor = node.walk();
        let inner = node.named_children(&mut cursor).find(|c| {
            matches!(
                c.kind(),
                "function_definition"
                    | "class_specifier"
                    | "struct_specifier"
                    | "union_specifier"
                    | "alias_declaration"
                    | "template_declaration"
                    | "declaration"
            )
        });
        inner
    }

    /// Descends through pointer/reference/array wrappers to the
    /// `function_declarator` of a definition.
    fn function_declarator(node: TsNode<'_>) -> Option<TsNode<'_>> {
        let mut current = node.child_by_field_name("declarator")?;
        loop {
            match current.kind() {
                "function_declarator" => return Some(current),
                "pointer_declarator"
                | "reference_declarator"
                | "parenthesized_declarator"
                | "attributed_declarator" => {
                    current = current
                        .child_by_field_name("declarator")
                        .or_else(|| current.named_child(0))?;
                }
                _ => return None,
            }
        }
    }

    /// Finds the identifier node a (possibly nested) declarator names.
    fn declarator_name(node: TsNode<'_>) -> Option<TsNode<'_>> {
        let mut current = node;
        loop {
            match current.kind() {
                "identifier" | "field_identifier" | "type_identifier" | "destructor_name"
                | "operator_name" => return Some(current),
                "qualified_identifier" | "template_function" | "template_method" => {
                    current = current.child_by_field_name("name")?;
                }
                "reference_declarator" => {
                    current = current.named_child(0)?;
                }
                _ => {
                    current = current
                        .child_by_field_name("declarator")
                        .or_else(|| current.named_child(0))?;
                }
            }
        }
    }

    /// Whether a declarator chain declares a function. `(*f)(int)` is a
    /// function pointer, not a function.
    fn declares_function(node: TsNode<'_>) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n.kind() == "function_declarator" {
                return n
                    .child_by_field_name("declarator")
                    .is_none_or(|d| d.kind() != "parenthesized_declarator");
            }
            current = n.child_by_field_name("declarator");
        }
        false
    }

    /// `A::B` for a declarator naming `A::B::f`; `None` when unqualified.
    fn declarator_qualifier(node: TsNode<'_>, source: &[u8]) -> Option<String> {
        let mut parts = Vec::new();
        let mut current = node;
        while current.kind() == "qualified_identifier" {
            if let Some(scope) = current.child_by_field_name("scope") {
                parts.push(Self::strip_template_args(&node_text(scope, source)));
            }
            match current.child_by_field_name("name") {
                Some(name) => current = name,
                None => break,
            }
        }
        (!parts.is_empty()).then(|| parts.join("::"))
    }

    /// Nearest enclosing frame that is not a template wrapper.
    fn enclosing(scope: &[ScopeFrame]) -> Option<&ScopeFrame> {
        scope.iter().rev().find(|f| f.kind != EntityKind::Template)
    }

    fn classify_function(&self, node: TsNode<'_>, source: &[u8], scope: &[ScopeFrame]) -> Result<EntityKind> {
        let declarator = Self::function_declarator(node).ok_or_else(|| Self::unknown(node))?;
        if self.dialect == Dialect::C {
            return Ok(EntityKind::Function);
        }
        let target = declarator
            .child_by_field_name("declarator")
            .ok_or_else(|| Self::unknown(node))?;
        let name_node = Self::declarator_name(target).ok_or_else(|| Self::unknown(node))?;
        if name_node.kind() == "destructor_name" {
            return Ok(EntityKind::Destructor);
        }
        let name = node_text(name_node, source);

        if let Some(frame) = Self::enclosing(scope).filter(|f| f.kind.is_record()) {
            return Ok(if name == frame.name {
                EntityKind::Constructor
            } else {
                EntityKind::Method
            });
        }

        if let Some(qualifier) = Self::declarator_qualifier(target, source) {
            let last_scope = qualifier.rsplit("::").next().unwrap_or_default().to_string();
            if last_scope == name {
                return Ok(EntityKind::Constructor);
            }
            let names_namespace = scope
                .iter()
                .any(|f| f.kind == EntityKind::Namespace && f.name == last_scope);
            if !last_scope.is_empty() && !names_namespace {
                return Ok(EntityKind::Method);
            }
        }
        Ok(EntityKind::Function)
    }

    fn strip_template_args(text: &str) -> String {
        let base = text.split('<').next().unwrap_or(text);
        base.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Name of a referenced type, or `None` for builtins and unnamed types.
    fn type_ref_name(node: TsNode<'_>, source: &[u8]) -> Option<String> {
        match node.kind() {
            "type_identifier" => Some(node_text(node, source)),
            "qualified_identifier" => Some(Self::strip_template_args(&node_text(node, source))),
            "template_type" => node
                .child_by_field_name("name")
                .map(|n| Self::strip_template_args(&node_text(n, source))),
            "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
                if node.child_by_field_name("body").is_none() =>
            {
                node.child_by_field_name("name")
                    .map(|n| Self::strip_template_args(&node_text(n, source)))
            }
            _ => None,
        }
    }

    /// Records every user type mentioned by a type node, including template
    /// arguments (`std::vector<Widget>` mentions both `std::vector` and `Widget`).
    fn collect_type_refs(
        node: TsNode<'_>,
        source: &[u8],
        role: SymbolRole,
        collector: &mut SymbolCollector,
    ) {
        match node.kind() {
            "type_descriptor" => {
                if let Some(inner) = node.child_by_field_name("type") {
                    Self::collect_type_refs(inner, source, role, collector);
                }
            }
            "template_argument_list" => {
                let mut cursor = node.walk();
                for arg in node.named_children(&mut cursor) {
                    Self::collect_type_refs(arg, source, role, collector);
                }
            }
            _ => {
                if let Some(name) = Self::type_ref_name(node, source) {
                    collector.push(role, name, Self::name_anchor(node));
                }
                if let Some(args) = Self::template_arguments(node) {
                    Self::collect_type_refs(args, source, role, collector);
                }
            }
        }
    }

    /// Template argument list of a (possibly qualified) template type.
    fn template_arguments(node: TsNode<'_>) -> Option<TsNode<'_>> {
        let mut current = node;
        loop {
            match current.kind() {
                "template_type" => return current.child_by_field_name("arguments"),
                "qualified_identifier" => current = current.child_by_field_name("name")?,
                _ => return None,
            }
        }
    }

    /// Innermost name node of a (qualified, member or template) reference;
    /// the position an oracle should be asked about.
    fn name_anchor(node: TsNode<'_>) -> TsNode<'_> {
        let mut current = node;
        loop {
            let next = match current.kind() {
                "field_expression" => current.child_by_field_name("field"),
                "qualified_identifier" | "template_function" | "template_method" | "template_type" => {
                    current.child_by_field_name("name")
                }
                _ => None,
            };
            match next {
                Some(next) => current = next,
                None => return current,
            }
        }
    }

    /// Name of the function a call expression targets.
    fn callee_name(node: TsNode<'_>, source: &[u8]) -> Option<String> {
        match node.kind() {
            "identifier" => Some(node_text(node, source)),
            "field_expression" => node
                .child_by_field_name("field")
                .and_then(|f| Self::callee_name(f, source)),
            "field_identifier" | "destructor_name" => Some(node_text(node, source)),
            "qualified_identifier" => Some(Self::strip_template_args(&node_text(node, source))),
            "template_function" | "template_method" => node
                .child_by_field_name("name")
                .map(|n| Self::strip_template_args(&node_text(n, source))),
            "parenthesized_expression" => node
                .named_child(0)
                .and_then(|n| Self::callee_name(n, source)),
            _ => None,
        }
    }

    /// Records call targets in a function body, leaving nested entities to
    /// their own extraction.
    fn collect_calls(&self, node: TsNode<'_>, source: &[u8], collector: &mut SymbolCollector) {
        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                let child = cursor.node();
                // nested entities record their own calls
                let nested = self.is_entity_kind(child.kind()) && self.declares_entity(child, source);
                if !nested {
                    match child.kind() {
                        "call_expression" => {
                            if let Some(callee) = child.child_by_field_name("function") {
                                if let Some(name) = Self::callee_name(callee, source) {
                                    collector.push(SymbolRole::Call, name, Self::name_anchor(callee));
                                }
                            }
                        }
                        "new_expression" => {
                            if let Some(ty) = child.child_by_field_name("type") {
                                if let Some(name) = Self::type_ref_name(ty, source) {
                                    collector.push(SymbolRole::Call, name, Self::name_anchor(ty));
                                }
                            }
                        }
                        _ => {}
                    }
                    self.collect_calls(child, source, collector);
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
    }

    fn collect_base_classes(node: TsNode<'_>, source: &[u8], collector: &mut SymbolCollector) {
        let mut cursor = node.walk();
        let Some(clause) = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "base_class_clause")
        else {
            return;
        };
        let mut clause_cursor = clause.walk();
        for base in clause.named_children(&mut clause_cursor) {
            if let Some(name) = Self::type_ref_name(base, source) {
                collector.push(SymbolRole::BaseClass, name, Self::name_anchor(base));
            }
        }
    }

    /// Type text of a parameter or return value, with pointer/reference
    /// sigils from the declarator.
    fn type_with_sigils(type_node: TsNode<'_>, declarator: Option<TsNode<'_>>, source: &[u8]) -> String {
        let mut text = node_text(type_node, source);
        let mut current = declarator;
        while let Some(d) = current {
            match d.kind() {
                "pointer_declarator" | "abstract_pointer_declarator" => text.push('*'),
                "reference_declarator" | "abstract_reference_declarator" => {
                    text.push_str(if node_text(d, source).starts_with("&&") { "&&" } else { "&" })
                }
                _ => {}
            }
            current = d
                .child_by_field_name("declarator")
                .or_else(|| match d.kind() {
                    "reference_declarator" | "abstract_reference_declarator" => d.named_child(0),
                    _ => None,
                });
        }
        text
    }

    /// Cleans a single doc comment.
    fn clean_comment(comment: &str) -> String {
        let trimmed = comment.trim();
        if let Some(stripped) = trimmed
            .strip_prefix("///")
            .or_else(|| trimmed.strip_prefix("//!"))
        {
            stripped.strip_prefix(' ').unwrap_or(stripped).to_string()
        } else if trimmed.len() >= 5 && (trimmed.starts_with("/**") || trimmed.starts_with("/*!")) {
            let inner = trimmed[3..].strip_suffix("*/").unwrap_or(&trimmed[3..]);
            inner
                .lines()
                .map(|line| {
                    let l = line.trim();
                    l.strip_prefix("* ")
                        .or_else(|| l.strip_prefix('*'))
                        .unwrap_or(l)
                })
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn is_doc_comment(text: &str) -> bool {
        let t = text.trim_start();
        (t.starts_with("///") && !t.starts_with("////"))
            || t.starts_with("//!")
            || (t.starts_with("/**") && t != "/**/")
            || t.starts_with("/*!")
    }
}

impl GrammarAdapter for CFamilyAdapter {
    fn language_name(&self) -> &str {
        match self.dialect {
            Dialect::C => "C",
            Dialect::Cpp => "C++",
        }
    }

    fn extensions(&self) -> &[&str] {
        match self.dialect {
            Dialect::C => &["c"],
            Dialect::Cpp => &["cc", "cpp", "cxx", "c++", "hpp", "hh", "hxx", "h"],
        }
    }

    fn language(&self) -> Language {
        match self.dialect {
            Dialect::C => tree_sitter_c::LANGUAGE.into(),
            Dialect::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    fn entity_node_kinds(&self) -> &[&str] {
        match self.dialect {
            Dialect::C => C_ENTITY_KINDS,
            Dialect::Cpp => CPP_ENTITY_KINDS,
        }
    }

    fn declares_entity(&self, node: TsNode<'_>, source: &[u8]) -> bool {
        match node.kind() {
            kind if RECORD_SPECIFIERS.contains(&kind) => node.child_by_field_name("body").is_some(),
            "field_declaration" => node
                .child_by_field_name("declarator")
                .is_some_and(|d| !Self::declares_function(d)),
            // Templated prototypes and variable templates are not definitions.
            "template_declaration" => Self::template_inner(node)
                .is_some_and(|inner| inner.kind() != "declaration" && self.declares_entity(inner, source)),
            _ => true,
        }
    }

    fn classify(&self, node: TsNode<'_>, source: &[u8], scope: &[ScopeFrame]) -> Result<EntityKind> {
        match node.kind() {
            "function_definition" => self.classify_function(node, source, scope),
            "class_specifier" => Ok(EntityKind::Class),
            "struct_specifier" => Ok(EntityKind::Struct),
            "union_specifier" => Ok(EntityKind::Union),
            "enum_specifier" => Ok(EntityKind::Enum),
            "namespace_definition" => Ok(EntityKind::Namespace),
            "template_declaration" => Ok(EntityKind::Template),
            "type_definition" | "alias_declaration" => Ok(EntityKind::TypeAlias),
            "using_declaration" => Ok(EntityKind::UsingDirective),
            "field_declaration" => Ok(EntityKind::Field),
            _ => Err(Self::unknown(node)),
        }
    }

    fn extract_name(&self, node: TsNode<'_>, source: &[u8]) -> String {
        let name = match node.kind() {
            "function_definition" => Self::function_declarator(node)
                .and_then(|d| d.child_by_field_name("declarator"))
                .and_then(Self::declarator_name)
                .map(|n| node_text(n, source))
                .or_else(|| Some(UNNAMED.to_string())),
            "namespace_definition" | "alias_declaration" => {
                node.child_by_field_name("name").map(|n| node_text(n, source))
            }
            kind if RECORD_SPECIFIERS.contains(&kind) => node
                .child_by_field_name("name")
                .and_then(|n| Self::declarator_name(n).or(Some(n)))
                .map(|n| Self::strip_template_args(&node_text(n, source))),
            "type_definition" | "field_declaration" => node
                .child_by_field_name("declarator")
                .and_then(Self::declarator_name)
                .map(|n| node_text(n, source))
                .or_else(|| Some(UNNAMED.to_string())),
            "using_declaration" => {
                let mut cursor = node.walk();
                let last = node.named_children(&mut cursor).last();
                last.map(|n| node_text(n, source))
            }
            "template_declaration" => {
                Self::template_inner(node).map(|inner| self.extract_name(inner, source))
            }
            _ => None,
        };
        name.filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string())
    }

    fn name_qualifier(&self, node: TsNode<'_>, source: &[u8]) -> Option<String> {
        match node.kind() {
            "function_definition" => Self::function_declarator(node)
                .and_then(|d| d.child_by_field_name("declarator"))
                .and_then(|target| Self::declarator_qualifier(target, source)),
            "template_declaration" => {
                Self::template_inner(node).and_then(|inner| self.name_qualifier(inner, source))
            }
            _ => None,
        }
    }

    fn extract_doc(&self, node: TsNode<'_>, source: &[u8]) -> Option<String> {
        let mut comments = Vec::new();
        let mut next = node;
        let mut current = node.prev_named_sibling();
        while let Some(sibling) = current {
            if sibling.kind() != "comment" || !is_adjacent(sibling, next) {
                break;
            }
            let text = node_text(sibling, source);
            if !Self::is_doc_comment(&text) {
                break;
            }
            comments.push(text);
            next = sibling;
            current = sibling.prev_named_sibling();
        }
        if comments.is_empty() {
            return None;
        }
        // Comments are collected in reverse order (closest first).
        comments.reverse();
        let cleaned: Vec<String> = comments.iter().map(|c| Self::clean_comment(c)).collect();
        let result = cleaned.join("\n").trim().to_string();
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    fn extract_signature(&self, _kind: EntityKind, node: TsNode<'_>, source: &[u8]) -> Option<Signature> {
        let declarator = Self::function_declarator(node)?;
        let return_type = node.child_by_field_name("type").map(|t| {
            let outer = node.child_by_field_name("declarator").filter(|d| d.id() != declarator.id());
            Self::type_with_sigils(t, outer, source)
        });

        let mut parameters = Vec::new();
        if let Some(list) = declarator.child_by_field_name("parameters") {
            let mut cursor = list.walk();
            for param in list.named_children(&mut cursor) {
                match param.kind() {
                    "parameter_declaration" | "optional_parameter_declaration" => {
                        let decl = param.child_by_field_name("declarator");
                        let name = decl
                            .and_then(Self::declarator_name)
                            .map(|n| node_text(n, source));
                        let type_name = param
                            .child_by_field_name("type")
                            .map(|t| Self::type_with_sigils(t, decl, source));
                        if name.is_none() && type_name.as_deref() == Some("void") {
                            continue;
                        }
                        parameters.push(Parameter { name, type_name });
                    }
                    "variadic_parameter_declaration" | "variadic_parameter" => {
                        parameters.push(Parameter {
                            name: None,
                            type_name: Some("...".to_string()),
                        });
                    }
                    _ => {}
                }
            }
        }
        Some(Signature {
            return_type,
            parameters,
        })
    }

    fn collect_pending_symbols(&self, kind: EntityKind, node: TsNode<'_>, source: &[u8]) -> Vec<PendingSymbol> {
        let mut collector = SymbolCollector::default();
        match kind {
            EntityKind::Class | EntityKind::Struct | EntityKind::Union => {
                Self::collect_base_classes(node, source, &mut collector);
            }
            EntityKind::Function | EntityKind::Method | EntityKind::Constructor | EntityKind::Destructor => {
                if let Some(ty) = node.child_by_field_name("type") {
                    Self::collect_type_refs(ty, source, SymbolRole::ReturnType, &mut collector);
                }
                if let Some(params) = Self::function_declarator(node)
                    .and_then(|d| d.child_by_field_name("parameters"))
                {
                    let mut cursor = params.walk();
                    for param in params.named_children(&mut cursor) {
                        if let Some(ty) = param.child_by_field_name("type") {
                            Self::collect_type_refs(ty, source, SymbolRole::ParameterType, &mut collector);
                        }
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.collect_calls(body, source, &mut collector);
                }
            }
            EntityKind::Field => {
                if let Some(ty) = node.child_by_field_name("type") {
                    Self::collect_type_refs(ty, source, SymbolRole::FieldType, &mut collector);
                }
            }
            _ => {}
        }
        collector.finish()
    }

    fn local_includes(&self, source: &str) -> Vec<String> {
        let tree = match parse_tree(&self.language(), source) {
            Ok(tree) => tree,
            Err(_) => return Vec::new(),
        };
        let bytes = source.as_bytes();
        let mut includes = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.kind() == "preproc_include" {
                // `<...>` is a system_lib_string and never local.
                if let Some(path) = node
                    .child_by_field_name("path")
                    .filter(|p| p.kind() == "string_literal")
                {
                    let raw = node_text(path, bytes);
                    let raw = raw.trim().trim_matches('"').trim();
                    if !raw.is_empty() {
                        includes.push(raw.to_string());
                    }
                }
                continue;
            }
            let mut cursor = node.walk();
            let children: Vec<_> = node.named_children(&mut cursor).collect();
            // reversed so the stack pops in document order
            stack.extend(children.into_iter().rev());
        }
        includes
    }
}
