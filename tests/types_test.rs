use codegraph::types::*;

#[test]
fn entity_kind_as_str_roundtrip() {
    let kinds = vec![
        EntityKind::File,
        EntityKind::Class,
        EntityKind::Struct,
        EntityKind::Union,
        EntityKind::Enum,
        EntityKind::Namespace,
        EntityKind::Function,
        EntityKind::Method,
        EntityKind::Constructor,
        EntityKind::Destructor,
        EntityKind::Field,
        EntityKind::TypeAlias,
        EntityKind::Template,
        EntityKind::UsingDirective,
    ];

    for kind in kinds {
        let s = kind.as_str();
        let parsed = EntityKind::from_str(s)
            .unwrap_or_else(|| panic!("failed to parse EntityKind from '{}'", s));
        assert_eq!(kind, parsed, "roundtrip failed for EntityKind::{}", s);
    }
}

#[test]
fn entity_kind_from_str_unknown_returns_none() {
    assert!(EntityKind::from_str("trait").is_none());
    assert!(EntityKind::from_str("").is_none());
}

#[test]
fn edge_kind_as_str_roundtrip() {
    for kind in [EdgeKind::Defines, EdgeKind::Calls, EdgeKind::Inherits, EdgeKind::HasType] {
        let s = kind.as_str();
        let parsed =
            EdgeKind::from_str(s).unwrap_or_else(|| panic!("failed to parse EdgeKind from '{}'", s));
        assert_eq!(kind, parsed, "roundtrip failed for EdgeKind::{}", s);
    }
    assert_eq!(EdgeKind::HasType.to_string(), "HAS_TYPE");
}

#[test]
fn roles_map_to_edge_kinds() {
    assert_eq!(SymbolRole::Call.edge_kind(), EdgeKind::Calls);
    assert_eq!(SymbolRole::BaseClass.edge_kind(), EdgeKind::Inherits);
    assert_eq!(SymbolRole::ReturnType.edge_kind(), EdgeKind::HasType);
    assert_eq!(SymbolRole::ParameterType.edge_kind(), EdgeKind::HasType);
    assert_eq!(SymbolRole::FieldType.edge_kind(), EdgeKind::HasType);
}

#[test]
fn roles_filter_candidate_kinds() {
    assert!(SymbolRole::Call.accepts(EntityKind::Function));
    assert!(SymbolRole::Call.accepts(EntityKind::Constructor));
    assert!(!SymbolRole::Call.accepts(EntityKind::Class));
    assert!(SymbolRole::BaseClass.accepts(EntityKind::Struct));
    assert!(SymbolRole::FieldType.accepts(EntityKind::TypeAlias));
    assert!(!SymbolRole::FieldType.accepts(EntityKind::Namespace));
    assert!(!SymbolRole::ReturnType.accepts(EntityKind::Method));
}

#[test]
fn generate_entity_id_is_deterministic() {
    let id1 = generate_entity_id("src/main.cpp", EntityKind::Function, "main", 1);
    let id2 = generate_entity_id("src/main.cpp", EntityKind::Function, "main", 1);
    assert_eq!(id1, id2, "same inputs must produce same ID");
}

#[test]
fn generate_entity_id_format() {
    let id = generate_entity_id("src/widget.hpp", EntityKind::Class, "Widget", 10);
    let (prefix, hash) = id.split_once(':').unwrap();
    assert_eq!(prefix, "class");
    assert_eq!(hash.len(), 32);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_entity_id_differs_by_component() {
    let base = generate_entity_id("a.c", EntityKind::Function, "f", 3);
    assert_ne!(base, generate_entity_id("b.c", EntityKind::Function, "f", 3));
    assert_ne!(base, generate_entity_id("a.c", EntityKind::Function, "g", 3));
    assert_ne!(base, generate_entity_id("a.c", EntityKind::Function, "f", 4));
    assert_ne!(base, generate_entity_id("a.c", EntityKind::Method, "f", 3));
}

#[test]
fn resolution_tier_confidence_orders_stripped_below_exact() {
    assert!(ResolutionTier::Qualified.confidence() > ResolutionTier::Exact.confidence());
    assert!(ResolutionTier::Exact.confidence() > ResolutionTier::Stripped.confidence());
    assert!(ResolutionTier::Stripped.confidence() > ResolutionTier::Stub.confidence());
}

#[test]
fn traversal_options_default() {
    let opts = TraversalOptions::default();
    assert_eq!(opts.max_depth, 3);
    assert_eq!(opts.direction, Direction::Outgoing);
    assert!(opts.include_start);
    assert!(opts.edge_kinds.is_none());
}

#[test]
fn edge_serializes_with_kind_and_provenance() {
    let edge = Edge {
        source: "function:a".to_string(),
        target: "function:b".to_string(),
        kind: EdgeKind::Calls,
        line: Some(4),
        resolved_by: Some(ResolutionTier::Exact),
    };
    let json = serde_json::to_string(&edge).unwrap();
    let back: Edge = serde_json::from_str(&json).unwrap();
    assert_eq!(edge, back);
}
