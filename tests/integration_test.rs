use std::fs;
use std::path::{Path, PathBuf};

use codegraph::codegraph::{BuildOutput, CodeGraph};
use codegraph::config::CodeGraphConfig;
use codegraph::graph::GraphAssembler;
use codegraph::resolution::OracleMode;
use codegraph::types::*;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    dir
}

fn build(root: &Path, seeds: &[&str]) -> BuildOutput {
    let seeds: Vec<PathBuf> = seeds.iter().map(PathBuf::from).collect();
    CodeGraph::open(root)
        .unwrap()
        .build(&seeds, &OracleMode::Disabled, &CancellationToken::new())
        .unwrap()
}

fn named(graph: &GraphAssembler, name: &str) -> Entity {
    let mut found = graph.lookup_by_name(name);
    assert_eq!(found.len(), 1, "expected exactly one entity named '{}'", name);
    found.remove(0)
}

fn assert_containment(graph: &GraphAssembler) {
    for entity in graph.entities() {
        let containers = graph.incoming_edges(&entity.id, &[EdgeKind::Defines]);
        if entity.kind == EntityKind::File {
            assert!(containers.is_empty(), "file {} is contained", entity.name);
        } else {
            assert_eq!(containers.len(), 1, "{} has {} containers", entity.qualified_name, containers.len());
            assert_eq!(entity.parent_id.as_deref(), Some(containers[0].source.as_str()));
        }
    }
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_call_across_files() {
    let dir = project(&[
        ("a.c", "int bar(void);\nint foo(void) { return bar(); }\n"),
        ("b.c", "int bar(void) { return 42; }\n"),
    ]);
    let built = build(dir.path(), &[]);
    let foo = named(&built.graph, "foo");
    let bar = named(&built.graph, "bar");
    assert_eq!(bar.file_path.as_deref(), Some("b.c"));

    let calls: Vec<Edge> = built
        .graph
        .edges()
        .into_iter()
        .filter(|e| e.kind == EdgeKind::Calls)
        .collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].source, foo.id);
    assert_eq!(calls[0].target, bar.id);
    assert_eq!(calls[0].resolved_by, Some(ResolutionTier::Exact));
    assert_eq!(built.summary.unresolved, 0);
}

#[test]
fn test_inheritance_in_same_file() {
    let dir = project(&[(
        "shapes.hpp",
        "class Base {\npublic:\n    int id;\n};\nclass Derived : public Base {\n};\n",
    )]);
    let built = build(dir.path(), &[]);
    let base = named(&built.graph, "Base");
    let derived = named(&built.graph, "Derived");
    let inherits = built.graph.outgoing_edges(&derived.id, &[EdgeKind::Inherits]);
    assert_eq!(inherits.len(), 1);
    assert_eq!(inherits[0].target, base.id);
    assert_eq!(built.graph.neighbors(&base.id, EdgeKind::Inherits, Direction::Incoming), vec![derived.id]);
}

#[test]
fn test_undefined_call_gets_stub() {
    let dir = project(&[("main.c", "int main(void) {\n    return external_thing(1);\n}\n")]);
    let built = build(dir.path(), &[]);
    let main = named(&built.graph, "main");
    let stub = named(&built.graph, "external_thing");
    assert!(stub.is_stub());
    assert_eq!(stub.kind, EntityKind::Function);
    assert_eq!((stub.start_line, stub.end_line), (0, 0));
    assert_eq!((stub.start_column, stub.end_column), (0, 0));

    let calls = built.graph.outgoing_edges(&main.id, &[EdgeKind::Calls]);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, stub.id);
    assert_eq!(built.summary.stubs_created, 1);
    assert_containment(&built.graph);
}

#[test]
fn test_malformed_construct_does_not_stop_file() {
    let dir = project(&[(
        "mixed.cpp",
        "int good_one() { return 1; }\nvoid broken(int a,, int b) { return; }\nint good_two() { return good_one(); }\n",
    )]);
    let built = build(dir.path(), &[]);
    named(&built.graph, "good_one");
    let two = named(&built.graph, "good_two");
    assert!(built.graph.lookup_by_name("broken").is_empty());
    assert!(built.summary.skipped_constructs >= 1);
    assert!(built.summary.skipped_files.is_empty());
    assert_eq!(built.graph.outgoing_edges(&two.id, &[EdgeKind::Calls]).len(), 1);
}

// ---------------------------------------------------------------------------
// Pipeline properties
// ---------------------------------------------------------------------------

const APP: &[(&str, &str)] = &[
    (
        "src/main.cpp",
        "#include \"engine.hpp\"\n#include \"missing.hpp\"\nint main() {\n    app::Engine e;\n    e.start();\n    puts(\"done\");\n    return 0;\n}\n",
    ),
    (
        "include/engine.hpp",
        "#include \"base.hpp\"\nnamespace app {\nclass Engine : public Component {\npublic:\n    Engine();\n    void start();\n    Config config;\n};\n}\n",
    ),
    (
        "src/engine.cpp",
        "#include \"engine.hpp\"\nnamespace app {\nEngine::Engine() {}\nvoid Engine::start() { log_line(\"start\"); }\n}\n",
    ),
    (
        "include/base.hpp",
        "struct Config { int level; };\nclass Component {\npublic:\n    virtual ~Component() {}\n};\n",
    ),
    ("src/unrelated.cpp", "void unrelated() {}\n"),
];

#[test]
fn test_seeded_build_follows_includes() {
    let dir = project(APP);
    let built = build(dir.path(), &["src/main.cpp", "src/engine.cpp"]);
    let summary = &built.summary;
    assert_eq!(summary.files_in_scope, 4);
    assert_eq!(summary.files_extracted, 4);
    assert_eq!(summary.unresolved_includes, 1);
    assert!(built.graph.lookup_by_name("unrelated").is_empty());

    let engine = built
        .graph
        .lookup_by_qualified_name("app::Engine")
        .into_iter()
        .find(|e| e.kind == EntityKind::Class)
        .unwrap();
    let component = named(&built.graph, "Component");
    let config = built.graph.lookup_by_qualified_name("Config");
    assert_eq!(built.graph.neighbors(&engine.id, EdgeKind::Inherits, Direction::Outgoing), vec![component.id]);

    let field = built.graph.lookup_by_qualified_name("app::Engine::config").remove(0);
    assert_eq!(
        built.graph.neighbors(&field.id, EdgeKind::HasType, Direction::Outgoing),
        vec![config[0].id.clone()]
    );

    let start = built
        .graph
        .lookup_by_name("start")
        .into_iter()
        .find(|e| e.kind == EntityKind::Method)
        .unwrap();
    assert_eq!(start.file_path.as_deref(), Some("src/engine.cpp"));
    let main = named(&built.graph, "main");
    assert!(built
        .graph
        .neighbors(&main.id, EdgeKind::Calls, Direction::Outgoing)
        .contains(&start.id));
    assert_containment(&built.graph);
}

#[test]
fn test_build_is_idempotent() {
    let dir = project(APP);
    let first = build(dir.path(), &[]).graph.export();
    let second = build(dir.path(), &[]).graph.export();
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.edges, second.edges);
}

#[test]
fn test_whole_project_scan() {
    let dir = project(APP);
    let built = build(dir.path(), &[]);
    assert_eq!(built.summary.files_in_scope, 5);
    named(&built.graph, "unrelated");
    let stats = built.graph.stats();
    assert_eq!(stats.file_count, 5);
    // puts and log_line
    assert_eq!(stats.stub_count, 2);
    assert_containment(&built.graph);
}

#[test]
fn test_cancelled_build_returns_partial_result() {
    let dir = project(APP);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let built = CodeGraph::open(dir.path())
        .unwrap()
        .build(&[], &OracleMode::Disabled, &cancel)
        .unwrap();
    assert!(built.summary.cancelled);
    assert_eq!(built.summary.pending_symbols, 0);
    assert_eq!(built.summary.entity_count, built.graph.entity_count());
}

#[test]
fn test_oversized_file_is_skipped() {
    let dir = project(&[
        ("small.c", "void small(void) {}\n"),
        ("big.c", "void big(void) {\n    int padding_padding_padding = 0;\n}\n"),
    ]);
    let config = CodeGraphConfig {
        max_file_size: 24,
        ..CodeGraphConfig::default()
    };
    let built = CodeGraph::with_config(dir.path(), config)
        .build(
            &[PathBuf::from("small.c"), PathBuf::from("big.c")],
            &OracleMode::Disabled,
            &CancellationToken::new(),
        )
        .unwrap();
    named(&built.graph, "small");
    assert!(built.graph.lookup_by_name("big").is_empty());
    assert_eq!(built.summary.skipped_files.len(), 1);
    assert_eq!(built.summary.skipped_files[0].path, "big.c");
}

#[test]
fn test_unreadable_include_is_skipped() {
    let dir = project(&[("main.c", "#include \"blob.h\"\nvoid run(void) {}\n")]);
    fs::write(dir.path().join("blob.h"), [0xff_u8, 0xfe, 0x00, 0x80]).unwrap();
    let built = build(dir.path(), &["main.c"]);
    named(&built.graph, "run");
    assert_eq!(built.summary.files_in_scope, 1);
    assert_eq!(built.summary.skipped_files.len(), 1);
    assert_eq!(built.summary.skipped_files[0].path, "blob.h");
}

#[test]
fn test_non_utf8_source_is_skipped_in_project_scan() {
    let dir = project(&[("good.c", "void good(void) {}\n")]);
    fs::write(dir.path().join("legacy.c"), b"/* caf\xe9 */\nvoid legacy(void) {}\n").unwrap();
    let built = build(dir.path(), &[]);
    named(&built.graph, "good");
    assert!(built.graph.lookup_by_name("legacy").is_empty());
    assert_eq!(built.summary.files_in_scope, 1);
    assert_eq!(built.summary.skipped_files.len(), 1);
    assert_eq!(built.summary.skipped_files[0].path, "legacy.c");
}

#[test]
fn test_non_utf8_explicit_seed_is_skipped() {
    let dir = project(&[("good.c", "void good(void) {}\n")]);
    fs::write(dir.path().join("legacy.c"), b"/* caf\xe9 */\nvoid legacy(void) {}\n").unwrap();
    let built = build(dir.path(), &["good.c", "legacy.c"]);
    named(&built.graph, "good");
    assert_eq!(built.summary.skipped_files.len(), 1);
    assert_eq!(built.summary.skipped_files[0].path, "legacy.c");
}

#[test]
fn test_missing_seed_is_fatal() {
    let dir = project(&[("a.c", "void a(void) {}\n")]);
    let result = CodeGraph::open(dir.path()).unwrap().build(
        &[PathBuf::from("absent.c")],
        &OracleMode::Disabled,
        &CancellationToken::new(),
    );
    assert!(result.is_err());
}

#[test]
fn test_init_persists_config() {
    let dir = project(&[("a.c", "void a(void) {}\n")]);
    assert!(!CodeGraph::is_initialized(dir.path()));
    CodeGraph::init(dir.path()).unwrap();
    assert!(CodeGraph::is_initialized(dir.path()));
    let cg = CodeGraph::open(dir.path()).unwrap();
    assert_eq!(cg.config().root_dir, dir.path().to_string_lossy());
    // the config directory is never scanned
    assert_eq!(cg.scan_sources().unwrap(), vec![PathBuf::from("a.c")]);
}

#[test]
fn test_export_serializes() {
    let dir = project(&[("a.c", "int bar(void) { return 1; }\nint foo(void) { return bar(); }\n")]);
    let built = build(dir.path(), &[]);
    let json = serde_json::to_value(built.graph.export()).unwrap();
    assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
    let kinds: Vec<&str> = json["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.iter().filter(|k| **k == "Calls").count(), 1);
}

#[cfg(feature = "python")]
#[test]
fn test_python_project() {
    let dir = project(&[
        ("app/main.py", "from .models import User\n\ndef run():\n    return User().greet()\n"),
        (
            "app/models.py",
            "from .base import Model\n\nclass User(Model):\n    def greet(self):\n        return 'hi'\n",
        ),
        ("app/base.py", "class Model:\n    pass\n"),
    ]);
    let built = build(dir.path(), &["app/main.py"]);
    assert_eq!(built.summary.files_in_scope, 3);
    let user = named(&built.graph, "User");
    let model = named(&built.graph, "Model");
    assert_eq!(built.graph.neighbors(&user.id, EdgeKind::Inherits, Direction::Outgoing), vec![model.id]);
    let run = named(&built.graph, "run");
    let greet = named(&built.graph, "greet");
    assert!(built
        .graph
        .neighbors(&run.id, EdgeKind::Calls, Direction::Outgoing)
        .contains(&greet.id));
    assert_containment(&built.graph);
}
