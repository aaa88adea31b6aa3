use std::fs;
use std::path::{Path, PathBuf};

use codegraph::config::CodeGraphConfig;
use codegraph::discovery::{relative_path, DependencyDiscovery, DependencySet};
use codegraph::extraction::LanguageRegistry;
use tempfile::TempDir;

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn discover(root: &Path, seeds: &[&str]) -> DependencySet {
    let config = CodeGraphConfig::default();
    let registry = LanguageRegistry::new();
    let seeds: Vec<PathBuf> = seeds.iter().map(PathBuf::from).collect();
    DependencyDiscovery::new(&config, &registry)
        .discover(root, &seeds)
        .unwrap()
}

fn in_scope(set: &DependencySet) -> Vec<String> {
    set.in_scope.iter().map(|p| set.relative(p)).collect()
}

/// Project under `<tmp>/proj` with a sibling `<tmp>/outside` directory.
fn setup() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("proj");
    write(
        &root,
        "src/main.cpp",
        "#include \"widget.h\"\n#include \"util/log.h\"\n#include \"missing.h\"\n#include <vector>\n\
         #include \"../../outside/ext.h\"\n#include \"../vendor/lib.h\"\nint main() { return 0; }\n",
    );
    write(&root, "src/widget.h", "#include \"../include/base.h\"\nclass Widget {};\n");
    write(&root, "include/util/log.h", "void log();\n");
    // cycles back to widget.h through the `src` search directory
    write(&root, "include/base.h", "#include \"widget.h\"\nclass Base {};\n");
    write(&root, "vendor/lib.h", "#include \"vendored.h\"\n");
    write(&root, "vendor/vendored.h", "void vendored();\n");
    write(&root, "src/unused.cpp", "void unused() {}\n");
    write(dir.path(), "outside/ext.h", "#include \"hidden.h\"\n");
    write(dir.path(), "outside/hidden.h", "void hidden();\n");
    (dir, root)
}

#[test]
fn test_breadth_first_expansion() {
    let (_dir, root) = setup();
    let set = discover(&root, &["src/main.cpp"]);
    assert_eq!(
        in_scope(&set),
        vec!["src/main.cpp", "src/widget.h", "include/util/log.h", "include/base.h"]
    );
}

#[test]
fn test_unreached_files_are_not_in_scope() {
    let (_dir, root) = setup();
    let set = discover(&root, &["src/main.cpp"]);
    assert!(!in_scope(&set).contains(&"src/unused.cpp".to_string()));
}

#[test]
fn test_external_and_excluded_files() {
    let (dir, root) = setup();
    let set = discover(&root, &["src/main.cpp"]);
    let outside = dir.path().canonicalize().unwrap().join("outside/ext.h");
    let vendored = root.canonicalize().unwrap().join("vendor/lib.h");
    assert!(set.external.contains(&outside));
    assert!(set.external.contains(&vendored));
    assert_eq!(set.external.len(), 2);

    // files reachable only through external files are never scanned
    let scope = in_scope(&set);
    assert!(!scope.iter().any(|p| p.ends_with("hidden.h")));
    assert!(!scope.iter().any(|p| p.ends_with("vendored.h")));
}

#[test]
fn test_unresolved_includes_recorded() {
    let (_dir, root) = setup();
    let set = discover(&root, &["src/main.cpp"]);
    let raws: Vec<&str> = set.unresolved_includes.iter().map(|u| u.raw.as_str()).collect();
    assert_eq!(raws, vec!["missing.h"]);
    assert_eq!(set.relative(&set.unresolved_includes[0].from), "src/main.cpp");
}

#[test]
fn test_missing_include_outside_root_is_external() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("proj");
    write(&root, "a.c", "#include \"../../nowhere/x.h\"\n");
    let set = discover(&root, &["a.c"]);
    assert!(set.unresolved_includes.is_empty());
    assert_eq!(set.external.len(), 1);
    assert!(set.external[0].ends_with("nowhere/x.h"));
}

#[test]
fn test_missing_seed_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = CodeGraphConfig::default();
    let registry = LanguageRegistry::new();
    let err = DependencyDiscovery::new(&config, &registry)
        .discover(dir.path(), &[PathBuf::from("nope.c")])
        .unwrap_err();
    assert!(err.to_string().contains("nope.c"));
}

#[test]
fn test_missing_scanned_seed_is_skipped() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.c"), "void a(void) {}\n").unwrap();
    let config = CodeGraphConfig::default();
    let registry = LanguageRegistry::new();
    let set = DependencyDiscovery::new(&config, &registry)
        .discover_scanned(dir.path(), &[PathBuf::from("a.c"), PathBuf::from("gone.c")])
        .unwrap();
    assert_eq!(set.in_scope.len(), 1);
    assert_eq!(set.skipped.len(), 1);
    assert_eq!(set.skipped[0].path, "gone.c");
}

#[test]
fn test_missing_root_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = CodeGraphConfig::default();
    let registry = LanguageRegistry::new();
    let result = DependencyDiscovery::new(&config, &registry).discover(&dir.path().join("absent"), &[]);
    assert!(result.is_err());
}

#[test]
fn test_seed_outside_root_is_external() {
    let (dir, root) = setup();
    let outside = dir.path().join("outside/ext.h");
    let set = discover(&root, &[outside.to_str().unwrap()]);
    assert!(set.in_scope.is_empty());
    assert_eq!(set.external, vec![outside.canonicalize().unwrap()]);
}

#[test]
fn test_duplicate_seeds_visited_once() {
    let (_dir, root) = setup();
    let set = discover(&root, &["src/widget.h", "src/widget.h", "include/base.h"]);
    assert_eq!(in_scope(&set), vec!["src/widget.h", "include/base.h"]);
}

#[test]
fn test_files_without_adapter_are_not_scanned() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "notes.txt", "#include \"a.h\"\n");
    write(dir.path(), "a.h", "void a();\n");
    let set = discover(dir.path(), &["notes.txt"]);
    assert_eq!(in_scope(&set), vec!["notes.txt"]);
    assert!(set.unresolved_includes.is_empty());
}

#[cfg(feature = "python")]
#[test]
fn test_python_relative_imports() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app/main.py", "from .models import User\nfrom ..shared import util\nimport os\n");
    write(dir.path(), "app/models.py", "class User:\n    pass\n");
    write(dir.path(), "shared.py", "def util():\n    pass\n");
    let set = discover(dir.path(), &["app/main.py"]);
    assert_eq!(in_scope(&set), vec!["app/main.py", "app/models.py", "shared.py"]);
}

#[cfg(feature = "python")]
#[test]
fn test_python_package_imports() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "app/main.py",
        "from .storage import Store\nfrom . import plugins\nfrom .missing import thing\n",
    );
    write(dir.path(), "app/storage/__init__.py", "class Store:\n    pass\n");
    write(dir.path(), "app/plugins/__init__.py", "");
    let set = discover(dir.path(), &["app/main.py"]);
    assert_eq!(
        in_scope(&set),
        vec!["app/main.py", "app/storage/__init__.py", "app/plugins/__init__.py"]
    );
    assert_eq!(set.unresolved_includes.len(), 1);
    assert_eq!(set.unresolved_includes[0].raw, "missing.py");
}

#[test]
fn test_relative_path_uses_forward_slashes() {
    let root = Path::new("/project");
    assert_eq!(relative_path(root, &root.join("src").join("a.c")), "src/a.c");
}
