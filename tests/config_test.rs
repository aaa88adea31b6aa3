use codegraph::config::*;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_config_has_c_family_and_python_patterns() {
    let config = CodeGraphConfig::default();
    assert!(config.include.iter().any(|p| p == "**/*.cpp"));
    assert!(config.include.iter().any(|p| p == "**/*.h"));
    assert!(config.include.iter().any(|p| p == "**/*.py"));
    assert!(config.exclude.iter().any(|p| p == "build/**"));
    assert!(config.exclude.iter().any(|p| p == ".git/**"));
    assert_eq!(config.include_dirs, vec![".", "include", "src"]);
}

#[test]
fn test_save_and_load_config() {
    let dir = TempDir::new().unwrap();
    let config = CodeGraphConfig {
        worker_threads: 3,
        oracle_timeout_ms: 750,
        ..CodeGraphConfig::default()
    };
    save_config(dir.path(), &config).unwrap();
    let loaded = load_config(dir.path()).unwrap();
    assert_eq!(config, loaded);
    assert!(!get_codegraph_dir(dir.path()).join("config.tmp").exists());
}

#[test]
fn test_load_missing_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let loaded = load_config(dir.path()).unwrap();
    assert_eq!(loaded.max_file_size, CodeGraphConfig::default().max_file_size);
    assert_eq!(loaded.root_dir, dir.path().to_string_lossy());
}

#[test]
fn test_partial_config_fills_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(get_codegraph_dir(dir.path())).unwrap();
    std::fs::write(get_config_path(dir.path()), r#"{ "oracle_concurrency": 3 }"#).unwrap();
    let loaded = load_config(dir.path()).unwrap();
    assert_eq!(loaded.oracle_concurrency, 3);
    assert!(loaded.extract_docstrings);
    assert_eq!(loaded.include_dirs, CodeGraphConfig::default().include_dirs);
}

#[test]
fn test_malformed_config_is_config_error() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(get_codegraph_dir(dir.path())).unwrap();
    std::fs::write(get_config_path(dir.path()), "{ not json").unwrap();
    let err = load_config(dir.path()).unwrap_err();
    assert!(err.to_string().contains("config error"));
}

#[test]
fn test_should_include_file() {
    let config = CodeGraphConfig::default();
    assert!(should_include_file("src/main.cpp", &config));
    assert!(should_include_file("include/widget.hpp", &config));
    assert!(should_include_file("pkg/module.py", &config));
    assert!(!should_include_file("src/main.rs", &config));
    assert!(!should_include_file("build/generated.cpp", &config));
    assert!(!should_include_file("third_party/zlib/zlib.h", &config));
}

#[test]
fn test_is_excluded() {
    let config = CodeGraphConfig::default();
    assert!(is_excluded("vendor/lib/foo.h", &config));
    assert!(is_excluded("cmake-build-debug/x.cpp", &config));
    assert!(is_excluded("pkg/__pycache__/mod.py", &config));
    assert!(!is_excluded("src/foo.h", &config));
}

#[test]
fn test_oracle_settings_are_clamped() {
    let config = CodeGraphConfig {
        oracle_concurrency: 64,
        ..CodeGraphConfig::default()
    };
    assert_eq!(config.effective_oracle_concurrency(), MAX_ORACLE_CONCURRENCY);

    let config = CodeGraphConfig {
        oracle_concurrency: 0,
        oracle_timeout_ms: 0,
        ..CodeGraphConfig::default()
    };
    assert_eq!(config.effective_oracle_concurrency(), 1);
    assert_eq!(config.oracle_timeout(), Duration::from_millis(1));
}

#[test]
fn test_codegraph_dir_creation() {
    let dir = TempDir::new().unwrap();
    let cg_dir = get_codegraph_dir(dir.path());
    assert!(cg_dir.ends_with(".codegraph"));
    assert!(get_config_path(dir.path()).ends_with(".codegraph/config.json"));
}
