//! Dependency discovery: expands a seed file set to every project-local file
//! reachable through local includes/imports.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{is_excluded, CodeGraphConfig};
use crate::errors::{CodeGraphError, Result};
use crate::extraction::LanguageRegistry;
use crate::types::SkippedFile;

/// An include that could not be found anywhere inside the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedInclude {
    /// File containing the include directive.
    pub from: PathBuf,
    /// Include string as written.
    pub raw: String,
}

/// Result of dependency discovery.
#[derive(Debug, Clone, Default)]
pub struct DependencySet {
    /// Canonical project root.
    pub project_root: PathBuf,
    /// Canonical paths of in-scope files, in discovery (breadth-first) order.
    pub in_scope: Vec<PathBuf>,
    /// Files reached by an include but outside the root or excluded.
    pub external: Vec<PathBuf>,
    pub unresolved_includes: Vec<UnresolvedInclude>,
    /// Files that could not be read or are not valid UTF-8.
    pub skipped: Vec<SkippedFile>,
}

impl DependencySet {
    /// Project-relative path of an in-scope file, `/`-separated.
    pub fn relative(&self, path: &Path) -> String {
        relative_path(&self.project_root, path)
    }
}

/// Returns `path` relative to `root` with forward slashes, or the full path
/// when it is not under `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolves `..` and `.` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Breadth-first include expansion over a project.
pub struct DependencyDiscovery<'a> {
    config: &'a CodeGraphConfig,
    registry: &'a LanguageRegistry,
}

enum Placement {
    InScope(PathBuf),
    External(PathBuf),
}

impl<'a> DependencyDiscovery<'a> {
    pub fn new(config: &'a CodeGraphConfig, registry: &'a LanguageRegistry) -> Self {
        Self { config, registry }
    }

    /// Expands explicitly requested `seeds` (absolute, or relative to
    /// `project_root`) into the dependency set.
    ///
    /// Fails only when the project root or a seed file cannot be opened or
    /// read. Files whose content is not UTF-8, and every unreadable non-seed
    /// file, are logged and recorded in [`DependencySet::skipped`].
    pub fn discover(&self, project_root: &Path, seeds: &[PathBuf]) -> Result<DependencySet> {
        self.expand(project_root, seeds, true)
    }

    /// Like [`discover`](Self::discover), for seeds produced by a project
    /// scan: an unreadable seed is skipped instead of failing the build.
    pub fn discover_scanned(&self, project_root: &Path, seeds: &[PathBuf]) -> Result<DependencySet> {
        self.expand(project_root, seeds, false)
    }

    fn expand(&self, project_root: &Path, seeds: &[PathBuf], seeds_required: bool) -> Result<DependencySet> {
        let root = project_root.canonicalize().map_err(|e| CodeGraphError::File {
            message: format!("cannot open project root: {e}"),
            path: project_root.display().to_string(),
        })?;

        let mut set = DependencySet {
            project_root: root.clone(),
            ..DependencySet::default()
        };
        let mut external = BTreeSet::new();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut queue: VecDeque<(PathBuf, bool)> = VecDeque::new();

        for seed in seeds {
            let joined = if seed.is_absolute() {
                seed.clone()
            } else {
                root.join(seed)
            };
            let canonical = match joined.canonicalize() {
                Ok(canonical) => canonical,
                Err(e) if seeds_required => {
                    return Err(CodeGraphError::File {
                        message: format!("cannot open seed file: {e}"),
                        path: joined.display().to_string(),
                    });
                }
                Err(e) => {
                    warn!(file = %joined.display(), error = %e, "skipping unreadable seed");
                    set.skipped.push(SkippedFile {
                        path: relative_path(&root, &joined),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            match self.place(&root, canonical) {
                Placement::InScope(path) => {
                    if visited.insert(path.clone()) {
                        queue.push_back((path, true));
                    }
                }
                Placement::External(path) => {
                    warn!(file = %path.display(), "seed file is outside the project scope");
                    external.insert(path);
                }
            }
        }

        while let Some((file, is_seed)) = queue.pop_front() {
            let content = match fs::read_to_string(&file) {
                Ok(content) => content,
                Err(e) if is_seed && seeds_required && e.kind() != ErrorKind::InvalidData => {
                    return Err(CodeGraphError::File {
                        message: format!("cannot read seed file: {e}"),
                        path: file.display().to_string(),
                    });
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "skipping unreadable file");
                    set.skipped.push(SkippedFile {
                        path: relative_path(&root, &file),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            set.in_scope.push(file.clone());

            let relative = relative_path(&root, &file);
            let Some(adapter) = self.registry.adapter_for_file(&relative) else {
                debug!(file = %relative, "no grammar adapter, not scanning for includes");
                continue;
            };

            let dir = file.parent().unwrap_or(&root).to_path_buf();
            for raw in adapter.local_includes(&content) {
                match self.resolve_include(&root, &dir, &adapter.include_candidates(&raw)) {
                    Some(Placement::InScope(path)) => {
                        if visited.insert(path.clone()) {
                            queue.push_back((path, false));
                        }
                    }
                    Some(Placement::External(path)) => {
                        debug!(from = %relative, include = %raw, "external include");
                        external.insert(path);
                    }
                    None => {
                        debug!(from = %relative, include = %raw, "unresolved include");
                        set.unresolved_includes.push(UnresolvedInclude {
                            from: file.clone(),
                            raw,
                        });
                    }
                }
            }
        }

        set.external = external.into_iter().collect();
        info!(
            in_scope = set.in_scope.len(),
            external = set.external.len(),
            unresolved_includes = set.unresolved_includes.len(),
            "dependency discovery complete"
        );
        Ok(set)
    }

    /// Classifies a canonical path as in scope or external.
    fn place(&self, root: &Path, path: PathBuf) -> Placement {
        match path.strip_prefix(root) {
            Ok(relative) => {
                let relative = relative_path(Path::new(""), relative);
                if is_excluded(&relative, self.config) {
                    Placement::External(path)
                } else {
                    Placement::InScope(path)
                }
            }
            Err(_) => Placement::External(path),
        }
    }

    /// Tries each candidate spelling in order, each against the including
    /// file's directory first and then the configured root-level search
    /// directories. Returns `None` for an include that
    /// exists nowhere and would stay inside the project.
    fn resolve_include(&self, root: &Path, dir: &Path, candidates: &[String]) -> Option<Placement> {
        for raw in candidates {
            let paths = std::iter::once(dir.join(raw)).chain(
                self.config
                    .include_dirs
                    .iter()
                    .map(|search| root.join(search).join(raw)),
            );
            for path in paths {
                if path.is_file() {
                    if let Ok(canonical) = path.canonicalize() {
                        return Some(self.place(root, canonical));
                    }
                }
            }
        }

        let guess = normalize_lexically(&dir.join(candidates.first()?));
        if guess.starts_with(root) {
            None
        } else {
            Some(Placement::External(guess))
        }
    }
}
