use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{get_config_path, load_config, save_config, should_include_file, CodeGraphConfig};
use crate::discovery::{relative_path, DependencyDiscovery, DependencySet};
use crate::errors::{CodeGraphError, Result};
use crate::extraction::{EntityExtractor, LanguageRegistry};
use crate::graph::{GraphAssembler, GraphTraverser};
use crate::resolution::{OracleMode, SymbolResolver};
use crate::types::*;

/// Central orchestrator: discovery, Pass 1, barrier, Pass 2.
pub struct CodeGraph {
    config: CodeGraphConfig,
    project_root: PathBuf,
    registry: LanguageRegistry,
}

/// A finished (possibly partial) build.
pub struct BuildOutput {
    pub graph: GraphAssembler,
    pub dependencies: DependencySet,
    pub summary: BuildSummary,
}

impl BuildOutput {
    pub fn traverser(&self) -> GraphTraverser<'_> {
        GraphTraverser::new(&self.graph)
    }
}

enum FileOutcome {
    Extracted(FileExtraction),
    Skipped(SkippedFile),
    Cancelled,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl CodeGraph {
    /// Writes a default configuration under `.codegraph/` and opens the project.
    pub fn init(project_root: &Path) -> Result<Self> {
        let config = CodeGraphConfig {
            root_dir: project_root.to_string_lossy().to_string(),
            ..CodeGraphConfig::default()
        };
        save_config(project_root, &config)?;
        Ok(Self::with_config(project_root, config))
    }

    /// Opens a project, using its saved configuration when present and
    /// defaults otherwise.
    pub fn open(project_root: &Path) -> Result<Self> {
        let config = load_config(project_root)?;
        Ok(Self::with_config(project_root, config))
    }

    pub fn with_config(project_root: &Path, config: CodeGraphConfig) -> Self {
        Self {
            config,
            project_root: project_root.to_path_buf(),
            registry: LanguageRegistry::new(),
        }
    }

    /// Replaces the language registry (to plug in extra grammars).
    pub fn with_registry(mut self, registry: LanguageRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns `true` if a configuration has been saved at the given root.
    pub fn is_initialized(project_root: &Path) -> bool {
        get_config_path(project_root).exists()
    }

    pub fn config(&self) -> &CodeGraphConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

impl CodeGraph {
    /// Builds the graph from `seeds` (project-relative or absolute). With no
    /// seeds, every supported source file under the root is a seed.
    ///
    /// Fails only if the project root or an explicit seed cannot be read;
    /// scanned seeds that cannot be read are skipped like any other file. A
    /// cancelled build returns `Ok` with `summary.cancelled` set and the
    /// entities/edges committed so far.
    pub fn build(&self, seeds: &[PathBuf], oracle: &OracleMode, cancel: &CancellationToken) -> Result<BuildOutput> {
        let start = Instant::now();
        let discovery = DependencyDiscovery::new(&self.config, &self.registry);
        let dependencies = if seeds.is_empty() {
            let scanned = self.scan_sources()?;
            info!(root = %self.project_root.display(), seeds = scanned.len(), "building code graph from scan");
            discovery.discover_scanned(&self.project_root, &scanned)?
        } else {
            info!(root = %self.project_root.display(), seeds = seeds.len(), "building code graph");
            discovery.discover(&self.project_root, seeds)?
        };
        let pool = self.thread_pool()?;
        let graph = GraphAssembler::new();
        let mut summary = BuildSummary {
            files_in_scope: dependencies.in_scope.len(),
            external_files: dependencies.external.len(),
            unresolved_includes: dependencies.unresolved_includes.len(),
            skipped_files: dependencies.skipped.clone(),
            ..BuildSummary::default()
        };

        // Pass 1: per-file workers, then a single-writer commit in path order.
        let extractor = EntityExtractor::new(&self.config);
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            dependencies
                .in_scope
                .par_iter()
                .map(|path| self.extract_file(&extractor, &dependencies, path, cancel))
                .collect()
        });

        let mut extractions = Vec::new();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Extracted(extraction) => extractions.push(extraction),
                FileOutcome::Skipped(skipped) => summary.skipped_files.push(skipped),
                FileOutcome::Cancelled => summary.cancelled = true,
            }
        }
        extractions.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        for extraction in extractions {
            summary.files_extracted += 1;
            summary.skipped_constructs += extraction.skipped.len();
            let stats = graph.commit_batch(extraction);
            debug!(
                entities = stats.entities,
                duplicates = stats.duplicates,
                edges = stats.edges,
                "committed file"
            );
        }

        // Pass 2 needs the complete name index; a cancelled Pass 1 stops here.
        if summary.cancelled {
            info!("build cancelled after pass 1");
        } else {
            let resolver = SymbolResolver::new(&graph, &dependencies.project_root);
            let report = pool.install(|| resolver.resolve(oracle, cancel));
            summary.pending_symbols = report.pending_symbols;
            summary.resolved_structural = report.resolved_structural;
            summary.resolved_oracle = report.resolved_oracle;
            summary.stubs_created = report.stubs_created;
            summary.unresolved = report.unresolved;
            summary.unresolved_by_role = report.unresolved_by_role;
            summary.oracle_failures = report.oracle_failures;
            summary.cancelled = report.cancelled;
        }

        summary.entity_count = graph.entity_count();
        summary.edge_count = graph.edge_count();
        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            files = summary.files_extracted,
            skipped_files = summary.skipped_files.len(),
            entities = summary.entity_count,
            edges = summary.edge_count,
            unresolved = summary.unresolved,
            duration_ms = summary.duration_ms,
            "build complete"
        );

        Ok(BuildOutput {
            graph,
            dependencies,
            summary,
        })
    }

    fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .thread_name(|i| format!("codegraph-worker-{i}"))
            .build()
            .map_err(|e| CodeGraphError::Config {
                message: format!("failed to build worker pool: {e}"),
            })
    }

    /// Reads and extracts one in-scope file. Every failure here skips the
    /// file only.
    fn extract_file(
        &self,
        extractor: &EntityExtractor,
        dependencies: &DependencySet,
        path: &Path,
        cancel: &CancellationToken,
    ) -> FileOutcome {
        if cancel.is_cancelled() {
            return FileOutcome::Cancelled;
        }
        let relative = dependencies.relative(path);
        let skip = |reason: String| {
            warn!(file = %relative, reason = %reason, "skipping file");
            FileOutcome::Skipped(SkippedFile {
                path: relative.clone(),
                reason,
            })
        };

        let Some(adapter) = self.registry.adapter_for_file(&relative) else {
            return skip("no grammar adapter for file type".to_string());
        };
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > self.config.max_file_size => {
                return skip(format!(
                    "file size {} exceeds max_file_size {}",
                    meta.len(),
                    self.config.max_file_size
                ));
            }
            Ok(_) => {}
            Err(e) => return skip(e.to_string()),
        }
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => return skip(e.to_string()),
        };
        match extractor.extract(adapter.as_ref(), &relative, &source) {
            Ok(extraction) => FileOutcome::Extracted(extraction),
            Err(e) => skip(e.to_string()),
        }
    }

    /// Scans the project root for files a registered adapter handles,
    /// respecting the configured include/exclude patterns and max file size.
    /// Returns sorted project-relative paths.
    pub fn scan_sources(&self) -> Result<Vec<PathBuf>> {
        let root = self.project_root.canonicalize().map_err(|e| CodeGraphError::File {
            message: format!("cannot open project root: {e}"),
            path: self.project_root.display().to_string(),
        })?;
        let mut files = Vec::new();
        for entry in WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_path(&root, entry.path());
            if !should_include_file(&relative, &self.config) || self.registry.adapter_for_file(&relative).is_none() {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                if metadata.len() <= self.config.max_file_size {
                    files.push(PathBuf::from(relative));
                }
            }
        }
        files.sort();
        Ok(files)
    }
}
