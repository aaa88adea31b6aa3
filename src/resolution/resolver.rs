use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::oracle::{DefinitionLocation, FileBatch, OracleMode, OracleQueue};
use crate::discovery::relative_path;
use crate::graph::GraphAssembler;
use crate::types::*;

/// Result of the structural tier for one pending symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralOutcome {
    Resolved { target: String, tier: ResolutionTier },
    /// A call to a name no in-scope entity of any kind carries.
    NeedsStub,
    /// Zero or several candidates; only the oracle can decide.
    Deferred { candidates: usize },
}

/// Counters produced by Pass 2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub pending_symbols: usize,
    pub resolved_structural: usize,
    pub resolved_oracle: usize,
    pub stubs_created: usize,
    pub unresolved: usize,
    pub unresolved_by_role: BTreeMap<String, usize>,
    pub oracle_failures: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
struct Candidate {
    id: String,
    kind: EntityKind,
    qualified_name: String,
    start_line: u32,
    end_line: u32,
}

/// A pending symbol detached from the entity that mentions it.
#[derive(Debug, Clone)]
struct SymbolRequest {
    source_id: String,
    file_path: String,
    symbol: PendingSymbol,
}

/// Pass 2: turns pending symbols into `CALLS`/`INHERITS`/`HAS_TYPE` edges.
///
/// The name index is a snapshot taken at construction, after Pass 1 has
/// committed every file; lookups never see stubs or later additions.
pub struct SymbolResolver<'a> {
    graph: &'a GraphAssembler,
    project_root: PathBuf,
    by_name: HashMap<String, Vec<Candidate>>,
    by_file: HashMap<String, Vec<Candidate>>,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(graph: &'a GraphAssembler, project_root: &Path) -> Self {
        let mut by_name: HashMap<String, Vec<Candidate>> = HashMap::new();
        let mut by_file: HashMap<String, Vec<Candidate>> = HashMap::new();
        for entity in graph.entities() {
            if entity.kind == EntityKind::File || entity.is_stub() {
                continue;
            }
            let candidate = Candidate {
                id: entity.id.clone(),
                kind: entity.kind,
                qualified_name: entity.qualified_name.clone(),
                start_line: entity.start_line,
                end_line: entity.end_line,
            };
            if let Some(path) = &entity.file_path {
                by_file.entry(path.clone()).or_default().push(candidate.clone());
            }
            by_name.entry(entity.name).or_default().push(candidate);
        }
        Self {
            graph,
            project_root: project_root.to_path_buf(),
            by_name,
            by_file,
        }
    }

    /// Structural tier: role-filtered name lookup.
    ///
    /// A `::`-qualified name first needs a unique candidate whose qualified
    /// name ends with it; failing that, the stripped simple name must match
    /// exactly one candidate (a lower-confidence `Stripped` match).
    pub fn resolve_structural(&self, role: SymbolRole, raw_name: &str) -> StructuralOutcome {
        let name = raw_name.trim().trim_start_matches("::");
        let simple = name.rsplit("::").next().unwrap_or(name);
        let candidates: Vec<&Candidate> = self
            .by_name
            .get(simple)
            .map(|c| c.iter().filter(|c| role.accepts(c.kind)).collect())
            .unwrap_or_default();

        if name.contains("::") {
            let suffix = format!("::{name}");
            let qualified: Vec<&&Candidate> = candidates
                .iter()
                .filter(|c| c.qualified_name == name || c.qualified_name.ends_with(&suffix))
                .collect();
            if let [only] = qualified.as_slice() {
                return StructuralOutcome::Resolved {
                    target: only.id.clone(),
                    tier: ResolutionTier::Qualified,
                };
            }
            if let [only] = candidates.as_slice() {
                return StructuralOutcome::Resolved {
                    target: only.id.clone(),
                    tier: ResolutionTier::Stripped,
                };
            }
        } else if let [only] = candidates.as_slice() {
            return StructuralOutcome::Resolved {
                target: only.id.clone(),
                tier: ResolutionTier::Exact,
            };
        }

        // a call naming something defined in scope (e.g. a class) is not external
        if candidates.is_empty() && role == SymbolRole::Call && !self.by_name.contains_key(simple) {
            StructuralOutcome::NeedsStub
        } else {
            StructuralOutcome::Deferred {
                candidates: candidates.len(),
            }
        }
    }

    /// Resolves every pending symbol in the graph and commits the edges.
    ///
    /// The structural tier runs in parallel (on the current rayon pool);
    /// commits are sequential in entity order, so output is deterministic.
    /// Cancellation is checked between entities and between oracle batches.
    pub fn resolve(&self, oracle: &OracleMode, cancel: &CancellationToken) -> ResolutionReport {
        let mut report = ResolutionReport::default();

        let entities: Vec<Entity> = self
            .graph
            .entities()
            .into_iter()
            .filter(|e| !e.pending.is_empty())
            .collect();

        let outcomes: Vec<Option<Vec<(SymbolRequest, StructuralOutcome)>>> = entities
            .par_iter()
            .map(|entity| {
                if cancel.is_cancelled() {
                    return None;
                }
                let file_path = entity.file_path.clone().unwrap_or_default();
                Some(
                    entity
                        .pending
                        .iter()
                        .map(|symbol| {
                            let outcome = self.resolve_structural(symbol.role, &symbol.name);
                            let request = SymbolRequest {
                                source_id: entity.id.clone(),
                                file_path: file_path.clone(),
                                symbol: symbol.clone(),
                            };
                            (request, outcome)
                        })
                        .collect(),
                )
            })
            .collect();

        let mut deferred: Vec<SymbolRequest> = Vec::new();
        for per_entity in outcomes {
            let Some(per_entity) = per_entity else {
                report.cancelled = true;
                continue;
            };
            for (request, outcome) in per_entity {
                report.pending_symbols += 1;
                match outcome {
                    StructuralOutcome::Resolved { target, tier } => {
                        self.commit(&request, &target, tier);
                        report.resolved_structural += 1;
                    }
                    StructuralOutcome::NeedsStub => {
                        let (target, created) = self.graph.ensure_stub(&request.symbol.name, EntityKind::Function);
                        if created {
                            debug!(name = %request.symbol.name, "created stub");
                            report.stubs_created += 1;
                        }
                        self.commit(&request, &target, ResolutionTier::Stub);
                        report.resolved_structural += 1;
                    }
                    StructuralOutcome::Deferred { candidates } => {
                        trace!(
                            file = %request.file_path,
                            role = %request.symbol.role,
                            name = %request.symbol.name,
                            candidates,
                            "deferred to oracle tier"
                        );
                        deferred.push(request);
                    }
                }
            }
        }

        if report.cancelled {
            info!("resolution cancelled; keeping committed edges");
        }

        let unanswered = match OracleQueue::from_mode(oracle) {
            Some(queue) if !deferred.is_empty() && !report.cancelled => {
                self.run_oracle(&queue, deferred, cancel, &mut report)
            }
            _ => deferred,
        };

        for request in unanswered {
            trace!(
                file = %request.file_path,
                line = request.symbol.position.line,
                role = %request.symbol.role,
                name = %request.symbol.name,
                "unresolved symbol"
            );
            report.unresolved += 1;
            *report
                .unresolved_by_role
                .entry(request.symbol.role.as_str().to_string())
                .or_default() += 1;
        }

        info!(
            pending = report.pending_symbols,
            structural = report.resolved_structural,
            oracle = report.resolved_oracle,
            stubs = report.stubs_created,
            unresolved = report.unresolved,
            "symbol resolution complete"
        );
        report
    }

    /// Oracle tier; returns the requests it could not resolve.
    fn run_oracle(
        &self,
        queue: &OracleQueue,
        requests: Vec<SymbolRequest>,
        cancel: &CancellationToken,
        report: &mut ResolutionReport,
    ) -> Vec<SymbolRequest> {
        let mut by_file: BTreeMap<&str, Vec<(usize, SourcePosition)>> = BTreeMap::new();
        for (index, request) in requests.iter().enumerate() {
            by_file
                .entry(request.file_path.as_str())
                .or_default()
                .push((index, request.symbol.position));
        }
        let batches: Vec<FileBatch> = by_file
            .into_iter()
            .map(|(file, requests)| FileBatch {
                file: self.project_root.join(file),
                requests,
            })
            .collect();
        debug!(batches = batches.len(), requests = requests.len(), "querying oracle");

        let answers = match queue.run(batches, cancel) {
            Ok(answers) => answers,
            Err(e) => {
                warn!(error = %e, "oracle tier skipped");
                report.oracle_failures += requests.len();
                return requests;
            }
        };
        if cancel.is_cancelled() {
            report.cancelled = true;
        }

        let mut resolved = vec![false; requests.len()];
        for (index, answer) in answers {
            let Some(request) = requests.get(index) else {
                continue;
            };
            match answer {
                Ok(Some(location)) => {
                    if let Some(target) = self.entity_at(&location, request.symbol.role) {
                        self.commit(request, &target, ResolutionTier::Oracle);
                        report.resolved_oracle += 1;
                        resolved[index] = true;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(
                        file = %request.file_path,
                        name = %request.symbol.name,
                        error = %e,
                        "oracle request failed"
                    );
                    report.oracle_failures += 1;
                }
            }
        }

        requests
            .into_iter()
            .zip(resolved)
            .filter_map(|(request, done)| (!done).then_some(request))
            .collect()
    }

    /// Innermost role-appropriate entity covering the definition line.
    fn entity_at(&self, location: &DefinitionLocation, role: SymbolRole) -> Option<String> {
        let file = location
            .file
            .canonicalize()
            .unwrap_or_else(|_| location.file.clone());
        let relative = relative_path(&self.project_root, &file);
        self.by_file
            .get(&relative)?
            .iter()
            .filter(|c| role.accepts(c.kind))
            .filter(|c| c.start_line <= location.line && location.line <= c.end_line)
            .min_by_key(|c| (c.end_line - c.start_line, u32::MAX - c.start_line))
            .map(|c| c.id.clone())
    }

    fn commit(&self, request: &SymbolRequest, target: &str, tier: ResolutionTier) {
        self.graph.add_edge(Edge {
            source: request.source_id.clone(),
            target: target.to_string(),
            kind: request.symbol.role.edge_kind(),
            line: Some(request.symbol.position.line),
            resolved_by: Some(tier),
        });
    }
}
