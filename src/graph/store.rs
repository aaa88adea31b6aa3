use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use crate::types::*;

/// Name of the synthetic file entity that contains every stub.
pub const EXTERNAL_FILE: &str = "[external]";

/// Outcome of [`GraphAssembler::add_entity`].
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    Inserted,
    /// An entity with the same id was already present; it is returned
    /// unchanged and the new one is dropped.
    Existing(Entity),
}

/// Counts of what a batch commit actually added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub entities: usize,
    pub duplicates: usize,
    pub edges: usize,
}

#[derive(Default)]
struct GraphStore {
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
    by_qualified_name: HashMap<String, Vec<usize>>,
    by_file: HashMap<String, Vec<usize>>,
    edges: Vec<Edge>,
    edge_keys: HashSet<(EdgeKind, String, String)>,
    /// Targets that already have their containing entity.
    contained: HashSet<String>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl GraphStore {
    fn insert_entity(&mut self, entity: Entity) -> Insertion {
        if let Some(&existing) = self.index.get(&entity.id) {
            return Insertion::Existing(self.entities[existing].clone());
        }
        let slot = self.entities.len();
        self.index.insert(entity.id.clone(), slot);
        self.by_name.entry(entity.name.clone()).or_default().push(slot);
        self.by_qualified_name
            .entry(entity.qualified_name.clone())
            .or_default()
            .push(slot);
        if let Some(path) = &entity.file_path {
            self.by_file.entry(path.clone()).or_default().push(slot);
        }
        self.entities.push(entity);
        Insertion::Inserted
    }

    fn insert_edge(&mut self, edge: Edge) -> bool {
        if !self.index.contains_key(&edge.source) || !self.index.contains_key(&edge.target) {
            trace!(source = %edge.source, target = %edge.target, "dropping dangling edge");
            return false;
        }
        // A collapsed duplicate must not gain a second container.
        if edge.kind == EdgeKind::Defines && self.contained.contains(&edge.target) {
            return false;
        }
        let key = (edge.kind, edge.source.clone(), edge.target.clone());
        if !self.edge_keys.insert(key) {
            return false;
        }
        if edge.kind == EdgeKind::Defines {
            self.contained.insert(edge.target.clone());
        }
        let slot = self.edges.len();
        self.outgoing.entry(edge.source.clone()).or_default().push(slot);
        self.incoming.entry(edge.target.clone()).or_default().push(slot);
        self.edges.push(edge);
        true
    }

    fn collect(&self, slots: Option<&Vec<usize>>) -> Vec<Entity> {
        slots
            .map(|s| s.iter().map(|&i| self.entities[i].clone()).collect())
            .unwrap_or_default()
    }

    fn edges_at(&self, slots: Option<&Vec<usize>>, kinds: &[EdgeKind]) -> Vec<Edge> {
        slots
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .filter(|e| kinds.is_empty() || kinds.contains(&e.kind))
            .cloned()
            .collect()
    }
}

/// The canonical entity/edge store.
///
/// All mutation goes through `&self` methods that take the write lock, so
/// the assembler can be shared between threads; same-id contention
/// serializes on that lock. Entities and edges are append-only.
#[derive(Default)]
pub struct GraphAssembler {
    store: RwLock<GraphStore>,
}

impl GraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    // Writers only append, so a poisoned lock still guards a usable store.
    fn read(&self) -> RwLockReadGuard<'_, GraphStore> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphStore> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds an entity, or returns the already stored entity with the same id.
    pub fn add_entity(&self, entity: Entity) -> Insertion {
        self.write().insert_entity(entity)
    }

    /// Adds an edge. Returns `false` when either endpoint is unknown, the
    /// `(kind, source, target)` triple already exists, or the target of a
    /// `DEFINES` edge already has a container.
    pub fn add_edge(&self, edge: Edge) -> bool {
        self.write().insert_edge(edge)
    }

    /// Commits one file's Pass 1 output under a single write lock.
    pub fn commit_batch(&self, extraction: FileExtraction) -> CommitStats {
        let mut store = self.write();
        let mut stats = CommitStats::default();
        for entity in extraction.entities {
            match store.insert_entity(entity) {
                Insertion::Inserted => stats.entities += 1,
                Insertion::Existing(existing) => {
                    trace!(id = %existing.id, name = %existing.name, "duplicate entity collapsed");
                    stats.duplicates += 1;
                }
            }
        }
        for edge in extraction.edges {
            if store.insert_edge(edge) {
                stats.edges += 1;
            }
        }
        stats
    }

    pub fn get(&self, id: &str) -> Option<Entity> {
        let store = self.read();
        store.index.get(id).map(|&i| store.entities[i].clone())
    }

    /// Alias of [`get`](Self::get) for consumers.
    pub fn get_entity(&self, id: &str) -> Option<Entity> {
        self.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().index.contains_key(id)
    }

    /// All entities with exactly this simple name, in insertion order.
    pub fn lookup_by_name(&self, name: &str) -> Vec<Entity> {
        let store = self.read();
        store.collect(store.by_name.get(name))
    }

    pub fn lookup_by_qualified_name(&self, qualified_name: &str) -> Vec<Entity> {
        let store = self.read();
        store.collect(store.by_qualified_name.get(qualified_name))
    }

    /// Entities defined in a project-relative file, in document order.
    pub fn entities_in_file(&self, file_path: &str) -> Vec<Entity> {
        let store = self.read();
        store.collect(store.by_file.get(file_path))
    }

    /// Outgoing edges of `id`, optionally filtered by kind (empty = all).
    pub fn outgoing_edges(&self, id: &str, kinds: &[EdgeKind]) -> Vec<Edge> {
        let store = self.read();
        store.edges_at(store.outgoing.get(id), kinds)
    }

    /// Incoming edges of `id`, optionally filtered by kind (empty = all).
    pub fn incoming_edges(&self, id: &str, kinds: &[EdgeKind]) -> Vec<Edge> {
        let store = self.read();
        store.edges_at(store.incoming.get(id), kinds)
    }

    /// Ids adjacent to `id` through edges of `edge_kind`.
    pub fn neighbors(&self, id: &str, edge_kind: EdgeKind, direction: Direction) -> Vec<String> {
        let kinds = [edge_kind];
        let mut ids: Vec<String> = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            ids.extend(self.outgoing_edges(id, &kinds).into_iter().map(|e| e.target));
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            ids.extend(self.incoming_edges(id, &kinds).into_iter().map(|e| e.source));
        }
        let mut seen = HashSet::new();
        ids.retain(|i| seen.insert(i.clone()));
        ids
    }

    /// Returns the stub for `name`, creating it (and the `[external]`
    /// container) on first use. The boolean is `true` when it was created.
    pub fn ensure_stub(&self, name: &str, kind: EntityKind) -> (String, bool) {
        let mut store = self.write();
        let container_id = generate_entity_id(EXTERNAL_FILE, EntityKind::File, EXTERNAL_FILE, 0);
        if !store.index.contains_key(&container_id) {
            store.insert_entity(Entity {
                id: container_id.clone(),
                kind: EntityKind::File,
                name: EXTERNAL_FILE.to_string(),
                qualified_name: EXTERNAL_FILE.to_string(),
                file_path: None,
                start_line: 0,
                end_line: 0,
                start_column: 0,
                end_column: 0,
                docstring: None,
                source_text: None,
                signature: None,
                parent_id: None,
                pending: Vec::new(),
            });
        }

        let id = generate_entity_id(EXTERNAL_FILE, kind, name, 0);
        if store.index.contains_key(&id) {
            return (id, false);
        }
        store.insert_entity(Entity {
            id: id.clone(),
            kind,
            name: name.to_string(),
            qualified_name: name.to_string(),
            file_path: None,
            start_line: 0,
            end_line: 0,
            start_column: 0,
            end_column: 0,
            docstring: None,
            source_text: None,
            signature: None,
            parent_id: Some(container_id.clone()),
            pending: Vec::new(),
        });
        store.insert_edge(Edge {
            source: container_id,
            target: id.clone(),
            kind: EdgeKind::Defines,
            line: None,
            resolved_by: None,
        });
        (id, true)
    }

    /// Snapshot of every entity in insertion order.
    pub fn entities(&self) -> Vec<Entity> {
        self.read().entities.clone()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.read().edges.clone()
    }

    pub fn entity_count(&self) -> usize {
        self.read().entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }

    /// Bulk export of nodes and typed edges.
    pub fn export(&self) -> GraphExport {
        let store = self.read();
        GraphExport {
            nodes: store.entities.clone(),
            edges: store.edges.clone(),
        }
    }

    pub fn stats(&self) -> GraphStats {
        let store = self.read();
        let mut entities_by_kind: BTreeMap<String, u64> = BTreeMap::new();
        let mut file_count = 0;
        let mut stub_count = 0;
        for entity in &store.entities {
            *entities_by_kind
                .entry(entity.kind.as_str().to_string())
                .or_default() += 1;
            if entity.kind == EntityKind::File && entity.file_path.is_some() {
                file_count += 1;
            }
            if entity.is_stub() {
                stub_count += 1;
            }
        }
        let mut edges_by_kind: BTreeMap<String, u64> = BTreeMap::new();
        for edge in &store.edges {
            *edges_by_kind
                .entry(edge.kind.as_str().to_string())
                .or_default() += 1;
        }
        GraphStats {
            entity_count: store.entities.len() as u64,
            edge_count: store.edges.len() as u64,
            file_count,
            stub_count,
            entities_by_kind,
            edges_by_kind,
        }
    }

    /// Entities whose name starts with `prefix` (case-insensitive), sorted
    /// by name, skipping files.
    pub fn prefix_search(&self, prefix: &str, limit: usize) -> Vec<Entity> {
        let store = self.read();
        let needle = prefix.to_lowercase();
        let mut names: Vec<&String> = store
            .by_name
            .keys()
            .filter(|n| n.to_lowercase().starts_with(&needle))
            .collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|n| store.by_name[n].iter().map(|&i| &store.entities[i]))
            .filter(|e| e.kind != EntityKind::File)
            .take(limit)
            .cloned()
            .collect()
    }
}
