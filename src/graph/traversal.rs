use std::collections::{HashMap, HashSet, VecDeque};

use super::GraphAssembler;
use crate::types::*;

/// A path through the graph: a sequence of entities, each paired with the
/// optional edge used to reach it (the first entity has `None`).
pub type GraphPath = Vec<(Entity, Option<Edge>)>;

/// Read-only traversals over an assembled graph.
pub struct GraphTraverser<'a> {
    graph: &'a GraphAssembler,
}

impl<'a> GraphTraverser<'a> {
    pub fn new(graph: &'a GraphAssembler) -> Self {
        Self { graph }
    }

    /// Performs a breadth-first traversal starting from `start_id`.
    ///
    /// Respects the traversal options including max depth, edge kind filter,
    /// entity kind filter, direction, and result limit. Returns a `Subgraph`
    /// containing the discovered entities and the edges used to reach them.
    pub fn traverse_bfs(&self, start_id: &str, opts: &TraversalOptions) -> Subgraph {
        let mut visited: HashSet<String> = HashSet::new();
        let mut result_nodes: Vec<Entity> = Vec::new();
        let mut result_edges: Vec<Edge> = Vec::new();
        let mut roots: Vec<String> = Vec::new();
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();

        let Some(start) = self.graph.get(start_id) else {
            return Subgraph {
                nodes: Vec::new(),
                edges: Vec::new(),
                roots: Vec::new(),
            };
        };
        visited.insert(start_id.to_string());
        if opts.include_start && Self::matches_filter(&start, opts) {
            roots.push(start_id.to_string());
            result_nodes.push(start);
        }
        queue.push_back((start_id.to_string(), 0));

        let edge_filter = opts.edge_kinds.as_deref().unwrap_or(&[]);

        while let Some((current_id, depth)) = queue.pop_front() {
            if depth >= opts.max_depth {
                continue;
            }
            if result_nodes.len() >= opts.limit as usize {
                break;
            }

            for edge in self.edges_for_direction(&current_id, edge_filter, opts.direction) {
                let neighbor_id = Self::neighbor_id(&edge, &current_id, opts.direction);
                if !visited.insert(neighbor_id.clone()) {
                    continue;
                }
                if let Some(neighbor) = self.graph.get(&neighbor_id) {
                    if Self::matches_filter(&neighbor, opts) {
                        result_nodes.push(neighbor);
                        if result_nodes.len() >= opts.limit as usize {
                            result_edges.push(edge);
                            break;
                        }
                    }
                    result_edges.push(edge);
                    queue.push_back((neighbor_id, depth + 1));
                }
            }
        }

        Subgraph {
            nodes: result_nodes,
            edges: result_edges,
            roots,
        }
    }

    /// Gets all entities that call the given one, up to `max_depth` levels.
    pub fn get_callers(&self, id: &str, max_depth: usize) -> Vec<(Entity, Edge)> {
        self.follow_calls(id, max_depth, Direction::Incoming)
    }

    /// Gets all entities the given one calls, up to `max_depth` levels.
    pub fn get_callees(&self, id: &str, max_depth: usize) -> Vec<(Entity, Edge)> {
        self.follow_calls(id, max_depth, Direction::Outgoing)
    }

    fn follow_calls(&self, id: &str, max_depth: usize, direction: Direction) -> Vec<(Entity, Edge)> {
        let mut results = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(id.to_string());
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((id.to_string(), 0));

        while let Some((current_id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in self.edges_for_direction(&current_id, &[EdgeKind::Calls], direction) {
                let next = Self::neighbor_id(&edge, &current_id, direction);
                if !visited.insert(next.clone()) {
                    continue;
                }
                if let Some(entity) = self.graph.get(&next) {
                    queue.push_back((next, depth + 1));
                    results.push((entity, edge));
                }
            }
        }
        results
    }

    /// Base classes and subclasses around a type, following `INHERITS`
    /// edges both ways.
    pub fn get_type_hierarchy(&self, id: &str) -> Subgraph {
        let opts = TraversalOptions {
            max_depth: 10,
            edge_kinds: Some(vec![EdgeKind::Inherits]),
            entity_kinds: None,
            direction: Direction::Both,
            limit: u32::MAX,
            include_start: true,
        };
        self.traverse_bfs(id, &opts)
    }

    /// Finds the shortest path between two entities, ignoring edge direction.
    ///
    /// If `edge_kinds` is empty, all edge kinds are followed.
    pub fn find_path(&self, from_id: &str, to_id: &str, edge_kinds: &[EdgeKind]) -> Option<GraphPath> {
        if from_id == to_id {
            return self.graph.get(from_id).map(|e| vec![(e, None)]);
        }

        // child_id -> (parent_id, edge_used)
        let mut parent_map: HashMap<String, (String, Edge)> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        visited.insert(from_id.to_string());
        queue.push_back(from_id.to_string());

        let mut found = false;
        'search: while let Some(current_id) = queue.pop_front() {
            for edge in self.edges_for_direction(&current_id, edge_kinds, Direction::Both) {
                let neighbor = Self::neighbor_id(&edge, &current_id, Direction::Both);
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                parent_map.insert(neighbor.clone(), (current_id.clone(), edge));
                if neighbor == to_id {
                    found = true;
                    break 'search;
                }
                queue.push_back(neighbor);
            }
        }
        if !found {
            return None;
        }

        let mut path_ids: Vec<(String, Option<Edge>)> = Vec::new();
        let mut current = to_id.to_string();
        while current != from_id {
            let (parent, edge) = parent_map.remove(&current)?;
            path_ids.push((current, Some(edge)));
            current = parent;
        }
        path_ids.push((from_id.to_string(), None));
        path_ids.reverse();

        path_ids
            .into_iter()
            .map(|(id, edge)| self.graph.get(&id).map(|e| (e, edge)))
            .collect()
    }

    /// Enumerates every simple directed path from `from_id` to `to_id` with
    /// at most `max_depth` edges, following outgoing relationship edges
    /// (`DEFINES` is not followed). Paths are returned as id sequences.
    pub fn find_paths(&self, from_id: &str, to_id: &str, max_depth: usize) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        if !self.graph.contains(from_id) || !self.graph.contains(to_id) {
            return paths;
        }
        let mut current = vec![from_id.to_string()];
        self.paths_from(to_id, max_depth, &mut current, &mut paths);
        paths
    }

    fn paths_from(&self, to_id: &str, max_depth: usize, current: &mut Vec<String>, paths: &mut Vec<Vec<String>>) {
        let Some(last) = current.last().cloned() else {
            return;
        };
        if last == to_id && current.len() > 1 {
            paths.push(current.clone());
            return;
        }
        if current.len() > max_depth {
            return;
        }
        let kinds = [EdgeKind::Calls, EdgeKind::Inherits, EdgeKind::HasType];
        for edge in self.graph.outgoing_edges(&last, &kinds) {
            // simple paths only; a cycle back to the start counts when it is the target
            let revisits = current[1..].contains(&edge.target)
                || (edge.target == current[0] && edge.target != to_id);
            if revisits {
                continue;
            }
            current.push(edge.target);
            self.paths_from(to_id, max_depth, current, paths);
            current.pop();
        }
    }

    fn edges_for_direction(&self, id: &str, kinds: &[EdgeKind], direction: Direction) -> Vec<Edge> {
        match direction {
            Direction::Outgoing => self.graph.outgoing_edges(id, kinds),
            Direction::Incoming => self.graph.incoming_edges(id, kinds),
            Direction::Both => {
                let mut edges = self.graph.outgoing_edges(id, kinds);
                edges.extend(self.graph.incoming_edges(id, kinds));
                edges
            }
        }
    }

    /// For outgoing: `edge.target`. For incoming: `edge.source`.
    /// For both: whichever end is not `current_id`.
    fn neighbor_id(edge: &Edge, current_id: &str, direction: Direction) -> String {
        match direction {
            Direction::Outgoing => edge.target.clone(),
            Direction::Incoming => edge.source.clone(),
            Direction::Both => {
                if edge.source == current_id {
                    edge.target.clone()
                } else {
                    edge.source.clone()
                }
            }
        }
    }

    fn matches_filter(entity: &Entity, opts: &TraversalOptions) -> bool {
        match &opts.entity_kinds {
            Some(kinds) if !kinds.is_empty() => kinds.contains(&entity.kind),
            _ => true,
        }
    }
}
