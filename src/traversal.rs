//! Pattern matching over the graph: anchor selection, DFS expansion of a
//! pattern's node/relationship chain, variable-length relationships, and
//! shortest-path search (§4.E).
//!
//! A pattern is expanded left to right. Each node element either resolves
//! to an already-bound row variable or introduces fresh candidates (via
//! index lookup, label scan, or full scan, in that preference order); each
//! relationship element expands the frontier through the backend's edge
//! lists, respecting direction and, for variable-length patterns, a
//! bounded number of hops.

use std::collections::HashSet;

use crate::cypher::ast::{NodePattern, Pattern, PatternDirection, PatternElement, RelPattern, ShortestPathKind};
use crate::functions::Row;
use crate::model::{Node, NodeId, Path, PropertyMap, Relationship, Value};
use crate::storage::StorageBackend;
use crate::tx::CancellationToken;
use crate::{Error, ExecutorConfig, Result};

/// Expand `pattern` against the bindings already present in `row`,
/// returning one output row per match. Bound pattern variables (those
/// already present in `row`, e.g. from an earlier clause) anchor the
/// search instead of being re-discovered.
pub async fn expand_pattern<B: StorageBackend>(
    pattern: &Pattern,
    row: &Row,
    backend: &B,
    config: &ExecutorConfig,
    token: &CancellationToken,
) -> Result<Vec<Row>> {
    if let Some(kind) = pattern.shortest {
        return expand_shortest(pattern, kind, row, backend, config, token).await;
    }

    let mut state = State { backend, config, token };
    let partials = state.walk(&pattern.elements, row.clone(), HashSet::new()).await?;

    let mut out = Vec::with_capacity(partials.len());
    for (bound_row, path) in partials {
        let mut r = bound_row;
        if let Some(alias) = &pattern.path_alias {
            r.insert(alias.clone(), Value::Path(Box::new(path)));
        }
        out.push(r);
    }
    Ok(out)
}

struct State<'a, B: StorageBackend> {
    backend: &'a B,
    config: &'a ExecutorConfig,
    token: &'a CancellationToken,
}

/// One in-progress match: the row as bound so far, and the path walked
/// (used only to materialize a path-alias binding at the end).
type Partial = (Row, Path);

impl<'a, B: StorageBackend> State<'a, B> {
    /// Walk the pattern's element chain left to right, producing every
    /// completed binding. `visited` tracks node ids used so far in *this*
    /// candidate path only (popped on backtrack at the call site via value
    /// semantics — each branch gets its own clone).
    async fn walk(&mut self, elements: &[PatternElement], row: Row, visited: HashSet<NodeId>) -> Result<Vec<Partial>> {
        self.check_cancelled()?;

        let first_node = match elements.first() {
            Some(PatternElement::Node(n)) => n,
            _ => return Err(Error::ArgumentError("pattern must begin with a node".into())),
        };

        let anchors = self.resolve_anchors(first_node, &row).await?;
        let mut results = Vec::new();
        for node in anchors {
            let mut next_row = row.clone();
            if let Some(alias) = &first_node.alias {
                next_row.insert(alias.clone(), Value::Node(Box::new(node.clone())));
            }
            let mut seen = visited.clone();
            seen.insert(node.id);
            let path = Path::single(node.clone());
            self.continue_walk(&elements[1..], next_row, path, seen, &mut results).await?;
        }
        Ok(results)
    }

    /// Recursively consume `rel, node, rel, node, ...` pairs from the
    /// remaining elements.
    fn continue_walk<'f>(
        &'f mut self,
        remaining: &'f [PatternElement],
        row: Row,
        path: Path,
        visited: HashSet<NodeId>,
        results: &'f mut Vec<Partial>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'f>> {
        Box::pin(async move {
            self.check_cancelled()?;

            if remaining.is_empty() {
                results.push((row, path));
                return Ok(());
            }

            let rel_pattern = match &remaining[0] {
                PatternElement::Relationship(r) => r,
                _ => return Err(Error::ArgumentError("expected relationship pattern element".into())),
            };
            let next_node = match remaining.get(1) {
                Some(PatternElement::Node(n)) => n,
                _ => return Err(Error::ArgumentError("relationship pattern must be followed by a node".into())),
            };

            let current = path.end().id;
            let (min, max) = var_length_bounds(rel_pattern, self.config);

            let frontiers = self.expand_relationship(current, rel_pattern, min, max, &visited).await?;

            for hops in frontiers {
                let end_node = hops.last().expect("non-empty hop chain").1.clone();
                if visited.contains(&end_node.id) {
                    continue;
                }
                if !node_matches(next_node, &end_node) {
                    continue;
                }

                let mut next_row = row.clone();
                if let Some(alias) = &rel_pattern.alias {
                    if hops.len() == 1 {
                        next_row.insert(alias.clone(), Value::Relationship(Box::new(hops[0].0.clone())));
                    } else {
                        next_row.insert(
                            alias.clone(),
                            Value::List(hops.iter().map(|(r, _)| Value::Relationship(Box::new(r.clone()))).collect()),
                        );
                    }
                }
                if let Some(alias) = &next_node.alias {
                    next_row.insert(alias.clone(), Value::Node(Box::new(end_node.clone())));
                }

                let mut next_path = path.clone();
                for (rel, node) in &hops {
                    next_path.append(rel.clone(), node.clone());
                }
                let mut next_visited = visited.clone();
                next_visited.insert(end_node.id);

                self.continue_walk(&remaining[2..], next_row, next_path, next_visited, results).await?;
            }

            Ok(())
        })
    }

    /// BFS out from `start` up to `max` hops (or the configured unbounded
    /// cap), returning the full `(relationship, node)` chain for every path
    /// whose hop count falls in `[min, max]`.
    async fn expand_relationship(
        &self,
        start: NodeId,
        rel: &RelPattern,
        min: usize,
        max: usize,
        visited: &HashSet<NodeId>,
    ) -> Result<Vec<Vec<(Relationship, Node)>>> {
        let mut frontier: Vec<Vec<(Relationship, Node)>> = vec![Vec::new()];
        let mut results = Vec::new();

        for hop in 1..=max {
            self.check_cancelled()?;
            let mut next_frontier = Vec::new();
            for chain in &frontier {
                let current_node = chain.last().map(|(_, n)| n.id).unwrap_or(start);
                let already_used: HashSet<NodeId> = chain.iter().map(|(_, n)| n.id).chain(std::iter::once(start)).collect();

                for (edge, other_id) in self.edges_for(current_node, rel).await? {
                    // cycle rule: no node twice within a single path,
                    // whether from the caller's visited set or this hop chain.
                    if visited.contains(&other_id) || already_used.contains(&other_id) {
                        continue;
                    }
                    let other = match self.backend.get_node(other_id).await.map_err(|e| Error::StorageError(e.to_string()))? {
                        Some(n) => n,
                        None => continue,
                    };
                    let mut next_chain = chain.clone();
                    next_chain.push((edge, other));
                    if hop >= min {
                        results.push(next_chain.clone());
                    }
                    next_frontier.push(next_chain);
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        Ok(results)
    }

    async fn edges_for(&self, node: NodeId, rel: &RelPattern) -> Result<Vec<(Relationship, NodeId)>> {
        let rel_type = rel.rel_types.first().map(String::as_str);
        let mut out = Vec::new();
        match rel.direction {
            PatternDirection::Right => {
                for e in self.backend.get_outgoing_edges(node, rel_type).await.map_err(|e| Error::StorageError(e.to_string()))? {
                    if rel_type_matches(&e, rel) && props_match(&e.properties, &rel.properties) {
                        out.push((e.clone(), e.dst));
                    }
                }
            }
            PatternDirection::Left => {
                for e in self.backend.get_incoming_edges(node, rel_type).await.map_err(|e| Error::StorageError(e.to_string()))? {
                    if rel_type_matches(&e, rel) && props_match(&e.properties, &rel.properties) {
                        out.push((e.clone(), e.src));
                    }
                }
            }
            PatternDirection::Both => {
                for e in self.backend.get_outgoing_edges(node, rel_type).await.map_err(|e| Error::StorageError(e.to_string()))? {
                    if rel_type_matches(&e, rel) && props_match(&e.properties, &rel.properties) {
                        if let Some(other) = e.other_node(node) {
                            out.push((e.clone(), other));
                        }
                    }
                }
                for e in self.backend.get_incoming_edges(node, rel_type).await.map_err(|e| Error::StorageError(e.to_string()))? {
                    if rel_type_matches(&e, rel) && props_match(&e.properties, &rel.properties) {
                        if let Some(other) = e.other_node(node) {
                            out.push((e.clone(), other));
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Anchor selection per §4.E: bound variable, then label+property
    /// lookup (index-backed when the backend advertises support), then
    /// label scan, then full scan.
    async fn resolve_anchors(&self, node: &NodePattern, row: &Row) -> Result<Vec<Node>> {
        if let Some(alias) = &node.alias {
            if let Some(Value::Node(n)) = row.get(alias) {
                return Ok(if node_matches(node, n) { vec![(**n).clone()] } else { vec![] });
            }
        }

        let candidates = if let (Some(label), Some((key, expr))) = (node.labels.first(), node.properties.first()) {
            let value = literal_property_value(expr)?;
            self.backend
                .nodes_by_property(label, key, &value)
                .await
                .map_err(|e| Error::StorageError(e.to_string()))?
        } else if let Some(label) = node.labels.first() {
            self.backend.get_nodes_by_label(label).await.map_err(|e| Error::StorageError(e.to_string()))?
        } else {
            self.backend.get_all_nodes().await.map_err(|e| Error::StorageError(e.to_string()))?
        };

        Ok(candidates.into_iter().filter(|n| node_matches(node, n)).collect())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn var_length_bounds(rel: &RelPattern, config: &ExecutorConfig) -> (usize, usize) {
    match &rel.var_length {
        None => (1, 1),
        Some(vl) => {
            let min = vl.min.unwrap_or(1);
            let max = vl.max.unwrap_or(config.max_unbounded_depth);
            (min, max)
        }
    }
}

fn node_matches(pattern: &NodePattern, node: &Node) -> bool {
    pattern.labels.iter().all(|l| node.has_label(l))
        && pattern.properties.iter().all(|(k, expr)| {
            literal_property_value(expr).map(|v| node.get(k).map(|nv| nv.loose_eq(&v) == Some(true)).unwrap_or(false)).unwrap_or(false)
        })
}

fn rel_type_matches(edge: &Relationship, pattern: &RelPattern) -> bool {
    pattern.rel_types.is_empty() || pattern.rel_types.iter().any(|t| t == &edge.rel_type)
}

fn props_match(props: &PropertyMap, pattern_props: &[(String, crate::cypher::ast::Expr)]) -> bool {
    pattern_props.iter().all(|(k, expr)| {
        literal_property_value(expr).map(|v| props.get(k).map(|pv| pv.loose_eq(&v) == Some(true)).unwrap_or(false)).unwrap_or(false)
    })
}

/// Pattern-element properties are evaluated against an empty row/params —
/// by the time a pattern reaches the traversal engine, parameter
/// substitution has already happened textually (§4.B), so any expression
/// surviving here is a literal.
fn literal_property_value(expr: &crate::cypher::ast::Expr) -> Result<Value> {
    match expr {
        crate::cypher::ast::Expr::Literal(lit) => Ok(match lit {
            crate::cypher::ast::Literal::Null => Value::Null,
            crate::cypher::ast::Literal::Bool(b) => Value::Bool(*b),
            crate::cypher::ast::Literal::Int(i) => Value::Int(*i),
            crate::cypher::ast::Literal::Float(f) => Value::Float(*f),
            crate::cypher::ast::Literal::String(s) => Value::String(s.clone()),
        }),
        other => Err(Error::ArgumentError(format!("pattern property must be a literal, got {other:?}"))),
    }
}

// ============================================================================
// Shortest path
// ============================================================================

async fn expand_shortest<B: StorageBackend>(
    pattern: &Pattern,
    kind: ShortestPathKind,
    row: &Row,
    backend: &B,
    config: &ExecutorConfig,
    token: &CancellationToken,
) -> Result<Vec<Row>> {
    if pattern.elements.len() != 3 {
        return Err(Error::ArgumentError("shortestPath/allShortestPaths supports exactly one relationship hop pattern".into()));
    }
    let (start_pattern, rel_pattern, end_pattern) = match (&pattern.elements[0], &pattern.elements[1], &pattern.elements[2]) {
        (PatternElement::Node(a), PatternElement::Relationship(r), PatternElement::Node(b)) => (a, r, b),
        _ => return Err(Error::ArgumentError("shortestPath requires (node)-[rel]-(node)".into())),
    };

    let state = State { backend, config, token };
    let starts = state.resolve_anchors(start_pattern, row).await?;
    let (_, max_hops) = var_length_bounds(rel_pattern, config);

    let mut out = Vec::new();
    for start in starts {
        let paths = bfs_shortest(backend, rel_pattern, end_pattern, start.id, kind, max_hops, config.shortest_path_frontier_cap, config, token).await?;
        for path in paths {
            let mut r = row.clone();
            if let Some(alias) = &start_pattern.alias {
                r.insert(alias.clone(), Value::Node(Box::new(path.start().clone())));
            }
            if let Some(alias) = &end_pattern.alias {
                r.insert(alias.clone(), Value::Node(Box::new(path.end().clone())));
            }
            if let Some(alias) = &pattern.path_alias {
                r.insert(alias.clone(), Value::Path(Box::new(path)));
            }
            out.push(r);
            if kind == ShortestPathKind::Single {
                return Ok(out);
            }
        }
    }
    Ok(out)
}

async fn bfs_shortest<B: StorageBackend>(
    backend: &B,
    rel: &RelPattern,
    end_pattern: &NodePattern,
    start: NodeId,
    kind: ShortestPathKind,
    max_hops: usize,
    frontier_cap: usize,
    config: &ExecutorConfig,
    token: &CancellationToken,
) -> Result<Vec<Path>> {
    let state = State { backend, config, token };
    let start_node = backend.get_node(start).await.map_err(|e| Error::StorageError(e.to_string()))?.ok_or_else(|| Error::StorageError(format!("node {start} not found")))?;

    let mut frontier = vec![Path::single(start_node.clone())];
    let mut visited: HashSet<NodeId> = HashSet::from([start]);
    let mut shortest_len: Option<usize> = None;
    let mut found = Vec::new();

    loop {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if frontier.is_empty() {
            break;
        }
        if let Some(len) = shortest_len {
            if frontier[0].len() > len {
                break;
            }
        }
        if frontier[0].len() >= max_hops {
            break;
        }

        let mut next_frontier = Vec::new();
        'frontier: for path in &frontier {
            let current = path.end();
            for (edge, other_id) in state.edges_for(current.id, rel).await? {
                if path.contains_node(other_id) {
                    continue;
                }
                let other = match backend.get_node(other_id).await.map_err(|e| Error::StorageError(e.to_string()))? {
                    Some(n) => n,
                    None => continue,
                };
                let mut new_path = path.clone();
                new_path.append(edge, other.clone());

                if node_matches(end_pattern, &other) {
                    let len = new_path.len();
                    if shortest_len.is_none() || len <= shortest_len.unwrap() {
                        shortest_len = Some(len);
                        found.push(new_path.clone());
                        if kind == ShortestPathKind::Single {
                            return Ok(found);
                        }
                    }
                }

                if !visited.contains(&other_id) || kind == ShortestPathKind::All {
                    next_frontier.push(new_path);
                }
                visited.insert(other_id);

                if next_frontier.len() >= frontier_cap {
                    tracing::debug!(frontier_cap, "shortest-path BFS frontier cap reached, truncating level");
                    break 'frontier;
                }
            }
        }
        frontier = next_frontier;
    }

    Ok(found)
}

