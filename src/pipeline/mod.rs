//! The clause pipeline: executes a [`Query`]'s segments in order, threading
//! row bindings from one clause to the next, and produces the final
//! [`QueryResult`] (§4.D).
//!
//! Each segment is zero or more reading/updating clauses followed by an
//! optional terminal `WITH`/`RETURN` projection. A projection narrows the
//! row to exactly its declared columns — per §3's invariant, only
//! `WITH`-introduced names are visible to the next segment.

use std::cmp::Ordering;

use crate::cypher::ast::{
    Clause, Expr, OrderExpr, Pattern, PatternElement, Projection, Query, RemoveItem, SchemaCommand,
    Segment, SetItem,
};
use crate::functions::{self, EvalContext, Row};
use crate::index::IndexType;
use crate::model::{Node, Path, PropertyMap, Relationship, Value};
use crate::storage::StorageBackend;
use crate::traversal;
use crate::tx::CancellationToken;
use crate::{Error, ExecutorConfig, Result};

// ============================================================================
// Result types
// ============================================================================

/// The outcome of a single `Graph::execute` call.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
    pub stats: ExecutionStats,
}

/// A single row of the result set. Preserves column order.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub values: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn get<T: FromValue>(&self, key: &str) -> Result<T> {
        let val = self
            .values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or_else(|| Error::UnknownVariable(key.to_string()))?;
        T::from_value(val)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Write counters accumulated across every clause in the query (§6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionStats {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
}

/// Typed extraction from a [`Value`] result cell.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Result<Self>;
}

impl FromValue for Node {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Node(n) => Ok((**n).clone()),
            other => Err(Error::TypeError { expected: "Node".into(), got: other.type_name().into() }),
        }
    }
}

impl FromValue for Relationship {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Relationship(r) => Ok((**r).clone()),
            other => Err(Error::TypeError { expected: "Relationship".into(), got: other.type_name().into() }),
        }
    }
}

impl FromValue for Path {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Path(p) => Ok((**p).clone()),
            other => Err(Error::TypeError { expected: "Path".into(), got: other.type_name().into() }),
        }
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::String(s) => Ok(s.clone()),
            other => Err(Error::TypeError { expected: "String".into(), got: other.type_name().into() }),
        }
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_int().ok_or_else(|| Error::TypeError { expected: "Integer".into(), got: val.type_name().into() })
    }
}

impl FromValue for f64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_float().ok_or_else(|| Error::TypeError { expected: "Float".into(), got: val.type_name().into() })
    }
}

impl FromValue for bool {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::TypeError { expected: "Boolean".into(), got: other.type_name().into() }),
        }
    }
}

impl FromValue for Value {
    fn from_value(val: &Value) -> Result<Self> {
        Ok(val.clone())
    }
}

impl FromValue for Vec<Value> {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::List(l) => Ok(l.clone()),
            other => Err(Error::TypeError { expected: "List".into(), got: other.type_name().into() }),
        }
    }
}

impl FromValue for PropertyMap {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Map(m) => Ok(m.clone()),
            other => Err(Error::TypeError { expected: "Map".into(), got: other.type_name().into() }),
        }
    }
}

// ============================================================================
// Execution context threaded through clause execution
// ============================================================================

struct Ctx<'a, B: StorageBackend> {
    backend: &'a B,
    params: &'a PropertyMap,
    config: &'a ExecutorConfig,
    token: &'a CancellationToken,
    stats: ExecutionStats,
}

impl<'a, B: StorageBackend> Ctx<'a, B> {
    fn eval_ctx(&self) -> EvalContext<'a, B> {
        EvalContext { params: self.params, backend: self.backend, config: self.config, token: self.token }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

pub async fn execute<B: StorageBackend>(
    backend: &B,
    query: &Query,
    params: &PropertyMap,
    config: &ExecutorConfig,
    token: &CancellationToken,
) -> Result<QueryResult> {
    let mut ctx = Ctx { backend, params, config, token, stats: ExecutionStats::default() };
    let mut rows: Vec<Row> = vec![Row::new()];
    let mut columns: Vec<String> = Vec::new();

    for segment in &query.segments {
        ctx.check_cancelled()?;
        let (next_rows, next_columns) = execute_segment(&mut ctx, segment, rows).await?;
        rows = next_rows;
        columns = next_columns;
        tracing::trace!(rows = rows.len(), "segment transition");
    }

    if query.segments.last().map(|s| s.projection.is_none()).unwrap_or(true) {
        return Ok(QueryResult { columns: Vec::new(), rows: Vec::new(), stats: ctx.stats });
    }

    let result_rows = rows
        .into_iter()
        .map(|row| ResultRow { values: columns.iter().map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null))).collect() })
        .collect();

    Ok(QueryResult { columns, rows: result_rows, stats: ctx.stats })
}

pub async fn execute_schema<B: StorageBackend>(backend: &B, cmd: &SchemaCommand) -> Result<QueryResult> {
    match cmd {
        SchemaCommand::CreateIndex { label, property, index_type } => {
            let kind = match index_type.as_deref() {
                Some("FULLTEXT") => IndexType::FullText,
                Some("UNIQUE") => IndexType::Unique,
                _ => IndexType::BTree,
            };
            backend.create_index(label, property, kind).await?;
        }
        SchemaCommand::DropIndex { label, property } => {
            backend.drop_index(label, property).await?;
        }
        SchemaCommand::CreateConstraint { label, property, .. } => {
            backend.create_index(label, property, IndexType::Unique).await?;
        }
        SchemaCommand::DropConstraint { label, property } => {
            backend.drop_index(label, property).await?;
        }
    }
    Ok(QueryResult { columns: Vec::new(), rows: Vec::new(), stats: ExecutionStats::default() })
}

// ============================================================================
// Segment execution
// ============================================================================

async fn execute_segment<B: StorageBackend>(
    ctx: &mut Ctx<'_, B>,
    segment: &Segment,
    mut rows: Vec<Row>,
) -> Result<(Vec<Row>, Vec<String>)> {
    for clause in &segment.clauses {
        ctx.check_cancelled()?;
        rows = execute_clause(ctx, clause, rows).await?;
    }

    match &segment.projection {
        Some(projection) => execute_projection(ctx, projection, rows).await,
        None => {
            let columns: Vec<String> = rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default();
            Ok((rows, columns))
        }
    }
}

async fn execute_clause<B: StorageBackend>(ctx: &mut Ctx<'_, B>, clause: &Clause, rows: Vec<Row>) -> Result<Vec<Row>> {
    match clause {
        Clause::Match { optional, patterns, where_clause } => execute_match(ctx, *optional, patterns, where_clause, rows).await,
        Clause::Unwind { expr, alias } => execute_unwind(ctx, expr, alias, rows).await,
        Clause::Call { name, args, yields } => execute_call(ctx, name, args, yields, rows).await,
        Clause::Create { patterns } => execute_create(ctx, patterns, rows).await,
        Clause::Merge { pattern, on_create, on_match } => execute_merge(ctx, pattern, on_create, on_match, rows).await,
        Clause::Set { items } => execute_set(ctx, items, rows).await,
        Clause::Remove { items } => execute_remove(ctx, items, rows).await,
        Clause::Delete { detach, vars } => execute_delete(ctx, *detach, vars, rows).await,
    }
}

// ---- MATCH / OPTIONAL MATCH ----

async fn execute_match<B: StorageBackend>(
    ctx: &mut Ctx<'_, B>,
    optional: bool,
    patterns: &[Pattern],
    where_clause: &Option<Expr>,
    rows: Vec<Row>,
) -> Result<Vec<Row>> {
    let mut current = rows;
    for pattern in patterns {
        let mut next = Vec::new();
        for row in &current {
            let matches = traversal::expand_pattern(pattern, row, ctx.backend, ctx.config, ctx.token).await?;
            if matches.is_empty() && optional {
                next.push(with_null_bindings(row, pattern));
            } else {
                next.extend(matches);
            }
        }
        current = next;
    }

    if let Some(pred) = where_clause {
        current = filter_rows(ctx, pred, current).await?;
    }
    Ok(current)
}

fn with_null_bindings(row: &Row, pattern: &Pattern) -> Row {
    let mut r = row.clone();
    for element in &pattern.elements {
        let alias = match element {
            PatternElement::Node(n) => &n.alias,
            PatternElement::Relationship(rel) => &rel.alias,
        };
        if let Some(alias) = alias {
            r.entry(alias.clone()).or_insert(Value::Null);
        }
    }
    if let Some(alias) = &pattern.path_alias {
        r.entry(alias.clone()).or_insert(Value::Null);
    }
    r
}

async fn filter_rows<B: StorageBackend>(ctx: &Ctx<'_, B>, pred: &Expr, rows: Vec<Row>) -> Result<Vec<Row>> {
    let eval_ctx = ctx.eval_ctx();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if functions::eval(pred, &row, &eval_ctx).await?.is_truthy() {
            out.push(row);
        }
    }
    Ok(out)
}

// ---- UNWIND ----

async fn execute_unwind<B: StorageBackend>(ctx: &mut Ctx<'_, B>, expr: &Expr, alias: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
    let eval_ctx = ctx.eval_ctx();
    let mut out = Vec::new();
    for row in &rows {
        match functions::eval(expr, row, &eval_ctx).await? {
            Value::List(items) => {
                for item in items {
                    let mut r = row.clone();
                    r.insert(alias.to_string(), item);
                    out.push(r);
                }
            }
            Value::Null => {}
            other => {
                let mut r = row.clone();
                r.insert(alias.to_string(), other);
                out.push(r);
            }
        }
    }
    Ok(out)
}

// ---- CALL ----

async fn execute_call<B: StorageBackend>(
    ctx: &mut Ctx<'_, B>,
    name: &str,
    args: &[Expr],
    yields: &[String],
    rows: Vec<Row>,
) -> Result<Vec<Row>> {
    let eval_ctx = ctx.eval_ctx();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let call_expr = Expr::FunctionCall { name: name.to_string(), args: args.to_vec(), distinct: false };
        let result = functions::eval(&call_expr, &row, &eval_ctx).await?;
        let mut r = row;
        if let Some(first) = yields.first() {
            r.insert(first.clone(), result);
        }
        out.push(r);
    }
    Ok(out)
}

// ---- CREATE ----

async fn execute_create<B: StorageBackend>(ctx: &mut Ctx<'_, B>, patterns: &[Pattern], rows: Vec<Row>) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let r = materialize_pattern(ctx, patterns, row).await?;
        out.push(r);
    }
    Ok(out)
}

async fn materialize_pattern<B: StorageBackend>(ctx: &mut Ctx<'_, B>, patterns: &[Pattern], mut row: Row) -> Result<Row> {
    for pattern in patterns {
        row = materialize_one_pattern(ctx, pattern, row).await?;
    }
    Ok(row)
}

async fn materialize_one_pattern<B: StorageBackend>(ctx: &mut Ctx<'_, B>, pattern: &Pattern, mut row: Row) -> Result<Row> {
    let mut prev_id = None;
    for (i, element) in pattern.elements.iter().enumerate() {
        match element {
            PatternElement::Node(node) => {
                let bound = node.alias.as_ref().and_then(|a| row.get(a)).cloned();
                let current = match bound {
                    Some(Value::Node(n)) => (*n).clone(),
                    _ => {
                        let mut props = PropertyMap::new();
                        let eval_ctx = ctx.eval_ctx();
                        for (k, expr) in &node.properties {
                            props.insert(k.clone(), functions::eval(expr, &row, &eval_ctx).await?);
                        }
                        let label_refs: Vec<&str> = node.labels.iter().map(String::as_str).collect();
                        let id = ctx
                            .backend
                            .create_node(&label_refs, props.clone())
                            .await
                            ?;
                        ctx.stats.nodes_created += 1;
                        ctx.stats.labels_added += node.labels.len() as u64;
                        ctx.stats.properties_set += props.len() as u64;
                        let mut n = Node::new(id);
                        n.labels = node.labels.clone();
                        n.properties = props;
                        if let Some(alias) = &node.alias {
                            row.insert(alias.clone(), Value::Node(Box::new(n.clone())));
                        }
                        n
                    }
                };
                prev_id = Some(current.id);
                if i == 0 {
                    if let Some(alias) = &node.alias {
                        row.entry(alias.clone()).or_insert(Value::Node(Box::new(current)));
                    }
                }
            }
            PatternElement::Relationship(rel) => {
                let src = prev_id.ok_or_else(|| Error::ArgumentError("relationship pattern missing a preceding node".into()))?;
                let next_node = match pattern.elements.get(i + 1) {
                    Some(PatternElement::Node(n)) => n,
                    _ => return Err(Error::ArgumentError("relationship pattern must be followed by a node".into())),
                };
                let dst_bound = next_node.alias.as_ref().and_then(|a| row.get(a)).cloned();
                let dst_id = match dst_bound {
                    Some(Value::Node(n)) => n.id,
                    _ => {
                        let mut props = PropertyMap::new();
                        let eval_ctx = ctx.eval_ctx();
                        for (k, expr) in &next_node.properties {
                            props.insert(k.clone(), functions::eval(expr, &row, &eval_ctx).await?);
                        }
                        let label_refs: Vec<&str> = next_node.labels.iter().map(String::as_str).collect();
                        let id = ctx.backend.create_node(&label_refs, props.clone()).await?;
                        ctx.stats.nodes_created += 1;
                        ctx.stats.labels_added += next_node.labels.len() as u64;
                        ctx.stats.properties_set += props.len() as u64;
                        let mut n = Node::new(id);
                        n.labels = next_node.labels.clone();
                        n.properties = props;
                        if let Some(alias) = &next_node.alias {
                            row.insert(alias.clone(), Value::Node(Box::new(n)));
                        }
                        id
                    }
                };

                let rel_type = rel.rel_types.first().cloned().unwrap_or_default();
                let mut props = PropertyMap::new();
                let eval_ctx = ctx.eval_ctx();
                for (k, expr) in &rel.properties {
                    props.insert(k.clone(), functions::eval(expr, &row, &eval_ctx).await?);
                }
                let (edge_src, edge_dst) = if rel.direction == crate::cypher::ast::PatternDirection::Left {
                    (dst_id, src)
                } else {
                    (src, dst_id)
                };
                let edge_id = ctx
                    .backend
                    .create_edge(edge_src, edge_dst, &rel_type, props.clone())
                    .await
                    ?;
                ctx.stats.relationships_created += 1;
                ctx.stats.properties_set += props.len() as u64;
                if let Some(alias) = &rel.alias {
                    let edge = Relationship { id: edge_id, src: edge_src, dst: edge_dst, rel_type, properties: props };
                    row.insert(alias.clone(), Value::Relationship(Box::new(edge)));
                }
                prev_id = Some(dst_id);
            }
        }
    }
    Ok(row)
}

// ---- MERGE ----

async fn execute_merge<B: StorageBackend>(
    ctx: &mut Ctx<'_, B>,
    pattern: &Pattern,
    on_create: &[SetItem],
    on_match: &[SetItem],
    rows: Vec<Row>,
) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let matches = traversal::expand_pattern(pattern, &row, ctx.backend, ctx.config, ctx.token).await?;
        if let Some(matched) = matches.into_iter().next() {
            let mut merged = row.clone();
            for (k, v) in matched {
                merged.insert(k, v);
            }
            merged = apply_set_items(ctx, on_match, merged).await?;
            out.push(merged);
        } else {
            let created = materialize_one_pattern(ctx, pattern, row).await?;
            let created = apply_set_items(ctx, on_create, created).await?;
            out.push(created);
        }
    }
    Ok(out)
}

// ---- SET ----

async fn execute_set<B: StorageBackend>(ctx: &mut Ctx<'_, B>, items: &[SetItem], rows: Vec<Row>) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(apply_set_items(ctx, items, row).await?);
    }
    Ok(out)
}

async fn apply_set_items<B: StorageBackend>(ctx: &mut Ctx<'_, B>, items: &[SetItem], mut row: Row) -> Result<Row> {
    for item in items {
        match item {
            SetItem::Property { variable, key, value } => {
                let eval_ctx = ctx.eval_ctx();
                let val = functions::eval(value, &row, &eval_ctx).await?;
                set_property(ctx, &mut row, variable, key, val).await?;
            }
            SetItem::AllProperties { variable, value } => {
                let eval_ctx = ctx.eval_ctx();
                let map = match functions::eval(value, &row, &eval_ctx).await? {
                    Value::Map(m) => m,
                    other => return Err(Error::TypeError { expected: "Map".into(), got: other.type_name().into() }),
                };
                replace_properties(ctx, &mut row, variable, map).await?;
            }
            SetItem::MergeProperties { variable, value } => {
                let eval_ctx = ctx.eval_ctx();
                let map = match functions::eval(value, &row, &eval_ctx).await? {
                    Value::Map(m) => m,
                    other => return Err(Error::TypeError { expected: "Map".into(), got: other.type_name().into() }),
                };
                for (k, v) in map {
                    set_property(ctx, &mut row, variable, &k, v).await?;
                }
            }
            SetItem::Label { variable, label } => {
                if let Some(Value::Node(n)) = row.get(variable).cloned() {
                    ctx.backend.add_label(n.id, label).await?;
                    ctx.stats.labels_added += 1;
                    let mut updated = (*n).clone();
                    if !updated.labels.contains(label) {
                        updated.labels.push(label.clone());
                    }
                    row.insert(variable.clone(), Value::Node(Box::new(updated)));
                }
            }
        }
    }
    Ok(row)
}

async fn set_property<B: StorageBackend>(ctx: &mut Ctx<'_, B>, row: &mut Row, variable: &str, key: &str, val: Value) -> Result<()> {
    match row.get(variable).cloned() {
        Some(Value::Node(n)) => {
            if val.is_null() {
                ctx.backend.remove_node_property(n.id, key).await?;
            } else {
                ctx.backend.set_node_property(n.id, key, val.clone()).await?;
            }
            ctx.stats.properties_set += 1;
            let mut updated = (*n).clone();
            if val.is_null() {
                updated.properties.shift_remove(key);
            } else {
                updated.properties.insert(key.to_string(), val);
            }
            row.insert(variable.to_string(), Value::Node(Box::new(updated)));
        }
        Some(Value::Relationship(r)) => {
            if val.is_null() {
                ctx.backend.remove_relationship_property(r.id, key).await?;
            } else {
                ctx.backend.set_relationship_property(r.id, key, val.clone()).await?;
            }
            ctx.stats.properties_set += 1;
            let mut updated = (*r).clone();
            if val.is_null() {
                updated.properties.shift_remove(key);
            } else {
                updated.properties.insert(key.to_string(), val);
            }
            row.insert(variable.to_string(), Value::Relationship(Box::new(updated)));
        }
        _ => {}
    }
    Ok(())
}

async fn replace_properties<B: StorageBackend>(ctx: &mut Ctx<'_, B>, row: &mut Row, variable: &str, map: PropertyMap) -> Result<()> {
    match row.get(variable).cloned() {
        Some(Value::Node(n)) => {
            ctx.backend.update_node_properties(n.id, map.clone()).await?;
            ctx.stats.properties_set += map.len() as u64;
            let mut updated = (*n).clone();
            updated.properties = map;
            row.insert(variable.to_string(), Value::Node(Box::new(updated)));
        }
        Some(Value::Relationship(r)) => {
            for (k, v) in &map {
                ctx.backend.set_relationship_property(r.id, k, v.clone()).await?;
            }
            ctx.stats.properties_set += map.len() as u64;
            let mut updated = (*r).clone();
            updated.properties = map;
            row.insert(variable.to_string(), Value::Relationship(Box::new(updated)));
        }
        _ => {}
    }
    Ok(())
}

// ---- REMOVE ----

async fn execute_remove<B: StorageBackend>(ctx: &mut Ctx<'_, B>, items: &[RemoveItem], rows: Vec<Row>) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        for item in items {
            match item {
                RemoveItem::Property { variable, key } => {
                    set_property(ctx, &mut row, variable, key, Value::Null).await?;
                }
                RemoveItem::Label { variable, label } => {
                    if let Some(Value::Node(n)) = row.get(variable).cloned() {
                        ctx.backend.remove_label(n.id, label).await?;
                        ctx.stats.labels_removed += 1;
                        let mut updated = (*n).clone();
                        updated.labels.retain(|l| l != label);
                        row.insert(variable.clone(), Value::Node(Box::new(updated)));
                    }
                }
            }
        }
        out.push(row);
    }
    Ok(out)
}

// ---- DELETE / DETACH DELETE ----

async fn execute_delete<B: StorageBackend>(ctx: &mut Ctx<'_, B>, detach: bool, vars: &[Expr], rows: Vec<Row>) -> Result<Vec<Row>> {
    let eval_ctx = ctx.eval_ctx();
    for row in &rows {
        for var in vars {
            match functions::eval(var, row, &eval_ctx).await? {
                Value::Node(n) => {
                    if detach {
                        ctx.backend.detach_delete_node(n.id).await?;
                    } else {
                        let outgoing = ctx.backend.get_outgoing_edges(n.id, None).await?;
                        let incoming = ctx.backend.get_incoming_edges(n.id, None).await?;
                        if !outgoing.is_empty() || !incoming.is_empty() {
                            return Err(Error::ConstraintViolation(format!(
                                "cannot delete node {} with incident relationships without DETACH",
                                n.id
                            )));
                        }
                        ctx.backend.delete_node(n.id).await?;
                    }
                    ctx.stats.nodes_deleted += 1;
                }
                Value::Relationship(r) => {
                    ctx.backend.delete_edge(r.id).await?;
                    ctx.stats.relationships_deleted += 1;
                }
                Value::Null => {}
                other => return Err(Error::TypeError { expected: "Node or Relationship".into(), got: other.type_name().into() }),
            }
        }
    }
    Ok(rows)
}

// ============================================================================
// Projection (WITH / RETURN), including implicit-grouping aggregation
// ============================================================================

async fn execute_projection<B: StorageBackend>(
    ctx: &mut Ctx<'_, B>,
    projection: &Projection,
    rows: Vec<Row>,
) -> Result<(Vec<Row>, Vec<String>)> {
    let items: Vec<(String, Expr)> = if projection.items.len() == 1 && matches!(projection.items[0].expr, Expr::Star) {
        let cols = rows.first().map(|r| r.keys().cloned().collect::<Vec<_>>()).unwrap_or_default();
        cols.into_iter().map(|c| (c.clone(), Expr::Variable(c))).collect()
    } else {
        projection
            .items
            .iter()
            .map(|item| {
                let alias = item.alias.clone().unwrap_or_else(|| default_alias(&item.expr));
                (alias, item.expr.clone())
            })
            .collect()
    };

    let has_aggregate = items.iter().any(|(_, e)| contains_aggregate(e));

    let mut projected: Vec<Row> = if has_aggregate {
        execute_aggregation(ctx, &items, rows).await?
    } else {
        let eval_ctx = ctx.eval_ctx();
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut r = Row::new();
            for (alias, expr) in &items {
                r.insert(alias.clone(), functions::eval(expr, row, &eval_ctx).await?);
            }
            out.push(r);
        }
        out
    };

    if let Some(pred) = &projection.where_clause {
        projected = filter_rows(ctx, pred, projected).await?;
    }

    if projection.distinct {
        projected = dedup_rows(projected);
    }

    if !projection.order_by.is_empty() {
        projected = sort_rows(ctx, &projection.order_by, projected).await?;
    }

    if let Some(skip_expr) = &projection.skip {
        let n = eval_nonneg_int(ctx, skip_expr).await?;
        projected = projected.into_iter().skip(n).collect();
    }
    if let Some(limit_expr) = &projection.limit {
        let n = eval_nonneg_int(ctx, limit_expr).await?;
        projected.truncate(n);
    }

    let columns: Vec<String> = items.into_iter().map(|(alias, _)| alias).collect();
    Ok((projected, columns))
}

fn default_alias(expr: &Expr) -> String {
    match expr {
        Expr::Variable(name) => name.clone(),
        Expr::Property { expr, key } => format!("{}.{key}", default_alias(expr)),
        Expr::FunctionCall { name, .. } => name.clone(),
        _ => "expr".to_string(),
    }
}

async fn eval_nonneg_int<B: StorageBackend>(ctx: &Ctx<'_, B>, expr: &Expr) -> Result<usize> {
    let eval_ctx = ctx.eval_ctx();
    let val = functions::eval(expr, &Row::new(), &eval_ctx).await?;
    match val.as_int() {
        Some(i) if i >= 0 => Ok(i as usize),
        _ => Err(Error::ArgumentError("SKIP/LIMIT must be a non-negative integer".into())),
    }
}

fn dedup_rows(rows: Vec<Row>) -> Vec<Row> {
    let mut seen: Vec<Vec<(String, String)>> = Vec::new();
    let mut out = Vec::new();
    for row in rows {
        let key: Vec<(String, String)> = row.iter().map(|(k, v)| (k.clone(), v.to_string())).collect();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(row);
        }
    }
    out
}

async fn sort_rows<B: StorageBackend>(ctx: &Ctx<'_, B>, order_by: &[OrderExpr], rows: Vec<Row>) -> Result<Vec<Row>> {
    let eval_ctx = ctx.eval_ctx();
    let mut keyed: Vec<(Vec<Value>, Row)> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut key = Vec::with_capacity(order_by.len());
        for o in order_by {
            key.push(functions::eval(&o.expr, &row, &eval_ctx).await?);
        }
        keyed.push((key, row));
    }
    keyed.sort_by(|a, b| {
        for (i, o) in order_by.iter().enumerate() {
            let cmp = a.0[i].order_by_cmp(&b.0[i]);
            let cmp = if o.ascending { cmp } else { cmp.reverse() };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

// ---- Aggregation ----

fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::FunctionCall { name, args, .. } => {
            matches!(name.to_uppercase().as_str(), "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" | "COLLECT")
                || args.iter().any(contains_aggregate)
        }
        Expr::BinaryOp { left, right, .. } => contains_aggregate(left) || contains_aggregate(right),
        Expr::UnaryOp { expr, .. } => contains_aggregate(expr),
        Expr::Property { expr, .. } => contains_aggregate(expr),
        Expr::List(items) => items.iter().any(contains_aggregate),
        _ => false,
    }
}

async fn execute_aggregation<B: StorageBackend>(ctx: &mut Ctx<'_, B>, items: &[(String, Expr)], rows: Vec<Row>) -> Result<Vec<Row>> {
    let (group_items, agg_items): (Vec<_>, Vec<_>) = items.iter().partition(|(_, e)| !contains_aggregate(e));

    let eval_ctx = ctx.eval_ctx();
    let mut groups: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
    for row in &rows {
        let mut key = Vec::with_capacity(group_items.len());
        for (_, expr) in &group_items {
            key.push(functions::eval(expr, row, &eval_ctx).await?);
        }
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group_rows)) => group_rows.push(row.clone()),
            None => groups.push((key, vec![row.clone()])),
        }
    }

    if groups.is_empty() && group_items.is_empty() {
        let mut r = Row::new();
        for (alias, expr) in &agg_items {
            r.insert(alias.clone(), compute_aggregate(ctx, expr, &[]).await?);
        }
        return Ok(vec![r]);
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key_vals, group_rows) in &groups {
        let mut r = Row::new();
        for (i, (alias, _)) in group_items.iter().enumerate() {
            r.insert((*alias).clone(), key_vals[i].clone());
        }
        for (alias, expr) in &agg_items {
            r.insert((*alias).clone(), compute_aggregate(ctx, expr, group_rows).await?);
        }
        out.push(r);
    }
    Ok(out)
}

async fn compute_aggregate<B: StorageBackend>(ctx: &Ctx<'_, B>, expr: &Expr, rows: &[Row]) -> Result<Value> {
    let (name, args, distinct) = match expr {
        Expr::FunctionCall { name, args, distinct } => (name.to_uppercase(), args, *distinct),
        other => {
            let eval_ctx = ctx.eval_ctx();
            return match rows.first() {
                Some(row) => functions::eval(other, row, &eval_ctx).await,
                None => Ok(Value::Null),
            };
        }
    };

    if name == "COUNT" && args.is_empty() {
        return Ok(Value::Int(rows.len() as i64));
    }

    let eval_ctx = ctx.eval_ctx();
    let mut vals = Vec::new();
    for row in rows {
        let v = functions::eval(&args[0], row, &eval_ctx).await?;
        if !v.is_null() {
            vals.push(v);
        }
    }
    if distinct {
        let mut deduped = Vec::new();
        for v in vals {
            if !deduped.iter().any(|d: &Value| d.loose_eq(&v) == Some(true)) {
                deduped.push(v);
            }
        }
        vals = deduped;
    }

    match name.as_str() {
        "COUNT" => Ok(Value::Int(vals.len() as i64)),
        "SUM" => {
            let mut int_sum: i64 = 0;
            let mut float_sum: f64 = 0.0;
            let mut is_float = false;
            for v in &vals {
                match v {
                    Value::Int(i) => int_sum += i,
                    Value::Float(f) => {
                        is_float = true;
                        float_sum += f;
                    }
                    other => return Err(Error::TypeError { expected: "Numeric".into(), got: other.type_name().into() }),
                }
            }
            Ok(if is_float { Value::Float(int_sum as f64 + float_sum) } else { Value::Int(int_sum) })
        }
        "AVG" => {
            if vals.is_empty() {
                return Ok(Value::Null);
            }
            let sum: f64 = vals.iter().filter_map(Value::as_float).sum();
            Ok(Value::Float(sum / vals.len() as f64))
        }
        "MIN" => Ok(vals.into_iter().min_by(|a, b| a.order_by_cmp(b)).unwrap_or(Value::Null)),
        "MAX" => Ok(vals.into_iter().max_by(|a, b| a.order_by_cmp(b)).unwrap_or(Value::Null)),
        "COLLECT" => Ok(Value::List(vals)),
        _ => Err(Error::UnknownFunction(name)),
    }
}
