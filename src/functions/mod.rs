//! Expression evaluation and the scalar function library.
//!
//! `eval` generalizes the teacher's `eval_expr`/`eval_binary_op`/
//! `eval_function` trio: same shape (match on `Expr`, short-circuit
//! `AND`/`OR`, NULL-propagating binary ops), extended with `=~` against a
//! process-wide regex cache, `IN`/`CONTAINS`/`STARTS WITH`/`ENDS WITH`, list
//! comprehensions, `ANY`/`ALL`/`NONE`/`SINGLE` predicates, `EXISTS`
//! subqueries, and the full scalar/string/list/map/temporal/spatial/`apoc.*`
//! registry. Pattern matching for `EXISTS` is delegated to [`crate::traversal`].

pub mod registry;
pub mod plugin;
pub mod regex_cache;
pub mod temporal;
pub mod spatial;

use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;

use crate::cypher::ast::{BinaryOp, Expr, Literal, StringOp, UnaryOp};
use crate::model::{PropertyMap, Value};
use crate::storage::StorageBackend;
use crate::tx::CancellationToken;
use crate::{Error, ExecutorConfig, Result};

/// A row binding: variable name -> value, insertion-ordered.
pub type Row = PropertyMap;

/// Evaluation context threaded through every `eval` call: parameters, the
/// backend (needed only for `EXISTS` subqueries), traversal config, and the
/// cancellation token.
pub struct EvalContext<'a, B: StorageBackend> {
    pub params: &'a PropertyMap,
    pub backend: &'a B,
    pub config: &'a ExecutorConfig,
    pub token: &'a CancellationToken,
}

/// Evaluate an expression against a row binding. Async (and boxed on every
/// recursive call) because `EXISTS` subqueries must drive traversal against
/// the backend.
pub fn eval<'a, B: StorageBackend>(
    expr: &'a Expr,
    row: &'a Row,
    ctx: &'a EvalContext<'a, B>,
) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
    Box::pin(async move {
        if ctx.token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),

            Expr::Variable(name) => Ok(row.get(name).cloned().unwrap_or(Value::Null)),

            Expr::Parameter(name) => Ok(ctx.params.get(name).cloned().unwrap_or(Value::Null)),

            Expr::Property { expr: inner, key } => {
                let val = eval(inner, row, ctx).await?;
                Ok(match val {
                    Value::Node(n) => n.get(key).cloned().unwrap_or(Value::Null),
                    Value::Relationship(r) => r.properties.get(key).cloned().unwrap_or(Value::Null),
                    Value::Map(m) => m.get(key).cloned().unwrap_or(Value::Null),
                    Value::Null => Value::Null,
                    other => {
                        return Err(Error::TypeError {
                            expected: "Node, Relationship, or Map".into(),
                            got: other.type_name().into(),
                        });
                    }
                })
            }

            Expr::FunctionCall { name, args, distinct: _ } => eval_function(name, args, row, ctx).await,

            Expr::BinaryOp { left, op, right } => {
                let lv = eval(left, row, ctx).await?;
                match op {
                    BinaryOp::And => {
                        if matches!(lv, Value::Bool(false)) {
                            return Ok(Value::Bool(false));
                        }
                        let rv = eval(right, row, ctx).await?;
                        Ok(and_or(lv, rv, true))
                    }
                    BinaryOp::Or => {
                        if matches!(lv, Value::Bool(true)) {
                            return Ok(Value::Bool(true));
                        }
                        let rv = eval(right, row, ctx).await?;
                        Ok(and_or(lv, rv, false))
                    }
                    _ => {
                        let rv = eval(right, row, ctx).await?;
                        eval_binary_op(&lv, *op, &rv)
                    }
                }
            }

            Expr::UnaryOp { op, expr: inner } => {
                let val = eval(inner, row, ctx).await?;
                Ok(match op {
                    UnaryOp::Not => match val {
                        Value::Null => Value::Null,
                        other => Value::Bool(!other.is_truthy()),
                    },
                    UnaryOp::Negate => match val {
                        Value::Int(i) => Value::Int(-i),
                        Value::Float(f) => Value::Float(-f),
                        Value::Null => Value::Null,
                        other => {
                            return Err(Error::TypeError {
                                expected: "Numeric".into(),
                                got: other.type_name().into(),
                            });
                        }
                    },
                })
            }

            Expr::List(items) => {
                let mut vals = Vec::with_capacity(items.len());
                for item in items {
                    vals.push(eval(item, row, ctx).await?);
                }
                Ok(Value::List(vals))
            }

            Expr::MapLiteral(entries) => {
                let mut map = PropertyMap::new();
                for (k, v) in entries {
                    map.insert(k.clone(), eval(v, row, ctx).await?);
                }
                Ok(Value::Map(map))
            }

            Expr::Case { operand, whens, else_expr } => {
                if let Some(op) = operand {
                    let op_val = eval(op, row, ctx).await?;
                    for (when_expr, then_expr) in whens {
                        let when_val = eval(when_expr, row, ctx).await?;
                        if op_val.loose_eq(&when_val) == Some(true) {
                            return eval(then_expr, row, ctx).await;
                        }
                    }
                } else {
                    for (when_expr, then_expr) in whens {
                        let when_val = eval(when_expr, row, ctx).await?;
                        if when_val.is_truthy() {
                            return eval(then_expr, row, ctx).await;
                        }
                    }
                }
                match else_expr {
                    Some(e) => eval(e, row, ctx).await,
                    None => Ok(Value::Null),
                }
            }

            Expr::In { expr: item, list } => {
                let item_val = eval(item, row, ctx).await?;
                let list_val = eval(list, row, ctx).await?;
                match list_val {
                    Value::Null => Ok(Value::Null),
                    Value::List(items) => {
                        if item_val.is_null() {
                            return Ok(Value::Null);
                        }
                        Ok(Value::Bool(items.iter().any(|v| item_val.loose_eq(v) == Some(true))))
                    }
                    other => Err(Error::TypeError { expected: "List".into(), got: other.type_name().into() }),
                }
            }

            Expr::IsNull { expr: inner, negated } => {
                let val = eval(inner, row, ctx).await?;
                let is_null = val.is_null();
                Ok(Value::Bool(if *negated { !is_null } else { is_null }))
            }

            Expr::HasLabel { expr: inner, label } => {
                let val = eval(inner, row, ctx).await?;
                match val {
                    Value::Node(n) => Ok(Value::Bool(n.has_label(label))),
                    Value::Null => Ok(Value::Null),
                    other => Err(Error::TypeError { expected: "Node".into(), got: other.type_name().into() }),
                }
            }

            Expr::StringOp { left, op, right } => {
                let lv = eval(left, row, ctx).await?;
                let rv = eval(right, row, ctx).await?;
                match (&lv, &rv) {
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (Value::String(a), Value::String(b)) => Ok(Value::Bool(match op {
                        StringOp::StartsWith => a.starts_with(b.as_str()),
                        StringOp::EndsWith => a.ends_with(b.as_str()),
                        StringOp::Contains => a.contains(b.as_str()),
                    })),
                    _ => Err(Error::TypeError {
                        expected: "String".into(),
                        got: format!("{}, {}", lv.type_name(), rv.type_name()),
                    }),
                }
            }

            Expr::ListComprehension { variable, list, predicate, transform } => {
                let list_val = eval(list, row, ctx).await?;
                let items = match list_val {
                    Value::Null => return Ok(Value::Null),
                    Value::List(items) => items,
                    other => return Err(Error::TypeError { expected: "List".into(), got: other.type_name().into() }),
                };
                let mut out = Vec::new();
                for item in items {
                    let mut inner_row = row.clone();
                    inner_row.insert(variable.clone(), item.clone());
                    if let Some(pred) = predicate {
                        let keep = eval(pred, &inner_row, ctx).await?;
                        if !keep.is_truthy() {
                            continue;
                        }
                    }
                    let val = match transform {
                        Some(t) => eval(t, &inner_row, ctx).await?,
                        None => item,
                    };
                    out.push(val);
                }
                Ok(Value::List(out))
            }

            Expr::Predicate { kind, variable, list, predicate } => {
                let list_val = eval(list, row, ctx).await?;
                let items = match list_val {
                    Value::Null => return Ok(Value::Null),
                    Value::List(items) => items,
                    other => return Err(Error::TypeError { expected: "List".into(), got: other.type_name().into() }),
                };
                use crate::cypher::ast::PredicateKind;
                let mut matched = 0usize;
                for item in &items {
                    let mut inner_row = row.clone();
                    inner_row.insert(variable.clone(), item.clone());
                    let val = eval(predicate, &inner_row, ctx).await?;
                    let truthy = val.is_truthy();
                    match kind {
                        PredicateKind::Any => {
                            if truthy {
                                return Ok(Value::Bool(true));
                            }
                        }
                        PredicateKind::All => {
                            if !truthy {
                                return Ok(Value::Bool(false));
                            }
                        }
                        PredicateKind::None => {
                            if truthy {
                                return Ok(Value::Bool(false));
                            }
                        }
                        PredicateKind::Single => {
                            if truthy {
                                matched += 1;
                                if matched > 1 {
                                    return Ok(Value::Bool(false));
                                }
                            }
                        }
                    }
                }
                Ok(match kind {
                    PredicateKind::Any => Value::Bool(false),
                    PredicateKind::All => Value::Bool(true),
                    PredicateKind::None => Value::Bool(true),
                    PredicateKind::Single => Value::Bool(matched == 1),
                })
            }

            Expr::Exists { pattern, where_clause } => {
                let rows = crate::traversal::expand_pattern(pattern, row, ctx.backend, ctx.config, ctx.token).await?;
                for candidate in &rows {
                    match where_clause {
                        Some(w) => {
                            if eval(w, candidate, ctx).await?.is_truthy() {
                                return Ok(Value::Bool(true));
                            }
                        }
                        None => return Ok(Value::Bool(true)),
                    }
                }
                Ok(Value::Bool(false))
            }

            Expr::Star => Ok(Value::Null),
        }
    })
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn and_or(lv: Value, rv: Value, is_and: bool) -> Value {
    // three-valued AND/OR: NULL acts as absorbing only when the other side
    // can't decide the result on its own.
    match (lv.is_null(), rv.is_null()) {
        (false, false) => Value::Bool(if is_and { lv.is_truthy() && rv.is_truthy() } else { lv.is_truthy() || rv.is_truthy() }),
        _ => {
            if is_and && (matches!(lv, Value::Bool(false)) || matches!(rv, Value::Bool(false))) {
                Value::Bool(false)
            } else if !is_and && (matches!(lv, Value::Bool(true)) || matches!(rv, Value::Bool(true))) {
                Value::Bool(true)
            } else {
                Value::Null
            }
        }
    }
}

// ============================================================================
// Binary operators
// ============================================================================

fn eval_binary_op(left: &Value, op: BinaryOp, right: &Value) -> Result<Value> {
    if matches!(op, BinaryOp::Eq | BinaryOp::Neq) {
        return Ok(match left.loose_eq(right) {
            None => Value::Null,
            Some(eq) => Value::Bool(if op == BinaryOp::Eq { eq } else { !eq }),
        });
    }

    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    match op {
        BinaryOp::Lt => Ok(Value::Bool(left.cypher_cmp(right) == Some(Ordering::Less))),
        BinaryOp::Lte => Ok(Value::Bool(matches!(left.cypher_cmp(right), Some(Ordering::Less | Ordering::Equal)))),
        BinaryOp::Gt => Ok(Value::Bool(left.cypher_cmp(right) == Some(Ordering::Greater))),
        BinaryOp::Gte => Ok(Value::Bool(matches!(left.cypher_cmp(right), Some(Ordering::Greater | Ordering::Equal)))),

        BinaryOp::Add => eval_add(left, right),
        BinaryOp::Sub => {
            if let Some(v) = temporal::subtract(left, right) {
                return Ok(v);
            }
            eval_arith(left, right, |a, b| a - b, |a, b| a - b)
        }
        BinaryOp::Mul => eval_arith(left, right, |a, b| a * b, |a, b| a * b),
        BinaryOp::Div => match right {
            Value::Int(0) => Err(Error::ArgumentError("division by zero".into())),
            Value::Float(f) if *f == 0.0 => Err(Error::ArgumentError("division by zero".into())),
            _ => eval_arith(left, right, |a, b| a / b, |a, b| a / b),
        },
        BinaryOp::Mod => eval_arith(left, right, |a, b| a % b, |a, b| a % b),
        BinaryOp::Pow => {
            let l = left.as_float().ok_or_else(|| Error::TypeError { expected: "Numeric".into(), got: left.type_name().into() })?;
            let r = right.as_float().ok_or_else(|| Error::TypeError { expected: "Numeric".into(), got: right.type_name().into() })?;
            Ok(Value::Float(l.powf(r)))
        }

        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        BinaryOp::Xor => Ok(Value::Bool(left.is_truthy() ^ right.is_truthy())),

        BinaryOp::RegexMatch => match (left, right) {
            (Value::String(s), Value::String(pattern)) => {
                Ok(Value::Bool(regex_cache::is_match(pattern, s)))
            }
            _ => Err(Error::TypeError {
                expected: "String".into(),
                got: format!("{}, {}", left.type_name(), right.type_name()),
            }),
        },

        BinaryOp::Eq | BinaryOp::Neq => unreachable!("handled above"),
    }
}

fn eval_add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::String(a), b) => Ok(Value::String(format!("{a}{b}"))),
        (a, Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut out = a.clone();
            out.extend(b.clone());
            Ok(Value::List(out))
        }
        (Value::List(a), b) => {
            let mut out = a.clone();
            out.push(b.clone());
            Ok(Value::List(out))
        }
        _ => Err(Error::TypeError {
            expected: "compatible types for +".into(),
            got: format!("{}, {}", left.type_name(), right.type_name()),
        }),
    }
}

fn eval_arith(left: &Value, right: &Value, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Result<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(*a, *b))),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(*a, *b))),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(float_op(*a as f64, *b))),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(float_op(*a, *b as f64))),
        _ => Err(Error::TypeError {
            expected: "Numeric".into(),
            got: format!("{}, {}", left.type_name(), right.type_name()),
        }),
    }
}

// ============================================================================
// Function dispatch
// ============================================================================

async fn eval_function<'a, B: StorageBackend>(
    name: &str,
    args: &'a [Expr],
    row: &'a Row,
    ctx: &'a EvalContext<'a, B>,
) -> Result<Value> {
    // Aggregates are handled entirely by `pipeline::aggregate` — if one
    // reaches here it's being evaluated per-row outside an aggregation
    // context (e.g. nested in another call), so degrade to its argument.
    let upper = name.to_uppercase();
    if matches!(upper.as_str(), "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" | "COLLECT") {
        return if args.is_empty() {
            Ok(Value::Int(1))
        } else {
            eval(&args[0], row, ctx).await
        };
    }

    let mut vals = Vec::with_capacity(args.len());
    for a in args {
        vals.push(eval(a, row, ctx).await?);
    }

    if let Some(result) = registry::call(name, &vals)? {
        return Ok(result);
    }

    match plugin::call(name, &vals)? {
        Some(v) => Ok(v),
        None => Err(Error::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn ctx<'a>(params: &'a PropertyMap, backend: &'a MemoryBackend, config: &'a ExecutorConfig, token: &'a CancellationToken) -> EvalContext<'a, MemoryBackend> {
        EvalContext { params, backend, config, token }
    }

    #[tokio::test]
    async fn test_eval_literal_and_arith() {
        let backend = MemoryBackend::new();
        let params = PropertyMap::new();
        let config = ExecutorConfig::default();
        let token = CancellationToken::new();
        let c = ctx(&params, &backend, &config, &token);
        let row = Row::new();

        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Literal(Literal::Int(2))),
            op: BinaryOp::Add,
            right: Box::new(Expr::Literal(Literal::Int(3))),
        };
        assert_eq!(eval(&expr, &row, &c).await.unwrap(), Value::Int(5));
    }

    #[tokio::test]
    async fn test_null_propagation() {
        let backend = MemoryBackend::new();
        let params = PropertyMap::new();
        let config = ExecutorConfig::default();
        let token = CancellationToken::new();
        let c = ctx(&params, &backend, &config, &token);
        let row = Row::new();

        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Literal(Literal::Null)),
            op: BinaryOp::Lt,
            right: Box::new(Expr::Literal(Literal::Int(3))),
        };
        assert_eq!(eval(&expr, &row, &c).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_loose_eq_number_string() {
        let backend = MemoryBackend::new();
        let params = PropertyMap::new();
        let config = ExecutorConfig::default();
        let token = CancellationToken::new();
        let c = ctx(&params, &backend, &config, &token);
        let row = Row::new();

        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Literal(Literal::Int(3))),
            op: BinaryOp::Eq,
            right: Box::new(Expr::Literal(Literal::String("3".into()))),
        };
        assert_eq!(eval(&expr, &row, &c).await.unwrap(), Value::Bool(true));
    }
}
