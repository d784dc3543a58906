//! The scalar/string/list/map/identifier function table plus the `apoc.*`
//! namespace. Dispatch is by lower-cased, dot-qualified name; temporal and
//! spatial families live in their own modules and are tried first since
//! their names overlap with nothing else here.

use crate::model::{PropertyMap, Value};
use crate::{Error, Result};

use super::{spatial, temporal};

/// Look up and invoke `name(args)`. Returns `Ok(None)` for an unrecognized
/// name so the caller can fall through to the plugin hook.
pub fn call(name: &str, args: &[Value]) -> Result<Option<Value>> {
    let key = name.to_ascii_lowercase();

    if let Some(v) = temporal::call(&key, args)? {
        return Ok(Some(v));
    }
    if let Some(v) = spatial::call(&key, args)? {
        return Ok(Some(v));
    }
    if let Some(v) = apoc::call(&key, args)? {
        return Ok(Some(v));
    }

    let result = match key.as_str() {
        // ---- Identifier / graph-entity introspection ----
        "id" => Some(id(args)?),
        "labels" => Some(labels(args)?),
        "type" => Some(rel_type(args)?),
        "properties" => Some(properties(args)?),
        "keys" => Some(keys(args)?),
        "startnode" => Some(start_node(args)?),
        "endnode" => Some(end_node(args)?),
        "nodes" => Some(path_nodes(args)?),
        "relationships" => Some(path_relationships(args)?),
        "length" => Some(length(args)?),
        "randomuuid" => Some(Value::String(random_uuid())),
        "coalesce" => Some(coalesce(args)),

        // ---- Type coercion ----
        "tointeger" => Some(to_integer(args)?),
        "tofloat" => Some(to_float(args)?),
        "tostring" => Some(to_string_fn(args)),
        "toboolean" => Some(to_boolean(args)?),

        // ---- Scalar math ----
        "abs" => Some(numeric1(args, f64::abs, i64::abs)?),
        "ceil" => Some(Value::Float(req_float(args, 0)?.ceil())),
        "floor" => Some(Value::Float(req_float(args, 0)?.floor())),
        "round" => Some(Value::Float(req_float(args, 0)?.round())),
        "sign" => Some(Value::Int(req_float(args, 0)?.signum() as i64)),
        "sqrt" => Some(Value::Float(req_float(args, 0)?.sqrt())),
        "sin" => Some(Value::Float(req_float(args, 0)?.sin())),
        "cos" => Some(Value::Float(req_float(args, 0)?.cos())),
        "tan" => Some(Value::Float(req_float(args, 0)?.tan())),
        "exp" => Some(Value::Float(req_float(args, 0)?.exp())),
        "log" => Some(Value::Float(req_float(args, 0)?.ln())),
        "log10" => Some(Value::Float(req_float(args, 0)?.log10())),
        "asin" => Some(Value::Float(req_float(args, 0)?.asin())),
        "acos" => Some(Value::Float(req_float(args, 0)?.acos())),
        "atan" => Some(Value::Float(req_float(args, 0)?.atan())),
        "atan2" => Some(Value::Float(req_float(args, 0)?.atan2(req_float(args, 1)?))),
        "pi" => Some(Value::Float(std::f64::consts::PI)),
        "e" => Some(Value::Float(std::f64::consts::E)),
        "rand" => Some(Value::Float(rand::random::<f64>())),

        // ---- Strings ----
        "toupper" => Some(Value::String(req_str(args, 0)?.to_uppercase())),
        "tolower" => Some(Value::String(req_str(args, 0)?.to_lowercase())),
        "trim" => Some(Value::String(req_str(args, 0)?.trim().to_string())),
        "ltrim" => Some(Value::String(req_str(args, 0)?.trim_start().to_string())),
        "rtrim" => Some(Value::String(req_str(args, 0)?.trim_end().to_string())),
        "reverse" => Some(reverse(args)?),
        "split" => Some(split(args)?),
        "replace" => Some(Value::String(req_str(args, 0)?.replace(&req_str(args, 1)?, &req_str(args, 2)?))),
        "substring" => Some(substring(args)?),
        "left" => Some(left(args)?),
        "right" => Some(right(args)?),
        "lpad" => Some(lpad(args)?),
        "rpad" => Some(rpad(args)?),
        "format" => Some(format_fn(args)?),

        // ---- Lists ----
        "size" => Some(size(args)?),
        "head" => Some(head(args)?),
        "last" => Some(last(args)?),
        "tail" => Some(tail(args)?),
        "range" => Some(range(args)?),

        // ---- Maps ----
        "values" => Some(values(args)?),

        _ => None,
    };
    Ok(result)
}

// ============================================================================
// Identifier / graph introspection
// ============================================================================

fn id(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Node(n)) => Ok(Value::Int(n.id.0 as i64)),
        Some(Value::Relationship(r)) => Ok(Value::Int(r.id.0 as i64)),
        Some(Value::Null) => Ok(Value::Null),
        other => Err(Error::TypeError { expected: "Node or Relationship".into(), got: type_of(other) }),
    }
}

fn labels(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Node(n)) => Ok(Value::List(n.labels.iter().cloned().map(Value::String).collect())),
        Some(Value::Null) => Ok(Value::Null),
        other => Err(Error::TypeError { expected: "Node".into(), got: type_of(other) }),
    }
}

fn rel_type(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Relationship(r)) => Ok(Value::String(r.rel_type.clone())),
        Some(Value::Null) => Ok(Value::Null),
        other => Err(Error::TypeError { expected: "Relationship".into(), got: type_of(other) }),
    }
}

fn properties(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Node(n)) => Ok(Value::Map(n.properties.clone())),
        Some(Value::Relationship(r)) => Ok(Value::Map(r.properties.clone())),
        Some(Value::Map(m)) => Ok(Value::Map(m.clone())),
        Some(Value::Null) => Ok(Value::Null),
        other => Err(Error::TypeError { expected: "Node, Relationship, or Map".into(), got: type_of(other) }),
    }
}

fn keys(args: &[Value]) -> Result<Value> {
    let map = properties(args)?;
    match map {
        Value::Map(m) => Ok(Value::List(m.keys().cloned().map(Value::String).collect())),
        Value::Null => Ok(Value::Null),
        _ => unreachable!("properties() always yields Map or Null"),
    }
}

fn values(args: &[Value]) -> Result<Value> {
    let map = properties(args)?;
    match map {
        Value::Map(m) => Ok(Value::List(m.values().cloned().collect())),
        Value::Null => Ok(Value::Null),
        _ => unreachable!("properties() always yields Map or Null"),
    }
}

fn start_node(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Path(p)) => Ok(Value::Node(Box::new(p.start().clone()))),
        other => Err(Error::TypeError { expected: "Path".into(), got: type_of(other) }),
    }
}

fn end_node(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Path(p)) => Ok(Value::Node(Box::new(p.end().clone()))),
        other => Err(Error::TypeError { expected: "Path".into(), got: type_of(other) }),
    }
}

fn path_nodes(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Path(p)) => Ok(Value::List(p.nodes.iter().cloned().map(|n| Value::Node(Box::new(n))).collect())),
        other => Err(Error::TypeError { expected: "Path".into(), got: type_of(other) }),
    }
}

fn path_relationships(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Path(p)) => Ok(Value::List(p.relationships.iter().cloned().map(|r| Value::Relationship(Box::new(r))).collect())),
        other => Err(Error::TypeError { expected: "Path".into(), got: type_of(other) }),
    }
}

fn path_length(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Path(p)) => Ok(Value::Int(p.relationships.len() as i64)),
        other => Err(Error::TypeError { expected: "Path".into(), got: type_of(other) }),
    }
}

/// `length()` is overloaded: a `Path` yields its edge count, while a
/// `String`/`List`/`Map` yields the same count `size()` would.
fn length(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Path(_)) => path_length(args),
        Some(Value::String(_) | Value::List(_) | Value::Map(_) | Value::Null) => size(args),
        other => Err(Error::TypeError { expected: "Path, String, List, or Map".into(), got: type_of(other) }),
    }
}

fn random_uuid() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

fn coalesce(args: &[Value]) -> Value {
    args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)
}

// ============================================================================
// Type coercion
// ============================================================================

fn to_integer(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Null) => Ok(Value::Null),
        Some(Value::Int(i)) => Ok(Value::Int(*i)),
        Some(Value::Float(f)) => Ok(Value::Int(f.trunc() as i64)),
        Some(Value::String(s)) => Ok(s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null)),
        Some(Value::Bool(b)) => Ok(Value::Int(if *b { 1 } else { 0 })),
        other => Err(Error::TypeError { expected: "Integer-coercible value".into(), got: type_of(other) }),
    }
}

fn to_float(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Null) => Ok(Value::Null),
        Some(Value::Float(f)) => Ok(Value::Float(*f)),
        Some(Value::Int(i)) => Ok(Value::Float(*i as f64)),
        Some(Value::String(s)) => Ok(s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null)),
        other => Err(Error::TypeError { expected: "Float-coercible value".into(), got: type_of(other) }),
    }
}

fn to_string_fn(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Null) | None => Value::Null,
        Some(v) => Value::String(v.to_string()),
    }
}

fn to_boolean(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Null) => Ok(Value::Null),
        Some(Value::Bool(b)) => Ok(Value::Bool(*b)),
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Ok(Value::Null),
        },
        other => Err(Error::TypeError { expected: "Boolean-coercible value".into(), got: type_of(other) }),
    }
}

// ============================================================================
// Scalar math
// ============================================================================

fn numeric1(args: &[Value], float_op: fn(f64) -> f64, int_op: fn(i64) -> i64) -> Result<Value> {
    match args.first() {
        Some(Value::Int(i)) => Ok(Value::Int(int_op(*i))),
        Some(Value::Float(f)) => Ok(Value::Float(float_op(*f))),
        other => Err(Error::TypeError { expected: "Numeric".into(), got: type_of(other) }),
    }
}

fn req_float(args: &[Value], idx: usize) -> Result<f64> {
    args.get(idx)
        .and_then(Value::as_float)
        .ok_or_else(|| Error::TypeError { expected: "Numeric".into(), got: type_of(args.get(idx)) })
}

fn req_str(args: &[Value], idx: usize) -> Result<String> {
    args.get(idx)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::TypeError { expected: "String".into(), got: type_of(args.get(idx)) })
}

// ============================================================================
// Strings
// ============================================================================

fn reverse(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::String(s)) => Ok(Value::String(s.chars().rev().collect())),
        Some(Value::List(l)) => {
            let mut out = l.clone();
            out.reverse();
            Ok(Value::List(out))
        }
        other => Err(Error::TypeError { expected: "String or List".into(), got: type_of(other) }),
    }
}

fn split(args: &[Value]) -> Result<Value> {
    let s = req_str(args, 0)?;
    let delim = req_str(args, 1)?;
    Ok(Value::List(s.split(delim.as_str()).map(|p| Value::String(p.to_string())).collect()))
}

fn substring(args: &[Value]) -> Result<Value> {
    let s = req_str(args, 0)?;
    let start = args.get(1).and_then(Value::as_int).unwrap_or(0).max(0) as usize;
    let chars: Vec<char> = s.chars().collect();
    let end = match args.get(2).and_then(Value::as_int) {
        Some(len) => (start + len.max(0) as usize).min(chars.len()),
        None => chars.len(),
    };
    if start >= chars.len() {
        return Ok(Value::String(String::new()));
    }
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn left(args: &[Value]) -> Result<Value> {
    let s = req_str(args, 0)?;
    let n = args.get(1).and_then(Value::as_int).unwrap_or(0).max(0) as usize;
    Ok(Value::String(s.chars().take(n).collect()))
}

fn right(args: &[Value]) -> Result<Value> {
    let s = req_str(args, 0)?;
    let n = args.get(1).and_then(Value::as_int).unwrap_or(0).max(0) as usize;
    let chars: Vec<char> = s.chars().collect();
    let start = chars.len().saturating_sub(n);
    Ok(Value::String(chars[start..].iter().collect()))
}

fn lpad(args: &[Value]) -> Result<Value> {
    let s = req_str(args, 0)?;
    let target_len = args.get(1).and_then(Value::as_int).unwrap_or(0).max(0) as usize;
    let filler = args.get(2).and_then(Value::as_str).unwrap_or(" ");
    Ok(Value::String(pad(&s, target_len, filler, true)))
}

fn rpad(args: &[Value]) -> Result<Value> {
    let s = req_str(args, 0)?;
    let target_len = args.get(1).and_then(Value::as_int).unwrap_or(0).max(0) as usize;
    let filler = args.get(2).and_then(Value::as_str).unwrap_or(" ");
    Ok(Value::String(pad(&s, target_len, filler, false)))
}

fn pad(s: &str, target_len: usize, filler: &str, left: bool) -> String {
    let current_len = s.chars().count();
    if current_len >= target_len || filler.is_empty() {
        return s.to_string();
    }
    let needed = target_len - current_len;
    let filler_chars: Vec<char> = filler.chars().collect();
    let padding: String = (0..needed).map(|i| filler_chars[i % filler_chars.len()]).collect();
    if left { format!("{padding}{s}") } else { format!("{s}{padding}") }
}

/// A deliberately small subset of Neo4j's `format()`: `%s`, `%d`, and `%f`
/// placeholders consumed left to right against the remaining arguments.
fn format_fn(args: &[Value]) -> Result<Value> {
    let template = req_str(args, 0)?;
    let mut rest = args.get(1..).unwrap_or(&[]).iter();
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => out.push_str(&rest.next().map(|v| v.to_string()).unwrap_or_default()),
            Some('d') => out.push_str(&rest.next().and_then(Value::as_int).map(|i| i.to_string()).unwrap_or_default()),
            Some('f') => out.push_str(&rest.next().and_then(Value::as_float).map(|f| f.to_string()).unwrap_or_default()),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    Ok(Value::String(out))
}

// ============================================================================
// Lists
// ============================================================================

fn size(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::List(l)) => Ok(Value::Int(l.len() as i64)),
        Some(Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
        Some(Value::Map(m)) => Ok(Value::Int(m.len() as i64)),
        Some(Value::Null) => Ok(Value::Null),
        other => Err(Error::TypeError { expected: "List, String, or Map".into(), got: type_of(other) }),
    }
}

fn head(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::List(l)) => Ok(l.first().cloned().unwrap_or(Value::Null)),
        Some(Value::Null) => Ok(Value::Null),
        other => Err(Error::TypeError { expected: "List".into(), got: type_of(other) }),
    }
}

fn last(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::List(l)) => Ok(l.last().cloned().unwrap_or(Value::Null)),
        Some(Value::Null) => Ok(Value::Null),
        other => Err(Error::TypeError { expected: "List".into(), got: type_of(other) }),
    }
}

fn tail(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::List(l)) => Ok(Value::List(l.iter().skip(1).cloned().collect())),
        Some(Value::Null) => Ok(Value::Null),
        other => Err(Error::TypeError { expected: "List".into(), got: type_of(other) }),
    }
}

fn range(args: &[Value]) -> Result<Value> {
    let start = args.first().and_then(Value::as_int).ok_or_else(|| Error::ArgumentError("range() requires an integer start".into()))?;
    let end = args.get(1).and_then(Value::as_int).ok_or_else(|| Error::ArgumentError("range() requires an integer end".into()))?;
    let step = args.get(2).and_then(Value::as_int).unwrap_or(1);
    if step == 0 {
        return Err(Error::ArgumentError("range() step must not be zero".into()));
    }
    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i <= end {
            out.push(Value::Int(i));
            i += step;
        }
    } else {
        while i >= end {
            out.push(Value::Int(i));
            i += step;
        }
    }
    Ok(Value::List(out))
}

fn type_of(v: Option<&Value>) -> String {
    v.map(|v| v.type_name().to_string()).unwrap_or_else(|| "nothing".into())
}

// ============================================================================
// apoc.* namespace
// ============================================================================

mod apoc {
    use super::*;

    pub fn call(name: &str, args: &[Value]) -> Result<Option<Value>> {
        let result = match name {
            "apoc.create.uuid" => Some(Value::String(random_uuid())),
            "apoc.meta.type" => Some(Value::String(args.first().map(Value::apoc_type_name).unwrap_or("NULL").to_string())),
            "apoc.meta.istype" => Some(is_type(args)?),
            "apoc.coll.toset" => Some(to_set(args)?),
            "apoc.coll.flatten" => Some(flatten(args)?),
            "apoc.coll.sum" => Some(coll_sum(args)?),
            "apoc.coll.avg" => Some(coll_avg(args)?),
            "apoc.coll.min" => Some(coll_min(args)?),
            "apoc.coll.max" => Some(coll_max(args)?),
            "apoc.text.join" => Some(text_join(args)?),
            "apoc.map.merge" => Some(map_merge(args)?),
            "apoc.map.frompairs" => Some(map_from_pairs(args)?),
            "apoc.map.fromlists" => Some(map_from_lists(args)?),
            "apoc.convert.tojson" => Some(to_json(args)?),
            "apoc.convert.fromjsonmap" => Some(from_json_map(args)?),
            "apoc.convert.fromjsonlist" => Some(from_json_list(args)?),
            _ => None,
        };
        Ok(result)
    }

    fn is_type(args: &[Value]) -> Result<Value> {
        let val = args.first().ok_or_else(|| Error::ArgumentError("apoc.meta.isType requires a value".into()))?;
        let expected = req_str(args, 1)?;
        Ok(Value::Bool(val.apoc_type_name().eq_ignore_ascii_case(&expected)))
    }

    /// First-occurrence-order dedup, matching S6's expectation that
    /// `toSet` is idempotent and insertion-order-preserving.
    fn to_set(args: &[Value]) -> Result<Value> {
        match args.first() {
            Some(Value::List(l)) => {
                let mut seen: Vec<Value> = Vec::new();
                for v in l {
                    if !seen.iter().any(|s| s.loose_eq(v) == Some(true)) {
                        seen.push(v.clone());
                    }
                }
                Ok(Value::List(seen))
            }
            other => Err(Error::TypeError { expected: "List".into(), got: type_of(other) }),
        }
    }

    fn flatten(args: &[Value]) -> Result<Value> {
        match args.first() {
            Some(Value::List(l)) => {
                let mut out = Vec::new();
                for v in l {
                    match v {
                        Value::List(inner) => out.extend(inner.iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Ok(Value::List(out))
            }
            other => Err(Error::TypeError { expected: "List".into(), got: type_of(other) }),
        }
    }

    fn coll_sum(args: &[Value]) -> Result<Value> {
        let l = list_of(args)?;
        let mut is_float = false;
        let mut sum = 0.0;
        for v in l {
            match v {
                Value::Int(i) => sum += i as f64,
                Value::Float(f) => {
                    is_float = true;
                    sum += f;
                }
                other => return Err(Error::TypeError { expected: "Numeric".into(), got: other.type_name().into() }),
            }
        }
        Ok(if is_float { Value::Float(sum) } else { Value::Int(sum as i64) })
    }

    fn coll_avg(args: &[Value]) -> Result<Value> {
        let l = list_of(args)?;
        if l.is_empty() {
            return Ok(Value::Null);
        }
        let sum: f64 = l.iter().filter_map(Value::as_float).sum();
        Ok(Value::Float(sum / l.len() as f64))
    }

    fn coll_min(args: &[Value]) -> Result<Value> {
        let l = list_of(args)?;
        Ok(l.iter().min_by(|a, b| a.order_by_cmp(b)).cloned().unwrap_or(Value::Null))
    }

    fn coll_max(args: &[Value]) -> Result<Value> {
        let l = list_of(args)?;
        Ok(l.iter().max_by(|a, b| a.order_by_cmp(b)).cloned().unwrap_or(Value::Null))
    }

    fn list_of(args: &[Value]) -> Result<Vec<Value>> {
        match args.first() {
            Some(Value::List(l)) => Ok(l.clone()),
            other => Err(Error::TypeError { expected: "List".into(), got: type_of(other) }),
        }
    }

    fn text_join(args: &[Value]) -> Result<Value> {
        let l = list_of(args)?;
        let delim = args.get(1).and_then(Value::as_str).unwrap_or("");
        Ok(Value::String(l.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(delim)))
    }

    fn map_merge(args: &[Value]) -> Result<Value> {
        let mut out = PropertyMap::new();
        for arg in args {
            if let Value::Map(m) = arg {
                for (k, v) in m {
                    out.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(Value::Map(out))
    }

    fn map_from_pairs(args: &[Value]) -> Result<Value> {
        let pairs = list_of(args)?;
        let mut out = PropertyMap::new();
        for pair in pairs {
            if let Value::List(kv) = pair {
                if kv.len() == 2 {
                    if let Value::String(k) = &kv[0] {
                        out.insert(k.clone(), kv[1].clone());
                    }
                }
            }
        }
        Ok(Value::Map(out))
    }

    /// `apoc.map.fromLists(['a','b'], [1,2])` -> `{a: 1, b: 2}`. Excess
    /// entries on the longer list are dropped, matching the zip semantics
    /// of the original procedure.
    fn map_from_lists(args: &[Value]) -> Result<Value> {
        let keys = list_of(args)?;
        let values = match args.get(1) {
            Some(Value::List(l)) => l.clone(),
            other => return Err(Error::TypeError { expected: "List".into(), got: type_of(other) }),
        };
        let mut out = PropertyMap::new();
        for (k, v) in keys.into_iter().zip(values) {
            if let Value::String(k) = k {
                out.insert(k, v);
            }
        }
        Ok(Value::Map(out))
    }

    /// `apoc.convert.toJson`: only plain data (`Null`/`Bool`/`Int`/`Float`/
    /// `String`/`List`/`Map`) has a faithful JSON shape; graph entities and
    /// temporal/spatial values aren't representable without losing type
    /// information, so they're rejected rather than silently mangled.
    fn to_json(args: &[Value]) -> Result<Value> {
        let json = value_to_json(args.first().unwrap_or(&Value::Null))?;
        Ok(Value::String(json.to_string()))
    }

    fn value_to_json(v: &Value) -> Result<serde_json::Value> {
        Ok(match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(l) => serde_json::Value::Array(l.iter().map(value_to_json).collect::<Result<_>>()?),
            Value::Map(m) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in m {
                    obj.insert(k.clone(), value_to_json(v)?);
                }
                serde_json::Value::Object(obj)
            }
            other => return Err(Error::TypeError { expected: "JSON-representable value".into(), got: other.type_name().into() }),
        })
    }

    fn json_to_value(j: &serde_json::Value) -> Value {
        match j {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(a) => Value::List(a.iter().map(json_to_value).collect()),
            serde_json::Value::Object(o) => {
                let mut out = PropertyMap::new();
                for (k, v) in o {
                    out.insert(k.clone(), json_to_value(v));
                }
                Value::Map(out)
            }
        }
    }

    fn from_json_map(args: &[Value]) -> Result<Value> {
        let text = req_str(args, 0)?;
        let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| Error::ArgumentError(format!("invalid JSON: {e}")))?;
        match json_to_value(&parsed) {
            m @ Value::Map(_) => Ok(m),
            _ => Err(Error::ArgumentError("apoc.convert.fromJsonMap requires a JSON object".into())),
        }
    }

    fn from_json_list(args: &[Value]) -> Result<Value> {
        let text = req_str(args, 0)?;
        let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| Error::ArgumentError(format!("invalid JSON: {e}")))?;
        match json_to_value(&parsed) {
            l @ Value::List(_) => Ok(l),
            _ => Err(Error::ArgumentError("apoc.convert.fromJsonList requires a JSON array".into())),
        }
    }
}
