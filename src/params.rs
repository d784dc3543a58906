//! Parameter substitution (§4.B): replaces `$name` occurrences in normalised
//! query text with the Cypher-literal encoding of the supplied value, before
//! the result is handed to the fast-path router or the parser.
//!
//! Purely textual — the executor relies on the parser to re-tokenise the
//! substituted string. Occurrences inside string literals are left alone.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cypher::lexer::quoted_spans;
use crate::model::{Duration, PropertyMap, Value};
use crate::{Error, Result};

static PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[A-Za-z_][A-Za-z0-9_]*").unwrap());

/// Substitute every `$name` in `normalised` with `params["name"]`'s Cypher
/// literal form. Names absent from `params` are left untouched.
pub fn substitute(normalised: &str, params: &PropertyMap) -> Result<String> {
    let literal_spans = quoted_spans(normalised);
    let mut out = String::with_capacity(normalised.len());
    let mut last = 0;

    for m in PARAM_RE.find_iter(normalised) {
        if literal_spans.iter().any(|&(s, e)| m.start() >= s && m.end() <= e) {
            continue;
        }
        let name = &m.as_str()[1..];
        match params.get(name) {
            Some(value) => {
                out.push_str(&normalised[last..m.start()]);
                encode(value, &mut out)?;
                last = m.end();
            }
            None => {
                tracing::trace!(name, "parameter not supplied, left unsubstituted");
            }
        }
    }
    out.push_str(&normalised[last..]);
    Ok(out)
}

/// Encode `value` as Cypher literal text that re-parses back to an
/// equivalent `Value` (§8 invariant #2). Temporal and spatial values round
/// -trip through the same constructor functions (`date(...)`, `point(...)`,
/// etc.) that produce them; graph entities have no literal form in Cypher
/// and are rejected rather than silently flattened to a string.
fn encode(value: &Value, out: &mut String) -> Result<()> {
    use std::fmt::Write;
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => {
            let _ = write!(out, "{f}");
        }
        Value::String(s) => encode_string(s, out),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                encode(item, out)?;
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if is_identifier(k) {
                    out.push_str(k);
                } else {
                    encode_string(k, out);
                }
                out.push_str(": ");
                encode(v, out)?;
            }
            out.push('}');
        }
        Value::Date(d) => {
            let _ = write!(out, "date('{}')", d.format("%Y-%m-%d"));
        }
        Value::Time(t) => {
            let _ = write!(out, "time('{}')", t.format("%H:%M:%S%.f"));
        }
        Value::DateTime(dt) => {
            let _ = write!(out, "datetime('{}')", dt.to_rfc3339());
        }
        Value::LocalDateTime(dt) => {
            let _ = write!(out, "localdatetime('{}')", dt.format("%Y-%m-%dT%H:%M:%S%.f"));
        }
        Value::Duration(d) => {
            let _ = write!(out, "duration('{d}')");
        }
        Value::Point2D { srid, x, y } => {
            let _ = write!(out, "point({{srid: {srid}, x: {x}, y: {y}}})");
        }
        Value::Point3D { srid, x, y, z } => {
            let _ = write!(out, "point({{srid: {srid}, x: {x}, y: {y}, z: {z}}})");
        }
        // Graph entities are produced by the executor, not passed in as
        // query parameters; Cypher has no literal syntax that constructs a
        // Node/Relationship/Path, so stringifying one would silently lose
        // its type on re-parse. Reject rather than corrupt the round-trip.
        other @ (Value::Node(_) | Value::Relationship(_) | Value::Path(_)) => {
            return Err(Error::ArgumentError(format!(
                "{} values cannot be substituted as query parameters",
                other.type_name()
            )));
        }
    }
    Ok(())
}

fn encode_string(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('\'');
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
