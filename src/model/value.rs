//! The universal dynamic value type that crosses every boundary in the
//! executor: parameters in, row bindings in the pipeline, and result cells
//! out.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Node, Relationship, Path, PropertyMap};

/// A Cypher value.
///
/// Covers scalars, the two containers (`List`, `Map`), the three graph types
/// (`Node`, `Relationship`, `Path`), the temporal family, and spatial points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(PropertyMap),

    Node(Box<Node>),
    Relationship(Box<Relationship>),
    Path(Box<Path>),

    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    LocalDateTime(NaiveDateTime),
    Duration(Duration),

    Point2D { srid: i32, x: f64, y: f64 },
    Point3D { srid: i32, x: f64, y: f64, z: f64 },
}

/// An ISO-8601 duration that preserves component identity: `P1M` is not
/// normalized into `P30D`, but arithmetic with dates/times needs a single
/// scalar, so the type also exposes lossy day/second projections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Duration {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub nanos: i32,
}

impl Duration {
    pub const ZERO: Duration = Duration {
        years: 0, months: 0, days: 0, hours: 0, minutes: 0, seconds: 0, nanos: 0,
    };

    pub fn from_days(days: i64) -> Self {
        Duration { days, ..Duration::ZERO }
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Duration { seconds, ..Duration::ZERO }
    }

    /// Total whole calendar months (years folded in). Used to shift `Date`s.
    pub fn total_months(&self) -> i64 {
        self.years * 12 + self.months
    }

    /// Project everything but years/months onto seconds — used for
    /// `DateTime`/`Duration` arithmetic where the precise calendar length of
    /// years and months isn't resolvable without an anchor date.
    pub fn to_seconds_approx(&self) -> i64 {
        self.days * 86_400 + self.hours * 3_600 + self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P")?;
        if self.years != 0 { write!(f, "{}Y", self.years)?; }
        if self.months != 0 { write!(f, "{}M", self.months)?; }
        if self.days != 0 { write!(f, "{}D", self.days)?; }
        if self.hours != 0 || self.minutes != 0 || self.seconds != 0 || self.nanos != 0 {
            write!(f, "T")?;
            if self.hours != 0 { write!(f, "{}H", self.hours)?; }
            if self.minutes != 0 { write!(f, "{}M", self.minutes)?; }
            if self.seconds != 0 || self.nanos != 0 {
                if self.nanos != 0 {
                    write!(f, "{}.{:09}S", self.seconds, self.nanos.unsigned_abs())?;
                } else {
                    write!(f, "{}S", self.seconds)?;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::String(_) => "STRING",
            Value::List(_) => "LIST",
            Value::Map(_) => "MAP",
            Value::Node(_) => "NODE",
            Value::Relationship(_) => "RELATIONSHIP",
            Value::Path(_) => "PATH",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::DateTime(_) => "DATETIME",
            Value::LocalDateTime(_) => "LOCAL_DATETIME",
            Value::Duration(_) => "DURATION",
            Value::Point2D { .. } => "POINT",
            Value::Point3D { .. } => "POINT",
        }
    }

    /// Name as reported by `apoc.meta.type`/`apoc.meta.isType`.
    pub fn apoc_type_name(&self) -> &'static str {
        match self {
            Value::DateTime(_) | Value::LocalDateTime(_) => "DATETIME",
            other => other.type_name(),
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }
    pub fn is_numeric(&self) -> bool { matches!(self, Value::Int(_) | Value::Float(_)) }
    pub fn is_string(&self) -> bool { matches!(self, Value::String(_)) }

    /// Cypher truthiness: everything but `Null` and `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self { Value::List(v.into_iter().map(Into::into).collect()) }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Null) }
}

// ============================================================================
// Display — also backs toString() and result rendering
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Node(n) => write!(f, "{n:?}"),
            Value::Relationship(r) => write!(f, "{r:?}"),
            Value::Path(p) => write!(f, "{p:?}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::DateTime(dt) => write!(f, "{dt}"),
            Value::LocalDateTime(dt) => write!(f, "{dt}"),
            Value::Duration(d) => write!(f, "{d}"),
            Value::Point2D { x, y, srid } => write!(f, "point({{srid: {srid}, x: {x}, y: {y}}})"),
            Value::Point3D { x, y, z, srid } => write!(f, "point({{srid: {srid}, x: {x}, y: {y}, z: {z}}})"),
        }
    }
}

// ============================================================================
// Comparison (Cypher ordering rules, §4.F)
// ============================================================================

impl Value {
    /// Cypher comparison. `None` means "incomparable" (propagates to `Null`
    /// at the call site) — including `NULL` compared with anything, which is
    /// always `NULL` under three-valued logic.
    pub fn cypher_cmp(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Ordering used by `ORDER BY`: `Null` sorts after everything else when
    /// ascending (§4.D).
    pub fn order_by_cmp(&self, other: &Value) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            _ => self.cypher_cmp(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Equality between a number and a string: true iff their canonical
    /// string forms match (§4.F).
    pub fn loose_eq(&self, other: &Value) -> Option<bool> {
        if self.is_null() || other.is_null() {
            return None;
        }
        if self.type_name() != other.type_name() {
            return Some(self.to_string() == other.to_string());
        }
        Some(self == other || self.cypher_cmp(other) == Some(std::cmp::Ordering::Equal))
    }
}
