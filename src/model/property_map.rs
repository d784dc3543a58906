//! PropertyMap — the key-value store on nodes and relationships.
//!
//! Backed by `IndexMap` rather than `HashMap`: property maps surface as
//! `Value::Map` to Cypher code (`properties(n)`, `n{.*}`, map literals) and
//! the data model requires insertion order to be preserved there, so there is
//! only one map type in the whole crate rather than a hash map for storage
//! and a second ordered map for values.

use indexmap::IndexMap;
use super::Value;

/// A map of property names to values. Insertion order is preserved.
pub type PropertyMap = IndexMap<String, Value>;

/// Convert iterator of (key, value) pairs into a PropertyMap.
impl<K, V> From<Vec<(K, V)>> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
