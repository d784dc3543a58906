//! Query Analyzer (§4.A): classifies raw query text into a `QueryInfo` —
//! read/write/schema/compound predicates, the first clause keyword, and the
//! labels it references — by a case-insensitive, word-boundary-respecting,
//! quote-aware keyword scan. No parsing happens here; the AST is built
//! lazily, on demand, from the *substituted* text.
//!
//! Classification is conservative: a predicate ORs together every way its
//! clause could be spelled, so false positives (treating a read as a write)
//! are possible but false negatives are not. The output routes and caches;
//! it is never used for access control.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::cypher::ast::Statement;
use crate::cypher::lexer::quoted_spans;
use crate::Result;

const CLAUSE_KEYWORDS: &[&str] = &[
    "MATCH", "OPTIONAL", "CREATE", "MERGE", "SET", "REMOVE", "DELETE", "DETACH", "WITH", "RETURN",
    "UNWIND", "CALL", "SHOW", "DROP",
];

/// Classification of a single query text, immutable after construction
/// except for the lazily-populated AST slot.
pub struct QueryInfo {
    pub is_write: bool,
    pub is_schema: bool,
    pub is_read_only: bool,
    pub is_compound: bool,
    pub first_clause: Option<String>,
    pub labels: Vec<String>,
    pub raw: String,
    pub normalised: String,
    ast_slot: RwLock<Option<(String, Arc<Statement>)>>,
}

impl QueryInfo {
    fn analyze(raw: &str) -> Self {
        let normalised = normalise(raw);
        let spans = quoted_spans(&normalised);

        let has = |kw: &str| contains_keyword(&normalised, &spans, kw);

        let is_write = has("CREATE") || has("MERGE") || has("DELETE") || has("SET") || has("REMOVE");

        let first_clause = CLAUSE_KEYWORDS
            .iter()
            .filter_map(|kw| find_keyword(&normalised, &spans, kw).map(|pos| (pos, *kw)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, kw)| kw.to_string());

        let is_schema = (has("CREATE") && (has("INDEX") || has("CONSTRAINT")))
            || (has("DROP") && (has("INDEX") || has("CONSTRAINT")))
            || first_clause.as_deref() == Some("SHOW");

        let is_read_only = !is_write
            && !is_schema
            && (has("MATCH") || has("RETURN") || has("SHOW") || (has("CALL") && contains_substring(&normalised, &spans, "db.")));

        let compound_count = ["MATCH", "CREATE", "MERGE", "DELETE"].iter().filter(|kw| has(kw)).count();
        let is_compound = compound_count > 1;

        let labels = extract_labels(&normalised, &spans);

        Self {
            is_write,
            is_schema,
            is_read_only,
            is_compound,
            first_clause,
            labels,
            raw: raw.to_string(),
            normalised,
            ast_slot: RwLock::new(None),
        }
    }

    /// Parse (or reuse the cached parse of) `substituted` text into an AST.
    /// Double-checked: a read-lock hit avoids the parser entirely; a miss
    /// (or a cache entry for different substituted text — distinct
    /// parameter values reuse this same `QueryInfo`) reparses under the
    /// write lock and replaces the slot.
    pub fn ast(&self, substituted: &str) -> Result<Arc<Statement>> {
        if let Some((text, parsed)) = self.ast_slot.read().as_ref() {
            if text == substituted {
                return Ok(parsed.clone());
            }
        }
        let mut slot = self.ast_slot.write();
        if let Some((text, parsed)) = slot.as_ref() {
            if text == substituted {
                return Ok(parsed.clone());
            }
        }
        let parsed = Arc::new(crate::cypher::parse(substituted)?);
        *slot = Some((substituted.to_string(), parsed.clone()));
        Ok(parsed)
    }
}

/// FIFO-bounded cache from normalised query text to its `QueryInfo`.
pub struct AnalysisCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    order: VecDeque<String>,
    entries: std::collections::HashMap<String, Arc<QueryInfo>>,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner { order: VecDeque::new(), entries: std::collections::HashMap::new() }),
        }
    }

    pub fn analyze(&self, query: &str) -> Result<Arc<QueryInfo>> {
        let key = normalise(query);
        {
            let inner = self.inner.lock();
            if let Some(info) = inner.entries.get(&key) {
                tracing::trace!(%key, "analysis cache hit");
                return Ok(info.clone());
            }
        }

        let info = Arc::new(QueryInfo::analyze(query));
        let mut inner = self.inner.lock();
        if inner.entries.len() >= self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
                tracing::debug!(evicted = %evicted, "analysis cache eviction");
            }
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(key, info.clone());
        tracing::debug!(is_write = info.is_write, is_schema = info.is_schema, "analysis cache insert");
        Ok(info)
    }
}

// ============================================================================
// Keyword scanning
// ============================================================================

fn normalise(raw: &str) -> String {
    let spans = quoted_spans(raw);
    let mut out = String::with_capacity(raw.len());
    let mut prev_was_space = false;
    for (i, c) in raw.char_indices() {
        let in_literal = spans.iter().any(|&(s, e)| i >= s && i < e);
        if !in_literal && c.is_whitespace() {
            if !prev_was_space {
                out.push(' ');
            }
            prev_was_space = true;
        } else {
            out.push(c);
            prev_was_space = false;
        }
    }
    out.trim().to_string()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn find_keyword(text: &str, spans: &[(usize, usize)], keyword: &str) -> Option<usize> {
    let upper = text.to_ascii_uppercase();
    let kw = keyword.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let mut start = 0;
    while let Some(rel) = upper[start..].find(&kw) {
        let idx = start + rel;
        let end = idx + kw.len();
        let in_literal = spans.iter().any(|&(s, e)| idx >= s && idx < e);
        if !in_literal {
            let left_ok = idx == 0 || {
                let prev = bytes[idx - 1] as char;
                !is_ident_char(prev) && prev != ':'
            };
            let right_ok = end >= bytes.len() || !is_ident_char(bytes[end] as char);
            if left_ok && right_ok {
                return Some(idx);
            }
        }
        start = idx + 1;
    }
    None
}

fn contains_keyword(text: &str, spans: &[(usize, usize)], keyword: &str) -> bool {
    find_keyword(text, spans, keyword).is_some()
}

fn contains_substring(text: &str, spans: &[(usize, usize)], needle: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    let needle = needle.to_ascii_uppercase();
    let mut start = 0;
    while let Some(rel) = upper[start..].find(&needle) {
        let idx = start + rel;
        if !spans.iter().any(|&(s, e)| idx >= s && idx < e) {
            return true;
        }
        start = idx + 1;
    }
    false
}

/// Labels/relationship-types referenced by the query: a `:Ident` token
/// outside any quoted literal and outside property-map braces (map keys are
/// also `ident:`, but they live inside `{...}`; pattern labels/types never
/// do).
fn extract_labels(text: &str, spans: &[(usize, usize)]) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut labels = Vec::new();
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        if spans.iter().any(|&(s, e)| i >= s && i < e) {
            i += 1;
            continue;
        }
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
            }
            b':' if depth == 0 => {
                let mut j = i + 1;
                while j < bytes.len() && is_ident_char(bytes[j] as char) {
                    j += 1;
                }
                if j > i + 1 {
                    let label = &text[i + 1..j];
                    if !labels.iter().any(|l: &String| l == label) {
                        labels.push(label.to_string());
                    }
                }
                i = j;
            }
            _ => i += 1,
        }
    }
    labels
}
