//! Process-wide, FIFO-bounded cache of compiled regexes for `=~` and the
//! string-matching functions. A pattern that fails to compile is cached as
//! an "always false" marker so a malformed pattern only pays the compile
//! cost once (§4.F: "malformed pattern -> comparison evaluates false").

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

const DEFAULT_CAPACITY: usize = 128;

enum CachedRegex {
    Compiled(Arc<Regex>),
    AlwaysFalse,
}

struct Cache {
    capacity: usize,
    order: VecDeque<String>,
    entries: std::collections::HashMap<String, CachedRegex>,
}

impl Cache {
    fn new(capacity: usize) -> Self {
        Self { capacity, order: VecDeque::new(), entries: std::collections::HashMap::new() }
    }

    fn get_or_compile(&mut self, pattern: &str) -> CachedRegexRef {
        if let Some(entry) = self.entries.get(pattern) {
            return match entry {
                CachedRegex::Compiled(re) => CachedRegexRef::Compiled(re.clone()),
                CachedRegex::AlwaysFalse => CachedRegexRef::AlwaysFalse,
            };
        }

        let (entry, result) = match Regex::new(pattern) {
            Ok(re) => {
                let re = Arc::new(re);
                (CachedRegex::Compiled(re.clone()), CachedRegexRef::Compiled(re))
            }
            Err(_) => (CachedRegex::AlwaysFalse, CachedRegexRef::AlwaysFalse),
        };

        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        self.order.push_back(pattern.to_string());
        self.entries.insert(pattern.to_string(), entry);
        result
    }
}

enum CachedRegexRef {
    Compiled(Arc<Regex>),
    AlwaysFalse,
}

static CACHE: RwLock<Option<Cache>> = RwLock::new(None);

/// Configure the cache's capacity. Called once from [`crate::Graph`]
/// construction; a no-op once the cache already holds entries under a
/// different capacity (the cache is process-wide, not per-`Graph`).
pub fn configure(capacity: usize) {
    let mut guard = CACHE.write();
    if guard.is_none() {
        *guard = Some(Cache::new(capacity));
    }
}

/// True iff `text` matches `pattern`, compiling (and caching) `pattern` on
/// first use. A malformed pattern always returns `false`.
pub fn is_match(pattern: &str, text: &str) -> bool {
    let mut guard = CACHE.write();
    let cache = guard.get_or_insert_with(|| Cache::new(DEFAULT_CAPACITY));
    match cache.get_or_compile(pattern) {
        CachedRegexRef::Compiled(re) => re.is_match(text),
        CachedRegexRef::AlwaysFalse => false,
    }
}
