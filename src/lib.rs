//! # cyform — Embeddable Property Graph Database
//!
//! A Cypher query executor over a pluggable storage backend. The executor
//! owns classification, parameter substitution, fast-path routing, pattern
//! matching and the function library; storage is reduced to a narrow CRUD
//! contract (`StorageBackend`).
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the executor and storage.
//! 2. **Clean DTOs**: `Node`, `Relationship`, `Value` cross every boundary.
//! 3. **Parser owns nothing**: Cypher text -> AST is a pure function.
//! 4. **Every storage call is independently atomic** — no cross-call transactions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cyform::{Graph, Value, PropertyMap};
//!
//! # async fn example() -> cyform::Result<()> {
//! let graph = Graph::open_memory().await?;
//!
//! let mut params = PropertyMap::new();
//! params.insert("name".into(), Value::from("Ada"));
//! let result = graph.execute(
//!     "CREATE (n:Person {name: $name}) RETURN n",
//!     params,
//! ).await?;
//!
//! for row in &result.rows {
//!     println!("{:?}", row.get_value("n"));
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod cypher;
pub mod storage;
pub mod tx;
pub mod index;
pub mod analysis;
pub mod params;
pub mod traversal;
pub mod fastpath;
pub mod functions;
pub mod pipeline;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Relationship, Path, Value, PropertyMap, Duration,
    NodeId, RelId, Direction,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{StorageBackend, BackendCapabilities};

// ============================================================================
// Re-exports: Cancellation
// ============================================================================

pub use tx::CancellationToken;

// ============================================================================
// Re-exports: Pipeline (results)
// ============================================================================

pub use pipeline::{QueryResult, ResultRow, ExecutionStats, FromValue};

// ============================================================================
// Re-exports: Analysis
// ============================================================================

pub use analysis::QueryInfo;

// ============================================================================
// Executor configuration
// ============================================================================

/// Tunables for a [`Graph`]. Cloned cheaply; shared across concurrent
/// `execute` calls on the same graph.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Depth cap for an unbounded variable-length relationship (`*` with no
    /// upper bound). Guards against runaway traversals on cyclic graphs.
    pub max_unbounded_depth: usize,
    /// Capacity of the query-analysis cache (raw query text -> `QueryInfo`).
    pub analysis_cache_size: usize,
    /// Capacity of the compiled-regex cache used by `=~` and string functions.
    pub regex_cache_size: usize,
    /// Frontier cap for `shortestPath`/`allShortestPaths` BFS: the search
    /// gives up once a single level's frontier exceeds this many nodes,
    /// rather than running an unbounded breadth-first search on a dense
    /// graph.
    pub shortest_path_frontier_cap: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_unbounded_depth: 10,
            analysis_cache_size: 256,
            regex_cache_size: 128,
            shortest_path_frontier_cap: 10_000,
        }
    }
}

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point. A `Graph` wraps a storage backend and an
/// analysis cache, and drives query text through
/// analyze -> substitute -> fast-path-or-pipeline.
pub struct Graph<B: StorageBackend> {
    backend: B,
    config: ExecutorConfig,
    analysis_cache: analysis::AnalysisCache,
    fastpath_cache: fastpath::NodeHandleCache,
}

impl<B: StorageBackend> Graph<B> {
    /// Create a `Graph` with the given backend and default configuration.
    pub fn with_backend(backend: B) -> Self {
        Self::with_backend_and_config(backend, ExecutorConfig::default())
    }

    pub fn with_backend_and_config(backend: B, config: ExecutorConfig) -> Self {
        let analysis_cache = analysis::AnalysisCache::new(config.analysis_cache_size);
        let fastpath_cache = fastpath::NodeHandleCache::new();
        Self { backend, config, analysis_cache, fastpath_cache }
    }

    /// Execute a Cypher query with parameters. Read or write — the query's
    /// own clauses determine which storage methods get called.
    pub async fn execute<P>(&self, query: &str, params: P) -> Result<QueryResult>
    where
        P: Into<PropertyMap>,
    {
        self.execute_cancellable(query, params, CancellationToken::new()).await
    }

    /// Execute a Cypher query, observing a [`CancellationToken`] at clause
    /// and traversal-step boundaries.
    pub async fn execute_cancellable<P>(
        &self,
        query: &str,
        params: P,
        token: CancellationToken,
    ) -> Result<QueryResult>
    where
        P: Into<PropertyMap>,
    {
        let params = params.into();
        let info = self.analysis_cache.analyze(query)?;
        let substituted = params::substitute(&info.normalised, &params)?;

        if let Some(result) = fastpath::try_execute(&info, &substituted, &params, &self.backend, &self.fastpath_cache).await? {
            return Ok(result);
        }

        let ast = info.ast(&substituted)?;
        let statement = match &*ast {
            cypher::ast::Statement::Query(q) => q.clone(),
            cypher::ast::Statement::Schema(cmd) => {
                return pipeline::execute_schema(&self.backend, cmd).await;
            }
        };

        pipeline::execute(&self.backend, &statement, &params, &self.config, &token).await
    }

    /// Access the underlying backend directly (schema bootstrap, tests).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

/// In-memory graph for testing and embedding.
impl Graph<storage::MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        Ok(Self::with_backend(storage::MemoryBackend::new()))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cypher syntax error at position {position}: {message}")]
    ParseError { position: usize, message: String },

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Argument error: {0}")]
    ArgumentError(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Plugin error: {0}")]
    PluginError(String),

    #[error("Query cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
