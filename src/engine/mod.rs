//! The fact evaluation engine.
//!
//! A metric is an ordered list of declarative facts forming a small
//! data-flow graph: extract facts pull bytes from a source (the local
//! working tree, a JSON API, or the monitoring back-end) and shape them
//! with a rule; validate and aggregate facts combine the results of the
//! facts they depend on. The engine resolves the graph in dependency order
//! and produces a single value per metric.
//!
//! # Implementation Model
//!
//! [`Engine::evaluate_metric`] owns a cloned fact list for the duration of
//! one call. It interpolates the component name into the facts, then drives
//! a fixed-point scan over the list: each pass processes every fact whose
//! dependencies have completed, and a pass with no progress while facts
//! remain reports a dependency cycle. Within a metric nothing runs
//! concurrently, so results are deterministic for fixed inputs.
//!
//! The engine's extension surface is its three registries: custom fact
//! types ([`ProcessorHook`]), custom sources ([`SourceHook`]), and custom
//! rules ([`RuleHook`]), all keyed case-insensitively by name and populated
//! through [`EngineBuilder`]. The monitoring back-end ([`Monitoring`]) and
//! the environment lookup used for API authentication are injected the same
//! way, so tests can stub both without touching process state.
//!
//! The working tree under the repository root is read-only to the engine;
//! materialising it is the caller's responsibility.

mod appliers;
mod evaluator;
mod extractor;
mod fact;
mod helpers;
mod processor;
mod value;

pub use fact::{AggregateMethod, AuthSpec, Fact, FactKind, SourceKind};
pub use value::FactValue;

use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-request deadline applied to every network extractor call.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Lookup for process environment variables, injectable for tests.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The monitoring back-end consumed by `prometheus` facts. How requests are
/// authenticated is the implementation's concern, not the engine's.
#[async_trait]
pub trait Monitoring: Send + Sync {
    /// Evaluate the query at the current instant and return its scalar value.
    async fn instant_query(&self, query: &str) -> Result<f64>;

    /// Evaluate the query over `[start, end]` at the given step and return
    /// the resulting series.
    async fn range_query(&self, query: &str, start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<serde_json::Value>;
}

/// Extractor for a custom source name.
#[async_trait]
pub trait SourceHook: Send + Sync {
    /// Fetch the raw bytes for `fact`. `None` means the source had nothing.
    async fn extract(&self, fact: &Fact, dependencies: &[FactValue]) -> Result<Option<Vec<u8>>>;
}

/// Applier for a custom rule name.
pub trait RuleHook: Send + Sync {
    /// Turn extracted bytes into a typed result.
    fn apply(&self, fact: &Fact, data: Option<&[u8]>) -> Result<FactValue>;
}

/// Processor for a custom fact type.
#[async_trait]
pub trait ProcessorHook: Send + Sync {
    /// Produce the fact's result from its dependencies.
    async fn process(&self, fact: &Fact, dependencies: &[FactValue]) -> Result<FactValue>;
}

/// Evaluates metrics against a working tree and external data sources.
///
/// One engine serves any number of sequential or concurrent
/// [`evaluate_metric`](Engine::evaluate_metric) calls; each call owns its
/// fact list and shares only the read-only working tree, the HTTP client,
/// and the monitoring client.
pub struct Engine {
    repo_root: Utf8PathBuf,
    http: reqwest::Client,
    monitoring: Option<Arc<dyn Monitoring>>,
    env: EnvLookup,
    sources: HashMap<String, Arc<dyn SourceHook>>,
    rules: HashMap<String, Arc<dyn RuleHook>>,
    processors: HashMap<String, Arc<dyn ProcessorHook>>,
}

impl Engine {
    #[must_use]
    pub fn builder(repo_root: impl Into<Utf8PathBuf>) -> EngineBuilder {
        EngineBuilder::new(repo_root)
    }

    #[must_use]
    pub fn repo_root(&self) -> &Utf8PathBuf {
        &self.repo_root
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    repo_root: Utf8PathBuf,
    monitoring: Option<Arc<dyn Monitoring>>,
    env: EnvLookup,
    http_timeout: Duration,
    sources: HashMap<String, Arc<dyn SourceHook>>,
    rules: HashMap<String, Arc<dyn RuleHook>>,
    processors: HashMap<String, Arc<dyn ProcessorHook>>,
}

impl EngineBuilder {
    #[must_use]
    pub fn new(repo_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            monitoring: None,
            env: Arc::new(|name| std::env::var(name).ok()),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            sources: HashMap::new(),
            rules: HashMap::new(),
            processors: HashMap::new(),
        }
    }

    /// Attach a monitoring client. Without one, `prometheus` facts fail.
    #[must_use]
    pub fn monitoring(mut self, client: Arc<dyn Monitoring>) -> Self {
        self.monitoring = Some(client);
        self
    }

    /// Override where API authentication tokens are looked up.
    #[must_use]
    pub fn env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env = lookup;
        self
    }

    /// Override the per-request deadline for network extractors.
    #[must_use]
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Register an extractor for a custom source name.
    #[must_use]
    pub fn source_hook(mut self, name: &str, hook: Arc<dyn SourceHook>) -> Self {
        let _ = self.sources.insert(name.to_ascii_lowercase(), hook);
        self
    }

    /// Register an applier for a custom rule name.
    #[must_use]
    pub fn rule_hook(mut self, name: &str, hook: Arc<dyn RuleHook>) -> Self {
        let _ = self.rules.insert(name.to_ascii_lowercase(), hook);
        self
    }

    /// Register a processor for a custom fact type.
    #[must_use]
    pub fn processor_hook(mut self, name: &str, hook: Arc<dyn ProcessorHook>) -> Self {
        let _ = self.processors.insert(name.to_ascii_lowercase(), hook);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("catalog-compute/", env!("CARGO_PKG_VERSION")))
            .timeout(self.http_timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Engine {
            repo_root: self.repo_root,
            http,
            monitoring: self.monitoring,
            env: self.env,
            sources: self.sources,
            rules: self.rules,
            processors: self.processors,
        })
    }
}
