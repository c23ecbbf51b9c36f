//! The compute command: evaluate every metric attached to the requested
//! components and publish the results.
//!
//! Failure policy follows the catalog's expectations: a metric that cannot
//! be resolved or evaluated produces a warning and the run moves on; only a
//! setup failure (catalog lookup, working-tree materialisation) aborts the
//! component.

use super::common::{LogLevel, init_logging, validate_component_names};
use crate::Result;
use crate::engine::{Engine, EngineBuilder};
use crate::services::{CatalogClient, Component, MetricsParser, PrometheusService, Settings, Workspace};
use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use std::sync::Arc;

const LOG_TARGET: &str = "   compute";

#[derive(Args, Debug)]
pub struct ComputeArgs {
    /// Comma-separated list of component names to process
    #[arg(value_name = "COMPONENTS", value_delimiter = ',', required_unless_present = "all")]
    pub components: Vec<String>,

    /// Process every non-pending component known to the catalog
    #[arg(long, conflicts_with = "components")]
    pub all: bool,

    /// Show progress information while processing
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,

    /// Directory under which working trees are materialised
    #[arg(long, value_name = "PATH", default_value = "./repos")]
    pub repo_root: Utf8PathBuf,

    /// Override the metric definition source: a local directory, or a git
    /// URL with an embedded subpath
    #[arg(long, value_name = "PATH_OR_URL", env = "METRIC_DIR")]
    pub metric_dir: Option<String>,
}

pub async fn process_components(args: &ComputeArgs) -> Result<()> {
    let level = if args.verbose && args.log_level == LogLevel::None {
        LogLevel::Info
    } else {
        args.log_level
    };
    init_logging(level);

    // Fail fast on a misconfigured environment, before any network call.
    let settings = Settings::from_env()?;

    if !args.all {
        validate_component_names(&args.components)?;
    }

    let catalog = CatalogClient::new(&settings)?;

    let names = if args.all {
        catalog.all_component_names().await.context("listing catalog components")?
    } else {
        args.components.clone()
    };

    let workspace = Workspace::new(&settings, args.repo_root.clone());
    let metric_path = workspace
        .prepare_metric_directory(args.metric_dir.as_deref())
        .await
        .context("preparing the metric definition directory")?;
    let parser = MetricsParser::new(metric_path);

    let mut builder = EngineBuilder::new(args.repo_root.clone());
    if let Some(monitoring) = PrometheusService::from_env()? {
        builder = builder.monitoring(Arc::new(monitoring));
    }
    let engine = builder.build()?;

    for name in &names {
        if let Err(e) = process_component(name, &catalog, &workspace, &parser, &engine).await {
            log::error!(target: LOG_TARGET, "Could not process component '{name}': {e:#}");
        }
    }

    Ok(())
}

async fn process_component(
    name: &str,
    catalog: &CatalogClient,
    workspace: &Workspace,
    parser: &MetricsParser,
    engine: &Engine,
) -> Result<()> {
    let component = catalog.component(name).await.with_context(|| format!("looking up component '{name}'"))?;

    log::info!(
        target: LOG_TARGET,
        "Found component '{}' (id: {}, type: {}) with {} metrics",
        component.name,
        component.id,
        component.component_type,
        component.metrics.len()
    );

    workspace
        .materialize_component(name)
        .await
        .with_context(|| format!("materialising the working tree for '{name}'"))?;

    let definitions = parser.parse_metrics().context("parsing metric definitions")?;

    let processed = evaluate_and_submit(&component, &definitions, catalog, engine).await;
    println!("Processed {processed} metrics for component '{name}'");

    Ok(())
}

/// Evaluate every metric associated with the component, submitting each
/// computed value. Per-metric failures are warnings, not run-stoppers.
async fn evaluate_and_submit(
    component: &Component,
    definitions: &[crate::services::MetricDefinition],
    catalog: &CatalogClient,
    engine: &Engine,
) -> usize {
    let mut processed = 0;

    for handle in &component.metrics {
        log::info!(target: LOG_TARGET, "Processing metric '{}'", handle.name);

        let Some(facts) = MetricsParser::facts_for(definitions, &handle.name, &component.component_type) else {
            log::warn!(
                target: LOG_TARGET,
                "No facts found for metric '{}' and component type '{}'",
                handle.name,
                component.component_type
            );
            continue;
        };

        let value = match engine.evaluate_metric(facts, &component.name).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not evaluate metric '{}': {e:#}", handle.name);
                continue;
            }
        };

        let rendered = value.to_string();
        log::info!(target: LOG_TARGET, "Evaluated metric '{}' to '{rendered}'", handle.name);

        if let Err(e) = catalog.submit_metric(&component.id, &handle.definition_id, &rendered).await {
            log::error!(target: LOG_TARGET, "Could not submit metric '{}': {e:#}", handle.name);
            continue;
        }

        processed += 1;
    }

    processed
}
