//! Metric definition discovery and parsing.
//!
//! Metric authors write YAML documents, several per file separated by
//! `---`. Only documents with `kind: Metric` and a metadata name are kept;
//! malformed documents are skipped with a warning so one bad file cannot
//! take down a whole run. Unknown fields are ignored.

use crate::Result;
use crate::engine::Fact;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

const LOG_TARGET: &str = "definitions";

/// One metric definition as written by a metric author. The evaluation
/// driver only consumes the name and the fact list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricDefinition {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: Spec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub name: String,
    pub component_type: Vec<String>,
    pub facts: Vec<Fact>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Spec {
    pub name: String,
    pub description: String,
    pub format: Format,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Format {
    pub unit: String,
}

/// Reads every metric definition under a base directory.
#[derive(Debug)]
pub struct MetricsParser {
    base_path: Utf8PathBuf,
}

impl MetricsParser {
    #[must_use]
    pub fn new(base_path: impl Into<Utf8PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }

    /// Walk the base directory and parse every `.yaml`/`.yml` file found.
    pub fn parse_metrics(&self) -> Result<Vec<MetricDefinition>> {
        let mut metrics = Vec::new();

        for entry in walkdir::WalkDir::new(&self.base_path) {
            let entry = entry.with_context(|| format!("walking '{}'", self.base_path))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(path) = Utf8Path::from_path(entry.path()) else {
                continue;
            };
            let extension = path.extension().map(str::to_ascii_lowercase);
            if !matches!(extension.as_deref(), Some("yaml" | "yml")) {
                continue;
            }

            match parse_yaml_file(path) {
                Ok(file_metrics) => metrics.extend(file_metrics),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Skipping '{path}': {e:#}");
                }
            }
        }

        Ok(metrics)
    }

    /// Find the fact list for a metric name, applicable to a component type.
    /// Component types compare case-insensitively.
    #[must_use]
    pub fn facts_for(metrics: &[MetricDefinition], metric_name: &str, component_type: &str) -> Option<Vec<Fact>> {
        metrics
            .iter()
            .find(|metric| {
                metric.metadata.name == metric_name
                    && metric
                        .metadata
                        .component_type
                        .iter()
                        .any(|candidate| candidate.eq_ignore_ascii_case(component_type))
            })
            .map(|metric| metric.metadata.facts.clone())
    }
}

/// Parse one file that may hold several `---`-separated documents.
fn parse_yaml_file(path: &Utf8Path) -> Result<Vec<MetricDefinition>> {
    let content = fs::read_to_string(path).with_context(|| format!("reading '{path}'"))?;

    let mut metrics = Vec::new();
    for document in content.split("\n---") {
        let document = document.trim().trim_start_matches("---").trim();
        if document.is_empty() {
            continue;
        }

        let metric: MetricDefinition = match serde_yaml::from_str(document) {
            Ok(metric) => metric,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Skipping malformed document in '{path}': {e}");
                continue;
            }
        };

        if metric.kind != "Metric" || metric.metadata.name.is_empty() {
            continue;
        }

        metrics.push(metric);
    }

    Ok(metrics)
}
