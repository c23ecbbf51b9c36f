//! Environment-derived settings for the surrounding system.
//!
//! The engine itself reads nothing from the environment (auth token lookup
//! is injected); everything here belongs to the orchestration around it and
//! is validated once, before any network call is made.

use crate::Result;
use anyhow::bail;
use camino::Utf8PathBuf;

/// Repository holding the metric definitions.
pub const CATALOG_REPO: &str = "metrics-catalog";

/// Directory inside [`CATALOG_REPO`] where metric definitions live.
pub const METRIC_PATH: &str = "config/metrics";

/// Root under which working trees are materialised.
pub const LOCAL_BASE_PATH: &str = "./repos";

/// Prefix turning a component name into its catalog slug.
pub const COMPONENT_SLUG_PREFIX: &str = "svc-";

const DEFAULT_CATALOG_BASE_URL: &str = "https://catalog.atlassian.com/gateway/api";
const DEFAULT_GITHUB_ORG: &str = "catalog-components";

/// Environment variables that must be present before a run starts.
const REQUIRED_ENV_VARS: &[&str] = &["CATALOG_API_TOKEN", "CATALOG_CLOUD_ID", "GITHUB_TOKEN", "AWS_REGION"];

#[derive(Debug, Clone)]
pub struct Settings {
    pub catalog_token: String,
    pub catalog_cloud_id: String,
    pub github_token: String,
    pub aws_region: String,
    pub catalog_base_url: String,
    pub github_org: String,
}

impl Settings {
    /// Read and validate the environment. Every missing required variable is
    /// reported in one message rather than one at a time.
    pub fn from_env() -> Result<Self> {
        let missing: Vec<&str> = REQUIRED_ENV_VARS
            .iter()
            .copied()
            .filter(|name| std::env::var(name).map(|value| value.is_empty()).unwrap_or(true))
            .collect();

        if !missing.is_empty() {
            bail!("missing required environment variables: {}", missing.join(", "));
        }

        Ok(Self {
            catalog_token: std::env::var("CATALOG_API_TOKEN").unwrap_or_default(),
            catalog_cloud_id: std::env::var("CATALOG_CLOUD_ID").unwrap_or_default(),
            github_token: std::env::var("GITHUB_TOKEN").unwrap_or_default(),
            aws_region: std::env::var("AWS_REGION").unwrap_or_default(),
            catalog_base_url: std::env::var("CATALOG_BASE_URL").unwrap_or_else(|_| DEFAULT_CATALOG_BASE_URL.to_string()),
            github_org: std::env::var("GITHUB_ORG").unwrap_or_else(|_| DEFAULT_GITHUB_ORG.to_string()),
        })
    }

    #[must_use]
    pub fn graphql_endpoint(&self) -> String {
        format!("{}/graphql", self.catalog_base_url)
    }

    #[must_use]
    pub fn metrics_endpoint(&self) -> String {
        format!("{}/catalog/v1/metrics", self.catalog_base_url)
    }
}

/// Default location of the metric definitions inside the working tree.
#[must_use]
pub fn default_metric_path(base: &Utf8PathBuf) -> Utf8PathBuf {
    base.join(CATALOG_REPO).join(METRIC_PATH)
}
