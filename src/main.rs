//! A tool to evaluate quality metrics for catalog components.
//!
//! # Overview
//!
//! `catalog-compute` looks up a component in the central component catalog,
//! materialises a local working tree holding the component's source
//! repository and the repository of metric definitions, evaluates each
//! metric attached to the component, and submits the computed values back
//! to the catalog.
//!
//! # Quick Start
//!
//! Compute metrics for one component:
//!
//! ```bash
//! catalog-compute compute billing
//! ```
//!
//! Several components at once, comma-separated:
//!
//! ```bash
//! catalog-compute compute billing,checkout,payments
//! ```
//!
//! Every non-pending component the catalog knows about:
//!
//! ```bash
//! catalog-compute compute --all
//! ```
//!
//! # Environment
//!
//! Required variables, validated before anything runs:
//!
//! - `CATALOG_API_TOKEN` — catalog API authentication token
//! - `CATALOG_CLOUD_ID` — catalog cloud instance identifier
//! - `GITHUB_TOKEN` — token used to clone source repositories
//! - `AWS_REGION` — region of the surrounding cloud resources
//!
//! Optional:
//!
//! - `PROMETHEUS_WORKSPACE_URL` / `PROMETHEUS_TOKEN` — monitoring back-end
//!   for `prometheus` facts; without a workspace URL those facts fail
//! - `METRIC_DIR` — override the metric definition source with a local
//!   directory or a git URL carrying a subpath
//!
//! # Metric definitions
//!
//! Metrics are YAML documents (several per file, separated by `---`) with
//! `kind: Metric`, a name, the component types they apply to, and a list of
//! facts:
//!
//! ```yaml
//! kind: Metric
//! metadata:
//!   name: has-readme
//!   componentType: [service]
//!   facts:
//!     - id: readme
//!       type: extract
//!       source: github
//!       repo: ${Metadata.Name}
//!       filePath: README.md
//!       rule: notempty
//! ```
//!
//! The `${Metadata.Name}` token is replaced with the component name at
//! evaluation time. Facts form a small dependency graph: `extract` facts
//! read from a source, `validate` and `aggregate` facts combine the results
//! of the facts they depend on, and the last non-null result becomes the
//! metric's value.

use catalog_compute::Result;

#[tokio::main]
async fn main() -> Result<()> {
    catalog_compute::run(std::env::args_os()).await
}
