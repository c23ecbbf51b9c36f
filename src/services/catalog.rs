//! Component catalog client.
//!
//! Minimal client for the catalog gateway: a GraphQL query surface for
//! component lookup and a REST endpoint for metric submission.

use super::settings::{COMPONENT_SLUG_PREFIX, Settings};
use crate::Result;
use anyhow::{Context, bail};
use serde::Deserialize;
use serde_json::json;

const LOG_TARGET: &str = "   catalog";

const GET_COMPONENT_QUERY: &str = r"
    query getComponent($cloudId: ID!, $slug: String!) {
        catalog {
            componentByReference(reference: {slug: {slug: $slug, cloudId: $cloudId}}) {
                ... on CatalogComponent {
                    id name type
                    metricSources {
                        ... on CatalogComponentMetricSourcesConnection {
                            nodes {
                                id
                                metricDefinition { name id }
                            }
                        }
                    }
                }
            }
        }
    }";

const SEARCH_COMPONENTS_QUERY: &str = r"
    query searchComponents($cloudId: String!, $query: CatalogSearchComponentQuery!) {
        catalog {
            searchComponents(cloudId: $cloudId, query: $query) {
                ... on CatalogSearchComponentConnection {
                    nodes {
                        component { name }
                    }
                }
            }
        }
    }";

/// A component as the catalog describes it.
#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub id: String,
    pub component_type: String,
    pub metrics: Vec<MetricHandle>,
}

/// One metric association on a component.
#[derive(Debug, Clone)]
pub struct MetricHandle {
    pub name: String,
    pub definition_id: String,
    pub source_id: String,
}

#[derive(Debug, Deserialize, Default)]
struct GetComponentResponse {
    #[serde(default)]
    data: GetComponentData,
}

#[derive(Debug, Deserialize, Default)]
struct GetComponentData {
    #[serde(default)]
    catalog: GetComponentCatalog,
}

#[derive(Debug, Deserialize, Default)]
struct GetComponentCatalog {
    #[serde(default, rename = "componentByReference")]
    component: ComponentNode,
}

#[derive(Debug, Deserialize, Default)]
struct ComponentNode {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    component_type: String,
    #[serde(default, rename = "metricSources")]
    metric_sources: MetricSources,
}

#[derive(Debug, Deserialize, Default)]
struct MetricSources {
    #[serde(default)]
    nodes: Vec<MetricSourceNode>,
}

#[derive(Debug, Deserialize, Default)]
struct MetricSourceNode {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "metricDefinition")]
    metric_definition: MetricDefinitionRef,
}

#[derive(Debug, Deserialize, Default)]
struct MetricDefinitionRef {
    #[serde(default)]
    name: String,
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize, Default)]
struct SearchComponentsResponse {
    #[serde(default)]
    data: SearchComponentsData,
}

#[derive(Debug, Deserialize, Default)]
struct SearchComponentsData {
    #[serde(default)]
    catalog: SearchComponentsCatalog,
}

#[derive(Debug, Deserialize, Default)]
struct SearchComponentsCatalog {
    #[serde(default, rename = "searchComponents")]
    search: SearchComponentsConnection,
}

#[derive(Debug, Deserialize, Default)]
struct SearchComponentsConnection {
    #[serde(default)]
    nodes: Vec<SearchComponentNode>,
}

#[derive(Debug, Deserialize, Default)]
struct SearchComponentNode {
    #[serde(default)]
    component: SearchComponentName,
}

#[derive(Debug, Deserialize, Default)]
struct SearchComponentName {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize, Default)]
struct GraphqlErrors {
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize, Default)]
struct GraphqlError {
    #[serde(default)]
    message: String,
}

/// Client for the catalog gateway.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    cloud_id: String,
    graphql_endpoint: String,
    metrics_endpoint: String,
}

impl CatalogClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

        let mut auth_value =
            HeaderValue::from_str(&format!("Basic {}", settings.catalog_token)).context("catalog token is not a valid header value")?;
        auth_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, auth_value);
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(concat!("catalog-compute/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(core::time::Duration::from_secs(30))
            .build()
            .context("building catalog HTTP client")?;

        Ok(Self {
            client,
            cloud_id: settings.catalog_cloud_id.clone(),
            graphql_endpoint: settings.graphql_endpoint(),
            metrics_endpoint: settings.metrics_endpoint(),
        })
    }

    /// Look up a component by name and return it with its non-builtin
    /// metric associations.
    pub async fn component(&self, name: &str) -> Result<Component> {
        let variables = json!({
            "cloudId": self.cloud_id,
            "slug": format!("{COMPONENT_SLUG_PREFIX}{name}"),
        });

        let body = self.graphql(GET_COMPONENT_QUERY, &variables).await?;
        let response: GetComponentResponse = serde_json::from_slice(&body).context("parsing component lookup response")?;

        let node = response.data.catalog.component;
        if node.id.is_empty() {
            bail!("component not found: {name}");
        }

        let metrics = node
            .metric_sources
            .nodes
            .into_iter()
            .filter(|source| !source.metric_definition.id.contains("builtin"))
            .map(|source| MetricHandle {
                name: source.metric_definition.name,
                definition_id: source.metric_definition.id,
                source_id: source.id,
            })
            .collect();

        Ok(Component {
            name: name.to_string(),
            id: node.id,
            component_type: node.component_type,
            metrics,
        })
    }

    /// Names of every non-pending component known to the catalog.
    pub async fn all_component_names(&self) -> Result<Vec<String>> {
        let variables = json!({
            "cloudId": self.cloud_id,
            "query": {
                "first": 200,
                "fieldFilters": {
                    "name": "state",
                    "filter": { "neq": "PENDING" },
                },
            },
        });

        let body = self.graphql(SEARCH_COMPONENTS_QUERY, &variables).await?;
        let response: SearchComponentsResponse = serde_json::from_slice(&body).context("parsing component search response")?;

        Ok(response
            .data
            .catalog
            .search
            .nodes
            .into_iter()
            .map(|node| node.component.name)
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Submit one computed metric value.
    pub async fn submit_metric(&self, component_id: &str, definition_id: &str, value: &str) -> Result<()> {
        let payload = json!({
            "metricDefinitionId": definition_id,
            "value": value,
            "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "componentId": component_id,
        });

        log::debug!(target: LOG_TARGET, "Submitting value '{value}' for definition '{definition_id}'");
        let _ = self.post(&self.metrics_endpoint, &payload).await?;
        Ok(())
    }

    async fn graphql(&self, query: &str, variables: &serde_json::Value) -> Result<Vec<u8>> {
        let payload = json!({ "query": query, "variables": variables });
        let body = self.post(&self.graphql_endpoint, &payload).await?;

        // GraphQL reports failures inside a 200 response.
        if let Ok(errors) = serde_json::from_slice::<GraphqlErrors>(&body) {
            if let Some(first) = errors.errors.first() {
                bail!("GraphQL error: {}", first.message);
            }
        }

        Ok(body)
    }

    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("requesting '{url}'"))?;

        let status = response.status();
        let body = response.bytes().await.with_context(|| format!("reading response from '{url}'"))?;

        if !status.is_success() {
            bail!("catalog API error {status}: {}", String::from_utf8_lossy(&body));
        }

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> Settings {
        Settings {
            catalog_token: "token".into(),
            catalog_cloud_id: "cloud-1".into(),
            github_token: "gh".into(),
            aws_region: "eu-west-1".into(),
            catalog_base_url: server.uri(),
            github_org: "org".into(),
        }
    }

    #[tokio::test]
    async fn test_component_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "catalog": { "componentByReference": {
                    "id": "comp-123",
                    "name": "billing",
                    "type": "SERVICE",
                    "metricSources": { "nodes": [
                        { "id": "src-1", "metricDefinition": { "name": "has-readme", "id": "def-1" } },
                        { "id": "src-2", "metricDefinition": { "name": "deploys", "id": "builtin:deploys" } },
                    ]},
                }}},
            })))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&settings_for(&server)).unwrap();
        let component = client.component("billing").await.unwrap();

        assert_eq!(component.id, "comp-123");
        assert_eq!(component.component_type, "SERVICE");
        // Builtin metric definitions are filtered out.
        assert_eq!(component.metrics.len(), 1);
        assert_eq!(component.metrics[0].definition_id, "def-1");
        assert_eq!(component.metrics[0].source_id, "src-1");
    }

    #[tokio::test]
    async fn test_component_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "catalog": { "componentByReference": {} } },
            })))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&settings_for(&server)).unwrap();
        let err = client.component("ghost").await.unwrap_err();
        assert!(err.to_string().contains("component not found"));
    }

    #[tokio::test]
    async fn test_graphql_errors_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [ { "message": "rate limited" } ],
            })))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&settings_for(&server)).unwrap();
        let err = client.component("billing").await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_submit_metric_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/catalog/v1/metrics"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = CatalogClient::new(&settings_for(&server)).unwrap();
        client.submit_metric("comp-123", "def-1", "1").await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_metric_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/catalog/v1/metrics"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&settings_for(&server)).unwrap();
        let err = client.submit_metric("comp-123", "def-1", "1").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_all_component_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "catalog": { "searchComponents": { "nodes": [
                    { "component": { "name": "billing" } },
                    { "component": { "name": "checkout" } },
                ]}}},
            })))
            .mount(&server)
            .await;

        let client = CatalogClient::new(&settings_for(&server)).unwrap();
        let names = client.all_component_names().await.unwrap();
        assert_eq!(names, vec!["billing".to_string(), "checkout".to_string()]);
    }
}
