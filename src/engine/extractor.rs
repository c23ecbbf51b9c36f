//! Source extractors: fetch the raw bytes for one extract fact.
//!
//! Every extractor takes the interpolated fact plus the already-computed
//! dependency results (needed for URI substitution) and returns bytes, or
//! `None` when the source has nothing (a missing file in the working tree).
//! Unknown sources dispatch through the custom-source registry.

use super::Engine;
use super::fact::{Fact, SourceKind};
use super::helpers::toml_to_json;
use super::value::FactValue;
use crate::Result;
use anyhow::{Context, bail};
use camino::Utf8PathBuf;
use core::time::Duration;
use std::fs;
use std::io;

const LOG_TARGET: &str = "    engine";

/// Range queries cover the trailing hour at a fixed step.
const RANGE_QUERY_WINDOW_SECS: i64 = 3600;
const RANGE_QUERY_STEP: Duration = Duration::from_secs(15);

/// File extensions skipped by the tree search.
const SEARCH_SKIP_EXTENSIONS: &[&str] = &["git", "bin", "exe"];

impl Engine {
    pub(crate) async fn extract_from_source(&self, fact: &Fact, dependencies: &[FactValue]) -> Result<Option<Vec<u8>>> {
        match fact.source_kind() {
            SourceKind::Github => self.extract_from_repo_tree(fact),
            SourceKind::Api => self.extract_from_api(fact, dependencies).await.map(Some),
            SourceKind::Prometheus => self.extract_from_monitoring(fact).await.map(Some),
            SourceKind::Other(name) => match self.sources.get(&name.to_ascii_lowercase()) {
                Some(hook) => hook.extract(fact, dependencies).await,
                None => bail!("unsupported source: {name}"),
            },
        }
    }

    /// Read from the previously materialised working tree. A missing file is
    /// absent data, not an error; TOML files are flattened to JSON so the
    /// rule layer only ever sees one syntax.
    fn extract_from_repo_tree(&self, fact: &Fact) -> Result<Option<Vec<u8>>> {
        if fact.rule.eq_ignore_ascii_case("search") {
            return self.search_repo_tree(fact).map(Some);
        }

        if fact.file_path.is_empty() {
            bail!("filePath is required for the repository source");
        }

        let path = self.repo_root.join(fact.repo.as_str()).join(fact.file_path.as_str());
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(target: LOG_TARGET, "File '{path}' not found, treating as absent");
                return Ok(None);
            }
            Err(e) => return Err(e).with_context(|| format!("reading '{path}'")),
        };

        if fact.file_path.ends_with(".toml") {
            return toml_to_json(&data).with_context(|| format!("flattening '{path}'")).map(Some);
        }

        Ok(Some(data))
    }

    /// Walk the repository tree looking for `searchString`, stopping at the
    /// first file that contains it. The outcome is JSON-encoded so the
    /// extractor contract stays "bytes"; the `search` rule decodes it.
    fn search_repo_tree(&self, fact: &Fact) -> Result<Vec<u8>> {
        let root: Utf8PathBuf = self.repo_root.join(fact.repo.as_str());
        let needle = fact.search_string.as_bytes();

        let mut found = false;
        for entry in walkdir::WalkDir::new(&root) {
            let entry = entry.with_context(|| format!("walking '{root}'"))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let extension = entry
                .path()
                .extension()
                .and_then(|extension| extension.to_str())
                .map(str::to_ascii_lowercase);
            if extension.as_deref().is_some_and(|extension| SEARCH_SKIP_EXTENSIONS.contains(&extension)) {
                continue;
            }

            // Unreadable files are skipped rather than failing the search.
            let Ok(data) = fs::read(entry.path()) else {
                continue;
            };

            if contains_bytes(&data, needle) {
                found = true;
                break;
            }
        }

        serde_json::to_vec(&found).context("encoding search outcome")
    }

    /// Issue a single GET against a JSON API, substituting dependency
    /// results into the URI. When dependencies yield nothing usable the
    /// request is skipped entirely and a canned empty document comes back,
    /// shielding downstream JSON queries from nulls.
    async fn extract_from_api(&self, fact: &Fact, dependencies: &[FactValue]) -> Result<Vec<u8>> {
        if fact.uri.is_empty() {
            bail!("uri is required for the API source");
        }

        let mut uri = fact.uri.clone();

        if !fact.depends_on.is_empty() {
            if dependencies.iter().all(FactValue::is_null) {
                log::debug!(target: LOG_TARGET, "No dependency results available for '{}', skipping request", fact.id);
                return Ok(canned_empty_response(&fact.uri));
            }

            for dependency in dependencies {
                let replacement = match dependency {
                    FactValue::String(text) => Some(text.as_str()),
                    FactValue::List(items) => {
                        if items.is_empty() {
                            return Ok(canned_empty_response(&fact.uri));
                        }
                        match items.first() {
                            Some(FactValue::String(text)) => Some(text.as_str()),
                            _ => None,
                        }
                    }
                    _ => None,
                };

                if let Some(value) = replacement {
                    uri = uri.replace(":slo_id", value).replace(":alert_id", value);
                }
            }
        }

        let mut request = self.http.get(&uri);
        if let Some(auth) = &fact.auth {
            if !auth.header.is_empty() && !auth.token_var.is_empty() {
                // A missing variable is not an error; the header is set empty.
                let token = (self.env)(&auth.token_var).unwrap_or_default();
                request = request.header(auth.header.as_str(), token);
            }
        }

        log::debug!(target: LOG_TARGET, "GET {uri}");
        let response = request.send().await.with_context(|| format!("requesting '{uri}'"))?;
        let body = response.bytes().await.with_context(|| format!("reading response body from '{uri}'"))?;
        Ok(body.to_vec())
    }

    /// Query the monitoring back-end. Instant queries run at "now"; range
    /// queries cover the trailing hour at a 15 second step.
    async fn extract_from_monitoring(&self, fact: &Fact) -> Result<Vec<u8>> {
        let Some(monitoring) = &self.monitoring else {
            bail!("prometheus service not configured");
        };

        if fact.prometheus_query.is_empty() {
            bail!("prometheusQuery is required for the prometheus source");
        }

        match fact.rule.to_ascii_lowercase().as_str() {
            "" | "instant" => {
                let value = monitoring.instant_query(&fact.prometheus_query).await?;
                serde_json::to_vec(&value).context("encoding instant query result")
            }
            "range" => {
                let end = chrono::Utc::now();
                let start = end - chrono::Duration::seconds(RANGE_QUERY_WINDOW_SECS);
                let series = monitoring.range_query(&fact.prometheus_query, start, end, RANGE_QUERY_STEP).await?;
                serde_json::to_vec(&series).context("encoding range query result")
            }
            other => bail!("unsupported prometheus rule: {other}"),
        }
    }
}

/// Byte-level substring test. An empty needle matches anything, mirroring
/// ordinary substring semantics.
fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// The canned document returned when an API fact's dependencies produced
/// nothing usable. Recipient-shaped endpoints get an object so `.recipients`
/// queries still work; everything else gets an empty array.
fn canned_empty_response(template_uri: &str) -> Vec<u8> {
    if template_uri.contains("recipients") || template_uri.contains(":alert_id") {
        br#"{"recipients": []}"#.to_vec()
    } else {
        b"[]".to_vec()
    }
}
