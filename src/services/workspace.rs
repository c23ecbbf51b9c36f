//! Working-tree materialisation.
//!
//! Clones the component's source repository and the metric-definition
//! repository under the local base path before evaluation starts. The
//! engine itself never clones, fetches, or refreshes; it only reads the
//! tree prepared here.
//!
//! `METRIC_DIR` can override where metric definitions come from: a local
//! directory (copied into place) or a git URL carrying a subpath (cloned to
//! a scratch directory, subpath extracted). When the override fills the
//! metrics directory, the catalog repository is not cloned at all.

use super::settings::{CATALOG_REPO, Settings, default_metric_path};
use crate::Result;
use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use tokio::process::Command;

const LOG_TARGET: &str = " workspace";

/// Where a `METRIC_DIR` override points.
#[derive(Debug, PartialEq, Eq)]
enum MetricDirSource {
    LocalPath(Utf8PathBuf),
    Git { owner: String, repo: String, path: String, ssh: bool },
}

/// Prepares working trees under a base directory.
#[derive(Debug)]
pub struct Workspace {
    base: Utf8PathBuf,
    org: String,
    token: String,
}

impl Workspace {
    #[must_use]
    pub fn new(settings: &Settings, base: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base: base.into(),
            org: settings.github_org.clone(),
            token: settings.github_token.clone(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &Utf8Path {
        &self.base
    }

    /// Clone the component's source repository into the working tree,
    /// replacing any stale checkout.
    pub async fn materialize_component(&self, component_name: &str) -> Result<()> {
        self.clone_repo(component_name).await
    }

    /// Make the metric definitions available and return the directory that
    /// holds them. Without an override this clones the catalog repository.
    pub async fn prepare_metric_directory(&self, metric_dir: Option<&str>) -> Result<Utf8PathBuf> {
        let Some(metric_dir) = metric_dir else {
            log::debug!(target: LOG_TARGET, "No metric directory override, using the catalog repository");
            self.clone_repo(CATALOG_REPO).await?;
            return Ok(default_metric_path(&self.base));
        };

        let target = self.base.join("metrics");
        if target.exists() && fs::read_dir(&target).map(|mut entries| entries.next().is_some()).unwrap_or(false) {
            log::info!(target: LOG_TARGET, "Metrics directory '{target}' already populated, leaving it in place");
            return Ok(target);
        }

        match parse_metric_dir(metric_dir)? {
            MetricDirSource::LocalPath(source) => {
                log::info!(target: LOG_TARGET, "Copying metric definitions from '{source}'");
                copy_dir(source.as_std_path(), target.as_std_path())
                    .with_context(|| format!("copying '{source}' to '{target}'"))?;
            }
            MetricDirSource::Git { owner, repo, path, ssh } => {
                log::info!(target: LOG_TARGET, "Extracting metric definitions from '{owner}/{repo}:{path}'");
                self.clone_and_extract(&owner, &repo, &path, ssh, &target).await?;
            }
        }

        Ok(target)
    }

    async fn clone_repo(&self, repo: &str) -> Result<()> {
        let destination = self.base.join(repo);

        if destination.exists() {
            fs::remove_dir_all(&destination).with_context(|| format!("removing stale checkout '{destination}'"))?;
        }
        fs::create_dir_all(&self.base).with_context(|| format!("creating '{}'", self.base))?;

        let url = format!("https://{}@github.com/{}/{repo}.git", self.token, self.org);
        log::info!(target: LOG_TARGET, "Cloning repository '{}/{repo}'", self.org);
        run_git(&["clone", "--depth", "1", url.as_str(), destination.as_str()]).await
    }

    async fn clone_and_extract(&self, owner: &str, repo: &str, path: &str, ssh: bool, target: &Utf8Path) -> Result<()> {
        let scratch = self.base.join(format!("temp-{repo}"));
        if scratch.exists() {
            fs::remove_dir_all(&scratch).with_context(|| format!("removing '{scratch}'"))?;
        }
        fs::create_dir_all(&self.base).with_context(|| format!("creating '{}'", self.base))?;

        let url = if ssh {
            format!("git@github.com:{owner}/{repo}.git")
        } else {
            format!("https://{}@github.com/{owner}/{repo}.git", self.token)
        };

        run_git(&["clone", "--depth", "1", url.as_str(), scratch.as_str()]).await?;

        let source = scratch.join(path);
        if !source.exists() {
            bail!("path '{path}' not found in repository '{owner}/{repo}'");
        }

        copy_dir(source.as_std_path(), target.as_std_path()).with_context(|| format!("copying '{source}' to '{target}'"))?;

        if let Err(e) = fs::remove_dir_all(&scratch) {
            log::warn!(target: LOG_TARGET, "Could not remove scratch directory '{scratch}': {e}");
        }

        Ok(())
    }
}

async fn run_git(args: &[&str]) -> Result<()> {
    let output = Command::new("git").args(args).output().await.context("running git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
    }

    Ok(())
}

/// Recognize the supported `METRIC_DIR` forms.
fn parse_metric_dir(metric_dir: &str) -> Result<MetricDirSource> {
    let local = Utf8PathBuf::from(metric_dir);
    if local.exists() {
        return Ok(MetricDirSource::LocalPath(local));
    }

    // GitHub tree URL: https://github.com/owner/repo/tree/branch/path/to/dir
    let tree = Regex::new(r"^https://github\.com/([^/]+)/([^/]+)/tree/[^/]+/(.+)$").context("compiling tree URL pattern")?;
    if let Some(captures) = tree.captures(metric_dir) {
        return Ok(MetricDirSource::Git {
            owner: captures[1].to_string(),
            repo: captures[2].to_string(),
            path: captures[3].to_string(),
            ssh: false,
        });
    }

    // HTTPS URL with subpath: https://github.com/owner/repo.git/path/to/dir
    let https = Regex::new(r"^https://github\.com/([^/]+)/([^/]+)\.git/(.+)$").context("compiling HTTPS URL pattern")?;
    if let Some(captures) = https.captures(metric_dir) {
        return Ok(MetricDirSource::Git {
            owner: captures[1].to_string(),
            repo: captures[2].to_string(),
            path: captures[3].to_string(),
            ssh: false,
        });
    }

    // SSH URL with subpath: git@github.com:owner/repo.git/path/to/dir
    let ssh = Regex::new(r"^git@github\.com:([^/]+)/([^/]+)\.git/(.+)$").context("compiling SSH URL pattern")?;
    if let Some(captures) = ssh.captures(metric_dir) {
        return Ok(MetricDirSource::Git {
            owner: captures[1].to_string(),
            repo: captures[2].to_string(),
            path: captures[3].to_string(),
            ssh: true,
        });
    }

    bail!("invalid METRIC_DIR format: {metric_dir}")
}

fn copy_dir(source: &std::path::Path, destination: &std::path::Path) -> std::io::Result<()> {
    fs::create_dir_all(destination)?;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            let _ = fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric_dir_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().to_str().unwrap();
        assert_eq!(parse_metric_dir(text).unwrap(), MetricDirSource::LocalPath(Utf8PathBuf::from(text)));
    }

    #[test]
    fn test_parse_metric_dir_tree_url() {
        let source = parse_metric_dir("https://github.com/acme/catalog/tree/main/config/metrics").unwrap();
        assert_eq!(
            source,
            MetricDirSource::Git {
                owner: "acme".into(),
                repo: "catalog".into(),
                path: "config/metrics".into(),
                ssh: false,
            }
        );
    }

    #[test]
    fn test_parse_metric_dir_https_url() {
        let source = parse_metric_dir("https://github.com/acme/catalog.git/config/metrics").unwrap();
        assert_eq!(
            source,
            MetricDirSource::Git {
                owner: "acme".into(),
                repo: "catalog".into(),
                path: "config/metrics".into(),
                ssh: false,
            }
        );
    }

    #[test]
    fn test_parse_metric_dir_ssh_url() {
        let source = parse_metric_dir("git@github.com:acme/catalog.git/config/metrics").unwrap();
        assert_eq!(
            source,
            MetricDirSource::Git {
                owner: "acme".into(),
                repo: "catalog".into(),
                path: "config/metrics".into(),
                ssh: true,
            }
        );
    }

    #[test]
    fn test_parse_metric_dir_rejects_garbage() {
        let err = parse_metric_dir("ftp://nowhere/metrics").unwrap_err();
        assert!(err.to_string().contains("invalid METRIC_DIR format"));
    }

    #[test]
    fn test_copy_dir_recurses() {
        let source = tempfile::tempdir().unwrap();
        fs::create_dir_all(source.path().join("nested")).unwrap();
        fs::write(source.path().join("a.yaml"), "x").unwrap();
        fs::write(source.path().join("nested/b.yaml"), "y").unwrap();

        let destination = tempfile::tempdir().unwrap();
        let target = destination.path().join("metrics");
        copy_dir(source.path(), &target).unwrap();

        assert!(target.join("a.yaml").exists());
        assert!(target.join("nested/b.yaml").exists());
    }

    #[tokio::test]
    async fn test_prepare_metric_directory_with_local_override() {
        let metric_source = tempfile::tempdir().unwrap();
        fs::write(metric_source.path().join("metric.yaml"), "kind: Metric\n").unwrap();

        let base = tempfile::tempdir().unwrap();
        let settings = Settings {
            catalog_token: "t".into(),
            catalog_cloud_id: "c".into(),
            github_token: "g".into(),
            aws_region: "r".into(),
            catalog_base_url: "https://example.com".into(),
            github_org: "org".into(),
        };

        let workspace = Workspace::new(&settings, Utf8PathBuf::from_path_buf(base.path().to_path_buf()).unwrap());
        let path = workspace
            .prepare_metric_directory(Some(metric_source.path().to_str().unwrap()))
            .await
            .unwrap();

        assert!(path.join("metric.yaml").exists());

        // A second call sees the populated directory and leaves it alone.
        let again = workspace
            .prepare_metric_directory(Some(metric_source.path().to_str().unwrap()))
            .await
            .unwrap();
        assert_eq!(path, again);
    }
}
