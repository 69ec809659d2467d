//! Harness configuration.
//!
//! Values are layered: [`HarnessConfig::default`] → optional JSON file →
//! `KRUIZE_*` environment variables → explicit overrides from the caller
//! (the CLI applies its flags last).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarnessError, Result};

pub const ENV_URL: &str = "KRUIZE_URL";
pub const ENV_CLUSTER_TYPE: &str = "KRUIZE_CLUSTER_TYPE";
pub const ENV_RECO_WAIT_SECS: &str = "KRUIZE_RECO_WAIT_SECS";

/// Default wait after experiment creation before recommendations are generated.
pub const DEFAULT_RECOMMENDATION_WAIT_SECS: u64 = 300;

/// Kind of cluster the service runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    #[default]
    Minikube,
    Kind,
    Openshift,
}

impl ClusterType {
    /// Openshift ships the recording rules the local-monitoring metric
    /// profile queries; minikube and kind do not.
    pub fn uses_recording_rules(self) -> bool {
        matches!(self, ClusterType::Openshift)
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClusterType::Minikube => "minikube",
            ClusterType::Kind => "kind",
            ClusterType::Openshift => "openshift",
        })
    }
}

impl FromStr for ClusterType {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minikube" => Ok(ClusterType::Minikube),
            "kind" => Ok(ClusterType::Kind),
            "openshift" => Ok(ClusterType::Openshift),
            other => Err(HarnessError::config(format!(
                "unknown cluster type '{other}' (expected minikube, kind or openshift)"
            ))),
        }
    }
}

/// Settings shared by every scenario of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the Kruize service, e.g. `http://192.168.49.2:31521`.
    pub base_url: String,
    pub cluster_type: ClusterType,
    /// Fixed wait before generating local-monitoring recommendations.
    pub recommendation_wait_secs: u64,
    /// Per-request timeout. `None` keeps the HTTP client default.
    pub http_timeout_secs: Option<u64>,
    /// Where rendered payloads are written before submission.
    pub scratch_dir: PathBuf,
    /// Datasource registered with the service.
    pub datasource: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            cluster_type: ClusterType::default(),
            recommendation_wait_secs: DEFAULT_RECOMMENDATION_WAIT_SECS,
            http_timeout_secs: None,
            scratch_dir: std::env::temp_dir().join("kruize-e2e"),
            datasource: "prometheus-1".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load a JSON config file; missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| HarnessError::config(format!("{}: {e}", path.display())))
    }

    /// Apply `KRUIZE_*` variables from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply `KRUIZE_*` variables from an arbitrary lookup.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.base_url = url;
        }
        if let Some(cluster_type) = lookup(ENV_CLUSTER_TYPE) {
            self.cluster_type = cluster_type.parse()?;
        }
        if let Some(wait) = lookup(ENV_RECO_WAIT_SECS) {
            self.recommendation_wait_secs = wait.trim().parse().map_err(|e| {
                HarnessError::config(format!("{ENV_RECO_WAIT_SECS}='{wait}': {e}"))
            })?;
        }
        Ok(self)
    }

    /// Parsed base URL. Rejects anything that is not http(s).
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| HarnessError::config(format!("base url '{}': {e}", self.base_url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(HarnessError::config(format!(
                "base url '{}' has unsupported scheme '{other}'",
                self.base_url
            ))),
        }
    }

    pub fn recommendation_wait(&self) -> Duration {
        Duration::from_secs(self.recommendation_wait_secs)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}
