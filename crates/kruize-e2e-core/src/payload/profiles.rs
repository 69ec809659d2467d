//! Metric profile, metadata profile and metadata import documents.

use serde_json::{json, Value};

use super::experiment::{LOCAL_METADATA_PROFILE, LOCAL_PERFORMANCE_PROFILE};
use super::{Renderer, TemplateVars, METADATA_PROFILE_TEMPLATE, METRIC_PROFILE_TEMPLATE};
use crate::config::ClusterType;
use crate::error::{HarnessError, Result};

/// Datasource provider named inside profile query variables.
pub const PROFILE_DATASOURCE_PROVIDER: &str = "prometheus";

/// Local monitoring metric profile. Openshift queries go through the
/// platform's recording rules; other clusters query raw series.
pub fn metric_profile(renderer: &Renderer, cluster_type: ClusterType) -> Result<Value> {
    let vars = TemplateVars::new()
        .with("name", LOCAL_PERFORMANCE_PROFILE)
        .with("k8s_type", "openshift")
        .with("datasource", PROFILE_DATASOURCE_PROVIDER)
        .with("recording_rules", cluster_type.uses_recording_rules());
    renderer.render(METRIC_PROFILE_TEMPLATE, &vars)
}

pub fn metadata_profile(renderer: &Renderer) -> Result<Value> {
    let vars = TemplateVars::new()
        .with("name", LOCAL_METADATA_PROFILE)
        .with("k8s_type", "openshift")
        .with("datasource", PROFILE_DATASOURCE_PROVIDER);
    renderer.render(METADATA_PROFILE_TEMPLATE, &vars)
}

/// `metadata.name` of a profile document.
pub fn profile_name(profile: &Value) -> Result<&str> {
    profile
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .ok_or_else(|| HarnessError::check("profile document has no metadata.name"))
}

/// Body of `POST /dsmetadata`.
pub fn import_metadata_request(datasource: &str) -> Value {
    json!({
        "version": "v1.0",
        "datasource_name": datasource,
    })
}
