//! Response schemas for the Kruize REST API.
//!
//! Each public function returns the schema for one response type. Shared
//! fragments (resource amounts, request/limit pairs, term buckets) are
//! composed from small builders so they can be tested on their own.

use heck::ToKebabCase;

use super::Schema;
use crate::error::{HarnessError, Result};

/// Recommendation maps are keyed by `interval_end_time` timestamps.
pub const TIMESTAMP_KEY_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}.\d{3}Z$";

/// Notification maps are keyed by six-digit notification codes.
pub const NOTIFICATION_CODE_PATTERN: &str = r"^\d{6}$";

/// Names of every schema in the catalog, as accepted by [`by_name`].
pub const NAMES: &[&str] = &[
    "list-recommendations",
    "list-recommendations-local",
    "list-recommendations-namespace-local",
    "list-experiments",
    "list-datasources",
    "import-metadata",
    "list-metadata",
    "list-metadata-verbose",
    "list-metric-profiles",
    "list-metadata-profiles",
];

/// Look up a catalog schema by name. Accepts snake_case or kebab-case.
pub fn by_name(name: &str) -> Result<Schema> {
    match name.to_kebab_case().as_str() {
        "list-recommendations" => list_recommendations(),
        "list-recommendations-local" => list_recommendations_local(),
        "list-recommendations-namespace-local" => list_recommendations_namespace_local(),
        "list-experiments" => Ok(list_experiments()),
        "list-datasources" => Ok(list_datasources()),
        "import-metadata" => import_metadata(),
        "list-metadata" => list_metadata(),
        "list-metadata-verbose" => list_metadata_verbose(),
        "list-metric-profiles" => Ok(list_metric_profiles()),
        "list-metadata-profiles" => Ok(list_metadata_profiles()),
        other => Err(HarnessError::Schema(format!(
            "unknown schema '{other}', expected one of: {}",
            NAMES.join(", ")
        ))),
    }
}

// ---------------------------------------------------------------------------
// Fragments
// ---------------------------------------------------------------------------

/// `{"amount": number, "format": string}`
pub fn amount() -> Schema {
    Schema::object()
        .required_property("amount", Schema::Number)
        .required_property("format", Schema::String)
        .into()
}

/// `{"memory": amount, "cpu": amount}`
pub fn cpu_memory() -> Schema {
    Schema::object()
        .required_property("memory", amount())
        .required_property("cpu", amount())
        .into()
}

/// `{"requests": cpu_memory, "limits": cpu_memory}`
pub fn requests_limits() -> Schema {
    Schema::object()
        .required_property("requests", cpu_memory())
        .required_property("limits", cpu_memory())
        .into()
}

/// `{"type": string, "message": string}`
pub fn notification() -> Schema {
    Schema::object()
        .required_property("type", Schema::String)
        .required_property("message", Schema::String)
        .into()
}

/// Code-keyed notification map used by local monitoring responses.
pub fn notification_map() -> Result<Schema> {
    Schema::pattern_map(
        NOTIFICATION_CODE_PATTERN,
        Schema::object()
            .required_property("type", Schema::String)
            .required_property("message", Schema::String)
            .property("code", Schema::Number),
    )
}

// ---------------------------------------------------------------------------
// Remote monitoring recommendations
// ---------------------------------------------------------------------------

fn remote_short_term() -> Schema {
    Schema::object()
        .required_property("monitoring_start_time", Schema::String)
        .required_property("monitoring_end_time", Schema::String)
        .required_property("duration_in_hours", Schema::Number)
        .required_property("pods_count", Schema::Number)
        .required_property("confidence_level", Schema::Number)
        .required_property("config", requests_limits())
        .required_property("variation", requests_limits())
        .required_property("notifications", Schema::any_array())
        .into()
}

fn remote_long_term() -> Schema {
    Schema::object()
        .required_property("pods_count", Schema::Number)
        .required_property("confidence_level", Schema::Number)
        .required_property("notifications", Schema::array(notification()))
        .into()
}

fn remote_recommendations() -> Result<Schema> {
    let bucket = Schema::object().required_property(
        "duration_based",
        Schema::object()
            .required_property("short_term", remote_short_term())
            .required_property("medium_term", remote_long_term())
            .required_property("long_term", remote_long_term()),
    );
    Ok(Schema::object()
        .required_property("notifications", Schema::array(notification()))
        .required_property("data", Schema::pattern_map(TIMESTAMP_KEY_PATTERN, bucket)?)
        .into())
}

/// `GET /listRecommendations` for remote monitoring container experiments.
pub fn list_recommendations() -> Result<Schema> {
    let container = Schema::object()
        .required_property("container_image_name", Schema::String)
        .required_property("container_name", Schema::String)
        .required_property("recommendations", remote_recommendations()?);
    let kubernetes_object = Schema::object()
        .required_property("type", Schema::String)
        .required_property("name", Schema::String)
        .required_property("namespace", Schema::String)
        .required_property("containers", Schema::array(container));
    Ok(Schema::array(
        Schema::object()
            .required_property("cluster_name", Schema::String)
            .required_property("kubernetes_objects", Schema::array(kubernetes_object))
            .required_property("version", Schema::String)
            .required_property("experiment_name", Schema::String),
    ))
}

// ---------------------------------------------------------------------------
// Local monitoring recommendations
// ---------------------------------------------------------------------------

fn engine() -> Result<Schema> {
    Ok(Schema::object()
        .required_property("pods_count", Schema::Number)
        .required_property("confidence_level", Schema::Number)
        .required_property("config", requests_limits())
        .required_property("variation", requests_limits())
        .required_property("notifications", notification_map()?)
        .into())
}

fn term() -> Result<Schema> {
    Ok(Schema::object()
        .required_property("duration_in_hours", Schema::Number)
        .required_property("notifications", notification_map()?)
        .property("monitoring_start_time", Schema::String)
        .property(
            "recommendation_engines",
            Schema::object()
                .property("cost", engine()?)
                .property("performance", engine()?),
        )
        .into())
}

fn local_recommendations() -> Result<Schema> {
    let bucket = Schema::object()
        .required_property("notifications", notification_map()?)
        .required_property("monitoring_end_time", Schema::String)
        .required_property(
            "current",
            Schema::object()
                .property(
                    "requests",
                    Schema::object()
                        .property("cpu", amount())
                        .property("memory", amount()),
                )
                .property(
                    "limits",
                    Schema::object()
                        .property("cpu", amount())
                        .property("memory", amount()),
                ),
        )
        .required_property(
            "recommendation_terms",
            Schema::object()
                .required_property("short_term", term()?)
                .required_property("medium_term", term()?)
                .required_property("long_term", term()?),
        );
    Ok(Schema::object()
        .required_property("version", Schema::String)
        .required_property("notifications", notification_map()?)
        .required_property("data", Schema::pattern_map(TIMESTAMP_KEY_PATTERN, bucket)?)
        .into())
}

fn local_envelope(kubernetes_object: Schema) -> Schema {
    Schema::array(
        Schema::object()
            .required_property("cluster_name", Schema::String)
            .required_property("experiment_type", Schema::String)
            .required_property("kubernetes_objects", Schema::array(kubernetes_object))
            .required_property("version", Schema::String)
            .required_property("experiment_name", Schema::String),
    )
}

/// `GET /listRecommendations` for local monitoring container experiments.
pub fn list_recommendations_local() -> Result<Schema> {
    let container = Schema::object()
        .required_property("container_image_name", Schema::String)
        .required_property("container_name", Schema::String)
        .required_property("recommendations", local_recommendations()?);
    Ok(local_envelope(
        Schema::object()
            .required_property("type", Schema::String)
            .required_property("name", Schema::String)
            .required_property("namespace", Schema::String)
            .required_property("containers", Schema::array(container))
            .into(),
    ))
}

/// `GET /listRecommendations` for local monitoring namespace experiments.
pub fn list_recommendations_namespace_local() -> Result<Schema> {
    let namespaces = Schema::object()
        .required_property("namespace", Schema::String)
        .required_property("recommendations", local_recommendations()?);
    Ok(local_envelope(
        Schema::object()
            .required_property("namespaces", namespaces)
            .into(),
    ))
}

// ---------------------------------------------------------------------------
// Experiments, datasources, metadata
// ---------------------------------------------------------------------------

/// `GET /listExperiments`. Container and result maps vary by flags, so only
/// the envelope is pinned down.
pub fn list_experiments() -> Schema {
    Schema::array(
        Schema::object()
            .required_property("version", Schema::String)
            .required_property("experiment_name", Schema::String)
            .required_property("cluster_name", Schema::String)
            .property("mode", Schema::String)
            .property("target_cluster", Schema::String)
            .required_property(
                "kubernetes_objects",
                Schema::array(
                    Schema::object()
                        .property("type", Schema::String)
                        .property("name", Schema::String)
                        .property("namespace", Schema::String),
                ),
            ),
    )
}

/// `GET /datasources`.
pub fn list_datasources() -> Schema {
    Schema::object()
        .required_property("version", Schema::String)
        .required_property(
            "datasources",
            Schema::array(
                Schema::object()
                    .required_property("name", Schema::String)
                    .required_property("provider", Schema::String)
                    .property("serviceName", Schema::String)
                    .property("namespace", Schema::String)
                    .required_property("url", Schema::String),
            ),
        )
        .into()
}

const NAME_KEY_PATTERN: &str = r"^[a-zA-Z0-9_.-]+$";

fn datasource_map(cluster: Schema) -> Result<Schema> {
    let datasource = Schema::object()
        .required_property("datasource_name", Schema::String)
        .required_property("clusters", Schema::pattern_map(NAME_KEY_PATTERN, cluster)?);
    Ok(Schema::object()
        .required_property("datasources", Schema::pattern_map(NAME_KEY_PATTERN, datasource)?)
        .into())
}

/// `POST /dsmetadata`: cluster names only.
pub fn import_metadata() -> Result<Schema> {
    datasource_map(
        Schema::object()
            .required_property("cluster_name", Schema::String)
            .into(),
    )
}

/// `GET /dsmetadata?datasource=...`: clusters down to namespaces.
pub fn list_metadata() -> Result<Schema> {
    let namespace = Schema::object().required_property("namespace", Schema::String);
    datasource_map(
        Schema::object()
            .required_property("cluster_name", Schema::String)
            .property("namespaces", Schema::pattern_map(NAME_KEY_PATTERN, namespace)?)
            .into(),
    )
}

/// `GET /dsmetadata?...&verbose=true`: namespaces carry workloads and containers.
pub fn list_metadata_verbose() -> Result<Schema> {
    let container = Schema::object()
        .required_property("container_name", Schema::String)
        .required_property("container_image_name", Schema::String);
    let workload = Schema::object()
        .required_property("workload_name", Schema::String)
        .required_property("workload_type", Schema::String)
        .required_property("containers", Schema::pattern_map(NAME_KEY_PATTERN, container)?);
    let namespace = Schema::object()
        .required_property("namespace", Schema::String)
        .required_property("workloads", Schema::pattern_map(NAME_KEY_PATTERN, workload)?);
    datasource_map(
        Schema::object()
            .required_property("cluster_name", Schema::String)
            .required_property("namespaces", Schema::pattern_map(NAME_KEY_PATTERN, namespace)?)
            .into(),
    )
}

fn query_variable() -> Schema {
    Schema::object()
        .required_property("name", Schema::String)
        .required_property("datasource", Schema::String)
        .required_property("value_type", Schema::String)
        .property("kubernetes_object", Schema::String)
        .required_property(
            "aggregation_functions",
            Schema::array(
                Schema::object()
                    .required_property("function", Schema::String)
                    .required_property("query", Schema::String),
            ),
        )
        .into()
}

fn profile_envelope() -> super::ObjectSchema {
    Schema::object()
        .required_property("apiVersion", Schema::String)
        .required_property("kind", Schema::String)
        .required_property(
            "metadata",
            Schema::object().required_property("name", Schema::String),
        )
        .required_property("profile_version", Schema::Number)
        .required_property("k8s_type", Schema::String)
}

/// `GET /listMetricProfiles?name=...`.
pub fn list_metric_profiles() -> Schema {
    Schema::array(
        profile_envelope().required_property(
            "slo",
            Schema::object()
                .required_property("slo_class", Schema::String)
                .required_property("direction", Schema::String)
                .required_property(
                    "objective_function",
                    Schema::object().required_property("function_type", Schema::String),
                )
                .required_property("function_variables", Schema::array(query_variable())),
        ),
    )
}

/// `GET /listMetadataProfiles?name=...`.
pub fn list_metadata_profiles() -> Schema {
    Schema::array(
        profile_envelope()
            .required_property("datasource", Schema::String)
            .required_property("query_variables", Schema::array(query_variable())),
    )
}

// ===========================================================================
// Tests
// ===========================================================================
