//! Kruize REST API client.
//!
//! [`KruizeClient`] knows the endpoints and their parameters; moving bytes
//! is delegated to a [`Transport`]. [`http::HttpTransport`] talks to a real
//! service; tests plug in an in-process fake.

pub mod http;

use std::fmt;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::Result;

pub const CREATE_EXPERIMENT: &str = "/createExperiment";
pub const LIST_EXPERIMENTS: &str = "/listExperiments";
pub const UPDATE_RESULTS: &str = "/updateResults";
pub const UPDATE_RECOMMENDATIONS: &str = "/updateRecommendations";
pub const GENERATE_RECOMMENDATIONS: &str = "/generateRecommendations";
pub const LIST_RECOMMENDATIONS: &str = "/listRecommendations";
pub const CREATE_METRIC_PROFILE: &str = "/createMetricProfile";
pub const DELETE_METRIC_PROFILE: &str = "/deleteMetricProfile";
pub const LIST_METRIC_PROFILES: &str = "/listMetricProfiles";
pub const CREATE_METADATA_PROFILE: &str = "/createMetadataProfile";
pub const DELETE_METADATA_PROFILE: &str = "/deleteMetadataProfile";
pub const LIST_METADATA_PROFILES: &str = "/listMetadataProfiles";
pub const DATASOURCES: &str = "/datasources";
pub const DSMETADATA: &str = "/dsmetadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        })
    }
}

/// One call against the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: &'static str,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add the parameter only when `value` is present.
    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status code plus body. Non-JSON bodies are kept as a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn from_text(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self { status, body }
    }
}

/// Moves an [`ApiRequest`] to the service and brings back the response.
///
/// Only transport failures are errors; any HTTP status is a response.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request)
    }
}

// ---------------------------------------------------------------------------
// Query parameter sets
// ---------------------------------------------------------------------------

/// Parameters of `GET /listExperiments`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListExperimentsQuery {
    pub experiment_name: Option<String>,
    pub results: Option<bool>,
    pub recommendations: Option<bool>,
    pub latest: Option<bool>,
    /// `true` reads the remote-monitoring table.
    pub rm: Option<bool>,
}

impl ListExperimentsQuery {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            experiment_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Parameters of `GET /listRecommendations`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRecommendationsQuery {
    pub experiment_name: Option<String>,
    pub latest: Option<bool>,
    pub monitoring_end_time: Option<String>,
}

impl ListRecommendationsQuery {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            experiment_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Parameters of `GET /dsmetadata`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataQuery {
    pub datasource: String,
    pub cluster_name: Option<String>,
    pub namespace: Option<String>,
    pub verbose: Option<bool>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct KruizeClient {
    transport: Box<dyn Transport>,
}

impl KruizeClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// Send a prepared request.
    pub fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        debug!(
            method = %request.method,
            path = request.path,
            query = ?request.query,
            body = ?request.body,
            "request"
        );
        let response = self.transport.send(&request)?;
        debug!(
            method = %request.method,
            path = request.path,
            status = response.status,
            body = %response.body,
            "response"
        );
        Ok(response)
    }

    // -- experiments -------------------------------------------------------

    pub fn create_experiment(&self, payload: &Value) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::Post, CREATE_EXPERIMENT).body(payload.clone()))
    }

    /// Delete by name. `rm` selects the remote-monitoring table.
    pub fn delete_experiment(&self, experiment_name: &str, rm: bool) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(Method::Delete, CREATE_EXPERIMENT)
                .query("rm", rm)
                .body(json!([{ "experiment_name": experiment_name }])),
        )
    }

    pub fn list_experiments(&self, query: &ListExperimentsQuery) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(Method::Get, LIST_EXPERIMENTS)
                .query_opt("experiment_name", query.experiment_name.as_deref())
                .query_opt("results", query.results)
                .query_opt("recommendations", query.recommendations)
                .query_opt("latest", query.latest)
                .query_opt("rm", query.rm),
        )
    }

    // -- results and recommendations ----------------------------------------

    pub fn update_results(&self, payload: &Value) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::Post, UPDATE_RESULTS).body(payload.clone()))
    }

    /// Remote monitoring: compute recommendations ending at `interval_end_time`.
    pub fn update_recommendations(
        &self,
        experiment_name: &str,
        interval_end_time: Option<&str>,
    ) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(Method::Post, UPDATE_RECOMMENDATIONS)
                .query("experiment_name", experiment_name)
                .query_opt("interval_end_time", interval_end_time),
        )
    }

    /// Local monitoring: fetch metrics from the datasource and compute recommendations.
    pub fn generate_recommendations(&self, experiment_name: &str) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(Method::Post, GENERATE_RECOMMENDATIONS)
                .query("experiment_name", experiment_name),
        )
    }

    pub fn list_recommendations(&self, query: &ListRecommendationsQuery) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(Method::Get, LIST_RECOMMENDATIONS)
                .query_opt("experiment_name", query.experiment_name.as_deref())
                .query_opt("latest", query.latest)
                .query_opt("monitoring_end_time", query.monitoring_end_time.as_deref()),
        )
    }

    // -- profiles ------------------------------------------------------------

    pub fn create_metric_profile(&self, profile: &Value) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::Post, CREATE_METRIC_PROFILE).body(profile.clone()))
    }

    pub fn delete_metric_profile(&self, name: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::Delete, DELETE_METRIC_PROFILE).query("name", name))
    }

    pub fn list_metric_profiles(
        &self,
        name: Option<&str>,
        verbose: Option<bool>,
    ) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(Method::Get, LIST_METRIC_PROFILES)
                .query_opt("name", name)
                .query_opt("verbose", verbose),
        )
    }

    pub fn create_metadata_profile(&self, profile: &Value) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::Post, CREATE_METADATA_PROFILE).body(profile.clone()))
    }

    pub fn delete_metadata_profile(&self, name: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::Delete, DELETE_METADATA_PROFILE).query("name", name))
    }

    pub fn list_metadata_profiles(
        &self,
        name: Option<&str>,
        verbose: Option<bool>,
    ) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(Method::Get, LIST_METADATA_PROFILES)
                .query_opt("name", name)
                .query_opt("verbose", verbose),
        )
    }

    // -- datasources and metadata ------------------------------------------

    pub fn list_datasources(&self, name: Option<&str>) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::Get, DATASOURCES).query_opt("name", name))
    }

    pub fn import_metadata(&self, request: &Value) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::Post, DSMETADATA).body(request.clone()))
    }

    pub fn delete_metadata(&self, request: &Value) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::Delete, DSMETADATA).body(request.clone()))
    }

    pub fn list_metadata(&self, query: &MetadataQuery) -> Result<ApiResponse> {
        self.send(
            ApiRequest::new(Method::Get, DSMETADATA)
                .query("datasource", &query.datasource)
                .query_opt("cluster_name", query.cluster_name.as_deref())
                .query_opt("namespace", query.namespace.as_deref())
                .query_opt("verbose", query.verbose),
        )
    }
}
