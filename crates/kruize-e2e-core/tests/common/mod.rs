//! In-process stand-in for the Kruize service.
//!
//! Keeps experiments, results, profiles and imported metadata in memory and
//! applies the same acceptance rules the real service does for everything
//! the scenario suite exercises.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde_json::{json, Value};

use kruize_e2e_core::cases::{CPU_FORMATS, MEMORY_FORMATS};
use kruize_e2e_core::checks::{classify_interval_str, IntervalClass};
use kruize_e2e_core::client::{
    ApiRequest, ApiResponse, Method, Transport, CREATE_EXPERIMENT, CREATE_METADATA_PROFILE,
    CREATE_METRIC_PROFILE, DATASOURCES, DELETE_METADATA_PROFILE, DELETE_METRIC_PROFILE, DSMETADATA,
    GENERATE_RECOMMENDATIONS, LIST_EXPERIMENTS, LIST_METADATA_PROFILES, LIST_METRIC_PROFILES,
    LIST_RECOMMENDATIONS, UPDATE_RECOMMENDATIONS, UPDATE_RESULTS,
};
use kruize_e2e_core::messages::*;
use kruize_e2e_core::Result;

pub const DATASOURCE: &str = "prometheus-1";

/// Aggregates each metric must carry.
fn required_aggregates(metric: &str) -> &'static [&'static str] {
    match metric {
        "cpuRequest" | "cpuLimit" | "memoryRequest" | "memoryLimit" => &["sum", "avg"],
        "cpuThrottle" => &["max", "sum", "avg"],
        "cpuUsage" | "memoryUsage" | "memoryRSS" => &["min", "max", "sum", "avg"],
        "namespaceCpuRequest"
        | "namespaceCpuLimit"
        | "namespaceMemoryRequest"
        | "namespaceMemoryLimit" => &["sum"],
        "namespaceTotalPods" | "namespaceRunningPods" => &["sum"],
        _ if metric.starts_with("namespace") => &["min", "max", "avg"],
        _ => &[],
    }
}

const NOT_ENOUGH_DATA: &str = "There is not enough data available to generate a recommendation.";

const CONTAINER_MANDATORY_METRICS: &[&str] = &["cpuUsage", "memoryUsage", "memoryRSS"];
const NAMESPACE_MANDATORY_METRICS: &[&str] =
    &["namespaceCpuUsage", "namespaceMemoryUsage", "namespaceMemoryRSS"];

#[derive(Debug, Default)]
pub struct State {
    pub experiments: BTreeMap<String, Value>,
    /// experiment -> (start, end) -> record
    pub results: BTreeMap<String, BTreeMap<(String, String), Value>>,
    /// experiment -> monitoring end time of the last computed recommendation
    pub recommendations: BTreeMap<String, String>,
    pub metric_profiles: BTreeMap<String, Value>,
    pub metadata_profiles: BTreeMap<String, Value>,
    pub metadata_imported: bool,
    pub requests: Vec<(Method, &'static str)>,
}

/// Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct FakeKruize {
    pub state: Rc<RefCell<State>>,
}

impl FakeKruize {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn experiment_names(&self) -> Vec<String> {
        self.state.borrow().experiments.keys().cloned().collect()
    }

    pub fn results_for(&self, experiment_name: &str) -> usize {
        self.state
            .borrow()
            .results
            .get(experiment_name)
            .map_or(0, BTreeMap::len)
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|(m, p)| *m == method && *p == path)
            .count()
    }
}

fn envelope(status_code: u16, message: impl Into<String>) -> ApiResponse {
    let status = if status_code < 300 { SUCCESS_STATUS } else { ERROR_STATUS };
    ApiResponse::new(
        status_code,
        json!({
            "message": message.into(),
            "httpcode": status_code,
            "documentationLink": "",
            "status": status,
        }),
    )
}

fn error(message: impl Into<String>) -> ApiResponse {
    envelope(ERROR_STATUS_CODE, message)
}

impl Transport for FakeKruize {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut state = self.state.borrow_mut();
        state.requests.push((request.method, request.path));
        let body = request.body.clone().unwrap_or(Value::Null);
        let response = match (request.method, request.path) {
            (Method::Post, CREATE_EXPERIMENT) => state.create_experiment(&body),
            (Method::Delete, CREATE_EXPERIMENT) => state.delete_experiment(&body),
            (Method::Get, LIST_EXPERIMENTS) => state.list_experiments(request),
            (Method::Post, UPDATE_RESULTS) => state.update_results(&body),
            (Method::Post, UPDATE_RECOMMENDATIONS) => state.update_recommendations(request),
            (Method::Post, GENERATE_RECOMMENDATIONS) => state.generate_recommendations(request),
            (Method::Get, LIST_RECOMMENDATIONS) => state.list_recommendations(request),
            (Method::Post, CREATE_METRIC_PROFILE) => {
                create_profile(&mut state.metric_profiles, &body, true)
            }
            (Method::Delete, DELETE_METRIC_PROFILE) => {
                delete_profile(&mut state.metric_profiles, request)
            }
            (Method::Get, LIST_METRIC_PROFILES) => list_profiles(&state.metric_profiles, request),
            (Method::Post, CREATE_METADATA_PROFILE) => {
                create_profile(&mut state.metadata_profiles, &body, false)
            }
            (Method::Delete, DELETE_METADATA_PROFILE) => {
                delete_profile(&mut state.metadata_profiles, request)
            }
            (Method::Get, LIST_METADATA_PROFILES) => {
                list_profiles(&state.metadata_profiles, request)
            }
            (Method::Get, DATASOURCES) => datasources(),
            (Method::Post, DSMETADATA) => state.import_metadata(&body),
            (Method::Delete, DSMETADATA) => state.delete_metadata(),
            (Method::Get, DSMETADATA) => state.list_metadata(request),
            (method, path) => envelope(404, format!("no route for {method} {path}")),
        };
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Experiments
// ---------------------------------------------------------------------------

impl State {
    fn create_experiment(&mut self, body: &Value) -> ApiResponse {
        let experiments = body.as_array().map(Vec::as_slice).unwrap_or_default();
        let experiment = match experiments {
            [single] => single,
            [] => return error("Experiment list is empty"),
            _ => return error(CREATE_EXP_BULK_ERROR_MSG),
        };
        let Some(name) = experiment["experiment_name"].as_str().filter(|n| !n.is_empty()) else {
            return error("Missing mandatory parameter experiment_name");
        };
        if self.experiments.contains_key(name) {
            return envelope(
                ERROR_409_STATUS_CODE,
                format!("Experiment name : {name} is duplicate"),
            );
        }
        if experiment["target_cluster"] == "local" {
            let profile = experiment["performance_profile"].as_str().unwrap_or_default();
            if !self.metric_profiles.contains_key(profile) {
                return error(format!("Metric Profile not found: {profile}"));
            }
        }
        self.experiments.insert(name.to_string(), experiment.clone());
        envelope(SUCCESS_STATUS_CODE, CREATE_EXP_SUCCESS_MSG)
    }

    fn delete_experiment(&mut self, body: &Value) -> ApiResponse {
        let name = body[0]["experiment_name"].as_str().unwrap_or_default();
        if self.experiments.remove(name).is_none() {
            return error(EXPERIMENT_NOT_FOUND_MSG);
        }
        self.results.remove(name);
        self.recommendations.remove(name);
        envelope(SUCCESS_STATUS_CODE, DELETE_EXP_SUCCESS_MSG)
    }

    fn list_experiments(&self, request: &ApiRequest) -> ApiResponse {
        let wanted = request.query_value("experiment_name");
        let with_results = request.query_value("results") == Some("true");
        let listed: Vec<Value> = self
            .experiments
            .iter()
            .filter(|(name, _)| wanted.map_or(true, |w| w == name.as_str()))
            .map(|(name, experiment)| {
                let mut entry = experiment.clone();
                if with_results {
                    attach_results(&mut entry, self.results.get(name));
                }
                entry
            })
            .collect();
        if wanted.is_some() && listed.is_empty() {
            return error(EXPERIMENT_NOT_FOUND_MSG);
        }
        ApiResponse::new(SUCCESS_200_STATUS_CODE, Value::Array(listed))
    }
}

/// Containers (or the namespace) of a listed experiment get a `results` map
/// keyed by interval end time.
fn attach_results(entry: &mut Value, results: Option<&BTreeMap<(String, String), Value>>) {
    let results: serde_json::Map<String, Value> = results
        .into_iter()
        .flatten()
        .map(|((start, end), _)| {
            (
                end.clone(),
                json!({"interval_start_time": start, "interval_end_time": end}),
            )
        })
        .collect();
    let Some(objects) = entry["kubernetes_objects"].as_array_mut() else {
        return;
    };
    for object in objects {
        if let Some(namespaces) = object.get_mut("namespaces") {
            namespaces["results"] = Value::Object(results.clone());
        }
        if let Some(containers) = object["containers"].as_array().cloned() {
            let by_name: serde_json::Map<String, Value> = containers
                .into_iter()
                .map(|mut c| {
                    c["results"] = Value::Object(results.clone());
                    (c["container_name"].as_str().unwrap_or_default().to_string(), c)
                })
                .collect();
            object["containers"] = Value::Object(by_name);
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

struct RecordError {
    message: String,
    httpcode: u16,
}

impl RecordError {
    fn bad(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            httpcode: ERROR_STATUS_CODE,
        }
    }
}

fn non_blank<'v>(record: &'v Value, key: &str) -> Option<&'v str> {
    record[key].as_str().filter(|s| !s.trim().is_empty())
}

impl State {
    fn update_results(&mut self, body: &Value) -> ApiResponse {
        let Some(records) = body.as_array() else {
            return error("Request body must be a list of results");
        };
        let mut failed = Vec::new();
        for record in records {
            let errors = self.accept_record(record);
            if !errors.is_empty() {
                failed.push(json!({
                    "experiment_name": record["experiment_name"],
                    "interval_start_time": record["interval_start_time"],
                    "interval_end_time": record["interval_end_time"],
                    "errors": errors
                        .iter()
                        .map(|e| json!({"message": e.message, "httpcode": e.httpcode}))
                        .collect::<Vec<_>>(),
                }));
            }
        }
        if failed.is_empty() {
            return envelope(SUCCESS_STATUS_CODE, UPDATE_RESULTS_SUCCESS_MSG);
        }
        let mut response = error(failed_records(records.len(), failed.len()));
        response.body["data"] = Value::Array(failed);
        response
    }

    /// Store the record or explain why not.
    fn accept_record(&mut self, record: &Value) -> Vec<RecordError> {
        let name = non_blank(record, "experiment_name");
        let (Some(name), Some(_), Some(start), Some(end)) = (
            name,
            non_blank(record, "version"),
            non_blank(record, "interval_start_time"),
            non_blank(record, "interval_end_time"),
        ) else {
            return vec![RecordError::bad(missing_mandatory_parameters(name.unwrap_or_default()))];
        };
        let Some(experiment) = self.experiments.get(name) else {
            return vec![RecordError::bad(experiment_name_not_found(name))];
        };

        let measurement = experiment["trial_settings"]["measurement_duration"]
            .as_str()
            .unwrap_or("15min");
        match classify_interval_str(start, end, measurement) {
            Err(e) => return vec![RecordError::bad(format!("Invalid timestamp: {e}"))],
            Ok(IntervalClass::Valid) => {}
            Ok(class) => return vec![RecordError::bad(class.expected_error().unwrap_or_default())],
        }

        let errors = check_objects(name, experiment, record);
        if !errors.is_empty() {
            return errors;
        }
        if all_zero(record) {
            return vec![RecordError::bad(format!("{ALL_ZERO_METRICS} for experiment: {name}"))];
        }

        let stored = self.results.entry(name.to_string()).or_default();
        let key = (start.to_string(), end.to_string());
        if stored.contains_key(&key) {
            return vec![RecordError {
                message: DUPLICATE_RECORDS_MSG.to_string(),
                httpcode: ERROR_409_STATUS_CODE,
            }];
        }
        stored.insert(key, record.clone());
        Vec::new()
    }
}

fn check_objects(name: &str, experiment: &Value, record: &Value) -> Vec<RecordError> {
    let declared = &experiment["kubernetes_objects"][0];
    let Some(object) = record["kubernetes_objects"].as_array().and_then(|o| o.first()) else {
        return vec![RecordError::bad(missing_mandatory_parameters(name))];
    };
    if declared.get("namespaces").is_some() {
        return check_namespace_object(name, declared, object);
    }
    if object.get("namespaces").is_some() || object["type"] != declared["type"] {
        return vec![RecordError::bad(format!(
            "{KUBERNETES_OBJECT_TYPE_MISMATCH} for experiment: {name}"
        ))];
    }
    if object["name"] != declared["name"] || object["namespace"] != declared["namespace"] {
        return vec![RecordError::bad(format!(
            "{KUBERNETES_OBJECT_NAME_MISMATCH} for experiment: {name}"
        ))];
    }

    let known: BTreeSet<&str> = declared["containers"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|c| c["container_name"].as_str())
        .collect();
    let mut errors = Vec::new();
    for container in object["containers"].as_array().into_iter().flatten() {
        let (Some(container_name), Some(_)) = (
            non_blank(container, "container_name"),
            non_blank(container, "container_image_name"),
        ) else {
            errors.push(RecordError::bad(missing_mandatory_parameters(name)));
            continue;
        };
        if !known.contains(container_name) {
            errors.push(RecordError::bad(format!(
                "Container {container_name} not found in {name}"
            )));
            continue;
        }
        match container["metrics"].as_array() {
            Some(metrics) if !metrics.is_empty() => {
                errors.extend(check_metrics(name, metrics, CONTAINER_MANDATORY_METRICS));
            }
            _ => errors.push(RecordError::bad(metric_data_not_present(container_name, name))),
        }
    }
    errors
}

fn check_namespace_object(name: &str, declared: &Value, object: &Value) -> Vec<RecordError> {
    let Some(namespaces) = object.get("namespaces") else {
        return vec![RecordError::bad(missing_mandatory_parameters(name))];
    };
    if non_blank(namespaces, "namespace").is_none() {
        return vec![RecordError::bad(missing_mandatory_parameters(name))];
    }
    if namespaces["namespace"] != declared["namespaces"]["namespace"] {
        return vec![RecordError::bad(format!(
            "{KUBERNETES_OBJECT_NAME_MISMATCH} for experiment: {name}"
        ))];
    }
    let metrics = namespaces["metrics"].as_array().map(Vec::as_slice).unwrap_or_default();
    check_metrics(name, metrics, NAMESPACE_MANDATORY_METRICS)
}

fn format_is_valid(metric: &str, format: &str) -> bool {
    let lower = metric.to_ascii_lowercase();
    if lower.contains("cpu") {
        CPU_FORMATS.contains(&format)
    } else if lower.contains("memory") {
        MEMORY_FORMATS.contains(&format)
    } else {
        true
    }
}

fn check_metrics(name: &str, metrics: &[Value], mandatory: &[&str]) -> Vec<RecordError> {
    let present: BTreeSet<&str> = metrics.iter().filter_map(|m| m["name"].as_str()).collect();
    if mandatory.iter().any(|m| !present.contains(m)) {
        return vec![RecordError::bad(missing_mandatory_parameters(name))];
    }
    let mut errors = Vec::new();
    for metric in metrics {
        let Some(metric_name) = non_blank(metric, "name") else {
            errors.push(RecordError::bad(missing_mandatory_parameters(name)));
            continue;
        };
        let info = &metric["results"]["aggregation_info"];
        for key in required_aggregates(metric_name) {
            match info[*key].as_f64() {
                Some(v) if v >= 0.0 => {}
                _ => errors.push(RecordError::bad(format!(
                    "Invalid aggregation_info.{key} for metric {metric_name} of experiment: {name}"
                ))),
            }
        }
        if !metric_name.ends_with("Pods") {
            match info["format"].as_str() {
                Some(format) if format_is_valid(metric_name, format) => {}
                other => errors.push(RecordError::bad(format!(
                    "Invalid format {other:?} for metric {metric_name} of experiment: {name}"
                ))),
            }
        }
    }
    errors
}

fn all_zero(record: &Value) -> bool {
    let mut values = Vec::new();
    collect_aggregates(&record["kubernetes_objects"], &mut values);
    !values.is_empty() && values.iter().all(|v| *v == 0.0)
}

fn collect_aggregates(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Object(map) => {
            if let Some(info) = map.get("aggregation_info").and_then(Value::as_object) {
                out.extend(
                    ["min", "max", "sum", "avg"]
                        .iter()
                        .filter_map(|k| info.get(*k).and_then(Value::as_f64)),
                );
            }
            map.values().for_each(|v| collect_aggregates(v, out));
        }
        Value::Array(items) => items.iter().for_each(|v| collect_aggregates(v, out)),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

fn amount(amount: f64, format: &str) -> Value {
    json!({"amount": amount, "format": format})
}

fn config() -> Value {
    json!({
        "requests": {"cpu": amount(0.94, "cores"), "memory": amount(238.2, "MiB")},
        "limits": {"cpu": amount(0.94, "cores"), "memory": amount(238.2, "MiB")},
    })
}

fn variation() -> Value {
    json!({
        "requests": {"cpu": amount(-3.46, "cores"), "memory": amount(-12.6, "MiB")},
        "limits": {"cpu": amount(-1.06, "cores"), "memory": amount(-261.8, "MiB")},
    })
}

fn notification(code: u32, kind: &str, message: &str) -> Value {
    json!({"type": kind, "message": message, "code": code})
}

fn short_term_available() -> Value {
    notification(111101, "info", "Short Term Recommendations Available")
}

fn remote_recommendations(start: &str, end: &str) -> Value {
    let not_enough = json!([notification(120001, "info", NOT_ENOUGH_DATA)]);
    json!({
        "notifications": [notification(111000, "info", RECOMMENDATIONS_AVAILABLE)],
        "data": {
            end: {
                "duration_based": {
                    "short_term": {
                        "monitoring_start_time": start,
                        "monitoring_end_time": end,
                        "duration_in_hours": 24.0,
                        "pods_count": 1,
                        "confidence_level": 0.0,
                        "config": config(),
                        "variation": variation(),
                        "notifications": [],
                    },
                    "medium_term": {
                        "pods_count": 0,
                        "confidence_level": 0.0,
                        "notifications": not_enough
                    },
                    "long_term": {
                        "pods_count": 0,
                        "confidence_level": 0.0,
                        "notifications": not_enough
                    },
                }
            }
        }
    })
}

fn local_recommendations(end: &str) -> Value {
    let engine = json!({
        "pods_count": 1,
        "confidence_level": 0.0,
        "config": config(),
        "variation": variation(),
        "notifications": {"112101": notification(112101, "info", "Cost Recommendations Available")},
    });
    let not_enough = json!({"120001": notification(120001, "info", NOT_ENOUGH_DATA)});
    let available = notification(111000, "info", RECOMMENDATIONS_AVAILABLE);
    json!({
        "version": "1.0",
        "notifications": {
            NOTIFICATION_CODE_FOR_RECOMMENDATIONS_AVAILABLE: available,
        },
        "data": {
            end: {
                "notifications": {"111101": short_term_available()},
                "monitoring_end_time": end,
                "current": {},
                "recommendation_terms": {
                    "short_term": {
                        "duration_in_hours": 24.0,
                        "notifications": {"111101": short_term_available()},
                        "monitoring_start_time": "2024-01-01T00:00:00.000Z",
                        "recommendation_engines": {"cost": engine, "performance": engine},
                    },
                    "medium_term": {"duration_in_hours": 168.0, "notifications": not_enough},
                    "long_term": {"duration_in_hours": 360.0, "notifications": not_enough},
                }
            }
        }
    })
}

/// The experiment as listRecommendations shows it, with `recommendations`
/// attached to each container or to the namespace.
fn recommendation_entry(experiment: &Value, recommendations: &Value) -> Value {
    let mut objects = experiment["kubernetes_objects"].clone();
    for object in objects.as_array_mut().into_iter().flatten() {
        if let Some(namespaces) = object.get_mut("namespaces") {
            namespaces["recommendations"] = recommendations.clone();
        }
        if let Some(containers) = object.get_mut("containers").and_then(Value::as_array_mut) {
            for container in containers {
                container["recommendations"] = recommendations.clone();
            }
        }
    }
    json!({
        "cluster_name": experiment["cluster_name"],
        "experiment_type": experiment["experiment_type"],
        "kubernetes_objects": objects,
        "version": experiment["version"],
        "experiment_name": experiment["experiment_name"],
    })
}

const LOCAL_MONITORING_END: &str = "2024-01-02T00:00:00.000Z";

impl State {
    fn update_recommendations(&mut self, request: &ApiRequest) -> ApiResponse {
        let name = request.query_value("experiment_name").unwrap_or_default();
        if !self.experiments.contains_key(name) {
            return error(experiment_name_not_found(name));
        }
        let Some(results) = self.results.get(name).filter(|r| !r.is_empty()) else {
            return error(format!(
                "No results available to generate recommendations for experiment: {name}"
            ));
        };
        let end = request
            .query_value("interval_end_time")
            .map(str::to_string)
            .or_else(|| results.keys().map(|(_, end)| end.clone()).max())
            .unwrap_or_default();
        if !results.keys().any(|(_, e)| *e == end) {
            return error(format!("Results are missing for {end} of experiment: {name}"));
        }
        self.recommendations.insert(name.to_string(), end);
        self.list_recommendations(request).with_status(SUCCESS_STATUS_CODE)
    }

    fn generate_recommendations(&mut self, request: &ApiRequest) -> ApiResponse {
        let name = request.query_value("experiment_name").unwrap_or_default();
        match self.experiments.get(name) {
            Some(experiment) if experiment["target_cluster"] == "local" => {
                self.recommendations.insert(name.to_string(), LOCAL_MONITORING_END.to_string());
                self.list_recommendations(request).with_status(SUCCESS_STATUS_CODE)
            }
            Some(_) => error(format!(
                "generateRecommendations is only for local monitoring: {name}"
            )),
            None => error(experiment_name_not_found(name)),
        }
    }

    fn list_recommendations(&self, request: &ApiRequest) -> ApiResponse {
        let name = request.query_value("experiment_name").unwrap_or_default();
        let Some(experiment) = self.experiments.get(name) else {
            return error(experiment_name_not_found(name));
        };
        let recommendations = match self.recommendations.get(name) {
            Some(end) if experiment["target_cluster"] == "local" => local_recommendations(end),
            Some(end) => {
                let start = self
                    .results
                    .get(name)
                    .and_then(|r| r.keys().map(|(start, _)| start.clone()).min())
                    .unwrap_or_default();
                remote_recommendations(&start, end)
            }
            None => json!({"notifications": [], "data": {}}),
        };
        ApiResponse::new(
            SUCCESS_200_STATUS_CODE,
            json!([recommendation_entry(experiment, &recommendations)]),
        )
    }
}

trait WithStatus {
    fn with_status(self, status: u16) -> Self;
}

impl WithStatus for ApiResponse {
    fn with_status(mut self, status: u16) -> Self {
        if self.status < 300 {
            self.status = status;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Profiles, datasources, metadata
// ---------------------------------------------------------------------------

fn create_profile(
    profiles: &mut BTreeMap<String, Value>,
    body: &Value,
    metric: bool,
) -> ApiResponse {
    let Some(name) = body.pointer("/metadata/name").and_then(Value::as_str) else {
        return error("Missing mandatory parameter metadata.name");
    };
    if profiles.contains_key(name) {
        return envelope(ERROR_409_STATUS_CODE, format!("Profile already exists: {name}"));
    }
    profiles.insert(name.to_string(), body.clone());
    let message = if metric {
        create_metric_profile_success(name)
    } else {
        create_metadata_profile_success(name)
    };
    envelope(SUCCESS_STATUS_CODE, message)
}

fn delete_profile(profiles: &mut BTreeMap<String, Value>, request: &ApiRequest) -> ApiResponse {
    let name = request.query_value("name").unwrap_or_default();
    match profiles.remove(name) {
        Some(_) => envelope(SUCCESS_STATUS_CODE, format!("Profile : {name} deleted successfully.")),
        None => error(format!("Profile not found: {name}")),
    }
}

fn list_profiles(profiles: &BTreeMap<String, Value>, request: &ApiRequest) -> ApiResponse {
    let listed: Vec<Value> = match request.query_value("name") {
        Some(name) => profiles.get(name).cloned().into_iter().collect(),
        None => profiles.values().cloned().collect(),
    };
    if listed.is_empty() {
        return error("No profiles found");
    }
    ApiResponse::new(SUCCESS_200_STATUS_CODE, Value::Array(listed))
}

fn datasources() -> ApiResponse {
    ApiResponse::new(
        SUCCESS_200_STATUS_CODE,
        json!({
            "version": "v1.0",
            "datasources": [{
                "name": DATASOURCE,
                "provider": "prometheus",
                "serviceName": "prometheus-k8s",
                "namespace": "monitoring",
                "url": "http://prometheus-k8s.monitoring.svc.cluster.local:9090",
            }],
        }),
    )
}

fn metadata(verbose: bool) -> Value {
    let namespaces: serde_json::Map<String, Value> = ["default", "monitoring"]
        .iter()
        .map(|ns| {
            let mut namespace = json!({"namespace": ns});
            if verbose {
                namespace["workloads"] = json!({
                    "sysbench": {
                        "workload_name": "sysbench",
                        "workload_type": "deployment",
                        "containers": {
                            "sysbench": {
                                "container_name": "sysbench",
                                "container_image_name": "quay.io/kruizehub/sysbench",
                            }
                        }
                    }
                });
            }
            (ns.to_string(), namespace)
        })
        .collect();
    json!({
        "datasources": {
            DATASOURCE: {
                "datasource_name": DATASOURCE,
                "clusters": {
                    "default": {"cluster_name": "default", "namespaces": namespaces}
                }
            }
        }
    })
}

impl State {
    fn import_metadata(&mut self, body: &Value) -> ApiResponse {
        if body["datasource_name"] != DATASOURCE {
            return error(format!("Datasource not found: {}", body["datasource_name"]));
        }
        self.metadata_imported = true;
        let mut imported = metadata(false);
        if let Some(cluster) =
            imported["datasources"][DATASOURCE]["clusters"]["default"].as_object_mut()
        {
            cluster.remove("namespaces");
        }
        ApiResponse::new(SUCCESS_STATUS_CODE, imported)
    }

    fn delete_metadata(&mut self) -> ApiResponse {
        if !std::mem::take(&mut self.metadata_imported) {
            return error("Metadata not found");
        }
        envelope(SUCCESS_STATUS_CODE, "Datasource metadata deleted successfully.")
    }

    fn list_metadata(&self, request: &ApiRequest) -> ApiResponse {
        if request.query_value("datasource") != Some(DATASOURCE) || !self.metadata_imported {
            return error("Metadata not found");
        }
        let verbose = request.query_value("verbose") == Some("true");
        ApiResponse::new(SUCCESS_200_STATUS_CODE, metadata(verbose))
    }
}
