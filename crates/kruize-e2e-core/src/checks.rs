//! Semantic checks on request timing and response content, beyond what the
//! structural schemas cover.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::error::{HarnessError, Result};
use crate::messages::{
    INVALID_INTERVAL_DURATION_MSG, NOTIFICATION_CODE_FOR_RECOMMENDATIONS_AVAILABLE,
    RECOMMENDATIONS_AVAILABLE, UPDATE_RESULTS_DATE_PRECEDE_ERROR_MSG,
};
use crate::payload::experiment::{Experiment, KubernetesObject};
use crate::payload::results::parse_timestamp;

/// Allowed drift between an interval and the measurement duration, in seconds.
pub const INTERVAL_TOLERANCE_SECS: i64 = 30;

// ---------------------------------------------------------------------------
// Intervals
// ---------------------------------------------------------------------------

/// How the service will judge a result interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalClass {
    Valid,
    /// End is not after start.
    StartNotBeforeEnd,
    /// Length differs from the measurement duration by more than the tolerance.
    OutOfTolerance,
}

impl IntervalClass {
    /// Per-record error the service reports for this class.
    pub fn expected_error(self) -> Option<&'static str> {
        match self {
            IntervalClass::Valid => None,
            IntervalClass::StartNotBeforeEnd => Some(UPDATE_RESULTS_DATE_PRECEDE_ERROR_MSG),
            IntervalClass::OutOfTolerance => Some(INVALID_INTERVAL_DURATION_MSG),
        }
    }
}

/// Parse `15min`, `2min`, `1h`, `1hr`, `30s`, `30sec`, `1day`.
pub fn parse_measurement_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: i64 = digits
        .parse()
        .map_err(|_| HarnessError::check(format!("measurement duration '{raw}' has no amount")))?;
    match unit.trim().to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::seconds(amount)),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(Duration::minutes(amount)),
        "h" | "hr" | "hrs" | "hour" | "hours" => Ok(Duration::hours(amount)),
        "d" | "day" | "days" => Ok(Duration::days(amount)),
        other => Err(HarnessError::check(format!(
            "measurement duration '{raw}' has unknown unit '{other}'"
        ))),
    }
}

pub fn classify_interval(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    measurement: Duration,
) -> IntervalClass {
    if end <= start {
        return IntervalClass::StartNotBeforeEnd;
    }
    let drift = (end - start) - measurement;
    if drift.num_milliseconds().abs() <= INTERVAL_TOLERANCE_SECS * 1000 {
        IntervalClass::Valid
    } else {
        IntervalClass::OutOfTolerance
    }
}

/// [`classify_interval`] on the raw strings of a result record.
pub fn classify_interval_str(
    start: &str,
    end: &str,
    measurement_duration: &str,
) -> Result<IntervalClass> {
    Ok(classify_interval(
        parse_timestamp(start)?,
        parse_timestamp(end)?,
        parse_measurement_duration(measurement_duration)?,
    ))
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// The `recommendations` objects of a listRecommendations entry, one per
/// container or one for the namespace.
pub fn recommendation_objects(entry: &Value) -> Vec<&Value> {
    let mut found = Vec::new();
    for object in entry["kubernetes_objects"].as_array().into_iter().flatten() {
        if let Some(recommendations) = object.pointer("/namespaces/recommendations") {
            found.push(recommendations);
        }
        for container in children(&object["containers"]) {
            if let Some(recommendations) = container.get("recommendations") {
                found.push(recommendations);
            }
        }
    }
    found
}

/// Array elements or object values; nothing for other JSON.
fn children(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

/// `data` holds at least one timestamp bucket.
pub fn check_data_present(recommendations: &Value) -> Result<()> {
    match recommendations.get("data").and_then(Value::as_object) {
        Some(data) if !data.is_empty() => Ok(()),
        _ => Err(HarnessError::check("recommendation data is empty")),
    }
}

/// Data is present and the code-keyed notifications announce it.
pub fn check_recommendations_available(recommendations: &Value) -> Result<()> {
    check_data_present(recommendations)?;
    let message = recommendations
        .pointer(&format!(
            "/notifications/{NOTIFICATION_CODE_FOR_RECOMMENDATIONS_AVAILABLE}/message"
        ))
        .and_then(Value::as_str);
    if message == Some(RECOMMENDATIONS_AVAILABLE) {
        Ok(())
    } else {
        Err(HarnessError::check(format!(
            "notification {NOTIFICATION_CODE_FOR_RECOMMENDATIONS_AVAILABLE} should read \
             '{RECOMMENDATIONS_AVAILABLE}', got {message:?}"
        )))
    }
}

fn check_amount(config: &Value, path: &str) -> Result<()> {
    let node = config
        .pointer(path)
        .ok_or_else(|| HarnessError::check(format!("config is missing {path}")))?;
    if !node["amount"].is_number() {
        return Err(HarnessError::check(format!("{path}/amount is not a number")));
    }
    match node["format"].as_str() {
        Some(format) if !format.is_empty() => Ok(()),
        _ => Err(HarnessError::check(format!("{path}/format is empty"))),
    }
}

/// cpu and memory requests and limits, each with an amount and a format.
pub fn check_config(config: &Value) -> Result<()> {
    for path in ["/requests/cpu", "/requests/memory", "/limits/cpu", "/limits/memory"] {
        check_amount(config, path)?;
    }
    Ok(())
}

/// Every config under `recommendation_terms`, both directly on a term and
/// under each of its recommendation engines.
fn term_configs(bucket: &Value) -> Vec<&Value> {
    let mut configs = Vec::new();
    for term in children(&bucket["recommendation_terms"]) {
        if let Some(config) = term.get("config") {
            configs.push(config);
        }
        for engine in children(&term["recommendation_engines"]) {
            if let Some(config) = engine.get("config") {
                configs.push(config);
            }
        }
    }
    configs
}

fn expect_field(field: &str, expected: &str, entry: &Value) -> Result<()> {
    let actual = entry[field].as_str().unwrap_or_default();
    if actual == expected {
        Ok(())
    } else {
        Err(HarnessError::check(format!(
            "{field}: expected '{expected}', got '{actual}'"
        )))
    }
}

fn check_objects(entry: &Value, experiment: &Experiment) -> Result<()> {
    let objects = entry["kubernetes_objects"].as_array().map(Vec::as_slice).unwrap_or_default();
    if objects.len() != experiment.kubernetes_objects.len() {
        return Err(HarnessError::check(format!(
            "expected {} kubernetes objects, got {}",
            experiment.kubernetes_objects.len(),
            objects.len()
        )));
    }
    for (actual, declared) in objects.iter().zip(&experiment.kubernetes_objects) {
        match declared {
            KubernetesObject::Workload {
                kind,
                name,
                namespace,
                containers,
            } => {
                expect_field("type", kind, actual)?;
                expect_field("name", name, actual)?;
                expect_field("namespace", namespace, actual)?;
                let mut listed: Vec<&str> = children(&actual["containers"])
                    .filter_map(|c| c["container_name"].as_str())
                    .collect();
                let mut wanted: Vec<&str> =
                    containers.iter().map(|c| c.container_name.as_str()).collect();
                listed.sort_unstable();
                wanted.sort_unstable();
                if listed != wanted {
                    return Err(HarnessError::check(format!(
                        "containers: expected {wanted:?}, got {listed:?}"
                    )));
                }
            }
            KubernetesObject::Namespace { namespaces } => {
                expect_field("namespace", &namespaces.namespace, &actual["namespaces"])?;
            }
        }
    }
    Ok(())
}

/// Check a local monitoring listRecommendations body against the experiment
/// it was generated for.
///
/// The entry must name the experiment and its cluster, list the same
/// kubernetes objects, and every recommendation config in every timestamp
/// bucket must carry cpu and memory requests and limits. At least one config
/// must exist.
pub fn check_local_recommendations(body: &Value, experiment: &Experiment) -> Result<()> {
    let entry = body
        .as_array()
        .and_then(|entries| entries.first())
        .ok_or_else(|| HarnessError::check("listRecommendations returned no entries"))?;
    expect_field("experiment_name", &experiment.experiment_name, entry)?;
    expect_field("cluster_name", &experiment.cluster_name, entry)?;
    check_objects(entry, experiment)?;

    let mut configs = 0usize;
    for recommendations in recommendation_objects(entry) {
        check_data_present(recommendations)?;
        for (timestamp, bucket) in recommendations["data"].as_object().into_iter().flatten() {
            for config in term_configs(bucket) {
                check_config(config)
                    .map_err(|e| HarnessError::check(format!("bucket {timestamp}: {e}")))?;
                configs += 1;
            }
        }
    }
    if configs == 0 {
        return Err(HarnessError::check(format!(
            "no recommendation config found for {}",
            experiment.experiment_name
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Experiments
// ---------------------------------------------------------------------------

fn results_len(container: &Value) -> usize {
    match &container["results"] {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => 0,
    }
}

/// Number of stored results per container for one experiment of a
/// `listExperiments?results=true` body.
pub fn results_count(body: &Value, experiment_name: &str) -> Result<BTreeMap<String, usize>> {
    let entry = children(body)
        .find(|e| e["experiment_name"].as_str() == Some(experiment_name))
        .ok_or_else(|| HarnessError::check(format!("experiment {experiment_name} not listed")))?;
    let mut counts = BTreeMap::new();
    for object in entry["kubernetes_objects"].as_array().into_iter().flatten() {
        for container in children(&object["containers"]) {
            if let Some(name) = container["container_name"].as_str() {
                counts.insert(name.to_string(), results_len(container));
            }
        }
        if let Some(ns) = object.get("namespaces") {
            if let Some(name) = ns["namespace"].as_str() {
                counts.insert(name.to_string(), results_len(ns));
            }
        }
    }
    Ok(counts)
}

/// Every container (or namespace) of the experiment has exactly `expected` results.
pub fn check_results_count(body: &Value, experiment_name: &str, expected: usize) -> Result<()> {
    let counts = results_count(body, experiment_name)?;
    if counts.is_empty() {
        return Err(HarnessError::check(format!("{experiment_name}: no containers listed")));
    }
    for (name, count) in &counts {
        if *count != expected {
            return Err(HarnessError::check(format!(
                "{experiment_name}/{name}: expected {expected} results, found {count}"
            )));
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
