//! Metric result records for `POST /updateResults`.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::experiment::{Experiment, KubernetesObject};
use super::{TemplateVars, UPDATE_RESULTS_NAMESPACE_TEMPLATE, UPDATE_RESULTS_TEMPLATE};
use crate::error::{HarnessError, Result};

pub const DEFAULT_INTERVAL_START: &str = "2022-01-23T18:25:43.511Z";
pub const DEFAULT_INTERVAL_END: &str = "2022-01-23T18:40:43.511Z";

pub const CPU_METRICS: &[&str] = &["cpuRequest", "cpuLimit", "cpuUsage", "cpuThrottle"];
pub const MEMORY_METRICS: &[&str] = &["memoryRequest", "memoryLimit", "memoryUsage", "memoryRSS"];

/// Format a timestamp the way the service writes them: millisecond precision, `Z`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| HarnessError::check(format!("invalid timestamp '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Aggregation {
    fn min(mut self, v: f64) -> Self {
        self.min = Some(v);
        self
    }
    fn max(mut self, v: f64) -> Self {
        self.max = Some(v);
        self
    }
    fn sum(mut self, v: f64) -> Self {
        self.sum = Some(v);
        self
    }
    fn avg(mut self, v: f64) -> Self {
        self.avg = Some(v);
        self
    }
    fn format(mut self, f: &str) -> Self {
        self.format = Some(f.to_string());
        self
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        [&mut self.min, &mut self.max, &mut self.sum, &mut self.avg]
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResults {
    pub aggregation_info: Aggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub results: MetricResults,
}

impl Metric {
    fn new(name: &str, aggregation: Aggregation) -> Self {
        Self {
            name: name.to_string(),
            results: MetricResults {
                aggregation_info: aggregation,
            },
        }
    }

    fn is_cpu(&self) -> bool {
        self.name.starts_with("cpu") || self.name.starts_with("namespaceCpu")
    }

    fn is_memory(&self) -> bool {
        self.name.starts_with("memory") || self.name.starts_with("namespaceMemory")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerResult {
    pub container_image_name: String,
    pub container_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceResult {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultObject {
    Workload {
        #[serde(rename = "type")]
        kind: String,
        name: String,
        namespace: String,
        containers: Vec<ContainerResult>,
    },
    Namespace {
        namespaces: NamespaceResult,
    },
}

impl ResultObject {
    fn metrics_mut(&mut self) -> Box<dyn Iterator<Item = &mut Vec<Metric>> + '_> {
        match self {
            ResultObject::Workload { containers, .. } => {
                Box::new(containers.iter_mut().map(|c| &mut c.metrics))
            }
            ResultObject::Namespace { namespaces } => {
                Box::new(std::iter::once(&mut namespaces.metrics))
            }
        }
    }
}

/// One interval-scoped result record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub version: String,
    pub experiment_name: String,
    pub interval_start_time: String,
    pub interval_end_time: String,
    pub kubernetes_objects: Vec<ResultObject>,
}

// ---------------------------------------------------------------------------
// Default metric values
// ---------------------------------------------------------------------------

pub fn container_metrics() -> Vec<Metric> {
    let cores = |a: Aggregation| a.format("cores");
    let mib = |a: Aggregation| a.format("MiB");
    vec![
        Metric::new("cpuRequest", cores(Aggregation::default().sum(4.4).avg(1.1))),
        Metric::new("cpuLimit", cores(Aggregation::default().sum(2.0).avg(0.5))),
        Metric::new(
            "cpuUsage",
            cores(Aggregation::default().min(0.14).max(0.84).sum(0.84).avg(0.12)),
        ),
        Metric::new(
            "cpuThrottle",
            cores(Aggregation::default().max(0.09).sum(0.19).avg(0.045)),
        ),
        Metric::new("memoryRequest", mib(Aggregation::default().sum(250.85).avg(50.21))),
        Metric::new("memoryLimit", mib(Aggregation::default().sum(500.0).avg(100.0))),
        Metric::new(
            "memoryUsage",
            mib(Aggregation::default().min(50.6).max(198.5).sum(198.5).avg(40.1)),
        ),
        Metric::new(
            "memoryRSS",
            mib(Aggregation::default().min(50.6).max(123.6).sum(123.6).avg(31.91)),
        ),
    ]
}

pub fn namespace_metrics() -> Vec<Metric> {
    let cores = |a: Aggregation| a.format("cores");
    let mib = |a: Aggregation| a.format("MiB");
    vec![
        Metric::new("namespaceCpuRequest", cores(Aggregation::default().sum(4.4))),
        Metric::new("namespaceCpuLimit", cores(Aggregation::default().sum(8.0))),
        Metric::new(
            "namespaceCpuUsage",
            cores(Aggregation::default().min(0.14).max(0.84).avg(0.12)),
        ),
        Metric::new(
            "namespaceCpuThrottle",
            cores(Aggregation::default().min(0.01).max(0.09).avg(0.045)),
        ),
        Metric::new("namespaceMemoryRequest", mib(Aggregation::default().sum(250.85))),
        Metric::new("namespaceMemoryLimit", mib(Aggregation::default().sum(500.0))),
        Metric::new(
            "namespaceMemoryUsage",
            mib(Aggregation::default().min(50.6).max(198.5).avg(40.1)),
        ),
        Metric::new(
            "namespaceMemoryRSS",
            mib(Aggregation::default().min(50.6).max(123.6).avg(31.91)),
        ),
        Metric::new("namespaceTotalPods", Aggregation::default().sum(3.0)),
        Metric::new("namespaceRunningPods", Aggregation::default().sum(3.0)),
    ]
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

impl ResultRecord {
    /// A record matching the experiment's objects: container metrics for
    /// workloads, namespace metrics for namespaces. Default interval.
    pub fn for_experiment(experiment: &Experiment) -> Self {
        let kubernetes_objects = experiment
            .kubernetes_objects
            .iter()
            .map(|object| match object {
                KubernetesObject::Workload {
                    kind,
                    name,
                    namespace,
                    containers,
                } => ResultObject::Workload {
                    kind: kind.clone(),
                    name: name.clone(),
                    namespace: namespace.clone(),
                    containers: containers
                        .iter()
                        .map(|c| ContainerResult {
                            container_image_name: c.container_image_name.clone(),
                            container_name: c.container_name.clone(),
                            metrics: container_metrics(),
                        })
                        .collect(),
                },
                KubernetesObject::Namespace { namespaces } => ResultObject::Namespace {
                    namespaces: NamespaceResult {
                        namespace: namespaces.namespace.clone(),
                        metrics: namespace_metrics(),
                    },
                },
            })
            .collect();
        Self {
            version: experiment.version.clone(),
            experiment_name: experiment.experiment_name.clone(),
            interval_start_time: DEFAULT_INTERVAL_START.into(),
            interval_end_time: DEFAULT_INTERVAL_END.into(),
            kubernetes_objects,
        }
    }

    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    pub fn with_interval(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.interval_start_time = format_timestamp(start);
        self.interval_end_time = format_timestamp(end);
        self
    }

    pub fn with_end_time(mut self, end: impl Into<String>) -> Self {
        self.interval_end_time = end.into();
        self
    }

    /// Rename the first workload object (kubernetes object name mismatch cases).
    pub fn with_object_name(mut self, new_name: impl Into<String>) -> Self {
        let new_name = new_name.into();
        if let Some(ResultObject::Workload { name, .. }) = self.kubernetes_objects.first_mut() {
            *name = new_name;
        }
        self
    }

    /// Change the first workload object's `type` (object type mismatch cases).
    pub fn with_object_type(mut self, new_kind: impl Into<String>) -> Self {
        let new_kind = new_kind.into();
        if let Some(ResultObject::Workload { kind, .. }) = self.kubernetes_objects.first_mut() {
            *kind = new_kind;
        }
        self
    }

    /// Move both interval bounds by `offset`.
    pub fn shifted(self, offset: Duration) -> Result<Self> {
        let start = parse_timestamp(&self.interval_start_time)? + offset;
        let end = parse_timestamp(&self.interval_end_time)? + offset;
        Ok(self.with_interval(start, end))
    }

    pub fn with_cpu_format(self, format: &str) -> Self {
        self.map_metrics(|m| {
            if m.is_cpu() {
                m.results.aggregation_info.format = Some(format.to_string());
            }
        })
    }

    pub fn with_memory_format(self, format: &str) -> Self {
        self.map_metrics(|m| {
            if m.is_memory() {
                m.results.aggregation_info.format = Some(format.to_string());
            }
        })
    }

    /// Every aggregate value set to zero.
    pub fn zeroed(self) -> Self {
        self.map_metrics(|m| m.results.aggregation_info.values_mut().for_each(|v| *v = 0.0))
    }

    /// Drop the named metrics everywhere in the record.
    pub fn without_metrics(mut self, names: &[&str]) -> Self {
        for object in &mut self.kubernetes_objects {
            for metrics in object.metrics_mut() {
                metrics.retain(|m| !names.contains(&m.name.as_str()));
            }
        }
        self
    }

    /// Drop the whole `metrics` list of one container.
    pub fn without_container_metrics(mut self, container_name: &str) -> Self {
        for object in &mut self.kubernetes_objects {
            if let ResultObject::Workload { containers, .. } = object {
                containers
                    .iter_mut()
                    .filter(|c| c.container_name == container_name)
                    .for_each(|c| c.metrics.clear());
            }
        }
        self
    }

    /// Drop every metric of every container or namespace.
    pub fn without_all_metrics(mut self) -> Self {
        for object in &mut self.kubernetes_objects {
            object.metrics_mut().for_each(Vec::clear);
        }
        self
    }

    fn map_metrics(mut self, mut f: impl FnMut(&mut Metric)) -> Self {
        for object in &mut self.kubernetes_objects {
            for metrics in object.metrics_mut() {
                metrics.iter_mut().for_each(&mut f);
            }
        }
        self
    }

    /// `count` consecutive records, each `step` long, starting at this
    /// record's `interval_start_time`.
    pub fn series(&self, count: usize, step: Duration) -> Result<Vec<Self>> {
        let count = i32::try_from(count)
            .map_err(|_| HarnessError::check(format!("series of {count} records is too long")))?;
        let start = parse_timestamp(&self.interval_start_time)?;
        Ok((0..count)
            .map(|i| {
                let offset = step * i;
                self.clone().with_interval(start + offset, start + offset + step)
            })
            .collect())
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.kubernetes_objects.first(), Some(ResultObject::Namespace { .. }))
    }

    /// Template matching this record's shape.
    pub fn template_name(&self) -> &'static str {
        if self.is_namespace() {
            UPDATE_RESULTS_NAMESPACE_TEMPLATE
        } else {
            UPDATE_RESULTS_TEMPLATE
        }
    }

    /// Placeholder values that render this record (first object, first
    /// container) through [`template_name`](Self::template_name).
    ///
    /// Metric placeholders are the snake_case metric name plus the
    /// aggregate, e.g. `cpu_usage_avg` or `namespace_memory_rss_format`.
    pub fn template_vars(&self) -> Result<TemplateVars> {
        let mut vars = TemplateVars::new()
            .with("version", self.version.as_str())
            .with("experiment_name", self.experiment_name.as_str())
            .with("interval_start_time", self.interval_start_time.as_str())
            .with("interval_end_time", self.interval_end_time.as_str());
        let metrics = match self.kubernetes_objects.first() {
            Some(ResultObject::Workload {
                kind,
                name,
                namespace,
                containers,
            }) => {
                let container = containers.first().ok_or_else(|| {
                    HarnessError::check(format!("result for '{name}' has no containers"))
                })?;
                vars.set("kubernetes_obj_type", kind.as_str())
                    .set("name", name.as_str())
                    .set("namespace", namespace.as_str())
                    .set("container_image_name", container.container_image_name.as_str())
                    .set("container_name", container.container_name.as_str());
                &container.metrics
            }
            Some(ResultObject::Namespace { namespaces }) => {
                vars.set("namespace", namespaces.namespace.as_str());
                &namespaces.metrics
            }
            None => {
                return Err(HarnessError::check(format!(
                    "result for '{}' has no kubernetes objects",
                    self.experiment_name
                )))
            }
        };
        for metric in metrics {
            let prefix = metric.name.to_snake_case();
            let agg = &metric.results.aggregation_info;
            vars.set(format!("{prefix}_name"), metric.name.as_str());
            let values = [
                ("min", agg.min),
                ("max", agg.max),
                ("sum", agg.sum),
                ("avg", agg.avg),
            ];
            for (key, value) in values {
                if let Some(v) = value {
                    vars.set(format!("{prefix}_{key}"), v);
                }
            }
            if let Some(format) = &agg.format {
                vars.set(format!("{prefix}_format"), format.as_str());
            }
        }
        Ok(vars)
    }
}

/// Request body for a batch of records.
pub fn to_payload(records: &[ResultRecord]) -> Result<Value> {
    Ok(serde_json::to_value(records)?)
}
