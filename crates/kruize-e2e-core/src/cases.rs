//! Parameter tables for the table-driven scenarios.

use chrono::Duration;
use serde_json::Value;

use crate::checks::IntervalClass;
use crate::error::Result;
use crate::messages::{
    failed_records, metric_data_not_present, missing_mandatory_parameters, ERROR_STATUS_CODE,
};
use crate::payload::experiment::Experiment;
use crate::payload::results::{ResultRecord, DEFAULT_INTERVAL_START};
use crate::payload::TemplateValue;

pub const CPU_FORMATS: &[&str] = &["cores", "m"];

pub const MEMORY_FORMATS: &[&str] = &[
    "bytes", "Bytes", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei",
    "kB", "KB", "MB", "GB", "TB", "PB", "EB", "K", "k", "M", "G", "T", "P", "E",
];

// ---------------------------------------------------------------------------
// Interval durations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalCase {
    pub name: &'static str,
    pub interval_start_time: &'static str,
    pub interval_end_time: &'static str,
    pub expected: IntervalClass,
}

/// End times around a 15 minute measurement starting at
/// [`DEFAULT_INTERVAL_START`].
pub const INTERVAL_CASES: &[IntervalCase] = &[
    IntervalCase {
        name: "invalid_zero_diff",
        interval_start_time: DEFAULT_INTERVAL_START,
        interval_end_time: "2022-01-23T18:25:43.511Z",
        expected: IntervalClass::StartNotBeforeEnd,
    },
    IntervalCase {
        name: "invalid_minus_more_than_30s",
        interval_start_time: DEFAULT_INTERVAL_START,
        interval_end_time: "2022-01-23T18:40:12.511Z",
        expected: IntervalClass::OutOfTolerance,
    },
    IntervalCase {
        name: "valid_minus_30s",
        interval_start_time: DEFAULT_INTERVAL_START,
        interval_end_time: "2022-01-23T18:40:13.511Z",
        expected: IntervalClass::Valid,
    },
    IntervalCase {
        name: "invalid_plus_more_than_30s",
        interval_start_time: DEFAULT_INTERVAL_START,
        interval_end_time: "2022-01-23T18:41:14.511Z",
        expected: IntervalClass::OutOfTolerance,
    },
    IntervalCase {
        name: "valid_plus_30s",
        interval_start_time: DEFAULT_INTERVAL_START,
        interval_end_time: "2022-01-23T18:41:13.511Z",
        expected: IntervalClass::Valid,
    },
];

// ---------------------------------------------------------------------------
// Missing metrics
// ---------------------------------------------------------------------------

/// What is wrong with one record of a missing-metrics batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDefect {
    /// These containers carry no `metrics` at all.
    ContainerMetrics(&'static [&'static str]),
    /// These metrics are absent from every container or namespace.
    Metrics(&'static [&'static str]),
}

impl RecordDefect {
    /// Text the per-record error is expected to contain.
    pub fn expected_error(self, experiment_name: &str) -> String {
        match self {
            RecordDefect::ContainerMetrics(containers) => metric_data_not_present(
                containers.first().copied().unwrap_or_default(),
                experiment_name,
            ),
            RecordDefect::Metrics(_) => missing_mandatory_parameters(experiment_name),
        }
    }

    fn apply(self, record: ResultRecord) -> ResultRecord {
        match self {
            RecordDefect::ContainerMetrics(containers) => containers
                .iter()
                .fold(record, |r, c| r.without_container_metrics(c)),
            RecordDefect::Metrics(names) => record.without_metrics(names),
        }
    }
}

const NAMESPACE_METRIC_NAMES: &[&str] = &[
    "namespaceCpuRequest",
    "namespaceCpuLimit",
    "namespaceCpuUsage",
    "namespaceCpuThrottle",
    "namespaceMemoryRequest",
    "namespaceMemoryLimit",
    "namespaceMemoryUsage",
    "namespaceMemoryRSS",
    "namespaceTotalPods",
    "namespaceRunningPods",
];

/// A batch of `total` consecutive records where the listed indexes are defective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingMetricsCase {
    pub name: &'static str,
    pub total: usize,
    pub defects: &'static [(usize, RecordDefect)],
    /// Submitted against the namespace experiment instead of the container one.
    pub namespace: bool,
}

impl MissingMetricsCase {
    pub fn failed(&self) -> usize {
        self.defects.len()
    }

    pub fn expected_summary(&self) -> String {
        failed_records(self.total, self.failed())
    }

    pub fn experiment(&self) -> Experiment {
        if self.namespace {
            Experiment::remote_namespace()
        } else {
            Experiment::remote_container()
        }
    }

    /// The batch, one record per measurement interval.
    pub fn records(&self) -> Result<Vec<ResultRecord>> {
        let base = ResultRecord::for_experiment(&self.experiment());
        let mut records = base.series(self.total, Duration::minutes(15))?;
        for (index, defect) in self.defects {
            if let Some(record) = records.get_mut(*index) {
                *record = defect.apply(record.clone());
            }
        }
        Ok(records)
    }
}

pub const MISSING_METRICS_CASES: &[MissingMetricsCase] = &[
    MissingMetricsCase {
        name: "missing_metrics_single_res_single_container",
        total: 1,
        defects: &[(0, RecordDefect::ContainerMetrics(&["tfb-server-0"]))],
        namespace: false,
    },
    MissingMetricsCase {
        name: "missing_metrics_single_res_all_containers",
        total: 1,
        defects: &[(0, RecordDefect::ContainerMetrics(&["tfb-server-0", "tfb-server-1"]))],
        namespace: false,
    },
    MissingMetricsCase {
        name: "missing_metrics_bulk_res_single_container",
        total: 100,
        defects: &[(40, RecordDefect::ContainerMetrics(&["tfb-server-1"]))],
        namespace: false,
    },
    MissingMetricsCase {
        name: "missing_metrics_bulk_res_few_containers",
        total: 100,
        defects: &[
            (40, RecordDefect::ContainerMetrics(&["tfb-server-1"])),
            (41, RecordDefect::ContainerMetrics(&["tfb-server-1", "tfb-server-0"])),
        ],
        namespace: false,
    },
    MissingMetricsCase {
        name: "missing_metrics_bulk_res_few_containers_few_individual_metrics_missing",
        total: 100,
        defects: &[
            (40, RecordDefect::ContainerMetrics(&["tfb-server-1"])),
            (41, RecordDefect::ContainerMetrics(&["tfb-server-1", "tfb-server-0"])),
            (42, RecordDefect::Metrics(&["cpuUsage", "memoryUsage", "memoryRSS"])),
            (43, RecordDefect::Metrics(&["cpuUsage", "memoryUsage", "memoryRSS"])),
        ],
        namespace: false,
    },
    MissingMetricsCase {
        name: "missing_metrics_single_res_single_namespace",
        total: 1,
        defects: &[(0, RecordDefect::Metrics(NAMESPACE_METRIC_NAMES))],
        namespace: true,
    },
];

// ---------------------------------------------------------------------------
// Invalid update-results fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Timestamp,
    Amount,
    Format,
}

const CONTAINER_FIELDS: &[(&str, FieldKind)] = &[
    ("version", FieldKind::Text),
    ("experiment_name", FieldKind::Text),
    ("interval_start_time", FieldKind::Timestamp),
    ("interval_end_time", FieldKind::Timestamp),
    ("kubernetes_obj_type", FieldKind::Text),
    ("name", FieldKind::Text),
    ("namespace", FieldKind::Text),
    ("container_image_name", FieldKind::Text),
    ("container_name", FieldKind::Text),
    ("cpu_request_sum", FieldKind::Amount),
    ("cpu_request_format", FieldKind::Format),
    ("cpu_usage_avg", FieldKind::Amount),
    ("cpu_usage_format", FieldKind::Format),
    ("memory_request_sum", FieldKind::Amount),
    ("memory_usage_avg", FieldKind::Amount),
    ("memory_usage_format", FieldKind::Format),
    ("memory_rss_max", FieldKind::Amount),
];

const NAMESPACE_FIELDS: &[(&str, FieldKind)] = &[
    ("version", FieldKind::Text),
    ("experiment_name", FieldKind::Text),
    ("interval_start_time", FieldKind::Timestamp),
    ("interval_end_time", FieldKind::Timestamp),
    ("namespace", FieldKind::Text),
    ("namespace_cpu_request_sum", FieldKind::Amount),
    ("namespace_cpu_usage_avg", FieldKind::Amount),
    ("namespace_cpu_usage_format", FieldKind::Format),
    ("namespace_memory_usage_avg", FieldKind::Amount),
    ("namespace_memory_usage_format", FieldKind::Format),
];

/// One placeholder override for the update-results templates.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCase {
    pub name: String,
    pub field: &'static str,
    pub value: TemplateValue,
    pub expected_status: u16,
}

fn field_cases(fields: &[(&'static str, FieldKind)]) -> Vec<FieldCase> {
    let mut cases = Vec::new();
    for &(field, kind) in fields {
        let mut push = |prefix: &str, value: TemplateValue| {
            cases.push(FieldCase {
                name: format!("{prefix}_{field}"),
                field,
                value,
                expected_status: ERROR_STATUS_CODE,
            });
        };
        push("blank", TemplateValue::value(""));
        push("null", TemplateValue::Value(Value::Null));
        push("missing", TemplateValue::Omit);
        match kind {
            FieldKind::Timestamp => {
                push("invalid", TemplateValue::value("2022-13-45T25:61:00.000Z"))
            }
            FieldKind::Amount => push("invalid", TemplateValue::value(-1.5)),
            FieldKind::Format => push("invalid", TemplateValue::value("furlongs")),
            FieldKind::Text => {}
        }
    }
    cases
}

/// Blank, null, missing and invalid values for the container results template.
pub fn invalid_container_field_cases() -> Vec<FieldCase> {
    field_cases(CONTAINER_FIELDS)
}

/// Same for the namespace results template.
pub fn invalid_namespace_field_cases() -> Vec<FieldCase> {
    field_cases(NAMESPACE_FIELDS)
}
