//! Status codes and messages the Kruize service is expected to answer with.

pub const SUCCESS_STATUS: &str = "SUCCESS";
pub const ERROR_STATUS: &str = "ERROR";

/// Write operations (create experiment, update results, create profile).
pub const SUCCESS_STATUS_CODE: u16 = 201;
/// Read operations (list experiments, list recommendations, list profiles).
pub const SUCCESS_200_STATUS_CODE: u16 = 200;
pub const ERROR_STATUS_CODE: u16 = 400;
/// Per-record duplicate conflict inside a bulk update-results response.
pub const ERROR_409_STATUS_CODE: u16 = 409;

pub const CREATE_EXP_SUCCESS_MSG: &str = concat!(
    "Experiment registered successfully with Kruize. ",
    "View registered experiments at /listExperiments"
);
pub const DELETE_EXP_SUCCESS_MSG: &str =
    "Experiment deleted successfully. View registered experiments at /listExperiments";
pub const CREATE_EXP_BULK_ERROR_MSG: &str =
    "At present, the system does not support bulk entries!";
pub const EXPERIMENT_NOT_FOUND_MSG: &str = "Experiment not found!";

pub const UPDATE_RESULTS_SUCCESS_MSG: &str =
    "Results updated successfully! View saved results at /listExperiments .";
pub const DUPLICATE_RECORDS_MSG: &str = "An entry for this record already exists!";
pub const UPDATE_RESULTS_DATE_PRECEDE_ERROR_MSG: &str =
    "The Start time should precede the End time!";
pub const INVALID_INTERVAL_DURATION_MSG: &str = concat!(
    "Interval duration cannot be less than or greater than measurement_duration ",
    "by more than 30 seconds"
);
pub const EXPERIMENT_NAME_NOT_FOUND_PREFIX: &str = "Not Found: experiment_name does not exist: ";

pub const KUBERNETES_OBJECT_TYPE_MISMATCH: &str = "Kubernetes Object Types MisMatched";
pub const KUBERNETES_OBJECT_NAME_MISMATCH: &str = "Kubernetes Object Names MisMatched";
pub const MISSING_MANDATORY_PARAMETERS: &str =
    "Missing one of the following mandatory parameters for experiment";
pub const ALL_ZERO_METRICS: &str = "Cannot process results with all zero metric values";
pub const METRIC_DATA_NOT_PRESENT: &str = "Metric data is not present for container";

pub const RECOMMENDATIONS_AVAILABLE: &str = "Recommendations Are Available";
pub const NOTIFICATION_CODE_FOR_RECOMMENDATIONS_AVAILABLE: &str = "111000";

/// Summary message for a partially failed update-results batch.
pub fn failed_records(total: usize, failed: usize) -> String {
    format!("Out of a total of {total} records, {failed} failed to save")
}

/// Per-record error when results are posted for an unknown experiment.
pub fn experiment_name_not_found(experiment_name: &str) -> String {
    format!("{EXPERIMENT_NAME_NOT_FOUND_PREFIX}{experiment_name}")
}

pub fn create_metric_profile_success(name: &str) -> String {
    format!(
        "Metric Profile : {name} created successfully. \
         View all metric profiles at /listMetricProfiles"
    )
}

pub fn create_metadata_profile_success(name: &str) -> String {
    format!(
        "Metadata Profile : {name} created successfully. \
         View Metadata Profiles at /listMetadataProfiles"
    )
}

pub fn metric_data_not_present(container: &str, experiment_name: &str) -> String {
    format!("{METRIC_DATA_NOT_PRESENT} : {container} for experiment: {experiment_name}")
}

pub fn missing_mandatory_parameters(experiment_name: &str) -> String {
    format!("{MISSING_MANDATORY_PARAMETERS} - {experiment_name}")
}
