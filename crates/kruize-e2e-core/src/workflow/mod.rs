//! Scenario orchestration.
//!
//! A [`Scenario`] is a named, tagged closure over a [`Context`]. The
//! [`Runner`] gives every scenario a fresh context, stops it at the first
//! failed assertion, and then runs the cleanups it registered. Cleanup
//! failures are logged, never reported as scenario failures.

pub mod scenarios;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use heck::ToSnakeCase;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{ApiResponse, KruizeClient, ListExperimentsQuery};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::messages::{
    create_metadata_profile_success, create_metric_profile_success, failed_records,
    CREATE_EXP_SUCCESS_MSG, DELETE_EXP_SUCCESS_MSG, ERROR_STATUS_CODE, SUCCESS_200_STATUS_CODE,
    SUCCESS_STATUS_CODE, UPDATE_RESULTS_SUCCESS_MSG,
};
use crate::payload::experiment::Experiment;
use crate::payload::profiles::{
    import_metadata_request, metadata_profile, metric_profile, profile_name,
};
use crate::payload::results::{to_payload, ResultRecord};
use crate::payload::{write_payload, Renderer};
use crate::response::{expect_error, expect_status, expect_success, Envelope};
use crate::schema::{catalog, ensure_valid};

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suite {
    /// Remote monitoring: results are pushed by the harness.
    Remote,
    /// Local monitoring: the service reads metrics from its datasource.
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Sanity,
    Negative,
    Extended,
    E2e,
}

macro_rules! keyword_enum {
    ($ty:ty, $what:literal, { $($variant:path => $name:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $($variant => $name,)+
                })
            }
        }

        impl FromStr for $ty {
            type Err = HarnessError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(HarnessError::config(format!(
                        concat!("unknown ", $what, " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

keyword_enum!(Suite, "suite", { Suite::Remote => "remote", Suite::Local => "local" });
keyword_enum!(Tag, "tag", {
    Tag::Sanity => "sanity",
    Tag::Negative => "negative",
    Tag::Extended => "extended",
    Tag::E2e => "e2e",
});

type ScenarioFn = Box<dyn Fn(&mut Context<'_>) -> Result<()>>;

pub struct Scenario {
    pub name: String,
    pub suite: Suite,
    pub tags: Vec<Tag>,
    run: ScenarioFn,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("suite", &self.suite)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl Scenario {
    pub fn new<F>(name: impl Into<String>, suite: Suite, tags: &[Tag], run: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<()> + 'static,
    {
        Self {
            name: name.into(),
            suite,
            tags: tags.to_vec(),
            run: Box::new(run),
        }
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Which scenarios to run. Empty fields select everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub suite: Option<Suite>,
    /// A scenario matches when it carries any of these.
    pub tags: Vec<Tag>,
    /// Substring of the scenario name.
    pub filter: Option<String>,
}

impl Selection {
    pub fn matches(&self, scenario: &Scenario) -> bool {
        self.suite.map_or(true, |suite| scenario.suite == suite)
            && (self.tags.is_empty() || self.tags.iter().any(|t| scenario.has_tag(*t)))
            && self
                .filter
                .as_deref()
                .map_or(true, |needle| scenario.name.contains(needle))
    }

    pub fn apply<'s>(&self, scenarios: &'s [Scenario]) -> Vec<&'s Scenario> {
        scenarios.iter().filter(|s| self.matches(s)).collect()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Something a scenario created and must remove.
#[derive(Debug, Clone, PartialEq)]
pub enum Cleanup {
    Experiment { name: String, rm: bool },
    MetricProfile(String),
    MetadataProfile(String),
    Metadata(Value),
}

/// State and steps available to a running scenario.
pub struct Context<'a> {
    pub client: &'a KruizeClient,
    pub config: &'a HarnessConfig,
    pub renderer: &'a Renderer,
    scenario: &'a str,
    sleep: &'a dyn Fn(Duration),
    cleanups: Vec<Cleanup>,
    payloads: usize,
}

impl<'a> Context<'a> {
    pub fn scenario(&self) -> &str {
        self.scenario
    }

    pub fn step(&self, what: &str) {
        info!(scenario = self.scenario, step = what, "step");
    }

    pub fn register(&mut self, cleanup: Cleanup) {
        if !self.cleanups.contains(&cleanup) {
            self.cleanups.push(cleanup);
        }
    }

    fn forget(&mut self, cleanup: &Cleanup) {
        self.cleanups.retain(|c| c != cleanup);
    }

    /// Write a payload under the scratch directory before it is submitted.
    pub fn save_payload(&mut self, label: &str, payload: &Value) -> Result<PathBuf> {
        self.payloads += 1;
        let dir = self.config.scratch_dir.join(self.scenario.to_snake_case());
        write_payload(&dir, &format!("{:03}_{label}.json", self.payloads), payload)
    }

    /// Fixed wait for the service's aggregation window.
    pub fn wait_for_recommendations(&self) {
        let wait = self.config.recommendation_wait();
        info!(
            scenario = self.scenario,
            secs = wait.as_secs(),
            "waiting before generating recommendations"
        );
        (self.sleep)(wait);
    }

    // -- experiments -------------------------------------------------------

    /// Delete without asserting; the experiment may not exist.
    pub fn delete_experiment_if_exists(&self, experiment: &Experiment) {
        let rm = is_remote(experiment);
        match self.client.delete_experiment(&experiment.experiment_name, rm) {
            Ok(response) => debug!(
                experiment = %experiment.experiment_name,
                status = response.status,
                "pre-run delete"
            ),
            Err(e) => warn!(
                experiment = %experiment.experiment_name,
                error = %e,
                "pre-run delete failed"
            ),
        }
    }

    /// Reset, create, assert success and schedule the delete.
    pub fn create_experiment(&mut self, experiment: &Experiment) -> Result<()> {
        self.step(&format!("create experiment {}", experiment.experiment_name));
        self.delete_experiment_if_exists(experiment);
        let payload = experiment.to_payload()?;
        self.save_payload("create_experiment", &payload)?;
        let response = self.client.create_experiment(&payload)?;
        expect_success(&response, "createExperiment", SUCCESS_STATUS_CODE, CREATE_EXP_SUCCESS_MSG)?;
        self.register(Cleanup::Experiment {
            name: experiment.experiment_name.clone(),
            rm: is_remote(experiment),
        });
        Ok(())
    }

    /// Delete and assert success.
    pub fn delete_experiment(&mut self, experiment: &Experiment) -> Result<()> {
        self.step(&format!("delete experiment {}", experiment.experiment_name));
        let rm = is_remote(experiment);
        let response = self.client.delete_experiment(&experiment.experiment_name, rm)?;
        expect_success(&response, "deleteExperiment", SUCCESS_STATUS_CODE, DELETE_EXP_SUCCESS_MSG)?;
        self.forget(&Cleanup::Experiment {
            name: experiment.experiment_name.clone(),
            rm,
        });
        Ok(())
    }

    /// `listExperiments?results=true` for a remote experiment, schema checked.
    pub fn list_experiment_results(&self, experiment_name: &str) -> Result<Value> {
        let response = self.client.list_experiments(&ListExperimentsQuery {
            results: Some(true),
            recommendations: Some(false),
            latest: Some(false),
            rm: Some(true),
            ..ListExperimentsQuery::named(experiment_name)
        })?;
        expect_status(&response, "listExperiments", SUCCESS_200_STATUS_CODE)?;
        ensure_valid("list_experiments", &catalog::list_experiments(), &response.body)?;
        Ok(response.body)
    }

    // -- results -----------------------------------------------------------

    pub fn post_results(&mut self, payload: &Value) -> Result<ApiResponse> {
        self.save_payload("update_results", payload)?;
        self.client.update_results(payload)
    }

    pub fn update_results(&mut self, records: &[ResultRecord]) -> Result<ApiResponse> {
        self.post_results(&to_payload(records)?)
    }

    pub fn expect_results_saved(&mut self, records: &[ResultRecord]) -> Result<()> {
        self.step(&format!("update {} result(s)", records.len()));
        let response = self.update_results(records)?;
        expect_success(
            &response,
            "updateResults",
            SUCCESS_STATUS_CODE,
            UPDATE_RESULTS_SUCCESS_MSG,
        )?;
        Ok(())
    }

    /// The batch is rejected with the `failed of total` summary.
    pub fn expect_results_rejected(
        &mut self,
        records: &[ResultRecord],
        failed: usize,
    ) -> Result<Envelope> {
        self.expect_payload_rejected(&to_payload(records)?, records.len(), failed)
    }

    /// Same for a payload that did not come from typed records.
    pub fn expect_payload_rejected(
        &mut self,
        payload: &Value,
        total: usize,
        failed: usize,
    ) -> Result<Envelope> {
        self.step(&format!("update {total} result(s), expecting {failed} failure(s)"));
        let response = self.post_results(payload)?;
        let summary = failed_records(total, failed);
        let envelope = expect_error(&response, "updateResults", ERROR_STATUS_CODE, &summary)?;
        if envelope.message != summary {
            return Err(HarnessError::UnexpectedField {
                operation: "updateResults".into(),
                field: "message".into(),
                expected: summary,
                actual: envelope.message,
            });
        }
        Ok(envelope)
    }

    // -- profiles and metadata ---------------------------------------------

    /// Create the local monitoring metric profile for this cluster type and
    /// check it is listed.
    pub fn install_metric_profile(&mut self) -> Result<String> {
        let profile = metric_profile(self.renderer, self.config.cluster_type)?;
        let name = profile_name(&profile)?.to_string();
        self.step(&format!("create metric profile {name}"));
        log_best_effort("deleteMetricProfile", self.client.delete_metric_profile(&name));
        self.save_payload("metric_profile", &profile)?;
        let response = self.client.create_metric_profile(&profile)?;
        expect_success(
            &response,
            "createMetricProfile",
            SUCCESS_STATUS_CODE,
            &create_metric_profile_success(&name),
        )?;
        self.register(Cleanup::MetricProfile(name.clone()));

        let listed = self.client.list_metric_profiles(Some(name.as_str()), None)?;
        expect_status(&listed, "listMetricProfiles", SUCCESS_200_STATUS_CODE)?;
        ensure_valid("list_metric_profiles", &catalog::list_metric_profiles(), &listed.body)?;
        Ok(name)
    }

    pub fn delete_metric_profile(&mut self, name: &str) -> Result<()> {
        self.step(&format!("delete metric profile {name}"));
        let response = self.client.delete_metric_profile(name)?;
        expect_status(&response, "deleteMetricProfile", SUCCESS_STATUS_CODE)?;
        self.forget(&Cleanup::MetricProfile(name.to_string()));
        Ok(())
    }

    pub fn install_metadata_profile(&mut self) -> Result<String> {
        let profile = metadata_profile(self.renderer)?;
        let name = profile_name(&profile)?.to_string();
        self.step(&format!("create metadata profile {name}"));
        log_best_effort("deleteMetadataProfile", self.client.delete_metadata_profile(&name));
        self.save_payload("metadata_profile", &profile)?;
        let response = self.client.create_metadata_profile(&profile)?;
        expect_success(
            &response,
            "createMetadataProfile",
            SUCCESS_STATUS_CODE,
            &create_metadata_profile_success(&name),
        )?;
        self.register(Cleanup::MetadataProfile(name.clone()));

        let listed = self.client.list_metadata_profiles(Some(name.as_str()), None)?;
        expect_status(&listed, "listMetadataProfiles", SUCCESS_200_STATUS_CODE)?;
        ensure_valid("list_metadata_profiles", &catalog::list_metadata_profiles(), &listed.body)?;
        Ok(name)
    }

    /// Re-import datasource metadata and check the import response shape.
    pub fn import_metadata(&mut self) -> Result<()> {
        let request = import_metadata_request(&self.config.datasource);
        self.step(&format!("import metadata from {}", self.config.datasource));
        log_best_effort("deleteMetadata", self.client.delete_metadata(&request));
        let response = self.client.import_metadata(&request)?;
        expect_status(&response, "importMetadata", SUCCESS_STATUS_CODE)?;
        ensure_valid("import_metadata", &catalog::import_metadata()?, &response.body)?;
        self.register(Cleanup::Metadata(request));
        Ok(())
    }

    // -- cleanup -----------------------------------------------------------

    fn run_cleanups(&mut self) {
        while let Some(cleanup) = self.cleanups.pop() {
            let (what, result) = match &cleanup {
                Cleanup::Experiment { name, rm } => {
                    ("deleteExperiment", self.client.delete_experiment(name, *rm))
                }
                Cleanup::MetricProfile(name) => {
                    ("deleteMetricProfile", self.client.delete_metric_profile(name))
                }
                Cleanup::MetadataProfile(name) => {
                    ("deleteMetadataProfile", self.client.delete_metadata_profile(name))
                }
                Cleanup::Metadata(request) => {
                    ("deleteMetadata", self.client.delete_metadata(request))
                }
            };
            log_best_effort(what, result);
        }
    }
}

fn is_remote(experiment: &Experiment) -> bool {
    experiment.target_cluster == "remote"
}

fn log_best_effort(operation: &str, result: Result<ApiResponse>) {
    match result {
        Ok(response) if (200..300).contains(&response.status) => {
            debug!(operation, status = response.status, "cleanup")
        }
        Ok(response) => warn!(
            operation,
            status = response.status,
            body = %response.body,
            "cleanup not acknowledged"
        ),
        Err(e) => warn!(operation, error = %e, "cleanup failed"),
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Result of one scenario.
#[derive(Debug)]
pub struct Outcome {
    pub name: String,
    pub elapsed: Duration,
    pub error: Option<HarnessError>,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
}

impl Report {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn elapsed(&self) -> Duration {
        self.outcomes.iter().map(|o| o.elapsed).sum()
    }
}

pub struct Runner {
    client: KruizeClient,
    config: HarnessConfig,
    renderer: Renderer,
    sleep: Box<dyn Fn(Duration)>,
}

impl Runner {
    pub fn new(client: KruizeClient, config: HarnessConfig) -> Result<Self> {
        Ok(Self {
            client,
            config,
            renderer: Renderer::new()?,
            sleep: Box::new(std::thread::sleep),
        })
    }

    /// Replace the fixed-delay sleep (tests pass a no-op).
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn client(&self) -> &KruizeClient {
        &self.client
    }

    pub fn run(&self, scenario: &Scenario) -> Outcome {
        info!(scenario = %scenario.name, suite = %scenario.suite, "scenario started");
        let started = Instant::now();
        let mut context = Context {
            client: &self.client,
            config: &self.config,
            renderer: &self.renderer,
            scenario: &scenario.name,
            sleep: self.sleep.as_ref(),
            cleanups: Vec::new(),
            payloads: 0,
        };
        let result = (scenario.run)(&mut context);
        context.run_cleanups();
        let elapsed = started.elapsed();
        match &result {
            Ok(()) => info!(
                scenario = %scenario.name,
                ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "scenario passed"
            ),
            Err(e) => warn!(scenario = %scenario.name, error = %e, "scenario failed"),
        }
        Outcome {
            name: scenario.name.clone(),
            elapsed,
            error: result.err(),
        }
    }

    pub fn run_all<'s, I>(&self, scenarios: I) -> Report
    where
        I: IntoIterator<Item = &'s Scenario>,
    {
        Report {
            outcomes: scenarios.into_iter().map(|s| self.run(s)).collect(),
        }
    }
}
