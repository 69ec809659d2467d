//! The scenario suite.
//!
//! Remote monitoring scenarios push results and check how each batch is
//! judged. Local monitoring scenarios drive the datasource, profile and
//! recommendation endpoints end to end.

use chrono::Duration;
use serde_json::Value;

use super::{Context, Scenario, Suite, Tag};
use crate::cases::{
    invalid_container_field_cases, invalid_namespace_field_cases, FieldCase, IntervalCase,
    MissingMetricsCase, CPU_FORMATS, INTERVAL_CASES, MEMORY_FORMATS, MISSING_METRICS_CASES,
};
use crate::checks::{
    check_data_present, check_local_recommendations, check_recommendations_available,
    check_results_count, recommendation_objects,
};
use crate::client::{ListExperimentsQuery, ListRecommendationsQuery, MetadataQuery};
use crate::error::{HarnessError, Result};
use crate::messages::{
    experiment_name_not_found, missing_mandatory_parameters, ALL_ZERO_METRICS,
    CREATE_EXP_BULK_ERROR_MSG, DUPLICATE_RECORDS_MSG, ERROR_409_STATUS_CODE, ERROR_STATUS,
    ERROR_STATUS_CODE, KUBERNETES_OBJECT_NAME_MISMATCH, KUBERNETES_OBJECT_TYPE_MISMATCH,
    MISSING_MANDATORY_PARAMETERS, SUCCESS_200_STATUS_CODE, SUCCESS_STATUS_CODE,
};
use crate::payload::experiment::{bulk_payload, Experiment, LOCAL_NAMESPACE_EXPERIMENT_NAME};
use crate::payload::results::ResultRecord;
use crate::response::{expect_error, expect_status, Envelope};
use crate::schema::{catalog, ensure_valid};

/// Namespace the local monitoring workloads run in.
pub const LOCAL_WORKLOAD_NAMESPACE: &str = "default";

/// Records per request in the recommendation scenarios: one day of 15 minute intervals.
const DAY_OF_RESULTS: usize = 96;

fn interval() -> Duration {
    Duration::minutes(15)
}

fn remote_variants() -> [(&'static str, Experiment); 2] {
    [
        ("container", Experiment::remote_container()),
        ("namespace", Experiment::remote_namespace()),
    ]
}

/// One scenario per remote experiment shape, named `name[variant]`.
fn per_variant<F>(name: &str, tags: &[Tag], run: F) -> Vec<Scenario>
where
    F: Fn(&mut Context<'_>, &Experiment) -> Result<()> + Clone + 'static,
{
    variant_scenarios(|label| format!("{name}[{label}]"), tags, run)
}

/// Same for one row of a case table, named `name[variant:case]`.
fn per_variant_case<F>(name: &str, case: &str, tags: &[Tag], run: F) -> Vec<Scenario>
where
    F: Fn(&mut Context<'_>, &Experiment) -> Result<()> + Clone + 'static,
{
    variant_scenarios(|label| format!("{name}[{label}:{case}]"), tags, run)
}

fn variant_scenarios<F>(
    scenario_name: impl Fn(&str) -> String,
    tags: &[Tag],
    run: F,
) -> Vec<Scenario>
where
    F: Fn(&mut Context<'_>, &Experiment) -> Result<()> + Clone + 'static,
{
    remote_variants()
        .into_iter()
        .map(|(label, experiment)| {
            let run = run.clone();
            Scenario::new(scenario_name(label), Suite::Remote, tags, move |ctx| {
                run(ctx, &experiment)
            })
        })
        .collect()
}

pub fn all() -> Vec<Scenario> {
    let mut scenarios = remote_suite();
    scenarios.extend(local_suite());
    scenarios
}

pub fn remote_suite() -> Vec<Scenario> {
    let mut s = Vec::new();

    // sanity
    s.extend(per_variant("valid_results", &[Tag::Sanity], valid_results));
    s.extend(per_variant(
        "multiple_results_single_request",
        &[Tag::Sanity],
        multiple_results_single_request,
    ));
    s.extend(per_variant(
        "multiple_sequential_results",
        &[Tag::Sanity],
        multiple_sequential_results,
    ));
    for format in CPU_FORMATS {
        s.extend(per_variant_case("cpu_format", format, &[Tag::Sanity], move |ctx, experiment| {
            supported_format(ctx, experiment, |record| record.with_cpu_format(format))
        }));
    }
    for format in MEMORY_FORMATS {
        s.extend(per_variant_case("memory_format", format, &[Tag::Sanity], move |ctx, experiment| {
            supported_format(ctx, experiment, |record| record.with_memory_format(format))
        }));
    }
    s.extend(per_variant("duplicate_result", &[Tag::Sanity], duplicate_result));
    s.extend(per_variant(
        "duplicate_records_in_batch",
        &[Tag::Sanity],
        duplicate_records_in_batch,
    ));
    for case in INTERVAL_CASES {
        s.extend(per_variant_case(
            "interval_duration",
            case.name,
            &[Tag::Sanity],
            move |ctx, experiment| interval_duration(ctx, experiment, case),
        ));
    }
    s.extend(per_variant("create_delete_create", &[Tag::Sanity], create_delete_create));

    // negative
    s.push(Scenario::new(
        "namespace_results_for_container_experiment",
        Suite::Remote,
        &[Tag::Negative],
        namespace_results_for_container_experiment,
    ));
    s.push(Scenario::new(
        "container_results_for_namespace_experiment",
        Suite::Remote,
        &[Tag::Negative],
        container_results_for_namespace_experiment,
    ));
    s.push(Scenario::new(
        "object_type_mismatch[container]",
        Suite::Remote,
        &[Tag::Negative],
        object_type_mismatch,
    ));
    s.push(Scenario::new(
        "mixed_bulk[container]",
        Suite::Remote,
        &[Tag::Negative],
        mixed_bulk_container,
    ));
    s.push(Scenario::new(
        "mixed_bulk[namespace]",
        Suite::Remote,
        &[Tag::Negative],
        mixed_bulk_namespace,
    ));
    s.extend(per_variant("zero_metric_values", &[Tag::Negative], zero_metric_values));
    for case in MISSING_METRICS_CASES {
        s.push(Scenario::new(
            format!("missing_metrics[{}]", case.name),
            Suite::Remote,
            &[Tag::Negative],
            move |ctx| missing_metrics(ctx, case),
        ));
    }
    s.push(Scenario::new(
        "results_without_experiment",
        Suite::Remote,
        &[Tag::Negative],
        results_without_experiment,
    ));
    for (label, experiment, cases) in [
        ("container", Experiment::remote_container(), invalid_container_field_cases()),
        ("namespace", Experiment::remote_namespace(), invalid_namespace_field_cases()),
    ] {
        for case in cases {
            let experiment = experiment.clone();
            s.push(Scenario::new(
                format!("invalid_field[{label}:{}]", case.name),
                Suite::Remote,
                &[Tag::Negative],
                move |ctx| invalid_field(ctx, &experiment, &case),
            ));
        }
    }
    s.extend(per_variant(
        "missing_metrics_then_update_recommendations",
        &[Tag::Negative],
        missing_metrics_then_update_recommendations,
    ));
    for (label, containers) in [("single_container", 1), ("multiple_containers", 2)] {
        s.push(Scenario::new(
            format!("bulk_create_experiments[{label}]"),
            Suite::Remote,
            &[Tag::Negative],
            move |ctx| bulk_create_experiments(ctx, containers),
        ));
    }

    // extended
    s.push(Scenario::new(
        "multiple_experiments_separate_requests",
        Suite::Remote,
        &[Tag::Extended],
        multiple_experiments_separate_requests,
    ));
    s.push(Scenario::new(
        "update_recommendations",
        Suite::Remote,
        &[Tag::Extended],
        update_recommendations,
    ));
    s
}

pub fn local_suite() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "local_monitoring_e2e",
            Suite::Local,
            &[Tag::E2e, Tag::Sanity],
            local_monitoring_e2e,
        ),
        Scenario::new(
            "local_namespace_experiments",
            Suite::Local,
            &[Tag::E2e, Tag::Sanity],
            local_namespace_experiments,
        ),
    ]
}

// ===========================================================================
// Remote monitoring: sanity
// ===========================================================================

fn valid_results(ctx: &mut Context<'_>, experiment: &Experiment) -> Result<()> {
    ctx.create_experiment(experiment)?;
    ctx.expect_results_saved(&[ResultRecord::for_experiment(experiment)])
}

fn multiple_results_single_request(ctx: &mut Context<'_>, experiment: &Experiment) -> Result<()> {
    ctx.create_experiment(experiment)?;
    let records = ResultRecord::for_experiment(experiment).series(10, interval())?;
    ctx.expect_results_saved(&records)
}

fn multiple_sequential_results(ctx: &mut Context<'_>, experiment: &Experiment) -> Result<()> {
    ctx.create_experiment(experiment)?;
    let records = ResultRecord::for_experiment(experiment).series(5, interval())?;
    for record in &records {
        ctx.expect_results_saved(std::slice::from_ref(record))?;
    }
    let listed = ctx.list_experiment_results(&experiment.experiment_name)?;
    check_results_count(&listed, &experiment.experiment_name, records.len())
}

fn supported_format(
    ctx: &mut Context<'_>,
    experiment: &Experiment,
    apply: impl Fn(ResultRecord) -> ResultRecord,
) -> Result<()> {
    ctx.create_experiment(experiment)?;
    ctx.expect_results_saved(&[apply(ResultRecord::for_experiment(experiment))])
}

fn duplicate_result(ctx: &mut Context<'_>, experiment: &Experiment) -> Result<()> {
    ctx.create_experiment(experiment)?;
    let record = ResultRecord::for_experiment(experiment);
    ctx.expect_results_saved(std::slice::from_ref(&record))?;
    ctx.expect_results_rejected(&[record], 1)?
        .expect_all_errors("updateResults", DUPLICATE_RECORDS_MSG, ERROR_409_STATUS_CODE)
}

fn duplicate_records_in_batch(ctx: &mut Context<'_>, experiment: &Experiment) -> Result<()> {
    ctx.create_experiment(experiment)?;
    let unique = ResultRecord::for_experiment(experiment).series(10, interval())?;
    let mut batch = unique.clone();
    batch.extend(unique.iter().take(3).cloned());

    ctx.expect_results_rejected(&batch, 3)?
        .expect_all_errors("updateResults", DUPLICATE_RECORDS_MSG, ERROR_409_STATUS_CODE)?;
    let listed = ctx.list_experiment_results(&experiment.experiment_name)?;
    check_results_count(&listed, &experiment.experiment_name, unique.len())
}

fn interval_duration(
    ctx: &mut Context<'_>,
    experiment: &Experiment,
    case: &IntervalCase,
) -> Result<()> {
    ctx.create_experiment(experiment)?;
    let mut record = ResultRecord::for_experiment(experiment).with_end_time(case.interval_end_time);
    record.interval_start_time = case.interval_start_time.to_string();

    match case.expected.expected_error() {
        None => ctx.expect_results_saved(&[record]),
        Some(message) => ctx
            .expect_results_rejected(&[record], 1)?
            .expect_first_error("updateResults", message),
    }
}

fn create_delete_create(ctx: &mut Context<'_>, experiment: &Experiment) -> Result<()> {
    ctx.create_experiment(experiment)?;
    ctx.delete_experiment(experiment)?;
    ctx.create_experiment(experiment)
}

// ===========================================================================
// Remote monitoring: negative
// ===========================================================================

fn namespace_results_for_container_experiment(ctx: &mut Context<'_>) -> Result<()> {
    let experiment = Experiment::remote_container();
    ctx.create_experiment(&experiment)?;
    let record = ResultRecord::for_experiment(&Experiment::remote_namespace())
        .with_experiment_name(&experiment.experiment_name);
    ctx.expect_results_rejected(&[record], 1)?
        .expect_error_containing("updateResults", KUBERNETES_OBJECT_TYPE_MISMATCH)?;
    Ok(())
}

fn container_results_for_namespace_experiment(ctx: &mut Context<'_>) -> Result<()> {
    let experiment = Experiment::remote_namespace();
    ctx.create_experiment(&experiment)?;
    let record = ResultRecord::for_experiment(&Experiment::remote_container())
        .with_experiment_name(&experiment.experiment_name);
    ctx.expect_results_rejected(&[record], 1)?
        .expect_error_containing("updateResults", MISSING_MANDATORY_PARAMETERS)?;
    Ok(())
}

fn object_type_mismatch(ctx: &mut Context<'_>) -> Result<()> {
    let experiment = Experiment::remote_container();
    ctx.create_experiment(&experiment)?;
    let record = ResultRecord::for_experiment(&experiment).with_object_type("statefulset");
    ctx.expect_results_rejected(&[record], 1)?
        .expect_error_containing("updateResults", KUBERNETES_OBJECT_TYPE_MISMATCH)?;
    Ok(())
}

/// Container experiment: one record names another workload and one carries
/// namespace results; the rest are accepted.
fn mixed_bulk_container(ctx: &mut Context<'_>) -> Result<()> {
    let experiment = Experiment::remote_container();
    ctx.create_experiment(&experiment)?;
    let mut batch = ResultRecord::for_experiment(&experiment).series(6, interval())?;
    batch[2] = batch[2].clone().with_object_name("tfb-qrh-renamed");
    let namespace_record = ResultRecord::for_experiment(&Experiment::remote_namespace())
        .with_experiment_name(&experiment.experiment_name);
    batch[4] = ResultRecord {
        interval_start_time: batch[4].interval_start_time.clone(),
        interval_end_time: batch[4].interval_end_time.clone(),
        ..namespace_record
    };

    let envelope = ctx.expect_results_rejected(&batch, 2)?;
    envelope.expect_error_containing("updateResults", KUBERNETES_OBJECT_NAME_MISMATCH)?;
    envelope.expect_error_containing("updateResults", KUBERNETES_OBJECT_TYPE_MISMATCH)?;
    Ok(())
}

/// Namespace experiment: one container record in a namespace batch.
fn mixed_bulk_namespace(ctx: &mut Context<'_>) -> Result<()> {
    let experiment = Experiment::remote_namespace();
    ctx.create_experiment(&experiment)?;
    let mut batch = ResultRecord::for_experiment(&experiment).series(5, interval())?;
    let container_record = ResultRecord::for_experiment(&Experiment::remote_container())
        .with_experiment_name(&experiment.experiment_name);
    batch[3] = ResultRecord {
        interval_start_time: batch[3].interval_start_time.clone(),
        interval_end_time: batch[3].interval_end_time.clone(),
        ..container_record
    };

    ctx.expect_results_rejected(&batch, 1)?.expect_error_containing(
        "updateResults",
        &missing_mandatory_parameters(&experiment.experiment_name),
    )?;
    Ok(())
}

/// Rendered through the results template rather than serialized, so the
/// zeroes reach the service exactly as a hand-written payload would.
fn zero_metric_values(ctx: &mut Context<'_>, experiment: &Experiment) -> Result<()> {
    ctx.create_experiment(experiment)?;
    let record = ResultRecord::for_experiment(experiment).zeroed();
    let payload = ctx.renderer.render(record.template_name(), &record.template_vars()?)?;
    ctx.expect_payload_rejected(&payload, 1, 1)?
        .expect_error_containing("updateResults", ALL_ZERO_METRICS)?;
    Ok(())
}

fn missing_metrics(ctx: &mut Context<'_>, case: &MissingMetricsCase) -> Result<()> {
    let experiment = case.experiment();
    ctx.create_experiment(&experiment)?;
    let envelope = ctx.expect_results_rejected(&case.records()?, case.failed())?;
    for (_, defect) in case.defects {
        envelope.expect_error_containing(
            "updateResults",
            &defect.expected_error(&experiment.experiment_name),
        )?;
    }
    Ok(())
}

fn results_without_experiment(ctx: &mut Context<'_>) -> Result<()> {
    let experiments: Vec<Experiment> = (0..3)
        .map(|i| Experiment::remote_container().numbered(i))
        .collect();
    for experiment in &experiments {
        ctx.delete_experiment_if_exists(experiment);
    }
    let records: Vec<ResultRecord> = experiments.iter().map(ResultRecord::for_experiment).collect();
    ctx.expect_results_rejected(&records, records.len())?.expect_first_error(
        "updateResults",
        &experiment_name_not_found(&experiments[0].experiment_name),
    )
}

fn invalid_field(ctx: &mut Context<'_>, experiment: &Experiment, case: &FieldCase) -> Result<()> {
    ctx.create_experiment(experiment)?;
    let record = ResultRecord::for_experiment(experiment);
    let mut vars = record.template_vars()?;
    vars.set(case.field, case.value.clone());
    let payload = ctx.renderer.render(record.template_name(), &vars)?;

    ctx.step(&format!("update results with {} = {:?}", case.field, case.value));
    let response = ctx.post_results(&payload)?;
    expect_status(&response, "updateResults", case.expected_status)?;
    if case.expected_status == ERROR_STATUS_CODE {
        let envelope = Envelope::parse(&response, "updateResults")?;
        if envelope.status != ERROR_STATUS {
            return Err(HarnessError::check(format!(
                "updateResults with {} = {:?}: status {}",
                case.field, case.value, envelope.status
            )));
        }
    }
    Ok(())
}

/// Rejected results leave nothing to compute recommendations from.
fn missing_metrics_then_update_recommendations(
    ctx: &mut Context<'_>,
    experiment: &Experiment,
) -> Result<()> {
    ctx.create_experiment(experiment)?;
    let record = ResultRecord::for_experiment(experiment).without_all_metrics();
    ctx.expect_results_rejected(std::slice::from_ref(&record), 1)?;

    ctx.step("update recommendations without results");
    let response = ctx.client.update_recommendations(
        &experiment.experiment_name,
        Some(record.interval_end_time.as_str()),
    )?;
    expect_error(
        &response,
        "updateRecommendations",
        ERROR_STATUS_CODE,
        &experiment.experiment_name,
    )?;
    Ok(())
}

/// A bulk create is refused as a whole, so results posted afterwards for
/// every one of its experiments are rejected record by record.
fn bulk_create_experiments(ctx: &mut Context<'_>, containers: usize) -> Result<()> {
    let base = Experiment::remote_container().with_container_count(containers);
    let experiments: Vec<Experiment> = (0..3).map(|i| base.numbered(i)).collect();
    for experiment in &experiments {
        ctx.delete_experiment_if_exists(experiment);
    }
    let payload = bulk_payload(&experiments)?;
    ctx.save_payload("create_experiment_bulk", &payload)?;
    ctx.step("create three experiments in one request");
    let response = ctx.client.create_experiment(&payload)?;
    expect_error(&response, "createExperiment", ERROR_STATUS_CODE, CREATE_EXP_BULK_ERROR_MSG)?;

    let records: Vec<ResultRecord> = experiments.iter().map(ResultRecord::for_experiment).collect();
    let envelope = ctx.expect_results_rejected(&records, records.len())?;
    for experiment in &experiments {
        envelope.expect_error_containing(
            "updateResults",
            &experiment_name_not_found(&experiment.experiment_name),
        )?;
    }
    Ok(())
}

// ===========================================================================
// Remote monitoring: extended
// ===========================================================================

fn multiple_experiments_separate_requests(ctx: &mut Context<'_>) -> Result<()> {
    let base = Experiment::remote_container();
    for i in 0..10 {
        let experiment = base.numbered(i);
        ctx.create_experiment(&experiment)?;
        ctx.expect_results_saved(&[ResultRecord::for_experiment(&experiment)])?;
    }
    Ok(())
}

fn update_recommendations(ctx: &mut Context<'_>) -> Result<()> {
    let experiment = Experiment::remote_container();
    ctx.create_experiment(&experiment)?;
    let records = ResultRecord::for_experiment(&experiment).series(DAY_OF_RESULTS, interval())?;
    ctx.expect_results_saved(&records)?;
    let end = records
        .last()
        .map(|r| r.interval_end_time.clone())
        .ok_or_else(|| HarnessError::check("no results generated"))?;

    ctx.step(&format!("update recommendations up to {end}"));
    let response = ctx
        .client
        .update_recommendations(&experiment.experiment_name, Some(end.as_str()))?;
    expect_status(&response, "updateRecommendations", SUCCESS_STATUS_CODE)?;

    let listed = ctx
        .client
        .list_recommendations(&ListRecommendationsQuery::named(&experiment.experiment_name))?;
    expect_status(&listed, "listRecommendations", SUCCESS_200_STATUS_CODE)?;
    ensure_valid("list_recommendations", &catalog::list_recommendations()?, &listed.body)?;
    for entry in listed.body.as_array().into_iter().flatten() {
        for recommendations in recommendation_objects(entry) {
            check_data_present(recommendations)?;
        }
    }
    Ok(())
}

// ===========================================================================
// Local monitoring
// ===========================================================================

fn check_listed_recommendations(ctx: &mut Context<'_>, experiment: &Experiment) -> Result<()> {
    let name = &experiment.experiment_name;
    ctx.step(&format!("generate recommendations for {name}"));
    let generated = ctx.client.generate_recommendations(name)?;
    expect_status(&generated, "generateRecommendations", SUCCESS_STATUS_CODE)?;

    let listed = ctx.client.list_recommendations(&ListRecommendationsQuery::named(name))?;
    expect_status(&listed, "listRecommendations", SUCCESS_200_STATUS_CODE)?;
    let schema = if experiment.is_namespace() {
        catalog::list_recommendations_namespace_local()?
    } else {
        catalog::list_recommendations_local()?
    };
    ensure_valid("list_recommendations_local", &schema, &listed.body)?;
    for entry in listed.body.as_array().into_iter().flatten() {
        for recommendations in recommendation_objects(entry) {
            check_recommendations_available(recommendations)?;
        }
    }
    check_local_recommendations(&listed.body, experiment)
}

fn check_metadata(ctx: &mut Context<'_>) -> Result<()> {
    let datasource = ctx.config.datasource.clone();
    for verbose in [false, true] {
        let response = ctx.client.list_metadata(&MetadataQuery {
            datasource: datasource.clone(),
            verbose: Some(verbose),
            ..MetadataQuery::default()
        })?;
        expect_status(&response, "listMetadata", SUCCESS_200_STATUS_CODE)?;
        let schema = if verbose {
            catalog::list_metadata_verbose()?
        } else {
            catalog::list_metadata()?
        };
        ensure_valid("list_metadata", &schema, &response.body)?;
    }
    Ok(())
}

fn local_monitoring_e2e(ctx: &mut Context<'_>) -> Result<()> {
    ctx.step("list datasources");
    let datasources = ctx.client.list_datasources(None)?;
    expect_status(&datasources, "listDatasources", SUCCESS_200_STATUS_CODE)?;
    ensure_valid("list_datasources", &catalog::list_datasources(), &datasources.body)?;

    ctx.install_metadata_profile()?;
    ctx.import_metadata()?;
    check_metadata(ctx)?;
    ctx.install_metric_profile()?;

    let experiments = [
        Experiment::local_sysbench(LOCAL_WORKLOAD_NAMESPACE),
        Experiment::local_namespace(LOCAL_NAMESPACE_EXPERIMENT_NAME, LOCAL_WORKLOAD_NAMESPACE),
    ];
    for experiment in &experiments {
        ctx.create_experiment(experiment)?;
    }
    ctx.wait_for_recommendations();
    for experiment in &experiments {
        check_listed_recommendations(ctx, experiment)?;
    }
    for experiment in &experiments {
        ctx.delete_experiment(experiment)?;
    }
    Ok(())
}

fn local_namespace_experiments(ctx: &mut Context<'_>) -> Result<()> {
    ctx.install_metric_profile()?;
    let experiments: Vec<Experiment> = (1..=3)
        .map(|i| Experiment::local_namespace(&format!("test-ns{i}"), &format!("ns{i}")))
        .collect();
    for experiment in &experiments {
        ctx.create_experiment(experiment)?;
        let listed = ctx.client.list_experiments(&ListExperimentsQuery {
            rm: Some(false),
            ..ListExperimentsQuery::named(&experiment.experiment_name)
        })?;
        expect_status(&listed, "listExperiments", SUCCESS_200_STATUS_CODE)?;
        let found = listed
            .body
            .as_array()
            .into_iter()
            .flatten()
            .any(|e| e["experiment_name"] == Value::from(experiment.experiment_name.as_str()));
        if !found {
            return Err(HarnessError::check(format!(
                "{} not listed by listExperiments",
                experiment.experiment_name
            )));
        }
    }
    for experiment in &experiments {
        ctx.delete_experiment(experiment)?;
    }
    Ok(())
}
