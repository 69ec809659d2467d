use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("kruize-e2e").expect("bin");
    cmd.env_remove("RUST_LOG")
        .env_remove("KRUIZE_URL")
        .env_remove("KRUIZE_CLUSTER_TYPE")
        .env_remove("KRUIZE_RECO_WAIT_SECS");
    cmd
}

#[test]
fn help_lists_subcommands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn list_local_suite() {
    cli()
        .args(["list", "--suite", "local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local_monitoring_e2e\tlocal\te2e,sanity"))
        .stdout(predicate::str::contains("valid_results").not());
}

#[test]
fn list_rejects_unknown_tag() {
    cli()
        .args(["list", "--tag", "smoke"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("smoke"));
}

#[test]
fn render_metric_profile_to_file() {
    let dir = assert_fs::TempDir::new().unwrap();
    let out = dir.child("profile.json");
    cli()
        .args([
            "render",
            "metric_profile",
            "--var",
            "name=resource-optimization-local-monitoring",
            "--var",
            "k8s_type=openshift",
            "--var",
            "datasource=prometheus-1",
            "--var",
            "recording_rules=false",
            "--out",
        ])
        .arg(out.path())
        .assert()
        .success();

    let rendered: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.path()).unwrap()).unwrap();
    assert_eq!(rendered["metadata"]["name"], "resource-optimization-local-monitoring");
    assert_eq!(rendered["k8s_type"], "openshift");
}

#[test]
fn render_results_with_defaults_and_omitted_key() {
    let output = cli()
        .args(["render", "update_results.json", "--defaults", "--var", "interval_end_time=omit"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let rendered: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let record = &rendered[0];
    assert_eq!(record["interval_start_time"], "2022-01-23T18:25:43.511Z");
    assert!(record.get("interval_end_time").is_none());
}

#[test]
fn render_unknown_template_fails() {
    cli()
        .args(["render", "no_such_template"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no_such_template"));
}

#[test]
fn validate_accepts_conforming_document() {
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("datasources.json");
    file.write_str(
        r#"{"version": "v1.0", "datasources": [
            {"name": "prometheus-1", "provider": "prometheus", "serviceName": "prometheus-k8s",
             "namespace": "monitoring",
             "url": "http://prometheus-k8s.monitoring.svc.cluster.local:9090"}
        ]}"#,
    )
    .unwrap();

    cli()
        .arg("validate")
        .arg("list-datasources")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("valid list-datasources"));
}

#[test]
fn validate_reports_violations_with_failure_code() {
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("datasources.json");
    file.write_str(r#"{"version": 1}"#).unwrap();

    cli()
        .arg("validate")
        .arg("list_datasources")
        .arg(file.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("violation"))
        .stdout(predicate::str::contains("datasources"));
}

#[test]
fn validate_unknown_schema_errors() {
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("doc.json");
    file.write_str("{}").unwrap();

    cli()
        .arg("validate")
        .arg("list-widgets")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown schema"));
}

#[test]
fn run_against_unreachable_service_fails() {
    let scratch = assert_fs::TempDir::new().unwrap();
    cli()
        .args([
            "run",
            "--suite",
            "remote",
            "--filter",
            "valid_results[container]",
            "--url",
            "http://127.0.0.1:9",
            "--reco-wait-secs",
            "0",
            "--scratch-dir",
        ])
        .arg(scratch.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAILED valid_results[container]"))
        .stdout(predicate::str::contains("0 passed, 1 failed"));
}

#[test]
fn run_with_empty_selection_errors() {
    cli()
        .args(["run", "--filter", "no-scenario-has-this-name", "--url", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no scenario matches"));
}
