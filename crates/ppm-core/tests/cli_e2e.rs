//! End-to-end tests of the `ppm` binary against the purchasing fixtures.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// A `ppm` command that cannot see the user's own configuration.
fn ppm(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ppm").expect("ppm binary should exist");
    cmd.env_remove("PPM_PARAMS")
        .env_remove("PPM_RUN_CONFIG")
        .env_remove("RUST_LOG")
        .env("PPM_CONFIG_DIR", config_dir.path())
        .env("XDG_CONFIG_HOME", config_dir.path())
        .env("PPM_LOG", "error");
    cmd
}

fn predict_args() -> Vec<String> {
    vec![
        "predict".into(),
        fixture("purchasing.csv").display().to_string(),
        "--params".into(),
        fixture("params.json").display().to_string(),
        "--predictions".into(),
        fixture("predictions.jsonl").display().to_string(),
    ]
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

mod predict {
    use super::*;

    #[test]
    fn arg_max_run_reconstructs_timestamps() {
        let dir = TempDir::new().unwrap();
        let output = ppm(&dir).args(predict_args()).output().unwrap();
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let batch = stdout_json(&output);
        assert_eq!(batch["summary"]["cases"]["total"], 2);
        assert_eq!(batch["summary"]["variant"], "arg_max");
        assert!(batch["summary"]["config"]["params_hash"].is_string());

        let records = batch["records"].as_array().unwrap();
        assert_eq!(records.len(), 5);

        let first = &records[0];
        assert_eq!(first["caseid"], "C1");
        assert_eq!(first["pref_size"], 1);
        assert_eq!(first["ac_prefix"], serde_json::json!(["Create PO"]));
        assert_eq!(first["ac_expect"], "Approve PO");
        assert_eq!(first["ac_pred"], "Approve PO");
        assert_eq!(first["rl_pred"], "Manager");
        assert_eq!(first["tm_pred"], 900.0);
        assert_eq!(first["end_timestamp_expected"], "2021-01-01T09:00:00");
        assert_eq!(first["end_timestamp_pred"], "2021-01-01T08:15:00");

        let last_c1 = &records[2];
        assert_eq!(last_c1["ac_expect"], Value::Null);
        assert_eq!(last_c1["ac_pred"], "End");
        assert_eq!(last_c1["end_timestamp_expected"], "2021-01-01T12:00:00");
        assert_eq!(last_c1["end_timestamp_pred"], "2021-01-01T10:15:00");

        // the second case restarts at its own anchor
        assert_eq!(records[3]["caseid"], "C2");
        assert_eq!(records[3]["end_timestamp_pred"], "2021-01-02T10:30:00");
    }

    #[test]
    fn multi_pred_emits_ranked_lists() {
        let dir = TempDir::new().unwrap();
        let output = ppm(&dir)
            .args(predict_args())
            .args(["--variant", "multi_pred", "--multiprednum", "2"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let batch = stdout_json(&output);
        let first = &batch["records"][0];
        assert_eq!(first["ac_pred"], serde_json::json!(["Approve PO", "Pay"]));
        assert_eq!(first["ac_prob"], serde_json::json!([0.9, 0.1]));
        assert_eq!(batch["summary"]["prediction_count"], 2);
    }

    #[test]
    fn too_many_predictions_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .args(predict_args())
            .args(["--variant", "multi_pred", "--multiprednum", "9"])
            .assert()
            .code(11)
            .stdout(predicate::str::contains("\"status\":\"error\""));
    }

    #[test]
    fn unknown_variant_is_rejected_by_the_parser() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .args(predict_args())
            .args(["--variant", "beam"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown variant 'beam'"));
    }

    #[test]
    fn csv_output_goes_to_the_requested_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("results.csv");
        ppm(&dir)
            .args(predict_args())
            .args(["--format", "csv", "--output"])
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let text = std::fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("caseid,ac_prefix,ac_expect,ac_pred"));
        assert!(header.contains("tm_pred"));
        assert_eq!(lines.count(), 5);
    }

    #[test]
    fn summary_format_is_one_line() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .args(predict_args())
            .args(["-f", "summary"])
            .assert()
            .success()
            .stdout(predicate::str::contains("5 records from 2/2 cases (arg_max, n=1), 0 failed"));
    }

    #[test]
    fn missing_prediction_aborts_with_predictor_exit_code() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("partial.jsonl");
        let full = std::fs::read_to_string(fixture("predictions.jsonl")).unwrap();
        let kept: Vec<&str> = full
            .lines()
            .filter(|l| !(l.contains("\"C2\"") && l.contains("\"pref_size\": 2")))
            .collect();
        std::fs::write(&partial, kept.join("\n")).unwrap();

        let mut args = predict_args();
        args[5] = partial.display().to_string();
        let output = ppm(&dir).args(&args).output().unwrap();
        assert_eq!(output.status.code(), Some(14));
        let error = stdout_json(&output);
        assert_eq!(error["status"], "error");
        assert_eq!(error["error"]["code"], 60);

        // the same gap is skipped under skip_case
        let output = ppm(&dir)
            .args(&args)
            .arg("--run-config")
            .arg(fixture("run_skip.toml"))
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        let batch = stdout_json(&output);
        assert_eq!(batch["summary"]["cases"]["failed"], 1);
        assert_eq!(batch["records"].as_array().unwrap().len(), 3);
        assert_eq!(batch["summary"]["failures"][0]["item_id"], "C2");

        // human formats list the skipped cases on stderr
        ppm(&dir)
            .args(&args)
            .arg("--run-config")
            .arg(fixture("run_skip.toml"))
            .args(["-f", "summary"])
            .assert()
            .code(3)
            .stdout(predicate::str::contains("3 records from 1/2 cases"))
            .stderr(predicate::str::contains("Partial success: 1 of 2 cases completed"))
            .stderr(predicate::str::contains("C2: case C2, prefix 2"));
    }

    #[test]
    fn dual_timestamp_run_writes_both_channels() {
        let dir = TempDir::new().unwrap();
        let output = ppm(&dir)
            .arg("predict")
            .arg(fixture("purchasing_dual.csv"))
            .arg("--params")
            .arg(fixture("params_dual.json"))
            .arg("--run-config")
            .arg(fixture("run_dual.toml"))
            .arg("--predictions")
            .arg(fixture("predictions_dual.jsonl"))
            .args(["-f", "jsonl"])
            .output()
            .unwrap();
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let lines: Vec<Value> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1]["dur_pred"], 900.0);
        assert_eq!(lines[1]["wait_pred"], 3600.0);
        assert_eq!(lines[1]["wait_prefix"], serde_json::json!([0.0, 1800.0]));
        assert!(lines[1].get("tm_pred").is_none());
        assert_eq!(lines[3]["end_timestamp_pred"], "2021-01-02T10:35:00");
    }

    #[test]
    fn next_mode_is_refused() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .args(predict_args())
            .arg("--run-config")
            .arg(fixture("run_next.toml"))
            .assert()
            .code(11);
    }

    #[test]
    fn missing_params_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .args([
                "-f",
                "summary",
                "predict",
                fixture("purchasing.csv").to_str().unwrap(),
                "--predictions",
                fixture("predictions.jsonl").to_str().unwrap(),
            ])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("PPM_PARAMS"));
    }

    #[test]
    fn params_resolve_from_config_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::copy(fixture("params.json"), dir.path().join("params.json")).unwrap();
        ppm(&dir)
            .args([
                "-f",
                "summary",
                "predict",
                fixture("purchasing.csv").to_str().unwrap(),
                "--predictions",
                fixture("predictions.jsonl").to_str().unwrap(),
            ])
            .assert()
            .success();
    }
}

mod ingest {
    use super::*;

    #[test]
    fn summary_counts_cases_and_events() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .args(["ingest", fixture("purchasing.csv").to_str().unwrap(), "-f", "summary"])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 cases, 5 events (2..=3 per case)"));
    }

    #[test]
    fn raw_jsonl_lists_transitions() {
        let dir = TempDir::new().unwrap();
        let output = ppm(&dir)
            .args(["ingest", fixture("purchasing.csv").to_str().unwrap(), "--raw", "-f", "jsonl"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let text = String::from_utf8(output.stdout).unwrap();
        // five real events plus two sentinels per case
        assert_eq!(text.lines().count(), 9);
        let first: Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["task"], "Start");
        assert_eq!(first["event_type"], "complete");
    }

    #[test]
    fn unsupported_extension_is_an_input_error() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("log.xes");
        std::fs::write(&log, "<log/>").unwrap();
        ppm(&dir)
            .args(["ingest", log.to_str().unwrap()])
            .assert()
            .code(12)
            .stdout(predicate::str::contains("\"code\":20"));
    }

    #[test]
    fn bad_timestamp_names_the_row() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("bad.csv");
        std::fs::write(
            &log,
            "caseid,task,user,end_timestamp\nC1,Pay,Clerk,yesterday\n",
        )
        .unwrap();
        ppm(&dir)
            .args(["-f", "summary", "ingest", log.to_str().unwrap()])
            .assert()
            .code(12)
            .stderr(predicate::str::contains("row 2"));
    }
}

mod check {
    use super::*;

    #[test]
    fn valid_configuration_passes() {
        let dir = TempDir::new().unwrap();
        let output = ppm(&dir)
            .args(["check", "--params", fixture("params.json").to_str().unwrap()])
            .output()
            .unwrap();
        assert!(output.status.success());
        let report = stdout_json(&output);
        assert_eq!(report["status"], "ok");
        let names: Vec<&str> = report["checks"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["check"].as_str())
            .collect();
        assert_eq!(names, ["params", "plan"]);
    }

    #[test]
    fn next_mode_fails_the_plan_check() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .args([
                "-f",
                "summary",
                "check",
                "--params",
                fixture("params.json").to_str().unwrap(),
                "--run-config",
                fixture("run_next.toml").to_str().unwrap(),
            ])
            .assert()
            .code(11)
            .stdout(predicate::str::contains("[run_config] OK"))
            .stdout(predicate::str::contains("[plan] FAILED"));
    }

    #[test]
    fn missing_params_fails() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .arg("check")
            .assert()
            .code(11)
            .stdout(predicate::str::contains("\"status\": \"failed\""));
    }
}

mod schema_and_version {
    use super::*;

    #[test]
    fn schema_list_names_result_record() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .args(["schema", "--list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ResultRecord"))
            .stdout(predicate::str::contains("ModelParameters"));
    }

    #[test]
    fn unknown_schema_is_an_argument_error() {
        let dir = TempDir::new().unwrap();
        ppm(&dir)
            .args(["schema", "Plan"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("unknown schema 'Plan'"));
    }

    #[test]
    fn compact_schema_is_single_line_json() {
        let dir = TempDir::new().unwrap();
        let output = ppm(&dir)
            .args(["schema", "RunConfig", "--compact"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let text = String::from_utf8(output.stdout).unwrap();
        assert_eq!(text.trim_end().lines().count(), 1);
        let schema: Value = serde_json::from_str(&text).unwrap();
        assert!(schema["properties"]["variant"].is_object());
    }

    #[test]
    fn version_reports_json() {
        let dir = TempDir::new().unwrap();
        let output = ppm(&dir).arg("version").output().unwrap();
        assert!(output.status.success());
        let version = stdout_json(&output);
        assert_eq!(version["version"], env!("CARGO_PKG_VERSION"));
    }
}
