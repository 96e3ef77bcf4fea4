use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_cci-verify")
}

fn demo_catalog() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/data/catalogs/cci-store.yaml")
}

fn cci_verify(args: &[&str]) -> Output {
    Command::new(bin())
        .args(args)
        .env_remove("CCI_VERIFY_CONFIG")
        .env_remove("CCI_VERIFY_OUTPUT")
        .env_remove("CCI_VERIFY_TIMEOUT_SECS")
        .env_remove("CCI_VERIFY_WORKERS")
        .env_remove("CCI_VERIFY_SEED")
        .output()
        .expect("cci-verify should run")
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("report dir should exist")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn classify_rejects_sinusoidal_dataset() {
    let output = cci_verify(&[
        "classify",
        "esacci.OC.day.L3S.CHLOR_A.multi-sensor.multi-platform.MERGED.5-0.sinusoidal",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("classify should emit json");
    assert_eq!(payload["supported"], serde_json::json!(false));
    assert!(payload["reason"].is_string());
}

#[test]
fn classify_accepts_regular_dataset() {
    let output = cci_verify(&["classify", "esacci.SST.day.L4.SSTdepth.r1"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("classify should emit json");
    assert_eq!(payload["data_id"], "esacci.SST.day.L4.SSTdepth.r1");
    assert_eq!(payload["supported"], serde_json::json!(true));
}

#[test]
fn run_with_summary_writes_all_artifacts() {
    let out = tempfile::tempdir().expect("temp dir should be created");
    let output = cci_verify(&[
        "run",
        "cci-store",
        "smoke",
        "--catalog-file",
        demo_catalog(),
        "--output",
        out.path().to_string_lossy().as_ref(),
        "--seed",
        "1",
        "--timeout",
        "10",
        "--workers",
        "2",
        "--summarize",
    ]);

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Probed 7 datasets"));

    let names = file_names(&out.path().join("smoke").join("cci-store"));
    for suffix in [
        "_test_cci-store_data_support.csv",
        "_test_cci-store_data_support_sorted.csv",
        "_test_cci-store_data_support_failed_sorted.csv",
        "_test_cci-store_data_support_summary_sorted.csv",
        "_DrsID_verification_flags.json",
    ] {
        assert!(
            names.iter().any(|name| name.ends_with(suffix)),
            "missing *{suffix} in {names:?}"
        );
    }
}

#[test]
fn summarize_without_report_fails() {
    let out = tempfile::tempdir().expect("temp dir should be created");
    let output = cci_verify(&[
        "summarize",
        "--output",
        out.path().to_string_lossy().as_ref(),
        "--date",
        "2024-01-01",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
}

#[test]
fn missing_command_is_a_usage_error() {
    let output = cci_verify(&[]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn summary_binary_delegates_to_summarize() {
    let out = tempfile::tempdir().expect("temp dir should be created");
    let output = Command::new(env!("CARGO_BIN_EXE_generate_summary"))
        .args(["--output", out.path().to_string_lossy().as_ref()])
        .env_remove("CCI_VERIFY_CONFIG")
        .output()
        .expect("generate_summary should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
}
