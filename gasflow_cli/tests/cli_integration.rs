use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

// Fast timing so a full regulate/close cycle takes milliseconds
const FAST_CONFIG: &str = r#"
[station]
hardware = "reservoir"
num_gas_ports = 3
device_type = "MX4"

[timing]
open_settle_ms = 1
close_settle_ms = 1
stabilize_ms = 1
reservoir_interval_ms = 2
non_reservoir_interval_ms = 2
close_wait_poll_ms = 1
close_wait_attempts = 50
relieve_ms = 5

[simulator]
ml_per_volt = 3.0
max_flow_ml = 900
vacuum_raw = 80
# port 2 holds an exhausted cylinder
empty_ports = [2]

[[ports]]
position = 1
part_number = "1810-4023"
gases = [{ code = "CO", concentration = 100.0 }, { code = "O2", concentration = 19.0 }]

[[ports]]
position = 2
part_number = "1810-0000"
gases = [{ code = "O2", concentration = 20.9 }]
"#;

fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("gasflow.toml");
    fs::write(&path, format!("{FAST_CONFIG}\n{extra}")).unwrap();
    path
}

fn gasflow(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gasflow").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["deliver", "--port", "1", "--flow", "550"], 0, "Accurate", "stdout")]
#[case(&["deliver", "--port", "1", "--flow", "1000", "--timeout-ms", "0"], 0, "Inaccurate", "stdout")]
#[case(&["deliver", "--port", "2", "--flow", "550"], 3, "What happened: Flow stayed below", "stderr")]
#[case(&["deliver", "--port", "7"], 1, "Gas port 7 does not exist", "stderr")]
#[case(&["deliver", "--port", "1", "--flow", "0"], 1, "Invalid flow request", "stderr")]
#[case(&["deliver"], 2, "required", "stderr")]
#[case(&["relieve"], 0, "internal pressure relieved", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    let assert = gasflow(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn json_mode_reports_the_delivery_then_the_failure() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    let out = gasflow(&cfg)
        .args(["--json", "deliver", "--port", "2", "--flow", "550"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));

    let stdout = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.len(), 2, "stdout: {stdout}");

    let report: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(report["port"], 2);
    assert_eq!(report["status"], "TooLow");

    let err: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(err["reason"], "TooLow");
    assert_eq!(err["details"]["context"], "gas port 2 at 550 mL/min");
}

#[test]
fn successful_delivery_json_has_the_settled_flow() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    let out = gasflow(&cfg)
        .args(["--json", "deliver", "--port", "1", "--flow", "400"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let report: serde_json::Value =
        serde_json::from_str(String::from_utf8(out.stdout).unwrap().trim()).unwrap();
    assert_eq!(report["status"], "Accurate");
    let flow = report["flow_ml_per_min"].as_i64().unwrap();
    assert!((395..=405).contains(&flow), "flow {flow}");
    assert_eq!(report["interrupted"], false);
}

#[test]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[station]\nhardware = \"reservoir\"\nnum_gas_ports = 0\n").unwrap();

    gasflow(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"));
}

#[test]
fn missing_config_file_is_explained() {
    let dir = tempdir().unwrap();
    gasflow(&dir.path().join("nope.toml"))
        .arg("relieve")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config file could not be read"));
}

#[test]
fn file_sink_receives_json_lines() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("gasflow.log");
    let cfg = write_config(
        dir.path(),
        &format!("[logging]\nfile = {:?}\nlevel = \"info\"\n", log.display().to_string()),
    );

    gasflow(&cfg)
        .args(["deliver", "--port", "1"])
        .assert()
        .success();

    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("delivery start"), "log: {text}");
}
