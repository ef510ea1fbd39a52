use std::path::PathBuf;
use std::process::{Command, Output};

fn data(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
        .display()
        .to_string()
}

fn filament_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_filament_cli"))
        .args(args)
        .output()
        .expect("run filament_cli")
}

fn fixture_args(command: &str) -> Vec<String> {
    vec![
        command.to_owned(),
        data("tracers.txt"),
        "--filament".to_owned(),
        data("filament_a.txt"),
        "--filament".to_owned(),
        data("filament_b.txt"),
    ]
}

#[test]
fn map_writes_one_row_per_tracer() {
    let dir = std::env::temp_dir().join(format!("filament-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let out = dir.join("records.tsv");

    let mut args = fixture_args("map");
    args.extend(["--out".to_owned(), out.display().to_string()]);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = filament_cli(&args);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let table = std::fs::read_to_string(&out).expect("table");
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 9);
    assert!(lines[0].starts_with("tracer\tx"));
    assert!(lines[1].starts_with("0\t1.00000000\t1.00000000\t0.00000000\t0\t1.00000000"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("wrote 8 records"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn jackknife_json_is_reproducible_for_a_seed() {
    let mut args = fixture_args("jackknife");
    args.extend(
        [
            "--regions",
            "4",
            "--policy",
            "random",
            "--seed",
            "5",
            "--statistic",
            "mean-distance",
            "--statistic",
            "fraction-within:1.5",
            "--json",
        ]
        .map(str::to_owned),
    );
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let first = filament_cli(&args);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    let second = filament_cli(&args);
    assert_eq!(first.stdout, second.stdout);

    let report: serde_json::Value = serde_json::from_slice(&first.stdout).expect("json report");
    assert_eq!(report["region_count"], 4);
    assert_eq!(report["records"].as_array().map(Vec::len), Some(8));
    assert_eq!(report["statistics"][0]["name"], "mean-distance");
    assert_eq!(report["statistics"][0]["full_statistic"], 1.625);
    assert_eq!(report["statistics"][1]["full_statistic"], 0.5);
    assert_eq!(report["statistics"][0]["region_sizes"], serde_json::json!([2, 2, 2, 2]));
}

#[test]
fn jackknife_with_one_region_fails() {
    let mut args = fixture_args("jackknife");
    args.extend(["--regions".to_owned(), "1".to_owned()]);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let output = filament_cli(&args);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("filament_cli error"));
    assert!(stderr.contains("at least 2 regions"));
}
