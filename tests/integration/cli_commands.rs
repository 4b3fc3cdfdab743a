#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn write_edges(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("edges.csv");
    fs::write(
        &path,
        "left,right,type,timestamp\n\
         1,101,0,10\n\
         1,102,0,11\n\
         1,103,1,12\n\
         2,103,0,13\n\
         2,104,0,14\n",
    )
    .expect("write edges");
    path
}

#[test]
fn recommend_json_lists_ranked_results() {
    let dir = TempDir::new().expect("tempdir");
    let edges = write_edges(&dir);
    let output = cargo_bin_cmd!("walkrank")
        .args(["--format", "json", "recommend", "--query", "1", "--walk-length", "1"])
        .arg(&edges)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(json["query"], 1);
    assert_eq!(json["import"]["edges_imported"], 5);
    let results = json["results"].as_array().expect("results array");
    let nodes: Vec<u64> = results.iter().filter_map(|r| r["node"].as_u64()).collect();
    assert_eq!(nodes, vec![101, 102, 103]);
    assert_eq!(results[2]["social_proof"]["1"][0], 1);
}

#[test]
fn recommend_reads_salsa_defaults_from_config() {
    let dir = TempDir::new().expect("tempdir");
    let edges = write_edges(&dir);
    let config = dir.path().join("walkrank.toml");
    fs::write(
        &config,
        "[graph]\nsegment_edge_capacity = 2\n\n[salsa]\nmax_random_walk_length = 3\nmax_num_results = 2\n",
    )
    .expect("write config");
    let output = cargo_bin_cmd!("walkrank")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "recommend", "--query", "1", "--exclude", "101"])
        .arg(&edges)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json output");
    let nodes: Vec<u64> = json["results"]
        .as_array()
        .expect("results array")
        .iter()
        .filter_map(|r| r["node"].as_u64())
        .collect();
    assert_eq!(nodes.len(), 2);
    assert!(!nodes.contains(&101));
}

#[test]
fn recommend_without_walk_length_fails() {
    let dir = TempDir::new().expect("tempdir");
    let edges = write_edges(&dir);
    cargo_bin_cmd!("walkrank")
        .args(["recommend", "--query", "1"])
        .arg(&edges)
        .assert()
        .failure()
        .stderr(predicates::str::contains("max_random_walk_length"));
}

#[test]
fn stats_reports_window_occupancy() {
    let dir = TempDir::new().expect("tempdir");
    let edges = write_edges(&dir);
    let config = dir.path().join("walkrank.toml");
    fs::write(&config, "[graph]\nsegment_edge_capacity = 2\n").expect("write config");
    let output = cargo_bin_cmd!("walkrank")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "stats", "--optimize"])
        .arg(&edges)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(json["segments"], 3);
    assert_eq!(json["sealed_segments"], 3);
    assert_eq!(json["optimized_segments"], 3);
    assert_eq!(json["edges"], 5);
    assert_eq!(json["wasted_entries"], 0);
    assert_eq!(json["time_range"], serde_json::json!([10, 14]));
}

#[test]
fn stats_text_output() {
    let dir = TempDir::new().expect("tempdir");
    let edges = write_edges(&dir);
    cargo_bin_cmd!("walkrank")
        .args(["stats"])
        .arg(&edges)
        .assert()
        .success()
        .stdout(predicates::str::contains("edges=5"));
}

#[test]
fn unknown_config_keys_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let edges = write_edges(&dir);
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[graph]\npage_size = 4096\n").expect("write config");
    cargo_bin_cmd!("walkrank")
        .arg("--config")
        .arg(&config)
        .arg("stats")
        .arg(&edges)
        .assert()
        .failure()
        .stderr(predicates::str::contains("error: failed to parse config"));
}

#[test]
fn malformed_seed_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let edges = write_edges(&dir);
    cargo_bin_cmd!("walkrank")
        .args(["recommend", "--query", "1", "--walk-length", "2", "--seed", "2:heavy"])
        .arg(&edges)
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid seed weight in '2:heavy'"));
}
