use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};
use sweep_core::ConfigTree;
use sweep_runner::{load_sweep, setup_system, Timestamp, EXPERIMENT_CONFIG, MANIFEST_FILE};

const SPEC_CFG: &str = "amd64-m64-gcc42-nn";

fn scratch(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "simsweep_it_{}_{}_{}",
        tag,
        std::process::id(),
        Utc::now().timestamp_micros()
    ));
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn run_dir(root: &Path, bench: &str) -> PathBuf {
    root.join("spec")
        .join("CPU2006")
        .join(bench)
        .join("run")
        .join(format!("run_base_test_{}.0000", SPEC_CFG))
}

fn write_fixture(root: &Path, names: &str) -> PathBuf {
    write_fixture_with(root, &format!("  pair: {{ type: list, names: {} }}\n", names))
}

fn write_fixture_with(root: &Path, workloads: &str) -> PathBuf {
    fs::write(
        root.join("base.cfg"),
        "sys:\n  caches:\n    l2:\n      size: 262144\n      repl: { type: LRU }\nsim:\n  phaseLength: 10000\n",
    )
    .expect("base config");
    fs::write(root.join("run.sh"), "#!/bin/sh\n./zsim config.cfg\n").expect("executable");
    let sweep = format!(
        "target_root: out\n\
         system_name: base\n\
         executable: run.sh\n\
         base_config: base.cfg\n\
         input_set: test\n\
         system_params:\n  l2_repl: {{ type: SRRIP, M: 2 }}\n\
         workloads:\n{}\
         env:\n  BENCH_DIR: {}\n  SPEC_CFG: {}\n",
        workloads,
        root.join("spec").display(),
        SPEC_CFG
    );
    let path = root.join("sweep.yaml");
    fs::write(&path, sweep).expect("sweep file");
    path
}

fn command_of(tree: &ConfigTree, process: &str) -> String {
    tree.get(&format!("{}.command", process))
        .and_then(|n| n.as_str())
        .expect("process command")
        .to_string()
}

#[test]
fn two_process_sweep_lays_out_one_experiment() {
    let root = scratch("pair");
    fs::create_dir_all(run_dir(&root, "401.bzip2")).expect("bzip2 run dir");
    fs::create_dir_all(run_dir(&root, "429.mcf")).expect("mcf run dir");
    let sweep_path = write_fixture(&root, "[bzip2, mcf]");

    let sweep = load_sweep(&sweep_path, &BTreeMap::new()).expect("load sweep");
    let ts = Timestamp::parse("T1").expect("ts");
    let summary = setup_system(&sweep, &ts).expect("setup");

    let system_dir = root.join("out").join("base").join("l2repl_SRRIP,M2");
    assert_eq!(summary.system_dir, system_dir);
    assert!(system_dir.join("base-l2repl_SRRIP,M2.cfg").is_file());
    assert_eq!(summary.report.failure_count(), 0);
    assert_eq!(summary.report.experiments.len(), 1);

    let exp = system_dir.join("2procs").join("401.bzip2_429.mcf").join("T1");
    assert!(exp.join("run.sh").is_file());
    assert_eq!(
        fs::read_link(exp.join("P0")).expect("P0"),
        run_dir(&root, "401.bzip2")
    );
    assert_eq!(
        fs::read_link(exp.join("P1")).expect("P1"),
        run_dir(&root, "429.mcf")
    );

    let config = ConfigTree::load(&exp.join(EXPERIMENT_CONFIG)).expect("experiment config");
    assert!(command_of(&config, "process0").ends_with("dryer.jpg 2"));
    assert!(command_of(&config, "process1").ends_with("inp.in"));
    assert_eq!(
        config
            .get("sys.caches.l2.repl.type")
            .and_then(|n| n.as_str()),
        Some("SRRIP")
    );
    assert!(config.contains("sim.phaseLength"));
    assert!(config.contains("sim.maxTotalInstrs"));

    let log = fs::read_to_string(system_dir.join("log_T1.txt")).expect("session log");
    assert_eq!(log.lines().collect::<Vec<_>>(), vec![format!("{}/", exp.display())]);

    let manifest: Value = serde_json::from_str(
        &fs::read_to_string(system_dir.join(MANIFEST_FILE)).expect("manifest"),
    )
    .expect("manifest json");
    assert_eq!(manifest["system"], json!("base-l2repl_SRRIP,M2"));
    assert_eq!(manifest["experiments"], json!(1));
    assert_eq!(manifest["failures"], json!(0));
    let _ = fs::remove_dir_all(root);
}

#[test]
fn missing_run_dir_is_reported_and_other_links_survive() {
    let root = scratch("partial");
    fs::create_dir_all(run_dir(&root, "401.bzip2")).expect("bzip2 run dir");
    let sweep_path = write_fixture(&root, "[bzip2, mcf]");

    let sweep = load_sweep(&sweep_path, &BTreeMap::new()).expect("load sweep");
    let ts = Timestamp::parse("T2").expect("ts");
    let summary = setup_system(&sweep, &ts).expect("setup");

    assert_eq!(summary.report.failure_count(), 1);
    assert_eq!(summary.report.experiments.len(), 1);
    assert!(summary.report.skipped.is_empty());
    assert!(summary.report.failed.is_empty());
    let record = &summary.report.experiments[0];
    assert_eq!(record.links, 1);
    assert_eq!(record.link_failures.len(), 1);
    assert_eq!(record.link_failures[0].index, 1);
    assert_eq!(record.link_failures[0].benchmark, "429.mcf");
    assert!(record.dir.join("P0").exists());
    assert!(record.dir.join(EXPERIMENT_CONFIG).is_file());
    assert!(fs::symlink_metadata(record.dir.join("P1")).is_err());

    let log = fs::read_to_string(summary.report.log_path.as_ref().expect("log path"))
        .expect("session log");
    assert_eq!(
        log.lines().collect::<Vec<_>>(),
        vec![format!("{}/", record.dir.display())]
    );
    let manifest: Value = serde_json::from_str(
        &fs::read_to_string(&summary.manifest_path).expect("manifest"),
    )
    .expect("manifest json");
    assert_eq!(manifest["experiments"], json!(1));
    assert_eq!(manifest["failures"], json!(1));
    let _ = fs::remove_dir_all(root);
}

#[test]
fn unwritable_experiment_dir_does_not_stop_sibling_sets() {
    let root = scratch("blocked");
    fs::create_dir_all(run_dir(&root, "401.bzip2")).expect("bzip2 run dir");
    fs::create_dir_all(run_dir(&root, "429.mcf")).expect("mcf run dir");
    let sweep_path = write_fixture_with(
        &root,
        "  first: { type: list, names: [bzip2] }\n  second: { type: list, names: [mcf] }\n",
    );
    let system_dir = root.join("out").join("base").join("l2repl_SRRIP,M2");
    fs::create_dir_all(system_dir.join("1procs")).expect("group dir");
    fs::write(system_dir.join("1procs").join("401.bzip2"), "not a directory").expect("blocker");

    let sweep = load_sweep(&sweep_path, &BTreeMap::new()).expect("load sweep");
    let ts = Timestamp::parse("T4").expect("ts");
    let summary = setup_system(&sweep, &ts).expect("setup");

    assert_eq!(summary.report.failure_count(), 1);
    assert_eq!(summary.report.failed.len(), 1);
    assert_eq!(summary.report.failed[0].benchmarks, vec!["401.bzip2".to_string()]);
    assert_eq!(summary.report.experiments.len(), 1);

    let mcf = system_dir.join("1procs").join("429.mcf").join("T4");
    assert_eq!(summary.report.experiments[0].dir, mcf);
    assert!(mcf.join(EXPERIMENT_CONFIG).is_file());
    assert!(mcf.join("run.sh").is_file());
    assert!(fs::read_link(mcf.join("P0")).is_ok());

    let log = fs::read_to_string(system_dir.join("log_T4.txt")).expect("session log");
    assert_eq!(log.lines().collect::<Vec<_>>(), vec![format!("{}/", mcf.display())]);
    assert!(summary.manifest_path.is_file());
    let _ = fs::remove_dir_all(root);
}

#[test]
fn unknown_workload_name_fails_before_any_experiment() {
    let root = scratch("unknown");
    let sweep_path = write_fixture(&root, "[bzip2, nothing]");
    let sweep = load_sweep(&sweep_path, &BTreeMap::new()).expect("load sweep");
    let ts = Timestamp::parse("T3").expect("ts");
    let err = setup_system(&sweep, &ts).expect_err("unknown alias");
    assert!(format!("{:#}", err).contains("nothing"));
    assert!(!root.join("out").exists());
    let _ = fs::remove_dir_all(root);
}

#[test]
fn set_overrides_change_the_input_set() {
    let root = scratch("override");
    let sweep_path = write_fixture(&root, "[mcf]");
    let mut overrides = BTreeMap::new();
    overrides.insert("input_set".to_string(), json!("train"));
    overrides.insert("system_name".to_string(), json!("alt"));
    let sweep = load_sweep(&sweep_path, &overrides).expect("load sweep");
    assert_eq!(sweep.file.input_set, "train");
    assert_eq!(sweep.file.target_root, root.join("out"));
    assert_eq!(sweep.raw["system_name"], json!("alt"));
    let _ = fs::remove_dir_all(root);
}
