use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use serde::Serialize;
use sweep_bench::{BenchError, BenchmarkTable, Env, Workload};
use sweep_core::{ensure_dir, ConfigNode, ConfigTree};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::patch::{inject_processes, PatchError, ProcessCommand};
use crate::space::ExperimentSet;

pub const EXPERIMENT_CONFIG: &str = "config.cfg";

/// Directory-safe run stamp, `2024-03-01_14-05-09.123456` by default.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn now() -> Self {
        Self(Local::now().format("%Y-%m-%d_%H-%M-%S%.6f").to_string())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let bad_char = raw.contains(|c: char| matches!(c, '/' | '\\' | ':'));
        if raw.is_empty() || bad_char || raw == "." || raw == ".." {
            return Err(anyhow!(
                "timestamp '{}' must be a single path component without ':'",
                raw
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<target>/<N>procs/<bm1>_<bm2>_.../<timestamp>`
pub fn experiment_dir(target: &Path, set: &ExperimentSet, timestamp: &Timestamp) -> PathBuf {
    target
        .join(format!("{}procs", set.num_procs()))
        .join(set.dir_name())
        .join(timestamp.as_str())
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("process {index} ({benchmark}): {source}")]
    Lookup {
        index: usize,
        benchmark: String,
        #[source]
        source: BenchError,
    },
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Per-experiment config: `base` plus one `process<i>` entry per benchmark.
pub fn build_experiment_config(
    base: &ConfigTree,
    table: &BenchmarkTable,
    env: &Env,
    set: &ExperimentSet,
    process_template: &ConfigNode,
    sim: &ConfigNode,
) -> std::result::Result<ConfigTree, BuildError> {
    let mut processes = Vec::with_capacity(set.num_procs());
    for (index, spec) in set.processes.iter().enumerate() {
        let lookup = |source: BenchError| BuildError::Lookup {
            index,
            benchmark: spec.benchmark.clone(),
            source,
        };
        let bench = table.get(&spec.benchmark).map_err(lookup)?;
        let command = bench.command_line(env, &spec.input_set).map_err(lookup)?;
        let input = bench
            .input_redirect(env, &spec.input_set)
            .map_err(lookup)?;
        processes.push(ProcessCommand { command, input });
    }
    let mut tree = base.clone();
    inject_processes(&mut tree, &processes, process_template, sim)?;
    Ok(tree)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkFailure {
    pub index: usize,
    pub benchmark: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentRecord {
    pub dir: PathBuf,
    pub benchmarks: Vec<String>,
    pub links: usize,
    pub link_failures: Vec<LinkFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedExperiment {
    pub benchmarks: Vec<String>,
    pub index: usize,
    pub benchmark: String,
    pub reason: String,
}

/// Experiment whose directory, config or executable could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedExperiment {
    pub dir: PathBuf,
    pub benchmarks: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    pub experiments: Vec<ExperimentRecord>,
    pub skipped: Vec<SkippedExperiment>,
    pub failed: Vec<FailedExperiment>,
    pub log_path: Option<PathBuf>,
}

impl MaterializeReport {
    pub fn failure_count(&self) -> usize {
        self.skipped.len()
            + self.failed.len()
            + self
                .experiments
                .iter()
                .map(|e| e.link_failures.len())
                .sum::<usize>()
    }
}

/// Everything needed to lay experiments out under one target directory.
pub struct Materializer<'a> {
    pub target_dir: &'a Path,
    pub base: &'a ConfigTree,
    pub table: &'a BenchmarkTable,
    pub env: &'a Env,
    pub executable: &'a Path,
    pub process_template: &'a ConfigNode,
    pub sim: &'a ConfigNode,
    pub timestamp: &'a Timestamp,
    pub log: bool,
}

impl Materializer<'_> {
    pub fn log_path(&self) -> PathBuf {
        self.target_dir.join(format!("log_{}.txt", self.timestamp))
    }

    /// Materializes every experiment, fewest processes first. Failures of a
    /// single experiment or process are recorded in the report and the
    /// remaining experiments still run; only errors that affect every
    /// experiment (unwritable target, missing executable, unopenable session
    /// log) are returned. An experiment is appended to the session log only
    /// once its directory, config and executable are all in place.
    pub fn materialize(
        &self,
        groups: &BTreeMap<usize, Vec<ExperimentSet>>,
    ) -> Result<MaterializeReport> {
        let exec_name = self
            .executable
            .file_name()
            .ok_or_else(|| {
                anyhow!(
                    "executable path has no file name: {}",
                    self.executable.display()
                )
            })?;
        if !self.executable.is_file() {
            return Err(anyhow!("executable not found: {}", self.executable.display()));
        }
        ensure_dir(self.target_dir)
            .with_context(|| format!("creating {}", self.target_dir.display()))?;

        let mut report = MaterializeReport::default();
        let mut log_file = if self.log {
            let path = self.log_path();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening session log {}", path.display()))?;
            report.log_path = Some(path);
            Some(file)
        } else {
            None
        };

        for (num_procs, sets) in groups {
            debug!(num_procs, experiments = sets.len(), "materializing group");
            for set in sets {
                let config = match build_experiment_config(
                    self.base,
                    self.table,
                    self.env,
                    set,
                    self.process_template,
                    self.sim,
                ) {
                    Ok(config) => config,
                    Err(BuildError::Lookup {
                        index,
                        benchmark,
                        source,
                    }) => {
                        warn!(
                            experiment = %set.dir_name(),
                            index,
                            benchmark = %benchmark,
                            error = %source,
                            "skipping experiment"
                        );
                        report.skipped.push(SkippedExperiment {
                            benchmarks: set.benchmarks().iter().map(|b| b.to_string()).collect(),
                            index,
                            benchmark,
                            reason: source.to_string(),
                        });
                        continue;
                    }
                    Err(BuildError::Patch(err)) => return Err(err.into()),
                };

                let dir = experiment_dir(self.target_dir, set, self.timestamp);
                let written = write_experiment(&dir, &config, self.executable, exec_name)
                    .and_then(|()| match log_file.as_mut() {
                        Some(file) => writeln!(file, "{}/", dir.display())
                            .context("appending to session log"),
                        None => Ok(()),
                    });
                if let Err(err) = written {
                    let reason = format!("{:#}", err);
                    warn!(dir = %dir.display(), error = %reason, "unable to write experiment");
                    report.failed.push(FailedExperiment {
                        dir,
                        benchmarks: set.benchmarks().iter().map(|b| b.to_string()).collect(),
                        reason,
                    });
                    continue;
                }

                let mut record = ExperimentRecord {
                    dir: dir.clone(),
                    benchmarks: set.benchmarks().iter().map(|b| b.to_string()).collect(),
                    links: 0,
                    link_failures: Vec::new(),
                };
                for (index, spec) in set.processes.iter().enumerate() {
                    let link = dir.join(format!("P{}", index));
                    match self.link_run_dir(&spec.benchmark, &spec.input_set, &link) {
                        Ok(()) => record.links += 1,
                        Err(err) => {
                            warn!(
                                link = %link.display(),
                                benchmark = %spec.benchmark,
                                error = %err,
                                "unable to link run directory"
                            );
                            record.link_failures.push(LinkFailure {
                                index,
                                benchmark: spec.benchmark.clone(),
                                reason: format!("{:#}", err),
                            });
                        }
                    }
                }
                info!(dir = %dir.display(), links = record.links, "experiment ready");
                report.experiments.push(record);
            }
        }
        Ok(report)
    }

    fn link_run_dir(&self, benchmark: &str, input: &str, link: &Path) -> Result<()> {
        let bench = self.table.get(benchmark)?;
        let target = bench.run_dir(self.env, input)?;
        if !target.exists() {
            return Err(anyhow!("run directory {} does not exist", target.display()));
        }
        if let Ok(existing) = fs::read_link(link) {
            if existing == target {
                debug!(link = %link.display(), "reusing existing link");
                return Ok(());
            }
            return Err(anyhow!(
                "{} already links to {}",
                link.display(),
                existing.display()
            ));
        }
        make_symlink(&target, link)
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> Result<()> {
    symlink(target, link).with_context(|| format!("symlinking {}", link.display()))
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, link: &Path) -> Result<()> {
    Err(anyhow!(
        "symlinks are not supported on this platform: {}",
        link.display()
    ))
}

fn write_experiment(
    dir: &Path,
    config: &ConfigTree,
    executable: &Path,
    exec_name: &std::ffi::OsStr,
) -> Result<()> {
    ensure_dir(dir).with_context(|| format!("creating {}", dir.display()))?;
    config.dump(&dir.join(EXPERIMENT_CONFIG))?;
    copy_executable(executable, &dir.join(exec_name))
}

fn copy_executable(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst).with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
    #[cfg(unix)]
    fs::set_permissions(dst, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{default_process_template, default_sim_overrides};
    use chrono::Utc;
    use sweep_bench::AliasTable;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "simsweep_layout_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    fn spec_env(root: &Path) -> Env {
        Env::from_pairs([
            ("BENCH_DIR", root.join("benchspec").to_string_lossy().to_string()),
            ("SPEC_CFG", "amd64-m64-gcc42-nn".to_string()),
        ])
    }

    #[test]
    fn timestamp_is_a_single_path_component() {
        let now = Timestamp::now();
        assert!(!now.as_str().contains(':'));
        assert!(!now.as_str().contains(' '));
        assert!(Timestamp::parse("2024-01-01_00-00-00").is_ok());
        assert!(Timestamp::parse("a/b").is_err());
        assert!(Timestamp::parse("12:00").is_err());
    }

    #[test]
    fn experiment_dir_is_deterministic() {
        let set = ExperimentSet::new(&["401.bzip2", "429.mcf"], "test");
        let ts = Timestamp::parse("T1").expect("ts");
        let a = experiment_dir(Path::new("/out/base"), &set, &ts);
        let b = experiment_dir(Path::new("/out/base"), &set, &ts);
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/out/base/2procs/401.bzip2_429.mcf/T1"));
    }

    #[test]
    fn lookup_failure_names_the_process() {
        let table = BenchmarkTable::cpu2006();
        let set = ExperimentSet::new(&["401.bzip2", "999.nothing"], "test");
        let err = build_experiment_config(
            &ConfigTree::new(),
            &table,
            &spec_env(Path::new("/b")),
            &set,
            &ConfigNode::from_json(&default_process_template()),
            &ConfigNode::from_json(&default_sim_overrides()),
        )
        .expect_err("unknown benchmark");
        assert!(matches!(err, BuildError::Lookup { index: 1, .. }));
    }

    #[test]
    fn existing_links_to_the_same_target_are_reused() {
        let root = scratch("relink");
        let env = spec_env(&root);
        let table = BenchmarkTable::cpu2006();
        let run_dir = table
            .get("429.mcf")
            .expect("mcf")
            .run_dir(&env, "test")
            .expect("run dir");
        fs::create_dir_all(&run_dir).expect("run dir");
        let exe = root.join("run.sh");
        fs::write(&exe, "#!/bin/sh\n").expect("exe");
        let target = root.join("sys");
        let base = ConfigTree::new();
        let template = ConfigNode::from_json(&default_process_template());
        let sim = ConfigNode::from_json(&default_sim_overrides());
        let ts = Timestamp::parse("fixed").expect("ts");
        let materializer = Materializer {
            target_dir: &target,
            base: &base,
            table: &table,
            env: &env,
            executable: &exe,
            process_template: &template,
            sim: &sim,
            timestamp: &ts,
            log: false,
        };
        let aliases = AliasTable::spec2006();
        let name = aliases.resolve("mcf").expect("alias");
        let mut groups = BTreeMap::new();
        groups.insert(1, vec![ExperimentSet::new(&[name], "test")]);

        let first = materializer.materialize(&groups).expect("first");
        let second = materializer.materialize(&groups).expect("second");
        assert_eq!(first.failure_count(), 0);
        assert_eq!(second.failure_count(), 0);
        assert_eq!(second.experiments[0].links, 1);
        assert!(second.log_path.is_none());
        let _ = fs::remove_dir_all(root);
    }
}
