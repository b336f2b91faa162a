use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::env::Env;
use crate::error::{BenchError, BenchResult};

/// How a descriptor stages its input files into the run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupAction {
    Link,
    Copy,
    None,
}

impl SetupAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupAction::Link => "link",
            SetupAction::Copy => "copy",
            SetupAction::None => "none",
        }
    }
}

/// Capability set every benchmark descriptor exposes.
///
/// All per-input operations fail with [`BenchError::UnknownInputSet`] for a
/// key that is not in [`Workload::input_sets`]. Variables a suite needs are
/// looked up when the operation needs them, so a descriptor can be listed and
/// inspected without a complete environment.
pub trait Workload {
    fn name(&self) -> &str;

    fn suite(&self) -> &str;

    fn setup_action(&self) -> SetupAction;

    fn input_sets(&self) -> Vec<String>;

    fn command(&self, env: &Env, input: &str) -> BenchResult<String>;

    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>>;

    fn input_redirect(&self, env: &Env, input: &str) -> BenchResult<String>;

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String>;

    fn teardown_command(&self, _env: &Env, input: &str) -> BenchResult<Vec<String>> {
        self.check_input(input)?;
        Ok(Vec::new())
    }

    /// Environment overlay (`"A=3 B=4"`) the process should run with.
    ///
    /// Several suites also export the same variables from
    /// [`Workload::setup_command`]; the two hooks are reported separately.
    fn env(&self, _env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(String::new())
    }

    /// Declared variables plus whatever this descriptor derives for `input`.
    fn resolve_env(&self, env: &Env, input: &str) -> BenchResult<Env> {
        self.check_input(input)?;
        Ok(env.clone())
    }

    fn run_dir(&self, _env: &Env, input: &str) -> BenchResult<PathBuf> {
        self.check_input(input)?;
        Err(BenchError::NoRunDir {
            benchmark: self.name().to_string(),
        })
    }

    fn check_input(&self, input: &str) -> BenchResult<()> {
        if self.input_sets().iter().any(|s| s == input) {
            Ok(())
        } else {
            Err(BenchError::UnknownInputSet {
                benchmark: self.name().to_string(),
                input: input.to_string(),
            })
        }
    }

    /// Command plus arguments, the string a simulator process entry runs.
    fn command_line(&self, env: &Env, input: &str) -> BenchResult<String> {
        let command = self.command(env, input)?;
        let args = self.arguments(env, input)?;
        Ok(format!("{} {}", command, args).trim_end().to_string())
    }
}

/// One row of a suite table: optional input subdirectory, argument template
/// and stdin redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEntry {
    pub name: String,
    pub subdir: Option<String>,
    pub args: String,
    pub redirect: String,
}

impl InputEntry {
    pub fn new(name: &str, subdir: Option<&str>, args: &str, redirect: &str) -> Self {
        Self {
            name: name.to_string(),
            subdir: subdir.filter(|s| !s.is_empty()).map(str::to_string),
            args: args.to_string(),
            redirect: redirect.to_string(),
        }
    }
}

/// Input sets in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputTable {
    entries: Vec<InputEntry>,
}

impl InputTable {
    pub fn new(entries: Vec<InputEntry>) -> Self {
        Self { entries }
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn lookup(&self, benchmark: &str, input: &str) -> BenchResult<&InputEntry> {
        self.entries
            .iter()
            .find(|e| e.name == input)
            .ok_or_else(|| BenchError::UnknownInputSet {
                benchmark: benchmark.to_string(),
                input: input.to_string(),
            })
    }
}

/// Staging steps for `<INPUTS_DIR>/<suite>/<name>/`: entries of `all/`
/// first, then entries of the input-specific directory, each in file-name
/// order. An entry name present in both is staged once, from the
/// input-specific directory.
pub(crate) fn staging_steps(
    env: &Env,
    benchmark: &str,
    suite: &str,
    name: &str,
    subdir: Option<&str>,
    action: SetupAction,
) -> BenchResult<Vec<String>> {
    let verb = match action {
        SetupAction::None => return Ok(Vec::new()),
        SetupAction::Link => "ln -s",
        SetupAction::Copy => "cp -r",
    };
    let inputs_dir = env.require(benchmark, "INPUTS_DIR")?;
    let bench_dir = Path::new(inputs_dir).join(suite).join(name);

    let specific = match subdir {
        Some(subdir) => list_entries(&bench_dir.join(subdir)),
        None => Vec::new(),
    };
    let shadowed: BTreeSet<&str> = specific.iter().map(|(name, _)| name.as_str()).collect();
    let common: Vec<(String, PathBuf)> = list_entries(&bench_dir.join("all"))
        .into_iter()
        .filter(|(name, _)| !shadowed.contains(name.as_str()))
        .collect();

    let mut steps: Vec<String> = common
        .iter()
        .chain(specific.iter())
        .map(|(entry, src)| format!("{} {} {}", verb, src.display(), entry))
        .collect();
    if action == SetupAction::Copy {
        steps.push("chmod -R u+w .".to_string());
    }
    debug!(benchmark, steps = steps.len(), "staging steps resolved");
    Ok(steps)
}

fn list_entries(dir: &Path) -> Vec<(String, PathBuf)> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| {
            (
                entry.file_name().to_string_lossy().to_string(),
                entry.path().to_path_buf(),
            )
        })
        .collect()
}

pub(crate) fn omp_export(env: &Env, benchmark: &str) -> BenchResult<String> {
    let threads = env.require(benchmark, "THREADS")?;
    Ok(format!("export OMP_NUM_THREADS={}", threads))
}

pub(crate) fn omp_overlay(env: &Env, benchmark: &str) -> BenchResult<String> {
    let threads = env.require(benchmark, "THREADS")?;
    Ok(format!("OMP_NUM_THREADS={}", threads))
}
