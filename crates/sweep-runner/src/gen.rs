//! Single-shot config generation and descriptor inspection, for working with
//! one benchmark combination outside a full sweep.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use sweep_bench::{AliasTable, BenchmarkTable, Env, Workload};
use sweep_core::{ensure_dir, ConfigNode, ConfigTree};
use tracing::info;

use crate::layout::build_experiment_config;
use crate::space::ExperimentSet;

/// `<base stem>_<n>_<i>-<bench>-<input>...cfg`, e.g.
/// `base_2_0-401.bzip2-test_1-429.mcf-test.cfg`.
pub fn descriptive_config_name(base_config: &Path, set: &ExperimentSet) -> String {
    let stem = base_config
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut name = format!("{}_{}", stem, set.num_procs());
    for (idx, process) in set.processes.iter().enumerate() {
        name.push_str(&format!("_{}-{}-{}", idx, process.benchmark, process.input_set));
    }
    name.push_str(".cfg");
    name
}

pub struct GenerateRequest<'a> {
    pub base_config: &'a Path,
    pub out_dir: &'a Path,
    pub benchmarks: &'a [String],
    pub input_set: &'a str,
    pub table: &'a BenchmarkTable,
    pub env: &'a Env,
    pub process_template: &'a ConfigNode,
    pub sim: &'a ConfigNode,
}

/// Writes one config running `benchmarks` (aliases allowed) side by side.
/// Returns the path of the written file.
pub fn generate_config(req: &GenerateRequest<'_>) -> Result<PathBuf> {
    let aliases = AliasTable::from_table(req.table);
    let mut canonical = Vec::with_capacity(req.benchmarks.len());
    for (idx, alias) in req.benchmarks.iter().enumerate() {
        let name = aliases
            .resolve(alias)
            .map_err(|e| anyhow!("process {} had an invalid name: {}", idx, e))?;
        canonical.push(name.to_string());
    }
    let set = ExperimentSet::new(&canonical, req.input_set);

    let base = ConfigTree::load(req.base_config)?;
    let tree = build_experiment_config(
        &base,
        req.table,
        req.env,
        &set,
        req.process_template,
        req.sim,
    )?;

    ensure_dir(req.out_dir).with_context(|| format!("creating {}", req.out_dir.display()))?;
    let path = req
        .out_dir
        .join(descriptive_config_name(req.base_config, &set));
    tree.dump(&path)?;
    info!(path = %path.display(), processes = set.num_procs(), "config generated");
    Ok(path)
}

/// Everything a descriptor reports for one input set.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkDescription {
    pub name: String,
    pub suite: String,
    pub setup_action: String,
    pub input_sets: Vec<String>,
    pub input_set: String,
    pub command: String,
    pub arguments: String,
    pub input_redirect: String,
    pub setup_steps: Vec<String>,
    pub teardown_steps: Vec<String>,
    pub env_overlay: String,
    pub run_dir: Option<PathBuf>,
}

pub fn describe_benchmark(
    table: &BenchmarkTable,
    env: &Env,
    name: &str,
    input: Option<&str>,
) -> Result<BenchmarkDescription> {
    let canonical = AliasTable::from_table(table).resolve(name)?.to_string();
    let bench = table.get(&canonical)?;
    let input_sets = bench.input_sets();
    let input = match input {
        Some(input) => input.to_string(),
        None => input_sets
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("benchmark {} has no input sets", canonical))?,
    };
    Ok(BenchmarkDescription {
        name: bench.name().to_string(),
        suite: bench.suite().to_string(),
        setup_action: bench.setup_action().as_str().to_string(),
        command: bench.command(env, &input)?,
        arguments: bench.arguments(env, &input)?,
        input_redirect: bench.input_redirect(env, &input)?,
        setup_steps: bench.setup_command(env, &input)?,
        teardown_steps: bench.teardown_command(env, &input)?,
        env_overlay: bench.env(env, &input)?,
        run_dir: bench.run_dir(env, &input).ok(),
        input_sets,
        input_set: input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptive_name_lists_each_process() {
        let set = ExperimentSet::new(&["401.bzip2", "429.mcf"], "test");
        assert_eq!(
            descriptive_config_name(Path::new("/cfgs/base.cfg"), &set),
            "base_2_0-401.bzip2-test_1-429.mcf-test.cfg"
        );
    }

    #[test]
    fn describe_defaults_to_first_input_set() {
        let env = Env::from_pairs([
            ("BENCH_DIR", "/b"),
            ("SPEC_CFG", "cfg"),
            ("INPUTS_DIR", "/nonexistent-simsweep-inputs"),
        ]);
        let table = BenchmarkTable::cpu2006();
        let desc = describe_benchmark(&table, &env, "bzip2", None).expect("describe");
        assert_eq!(desc.name, "401.bzip2");
        assert_eq!(desc.input_set, "test");
        assert_eq!(desc.command, "bzip2_base.cfg");
        assert_eq!(
            desc.run_dir,
            Some(PathBuf::from("/b/CPU2006/401.bzip2/run/run_base_test_cfg.0000"))
        );
        assert!(describe_benchmark(&table, &env, "bzip2", Some("native")).is_err());
    }
}
