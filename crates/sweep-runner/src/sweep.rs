use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sweep_bench::{AliasTable, BenchmarkTable, Env, TableKind};
use sweep_core::{
    atomic_write_json_pretty, canonical_json_digest, ensure_dir, ConfigNode, ConfigTree,
};
use tracing::info;

use crate::layout::{MaterializeReport, Materializer, Timestamp};
use crate::patch::{default_process_template, default_sim_overrides, PatchSession};
use crate::space::{expand, group_by_procs, parse_workload_sets};

pub const MANIFEST_FILE: &str = "sweep_manifest.json";
const SIMULATOR_BINARY: &str = "zsim";

/// Sweep file as written by the user. Paths are relative to the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepFile {
    pub target_root: PathBuf,
    pub system_name: String,
    pub executable: PathBuf,
    #[serde(default)]
    pub simulator_dir: Option<PathBuf>,
    pub base_config: PathBuf,
    /// Ordered `param -> policy` mapping, or a path to a YAML file with one.
    #[serde(default)]
    pub system_params: Value,
    /// Ordered `set name -> spec` mapping, or a path to a YAML file with one.
    pub workloads: Value,
    pub input_set: String,
    #[serde(default)]
    pub table: TableKind,
    #[serde(default)]
    pub env: BTreeMap<String, Value>,
    #[serde(default = "default_process_template")]
    pub process: Value,
    #[serde(default = "default_sim_overrides")]
    pub sim: Value,
    #[serde(default = "default_log")]
    pub log: bool,
}

fn default_log() -> bool {
    true
}

/// A sweep file after `--set` overrides, with its paths resolved.
#[derive(Debug, Clone)]
pub struct LoadedSweep {
    pub path: PathBuf,
    /// Effective document, overrides included; this is what gets digested.
    pub raw: Value,
    pub file: SweepFile,
    pub system_params: Value,
    pub workloads: Value,
}

impl LoadedSweep {
    /// Substitution variables; non-string values use their JSON text.
    pub fn env(&self) -> Env {
        Env::from_pairs(self.file.env.iter().map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        }))
    }
}

pub fn load_yaml_value(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(serde_json::to_value(yaml)?)
}

pub fn load_sweep(path: &Path, set_overrides: &BTreeMap<String, Value>) -> Result<LoadedSweep> {
    let mut raw = load_yaml_value(path)?;
    apply_set_overrides(&mut raw, set_overrides)?;
    let mut file: SweepFile = serde_json::from_value(raw.clone())
        .with_context(|| format!("invalid sweep file {}", path.display()))?;

    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    file.target_root = resolve_path(&base_dir, &file.target_root);
    file.executable = resolve_path(&base_dir, &file.executable);
    file.base_config = resolve_path(&base_dir, &file.base_config);
    file.simulator_dir = file.simulator_dir.map(|d| resolve_path(&base_dir, &d));

    let system_params = inline_or_file(&base_dir, &file.system_params)?;
    let workloads = inline_or_file(&base_dir, &file.workloads)?;
    Ok(LoadedSweep {
        path: path.to_path_buf(),
        raw,
        file,
        system_params,
        workloads,
    })
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn inline_or_file(base_dir: &Path, value: &Value) -> Result<Value> {
    match value {
        Value::String(rel) => load_yaml_value(&resolve_path(base_dir, Path::new(rel))),
        other => Ok(other.clone()),
    }
}

/// Applies `key.path=value` overrides to the raw document.
pub fn apply_set_overrides(doc: &mut Value, overrides: &BTreeMap<String, Value>) -> Result<()> {
    for (key, value) in overrides {
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(anyhow!("invalid --set key: '{}'", key));
        }
        let pointer = format!("/{}", key.split('.').collect::<Vec<_>>().join("/"));
        set_json_pointer_value(doc, &pointer, value.clone())?;
    }
    Ok(())
}

fn set_json_pointer_value(root: &mut Value, pointer: &str, new_value: Value) -> Result<()> {
    let tokens: Vec<&str> = pointer.split('/').skip(1).collect();
    let Some((last, parents)) = tokens.split_last() else {
        *root = new_value;
        return Ok(());
    };
    let mut cur = root;
    for token in parents {
        cur = match cur {
            Value::Object(map) => map.entry(token.to_string()).or_insert_with(|| json!({})),
            _ => {
                return Err(anyhow!(
                    "override traversal hit non-mapping at '{}' in {}",
                    token,
                    pointer
                ))
            }
        };
    }
    match cur {
        Value::Object(map) => {
            map.insert(last.to_string(), new_value);
            Ok(())
        }
        _ => Err(anyhow!("override target is not a mapping for {}", pointer)),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupSummary {
    pub system_dir: PathBuf,
    pub system_config: PathBuf,
    pub manifest_path: PathBuf,
    pub timestamp: Timestamp,
    pub report: MaterializeReport,
}

/// Patches the base config into the system variant, then lays out every
/// experiment of the workload space under the system directory.
pub fn setup_system(sweep: &LoadedSweep, timestamp: &Timestamp) -> Result<SetupSummary> {
    let file = &sweep.file;
    let session = PatchSession::from_value(&file.system_name, &sweep.system_params)?;
    let sets = parse_workload_sets(&sweep.workloads)?;
    let env = sweep.env();
    let table = BenchmarkTable::build(file.table, &env);
    let aliases = AliasTable::from_table(&table);
    let groups = group_by_procs(expand(&sets, &aliases, &file.input_set)?);

    let base = ConfigTree::load(&file.base_config)?;
    let patched = session.apply(&base)?;
    let system_dir = session.dir(&file.target_root);
    ensure_dir(&system_dir).with_context(|| format!("creating {}", system_dir.display()))?;
    let system_config = system_dir.join(session.config_file_name());
    patched.dump(&system_config)?;
    info!(system = %session.name(), dir = %system_dir.display(), "system config written");

    if let Some(sim_dir) = &file.simulator_dir {
        let src = sim_dir.join(SIMULATOR_BINARY);
        fs::copy(&src, system_dir.join(SIMULATOR_BINARY))
            .with_context(|| format!("copying simulator binary {}", src.display()))?;
    }

    let template = ConfigNode::from_json(&file.process);
    let sim = ConfigNode::from_json(&file.sim);
    let materializer = Materializer {
        target_dir: &system_dir,
        base: &patched,
        table: &table,
        env: &env,
        executable: &file.executable,
        process_template: &template,
        sim: &sim,
        timestamp,
        log: file.log,
    };
    let report = materializer.materialize(&groups)?;

    let manifest_path = system_dir.join(MANIFEST_FILE);
    let sweep_digest =
        canonical_json_digest(&sweep.raw).context("digesting the resolved sweep file")?;
    let manifest = json!({
        "schema_version": "sweep_manifest_v1",
        "system": session.name(),
        "fragments": session.fragments(),
        "sweep_path": sweep.path.to_string_lossy(),
        "sweep": sweep.raw,
        "sweep_digest": sweep_digest,
        "timestamp": timestamp.as_str(),
        "experiments": report.experiments.len(),
        "failures": report.failure_count(),
        "log_path": report.log_path.as_ref().map(|p| p.to_string_lossy().to_string()),
    });
    atomic_write_json_pretty(&manifest_path, &manifest)?;
    info!(
        experiments = report.experiments.len(),
        failures = report.failure_count(),
        "sweep setup complete"
    );

    Ok(SetupSummary {
        system_dir,
        system_config,
        manifest_path,
        timestamp: timestamp.clone(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overrides_create_nested_keys() {
        let mut doc = json!({ "env": { "BENCH_DIR": "/a" }, "log": true });
        let mut overrides = BTreeMap::new();
        overrides.insert("env.SPEC_CFG".to_string(), json!("cfg"));
        overrides.insert("log".to_string(), json!(false));
        apply_set_overrides(&mut doc, &overrides).expect("apply");
        assert_eq!(doc["env"]["SPEC_CFG"], json!("cfg"));
        assert_eq!(doc["env"]["BENCH_DIR"], json!("/a"));
        assert_eq!(doc["log"], json!(false));

        let mut bad = BTreeMap::new();
        bad.insert("log.inner".to_string(), json!(1));
        assert!(apply_set_overrides(&mut doc, &bad).is_err());
        bad.clear();
        bad.insert("env..x".to_string(), json!(1));
        assert!(apply_set_overrides(&mut doc, &bad).is_err());
    }

    #[test]
    fn env_values_are_stringified() {
        let file: SweepFile = serde_json::from_value(json!({
            "target_root": "out",
            "system_name": "base",
            "executable": "run.sh",
            "base_config": "base.cfg",
            "workloads": {},
            "input_set": "test",
            "env": { "THREADS": 4, "BENCH_DIR": "/b" }
        }))
        .expect("sweep file");
        assert_eq!(file.table, TableKind::Cpu2006);
        assert!(file.log);
        assert_eq!(file.process, default_process_template());
        let sweep = LoadedSweep {
            path: PathBuf::from("sweep.yaml"),
            raw: Value::Null,
            file,
            system_params: Value::Null,
            workloads: json!({}),
        };
        let env = sweep.env();
        assert_eq!(env.get("THREADS"), Some("4"));
        assert_eq!(env.get("BENCH_DIR"), Some("/b"));
    }
}
