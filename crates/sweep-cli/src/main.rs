use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use sweep_bench::{AliasTable, BenchmarkTable, Env, TableKind, Workload};
use sweep_core::ConfigNode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sweep", version = "0.3.0", about = "zsim experiment sweep generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch the base config and lay out every experiment of a sweep file.
    Setup {
        sweep: PathBuf,
        #[arg(long = "set")]
        set_values: Vec<String>,
        #[arg(long)]
        timestamp: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Write a single config running the given benchmarks together.
    GenConfig {
        #[arg(long)]
        base: PathBuf,
        #[arg(long)]
        input: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long = "env")]
        env_values: Vec<String>,
        #[arg(long, default_value = "cpu2006")]
        table: TableKind,
        #[arg(required = true)]
        benches: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    Describe {
        bench: String,
        #[arg(long)]
        input: Option<String>,
        #[arg(long = "env")]
        env_values: Vec<String>,
        #[arg(long, default_value = "full")]
        table: TableKind,
        #[arg(long)]
        json: bool,
    },
    List {
        #[arg(long)]
        suite: Option<String>,
        #[arg(long = "env")]
        env_values: Vec<String>,
        #[arg(long, default_value = "full")]
        table: TableKind,
        #[arg(long)]
        json: bool,
    },
    /// Turn a session log into an Emulab NS script.
    Emulab {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        bin: String,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", format!("{:#}", err), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Setup {
            sweep,
            set_values,
            timestamp,
            json,
        } => {
            let overrides = parse_set_bindings(&set_values)?;
            let loaded = sweep_runner::load_sweep(&sweep, &overrides)?;
            let timestamp = match timestamp {
                Some(raw) => sweep_runner::Timestamp::parse(&raw)?,
                None => sweep_runner::Timestamp::now(),
            };
            let summary = sweep_runner::setup_system(&loaded, &timestamp)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "setup",
                    "setup": setup_summary_to_json(&summary),
                })));
            }
            println!("system_dir: {}", summary.system_dir.display());
            println!("system_config: {}", summary.system_config.display());
            println!("timestamp: {}", summary.timestamp);
            println!("experiments: {}", summary.report.experiments.len());
            println!("failures: {}", summary.report.failure_count());
            for skipped in &summary.report.skipped {
                println!(
                    "skipped: {} (process {} {}: {})",
                    skipped.benchmarks.join("_"),
                    skipped.index,
                    skipped.benchmark,
                    skipped.reason
                );
            }
            for failed in &summary.report.failed {
                println!("failed: {} ({})", failed.dir.display(), failed.reason);
            }
            if let Some(log) = &summary.report.log_path {
                println!("log: {}", log.display());
            }
        }
        Commands::GenConfig {
            base,
            input,
            out_dir,
            env_values,
            table,
            benches,
            json,
        } => {
            let env = parse_env_pairs(&env_values)?;
            let table = BenchmarkTable::build(table, &env);
            let template = ConfigNode::from_json(&sweep_runner::default_process_template());
            let sim = ConfigNode::from_json(&sweep_runner::default_sim_overrides());
            let path = sweep_runner::generate_config(&sweep_runner::GenerateRequest {
                base_config: &base,
                out_dir: &out_dir,
                benchmarks: &benches,
                input_set: &input,
                table: &table,
                env: &env,
                process_template: &template,
                sim: &sim,
            })?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "gen-config",
                    "config": path.display().to_string(),
                })));
            }
            println!("config: {}", path.display());
        }
        Commands::Describe {
            bench,
            input,
            env_values,
            table,
            json,
        } => {
            let env = parse_env_pairs(&env_values)?;
            let table = BenchmarkTable::build(table, &env);
            let desc = sweep_runner::describe_benchmark(&table, &env, &bench, input.as_deref())?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "benchmark": serde_json::to_value(&desc)?,
                })));
            }
            println!("name: {}", desc.name);
            println!("suite: {}", desc.suite);
            println!("setup_action: {}", desc.setup_action);
            println!("input_sets: {}", desc.input_sets.join(", "));
            println!("input_set: {}", desc.input_set);
            println!("command: {}", desc.command);
            println!("arguments: {}", desc.arguments);
            if !desc.input_redirect.is_empty() {
                println!("input: {}", desc.input_redirect);
            }
            if !desc.env_overlay.is_empty() {
                println!("env: {}", desc.env_overlay);
            }
            for step in &desc.setup_steps {
                println!("setup: {}", step);
            }
            for step in &desc.teardown_steps {
                println!("teardown: {}", step);
            }
            if let Some(dir) = &desc.run_dir {
                println!("run_dir: {}", dir.display());
            }
        }
        Commands::List {
            suite,
            env_values,
            table,
            json,
        } => {
            let env = parse_env_pairs(&env_values)?;
            let table = BenchmarkTable::build(table, &env);
            let aliases = AliasTable::from_table(&table);
            let rows: Vec<Value> = table
                .iter()
                .filter(|b| match &suite {
                    Some(s) => b.suite() == s.as_str() || b.family() == s.as_str(),
                    None => true,
                })
                .map(|b| {
                    json!({
                        "name": b.name(),
                        "suite": b.suite(),
                        "family": b.family(),
                        "input_sets": b.input_sets(),
                    })
                })
                .collect();
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "list",
                    "aliases": aliases.len(),
                    "benchmarks": rows,
                })));
            }
            for row in &rows {
                let sets: Vec<&str> = row["input_sets"]
                    .as_array()
                    .map(|a| a.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                println!(
                    "{}\t{}\t{}",
                    row["name"].as_str().unwrap_or_default(),
                    row["family"].as_str().unwrap_or_default(),
                    sets.join(",")
                );
            }
        }
        Commands::Emulab {
            log,
            bin,
            out,
            json,
        } => {
            let ns = sweep_runner::write_ns_file(&log, &bin, out.as_deref())?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "emulab",
                    "path": ns.path.display().to_string(),
                    "nodes": ns.nodes,
                })));
            }
            println!("emulab: {} ({} nodes)", ns.path.display(), ns.nodes);
        }
    }
    Ok(None)
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Setup { json, .. }
        | Commands::GenConfig { json, .. }
        | Commands::Describe { json, .. }
        | Commands::List { json, .. }
        | Commands::Emulab { json, .. } => *json,
    }
}

fn setup_summary_to_json(summary: &sweep_runner::SetupSummary) -> Value {
    json!({
        "system_dir": summary.system_dir.display().to_string(),
        "system_config": summary.system_config.display().to_string(),
        "manifest": summary.manifest_path.display().to_string(),
        "timestamp": summary.timestamp.as_str(),
        "experiments": summary
            .report
            .experiments
            .iter()
            .map(|e| e.dir.display().to_string())
            .collect::<Vec<_>>(),
        "skipped": summary.report.skipped,
        "failed": summary.report.failed,
        "failures": summary.report.failure_count(),
        "log_path": summary.report.log_path.as_ref().map(|p| p.display().to_string()),
    })
}

fn parse_set_bindings(values: &[String]) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for raw in values {
        let (key, val_raw) = raw
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid --set '{}': expected k=v", raw))?;
        if key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "invalid --set '{}': key cannot be empty",
                raw
            ));
        }
        let parsed =
            serde_json::from_str::<Value>(val_raw).unwrap_or(Value::String(val_raw.to_string()));
        out.insert(key.to_string(), parsed);
    }
    Ok(out)
}

/// `--env K=V` pairs, taken verbatim.
fn parse_env_pairs(values: &[String]) -> Result<Env> {
    let mut env = Env::new();
    for raw in values {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid --env '{}': expected K=V", raw))?;
        if key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "invalid --env '{}': key cannot be empty",
                raw
            ));
        }
        env.insert(key, value);
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_bindings_parse_json_then_fall_back_to_string() {
        let parsed = parse_set_bindings(&[
            "log=false".to_string(),
            "env.THREADS=4".to_string(),
            "input_set=ref".to_string(),
        ])
        .expect("bindings");
        assert_eq!(parsed["log"], json!(false));
        assert_eq!(parsed["env.THREADS"], json!(4));
        assert_eq!(parsed["input_set"], json!("ref"));
        assert!(parse_set_bindings(&["novalue".to_string()]).is_err());
        assert!(parse_set_bindings(&["=1".to_string()]).is_err());
    }

    #[test]
    fn env_pairs_keep_values_verbatim() {
        let env = parse_env_pairs(&["BENCH_DIR=/a=b".to_string(), "THREADS=4".to_string()])
            .expect("env");
        assert_eq!(env.get("BENCH_DIR"), Some("/a=b"));
        assert_eq!(env.get("THREADS"), Some("4"));
        assert!(parse_env_pairs(&["BENCH_DIR".to_string()]).is_err());
    }

    #[test]
    fn cli_parses_gen_config() {
        let cli = Cli::try_parse_from([
            "sweep",
            "gen-config",
            "--base",
            "base.cfg",
            "--input",
            "test",
            "--table",
            "spec",
            "bzip2",
            "mcf",
        ])
        .expect("parse");
        match cli.command {
            Commands::GenConfig { benches, table, .. } => {
                assert_eq!(benches, vec!["bzip2", "mcf"]);
                assert_eq!(table, TableKind::Spec);
            }
            _ => panic!("expected gen-config"),
        }
    }
}
