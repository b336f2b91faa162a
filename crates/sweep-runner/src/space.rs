use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sweep_bench::AliasTable;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpaceError {
    #[error("workload set '{set}': unknown benchmark '{alias}'")]
    UnknownAlias { set: String, alias: String },
    #[error("workload set '{set}': names must be a list or \"all\", got \"{value}\"")]
    InvalidSelection { set: String, value: String },
    #[error("workload set '{set}': {message}")]
    Invalid { set: String, message: String },
    #[error("workload sets must be a mapping of set name to spec")]
    NotAMapping,
}

/// Benchmarks named by a workload set: an explicit list or the `all` keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameSelection {
    Names(Vec<String>),
    Keyword(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkloadSetSpec {
    /// All named benchmarks run together as one experiment.
    List { names: NameSelection },
    /// Every `num_procs`-combination of the named benchmarks.
    Pickset {
        names: NameSelection,
        num_procs: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedWorkloadSet {
    pub name: String,
    pub spec: WorkloadSetSpec,
}

/// Parses an ordered `set name -> spec` mapping.
pub fn parse_workload_sets(value: &Value) -> Result<Vec<NamedWorkloadSet>, SpaceError> {
    let map = value.as_object().ok_or(SpaceError::NotAMapping)?;
    map.iter()
        .map(|(name, raw)| {
            let spec = serde_json::from_value(raw.clone()).map_err(|e| SpaceError::Invalid {
                set: name.clone(),
                message: e.to_string(),
            })?;
            Ok(NamedWorkloadSet {
                name: name.clone(),
                spec,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSpec {
    pub benchmark: String,
    pub input_set: String,
}

/// Benchmarks that run together in one simulation, in process order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentSet {
    pub processes: Vec<ProcessSpec>,
}

impl ExperimentSet {
    pub fn new<S: AsRef<str>>(benchmarks: &[S], input_set: &str) -> Self {
        Self {
            processes: benchmarks
                .iter()
                .map(|b| ProcessSpec {
                    benchmark: b.as_ref().to_string(),
                    input_set: input_set.to_string(),
                })
                .collect(),
        }
    }

    pub fn num_procs(&self) -> usize {
        self.processes.len()
    }

    pub fn benchmarks(&self) -> Vec<&str> {
        self.processes.iter().map(|p| p.benchmark.as_str()).collect()
    }

    /// `<bm1>_<bm2>_...`
    pub fn dir_name(&self) -> String {
        self.benchmarks().join("_")
    }
}

fn resolve_names(
    set: &NamedWorkloadSet,
    names: &NameSelection,
    aliases: &AliasTable,
) -> Result<Vec<String>, SpaceError> {
    match names {
        NameSelection::Keyword(k) if k == "all" => Ok(aliases.canonical_names()),
        NameSelection::Keyword(other) => Err(SpaceError::InvalidSelection {
            set: set.name.clone(),
            value: other.clone(),
        }),
        NameSelection::Names(list) => list
            .iter()
            .map(|alias| {
                aliases
                    .resolve(alias)
                    .map(str::to_string)
                    .map_err(|_| SpaceError::UnknownAlias {
                        set: set.name.clone(),
                        alias: alias.clone(),
                    })
            })
            .collect(),
    }
}

/// Expands workload sets into experiment sets, in set order. Pure: no
/// filesystem access.
pub fn expand(
    sets: &[NamedWorkloadSet],
    aliases: &AliasTable,
    input_set: &str,
) -> Result<Vec<ExperimentSet>, SpaceError> {
    let mut out = Vec::new();
    for set in sets {
        match &set.spec {
            WorkloadSetSpec::List { names } => {
                let names = resolve_names(set, names, aliases)?;
                if names.is_empty() {
                    warn!(set = %set.name, "workload list is empty, skipping");
                    continue;
                }
                out.push(ExperimentSet::new(&names, input_set));
            }
            WorkloadSetSpec::Pickset { names, num_procs } => {
                let names = resolve_names(set, names, aliases)?;
                let k = *num_procs;
                if k == 0 || k > names.len() {
                    warn!(
                        set = %set.name,
                        num_procs = k,
                        available = names.len(),
                        "pickset yields no combinations"
                    );
                    continue;
                }
                out.extend(
                    names
                        .iter()
                        .combinations(k)
                        .map(|combo| ExperimentSet::new(&combo, input_set)),
                );
            }
        }
    }
    Ok(out)
}

pub fn group_by_procs(sets: Vec<ExperimentSet>) -> BTreeMap<usize, Vec<ExperimentSet>> {
    let mut groups: BTreeMap<usize, Vec<ExperimentSet>> = BTreeMap::new();
    for set in sets {
        groups.entry(set.num_procs()).or_default().push(set);
    }
    groups
}
