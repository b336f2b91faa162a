use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::Env;
use crate::error::{BenchError, BenchResult};
use crate::suites::{
    frameworks, jbb, openmp, parsec, spec, splash2, BioParallelBenchmark, GrampsBenchmark,
    MineBenchBenchmark, ParsecBenchmark, Phoenix2Benchmark, SpecBenchmark, SpecJbbBenchmark,
    SpecSuite, Splash2Benchmark, StreamBenchmark,
};
use crate::workload::{SetupAction, Workload};

/// Any known benchmark. Dispatch to the family type is a plain `match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Benchmark {
    Spec(SpecBenchmark),
    Parsec(ParsecBenchmark),
    Splash2(Splash2Benchmark),
    BioParallel(BioParallelBenchmark),
    MineBench(MineBenchBenchmark),
    Stream(StreamBenchmark),
    Gramps(GrampsBenchmark),
    Phoenix2(Phoenix2Benchmark),
    SpecJbb(SpecJbbBenchmark),
}

macro_rules! dispatch {
    ($self:expr, $b:ident => $body:expr) => {
        match $self {
            Benchmark::Spec($b) => $body,
            Benchmark::Parsec($b) => $body,
            Benchmark::Splash2($b) => $body,
            Benchmark::BioParallel($b) => $body,
            Benchmark::MineBench($b) => $body,
            Benchmark::Stream($b) => $body,
            Benchmark::Gramps($b) => $body,
            Benchmark::Phoenix2($b) => $body,
            Benchmark::SpecJbb($b) => $body,
        }
    };
}

impl Benchmark {
    pub fn family(&self) -> &'static str {
        match self {
            Benchmark::Spec(b) => match b.spec_suite() {
                SpecSuite::Cpu2006 => "spec-cpu",
                SpecSuite::Omp2001 | SpecSuite::Omp2012 => "spec-omp",
            },
            Benchmark::Parsec(_) => "parsec",
            Benchmark::Splash2(_) => "splash2",
            Benchmark::BioParallel(_) => "bioparallel",
            Benchmark::MineBench(_) => "minebench",
            Benchmark::Stream(_) => "stream",
            Benchmark::Gramps(_) => "gramps",
            Benchmark::Phoenix2(_) => "phoenix2",
            Benchmark::SpecJbb(_) => "specjbb",
        }
    }
}

impl Workload for Benchmark {
    fn name(&self) -> &str {
        dispatch!(self, b => b.name())
    }

    fn suite(&self) -> &str {
        dispatch!(self, b => b.suite())
    }

    fn setup_action(&self) -> SetupAction {
        dispatch!(self, b => b.setup_action())
    }

    fn input_sets(&self) -> Vec<String> {
        dispatch!(self, b => b.input_sets())
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        dispatch!(self, b => b.command(env, input))
    }

    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        dispatch!(self, b => b.setup_command(env, input))
    }

    fn input_redirect(&self, env: &Env, input: &str) -> BenchResult<String> {
        dispatch!(self, b => b.input_redirect(env, input))
    }

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String> {
        dispatch!(self, b => b.arguments(env, input))
    }

    fn teardown_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        dispatch!(self, b => b.teardown_command(env, input))
    }

    fn env(&self, env: &Env, input: &str) -> BenchResult<String> {
        dispatch!(self, b => b.env(env, input))
    }

    fn resolve_env(&self, env: &Env, input: &str) -> BenchResult<Env> {
        dispatch!(self, b => b.resolve_env(env, input))
    }

    fn run_dir(&self, env: &Env, input: &str) -> BenchResult<PathBuf> {
        dispatch!(self, b => b.run_dir(env, input))
    }
}

/// Which suite tables a [`BenchmarkTable`] is built from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    #[default]
    Cpu2006,
    Spec,
    Full,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Cpu2006 => "cpu2006",
            TableKind::Spec => "spec",
            TableKind::Full => "full",
        }
    }
}

impl FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu2006" => Ok(TableKind::Cpu2006),
            "spec" => Ok(TableKind::Spec),
            "full" => Ok(TableKind::Full),
            other => Err(format!(
                "unknown benchmark table '{}' (expected cpu2006, spec or full)",
                other
            )),
        }
    }
}

/// Benchmarks keyed by canonical name.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkTable {
    entries: BTreeMap<String, Benchmark>,
}

impl BenchmarkTable {
    pub fn cpu2006() -> Self {
        Self::from_iter(spec::cpu2006_table().into_iter().map(Benchmark::Spec))
    }

    /// CPU2006 plus both OpenMP suites.
    pub fn spec() -> Self {
        let mut table = Self::cpu2006();
        table.extend(spec::omp_table().into_iter().map(Benchmark::Spec));
        table
    }

    /// Every suite. GRAMPS and Phoenix2 only contribute when their framework
    /// root is set in `env`.
    pub fn full(env: &Env) -> Self {
        let mut table = Self::spec();
        table.extend(parsec::table().into_iter().map(Benchmark::Parsec));
        table.extend(splash2::table().into_iter().map(Benchmark::Splash2));
        table.extend(
            openmp::bioparallel_table()
                .into_iter()
                .map(Benchmark::BioParallel),
        );
        table.extend(openmp::minebench_table().into_iter().map(Benchmark::MineBench));
        table.extend(frameworks::gramps_table(env).into_iter().map(Benchmark::Gramps));
        table.extend(
            frameworks::phoenix2_table(env)
                .into_iter()
                .map(Benchmark::Phoenix2),
        );
        table.extend([
            Benchmark::SpecJbb(jbb::SpecJbbBenchmark),
            Benchmark::Stream(openmp::stream()),
        ]);
        table
    }

    pub fn build(kind: TableKind, env: &Env) -> Self {
        match kind {
            TableKind::Cpu2006 => Self::cpu2006(),
            TableKind::Spec => Self::spec(),
            TableKind::Full => Self::full(env),
        }
    }

    pub fn get(&self, name: &str) -> BenchResult<&Benchmark> {
        self.entries
            .get(name)
            .ok_or_else(|| BenchError::UnknownBenchmark {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Benchmark> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Extend<Benchmark> for BenchmarkTable {
    fn extend<I: IntoIterator<Item = Benchmark>>(&mut self, iter: I) {
        for bench in iter {
            let name = bench.name().to_string();
            if self.entries.insert(name.clone(), bench).is_some() {
                debug!(benchmark = %name, "later table entry replaces earlier one");
            }
        }
    }
}

impl FromIterator<Benchmark> for BenchmarkTable {
    fn from_iter<I: IntoIterator<Item = Benchmark>>(iter: I) -> Self {
        let mut table = Self::default();
        table.extend(iter);
        table
    }
}

/// Maps user-facing benchmark names to canonical table keys.
///
/// Every canonical name maps to itself. CPU2006 benchmarks are also reachable
/// by numeric id (`401`) and short name (`bzip2`); the OpenMP suites reuse
/// short names (`bwaves`), so they only answer to their full name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn spec2006() -> Self {
        Self::from_table(&BenchmarkTable::cpu2006())
    }

    pub fn from_table(table: &BenchmarkTable) -> Self {
        let mut aliases = BTreeMap::new();
        for bench in table.iter() {
            let canonical = bench.name().to_string();
            if let Benchmark::Spec(spec) = bench {
                if spec.spec_suite() == SpecSuite::Cpu2006 {
                    if let Some((id, short)) = spec.id_parts() {
                        aliases.insert(id.to_string(), canonical.clone());
                        aliases.insert(short.to_string(), canonical.clone());
                    }
                }
            }
            aliases.insert(canonical.clone(), canonical);
        }
        Self { aliases }
    }

    pub fn resolve(&self, alias: &str) -> BenchResult<&str> {
        self.aliases
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| BenchError::UnknownBenchmark {
                name: alias.to_string(),
            })
    }

    /// Distinct canonical names, sorted.
    pub fn canonical_names(&self) -> Vec<String> {
        self.aliases
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_env() -> Env {
        Env::from_pairs([
            ("BENCH_DIR", "/bench"),
            ("INPUTS_DIR", "/nonexistent-simsweep-inputs"),
            ("SPEC_CFG", "amd64-m64-gcc42-nn"),
            ("THREADS", "4"),
            ("GRAMPS_DIR", "/gramps"),
            ("PHOENIX2_DIR", "/phoenix2"),
            ("JBB_DIR", "/specjbb"),
        ])
    }

    #[test]
    fn every_descriptor_resolves_all_known_tokens() {
        let env = full_env();
        let table = BenchmarkTable::full(&env);
        for bench in table.iter() {
            let sets = bench.input_sets();
            assert!(!sets.is_empty(), "{} has no input sets", bench.name());
            for input in &sets {
                let resolved = bench.resolve_env(&env, input).expect("resolve env");
                let texts = [
                    bench.command(&env, input).expect("command"),
                    bench.arguments(&env, input).expect("arguments"),
                    bench.input_redirect(&env, input).expect("redirect"),
                    bench.env(&env, input).expect("env"),
                ];
                for text in &texts {
                    assert!(
                        sweep_core::unresolved_tokens(text, resolved.vars()).is_empty(),
                        "{} / {}: {}",
                        bench.name(),
                        input,
                        text
                    );
                }
                bench.setup_command(&env, input).expect("setup");
            }
        }
    }

    #[test]
    fn full_table_includes_every_family_when_roots_are_set() {
        let table = BenchmarkTable::full(&full_env());
        let families: BTreeSet<&str> = table.iter().map(Benchmark::family).collect();
        assert_eq!(families.len(), 10);
        assert!(table.contains("phoenix2_histogram"));
        assert!(table.contains("histogram"));
        assert_eq!(table.get("specjbb").expect("jbb").suite(), "jbb");

        let bare = BenchmarkTable::full(&Env::new());
        assert!(!bare.contains("mergesort"));
        assert!(bare.contains("stream"));
    }

    #[test]
    fn lookup_of_unknown_name_fails() {
        let table = BenchmarkTable::cpu2006();
        assert_eq!(
            table.get("999.specrand").expect_err("absent"),
            BenchError::UnknownBenchmark {
                name: "999.specrand".to_string()
            }
        );
    }

    #[test]
    fn aliases_resolve_ids_and_short_names() {
        let aliases = AliasTable::spec2006();
        assert_eq!(aliases.resolve("401").expect("id"), "401.bzip2");
        assert_eq!(aliases.resolve("mcf").expect("short"), "429.mcf");
        assert_eq!(aliases.resolve("450.soplex").expect("canonical"), "450.soplex");
        assert!(aliases.resolve("specrand").is_err());

        let canonical = aliases.canonical_names();
        assert_eq!(canonical.len(), BenchmarkTable::cpu2006().len());
        assert!(canonical.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn omp_short_names_do_not_shadow_cpu2006() {
        let aliases = AliasTable::from_table(&BenchmarkTable::spec());
        assert_eq!(aliases.resolve("bwaves").expect("short"), "410.bwaves");
    }

    #[test]
    fn table_kind_parses_lowercase_names() {
        assert_eq!("full".parse::<TableKind>(), Ok(TableKind::Full));
        assert!("all".parse::<TableKind>().is_err());
        assert_eq!(TableKind::default().as_str(), "cpu2006");
    }
}
