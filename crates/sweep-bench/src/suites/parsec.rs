use std::path::Path;

use crate::env::Env;
use crate::error::BenchResult;
use crate::workload::{
    omp_export, omp_overlay, staging_steps, InputEntry, InputTable, SetupAction, Workload,
};

const SUITE: &str = "parsec";

/// PARSEC benchmark: per input set an input subdirectory and an argument
/// template where `$THREADS` carries the thread count. `freqmine` is the one
/// OpenMP program and also gets `OMP_NUM_THREADS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsecBenchmark {
    name: String,
    setup_action: SetupAction,
    inputs: InputTable,
}

impl ParsecBenchmark {
    pub fn new(name: &str, sets: &[(&str, Option<&str>, &str)]) -> Self {
        let inputs = InputTable::new(
            sets.iter()
                .map(|(set, subdir, args)| InputEntry::new(set, *subdir, args, ""))
                .collect(),
        );
        let setup_action = if name == "freqmine" {
            SetupAction::Copy
        } else {
            SetupAction::Link
        };
        Self {
            name: name.to_string(),
            setup_action,
            inputs,
        }
    }

    fn is_openmp(&self) -> bool {
        self.name == "freqmine"
    }
}

impl Workload for ParsecBenchmark {
    fn name(&self) -> &str {
        &self.name
    }

    fn suite(&self) -> &str {
        SUITE
    }

    fn setup_action(&self) -> SetupAction {
        self.setup_action
    }

    fn input_sets(&self) -> Vec<String> {
        self.inputs.names()
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        let bench_dir = env.require(&self.name, "BENCH_DIR")?;
        Ok(Path::new(bench_dir)
            .join(SUITE)
            .join(&self.name)
            .join(&self.name)
            .display()
            .to_string())
    }

    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        let entry = self.inputs.lookup(&self.name, input)?;
        let mut steps = staging_steps(
            env,
            &self.name,
            SUITE,
            &self.name,
            entry.subdir.as_deref(),
            self.setup_action,
        )?;
        if self.is_openmp() {
            steps.push(omp_export(env, &self.name)?);
        }
        Ok(steps)
    }

    fn input_redirect(&self, _env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(String::new())
    }

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String> {
        let entry = self.inputs.lookup(&self.name, input)?;
        env.expand(&self.name, &entry.args, &["THREADS"])
    }

    fn env(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        if self.is_openmp() {
            omp_overlay(env, &self.name)
        } else {
            Ok(String::new())
        }
    }
}

pub(crate) fn table() -> Vec<ParsecBenchmark> {
    let p = ParsecBenchmark::new;
    vec![
        p(
            "canneal",
            &[
                ("native", Some("native"), "$THREADS 16384 2000 2500000.bnets 10000"),
                ("native100", Some("native"), "$THREADS 16384 2000 2500000.bnets 100"),
                ("simlarge", Some("simlarge"), "$THREADS 16384 2000 400000.bnets 10000"),
                ("simsmall", Some("simsmall"), "$THREADS 16384 2000 100000.bnets 10000"),
                ("simmedium", Some("simmedium"), "$THREADS 16384 2000 200000.bnets 10000"),
                ("huge100", Some("native"), "$THREADS  262144 2000 2500000.bnets 100"),
            ],
        ),
        p(
            "blackscholes",
            &[
                ("native", None, "$THREADS 10000000"),
                ("simlarge", None, "$THREADS 65536"),
                ("250k", None, "$THREADS 250000"),
            ],
        ),
        p(
            "fluidanimate",
            &[
                ("native", Some("native"), "$THREADS 500 in_500K.fluid out.fluid"),
                ("native10", Some("native"), "$THREADS 10 in_500K.fluid out.fluid"),
                ("native20", Some("native"), "$THREADS 20 in_500K.fluid out.fluid"),
                ("simlarge", Some("simlarge"), "$THREADS 5 in_300K.fluid out.fluid"),
            ],
        ),
        p(
            "swaptions",
            &[
                ("native", None, "-ns 128 -sm 1000000 -nt $THREADS"),
                ("simlarge", None, "-ns 64 -sm 20000 -nt $THREADS"),
                ("16K20K", None, "-ns 16384 -sm 20000 -nt $THREADS"),
            ],
        ),
        p(
            "freqmine",
            &[
                ("native", Some("native"), "webdocs_250k.dat 11000"),
                ("simlarge", Some("simlarge"), "kosarak_990k.dat 790"),
            ],
        ),
        p(
            "streamcluster",
            &[
                ("native", None, "10 20 128 1000000 200000 5000 none output.txt $THREADS"),
                ("simlarge", None, "10 20 128 16384 16384 1000 none output.txt $THREADS"),
            ],
        ),
        p(
            "facesim",
            &[
                ("native", Some("native"), "-timing -threads $THREADS -lastframe 100"),
                ("simlarge", Some("simlarge"), "-timing -threads $THREADS"),
            ],
        ),
        p(
            "bodytrack",
            &[
                ("native", Some("native"), "sequenceB_261 4 261 4000 5 0 $THREADS"),
                ("simlarge", Some("simlarge"), "sequenceB_4 4 4 4000 5 0 $THREADS"),
            ],
        ),
    ]
}
