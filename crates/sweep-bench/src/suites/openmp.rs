//! OpenMP suites: BioParallel, MineBench and STREAM. All three take their
//! thread count through `OMP_NUM_THREADS`, exported during setup and also
//! reported as the process environment overlay.

use std::path::Path;

use crate::env::Env;
use crate::error::BenchResult;
use crate::workload::{
    omp_export, omp_overlay, staging_steps, InputEntry, InputTable, SetupAction, Workload,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BioParallelBenchmark {
    name: String,
    inputs: InputTable,
}

impl BioParallelBenchmark {
    const SUITE: &'static str = "bioparallel";

    pub fn new(name: &str, sets: &[(&str, &str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            inputs: InputTable::new(
                sets.iter()
                    .map(|(set, subdir, args)| InputEntry::new(set, Some(*subdir), args, ""))
                    .collect(),
            ),
        }
    }
}

impl Workload for BioParallelBenchmark {
    fn name(&self) -> &str {
        &self.name
    }

    fn suite(&self) -> &str {
        Self::SUITE
    }

    fn setup_action(&self) -> SetupAction {
        SetupAction::Link
    }

    fn input_sets(&self) -> Vec<String> {
        self.inputs.names()
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        let bench_dir = env.require(&self.name, "BENCH_DIR")?;
        Ok(Path::new(bench_dir)
            .join(Self::SUITE)
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
            Self::SUITE,
            &self.name,
            entry.subdir.as_deref(),
            SetupAction::Link,
        )?;
        steps.push(omp_export(env, &self.name)?);
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
        omp_overlay(env, &self.name)
    }
}

/// MineBench program. Inputs are read in place from `$INPUTS_DIR`, so there
/// is nothing to stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MineBenchBenchmark {
    name: String,
    program: String,
    inputs: InputTable,
}

impl MineBenchBenchmark {
    const SUITE: &'static str = "minebench";

    pub fn new<S: AsRef<str>, A: AsRef<str>>(name: &str, program: &str, sets: &[(S, A)]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            inputs: InputTable::new(
                sets.iter()
                    .map(|(set, args)| InputEntry::new(set.as_ref(), None, args.as_ref(), ""))
                    .collect(),
            ),
        }
    }
}

impl Workload for MineBenchBenchmark {
    fn name(&self) -> &str {
        &self.name
    }

    fn suite(&self) -> &str {
        Self::SUITE
    }

    fn setup_action(&self) -> SetupAction {
        SetupAction::None
    }

    fn input_sets(&self) -> Vec<String> {
        self.inputs.names()
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        let bench_dir = env.require(&self.name, "BENCH_DIR")?;
        Ok(Path::new(bench_dir)
            .join(Self::SUITE)
            .join(&self.program)
            .display()
            .to_string())
    }

    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        self.check_input(input)?;
        Ok(vec![omp_export(env, &self.name)?])
    }

    fn input_redirect(&self, _env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(String::new())
    }

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String> {
        let entry = self.inputs.lookup(&self.name, input)?;
        env.expand(&self.name, &entry.args, &["THREADS", "INPUTS_DIR"])
    }

    fn env(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        omp_overlay(env, &self.name)
    }
}

/// STREAM: the thread count is appended as the last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBenchmark {
    inputs: InputTable,
}

impl StreamBenchmark {
    const NAME: &'static str = "stream";

    pub fn new(sets: &[(&str, &str)]) -> Self {
        Self {
            inputs: InputTable::new(
                sets.iter()
                    .map(|(set, args)| InputEntry::new(set, None, args, ""))
                    .collect(),
            ),
        }
    }
}

impl Workload for StreamBenchmark {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn suite(&self) -> &str {
        Self::NAME
    }

    fn setup_action(&self) -> SetupAction {
        SetupAction::None
    }

    fn input_sets(&self) -> Vec<String> {
        self.inputs.names()
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        let bench_dir = env.require(Self::NAME, "BENCH_DIR")?;
        Ok(Path::new(bench_dir)
            .join(Self::NAME)
            .join(Self::NAME)
            .display()
            .to_string())
    }

    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        self.check_input(input)?;
        Ok(vec![omp_export(env, Self::NAME)?])
    }

    fn input_redirect(&self, _env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(String::new())
    }

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String> {
        let entry = self.inputs.lookup(Self::NAME, input)?;
        let threads = env.require(Self::NAME, "THREADS")?;
        Ok(format!("{} {}", entry.args, threads))
    }

    fn env(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        omp_overlay(env, Self::NAME)
    }
}

pub(crate) fn bioparallel_table() -> Vec<BioParallelBenchmark> {
    let b = BioParallelBenchmark::new;
    vec![
        b(
            "103.semphy",
            &[
                ("53", "53", "-s 53.phy -f phylip -m jtt -G 0.3"),
                ("108", "108", "-s 108.phy -f phylip -m jtt -G 0.3"),
                ("220", "220", "-s 220.phy -f phylip -m jtt -G 0.3"),
            ],
        ),
        b(
            "104.svm",
            &[
                ("30", "", "outData.txt 253 15154 30"),
                ("100", "", "outData.txt 253 15154 100"),
                ("3", "", "outData.txt 253 15154 3"),
                ("s_1000", "", "smallOutData.txt 30 15154 1000"),
                ("t_4000", "", "tinyOutData.txt 7 15154 4000"),
            ],
        ),
        b(
            "105.plsa",
            &[
                ("30k", "30k", "30k_1.txt 30k_2.txt pam120.bla 600 400 3 3 1 $THREADS"),
                ("100k", "100k", "100k_1.txt 100k_2.txt pam120.bla 600 400 3 3 1 $THREADS"),
                ("300k", "300k", "300k_1.txt 300k_2.txt pam120.bla 600 400 3 3 1 $THREADS"),
            ],
        ),
    ]
}

pub(crate) fn minebench_table() -> Vec<MineBenchBenchmark> {
    let m = MineBenchBenchmark::new::<&str, &str>;
    let kmeans = |fuzzy: &str| -> Vec<(String, String)> {
        [("ref", "edge"), ("train", "color"), ("test", "texture100")]
            .into_iter()
            .map(|(set, data)| {
                (
                    set.to_string(),
                    format!("-i $INPUTS_DIR/minebench/kmeans/{} -b -o {}-p $THREADS", data, fuzzy),
                )
            })
            .collect()
    };
    let plain = kmeans("");
    let fuzzy = kmeans("-f ");
    vec![
        m(
            "hop",
            "HOP/para_hop",
            &[
                ("ref", "3932160 $INPUTS_DIR/minebench/HOP/particles_0_256 64 16 -1 $THREADS"),
                ("train", "491520 $INPUTS_DIR/minebench/HOP/particles_0_128 64 16 -1 $THREADS"),
                ("test", "61440 $INPUTS_DIR/minebench/HOP/particles_0_64 64 16 -1 $THREADS"),
            ],
        ),
        m(
            "apr",
            "APR/no_output_apriori",
            &[
                (
                    "ref",
                    "-i $INPUTS_DIR/minebench/APR/data.ntrans_10000.tlen_20.nitems_1.npats_2000.patlen_6 \
                     -f $INPUTS_DIR/minebench/APR/offset_file_10000_P$THREADS.txt -s 0.0075 -n $THREADS",
                ),
                (
                    "train",
                    "-i $INPUTS_DIR/minebench/APR/data.ntrans_1000.tlen_10.nitems_1.npats_2000.patlen_6 \
                     -f $INPUTS_DIR/minebench/APR/offset_file_1000_10_1_P$THREADS.txt -s 0.0075 -n $THREADS",
                ),
            ],
        ),
        m(
            "bayesian",
            "Bayesian/bci",
            &[(
                "ref",
                "-d $INPUTS_DIR/minebench/Bayesian/F26-A64-D250K_bayes.dom \
                 $INPUTS_DIR/minebench/Bayesian/F26-A64-D250K_bayes.tab \
                 $INPUTS_DIR/minebench/Bayesian/F26-A64-D250K_bayes.nbc",
            )],
        ),
        m(
            "scalparc",
            "ScalParC/scalparc",
            &[
                (
                    "ref",
                    "$INPUTS_DIR/minebench/ScalParC/para_F26-A64-D2500K/F26-A64-D2500K.tab 2500000 64 2 $THREADS",
                ),
                (
                    "train",
                    "$INPUTS_DIR/minebench/ScalParC/para_F26-A32-D250K/F26-A32-D250K.tab 250000 32 2 $THREADS",
                ),
            ],
        ),
        MineBenchBenchmark::new("kmeans", "kmeans/example", &plain[..]),
        MineBenchBenchmark::new("kmeans.fuzzy", "kmeans/example", &fuzzy[..]),
        m(
            "rsearch",
            "rsearch/rsearch",
            &[(
                "ref",
                "-n 1000 -c -E 10 -m $INPUTS_DIR/minebench/rsearch/matrices/RIBOSUM85-60.mat \
                 $INPUTS_DIR/minebench/rsearch/Queries/mir-40.stk \
                 $INPUTS_DIR/minebench/rsearch/Databasefile/100Kdb.fa",
            )],
        ),
        m(
            "utility_mine",
            "utility_mine/tran_utility/utility_mine",
            &[
                (
                    "ref",
                    "$INPUTS_DIR/minebench/utility_mine/RealData/real_data_aa_binary \
                     $INPUTS_DIR/minebench/utility_mine/RealData/product_price_binary 0.01",
                ),
                (
                    "train",
                    "$INPUTS_DIR/minebench/utility_mine/GEN/data.ntrans_1000.tlen_10.nitems_1.patlen_6 \
                     $INPUTS_DIR/minebench/utility_mine/GEN/logn1000_binary 0.01",
                ),
            ],
        ),
    ]
}

pub(crate) fn stream() -> StreamBenchmark {
    StreamBenchmark::new(&[
        ("1M3R", "1000000 3"),
        ("10M3R", "10000000 3"),
        ("100M3R", "100000000 3"),
    ])
}
