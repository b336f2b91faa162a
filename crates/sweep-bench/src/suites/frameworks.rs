//! Runtime-framework suites kept outside the benchmark tree: GRAMPS and
//! Phoenix2. Both locate their programs under a framework checkout given by
//! `GRAMPS_DIR` / `PHOENIX2_DIR` and derive `APP_DIR` per program.

use crate::env::Env;
use crate::error::BenchResult;
use crate::workload::{InputEntry, InputTable, SetupAction, Workload};

const GRAMPS_SETTINGS: &str = "gramps-settings";

fn app_dir(env: &Env, benchmark: &str, root_key: &str, dir: &str) -> BenchResult<String> {
    let root = env.require(benchmark, root_key)?;
    Ok(format!("{}/tests/{}/", root, dir))
}

fn arg_table(sets: &[(&str, &str)]) -> InputTable {
    InputTable::new(
        sets.iter()
            .map(|(set, args)| InputEntry::new(set, None, args, ""))
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrampsBenchmark {
    name: String,
    program: String,
    dir: String,
    inputs: InputTable,
}

impl GrampsBenchmark {
    pub fn new(name: &str, program: &str, dir: &str, sets: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            dir: dir.to_string(),
            inputs: arg_table(sets),
        }
    }

    fn is_shell(&self) -> bool {
        self.program == "grampsh"
    }
}

impl Workload for GrampsBenchmark {
    fn name(&self) -> &str {
        &self.name
    }

    fn suite(&self) -> &str {
        "gramps"
    }

    fn setup_action(&self) -> SetupAction {
        SetupAction::None
    }

    fn input_sets(&self) -> Vec<String> {
        self.inputs.names()
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        if self.is_shell() {
            let root = env.require(&self.name, "GRAMPS_DIR")?;
            return Ok(format!("{}/tests/grampsh/grampsh", root));
        }
        Ok(format!(
            "{}{}",
            app_dir(env, &self.name, "GRAMPS_DIR", &self.dir)?,
            self.program
        ))
    }

    /// Writes the runtime settings file the program picks up through
    /// `GRAMPS_CONFIGONLY`. Extra settings lines come from `GRAMPS_OPTS`,
    /// separated by `;`.
    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        self.check_input(input)?;
        let threads = env.require(&self.name, "THREADS")?;
        let mut steps = vec![
            format!("export GRAMPS_CONFIGONLY={}", GRAMPS_SETTINGS),
            format!("echo \"hw.numThreads = {}\" > {}", threads, GRAMPS_SETTINGS),
            format!("echo \"hw.threadsPerCore = 1\" >> {}", GRAMPS_SETTINGS),
            format!("echo \"hw.noPinPThreads = 1\" >> {}", GRAMPS_SETTINGS),
        ];
        if let Some(opts) = env.get("GRAMPS_OPTS") {
            steps.extend(
                opts.split(';')
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(|line| format!("echo \"{}\" >> {}", line, GRAMPS_SETTINGS)),
            );
        }
        Ok(steps)
    }

    fn input_redirect(&self, _env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(String::new())
    }

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String> {
        let entry = self.inputs.lookup(&self.name, input)?;
        let resolved = self.resolve_env(env, input)?;
        let dir = app_dir(env, &self.name, "GRAMPS_DIR", &self.dir)?;
        let flag = if self.is_shell() { "--appdir" } else { "--app_dir" };
        Ok(format!("{} {} {}", flag, dir, resolved.substitute(&entry.args)))
    }

    fn env(&self, _env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(format!("GRAMPS_CONFIGONLY={}", GRAMPS_SETTINGS))
    }

    fn resolve_env(&self, env: &Env, input: &str) -> BenchResult<Env> {
        self.check_input(input)?;
        let dir = app_dir(env, &self.name, "GRAMPS_DIR", &self.dir)?;
        Ok(env.with("APP_DIR", dir))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phoenix2Benchmark {
    name: String,
    program: String,
    inputs: InputTable,
}

impl Phoenix2Benchmark {
    pub fn new(program: &str, sets: &[(&str, &str)]) -> Self {
        Self {
            name: format!("phoenix2_{}", program),
            program: program.to_string(),
            inputs: arg_table(sets),
        }
    }
}

impl Workload for Phoenix2Benchmark {
    fn name(&self) -> &str {
        &self.name
    }

    fn suite(&self) -> &str {
        "phoenix2"
    }

    fn setup_action(&self) -> SetupAction {
        SetupAction::None
    }

    fn input_sets(&self) -> Vec<String> {
        self.inputs.names()
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(format!(
            "{}{}",
            app_dir(env, &self.name, "PHOENIX2_DIR", &self.program)?,
            self.program
        ))
    }

    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        self.check_input(input)?;
        let threads = env.require(&self.name, "THREADS")?;
        Ok(vec![
            format!("export MAPRED_NPROCESSORS={}", threads),
            "export MAPRED_NOBIND=1".to_string(),
        ])
    }

    fn input_redirect(&self, _env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(String::new())
    }

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String> {
        let entry = self.inputs.lookup(&self.name, input)?;
        let resolved = self.resolve_env(env, input)?;
        Ok(resolved.substitute(&entry.args))
    }

    fn env(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        let threads = env.require(&self.name, "THREADS")?;
        Ok(format!("MAPRED_NPROCESSORS={} MAPRED_NOBIND=1", threads))
    }

    fn resolve_env(&self, env: &Env, input: &str) -> BenchResult<Env> {
        self.check_input(input)?;
        let dir = app_dir(env, &self.name, "PHOENIX2_DIR", &self.program)?;
        Ok(env.with("APP_DIR", dir))
    }
}

/// GRAMPS programs, or nothing when `GRAMPS_DIR` is not configured.
pub(crate) fn gramps_table(env: &Env) -> Vec<GrampsBenchmark> {
    if !env.contains("GRAMPS_DIR") {
        return Vec::new();
    }
    let g = GrampsBenchmark::new;
    let mut table = vec![
        g(
            "mergesort",
            "grampsh",
            "mergesort",
            &[
                ("test", "$APP_DIR/mergesort.cfg"),
                ("large", "$APP_DIR/mergesort-large.cfg"),
            ],
        ),
        g(
            "histogram",
            "histogram",
            "histogram",
            &[
                ("red-courtyard-1080p", "$APP_DIR/courtyard-1080p.png"),
                ("com-courtyard-1080p", "$APP_DIR/courtyard-1080p.png --combine"),
            ],
        ),
        g(
            "lr",
            "lr",
            "linear-regression",
            &[("red-60M", "--numPoints 60M"), ("com-60M", "--numPoints --combine")],
        ),
        g("pca", "pca", "pca", &[("1M", "--rows 1024 --cols 1024")]),
    ];
    for app in ["fm", "tde", "recursiveGaussian", "srad"] {
        table.push(g(
            app,
            app,
            app,
            &[
                ("small", "--i=small"),
                ("medium", "--i=medium"),
                ("large", "--i=large"),
                ("xlarge", "--i=xlarge"),
            ],
        ));
    }
    table.push(g(
        "fft2",
        "fft2",
        "fft2",
        &[("1K-10K", "--f=1024 --n=10000"), ("64K-5K", "--f=65536 --n=5000")],
    ));
    table.push(g("serpent", "serpent", "serpent", &[("24K", "--n=24000")]));
    table.push(g(
        "packetTracer",
        "packetTracer",
        "packetTracer",
        &[
            ("fairy-512-0", "--output ray-fairy-512-0.png --scene fairy --size 512 --maxdepth 0"),
            ("fairy-512-1", "--output ray-fairy-512-1.png --scene fairy --size 512 --maxdepth 1"),
            ("fairy-2048-0", "--output ray-fairy-2048-0.png --scene fairy --size 2048 --maxdepth 0"),
            ("fairy-4096-0", "--output ray-fairy-4096-0.png --scene fairy --size 4096 --maxdepth 0"),
        ],
    ));
    table
}

/// Phoenix2 programs, or nothing when `PHOENIX2_DIR` is not configured.
pub(crate) fn phoenix2_table(env: &Env) -> Vec<Phoenix2Benchmark> {
    if !env.contains("PHOENIX2_DIR") {
        return Vec::new();
    }
    let p = Phoenix2Benchmark::new;
    vec![
        p(
            "histogram",
            &[
                ("small", "$APP_DIR/inputs/histogram_datafiles/small.bmp"),
                ("med", "$APP_DIR/inputs/histogram_datafiles/med.bmp"),
                ("large", "$APP_DIR/inputs/histogram_datafiles/large.bmp"),
            ],
        ),
        p(
            "kmeans",
            &[
                ("d3c100p100Ks1K", "-d 3 -c 100 -p 100000 -s 1000"),
                ("d3c100p500Ks1K", "-d 3 -c 100 -p 500000 -s 1000"),
            ],
        ),
        p(
            "linear_regression",
            &[
                ("50M", "$APP_DIR/inputs/linear_regression_datafiles/key_file_50MB.txt"),
                ("100M", "$APP_DIR/inputs/linear_regression_datafiles/key_file_100MB.txt"),
                ("500M", "$APP_DIR/inputs/linear_regression_datafiles/key_file_500MB.txt"),
            ],
        ),
        p(
            "pca",
            &[
                ("r1Kc1K", "-r 1000 -c 1000 -s 10000"),
                ("r2Kc2K", "-r 2000 -c 2000 -s 10000"),
            ],
        ),
        p(
            "string_match",
            &[
                ("50M", "$APP_DIR/inputs/string_match_datafiles/key_file_50MB.txt"),
                ("100M", "$APP_DIR/inputs/string_match_datafiles/key_file_100MB.txt"),
                ("500M", "$APP_DIR/inputs/string_match_datafiles/key_file_500MB.txt"),
            ],
        ),
        p(
            "word_count",
            &[
                ("10M", "$APP_DIR/inputs/word_count_datafiles/word_10MB.txt"),
                ("50M", "$APP_DIR/inputs/word_count_datafiles/word_50MB.txt"),
                ("100M", "$APP_DIR/inputs/word_count_datafiles/word_100MB.txt"),
            ],
        ),
    ]
}
