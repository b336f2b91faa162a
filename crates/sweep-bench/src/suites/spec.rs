use std::path::{Path, PathBuf};

use crate::env::Env;
use crate::error::BenchResult;
use crate::workload::{
    omp_export, omp_overlay, staging_steps, InputEntry, InputTable, SetupAction, Workload,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecSuite {
    Cpu2006,
    Omp2001,
    Omp2012,
}

impl SpecSuite {
    pub fn dir_name(&self) -> &'static str {
        match self {
            SpecSuite::Cpu2006 => "CPU2006",
            SpecSuite::Omp2001 => "specomp2001",
            SpecSuite::Omp2012 => "specomp2012",
        }
    }

    fn is_openmp(&self) -> bool {
        !matches!(self, SpecSuite::Cpu2006)
    }
}

/// SPEC CPU/OMP benchmark. Arguments are stored as one command line per
/// test/train/ref set, with an optional `<file` stdin redirect at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBenchmark {
    name: String,
    short_name: String,
    suite: SpecSuite,
    setup_action: SetupAction,
    inputs: InputTable,
}

impl SpecBenchmark {
    pub fn new(suite: SpecSuite, name: &str, test: &str, train: &str, reference: &str) -> Self {
        let short_name = match name.split_once('.') {
            Some((_, short)) => short.to_string(),
            None => name.to_string(),
        };
        let inputs = InputTable::new(
            [("test", test), ("train", train), ("ref", reference)]
                .into_iter()
                .map(|(set, line)| {
                    let (args, redirect) = split_redirect(line);
                    InputEntry::new(set, Some(set), args, redirect)
                })
                .collect(),
        );
        let setup_action = if name == "435.gromacs" {
            SetupAction::Copy
        } else {
            SetupAction::Link
        };
        Self {
            name: name.to_string(),
            short_name,
            suite,
            setup_action,
            inputs,
        }
    }

    pub fn cpu2006(name: &str, test: &str, train: &str, reference: &str) -> Self {
        Self::new(SpecSuite::Cpu2006, name, test, train, reference)
    }

    pub fn omp2001(name: &str, test: &str, train: &str, reference: &str) -> Self {
        Self::new(SpecSuite::Omp2001, name, test, train, reference)
    }

    /// OMP2012 benchmark whose three input sets share one argument line.
    pub fn omp2012(name: &str, args: &str) -> Self {
        Self::new(SpecSuite::Omp2012, name, args, args, args)
    }

    pub fn omp2012_sets(name: &str, test: &str, train: &str, reference: &str) -> Self {
        Self::new(SpecSuite::Omp2012, name, test, train, reference)
    }

    pub fn spec_suite(&self) -> SpecSuite {
        self.suite
    }

    /// Numeric id and short name, e.g. `("401", "bzip2")` for `401.bzip2`.
    pub fn id_parts(&self) -> Option<(&str, &str)> {
        self.name.split_once('.')
    }
}

fn split_redirect(line: &str) -> (&str, &str) {
    match line.split_once('<') {
        Some((args, redirect)) => (args.trim(), redirect.trim()),
        None => (line.trim(), ""),
    }
}

impl Workload for SpecBenchmark {
    fn name(&self) -> &str {
        &self.name
    }

    fn suite(&self) -> &str {
        self.suite.dir_name()
    }

    fn setup_action(&self) -> SetupAction {
        self.setup_action
    }

    fn input_sets(&self) -> Vec<String> {
        self.inputs.names()
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        let spec_cfg = env.require(&self.name, "SPEC_CFG")?;
        Ok(format!("{}_base.{}", self.short_name, spec_cfg))
    }

    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        let entry = self.inputs.lookup(&self.name, input)?;
        let mut steps = staging_steps(
            env,
            &self.name,
            self.suite.dir_name(),
            &self.name,
            entry.subdir.as_deref(),
            self.setup_action,
        )?;
        if self.suite.is_openmp() {
            steps.push(omp_export(env, &self.name)?);
        }
        Ok(steps)
    }

    fn input_redirect(&self, env: &Env, input: &str) -> BenchResult<String> {
        let entry = self.inputs.lookup(&self.name, input)?;
        Ok(env.substitute(&entry.redirect))
    }

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String> {
        let entry = self.inputs.lookup(&self.name, input)?;
        Ok(env.substitute(&entry.args))
    }

    fn env(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        if self.suite.is_openmp() {
            omp_overlay(env, &self.name)
        } else {
            Ok(String::new())
        }
    }

    /// `<BENCH_DIR>/<suite>/<name>/run/run_base_<input>_<SPEC_CFG>.0000`, the
    /// directory `runspec` leaves behind after a setup run.
    fn run_dir(&self, env: &Env, input: &str) -> BenchResult<PathBuf> {
        self.check_input(input)?;
        let bench_dir = env.require(&self.name, "BENCH_DIR")?;
        let spec_cfg = env.require(&self.name, "SPEC_CFG")?;
        Ok(Path::new(bench_dir)
            .join(self.suite.dir_name())
            .join(&self.name)
            .join("run")
            .join(format!("run_base_{}_{}.0000", input, spec_cfg)))
    }
}

pub(crate) fn cpu2006_table() -> Vec<SpecBenchmark> {
    let c = SpecBenchmark::cpu2006;
    vec![
        c(
            "400.perlbench",
            "-I. -I./lib attrs.pl",
            "-I./lib diffmail.pl 2 550 15 24 23 100",
            "-I./lib checkspam.pl 2500 5 25 11 150 1 1 1 1",
        ),
        c("401.bzip2", "dryer.jpg 2", "byoudoin.jpg 5", "input.source 64"),
        c(
            "403.gcc",
            "-C cccp.i -o out.o",
            "-C integrate.i -o out.o",
            "-C scilab.i -o out.o",
        ),
        c("410.bwaves", "", "", ""),
        c(
            "416.gamess",
            "<exam29.config",
            "<h2ocu2+.energy.config",
            "<cytosine.2.config",
        ),
        c("429.mcf", "inp.in", "inp.in", "inp.in"),
        c("433.milc", "<su3imp.in", "<su3imp.in", "<su3imp.in"),
        c("434.zeusmp", "", "", ""),
        c(
            "435.gromacs",
            "-silent -deffnm gromacs.tpr -nice 0",
            "-silent -deffnm gromacs.tpr -nice 0",
            "-silent -deffnm gromacs.tpr -nice 0",
        ),
        c("436.cactusADM", "benchADM.par", "benchADM.par", "benchADM.par"),
        c("437.leslie3d", "<leslie3d.in", "<leslie3d.in", "<leslie3d.in"),
        c(
            "444.namd",
            "--input namd.input --iterations 1 --output namd.out",
            "--input namd.input --iterations 1 --output namd.out",
            "--input namd.input --iterations 38 --output namd.out",
        ),
        c(
            "445.gobmk",
            "--quiet --mode gtp <capture.tst",
            "--quiet --mode gtp <arb.tst",
            "--quiet --mode gtp <13x13.tst",
        ),
        c("447.dealII", "8", "10", "23"),
        c("450.soplex", "-m10000 test.mps", "-m1200 train.mps", "-m3500 ref.mps"),
        c(
            "453.povray",
            "SPEC-benchmark-test.ini",
            "SPEC-benchmark-train.ini",
            "SPEC-benchmark-ref.ini",
        ),
        c("454.calculix", "-i beampic", "-i stairs", "-i hyperviscoplastic"),
        c(
            "456.hmmer",
            "--fixed 0 --mean 325 --num 45000 --sd 200 --seed 0 bombesin.hmm",
            "--fixed 0 --mean 425 --num 85000 --sd 300 --seed 0 leng100.hmm",
            "nph3.hmm swiss41",
        ),
        c("458.sjeng", "test.txt", "train.txt", "ref.txt"),
        c("459.GemsFDTD", "", "", ""),
        c("462.libquantum", "33 5", "143 25", "1397 8"),
        c(
            "464.h264ref",
            "-d foreman_test_encoder_baseline.cfg",
            "-d foreman_train_encoder_baseline.cfg",
            "-d foreman_ref_encoder_baseline.cfg",
        ),
        c("465.tonto", "", "", ""),
        c(
            "470.lbm",
            "20 reference.dat 0 1 100_100_130_cf_a.of",
            "300 reference.dat 0 1 100_100_130_cf_b.of",
            "3000 reference.dat 0 0 100_100_130_ldc.of",
        ),
        c("471.omnetpp", "omnetpp.ini", "omnetpp.ini", "omnetpp.ini"),
        c("473.astar", "lake.cfg", "BigLakes1024.cfg", "BigLakes2048.cfg"),
        c("481.wrf", "", "", ""),
        c(
            "482.sphinx3",
            "ctlfile.le . args.an4",
            "ctlfile.le . args.an4",
            "ctlfile.le . args.an4",
        ),
        c(
            "483.xalancbmk",
            "-v test.xml xalanc.xsl",
            "-v allbooks.xml xalanc.xsl",
            "-v t5.xml xalanc.xsl",
        ),
    ]
}

pub(crate) fn omp_table() -> Vec<SpecBenchmark> {
    let o1 = SpecBenchmark::omp2001;
    let o12 = SpecBenchmark::omp2012_sets;
    let art = "-scanfile c756hel.in -trainfile1 a10.img -trainfile2 hc.img";
    let mut table = vec![
        o1("wupwise_m", "", "", ""),
        o1("swim_m", "<swim.in", "<swim.in", "<swim.in"),
        o1("mgrid_m", "<mgrid.in", "<mgrid.in", "<mgrid.in"),
        o1("applu_m", "<applu.in", "<applu.in", "<applu.in"),
        o1("equake_m", "<inp.in", "<inp.in", "<inp.in"),
        o1("apsi_m", "", "", ""),
        o1("gafort_m", "", "", ""),
        o1("fma3d_m", "", "", ""),
        o1(
            "art_m",
            &format!("{art} -stride 2 -startx 130 -starty 220 -endx 150 -endy 230 -objects 1"),
            &format!("{art} -stride 2 -startx 130 -starty 220 -endx 150 -endy 230 -objects 10"),
            &format!("{art} -stride 1 -startx 110 -starty 220 -endx 172 -endy 260 -objects 1000"),
        ),
        o1("ammp_m", "<ammp.in", "<ammp.in", "<ammp.in"),
    ];
    for name in [
        "350.md",
        "351.bwaves",
        "357.bt331",
        "360.ilbdc",
        "362.fma3d",
        "370.mgrid331",
        "371.applu331",
    ] {
        table.push(SpecBenchmark::omp2012(name, ""));
    }
    table.extend([
        o12(
            "352.nab",
            "hkrdenq 1930344093",
            "aminos 391519156",
            "1ea0 281910391",
        ),
        SpecBenchmark::omp2012("358.botsalgn", "-f botsalgn"),
        o12("359.botsspar", "-n 50 -m 25", "-n 100 -m 25", "-n 120 -m 501"),
        SpecBenchmark::omp2012("363.swim", "<swim.in"),
        o12(
            "367.imagick",
            "-shear 25 -resize 640x480 -negate -alpha Off input.tga output.tga",
            "-shear 31 -resize 1280x960 -negate -edge 14 -implode 1.2 -flop -convolve 1,2,1,4,3,4,1,2,1 -edge 100 input1.tga output1.tga",
            "input2.tga -shear 31 -resize 12000x9000 -negate -edge 14 -implode 1.2 -flop -convolve 1,2,1,4,3,4,1,2,1 -edge 100 -resize 800x600 output2.tga",
        ),
        o12("372.smithwa", "30", "32", "41"),
        o12("376.kdtree", "100000 10 2", "400000 10 2", "1400000 4 2"),
    ]);
    table
}
