use std::path::Path;

use crate::env::Env;
use crate::error::BenchResult;
use crate::workload::{staging_steps, InputEntry, InputTable, SetupAction, Workload};

/// Programs whose input file is produced from `<file>.template` before the
/// run, with `$THREADS` and `$ARG<i>` filled in.
const TEMPLATED: &[&str] = &["barnes", "fmm", "water", "water-nsquared"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splash2Kind {
    Apps,
    Kernels,
}

/// Concrete input file generated from a template during setup. The
/// positional values come from the input-set name split on `-`, so input set
/// `131072-long` yields `$ARG0 = 131072` and `$ARG1 = long`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedInput {
    pub template: String,
    pub output: String,
    pub substitutions: Vec<(String, String)>,
}

impl GeneratedInput {
    /// Shell pipeline producing `output` from `template`.
    pub fn pipeline(&self) -> String {
        let mut cmd = format!("cat {}", self.template);
        for (token, value) in &self.substitutions {
            cmd.push_str(&format!(" | sed s/\\${}/{}/", token, value));
        }
        cmd.push_str(&format!(" | cat > {}", self.output));
        cmd
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splash2Benchmark {
    key: String,
    program: String,
    suite: String,
    variant_subdir: Option<String>,
    inputs: InputTable,
}

impl Splash2Benchmark {
    pub fn new(
        kind: Splash2Kind,
        key: &str,
        program: &str,
        sets: &[(&str, Option<&str>, &str, &str)],
        variant_subdir: Option<&str>,
    ) -> Self {
        let suite = match kind {
            Splash2Kind::Apps => "splash2/apps",
            Splash2Kind::Kernels => "splash2/kernels",
        };
        Self {
            key: key.to_string(),
            program: program.to_string(),
            suite: suite.to_string(),
            variant_subdir: variant_subdir.map(str::to_string),
            inputs: InputTable::new(
                sets.iter()
                    .map(|(set, subdir, args, redirect)| {
                        InputEntry::new(set, *subdir, args, redirect)
                    })
                    .collect(),
            ),
        }
    }

    pub fn generated_input(&self, env: &Env, input: &str) -> BenchResult<Option<GeneratedInput>> {
        let entry = self.inputs.lookup(&self.key, input)?;
        if !TEMPLATED.contains(&self.program.as_str()) {
            return Ok(None);
        }
        let threads = env.require(&self.key, "THREADS")?;
        let mut substitutions = vec![("THREADS".to_string(), threads.to_string())];
        for (idx, arg) in input.split('-').enumerate() {
            substitutions.push((format!("ARG{}", idx), arg.to_string()));
        }
        Ok(Some(GeneratedInput {
            template: format!("{}.template", entry.redirect),
            output: entry.redirect.clone(),
            substitutions,
        }))
    }

    fn binary_name(&self) -> &str {
        match self.program.as_str() {
            "lu_nc" | "ocean_nc" => self.program.split('_').next().unwrap_or(&self.program),
            other => other,
        }
    }
}

impl Workload for Splash2Benchmark {
    fn name(&self) -> &str {
        &self.key
    }

    fn suite(&self) -> &str {
        &self.suite
    }

    fn setup_action(&self) -> SetupAction {
        SetupAction::Link
    }

    fn input_sets(&self) -> Vec<String> {
        self.inputs.names()
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        let bench_dir = env.require(&self.key, "BENCH_DIR")?;
        let dir = self.variant_subdir.as_deref().unwrap_or(&self.program);
        Ok(Path::new(bench_dir)
            .join(&self.suite)
            .join(dir)
            .join(self.binary_name())
            .display()
            .to_string())
    }

    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        let entry = self.inputs.lookup(&self.key, input)?;
        let mut steps = staging_steps(
            env,
            &self.key,
            &self.suite,
            &self.program,
            entry.subdir.as_deref(),
            SetupAction::Link,
        )?;
        if let Some(generated) = self.generated_input(env, input)? {
            steps.push(generated.pipeline());
        }
        Ok(steps)
    }

    fn input_redirect(&self, env: &Env, input: &str) -> BenchResult<String> {
        let entry = self.inputs.lookup(&self.key, input)?;
        Ok(env.substitute(&entry.redirect))
    }

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String> {
        let entry = self.inputs.lookup(&self.key, input)?;
        env.expand(&self.key, &entry.args, &["THREADS"])
    }
}

pub(crate) fn table() -> Vec<Splash2Benchmark> {
    use Splash2Kind::{Apps, Kernels};
    let s = Splash2Benchmark::new;
    let ocean_sets: &[(&str, Option<&str>, &str, &str)] = &[
        ("258", None, "-n258 -p$THREADS", ""),
        ("1026", None, "-n1026 -p$THREADS", ""),
        ("2050", None, "-n2050 -p$THREADS", ""),
        ("simlarge", None, "-n2050 -p$THREADS", ""),
        ("native", None, "-n4098 -p$THREADS", ""),
    ];
    let lu_sets: &[(&str, Option<&str>, &str, &str)] = &[
        ("simlarge", None, "-n2048 -p$THREADS", ""),
        ("2048", None, "-n2048 -p$THREADS", ""),
        ("4096", None, "-n4096 -p$THREADS", ""),
        ("native", None, "-n8192 -p$THREADS", ""),
        ("8192", None, "-n8192 -p$THREADS", ""),
    ];
    let water_sets: &[(&str, Option<&str>, &str, &str)] = &[
        ("17576", None, "", "water.in"),
        ("132651", None, "", "water.in"),
        ("1061208", None, "", "water.in"),
    ];
    vec![
        s(
            Apps,
            "barnes",
            "barnes",
            &[
                ("16384", None, "", "barnes.in"),
                ("131072", None, "", "barnes.in"),
                ("131072-long", None, "", "barnes-long.in"),
                ("262144", None, "", "barnes.in"),
                ("1048576", None, "", "barnes.in"),
                ("2097152", None, "", "barnes.in"),
            ],
            None,
        ),
        s(
            Apps,
            "fmm",
            "fmm",
            &[
                ("16384", None, "", "fmm.in"),
                ("131072", None, "", "fmm.in"),
                ("262144", None, "", "fmm.in"),
                ("1048576", None, "", "fmm.in"),
                ("4194304", None, "", "fmm.in"),
            ],
            None,
        ),
        s(Apps, "ocean", "ocean", ocean_sets, Some("ocean/contiguous_partitions")),
        s(
            Apps,
            "ocean_nc",
            "ocean_nc",
            ocean_sets,
            Some("ocean/contiguous_partitions"),
        ),
        s(
            Apps,
            "raytrace",
            "raytrace",
            &[
                ("balls4", Some("balls4"), "-p$THREADS inputs/balls4.env", ""),
                ("simlarge", Some("balls4"), "-p$THREADS -a8 inputs/balls4.env", ""),
                ("car", Some("car"), "-p$THREADS -m64 inputs/car.env", ""),
                ("native", Some("car"), "-p$THREADS -m64 -a128 inputs/car.env", ""),
                ("teapot", Some("teapot"), "-p$THREADS inputs/teapot.env", ""),
            ],
            None,
        ),
        s(
            Apps,
            "volrend",
            "volrend",
            &[
                ("native", None, "$THREADS head 1000", ""),
                ("simlarge", None, "$THREADS head-scaleddown2 100", ""),
                ("simsmall", None, "$THREADS head-scaleddown4 20", ""),
            ],
            None,
        ),
        s(
            Apps,
            "water_nsquared",
            "water-nsquared",
            water_sets,
            Some("water-nsquared"),
        ),
        s(Apps, "water", "water", water_sets, Some("water-spatial")),
        s(
            Kernels,
            "fft",
            "fft",
            &[
                ("1M", None, "-m20 -p$THREADS", ""),
                ("4M", None, "-m22 -p$THREADS", ""),
                ("16M", None, "-m24 -p$THREADS", ""),
                ("simlarge", None, "-m24 -p$THREADS", ""),
                ("64M", None, "-m26 -p$THREADS", ""),
                ("native", None, "-m28 -p$THREADS", ""),
            ],
            None,
        ),
        s(Kernels, "lu", "lu", lu_sets, Some("lu/contiguous_blocks")),
        s(
            Kernels,
            "lu_nc",
            "lu_nc",
            lu_sets,
            Some("lu/non_contiguous_blocks"),
        ),
        s(
            Kernels,
            "radix",
            "radix",
            &[
                ("1M", None, "-m1048576   -n1048576   -p$THREADS", ""),
                ("4M", None, "-m4194304   -n4194304   -p$THREADS", ""),
                ("16M", None, "-m16777216  -n16777216  -p$THREADS", ""),
                ("64M", None, "-m67108864  -n67108864  -p$THREADS", ""),
                ("simmedium", None, "-m16777216  -n16777216  -p$THREADS", ""),
                ("simlarge", None, "-m67108864  -n67108864  -p$THREADS", ""),
                ("128M", None, "-m134217728 -n134217728 -p$THREADS", ""),
                ("native", None, "-m268435456 -n268435456 -p$THREADS", ""),
                ("256M", None, "-m268435456 -n268435456 -p$THREADS", ""),
            ],
            None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(key: &str) -> Splash2Benchmark {
        table()
            .into_iter()
            .find(|b| b.name() == key)
            .expect("benchmark in table")
    }

    fn env() -> Env {
        Env::from_pairs([("BENCH_DIR", "/b"), ("THREADS", "16")])
    }

    #[test]
    fn templated_input_uses_set_name_positions() {
        let barnes = find("barnes");
        let generated = barnes
            .generated_input(&env(), "131072-long")
            .expect("lookup")
            .expect("barnes is templated");
        assert_eq!(
            generated.pipeline(),
            "cat barnes-long.in.template | sed s/\\$THREADS/16/ | sed s/\\$ARG0/131072/ \
             | sed s/\\$ARG1/long/ | cat > barnes-long.in"
        );
        assert_eq!(
            barnes.input_redirect(&env(), "131072-long").expect("redir"),
            "barnes-long.in"
        );
    }

    #[test]
    fn non_templated_programs_generate_nothing() {
        assert_eq!(find("fft").generated_input(&env(), "1M").expect("lookup"), None);
    }

    #[test]
    fn command_honours_variant_subdir_and_nc_binaries() {
        assert_eq!(
            find("lu_nc").command(&env(), "2048").expect("cmd"),
            "/b/splash2/kernels/lu/non_contiguous_blocks/lu"
        );
        assert_eq!(
            find("water_nsquared").command(&env(), "17576").expect("cmd"),
            "/b/splash2/apps/water-nsquared/water-nsquared"
        );
        assert_eq!(
            find("ocean").arguments(&env(), "258").expect("args"),
            "-n258 -p16"
        );
    }
}
