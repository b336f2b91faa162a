use crate::env::Env;
use crate::error::BenchResult;
use crate::workload::{SetupAction, Workload};

const NAME: &str = "specjbb";
const INPUT_SET: &str = "512wh";

/// SPECjbb on the bundled 1.5 JRE. Everything lives under one installation
/// directory given by `JBB_DIR`; the only input set is the 512-warehouse run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecJbbBenchmark;

impl SpecJbbBenchmark {
    fn base<'a>(&self, env: &'a Env) -> BenchResult<&'a str> {
        Ok(env.require(NAME, "JBB_DIR")?.trim_end_matches('/'))
    }
}

impl Workload for SpecJbbBenchmark {
    fn name(&self) -> &str {
        NAME
    }

    fn suite(&self) -> &str {
        "jbb"
    }

    fn setup_action(&self) -> SetupAction {
        SetupAction::None
    }

    fn input_sets(&self) -> Vec<String> {
        vec![INPUT_SET.to_string()]
    }

    fn command(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(format!("{}/jre1.5.0_22/bin/java", self.base(env)?))
    }

    fn setup_command(&self, env: &Env, input: &str) -> BenchResult<Vec<String>> {
        self.check_input(input)?;
        let base = self.base(env)?;
        Ok(vec![
            format!("export LD_LIBRARY_PATH={}/zsim_jni:$LD_LIBRARY_PATH", base),
            format!(
                "export CLASSPATH={0}/jbb.jar:{0}/check.jar:{0}/zsim_jni/zsim.jar",
                base
            ),
            format!("export PATH={}/jdk1.5.0_22/bin/:$PATH", base),
            "mkdir results".to_string(),
            format!("ln -s {}/xml xml", base),
        ])
    }

    fn input_redirect(&self, _env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(String::new())
    }

    fn arguments(&self, env: &Env, input: &str) -> BenchResult<String> {
        self.check_input(input)?;
        Ok(format!(
            "-Xms44000m -Xmx44000m -Xrs spec.jbb.JBBmain -propfile {}/SPECjbb_512wh.props",
            self.base(env)?
        ))
    }
}
