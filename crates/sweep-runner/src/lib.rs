pub mod emulab;
pub mod gen;
pub mod layout;
pub mod patch;
pub mod space;
pub mod sweep;

pub use emulab::{emu_file_name, render_ns_script, write_ns_file, NsFile};
pub use gen::{
    describe_benchmark, descriptive_config_name, generate_config, BenchmarkDescription,
    GenerateRequest,
};
pub use layout::{
    build_experiment_config, experiment_dir, BuildError, ExperimentRecord, FailedExperiment,
    LinkFailure, MaterializeReport, Materializer, SkippedExperiment, Timestamp, EXPERIMENT_CONFIG,
};
pub use patch::{
    default_process_template, default_sim_overrides, inject_processes, PatchError, PatchSession,
    ProcessCommand, ReplPolicy, SystemEdit, SystemParam,
};
pub use space::{
    expand, group_by_procs, parse_workload_sets, ExperimentSet, NameSelection, NamedWorkloadSet,
    ProcessSpec, SpaceError, WorkloadSetSpec,
};
pub use sweep::{
    apply_set_overrides, load_sweep, load_yaml_value, setup_system, LoadedSweep, SetupSummary,
    SweepFile, MANIFEST_FILE,
};
