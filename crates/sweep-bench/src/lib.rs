//! Benchmark descriptors: how each suite is invoked, staged and parameterized.

mod env;
mod error;
mod registry;
pub mod suites;
mod workload;

pub use crate::env::Env;
pub use crate::error::{BenchError, BenchResult};
pub use crate::registry::{AliasTable, Benchmark, BenchmarkTable, TableKind};
pub use crate::workload::{InputEntry, InputTable, SetupAction, Workload};
