//! One descriptor type per benchmark family, each with its static table.

pub mod frameworks;
pub mod jbb;
pub mod openmp;
pub mod parsec;
pub mod spec;
pub mod splash2;

pub use frameworks::{GrampsBenchmark, Phoenix2Benchmark};
pub use jbb::SpecJbbBenchmark;
pub use openmp::{BioParallelBenchmark, MineBenchBenchmark, StreamBenchmark};
pub use parsec::ParsecBenchmark;
pub use spec::{SpecBenchmark, SpecSuite};
pub use splash2::{GeneratedInput, Splash2Benchmark, Splash2Kind};
