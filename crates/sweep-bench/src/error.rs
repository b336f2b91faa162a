use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BenchError {
    #[error("unknown benchmark '{name}'")]
    UnknownBenchmark { name: String },
    #[error("benchmark '{benchmark}' has no input set '{input}'")]
    UnknownInputSet { benchmark: String, input: String },
    #[error("benchmark '{benchmark}' requires env var {key}")]
    MissingEnv { benchmark: String, key: String },
    #[error("benchmark '{benchmark}' has no pre-staged run directory")]
    NoRunDir { benchmark: String },
}

pub type BenchResult<T> = Result<T, BenchError>;
