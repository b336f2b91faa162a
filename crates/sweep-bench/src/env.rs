use std::collections::BTreeMap;

use crate::error::{BenchError, BenchResult};

/// Substitution variables visible to one descriptor call.
///
/// Values are immutable once handed to a descriptor. Descriptors that derive
/// extra variables (an application directory, say) return a new `Env` from
/// [`crate::Workload::resolve_env`] instead of writing into the caller's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    vars: BTreeMap<String, String>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Copy with one extra variable; the receiver is left as is.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.insert(key, value);
        next
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn require(&self, benchmark: &str, key: &str) -> BenchResult<&str> {
        self.get(key).ok_or_else(|| BenchError::MissingEnv {
            benchmark: benchmark.to_string(),
            key: key.to_string(),
        })
    }

    pub fn substitute(&self, text: &str) -> String {
        sweep_core::substitute(text, &self.vars)
    }

    /// Substitutes `text`, failing when it references one of `required` and
    /// that variable is not set.
    pub fn expand(&self, benchmark: &str, text: &str, required: &[&str]) -> BenchResult<String> {
        let missing = sweep_core::missing_tokens(text, &self.vars);
        for key in required {
            if missing.iter().any(|m| m == key) {
                return Err(BenchError::MissingEnv {
                    benchmark: benchmark.to_string(),
                    key: key.to_string(),
                });
            }
        }
        Ok(self.substitute(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_does_not_touch_the_original() {
        let base = Env::from_pairs([("BENCH_DIR", "/b")]);
        let derived = base.with("APP_DIR", "/b/app/");
        assert!(!base.contains("APP_DIR"));
        assert_eq!(derived.get("APP_DIR"), Some("/b/app/"));
        assert_eq!(derived.get("BENCH_DIR"), Some("/b"));
    }

    #[test]
    fn expand_fails_only_for_required_keys() {
        let env = Env::from_pairs([("BENCH_DIR", "/b")]);
        let err = env
            .expand("canneal", "$THREADS 16384", &["THREADS"])
            .expect_err("THREADS missing");
        assert_eq!(
            err,
            BenchError::MissingEnv {
                benchmark: "canneal".to_string(),
                key: "THREADS".to_string()
            }
        );
        assert_eq!(
            env.expand("x", "$OTHER $BENCH_DIR", &["THREADS"]).expect("ok"),
            "$OTHER /b"
        );
    }
}
