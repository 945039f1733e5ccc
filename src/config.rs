//! Engine and proof configuration.

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// Compile-time settings for a prover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Buckets with at least this many rules are partitioned by first argument.
    /// Default: 6.
    pub index_threshold: usize,

    /// Enables first-argument partitioning at all.
    pub indexing: bool,

    /// Logs QUERY/OK___/FAIL_ lines for every traced predicate activation.
    pub trace: bool,

    /// Predicates whose names start with one of these are never traced.
    pub trace_excludes: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_threshold: 6,
            indexing: true,
            trace: false,
            trace_excludes: vec!["member".to_string(), "rbt-".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CompileError> {
        if self.index_threshold < 2 {
            return Err(CompileError::Config(format!(
                "index_threshold must be at least 2, got {}",
                self.index_threshold
            )));
        }
        Ok(())
    }

    pub fn is_traced(&self, name: &str) -> bool {
        self.trace
            && !self
                .trace_excludes
                .iter()
                .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// Per-proof settings handed to compiled queries and builtins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    /// Maximum number of trampoline invocations before the proof is aborted.
    pub step_limit: Option<u64>,
}

impl ProverConfig {
    pub fn with_step_limit(step_limit: u64) -> Self {
        Self {
            step_limit: Some(step_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.index_threshold, 6);
        assert!(config.indexing);
        assert!(config.validate().is_ok());
        assert_eq!(ProverConfig::default().step_limit, None);
    }

    #[test]
    fn test_rejects_tiny_threshold() {
        let config = EngineConfig {
            index_threshold: 1,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(CompileError::Config(_))));
    }

    #[test]
    fn test_trace_excludes() {
        let config = EngineConfig {
            trace: true,
            ..EngineConfig::default()
        };
        assert!(config.is_traced("append"));
        assert!(!config.is_traced("member"));
        assert!(!config.is_traced("rbt-insert"));
        assert!(!EngineConfig::default().is_traced("append"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig = serde_json::from_str(r#"{"indexing": false}"#).unwrap();
        assert!(!config.indexing);
        assert_eq!(config.index_threshold, 6);

        let config: ProverConfig = serde_json::from_str(r#"{"step_limit": 1000}"#).unwrap();
        assert_eq!(config.step_limit, Some(1000));
    }
}
