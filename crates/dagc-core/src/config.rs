//! Compiler configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Names of the composite pass policies the planner knows how to assemble.
pub const KNOWN_POLICIES: &[&str] = &["default", "relay-shuffle", "transient-resources"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Parallelism the parallelism pass assigns to every source vertex.
    pub source_parallelism: usize,

    /// Composite pass policy to run between building and lowering.
    pub policy: String,

    /// Tag shuffle edges for data-skew metric collection.
    pub collect_skew_metrics: bool,

    /// Check the stage-level shape rules after lowering.
    pub verify_stages: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            source_parallelism: 1,
            policy: "default".to_string(),
            collect_skew_metrics: false,
            verify_stages: true,
        }
    }
}

impl CompilerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `DAGC_SOURCE_PARALLELISM`: parallelism of source vertices
    /// - `DAGC_POLICY`: pass policy name
    /// - `DAGC_COLLECT_SKEW_METRICS`: `true`/`false`
    /// - `DAGC_VERIFY_STAGES`: `true`/`false`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("DAGC_SOURCE_PARALLELISM") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.source_parallelism = v;
            }
        }

        if let Ok(s) = std::env::var("DAGC_POLICY") {
            cfg.policy = s;
        }

        if let Ok(s) = std::env::var("DAGC_COLLECT_SKEW_METRICS") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.collect_skew_metrics = v;
            }
        }

        if let Ok(s) = std::env::var("DAGC_VERIFY_STAGES") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.verify_stages = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_parallelism == 0 {
            return Err(Error::Config("source_parallelism must be at least 1".into()));
        }
        if !KNOWN_POLICIES.contains(&self.policy.as_str()) {
            return Err(Error::Config(format!(
                "unknown policy '{}', expected one of {:?}",
                self.policy, KNOWN_POLICIES
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CompilerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_source_parallelism_rejected() {
        let cfg = CompilerConfig {
            source_parallelism: 0,
            ..CompilerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let cfg = CompilerConfig {
            policy: "fastest".into(),
            ..CompilerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}
