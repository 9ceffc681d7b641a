//! Named pass policies: the composite pass `compile` runs between building
//! the DAG and lowering it.

use dagc_core::config::CompilerConfig;
use dagc_core::error::{Error, Result};

use crate::pass::{
    CompositePass, LoopExtractionPass, LoopInvariantCodeMotionPass, LoopRollingPass,
    LoopUnrollingPass, ParallelismPass, RelayDataFlowModelPass, RelayDataStorePass,
    RelayInsertionPass, ResourcePlacementPass, SkewMetricCollectionPass, StageIdPass,
};

/// Extraction, rolling, invariant code motion and unrolling, in that order.
pub fn loop_optimizations() -> CompositePass {
    CompositePass::new("loop-optimizations")
        .with(LoopExtractionPass)
        .with(LoopRollingPass)
        .with(LoopInvariantCodeMotionPass)
        .with(LoopUnrollingPass)
}

/// Relay vertices on shuffle edges, with their storage and push settings.
pub fn relay_shuffle() -> CompositePass {
    CompositePass::new("relay-shuffle")
        .with(RelayInsertionPass)
        .with(RelayDataStorePass)
        .with(RelayDataFlowModelPass)
}

fn base(name: &str, cfg: &CompilerConfig) -> CompositePass {
    CompositePass::new(name)
        .with(loop_optimizations())
        .with(ParallelismPass::new(cfg.source_parallelism))
}

fn finish(mut policy: CompositePass, cfg: &CompilerConfig) -> CompositePass {
    if cfg.collect_skew_metrics {
        policy.push(SkewMetricCollectionPass);
    }
    policy.push(StageIdPass);
    policy
}

pub fn default_policy(cfg: &CompilerConfig) -> CompositePass {
    finish(base("default", cfg), cfg)
}

/// Requires at least one shuffle edge.
pub fn relay_shuffle_policy(cfg: &CompilerConfig) -> CompositePass {
    finish(base("relay-shuffle", cfg).with(relay_shuffle()), cfg)
}

pub fn transient_resources_policy(cfg: &CompilerConfig) -> CompositePass {
    finish(base("transient-resources", cfg).with(ResourcePlacementPass), cfg)
}

/// The policy `cfg.policy` names.
pub fn policy_for(cfg: &CompilerConfig) -> Result<CompositePass> {
    match cfg.policy.as_str() {
        "default" => Ok(default_policy(cfg)),
        "relay-shuffle" => Ok(relay_shuffle_policy(cfg)),
        "transient-resources" => Ok(transient_resources_policy(cfg)),
        other => Err(Error::Config(format!("unknown policy '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::Pass;

    #[test]
    fn test_policy_names_resolve() {
        for name in dagc_core::config::KNOWN_POLICIES {
            let cfg = CompilerConfig {
                policy: name.to_string(),
                ..CompilerConfig::default()
            };
            assert_eq!(policy_for(&cfg).unwrap().name(), *name);
        }
    }

    #[test]
    fn test_skew_pass_only_when_enabled() {
        let has_skew = |p: &CompositePass| {
            p.flattened()
                .iter()
                .any(|x| matches!(x, Pass::Annotating(a) if a.name() == "skew-metric-collection"))
        };
        let mut cfg = CompilerConfig::default();
        assert!(!has_skew(&default_policy(&cfg)));
        cfg.collect_skew_metrics = true;
        assert!(has_skew(&default_policy(&cfg)));
    }

    #[test]
    fn test_relay_passes_follow_loop_optimizations() {
        let names: Vec<String> = relay_shuffle_policy(&CompilerConfig::default())
            .flattened()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        let unroll = names.iter().position(|n| n == "loop-unrolling").unwrap();
        let relay = names.iter().position(|n| n == "relay-insertion").unwrap();
        assert!(unroll < relay);
        assert_eq!(names.last().map(String::as_str), Some("stage-id"));
    }
}
