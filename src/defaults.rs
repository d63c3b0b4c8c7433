//! Baseline throttle rules shipped before any override is applied.

use crate::config::{RateRule, ThrottleConfig};
use regex::Regex;

/// Service id of the API Gateway V2 API.
pub const API_GATEWAY_V2: &str = "ApiGatewayV2";
/// Service id of the container registry API.
pub const ECR: &str = "ECR";

/// Operations that only read state.
pub const READ_OPERATIONS: &str = "^Describe|List";

const READ_RATE: f64 = 40.0;
const MUTATE_RATE: f64 = 8.0;
const BURST: u32 = 5;

fn rule(pattern: &str, rate: f64, burst: u32) -> RateRule {
    let pattern = Regex::new(pattern).expect("default throttle patterns are valid regex");
    RateRule::new(pattern, rate, burst)
}

/// Conservative per-service limits: reads at 40/s, mutations at 8/s, burst 5.
pub fn default_config() -> ThrottleConfig {
    let mut config = ThrottleConfig::empty();
    config.set_rules(
        API_GATEWAY_V2,
        vec![
            rule(READ_OPERATIONS, READ_RATE, BURST),
            rule("^Create|Update|Delete", MUTATE_RATE, BURST),
        ],
    );
    config.set_rules(
        ECR,
        vec![rule(READ_OPERATIONS, READ_RATE, BURST), rule("^Create|Delete", MUTATE_RATE, BURST)],
    );
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_known_services() {
        let cfg = default_config();
        assert_eq!(cfg.services().collect::<Vec<_>>(), vec![API_GATEWAY_V2, ECR]);
        for (_, rules) in cfg.iter() {
            assert_eq!(rules.len(), 2);
            assert!(rules.iter().all(|r| r.burst() == BURST));
            assert_eq!(rules[0].rate(), READ_RATE);
            assert_eq!(rules[1].rate(), MUTATE_RATE);
        }
    }

    #[test]
    fn read_and_mutate_patterns_split_operations() {
        let cfg = default_config();
        let [read, mutate] = cfg.rules(API_GATEWAY_V2) else {
            panic!("expected two rules");
        };
        assert!(read.pattern().is_match("DescribeApis"));
        assert!(read.pattern().is_match("GetApisList"));
        assert!(!read.pattern().is_match("CreateApi"));
        assert!(mutate.pattern().is_match("CreateApi"));
        assert!(mutate.pattern().is_match("BatchUpdateThing"));
        assert!(!mutate.pattern().is_match("DescribeApis"));
    }

    #[test]
    fn default_trait_matches_table() {
        assert_eq!(ThrottleConfig::default(), default_config());
    }

    #[test]
    fn serializes_to_reparseable_overrides() {
        let rendered = default_config().to_string();
        assert_eq!(
            rendered,
            "ApiGatewayV2:^Describe|List=40:5,ApiGatewayV2:^Create|Update|Delete=8:5,\
             ECR:^Describe|List=40:5,ECR:^Create|Delete=8:5"
        );
        assert_eq!(rendered.parse::<ThrottleConfig>().unwrap(), default_config());
    }
}
