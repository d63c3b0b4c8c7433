//! Per-service throttle configuration and its textual override grammar.
//!
//! Overrides use the form `serviceID:operationRegex=rate:burst`, comma separated, e.g.
//! `ApiGatewayV2:DescribeMesh=1.3:5,ApiGatewayV2:Create.*=1.7:3`.
//!
//! Semantics:
//! - Entries sharing a service id within one override string accumulate, in order.
//! - Applying an override replaces the whole rule list of every service it names; defaults for
//!   that service are dropped, other services are untouched.
//! - Parsing is all-or-nothing: a malformed entry anywhere leaves the configuration unchanged.
//! - [`Display`](std::fmt::Display) renders services in ascending order and re-parses to the
//!   same rules.

use crate::error::ConfigError;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Rate rule for the operations of one service matching `pattern`.
#[derive(Debug, Clone)]
pub struct RateRule {
    pattern: Regex,
    rate: f64,
    burst: u32,
}

impl RateRule {
    pub fn new(pattern: Regex, rate: f64, burst: u32) -> Self {
        Self { pattern, rate, burst }
    }

    /// Operation-name pattern, matched unanchored.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Sustained rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }
}

impl PartialEq for RateRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern.as_str() == other.pattern.as_str()
            && self.rate == other.rate
            && self.burst == other.burst
    }
}

/// Rate rules keyed by service id.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleConfig {
    services: BTreeMap<String, Vec<RateRule>>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        crate::defaults::default_config()
    }
}

impl ThrottleConfig {
    /// A configuration with no rules at all.
    pub fn empty() -> Self {
        Self { services: BTreeMap::new() }
    }

    /// Rules for `service_id`, in the order they apply.
    pub fn rules(&self, service_id: &str) -> &[RateRule] {
        self.services.get(service_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Configured service ids, ascending.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// All `(service id, rules)` pairs, ascending by service id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RateRule])> {
        self.services.iter().map(|(id, rules)| (id.as_str(), rules.as_slice()))
    }

    /// Number of configured services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Replace the rule list of one service. An empty list removes the service.
    pub fn set_rules(&mut self, service_id: impl Into<String>, rules: Vec<RateRule>) {
        let service_id = service_id.into();
        if rules.is_empty() {
            self.services.remove(&service_id);
        } else {
            self.services.insert(service_id, rules);
        }
    }

    /// Apply an override string, replacing the rule lists of the services it names.
    ///
    /// On error the configuration is left exactly as it was.
    pub fn apply_overrides(&mut self, overrides: &str) -> Result<(), ConfigError> {
        let staged = parse_overrides(overrides)?;
        for (service_id, rules) in staged {
            let replaced = self.services.get(&service_id).map_or(0, Vec::len);
            tracing::info!(
                service = %service_id,
                rules = rules.len(),
                replaced,
                "applying throttle override"
            );
            self.services.insert(service_id, rules);
        }
        Ok(())
    }
}

impl FromStr for ThrottleConfig {
    type Err = ConfigError;

    /// Parse an override string into a configuration holding only those rules.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { services: parse_overrides(s)? })
    }
}

impl fmt::Display for ThrottleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (service_id, rules) in &self.services {
            for rule in rules {
                if !first {
                    f.write_str(",")?;
                }
                first = false;
                write!(f, "{}:{}={}:{}", service_id, rule.pattern.as_str(), rule.rate, rule.burst)?;
            }
        }
        Ok(())
    }
}

fn parse_overrides(value: &str) -> Result<BTreeMap<String, Vec<RateRule>>, ConfigError> {
    let mut staged: BTreeMap<String, Vec<RateRule>> = BTreeMap::new();
    for entry in value.split(',') {
        let (selector, limit) =
            split_pair(entry, '=').ok_or_else(|| ConfigError::Entry(entry.to_string()))?;
        let (service_id, operation) = split_pair(selector, ':')
            .ok_or_else(|| ConfigError::ServiceOperation(selector.to_string()))?;
        let (rate, burst) =
            split_pair(limit, ':').ok_or_else(|| ConfigError::RateBurst(limit.to_string()))?;
        if service_id.is_empty() {
            return Err(ConfigError::EmptyServiceId(selector.to_string()));
        }
        let pattern = Regex::new(operation).map_err(|e| ConfigError::InvalidPattern {
            fragment: operation.to_string(),
            reason: e.to_string(),
        })?;
        let rule = RateRule::new(pattern, parse_rate(rate)?, parse_burst(burst)?);
        staged.entry(service_id.to_string()).or_default().push(rule);
    }
    Ok(staged)
}

/// Split into exactly two parts on `sep`.
fn split_pair(s: &str, sep: char) -> Option<(&str, &str)> {
    let mut parts = s.split(sep);
    let pair = (parts.next()?, parts.next()?);
    match parts.next() {
        Some(_) => None,
        None => Some(pair),
    }
}

fn parse_rate(s: &str) -> Result<f64, ConfigError> {
    match s.parse::<f64>() {
        Ok(rate) if rate >= 0.0 => Ok(rate),
        _ => Err(ConfigError::InvalidRate(s.to_string())),
    }
}

fn parse_burst(s: &str) -> Result<u32, ConfigError> {
    match s.parse::<u32>() {
        Ok(burst) if burst >= 1 => Ok(burst),
        _ => Err(ConfigError::InvalidBurst(s.to_string())),
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ThrottleConfig {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ThrottleConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
