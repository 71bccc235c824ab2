use crate::error::{AdvisorError, AdvisorResult};

// The work function keeps one value per subset of the hot set, so the hot set
// size is an exponent. 16 is 65536 states, which is the most a round can afford.
pub const MAX_HOT_SET_SIZE: usize = 16;

const DEFAULT_HOT_SET_SIZE: usize = 8;
const DEFAULT_MAX_CANDIDATES: usize = 4096;
const DEFAULT_VOTE_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorConfig {
    pub hot_set_size: usize,
    pub max_candidates: usize,
    pub vote_weight: f64,
}

impl AdvisorConfig {
    pub fn new() -> AdvisorConfig {
        // Read environment variables 'OXIDTUNE_HOT_SET_SIZE', 'OXIDTUNE_MAX_CANDIDATES'
        // and 'OXIDTUNE_VOTE_WEIGHT'. Anything unset or unparseable falls back to the default.
        let hot_set_size = match std::env::var("OXIDTUNE_HOT_SET_SIZE") {
            Ok(val) => val.parse::<usize>().unwrap_or(DEFAULT_HOT_SET_SIZE),
            Err(_) => DEFAULT_HOT_SET_SIZE
        };
        let max_candidates = match std::env::var("OXIDTUNE_MAX_CANDIDATES") {
            Ok(val) => val.parse::<usize>().unwrap_or(DEFAULT_MAX_CANDIDATES),
            Err(_) => DEFAULT_MAX_CANDIDATES
        };
        let vote_weight = match std::env::var("OXIDTUNE_VOTE_WEIGHT") {
            Ok(val) => val.parse::<f64>().unwrap_or(DEFAULT_VOTE_WEIGHT),
            Err(_) => DEFAULT_VOTE_WEIGHT
        };
        AdvisorConfig {
            hot_set_size,
            max_candidates,
            vote_weight
        }
    }

    pub fn with_hot_set_size(mut self, hot_set_size: usize) -> Self {
        self.hot_set_size = hot_set_size;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn with_vote_weight(mut self, vote_weight: f64) -> Self {
        self.vote_weight = vote_weight;
        self
    }

    pub fn validate(&self) -> AdvisorResult<()> {
        if self.hot_set_size > MAX_HOT_SET_SIZE {
            return Err(AdvisorError::CapacityExceeded { what: "hot set", limit: MAX_HOT_SET_SIZE });
        }
        if self.hot_set_size == 0 {
            return Err(AdvisorError::InvalidConfig("hot set size must be at least 1".to_string()));
        }
        if self.max_candidates == 0 {
            return Err(AdvisorError::InvalidConfig("candidate pool must hold at least one index".to_string()));
        }
        if !(self.vote_weight >= 0.0) || self.vote_weight.is_infinite() {
            return Err(AdvisorError::InvalidConfig(format!("vote weight {} is not a finite non-negative number", self.vote_weight)));
        }
        Ok(())
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        AdvisorConfig {
            hot_set_size: DEFAULT_HOT_SET_SIZE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            vote_weight: DEFAULT_VOTE_WEIGHT
        }
    }
}

#[cfg(test)]
mod test {
    use crate::error::AdvisorError;

    use super::*;

    #[test]
    fn default_config_is_valid_test() {
        assert!(AdvisorConfig::default().validate().is_ok());
    }

    #[test]
    fn oversized_hot_set_test() {
        let config = AdvisorConfig::default().with_hot_set_size(MAX_HOT_SET_SIZE + 1);
        assert!(matches!(config.validate(), Err(AdvisorError::CapacityExceeded { what: "hot set", .. })));
    }

    #[test]
    fn invalid_values_test() {
        assert!(matches!(AdvisorConfig::default().with_hot_set_size(0).validate(), Err(AdvisorError::InvalidConfig(_))));
        assert!(matches!(AdvisorConfig::default().with_vote_weight(f64::NAN).validate(), Err(AdvisorError::InvalidConfig(_))));
        assert!(matches!(AdvisorConfig::default().with_vote_weight(-1.0).validate(), Err(AdvisorError::InvalidConfig(_))));
    }
}
