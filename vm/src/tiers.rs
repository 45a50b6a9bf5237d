use std::cell::Cell;
use std::env;
use std::fmt;

use crate::stack::Stack;

pub const DEFAULT_HYBRID_THRESHOLD: u32 = 519;
pub const DEFAULT_WARM_THRESHOLD: u32 = 2;
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Which execution loop runs activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierMode {
    /// Threaded code only.
    Threaded = 1,
    /// The sequential loop only.
    Tracing = 2,
    /// Threaded code, moving hot loops to the sequential loop.
    Hybrid = 3,
}

impl TryFrom<u8> for TierMode {
    type Error = ConfigError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(TierMode::Threaded),
            2 => Ok(TierMode::Tracing),
            3 => Ok(TierMode::Hybrid),
            other => Err(ConfigError::InvalidTier(other.to_string())),
        }
    }
}

impl TierMode {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let level: u8 = text
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidTier(text.to_string()))?;
        TierMode::try_from(level)
    }

    /// Like [`TierMode::parse`], falling back to the threaded tier.
    pub fn parse_or_default(text: &str) -> Self {
        TierMode::parse(text).unwrap_or_else(|err| {
            log::warn!("{err}, using the threaded tier");
            TierMode::Threaded
        })
    }
}

impl fmt::Display for TierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierMode::Threaded => write!(f, "threaded"),
            TierMode::Tracing => write!(f, "tracing"),
            TierMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidTier(String),
    InvalidThreshold(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidTier(value) => write!(f, "unknown tier {value:?}"),
            ConfigError::InvalidThreshold(value) => {
                write!(f, "invalid hybrid threshold {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct TierConfig {
    pub mode: TierMode,
    hybrid_threshold: Cell<u32>,
    /// Invocations after which a method gets a threaded program.
    pub warm_threshold: u32,
    /// Nested activations allowed before `StackOverflow`.
    pub max_depth: usize,
}

impl TierConfig {
    pub fn new(mode: TierMode) -> Self {
        Self {
            mode,
            hybrid_threshold: Cell::new(DEFAULT_HYBRID_THRESHOLD),
            warm_threshold: DEFAULT_WARM_THRESHOLD,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_hybrid_threshold(self, threshold: u32) -> Self {
        self.hybrid_threshold.set(threshold);
        self
    }

    pub fn with_warm_threshold(mut self, threshold: u32) -> Self {
        self.warm_threshold = threshold;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Read `SOM_TIER` and `SOM_HYBRID_THRESHOLD`.
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var("SOM_TIER").ok().as_deref(),
            env::var("SOM_HYBRID_THRESHOLD").ok().as_deref(),
        )
    }

    /// Bad values are reported and replaced by the defaults.
    pub fn from_vars(tier: Option<&str>, threshold: Option<&str>) -> Self {
        let mode = tier.map_or(TierMode::Threaded, TierMode::parse_or_default);
        let config = Self::new(mode);
        match threshold.map(parse_threshold) {
            Some(Ok(threshold)) => config.with_hybrid_threshold(threshold),
            Some(Err(err)) => {
                log::warn!("{err}, using {DEFAULT_HYBRID_THRESHOLD}");
                config
            }
            None => config,
        }
    }

    /// Threshold new back-edge sites latch on their first decision.
    pub fn hybrid_threshold(&self) -> u32 {
        self.hybrid_threshold.get()
    }

    /// Sites that already decided keep their old threshold.
    pub fn set_hybrid_threshold(&self, threshold: u32) {
        self.hybrid_threshold.set(threshold);
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        Self::new(TierMode::Threaded)
    }
}

pub fn parse_threshold(text: &str) -> Result<u32, ConfigError> {
    text.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidThreshold(text.to_string()))
}

/// Where an in-flight activation resumes after changing tiers.
#[derive(Debug)]
pub struct Continuation {
    pub offset: usize,
    pub stack: Stack,
}

#[derive(Debug)]
pub enum Transfer {
    ContinueInTier2(Continuation),
    ContinueInTier1(Continuation),
}

/// How a tier loop left an activation.
#[derive(Debug)]
pub enum Exit {
    Return(object::Value),
    Transfer(Transfer),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_levels_parse() {
        assert_eq!(TierMode::parse("1"), Ok(TierMode::Threaded));
        assert_eq!(TierMode::parse(" 3 "), Ok(TierMode::Hybrid));
        assert_eq!(
            TierMode::parse("7"),
            Err(ConfigError::InvalidTier("7".to_string()))
        );
        assert!(TierMode::parse("fast").is_err());
    }

    #[test]
    fn unknown_tier_falls_back_to_threaded() {
        let config = TierConfig::from_vars(Some("9"), None);
        assert_eq!(config.mode, TierMode::Threaded);
        assert_eq!(config.hybrid_threshold(), DEFAULT_HYBRID_THRESHOLD);
    }

    #[test]
    fn threshold_is_read_and_validated() {
        let config = TierConfig::from_vars(Some("3"), Some("40"));
        assert_eq!(config.mode, TierMode::Hybrid);
        assert_eq!(config.hybrid_threshold(), 40);

        let config = TierConfig::from_vars(Some("2"), Some("-1"));
        assert_eq!(config.mode, TierMode::Tracing);
        assert_eq!(config.hybrid_threshold(), DEFAULT_HYBRID_THRESHOLD);
    }
}
