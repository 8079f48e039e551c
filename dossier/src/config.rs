//! Search configuration
//!
//! All tunables of the two-tier pipeline in one immutable struct. Values
//! can come from a TOML file; anything missing falls back to the defaults
//! below. `validate` rejects out-of-range values up front so misuse
//! surfaces before a query runs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_K1: f64 = 1.5;
pub const DEFAULT_B: f64 = 0.75;
pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 2;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_CANDIDATE_POOL_SIZE: usize = 500;
pub const DEFAULT_MIN_CANDIDATES: usize = 5;
pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_PREVIEW_CHARS: usize = 200;
pub const DEFAULT_DENSITY_CAP: usize = 20;
pub const DEFAULT_LOOKUP_MIN_TOKEN_LENGTH: usize = 3;
pub const DEFAULT_MAX_LOOKUP_MATCHES: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown filter strategy '{0}' (expected strict, loose, boost, adaptive or none)")]
    UnknownStrategy(String),
    #[error("unknown entity kind '{0}'")]
    UnknownEntityKind(String),
    #[error("unknown match mode '{0}' (expected fuzzy or any)")]
    UnknownMatchMode(String),
    #[error("{name} must be in {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: f64,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("at least one metadata scorer weight must be positive")]
    NoPositiveWeight,
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// BM25 saturation and length-normalisation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: DEFAULT_K1, b: DEFAULT_B }
    }
}

impl Bm25Params {
    /// `k1` must be finite and non-negative, `b` in [0, 1].
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.k1 >= 0.0 && self.k1.is_finite()) {
            return Err(ConfigError::OutOfRange { name: "bm25.k1", range: "[0, inf)", value: self.k1 });
        }
        check_unit("bm25.b", self.b)
    }
}

/// Component weights of the boost-path metadata relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerWeights {
    pub person: f64,
    pub location: f64,
    pub organization: f64,
    pub density: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            person: 0.30,
            location: 0.20,
            organization: 0.20,
            density: 0.10,
        }
    }
}

impl ScorerWeights {
    /// Every weight finite and non-negative, at least one positive.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("weights.person", self.person),
            ("weights.location", self.location),
            ("weights.organization", self.organization),
            ("weights.density", self.density),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::OutOfRange { name, range: "[0, inf)", value });
            }
        }
        if self.person + self.location + self.organization + self.density <= 0.0 {
            return Err(ConfigError::NoPositiveWeight);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub bm25: Bm25Params,
    /// Tokens shorter than this (in chars) are dropped from the index.
    pub min_token_length: usize,
    /// Minimum similarity ratio for the third stage of the entity match cascade.
    pub similarity_threshold: f64,
    /// Number of lexical candidates handed to the filtering stage.
    pub candidate_pool_size: usize,
    /// Adaptive strategy accepts strict/loose only at or above this count.
    pub min_candidates: usize,
    pub default_top_k: usize,
    pub preview_chars: usize,
    pub weights: ScorerWeights,
    /// Entity count at which the density component saturates.
    pub density_cap: usize,
    /// Query words shorter than this are not looked up as entity names.
    pub lookup_min_token_length: usize,
    /// Cap on lookup-resolved entities per type.
    pub max_lookup_matches: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            min_token_length: DEFAULT_MIN_TOKEN_LENGTH,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            candidate_pool_size: DEFAULT_CANDIDATE_POOL_SIZE,
            min_candidates: DEFAULT_MIN_CANDIDATES,
            default_top_k: DEFAULT_TOP_K,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            weights: ScorerWeights::default(),
            density_cap: DEFAULT_DENSITY_CAP,
            lookup_min_token_length: DEFAULT_LOOKUP_MIN_TOKEN_LENGTH,
            max_lookup_matches: DEFAULT_MAX_LOOKUP_MATCHES,
        }
    }
}

impl SearchConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: SearchConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.bm25.validate()?;
        check_unit("similarity_threshold", self.similarity_threshold)?;
        self.weights.validate()?;

        if self.candidate_pool_size == 0 {
            return Err(ConfigError::Zero("candidate_pool_size"));
        }
        if self.min_token_length == 0 {
            return Err(ConfigError::Zero("min_token_length"));
        }
        if self.density_cap == 0 {
            return Err(ConfigError::Zero("density_cap"));
        }
        Ok(())
    }
}

pub(crate) fn check_unit(name: &'static str, value: f64) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, range: "[0, 1]", value })
    }
}
