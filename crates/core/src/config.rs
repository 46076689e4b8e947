use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Resolved engine configuration.
///
/// Every policy constant the engine relies on lives here; nothing is read from
/// loosely shaped option maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Minimum locator score for a window to be accepted.
    pub match_threshold: f64,
    /// Source tokens a deterministic window may skip.
    pub skip_budget: usize,
    /// Score deducted per skipped source token or inserted quote token.
    pub skip_penalty: f64,
    /// Skip budget applied when re-scoring a span proposed by assisted search.
    pub fallback_skip_budget: usize,
    /// Minimum normalized Levenshtein similarity for a quote token to count as
    /// present in its source range.
    pub token_similarity: f64,
    /// Fraction of quote tokens allowed to be absent from the source range.
    pub hallucination_tolerance: f64,
    /// Disfluencies dropped before matching.
    pub filler_words: Vec<String>,
    pub blocks: BlockConfig,
    pub fallback: FallbackConfig,
    pub max_concurrent_scripts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub max_words: usize,
    pub soft_min_words: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub call_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl AlignmentConfig {
    pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;
    pub const DEFAULT_SKIP_BUDGET: usize = 3;
    pub const DEFAULT_SKIP_PENALTY: f64 = 0.02;
    pub const DEFAULT_FALLBACK_SKIP_BUDGET: usize = 12;
    pub const DEFAULT_TOKEN_SIMILARITY: f64 = 0.8;
    pub const DEFAULT_MAX_CONCURRENT_SCRIPTS: usize = 5;

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the user config from [`default_config_path`] when it exists.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.match_threshold > 0.0 && self.match_threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "match_threshold",
                format!("must be in (0, 1], got {}", self.match_threshold),
            ));
        }
        if !(0.0..1.0).contains(&self.skip_penalty) {
            return Err(ConfigError::invalid(
                "skip_penalty",
                format!("must be in [0, 1), got {}", self.skip_penalty),
            ));
        }
        if self.fallback_skip_budget < self.skip_budget {
            return Err(ConfigError::invalid(
                "fallback_skip_budget",
                format!(
                    "must be at least skip_budget ({}), got {}",
                    self.skip_budget, self.fallback_skip_budget
                ),
            ));
        }
        if !(self.token_similarity > 0.0 && self.token_similarity <= 1.0) {
            return Err(ConfigError::invalid(
                "token_similarity",
                format!("must be in (0, 1], got {}", self.token_similarity),
            ));
        }
        if !(0.0..1.0).contains(&self.hallucination_tolerance) {
            return Err(ConfigError::invalid(
                "hallucination_tolerance",
                format!("must be in [0, 1), got {}", self.hallucination_tolerance),
            ));
        }
        if self.blocks.max_words == 0 {
            return Err(ConfigError::invalid(
                "blocks.max_words",
                "must be a positive integer",
            ));
        }
        if self.blocks.soft_min_words > self.blocks.max_words {
            return Err(ConfigError::invalid(
                "blocks.soft_min_words",
                format!(
                    "must not exceed blocks.max_words ({}), got {}",
                    self.blocks.max_words, self.blocks.soft_min_words
                ),
            ));
        }
        if self.fallback.call_timeout_secs == 0 || self.fallback.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("fallback", "timeouts must be non-zero"));
        }
        if self.max_concurrent_scripts == 0 {
            return Err(ConfigError::invalid(
                "max_concurrent_scripts",
                "must be a positive integer",
            ));
        }
        Ok(())
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            match_threshold: Self::DEFAULT_MATCH_THRESHOLD,
            skip_budget: Self::DEFAULT_SKIP_BUDGET,
            skip_penalty: Self::DEFAULT_SKIP_PENALTY,
            fallback_skip_budget: Self::DEFAULT_FALLBACK_SKIP_BUDGET,
            token_similarity: Self::DEFAULT_TOKEN_SIMILARITY,
            hallucination_tolerance: 0.0,
            filler_words: ["uh", "um", "uhm", "er", "ah", "hmm", "mm", "erm"]
                .into_iter()
                .map(String::from)
                .collect(),
            blocks: BlockConfig::default(),
            fallback: FallbackConfig::default(),
            max_concurrent_scripts: Self::DEFAULT_MAX_CONCURRENT_SCRIPTS,
        }
    }
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            max_words: 300,
            soft_min_words: 240,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            call_timeout_secs: 30,
            request_timeout_secs: 120,
        }
    }
}

impl FallbackConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `<config dir>/verbatim/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("verbatim").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AlignmentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.blocks.max_words, 300);
        assert_eq!(config.blocks.soft_min_words, 240);
        assert_eq!(config.max_concurrent_scripts, 5);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AlignmentConfig =
            serde_json::from_str(r#"{"skip_budget": 5, "blocks": {"max_words": 50}}"#)
                .expect("valid config json");
        assert_eq!(config.skip_budget, 5);
        assert_eq!(config.blocks.max_words, 50);
        assert_eq!(config.blocks.soft_min_words, 240);
        assert_eq!(config.match_threshold, AlignmentConfig::DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn rejects_zero_threshold() {
        let config = AlignmentConfig {
            match_threshold: 0.0,
            ..AlignmentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "match_threshold",
                ..
            })
        ));
    }

    #[test]
    fn rejects_soft_bound_above_max() {
        let config = AlignmentConfig {
            blocks: BlockConfig {
                max_words: 10,
                soft_min_words: 11,
            },
            ..AlignmentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_fallback_budget_below_deterministic() {
        let config = AlignmentConfig {
            skip_budget: 4,
            fallback_skip_budget: 2,
            ..AlignmentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"match_threshold": 0.9, "fallback": {{"enabled": false}}}}"#)
            .expect("write config");
        let config = AlignmentConfig::load(file.path()).expect("load config");
        assert_eq!(config.match_threshold, 0.9);
        assert!(!config.fallback.enabled);
        assert_eq!(config.fallback.call_timeout_secs, 30);
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not json").expect("write config");
        assert!(matches!(
            AlignmentConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
