use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChessError, Result};

const ONE_SHOT_TT_BITS: u32 = 16;

/// Search and selection settings.
///
/// Every field has a default, so a JSON file only needs the keys it changes:
///
/// ```
/// # use magic_chess::config::EngineConfig;
/// let config = EngineConfig::from_json_str(r#"{ "time_ms": 250, "use_book": false }"#).unwrap();
/// assert_eq!(config.time_ms, 250);
/// assert_eq!(config.max_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Deepest iteration of iterative deepening
    pub max_depth: u8,
    /// Time budget per move in milliseconds
    pub time_ms: u64,
    /// log2 of the number of transposition table slots
    pub tt_bits: u32,
    pub use_tt: bool,
    pub use_book: bool,
    pub null_move: bool,
    /// Seed for book move selection; random when absent
    pub book_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            time_ms: 1000,
            tt_bits: 20,
            use_tt: true,
            use_book: true,
            null_move: true,
            book_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ChessError::Config(e.to_string()))?;
        config.validate()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ChessError::Config(format!("failed reading {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Settings for a single move with no engine kept around: a small table
    pub fn one_shot() -> Self {
        Self {
            tt_bits: ONE_SHOT_TT_BITS,
            ..Self::default()
        }
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_ms)
    }

    fn validate(self) -> Result<Self> {
        if self.max_depth == 0 {
            return Err(ChessError::Config("max_depth must be at least 1".into()));
        }
        if !(4..=30).contains(&self.tt_bits) {
            return Err(ChessError::Config(format!(
                "tt_bits must be between 4 and 30, got {}",
                self.tt_bits
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_json_gives_defaults() {
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_json_overrides_fields() {
        let config =
            EngineConfig::from_json_str(r#"{"tt_bits": 16, "null_move": false, "book_seed": 9}"#)
                .unwrap();
        assert_eq!(config.tt_bits, 16);
        assert!(!config.null_move);
        assert_eq!(config.book_seed, Some(9));
        assert_eq!(config.time_budget(), Duration::from_millis(1000));
    }

    #[test]
    fn invalid_config_is_rejected() {
        for json in [
            r#"{"max_depth": 0}"#,
            r#"{"tt_bits": 40}"#,
            r#"{"time_ms": "soon"}"#,
            r#"{"depth": 3}"#,
            "not json",
        ] {
            assert!(
                matches!(EngineConfig::from_json_str(json), Err(ChessError::Config(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn one_shot_uses_a_small_table() {
        let config = EngineConfig::one_shot();
        assert!(config.tt_bits < EngineConfig::default().tt_bits);
        assert_eq!(config.clone().validate().unwrap(), config);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = EngineConfig::from_json_file("/nonexistent/engine.json").unwrap_err();
        assert!(matches!(err, ChessError::Config(_)));
    }

    #[test]
    fn round_trips_through_json() {
        let config = EngineConfig {
            max_depth: 6,
            book_seed: Some(3),
            ..EngineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }
}
