use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::GameError;

/// Board sizes the presentation layer is expected to offer.
pub const RECOMMENDED_SIZE: RangeInclusive<usize> = 4..=10;

/// Options recognized when a game is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub rows: usize,
    pub columns: usize,
    pub vs_ai: bool,
    /// Seeds the AI's random fallback; entropy is used when absent.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rows: 6,
            columns: 7,
            vs_ai: true,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.rows == 0 || self.columns == 0 {
            return Err(GameError::InvalidDimensions {
                rows: self.rows,
                columns: self.columns,
            });
        }
        if !RECOMMENDED_SIZE.contains(&self.rows) || !RECOMMENDED_SIZE.contains(&self.columns) {
            warn!(
                rows = self.rows,
                columns = self.columns,
                "board size outside the recommended 4-10 range"
            );
        }
        Ok(())
    }
}
