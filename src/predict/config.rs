//! Predictor configuration

use crate::error::{LimeError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for batched classifier queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Maximum number of images per classifier call
    pub batch_size: usize,

    /// Maximum memory usage in bytes for one chunk of images
    pub max_memory_bytes: Option<usize>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_memory_bytes: None,
        }
    }
}

impl PredictorConfig {
    /// Create a new predictor configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Builder method to set maximum memory budget in bytes
    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LimeError::invalid_parameter(
                "batch_size",
                self.batch_size,
                "must be >= 1",
            ));
        }
        if self.max_memory_bytes == Some(0) {
            return Err(LimeError::invalid_parameter(
                "max_memory_bytes",
                0,
                "must be > 0 when set",
            ));
        }
        Ok(())
    }

    /// Batch size after applying the memory budget to images of `bytes_per_image`
    pub fn effective_batch_size(&self, bytes_per_image: usize) -> usize {
        match self.max_memory_bytes {
            Some(max_bytes) => {
                // at most half the budget for one chunk
                let max_images = (max_bytes / 2) / bytes_per_image.max(1);
                max_images.max(1).min(self.batch_size)
            }
            None => self.batch_size,
        }
        .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PredictorConfig::default();
        assert_eq!(config.batch_size, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_budget_shrinks_batches() {
        let config = PredictorConfig::new().with_batch_size(64).with_max_memory(10_000);
        // 10_000 / 2 / 1_000 = 5 images per chunk
        assert_eq!(config.effective_batch_size(1_000), 5);
        // budget smaller than one image still makes progress
        assert_eq!(config.effective_batch_size(1_000_000), 1);
        assert_eq!(PredictorConfig::new().effective_batch_size(1_000_000), 32);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = PredictorConfig::new().with_batch_size(0).validate().unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
