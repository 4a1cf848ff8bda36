//! Engine configuration structures.
//!
//! These structures define the configurable aspects of an engine instance.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Top-level engine configuration.
///
/// # Example
///
/// ```rust
/// use strata_common::config::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.block.block_size, 256 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Block layout configuration.
    pub block: BlockConfig,
    /// Buffer manager configuration.
    pub buffer: BufferConfig,
}

impl EngineConfig {
    /// Creates a configuration suited to tests: small blocks so that block
    /// boundary handling is exercised with small data sets, and a bounded
    /// buffer pool.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            block: BlockConfig {
                block_size: MIN_BLOCK_SIZE,
            },
            buffer: BufferConfig {
                memory_limit: Some(64 * 1024 * 1024),
            },
        }
    }

    /// Validates the configuration and returns an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.block.validate()?;
        self.buffer.validate()?;
        if let Some(limit) = self.buffer.memory_limit {
            if limit < self.block.block_size {
                return Err("buffer.memory_limit must hold at least one block".to_string());
            }
        }
        Ok(())
    }
}

/// Block layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Size of each storage block in bytes. Must be a power of 2.
    pub block_size: usize,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl BlockConfig {
    /// Builder-style setter for the block size.
    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Validates the block configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(format!(
                "block_size must be at least {MIN_BLOCK_SIZE} bytes"
            ));
        }
        if !self.block_size.is_power_of_two() {
            return Err("block_size must be a power of 2".to_string());
        }
        Ok(())
    }
}

/// Buffer manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BufferConfig {
    /// Upper bound on buffer-managed memory in bytes; `None` = unbounded.
    pub memory_limit: Option<usize>,
}

impl BufferConfig {
    /// Builder-style setter for the memory limit.
    #[must_use]
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    /// Validates the buffer configuration.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.memory_limit {
            return Err("memory_limit must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_invalid_block_size() {
        let config = EngineConfig {
            block: BlockConfig { block_size: 1000 },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            block: BlockConfig { block_size: 100 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_memory_limit_bounds() {
        let config = EngineConfig {
            buffer: BufferConfig {
                memory_limit: Some(1024),
            },
            ..Default::default()
        };
        // Limit smaller than one block.
        assert!(config.validate().is_err());
    }
}
