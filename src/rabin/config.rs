use crate::error::{DedupError, Result};

/// Lower limit for the `window_size` parameter.
pub const WINDOW_SIZE_MIN: usize = 1;
/// Upper limit for the `window_size` parameter.
pub const WINDOW_SIZE_MAX: usize = 64;

/// Default sliding window size in bytes.
pub const DEFAULT_WINDOW_SIZE: usize = 32;
/// Default rolling-hash multiplier.
pub const DEFAULT_PRIME: u64 = 257;

/// Default minimum chunk length in bytes.
pub const DEFAULT_MIN_BLOCK_SIZE: u64 = 2_048;
/// Default modulus of the boundary test, the expected chunk length in bytes.
pub const DEFAULT_AVG_BLOCK_SIZE: u64 = 8_192;
/// Default maximum chunk length in bytes.
pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 65_536;

/// Parameters of the Rabin chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RabinConfig {
    /// Number of trailing bytes that influence a boundary decision.
    pub window_size: usize,
    /// No content-defined boundary is taken before a chunk reaches this length.
    pub min_block_size: u64,
    /// A chunk is always closed once it reaches this length.
    pub max_block_size: u64,
    /// Modulus of the boundary test; controls the expected chunk length.
    pub average_block_size: u64,
    /// Multiplier of the rolling polynomial.
    pub prime: u64,
    /// Value `checksum % average_block_size` must hit for a content-defined cut.
    /// `None` derives it as `prime % average_block_size`.
    pub target_remainder: Option<u64>,
}

impl Default for RabinConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            min_block_size: DEFAULT_MIN_BLOCK_SIZE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            average_block_size: DEFAULT_AVG_BLOCK_SIZE,
            prime: DEFAULT_PRIME,
            target_remainder: None,
        }
    }
}

impl RabinConfig {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_block_sizes(mut self, min: u64, avg: u64, max: u64) -> Self {
        self.min_block_size = min;
        self.average_block_size = avg;
        self.max_block_size = max;
        self
    }

    pub fn with_prime(mut self, prime: u64) -> Self {
        self.prime = prime;
        self
    }

    pub fn with_target_remainder(mut self, remainder: u64) -> Self {
        self.target_remainder = Some(remainder);
        self
    }

    /// The remainder the boundary test compares against.
    #[inline]
    pub fn remainder(&self) -> u64 {
        self.target_remainder
            .unwrap_or(self.prime % self.average_block_size)
    }

    /// `prime` raised to `window_size`, the weight of the byte leaving the window.
    pub fn window_power(&self) -> u64 {
        (0..self.window_size).fold(1u64, |acc, _| acc.wrapping_mul(self.prime))
    }

    ///
    /// Checks the configuration.
    ///
    /// ## Errors
    ///
    /// Returns [`DedupError::InvalidConfig`] unless all of the following hold:
    ///
    /// * `window_size`: 1 ~ 64
    /// * `1 <= min_block_size <= max_block_size`
    /// * `average_block_size >= 1`
    /// * `prime >= 2`
    /// * an explicit `target_remainder` is below `average_block_size`
    ///
    pub fn validate(&self) -> Result<()> {
        if !(WINDOW_SIZE_MIN..=WINDOW_SIZE_MAX).contains(&self.window_size) {
            return Err(DedupError::InvalidConfig(format!(
                "window_size must be between {} and {}",
                WINDOW_SIZE_MIN, WINDOW_SIZE_MAX
            )));
        }

        if self.min_block_size == 0 {
            return Err(DedupError::InvalidConfig(
                "min_block_size must be at least 1".into(),
            ));
        }

        if self.min_block_size > self.max_block_size {
            return Err(DedupError::InvalidConfig(
                "must satisfy the condition: min_block_size <= max_block_size".into(),
            ));
        }

        if self.average_block_size == 0 {
            return Err(DedupError::InvalidConfig(
                "average_block_size must be at least 1".into(),
            ));
        }

        if self.prime < 2 {
            return Err(DedupError::InvalidConfig("prime must be at least 2".into()));
        }

        if let Some(remainder) = self.target_remainder {
            if remainder >= self.average_block_size {
                return Err(DedupError::InvalidConfig(format!(
                    "target_remainder {} can never be hit modulo average_block_size {}",
                    remainder, self.average_block_size
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RabinConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.remainder(), DEFAULT_PRIME % DEFAULT_AVG_BLOCK_SIZE);
    }

    #[test]
    fn test_window_power() {
        let config = RabinConfig::default().with_window_size(3).with_prime(10);
        assert_eq!(config.window_power(), 1_000);
    }

    #[test]
    fn test_rejects_bad_bounds() {
        let bad = [
            RabinConfig::default().with_window_size(0),
            RabinConfig::default().with_window_size(WINDOW_SIZE_MAX + 1),
            RabinConfig::default().with_block_sizes(0, 8, 16),
            RabinConfig::default().with_block_sizes(32, 8, 16),
            RabinConfig::default().with_block_sizes(4, 0, 16),
            RabinConfig::default().with_prime(1),
            RabinConfig::default()
                .with_block_sizes(4, 255, 16)
                .with_target_remainder(257),
        ];

        for config in bad {
            assert!(
                matches!(config.validate(), Err(DedupError::InvalidConfig(_))),
                "{:?} should be rejected",
                config
            );
        }
    }
}
