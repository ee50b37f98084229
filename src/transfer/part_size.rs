//! Part size selection.

use crate::error::{ConfigurationError, S3Error};
use serde::{Deserialize, Serialize};

/// Maximum number of parts in one multipart upload.
pub const MAX_PART_COUNT: u32 = 10_000;

/// Smallest part size accepted for any part but the last (5 MiB).
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Largest part size accepted (5 GiB).
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Protocol limits that decide how an object is split.
///
/// Part size is a pure function of the object's total size, so resuming an
/// upload requires the same total size that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSizePolicy {
    /// Maximum number of parts.
    pub max_part_count: u32,
    /// Minimum part size, and the single-put threshold.
    pub min_part_size: u64,
    /// Maximum part size.
    pub max_part_size: u64,
}

impl Default for PartSizePolicy {
    fn default() -> Self {
        Self {
            max_part_count: MAX_PART_COUNT,
            min_part_size: MIN_PART_SIZE,
            max_part_size: MAX_PART_SIZE,
        }
    }
}

impl PartSizePolicy {
    /// Part size for an object of `total_size` bytes.
    ///
    /// Always within `[min_part_size, max_part_size]`. The divisor keeps one
    /// part in reserve so the remainder never pushes the count over the limit.
    pub fn compute_part_size(&self, total_size: u64) -> u64 {
        let divisor = u64::from(self.max_part_count.saturating_sub(1).max(1));
        let candidate = total_size / divisor;
        if candidate > self.min_part_size {
            candidate.min(self.max_part_size)
        } else {
            self.min_part_size
        }
    }

    /// Number of parts an object of `total_size` bytes splits into.
    pub fn part_count(&self, total_size: u64) -> u32 {
        if total_size == 0 {
            return 1;
        }
        let part_size = self.compute_part_size(total_size);
        let count = total_size.div_ceil(part_size);
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Largest object this policy can upload.
    pub fn max_object_size(&self) -> u64 {
        u64::from(self.max_part_count).saturating_mul(self.max_part_size)
    }

    /// True if an object of `total_size` bytes goes up as one request.
    pub fn is_single_put(&self, total_size: u64) -> bool {
        total_size < self.min_part_size
    }

    /// Check the policy is internally consistent.
    pub fn validate(&self) -> Result<(), S3Error> {
        let invalid = |message: &str| {
            Err(S3Error::Configuration(ConfigurationError::InvalidConfiguration {
                field: "part_size_policy".to_string(),
                message: message.to_string(),
            }))
        };

        if self.max_part_count < 2 {
            return invalid("max_part_count must be at least 2");
        }
        if self.min_part_size == 0 {
            return invalid("min_part_size must be positive");
        }
        if self.min_part_size > self.max_part_size {
            return invalid("min_part_size exceeds max_part_size");
        }
        Ok(())
    }
}

/// Part size under the default S3 limits.
pub fn compute_part_size(total_size: u64) -> u64 {
    PartSizePolicy::default().compute_part_size(total_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_small_objects_use_min_part_size() {
        assert_eq!(compute_part_size(0), MIN_PART_SIZE);
        assert_eq!(compute_part_size(12 * MIB), 5 * MIB);
    }

    #[test]
    fn test_large_objects_grow_part_size() {
        let total = 100 * 1024 * MIB;
        let part_size = compute_part_size(total);
        assert_eq!(part_size, total / 9_999);
        assert!(total / part_size < u64::from(MAX_PART_COUNT));
    }

    #[test]
    fn test_part_size_capped_at_max() {
        assert_eq!(compute_part_size(u64::MAX), MAX_PART_SIZE);
    }

    #[test]
    fn test_part_count() {
        let policy = PartSizePolicy::default();
        assert_eq!(policy.part_count(0), 1);
        assert_eq!(policy.part_count(12 * MIB), 3);
        assert_eq!(policy.part_count(10 * MIB), 2);
    }

    #[test]
    fn test_validate() {
        assert!(PartSizePolicy::default().validate().is_ok());
        let bad = PartSizePolicy {
            min_part_size: 10,
            max_part_size: 5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_single_put_threshold() {
        let policy = PartSizePolicy::default();
        assert!(policy.is_single_put(0));
        assert!(policy.is_single_put(MIN_PART_SIZE - 1));
        assert!(!policy.is_single_put(MIN_PART_SIZE));
    }
}
