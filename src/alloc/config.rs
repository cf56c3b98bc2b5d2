//! Allocator configuration.

use std::fmt;

use crate::varpage::EMPTY_PAGE_FREE_SPACE;

/// Free-space range of one bucket, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListSize {
    /// Smallest free space (in words) a page in this bucket has.
    pub min: u32,
    /// Largest free space (in words) a page in this bucket has.
    pub max: u32,
}

impl ListSize {
    /// Creates a range.
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Returns true if `free_space` falls inside the range.
    pub fn contains(&self, free_space: u32) -> bool {
        self.min <= free_space && free_space <= self.max
    }
}

/// Configuration for the variable-part allocator.
///
/// Immutable once the allocator is constructed.
#[derive(Debug, Clone)]
pub struct VarAllocConfig {
    /// Bucket ranges, in bucket index order.
    ///
    /// Lookups scan this table in order and pick the first bucket whose
    /// `max` covers the free space, so the order matters. The last bucket
    /// is where freshly formatted pages are linked.
    pub free_lists: Vec<ListSize>,
    /// Number of pages requested from the pool per chunk.
    pub chunk_pages: u32,
    /// Pages inspected in the boundary bucket before giving up.
    pub probe_limit: usize,
}

impl Default for VarAllocConfig {
    fn default() -> Self {
        Self {
            free_lists: vec![
                ListSize::new(200, 499),
                ListSize::new(500, 999),
                ListSize::new(1000, 4079),
                ListSize::new(4080, 8159),
                ListSize::new(0, 199),
            ],
            chunk_pages: 10,
            probe_limit: 16,
        }
    }
}

impl VarAllocConfig {
    /// Creates a configuration with the given bucket ranges and default
    /// tuning constants.
    pub fn with_free_lists(ranges: &[(u32, u32)]) -> Self {
        Self {
            free_lists: ranges
                .iter()
                .map(|&(min, max)| ListSize::new(min, max))
                .collect(),
            ..Self::default()
        }
    }

    /// Returns the number of buckets.
    pub fn list_count(&self) -> usize {
        self.free_lists.len()
    }

    /// Checks that the buckets partition `0..=EMPTY_PAGE_FREE_SPACE` and
    /// the tuning constants are usable.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.free_lists.is_empty() {
            return Err(ConfigError::NoFreeLists);
        }
        if self.chunk_pages == 0 {
            return Err(ConfigError::ZeroChunk);
        }

        for (index, range) in self.free_lists.iter().enumerate() {
            if range.min > range.max {
                return Err(ConfigError::InvertedRange { index });
            }
        }

        let mut sorted: Vec<(usize, ListSize)> =
            self.free_lists.iter().copied().enumerate().collect();
        sorted.sort_by_key(|(_, range)| range.min);

        let mut expected = 0u32;
        for (index, range) in sorted {
            if range.min > expected {
                return Err(ConfigError::Gap {
                    from: expected,
                    to: range.min - 1,
                });
            }
            if range.min < expected {
                return Err(ConfigError::Overlap { index });
            }
            expected = range.max.saturating_add(1);
        }

        if expected <= EMPTY_PAGE_FREE_SPACE {
            return Err(ConfigError::NotCovered {
                free_space: EMPTY_PAGE_FREE_SPACE,
            });
        }

        Ok(())
    }
}

/// Invalid allocator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No bucket configured.
    NoFreeLists,
    /// Chunk size of zero pages.
    ZeroChunk,
    /// Bucket with `min > max`.
    InvertedRange { index: usize },
    /// Free-space values covered by no bucket.
    Gap { from: u32, to: u32 },
    /// Bucket overlapping another.
    Overlap { index: usize },
    /// A legal free-space value above every bucket.
    NotCovered { free_space: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoFreeLists => write!(f, "no free lists configured"),
            ConfigError::ZeroChunk => write!(f, "chunk size must be at least one page"),
            ConfigError::InvertedRange { index } => {
                write!(f, "free list {} has min greater than max", index)
            }
            ConfigError::Gap { from, to } => {
                write!(f, "free space {}..={} is not covered by any free list", from, to)
            }
            ConfigError::Overlap { index } => {
                write!(f, "free list {} overlaps another free list", index)
            }
            ConfigError::NotCovered { free_space } => {
                write!(f, "free space {} is above every free list", free_space)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = VarAllocConfig::default();
        assert_eq!(config.list_count(), 5);
        assert_eq!(config.chunk_pages, 10);
        assert_eq!(config.probe_limit, 16);
        config.validate().unwrap();
    }

    #[test]
    fn test_ascending_table_is_valid() {
        let config = VarAllocConfig::with_free_lists(&[
            (0, 199),
            (200, 499),
            (500, 999),
            (1000, 4079),
            (4080, 8159),
        ]);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_table() {
        let config = VarAllocConfig::with_free_lists(&[]);
        assert_eq!(config.validate(), Err(ConfigError::NoFreeLists));
    }

    #[test]
    fn test_gap() {
        let config = VarAllocConfig::with_free_lists(&[(0, 99), (200, 8159)]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Gap { from: 100, to: 199 })
        );
    }

    #[test]
    fn test_overlap() {
        let config = VarAllocConfig::with_free_lists(&[(0, 300), (200, 8159)]);
        assert_eq!(config.validate(), Err(ConfigError::Overlap { index: 1 }));
    }

    #[test]
    fn test_inverted() {
        let config = VarAllocConfig::with_free_lists(&[(0, 8159), (9000, 8999)]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedRange { index: 1 })
        );
    }

    #[test]
    fn test_not_covered() {
        let config = VarAllocConfig::with_free_lists(&[(0, 4000)]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotCovered { free_space: 8159 })
        );
    }

    #[test]
    fn test_zero_chunk() {
        let config = VarAllocConfig {
            chunk_pages: 0,
            ..VarAllocConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroChunk));
    }

    #[test]
    fn test_list_size_contains() {
        let range = ListSize::new(200, 499);
        assert!(range.contains(200));
        assert!(range.contains(499));
        assert!(!range.contains(199));
        assert!(!range.contains(500));
    }
}
