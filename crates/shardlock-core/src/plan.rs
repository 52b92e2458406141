//! Shard layout planner: deterministic byte ranges from file size + shard count
//!
//! The same formula runs at encrypt time and again at decrypt time (from the
//! `fileSize`/`shards` values stored in metadata), so reconstruction can route
//! decrypted bytes to the correct offset without ever storing offsets.

use crate::error::{ShardlockError, ShardlockResult};

/// One contiguous byte range of the original file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardPlan {
    /// Shard index (0-based)
    pub index: u32,
    /// Byte offset of this shard in the original file
    pub offset: u64,
    /// Plaintext length in bytes (0 for degenerate tail shards)
    pub length: u64,
}

/// Per-shard size: `ceil(file_size / shard_count)`.
pub fn shard_size(file_size: u64, shard_count: u32) -> u64 {
    (file_size + shard_count as u64 - 1) / shard_count as u64
}

/// Compute the byte range of every shard.
///
/// Ranges are contiguous, disjoint, and cover `[0, file_size)` exactly.
/// Shards whose offset lands past the end of the file get length 0; they are
/// still planned (and encrypted/decrypted) so that shard files and metadata
/// entries always line up with the requested count.
pub fn plan_shards(file_size: u64, shard_count: u32) -> ShardlockResult<Vec<ShardPlan>> {
    if shard_count == 0 {
        return Err(ShardlockError::InvalidShardCount(shard_count));
    }

    let size = shard_size(file_size, shard_count);
    let mut plans = Vec::with_capacity(shard_count as usize);
    for i in 0..shard_count {
        let offset = i as u64 * size;
        let length = size.min(file_size.saturating_sub(offset));
        plans.push(ShardPlan {
            index: i,
            offset,
            length,
        });
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_shard_count_rejected() {
        assert!(matches!(
            plan_shards(1024, 0),
            Err(ShardlockError::InvalidShardCount(0))
        ));
    }

    #[test]
    fn test_even_split() {
        let plans = plan_shards(10_000, 4).unwrap();
        assert_eq!(plans.len(), 4);
        assert_eq!(plans[0], ShardPlan { index: 0, offset: 0, length: 2500 });
        assert_eq!(plans[1], ShardPlan { index: 1, offset: 2500, length: 2500 });
        assert_eq!(plans[2], ShardPlan { index: 2, offset: 5000, length: 2500 });
        assert_eq!(plans[3], ShardPlan { index: 3, offset: 7500, length: 2500 });
    }

    #[test]
    fn test_uneven_split_short_tail() {
        let plans = plan_shards(10, 3).unwrap();
        // ceil(10/3) = 4 → 4 + 4 + 2
        assert_eq!(plans[0].length, 4);
        assert_eq!(plans[1].length, 4);
        assert_eq!(plans[2].length, 2);
        assert_eq!(plans[2].offset, 8);
    }

    #[test]
    fn test_file_smaller_than_shard_count() {
        let plans = plan_shards(2, 4).unwrap();
        // shard size 1 → two real shards, two degenerate
        assert_eq!(plans[0].length, 1);
        assert_eq!(plans[1].length, 1);
        assert_eq!(plans[2].length, 0);
        assert_eq!(plans[3].length, 0);
    }

    #[test]
    fn test_empty_file() {
        let plans = plan_shards(0, 3).unwrap();
        assert_eq!(plans.len(), 3);
        assert!(plans.iter().all(|p| p.length == 0));
    }

    #[test]
    fn test_single_shard() {
        let plans = plan_shards(12345, 1).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0], ShardPlan { index: 0, offset: 0, length: 12345 });
    }

    proptest! {
        #[test]
        fn prop_shards_cover_file_exactly(
            file_size in 0u64..10_000_000,
            shard_count in 1u32..64,
        ) {
            let plans = plan_shards(file_size, shard_count).unwrap();
            prop_assert_eq!(plans.len(), shard_count as usize);

            // Lengths sum to the file size
            let total: u64 = plans.iter().map(|p| p.length).sum();
            prop_assert_eq!(total, file_size);

            // Contiguous and disjoint: each shard starts where the planned
            // grid says, and real data never overlaps
            let size = shard_size(file_size, shard_count);
            let mut covered = 0u64;
            for p in &plans {
                prop_assert_eq!(p.offset, p.index as u64 * size);
                if p.length > 0 {
                    prop_assert_eq!(p.offset, covered);
                    covered += p.length;
                }
            }
            prop_assert_eq!(covered, file_size);
        }
    }
}
