//! Reed–Solomon `(k, n)` forward error correction over shards of equal
//! length, supporting up to `n - k` simultaneous erasures.

use reed_solomon_simd::{ReedSolomonDecoder, ReedSolomonEncoder};

use crate::error::CoreError;

/// A Reed–Solomon codec for a fixed `(data_shards, parity_shards)` split.
pub struct Codec {
    data_shards: usize,
    parity_shards: usize,
}

impl Codec {
    /// Both counts must be positive.
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, CoreError> {
        if data_shards == 0 || parity_shards == 0 {
            return Err(CoreError::SizeMismatch("fec shard counts must be positive"));
        }
        Ok(Codec {
            data_shards,
            parity_shards,
        })
    }

    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    /// Validate `data_blocks.len() == data_shards` and that every block
    /// shares the same length, then produce `parity_shards` parity blocks
    /// of that length. Returns only the parity blocks; callers append them
    /// after the originals.
    pub fn build_shards(&self, data_blocks: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, CoreError> {
        if data_blocks.len() != self.data_shards {
            return Err(CoreError::SizeMismatch("fec data block count"));
        }
        let shard_len = data_blocks[0].len();
        if data_blocks.iter().any(|b| b.len() != shard_len) {
            return Err(CoreError::SizeMismatch("fec shard lengths must match"));
        }

        let mut encoder = ReedSolomonEncoder::new(self.data_shards, self.parity_shards, shard_len)
            .map_err(|e| CoreError::Fec(e.to_string()))?;
        for block in data_blocks {
            encoder
                .add_original_shard(block)
                .map_err(|e| CoreError::Fec(e.to_string()))?;
        }
        let result = encoder.encode().map_err(|e| CoreError::Fec(e.to_string()))?;
        Ok(result.recovery_iter().map(|s| s.to_vec()).collect())
    }

    /// `shards` must have exactly `data_shards + parity_shards` entries;
    /// `None` marks an erasure. Missing shards are rebuilt in place, then
    /// the whole set is re-verified by re-encoding the recovered data and
    /// comparing against any surviving parity shards.
    pub fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<(), CoreError> {
        let total = self.data_shards + self.parity_shards;
        if shards.len() != total {
            return Err(CoreError::SizeMismatch("fec shard count"));
        }
        let shard_len = shards
            .iter()
            .flatten()
            .map(|s| s.len())
            .next()
            .ok_or(CoreError::SizeMismatch("fec needs at least one surviving shard"))?;

        let mut decoder = ReedSolomonDecoder::new(self.data_shards, self.parity_shards, shard_len)
            .map_err(|e| CoreError::Fec(e.to_string()))?;
        for (i, shard) in shards.iter().enumerate().take(self.data_shards) {
            if let Some(s) = shard {
                decoder
                    .add_original_shard(i, s)
                    .map_err(|e| CoreError::Fec(e.to_string()))?;
            }
        }
        for (i, shard) in shards.iter().enumerate().skip(self.data_shards) {
            if let Some(s) = shard {
                decoder
                    .add_recovery_shard(i - self.data_shards, s)
                    .map_err(|e| CoreError::Fec(e.to_string()))?;
            }
        }
        let result = decoder.decode().map_err(|e| CoreError::Fec(e.to_string()))?;
        for (idx, restored) in result.restored_original_iter() {
            shards[idx] = Some(restored.to_vec());
        }

        // Verify: re-encode the now-complete data shards and compare
        // against any parity shards that survived untouched.
        let data_blocks: Vec<Vec<u8>> = shards[..self.data_shards]
            .iter()
            .map(|s| s.clone().expect("data shards fully reconstructed above"))
            .collect();
        let recomputed = self.build_shards(&data_blocks)?;
        for (i, parity) in recomputed.iter().enumerate() {
            if let Some(original_parity) = &shards[self.data_shards + i] {
                if original_parity != parity {
                    tracing::debug!(index = i, "fec parity verification mismatch");
                    return Err(CoreError::VerificationFailed);
                }
            } else {
                shards[self.data_shards + i] = Some(parity.clone());
            }
        }
        Ok(())
    }
}

/// Choose a parity count from an observed loss rate, clamped to
/// `max_parity`. Returns `0` iff `max_parity == 0`.
pub fn select_parity(loss_rate: f64, max_parity: u32) -> u32 {
    if max_parity == 0 {
        return 0;
    }
    let n = if loss_rate <= 0.005 {
        1
    } else if loss_rate <= 0.02 {
        2
    } else if loss_rate <= 0.05 {
        3
    } else if loss_rate <= 0.10 {
        4
    } else {
        max_parity
    };
    n.min(max_parity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(n: usize, len: usize, seed: u8) -> Vec<Vec<u8>> {
        (0..n)
            .map(|i| vec![seed.wrapping_add(i as u8); len])
            .collect()
    }

    #[test]
    fn build_rejects_wrong_count() {
        let codec = Codec::new(4, 2).unwrap();
        let data = blocks(3, 16, 1);
        assert!(matches!(
            codec.build_shards(&data),
            Err(CoreError::SizeMismatch(_))
        ));
    }

    #[test]
    fn build_rejects_unequal_lengths() {
        let codec = Codec::new(2, 2).unwrap();
        let data = vec![vec![0u8; 16], vec![0u8; 8]];
        assert!(matches!(
            codec.build_shards(&data),
            Err(CoreError::SizeMismatch(_))
        ));
    }

    #[test]
    fn recovers_from_single_erasure() {
        let codec = Codec::new(4, 2).unwrap();
        let data = blocks(4, 64, 3);
        let parity = codec.build_shards(&data).unwrap();

        let mut shards: Vec<Option<Vec<u8>>> = data.iter().cloned().map(Some).collect();
        shards.extend(parity.into_iter().map(Some));
        shards[1] = None;

        codec.reconstruct(&mut shards).unwrap();
        for (i, expect) in data.iter().enumerate() {
            assert_eq!(shards[i].as_ref().unwrap(), expect);
        }
    }

    #[test]
    fn recovers_from_max_erasures() {
        let codec = Codec::new(4, 3).unwrap();
        let data = blocks(4, 32, 5);
        let parity = codec.build_shards(&data).unwrap();

        let mut shards: Vec<Option<Vec<u8>>> = data.iter().cloned().map(Some).collect();
        shards.extend(parity.into_iter().map(Some));
        // erase three shards, the maximum this (4,3) codec tolerates
        shards[0] = None;
        shards[2] = None;
        shards[4] = None;

        codec.reconstruct(&mut shards).unwrap();
        for (i, expect) in data.iter().enumerate() {
            assert_eq!(shards[i].as_ref().unwrap(), expect);
        }
    }

    #[test]
    fn select_parity_table() {
        assert_eq!(select_parity(0.0, 4), 1);
        assert_eq!(select_parity(0.01, 4), 2);
        assert_eq!(select_parity(0.03, 4), 3);
        assert_eq!(select_parity(0.07, 4), 4);
        assert_eq!(select_parity(0.5, 3), 3);
        assert_eq!(select_parity(0.0, 0), 0);
    }
}
