//! The pipeline data model: chunk → checksum → compress → encrypt (reverse
//! on receive), plus FEC grouping over descriptors.

use crate::aead::Aead;
use crate::digest::Digest128;
use crate::error::CoreError;
use crate::fec::Codec;

/// The pipeline's unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub chunk_id: u64,
    pub offset: u64,
    pub data: Vec<u8>,
    pub sum: Digest128,
}

/// A single pipeline stage: descriptor in, descriptor-or-error out.
pub type Transform = Box<dyn Fn(Descriptor) -> Result<Descriptor, CoreError> + Send + Sync>;

/// Compose stages into a single transform. Fails with `NilStage` if any
/// provided stage is absent — represented here as an `Option<Transform>`
/// so the "null stage" case from the original capability-object design is
/// expressible in Rust without a sentinel.
pub fn compose(stages: Vec<Option<Transform>>) -> Transform {
    Box::new(move |d: Descriptor| {
        let mut cur = d;
        for stage in &stages {
            let stage = stage.as_ref().ok_or(CoreError::NilStage)?;
            cur = stage(cur)?;
        }
        Ok(cur)
    })
}

/// Partition `data` into a sequence of descriptors with strictly
/// increasing offsets (a trailing short chunk is allowed). Non-positive
/// `chunk_size` is coerced to 1. Each descriptor owns a fresh copy of its
/// bytes.
pub fn chunk(data: &[u8], chunk_size: i64) -> Vec<Descriptor> {
    let chunk_size = if chunk_size <= 0 { 1usize } else { chunk_size as usize };
    let mut out = Vec::new();
    let mut offset = 0u64;
    let mut i = 0usize;
    while i < data.len() {
        let j = (i + chunk_size).min(data.len());
        out.push(Descriptor {
            chunk_id: 0,
            offset,
            data: data[i..j].to_vec(),
            sum: Digest128::ZERO,
        });
        offset += (j - i) as u64;
        i = j;
    }
    out
}

/// Stamp `descriptor.sum = digest128(descriptor.data)`.
pub fn compute_checksum() -> Transform {
    Box::new(|mut d: Descriptor| {
        d.sum = Digest128::compute(&d.data);
        Ok(d)
    })
}

/// `digest128(data) != descriptor.sum` fails with `ChecksumMismatch`.
pub fn verify_checksum() -> Transform {
    Box::new(|d: Descriptor| {
        if Digest128::compute(&d.data) != d.sum {
            return Err(CoreError::ChecksumMismatch);
        }
        Ok(d)
    })
}

/// Seal `data` under `aead`/`aad` and rewrite it as `nonce(12) || ciphertext`.
pub fn encrypt(aead: std::sync::Arc<std::sync::Mutex<Aead>>, aad: Vec<u8>) -> Transform {
    Box::new(move |mut d: Descriptor| {
        let mut a = aead.lock().expect("aead mutex poisoned");
        let (nonce, ct) = a.seal(&d.data, &aad);
        let mut out = Vec::with_capacity(nonce.len() + ct.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct);
        d.data = out;
        Ok(d)
    })
}

/// Require `data.len() >= 12`, extract the nonce, open, replace `data`
/// with the plaintext.
pub fn decrypt(aead: std::sync::Arc<Aead>, aad: Vec<u8>) -> Transform {
    Box::new(move |mut d: Descriptor| {
        if d.data.len() < 12 {
            return Err(CoreError::ShortBuffer {
                need: 12,
                got: d.data.len(),
            });
        }
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&d.data[..12]);
        let pt = aead.open(&d.data[12..], &aad, &nonce)?;
        d.data = pt;
        Ok(d)
    })
}

/// Stream compression (LZ4-equivalent) round-tripping `data` only.
pub fn compress() -> Transform {
    Box::new(|mut d: Descriptor| {
        d.data = lz4_flex::compress_prepend_size(&d.data);
        Ok(d)
    })
}

pub fn decompress() -> Transform {
    Box::new(|mut d: Descriptor| {
        d.data = lz4_flex::decompress_size_prepended(&d.data)
            .map_err(|e| CoreError::Compression(e.to_string()))?;
        Ok(d)
    })
}

/// Apply `stages` in order to every descriptor; the first stage error
/// aborts the whole batch.
pub fn apply_transforms(
    descriptors: Vec<Descriptor>,
    stages: &[Transform],
) -> Result<Vec<Descriptor>, CoreError> {
    let mut out = Vec::with_capacity(descriptors.len());
    for d in descriptors {
        let mut cur = d;
        for stage in stages {
            cur = stage(cur)?;
        }
        out.push(cur);
    }
    Ok(out)
}

/// Pad all `k` descriptors' `data` to the maximum length with zeros,
/// encode, and return the original `k` descriptors followed by `n - k`
/// parity descriptors. Parity descriptors inherit `offset` from
/// `descriptors[0]` and carry no plaintext fingerprint.
pub fn fec_group_encode(
    descriptors: Vec<Descriptor>,
    data_shards: usize,
    parity_shards: usize,
) -> Result<Vec<Descriptor>, CoreError> {
    if descriptors.len() != data_shards {
        return Err(CoreError::SizeMismatch("fec group descriptor count"));
    }
    let base_offset = descriptors.first().map(|d| d.offset).unwrap_or(0);
    let max_len = descriptors.iter().map(|d| d.data.len()).max().unwrap_or(0);
    let padded: Vec<Vec<u8>> = descriptors
        .iter()
        .map(|d| {
            let mut b = d.data.clone();
            b.resize(max_len, 0);
            b
        })
        .collect();

    let codec = Codec::new(data_shards, parity_shards)?;
    let parity = codec.build_shards(&padded)?;

    let mut out = descriptors;
    for p in parity {
        out.push(Descriptor {
            chunk_id: 0,
            offset: base_offset,
            data: p,
            sum: Digest128::ZERO,
        });
    }
    Ok(out)
}

/// Null the listed positions, reconstruct, verify, and return a
/// descriptor slice with repaired bytes in place.
pub fn fec_group_reconstruct(
    mut shards: Vec<Descriptor>,
    data_shards: usize,
    parity_shards: usize,
    lost_indices: &[usize],
) -> Result<Vec<Descriptor>, CoreError> {
    if shards.len() != data_shards + parity_shards {
        return Err(CoreError::SizeMismatch("fec group shard count"));
    }
    for &idx in lost_indices {
        if idx >= shards.len() {
            return Err(CoreError::SizeMismatch("fec lost index out of range"));
        }
    }

    let mut buffers: Vec<Option<Vec<u8>>> = shards.iter().map(|d| Some(d.data.clone())).collect();
    for &idx in lost_indices {
        buffers[idx] = None;
    }

    let codec = Codec::new(data_shards, parity_shards)?;
    codec.reconstruct(&mut buffers)?;

    for (i, buf) in buffers.into_iter().enumerate() {
        shards[i].data = buf.expect("reconstruct fills every slot on success");
    }
    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn chunk_partitions_with_trailing_short_chunk() {
        let data = vec![0u8; 10];
        let chunks = chunk(&data, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[1].offset, 4);
        assert_eq!(chunks[2].offset, 8);
        assert_eq!(chunks[2].data.len(), 2);
    }

    #[test]
    fn chunk_coerces_nonpositive_size_to_one() {
        let data = vec![1u8, 2, 3];
        let chunks = chunk(&data, 0);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn checksum_round_trip() {
        let d = Descriptor {
            chunk_id: 1,
            offset: 0,
            data: b"abc".to_vec(),
            sum: Digest128::ZERO,
        };
        let with_sum = compute_checksum()(d).unwrap();
        assert!(verify_checksum()(with_sum.clone()).is_ok());
        let mut tampered = with_sum;
        tampered.data[0] ^= 1;
        assert!(matches!(
            verify_checksum()(tampered),
            Err(CoreError::ChecksumMismatch)
        ));
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let aead = Arc::new(Mutex::new(Aead::new(&[1u8; 32])));
        let open_aead = {
            // separate handle with the same key for the decrypt side's
            // stateless `open`
            Arc::new(Aead::new(&[1u8; 32]))
        };
        let d = Descriptor {
            chunk_id: 0,
            offset: 0,
            data: b"payload".to_vec(),
            sum: Digest128::ZERO,
        };
        let enc = encrypt(aead.clone(), b"aad".to_vec())(d).unwrap();
        // the open-side AEAD only needs the same key; nonce travels with data
        let dec = decrypt(open_aead, b"aad".to_vec())(enc);
        assert!(dec.is_ok());
        assert_eq!(dec.unwrap().data, b"payload");
    }

    #[test]
    fn compress_decompress_round_trip() {
        let d = Descriptor {
            chunk_id: 0,
            offset: 0,
            data: b"aaaaaaaaaaaaaaaaaaaaaaaabbbbbbbbbbbbbbbbbbbbbbbb".to_vec(),
            sum: Digest128::ZERO,
        };
        let compressed = compress()(d.clone()).unwrap();
        let restored = decompress()(compressed).unwrap();
        assert_eq!(restored.data, d.data);
    }

    #[test]
    fn fec_group_round_trip_with_one_erasure() {
        let data = vec![b"aaaa".to_vec(), b"bbbb".to_vec(), b"cccc".to_vec(), b"dddd".to_vec()];
        let descriptors: Vec<Descriptor> = data
            .iter()
            .enumerate()
            .map(|(i, d)| Descriptor {
                chunk_id: i as u64,
                offset: (i * 4) as u64,
                data: d.clone(),
                sum: Digest128::compute(d),
            })
            .collect();
        let grouped = fec_group_encode(descriptors.clone(), 4, 2).unwrap();
        assert_eq!(grouped.len(), 6);

        let reconstructed = fec_group_reconstruct(grouped, 4, 2, &[2]).unwrap();
        for (i, orig) in descriptors.iter().enumerate() {
            assert_eq!(reconstructed[i].data, orig.data);
        }
    }

    #[test]
    fn compose_rejects_nil_stage() {
        let t = compose(vec![Some(compute_checksum()), None]);
        let d = Descriptor {
            chunk_id: 0,
            offset: 0,
            data: vec![1, 2, 3],
            sum: Digest128::ZERO,
        };
        assert!(matches!(t(d), Err(CoreError::NilStage)));
    }

    #[test]
    fn apply_transforms_aborts_on_first_error() {
        let d = Descriptor {
            chunk_id: 0,
            offset: 0,
            data: vec![1, 2, 3],
            sum: Digest128::from_bytes([0xffu8; 16]),
        };
        let stages: Vec<Transform> = vec![verify_checksum()];
        assert!(apply_transforms(vec![d], &stages).is_err());
    }
}
