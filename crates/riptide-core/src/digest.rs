//! 128-bit content fingerprint over arbitrary bytes.
//!
//! Truncated BLAKE3 — the first 16 bytes of the 256-bit BLAKE3 hash,
//! compared in constant time so timing behavior does not leak how many
//! leading bytes of two digests agree.

use std::fmt;

/// A 16-byte opaque content fingerprint.
#[derive(Clone, Copy, Eq)]
pub struct Digest128([u8; 16]);

impl Digest128 {
    pub const ZERO: Digest128 = Digest128([0u8; 16]);

    /// Compute the digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let full = blake3::hash(data);
        let mut out = [0u8; 16];
        out.copy_from_slice(&full.as_bytes()[..16]);
        Digest128(out)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn from_bytes(b: [u8; 16]) -> Self {
        Digest128(b)
    }

    /// Big-endian (hi, lo) 64-bit pair view of the digest.
    pub fn to_u64_pair(&self) -> (u64, u64) {
        let hi = u64::from_be_bytes(self.0[0..8].try_into().unwrap());
        let lo = u64::from_be_bytes(self.0[8..16].try_into().unwrap());
        (hi, lo)
    }

    pub fn from_u64_pair(hi: u64, lo: u64) -> Self {
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&hi.to_be_bytes());
        out[8..16].copy_from_slice(&lo.to_be_bytes());
        Digest128(out)
    }
}

impl PartialEq for Digest128 {
    /// Constant-time equality: accumulate the XOR of every byte pair before
    /// testing for zero, so early mismatches don't short-circuit the loop.
    fn eq(&self, other: &Self) -> bool {
        let mut acc = 0u8;
        for i in 0..16 {
            acc |= self.0[i] ^ other.0[i];
        }
        acc == 0
    }
}

impl fmt::Debug for Digest128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest128(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl Default for Digest128 {
    fn default() -> Self {
        Digest128::ZERO
    }
}

/// 256-bit strong cryptographic hash over a block, used by the delta engine.
pub fn strong256(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}
