//! Authenticated encryption context with deterministic per-session nonces.
//!
//! Nonce layout: `(4-byte random per-instance prefix) || (8-byte
//! big-endian counter)`. The counter starts at zero and is incremented
//! immediately before each seal, so the first transmitted nonce carries
//! counter value 1. `Open` is stateless with respect to the counter.

use chacha20poly1305::{
    aead::{Aead as _, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;

use crate::error::CoreError;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// An AEAD instance bound to one 256-bit key and one session's nonce space.
pub struct Aead {
    cipher: ChaCha20Poly1305,
    prefix: [u8; 4],
    counter: u64,
}

impl Aead {
    /// Construct a new AEAD instance with a random 4-byte nonce prefix.
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        let mut prefix = [0u8; 4];
        rand::rng().fill_bytes(&mut prefix);
        Aead {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
            prefix,
            counter: 0,
        }
    }

    fn next_nonce(&mut self) -> [u8; NONCE_LEN] {
        self.counter += 1;
        let mut n = [0u8; NONCE_LEN];
        n[0..4].copy_from_slice(&self.prefix);
        n[4..12].copy_from_slice(&self.counter.to_be_bytes());
        n
    }

    /// Seal `plaintext` under `aad`, returning `(ciphertext, nonce)`. The
    /// nonce is new on every call and must be transmitted alongside the
    /// ciphertext so the peer can `open` it.
    pub fn seal(&mut self, plaintext: &[u8], aad: &[u8]) -> ([u8; NONCE_LEN], Vec<u8>) {
        let nonce = self.next_nonce();
        let ct = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .expect("chacha20poly1305 seal cannot fail for a valid key/nonce");
        (nonce, ct)
    }

    /// Open a ciphertext sealed under `aad` and `nonce`.
    pub fn open(
        &self,
        ciphertext: &[u8],
        aad: &[u8],
        nonce: &[u8; NONCE_LEN],
    ) -> Result<Vec<u8>, CoreError> {
        if ciphertext.len() < TAG_LEN {
            return Err(CoreError::ShortBuffer {
                need: TAG_LEN,
                got: ciphertext.len(),
            });
        }
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| {
                tracing::debug!("aead authentication failure");
                CoreError::AuthenticationFailure
            })
    }

    /// The authentication tag overhead added to every sealed ciphertext.
    pub fn overhead() -> usize {
        TAG_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(byte: u8) -> [u8; KEY_LEN] {
        [byte; KEY_LEN]
    }

    #[test]
    fn round_trip() {
        let mut a = Aead::new(&key(7));
        let (nonce, ct) = a.seal(b"hello world", b"aad-context");
        let pt = a.open(&ct, b"aad-context", &nonce).unwrap();
        assert_eq!(pt, b"hello world");
    }

    #[test]
    fn tampered_aad_fails() {
        let mut a = Aead::new(&key(7));
        let (nonce, ct) = a.seal(b"hello world", b"aad-context");
        assert!(matches!(
            a.open(&ct, b"wrong-aad", &nonce),
            Err(CoreError::AuthenticationFailure)
        ));
    }

    #[test]
    fn nonces_are_monotonic_and_distinct() {
        let mut a = Aead::new(&key(1));
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            let (nonce, _) = a.seal(b"x", b"");
            assert!(seen.insert(nonce));
        }
    }

    #[test]
    fn first_nonce_counter_is_one() {
        let mut a = Aead::new(&key(9));
        let (nonce, _) = a.seal(b"x", b"");
        let counter = u64::from_be_bytes(nonce[4..12].try_into().unwrap());
        assert_eq!(counter, 1);
    }

    #[test]
    fn short_ciphertext_is_too_short() {
        let a = Aead::new(&key(2));
        let nonce = [0u8; NONCE_LEN];
        assert!(matches!(
            a.open(&[0u8; 4], b"", &nonce),
            Err(CoreError::ShortBuffer { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            pt in proptest::collection::vec(any::<u8>(), 0..256),
            aad in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let mut a = Aead::new(&key(42));
            let (nonce, ct) = a.seal(&pt, &aad);
            let out = a.open(&ct, &aad, &nonce).unwrap();
            prop_assert_eq!(out, pt);
        }
    }
}
