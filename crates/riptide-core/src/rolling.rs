//! Weak rolling checksum (modified Adler-32) and the strong hash it pairs
//! with for rsync-style block matching.

use crate::error::CoreError;

const MODULUS: u32 = 65521;

/// A modified Adler rolling checksum over a fixed-size sliding window.
///
/// The window bytes are held in an internal circular buffer so `roll` can
/// read the departing byte itself — callers supply only the incoming byte.
pub struct RollingHash {
    a: u32,
    b: u32,
    n: usize,
    win: Vec<u8>,
    cursor: usize,
    initialized: bool,
}

impl RollingHash {
    /// Create an uninitialized rolling hash for a window of `window_len` bytes.
    pub fn new(window_len: usize) -> Self {
        RollingHash {
            a: 0,
            b: 0,
            n: window_len,
            win: vec![0u8; window_len],
            cursor: 0,
            initialized: false,
        }
    }

    /// Seed `a`/`b` from exactly `window_len` bytes.
    pub fn init(&mut self, window: &[u8]) -> Result<(), CoreError> {
        if window.len() != self.n {
            return Err(CoreError::SizeMismatch("rolling hash init window length"));
        }
        let mut a: u32 = 0;
        let mut b: u32 = 0;
        for (i, &byte) in window.iter().enumerate() {
            a = (a + byte as u32) % MODULUS;
            b = (b + (self.n as u32 - i as u32) * byte as u32) % MODULUS;
        }
        self.a = a;
        self.b = b;
        self.win.copy_from_slice(window);
        self.cursor = 0;
        self.initialized = true;
        Ok(())
    }

    /// Slide the window forward by one byte, returning the new sum.
    pub fn roll(&mut self, incoming: u8) -> Result<u32, CoreError> {
        if !self.initialized {
            return Err(CoreError::NotInitialized);
        }
        let outgoing = self.win[self.cursor];
        self.a = (self.a + MODULUS - (outgoing as u32 % MODULUS)) % MODULUS;
        self.a = (self.a + incoming as u32) % MODULUS;
        self.b = (self.b + MODULUS - (self.n as u32 * outgoing as u32 % MODULUS)) % MODULUS;
        self.b = (self.b + self.a) % MODULUS;
        self.win[self.cursor] = incoming;
        self.cursor = (self.cursor + 1) % self.n;
        Ok(self.sum())
    }

    /// The current 32-bit sum, `(b << 16) | a`.
    pub fn sum(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

/// Compute the naive (non-rolling) weak sum over a window, used to cross
/// check the incremental `RollingHash` in tests and by the delta engine
/// when it needs a one-shot sum without maintaining rolling state.
pub fn weak_sum(window: &[u8]) -> u32 {
    let n = window.len() as u32;
    let mut a: u32 = 0;
    let mut b: u32 = 0;
    for (i, &byte) in window.iter().enumerate() {
        a = (a + byte as u32) % MODULUS;
        b = (b + (n - i as u32) * byte as u32) % MODULUS;
    }
    (b << 16) | a
}

/// The 256-bit strong hash used alongside the weak rolling sum.
pub fn strong256(data: &[u8]) -> [u8; 32] {
    crate::digest::strong256(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn init_rejects_wrong_size() {
        let mut r = RollingHash::new(4);
        assert!(matches!(r.init(b"abc"), Err(CoreError::SizeMismatch(_))));
    }

    #[test]
    fn roll_before_init_errors() {
        let mut r = RollingHash::new(4);
        assert!(matches!(r.roll(b'x'), Err(CoreError::NotInitialized)));
    }

    #[test]
    fn roll_matches_naive_recompute() {
        let window = b"abcd";
        let mut r = RollingHash::new(4);
        r.init(window).unwrap();
        let rolled = r.roll(b'e').unwrap();
        let expect = weak_sum(b"bcde");
        assert_eq!(rolled, expect);
    }

    #[test]
    fn strong256_matches_blake3() {
        assert_eq!(strong256(b"abc"), *blake3::hash(b"abc").as_bytes());
    }

    proptest! {
        #[test]
        fn prop_rolling_equiv_naive(
            window in proptest::collection::vec(any::<u8>(), 8),
            bytes in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut r = RollingHash::new(8);
            r.init(&window).unwrap();
            let mut cur: Vec<u8> = window.clone();
            for &b in &bytes {
                let got = r.roll(b).unwrap();
                cur.remove(0);
                cur.push(b);
                prop_assert_eq!(got, weak_sum(&cur));
            }
        }
    }
}
