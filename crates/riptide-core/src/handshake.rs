//! Handshake message encodings and transcript hashing.
//!
//! Encodings only — orchestration (who sends what, when, and how the
//! resulting session keys get wired into an `Aead`) lives outside this
//! crate.

use bytes::{Buf, BufMut, BytesMut};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// `Hello{version:1, caps:2, nonce:16}` — 19 bytes exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hello {
    pub version: u8,
    pub caps: u16,
    pub nonce: [u8; 16],
}

impl Hello {
    pub fn new(version: u8, caps: u16) -> Self {
        let mut nonce = [0u8; 16];
        rand::rng().fill_bytes(&mut nonce);
        Hello {
            version,
            caps,
            nonce,
        }
    }

    pub fn encode(&self) -> [u8; 19] {
        let mut b = [0u8; 19];
        b[0] = self.version;
        b[1..3].copy_from_slice(&self.caps.to_be_bytes());
        b[3..19].copy_from_slice(&self.nonce);
        b
    }

    pub fn decode(b: &[u8]) -> Result<Self, CoreError> {
        if b.len() < 19 {
            return Err(CoreError::ShortBuffer {
                need: 19,
                got: b.len(),
            });
        }
        let mut nonce = [0u8; 16];
        nonce.copy_from_slice(&b[3..19]);
        Ok(Hello {
            version: b[0],
            caps: u16::from_be_bytes(b[1..3].try_into().unwrap()),
            nonce,
        })
    }
}

/// `KX{public}` — 16-bit length-prefixed public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kx {
    pub public: Vec<u8>,
}

impl Kx {
    pub fn encode(&self) -> BytesMut {
        let mut b = BytesMut::with_capacity(2 + self.public.len());
        b.put_u16(self.public.len() as u16);
        b.put_slice(&self.public);
        b
    }

    pub fn decode(mut b: impl Buf) -> Result<Self, CoreError> {
        if b.remaining() < 2 {
            return Err(CoreError::ShortBuffer {
                need: 2,
                got: b.remaining(),
            });
        }
        let len = b.get_u16() as usize;
        if b.remaining() < len {
            return Err(CoreError::ShortBuffer {
                need: len,
                got: b.remaining(),
            });
        }
        Ok(Kx {
            public: b.copy_to_bytes(len).to_vec(),
        })
    }
}

/// `Auth{ed25519_pub, signature}` — two length-prefixed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    pub ed25519_pub: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Auth {
    pub fn encode(&self) -> BytesMut {
        let mut b =
            BytesMut::with_capacity(2 + self.ed25519_pub.len() + 2 + self.signature.len());
        b.put_u16(self.ed25519_pub.len() as u16);
        b.put_slice(&self.ed25519_pub);
        b.put_u16(self.signature.len() as u16);
        b.put_slice(&self.signature);
        b
    }

    pub fn decode(mut b: impl Buf) -> Result<Self, CoreError> {
        if b.remaining() < 2 {
            return Err(CoreError::ShortBuffer {
                need: 2,
                got: b.remaining(),
            });
        }
        let pub_len = b.get_u16() as usize;
        if b.remaining() < pub_len + 2 {
            return Err(CoreError::ShortBuffer {
                need: pub_len + 2,
                got: b.remaining(),
            });
        }
        let ed25519_pub = b.copy_to_bytes(pub_len).to_vec();
        let sig_len = b.get_u16() as usize;
        if b.remaining() < sig_len {
            return Err(CoreError::ShortBuffer {
                need: sig_len,
                got: b.remaining(),
            });
        }
        let signature = b.copy_to_bytes(sig_len).to_vec();
        Ok(Auth {
            ed25519_pub,
            signature,
        })
    }
}

/// `Session{mtu:2}` — 2 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub mtu: u16,
}

impl Session {
    pub fn encode(&self) -> [u8; 2] {
        self.mtu.to_be_bytes()
    }

    pub fn decode(b: &[u8]) -> Result<Self, CoreError> {
        if b.len() < 2 {
            return Err(CoreError::ShortBuffer {
                need: 2,
                got: b.len(),
            });
        }
        Ok(Session {
            mtu: u16::from_be_bytes(b[0..2].try_into().unwrap()),
        })
    }
}

/// SHA-256 over the concatenation of raw encodings in the order observed;
/// binds the `Auth` signature to every prior handshake byte.
pub fn transcript(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Sha256::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().into()
}
