//! On-the-wire packet framing.
//!
//! ## Header (fixed 32 bytes, all integers big-endian)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |version(8)|  type(8)  |          flags(16)                     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          seq(64)                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          total(64)                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        timestamp(64)                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         crc32(32)                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The CRC-32 (IEEE polynomial) covers the first 28 bytes with the crc
//! field itself treated as zero.

use bytes::{Buf, BufMut, BytesMut};

use crate::aead::{Aead, NONCE_LEN};
use crate::digest::Digest128;
use crate::error::CoreError;

pub const HEADER_LEN: usize = 32;
pub const PROTOCOL_VERSION: u8 = 1;

/// The packet type occupying byte 1 of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PacketType {
    Hello = 1,
    Kx = 2,
    Auth = 3,
    Session = 4,
    Data = 5,
    Ack = 6,
    AckAck = 7,
    Nak = 8,
    Control = 9,
    FecParity = 10,
    Heartbeat = 11,
    Close = 12,
}

impl PacketType {
    fn from_u8(v: u8) -> Option<Self> {
        use PacketType::*;
        Some(match v {
            1 => Hello,
            2 => Kx,
            3 => Auth,
            4 => Session,
            5 => Data,
            6 => Ack,
            7 => AckAck,
            8 => Nak,
            9 => Control,
            10 => FecParity,
            11 => Heartbeat,
            12 => Close,
            _ => return None,
        })
    }
}

/// The fixed 32-byte packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketHeader {
    pub version: u8,
    pub packet_type: PacketType,
    pub flags: u16,
    pub seq: u64,
    pub total: u64,
    pub timestamp: u64,
}

impl PacketHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut b = [0u8; HEADER_LEN];
        b[0] = self.version;
        b[1] = self.packet_type as u8;
        b[2..4].copy_from_slice(&self.flags.to_be_bytes());
        b[4..12].copy_from_slice(&self.seq.to_be_bytes());
        b[12..20].copy_from_slice(&self.total.to_be_bytes());
        b[20..28].copy_from_slice(&self.timestamp.to_be_bytes());
        let crc = crc32fast::hash(&b[0..28]);
        b[28..32].copy_from_slice(&crc.to_be_bytes());
        b
    }

    pub fn decode(b: &[u8]) -> Result<Self, CoreError> {
        if b.len() < HEADER_LEN {
            return Err(CoreError::ShortBuffer {
                need: HEADER_LEN,
                got: b.len(),
            });
        }
        let calc = crc32fast::hash(&b[0..28]);
        let got = u32::from_be_bytes(b[28..32].try_into().unwrap());
        if calc != got {
            tracing::debug!(calc, got, "header checksum mismatch");
            return Err(CoreError::BadHeaderChecksum);
        }
        let packet_type = PacketType::from_u8(b[1])
            .ok_or(CoreError::InvalidConfig("unknown packet type".into()))?;
        Ok(PacketHeader {
            version: b[0],
            packet_type,
            flags: u16::from_be_bytes(b[2..4].try_into().unwrap()),
            seq: u64::from_be_bytes(b[4..12].try_into().unwrap()),
            total: u64::from_be_bytes(b[12..20].try_into().unwrap()),
            timestamp: u64::from_be_bytes(b[20..28].try_into().unwrap()),
        })
    }
}

/// `(chunk_id:8, offset:8, sum:16)` prefix followed by ciphertext bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPayload {
    pub chunk_id: u64,
    pub offset: u64,
    pub checksum: Digest128,
    pub data: Vec<u8>,
}

impl DataPayload {
    pub fn encode(&self) -> BytesMut {
        let mut b = BytesMut::with_capacity(32 + self.data.len());
        b.put_u64(self.chunk_id);
        b.put_u64(self.offset);
        b.put_slice(self.checksum.as_bytes());
        b.put_slice(&self.data);
        b
    }

    pub fn decode(mut b: impl Buf) -> Result<Self, CoreError> {
        if b.remaining() < 32 {
            return Err(CoreError::ShortBuffer {
                need: 32,
                got: b.remaining(),
            });
        }
        let chunk_id = b.get_u64();
        let offset = b.get_u64();
        let mut sum = [0u8; 16];
        b.copy_to_slice(&mut sum);
        let data = b.copy_to_bytes(b.remaining()).to_vec();
        Ok(DataPayload {
            chunk_id,
            offset,
            checksum: Digest128::from_bytes(sum),
            data,
        })
    }
}

/// `(seq:8, sum:16)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub seq: u64,
    pub sum: Digest128,
}

impl Ack {
    pub fn encode(&self) -> [u8; 24] {
        let mut b = [0u8; 24];
        b[0..8].copy_from_slice(&self.seq.to_be_bytes());
        b[8..24].copy_from_slice(self.sum.as_bytes());
        b
    }

    pub fn decode(b: &[u8]) -> Result<Self, CoreError> {
        if b.len() < 24 {
            return Err(CoreError::ShortBuffer {
                need: 24,
                got: b.len(),
            });
        }
        let mut sum = [0u8; 16];
        sum.copy_from_slice(&b[8..24]);
        Ok(Ack {
            seq: u64::from_be_bytes(b[0..8].try_into().unwrap()),
            sum: Digest128::from_bytes(sum),
        })
    }
}

/// `(seq:8, sum:16, code:2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nak {
    pub seq: u64,
    pub sum: Digest128,
    pub code: u16,
}

impl Nak {
    pub fn encode(&self) -> [u8; 26] {
        let mut b = [0u8; 26];
        b[0..8].copy_from_slice(&self.seq.to_be_bytes());
        b[8..24].copy_from_slice(self.sum.as_bytes());
        b[24..26].copy_from_slice(&self.code.to_be_bytes());
        b
    }

    pub fn decode(b: &[u8]) -> Result<Self, CoreError> {
        if b.len() < 26 {
            return Err(CoreError::ShortBuffer {
                need: 26,
                got: b.len(),
            });
        }
        let mut sum = [0u8; 16];
        sum.copy_from_slice(&b[8..24]);
        Ok(Nak {
            seq: u64::from_be_bytes(b[0..8].try_into().unwrap()),
            sum: Digest128::from_bytes(sum),
            code: u16::from_be_bytes(b[24..26].try_into().unwrap()),
        })
    }
}

/// `(seq:8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckAck {
    pub seq: u64,
}

impl AckAck {
    pub fn encode(&self) -> [u8; 8] {
        self.seq.to_be_bytes()
    }

    pub fn decode(b: &[u8]) -> Result<Self, CoreError> {
        if b.len() < 8 {
            return Err(CoreError::ShortBuffer {
                need: 8,
                got: b.len(),
            });
        }
        Ok(AckAck {
            seq: u64::from_be_bytes(b[0..8].try_into().unwrap()),
        })
    }
}

/// `(seq:8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub seq: u64,
}

impl Heartbeat {
    pub fn encode(&self) -> [u8; 8] {
        self.seq.to_be_bytes()
    }

    pub fn decode(b: &[u8]) -> Result<Self, CoreError> {
        if b.len() < 8 {
            return Err(CoreError::ShortBuffer {
                need: 8,
                got: b.len(),
            });
        }
        Ok(Heartbeat {
            seq: u64::from_be_bytes(b[0..8].try_into().unwrap()),
        })
    }
}

/// `(window:4, pacing:4, rtt:8, loss:2, mtu_probe:2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub window: u32,
    pub pacing: u32,
    pub rtt: u64,
    pub loss: u16,
    pub mtu_probe: u16,
}

impl Control {
    pub fn encode(&self) -> [u8; 20] {
        let mut b = [0u8; 20];
        b[0..4].copy_from_slice(&self.window.to_be_bytes());
        b[4..8].copy_from_slice(&self.pacing.to_be_bytes());
        b[8..16].copy_from_slice(&self.rtt.to_be_bytes());
        b[16..18].copy_from_slice(&self.loss.to_be_bytes());
        b[18..20].copy_from_slice(&self.mtu_probe.to_be_bytes());
        b
    }

    pub fn decode(b: &[u8]) -> Result<Self, CoreError> {
        if b.len() < 20 {
            return Err(CoreError::ShortBuffer {
                need: 20,
                got: b.len(),
            });
        }
        Ok(Control {
            window: u32::from_be_bytes(b[0..4].try_into().unwrap()),
            pacing: u32::from_be_bytes(b[4..8].try_into().unwrap()),
            rtt: u64::from_be_bytes(b[8..16].try_into().unwrap()),
            loss: u16::from_be_bytes(b[16..18].try_into().unwrap()),
            mtu_probe: u16::from_be_bytes(b[18..20].try_into().unwrap()),
        })
    }
}

/// `(block_id:8, index:2, total:2, parity_bytes...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FecParity {
    pub block_id: u64,
    pub index: u16,
    pub total: u16,
    pub parity: Vec<u8>,
}

impl FecParity {
    pub fn encode(&self) -> BytesMut {
        let mut b = BytesMut::with_capacity(12 + self.parity.len());
        b.put_u64(self.block_id);
        b.put_u16(self.index);
        b.put_u16(self.total);
        b.put_slice(&self.parity);
        b
    }

    pub fn decode(mut b: impl Buf) -> Result<Self, CoreError> {
        if b.remaining() < 12 {
            return Err(CoreError::ShortBuffer {
                need: 12,
                got: b.remaining(),
            });
        }
        let block_id = b.get_u64();
        let index = b.get_u16();
        let total = b.get_u16();
        let parity = b.copy_to_bytes(b.remaining()).to_vec();
        Ok(FecParity {
            block_id,
            index,
            total,
            parity,
        })
    }
}

/// `header(32) | nonce(12) | aead_seal(data_payload.encode())`.
pub fn encode_data_packet(
    header: &PacketHeader,
    payload: &DataPayload,
    aead: &mut Aead,
    aad: &[u8],
) -> Vec<u8> {
    let hb = header.encode();
    let pb = payload.encode();
    let (nonce, ct) = aead.seal(&pb, aad);
    let mut out = Vec::with_capacity(hb.len() + NONCE_LEN + ct.len());
    out.extend_from_slice(&hb);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    out
}

pub fn decode_data_packet(
    bytes: &[u8],
    aead: &Aead,
    aad: &[u8],
) -> Result<(PacketHeader, DataPayload), CoreError> {
    if bytes.len() < HEADER_LEN + NONCE_LEN {
        return Err(CoreError::ShortBuffer {
            need: HEADER_LEN + NONCE_LEN,
            got: bytes.len(),
        });
    }
    let header = PacketHeader::decode(&bytes[..HEADER_LEN])?;
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&bytes[HEADER_LEN..HEADER_LEN + NONCE_LEN]);
    let ct = &bytes[HEADER_LEN + NONCE_LEN..];
    let pt = aead.open(ct, aad, &nonce)?;
    let payload = DataPayload::decode(pt.as_slice())?;
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::Aead;
    use proptest::prelude::*;

    fn sample_header() -> PacketHeader {
        PacketHeader {
            version: PROTOCOL_VERSION,
            packet_type: PacketType::Data,
            flags: 3,
            seq: 123,
            total: 456,
            timestamp: 789,
        }
    }

    #[test]
    fn header_round_trip() {
        let h = sample_header();
        let enc = h.encode();
        let dec = PacketHeader::decode(&enc).unwrap();
        assert_eq!(dec, h);
    }

    #[test]
    fn header_bit_flip_fails_checksum() {
        let h = sample_header();
        let mut enc = h.encode();
        enc[0] ^= 0x01;
        assert!(matches!(
            PacketHeader::decode(&enc),
            Err(CoreError::BadHeaderChecksum)
        ));
    }

    #[test]
    fn data_packet_round_trip() {
        let mut aead = Aead::new(&[9u8; 32]);
        let header = sample_header();
        let payload = DataPayload {
            chunk_id: 1,
            offset: 0,
            checksum: Digest128::compute(b"plaintext chunk"),
            data: b"plaintext chunk".to_vec(),
        };
        let wire = encode_data_packet(&header, &payload, &mut aead, b"session-aad");
        let (dec_header, dec_payload) = decode_data_packet(&wire, &aead, b"session-aad").unwrap();
        assert_eq!(dec_header, header);
        assert_eq!(dec_payload, payload);
    }

    #[test]
    fn ack_nak_ackack_round_trip() {
        let sum = Digest128::compute(b"x");
        let ack = Ack { seq: 5, sum };
        assert_eq!(Ack::decode(&ack.encode()).unwrap(), ack);

        let nak = Nak { seq: 5, sum, code: 2 };
        assert_eq!(Nak::decode(&nak.encode()).unwrap(), nak);

        let ackack = AckAck { seq: 5 };
        assert_eq!(AckAck::decode(&ackack.encode()).unwrap(), ackack);
    }

    proptest! {
        #[test]
        fn prop_header_round_trip(
            flags in any::<u16>(), seq in any::<u64>(), total in any::<u64>(), ts in any::<u64>(),
        ) {
            let h = PacketHeader {
                version: PROTOCOL_VERSION,
                packet_type: PacketType::Data,
                flags, seq, total, timestamp: ts,
            };
            let enc = h.encode();
            prop_assert_eq!(PacketHeader::decode(&enc).unwrap(), h);
        }
    }
}
