//! MTU-derived sizing math: how many payload bytes fit in one datagram
//! after IPv4/UDP and framing overhead.

use crate::aead::Aead;
use crate::wire::HEADER_LEN;

const IPV4_UDP_OVERHEAD: i64 = 20 + 8;
const NONCE_LEN: i64 = 12;

/// `max(0, mtu - 28)` — IPv4 (20) + UDP (8) header overhead.
pub fn udp_payload_budget(mtu: i64) -> i64 {
    (mtu - IPV4_UDP_OVERHEAD).max(0)
}

/// `max(0, budget - header_len - 12 - aead_tag_len)`.
pub fn max_data_per_packet(mtu: i64, header_len: i64) -> i64 {
    let budget = udp_payload_budget(mtu);
    let overhead = header_len + NONCE_LEN + Aead::overhead() as i64;
    (budget - overhead).max(0)
}

/// Convenience wrapper using this crate's fixed 32-byte packet header.
pub fn max_data_per_riptide_packet(mtu: i64) -> i64 {
    max_data_per_packet(mtu, HEADER_LEN as i64)
}
