//! End-to-end pipeline and handshake scenarios.

use std::sync::{Arc, Mutex};

use riptide_core::aead::Aead;
use riptide_core::digest::Digest128;
use riptide_core::keys::{derive_session, X25519KeyPair};
use riptide_core::pipeline::{
    chunk, compress, compute_checksum, decompress, decrypt, encrypt, fec_group_encode,
    fec_group_reconstruct, verify_checksum,
};
use riptide_core::ring::Ring;
use riptide_core::wire::{PacketHeader, PacketType};

/// E1: chunk -> checksum -> encrypt -> ring -> decrypt -> verify ->
/// reorder by offset -> concatenation equals the original buffer.
#[test]
fn e1_ring_carried_round_trip() {
    let data: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
    let descriptors = chunk(&data, 128);

    let key = [5u8; 32];
    let send_aead = Arc::new(Mutex::new(Aead::new(&key)));
    let open_aead = Arc::new(Aead::new(&key));
    let aad = b"e1-aad".to_vec();

    let ring: Ring<riptide_core::pipeline::Descriptor> = Ring::new(64);

    for d in descriptors {
        let with_sum = compute_checksum()(d).unwrap();
        let encrypted = encrypt(send_aead.clone(), aad.clone())(with_sum).unwrap();
        assert!(ring.enqueue(encrypted));
    }

    let mut received = Vec::new();
    while let Some(d) = ring.dequeue() {
        let decrypted = decrypt(open_aead.clone(), aad.clone())(d).unwrap();
        let verified = verify_checksum()(decrypted).unwrap();
        received.push(verified);
    }

    received.sort_by_key(|d| d.offset);
    let reassembled: Vec<u8> = received.into_iter().flat_map(|d| d.data).collect();
    assert_eq!(reassembled, data);
}

/// E2: chunk at 256B (k=4) -> FECGroupEncode(4,6) -> null shard 2 ->
/// FECGroupReconstruct -> data descriptors byte-identical to inputs.
#[test]
fn e2_fec_group_round_trip() {
    let data: Vec<u8> = (0..1024u32).map(|i| (i * 3 % 256) as u8).collect();
    let descriptors = chunk(&data, 256);
    assert_eq!(descriptors.len(), 4);

    let grouped = fec_group_encode(descriptors.clone(), 4, 6).unwrap();
    assert_eq!(grouped.len(), 6);

    let reconstructed = fec_group_reconstruct(grouped, 4, 6, &[2]).unwrap();
    for (i, original) in descriptors.iter().enumerate() {
        assert_eq!(reconstructed[i].data, original.data);
    }
}

/// E3: chunk -> checksum + compress -> encrypt -> decrypt -> decompress ->
/// verify -> concatenated plaintext equals the original.
#[test]
fn e3_compress_encrypt_round_trip() {
    let data: Vec<u8> = (0..2048u32).map(|i| ((i * 7) % 251) as u8).collect();
    let descriptors = chunk(&data, 256);

    let key = [11u8; 32];
    let send_aead = Arc::new(Mutex::new(Aead::new(&key)));
    let open_aead = Arc::new(Aead::new(&key));
    let aad = b"e3-aad".to_vec();

    let mut received = Vec::new();
    for d in descriptors {
        let with_sum = compute_checksum()(d).unwrap();
        let compressed = compress()(with_sum).unwrap();
        let encrypted = encrypt(send_aead.clone(), aad.clone())(compressed).unwrap();

        let decrypted = decrypt(open_aead.clone(), aad.clone())(encrypted).unwrap();
        let decompressed = decompress()(decrypted).unwrap();
        let verified = verify_checksum()(decompressed).unwrap();
        received.push(verified);
    }

    received.sort_by_key(|d| d.offset);
    let reassembled: Vec<u8> = received.into_iter().flat_map(|d| d.data).collect();
    assert_eq!(reassembled, data);
}

/// E4: two X25519 keypairs derive sessions with a fixed salt; tx/rx cross
/// exactly and never coincide.
#[test]
fn e4_session_key_pairing() {
    let a = X25519KeyPair::generate();
    let b = X25519KeyPair::generate();

    let a_shared = a.shared_secret(&b.public);
    let b_shared = b.shared_secret(&a.public);

    let salt = b"riptide-test-salt";
    let a_keys = derive_session(&a_shared, salt, true);
    let b_keys = derive_session(&b_shared, salt, false);

    assert_eq!(a_keys.tx, b_keys.rx);
    assert_eq!(a_keys.rx, b_keys.tx);
    assert_ne!(a_keys.tx, a_keys.rx);
}

/// E5: header encode/decode round trip; flipping byte 0 yields a bad
/// checksum.
#[test]
fn e5_header_round_trip_and_tamper_detection() {
    let header = PacketHeader {
        version: 1,
        packet_type: PacketType::Data,
        flags: 3,
        seq: 123,
        total: 456,
        timestamp: 789,
    };
    let encoded = header.encode();
    let decoded = PacketHeader::decode(&encoded).unwrap();
    assert_eq!(decoded, header);

    let mut tampered = encoded;
    tampered[0] ^= 0xFF;
    assert!(PacketHeader::decode(&tampered).is_err());
}

#[test]
fn digest_constant_time_equal_and_round_trip() {
    let d = Digest128::compute(b"end to end digest check");
    let (hi, lo) = d.to_u64_pair();
    assert_eq!(Digest128::from_u64_pair(hi, lo), d);
}
