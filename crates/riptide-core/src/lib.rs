//! # riptide-core
//!
//! Engineering core of a point-to-point encrypted file transfer transport
//! over an unreliable datagram substrate: packet framing, a reliability
//! state machine, a chunk/checksum/compress/encrypt pipeline, Reed-Solomon
//! FEC grouping, a BBR-style congestion estimator, rsync-style delta
//! resync, and the SPSC ring buffer that carries descriptors between
//! pipeline stages.
//!
//! This crate is a passive library: every component is a pure state
//! machine driven by its caller (see `reliability::State::tick` and the
//! concurrency notes on `ring::Ring`). Socket I/O, file I/O, handshake
//! orchestration, and CLI argument handling live outside this crate —
//! see `riptide-cli` for the external contract surface.

pub mod aead;
pub mod congestion;
pub mod delta;
pub mod digest;
pub mod error;
pub mod fec;
pub mod handshake;
pub mod keys;
pub mod mtu;
pub mod pipeline;
pub mod reliability;
pub mod ring;
pub mod rolling;
pub mod sack;
pub mod wire;
