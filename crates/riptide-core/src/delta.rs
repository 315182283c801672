//! rsync-style delta encoding: block-aligned signature table, copy/literal
//! delta program, and a lenient apply step that never fails on a corrupt
//! delta (it clamps instead).

use std::collections::HashMap;

use crate::rolling::{strong256, weak_sum};

/// A single block's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSig {
    pub weak: u32,
    pub strong: [u8; 32],
    pub offset: u64,
    pub length: u64,
}

/// A basis file's block signature table.
#[derive(Debug, Clone)]
pub struct FileSig {
    pub block_size: usize,
    table: HashMap<String, BlockSig>,
}

fn sig_key(weak: u32, strong: &[u8; 32]) -> String {
    format!("{:x}:{}", weak, hex_string(strong))
}

fn hex_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

impl FileSig {
    /// Partition `data` into non-overlapping `block_size` windows (a
    /// trailing short block is allowed) and build the signature table.
    /// Later insertions overwrite earlier ones on key collision.
    pub fn compute(data: &[u8], block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let mut table = HashMap::new();
        let mut offset = 0u64;
        let mut i = 0usize;
        while i < data.len() {
            let j = (i + block_size).min(data.len());
            let block = &data[i..j];
            let weak = weak_sum(block);
            let strong = strong256(block);
            let key = sig_key(weak, &strong);
            table.insert(
                key,
                BlockSig {
                    weak,
                    strong,
                    offset,
                    length: block.len() as u64,
                },
            );
            offset += block.len() as u64;
            i = j;
        }
        FileSig { block_size, table }
    }

    pub fn lookup(&self, weak: u32, strong: &[u8; 32]) -> Option<&BlockSig> {
        self.table.get(&sig_key(weak, strong))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// One instruction in a delta program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    /// Copy `len` bytes from the basis starting at `src_off`.
    Copy { src_off: u64, len: u64 },
    /// Insert literal bytes not found in the basis.
    Literal(Vec<u8>),
}

/// Walk `new_data` in `block_size` strides, emitting `Copy` where a block
/// matches the basis signature table and `Literal` otherwise. Scanning is
/// block-aligned, not a byte-by-byte rolling search — a deliberate
/// simplification trading compression ratio for speed.
pub fn compute_delta(sig: &FileSig, new_data: &[u8]) -> Vec<DeltaOp> {
    let block_size = sig.block_size.max(1);
    let mut ops = Vec::new();
    let mut i = 0usize;
    while i < new_data.len() {
        let j = (i + block_size).min(new_data.len());
        let block = &new_data[i..j];
        let weak = weak_sum(block);
        let strong = strong256(block);
        match sig.lookup(weak, &strong) {
            Some(bs) => ops.push(DeltaOp::Copy {
                src_off: bs.offset,
                len: bs.length,
            }),
            None => ops.push(DeltaOp::Literal(block.to_vec())),
        }
        i = j;
    }
    ops
}

/// Reconstruct bytes from a basis and a delta program. Copy offsets are
/// clamped to the basis bounds rather than causing an error — a partially
/// corrupt delta still yields a defined (if wrong) output.
pub fn apply_delta(basis: &[u8], ops: &[DeltaOp]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        match op {
            DeltaOp::Copy { src_off, len } => {
                let start = (*src_off as usize).min(basis.len());
                let end = start.saturating_add(*len as usize).min(basis.len());
                out.extend_from_slice(&basis[start..end]);
            }
            DeltaOp::Literal(bytes) => out.extend_from_slice(bytes),
        }
    }
    out
}
