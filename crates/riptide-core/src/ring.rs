//! Fixed-capacity single-producer/single-consumer lock-free ring buffer.
//!
//! Capacity is rounded up to the next power of two. Head and tail indices
//! are cache-line padded so producer and consumer cache lines don't
//! false-share, and ordering between a successful enqueue and the matching
//! dequeue is established with release/acquire semantics.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

const CACHE_LINE: usize = 64;

#[repr(align(64))]
struct PaddedAtomic(AtomicU64);

/// A power-of-two-capacity SPSC ring buffer of `T`.
pub struct Ring<T> {
    head: PaddedAtomic, // consumer-owned read index
    tail: PaddedAtomic, // producer-owned write index
    mask: u64,
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    _pad: [u8; CACHE_LINE],
}

// SAFETY: access to `buf` slots is disciplined by the head/tail protocol —
// a slot is only ever touched by the producer (enqueue) or the consumer
// (dequeue) at any given time, and Ordering::Release/Acquire on head/tail
// establishes the happens-before edge between the two.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

fn next_pow2(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    1usize << (usize::BITS - (n - 1).leading_zeros())
}

impl<T> Ring<T> {
    /// Create a ring with capacity rounded up to the next power of two.
    pub fn new(requested_capacity: usize) -> Self {
        let cap = next_pow2(requested_capacity.max(1));
        let mut v = Vec::with_capacity(cap);
        for _ in 0..cap {
            v.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Ring {
            head: PaddedAtomic(AtomicU64::new(0)),
            tail: PaddedAtomic(AtomicU64::new(0)),
            mask: (cap - 1) as u64,
            buf: v.into_boxed_slice(),
            _pad: [0u8; CACHE_LINE],
        }
    }

    pub fn cap(&self) -> usize {
        (self.mask + 1) as usize
    }

    /// Observational length; may briefly overshoot capacity under
    /// concurrent access but never exceeds it once quiescent.
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Acquire);
        let tail = self.tail.0.load(Ordering::Acquire);
        tail.wrapping_sub(head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push `v`. Returns `false` (and gives `v` back via drop) if the ring
    /// is full.
    pub fn enqueue(&self, v: T) -> bool {
        let tail = self.tail.0.load(Ordering::Relaxed);
        let head = self.head.0.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.cap() as u64 {
            return false;
        }
        let idx = (tail & self.mask) as usize;
        // SAFETY: single producer, slot at `idx` is free because head..tail
        // has not wrapped past it.
        unsafe {
            (*self.buf[idx].get()).write(v);
        }
        self.tail.0.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Pop the oldest value. Returns `None` if the ring is empty. The
    /// vacated slot is zeroed (dropped in place and reset) to release any
    /// heap-allocated payload promptly.
    pub fn dequeue(&self) -> Option<T> {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let idx = (head & self.mask) as usize;
        // SAFETY: single consumer, slot at `idx` holds an initialized value
        // because head != tail.
        let v = unsafe {
            let slot = &mut *self.buf[idx].get();
            let v = slot.assume_init_read();
            *slot = MaybeUninit::uninit();
            v
        };
        self.head.0.store(head.wrapping_add(1), Ordering::Release);
        Some(v)
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}

/// Shared capability set for SPSC-style queues, matching the contract
/// the pipeline stages are written against.
pub trait Queue<T> {
    fn enqueue(&self, v: T) -> bool;
    fn dequeue(&self) -> Option<T>;
    fn len(&self) -> usize;
    fn cap(&self) -> usize;
}

impl<T> Queue<T> for Ring<T> {
    fn enqueue(&self, v: T) -> bool {
        Ring::enqueue(self, v)
    }
    fn dequeue(&self) -> Option<T> {
        Ring::dequeue(self)
    }
    fn len(&self) -> usize {
        Ring::len(self)
    }
    fn cap(&self) -> usize {
        Ring::cap(self)
    }
}
