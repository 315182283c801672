//! Reliability state machine: outbound retransmission, inbound
//! acknowledgment, ack-of-ack closure, and the composed per-tick actions.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::digest::Digest128;

fn backoff(base: Duration, tries: u32, max: Duration) -> Duration {
    debug_assert!(tries >= 1);
    // Cap the shift well below where `1 << shift` would overflow u32 — by
    // the time tries reaches 20 the doubled duration has long since
    // saturated past any realistic `max_backoff`.
    let shift = (tries - 1).min(20);
    let multiplier: u32 = 1u32 << shift;
    base.checked_mul(multiplier)
        .map(|d| d.min(max))
        .unwrap_or(max)
}

fn jitter(rng: &mut StdRng, d: Duration, frac: f64) -> Duration {
    if frac <= 0.0 {
        return d;
    }
    let n = rng.random::<f64>() * 2.0 - 1.0; // uniform(-1, 1)
    let delta = d.mul_f64(frac);
    let signed = delta.mul_f64(n.abs());
    if n >= 0.0 {
        d + signed
    } else {
        d.saturating_sub(signed)
    }
}

struct OutEntry {
    sum: Digest128,
    next_due_at: Instant,
    tries: u32,
}

/// Per-seq outbound retransmission schedule.
pub struct OutboundTracker {
    entries: HashMap<u64, OutEntry>,
    initial_rto: Duration,
    max_backoff: Duration,
    rng: StdRng,
}

impl OutboundTracker {
    pub fn new(initial_rto: Duration, max_backoff: Duration, seed: u64) -> Self {
        OutboundTracker {
            entries: HashMap::new(),
            initial_rto: if initial_rto.is_zero() {
                Duration::from_millis(100)
            } else {
                initial_rto
            },
            max_backoff: if max_backoff.is_zero() {
                Duration::from_secs(30)
            } else {
                max_backoff
            },
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// If an entry exists and isn't yet due, update only its `sum` and
    /// keep the existing schedule (intentional coalescing of a re-send
    /// that races a pending retransmit timer). Otherwise install a fresh
    /// entry.
    pub fn on_send(&mut self, seq: u64, sum: Digest128, now: Instant) {
        if let Some(e) = self.entries.get_mut(&seq) {
            e.sum = sum;
            if e.next_due_at > now {
                return;
            }
        }
        self.entries.insert(
            seq,
            OutEntry {
                sum,
                next_due_at: now + self.initial_rto,
                tries: 0,
            },
        );
    }

    pub fn on_ack(&mut self, seq: u64) -> bool {
        self.entries.remove(&seq).is_some()
    }

    pub fn on_nak(&mut self, seq: u64, now: Instant) -> bool {
        if let Some(e) = self.entries.get_mut(&seq) {
            e.next_due_at = now;
            true
        } else {
            false
        }
    }

    /// Up to `max` seqs due at or before `now` (all of them if `max <= 0`).
    pub fn due(&mut self, now: Instant, max: i64) -> Vec<u64> {
        let cap = if max <= 0 { self.entries.len() } else { max as usize };
        let mut out = Vec::with_capacity(cap.min(self.entries.len()));
        for (&seq, e) in self.entries.iter_mut() {
            if e.next_due_at > now {
                continue;
            }
            out.push(seq);
            e.tries += 1;
            let rto = backoff(self.initial_rto, e.tries, self.max_backoff);
            e.next_due_at = now + jitter(&mut self.rng, rto, 0.1);
            if out.len() == cap {
                break;
            }
        }
        out
    }

    pub fn get_sum(&self, seq: u64) -> Option<Digest128> {
        self.entries.get(&seq).map(|e| e.sum)
    }

    pub fn contains(&self, seq: u64) -> bool {
        self.entries.contains_key(&seq)
    }
}

struct InEntry {
    sum: Digest128,
    next_due_at: Instant,
    tries: u32,
}

/// Per-seq pending-ack schedule on the receive side.
pub struct InboundTracker {
    pending: HashMap<u64, InEntry>,
    initial_to: Duration,
    max_backoff: Duration,
    rng: StdRng,
}

impl InboundTracker {
    pub fn new(initial_to: Duration, max_backoff: Duration, seed: u64) -> Self {
        InboundTracker {
            pending: HashMap::new(),
            initial_to: if initial_to.is_zero() {
                Duration::from_millis(100)
            } else {
                initial_to
            },
            max_backoff: if max_backoff.is_zero() {
                Duration::from_secs(30)
            } else {
                max_backoff
            },
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Idempotent: a duplicate arrival does not reset the schedule.
    pub fn on_data(&mut self, seq: u64, sum: Digest128, now: Instant) -> bool {
        self.pending.entry(seq).or_insert_with(|| InEntry {
            sum,
            next_due_at: now + self.initial_to,
            tries: 0,
        });
        true
    }

    pub fn on_ack_ack(&mut self, seq: u64) -> bool {
        self.pending.remove(&seq).is_some()
    }

    pub fn due(&mut self, now: Instant, max: i64) -> Vec<u64> {
        let cap = if max <= 0 { self.pending.len() } else { max as usize };
        let mut out = Vec::with_capacity(cap.min(self.pending.len()));
        for (&seq, e) in self.pending.iter_mut() {
            if e.next_due_at > now {
                continue;
            }
            out.push(seq);
            e.tries += 1;
            let to = backoff(self.initial_to, e.tries, self.max_backoff);
            e.next_due_at = now + jitter(&mut self.rng, to, 0.1);
            if out.len() == cap {
                break;
            }
        }
        out
    }

    pub fn get_sum(&self, seq: u64) -> Option<Digest128> {
        self.pending.get(&seq).map(|e| e.sum)
    }
}

struct AckAckEntry {
    next_due_at: Instant,
    tries: u32,
}

/// Composed retransmit/ack/ack-ack actions returned by `State::tick`.
#[derive(Debug, Default, Clone)]
pub struct Actions {
    pub retx: Vec<u64>,
    pub ack: Vec<u64>,
    pub ack_ack: Vec<u64>,
}

/// Composes an outbound tracker, an inbound tracker, and an ack-ack
/// pending map behind the single state machine the caller drives.
pub struct State {
    out: OutboundTracker,
    inb: InboundTracker,
    ack_ack_pending: HashMap<u64, AckAckEntry>,
    min_ack_interval: Duration,
    last_ack_sent_at: HashMap<u64, Instant>,
    ack_backoff_base: Duration,
    ack_backoff_max: Duration,
    ack_ack_max_tries: u32,
    rng: StdRng,
}

impl State {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial_rto: Duration,
        max_backoff: Duration,
        ack_initial_to: Duration,
        ack_max_backoff: Duration,
        min_ack_interval: Duration,
        ack_ack_max_tries: u32,
        seed: u64,
    ) -> Self {
        State {
            out: OutboundTracker::new(initial_rto, max_backoff, seed),
            inb: InboundTracker::new(ack_initial_to, ack_max_backoff, seed.wrapping_add(1)),
            ack_ack_pending: HashMap::new(),
            min_ack_interval,
            last_ack_sent_at: HashMap::new(),
            ack_backoff_base: if ack_initial_to.is_zero() {
                Duration::from_millis(100)
            } else {
                ack_initial_to
            },
            ack_backoff_max: if ack_max_backoff.is_zero() {
                Duration::from_secs(30)
            } else {
                ack_max_backoff
            },
            ack_ack_max_tries: if ack_ack_max_tries == 0 {
                8
            } else {
                ack_ack_max_tries
            },
            rng: StdRng::seed_from_u64(seed.wrapping_add(2)),
        }
    }

    pub fn on_send(&mut self, seq: u64, sum: Digest128, now: Instant) {
        self.out.on_send(seq, sum, now);
    }

    pub fn on_data(&mut self, seq: u64, sum: Digest128, now: Instant) {
        self.inb.on_data(seq, sum, now);
    }

    /// Removes the outbound entry and, if none exists yet, creates an
    /// ack-ack pending entry due immediately.
    pub fn on_ack(&mut self, seq: u64, now: Instant) {
        self.out.on_ack(seq);
        self.ack_ack_pending
            .entry(seq)
            .or_insert_with(|| AckAckEntry {
                next_due_at: now,
                tries: 0,
            });
    }

    pub fn on_ack_ack(&mut self, seq: u64) {
        self.inb.on_ack_ack(seq);
    }

    pub fn on_nak(&mut self, seq: u64, now: Instant) {
        self.out.on_nak(seq, now);
    }

    pub fn get_outbound_sum(&self, seq: u64) -> Option<Digest128> {
        self.out.get_sum(seq)
    }

    pub fn get_inbound_sum(&self, seq: u64) -> Option<Digest128> {
        self.inb.get_sum(seq)
    }

    pub fn tick(&mut self, now: Instant, max: i64) -> Actions {
        let retx = self.out.due(now, max);

        let mut ack = Vec::new();
        for seq in self.inb.due(now, max) {
            if let Some(&prev) = self.last_ack_sent_at.get(&seq) {
                if now.duration_since(prev) < self.min_ack_interval {
                    continue;
                }
            }
            ack.push(seq);
            self.last_ack_sent_at.insert(seq, now);
        }

        let cap = if max <= 0 {
            self.ack_ack_pending.len()
        } else {
            max as usize
        };
        // An AckAck has no protocol-level confirmation of its own (no
        // ack-of-an-ack-of-an-ack), so a pending entry can't key its removal
        // off a reply the way OutboundTracker keys off OnAck. Two paths out:
        // `confirm_ack_ack` if the caller has external evidence delivery
        // happened, or giving up after `ack_ack_max_tries` retransmissions
        // (mirrors the sender-side give-up-after-max-retries pattern used
        // for data retransmits) so the map can't grow without bound.
        let mut ack_ack = Vec::with_capacity(cap.min(self.ack_ack_pending.len()));
        let mut give_up = Vec::new();
        for (&seq, e) in self.ack_ack_pending.iter_mut() {
            if e.next_due_at > now || ack_ack.len() == cap {
                continue;
            }
            ack_ack.push(seq);
            e.tries += 1;
            if e.tries >= self.ack_ack_max_tries {
                give_up.push(seq);
            } else {
                let to = backoff(self.ack_backoff_base, e.tries, self.ack_backoff_max);
                e.next_due_at = now + jitter(&mut self.rng, to, 0.1);
            }
        }
        for seq in give_up {
            tracing::debug!(seq, "giving up on ack-ack after max tries");
            self.ack_ack_pending.remove(&seq);
        }

        tracing::trace!(
            retx = retx.len(),
            ack = ack.len(),
            ack_ack = ack_ack.len(),
            "reliability tick"
        );
        Actions { retx, ack, ack_ack }
    }

    /// Remove the ack-ack pending entry for `seq` once the caller has
    /// external evidence the peer received it — e.g. the orchestration
    /// layer observes the peer has moved on (later data/control traffic
    /// implying it stopped waiting on this AckAck) rather than anything
    /// this passive state machine can detect on its own. Returns whether an
    /// entry was actually present.
    pub fn confirm_ack_ack(&mut self, seq: u64) -> bool {
        self.ack_ack_pending.remove(&seq).is_some()
    }
}
