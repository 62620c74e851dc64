//! Timestamped events and timers.
//!
//! Producers push into a fixed ring buffer during a tick; the simulation drains
//! everything that is due once integration has finished.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use hecs::Entity;

use crate::defs::MAX_EVENTS;
use crate::world::SectorId;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    SectorEntered { mob: Entity, sector: SectorId },
    SectorExited { mob: Entity, sector: SectorId },
    Hurt { mob: Entity, amount: f64 },
    DoorChanged { sector: SectorId, opening: bool },
    MobRemoved { mob: Entity },
    /// Caller-defined id, used by timers.
    Custom(u32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    /// Simulation time (ns) at which the event becomes due.
    pub timestamp: u64,
    pub kind: EventKind,
}

/// Fixed-capacity ring buffer. When full, the oldest event is dropped.
pub struct EventQueue {
    ring: Vec<Option<Event>>,
    head: usize,
    tail: usize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self {
            ring: vec![None; MAX_EVENTS],
            head: 0,
            tail: 0,
        }
    }
}

impl EventQueue {
    pub fn push(&mut self, ev: Event) {
        self.ring[self.tail] = Some(ev);
        self.tail = (self.tail + 1) % self.ring.len();
        if self.tail == self.head {
            log::warn!("event queue full ({} slots), dropping oldest", self.ring.len());
            self.head = (self.head + 1) % self.ring.len();
        }
    }

    /// Pop the oldest event if it is due at `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<Event> {
        if self.head == self.tail {
            return None;
        }
        let ev = self.ring[self.head]?;
        if ev.timestamp > now {
            return None;
        }
        self.ring[self.head] = None;
        self.head = (self.head + 1) % self.ring.len();
        Some(ev)
    }

    pub fn len(&self) -> usize {
        (self.tail + self.ring.len() - self.head) % self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }
}

/// A pending event scheduled for a later simulation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Due {
    at: u64,
    seq: u64,
}

#[derive(Default)]
pub struct Timers {
    heap: BinaryHeap<Reverse<Due>>,
    pending: Vec<Option<EventKind>>,
    seq: u64,
}

impl Timers {
    pub fn schedule(&mut self, at: u64, kind: EventKind) {
        let seq = self.seq;
        self.seq += 1;
        self.pending.push(Some(kind));
        self.heap.push(Reverse(Due { at, seq }));
    }

    /// Move every timer due at `now` into `queue`, in schedule order.
    pub fn fire(&mut self, now: u64, queue: &mut EventQueue) {
        while let Some(Reverse(due)) = self.heap.peek().copied() {
            if due.at > now {
                break;
            }
            self.heap.pop();
            let base = self.seq - self.pending.len() as u64;
            if let Some(kind) = self
                .pending
                .get_mut((due.seq - base) as usize)
                .and_then(Option::take)
            {
                queue.push(Event {
                    timestamp: due.at,
                    kind,
                });
            }
        }
        // drop the fired prefix so `pending` stays small
        let fired = self.pending.iter().take_while(|k| k.is_none()).count();
        self.pending.drain(..fired);
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
