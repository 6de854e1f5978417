use std::sync::atomic::{AtomicU8, Ordering};

const STOP: u8 = 0b001;
const HALT: u8 = 0b010;
const BOOST: u8 = 0b100;

/// The scheduler core's atomic bitset over {STOP, HALT, BOOST}.
///
/// No mutex covers this bitset; a transition that must appear ordered
/// relative to a queue mutation (e.g. setting STOP, then broadcasting)
/// requires the caller to broadcast after the store, exactly as the
/// original `std::atomic<int>` + condition-variable handshake did.
#[derive(Debug, Default)]
pub struct Flags(AtomicU8);

impl Flags {
    pub fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub fn stop(&self) -> bool {
        self.0.load(Ordering::Acquire) & STOP != 0
    }

    pub fn halt(&self) -> bool {
        self.0.load(Ordering::Acquire) & HALT != 0
    }

    pub fn boost(&self) -> bool {
        self.0.load(Ordering::Acquire) & BOOST != 0
    }

    pub fn any_shutdown(&self) -> bool {
        self.0.load(Ordering::Acquire) & (STOP | HALT) != 0
    }

    pub fn set_stop(&self) {
        self.0.fetch_or(STOP, Ordering::Release);
    }

    pub fn set_halt(&self) {
        self.0.fetch_or(HALT, Ordering::Release);
    }

    pub fn set_boost(&self) {
        self.0.fetch_or(BOOST, Ordering::Release);
    }

    pub fn clear_boost(&self) {
        self.0.fetch_and(!BOOST, Ordering::Release);
    }
}
