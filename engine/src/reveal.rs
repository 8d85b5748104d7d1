//! Aggregates per-slot reveal signals into a one-shot "all revealed" gate.

use arcana_types::SlotLabel;

#[derive(Debug, Clone, Default)]
pub struct RevealTracker {
    revealed: [bool; 3],
    fired: bool,
}

impl RevealTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `slot` finished revealing.
    ///
    /// Returns `true` exactly once per cycle: on the call that makes all
    /// three slots revealed. Repeated signals are idempotent.
    pub fn mark(&mut self, slot: SlotLabel) -> bool {
        self.revealed[slot.index()] = true;
        if self.fired || !self.all_revealed() {
            return false;
        }
        self.fired = true;
        true
    }

    #[must_use]
    pub fn is_revealed(&self, slot: SlotLabel) -> bool {
        self.revealed[slot.index()]
    }

    #[must_use]
    pub fn all_revealed(&self) -> bool {
        self.revealed.iter().all(|revealed| *revealed)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
