//! The single in-flight hand-off of a card from the fan to a slot.

use std::time::Duration;

use arcana_types::{Card, CardId, Rect, SlotLabel};

use crate::animation::EffectTimer;

pub const DEFAULT_TRANSFER_DURATION: Duration = Duration::from_millis(1000);

/// Animates between two geometry snapshots taken at activation.
///
/// Neither endpoint is recomputed while the job is live.
#[derive(Debug, Clone)]
pub struct TransferJob {
    card: Card,
    slot: SlotLabel,
    origin: Rect,
    destination: Rect,
    timer: EffectTimer,
}

impl TransferJob {
    #[must_use]
    pub fn new(
        card: Card,
        slot: SlotLabel,
        origin: Rect,
        destination: Rect,
        duration: Duration,
    ) -> Self {
        Self {
            card,
            slot,
            origin,
            destination,
            timer: EffectTimer::new(duration),
        }
    }

    #[must_use]
    pub fn card(&self) -> &Card {
        &self.card
    }

    #[must_use]
    pub fn card_id(&self) -> CardId {
        self.card.id()
    }

    #[must_use]
    pub const fn slot(&self) -> SlotLabel {
        self.slot
    }

    #[must_use]
    pub const fn origin(&self) -> Rect {
        self.origin
    }

    #[must_use]
    pub const fn destination(&self) -> Rect {
        self.destination
    }

    pub(crate) fn advance(&mut self, delta: Duration) {
        self.timer.advance(delta);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.timer.is_finished()
    }

    /// Normalized progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        self.timer.progress()
    }

    /// Where the card is drawn right now.
    #[must_use]
    pub fn current_geometry(&self) -> Rect {
        self.origin.lerp(self.destination, self.progress())
    }

    pub(crate) fn into_card(self) -> (Card, SlotLabel) {
        (self.card, self.slot)
    }
}
