//! Reading lifecycle state machine.
//!
//! ```text
//! Initial --EngineStarted--> Shuffling --ShuffleElapsed--> Selecting(Past)
//!
//! Selecting(Past) --CardCommitted(Past)--> Selecting(Present)
//! Selecting(Present) --CardCommitted(Present)--> Selecting(Future)
//! Selecting(Future) --CardCommitted(Future)--> Revealing
//!
//! Revealing --AllRevealed--> Consulting --ReadingDone--> Revealed
//!
//! <any> --Reset--> Initial
//! ```

use std::fmt;

use thiserror::Error;

use crate::SlotLabel;

/// The single active stage of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Initial,
    Shuffling,
    /// Waiting for a card to be committed to the given slot.
    Selecting(SlotLabel),
    Revealing,
    Consulting,
    Revealed,
}

/// Triggers from the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    EngineStarted,
    ShuffleElapsed,
    CardCommitted(SlotLabel),
    AllRevealed,
    ReadingDone,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no transition from {from} on {event:?}")]
pub struct InvalidTransition {
    pub from: Phase,
    pub event: PhaseEvent,
}

impl Phase {
    /// Apply `event`, returning the next phase.
    ///
    /// Every pair not listed in the table is an error; the caller keeps its
    /// current phase in that case.
    pub fn apply(self, event: PhaseEvent) -> Result<Phase, InvalidTransition> {
        let next = match (self, event) {
            (_, PhaseEvent::Reset) => Phase::Initial,
            (Phase::Initial, PhaseEvent::EngineStarted) => Phase::Shuffling,
            (Phase::Shuffling, PhaseEvent::ShuffleElapsed) => Phase::Selecting(SlotLabel::Past),
            (Phase::Selecting(expected), PhaseEvent::CardCommitted(slot)) if expected == slot => {
                slot.next().map_or(Phase::Revealing, Phase::Selecting)
            }
            (Phase::Revealing, PhaseEvent::AllRevealed) => Phase::Consulting,
            (Phase::Consulting, PhaseEvent::ReadingDone) => Phase::Revealed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }

    /// The slot a card activated in this phase would land in.
    #[must_use]
    pub const fn target_slot(self) -> Option<SlotLabel> {
        match self {
            Phase::Selecting(slot) => Some(slot),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_selecting(self) -> bool {
        matches!(self, Phase::Selecting(_))
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::Shuffling => "shuffling",
            Phase::Selecting(SlotLabel::Past) => "selectingPast",
            Phase::Selecting(SlotLabel::Present) => "selectingPresent",
            Phase::Selecting(SlotLabel::Future) => "selectingFuture",
            Phase::Revealing => "revealing",
            Phase::Consulting => "consulting",
            Phase::Revealed => "revealed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
