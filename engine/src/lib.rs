//! The reading interaction engine.
//!
//! [`Engine`] composes the fan physics, the phase state machine, the transfer
//! orchestrator, the reveal tracker and the reading consumer. The host calls it
//! from a single event loop: pointer events, card activations, reveal signals,
//! and a per-frame [`Engine::tick`]. The only asynchronous work is the reading
//! request, which runs on a background task and is folded in by `tick`.
//!
//! All per-reading state lives in one `Simulation` value, so a reset is a
//! single replacement.

mod animation;
mod config;
pub mod deck;
pub mod fan;
pub mod layout;
pub mod reading;
mod reveal;
mod transfer;

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

pub use animation::EffectTimer;
pub use arcana_types::{
    Card, CardId, Phase, PhaseEvent, Rect, Selection, SlotEntry, SlotLabel, ThreeCardRequest,
};
pub use config::{DEFAULT_SHUFFLE_DURATION, EngineConfig};
pub use fan::{FanController, FlingTick};
pub use layout::FanLayout;
pub use reading::{ActiveReading, ReadingClient, ReadingStatus, ReadingStream};
pub use reveal::RevealTracker;
pub use transfer::TransferJob;

/// Why a card activation was refused. State is unchanged in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActivationRejected {
    #[error("cards cannot be picked while {0}")]
    WrongPhase(Phase),
    #[error("shuffle still running")]
    Shuffling,
    #[error("a question is required before picking cards")]
    QuestionRequired,
    #[error("a card is already moving to its slot")]
    TransferInFlight,
    #[error("card {0} is already selected")]
    AlreadySelected(CardId),
    #[error("card {0} is not in the deck")]
    UnknownCard(CardId),
}

/// Everything that belongs to one reading.
#[derive(Debug)]
struct Simulation {
    phase: Phase,
    deck: Vec<Card>,
    selection: Selection,
    fan: FanController,
    shuffle: Option<EffectTimer>,
    transfer: Option<TransferJob>,
    reveal: RevealTracker,
    reading: Option<ActiveReading>,
}

impl Simulation {
    fn new(deck: Vec<Card>, radius: f64, min_velocity: f64) -> Self {
        Self {
            phase: Phase::Initial,
            deck,
            selection: Selection::new(),
            fan: FanController::new(radius, min_velocity),
            shuffle: None,
            transfer: None,
            reveal: RevealTracker::new(),
            reading: None,
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    layout: FanLayout,
    client: ReadingClient,
    rng: StdRng,
    question: String,
    sim: Simulation,
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig, layout: FanLayout, client: ReadingClient) -> Self {
        let sim = Simulation::new(
            deck::canonical_deck(),
            layout.radius(),
            config.fling_min_velocity,
        );
        Self {
            config,
            layout,
            client,
            rng: StdRng::from_os_rng(),
            question: String::new(),
            sim,
        }
    }

    /// Replace the random source used for shuffling and orientation.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.sim.phase
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> &FanLayout {
        &self.layout
    }

    #[must_use]
    pub fn deck(&self) -> &[Card] {
        &self.sim.deck
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.sim.selection
    }

    #[must_use]
    pub fn fan(&self) -> &FanController {
        &self.sim.fan
    }

    #[must_use]
    pub fn transfer(&self) -> Option<&TransferJob> {
        self.sim.transfer.as_ref()
    }

    #[must_use]
    pub fn reveal(&self) -> &RevealTracker {
        &self.sim.reveal
    }

    #[must_use]
    pub fn reading(&self) -> Option<&ReadingStream> {
        self.sim.reading.as_ref().map(ActiveReading::stream)
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn is_shuffling(&self) -> bool {
        self.sim.shuffle.is_some()
    }

    /// The card currently travelling to its slot is not drawn in the fan.
    #[must_use]
    pub fn is_card_hidden(&self, id: CardId) -> bool {
        self.sim
            .transfer
            .as_ref()
            .is_some_and(|job| job.card_id() == id)
    }

    #[must_use]
    pub fn is_card_chosen(&self, id: CardId) -> bool {
        self.sim.selection.contains(id)
    }

    /// Fan drag and card picks are accepted only when this holds.
    #[must_use]
    pub fn interaction_allowed(&self) -> bool {
        self.interaction_block().is_none()
    }

    fn interaction_block(&self) -> Option<ActivationRejected> {
        if !self.sim.phase.is_selecting() {
            return Some(ActivationRejected::WrongPhase(self.sim.phase));
        }
        if self.sim.shuffle.is_some() {
            return Some(ActivationRejected::Shuffling);
        }
        if self.sim.transfer.is_some() {
            return Some(ActivationRejected::TransferInFlight);
        }
        if self.config.require_question && self.question.trim().is_empty() {
            return Some(ActivationRejected::QuestionRequired);
        }
        None
    }

    /// On-fan geometry of a card under the current rotation.
    #[must_use]
    pub fn fan_card_geometry(&self, id: CardId) -> Option<Rect> {
        let index = self.deck_index(id)?;
        Some(self.layout.card_geometry(index, self.sim.fan.angle()))
    }

    /// The unchosen card nearest the top of the arc.
    #[must_use]
    pub fn card_at_top(&self) -> Option<&Card> {
        let rotation = self.sim.fan.angle();
        let distance = |index: usize| self.layout.angle_from_top(index, rotation);
        self.sim
            .deck
            .iter()
            .enumerate()
            .filter(|(_, card)| !self.sim.selection.contains(card.id()))
            .min_by(|(a, _), (b, _)| distance(*a).total_cmp(&distance(*b)))
            .map(|(_, card)| card)
    }

    fn deck_index(&self, id: CardId) -> Option<usize> {
        self.sim.deck.iter().position(|card| card.id() == id)
    }

    // ========================================================================
    // Setup
    // ========================================================================

    pub fn set_question(&mut self, question: impl Into<String>) {
        self.question = question.into();
    }

    /// Recompute layout for a new viewport. Fan rotation is kept.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.layout = FanLayout::for_viewport(width, height);
        self.sim.fan.set_radius(self.layout.radius());
    }

    fn transition(&mut self, event: PhaseEvent) -> bool {
        match self.sim.phase.apply(event) {
            Ok(next) => {
                tracing::debug!(from = %self.sim.phase, to = %next, ?event, "Phase transition");
                self.sim.phase = next;
                true
            }
            Err(e) => {
                tracing::debug!("Ignoring event: {e}");
                false
            }
        }
    }

    /// Begin a reading: shuffle the deck and start the shuffle timer.
    pub fn start(&mut self) -> bool {
        if !self.transition(PhaseEvent::EngineStarted) {
            return false;
        }
        deck::shuffle(&mut self.sim.deck, &mut self.rng);
        self.sim.fan.reset_rotation();
        self.sim.shuffle = Some(EffectTimer::new(self.config.shuffle_duration));
        true
    }

    /// Discard the current reading and return to `Initial`.
    ///
    /// An in-flight reading is cancelled and returned so callers can observe
    /// the cancel point.
    pub fn reset(&mut self) -> Option<ReadingStream> {
        let cancelled = self.sim.reading.take().map(|mut reading| {
            reading.cancel();
            reading.into_stream()
        });

        tracing::debug!(from = %self.sim.phase, "Reading reset");
        self.sim = Simulation::new(
            deck::canonical_deck(),
            self.layout.radius(),
            self.config.fling_min_velocity,
        );
        cancelled
    }

    // ========================================================================
    // Frame clock
    // ========================================================================

    /// Advance timers by `delta`, run one fling tick, and fold in any reading
    /// events. Returns `true` while something is still animating or streaming.
    pub fn tick(&mut self, delta: Duration) -> bool {
        self.advance_shuffle(delta);
        self.advance_transfer(delta);
        self.fling_step();
        self.process_reading_events();
        self.is_busy()
    }

    fn is_busy(&self) -> bool {
        self.sim.shuffle.is_some()
            || self.sim.transfer.is_some()
            || self.sim.fan.is_flinging()
            || self
                .sim
                .reading
                .as_ref()
                .is_some_and(|reading| !reading.stream().is_terminal())
    }

    fn advance_shuffle(&mut self, delta: Duration) {
        let Some(timer) = self.sim.shuffle.as_mut() else {
            return;
        };
        timer.advance(delta);
        if timer.is_finished() {
            self.sim.shuffle = None;
            self.transition(PhaseEvent::ShuffleElapsed);
        }
    }

    fn advance_transfer(&mut self, delta: Duration) {
        let Some(job) = self.sim.transfer.as_mut() else {
            return;
        };
        job.advance(delta);
        if job.is_finished()
            && let Some(job) = self.sim.transfer.take()
        {
            self.commit_transfer(job);
        }
    }

    /// One fling integration step; also driven by [`Engine::tick`].
    pub fn fling_step(&mut self) -> FlingTick {
        self.sim.fan.fling_step()
    }

    // ========================================================================
    // Fan input
    // ========================================================================

    /// Returns `false` when interaction is not allowed.
    pub fn begin_drag(&mut self, pointer_x: f64, now: Instant) -> bool {
        if let Some(reason) = self.interaction_block() {
            tracing::debug!(%reason, "Drag rejected");
            return false;
        }
        self.sim.fan.begin_drag(pointer_x, now);
        true
    }

    /// Ignored while interaction is blocked.
    pub fn continue_drag(&mut self, pointer_x: f64, now: Instant) {
        if self.interaction_block().is_some() {
            return;
        }
        self.sim.fan.continue_drag(pointer_x, now);
    }

    /// Returns `true` if the release started a fling. A release while
    /// interaction is blocked ends the drag where it is.
    pub fn end_drag(&mut self) -> bool {
        if self.interaction_block().is_some() {
            self.sim.fan.cancel_drag();
            return false;
        }
        self.sim.fan.end_drag()
    }

    // ========================================================================
    // Card transfer
    // ========================================================================

    /// Start moving `id` from its fan position to the slot for the current phase.
    ///
    /// Both geometries are snapshots; the animation runs between them for the
    /// configured transfer duration and commits when [`Engine::tick`] sees it
    /// finish.
    pub fn activate_card(
        &mut self,
        id: CardId,
        origin: Rect,
        destination: Rect,
    ) -> Result<(), ActivationRejected> {
        let result = self.try_activate(id, origin, destination);
        if let Err(reason) = &result {
            tracing::debug!(%reason, card = %id, "Card activation rejected");
        }
        result
    }

    fn try_activate(
        &mut self,
        id: CardId,
        origin: Rect,
        destination: Rect,
    ) -> Result<(), ActivationRejected> {
        if let Some(reason) = self.interaction_block() {
            return Err(reason);
        }
        let slot = self
            .sim
            .phase
            .target_slot()
            .ok_or(ActivationRejected::WrongPhase(self.sim.phase))?;
        if self.sim.selection.contains(id) {
            return Err(ActivationRejected::AlreadySelected(id));
        }
        let card = self
            .deck_index(id)
            .and_then(|index| self.sim.deck.get(index))
            .cloned()
            .ok_or(ActivationRejected::UnknownCard(id))?;

        self.sim.fan.cancel_drag();
        self.sim.transfer = Some(TransferJob::new(
            card,
            slot,
            origin,
            destination,
            self.config.transfer_duration,
        ));
        Ok(())
    }

    /// Write the selection and advance the phase in one step.
    fn commit_transfer(&mut self, job: TransferJob) {
        let (card, slot) = job.into_card();
        let id = card.id();
        let reversed = self.rng.random_bool(0.5);

        if let Err(e) = self
            .sim
            .selection
            .commit(slot, SlotEntry { card, reversed })
        {
            tracing::warn!("Dropping transfer of card {id}: {e}");
            return;
        }
        tracing::debug!(card = %id, %slot, reversed, "Card committed");

        if self.transition(PhaseEvent::CardCommitted(slot)) && self.sim.phase == Phase::Revealing {
            self.sim.reveal.reset();
        }
    }

    // ========================================================================
    // Reveal and reading
    // ========================================================================

    /// Record that a slot's reveal finished. Returns `true` on the signal that
    /// completes the set, which also starts the reading request.
    pub fn slot_revealed(&mut self, slot: SlotLabel) -> bool {
        if self.sim.phase != Phase::Revealing {
            tracing::debug!(%slot, phase = %self.sim.phase, "Reveal signal ignored");
            return false;
        }
        if !self.sim.reveal.mark(slot) {
            return false;
        }
        if !self.transition(PhaseEvent::AllRevealed) {
            return false;
        }
        self.start_reading();
        true
    }

    fn start_reading(&mut self) {
        let reading = match ThreeCardRequest::from_selection(&self.question, &self.sim.selection)
        {
            Some(request) => self.client.start(request),
            None => ActiveReading::failed("selection incomplete"),
        };
        self.sim.reading = Some(reading);
        self.after_reading_update();
    }

    /// Fold queued reading events into the stream.
    pub fn process_reading_events(&mut self) {
        let changed = self
            .sim
            .reading
            .as_mut()
            .is_some_and(ActiveReading::poll);
        if changed {
            self.after_reading_update();
        }
    }

    /// Wait for the next reading event and fold it in.
    pub async fn wait_for_reading(&mut self) {
        let Some(reading) = self.sim.reading.as_mut() else {
            return;
        };
        reading.next_event().await;
        self.after_reading_update();
    }

    fn after_reading_update(&mut self) {
        let done = self
            .sim
            .reading
            .as_ref()
            .is_some_and(|reading| *reading.stream().status() == ReadingStatus::Done);
        if done && self.sim.phase == Phase::Consulting {
            self.transition(PhaseEvent::ReadingDone);
        }
    }
}
