use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Card, CardId};

/// One of the three fixed spread positions, in pick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotLabel {
    Past,
    Present,
    Future,
}

impl SlotLabel {
    pub const ALL: [SlotLabel; 3] = [SlotLabel::Past, SlotLabel::Present, SlotLabel::Future];

    /// The slot picked after this one, `None` after `Future`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            SlotLabel::Past => Some(SlotLabel::Present),
            SlotLabel::Present => Some(SlotLabel::Future),
            SlotLabel::Future => None,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            SlotLabel::Past => 0,
            SlotLabel::Present => 1,
            SlotLabel::Future => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SlotLabel::Past => "past",
            SlotLabel::Present => "present",
            SlotLabel::Future => "future",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            SlotLabel::Past => "Past",
            SlotLabel::Present => "Present",
            SlotLabel::Future => "Future",
        }
    }
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A card committed to a slot together with its orientation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub card: Card,
    pub reversed: bool,
}

impl SlotEntry {
    #[must_use]
    pub fn orientation(&self) -> &'static str {
        if self.reversed { "Reversed" } else { "Upright" }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("slot {0} is already filled")]
    SlotOccupied(SlotLabel),
    #[error("card {0} is already selected")]
    DuplicateCard(CardId),
}

/// Slot assignments for one reading.
///
/// A card id occupies at most one slot, and a filled slot is never
/// overwritten. The only way to empty a slot is to replace the whole
/// `Selection` with a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    slots: [Option<SlotEntry>; 3],
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&mut self, slot: SlotLabel, entry: SlotEntry) -> Result<(), SelectionError> {
        if self.slots[slot.index()].is_some() {
            return Err(SelectionError::SlotOccupied(slot));
        }
        if self.contains(entry.card.id()) {
            return Err(SelectionError::DuplicateCard(entry.card.id()));
        }
        self.slots[slot.index()] = Some(entry);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, slot: SlotLabel) -> Option<&SlotEntry> {
        self.slots[slot.index()].as_ref()
    }

    #[must_use]
    pub fn contains(&self, id: CardId) -> bool {
        self.slots.iter().flatten().any(|entry| entry.card.id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Filled slots in spread order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotLabel, &SlotEntry)> {
        SlotLabel::ALL
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|entry| (slot, entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::{Selection, SelectionError, SlotEntry, SlotLabel};
    use crate::{Card, CardId, NonEmptyString};
    use proptest::prelude::{any, prop, prop_assert, prop_assert_eq, proptest};

    fn entry(id: u16, reversed: bool) -> SlotEntry {
        let name = NonEmptyString::new(format!("Card {id}")).unwrap();
        SlotEntry {
            card: Card::new(CardId::new(id), name, "front.jpg", "back.png"),
            reversed,
        }
    }

    #[test]
    fn slot_order_is_past_present_future() {
        assert_eq!(SlotLabel::Past.next(), Some(SlotLabel::Present));
        assert_eq!(SlotLabel::Present.next(), Some(SlotLabel::Future));
        assert_eq!(SlotLabel::Future.next(), None);
    }

    #[test]
    fn commit_fills_slot() {
        let mut selection = Selection::new();
        selection.commit(SlotLabel::Past, entry(4, true)).unwrap();

        assert_eq!(selection.len(), 1);
        assert!(selection.contains(CardId::new(4)));
        assert!(selection.get(SlotLabel::Past).unwrap().reversed);
        assert!(selection.get(SlotLabel::Present).is_none());
    }

    #[test]
    fn filled_slot_is_never_overwritten() {
        let mut selection = Selection::new();
        selection.commit(SlotLabel::Past, entry(4, false)).unwrap();

        let err = selection.commit(SlotLabel::Past, entry(5, true)).unwrap_err();
        assert_eq!(err, SelectionError::SlotOccupied(SlotLabel::Past));
        assert_eq!(selection.get(SlotLabel::Past).unwrap().card.id(), CardId::new(4));
    }

    #[test]
    fn duplicate_card_is_rejected() {
        let mut selection = Selection::new();
        selection.commit(SlotLabel::Past, entry(9, false)).unwrap();

        let err = selection
            .commit(SlotLabel::Present, entry(9, false))
            .unwrap_err();
        assert_eq!(err, SelectionError::DuplicateCard(CardId::new(9)));
        assert!(selection.get(SlotLabel::Present).is_none());
    }

    #[test]
    fn iter_yields_spread_order() {
        let mut selection = Selection::new();
        selection.commit(SlotLabel::Future, entry(3, false)).unwrap();
        selection.commit(SlotLabel::Past, entry(1, false)).unwrap();
        selection.commit(SlotLabel::Present, entry(2, false)).unwrap();

        let order: Vec<_> = selection.iter().map(|(slot, _)| slot).collect();
        assert_eq!(order, SlotLabel::ALL);
        assert!(selection.is_complete());
    }

    #[test]
    fn orientation_labels() {
        assert_eq!(entry(0, true).orientation(), "Reversed");
        assert_eq!(entry(0, false).orientation(), "Upright");
    }

    proptest! {
        #[test]
        fn committed_ids_stay_distinct(
            attempts in prop::collection::vec((0usize..3, 0u16..6, any::<bool>()), 0..20)
        ) {
            let mut selection = Selection::new();
            for (slot, id, reversed) in attempts {
                let before = selection.clone();
                let slot = SlotLabel::ALL[slot];
                if selection.commit(slot, entry(id, reversed)).is_err() {
                    prop_assert_eq!(&selection, &before);
                }
            }

            let ids: Vec<CardId> = selection.iter().map(|(_, e)| e.card.id()).collect();
            for (i, id) in ids.iter().enumerate() {
                prop_assert!(!ids[i + 1..].contains(id));
            }
        }
    }
}
