//! The reference 78-card deck and per-reading shuffle.
//!
//! Ids are catalog positions: `0..22` the major arcana, then Cups, Pentacles,
//! Swords and Wands, fourteen cards each.

use arcana_types::{Card, CardId, NonEmptyString};
use rand::Rng;
use rand::seq::SliceRandom;

pub const DECK_SIZE: usize = 78;
pub const BACK_REF: &str = "/tarot/_cover.png";

const MAJOR_ARCANA: [&str; 22] = [
    "The Fool",
    "The Magician",
    "The High Priestess",
    "The Empress",
    "The Emperor",
    "The Hierophant",
    "The Lovers",
    "The Chariot",
    "Strength",
    "The Hermit",
    "The Wheel of Fortune",
    "Justice",
    "The Hanged Man",
    "Death",
    "Temperance",
    "The Devil",
    "The Tower",
    "The Star",
    "The Moon",
    "The Sun",
    "Judgement",
    "The World",
];

/// (suit name, artwork prefix)
const SUITS: [(&str, &str); 4] = [
    ("Cups", "cu"),
    ("Pentacles", "pe"),
    ("Swords", "sw"),
    ("Wands", "wa"),
];

/// (rank name, artwork suffix), in catalog order.
const RANKS: [(&str, &str); 14] = [
    ("Two", "02"),
    ("Three", "03"),
    ("Four", "04"),
    ("Five", "05"),
    ("Six", "06"),
    ("Seven", "07"),
    ("Eight", "08"),
    ("Nine", "09"),
    ("Ten", "10"),
    ("Ace", "ac"),
    ("King", "ki"),
    ("Knight", "kn"),
    ("Page", "pa"),
    ("Queen", "qu"),
];

fn card(id: usize, name: String, artwork: &str) -> Option<Card> {
    let display_name = NonEmptyString::new(name).ok()?;
    let id = CardId::new(u16::try_from(id).ok()?);
    Some(Card::new(
        id,
        display_name,
        format!("/tarot/{artwork}.jpg"),
        BACK_REF,
    ))
}

/// The catalog in canonical order.
#[must_use]
pub fn canonical_deck() -> Vec<Card> {
    let majors = MAJOR_ARCANA
        .iter()
        .enumerate()
        .map(|(number, name)| (format!("{number}. {name}"), format!("ar{number:02}")));

    let minors = SUITS.iter().flat_map(|(suit, prefix)| {
        RANKS
            .iter()
            .map(move |(rank, suffix)| (format!("{rank} of {suit}"), format!("{prefix}{suffix}")))
    });

    majors
        .chain(minors)
        .enumerate()
        .filter_map(|(id, (name, artwork))| card(id, name, &artwork))
        .collect()
}

/// Uniformly permute `cards` in place (Fisher-Yates).
pub fn shuffle<R: Rng + ?Sized>(cards: &mut [Card], rng: &mut R) {
    cards.shuffle(rng);
}

/// A fresh shuffled ordering of the canonical deck.
#[must_use]
pub fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = canonical_deck();
    shuffle(&mut deck, rng);
    deck
}
