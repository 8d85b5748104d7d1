use serde::{Deserialize, Serialize};

use crate::{CardId, NonEmptyString};

/// An immutable catalog entry.
///
/// The engine only ever looks at `id` (identity) and `display_name` (what gets
/// sent to the reading service). Artwork references are carried through for
/// renderers and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    id: CardId,
    display_name: NonEmptyString,
    front_ref: String,
    back_ref: String,
}

impl Card {
    #[must_use]
    pub fn new(
        id: CardId,
        display_name: NonEmptyString,
        front_ref: impl Into<String>,
        back_ref: impl Into<String>,
    ) -> Self {
        Self {
            id,
            display_name,
            front_ref: front_ref.into(),
            back_ref: back_ref.into(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> CardId {
        self.id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    #[must_use]
    pub fn front_ref(&self) -> &str {
        &self.front_ref
    }

    #[must_use]
    pub fn back_ref(&self) -> &str {
        &self.back_ref
    }
}
