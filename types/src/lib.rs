//! Domain types shared by the Arcana engine, service, and CLI.
//!
//! Cards, slots, phases, and the reading request. No IO lives here.

#![allow(clippy::missing_errors_doc)]

mod card;
mod geometry;
mod ids;
mod phase;
mod request;
mod selection;

pub use card::Card;
pub use geometry::Rect;
pub use ids::CardId;
pub use phase::{InvalidTransition, Phase, PhaseEvent};
pub use request::{REQUIRED_FIELDS, RequestError, ThreeCardRequest};
pub use selection::{Selection, SelectionError, SlotEntry, SlotLabel};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Validated text
// ============================================================================

/// Text that is not blank after trimming. Card names and the model id use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("value must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EmptyStringError);
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Backend API key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(NonEmptyString);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Result<Self, EmptyStringError> {
        NonEmptyString::new(key.into().trim()).map(Self)
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.as_str()
    }
}

// ============================================================================
// Streaming Events
// ============================================================================

/// Streaming event from the text-generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text content delta.
    TextDelta(String),
    /// Stream completed.
    Done,
    /// Error occurred.
    Error(String),
}

impl StreamEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }
}
