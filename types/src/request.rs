//! Wire type for the three-card reading request and its validation rules.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{Selection, SlotLabel};

/// Every field the reading endpoint requires, in the order errors list them.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "question",
    "past",
    "present",
    "future",
    "past_reverse",
    "present_reverse",
    "future_reverse",
];

const STRING_FIELDS: [&str; 4] = ["question", "past", "present", "future"];
const BOOLEAN_FIELDS: [&str; 3] = ["past_reverse", "present_reverse", "future_reverse"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeCardRequest {
    pub question: String,
    pub past: String,
    pub present: String,
    pub future: String,
    pub past_reverse: bool,
    pub present_reverse: bool,
    pub future_reverse: bool,
}

/// Why a request body was refused. `Display` is the exact client-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Invalid JSON body")]
    InvalidJson,
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid fields: {}", .0.join(", "))]
    InvalidFields(Vec<String>),
}

impl ThreeCardRequest {
    /// Build the request for a completed selection. `None` until all three
    /// slots are filled.
    #[must_use]
    pub fn from_selection(question: &str, selection: &Selection) -> Option<Self> {
        let past = selection.get(SlotLabel::Past)?;
        let present = selection.get(SlotLabel::Present)?;
        let future = selection.get(SlotLabel::Future)?;
        Some(Self {
            question: question.to_string(),
            past: past.card.display_name().to_string(),
            present: present.card.display_name().to_string(),
            future: future.card.display_name().to_string(),
            past_reverse: past.reversed,
            present_reverse: present.reversed,
            future_reverse: future.reversed,
        })
    }

    /// Parse and validate a raw request body.
    pub fn from_body(body: &[u8]) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| RequestError::InvalidJson)?;
        Self::from_value(&value)
    }

    /// Validate a decoded JSON body.
    ///
    /// Missing fields are reported first and alone. Only when every field is
    /// present are type and emptiness problems collected, strings before
    /// booleans.
    pub fn from_value(value: &Value) -> Result<Self, RequestError> {
        let Value::Object(body) = value else {
            return Err(RequestError::InvalidJson);
        };

        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .into_iter()
            .filter(|field| !body.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(RequestError::MissingFields(missing));
        }

        let mut errors: Vec<String> = STRING_FIELDS
            .into_iter()
            .filter(|field| non_empty_str(body, field).is_none())
            .map(|field| format!("{field} must be a non-empty string"))
            .collect();
        errors.extend(
            BOOLEAN_FIELDS
                .into_iter()
                .filter(|field| !body.get(*field).is_some_and(Value::is_boolean))
                .map(|field| format!("{field} must be a boolean")),
        );
        if !errors.is_empty() {
            return Err(RequestError::InvalidFields(errors));
        }

        let text = |field: &str| non_empty_str(body, field).unwrap_or_default().to_string();
        let flag = |field: &str| body.get(field).and_then(Value::as_bool).unwrap_or_default();
        Ok(Self {
            question: text("question"),
            past: text("past"),
            present: text("present"),
            future: text("future"),
            past_reverse: flag("past_reverse"),
            present_reverse: flag("present_reverse"),
            future_reverse: flag("future_reverse"),
        })
    }

    /// Card name and orientation for `slot`.
    #[must_use]
    pub fn card(&self, slot: SlotLabel) -> (&str, bool) {
        match slot {
            SlotLabel::Past => (&self.past, self.past_reverse),
            SlotLabel::Present => (&self.present, self.present_reverse),
            SlotLabel::Future => (&self.future, self.future_reverse),
        }
    }
}

fn non_empty_str<'a>(body: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
