//! Typed SSE payloads for the generation backend.

pub mod gemini {
    use serde::Deserialize;

    /// Top-level Gemini SSE response.
    ///
    /// Gemini doesn't use event types. Each SSE chunk is a complete response
    /// object with candidates.
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Response {
        pub candidates: Option<Vec<Candidate>>,
        pub error: Option<ErrorInfo>,
        pub prompt_feedback: Option<PromptFeedback>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Candidate {
        pub content: Option<Content>,
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Content {
        pub parts: Option<Vec<Part>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Part {
        pub text: Option<String>,
        /// Reasoning content; never part of the reading.
        #[serde(default)]
        pub thought: bool,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PromptFeedback {
        pub block_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorInfo {
        pub message: Option<String>,
        pub code: Option<i32>,
    }

    impl ErrorInfo {
        #[must_use]
        pub fn message_or_default(&self) -> &str {
            self.message.as_deref().unwrap_or("Unknown error")
        }
    }

    /// What a candidate's `finishReason` means for the reading.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FinishKind {
        /// The reading ended normally; a token cap still counts as an ending.
        Complete,
        /// The backend stopped and the reader should see why.
        Withheld(&'static str),
        /// A reason this client does not know; the stream keeps going.
        Unrecognized,
    }

    #[must_use]
    pub fn classify_finish(reason: &str) -> FinishKind {
        match reason {
            "STOP" | "MAX_TOKENS" => FinishKind::Complete,
            "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
                FinishKind::Withheld("Reading withheld by content filters")
            }
            "RECITATION" => FinishKind::Withheld("Reading withheld: recitation"),
            "LANGUAGE" => FinishKind::Withheld("The question's language is not supported"),
            "OTHER" => FinishKind::Withheld("Reading stopped for an unknown reason"),
            _ => FinishKind::Unrecognized,
        }
    }

}
