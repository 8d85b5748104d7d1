use arcana_types::{SlotLabel, ThreeCardRequest};

/// Reader persona and answer structure.
pub const SYSTEM_INSTRUCTION: &str = "\
You are a professional tarot reader with 30+ years experience. Analyze this 3-card spread:
1. Consider both card meaning and position
2. Provide insights in natural, conversational language
3. Use markdown formatting for emphasis
4. Maintain cultural sensitivity
5. Include practical advice based on the reading

Respond in the user's preferred language. Structure your analysis with:
- Past Interpretation
- Present Situation
- Future Outlook
- Overall Guidance";

const fn orientation(reversed: bool) -> &'static str {
    if reversed { "Reversed" } else { "Upright" }
}

#[must_use]
pub fn build_prompt(request: &ThreeCardRequest) -> String {
    let mut prompt = format!(
        "**Professional Tarot Reading Request**\nQuestion: {}\n\nCard Spread Analysis:",
        request.question.trim()
    );
    for slot in SlotLabel::ALL {
        let (card, reversed) = request.card(slot);
        prompt.push_str(&format!(
            "\n- {}: {} ({})",
            slot.title(),
            card.trim(),
            orientation(reversed)
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::{SYSTEM_INSTRUCTION, ThreeCardRequest, build_prompt};

    #[test]
    fn prompt_lists_cards_with_orientation() {
        let request = ThreeCardRequest {
            question: " Should I move? ".into(),
            past: "3. The Empress".into(),
            present: "Five of Swords".into(),
            future: "19. The Sun".into(),
            past_reverse: false,
            present_reverse: true,
            future_reverse: false,
        };
        assert_eq!(
            build_prompt(&request),
            "**Professional Tarot Reading Request**\n\
             Question: Should I move?\n\n\
             Card Spread Analysis:\n\
             - Past: 3. The Empress (Upright)\n\
             - Present: Five of Swords (Reversed)\n\
             - Future: 19. The Sun (Upright)"
        );
    }

    #[test]
    fn instruction_names_all_sections() {
        for section in [
            "Past Interpretation",
            "Present Situation",
            "Future Outlook",
            "Overall Guidance",
        ] {
            assert!(SYSTEM_INSTRUCTION.contains(section));
        }
    }
}
