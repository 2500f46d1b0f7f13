//! Prompt construction for the chat-completions call.

use crate::glossary::{glossary_prompt, language_instructions};

const GUIDELINES: &str = "Translation Guidelines:
- Maintain the speaker's tone and emotion
- Keep proper names and biblical references accurate
- Preserve emphasis and rhetorical devices
- Ensure natural flow in the target language
- DO NOT add explanations or notes
- Return ONLY the translated text";

/// System instruction: role, register rules, glossary, guidelines.
pub fn system_prompt(language: &str) -> String {
    format!(
        "You are a professional translator specializing in Christian sermon content.\n{}\n\n{}\n\n{GUIDELINES}",
        language_instructions(language),
        glossary_prompt(language),
    )
}

/// User message: prior sentences as grounding, then the text to translate.
pub fn user_prompt(text: &str, language: &str, context: &[String]) -> String {
    let context_block = if context.is_empty() {
        String::new()
    } else {
        format!("Previous context:\n{}\n\n", context.join("\n"))
    };
    format!("{context_block}Translate the following text to {language}:\n\"{text}\"")
}

/// Token cap for a completion: half again the source length plus headroom.
pub fn max_tokens(text: &str) -> u32 {
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX / 2);
    chars.saturating_add(chars.div_ceil(2)).saturating_add(100)
}
