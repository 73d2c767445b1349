//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, rounded up.
//! The compiler only relies on two properties of the estimate: the same text
//! always gives the same count, and a longer text never gives a smaller one.

use mnemo_core::Message;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Structural cost of one message (role, delimiters) in the API wire format.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate tokens for a message sequence including per-message overhead.
pub fn estimate_message_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| MESSAGE_OVERHEAD_TOKENS + estimate_tokens(&m.content))
        .sum()
}

/// The longest prefix of `text` holding at most `max_chars` characters.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
