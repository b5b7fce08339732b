//! LLM provider implementations.
//!
//! - [`OpenAiProvider`]: function-calling native, near pass-through.
//! - [`GeminiProvider`]: content/parts protocol with function call and
//!   function response parts.
//! - [`AnthropicProvider`]: typed content blocks with `tool_use` and
//!   `tool_result`, strict role alternation.

mod anthropic;
mod gemini;
mod http;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Folds adjacent turns that share a role into one turn.
///
/// `role` reads a turn's role; `absorb` appends the second turn's content
/// to the first. Order is preserved.
pub(crate) fn merge_adjacent<T>(
    turns: Vec<T>,
    role: impl Fn(&T) -> &str,
    mut absorb: impl FnMut(&mut T, T),
) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(turns.len());
    for turn in turns {
        match merged.last_mut() {
            Some(last) if role(last) == role(&turn) => absorb(last, turn),
            _ => merged.push(turn),
        }
    }
    merged
}
