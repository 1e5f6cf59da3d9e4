//! Text clipping for user-supplied strings

/// Longest nickname kept, in characters
pub const MAX_NICKNAME_CHARS: usize = 24;

/// Longest chat line kept, in characters
pub const MAX_CHAT_CHARS: usize = 128;

/// Clip `text` to at most `max` characters (not bytes)
pub fn clip(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
