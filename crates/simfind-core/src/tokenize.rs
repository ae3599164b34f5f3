//! Turns raw text into normalized terms.
//!
//! Only the first `excerpt_chars` characters of a text are tokenized. Large files
//! would otherwise dominate both cost and term weights.

/// Default number of characters read from the start of a document.
pub const DEFAULT_EXCERPT_CHARS: usize = 1000;

/// Returns the first `max_chars` characters of `text` (never splits a code point).
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Tokenize the excerpt of `text` into lowercase terms.
///
/// Anything that is not alphanumeric or `_` separates terms; leading and trailing
/// underscores are trimmed so `__init__` and `init` are the same term.
pub fn tokenize(text: &str, max_chars: usize) -> Vec<String> {
    excerpt(text, max_chars)
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(|raw| raw.trim_matches('_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        let terms = tokenize("Hello, World! fn main() { x.y = 3; }", 1000);
        assert_eq!(terms, ["hello", "world", "fn", "main", "x", "y", "3"]);
    }

    #[test]
    fn markup_noise_is_dropped() {
        let terms = tokenize("## Title\n\n- [link](http://a.b/c) **bold**", 1000);
        assert_eq!(terms, ["title", "link", "http", "a", "b", "c", "bold"]);
    }

    #[test]
    fn underscores_are_kept_inside_but_trimmed_outside() {
        assert_eq!(tokenize("__init__ snake_case _", 1000), ["init", "snake_case"]);
    }

    #[test]
    fn empty_and_whitespace_only_yield_nothing() {
        assert!(tokenize("", 1000).is_empty());
        assert!(tokenize("  \n\t ... ---", 1000).is_empty());
    }

    #[test]
    fn deterministic() {
        let text = "The quick brown fox; the lazy dog.";
        assert_eq!(tokenize(text, 1000), tokenize(text, 1000));
    }

    #[test]
    fn truncates_to_excerpt() {
        let text = format!("{} tail", "a ".repeat(600));
        let terms = tokenize(&text, 1000);
        assert_eq!(terms.len(), 500);
        assert!(!terms.contains(&"tail".to_string()));
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(excerpt(text, 2), "hé");
        assert_eq!(excerpt(text, 100), text);
        assert_eq!(excerpt(text, 0), "");
    }
}
