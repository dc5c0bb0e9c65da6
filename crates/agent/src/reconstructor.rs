//! Restores word spacing in streamed model output.
//!
//! Providers emit fragments that do not line up with word boundaries, and
//! SSE transports trim whitespace from each event. The reconstructor trims
//! every fragment itself, then puts back a single leading space unless the
//! fragment is the first one or starts with punctuation or a CJK character.

use serde::{Deserialize, Serialize};

/// Characters that never get a space in front of them.
const NO_SPACE_BEFORE: &str = ".,;:!?，。；：！？、\"'()[]{}《》【】";

/// One piece of reconstructed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub text: String,
    /// Whether this is the first chunk of the response.
    pub first: bool,
}

#[derive(Debug, Clone)]
pub struct StreamReconstructor {
    is_first: bool,
}

impl StreamReconstructor {
    pub fn new() -> Self {
        Self { is_first: true }
    }

    /// Feed one raw fragment. Returns `None` when the fragment is blank.
    pub fn push(&mut self, fragment: &str) -> Option<StreamChunk> {
        let trimmed = fragment.trim();
        let first_char = trimmed.chars().next()?;

        if self.is_first {
            self.is_first = false;
            return Some(StreamChunk {
                text: trimmed.to_string(),
                first: true,
            });
        }

        let text = if is_punctuation(first_char) || is_cjk(first_char) {
            trimmed.to_string()
        } else {
            format!(" {trimmed}")
        };
        Some(StreamChunk { text, first: false })
    }

    /// Whether no chunk has been emitted yet.
    pub fn is_first(&self) -> bool {
        self.is_first
    }
}

impl Default for StreamReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_punctuation(c: char) -> bool {
    NO_SPACE_BEFORE.contains(c)
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x309F      // Hiragana
        | 0x30A0..=0x30FF    // Katakana
        | 0x3400..=0x4DBF    // CJK Extension A
        | 0x4E00..=0x9FFF    // CJK Unified Ideographs
        | 0xAC00..=0xD7AF    // Hangul Syllables
        | 0xF900..=0xFAFF    // CJK Compatibility Ideographs
        | 0x20000..=0x2A6DF  // CJK Extension B
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fragments: &[&str]) -> Vec<String> {
        let mut r = StreamReconstructor::new();
        fragments
            .iter()
            .filter_map(|f| r.push(f))
            .map(|c| c.text)
            .collect()
    }

    #[test]
    fn latin_words_get_spaces() {
        assert_eq!(run(&["Hello", "world"]), vec!["Hello", " world"]);
    }

    #[test]
    fn cjk_and_cjk_punctuation_stay_tight() {
        assert_eq!(run(&["你好", "，世界"]), vec!["你好", "，世界"]);
        assert_eq!(run(&["こんにちは", "世界", "안녕"]), vec!["こんにちは", "世界", "안녕"]);
    }

    #[test]
    fn empty_fragments_are_dropped() {
        assert_eq!(run(&["", "ok"]), vec!["ok"]);
        assert_eq!(run(&["  ", "\n", "a", " ", "b"]), vec!["a", " b"]);
    }

    #[test]
    fn fragments_are_trimmed() {
        assert_eq!(run(&["  Hello ", " world  ", "!"]), vec!["Hello", " world", "!"]);
    }

    #[test]
    fn latin_punctuation_has_no_leading_space() {
        assert_eq!(
            run(&["Use", "Rust", ".", "It", "(mostly)", "works", "?"]),
            vec!["Use", " Rust", ".", " It", "(mostly)", " works", "?"]
        );
    }

    #[test]
    fn first_flag_is_set_only_once() {
        let mut r = StreamReconstructor::new();
        assert!(r.push("").is_none());
        assert!(r.is_first());
        let first = r.push("A").unwrap();
        assert!(first.first);
        let second = r.push("B").unwrap();
        assert!(!second.first);
        assert!(!r.is_first());
    }

    #[test]
    fn first_fragment_is_unchanged_even_if_punctuation() {
        assert_eq!(run(&["，开始", "next"]), vec!["，开始", " next"]);
    }
}
