//! Paragraph-aware document splitting.
//!
//! Chunks hold at most `max_chars` characters. Paragraphs (separated by a
//! blank line) are packed together while they fit; when a chunk is closed the
//! next one starts with up to `overlap` trailing characters of it. A single
//! paragraph longer than `max_chars` is cut into fixed windows that step by
//! `max_chars - overlap`.

/// Splits text into overlapping, paragraph-aligned chunks.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphSplitter {
    max_chars: usize,
    overlap: usize,
}

impl ParagraphSplitter {
    /// `overlap` is clamped below `max_chars`.
    pub fn new(max_chars: usize, overlap: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            overlap: overlap.min(max_chars - 1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for paragraph in paragraphs(text) {
            let para_len = char_len(paragraph);

            if para_len > self.max_chars {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                chunks.extend(self.hard_split(paragraph));
                continue;
            }

            if current.is_empty() {
                current = paragraph.to_string();
                continue;
            }

            if char_len(&current) + 2 + para_len <= self.max_chars {
                current.push_str("\n\n");
                current.push_str(paragraph);
                continue;
            }

            let tail = self.overlap_tail(&current);
            chunks.push(std::mem::take(&mut current));
            current = if !tail.is_empty() && char_len(&tail) + 2 + para_len <= self.max_chars {
                format!("{tail}\n\n{paragraph}")
            } else {
                paragraph.to_string()
            };
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    /// Fixed windows over an oversized paragraph.
    fn hard_split(&self, paragraph: &str) -> Vec<String> {
        let chars: Vec<char> = paragraph.chars().collect();
        let step = self.max_chars - self.overlap;
        let mut pieces = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.max_chars).min(chars.len());
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }
        pieces
    }

    /// The last `overlap` characters of a chunk, starting on a word boundary
    /// when one is available.
    fn overlap_tail(&self, chunk: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }
        let len = char_len(chunk);
        let skip = len.saturating_sub(self.overlap);
        let tail: String = chunk.chars().skip(skip).collect();
        if skip == 0 {
            return tail;
        }
        match tail.find(char::is_whitespace) {
            Some(pos) => tail[pos..].trim_start().to_string(),
            None => tail,
        }
    }
}

impl Default for ParagraphSplitter {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Non-empty, trimmed paragraphs separated by blank lines.
fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut blank_run = false;
    let mut line_start = 0;

    for (i, c) in text.char_indices() {
        if c == '\n' {
            let line = &text[line_start..i];
            if line.trim().is_empty() && line_start > start {
                blank_run = true;
            }
            line_start = i + 1;
            continue;
        }
        if blank_run && !c.is_whitespace() {
            out.push(&text[start..line_start]);
            start = line_start;
            blank_run = false;
        }
    }
    out.push(&text[start..]);

    out.into_iter().map(str::trim).filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = ParagraphSplitter::new(1000, 200);
        let chunks = splitter.split("First paragraph.\n\nSecond paragraph.");
        assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph."]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let splitter = ParagraphSplitter::default();
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("  \n\n \r\n ").is_empty());
    }

    #[test]
    fn paragraphs_split_on_blank_lines_including_crlf() {
        let paras: Vec<&str> = paragraphs("a\nstill a\n\nb\r\n\r\nc\n  \n\nd").collect();
        assert_eq!(paras, vec!["a\nstill a", "b", "c", "d"]);
    }

    #[test]
    fn chunks_never_exceed_max_and_carry_overlap() {
        let splitter = ParagraphSplitter::new(60, 20);
        let text = (0..6)
            .map(|i| format!("paragraph number {i} has some words"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 60, "chunk too long: {chunk:?}");
        }
        // Each later chunk starts with the tail of the previous one
        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            assert!(pair[0].contains(first_word));
        }
    }

    #[test]
    fn oversized_paragraph_is_hard_split_with_overlap() {
        let splitter = ParagraphSplitter::new(10, 3);
        let chunks = splitter.split("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "hijklmnopq");
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert!(chunks.last().unwrap().ends_with('z'));
    }

    #[test]
    fn hard_split_counts_characters_not_bytes() {
        let splitter = ParagraphSplitter::new(4, 1);
        let chunks = splitter.split("你好世界再见朋友");
        assert_eq!(chunks[0], "你好世界");
        assert_eq!(chunks[1], "界再见朋");
    }

    #[test]
    fn overlap_is_clamped_below_max() {
        let splitter = ParagraphSplitter::new(10, 50);
        assert_eq!(splitter.overlap(), 9);
        // Still terminates on long input
        assert!(!splitter.split(&"x".repeat(100)).is_empty());
    }
}
