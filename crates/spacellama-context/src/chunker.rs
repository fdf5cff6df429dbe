//! Token-bounded content chunking
//!
//! Content is split on the coarsest boundary that fits the budget:
//! paragraphs first, then sentences, then words. A single word that is
//! larger than the budget is emitted on its own rather than dropped.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::tokens::{estimate_tokens, tokens_for_chars};

/// Separator used when paragraphs share a chunk.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
const INLINE_SEPARATOR: &str = " ";

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph break pattern is valid"));

/// A contiguous, budget-sized slice of the working content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in document order
    pub index: usize,
    pub text: String,
    /// Estimated tokens of `text`
    pub tokens: usize,
}

impl Chunk {
    /// Build a chunk, estimating its tokens.
    pub fn new(index: usize, text: String) -> Self {
        let tokens = estimate_tokens(&text);
        Self {
            index,
            text,
            tokens,
        }
    }

    /// True for the single-word overflow case.
    pub fn exceeds(&self, max_tokens: usize) -> bool {
        self.tokens > max_tokens
    }
}

/// Split `content` into ordered chunks of at most `max_tokens` estimated tokens.
///
/// A `max_tokens` of zero means the budget is already spent on the prompt;
/// the whole content is returned as one chunk and the serving layer decides.
pub fn split_into_chunks(content: &str, max_tokens: usize) -> Vec<Chunk> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }

    if max_tokens == 0 {
        warn!(
            tokens = estimate_tokens(content),
            "No token budget left for content, sending it as a single chunk"
        );
        return vec![Chunk::new(0, content.to_string())];
    }

    if estimate_tokens(content) <= max_tokens {
        return vec![Chunk::new(0, content.to_string())];
    }

    let mut acc = Accumulator::new(max_tokens);
    for paragraph in split_paragraphs(content) {
        if acc.try_append(paragraph, PARAGRAPH_SEPARATOR) {
            continue;
        }

        acc.flush();
        for sentence in split_sentences(paragraph) {
            if acc.try_append(sentence, INLINE_SEPARATOR) {
                continue;
            }

            acc.flush();
            for word in sentence.split_whitespace() {
                if !acc.try_append(word, INLINE_SEPARATOR) {
                    acc.flush();
                    acc.emit(word);
                }
            }
        }
        acc.flush();
    }

    let chunks = acc.finish();
    debug!(chunks = chunks.len(), max_tokens, "Split content into chunks");
    chunks
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// Sentences end at `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                let sentence = text[start..next_idx].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next_idx;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

struct Accumulator {
    max_tokens: usize,
    chunks: Vec<Chunk>,
    current: String,
    /// Characters in `current`
    current_chars: usize,
}

impl Accumulator {
    fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            chunks: Vec::new(),
            current: String::new(),
            current_chars: 0,
        }
    }

    /// Add `piece` to the running chunk, flushing first if it would overflow.
    /// Returns false, leaving state untouched, when `piece` alone is too big.
    fn try_append(&mut self, piece: &str, separator: &str) -> bool {
        let piece_chars = piece.chars().count();
        if tokens_for_chars(piece_chars) > self.max_tokens {
            return false;
        }

        if !self.current.is_empty() {
            let joined_chars = self.current_chars + separator.chars().count() + piece_chars;
            if tokens_for_chars(joined_chars) <= self.max_tokens {
                self.current.push_str(separator);
                self.current_chars += separator.chars().count();
            } else {
                self.flush();
            }
        }

        self.current.push_str(piece);
        self.current_chars += piece_chars;
        true
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.current);
        self.current_chars = 0;
        self.chunks.push(Chunk::new(self.chunks.len(), text));
    }

    fn emit(&mut self, text: &str) {
        let index = self.chunks.len();
        self.chunks.push(Chunk::new(index, text.to_string()));
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.flush();
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::{Duration, Instant};

    fn normalize(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn small_input_is_a_single_trimmed_chunk() {
        let chunks = split_into_chunks("  Hello world.\n", 4_000);
        assert_eq!(texts(&chunks), vec!["Hello world."]);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].tokens, 3);
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(split_into_chunks(" \n\n\t", 100).is_empty());
    }

    #[test]
    fn zero_budget_returns_whole_content() {
        let content = "First paragraph.\n\nSecond paragraph.";
        let chunks = split_into_chunks(content, 0);
        assert_eq!(texts(&chunks), vec![content]);
    }

    #[test]
    fn packs_paragraphs_until_budget() {
        // each paragraph is 12 chars -> 3 tokens; two joined are 26 chars -> 7 tokens
        let content = "aaaa bbbb c.\n\ndddd eeee f.\n\n\n\ngggg hhhh i.";
        let chunks = split_into_chunks(content, 7);
        assert_eq!(
            texts(&chunks),
            vec!["aaaa bbbb c.\n\ndddd eeee f.", "gggg hhhh i."]
        );
    }

    #[test]
    fn falls_back_to_sentences_for_large_paragraph() {
        let content = "One two three. Four five six! Seven eight nine?";
        // whole paragraph is 47 chars -> 12 tokens, the longest sentence is 5
        let chunks = split_into_chunks(content, 5);
        assert_eq!(
            texts(&chunks),
            vec!["One two three.", "Four five six!", "Seven eight nine?"]
        );
    }

    #[test]
    fn falls_back_to_words_for_large_sentence() {
        let content = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = split_into_chunks(content, 3);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.tokens <= 3, "chunk {:?} over budget", chunk.text);
        }
        assert_eq!(normalize(&texts(&chunks).join(" ")), content);
    }

    #[test]
    fn oversized_word_is_emitted_alone() {
        let long_word = "x".repeat(40);
        let content = format!("tiny {long_word} tail");
        let chunks = split_into_chunks(&content, 2);

        assert_eq!(texts(&chunks), vec!["tiny", long_word.as_str(), "tail"]);
        assert!(chunks[1].exceeds(2));
        assert!(!chunks[0].exceeds(2));
    }

    #[test]
    fn indexes_follow_document_order() {
        let content = (0..50)
            .map(|i| format!("Sentence number {i} is here."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split_into_chunks(&content, 20);

        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected);
        }
        assert_eq!(normalize(&texts(&chunks).join(" ")), normalize(&content));
    }

    #[test]
    fn ten_thousand_tokens_need_at_least_ten_chunks() {
        let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(10);
        let content = vec![paragraph; 90].join("\n\n");
        assert!(estimate_tokens(&content) >= 10_000);

        let chunks = split_into_chunks(&content, 1_000);

        assert!(chunks.len() >= 10, "got {} chunks", chunks.len());
        assert!(chunks.iter().all(|c| c.tokens <= 1_000));
    }

    #[test]
    fn megabyte_input_chunks_in_linear_time() {
        let paragraph = "Paragraph text that keeps going on for a while here.";
        let paragraphs = vec![paragraph; 18_500].join("\n\n");
        let words = "word ".repeat(200_000);
        assert!(paragraphs.len() > 990_000);

        for content in [&paragraphs, &words] {
            let started = Instant::now();
            let chunks = split_into_chunks(content, 127_897);
            let elapsed = started.elapsed();

            assert_eq!(chunks.len(), 2);
            assert!(chunks.iter().all(|c| c.tokens <= 127_897));
            assert!(elapsed < Duration::from_secs(1), "chunking took {elapsed:?}");
        }
    }

    #[test]
    fn sentence_split_keeps_decimal_points_together() {
        assert_eq!(
            split_sentences("Pi is 3.14 roughly. Next one"),
            vec!["Pi is 3.14 roughly.", "Next one"]
        );
    }

    fn document() -> impl Strategy<Value = String> {
        let separator = prop_oneof![
            Just(" "),
            Just(". "),
            Just("! "),
            Just("\n"),
            Just("\n\n"),
            Just(" \n \n "),
        ];
        prop::collection::vec(("[A-Za-z0-9,']{1,10}", separator), 1..300).prop_map(|parts| {
            parts
                .into_iter()
                .map(|(word, sep)| format!("{word}{sep}"))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn every_chunk_fits_the_budget(content in document(), max_tokens in 3usize..80) {
            // words are at most 10 chars (3 tokens), so no chunk may overflow
            for chunk in split_into_chunks(&content, max_tokens) {
                prop_assert!(chunk.tokens <= max_tokens, "{:?} > {}", chunk.text, max_tokens);
            }
        }

        #[test]
        fn chunks_reconstruct_the_input(content in document(), max_tokens in 1usize..80) {
            let chunks = split_into_chunks(&content, max_tokens);
            let joined = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
            prop_assert_eq!(normalize(&joined), normalize(&content));
        }

        #[test]
        fn content_within_budget_is_returned_verbatim(content in document()) {
            let max_tokens = estimate_tokens(content.trim()).max(1);
            let chunks = split_into_chunks(&content, max_tokens);
            prop_assert_eq!(chunks.len(), 1);
            prop_assert_eq!(chunks[0].text.as_str(), content.trim());
        }
    }
}
