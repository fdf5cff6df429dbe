//! Summary post-processing: reasoning extraction and reading statistics

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reading speed used for the time estimate.
pub const WORDS_PER_MINUTE: usize = 200;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>(.*?)</think>").expect("think pattern is valid"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// A summary with reasoning-model `<think>` blocks pulled out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryParts {
    pub answer: String,
    pub thoughts: Vec<String>,
}

/// Separate `<think>` sections from the answer.
pub fn split_thoughts(summary: &str) -> SummaryParts {
    let thoughts = THINK_BLOCK
        .captures_iter(summary)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let answer = THINK_BLOCK.replace_all(summary, "").trim().to_string();

    SummaryParts { answer, thoughts }
}

/// Word count and reading time of a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub word_count: usize,
    pub reading_minutes: usize,
}

impl SummaryStats {
    /// Counts words of the visible answer, ignoring thoughts and markup.
    pub fn of(summary: &str) -> Self {
        let visible = THINK_BLOCK.replace_all(summary, "");
        let visible = HTML_TAG.replace_all(&visible, " ");
        let word_count = visible.split_whitespace().count();

        Self {
            word_count,
            reading_minutes: word_count.div_ceil(WORDS_PER_MINUTE).max(1),
        }
    }
}
