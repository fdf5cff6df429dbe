//! Prompt construction

use serde::{Deserialize, Serialize};

/// Sentence placed between the system prompt and the chunk.
pub const SUMMARY_INSTRUCTION: &str =
    "Follow the above instructions and summarize the following text:";

/// System prompt used when the caller supplies none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Summarize the given text concisely, preserving key information and insights. Focus on the main points while maintaining clarity and readability.";

/// Appended to the system prompt for video transcripts.
pub const YOUTUBE_PROMPT_SUFFIX: &str =
    "This is a YouTube video transcript. Please summarize the key points discussed in the video.";

/// Written by the page extractor when a video has no captions.
pub const NO_TRANSCRIPT_MARKER: &str = "NO TRANSCRIPT AVAILABLE";

/// Full prompt for one chunk.
pub fn chunk_prompt(system_prompt: &str, chunk: &str) -> String {
    format!("{system_prompt}\n\n{SUMMARY_INSTRUCTION}\n\n{chunk}")
}

/// What kind of page the content was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    Page,
    YouTubeTranscript,
    /// A video page whose transcript could not be fetched
    YouTubeMetadataOnly,
}

impl ContentKind {
    /// Classify content by its source URL and markers.
    pub fn detect(url: Option<&str>, content: &str) -> Self {
        if !url.is_some_and(is_youtube_url) {
            return Self::Page;
        }
        if content.contains(NO_TRANSCRIPT_MARKER) {
            Self::YouTubeMetadataOnly
        } else if content.contains("Title:") && content.contains("Transcript:") {
            Self::YouTubeTranscript
        } else {
            Self::Page
        }
    }
}

/// True for YouTube watch pages.
pub fn is_youtube_url(url: &str) -> bool {
    url.contains("youtube.com/watch") || url.contains("youtu.be/") || url.contains("/watch?v=")
}

/// Adjust the user's system prompt for the detected content.
pub fn customize_prompt(system_prompt: &str, kind: ContentKind) -> String {
    match kind {
        ContentKind::YouTubeTranscript => format!("{system_prompt}\n\n{YOUTUBE_PROMPT_SUFFIX}"),
        ContentKind::Page | ContentKind::YouTubeMetadataOnly => system_prompt.to_string(),
    }
}
