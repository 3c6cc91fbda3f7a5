//! Fixed-width subtitle chunking.
//!
//! Splitting counts characters, not words or morphemes, so a chunk boundary
//! can fall inside a word. This is an accepted approximation for the
//! stacked-line layout.

use crate::core::config::LayoutConfig;

/// Lazy iterator over consecutive chunks of at most `width` characters.
pub struct SubtitleChunks<'a> {
    rest: &'a str,
    width: usize,
}

impl<'a> Iterator for SubtitleChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let split = self
            .rest
            .char_indices()
            .nth(self.width)
            .map(|(idx, _)| idx)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(split);
        self.rest = rest;
        Some(chunk)
    }
}

/// Splits `transcript` into display chunks. A transcript of `width`
/// characters or fewer yields itself once. A zero width is treated as one
/// character per chunk.
pub fn chunk_transcript(transcript: &str, width: usize) -> SubtitleChunks<'_> {
    SubtitleChunks {
        rest: transcript,
        width: width.max(1),
    }
}

/// Like [`chunk_transcript`], but an empty transcript yields a single empty
/// chunk so that every segment still gets one text layer.
pub fn chunk_lines(transcript: &str, width: usize) -> Vec<&str> {
    let chunks: Vec<&str> = chunk_transcript(transcript, width).collect();
    if chunks.is_empty() {
        vec![transcript]
    } else {
        chunks
    }
}

/// Top edge of chunk `index` out of `count` stacked chunks.
pub fn line_top(layout: &LayoutConfig, index: usize, count: usize) -> f64 {
    if count <= 1 {
        layout.single_line_top
    } else {
        layout.multi_line_top + layout.line_height * index as f64
    }
}
