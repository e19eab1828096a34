//! Sentence-aware, page-traceable text chunker.
//!
//! Splits a document's ordered per-page texts into [`Chunk`]s that honor a
//! target size and overlap, preferring sentence boundaries over raw character
//! cuts. All page texts are concatenated into one buffer while recording each
//! page's start offset; every produced chunk is a contiguous byte range of
//! that buffer, so page attribution is a range-overlap check and ids stay
//! stable across runs.
//!
//! Overlap is realized by re-emitting the trailing sentences of the previous
//! chunk, never by independent chunk generation. Chunks shorter than the
//! configured minimum (after trimming) are dropped before index assignment,
//! so surviving chunks always have contiguous indices starting at 0 and the
//! same document re-chunked with identical parameters yields identical ids.

use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::extract::PageText;
use crate::models::{Chunk, DocumentInfo};

/// Splits a text buffer into contiguous byte ranges on sentence boundaries.
pub struct SentenceSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split `text` into `[start, end)` byte ranges, each at most
    /// `chunk_size` bytes unless a single unbreakable word exceeds it.
    /// Ranges are emitted in order with monotonically increasing starts.
    pub fn split(&self, text: &str) -> Vec<(usize, usize)> {
        let sentences = sentence_ranges(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut i = 0;

        while i < sentences.len() {
            let (chunk_start, first_end) = sentences[i];

            // A single sentence larger than the target gets hard-split on
            // whitespace; those pieces carry no overlap.
            if first_end - chunk_start > self.chunk_size {
                hard_split(text, chunk_start, first_end, self.chunk_size, &mut chunks);
                i += 1;
                continue;
            }

            // Greedily take whole sentences while the chunk stays in budget.
            let mut j = i;
            let mut end = first_end;
            while j + 1 < sentences.len() && sentences[j + 1].1 - chunk_start <= self.chunk_size {
                j += 1;
                end = sentences[j].1;
            }
            chunks.push((chunk_start, end));

            if j + 1 >= sentences.len() {
                break;
            }

            // Re-start at the earliest trailing sentence whose tail fits in
            // the overlap budget. k >= i + 1 guarantees forward progress.
            let mut k = j + 1;
            while k > i + 1 && end - sentences[k - 1].0 <= self.chunk_overlap {
                k -= 1;
            }
            i = k;
        }

        chunks
    }
}

/// Sentence units as contiguous byte ranges covering the whole buffer.
///
/// A sentence ends after `.`, `!`, or `?` followed by whitespace; the
/// trailing whitespace run belongs to the sentence so that concatenating
/// all ranges reproduces the buffer exactly.
fn sentence_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') {
            let mut end = i + c.len_utf8();
            let mut saw_whitespace = false;
            while let Some(&(j, w)) = iter.peek() {
                if w.is_whitespace() {
                    end = j + w.len_utf8();
                    saw_whitespace = true;
                    iter.next();
                } else {
                    break;
                }
            }
            // "3.14" stays together: a terminator only ends a sentence when
            // followed by whitespace or the end of the buffer.
            if saw_whitespace || end == text.len() {
                ranges.push((start, end));
                start = end;
            }
        }
    }

    if start < text.len() {
        ranges.push((start, text.len()));
    }

    ranges
}

/// Split an oversized range at whitespace where possible, hard byte cuts
/// otherwise (always on char boundaries).
fn hard_split(text: &str, start: usize, end: usize, max: usize, out: &mut Vec<(usize, usize)>) {
    let mut pos = start;
    while pos < end {
        if end - pos <= max {
            out.push((pos, end));
            break;
        }
        let mut cut = pos + max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        let split_at = text[pos..cut]
            .rfind(char::is_whitespace)
            .map(|p| pos + p + 1)
            .filter(|&p| p > pos)
            .unwrap_or(cut);
        // Degenerate max smaller than one char: force progress.
        let split_at = if split_at <= pos {
            let mut next = pos + 1;
            while !text.is_char_boundary(next) {
                next += 1;
            }
            next
        } else {
            split_at
        };
        out.push((pos, split_at));
        pos = split_at;
    }
}

/// Produces ordered [`Chunk`] records from a document's per-page texts.
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            min_chunk_size: config.min_chunk_size,
        }
    }

    /// Chunk one document. Returns an empty list when no page text was
    /// extracted; recording that as an error is the ledger's responsibility.
    pub fn chunk_pages(&self, pages: &[PageText], metadata: &DocumentInfo) -> Vec<Chunk> {
        if pages.is_empty() {
            return Vec::new();
        }

        // Concatenate page texts, recording the offset where each page starts.
        let mut buffer = String::new();
        let mut page_starts = Vec::with_capacity(pages.len());
        for page in pages {
            page_starts.push((buffer.len(), page.page));
            buffer.push_str(&page.text);
            buffer.push('\n');
        }

        let splitter = SentenceSplitter::new(self.chunk_size, self.chunk_overlap);
        let ranges = splitter.split(&buffer);

        let mut chunks = Vec::new();
        let mut index = 0;
        for (start, end) in ranges {
            let trimmed = buffer[start..end].trim();
            if trimmed.chars().count() < self.min_chunk_size {
                continue;
            }

            chunks.push(Chunk {
                chunk_id: chunk_id(&metadata.filename, index),
                text: trimmed.to_string(),
                source_file: metadata.filepath.clone(),
                page_numbers: pages_for_range(&page_starts, buffer.len(), start, end),
                chunk_index: index,
                total_chunks: 0,
                char_count: trimmed.chars().count(),
                metadata: metadata.clone(),
            });
            index += 1;
        }

        // Back-fill total_chunks now that the full list is known.
        let total = chunks.len();
        for chunk in &mut chunks {
            chunk.total_chunks = total;
        }

        chunks
    }
}

/// Deterministic chunk id: SHA-256 of `"{filename}_{index}"`, first 16 hex chars.
pub fn chunk_id(filename: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", filename, index).as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(16);
    hex
}

/// Pages whose `[page_start, page_end)` span overlaps `[start, end)`.
fn pages_for_range(
    page_starts: &[(usize, u32)],
    buffer_len: usize,
    start: usize,
    end: usize,
) -> Vec<u32> {
    let mut pages = Vec::new();
    for (i, &(page_start, page)) in page_starts.iter().enumerate() {
        let page_end = page_starts
            .get(i + 1)
            .map(|&(offset, _)| offset)
            .unwrap_or(buffer_len);
        if page_start < end && start < page_end {
            pages.push(page);
        }
    }
    pages
}
