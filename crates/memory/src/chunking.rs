//! Splits document content into chunks for embedding and search (spec
//! §4.4). `Simple` windows raw characters; `Sentence` and `Markdown` pack
//! whole units (sentences, paragraphs) so a chunk never splits mid-unit.

use crate::schema::ChunkingStrategy;

pub fn chunk_text(strategy: &ChunkingStrategy, text: &str) -> Vec<String> {
    match *strategy {
        ChunkingStrategy::Simple { max_size, overlap } => chunk_simple(text, max_size, overlap),
        ChunkingStrategy::Sentence { max_size, overlap } => {
            chunk_units(&split_sentences(text), max_size, overlap)
        }
        ChunkingStrategy::Markdown { max_size, overlap } => {
            chunk_units(&split_markdown_blocks(text), max_size, overlap)
        }
    }
}

fn chunk_simple(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let max_size = max_size.max(1);
    let step = max_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + max_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Packs pre-split `units` (sentences or paragraphs) into chunks no
/// longer than `max_size` characters, carrying the trailing `overlap`
/// units into the start of the next chunk so retrieval context survives a
/// boundary.
fn chunk_units(units: &[String], max_size: usize, overlap: usize) -> Vec<String> {
    if units.is_empty() {
        return Vec::new();
    }
    let max_size = max_size.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;
    let mut i = 0;
    while i < units.len() {
        let unit = &units[i];
        let candidate_len = current_len + unit.chars().count() + if current.is_empty() { 0 } else { 1 };
        if !current.is_empty() && candidate_len > max_size {
            chunks.push(current.join(" "));
            let carry_from = current.len().saturating_sub(overlap);
            current = current[carry_from..].to_vec();
            current_len = current.iter().map(|u| u.chars().count()).sum();
            continue;
        }
        current_len = candidate_len;
        current.push(unit.clone());
        i += 1;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trailing = current.trim();
    if !trailing.is_empty() {
        sentences.push(trailing.to_string());
    }
    sentences
}

fn split_markdown_blocks(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_chunking_respects_overlap() {
        let text = "abcdefghij";
        let chunks = chunk_simple(text, 4, 2);
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn simple_chunking_empty_text_yields_no_chunks() {
        assert!(chunk_simple("", 4, 1).is_empty());
    }

    #[test]
    fn sentence_chunking_never_splits_mid_sentence() {
        let text = "One. Two. Three. Four.";
        let chunks = chunk_text(&ChunkingStrategy::Sentence { max_size: 9, overlap: 0 }, text);
        for chunk in &chunks {
            assert!(chunk.ends_with('.'));
        }
    }

    #[test]
    fn markdown_chunking_splits_on_blank_lines() {
        let text = "# Title\n\nFirst paragraph.\n\nSecond paragraph.";
        let blocks = split_markdown_blocks(text);
        assert_eq!(blocks, vec!["# Title", "First paragraph.", "Second paragraph."]);
    }

    #[test]
    fn sentence_overlap_carries_trailing_units_forward() {
        let units: Vec<String> = vec!["A.".into(), "B.".into(), "C.".into()];
        let chunks = chunk_units(&units, 3, 1);
        assert!(chunks.len() >= 2);
        assert!(chunks[1].starts_with('B') || chunks[1].starts_with("B."));
    }
}
