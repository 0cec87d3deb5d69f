//! Fixed-window document chunking.
//!
//! A document becomes a sequence of overlapping windows in original text
//! order. Windows are measured in characters, cut on char boundaries, and
//! runt chunks below the minimum length are discarded as noise.

/// Window geometry for [`chunk_text`].
#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    /// Window length in characters.
    pub chunk_len: usize,

    /// Characters shared between consecutive windows. Must be < `chunk_len`.
    pub chunk_overlap: usize,

    /// Chunks shorter than this are dropped.
    pub min_chunk_len: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_len: 500,
            chunk_overlap: 50,
            min_chunk_len: 50,
        }
    }
}

/// Split `text` into overlapping chunks, preserving original order.
///
/// Whitespace is collapsed first so that formatting runs do not eat the
/// window budget. Returns an empty vec for blank input.
pub fn chunk_text(text: &str, params: &ChunkParams) -> Vec<String> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let step = params.chunk_len - params.chunk_overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + params.chunk_len).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if trimmed.chars().count() >= params.min_chunk_len {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk_len: usize, chunk_overlap: usize, min_chunk_len: usize) -> ChunkParams {
        ChunkParams {
            chunk_len,
            chunk_overlap,
            min_chunk_len,
        }
    }

    #[test]
    fn blank_input_yields_no_chunks() {
        assert!(chunk_text("", &ChunkParams::default()).is_empty());
        assert!(chunk_text("   \n\t  ", &ChunkParams::default()).is_empty());
    }

    #[test]
    fn short_document_single_chunk() {
        let chunks = chunk_text("a document well above the minimum length", &params(500, 50, 10));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "a document well above the minimum length");
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "x".repeat(250);
        let chunks = chunk_text(&text, &params(100, 20, 10));
        // Steps of 80: windows at 0, 80, 160, 240
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[3].len(), 10);
    }

    #[test]
    fn runt_chunks_are_dropped() {
        let text = "y".repeat(105);
        let chunks = chunk_text(&text, &params(100, 20, 50));
        // Second window would be 25 chars, below the 50-char floor
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn order_follows_document_order() {
        let text = format!("{} {}", "alpha ".repeat(30), "omega ".repeat(30));
        let chunks = chunk_text(&text, &params(120, 20, 10));
        assert!(chunks.first().unwrap().contains("alpha"));
        assert!(chunks.last().unwrap().contains("omega"));
    }

    #[test]
    fn whitespace_runs_are_collapsed() {
        let chunks = chunk_text(
            "several    words\n\nseparated   by \t messy whitespace runs here",
            &params(500, 50, 10),
        );
        assert_eq!(
            chunks[0],
            "several words separated by messy whitespace runs here"
        );
    }

    #[test]
    fn multibyte_text_is_not_split_mid_char() {
        let text = "é".repeat(120);
        let chunks = chunk_text(&text, &params(100, 20, 10));
        assert_eq!(chunks[0].chars().count(), 100);
    }
}
