//! Text chunking for embedding preparation
//!
//! Strategy: recursive character splitting on paragraph breaks, newlines,
//! then spaces, followed by a greedy merge into overlapping chunks of at
//! most `chunk_size` characters. The overlap seeds each new chunk with the
//! tail of the previous one to preserve context across boundaries.

use lore_core::Settings;

/// Configuration for chunking
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters carried over from the end of each chunk into the next
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 64,
        }
    }
}

/// Chunker for splitting text into overlapping segments
pub struct Chunker {
    config: ChunkConfig,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkConfig::default())
    }
}

/// Byte index of the `n`th character of `s` (or `s.len()` past the end).
fn char_to_byte(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Split `text` into pieces of at most `chunk_size` characters.
///
/// Tries separators in order; a piece with no usable separator gets a hard
/// character-boundary cut.
fn recursive_split(text: &str, separators: &[&str], chunk_size: usize) -> Vec<String> {
    if text.chars().count() <= chunk_size {
        return if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    for (idx, sep) in separators.iter().enumerate() {
        if text.contains(sep) {
            let remaining = &separators[idx + 1..];
            let mut result = Vec::new();
            for part in text.split(sep) {
                let stripped = part.trim();
                if stripped.is_empty() {
                    continue;
                }
                if stripped.chars().count() <= chunk_size {
                    result.push(stripped.to_string());
                } else {
                    result.extend(recursive_split(stripped, remaining, chunk_size));
                }
            }
            return result;
        }
    }

    // No separator at all (one very long word): hard cut.
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|c| c.iter().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

impl Chunker {
    /// Create a new chunker with the given config
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(ChunkConfig {
            chunk_size: settings.chunk_size,
            overlap: settings.chunk_overlap,
        })
    }

    /// Split `text` into overlapping, size-bounded chunks.
    ///
    /// Pieces from the recursive split are greedily merged into a buffer;
    /// when the next piece would overflow `chunk_size` the buffer is
    /// emitted and the new buffer is seeded with the emitted chunk's last
    /// `overlap` characters, advanced to the next word boundary so no
    /// chunk starts mid-word. The seed is dropped when it would not leave
    /// room for the next piece, keeping every chunk within `chunk_size`.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let size = self.config.chunk_size;
        let overlap = self.config.overlap;
        let pieces = recursive_split(trimmed, &["\n\n", "\n", " "], size);

        let mut chunks: Vec<String> = Vec::new();
        let mut buf: Vec<String> = Vec::new();
        let mut buf_chars = 0usize;

        for piece in pieces {
            let piece_chars = piece.chars().count();
            let tentative = if buf.is_empty() {
                piece_chars
            } else {
                buf_chars + 1 + piece_chars
            };

            if tentative > size && !buf.is_empty() {
                let chunk = buf.join(" ");
                let chunk_chars = chunk.chars().count();

                // Seed the next buffer with an overlap tail.
                let overlap_text = if chunk_chars > overlap {
                    let cut = char_to_byte(&chunk, chunk_chars - overlap);
                    match chunk[cut..].find(' ') {
                        Some(sp) => chunk[cut + sp + 1..].to_string(),
                        None => chunk[cut..].to_string(),
                    }
                } else {
                    chunk.clone()
                };

                chunks.push(chunk);

                let overlap_chars = overlap_text.chars().count();
                if !overlap_text.trim().is_empty() && overlap_chars + 1 + piece_chars <= size {
                    buf = vec![overlap_text];
                    buf_chars = overlap_chars;
                } else {
                    buf = Vec::new();
                    buf_chars = 0;
                }
            }

            if buf.is_empty() {
                buf_chars = piece_chars;
            } else {
                buf_chars += 1 + piece_chars;
            }
            buf.push(piece);
        }

        if !buf.is_empty() {
            chunks.push(buf.join(" "));
        }

        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_text() {
        let chunker = Chunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk("Short text.");
        assert_eq!(chunks, vec!["Short text.".to_string()]);
    }

    #[test]
    fn test_chunks_respect_size_bound() {
        let chunker = Chunker::new(ChunkConfig { chunk_size: 100, overlap: 20 });
        let text = words(200);
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 100,
                "chunk too long: {}",
                chunk.len()
            );
        }
    }

    #[test]
    fn test_content_preserved() {
        let chunker = Chunker::new(ChunkConfig { chunk_size: 80, overlap: 16 });
        let text = format!("{}\n\n{}\nend", words(40), words(30));
        let joined = chunker.chunk(&text).join(" ");

        for token in text.split_whitespace() {
            assert!(joined.contains(token), "token {} lost", token);
        }
    }

    #[test]
    fn test_overlap_seeds_next_chunk() {
        let chunker = Chunker::new(ChunkConfig { chunk_size: 100, overlap: 30 });
        let chunks = chunker.chunk(&words(60));
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let tail: String = {
                let chars: Vec<char> = pair[0].chars().collect();
                chars[chars.len().saturating_sub(30)..].iter().collect()
            };
            let tail_tokens: Vec<&str> = tail.split_whitespace().collect();
            let next_tokens: Vec<&str> = pair[1].split_whitespace().collect();
            let head = &next_tokens[..next_tokens.len().div_ceil(2)];

            assert!(
                tail_tokens.iter().any(|t| head.contains(t)),
                "no shared token between {:?} and {:?}",
                tail,
                pair[1]
            );
        }
    }

    #[test]
    fn test_chunks_do_not_start_mid_word() {
        let chunker = Chunker::new(ChunkConfig { chunk_size: 100, overlap: 30 });
        let text = words(80);
        let chunks = chunker.chunk(&text);

        for chunk in &chunks[1..] {
            let first = chunk.split_whitespace().next().unwrap();
            assert!(
                text.split_whitespace().any(|w| w == first),
                "chunk starts mid-word: {:?}",
                first
            );
        }
    }

    #[test]
    fn test_unbroken_text_hard_cut() {
        let chunker = Chunker::new(ChunkConfig { chunk_size: 50, overlap: 10 });
        let text = "x".repeat(180);
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50);
        }
    }

    #[test]
    fn test_paragraphs_preferred_over_hard_cuts() {
        let chunker = Chunker::new(ChunkConfig { chunk_size: 60, overlap: 10 });
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = chunker.chunk(&text);

        // Every chunk boundary falls on whole words.
        for chunk in &chunks {
            assert!(!chunk.starts_with(' '));
            assert!(!chunk.ends_with(' '));
        }
    }
}
