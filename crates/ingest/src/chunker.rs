use std::sync::Arc;

use crate::chunk::Chunk;
use crate::document::AttachedDocument;
use crate::tokenizer::Tokenizer;

pub struct ChunkerConfig {
    pub max_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_tokens: 4000 }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Chunker {
    pub fn new(config: ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { config, tokenizer }
    }

    pub fn max_tokens(&self) -> usize {
        self.config.max_tokens
    }

    /// Split `text` into ordered segments of at most `max_tokens` tokens each.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        chunk(self.tokenizer.as_ref(), text, self.config.max_tokens)
    }

    pub fn chunk_document(&self, doc: &AttachedDocument) -> Vec<Chunk> {
        split(self.tokenizer.as_ref(), &doc.raw_text, self.config.max_tokens)
            .into_iter()
            .enumerate()
            .map(|(index, (text, token_count))| Chunk::new(doc.id, index, text, token_count))
            .collect()
    }
}

/// Greedy token-window chunking.
///
/// Each window is as long as the budget allows; a cut that would land inside
/// a multi-byte character moves back to the closest token boundary that
/// decodes cleanly, so the decoded segments concatenate to the original text.
pub fn chunk(tokenizer: &dyn Tokenizer, text: &str, max_tokens: usize) -> Vec<String> {
    split(tokenizer, text, max_tokens)
        .into_iter()
        .map(|(segment, _)| segment)
        .collect()
}

fn split(tokenizer: &dyn Tokenizer, text: &str, max_tokens: usize) -> Vec<(String, usize)> {
    let max_tokens = max_tokens.max(1);
    let tokens = tokenizer.encode(text);
    let mut segments = Vec::new();
    let mut start = 0;

    while start < tokens.len() {
        match next_cut(tokenizer, &tokens, start, max_tokens) {
            Some((end, segment)) => {
                segments.push((segment, end - start));
                start = end;
            }
            None => {
                tracing::warn!(
                    offset = start,
                    remaining = tokens.len() - start,
                    "Token tail does not decode, dropping it"
                );
                break;
            }
        }
    }

    segments
}

fn next_cut(
    tokenizer: &dyn Tokenizer,
    tokens: &[u32],
    start: usize,
    max_tokens: usize,
) -> Option<(usize, String)> {
    let limit = (start + max_tokens).min(tokens.len());

    for end in (start + 1..=limit).rev() {
        if let Some(segment) = tokenizer.decode(&tokens[start..end]) {
            return Some((end, segment));
        }
    }

    // No clean boundary inside the budget (budget smaller than one character).
    (limit + 1..=tokens.len())
        .find_map(|end| tokenizer.decode(&tokens[start..end]).map(|segment| (end, segment)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Cl100kTokenizer;

    /// One token per byte; decoding fails on split characters.
    struct ByteTokenizer;

    impl Tokenizer for ByteTokenizer {
        fn encode(&self, text: &str) -> Vec<u32> {
            text.bytes().map(u32::from).collect()
        }

        fn decode(&self, tokens: &[u32]) -> Option<String> {
            let bytes: Vec<u8> = tokens.iter().map(|&t| t as u8).collect();
            String::from_utf8(bytes).ok()
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk(&ByteTokenizer, "", 10).is_empty());
    }

    #[test]
    fn test_short_input_is_one_segment() {
        let segments = chunk(&ByteTokenizer, "payslip", 100);
        assert_eq!(segments, vec!["payslip".to_string()]);
    }

    #[test]
    fn test_exact_multiple_of_budget() {
        let segments = chunk(&ByteTokenizer, "abcdef", 3);
        assert_eq!(segments, vec!["abc".to_string(), "def".to_string()]);
    }

    #[test]
    fn test_segments_respect_budget_and_reassemble() {
        let text = "Balance brought forward £1,204.55\nDirect debit — council tax £142\n".repeat(20);
        for max_tokens in [1, 2, 3, 5, 17, 64] {
            let segments = chunk(&ByteTokenizer, &text, max_tokens);
            assert_eq!(segments.concat(), text, "max_tokens = {max_tokens}");
            for segment in &segments {
                let tokens = ByteTokenizer.count(segment);
                // A single character wider than the budget is kept whole.
                assert!(tokens <= max_tokens.max(4), "max_tokens = {max_tokens}");
                if max_tokens >= 4 {
                    assert!(tokens <= max_tokens);
                }
            }
        }
    }

    #[test]
    fn test_cut_backs_off_multibyte_character() {
        // '£' is two bytes; a 2-token window starting at 'a' would split it.
        let segments = chunk(&ByteTokenizer, "a£b", 2);
        assert_eq!(segments, vec!["a".to_string(), "£".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_zero_budget_is_clamped() {
        let segments = chunk(&ByteTokenizer, "ab", 0);
        assert_eq!(segments, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_cl100k_chunks_are_lossless() {
        let tokenizer = Arc::new(Cl100kTokenizer::new().unwrap());
        let text = "Employer: Northwind Traders. Gross salary £48,000. Probation passed. ".repeat(50);
        let doc = AttachedDocument::new("contract.txt", text.clone());
        let chunker = Chunker::new(ChunkerConfig { max_tokens: 25 }, tokenizer.clone());

        let chunks = chunker.chunk_document(&doc);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.token_count <= 25));
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);
        assert_eq!(chunker.chunk_text(&text).concat(), text);
    }

    #[test]
    fn test_chunk_document_numbers_chunks() {
        let doc = AttachedDocument::new("statement.txt", "abcdefgh");
        let chunker = Chunker::new(ChunkerConfig { max_tokens: 3 }, Arc::new(ByteTokenizer));

        let chunks = chunker.chunk_document(&doc);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].index, 2);
        assert_eq!(chunks[2].text, "gh");
        assert_eq!(chunks[2].token_count, 2);
        assert!(chunks.iter().all(|c| c.doc_id == doc.id));
    }
}
