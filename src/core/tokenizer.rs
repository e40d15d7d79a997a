use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tokenizers::Tokenizer;

use crate::core::scoring::ScoreError;

/// Token context length of the CLIP text tower.
pub const CONTEXT_LENGTH: usize = 77;

/// Marker prepended to every encoded text.
pub const START_OF_TEXT: &str = "<|startoftext|>";

/// Marker appended to every encoded text.
pub const END_OF_TEXT: &str = "<|endoftext|>";

/// CLIP BPE tokenizer producing fixed-length, zero-padded id rows.
pub struct ClipTokenizer {
    inner: Tokenizer,
    start_id: u32,
    end_id: u32,
    context_length: usize,
}

impl fmt::Debug for ClipTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipTokenizer")
            .field("vocab_size", &self.inner.get_vocab_size(true))
            .field("context_length", &self.context_length)
            .finish()
    }
}

impl ClipTokenizer {
    /// Load a HuggingFace `tokenizer.json`.
    pub fn from_file(path: impl AsRef<Path>, context_length: usize) -> Result<Self> {
        let path = path.as_ref();
        let inner = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("failed to read tokenizer {}: {}", path.display(), e))?;
        Self::new(inner, context_length)
    }

    /// Wrap a tokenizer whose vocabulary carries the CLIP start/end markers.
    pub fn new(inner: Tokenizer, context_length: usize) -> Result<Self> {
        let start_id = inner
            .token_to_id(START_OF_TEXT)
            .with_context(|| format!("vocabulary has no {} token", START_OF_TEXT))?;
        let end_id = inner
            .token_to_id(END_OF_TEXT)
            .with_context(|| format!("vocabulary has no {} token", END_OF_TEXT))?;

        Ok(Self {
            inner,
            start_id,
            end_id,
            context_length,
        })
    }

    /// Context length every row is padded to.
    pub fn context_length(&self) -> usize {
        self.context_length
    }

    /// Encode one text as `[start] + tokens + [end]`, zero-padded.
    ///
    /// `index` only labels the error when the text does not fit.
    pub fn encode(&self, index: usize, text: &str) -> std::result::Result<Vec<i64>, ScoreError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ScoreError::Inference(format!("tokenizer failed: {}", e)))?;

        let tokens = encoding.get_ids().len() + 2;
        if tokens > self.context_length {
            return Err(ScoreError::DescriptionTooLong {
                index,
                tokens,
                max: self.context_length,
            });
        }

        let mut ids = Vec::with_capacity(self.context_length);
        ids.push(self.start_id as i64);
        ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
        ids.push(self.end_id as i64);
        ids.resize(self.context_length, 0);
        Ok(ids)
    }

    /// Encode several texts into one row-major `[texts.len(), context_length]` buffer.
    pub fn encode_batch(&self, texts: &[String]) -> std::result::Result<Vec<i64>, ScoreError> {
        let mut ids = Vec::with_capacity(texts.len() * self.context_length);
        for (index, text) in texts.iter().enumerate() {
            ids.extend(self.encode(index, text)?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const WORD_LEVEL: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {
                "[UNK]": 0,
                "a": 1,
                "red": 2,
                "apple": 3,
                "<|startoftext|>": 49406,
                "<|endoftext|>": 49407
            },
            "unk_token": "[UNK]"
        }
    }"#;

    fn tokenizer(context_length: usize) -> ClipTokenizer {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", WORD_LEVEL).unwrap();
        ClipTokenizer::from_file(file.path(), context_length).unwrap()
    }

    #[test]
    fn test_encode_wraps_and_pads() {
        let tok = tokenizer(CONTEXT_LENGTH);
        let ids = tok.encode(0, "a red apple").unwrap();

        assert_eq!(ids.len(), CONTEXT_LENGTH);
        assert_eq!(&ids[..5], &[49406, 1, 2, 3, 49407]);
        assert!(ids[5..].iter().all(|&id| id == 0));
    }

    #[test]
    fn test_encode_rejects_overlong_text() {
        let tok = tokenizer(4);
        let err = tok.encode(2, "a red apple").unwrap_err();

        assert_eq!(
            err,
            ScoreError::DescriptionTooLong {
                index: 2,
                tokens: 5,
                max: 4
            }
        );
    }

    #[test]
    fn test_encode_batch_is_row_major() {
        let tok = tokenizer(6);
        let texts = vec!["apple".to_string(), "red".to_string(), "a".to_string()];
        let ids = tok.encode_batch(&texts).unwrap();

        assert_eq!(ids.len(), 18);
        assert_eq!(&ids[0..3], &[49406, 3, 49407]);
        assert_eq!(&ids[6..9], &[49406, 2, 49407]);
        assert_eq!(&ids[12..15], &[49406, 1, 49407]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClipTokenizer::from_file(dir.path().join("nope.json"), CONTEXT_LENGTH).is_err());
    }
}
