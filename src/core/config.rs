//! Tokenizer configuration.
//!
//! All settings are validated up front by [`ClipTokenizerConfig::validate`];
//! a tokenizer is never built from a half-valid configuration.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

use super::tokenizer::TokenizerError;
use super::vocab::VocabError;

pub const DEFAULT_BOS_TOKEN: &str = "<|startoftext|>";
pub const DEFAULT_EOS_TOKEN: &str = "<|endoftext|>";
pub const DEFAULT_SPECIAL_TOKENS: &str = "<|startoftext|> <|endoftext|>";

/// How a batch is padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Padding {
    /// Pad every row to the longest row in the batch.
    Longest,
    /// Pad or truncate every row to exactly this many tokens.
    Fixed(NonZeroUsize),
}

impl TryFrom<i64> for Padding {
    type Error = TokenizerError;

    /// `-1` selects [`Padding::Longest`]; positive values a fixed length.
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == -1 {
            return Ok(Padding::Longest);
        }
        usize::try_from(value)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Padding::Fixed)
            .ok_or(TokenizerError::InvalidPaddingLength(value))
    }
}

impl From<Padding> for i64 {
    fn from(padding: Padding) -> Self {
        match padding {
            Padding::Longest => -1,
            Padding::Fixed(n) => i64::try_from(n.get()).unwrap_or(i64::MAX),
        }
    }
}

fn default_unk_token() -> String {
    DEFAULT_EOS_TOKEN.to_string()
}

fn default_special_tokens() -> Option<String> {
    Some(DEFAULT_SPECIAL_TOKENS.to_string())
}

fn default_padding_length() -> i64 {
    -1
}

fn default_bos_token() -> String {
    DEFAULT_BOS_TOKEN.to_string()
}

fn default_eos_token() -> String {
    DEFAULT_EOS_TOKEN.to_string()
}

/// Everything needed to build a [`ClipTokenizer`](super::ClipTokenizer).
///
/// `vocab` and `merges` hold file contents, not paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipTokenizerConfig {
    /// JSON object of token string to id.
    pub vocab: String,
    /// Merge rules, one `"left right"` pair per line.
    pub merges: String,
    #[serde(default = "default_unk_token")]
    pub unk_token: String,
    /// Whitespace-separated special tokens, in priority order.
    #[serde(default = "default_special_tokens")]
    pub special_tokens: Option<String>,
    /// `-1` pads to the longest row, any positive value is a fixed length.
    #[serde(default = "default_padding_length")]
    pub padding_length: i64,
    #[serde(default = "default_bos_token")]
    pub bos_token: String,
    #[serde(default = "default_eos_token")]
    pub eos_token: String,
    /// Defaults to `eos_token`.
    #[serde(default)]
    pub pad_token: Option<String>,
}

impl ClipTokenizerConfig {
    pub fn new(vocab: impl Into<String>, merges: impl Into<String>) -> Self {
        Self {
            vocab: vocab.into(),
            merges: merges.into(),
            unk_token: default_unk_token(),
            special_tokens: default_special_tokens(),
            padding_length: default_padding_length(),
            bos_token: default_bos_token(),
            eos_token: default_eos_token(),
            pad_token: None,
        }
    }

    pub fn with_padding_length(mut self, padding_length: i64) -> Self {
        self.padding_length = padding_length;
        self
    }

    pub fn with_special_tokens(mut self, special_tokens: Option<String>) -> Self {
        self.special_tokens = special_tokens;
        self
    }

    pub fn with_unk_token(mut self, unk_token: impl Into<String>) -> Self {
        self.unk_token = unk_token.into();
        self
    }

    pub fn pad_token(&self) -> &str {
        self.pad_token.as_deref().unwrap_or(&self.eos_token)
    }

    /// Check every field and resolve the padding mode.
    pub fn validate(&self) -> Result<Padding, TokenizerError> {
        if self.vocab.trim().is_empty() {
            return Err(VocabError::EmptyVocab.into());
        }
        if self.merges.trim().is_empty() {
            return Err(VocabError::EmptyMerges.into());
        }
        if self.unk_token.is_empty() {
            return Err(VocabError::EmptyUnknownToken.into());
        }
        for (field, value) in [
            ("bos_token", self.bos_token.as_str()),
            ("eos_token", self.eos_token.as_str()),
            ("pad_token", self.pad_token()),
        ] {
            if value.is_empty() {
                return Err(TokenizerError::EmptyToken(field));
            }
        }
        Padding::try_from(self.padding_length)
    }
}
