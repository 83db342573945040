//! CLIP tokenizer front end.
//!
//! [`ClipTokenizer`] runs one string at a time through whitespace cleanup,
//! lowercasing, special-token splitting, pre-tokenization and BPE, and frames
//! the result with `<|startoftext|>` and `<|endoftext|>`. Batches are encoded
//! in parallel with Rayon and right-padded into rectangular id, mask and
//! offset rows.
//!
//! # End-of-word lookup
//!
//! Every byte of a word except the last goes through the byte encoder. The last
//! byte is looked up as the raw byte followed by `</w>`, so only ASCII endings
//! can hit the vocabulary; a word ending in any other byte ends in the unknown
//! token.

use rayon::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::trace;

use super::bpe::Symbol;
use super::byte_level::byte_level_decode_into;
use super::config::{ClipTokenizerConfig, Padding};
use super::pretokenizer::PreTokenizer;
use super::unicode::is_unicode_space;
use super::vocab::{ErrorKind, VocabData, VocabError, END_OF_WORD};

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("padding_length should be more than 0 or equal -1, got {0}")]
    InvalidPaddingLength(i64),
    #[error("{0} shouldn't be empty")]
    EmptyToken(&'static str),
    #[error("Input shape {shape:?} holds {expected} strings, batch has {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TokenizerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenizerError::Vocab(e) => e.kind(),
            TokenizerError::ShapeMismatch { .. } => ErrorKind::InvalidArgument,
            TokenizerError::InvalidPaddingLength(_)
            | TokenizerError::EmptyToken(_)
            | TokenizerError::Io(_) => ErrorKind::Configuration,
        }
    }
}

/// Token ids for one input string, with optional byte spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    /// One `(start, end)` pair per id when offsets were requested. Spans are
    /// byte positions in the whitespace-cleaned, lowercased input; BOS and EOS
    /// map to `(0, 0)`.
    pub offsets: Option<Vec<(usize, usize)>>,
}

impl Encoding {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Padded results for a batch of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchEncoding {
    pub input_ids: Vec<Vec<u32>>,
    /// 1 for real tokens, 0 for padding.
    pub attention_mask: Vec<Vec<u32>>,
    pub offset_mapping: Option<Vec<Vec<(usize, usize)>>>,
    /// Length of every row.
    pub sequence_length: usize,
}

/// Row-major buffers ready to hand to an execution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTensors {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub offset_mapping: Option<Vec<i64>>,
    /// `input_shape + [sequence_length]`
    pub ids_shape: Vec<usize>,
    /// `input_shape + [sequence_length, 2]`
    pub offsets_shape: Vec<usize>,
}

impl BatchEncoding {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Flatten into tensors whose leading dimensions are `input_shape`.
    ///
    /// The product of `input_shape` must equal the number of rows.
    pub fn into_tensors(self, input_shape: &[usize]) -> Result<TokenTensors, TokenizerError> {
        let expected: usize = input_shape.iter().product();
        if expected != self.len() {
            return Err(TokenizerError::ShapeMismatch {
                shape: input_shape.to_vec(),
                expected,
                actual: self.len(),
            });
        }

        let mut ids_shape = input_shape.to_vec();
        ids_shape.push(self.sequence_length);
        let mut offsets_shape = ids_shape.clone();
        offsets_shape.push(2);

        let flatten = |rows: Vec<Vec<u32>>| -> Vec<i64> {
            rows.into_iter().flatten().map(i64::from).collect()
        };
        let offset_mapping = self.offset_mapping.map(|rows| {
            rows.into_iter()
                .flatten()
                .flat_map(|(start, end)| [start as i64, end as i64])
                .collect()
        });

        Ok(TokenTensors {
            input_ids: flatten(self.input_ids),
            attention_mask: flatten(self.attention_mask),
            offset_mapping,
            ids_shape,
            offsets_shape,
        })
    }
}

/// Byte-level BPE tokenizer producing CLIP-compatible token ids.
///
/// Each input string goes through:
///
/// 1. whitespace cleanup (`\n` becomes a space, runs of one repeated space
///    character collapse to one)
/// 2. lowercasing
/// 3. splitting around special tokens
/// 4. pre-tokenization of every literal segment
/// 5. byte encoding, with the final byte of each word looked up with `</w>`
/// 6. BPE merging
///
/// and is framed by `<|startoftext|>` and `<|endoftext|>`. Input consisting only
/// of whitespace (other than a single space) produces no tokens at all.
///
/// All tables are built in the constructor and never change afterwards, so a
/// `ClipTokenizer` can be shared freely between threads.
#[derive(Debug)]
pub struct ClipTokenizer {
    vocab: VocabData,
    /// Vocabulary id of each raw byte followed by `</w>`.
    end_of_word: [u32; 256],
    bos_id: u32,
    eos_id: u32,
    pad_id: u32,
    padding: Padding,
}

impl ClipTokenizer {
    /// Create a tokenizer from vocabulary JSON and merges text with default
    /// settings.
    pub fn new(vocab_json: &str, merges: &str) -> Result<Self, TokenizerError> {
        Self::from_config(&ClipTokenizerConfig::new(vocab_json, merges))
    }

    /// Create a tokenizer from `vocab.json` and `merges.txt` files.
    pub fn from_files(
        vocab_path: impl AsRef<Path>,
        merges_path: impl AsRef<Path>,
    ) -> Result<Self, TokenizerError> {
        let vocab = std::fs::read_to_string(vocab_path)?;
        let merges = std::fs::read_to_string(merges_path)?;
        Self::new(&vocab, &merges)
    }

    /// Create a tokenizer from a full configuration.
    pub fn from_config(config: &ClipTokenizerConfig) -> Result<Self, TokenizerError> {
        let padding = config.validate()?;
        let vocab = VocabData::load(
            &config.vocab,
            &config.merges,
            &config.unk_token,
            config.special_tokens.as_deref(),
        )?;

        let mut end_of_word = [vocab.unk_id(); 256];
        for (b, slot) in end_of_word.iter_mut().enumerate().take(0x80) {
            *slot = vocab.token_to_id(&format!("{}{}", char::from(b as u8), END_OF_WORD));
        }

        let bos_id = vocab.token_to_id(&config.bos_token);
        let eos_id = vocab.token_to_id(&config.eos_token);
        let pad_id = vocab.token_to_id(config.pad_token());

        Ok(Self {
            vocab,
            end_of_word,
            bos_id,
            eos_id,
            pad_id,
            padding,
        })
    }

    /// Encode `text`, emitting at most `max_length` tokens before EOS.
    ///
    /// BOS is always emitted and EOS is always appended, so the result can be
    /// one longer than `max_length`.
    pub fn encode(&self, text: &str, max_length: usize) -> Encoding {
        self.tokenize(text, max_length, false)
    }

    /// Like [`encode`](Self::encode), also computing byte offsets.
    pub fn encode_with_offsets(&self, text: &str, max_length: usize) -> Encoding {
        self.tokenize(text, max_length, true)
    }

    /// Encode a batch in parallel and pad it according to the configured
    /// [`Padding`].
    ///
    /// Rows are padded on the right with the pad token; offsets are padded with
    /// `(0, 0)`. With [`Padding::Fixed`], content is truncated so that the
    /// EOS-terminated row fits.
    pub fn encode_batch<S>(&self, texts: &[S], with_offsets: bool) -> BatchEncoding
    where
        S: AsRef<str> + Sync,
    {
        let max_length = match self.padding {
            Padding::Longest => usize::MAX,
            Padding::Fixed(n) => n.get() - 1,
        };

        let encodings: Vec<Encoding> = texts
            .par_iter()
            .map(|text| self.tokenize(text.as_ref(), max_length, with_offsets))
            .collect();

        let sequence_length = match self.padding {
            Padding::Longest => encodings.iter().map(Encoding::len).max().unwrap_or(0),
            Padding::Fixed(n) => n.get(),
        };

        let mut batch = BatchEncoding {
            input_ids: Vec::with_capacity(encodings.len()),
            attention_mask: Vec::with_capacity(encodings.len()),
            offset_mapping: with_offsets.then(|| Vec::with_capacity(encodings.len())),
            sequence_length,
        };

        for Encoding { mut ids, offsets } in encodings {
            ids.truncate(sequence_length);
            let real = ids.len();

            let mut mask = vec![1u32; real];
            mask.resize(sequence_length, 0);
            ids.resize(sequence_length, self.pad_id);
            batch.input_ids.push(ids);
            batch.attention_mask.push(mask);

            if let Some(rows) = batch.offset_mapping.as_mut() {
                let mut offsets = offsets.unwrap_or_default();
                offsets.truncate(sequence_length);
                offsets.resize(sequence_length, (0, 0));
                rows.push(offsets);
            }
        }

        trace!(
            batch_size = batch.len(),
            sequence_length,
            "encoded batch"
        );
        batch
    }

    /// Turn token ids back into text.
    ///
    /// `</w>` becomes a space and placeholder characters become raw bytes;
    /// invalid UTF-8 is replaced. Special tokens are dropped when
    /// `skip_special_tokens` is set and copied verbatim otherwise.
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, TokenizerError> {
        let mut bytes = Vec::with_capacity(ids.len() * 4);
        let specials = self.vocab.special_tokens();

        for &id in ids {
            let token = self.vocab.id_to_token(id)?;
            if specials.is_special_id(id) {
                if !skip_special_tokens {
                    bytes.extend_from_slice(token.as_bytes());
                }
                continue;
            }
            match token.strip_suffix(END_OF_WORD) {
                Some(stem) => {
                    byte_level_decode_into(stem, &mut bytes);
                    bytes.push(b' ');
                }
                None => byte_level_decode_into(token, &mut bytes),
            }
        }

        let text = String::from_utf8_lossy(&bytes);
        Ok(text.trim_end_matches(' ').to_string())
    }

    fn tokenize(&self, text: &str, max_length: usize, with_offsets: bool) -> Encoding {
        if is_blank(text) {
            return Encoding {
                ids: Vec::new(),
                offsets: with_offsets.then(Vec::new),
            };
        }

        let cleaned = clean_whitespace(text);
        let lowered: String = cleaned.chars().map(lowercase).collect();

        let mut ids = vec![self.bos_id];
        let mut offsets = with_offsets.then(|| vec![(0, 0)]);
        let mut symbols: Vec<Symbol> = Vec::new();
        let mut truncated = false;

        'segments: for segment in self.vocab.split_by_special_tokens(&lowered) {
            if ids.len() >= max_length {
                truncated = true;
                break;
            }

            if let Some(id) = segment.special {
                ids.push(id);
                if let Some(offsets) = offsets.as_mut() {
                    offsets.push((segment.offset, segment.offset + segment.text.len()));
                }
                continue;
            }

            let chars: Vec<char> = segment.text.chars().collect();
            let char_starts: Vec<usize> = segment.text.char_indices().map(|(i, _)| i).collect();

            for token in PreTokenizer::new(&chars) {
                if ids.len() >= max_length {
                    truncated = true;
                    break 'segments;
                }

                let word: String = token.text.iter().collect();
                let mut pos = segment.offset + char_starts[token.start];
                if word.starts_with(' ') {
                    pos += 1;
                }

                let bytes: Vec<u8> = word.bytes().filter(|&b| b != b' ').collect();
                let Some((&last, body)) = bytes.split_last() else {
                    continue;
                };

                symbols.clear();
                symbols.extend(
                    body.iter()
                        .map(|&b| Symbol::new(self.vocab.byte_encoder()[b as usize], 1)),
                );
                symbols.push(Symbol::new(self.end_of_word[last as usize], 1));
                self.vocab.bpe(&mut symbols);

                for symbol in &symbols {
                    if ids.len() >= max_length {
                        truncated = true;
                        break;
                    }
                    ids.push(symbol.id);
                    if let Some(offsets) = offsets.as_mut() {
                        offsets.push((pos, pos + symbol.len));
                    }
                    pos += symbol.len;
                }
            }
        }

        ids.push(self.eos_id);
        if let Some(offsets) = offsets.as_mut() {
            offsets.push((0, 0));
        }

        trace!(
            input_len = text.len(),
            token_count = ids.len(),
            truncated,
            "encoded text"
        );
        Encoding { ids, offsets }
    }

    pub fn vocab(&self) -> &VocabData {
        &self.vocab
    }

    /// Id of `token`, or the unknown-token id when absent.
    pub fn token_to_id(&self, token: &str) -> u32 {
        self.vocab.token_to_id(token)
    }

    /// Id of `token`, failing when absent.
    pub fn must_token_to_id(&self, token: &str) -> Result<u32, TokenizerError> {
        Ok(self.vocab.must_token_to_id(token)?)
    }

    pub fn id_to_token(&self, id: u32) -> Result<&str, TokenizerError> {
        Ok(self.vocab.id_to_token(id)?)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.vocab_size()
    }

    pub fn bos_token_id(&self) -> u32 {
        self.bos_id
    }

    pub fn eos_token_id(&self) -> u32 {
        self.eos_id
    }

    pub fn pad_token_id(&self) -> u32 {
        self.pad_id
    }

    pub fn unk_token_id(&self) -> u32 {
        self.vocab.unk_id()
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }
}

/// One-to-one lowercase mapping; characters whose lowercase form spans several
/// characters keep only the first.
fn lowercase(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

/// Whitespace-only input, except a lone space, which counts as real text.
fn is_blank(text: &str) -> bool {
    if matches!(text, " " | "\n") {
        return false;
    }
    text.chars().all(is_unicode_space)
}

/// Replace `\n` with a space and collapse runs of the same space character.
fn clean_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        let ch = if ch == '\n' { ' ' } else { ch };
        if prev == Some(ch) && is_unicode_space(ch) {
            continue;
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}
