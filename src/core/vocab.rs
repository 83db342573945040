//! Vocabulary, merge table and byte encoder for CLIP-style BPE.
//!
//! A [`VocabData`] is built once from three inputs:
//!
//! - a JSON object mapping token strings to ids (`vocab.json`),
//! - a list of merge rules, one `"left right"` pair per line (`merges.txt`),
//! - the unknown-token string and an optional whitespace-separated list of
//!   special tokens.
//!
//! # Merges Format
//!
//! ```text
//! #version: 0.2
//! i n
//! t h
//! th e</w>
//! ```
//!
//! Line order is merge priority: the first rule has rank 0 and is applied
//! before every other rule. A leading `#` comment is skipped, as are blank
//! lines. Words ending in `</w>` only match at the end of a word.
//!
//! Ids in `vocab.json` must be unique and dense: every id is below the number
//! of entries. Strings that the merge rules or the byte encoder refer to but
//! the vocabulary lacks are given the next free id. After loading, the tables
//! are read-only.

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use super::bpe::{byte_pair_merge, MergeRule, MergeTable, Symbol};
use super::byte_level::byte_to_char;
use super::special::{Segment, SpecialTokenMap};

/// Suffix marking a word-final subword.
pub const END_OF_WORD: &str = "</w>";

/// Broad classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input data or a lookup that must succeed but did not.
    InvalidArgument,
    /// The tokenizer cannot be configured from the given settings.
    Configuration,
}

/// Errors raised while loading or querying a vocabulary.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Invalid vocabulary JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Vocabulary shouldn't be empty")]
    EmptyVocab,
    #[error("Merges shouldn't be empty")]
    EmptyMerges,
    #[error("Unknown token shouldn't be empty")]
    EmptyUnknownToken,
    #[error("Cannot parse merges line {line}: {content:?}")]
    MalformedMerge { line: usize, content: String },
    #[error("Empty special token")]
    EmptySpecialToken,
    #[error("Duplicate special token {token:?}: registered as {existing}, got {requested}")]
    DuplicateSpecialToken {
        token: String,
        existing: u32,
        requested: u32,
    },
    #[error("Special token matcher build error: {0}")]
    Matcher(#[from] aho_corasick::BuildError),
    #[error("Token not found: {0}")]
    TokenNotFound(String),
    #[error("Invalid ID: {0}")]
    InvalidId(u32),
    #[error("Token {token:?} has id {id}, vocabulary holds {size} entries")]
    IdOutOfRange { token: String, id: u32, size: usize },
    #[error("Id {id} is used by both {first:?} and {second:?}")]
    DuplicateId {
        id: u32,
        first: String,
        second: String,
    },
    #[error("No ids left to allocate for {0:?}")]
    IdSpaceExhausted(String),
}

impl VocabError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VocabError::EmptyVocab | VocabError::EmptyMerges | VocabError::EmptyUnknownToken => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::InvalidArgument,
        }
    }
}

/// Token-to-id map that hands out new ids for missing strings.
///
/// Ids stay dense, so `id_to_token[id]` is always the string for `id`.
struct VocabBuilder {
    vocab: FxHashMap<String, u32>,
    id_to_token: Vec<String>,
}

impl VocabBuilder {
    fn new(vocab: FxHashMap<String, u32>) -> Result<Self, VocabError> {
        let size = vocab.len();
        let mut slots: Vec<Option<&str>> = vec![None; size];
        for (token, &id) in &vocab {
            let slot = slots
                .get_mut(id as usize)
                .ok_or_else(|| VocabError::IdOutOfRange {
                    token: token.clone(),
                    id,
                    size,
                })?;
            if let Some(first) = *slot {
                return Err(VocabError::DuplicateId {
                    id,
                    first: first.to_string(),
                    second: token.clone(),
                });
            }
            *slot = Some(token.as_str());
        }

        // `size` unique ids below `size` fill every slot.
        let id_to_token = slots.into_iter().flatten().map(str::to_string).collect();
        Ok(Self { vocab, id_to_token })
    }

    fn id_or_insert(&mut self, token: &str) -> Result<u32, VocabError> {
        if let Some(&id) = self.vocab.get(token) {
            return Ok(id);
        }
        let id = u32::try_from(self.id_to_token.len())
            .map_err(|_| VocabError::IdSpaceExhausted(token.to_string()))?;
        debug!(token, id, "allocated id for token missing from vocabulary");
        self.vocab.insert(token.to_string(), id);
        self.id_to_token.push(token.to_string());
        Ok(id)
    }
}

/// Loaded vocabulary, merge rules, byte encoder and special tokens.
#[derive(Debug)]
pub struct VocabData {
    vocab: FxHashMap<String, u32>,
    id_to_token: Vec<String>,
    merges: MergeTable,
    byte_encoder: [u32; 256],
    unk_id: u32,
    special_tokens: SpecialTokenMap,
}

impl VocabData {
    /// Build all tables.
    ///
    /// # Arguments
    /// * `vocab_json` - JSON object of token string to id
    /// * `merges` - merge rules, one `"left right"` pair per line
    /// * `unk_token` - string that unknown lookups resolve to
    /// * `special_tokens` - whitespace-separated special token strings
    pub fn load(
        vocab_json: &str,
        merges: &str,
        unk_token: &str,
        special_tokens: Option<&str>,
    ) -> Result<Self, VocabError> {
        if vocab_json.trim().is_empty() {
            return Err(VocabError::EmptyVocab);
        }
        if merges.trim().is_empty() {
            return Err(VocabError::EmptyMerges);
        }
        if unk_token.is_empty() {
            return Err(VocabError::EmptyUnknownToken);
        }

        let parsed: FxHashMap<String, u32> = serde_json::from_str(vocab_json)?;
        if parsed.is_empty() {
            return Err(VocabError::EmptyVocab);
        }
        let mut builder = VocabBuilder::new(parsed)?;

        let unk_id = builder.id_or_insert(unk_token)?;

        let mut byte_encoder = [0u32; 256];
        for (b, slot) in byte_encoder.iter_mut().enumerate() {
            *slot = builder.id_or_insert(&byte_to_char(b as u8).to_string())?;
        }

        let merges = parse_merges(merges, &mut builder)?;

        let mut special = SpecialTokenMap::new();
        if let Some(list) = special_tokens {
            for token in list.split_whitespace() {
                let id = builder.id_or_insert(token)?;
                special.add(token, id)?;
            }
        }

        let VocabBuilder { vocab, id_to_token } = builder;

        debug!(
            vocab_size = vocab.len(),
            merge_count = merges.len(),
            special_token_count = special.len(),
            unk_id,
            "BPE vocabulary loaded"
        );

        Ok(Self {
            vocab,
            id_to_token,
            merges,
            byte_encoder,
            unk_id,
            special_tokens: special,
        })
    }

    /// Id of `token`, or the unknown-token id when absent.
    #[inline]
    pub fn token_to_id(&self, token: &str) -> u32 {
        self.vocab.get(token).copied().unwrap_or(self.unk_id)
    }

    /// Id of `token`, failing when absent.
    pub fn must_token_to_id(&self, token: &str) -> Result<u32, VocabError> {
        self.vocab
            .get(token)
            .copied()
            .ok_or_else(|| VocabError::TokenNotFound(token.to_string()))
    }

    /// Token string for `id`.
    pub fn id_to_token(&self, id: u32) -> Result<&str, VocabError> {
        self.id_to_token
            .get(id as usize)
            .map(String::as_str)
            .ok_or(VocabError::InvalidId(id))
    }

    /// Vocabulary id of each raw byte's placeholder character.
    #[inline]
    pub fn byte_encoder(&self) -> &[u32; 256] {
        &self.byte_encoder
    }

    /// Merge `symbols` in place; see [`byte_pair_merge`].
    #[inline]
    pub fn bpe(&self, symbols: &mut Vec<Symbol>) {
        byte_pair_merge(symbols, &self.merges);
    }

    pub fn merge_rule(&self, left: u32, right: u32) -> Option<&MergeRule> {
        self.merges.get(&(left, right))
    }

    pub fn split_by_special_tokens<'a>(&self, input: &'a str) -> Vec<Segment<'a>> {
        self.special_tokens.split(input)
    }

    pub fn special_tokens(&self) -> &SpecialTokenMap {
        &self.special_tokens
    }

    pub fn unk_id(&self) -> u32 {
        self.unk_id
    }

    /// Number of distinct token strings.
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn merge_count(&self) -> usize {
        self.merges.len()
    }

    pub fn encoder(&self) -> &FxHashMap<String, u32> {
        &self.vocab
    }
}

fn parse_merges(text: &str, builder: &mut VocabBuilder) -> Result<MergeTable, VocabError> {
    let mut merges = MergeTable::default();
    let mut rank = 0u32;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.replace('\r', "");
        if line.is_empty() {
            continue;
        }
        if rank == 0 && line.starts_with('#') {
            continue;
        }

        let (w1, w2) = line
            .split_once(' ')
            .ok_or_else(|| VocabError::MalformedMerge {
                line: lineno + 1,
                content: line.clone(),
            })?;

        let mut length = w1.len() + w2.len();
        if w1.contains(END_OF_WORD) || w2.contains(END_OF_WORD) {
            length = length.saturating_sub(END_OF_WORD.len());
        }

        let left = builder.id_or_insert(w1)?;
        let right = builder.id_or_insert(w2)?;
        let id = builder.id_or_insert(&format!("{w1}{w2}"))?;
        merges.insert((left, right), MergeRule { id, rank, length });
        rank += 1;
    }

    Ok(merges)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCAB: &str = r#"{"a": 0, "b": 1, "c": 2, "ab": 3, "c</w>": 4, "abc</w>": 5, "<unk>": 6}"#;
    const MERGES: &str = "#version: 0.2\na b\nab c</w>\n";

    fn load(vocab: &str, merges: &str) -> VocabData {
        VocabData::load(vocab, merges, "<unk>", Some("<|startoftext|> <|endoftext|>")).unwrap()
    }

    #[test]
    fn test_load_basic() {
        let v = load(VOCAB, MERGES);
        assert_eq!(v.unk_id(), 6);
        assert_eq!(v.merge_count(), 2);
        assert_eq!(v.token_to_id("ab"), 3);
        assert_eq!(v.must_token_to_id("abc</w>").unwrap(), 5);
        assert_eq!(v.id_to_token(4).unwrap(), "c</w>");
    }

    #[test]
    fn test_merge_ranks_and_lengths() {
        let v = load(VOCAB, MERGES);
        let first = v.merge_rule(0, 1).unwrap();
        assert_eq!((first.id, first.rank, first.length), (3, 0, 2));
        let second = v.merge_rule(3, 4).unwrap();
        assert_eq!((second.id, second.rank, second.length), (5, 1, 3));
    }

    #[test]
    fn test_unknown_fallback_and_strict_lookup() {
        let v = load(VOCAB, MERGES);
        assert_eq!(v.token_to_id("zzz"), v.unk_id());
        let err = v.must_token_to_id("zzz").unwrap_err();
        assert!(matches!(err, VocabError::TokenNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_invalid_id() {
        let v = load(VOCAB, MERGES);
        let err = v.id_to_token(1_000_000).unwrap_err();
        assert!(matches!(err, VocabError::InvalidId(1_000_000)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_missing_unknown_token_is_allocated() {
        let v = VocabData::load(r#"{"a": 0, "b": 1}"#, "a b", "<unk>", None).unwrap();
        assert_eq!(v.unk_id(), 2);
        assert_eq!(v.id_to_token(2).unwrap(), "<unk>");
    }

    #[test]
    fn test_byte_encoder_roundtrip() {
        let v = load(VOCAB, MERGES);
        for b in 0u8..=255 {
            let id = v.byte_encoder()[b as usize];
            let token = v.id_to_token(id).unwrap();
            assert_eq!(token, byte_to_char(b).to_string(), "byte {}", b);
        }
        // Bytes already in the vocabulary keep their ids.
        assert_eq!(v.byte_encoder()[b'a' as usize], 0);
    }

    #[test]
    fn test_merges_comment_crlf_and_blank_lines() {
        let v = VocabData::load(VOCAB, "#version: 0.2\r\n\r\na b\r\n\nab c</w>\r\n", "<unk>", None)
            .unwrap();
        assert_eq!(v.merge_count(), 2);
        assert_eq!(v.merge_rule(0, 1).unwrap().rank, 0);
        assert_eq!(v.merge_rule(3, 4).unwrap().rank, 1);
    }

    #[test]
    fn test_comment_after_first_merge_is_a_rule() {
        let err = VocabData::load(VOCAB, "a b\n#oops\n", "<unk>", None).unwrap_err();
        assert!(matches!(err, VocabError::MalformedMerge { line: 2, .. }));
    }

    #[test]
    fn test_malformed_merge_line() {
        let err = VocabData::load(VOCAB, "a b\nabc\n", "<unk>", None).unwrap_err();
        assert!(matches!(err, VocabError::MalformedMerge { line: 2, .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_merge_words_are_allocated() {
        let v = VocabData::load(VOCAB, "x y\n", "<unk>", None).unwrap();
        let x = v.must_token_to_id("x").unwrap();
        let y = v.must_token_to_id("y").unwrap();
        let xy = v.must_token_to_id("xy").unwrap();
        assert_eq!(v.merge_rule(x, y).unwrap().id, xy);
    }

    #[test]
    fn test_special_tokens_registered() {
        let v = VocabData::load(
            r#"{"a": 0, "<|endoftext|>": 1}"#,
            "a a",
            "<|endoftext|>",
            Some("<|startoftext|>\n<|endoftext|>"),
        )
        .unwrap();
        let specials: Vec<(&str, u32)> = v.special_tokens().iter().collect();
        let sot = v.must_token_to_id("<|startoftext|>").unwrap();
        assert_eq!(specials, vec![("<|startoftext|>", sot), ("<|endoftext|>", 1)]);
    }

    #[test]
    fn test_empty_inputs_are_configuration_errors() {
        let err = VocabData::load("", MERGES, "<unk>", None).unwrap_err();
        assert!(matches!(err, VocabError::EmptyVocab));
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = VocabData::load("{}", MERGES, "<unk>", None).unwrap_err();
        assert!(matches!(err, VocabError::EmptyVocab));

        let err = VocabData::load(VOCAB, "\n", "<unk>", None).unwrap_err();
        assert!(matches!(err, VocabError::EmptyMerges));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_bad_json() {
        let err = VocabData::load("{\"a\": -1}", MERGES, "<unk>", None).unwrap_err();
        assert!(matches!(err, VocabError::Json(_)));
    }

    #[test]
    fn test_ids_beyond_vocab_size_rejected() {
        let err = VocabData::load(r#"{"a": 4294967295}"#, "a a", "<unk>", None).unwrap_err();
        assert!(matches!(
            err,
            VocabError::IdOutOfRange {
                id: 4294967295,
                size: 1,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = VocabData::load(r#"{"a": 0, "b": 2000000000}"#, "a b", "<unk>", None)
            .unwrap_err();
        assert!(matches!(err, VocabError::IdOutOfRange { id: 2000000000, .. }));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = VocabData::load(r#"{"a": 0, "b": 0}"#, "a b", "<unk>", None).unwrap_err();
        assert!(matches!(err, VocabError::DuplicateId { id: 0, .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_allocated_ids_follow_vocab() {
        let v = VocabData::load(r#"{"b": 1, "a": 0}"#, "a b", "<unk>", None).unwrap();
        // The unknown token comes first, then the missing byte placeholders.
        assert_eq!(v.unk_id(), 2);
        assert_eq!(v.vocab_size(), 2 + 1 + 254 + 1);
        for id in 0..v.vocab_size() as u32 {
            let token = v.id_to_token(id).unwrap();
            assert_eq!(v.must_token_to_id(token).unwrap(), id);
        }
    }

    #[test]
    fn test_bpe_through_vocab() {
        let v = load(VOCAB, MERGES);
        let mut symbols = vec![Symbol::new(0, 1), Symbol::new(1, 1), Symbol::new(4, 1)];
        v.bpe(&mut symbols);
        assert_eq!(symbols, vec![Symbol::new(5, 3)]);
    }
}
