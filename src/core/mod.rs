//! Core tokenization engine for clipbpe.
//!
//! # Architecture
//!
//! - [`ClipTokenizer`]: encoding/decoding API, batch padding and offsets
//! - [`vocab`]: loading `vocab.json` + `merges.txt` into immutable lookup tables
//! - [`bpe`]: rank-ordered byte-pair merging over an index-linked arena
//! - [`pretokenizer`]: splits text into words by Unicode category
//! - [`special`]: Aho-Corasick splitting around special tokens
//! - [`byte_level`]: the byte-to-placeholder table CLIP vocabularies use
//! - [`unicode`]: character classification
//!
//! Everything is built once at construction. Encoding never mutates shared
//! state, so batch encoding runs on Rayon without locks.

pub mod bpe;
pub mod byte_level;
mod config;
pub mod pretokenizer;
pub mod special;
mod tokenizer;
pub mod unicode;
pub mod vocab;

pub use byte_level::{byte_level_decode, byte_level_encode};
pub use config::{
    ClipTokenizerConfig, Padding, DEFAULT_BOS_TOKEN, DEFAULT_EOS_TOKEN, DEFAULT_SPECIAL_TOKENS,
};
pub use pretokenizer::pre_tokenize;
pub use tokenizer::{BatchEncoding, ClipTokenizer, Encoding, TokenTensors, TokenizerError};
pub use vocab::{ErrorKind, VocabData, VocabError, END_OF_WORD};
