//! Small CLIP-style vocabulary shared by the integration tests.
//!
//! Layout mirrors a real CLIP `vocab.json`: the 256 byte placeholders, then
//! the same placeholders with `</w>`, then merged tokens, then the special
//! tokens.

#![allow(dead_code)]

use clipbpe::core::byte_level::byte_to_char;
use clipbpe::{ClipTokenizer, ClipTokenizerConfig};
use serde_json::{Map, Value};

pub const MERGES: &str = "#version: 0.2
h e
l l
ll o</w>
he llo</w>
w o
r l
wo rl
worl d</w>
";

const MERGED: [&str; 8] = [
    "he", "ll", "llo</w>", "hello</w>", "wo", "rl", "worl", "world</w>",
];

pub const BOS: u32 = 520;
pub const EOS: u32 = 521;
pub const HELLO: u32 = 515;
pub const WORLD: u32 = 519;

pub fn vocab_json() -> String {
    let mut vocab = Map::new();
    let mut next = 0u32;
    let mut add = |token: String| {
        vocab.insert(token, Value::from(next));
        next += 1;
    };

    for b in 0u8..=255 {
        add(byte_to_char(b).to_string());
    }
    for b in 0u8..=255 {
        add(format!("{}</w>", byte_to_char(b)));
    }
    for token in MERGED {
        add(token.to_string());
    }
    add("<|startoftext|>".to_string());
    add("<|endoftext|>".to_string());

    Value::Object(vocab).to_string()
}

pub fn config() -> ClipTokenizerConfig {
    ClipTokenizerConfig::new(vocab_json(), MERGES)
}

pub fn tokenizer() -> ClipTokenizer {
    ClipTokenizer::from_config(&config()).unwrap()
}

pub fn tokenizer_with_padding(padding_length: i64) -> ClipTokenizer {
    ClipTokenizer::from_config(&config().with_padding_length(padding_length)).unwrap()
}
