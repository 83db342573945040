//! Regex-free pre-tokenizer for the CLIP/GPT-2 word pattern.
//!
//! Splits text into the pieces that the pattern
//!
//! ```text
//! 's|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+
//! ```
//!
//! would produce, using hand-written scanners instead of a regex engine. Here
//! `\s` means the Unicode separator class (`Z*`), so control whitespace such as
//! `\t` falls into the punctuation alternative.
//!
//! Contractions are tried first and in a fixed order: the two-character forms
//! `'s`, `'t`, `'m`, `'d`, then the three-character forms `'re`, `'ve`, `'ll`.
//! Anything matching none of the alternatives is dropped one character at a
//! time.

use super::unicode::{is_letter, is_number, is_other, is_separator};

/// A single pre-token: its position in the scanned buffer and its characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreToken<'a> {
    /// Index of the first character in the buffer passed to [`PreTokenizer::new`].
    pub start: usize,
    pub text: &'a [char],
}

impl PreToken<'_> {
    /// Index one past the last character.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn to_text(&self) -> String {
        self.text.iter().collect()
    }
}

/// Lazy scanner over a UTF-32 buffer.
///
/// Each call to `next` consumes one match; the iterator is finished once the
/// buffer is exhausted and cannot be restarted.
pub struct PreTokenizer<'a> {
    text: &'a [char],
    pos: usize,
}

impl<'a> PreTokenizer<'a> {
    pub fn new(text: &'a [char]) -> Self {
        Self { text, pos: 0 }
    }

    /// Characters not yet consumed.
    #[inline]
    fn rest(&self) -> &'a [char] {
        &self.text[self.pos..]
    }

    /// Length of the match at the current position, or 0 if nothing matches.
    fn match_len(&self) -> usize {
        let rest = self.rest();

        if let Some(len) = contraction_len(rest) {
            return len;
        }

        for class in [is_letter as fn(char) -> bool, is_number, is_other] {
            if let Some(len) = spaced_run_len(rest, class) {
                return len;
            }
        }

        separator_run_len(rest)
    }
}

impl<'a> Iterator for PreTokenizer<'a> {
    type Item = PreToken<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let len = self.match_len();
            if len == 0 {
                self.pos += 1;
                continue;
            }

            let start = self.pos;
            self.pos += len;
            return Some(PreToken {
                start,
                text: &self.text[start..self.pos],
            });
        }
        None
    }
}

/// `'s|'t|'re|'ve|'m|'ll|'d`
fn contraction_len(text: &[char]) -> Option<usize> {
    if text.len() < 2 || text[0] != '\'' {
        return None;
    }
    if matches!(text[1], 's' | 't' | 'm' | 'd') {
        return Some(2);
    }
    if text.len() > 2 && matches!((text[1], text[2]), ('r', 'e') | ('v', 'e') | ('l', 'l')) {
        return Some(3);
    }
    None
}

/// ` ?X+` for the class `X`.
fn spaced_run_len(text: &[char], class: fn(char) -> bool) -> Option<usize> {
    let skip = if text.len() > 1 && text[0] == ' ' && class(text[1]) {
        1
    } else if class(text[0]) {
        0
    } else {
        return None;
    };

    let run = text[skip..].iter().take_while(|&&ch| class(ch)).count();
    Some(skip + run)
}

/// `\s+(?!\S)|\s+`
///
/// A run that stops before a non-separator gives its last character back so it
/// can lead the next word.
fn separator_run_len(text: &[char]) -> usize {
    let run = text.iter().take_while(|&&ch| is_separator(ch)).count();
    if run > 1 && run != text.len() {
        run - 1
    } else {
        run
    }
}

/// Collect every pre-token of `text` as an owned string.
pub fn pre_tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    PreTokenizer::new(&chars).map(|t| t.to_text()).collect()
}
