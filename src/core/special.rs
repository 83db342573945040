//! Special-token registry and splitter.
//!
//! Special tokens are literal strings that are emitted as a single id and never
//! go through pre-tokenization or BPE. They are matched in registration order:
//! every occurrence of the first registered token is cut out of the input
//! before the second token is searched for, and so on. Two overlapping special
//! tokens therefore resolve by registration order, not by input position.

use aho_corasick::{AhoCorasick, MatchKind};
use rustc_hash::FxHashMap;

use super::vocab::VocabError;

/// A piece of input produced by [`SpecialTokenMap::split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    /// Byte offset of `text` inside the string that was split.
    pub offset: usize,
    /// Token id when this segment is a special token, `None` for literal text.
    pub special: Option<u32>,
}

impl<'a> Segment<'a> {
    fn literal(text: &'a str, offset: usize) -> Self {
        Self {
            text,
            offset,
            special: None,
        }
    }

    /// `-1` for literal text, the token id otherwise.
    pub fn tag(&self) -> i64 {
        self.special.map_or(-1, i64::from)
    }

    pub fn is_special(&self) -> bool {
        self.special.is_some()
    }
}

struct SpecialToken {
    text: String,
    id: u32,
    matcher: AhoCorasick,
}

/// Ordered set of special tokens.
#[derive(Default)]
pub struct SpecialTokenMap {
    tokens: Vec<SpecialToken>,
    lookup: FxHashMap<String, u32>,
}

impl SpecialTokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `text` with `id`.
    ///
    /// Registering the same string again with the same id is a no-op; with a
    /// different id it is an error, as is registering the empty string.
    pub fn add(&mut self, text: &str, id: u32) -> Result<(), VocabError> {
        if text.is_empty() {
            return Err(VocabError::EmptySpecialToken);
        }
        if let Some(&existing) = self.lookup.get(text) {
            if existing != id {
                return Err(VocabError::DuplicateSpecialToken {
                    token: text.to_string(),
                    existing,
                    requested: id,
                });
            }
            return Ok(());
        }

        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build([text])?;
        self.lookup.insert(text.to_string(), id);
        self.tokens.push(SpecialToken {
            text: text.to_string(),
            id,
            matcher,
        });
        Ok(())
    }

    pub fn get(&self, text: &str) -> Option<u32> {
        self.lookup.get(text).copied()
    }

    pub fn is_special_id(&self, id: u32) -> bool {
        self.tokens.iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Registered tokens in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.tokens.iter().map(|t| (t.text.as_str(), t.id))
    }

    /// Split `input` into alternating literal and special-token segments.
    ///
    /// Segments come back in input order and concatenate to `input`. An empty
    /// input yields no segments.
    pub fn split<'a>(&self, input: &'a str) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        if !input.is_empty() {
            segments.push(Segment::literal(input, 0));
        }

        for token in &self.tokens {
            let mut next = Vec::with_capacity(segments.len());
            for segment in segments {
                if segment.is_special() {
                    next.push(segment);
                    continue;
                }

                let mut last = 0;
                for m in token.matcher.find_iter(segment.text) {
                    if m.start() > last {
                        next.push(Segment::literal(
                            &segment.text[last..m.start()],
                            segment.offset + last,
                        ));
                    }
                    next.push(Segment {
                        text: &segment.text[m.start()..m.end()],
                        offset: segment.offset + m.start(),
                        special: Some(token.id),
                    });
                    last = m.end();
                }
                if last < segment.text.len() {
                    next.push(Segment::literal(
                        &segment.text[last..],
                        segment.offset + last,
                    ));
                }
            }
            segments = next;
        }

        segments
    }
}

impl std::fmt::Debug for SpecialTokenMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags<'a>(segments: &[Segment<'a>]) -> Vec<(&'a str, i64)> {
        segments.iter().map(|s| (s.text, s.tag())).collect()
    }

    #[test]
    fn test_split_without_tokens() {
        let map = SpecialTokenMap::new();
        assert_eq!(tags(&map.split("hello")), vec![("hello", -1)]);
        assert!(map.split("").is_empty());
    }

    #[test]
    fn test_split_single_token() {
        let mut map = SpecialTokenMap::new();
        map.add("<|endoftext|>", 7).unwrap();

        let segments = map.split("a<|endoftext|>b<|endoftext|>");
        assert_eq!(
            tags(&segments),
            vec![("a", -1), ("<|endoftext|>", 7), ("b", -1), ("<|endoftext|>", 7)]
        );
        let offsets: Vec<usize> = segments.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 1, 14, 15]);
    }

    #[test]
    fn test_registration_order_wins() {
        let mut map = SpecialTokenMap::new();
        map.add("<sep>", 1).unwrap();
        map.add("<sep><sep>", 2).unwrap();

        assert_eq!(
            tags(&map.split("<sep><sep>")),
            vec![("<sep>", 1), ("<sep>", 1)]
        );
    }

    #[test]
    fn test_longer_token_first_when_registered_first() {
        let mut map = SpecialTokenMap::new();
        map.add("<sep><sep>", 2).unwrap();
        map.add("<sep>", 1).unwrap();

        assert_eq!(
            tags(&map.split("x<sep><sep><sep>")),
            vec![("x", -1), ("<sep><sep>", 2), ("<sep>", 1)]
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        let mut map = SpecialTokenMap::new();
        assert!(matches!(map.add("", 0), Err(VocabError::EmptySpecialToken)));
    }

    #[test]
    fn test_duplicate_tokens() {
        let mut map = SpecialTokenMap::new();
        map.add("<s>", 3).unwrap();
        map.add("<s>", 3).unwrap();
        assert_eq!(map.len(), 1);

        let err = map.add("<s>", 4).unwrap_err();
        assert!(matches!(
            err,
            VocabError::DuplicateSpecialToken {
                existing: 3,
                requested: 4,
                ..
            }
        ));
    }
}
