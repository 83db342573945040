//! Unicode classification used by the pre-tokenizer and whitespace cleanup.
//!
//! The pre-tokenizer only needs four coarse classes out of the Unicode general
//! categories: letters (`L*`), numbers (`N*`), separators (`Z*`) and everything
//! else. Whitespace cleanup uses a different, wider notion of "space" taken from
//! CPython's `str.isspace` table, which also covers ASCII control whitespace
//! such as `\t` and `\r`.

use unicode_general_category::{get_general_category, GeneralCategory};

/// Coarse character class driving pre-tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharCategory {
    /// `Lu`, `Ll`, `Lt`, `Lm`, `Lo`
    Letter,
    /// `Nd`, `Nl`, `No`
    Number,
    /// `Zs`, `Zl`, `Zp`
    Separator,
    /// Anything else, including unassigned and invalid code points.
    Other,
}

/// Classify a 32-bit code point.
///
/// Values that are not Unicode scalar values (surrogates, anything above
/// U+10FFFF) classify as [`CharCategory::Other`].
pub fn category(code_point: u32) -> CharCategory {
    match char::from_u32(code_point) {
        Some(ch) => char_category(ch),
        None => CharCategory::Other,
    }
}

/// Classify a `char`.
#[inline]
pub fn char_category(ch: char) -> CharCategory {
    use GeneralCategory::*;

    match get_general_category(ch) {
        UppercaseLetter | LowercaseLetter | TitlecaseLetter | ModifierLetter | OtherLetter => {
            CharCategory::Letter
        }
        DecimalNumber | LetterNumber | OtherNumber => CharCategory::Number,
        SpaceSeparator | LineSeparator | ParagraphSeparator => CharCategory::Separator,
        _ => CharCategory::Other,
    }
}

#[inline]
pub fn is_letter(ch: char) -> bool {
    char_category(ch) == CharCategory::Letter
}

#[inline]
pub fn is_number(ch: char) -> bool {
    char_category(ch) == CharCategory::Number
}

#[inline]
pub fn is_separator(ch: char) -> bool {
    char_category(ch) == CharCategory::Separator
}

/// Neither letter, number nor separator.
#[inline]
pub fn is_other(ch: char) -> bool {
    char_category(ch) == CharCategory::Other
}

/// Whitespace as CPython's `_PyUnicode_IsWhitespace` defines it.
pub fn is_unicode_space(ch: char) -> bool {
    matches!(
        ch,
        '\u{0009}'..='\u{000D}'
            | '\u{001C}'..='\u{001F}'
            | '\u{0020}'
            | '\u{0085}'
            | '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_classes() {
        assert_eq!(category('a' as u32), CharCategory::Letter);
        assert_eq!(category('Z' as u32), CharCategory::Letter);
        assert_eq!(category('7' as u32), CharCategory::Number);
        assert_eq!(category(' ' as u32), CharCategory::Separator);
        assert_eq!(category('!' as u32), CharCategory::Other);
        assert_eq!(category('\t' as u32), CharCategory::Other);
        assert_eq!(category('\'' as u32), CharCategory::Other);
    }

    #[test]
    fn test_non_ascii_classes() {
        assert_eq!(category(0x4E16), CharCategory::Letter); // 世
        assert_eq!(category(0x00E9), CharCategory::Letter); // é
        assert_eq!(category(0x2164), CharCategory::Number); // Roman numeral five
        assert_eq!(category(0x00BD), CharCategory::Number); // ½
        assert_eq!(category(0x3000), CharCategory::Separator);
        assert_eq!(category(0x2028), CharCategory::Separator);
        assert_eq!(category(0x2029), CharCategory::Separator);
        assert_eq!(category(0x1F980), CharCategory::Other); // crab emoji
        assert_eq!(category(0x0301), CharCategory::Other); // combining acute
    }

    #[test]
    fn test_invalid_code_points_are_other() {
        assert_eq!(category(0xD800), CharCategory::Other);
        assert_eq!(category(0x11_0000), CharCategory::Other);
        assert_eq!(category(u32::MAX), CharCategory::Other);
    }

    #[test]
    fn test_unicode_space_table() {
        for ch in ['\t', '\n', '\u{000B}', '\u{000C}', '\r', ' ', '\u{00A0}', '\u{3000}'] {
            assert!(is_unicode_space(ch), "{:?} should be a space", ch);
        }
        for ch in ['a', '0', '\u{200B}', '\u{FEFF}', '_'] {
            assert!(!is_unicode_space(ch), "{:?} should not be a space", ch);
        }
    }
}
