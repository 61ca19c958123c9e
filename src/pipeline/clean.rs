//! Text normalisation applied to downloaded results.
//!
//! Two passes, used at different points:
//!
//! 1. [`strip_bom`] runs on every decoded result before it is stored in the
//!    record or written to disk.
//! 2. [`strip_leading_noise`] runs only on the copy handed to the XML parser:
//!    it trims and removes any run of non-word characters in front of the
//!    first `<`, so a stray BOM or control byte never fails the prolog.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

const BOM: char = '\u{FEFF}';

/// Remove a single leading byte-order mark.
pub fn strip_bom(input: &str) -> &str {
    input.strip_prefix(BOM).unwrap_or(input)
}

static RE_LEADING_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\W+<").unwrap());

/// Trim, then drop non-word characters preceding the first `<`.
pub fn strip_leading_noise(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim();
    match RE_LEADING_NOISE.find(trimmed) {
        Some(m) => Cow::Owned(format!("<{}", &trimmed[m.end()..])),
        None => Cow::Borrowed(trimmed),
    }
}

/// Decode raw result bytes as UTF-8, honouring a UTF-8 or UTF-16 BOM.
///
/// Invalid sequences are replaced rather than rejected; the structural
/// validator reports the damage if it matters.
pub fn decode_result(bytes: &[u8]) -> String {
    let (text, _, _) = encoding_rs::UTF_8.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_removed_once() {
        assert_eq!(strip_bom("\u{FEFF}<a/>"), "<a/>");
        assert_eq!(strip_bom("<a/>"), "<a/>");
        assert_eq!(strip_bom("\u{FEFF}\u{FEFF}x"), "\u{FEFF}x");
    }

    #[test]
    fn leading_noise_stripped_before_tag() {
        assert_eq!(strip_leading_noise("  \u{FEFF}\u{1}<root/>\n"), "<root/>");
        assert_eq!(strip_leading_noise("<?xml version=\"1.0\"?><r/>"), "<?xml version=\"1.0\"?><r/>");
    }

    #[test]
    fn text_without_tags_only_trimmed() {
        assert_eq!(strip_leading_noise("  hello  "), "hello");
        assert_eq!(strip_leading_noise(""), "");
    }

    #[test]
    fn decode_sniffs_utf16_bom() {
        let bytes = [0xFF, 0xFE, b'<', 0, b'a', 0, b'/', 0, b'>', 0];
        assert_eq!(decode_result(&bytes), "<a/>");
        assert_eq!(decode_result("\u{FEFF}<b/>".as_bytes()), "<b/>");
    }
}
