//! Text encoding resolution for descriptor files.
//!
//! Descriptor files announce their encoding in the XML declaration on the
//! first line. The merge tool round-trips bytes verbatim, so the declaration
//! is treated as the source of truth whenever bytes are turned into text or
//! back.

use encoding_rs::Encoding;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;
use tracing::{debug, warn};

static ENCODING_DECLARATION_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_encoding_declaration_regex() -> &'static Regex {
    ENCODING_DECLARATION_REGEX.get_or_init(|| {
        Regex::new(r#"encoding=['"](.*?)['"]"#)
            .expect("Failed to compile encoding declaration regex")
    })
}

/// Labels that mean true ISO-8859-1 rather than the WHATWG windows-1252 alias.
const LATIN1_LABELS: &[&str] = &[
    "iso-8859-1",
    "iso8859-1",
    "iso_8859-1",
    "iso88591",
    "latin1",
    "latin-1",
    "l1",
    "cp819",
    "ibm819",
];

/// Return the value of an `encoding="..."` declaration in `line`, or `default`.
pub fn declared_encoding<'a>(line: &'a str, default: &'a str) -> &'a str {
    get_encoding_declaration_regex()
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map_or(default, |m| m.as_str())
}

/// An encoding a descriptor file can be read and written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// ISO-8859-1: every byte maps to the code point with the same value.
    Latin1,
    /// Any encoding known to `encoding_rs`, UTF-8 included.
    Standard(&'static Encoding),
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::UTF_8
    }
}

impl TextEncoding {
    pub const UTF_8: TextEncoding = TextEncoding::Standard(encoding_rs::UTF_8);

    /// Look up an encoding by label, case-insensitively.
    ///
    /// Only encodings that `encoding_rs` can also write are returned. The
    /// UTF-16 family encodes to UTF-8 there, so it is treated as unknown.
    #[must_use]
    pub fn for_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        if LATIN1_LABELS.contains(&normalized.as_str()) {
            return Some(Self::Latin1);
        }
        Encoding::for_label(normalized.as_bytes())
            .filter(|encoding| encoding.output_encoding() == *encoding)
            .map(Self::Standard)
    }

    /// Resolve the encoding declared in `line`, falling back to `default` when
    /// there is no declaration or the declared label is unknown.
    #[must_use]
    pub fn from_declaration(line: &str, default: TextEncoding) -> Self {
        let label = declared_encoding(line, default.name());
        match Self::for_label(label) {
            Some(encoding) => encoding,
            None => {
                warn!(
                    label,
                    fallback = default.name(),
                    "Unknown encoding declared, using fallback"
                );
                default
            }
        }
    }

    /// Canonical name of the encoding.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Latin1 => "iso-8859-1",
            Self::Standard(encoding) => encoding.name(),
        }
    }

    /// Decode `bytes` strictly, returning `None` on malformed input.
    ///
    /// Latin-1 decoding never fails.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Latin1 => Some(encoding_rs::mem::decode_latin1(bytes).into_owned()),
            Self::Standard(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(Cow::into_owned),
        }
    }

    /// Encode `text`, returning `None` if a character is not representable.
    #[must_use]
    pub fn encode<'a>(&self, text: &'a str) -> Option<Cow<'a, [u8]>> {
        match self {
            Self::Latin1 => encoding_rs::mem::is_str_latin1(text)
                .then(|| encoding_rs::mem::encode_latin1_lossy(text)),
            Self::Standard(encoding) => {
                let (bytes, _, had_unmappable) = encoding.encode(text);
                (!had_unmappable).then_some(bytes)
            }
        }
    }
}

/// Text decoded from a file or stream, with the encoding used to decode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
}

impl DecodedText {
    /// Decode a file's bytes using the encoding its first line declares.
    ///
    /// When the declaration is missing, `default` is used. Bytes that are not
    /// valid in the resolved encoding are read as Latin-1 so they survive a
    /// later write unchanged.
    pub fn from_declared(bytes: &[u8], default: TextEncoding) -> Self {
        let encoding = TextEncoding::from_declaration(&first_line(bytes), default);
        match encoding.decode(bytes) {
            Some(text) => Self { text, encoding },
            None => {
                warn!(
                    declared = encoding.name(),
                    "Content is not valid in its declared encoding, reading as iso-8859-1"
                );
                Self::latin1(bytes)
            }
        }
    }

    /// Decode the raw output of the line-merge tool.
    ///
    /// UTF-8 is tried first with Latin-1 as fallback. The declaration on the
    /// first decoded line then wins: if it names a different encoding, the raw
    /// bytes are decoded again with it.
    pub fn from_merge_output(bytes: &[u8]) -> Self {
        let first_pass = match TextEncoding::UTF_8.decode(bytes) {
            Some(text) => Self {
                text,
                encoding: TextEncoding::UTF_8,
            },
            None => {
                debug!("Merge output is not valid UTF-8, decoding as iso-8859-1");
                Self::latin1(bytes)
            }
        };

        let first_line = first_pass.text.lines().next().unwrap_or_default();
        let declared = TextEncoding::from_declaration(first_line, first_pass.encoding);
        if declared == first_pass.encoding {
            return first_pass;
        }

        match declared.decode(bytes) {
            Some(text) => {
                debug!(
                    from = first_pass.encoding.name(),
                    to = declared.name(),
                    "Re-decoded merge output with its declared encoding"
                );
                Self {
                    text,
                    encoding: declared,
                }
            }
            None => {
                warn!(
                    declared = declared.name(),
                    used = first_pass.encoding.name(),
                    "Merge output is not valid in its declared encoding, keeping first decoding"
                );
                first_pass
            }
        }
    }

    fn latin1(bytes: &[u8]) -> Self {
        Self {
            text: encoding_rs::mem::decode_latin1(bytes).into_owned(),
            encoding: TextEncoding::Latin1,
        }
    }
}

/// First line of `bytes`, read as Latin-1. Declarations are ASCII, so this is
/// enough to find one regardless of the file's actual encoding.
fn first_line(bytes: &[u8]) -> Cow<'_, str> {
    let line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    encoding_rs::mem::decode_latin1(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATIN1_POM: &[u8] =
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<project><name>Caf\xe9</name></project>\n";

    #[test]
    fn test_declared_encoding_double_quotes() {
        let line = r#"<?xml version="1.0" encoding="iso-8859-1"?>"#;
        assert_eq!(declared_encoding(line, "utf-8"), "iso-8859-1");
    }

    #[test]
    fn test_declared_encoding_single_quotes() {
        let line = "<?xml version='1.0' encoding='windows-1252'?>";
        assert_eq!(declared_encoding(line, "utf-8"), "windows-1252");
    }

    #[test]
    fn test_declared_encoding_missing_uses_default() {
        assert_eq!(declared_encoding(r#"<?xml version="1.0"?>"#, "utf-8"), "utf-8");
        assert_eq!(declared_encoding("", "fallback"), "fallback");
    }

    #[test]
    fn test_for_label_latin1_is_not_windows_1252() {
        assert_eq!(TextEncoding::for_label("ISO-8859-1"), Some(TextEncoding::Latin1));
        assert_eq!(TextEncoding::for_label("latin1"), Some(TextEncoding::Latin1));
        assert_eq!(
            TextEncoding::for_label("windows-1252"),
            Some(TextEncoding::Standard(encoding_rs::WINDOWS_1252))
        );
        assert_eq!(TextEncoding::for_label(" UTF-8 "), Some(TextEncoding::UTF_8));
        assert_eq!(TextEncoding::for_label("klingon"), None);
    }

    /// # Unwritable Encodings
    ///
    /// Verifies that encodings which cannot be written back are not resolved.
    ///
    /// ## Test Scenario
    /// - Look up the UTF-16 family by label
    /// - Resolve a declaration naming UTF-16
    ///
    /// ## Expected Outcome
    /// - No encoding is returned and the declaration falls back to the default
    #[test]
    fn test_for_label_rejects_utf16() {
        assert_eq!(TextEncoding::for_label("UTF-16"), None);
        assert_eq!(TextEncoding::for_label("utf-16le"), None);
        assert_eq!(TextEncoding::for_label("UTF-16BE"), None);

        let line = r#"<?xml version="1.0" encoding="UTF-16"?>"#;
        assert_eq!(
            TextEncoding::from_declaration(line, TextEncoding::UTF_8),
            TextEncoding::UTF_8
        );
    }

    #[test]
    fn test_from_declaration_unknown_label_falls_back() {
        let line = r#"<?xml version="1.0" encoding="klingon"?>"#;
        assert_eq!(
            TextEncoding::from_declaration(line, TextEncoding::Latin1),
            TextEncoding::Latin1
        );
    }

    /// # Latin-1 Round Trip
    ///
    /// Verifies that a document declared as iso-8859-1 is read and written
    /// back byte-for-byte.
    ///
    /// ## Test Scenario
    /// - Decode a Latin-1 document containing a non-ASCII byte
    /// - Encode the decoded text with the resolved encoding
    ///
    /// ## Expected Outcome
    /// - The text contains the proper character, no mojibake
    /// - Encoding reproduces the original bytes
    #[test]
    fn test_latin1_round_trip() {
        let decoded = DecodedText::from_declared(LATIN1_POM, TextEncoding::UTF_8);
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
        assert!(decoded.text.contains("Café"));

        let encoded = decoded.encoding.encode(&decoded.text).unwrap();
        assert_eq!(encoded.as_ref(), LATIN1_POM);
    }

    #[test]
    fn test_from_declared_invalid_utf8_falls_back_to_latin1() {
        let bytes = b"<project><name>Caf\xe9</name></project>";
        let decoded = DecodedText::from_declared(bytes, TextEncoding::UTF_8);
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
        assert_eq!(decoded.text, "<project><name>Café</name></project>");
    }

    #[test]
    fn test_merge_output_utf8_without_declaration() {
        let decoded = DecodedText::from_merge_output("<project>ü</project>\n".as_bytes());
        assert_eq!(decoded.encoding, TextEncoding::UTF_8);
        assert_eq!(decoded.text, "<project>ü</project>\n");
    }

    #[test]
    fn test_merge_output_latin1_fallback_matches_declaration() {
        let decoded = DecodedText::from_merge_output(LATIN1_POM);
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
        assert!(decoded.text.contains("Café"));
    }

    /// # Merge Output Re-decoding
    ///
    /// Verifies that the declared encoding overrides the fallback decoding.
    ///
    /// ## Test Scenario
    /// - Output declares windows-1252 and contains byte 0x80
    /// - UTF-8 fails, Latin-1 succeeds, declaration disagrees
    ///
    /// ## Expected Outcome
    /// - Output is re-decoded as windows-1252 and 0x80 becomes the euro sign
    #[test]
    fn test_merge_output_redecoded_with_declared_encoding() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?>\n<price>\x80</price>\n";
        let decoded = DecodedText::from_merge_output(bytes);
        assert_eq!(
            decoded.encoding,
            TextEncoding::Standard(encoding_rs::WINDOWS_1252)
        );
        assert!(decoded.text.contains("<price>€</price>"));
    }

    #[test]
    fn test_merge_output_declared_utf8_but_invalid_keeps_latin1() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<name>Caf\xe9</name>\n";
        let decoded = DecodedText::from_merge_output(bytes);
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
        assert!(decoded.text.contains("Café"));
    }

    #[test]
    fn test_merge_output_empty() {
        let decoded = DecodedText::from_merge_output(b"");
        assert_eq!(decoded.encoding, TextEncoding::UTF_8);
        assert!(decoded.text.is_empty());
    }

    #[test]
    fn test_latin1_encode_rejects_unmappable() {
        assert!(TextEncoding::Latin1.encode("price: €").is_none());
        assert_eq!(
            TextEncoding::Latin1.encode("Café").unwrap().as_ref(),
            b"Caf\xe9"
        );
    }
}
