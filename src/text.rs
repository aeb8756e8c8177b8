use crate::error::DecodeError;
use encoding_rs::SHIFT_JIS;
use indexmap::IndexMap;
use log::{debug, trace};
use std::fmt;

/// Longest string body read before giving up on finding a terminator.
pub const MAX_STRING_BYTES: usize = 5000;

const NAME_OPEN: char = '【';
const NAME_CLOSE: char = '】';

/// Find the body of the string at `offset` in the text segment.
/// Returns the number of bytes consumed (terminator included) and the body.
fn scan_string(text_data: &[u8], offset: usize) -> (usize, &[u8]) {
    if offset >= text_data.len() {
        return (0, &[]);
    }

    let mut pos = offset;
    let mut end = offset;
    while pos < text_data.len() {
        if text_data[pos] == 0 {
            end = pos;
            // A double null terminator is consumed whole
            if text_data.get(pos + 1) == Some(&0) {
                pos += 2;
            } else {
                pos += 1;
            }
            return (pos - offset, &text_data[offset..end]);
        }
        pos += 1;
        end = pos;
        if end - offset >= MAX_STRING_BYTES {
            break;
        }
    }
    (pos - offset, &text_data[offset..end])
}

/// Decode Shift_JIS text, trimming residual NULs.
///
/// `SHIFT_JIS` already covers the cp932 extensions, so bytes it rejects have
/// no compatible fallback left and the decode fails.
fn decode_shift_jis(bytes: &[u8], text_offset: usize) -> Result<String, DecodeError> {
    match SHIFT_JIS.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => Ok(text.trim_matches('\0').to_string()),
        None => {
            debug!("{} bytes at {} are not valid Shift_JIS", bytes.len(), text_offset);
            Err(DecodeError::StringDecodeFailure { text_offset })
        }
    }
}

/// Read a null-terminated string from the text segment.
///
/// Stops at a single `0x00` (consumed), a `0x00 0x00` pair (both consumed) or
/// after `MAX_STRING_BYTES` bytes. Returns `(bytes_consumed, text)`; an offset
/// outside the segment yields `(0, "")`.
pub fn read_string(text_data: &[u8], offset: usize) -> Result<(usize, String), DecodeError> {
    let (consumed, body) = scan_string(text_data, offset);
    Ok((consumed, decode_shift_jis(body, offset)?))
}

/// Whether `text` is a speaker name of the form `【…】`.
pub fn is_bracketed_name(text: &str) -> bool {
    text.starts_with(NAME_OPEN) && text.ends_with(NAME_CLOSE)
}

/// Names seen during one decode run, keyed by their text offset.
#[derive(Debug, Default)]
pub struct NameCache {
    names: IndexMap<usize, String>,
    last_saved: Option<(usize, String)>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, offset: usize) -> Option<&str> {
        self.names.get(&offset).map(|s| s.as_str())
    }

    /// The most recently cached name and its offset.
    pub fn last_saved(&self) -> Option<(usize, &str)> {
        self.last_saved
            .as_ref()
            .map(|(offset, name)| (*offset, name.as_str()))
    }

    /// Cache `text` if it is a bracketed name. Returns true if cached.
    pub fn remember(&mut self, offset: usize, text: &str) -> bool {
        if !is_bracketed_name(text) {
            return false;
        }
        debug!("Cached name '{}' at offset {}", text, offset);
        self.names.insert(offset, text.to_string());
        self.last_saved = Some((offset, text.to_string()));
        true
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Where the text of a [`DecodedText`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    /// Decoded from the text segment.
    Literal,
    /// Empty in the segment; substituted from the name cached at this offset.
    CachedAtOffset,
    /// Empty in the segment; substituted from the last saved name.
    LastSaved { offset: usize },
    /// Empty in the segment and nothing cached to substitute.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub offset: usize,
    pub consumed: usize,
    pub text: String,
    pub source: TextSource,
}

impl fmt::Display for DecodedText {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Text Offset: {}, Length: {}, String = '{}'",
            self.offset, self.consumed, self.text
        )?;
        match &self.source {
            TextSource::Literal => Ok(()),
            TextSource::CachedAtOffset => write!(f, " [CACHED FROM OFFSET {}]", self.offset),
            TextSource::LastSaved { offset } => write!(f, " [CACHED LAST from offset {}]", offset),
            TextSource::Unavailable => write!(f, " [NO CACHE AVAILABLE]"),
        }
    }
}

/// Text segment reader that maintains the name cache.
#[derive(Debug, Default)]
pub struct StringDecoder {
    cache: NameCache,
}

impl StringDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &NameCache {
        &self.cache
    }

    /// Decode the string at `offset`.
    ///
    /// With `resolve_names`, an empty string is replaced by the name cached
    /// at the same offset, else by the last saved name. Bracketed names are
    /// cached whenever they are decoded.
    pub fn decode(
        &mut self,
        text_data: &[u8],
        offset: usize,
        resolve_names: bool,
    ) -> Result<DecodedText, DecodeError> {
        let (consumed, text) = read_string(text_data, offset)?;
        trace!("String at {}: {} bytes, '{}'", offset, consumed, text);

        if text.is_empty() && resolve_names {
            let (text, source) = if let Some(name) = self.cache.get(offset) {
                (name.to_string(), TextSource::CachedAtOffset)
            } else if let Some((saved_at, name)) = self.cache.last_saved() {
                (name.to_string(), TextSource::LastSaved { offset: saved_at })
            } else {
                (String::new(), TextSource::Unavailable)
            };
            return Ok(DecodedText {
                offset,
                consumed,
                text,
                source,
            });
        }

        self.cache.remember(offset, &text);
        Ok(DecodedText {
            offset,
            consumed,
            text,
            source: TextSource::Literal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// "【Name】" in Shift_JIS, null terminated.
    fn sjis_name() -> Vec<u8> {
        let mut bytes = vec![0x81, 0x79];
        bytes.extend_from_slice(b"Name");
        bytes.extend_from_slice(&[0x81, 0x7A, 0x00]);
        bytes
    }

    #[test]
    fn test_single_null_terminator() {
        assert_eq!(read_string(&[0x41, 0x42, 0x00], 0).unwrap(), (3, "AB".to_string()));
    }

    #[test]
    fn test_double_null_terminator() {
        assert_eq!(read_string(&[0x00, 0x00], 0).unwrap(), (2, String::new()));
        assert_eq!(
            read_string(&[0x41, 0x00, 0x00, 0x42], 0).unwrap(),
            (3, "A".to_string())
        );
    }

    #[test]
    fn test_length_cap() {
        let data = vec![0x41u8; MAX_STRING_BYTES + 1];
        let (consumed, text) = read_string(&data, 0).unwrap();
        assert_eq!(consumed, MAX_STRING_BYTES);
        assert_eq!(text.len(), MAX_STRING_BYTES);
    }

    #[test]
    fn test_unterminated_tail_and_out_of_range() {
        assert_eq!(read_string(b"xyAB", 2).unwrap(), (2, "AB".to_string()));
        assert_eq!(read_string(b"AB", 2).unwrap(), (0, String::new()));
        assert_eq!(read_string(b"AB", 50).unwrap(), (0, String::new()));
    }

    #[test]
    fn test_shift_jis_decoding() {
        let (consumed, text) = read_string(&sjis_name(), 0).unwrap();
        assert_eq!(consumed, 9);
        assert_eq!(text, "【Name】");
        // "あ" = 0x82 0xA0
        assert_eq!(
            read_string(&[0x82, 0xA0, 0x00], 0).unwrap(),
            (3, "あ".to_string())
        );
    }

    #[test]
    fn test_invalid_bytes_fail() {
        let mut decoder = StringDecoder::new();
        // 0x81 followed by 0x20 is not a valid double-byte sequence
        let err = decoder.decode(&[0x41, 0x81, 0x20, 0x00], 0, false).unwrap_err();
        assert!(matches!(err, DecodeError::StringDecodeFailure { text_offset: 0 }));
        assert!(err.is_fatal());
        assert!(matches!(
            read_string(&[0x20, 0x41, 0x81, 0x20, 0x00], 1),
            Err(DecodeError::StringDecodeFailure { text_offset: 1 })
        ));
    }

    #[test]
    fn test_bracketed_names_only() {
        let mut cache = NameCache::new();
        assert!(!cache.remember(0, "Name"));
        assert!(!cache.remember(0, "【Name"));
        assert!(!cache.remember(0, "】"));
        assert!(cache.remember(7, "【Name】"));
        assert_eq!(cache.get(7), Some("【Name】"));
        assert_eq!(cache.last_saved(), Some((7, "【Name】")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_name_uses_last_saved() {
        let mut text_data = vec![0x20u8; 100];
        text_data.extend_from_slice(&sjis_name());
        let empty_at = text_data.len();
        text_data.extend_from_slice(&[0x00, 0x00]);

        let mut decoder = StringDecoder::new();
        let name = decoder.decode(&text_data, 100, true).unwrap();
        assert_eq!(name.text, "【Name】");
        assert_eq!(name.source, TextSource::Literal);

        let resolved = decoder.decode(&text_data, empty_at, true).unwrap();
        assert_eq!(resolved.text, "【Name】");
        assert_eq!(resolved.consumed, 2);
        assert_eq!(resolved.source, TextSource::LastSaved { offset: 100 });
    }

    #[test]
    fn test_empty_name_uses_name_cached_at_same_offset() {
        let mut decoder = StringDecoder::new();
        // "【A】" at offset 0
        let name = decoder
            .decode(&[0x81, 0x79, 0x41, 0x81, 0x7A, 0x00], 0, true)
            .unwrap();
        assert_eq!(name.text, "【A】");

        // A later text segment with an empty string at the same offset
        let resolved = decoder.decode(&[0x00, 0x00], 0, true).unwrap();
        assert_eq!(resolved.text, "【A】");
        assert_eq!(resolved.consumed, 2);
        assert_eq!(resolved.source, TextSource::CachedAtOffset);
    }

    #[test]
    fn test_empty_without_resolution_stays_empty() {
        let mut decoder = StringDecoder::new();
        let mut text_data = sjis_name();
        let empty_at = text_data.len();
        text_data.push(0x00);

        decoder.decode(&text_data, 0, false).unwrap();
        let plain = decoder.decode(&text_data, empty_at, false).unwrap();
        assert_eq!(plain.text, "");
        assert_eq!(plain.source, TextSource::Literal);
    }

    #[test]
    fn test_empty_name_with_nothing_cached() {
        let mut decoder = StringDecoder::new();
        let decoded = decoder.decode(&[0x00], 0, true).unwrap();
        assert_eq!(decoded.text, "");
        assert_eq!(decoded.source, TextSource::Unavailable);
        assert_eq!(
            decoded.to_string(),
            "Text Offset: 0, Length: 1, String = '' [NO CACHE AVAILABLE]"
        );
    }
}
