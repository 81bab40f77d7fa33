use std::borrow::Cow;

use encoding::all::{UTF_8, UTF_16LE};
use encoding::{DecoderTrap, EncodingRef};
use log::trace;

/// How many leading bytes are sniffed when guessing the encoding of a string payload.
const SNIFF_LEN: usize = 10;

/// Text encodings found in string events.
///
/// Older project versions store 8-bit strings, newer ones UTF-16LE, and nothing in the
/// event itself says which one is used.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StringEncoding {
    Utf16Le,
    Utf8,
}

impl StringEncoding {
    /// Guesses the encoding of `data`: a NUL at any odd index among the first ten bytes
    /// means UTF-16LE (the high byte of an ASCII code unit), anything else is treated as UTF-8.
    pub fn sniff(data: &[u8]) -> Self {
        let has_nul_high_byte = data
            .iter()
            .take(SNIFF_LEN)
            .skip(1)
            .step_by(2)
            .any(|&b| b == 0);

        if has_nul_high_byte {
            StringEncoding::Utf16Le
        } else {
            StringEncoding::Utf8
        }
    }

    fn codec(self) -> EncodingRef {
        match self {
            StringEncoding::Utf16Le => UTF_16LE,
            StringEncoding::Utf8 => UTF_8,
        }
    }
}

/// Decodes a string payload using the sniffed encoding.
///
/// If the payload is not valid in that encoding, it is decoded again with `ansi_codec`,
/// replacing anything the codec cannot represent. The result is trimmed.
pub fn decode_string(data: &[u8], ansi_codec: EncodingRef) -> Result<String, Cow<'static, str>> {
    let encoding = StringEncoding::sniff(data);

    let decoded = match encoding.codec().decode(data, DecoderTrap::Strict) {
        Ok(s) => s,
        Err(reason) => {
            trace!(
                "payload is not valid {:?} ({}), falling back to `{}`",
                encoding,
                reason,
                ansi_codec.name()
            );
            ansi_codec.decode(data, DecoderTrap::Replace)?
        }
    };

    Ok(trim(&decoded).to_owned())
}

/// Trims like the tools that write these files: every character up to and
/// including the space is stripped, which drops NUL terminators. Other Unicode
/// whitespace is kept.
pub fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c <= ' ')
}
