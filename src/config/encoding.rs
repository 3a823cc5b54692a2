//! Text codecs.
//!
//! Wraps `encoding_rs` so the rest of the crate deals in a small, copyable
//! [`TextEncoding`] handle. Inbound byte streams are decoded with a stateful
//! [`TextDecoder`] so multi-byte sequences split across reads survive.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Minimum spare capacity reserved per coder pass.
///
/// Large enough for one numeric character reference (`&#1114111;`).
const MIN_CODER_RESERVE: usize = 16;

// ============================================================================
// TextEncoding
// ============================================================================

/// Text encoding used for outbound and stream-inbound data.
///
/// Resolved from a WHATWG label such as `utf-8`, `windows-1252`,
/// `iso-8859-2` or `shift_jis`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    /// UTF-8, the default encoding.
    pub const UTF8: Self = Self(UTF_8);

    /// Resolves an encoding label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEncoding`] if the label names no known codec.
    pub fn for_label(label: &str) -> Result<Self> {
        Encoding::for_label(label.trim().as_bytes())
            .map(Self)
            .ok_or_else(|| Error::unknown_encoding(label))
    }

    /// Returns the canonical name of the encoding.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Returns `true` for UTF-8.
    #[inline]
    #[must_use]
    pub fn is_utf8(&self) -> bool {
        self.0 == UTF_8
    }

    /// Appends the encoded form of `text` to `out`.
    ///
    /// Unmappable characters are written as numeric character references.
    /// UTF-16 labels encode to UTF-8, matching `encoding_rs` output rules.
    pub fn encode_into(&self, text: &str, out: &mut Vec<u8>) {
        if self.is_utf8() {
            out.extend_from_slice(text.as_bytes());
            return;
        }

        let mut encoder = self.0.new_encoder();
        let mut remaining = text;
        loop {
            let hint = encoder
                .max_buffer_length_from_utf8_if_no_unmappables(remaining.len())
                .unwrap_or(remaining.len());
            out.reserve(hint.max(MIN_CODER_RESERVE));

            let (result, read, _) = encoder.encode_from_utf8_to_vec(remaining, out, true);
            remaining = &remaining[read..];
            if result == CoderResult::InputEmpty {
                break;
            }
        }
    }

    /// Decodes a complete byte sequence.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> String {
        let mut decoder = self.decoder();
        let mut text = decoder.decode_chunk(bytes);
        text.push_str(&decoder.finish());
        text
    }

    /// Creates a stateful decoder for chunked input.
    #[inline]
    #[must_use]
    pub fn decoder(&self) -> TextDecoder {
        TextDecoder {
            decoder: Some(self.0.new_decoder_without_bom_handling()),
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::UTF8
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.name()).finish()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// TextDecoder
// ============================================================================

/// Stateful decoder for chunked input.
///
/// Bytes of an incomplete sequence at the end of one chunk are held back and
/// completed by the next chunk.
pub struct TextDecoder {
    /// `None` once [`TextDecoder::finish`] ran.
    decoder: Option<Decoder>,
}

impl TextDecoder {
    /// Decodes one chunk, holding back any trailing partial sequence.
    pub fn decode_chunk(&mut self, bytes: &[u8]) -> String {
        self.run(bytes, false)
    }

    /// Flushes held-back bytes as replacement characters.
    ///
    /// Further calls return empty strings.
    pub fn finish(&mut self) -> String {
        self.run(&[], true)
    }

    fn run(&mut self, bytes: &[u8], last: bool) -> String {
        let mut out = String::new();
        let Some(decoder) = self.decoder.as_mut() else {
            return out;
        };

        let mut remaining = bytes;
        loop {
            let hint = decoder
                .max_utf8_buffer_length(remaining.len())
                .unwrap_or(remaining.len().saturating_mul(3));
            out.reserve(hint.max(MIN_CODER_RESERVE));

            let (result, read, _) = decoder.decode_to_string(remaining, &mut out, last);
            remaining = &remaining[read..];
            if result == CoderResult::InputEmpty {
                break;
            }
        }

        if last {
            self.decoder = None;
        }
        out
    }
}

impl fmt::Debug for TextDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextDecoder")
            .field("finished", &self.decoder.is_none())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
