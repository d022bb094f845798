//! Permissive numeric coercion for user-supplied playback parameters.
//!
//! Bad input never fails: it falls back to a safe default. Repeat counts
//! truncate toward zero and clamp to at least 1, rates must be positive and
//! finite.

pub const DEFAULT_RATE: f64 = 1.0;
pub const DEFAULT_REPEAT: u32 = 1;
pub const DEFAULT_CHUNK_SECONDS: f64 = 5.0;

pub fn coerce_repeat(raw: f64) -> u32 {
    if raw.is_finite() && raw >= 1.0 {
        raw.trunc().min(u32::MAX as f64) as u32
    } else {
        DEFAULT_REPEAT
    }
}

pub fn coerce_rate(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        DEFAULT_RATE
    }
}

/// Chunk lengths must be positive and finite; anything else takes `fallback`
/// (itself coerced to [`DEFAULT_CHUNK_SECONDS`] if invalid).
pub fn coerce_seconds(raw: f64, fallback: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw
    } else if fallback.is_finite() && fallback > 0.0 {
        fallback
    } else {
        DEFAULT_CHUNK_SECONDS
    }
}

/// Parse a repeat count the way a form field would: the leading integer is
/// used and trailing garbage ignored (`"3x"` is 3, `"abc"` is 1).
pub fn parse_repeat(text: &str) -> u32 {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    text[..end]
        .parse::<f64>()
        .map_or(DEFAULT_REPEAT, coerce_repeat)
}

pub fn parse_rate(text: &str) -> f64 {
    text.trim()
        .trim_end_matches('x')
        .parse::<f64>()
        .map_or(DEFAULT_RATE, coerce_rate)
}
