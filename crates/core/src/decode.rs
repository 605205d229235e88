//! Decoders for provider-specific field encodings
//!
//! The primary feed packs pair identifiers into big integers (oracle
//! "short strings": ASCII bytes read as one big-endian number) and sends
//! prices as digit strings with an implicit 8-decimal fixed-point scale.
//! Secondary feeds send mantissa/exponent pairs or plain decimal strings.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::{DecodeError, DecodeResult, TickerId};

/// Implicit fixed-point scale of primary feed prices
pub const PRICE_DECIMALS: usize = 8;

/// Largest short string that fits in the 256-bit carrier
const MAX_SHORT_STRING_LEN: usize = 32;

/// Decode a short-string integer (`0x`-prefixed hex or plain decimal) to its
/// ASCII text.
pub fn decode_short_string(raw: &str) -> DecodeResult<String> {
    let raw = raw.trim();
    let (digits, radix) = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => (hex, 16u64),
        None => (raw, 10u64),
    };

    if digits.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let valid = match radix {
        16 => digits.chars().all(|c| c.is_ascii_hexdigit()),
        _ => digits.chars().all(|c| c.is_ascii_digit()),
    };
    if !valid {
        return Err(DecodeError::InvalidNumber(raw.to_string()));
    }

    let value = U256::from_str_radix(digits, radix)
        .map_err(|_| DecodeError::OutOfRange(raw.to_string()))?;

    let bytes = value.to_be_bytes::<32>();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let significant = &bytes[start..];

    if significant.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    if !significant.is_ascii() {
        return Err(DecodeError::NonAscii);
    }

    // ASCII is valid UTF-8
    Ok(significant.iter().map(|b| *b as char).collect())
}

/// Encode ASCII text as a `0x`-prefixed short-string integer
pub fn encode_short_string(text: &str) -> DecodeResult<String> {
    if text.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    if !text.is_ascii() {
        return Err(DecodeError::NonAscii);
    }
    if text.len() > MAX_SHORT_STRING_LEN {
        return Err(DecodeError::OutOfRange(text.to_string()));
    }

    let value = text
        .bytes()
        .fold(U256::ZERO, |acc, b| (acc << 8) | U256::from(b));

    Ok(format!("0x{:x}", value))
}

/// Decode a primary-feed pair identifier to a canonical ticker.
///
/// Decoded text is usually already `BASE/QUOTE`; compact forms are accepted too.
pub fn decode_ticker(raw: &str) -> DecodeResult<TickerId> {
    let text = decode_short_string(raw)?;

    if text.contains('/') {
        TickerId::parse(&text).map_err(|_| DecodeError::UnknownSymbol(text))
    } else {
        TickerId::from_compact(&text)
    }
}

/// Decode a primary-feed price: a digit string with the decimal point
/// implied [`PRICE_DECIMALS`] places from the right.
///
/// Strings of eight digits or fewer carry no integer part and are rejected
/// rather than read as `0.xxx`.
pub fn decode_price(raw_digits: &str) -> DecodeResult<Decimal> {
    let digits = raw_digits.trim();

    if digits.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(DecodeError::InvalidDigits(digits.to_string()));
    }
    if digits.len() <= PRICE_DECIMALS {
        return Err(DecodeError::MissingIntegerPart(digits.to_string()));
    }

    let (whole, fraction) = digits.split_at(digits.len() - PRICE_DECIMALS);
    Decimal::from_str(&format!("{}.{}", whole, fraction))
        .map_err(|_| DecodeError::OutOfRange(digits.to_string()))
}

/// Decode `mantissa * 10^expo` exactly
pub fn decode_scaled(mantissa: i64, expo: i32) -> DecodeResult<Decimal> {
    let out_of_range = || DecodeError::OutOfRange(format!("{}e{}", mantissa, expo));

    if expo <= 0 {
        let scale = expo.unsigned_abs();
        Decimal::try_from_i128_with_scale(mantissa as i128, scale).map_err(|_| out_of_range())
    } else {
        let factor = 10i64.checked_pow(expo as u32).ok_or_else(out_of_range)?;
        Decimal::from(mantissa)
            .checked_mul(Decimal::from(factor))
            .ok_or_else(out_of_range)
    }
}

/// Decode an already-normalized decimal string
pub fn decode_decimal(raw: &str) -> DecodeResult<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    Decimal::from_str(raw).map_err(|_| DecodeError::InvalidNumber(raw.to_string()))
}
