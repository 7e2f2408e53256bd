// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-width number formatting and strict token parsing.
//!
//! The peer parses doubles written as C `%20.15e` (sign, one digit, 15 decimals,
//! `e`, explicit exponent sign, at least two exponent digits, right aligned in at
//! least 20 columns). Rust's `{:e}` writes `1e0`, so the exponent is rebuilt here.

use super::CodecError;

/// Column width of a formatted double.
pub const DOUBLE_WIDTH: usize = 20;

/// Digits after the decimal point of a formatted double.
pub const DOUBLE_PRECISION: usize = 15;

/// Format `value` exactly like C `printf("%20.15e", value)`.
pub fn format_double(value: f64) -> String {
    let body = if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let text = if value.is_sign_negative() { "-inf" } else { "inf" };
        text.to_string()
    } else {
        let raw = format!("{:.*e}", DOUBLE_PRECISION, value);
        match raw.split_once('e') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or(0);
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{}e{}{:02}", mantissa, sign, exponent.unsigned_abs())
            }
            None => raw,
        }
    };
    format!("{:>width$}", body, width = DOUBLE_WIDTH)
}

/// Parse a decimal integer token, rejecting garbage and overflow.
pub fn parse_int(token: &str, field: &'static str) -> Result<i32, CodecError> {
    token.parse::<i32>().map_err(|e| {
        use std::num::IntErrorKind;
        match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => CodecError::OutOfRange {
                field,
                token: token.to_string(),
            },
            _ => CodecError::InvalidInteger {
                field,
                token: token.to_string(),
            },
        }
    })
}

/// Parse a floating point token, rejecting garbage and overflow to infinity.
pub fn parse_double(token: &str, field: &'static str) -> Result<f64, CodecError> {
    let value = token
        .parse::<f64>()
        .map_err(|_| CodecError::InvalidDouble {
            field,
            token: token.to_string(),
        })?;

    if value.is_infinite() && !token.trim_start_matches(['+', '-']).starts_with(['i', 'I']) {
        return Err(CodecError::OutOfRange {
            field,
            token: token.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_matches_printf() {
        assert_eq!(format_double(0.0), "0.000000000000000e+00");
        assert_eq!(format_double(1.0), "1.000000000000000e+00");
        assert_eq!(format_double(-1.0), "-1.000000000000000e+00");
        assert_eq!(format_double(86400.0), "8.640000000000000e+04");
        assert_eq!(format_double(1.5e-7), "1.500000000000000e-07");
        assert_eq!(format_double(2.0e200), "2.000000000000000e+200");
    }

    #[test]
    fn test_formatted_width() {
        // the digits alone overflow the column, so no padding is added
        assert_eq!(format_double(20.5).len(), DOUBLE_WIDTH + 1);
        assert_eq!(format_double(-20.5).len(), DOUBLE_WIDTH + 2);
    }

    #[test]
    fn test_non_finite() {
        assert_eq!(format_double(f64::NAN).trim(), "nan");
        assert_eq!(format_double(f64::NEG_INFINITY).trim(), "-inf");
        assert_eq!(format_double(f64::INFINITY).len(), DOUBLE_WIDTH);
    }

    #[test]
    fn test_parse_int_strict() {
        assert_eq!(parse_int("42", "nDbl").unwrap(), 42);
        assert_eq!(parse_int("-3", "flag").unwrap(), -3);
        assert!(matches!(
            parse_int("4x", "nDbl"),
            Err(CodecError::InvalidInteger { field: "nDbl", .. })
        ));
        assert!(matches!(
            parse_int("99999999999", "nDbl"),
            Err(CodecError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_parse_double_strict() {
        assert_eq!(parse_double("1.000000000000000e+00", "time").unwrap(), 1.0);
        assert!(parse_double("inf", "double").unwrap().is_infinite());
        assert!(matches!(
            parse_double("1e999", "double"),
            Err(CodecError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_double("abc", "double"),
            Err(CodecError::InvalidDouble { .. })
        ));
    }
}
