// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Text vector codec for the simulation socket.
//!
//! Every message is one ASCII line of space-terminated tokens:
//!
//! ```text
//! version flag [nDbl nInt nBool time double... int... bool...] \n
//! ```
//!
//! The bracketed part is only present when `flag == 0` (data). Doubles and the
//! time stamp use C `%20.15e`, integers and booleans use `%d`. Every token,
//! including the last one, is followed by a single space.
//!
//! # Example
//!
//! ```
//! use epfmu::codec::{decode, encode, WireMessage};
//!
//! let msg = WireMessage::data(900.0, vec![21.5, 0.25]);
//! let line = encode(&msg);
//! assert!(line.ends_with(" \n"));
//! assert_eq!(decode(line.as_bytes()).unwrap(), msg);
//! ```

mod number;

pub use number::{format_double, parse_double, parse_int};

use std::fmt;
use std::fmt::Write as _;

use crate::config::{
    DOUBLE_FIELD_WIDTH, FLAG_DATA, FLAG_TERMINATE, HEADER_LENGTH, PROTOCOL_VERSION,
    TIME_FIELD_WIDTH,
};

/// Wire codec error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer is not ASCII text.
    InvalidUtf8,
    /// Message ended before `field` was read.
    Truncated { field: &'static str },
    /// Token is not a decimal integer.
    InvalidInteger { field: &'static str, token: String },
    /// Token is not a floating point number.
    InvalidDouble { field: &'static str, token: String },
    /// Token does not fit the target type.
    OutOfRange { field: &'static str, token: String },
    /// Element count below zero.
    NegativeCount { field: &'static str, value: i32 },
    /// Tokens left after the declared payload.
    TrailingData(String),
    /// Integer or boolean payloads are not exchanged by this adapter.
    UnsupportedValues { n_int: usize, n_bool: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::InvalidUtf8 => write!(f, "message is not ASCII text"),
            CodecError::Truncated { field } => write!(f, "message truncated before {}", field),
            CodecError::InvalidInteger { field, token } => {
                write!(f, "{} is not an integer: '{}'", field, token)
            }
            CodecError::InvalidDouble { field, token } => {
                write!(f, "{} is not a number: '{}'", field, token)
            }
            CodecError::OutOfRange { field, token } => {
                write!(f, "{} out of range: '{}'", field, token)
            }
            CodecError::NegativeCount { field, value } => {
                write!(f, "{} must not be negative (got {})", field, value)
            }
            CodecError::TrailingData(token) => write!(f, "unexpected trailing token '{}'", token),
            CodecError::UnsupportedValues { n_int, n_bool } => write!(
                f,
                "peer sent {} integers and {} booleans, only doubles are supported",
                n_int, n_bool
            ),
        }
    }
}

impl std::error::Error for CodecError {}

/// Leading fields of a message, decodable on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version of the sender.
    pub version: i32,
    /// 0 for data, anything else is a control signal.
    pub flag: i32,
    /// Number of doubles.
    pub n_dbl: usize,
    /// Number of integers.
    pub n_int: usize,
    /// Number of booleans.
    pub n_bool: usize,
}

impl Header {
    /// `true` when the message carries a payload.
    pub const fn is_data(&self) -> bool {
        self.flag == FLAG_DATA
    }

    /// Buffer length needed to receive a message with this header.
    ///
    /// `HEADER_LENGTH + 21 + 22 * nDbl + 1`. Integer and boolean payloads are
    /// rejected since their width is not bounded.
    pub fn required_length(&self) -> Result<usize, CodecError> {
        if self.n_int > 0 || self.n_bool > 0 {
            return Err(CodecError::UnsupportedValues {
                n_int: self.n_int,
                n_bool: self.n_bool,
            });
        }
        Ok(HEADER_LENGTH + TIME_FIELD_WIDTH + DOUBLE_FIELD_WIDTH * self.n_dbl + 1)
    }
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub version: i32,
    pub flag: i32,
    /// Simulation time in seconds (data messages only).
    pub time: f64,
    pub doubles: Vec<f64>,
    pub ints: Vec<i32>,
    pub bools: Vec<bool>,
}

impl WireMessage {
    /// Data message carrying `doubles` at simulation time `time`.
    pub fn data(time: f64, doubles: Vec<f64>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flag: FLAG_DATA,
            time,
            doubles,
            ints: Vec::new(),
            bools: Vec::new(),
        }
    }

    /// Control message with no payload.
    pub fn control(flag: i32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flag,
            time: 0.0,
            doubles: Vec::new(),
            ints: Vec::new(),
            bools: Vec::new(),
        }
    }

    /// End-of-simulation message.
    pub fn terminate() -> Self {
        Self::control(FLAG_TERMINATE)
    }

    /// Header describing this message.
    pub fn header(&self) -> Header {
        Header {
            version: self.version,
            flag: self.flag,
            n_dbl: self.doubles.len(),
            n_int: self.ints.len(),
            n_bool: self.bools.len(),
        }
    }
}

/// Encode `msg` as one newline-terminated line.
pub fn encode(msg: &WireMessage) -> String {
    let mut line = String::with_capacity(
        32 + TIME_FIELD_WIDTH + DOUBLE_FIELD_WIDTH * msg.doubles.len() + 12 * msg.ints.len(),
    );
    // Writing into a String cannot fail.
    let _ = write!(line, "{} {} ", msg.version, msg.flag);
    if msg.flag == FLAG_DATA {
        let _ = write!(
            line,
            "{} {} {} {} ",
            msg.doubles.len(),
            msg.ints.len(),
            msg.bools.len(),
            format_double(msg.time)
        );
        for value in &msg.doubles {
            line.push_str(&format_double(*value));
            line.push(' ');
        }
        for value in &msg.ints {
            let _ = write!(line, "{} ", value);
        }
        for value in &msg.bools {
            line.push_str(if *value { "1 " } else { "0 " });
        }
    }
    line.push('\n');
    line
}

/// Decode only the header of the first message in `buf`.
///
/// `buf` may hold a partial message or several messages; only the tokens
/// before the first newline are considered.
pub fn decode_header(buf: &[u8]) -> Result<Header, CodecError> {
    let text = first_line(buf)?;
    let mut tokens = text.split_ascii_whitespace();
    read_header(&mut tokens)
}

/// Decode one complete message.
pub fn decode(buf: &[u8]) -> Result<WireMessage, CodecError> {
    let text = first_line(buf)?;
    let mut tokens = text.split_ascii_whitespace();
    let header = read_header(&mut tokens)?;

    let mut msg = WireMessage::control(header.flag);
    msg.version = header.version;

    if header.is_data() {
        msg.time = parse_double(next_token(&mut tokens, "time")?, "time")?;
        msg.doubles = (0..header.n_dbl)
            .map(|_| parse_double(next_token(&mut tokens, "double")?, "double"))
            .collect::<Result<_, _>>()?;
        msg.ints = (0..header.n_int)
            .map(|_| parse_int(next_token(&mut tokens, "int")?, "int"))
            .collect::<Result<_, _>>()?;
        msg.bools = (0..header.n_bool)
            .map(|_| parse_int(next_token(&mut tokens, "bool")?, "bool").map(|v| v != 0))
            .collect::<Result<_, _>>()?;
    }

    if let Some(extra) = tokens.next() {
        return Err(CodecError::TrailingData(extra.to_string()));
    }
    Ok(msg)
}

fn first_line(buf: &[u8]) -> Result<&str, CodecError> {
    let end = buf.iter().position(|&b| b == b'\n').unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end]).map_err(|_| CodecError::InvalidUtf8)
}

fn next_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    field: &'static str,
) -> Result<&'a str, CodecError> {
    tokens.next().ok_or(CodecError::Truncated { field })
}

fn read_count<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    field: &'static str,
) -> Result<usize, CodecError> {
    let value = parse_int(next_token(tokens, field)?, field)?;
    usize::try_from(value).map_err(|_| CodecError::NegativeCount { field, value })
}

fn read_header<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<Header, CodecError> {
    let version = parse_int(next_token(tokens, "version")?, "version")?;
    let flag = parse_int(next_token(tokens, "flag")?, "flag")?;

    let mut header = Header {
        version,
        flag,
        n_dbl: 0,
        n_int: 0,
        n_bool: 0,
    };
    if header.is_data() {
        header.n_dbl = read_count(tokens, "nDbl")?;
        header.n_int = read_count(tokens, "nInt")?;
        header.n_bool = read_count(tokens, "nBool")?;
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        let scale = a.abs().max(b.abs()).max(f64::MIN_POSITIVE);
        assert!((a - b).abs() / scale < 1e-14, "{} != {}", a, b);
    }

    #[test]
    fn test_encode_layout() {
        let line = encode(&WireMessage::data(0.0, vec![1.0, -2.5]));
        assert_eq!(
            line,
            "2 0 2 0 0 0.000000000000000e+00 1.000000000000000e+00 -2.500000000000000e+00 \n"
        );
    }

    #[test]
    fn test_encode_control_has_no_payload() {
        assert_eq!(encode(&WireMessage::terminate()), "2 1 \n");
    }

    #[test]
    fn test_encode_ints_and_bools() {
        let mut msg = WireMessage::data(1.0, vec![]);
        msg.ints = vec![3, -4];
        msg.bools = vec![true, false];
        assert_eq!(encode(&msg), "2 0 0 2 2 1.000000000000000e+00 3 -4 1 0 \n");
        assert_eq!(decode(encode(&msg).as_bytes()).unwrap(), msg);
    }

    #[test]
    fn test_round_trip_random_vectors() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for n in 0..40 {
            let doubles: Vec<f64> = (0..n).map(|_| (rng.f64() - 0.5) * 10f64.powi(rng.i32(-30..30))).collect();
            let msg = WireMessage::data(rng.f64() * 31_536_000.0, doubles);
            let back = decode(encode(&msg).as_bytes()).unwrap();
            assert_eq!(back.version, msg.version);
            assert_eq!(back.flag, msg.flag);
            assert_eq!(back.doubles.len(), msg.doubles.len());
            assert_close(back.time, msg.time);
            for (a, b) in back.doubles.iter().zip(&msg.doubles) {
                assert_close(*a, *b);
            }
        }
    }

    #[test]
    fn test_round_trip_control_flags() {
        for flag in [1, -1, 2] {
            let msg = WireMessage::control(flag);
            assert_eq!(decode(encode(&msg).as_bytes()).unwrap(), msg);
        }
    }

    #[test]
    fn test_header_alone() {
        let header = decode_header(b"2 0 3 0 0 1.0").unwrap();
        assert_eq!(header.n_dbl, 3);
        assert_eq!(header.required_length().unwrap(), HEADER_LENGTH + 21 + 22 * 3 + 1);

        let header = decode_header(b"1 1 \n").unwrap();
        assert_eq!(header.version, 1);
        assert!(!header.is_data());
    }

    #[test]
    fn test_header_stops_at_first_line() {
        let header = decode_header(b"2 1 \n2 0 5 0 0 ").unwrap();
        assert_eq!(header.flag, 1);
        assert_eq!(header.n_dbl, 0);
    }

    #[test]
    fn test_required_length_rejects_ints() {
        let header = decode_header(b"2 0 1 1 0 ").unwrap();
        assert!(matches!(
            header.required_length(),
            Err(CodecError::UnsupportedValues { n_int: 1, n_bool: 0 })
        ));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode(b"2 0 2 0 0 1.0 5.0 \n"), Err(CodecError::Truncated { field: "double" })));
        assert!(matches!(decode(b"2 0 -1 0 0 1.0\n"), Err(CodecError::NegativeCount { field: "nDbl", .. })));
        assert!(matches!(decode(b"two 0\n"), Err(CodecError::InvalidInteger { field: "version", .. })));
        assert!(matches!(decode(b"2 0 0 0 0 1.0 7\n"), Err(CodecError::TrailingData(_))));
        assert!(matches!(decode(b"2\n"), Err(CodecError::Truncated { field: "flag" })));
        assert!(matches!(decode(&[0xff, b' ', b'\n']), Err(CodecError::InvalidUtf8)));
    }
}
