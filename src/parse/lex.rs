//! Tokenizing NAS assembly.
//!
//! This module holds the tokens that characterize NAS assembly ([`Token`]).
//! This module is used by the parser to facilitate the conversion of
//! assembly source code into an AST.
//!
//! The module's key data structure is the [`Token`] enum,
//! which lists all of the tokens of NAS assembly.

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

/// A unit of information in NAS source code.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+", error = LexErr)]
pub enum Token {
    // As with most assemblers, the numeric regexes here are intentionally loose
    // (e.g., `23trst` matches for unsigned). The callback decides whether
    // the collected unit is a valid literal.

    /// An unsigned numeric value (e.g., `9`, `0x7f`, `0XFF`)
    #[regex(r"\d\w*", lex_unsigned)]
    Unsigned(u16),

    /// A signed numeric value (e.g., `-9`, `-0x7f`)
    #[regex(r"-\w*", lex_signed)]
    Signed(i16),

    /// A register value (i.e., `r0`-`r15`)
    #[regex(r"[Rr]\d+", lex_reg)]
    Reg(u8),

    /// An identifier.
    ///
    /// This can refer to either:
    /// - a label (e.g., `loop`, `end`, `data1`)
    /// - a mnemonic (e.g. `add`, `jumpe`, `word`)
    ///
    /// This token type is case-insensitive.
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().parse::<Ident>().ok())]
    Ident(Ident),

    /// A label with a constant displacement (e.g., `table+3`, `end-1`, `data+0x10`).
    #[regex(r"[A-Za-z_]\w*[+-]\d\w*", lex_label_offset)]
    LabelOffset((String, i16)),

    /// A colon, which ends a label definition
    #[token(":")]
    Colon,

    /// A comma, which can optionally separate operands
    #[token(",")]
    Comma,

    /// A comment, which starts with `//` and spans the remaining part of the line.
    #[regex(r"//[^\n]*")]
    Comment,

    /// A new line
    #[token("\n")]
    NewLine
}

macro_rules! ident_enum {
    ($($instr:ident),+) => {
        /// An identifier.
        ///
        /// This can refer to either:
        /// - a label (e.g., `loop`, `end`, `data1`)
        /// - a mnemonic (e.g. `add`, `jumpe`, `word`)
        ///
        /// This token type is case insensitive.
        #[derive(Debug, PartialEq, Eq, Clone)]
        pub enum Ident {
            $(
                #[allow(missing_docs)]
                $instr
            ),+,
            #[allow(missing_docs)]
            Label(String)
        }

        impl std::str::FromStr for Ident {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match &*s.to_uppercase() {
                    $(stringify!($instr) => Ok(Self::$instr)),*,
                    _ => Ok(Self::Label(s.to_string()))
                }
            }
        }

        impl std::fmt::Display for Ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$instr => f.write_str(&stringify!($instr).to_lowercase())),*,
                    Self::Label(id) => f.write_str(id)
                }
            }
        }
    };
}
ident_enum! {
    HALT, NOOP, LOAD, LOADC, LOADR, STORE, STORER, MOVE,
    ADD, ADDC, MUL, SUB, SHIFT, AND, OR, XOR,
    JUMP, JUMPE, JUMPN, JUMPL, JUMPLE, WORD
}

/// Any errors raised in attempting to tokenize an input stream.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal (unsigned dec or hex) cannot fit within the range of a u16
    DoesNotFitU16,
    /// Numeric literal (signed dec or hex) cannot fit within the range of a i16
    DoesNotFitI16,
    /// Hex literal (starting with 0x) has invalid hex digits
    InvalidHex,
    /// Numeric literal could not be parsed as a decimal literal because it has invalid digits (i.e., not 0-9)
    InvalidNumeric,
    /// Hex literal (starting with 0x) doesn't have digits after it.
    InvalidHexEmpty,
    /// Numeric literal could not be parsed as a decimal literal because there are no digits in it (it's just -)
    InvalidDecEmpty,
    /// Int parsing failed but the reason why is unknown
    UnknownIntErr,
    /// Token had the format r\d, but \d isn't 0-15.
    InvalidReg,
    /// A symbol was used which is not allowed in NAS assembly files
    #[default]
    InvalidSymbol
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFitU16   => f.write_str("numeric token does not fit 16-bit unsigned integer"),
            LexErr::DoesNotFitI16   => f.write_str("numeric token does not fit 16-bit signed integer"),
            LexErr::InvalidHex      => f.write_str("invalid hex literal"),
            LexErr::InvalidNumeric  => f.write_str("invalid decimal literal"),
            LexErr::InvalidHexEmpty => f.write_str("invalid hex literal"),
            LexErr::InvalidDecEmpty => f.write_str("invalid decimal literal"),
            LexErr::UnknownIntErr   => f.write_str("could not parse integer"),
            LexErr::InvalidReg      => f.write_str("invalid register"),
            LexErr::InvalidSymbol   => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFitU16    => Some(format!("the range for a 16-bit unsigned integer is [{}, {}]", u16::MIN, u16::MAX).into()),
            LexErr::DoesNotFitI16    => Some(format!("the range for a 16-bit signed integer is [{}, {}]", i16::MIN, i16::MAX).into()),
            LexErr::InvalidHex       => Some("a hex literal starts with '0x' and consists of 0-9, a-f".into()),
            LexErr::InvalidNumeric   => Some("a decimal literal only consists of digits 0-9".into()),
            LexErr::InvalidHexEmpty  => Some("there should be hex digits (0-9, a-f) here".into()),
            LexErr::InvalidDecEmpty  => Some("there should be digits (0-9) here".into()),
            LexErr::UnknownIntErr    => None,
            LexErr::InvalidReg       => Some("this must be r0-r15".into()),
            LexErr::InvalidSymbol    => Some("this char does not occur in any token in NAS assembly".into()),
        }
    }
}
/// Helper that converts an int error kind to its corresponding LexErr, based on the provided inputs.
fn convert_int_error(
    e: &std::num::IntErrorKind,
    invalid_digits_err: LexErr,
    empty_err: LexErr,
    overflow_err: LexErr,
    src: &str
) -> LexErr {
    match e {
        IntErrorKind::Empty        => empty_err,
        IntErrorKind::InvalidDigit if src == "-" => empty_err,
        IntErrorKind::InvalidDigit => invalid_digits_err,
        IntErrorKind::PosOverflow  => overflow_err,
        IntErrorKind::NegOverflow  => overflow_err,
        IntErrorKind::Zero         => unreachable!("IntErrorKind::Zero should not be emitted in parsing integers"),
        _ => LexErr::UnknownIntErr,
    }
}
/// Splits off the `0x` (or `0X`) prefix of a hex literal.
fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}
fn lex_unsigned(lx: &Lexer<'_, Token>) -> Result<u16, LexErr> {
    let string = lx.slice();

    match strip_hex_prefix(string) {
        Some(hex) => u16::from_str_radix(hex, 16)
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty, LexErr::DoesNotFitU16, hex)),
        None => string.parse::<u16>()
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidDecEmpty, LexErr::DoesNotFitU16, string)),
    }
}
fn lex_signed(lx: &Lexer<'_, Token>) -> Result<i16, LexErr> {
    let string = lx.slice();
    let Some(magnitude) = string.strip_prefix('-') else {
        unreachable!("Lexer slice should have started with -");
    };

    match strip_hex_prefix(magnitude) {
        Some(hex) => {
            let mag = u16::from_str_radix(hex, 16)
                .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty, LexErr::DoesNotFitI16, hex))?;

            i16::try_from(-i32::from(mag)).map_err(|_| LexErr::DoesNotFitI16)
        },
        None => string.parse::<i16>()
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidDecEmpty, LexErr::DoesNotFitI16, string)),
    }
}
fn lex_reg(lx: &Lexer<'_, Token>) -> Result<u8, LexErr> {
    lx.slice()[1..].parse::<u8>().ok()
        .filter(|&r| r < 16)
        .ok_or(LexErr::InvalidReg)
}
fn lex_label_offset(lx: &Lexer<'_, Token>) -> Result<(String, i16), LexErr> {
    let string = lx.slice();
    // The label part cannot contain a sign, so the last sign splits the token.
    let Some(split) = string.rfind(['+', '-']) else {
        unreachable!("Lexer slice should have contained + or -");
    };
    let (label, offset) = string.split_at(split);
    let (sign, magnitude) = offset.split_at(1);

    let mag = match strip_hex_prefix(magnitude) {
        Some(hex) => u16::from_str_radix(hex, 16)
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty, LexErr::DoesNotFitI16, hex))?,
        None => magnitude.parse::<u16>()
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidDecEmpty, LexErr::DoesNotFitI16, magnitude))?,
    };
    let offset = match sign {
        "-" => -i32::from(mag),
        _ => i32::from(mag),
    };

    i16::try_from(offset)
        .map(|offset| (label.to_string(), offset))
        .map_err(|_| LexErr::DoesNotFitI16)
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use crate::err::LexErr;
    use crate::parse::lex::{Ident, Token};

    fn label(s: &str) -> Token {
        Token::Ident(Ident::Label(s.to_string()))
    }
    fn label_off(s: &str, off: i16) -> Token {
        Token::LabelOffset((s.to_string(), off))
    }

    #[test]
    fn test_numeric_dec_success() {
        // Basic
        let mut tokens = Token::lexer("0 123 255 789");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(123))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(255))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(789))));
        assert_eq!(tokens.next(), None);

        // Negative
        let mut tokens = Token::lexer("-1 -128 -0");
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-128))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(0))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_numeric_hex_success() {
        let mut tokens = Token::lexer("0x0 0xff 0XFF 0xAb 0x01 0x7FFF");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0x00))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xFF))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xFF))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xAB))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0x01))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0x7FFF))));
        assert_eq!(tokens.next(), None);

        // Negative
        let mut tokens = Token::lexer("-0x80 -0x1 -0X7f");
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-0x80))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-0x1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-0x7F))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_numeric_overflow() {
        let mut tokens = Token::lexer("65535 -32768 -0x8000");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(65535))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-32768))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-0x8000))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("65536").next(), Some(Err(LexErr::DoesNotFitU16)));
        assert_eq!(Token::lexer("0x10000").next(), Some(Err(LexErr::DoesNotFitU16)));
        assert_eq!(Token::lexer("-32769").next(), Some(Err(LexErr::DoesNotFitI16)));
        assert_eq!(Token::lexer("-0x8001").next(), Some(Err(LexErr::DoesNotFitI16)));
    }

    #[test]
    fn test_numeric_invalid() {
        assert_eq!(Token::lexer("3q").next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(Token::lexer("-q").next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(Token::lexer("-").next(), Some(Err(LexErr::InvalidDecEmpty)));
        assert_eq!(Token::lexer("0xg").next(), Some(Err(LexErr::InvalidHex)));
        assert_eq!(Token::lexer("0x").next(), Some(Err(LexErr::InvalidHexEmpty)));
        assert_eq!(Token::lexer("-0x").next(), Some(Err(LexErr::InvalidHexEmpty)));
    }

    #[test]
    fn test_regs() {
        let mut tokens = Token::lexer("r0 R1 r9 r10 R15");
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(9))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(10))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(15))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("r16").next(), Some(Err(LexErr::InvalidReg)));
        assert_eq!(Token::lexer("R99999999").next(), Some(Err(LexErr::InvalidReg)));
    }

    #[test]
    fn test_keywords_labels() {
        let kws = "halt noop load loadc loadr store storer move add addc mul sub shift and or xor jump jumpe jumpn jumpl jumple word";
        for m_token in Token::lexer(kws) {
            let token = m_token.unwrap();
            assert!(
                matches!(token, Token::Ident(_)) & !matches!(token, Token::Ident(Ident::Label(_))),
                "Expected {token:?} to be keyword"
            );
        }

        // Case insensitivity
        let mut tokens = Token::lexer("JUMPE JumpE jumpe");
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::JUMPE))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::JUMPE))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::JUMPE))));
        assert_eq!(tokens.next(), None);

        // Labels
        let mut tokens = Token::lexer("loop Data_1 _ rx");
        assert_eq!(tokens.next(), Some(Ok(label("loop"))));
        assert_eq!(tokens.next(), Some(Ok(label("Data_1"))));
        assert_eq!(tokens.next(), Some(Ok(label("_"))));
        assert_eq!(tokens.next(), Some(Ok(label("rx"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_label_offsets() {
        let mut tokens = Token::lexer("b+1 b-3 table+0 b");
        assert_eq!(tokens.next(), Some(Ok(label_off("b", 1))));
        assert_eq!(tokens.next(), Some(Ok(label_off("b", -3))));
        assert_eq!(tokens.next(), Some(Ok(label_off("table", 0))));
        assert_eq!(tokens.next(), Some(Ok(label("b"))));
        assert_eq!(tokens.next(), None);

        let mut tokens = Token::lexer("b+0x1 data-0X10 b+0xff");
        assert_eq!(tokens.next(), Some(Ok(label_off("b", 1))));
        assert_eq!(tokens.next(), Some(Ok(label_off("data", -16))));
        assert_eq!(tokens.next(), Some(Ok(label_off("b", 255))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("b+99999").next(), Some(Err(LexErr::DoesNotFitI16)));
        assert_eq!(Token::lexer("b-0x8001").next(), Some(Err(LexErr::DoesNotFitI16)));
        assert_eq!(Token::lexer("b+0x").next(), Some(Err(LexErr::InvalidHexEmpty)));
        assert_eq!(Token::lexer("b+0xg").next(), Some(Err(LexErr::InvalidHex)));
        assert_eq!(Token::lexer("b+1z").next(), Some(Err(LexErr::InvalidNumeric)));
    }

    #[test]
    fn test_punct() {
        let mut tokens = Token::lexer("0\n1,2:3 // abc: def\r\n");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::NewLine)));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comma)));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(2))));
        assert_eq!(tokens.next(), Some(Ok(Token::Colon)));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(3))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comment)));
        assert_eq!(tokens.next(), Some(Ok(Token::NewLine)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_comment_without_space() {
        let mut tokens = Token::lexer("noop// comment// comment\n0x01//x");
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::NOOP))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comment)));
        assert_eq!(tokens.next(), Some(Ok(Token::NewLine)));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comment)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_invalid_symbol() {
        for c in ['#', '$', '%', '&', '*', '(', ')', '.', ';', '<', '>', '?', '@', '[', ']', '{', '}', '~', '"', '\'', '+'] {
            let string = c.to_string();
            assert_eq!(
                Token::lexer(&string).next(),
                Some(Err(LexErr::InvalidSymbol)),
                "Expected {string:?} to be an invalid symbol"
            );
        }
        // A lone slash is not a comment.
        assert_eq!(Token::lexer("/").next(), Some(Err(LexErr::InvalidSymbol)));
    }
}
