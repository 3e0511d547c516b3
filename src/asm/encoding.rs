//! Formatters which can read and write executables.
//!
//! The [`ExeFormat`] trait describes an implementation of reading/writing executables.
//! This module provides two implementations of the trait:
//! - [`TextFormat`]: the hex text form, which the simulator loads
//! - [`BinaryFormat`]: a packed binary form, which also keeps the symbol table

use std::collections::HashMap;

use super::{Executable, SymbolData, SymbolTable, MEM_CELLS};

/// A trait defining executable formats.
pub trait ExeFormat {
    /// Representation of the serialized format.
    ///
    /// For binary formats, `[u8]` should be used.
    /// For text-based formats, `str` should be used.
    type Stream: ToOwned + ?Sized;
    /// Serializes into the stream format.
    fn serialize(exe: &Executable) -> <Self::Stream as ToOwned>::Owned;
    /// Deserializes from the stream format.
    fn deserialize(input: &Self::Stream) -> Result<Executable, ExeErr>;
}

/// Error from reading a serialized executable.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ExeErr {
    /// The input ended before the header (or a block) was complete.
    TooShort,
    /// The input did not start with the expected header.
    BadHeader,
    /// The character (text) or block (image) at this index was not a hex digit.
    InvalidDigit(usize),
    /// The image has this many blocks, which does not fit in memory.
    TooLarge(usize),
    /// The binary input had an unknown block identifier or invalid label data.
    Malformed,
}
impl std::fmt::Display for ExeErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExeErr::TooShort        => f.write_str("executable ended unexpectedly"),
            ExeErr::BadHeader       => f.write_str("executable does not start with the expected header"),
            ExeErr::InvalidDigit(i) => write!(f, "invalid hex digit at index {i}"),
            ExeErr::TooLarge(n)     => write!(f, "image has {n} blocks, but memory only has {MEM_CELLS}"),
            ExeErr::Malformed       => f.write_str("executable is malformed"),
        }
    }
}
impl std::error::Error for ExeErr {}
impl crate::err::Error for ExeErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            ExeErr::BadHeader => Some(format!("text executables start with {:?}", TextFormat::HEADER).into()),
            ExeErr::TooLarge(_) => Some("this executable was not produced by the assembler".into()),
            _ => None
        }
    }
}

/// The hex text form of an executable.
///
/// This consists of the header `1f1f1f1f`,
/// then one lowercase hex digit per block of the image,
/// then a trailing new line.
///
/// When reading, surrounding whitespace is ignored and uppercase digits are accepted.
///
/// ```
/// use nic_ensemble::asm::{assemble_src, MAX_ERRORS};
/// use nic_ensemble::asm::encoding::{ExeFormat, TextFormat};
///
/// let exe = assemble_src("loadc r1 5", MAX_ERRORS).unwrap();
/// let text = TextFormat::serialize(&exe);
/// assert_eq!(text, "1f1f1f1f21050000f000\n");
///
/// let read = TextFormat::deserialize(&text).unwrap();
/// assert_eq!(read.image(), exe.image());
/// ```
pub struct TextFormat;
impl TextFormat {
    /// The header of every text executable.
    pub const HEADER: &'static str = "1f1f1f1f";
}
impl ExeFormat for TextFormat {
    type Stream = str;

    fn serialize(exe: &Executable) -> <Self::Stream as ToOwned>::Owned {
        let mut out = String::with_capacity(Self::HEADER.len() + exe.len() + 1);
        out.push_str(Self::HEADER);
        out.extend(exe.image().iter().filter_map(|&b| char::from_digit(u32::from(b), 16)));
        out.push('\n');
        out
    }

    fn deserialize(input: &Self::Stream) -> Result<Executable, ExeErr> {
        let input = input.trim();
        if input.len() < Self::HEADER.len() {
            return Err(ExeErr::TooShort);
        }
        // `get` also fails if the header would end inside a multi-byte character.
        match input.get(..Self::HEADER.len()) {
            Some(header) if header.eq_ignore_ascii_case(Self::HEADER) => {},
            _ => return Err(ExeErr::BadHeader),
        }

        let body = &input[Self::HEADER.len()..];
        let image = body.char_indices()
            .map(|(i, c)| {
                c.to_digit(16)
                    .map(|d| d as u8)
                    .ok_or(ExeErr::InvalidDigit(Self::HEADER.len() + i))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Executable::from_image(image)
    }
}

/// A packed binary form of an executable.
///
/// Unlike [`TextFormat`], this also stores the symbol table (if present).
pub struct BinaryFormat;

const BFMT_MAGIC: &[u8] = b"nic\x1f";
const BFMT_VER: &[u8] = b"\x00\x01";
impl ExeFormat for BinaryFormat {
    type Stream = [u8];

    fn serialize(exe: &Executable) -> <Self::Stream as ToOwned>::Owned {
        // The format is a header followed by a sequence of blocks.
        //
        // The header consists of:
        // - The magic number (b"nic\x1f")
        // - The version (2 bytes)
        //
        // Each block starts with one of:
        // - 0x00: the image
        // - 0x01: symbol table header
        // - 0x02: label symbol table entry
        //
        // Block 0x00 consists of:
        // - the identifier byte 0x00 (1 byte)
        // - the number of 4-bit blocks in the image (2 bytes)
        // - the image, two 4-bit blocks per byte, high nibble first (ceil(n / 2) bytes)
        //
        // Block 0x01 consists of:
        // - the identifier byte 0x01 (1 byte)
        // - the number of instructions (2 bytes)
        // - the number of blocks in the assembled image (2 bytes)
        //
        // Block 0x02 consists of:
        // - the identifier byte 0x02 (1 byte)
        // - address of the label (2 bytes)
        // - the start of the label in source (8 bytes)
        // - the length of the label's name (8 bytes)
        // - the label (n bytes)
        let mut bytes = BFMT_MAGIC.to_vec();
        bytes.extend_from_slice(BFMT_VER);

        bytes.push(0x00);
        bytes.extend(u16::to_le_bytes(exe.len() as u16));
        bytes.extend(exe.image().chunks(2).map(|pair| match *pair {
            [hi, lo] => (hi << 4) | lo,
            [hi] => hi << 4,
            _ => unreachable!("chunks(2) yields one or two blocks"),
        }));

        if let Some(sym) = exe.symbol_table() {
            bytes.push(0x01);
            bytes.extend(u16::to_le_bytes(sym.instr_count as u16));
            bytes.extend(u16::to_le_bytes(sym.image_len as u16));

            for (label, data) in &sym.label_map {
                bytes.push(0x02);
                bytes.extend(u16::to_le_bytes(data.addr));
                bytes.extend(u64::to_le_bytes(data.src_start as u64));
                bytes.extend(u64::to_le_bytes(label.len() as u64));
                bytes.extend_from_slice(label.as_bytes());
            }
        }

        bytes
    }

    fn deserialize(input: &Self::Stream) -> Result<Executable, ExeErr> {
        let mut vec = input.strip_prefix(BFMT_MAGIC)
            .and_then(|rest| rest.strip_prefix(BFMT_VER))
            .ok_or(ExeErr::BadHeader)?;

        let mut image = None;
        let mut sym_header = None;
        let mut label_map = HashMap::new();

        while let Some((ident_byte, rest)) = vec.split_first() {
            vec = rest;
            match ident_byte {
                0x00 => {
                    let len = usize::from(u16::from_le_bytes(take::<2>(&mut vec)?));
                    let packed = take_slice(&mut vec, (len + 1) / 2)?;

                    let mut blocks: Vec<_> = packed.iter()
                        .flat_map(|&b| [b >> 4, b & 0xF])
                        .collect();
                    blocks.truncate(len);
                    image = Some(blocks);
                },
                0x01 => {
                    let instr_count = usize::from(u16::from_le_bytes(take::<2>(&mut vec)?));
                    let image_len = usize::from(u16::from_le_bytes(take::<2>(&mut vec)?));
                    sym_header = Some((instr_count, image_len));
                },
                0x02 => {
                    let addr = u16::from_le_bytes(take::<2>(&mut vec)?);
                    let src_start = usize::try_from(u64::from_le_bytes(take::<8>(&mut vec)?)).map_err(|_| ExeErr::Malformed)?;
                    let str_len = usize::try_from(u64::from_le_bytes(take::<8>(&mut vec)?)).map_err(|_| ExeErr::Malformed)?;
                    let label = String::from_utf8(take_slice(&mut vec, str_len)?.to_vec()).map_err(|_| ExeErr::Malformed)?;

                    label_map.insert(label, SymbolData { addr, src_start });
                },
                _ => return Err(ExeErr::Malformed)
            }
        }

        let mut exe = Executable::from_image(image.ok_or(ExeErr::TooShort)?)?;
        exe.sym = match sym_header {
            Some((instr_count, image_len)) => Some(SymbolTable { label_map, instr_count, image_len }),
            None if label_map.is_empty() => None,
            None => return Err(ExeErr::Malformed),
        };
        Ok(exe)
    }
}

fn take<const N: usize>(data: &mut &[u8]) -> Result<[u8; N], ExeErr> {
    let slice = take_slice(data, N)?;
    slice.try_into().map_err(|_| ExeErr::TooShort)
}

fn take_slice<'a>(data: &mut &'a [u8], n: usize) -> Result<&'a [u8], ExeErr> {
    if data.len() < n {
        return Err(ExeErr::TooShort);
    }
    let (left, right) = data.split_at(n);
    *data = right;
    Ok(left)
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble_src, Executable, MAX_ERRORS};

    use super::{BinaryFormat, ExeErr, ExeFormat, TextFormat};

    const SRC: &str = "
        start: loadc r1 data
               loadr r2 r1
        loop:  jumpn r2 loop
        word data 0x12 -1
    ";

    #[test]
    fn test_text_serialize() {
        let exe = assemble_src(SRC, MAX_ERRORS).unwrap();
        assert_eq!(TextFormat::serialize(&exe), "1f1f1f1f21143021f2090000f00012ff\n");
    }

    #[test]
    fn test_text_deserialize() {
        let exe = TextFormat::deserialize("  1F1F1F1F21050000F000\n\n").unwrap();
        assert_eq!(exe.image(), &[2, 1, 0, 5, 0, 0, 0, 0, 0xf, 0, 0, 0]);
        assert!(exe.symbol_table().is_none());

        // Header only is an empty image.
        assert_eq!(TextFormat::deserialize("1f1f1f1f").map(|e| e.len()), Ok(0));
    }

    #[test]
    fn test_text_errors() {
        assert_eq!(TextFormat::deserialize(""), Err(ExeErr::TooShort));
        assert_eq!(TextFormat::deserialize("1f1f"), Err(ExeErr::TooShort));
        assert_eq!(TextFormat::deserialize("1f1f1f1e0000"), Err(ExeErr::BadHeader));
        // The header's last byte falls inside 'é'.
        assert_eq!(TextFormat::deserialize("1f1f1f1\u{e9}00"), Err(ExeErr::BadHeader));
        assert_eq!(TextFormat::deserialize("\u{e9}"), Err(ExeErr::TooShort));
        assert_eq!(TextFormat::deserialize("1f1f1f1f00g0"), Err(ExeErr::InvalidDigit(10)));
        assert_eq!(TextFormat::deserialize("1f1f1f1f00 0"), Err(ExeErr::InvalidDigit(10)));

        let huge = format!("1f1f1f1f{}", "0".repeat(257));
        assert_eq!(TextFormat::deserialize(&huge), Err(ExeErr::TooLarge(257)));
    }

    #[test]
    fn test_binary_keeps_symbols() {
        let exe = assemble_src(SRC, MAX_ERRORS).unwrap();
        let bytes = BinaryFormat::serialize(&exe);
        let read = BinaryFormat::deserialize(&bytes).unwrap();

        assert_eq!(read, exe);
        let sym = read.symbol_table().unwrap();
        assert_eq!(sym.lookup_label("loop"), Some(8));
        assert_eq!(sym.lookup_label("data"), Some(20));
        assert_eq!(sym.get_label_source("start"), Some(9..14));
    }

    #[test]
    fn test_binary_odd_image() {
        let exe = Executable::from_image(vec![0x1, 0x2, 0x3]).unwrap();
        let bytes = BinaryFormat::serialize(&exe);
        assert_eq!(&bytes[6..], &[0x00, 3, 0, 0x12, 0x30]);
        assert_eq!(BinaryFormat::deserialize(&bytes), Ok(exe));
    }

    #[test]
    fn test_binary_errors() {
        assert_eq!(BinaryFormat::deserialize(b"obj!"), Err(ExeErr::BadHeader));
        assert_eq!(BinaryFormat::deserialize(b"nic\x1f\x00\x01"), Err(ExeErr::TooShort));
        assert_eq!(BinaryFormat::deserialize(b"nic\x1f\x00\x01\x00\x04\x00\x12"), Err(ExeErr::TooShort));
        assert_eq!(BinaryFormat::deserialize(b"nic\x1f\x00\x01\x00\x00\x00\x07"), Err(ExeErr::Malformed));
    }
}
