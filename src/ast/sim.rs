//! This module holds the machine instructions executed by the simulator.
//!
//! Every [`SimInstr`] is a 16-bit word where the most significant nibble is the opcode.
//! [`SimInstr::encode`] and [`SimInstr::decode`] convert between the two forms.

use super::{Cond, Reg};
use super::reg_consts::R0;

/// A machine instruction.
///
/// The encoding of each instruction (as four hex digits) is:
///
/// | instruction         | word        |
/// |---------------------|-------------|
/// | `halt`              | `0000`      |
/// | `load a x`          | `1 a x x`   |
/// | `loadc a c`         | `2 a c c`   |
/// | `loadr a b`         | `3 0 a b`   |
/// | `store a x`         | `4 a x x`   |
/// | `storer a b`        | `5 0 a b`   |
/// | `move a b`          | `6 0 a b`   |
/// | `add a b c`         | `7 a b c`   |
/// | `addc a c`          | `8 a c c`   |
/// | `mul a b c`         | `9 a b c`   |
/// | `sub a b c`         | `a a b c`   |
/// | `shift a b c`       | `b a b c`   |
/// | `and a b c`         | `c a b c`   |
/// | `or a b c`          | `d a b c`   |
/// | `xor a b c`         | `e a b c`   |
/// | jump family         | `f a t cc`  |
///
/// For the jump family, the address byte is the target (a multiple of 4)
/// with the [`Cond`] in its low two bits.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimInstr {
    #[allow(missing_docs)]
    Halt,
    #[allow(missing_docs)]
    Load(Reg, u8),
    #[allow(missing_docs)]
    LoadC(Reg, u8),
    #[allow(missing_docs)]
    LoadR(Reg, Reg),
    #[allow(missing_docs)]
    Store(Reg, u8),
    #[allow(missing_docs)]
    StoreR(Reg, Reg),
    #[allow(missing_docs)]
    Move(Reg, Reg),
    #[allow(missing_docs)]
    Add(Reg, Reg, Reg),
    #[allow(missing_docs)]
    AddC(Reg, u8),
    #[allow(missing_docs)]
    Mul(Reg, Reg, Reg),
    #[allow(missing_docs)]
    Sub(Reg, Reg, Reg),
    #[allow(missing_docs)]
    Shift(Reg, Reg, Reg),
    #[allow(missing_docs)]
    And(Reg, Reg, Reg),
    #[allow(missing_docs)]
    Or(Reg, Reg, Reg),
    #[allow(missing_docs)]
    Xor(Reg, Reg, Reg),
    /// A jump, taken when `cond` holds between `reg` and `r0`.
    ///
    /// `target` is always a multiple of 4.
    Jump {
        #[allow(missing_docs)]
        reg: Reg,
        #[allow(missing_docs)]
        cond: Cond,
        #[allow(missing_docs)]
        target: u8
    },
}

impl SimInstr {
    /// Creates a jump instruction from a raw address byte,
    /// where the low two bits of the byte are the condition code.
    pub fn jump_raw(reg: Reg, byte: u8) -> Self {
        SimInstr::Jump { reg, cond: Cond::from_bits(byte), target: byte & 0xFC }
    }

    /// Gets the opcode of this instruction (the first hex digit of its encoding).
    pub fn opcode(&self) -> u16 {
        match self {
            SimInstr::Halt        => 0x0,
            SimInstr::Load(..)    => 0x1,
            SimInstr::LoadC(..)   => 0x2,
            SimInstr::LoadR(..)   => 0x3,
            SimInstr::Store(..)   => 0x4,
            SimInstr::StoreR(..)  => 0x5,
            SimInstr::Move(..)    => 0x6,
            SimInstr::Add(..)     => 0x7,
            SimInstr::AddC(..)    => 0x8,
            SimInstr::Mul(..)     => 0x9,
            SimInstr::Sub(..)     => 0xA,
            SimInstr::Shift(..)   => 0xB,
            SimInstr::And(..)     => 0xC,
            SimInstr::Or(..)      => 0xD,
            SimInstr::Xor(..)     => 0xE,
            SimInstr::Jump { .. } => 0xF,
        }
    }

    /// Encodes this instruction as a 16-bit word.
    pub fn encode(&self) -> u16 {
        fn rrr(a: Reg, b: Reg, c: Reg) -> u16 {
            (u16::from(a.0) << 8) | (u16::from(b.0) << 4) | u16::from(c.0)
        }
        fn rb(a: Reg, byte: u8) -> u16 {
            (u16::from(a.0) << 8) | u16::from(byte)
        }

        let operands = match *self {
            SimInstr::Halt => 0,
            SimInstr::Load(a, x)
            | SimInstr::LoadC(a, x)
            | SimInstr::Store(a, x)
            | SimInstr::AddC(a, x) => rb(a, x),
            SimInstr::LoadR(a, b)
            | SimInstr::StoreR(a, b)
            | SimInstr::Move(a, b) => rrr(R0, a, b),
            SimInstr::Add(a, b, c)
            | SimInstr::Mul(a, b, c)
            | SimInstr::Sub(a, b, c)
            | SimInstr::Shift(a, b, c)
            | SimInstr::And(a, b, c)
            | SimInstr::Or(a, b, c)
            | SimInstr::Xor(a, b, c) => rrr(a, b, c),
            SimInstr::Jump { reg, cond, target } => rb(reg, (target & 0xFC) | cond.bits()),
        };

        (self.opcode() << 12) | operands
    }

    /// Decodes a 16-bit word into an instruction.
    ///
    /// This returns `None` if the word is malformed, which happens when:
    /// - the word has a `halt` opcode, but any of its operand digits are non-zero
    /// - the word has a `loadr`, `storer`, or `move` opcode, but its second digit is non-zero
    ///
    /// ```
    /// use nic_ensemble::ast::sim::SimInstr;
    ///
    /// assert_eq!(SimInstr::decode(0x0000), Some(SimInstr::Halt));
    /// assert_eq!(SimInstr::decode(0x0001), None);
    /// assert_eq!(SimInstr::decode(0x2105).map(|i| i.encode()), Some(0x2105));
    /// ```
    pub fn decode(word: u16) -> Option<Self> {
        let a = Reg::from_nibble(word >> 8);
        let b = Reg::from_nibble(word >> 4);
        let c = Reg::from_nibble(word);
        let byte = (word & 0xFF) as u8;
        let second_zero = word & 0x0F00 == 0;

        let instr = match word >> 12 {
            0x0 if word == 0 => SimInstr::Halt,
            0x0 => return None,
            0x1 => SimInstr::Load(a, byte),
            0x2 => SimInstr::LoadC(a, byte),
            0x3 if second_zero => SimInstr::LoadR(b, c),
            0x4 => SimInstr::Store(a, byte),
            0x5 if second_zero => SimInstr::StoreR(b, c),
            0x6 if second_zero => SimInstr::Move(b, c),
            0x3 | 0x5 | 0x6 => return None,
            0x7 => SimInstr::Add(a, b, c),
            0x8 => SimInstr::AddC(a, byte),
            0x9 => SimInstr::Mul(a, b, c),
            0xA => SimInstr::Sub(a, b, c),
            0xB => SimInstr::Shift(a, b, c),
            0xC => SimInstr::And(a, b, c),
            0xD => SimInstr::Or(a, b, c),
            0xE => SimInstr::Xor(a, b, c),
            _   => SimInstr::jump_raw(a, byte),
        };

        Some(instr)
    }
}
impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            SimInstr::Halt => f.write_str("halt"),
            SimInstr::Load(a, x)   => write!(f, "load {a} 0x{x:02x}"),
            SimInstr::LoadC(a, x)  => write!(f, "loadc {a} 0x{x:02x}"),
            SimInstr::LoadR(a, b)  => write!(f, "loadr {a} {b}"),
            SimInstr::Store(a, x)  => write!(f, "store {a} 0x{x:02x}"),
            SimInstr::StoreR(a, b) => write!(f, "storer {a} {b}"),
            SimInstr::Move(a, b)   => write!(f, "move {a} {b}"),
            SimInstr::Add(a, b, c)   => write!(f, "add {a} {b} {c}"),
            SimInstr::AddC(a, x)     => write!(f, "addc {a} 0x{x:02x}"),
            SimInstr::Mul(a, b, c)   => write!(f, "mul {a} {b} {c}"),
            SimInstr::Sub(a, b, c)   => write!(f, "sub {a} {b} {c}"),
            SimInstr::Shift(a, b, c) => write!(f, "shift {a} {b} {c}"),
            SimInstr::And(a, b, c)   => write!(f, "and {a} {b} {c}"),
            SimInstr::Or(a, b, c)    => write!(f, "or {a} {b} {c}"),
            SimInstr::Xor(a, b, c)   => write!(f, "xor {a} {b} {c}"),
            // Aliases of the jump family.
            SimInstr::Jump { reg: R0, cond: Cond::Ne, target: 0 } => f.write_str("noop"),
            SimInstr::Jump { reg: R0, cond: Cond::Eq, target } => write!(f, "jump 0x{target:02x}"),
            SimInstr::Jump { reg, cond, target } => write!(f, "{} {reg} 0x{target:02x}", cond.mnemonic()),
        }
    }
}
