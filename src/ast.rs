//! Components relating to the abstract syntax trees (ASTs)
//! used in representing assembly instructions.
//!
//! These components together are used to construct...
//! - [`asm::AsmInstr`] (a data structure holding an assembly source code instruction),
//! - [`asm::Stmt`] (a data structure holding a line-level statement of source code),
//! - and [`sim::SimInstr`] (a data structure holding a machine instruction).

pub mod asm;
pub mod sim;

use std::num::TryFromIntError;
use std::ops::Range;

/// A register. Must be between 0 and 15.
///
/// This `Reg` struct can either be constructed by selecting a register from [`reg_consts`],
/// or by using [`Reg::try_from`].
///
/// ## Examples
///
/// ```text
/// loadc r1 0x05
///       ~~
/// add r2 r1 r0
///     ~~ ~~ ~~
/// jumpe r3 loop
///       ~~
/// ```
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// The 0th register, which the conditional jumps compare against.
    pub const R0: Reg = Reg(0);
    /// The 1st register in the register file.
    pub const R1: Reg = Reg(1);
    /// The 2nd register in the register file.
    pub const R2: Reg = Reg(2);
    /// The 3rd register in the register file.
    pub const R3: Reg = Reg(3);
    /// The 15th (last) register in the register file.
    pub const R15: Reg = Reg(15);
}
impl Reg {
    /// The number of registers in the register file.
    pub const COUNT: usize = 16;

    /// Gets the register number of this [`Reg`]. This is always between 0 and 15.
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Creates a register from the low nibble of the given value.
    pub(crate) fn from_nibble(n: u16) -> Self {
        Reg((n & 0xF) as u8)
    }

    /// An iterator over every register in the register file, in order.
    pub fn all() -> impl Iterator<Item=Reg> {
        (0..Reg::COUNT as u8).map(Reg)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`crate::sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=15 => Ok(Reg(value)),
            // HACKy, but there's no other way to create this error
            _      => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}

/// The smallest value accepted by an 8-bit operand (as a signed byte).
pub const BYTE_MIN: i32 = i8::MIN as i32;
/// The largest value accepted by an 8-bit operand (as an unsigned byte).
pub const BYTE_MAX: i32 = u8::MAX as i32;

/// Fits a value into an 8-bit operand.
///
/// Values in `[-128, 255]` are accepted and stored mod 256,
/// so negative values become their two's complement byte.
///
/// ```
/// use nic_ensemble::ast::fit_byte;
///
/// assert_eq!(fit_byte(255), Some(0xFF));
/// assert_eq!(fit_byte(-1), Some(0xFF));
/// assert_eq!(fit_byte(-128), Some(0x80));
/// assert_eq!(fit_byte(256), None);
/// assert_eq!(fit_byte(-129), None);
/// ```
pub fn fit_byte(value: i32) -> Option<u8> {
    (BYTE_MIN..=BYTE_MAX).contains(&value)
        .then_some(value as u8)
}

/// The comparison performed by a conditional jump.
///
/// The jump compares its register against `r0`, as signed bytes.
/// The condition is stored in the low two bits of the jump's address byte:
///
/// | instruction | condition   | code |
/// |-------------|-------------|------|
/// | `jumpe`     | `Ra == r0`  | `00` |
/// | `jumpn`     | `Ra != r0`  | `01` |
/// | `jumpl`     | `Ra < r0`   | `10` |
/// | `jumple`    | `Ra <= r0`  | `11` |
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Cond {
    /// Jump if equal.
    Eq = 0,
    /// Jump if not equal.
    Ne = 1,
    /// Jump if less than.
    Lt = 2,
    /// Jump if less than or equal.
    Le = 3,
}
impl Cond {
    /// Reads the condition from the low two bits of an address byte.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Cond::Eq,
            1 => Cond::Ne,
            2 => Cond::Lt,
            _ => Cond::Le,
        }
    }

    /// The two-bit code of this condition.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Checks whether the jump should be taken for the given register values.
    pub fn holds(self, lhs: i8, rhs: i8) -> bool {
        match self {
            Cond::Eq => lhs == rhs,
            Cond::Ne => lhs != rhs,
            Cond::Lt => lhs < rhs,
            Cond::Le => lhs <= rhs,
        }
    }

    /// The mnemonic of the conditional jump with this condition.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Cond::Eq => "jumpe",
            Cond::Ne => "jumpn",
            Cond::Lt => "jumpl",
            Cond::Le => "jumple",
        }
    }
}

/// A label.
///
/// Besides the label's name, this also stores the start of the label in the source,
/// which is used for error diagnostics.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Label {
    /// The label's identifier
    pub name: String,

    /// The start of the label in assembly source code.
    ///
    /// Since `name` stores the length of the string,
    /// we don't need to store the whole span.
    start: usize
}
impl Label {
    /// Creates a new label.
    pub fn new(name: String, span: Range<usize>) -> Self {
        debug_assert_eq!(span.start + name.len(), span.end, "span should have the same length as name");
        Label { name, start: span.start }
    }
    /// Returns the span of the label in assembly source code.
    pub fn span(&self) -> Range<usize> {
        self.start .. (self.start + self.name.len())
    }
}
impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// An 8-bit operand, which is either a literal or a symbolic address.
///
/// ## Examples
///
/// ```text
/// loadc r0 0x7f
///          ~~~~
/// addc r1 -1
///         ~~
/// loadc r0 table+2
///          ~~~~~~~
/// jump loop
///      ~~~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum ByteOperand {
    /// A literal byte (already reduced mod 256).
    Imm(u8),
    /// The address of a label plus a constant displacement.
    Label(Label, i16),
}
impl std::fmt::Display for ByteOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteOperand::Imm(b) => write!(f, "0x{b:02x}"),
            ByteOperand::Label(label, 0) => label.fmt(f),
            ByteOperand::Label(label, off) => write!(f, "{label}{off:+}"),
        }
    }
}
