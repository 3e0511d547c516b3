//! This module holds the AST for statements from assembly source code.
//!
//! For instructions that map to bytecode instructions
//! (i.e., the mnemonics have a corresponding machine encoding),
//! see [`SimInstr`].
//!
//! Useful structs in this module include:
//! - [`AsmInstr`]: An enum of all possible assembly source code instructions
//! - [`Stmt`]: A line-level statement (instruction, label definition, or word directive)
//!
//! [`SimInstr`]: crate::ast::sim::SimInstr

use std::fmt::Write as _;
use std::ops::Range;

use super::{ByteOperand, Cond, Label, Reg};

/// An enum representing all of the possible instructions in NAS assembly code.
///
/// The variants in this enum represent instructions before assembly passes.
/// Byte operands may still refer to labels, which are resolved by the assembler.
///
/// For instructions that map to bytecode instructions, see [`SimInstr`].
///
/// [`SimInstr`]: crate::ast::sim::SimInstr
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum AsmInstr {
    /// A halt instruction.
    ///
    /// Stops the processor with a `Halt` status.
    Halt,

    /// A no-op instruction.
    ///
    /// This is encoded as a conditional jump which can never be taken.
    Noop,

    /// A load instruction.
    ///
    /// Loads the byte at an address into a register.
    Load(Reg, ByteOperand),

    /// A load-constant instruction.
    ///
    /// Loads an immediate value into a register.
    LoadC(Reg, ByteOperand),

    /// A load-register instruction.
    ///
    /// Loads the byte at the address held in the second register into the first register.
    LoadR(Reg, Reg),

    /// A store instruction.
    ///
    /// Stores a register's value at an address.
    Store(Reg, ByteOperand),

    /// A store-register instruction.
    ///
    /// Stores the first register's value at the address held in the second register.
    StoreR(Reg, Reg),

    /// A move instruction.
    Move(Reg, Reg),

    /// An add instruction.
    Add(Reg, Reg, Reg),

    /// An add-constant instruction.
    AddC(Reg, ByteOperand),

    /// A multiply instruction.
    Mul(Reg, Reg, Reg),

    /// A subtract instruction.
    Sub(Reg, Reg, Reg),

    /// A shift instruction.
    ///
    /// The third register holds a signed shift amount (positive shifts left).
    Shift(Reg, Reg, Reg),

    /// A bitwise and instruction.
    And(Reg, Reg, Reg),

    /// A bitwise or instruction.
    Or(Reg, Reg, Reg),

    /// A bitwise xor instruction.
    Xor(Reg, Reg, Reg),

    /// An unconditional jump.
    ///
    /// The operand byte is encoded as-is.
    Jump(ByteOperand),

    /// A conditional jump, comparing the register against `r0`.
    ///
    /// The low two bits of the address byte are replaced by the condition code.
    JumpIf(Cond, Reg, ByteOperand),
}
impl AsmInstr {
    /// The mnemonic of this instruction.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            AsmInstr::Halt         => "halt",
            AsmInstr::Noop         => "noop",
            AsmInstr::Load(..)     => "load",
            AsmInstr::LoadC(..)    => "loadc",
            AsmInstr::LoadR(..)    => "loadr",
            AsmInstr::Store(..)    => "store",
            AsmInstr::StoreR(..)   => "storer",
            AsmInstr::Move(..)     => "move",
            AsmInstr::Add(..)      => "add",
            AsmInstr::AddC(..)     => "addc",
            AsmInstr::Mul(..)      => "mul",
            AsmInstr::Sub(..)      => "sub",
            AsmInstr::Shift(..)    => "shift",
            AsmInstr::And(..)      => "and",
            AsmInstr::Or(..)       => "or",
            AsmInstr::Xor(..)      => "xor",
            AsmInstr::Jump(_)      => "jump",
            AsmInstr::JumpIf(c, ..) => c.mnemonic(),
        }
    }
}
impl std::fmt::Display for AsmInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())?;
        match self {
            AsmInstr::Halt | AsmInstr::Noop => Ok(()),
            AsmInstr::Load(r, op)
            | AsmInstr::LoadC(r, op)
            | AsmInstr::Store(r, op)
            | AsmInstr::AddC(r, op)
            | AsmInstr::JumpIf(_, r, op) => write!(f, " {r} {op}"),
            AsmInstr::LoadR(a, b)
            | AsmInstr::StoreR(a, b)
            | AsmInstr::Move(a, b) => write!(f, " {a} {b}"),
            AsmInstr::Add(a, b, c)
            | AsmInstr::Mul(a, b, c)
            | AsmInstr::Sub(a, b, c)
            | AsmInstr::Shift(a, b, c)
            | AsmInstr::And(a, b, c)
            | AsmInstr::Or(a, b, c)
            | AsmInstr::Xor(a, b, c) => write!(f, " {a} {b} {c}"),
            AsmInstr::Jump(op) => {
                f.write_char(' ')?;
                op.fmt(f)
            },
        }
    }
}

/// Either an instruction, a label definition, or a word directive.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum StmtKind {
    #[allow(missing_docs)]
    Instr(AsmInstr),
    /// A label definition (`name:`), which binds the name to the next instruction.
    Label(Label),
    /// A word directive (`word name v...`), which reserves one byte of data per value.
    ///
    /// A directive without values reserves a single zero byte.
    Word(Label, Vec<ByteOperand>),
}

/// A "statement" in NAS assembly.
///
/// Besides its contents, this also holds the source span of the statement,
/// which is used for error diagnostics.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Stmt {
    /// The instruction, label or directive.
    pub nucleus: StmtKind,
    /// The span of the nucleus.
    pub span: Range<usize>
}
impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.nucleus {
            StmtKind::Instr(instr) => instr.fmt(f),
            StmtKind::Label(label) => write!(f, "{label}:"),
            StmtKind::Word(name, values) => {
                write!(f, "word {name}")?;
                values.iter().try_for_each(|v| write!(f, " {v}"))
            },
        }
    }
}
