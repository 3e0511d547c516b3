//! Assembling assembly source ASTs into executables.
//!
//! This module is used to convert source ASTs (`Vec<`[`Stmt`]`>`) into executables
//! that can be loaded and run by the simulator.
//!
//! The assembler module notably consists of:
//! - [`assemble`], [`assemble_src`] and [`assemble_text`]: The main functions which assemble source into an executable.
//! - [`SymbolTable`]: a struct holding the symbol table, which stores the address of each label after the first assembler pass
//! - [`Executable`]: a struct holding the assembled memory image, which can be loaded into the simulator and executed
//! - [`Diagnostics`]: the collected errors of a failed assembly, rendered with their source lines
//!
//! # Memory layout
//!
//! An assembled image is laid out in 4-bit blocks as:
//!
//! ```text
//! code (4 blocks per instruction) | tail (halt, jump 0) | data (2 blocks per word value)
//! ```
//!
//! Code labels bind to the address of the next instruction.
//! Data labels (from `word` directives) bind to the address of their first byte.
//!
//! [`Stmt`]: crate::ast::asm::Stmt

pub mod encoding;

use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::Range;

use crate::ast::asm::{AsmInstr, Stmt, StmtKind};
use crate::ast::reg_consts::R0;
use crate::ast::sim::SimInstr;
use crate::ast::{fit_byte, ByteOperand, BYTE_MAX, BYTE_MIN};
use crate::err::ErrSpan;
use crate::parse::{parse_all, ParseErr, ParseErrKind};

/// The default number of errors reported by a failed assembly.
pub const MAX_ERRORS: usize = 10;
/// The number of 4-bit memory cells in the machine.
pub const MEM_CELLS: usize = 256;
/// The number of blocks taken up by one instruction.
pub const INSTR_BLOCKS: usize = 4;
/// The number of blocks taken up by one word value.
pub const WORD_BLOCKS: usize = 2;
/// The instructions appended after the code of every program (`halt`, then `jump 0`).
pub const TAIL: [SimInstr; 2] = [
    SimInstr::Halt,
    SimInstr::Jump { reg: R0, cond: crate::ast::Cond::Eq, target: 0 }
];

/// Assembles an assembly source code AST into an executable.
///
/// This returns the first error found during the assembler passes.
///
/// # Example
/// ```
/// use nic_ensemble::parse::parse_ast;
/// use nic_ensemble::asm::assemble;
///
/// let src = "
///     loop: addc r1 1
///           jumpn r1 loop
/// ";
/// let ast = parse_ast(src).unwrap();
///
/// let exe = assemble(ast).unwrap();
/// assert_eq!(exe.symbol_table().unwrap().lookup_label("loop"), Some(0));
/// ```
pub fn assemble(ast: Vec<Stmt>) -> Result<Executable, AsmErr> {
    let (sym, mut errors) = SymbolTable::build(&ast);
    let (exe, pass2_errors) = Executable::build(ast, sym);
    errors.extend(pass2_errors);

    match errors.is_empty() {
        true => Ok(exe),
        false => {
            errors.sort_by_key(|e| e.span.first().start);
            Err(errors.swap_remove(0))
        }
    }
}

/// Assembles assembly source code into an executable.
///
/// On failure, this reports up to `max_errors` errors (at least one),
/// in source order. If the source has syntax errors, only those are reported,
/// since later passes would mostly report symptoms of them.
///
/// # Example
/// ```
/// use nic_ensemble::asm::{assemble_src, MAX_ERRORS};
///
/// let exe = assemble_src("halt", MAX_ERRORS).unwrap();
/// assert_eq!(exe.image(), &[0, 0, 0, 0, 0, 0, 0, 0, 0xf, 0, 0, 0]);
///
/// let diag = assemble_src("loadc r1 nowhere\nhop", MAX_ERRORS).unwrap_err();
/// assert_eq!(diag.errors().len(), 1);
/// assert_eq!(diag.to_string().lines().next(), Some("line 2: hop: unknown mnemonic"));
/// ```
pub fn assemble_src(src: &str, max_errors: usize) -> Result<Executable, Diagnostics> {
    tracing::trace!("starting parse");
    let (stmts, parse_errors) = parse_all(src);

    let mut errors: Vec<AsmErr> = parse_errors.into_iter()
        .map(AsmErr::from)
        .collect();

    if errors.is_empty() {
        tracing::trace!("starting pass 1");
        let (sym, pass1_errors) = SymbolTable::build(&stmts);
        tracing::trace!("starting pass 2");
        let (exe, pass2_errors) = Executable::build(stmts, sym);

        errors.extend(pass1_errors);
        errors.extend(pass2_errors);
        if errors.is_empty() {
            return Ok(exe);
        }
    }

    errors.sort_by_key(|e| e.span.first().start);
    errors.truncate(max_errors.max(1));
    tracing::debug!(errors = errors.len(), "assembly failed");
    Err(Diagnostics::new(errors, src))
}

/// Assembles assembly source code into the text form of an executable.
///
/// If assembly fails, the diagnostics are written to `sink` and `None` is returned.
/// The only errors this returns are errors from writing to `sink`.
///
/// # Example
/// ```
/// use nic_ensemble::asm::{assemble_text, MAX_ERRORS};
///
/// let mut sink = vec![];
/// let text = assemble_text("noop", MAX_ERRORS, &mut sink).unwrap();
/// assert_eq!(text.as_deref(), Some("1f1f1f1ff0010000f000\n"));
/// assert!(sink.is_empty());
///
/// let text = assemble_text("noop r1", MAX_ERRORS, &mut sink).unwrap();
/// assert_eq!(text, None);
/// assert!(!sink.is_empty());
/// ```
pub fn assemble_text(src: &str, max_errors: usize, sink: &mut impl std::io::Write) -> std::io::Result<Option<String>> {
    use encoding::{ExeFormat, TextFormat};

    match assemble_src(src, max_errors) {
        Ok(exe) => Ok(Some(TextFormat::serialize(&exe))),
        Err(diag) => {
            write!(sink, "{diag}")?;
            Ok(None)
        }
    }
}

/// The class of an assembly error.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ErrClass {
    /// The source could not be lexed or parsed.
    Syntax,
    /// A label was referenced but never defined.
    UnresolvedSymbol,
    /// A value or the program did not fit.
    Range,
    /// A label was defined more than once.
    Duplicate,
}

/// Kinds of errors that can occur from assembling given assembly code.
///
/// See [`AsmErr`] for this error type with span information included.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsmErrKind {
    /// The source could not be parsed.
    Parse(ParseErrKind),
    /// There were multiple labels of the same name (pass 1).
    OverlappingLabels,
    /// The program does not fit in memory (pass 1).
    ProgramTooLarge(usize),
    /// Label did not have an assigned address (pass 2).
    CouldNotFindLabel,
    /// A symbolic operand resolved to a value that does not fit in a byte (pass 2).
    ByteOutOfRange(i32),
}
impl std::fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e)            => e.fmt(f),
            Self::OverlappingLabels   => f.write_str("label was defined multiple times"),
            Self::ProgramTooLarge(n)  => write!(f, "program needs {n} memory cells, but there are only {MEM_CELLS}"),
            Self::CouldNotFindLabel   => f.write_str("label could not be found"),
            Self::ByteOutOfRange(v)   => write!(f, "value {v} does not fit in a byte"),
        }
    }
}

/// Error from assembling given assembly code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The value with a span.
    pub kind: AsmErrKind,
    /// The span in the source associated with this value.
    pub span: ErrSpan
}
impl AsmErr {
    /// Creates a new [`AsmErr`].
    pub fn new<E: Into<ErrSpan>>(kind: AsmErrKind, span: E) -> Self {
        AsmErr { kind, span: span.into() }
    }

    /// The class of this error.
    pub fn class(&self) -> ErrClass {
        match self.kind {
            AsmErrKind::Parse(ParseErrKind::ByteOutOfRange(_)) => ErrClass::Range,
            AsmErrKind::Parse(ParseErrKind::Lex(e)) if is_range_lex_err(e) => ErrClass::Range,
            AsmErrKind::Parse(_)            => ErrClass::Syntax,
            AsmErrKind::OverlappingLabels   => ErrClass::Duplicate,
            AsmErrKind::ProgramTooLarge(_)  => ErrClass::Range,
            AsmErrKind::CouldNotFindLabel   => ErrClass::UnresolvedSymbol,
            AsmErrKind::ByteOutOfRange(_)   => ErrClass::Range,
        }
    }
}
fn is_range_lex_err(e: crate::err::LexErr) -> bool {
    use crate::err::LexErr;
    matches!(e, LexErr::DoesNotFitU16 | LexErr::DoesNotFitI16 | LexErr::InvalidReg)
}
impl From<ParseErr> for AsmErr {
    fn from(value: ParseErr) -> Self {
        AsmErr::new(AsmErrKind::Parse(value.kind), value.span)
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for AsmErr {}
impl crate::err::Error for AsmErr {
    fn span(&self) -> Option<crate::err::ErrSpan> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<Cow<str>> {
        match &self.kind {
            AsmErrKind::Parse(e) => crate::err::Error::help(&ParseErr::new(*e, self.span.first())).map(|h| Cow::Owned(h.into_owned())),
            AsmErrKind::OverlappingLabels  => Some("labels must be unique within a file, try renaming one of the labels".into()),
            AsmErrKind::ProgramTooLarge(_) => Some("try removing instructions or word values".into()),
            AsmErrKind::CouldNotFindLabel  => Some("try adding this label before an instruction, or as the name of a word directive".into()),
            AsmErrKind::ByteOutOfRange(_)  => Some(format!("the range for a byte operand is [{BYTE_MIN}, {BYTE_MAX}]").into()),
        }
    }
}

/// Struct holding the source string and contains helpers
/// to index lines and to query position information from a source string.
#[derive(PartialEq, Eq, Clone)]
pub struct SourceInfo {
    /// The source code.
    src: String,
    /// The index of each new line in source code.
    nl_indices: Vec<usize>
}
impl std::fmt::Debug for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceInfo")
            .field("nl_indices", &self.nl_indices)
            .finish_non_exhaustive()
    }
}
impl SourceInfo {
    /// Computes the source info from a given string.
    pub fn new(src: &str) -> Self {
        let nl_indices = src
            .match_indices('\n')
            .map(|(i, _)| i)
            .collect();

        Self { src: src.to_string(), nl_indices }
    }

    /// Returns the entire source.
    pub fn source(&self) -> &str {
        &self.src
    }

    /// Counts the number of lines in the source string.
    pub fn count_lines(&self) -> usize {
        // The first line, plus every line after (delimited by a new line)
        self.nl_indices.len() + 1
    }

    /// Gets the character range for the provided line (zero-indexed), excluding surrounding whitespace.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    pub fn line_span(&self, line: usize) -> Option<Range<usize>> {
        if line >= self.count_lines() {
            return None;
        }

        let start = match line {
            0 => 0,
            _ => self.nl_indices[line - 1] + 1
        };
        let end = self.nl_indices.get(line).copied().unwrap_or(self.src.len());

        // shift line span by trim
        let text = &self.src[start..end];
        let trimmed_start = start + (text.len() - text.trim_start().len());
        let trimmed_end = end - (text.len() - text.trim_end().len());

        Some(trimmed_start..trimmed_end.max(trimmed_start))
    }

    /// Reads a line (zero-indexed) from source.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    pub fn read_line(&self, line: usize) -> Option<&str> {
        self.line_span(line).map(|r| &self.src[r])
    }

    /// Gets the line number (zero-indexed) of the given character index.
    pub fn get_line(&self, index: usize) -> usize {
        self.nl_indices.partition_point(|&nl| nl < index)
    }
}

/// The errors of a failed assembly, together with the source they refer to.
///
/// The [`Display`] implementation renders one entry per error:
///
/// ```text
/// line 3: loadc r1 nowhere: label could not be found
///     help: try adding this label before an instruction, or as the name of a word directive
/// ```
///
/// [`Display`]: std::fmt::Display
#[derive(Debug, Clone)]
pub struct Diagnostics {
    errors: Vec<AsmErr>,
    src_info: SourceInfo,
}
impl Diagnostics {
    fn new(errors: Vec<AsmErr>, src: &str) -> Self {
        Self { errors, src_info: SourceInfo::new(src) }
    }

    /// The reported errors, in source order.
    pub fn errors(&self) -> &[AsmErr] {
        &self.errors
    }

    /// The one-indexed line number of an error.
    pub fn line_of(&self, err: &AsmErr) -> usize {
        self.src_info.get_line(err.span.first().start) + 1
    }
}
impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::err::Error as _;

        for err in &self.errors {
            let lno = self.src_info.get_line(err.span.first().start);
            let line = self.src_info.read_line(lno).unwrap_or("");

            writeln!(f, "line {}: {line}: {err}", lno + 1)?;
            if let Some(help) = err.help() {
                writeln!(f, "    help: {help}")?;
            }
        }
        Ok(())
    }
}
impl std::error::Error for Diagnostics {}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
struct SymbolData {
    addr: u16,
    src_start: usize,
}
impl SymbolData {
    /// Calculates the source range of this symbol, given the name of the label.
    fn span(&self, label: &str) -> Range<usize> {
        self.src_start .. (self.src_start + label.len())
    }
}

/// The symbol table created in the first assembler pass,
/// mapping every label in the source to its address (in blocks).
///
/// Labels are case-insensitive.
///
/// | from ↓, to →   | label                             | memory address                | source span                       |
/// |----------------|-----------------------------------|-------------------------------|-----------------------------------|
/// | label          | -                                 | [`SymbolTable::lookup_label`] | [`SymbolTable::get_label_source`] |
/// | memory address | [`SymbolTable::rev_lookup_label`] | -                             | -                                 |
#[derive(PartialEq, Eq, Clone)]
pub struct SymbolTable {
    /// A mapping from label to address and span of the label.
    label_map: HashMap<String, SymbolData>,

    /// The number of instructions in the program.
    instr_count: usize,

    /// The number of blocks in the assembled image.
    image_len: usize,
}

impl SymbolTable {
    /// Creates a new symbol table.
    ///
    /// This performs the first assembler pass, calculating the memory address of
    /// labels at each provided statement.
    ///
    /// ## Example
    /// ```
    /// use nic_ensemble::parse::parse_ast;
    /// use nic_ensemble::asm::SymbolTable;
    ///
    /// let src = "
    ///     start: loadc r0 data
    ///     loop:  jump loop
    ///     word data 1 2 3
    ///     word more
    /// ";
    /// let ast = parse_ast(src).unwrap();
    ///
    /// let sym = SymbolTable::new(&ast).unwrap();
    /// assert_eq!(sym.lookup_label("start"), Some(0));
    /// assert_eq!(sym.lookup_label("LOOP"), Some(4));
    /// // data comes after two instructions and the two tail instructions
    /// assert_eq!(sym.lookup_label("data"), Some(16));
    /// assert_eq!(sym.lookup_label("more"), Some(22));
    /// assert_eq!(sym.lookup_label("elsewhere"), None);
    /// ```
    pub fn new(stmts: &[Stmt]) -> Result<Self, AsmErr> {
        let (sym, mut errors) = Self::build(stmts);
        match errors.is_empty() {
            true  => Ok(sym),
            false => Err(errors.swap_remove(0)),
        }
    }

    /// Performs the first pass, collecting every error.
    fn build(stmts: &[Stmt]) -> (Self, Vec<AsmErr>) {
        fn add_label(
            labels: &mut HashMap<String, SymbolData>,
            errors: &mut Vec<AsmErr>,
            label: &crate::ast::Label,
            addr: usize
        ) {
            match labels.entry(label.name.to_uppercase()) {
                Entry::Occupied(e) => {
                    let span1 = e.get().span(e.key());
                    let span2 = label.span();
                    errors.push(AsmErr::new(AsmErrKind::OverlappingLabels, [span1, span2]));
                },
                Entry::Vacant(e) => {
                    // Addresses past the end of memory are reported as ProgramTooLarge.
                    let addr = u16::try_from(addr).unwrap_or(u16::MAX);
                    e.insert(SymbolData { addr, src_start: label.span().start });
                }
            }
        }

        let instr_count = stmts.iter()
            .filter(|stmt| matches!(stmt.nucleus, StmtKind::Instr(_)))
            .count();
        let code_end = INSTR_BLOCKS * (instr_count + TAIL.len());

        let mut label_map = HashMap::new();
        let mut errors = vec![];
        let mut too_large = false;

        // Location counters for code and for data.
        let mut code_lc = 0;
        let mut data_lc = code_end;

        for stmt in stmts {
            match &stmt.nucleus {
                StmtKind::Instr(_) => {
                    code_lc += INSTR_BLOCKS;
                    // Report at the first instruction whose code (plus tail) passes the end of memory.
                    if !too_large && code_lc + INSTR_BLOCKS * TAIL.len() > MEM_CELLS {
                        too_large = true;
                        errors.push(AsmErr::new(AsmErrKind::ProgramTooLarge(code_end), stmt.span.clone()));
                    }
                },
                StmtKind::Label(label) => add_label(&mut label_map, &mut errors, label, code_lc),
                StmtKind::Word(label, values) => {
                    add_label(&mut label_map, &mut errors, label, data_lc);
                    data_lc += WORD_BLOCKS * values.len().max(1);

                    if !too_large && data_lc > MEM_CELLS {
                        too_large = true;
                        errors.push(AsmErr::new(AsmErrKind::ProgramTooLarge(data_lc), stmt.span.clone()));
                    }
                }
            }
        }

        tracing::debug!(instrs = instr_count, labels = label_map.len(), blocks = data_lc, "pass 1 complete");
        (SymbolTable { label_map, instr_count, image_len: data_lc }, errors)
    }

    /// Gets the memory address of a given label (if it exists).
    pub fn lookup_label(&self, label: &str) -> Option<u16> {
        self.label_map.get(&label.to_uppercase()).map(|sym_data| sym_data.addr)
    }

    /// Gets a label at a given memory address (if one exists).
    ///
    /// If several labels share the address, the one defined first in source is returned.
    ///
    /// ## Example
    /// ```
    /// use nic_ensemble::parse::parse_ast;
    /// use nic_ensemble::asm::SymbolTable;
    ///
    /// let ast = parse_ast("a: b: halt\nc: halt").unwrap();
    /// let sym = SymbolTable::new(&ast).unwrap();
    ///
    /// assert_eq!(sym.rev_lookup_label(0), Some("A"));
    /// assert_eq!(sym.rev_lookup_label(4), Some("C"));
    /// assert_eq!(sym.rev_lookup_label(8), None);
    /// ```
    pub fn rev_lookup_label(&self, addr: u16) -> Option<&str> {
        let (label, _) = self.label_map.iter()
            .filter(|&(_, sym_data)| sym_data.addr == addr)
            .min_by_key(|&(_, sym_data)| sym_data.src_start)?;

        Some(label)
    }

    /// Gets the source span of a given label (if it exists).
    pub fn get_label_source(&self, label: &str) -> Option<Range<usize>> {
        let key = label.to_uppercase();
        self.label_map.get(&key)
            .map(|data| data.span(&key))
    }

    /// Gets an iterable of the mapping from labels to addresses.
    pub fn label_iter(&self) -> impl Iterator<Item=(&str, u16)> + '_ {
        self.label_map.iter()
            .map(|(label, sym_data)| (&**label, sym_data.addr))
    }

    /// The number of instructions in the program (excluding the tail).
    pub fn instr_count(&self) -> usize {
        self.instr_count
    }

    /// The address where data (from `word` directives) starts.
    pub fn data_start(&self) -> usize {
        INSTR_BLOCKS * (self.instr_count + TAIL.len())
    }

    /// Resolves a byte operand to its value.
    fn resolve(&self, op: &ByteOperand) -> Result<u8, AsmErr> {
        match op {
            ByteOperand::Imm(b) => Ok(*b),
            ByteOperand::Label(label, off) => {
                let addr = self.lookup_label(&label.name)
                    .ok_or_else(|| AsmErr::new(AsmErrKind::CouldNotFindLabel, label.span()))?;

                let value = i32::from(addr) + i32::from(*off);
                fit_byte(value)
                    .ok_or_else(|| AsmErr::new(AsmErrKind::ByteOutOfRange(value), label.span()))
            },
        }
    }
}
impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field("label_map", &self.label_map.iter().map(|(k, data)| (k, Addr(data.addr))).collect::<HashMap<_, _>>())
            .field("instr_count", &self.instr_count)
            .field("image_len", &self.image_len)
            .finish()
    }
}

impl AsmInstr {
    /// Converts an ASM instruction into a simulator instruction ([`SimInstr`])
    /// by resolving labels and erasing aliases.
    ///
    /// A conditional jump to an address that is not a multiple of 4 keeps its condition:
    /// the low two bits of the address are overwritten by the condition code.
    pub fn into_sim_instr(self, sym: &SymbolTable) -> Result<SimInstr, AsmErr> {
        match self {
            AsmInstr::Halt            => Ok(SimInstr::Halt),
            AsmInstr::Noop            => Ok(SimInstr::jump_raw(R0, 0x01)),
            AsmInstr::Load(r, op)     => Ok(SimInstr::Load(r, sym.resolve(&op)?)),
            AsmInstr::LoadC(r, op)    => Ok(SimInstr::LoadC(r, sym.resolve(&op)?)),
            AsmInstr::LoadR(a, b)     => Ok(SimInstr::LoadR(a, b)),
            AsmInstr::Store(r, op)    => Ok(SimInstr::Store(r, sym.resolve(&op)?)),
            AsmInstr::StoreR(a, b)    => Ok(SimInstr::StoreR(a, b)),
            AsmInstr::Move(a, b)      => Ok(SimInstr::Move(a, b)),
            AsmInstr::Add(a, b, c)    => Ok(SimInstr::Add(a, b, c)),
            AsmInstr::AddC(r, op)     => Ok(SimInstr::AddC(r, sym.resolve(&op)?)),
            AsmInstr::Mul(a, b, c)    => Ok(SimInstr::Mul(a, b, c)),
            AsmInstr::Sub(a, b, c)    => Ok(SimInstr::Sub(a, b, c)),
            AsmInstr::Shift(a, b, c)  => Ok(SimInstr::Shift(a, b, c)),
            AsmInstr::And(a, b, c)    => Ok(SimInstr::And(a, b, c)),
            AsmInstr::Or(a, b, c)     => Ok(SimInstr::Or(a, b, c)),
            AsmInstr::Xor(a, b, c)    => Ok(SimInstr::Xor(a, b, c)),
            AsmInstr::Jump(op)        => Ok(SimInstr::jump_raw(R0, sym.resolve(&op)?)),
            AsmInstr::JumpIf(cond, r, op) => {
                let target = sym.resolve(&op)?;
                if target & 0b11 != 0 {
                    tracing::warn!("{} {r} {op}: target 0x{target:02x} is not a multiple of 4, its low bits hold the condition", cond.mnemonic());
                }
                Ok(SimInstr::Jump { reg: r, cond, target: target & 0xFC })
            },
        }
    }
}

/// An assembled executable.
///
/// This is the final product after assembly source code is fully assembled.
/// This can be loaded in the simulator to run the assembled code.
///
/// The image is a sequence of 4-bit blocks, loaded into memory starting at address 0.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Executable {
    /// The memory image, one value in `0..16` per block.
    ///
    /// Invariants:
    /// - Every block is a nibble.
    /// - The image fits in memory.
    image: Vec<u8>,

    /// Symbols (only present if this was assembled from source).
    sym: Option<SymbolTable>
}
impl Executable {
    /// Creates an executable from a raw memory image.
    ///
    /// ```
    /// use nic_ensemble::asm::Executable;
    ///
    /// assert!(Executable::from_image(vec![0xf, 0, 0, 1]).is_ok());
    /// assert!(Executable::from_image(vec![0x10]).is_err());
    /// assert!(Executable::from_image(vec![0; 257]).is_err());
    /// ```
    pub fn from_image(image: Vec<u8>) -> Result<Self, encoding::ExeErr> {
        if image.len() > MEM_CELLS {
            return Err(encoding::ExeErr::TooLarge(image.len()));
        }
        if let Some(i) = image.iter().position(|&b| b > 0xF) {
            return Err(encoding::ExeErr::InvalidDigit(i));
        }

        Ok(Self { image, sym: None })
    }

    /// Performs the second pass, creating the image from the statements and the symbol table.
    ///
    /// Every error found is collected. Blocks of statements with errors are zeroed.
    fn build(stmts: Vec<Stmt>, sym: SymbolTable) -> (Self, Vec<AsmErr>) {
        let mut code = Vec::with_capacity(sym.data_start());
        let mut data = vec![];
        let mut errors = vec![];

        for stmt in stmts {
            match stmt.nucleus {
                StmtKind::Instr(instr) => {
                    let word = match instr.into_sim_instr(&sym) {
                        Ok(sim) => sim.encode(),
                        Err(e) => {
                            errors.push(e);
                            0
                        }
                    };
                    push_word(&mut code, word);
                },
                StmtKind::Label(_) => {},
                StmtKind::Word(_, values) if values.is_empty() => push_byte(&mut data, 0),
                StmtKind::Word(_, values) => {
                    for value in values {
                        let byte = sym.resolve(&value).unwrap_or_else(|e| {
                            errors.push(e);
                            0
                        });
                        push_byte(&mut data, byte);
                    }
                }
            }
        }

        for instr in TAIL {
            push_word(&mut code, instr.encode());
        }
        code.extend(data);

        tracing::debug!(blocks = code.len(), errors = errors.len(), "pass 2 complete");
        (Self { image: code, sym: Some(sym) }, errors)
    }

    /// The memory image, one 4-bit block per element.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// The number of blocks in the image.
    pub fn len(&self) -> usize {
        self.image.len()
    }

    /// Whether the image is empty.
    ///
    /// This is never true for an assembled executable (which always includes the tail).
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    /// Gets the symbol table if it is present in the executable.
    pub fn symbol_table(&self) -> Option<&SymbolTable> {
        self.sym.as_ref()
    }

    /// Removes the symbol table from the executable.
    pub fn strip_symbols(mut self) -> Self {
        self.sym = None;
        self
    }
}

fn push_word(image: &mut Vec<u8>, word: u16) {
    image.extend(word.to_be_bytes().into_iter().flat_map(|b| [b >> 4, b & 0xF]));
}
fn push_byte(image: &mut Vec<u8>, byte: u8) {
    image.extend([byte >> 4, byte & 0xF]);
}

/// Used for [`std::fmt::Debug`] purposes.
#[repr(transparent)]
struct Addr(u16);
impl std::fmt::Debug for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}
