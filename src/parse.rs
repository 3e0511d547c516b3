//! Parsing assembly source code into an AST.
//!
//! This module is used to convert strings (which represent assembly source code)
//! into abstract syntax trees that maintain all of the information of the source code
//! in an easier to handle format.
//!
//! The main function to use from this module is [`parse_ast`],
//! which parses an assembly code program into a `Vec<Stmt>` (a list of statements).
//! When every syntax error in the source is of interest, [`parse_all`] keeps going
//! after an error and collects them all.
//!
//! NAS assembly is line-based. Each line holds any number of label definitions
//! (`name:`), optionally followed by one instruction or `word` directive.
//! Comments (`// ...`), blank lines, commas and extra whitespace are insignificant.
//!
//! ```
//! use nic_ensemble::parse::parse_ast;
//!
//! let src = "
//!     loop: addc r1 1   // count up
//!           jumpn r1 loop
//!     word data 0x10 -1 loop+4
//! ";
//! let ast = parse_ast(src).unwrap();
//! assert_eq!(ast.len(), 4);
//! ```

pub mod lex;

use std::borrow::Cow;
use std::ops::Range;

use logos::{Logos, Span};

use crate::ast::asm::{AsmInstr, Stmt, StmtKind};
use crate::ast::{fit_byte, ByteOperand, Cond, Label, Reg, BYTE_MAX, BYTE_MIN};
use lex::{Ident, LexErr, Token};

/// Parses an assembly source code string into a `Vec` of statements.
///
/// This returns the first syntax error found in the source.
///
/// # Example
/// ```
/// use nic_ensemble::parse::parse_ast;
///
/// let src = "halt";
/// let ast = parse_ast(src).unwrap();
/// assert_eq!(ast.len(), 1);
///
/// assert!(parse_ast("halt r1").is_err());
/// ```
pub fn parse_ast(s: &str) -> Result<Vec<Stmt>, ParseErr> {
    let (stmts, mut errors) = parse_all(s);
    match errors.is_empty() {
        true  => Ok(stmts),
        false => Err(errors.swap_remove(0)),
    }
}

/// Parses an assembly source code string, collecting every syntax error.
///
/// After an error, parsing recovers at the next line.
/// Statements are returned for every line that parsed successfully.
pub fn parse_all(s: &str) -> (Vec<Stmt>, Vec<ParseErr>) {
    let mut stmts = vec![];
    let mut errors = vec![];

    for line in split_lines(s) {
        // Report the first lexing error of this line (if any), and skip it.
        let tokens: Result<Vec<_>, _> = line.into_iter()
            .map(|(m_tok, span)| match m_tok {
                Ok(tok) => Ok((tok, span)),
                Err(e)  => Err(ParseErr::new(ParseErrKind::Lex(e), span)),
            })
            .collect();

        let result = tokens.and_then(|tokens| {
            let mut parser = Parser::new(&tokens);
            parser.parse_line(&mut stmts)
        });

        if let Err(e) = result {
            errors.push(e);
        }
    }

    tracing::trace!(stmts = stmts.len(), errors = errors.len(), "parsed source");
    (stmts, errors)
}

type SpannedToken = (Result<Token, LexErr>, Span);

/// Splits the token stream into lines,
/// dropping comments and commas and skipping blank lines.
fn split_lines(s: &str) -> Vec<Vec<SpannedToken>> {
    let mut lines = vec![];
    let mut current = vec![];

    for (m_tok, span) in Token::lexer(s).spanned() {
        match m_tok {
            Ok(Token::NewLine) => lines.push(std::mem::take(&mut current)),
            Ok(Token::Comment | Token::Comma) => {},
            m_tok => current.push((m_tok, span)),
        }
    }
    lines.push(current);

    lines.retain(|line| !line.is_empty());
    lines
}

/// The kind of operand the parser expected to find.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum OperandKind {
    /// A register (`r0`-`r15`).
    Reg,
    /// An 8-bit value: a number, a label, or a label with a displacement.
    Byte,
    /// A name for a `word` directive.
    Name,
}
impl std::fmt::Display for OperandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperandKind::Reg  => f.write_str("register"),
            OperandKind::Byte => f.write_str("value or label"),
            OperandKind::Name => f.write_str("name"),
        }
    }
}

/// Kinds of errors that can occur from parsing assembly source code.
///
/// See [`ParseErr`] for this error type with span information included.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ParseErrKind {
    /// The line contained a token which could not be lexed.
    Lex(LexErr),
    /// The statement did not start with a known mnemonic.
    UnknownMnemonic,
    /// A register name was used as a label definition (e.g., `r5:`).
    RegisterLabel,
    /// An operand of a certain kind was expected, but something else (or nothing) was found.
    ExpectedOperand(OperandKind),
    /// Extra tokens were found after a complete statement.
    UnexpectedToken,
    /// A numeric operand did not fit in 8 bits.
    ByteOutOfRange(i32),
}
impl std::fmt::Display for ParseErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrKind::Lex(e)             => e.fmt(f),
            ParseErrKind::UnknownMnemonic    => f.write_str("unknown mnemonic"),
            ParseErrKind::RegisterLabel      => f.write_str("cannot define a register as a label"),
            ParseErrKind::ExpectedOperand(k) => write!(f, "expected {k}"),
            ParseErrKind::UnexpectedToken    => f.write_str("unexpected token"),
            ParseErrKind::ByteOutOfRange(v)  => write!(f, "value {v} does not fit in a byte"),
        }
    }
}

/// Error from parsing assembly source code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseErr {
    /// The kind of error.
    pub kind: ParseErrKind,
    /// The span in the source associated with this error.
    pub span: Range<usize>
}
impl ParseErr {
    /// Creates a new [`ParseErr`].
    pub fn new(kind: ParseErrKind, span: Range<usize>) -> Self {
        ParseErr { kind, span }
    }
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for ParseErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrKind::Lex(e) => Some(e),
            _ => None
        }
    }
}
impl crate::err::Error for ParseErr {
    fn span(&self) -> Option<crate::err::ErrSpan> {
        Some(self.span.clone().into())
    }

    fn help(&self) -> Option<Cow<str>> {
        match &self.kind {
            ParseErrKind::Lex(e) => crate::err::Error::help(e),
            ParseErrKind::UnknownMnemonic => Some("a label definition must be followed by ':'".into()),
            ParseErrKind::RegisterLabel => Some("register names (r0-r15) cannot be used as labels".into()),
            ParseErrKind::ExpectedOperand(OperandKind::Reg) => Some("registers are written r0-r15".into()),
            ParseErrKind::ExpectedOperand(OperandKind::Byte) => Some("expected a number (e.g., 12, -3, 0x1f) or a label (e.g., loop, data+1)".into()),
            ParseErrKind::ExpectedOperand(OperandKind::Name) => Some("a word directive is written `word name value...`".into()),
            ParseErrKind::UnexpectedToken => Some("each line holds at most one instruction".into()),
            ParseErrKind::ByteOutOfRange(_) => Some(format!("the range for a byte operand is [{BYTE_MIN}, {BYTE_MAX}]").into()),
        }
    }
}

/// Components that can be constructed with a sequence of tokens.
pub trait Parse: Sized {
    /// Attempt to convert the next sequence of tokens
    /// in the parser's state to the component.
    ///
    /// If parsing fails, there are no guarantees about what happens to the input,
    /// and the parser likely should not be used after an error.
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr>;
}

/// The state of parsing one line of assembly.
///
/// The tokens given to the parser have already had comments and commas removed.
pub struct Parser<'t> {
    tokens: &'t [(Token, Span)],
    index: usize,
}
impl<'t> Parser<'t> {
    /// Creates a parser over the tokens of a line.
    pub fn new(tokens: &'t [(Token, Span)]) -> Self {
        Self { tokens, index: 0 }
    }

    /// Peeks at the next token.
    fn peek(&self) -> Option<&'t (Token, Span)> {
        self.tokens.get(self.index)
    }

    /// Consumes the next token.
    fn advance(&mut self) -> Option<&'t (Token, Span)> {
        let tok = self.tokens.get(self.index);
        if tok.is_some() {
            self.index += 1;
        }
        tok
    }

    /// The span of the next token, or an empty span at the end of the line.
    fn cursor(&self) -> Span {
        match self.peek() {
            Some((_, span)) => span.clone(),
            None => {
                let end = self.tokens.last().map_or(0, |(_, span)| span.end);
                end..end
            }
        }
    }

    /// The end of the most recently consumed token.
    fn consumed_end(&self) -> usize {
        match self.index {
            0 => 0,
            i => self.tokens[i - 1].1.end
        }
    }

    /// Whether the whole line has been consumed.
    pub fn is_empty(&self) -> bool {
        self.index >= self.tokens.len()
    }

    /// Parses a component.
    pub fn parse<P: Parse>(&mut self) -> Result<P, ParseErr> {
        P::parse(self)
    }

    /// Consumes a label definition (`name:`), if one is next.
    fn match_label_def(&mut self) -> Option<Label> {
        match self.tokens.get(self.index..self.index + 2)? {
            [(Token::Ident(Ident::Label(name)), span), (Token::Colon, _)] => {
                self.index += 2;
                Some(Label::new(name.clone(), span.clone()))
            },
            _ => None
        }
    }

    /// Parses every statement of the line, appending them to the statement list.
    fn parse_line(&mut self, stmts: &mut Vec<Stmt>) -> Result<(), ParseErr> {
        while let Some(label) = self.match_label_def() {
            let span = label.span().start..self.consumed_end();
            stmts.push(Stmt { nucleus: StmtKind::Label(label), span });
        }
        if let Some([(Token::Reg(_), span), (Token::Colon, _)]) = self.tokens.get(self.index..self.index + 2) {
            return Err(ParseErr::new(ParseErrKind::RegisterLabel, span.clone()));
        }
        if self.is_empty() {
            return Ok(());
        }

        let start = self.cursor().start;
        let nucleus = self.parse::<StmtKind>()?;
        if !self.is_empty() {
            return Err(ParseErr::new(ParseErrKind::UnexpectedToken, self.cursor()));
        }

        stmts.push(Stmt { nucleus, span: start..self.consumed_end() });
        Ok(())
    }
}

impl Parse for Reg {
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr> {
        let span = parser.cursor();
        match parser.advance() {
            Some((Token::Reg(r), _)) => Ok(Reg(*r)),
            _ => Err(ParseErr::new(ParseErrKind::ExpectedOperand(OperandKind::Reg), span)),
        }
    }
}

impl Parse for ByteOperand {
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr> {
        let span = parser.cursor();
        let value = match parser.advance() {
            Some((Token::Unsigned(n), _)) => i32::from(*n),
            Some((Token::Signed(n), _)) => i32::from(*n),
            Some((Token::Ident(Ident::Label(name)), span)) => {
                return Ok(ByteOperand::Label(Label::new(name.clone(), span.clone()), 0));
            },
            Some((Token::LabelOffset((name, off)), span)) => {
                let name_span = span.start..(span.start + name.len());
                return Ok(ByteOperand::Label(Label::new(name.clone(), name_span), *off));
            },
            _ => return Err(ParseErr::new(ParseErrKind::ExpectedOperand(OperandKind::Byte), span)),
        };

        fit_byte(value)
            .map(ByteOperand::Imm)
            .ok_or_else(|| ParseErr::new(ParseErrKind::ByteOutOfRange(value), span))
    }
}

impl Parse for Label {
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr> {
        let span = parser.cursor();
        match parser.advance() {
            Some((Token::Ident(Ident::Label(name)), span)) => Ok(Label::new(name.clone(), span.clone())),
            _ => Err(ParseErr::new(ParseErrKind::ExpectedOperand(OperandKind::Name), span)),
        }
    }
}

impl Parse for StmtKind {
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr> {
        let span = parser.cursor();
        let Some((Token::Ident(ident), _)) = parser.advance() else {
            return Err(ParseErr::new(ParseErrKind::UnknownMnemonic, span));
        };

        let instr = match ident {
            Ident::HALT   => AsmInstr::Halt,
            Ident::NOOP   => AsmInstr::Noop,
            Ident::LOAD   => AsmInstr::Load(parser.parse()?, parser.parse()?),
            Ident::LOADC  => AsmInstr::LoadC(parser.parse()?, parser.parse()?),
            Ident::LOADR  => AsmInstr::LoadR(parser.parse()?, parser.parse()?),
            Ident::STORE  => AsmInstr::Store(parser.parse()?, parser.parse()?),
            Ident::STORER => AsmInstr::StoreR(parser.parse()?, parser.parse()?),
            Ident::MOVE   => AsmInstr::Move(parser.parse()?, parser.parse()?),
            Ident::ADD    => AsmInstr::Add(parser.parse()?, parser.parse()?, parser.parse()?),
            Ident::ADDC   => AsmInstr::AddC(parser.parse()?, parser.parse()?),
            Ident::MUL    => AsmInstr::Mul(parser.parse()?, parser.parse()?, parser.parse()?),
            Ident::SUB    => AsmInstr::Sub(parser.parse()?, parser.parse()?, parser.parse()?),
            Ident::SHIFT  => AsmInstr::Shift(parser.parse()?, parser.parse()?, parser.parse()?),
            Ident::AND    => AsmInstr::And(parser.parse()?, parser.parse()?, parser.parse()?),
            Ident::OR     => AsmInstr::Or(parser.parse()?, parser.parse()?, parser.parse()?),
            Ident::XOR    => AsmInstr::Xor(parser.parse()?, parser.parse()?, parser.parse()?),
            Ident::JUMP   => AsmInstr::Jump(parser.parse()?),
            Ident::JUMPE  => AsmInstr::JumpIf(Cond::Eq, parser.parse()?, parser.parse()?),
            Ident::JUMPN  => AsmInstr::JumpIf(Cond::Ne, parser.parse()?, parser.parse()?),
            Ident::JUMPL  => AsmInstr::JumpIf(Cond::Lt, parser.parse()?, parser.parse()?),
            Ident::JUMPLE => AsmInstr::JumpIf(Cond::Le, parser.parse()?, parser.parse()?),
            Ident::WORD => {
                let name = parser.parse()?;
                let mut values = vec![];
                while !parser.is_empty() {
                    values.push(parser.parse()?);
                }
                return Ok(StmtKind::Word(name, values));
            },
            Ident::Label(_) => return Err(ParseErr::new(ParseErrKind::UnknownMnemonic, span)),
        };

        Ok(StmtKind::Instr(instr))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::asm::{AsmInstr, StmtKind};
    use crate::ast::reg_consts::{R0, R1, R15, R2};
    use crate::ast::{ByteOperand, Cond, Label};
    use crate::err::LexErr;

    use super::{parse_all, parse_ast, OperandKind, ParseErrKind};

    fn kinds(src: &str) -> Vec<StmtKind> {
        parse_ast(src).unwrap()
            .into_iter()
            .map(|stmt| stmt.nucleus)
            .collect()
    }
    fn instr(src: &str) -> AsmInstr {
        match &*kinds(src) {
            [StmtKind::Instr(i)] => i.clone(),
            k => panic!("expected single instruction, got {k:?}"),
        }
    }
    fn assert_parse_fail(src: &str, kind: ParseErrKind) {
        assert_eq!(parse_ast(src).unwrap_err().kind, kind, "for {src:?}");
    }

    #[test]
    fn test_instrs() {
        assert_eq!(instr("halt"), AsmInstr::Halt);
        assert_eq!(instr("NOOP"), AsmInstr::Noop);
        assert_eq!(instr("loadc r1 5"), AsmInstr::LoadC(R1, ByteOperand::Imm(5)));
        assert_eq!(instr("load r1, 0xff"), AsmInstr::Load(R1, ByteOperand::Imm(0xFF)));
        assert_eq!(instr("addc r15 -1"), AsmInstr::AddC(R15, ByteOperand::Imm(0xFF)));
        assert_eq!(instr("move r0 r15"), AsmInstr::Move(R0, R15));
        assert_eq!(instr("sub r0, r1, r2"), AsmInstr::Sub(R0, R1, R2));
        assert_eq!(instr("jump 4"), AsmInstr::Jump(ByteOperand::Imm(4)));
        assert_eq!(instr("jumple r2 0x10"), AsmInstr::JumpIf(Cond::Le, R2, ByteOperand::Imm(0x10)));
    }

    #[test]
    fn test_labels() {
        let src = "start: loop: addc r1 1\n  jumpn r1 loop+0\nend:";
        let stmts = parse_ast(src).unwrap();

        assert_eq!(stmts[0].nucleus, StmtKind::Label(Label::new("start".to_string(), 0..5)));
        assert_eq!(stmts[0].span, 0..6);
        assert_eq!(stmts[1].nucleus, StmtKind::Label(Label::new("loop".to_string(), 7..11)));
        assert_eq!(stmts[2].span, 13..22);
        assert_eq!(
            stmts[3].nucleus,
            StmtKind::Instr(AsmInstr::JumpIf(Cond::Ne, R1, ByteOperand::Label(Label::new("loop".to_string(), 34..38), 0)))
        );
        assert_eq!(stmts[4].nucleus, StmtKind::Label(Label::new("end".to_string(), 41..44)));
    }

    #[test]
    fn test_word() {
        let stmts = kinds("word a\nword b 0x3 -1 b-3 255");
        let [StmtKind::Word(a, a_values), StmtKind::Word(b, b_values)] = &*stmts else {
            panic!("expected two word directives, got {stmts:?}");
        };
        assert_eq!(a.name, "a");
        assert!(a_values.is_empty());
        assert_eq!(b.name, "b");
        assert_eq!(b_values, &[
            ByteOperand::Imm(3),
            ByteOperand::Imm(0xFF),
            ByteOperand::Label(Label::new("b".to_string(), 21..22), -3),
            ByteOperand::Imm(0xFF),
        ]);
    }

    #[test]
    fn test_insignificant() {
        let expected = kinds("add r0 r1 r2\nhalt");
        assert_eq!(kinds("\n\n  add   r0 r1 r2  // sum\n// only a comment\n\n\thalt\r\n\n"), expected);
        assert_eq!(kinds("add r0,r1,r2\nhalt// done"), expected);
        assert!(kinds("").is_empty());
        assert!(kinds("// nothing\n\n").is_empty());
    }

    #[test]
    fn test_errors() {
        assert_parse_fail("hop r1", ParseErrKind::UnknownMnemonic);
        assert_parse_fail("label halt", ParseErrKind::UnknownMnemonic);
        assert_parse_fail("5", ParseErrKind::UnknownMnemonic);
        assert_parse_fail("r5: halt", ParseErrKind::RegisterLabel);
        assert_parse_fail("start: R0: halt", ParseErrKind::RegisterLabel);
        assert_parse_fail("add r1 r2", ParseErrKind::ExpectedOperand(OperandKind::Reg));
        assert_parse_fail("move r1 5", ParseErrKind::ExpectedOperand(OperandKind::Reg));
        assert_parse_fail("loadc 5 r1", ParseErrKind::ExpectedOperand(OperandKind::Reg));
        assert_parse_fail("loadc r1", ParseErrKind::ExpectedOperand(OperandKind::Byte));
        assert_parse_fail("loadc r1 r2", ParseErrKind::ExpectedOperand(OperandKind::Byte));
        assert_parse_fail("word 5", ParseErrKind::ExpectedOperand(OperandKind::Name));
        assert_parse_fail("word halt", ParseErrKind::ExpectedOperand(OperandKind::Name));
        assert_parse_fail("halt halt", ParseErrKind::UnexpectedToken);
        assert_parse_fail("halt r0", ParseErrKind::UnexpectedToken);
        assert_parse_fail("loadc r1 256", ParseErrKind::ByteOutOfRange(256));
        assert_parse_fail("loadc r1 -129", ParseErrKind::ByteOutOfRange(-129));
        assert_parse_fail("word w 0x100", ParseErrKind::ByteOutOfRange(256));
        assert_parse_fail("loadc r16 1", ParseErrKind::Lex(LexErr::InvalidReg));
        assert_parse_fail("halt ; old style comment", ParseErrKind::Lex(LexErr::InvalidSymbol));
    }

    #[test]
    fn test_error_recovery() {
        let (stmts, errors) = parse_all("halt\nbogus\nloadc r1 5\nadd r1\nnoop");
        assert_eq!(stmts.len(), 3);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, ParseErrKind::UnknownMnemonic);
        assert_eq!(errors[0].span, 5..10);
        assert_eq!(errors[1].kind, ParseErrKind::ExpectedOperand(OperandKind::Reg));
        // Missing operands point at the end of the line.
        assert_eq!(errors[1].span, 28..28);
    }

    #[test]
    fn test_register_label_help() {
        use crate::err::Error;

        let err = parse_ast("halt\nr5: halt").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::RegisterLabel);
        assert_eq!(err.span, 5..7);
        assert!(err.help().unwrap().contains("cannot be used as labels"));
    }
}
