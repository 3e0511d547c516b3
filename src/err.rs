//! Error interface for this crate.
//!
//! This module re-exports every error type of the crate and defines
//! the [`Error`] trait, which extends [`std::error::Error`] with
//! source spans and help messages used by assembler diagnostics.

use std::borrow::Cow;
use std::ops::Range;

pub use crate::parse::lex::LexErr;
pub use crate::parse::{ParseErr, ParseErrKind};
pub use crate::asm::{AsmErr, AsmErrKind, ErrClass};
pub use crate::asm::encoding::ExeErr;
pub use crate::sim::SimErr;

/// Unified error interface for all errors in this crate.
///
/// Note that the [`Display`] implementation is used for a brief message,
/// where as [`Error::help`] is used for any clarifying messages.
///
/// [`Display`]: std::fmt::Display
pub trait Error: std::error::Error {
    /// The range where this error occurs in source.
    ///
    /// If this is not known, this can be set to `None`.
    fn span(&self) -> Option<ErrSpan> {
        None
    }

    /// A clarifying message to help aid someone in how to fix the message.
    ///
    /// If there is none to add, this can be set to `None`.
    fn help(&self) -> Option<Cow<str>>;
}

/// The possible source ranges for an error.
///
/// Most errors point at a single place in source,
/// but some (such as duplicate labels) point at two.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum ErrSpan {
    /// One contiguous range in source.
    One(Range<usize>),
    /// Two ranges in source (e.g., the original and the conflicting definition).
    Two([Range<usize>; 2]),
}
impl ErrSpan {
    /// Gets the first range of this span.
    pub fn first(&self) -> Range<usize> {
        match self {
            ErrSpan::One(r) => r.clone(),
            ErrSpan::Two([r, _]) => r.clone(),
        }
    }

    /// Gets an iterator over all of the ranges of this span.
    pub fn iter(&self) -> impl Iterator<Item=&Range<usize>> + '_ {
        match self {
            ErrSpan::One(r) => std::slice::from_ref(r).iter(),
            ErrSpan::Two(rs) => rs.iter(),
        }
    }
}
impl From<Range<usize>> for ErrSpan {
    fn from(value: Range<usize>) -> Self {
        ErrSpan::One(value)
    }
}
impl From<[Range<usize>; 2]> for ErrSpan {
    fn from(value: [Range<usize>; 2]) -> Self {
        ErrSpan::Two(value)
    }
}

#[cfg(test)]
mod tests {
    use super::ErrSpan;

    #[test]
    fn test_span_ranges() {
        let one = ErrSpan::from(3..5);
        assert_eq!(one.first(), 3..5);
        assert_eq!(one.iter().count(), 1);

        let two = ErrSpan::from([1..2, 7..9]);
        assert_eq!(two.first(), 1..2);
        assert_eq!(two.iter().cloned().collect::<Vec<_>>(), vec![1..2, 7..9]);
    }
}
