//! Pattern AST
//!
//! A parsed pattern is a tree of disjunctions, alternatives, and terms,
//! following the ES5.1 `Pattern` grammar. The tree exists for analysis
//! passes (the quick-check filter); it is not what the matcher executes.

use crate::flags::RegExpFlags;

/// An inclusive code-unit range `[start, last]`.
pub type CharacterRange = (u16, u16);

/// A parsed pattern together with its flags and capture-group count.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// The top-level disjunction
    pub root: Disjunction,
    /// Number of capturing groups, in source order
    pub captures: u32,
    /// The flags the pattern was parsed under
    pub flags: RegExpFlags,
}

/// `a|b|c`: one or more alternatives.
#[derive(Debug, Clone)]
pub struct Disjunction {
    /// The alternatives, in source order
    pub alternatives: Vec<Alternative>,
}

/// A sequence of terms; matches when every term matches in order.
#[derive(Debug, Clone)]
pub struct Alternative {
    /// The terms, in source order
    pub terms: Vec<Term>,
}

/// One term of an alternative.
#[derive(Debug, Clone)]
pub enum Term {
    /// A zero-width assertion
    Assertion(Assertion),
    /// An unquantified atom
    Atom(Atom),
    /// An atom with a repetition quantifier
    Quantified {
        /// The repeated atom
        atom: Atom,
        /// Minimum repetition count
        min: u32,
        /// Maximum repetition count; `None` means unbounded
        max: Option<u32>,
        /// `false` when the quantifier carries a `?` suffix
        greedy: bool,
    },
}

/// Zero-width assertions.
#[derive(Debug, Clone)]
pub enum Assertion {
    /// `^`
    StartOfInput,
    /// `$`
    EndOfInput,
    /// `\b`
    WordBoundary,
    /// `\B`
    NotWordBoundary,
    /// `(?=...)` / `(?!...)`
    Lookahead {
        /// `true` for `(?!...)`
        negated: bool,
        /// The asserted sub-pattern
        body: Disjunction,
    },
}

/// Pattern atoms.
#[derive(Debug, Clone)]
pub enum Atom {
    /// A single literal code unit
    Character(u16),
    /// `[...]`, `.`, or a class escape such as `\d`
    CharacterClass {
        /// `true` for `[^...]`
        negated: bool,
        /// Sorted, merged inclusive ranges
        ranges: Vec<CharacterRange>,
    },
    /// `\n` back-reference to capture group `n` (1-based)
    BackReference(u32),
    /// `(...)` or `(?:...)`
    Group {
        /// 1-based capture index; `None` for a non-capturing group
        capture: Option<u32>,
        /// The grouped sub-pattern
        body: Disjunction,
    },
}
