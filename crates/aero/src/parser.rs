//! ES5.1 pattern parser
//!
//! Recursive descent over UTF-16 code units, producing the [`crate::ast`]
//! tree. The grammar follows ES5.1 §15.10.1 with the usual Annex B
//! relaxations: a lone `{`, `}` or `]` is a literal, and an incomplete
//! `\x`/`\u` escape is an identity escape.

use thiserror::Error;

use crate::ast::{Alternative, Assertion, Atom, Disjunction, Pattern, Term};
use crate::flags::RegExpFlags;
use crate::range_builder::RangeBuilder;

/// Pattern and flag parse failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    /// `(` without a matching `)`
    #[error("unterminated group")]
    UnterminatedGroup,
    /// `)` without a matching `(`
    #[error("unmatched ')'")]
    UnmatchedParen,
    /// `[` without a matching `]`
    #[error("unterminated character class")]
    UnterminatedClass,
    /// Class range with start above last, e.g. `[z-a]`
    #[error("invalid character class range")]
    InvalidClassRange,
    /// Quantifier with min above max, e.g. `a{3,1}`
    #[error("numbers out of order in {{}} quantifier")]
    QuantifierOutOfOrder,
    /// Quantifier with nothing to repeat, e.g. `*a`
    #[error("nothing to repeat")]
    NothingToRepeat,
    /// Pattern ends inside an escape
    #[error("trailing backslash")]
    TrailingBackslash,
    /// Unknown flag letter
    #[error("invalid regular expression flag '{0}'")]
    InvalidFlag(char),
    /// Flag letter given twice
    #[error("duplicate regular expression flag '{0}'")]
    DuplicateFlag(char),
}

/// Parse `source` under `flags` into a [`Pattern`].
pub fn parse(source: &str, flags: RegExpFlags) -> Result<Pattern, PatternError> {
    let units: Vec<u16> = source.encode_utf16().collect();
    let mut parser = Parser {
        units,
        pos: 0,
        next_capture: 1,
    };
    let root = parser.parse_disjunction()?;
    if parser.pos != parser.units.len() {
        // The only way to stop early outside a group is a stray ')'.
        return Err(PatternError::UnmatchedParen);
    }
    Ok(Pattern {
        root,
        captures: parser.next_capture - 1,
        flags,
    })
}

struct Parser {
    units: Vec<u16>,
    pos: usize,
    next_capture: u32,
}

impl Parser {
    fn peek(&self) -> Option<u16> {
        self.units.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u16> {
        self.units.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u16> {
        let unit = self.peek()?;
        self.pos += 1;
        Some(unit)
    }

    fn eat(&mut self, unit: u16) -> bool {
        if self.peek() == Some(unit) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_disjunction(&mut self) -> Result<Disjunction, PatternError> {
        let mut alternatives = vec![self.parse_alternative()?];
        while self.eat(u16::from(b'|')) {
            alternatives.push(self.parse_alternative()?);
        }
        Ok(Disjunction { alternatives })
    }

    fn parse_alternative(&mut self) -> Result<Alternative, PatternError> {
        let mut terms = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(unit) if unit == u16::from(b'|') || unit == u16::from(b')') => break,
                _ => terms.push(self.parse_term()?),
            }
        }
        Ok(Alternative { terms })
    }

    fn parse_term(&mut self) -> Result<Term, PatternError> {
        if let Some(assertion) = self.try_parse_assertion()? {
            return Ok(Term::Assertion(assertion));
        }
        let atom = self.parse_atom()?;
        match self.try_parse_quantifier()? {
            Some((min, max, greedy)) => Ok(Term::Quantified {
                atom,
                min,
                max,
                greedy,
            }),
            None => Ok(Term::Atom(atom)),
        }
    }

    fn try_parse_assertion(&mut self) -> Result<Option<Assertion>, PatternError> {
        match self.peek() {
            Some(unit) if unit == u16::from(b'^') => {
                self.pos += 1;
                Ok(Some(Assertion::StartOfInput))
            }
            Some(unit) if unit == u16::from(b'$') => {
                self.pos += 1;
                Ok(Some(Assertion::EndOfInput))
            }
            Some(unit) if unit == u16::from(b'\\') => match self.peek_at(1) {
                Some(next) if next == u16::from(b'b') => {
                    self.pos += 2;
                    Ok(Some(Assertion::WordBoundary))
                }
                Some(next) if next == u16::from(b'B') => {
                    self.pos += 2;
                    Ok(Some(Assertion::NotWordBoundary))
                }
                _ => Ok(None),
            },
            Some(unit) if unit == u16::from(b'(') => {
                if self.peek_at(1) != Some(u16::from(b'?')) {
                    return Ok(None);
                }
                let negated = match self.peek_at(2) {
                    Some(next) if next == u16::from(b'=') => false,
                    Some(next) if next == u16::from(b'!') => true,
                    _ => return Ok(None),
                };
                self.pos += 3;
                let body = self.parse_disjunction()?;
                if !self.eat(u16::from(b')')) {
                    return Err(PatternError::UnterminatedGroup);
                }
                Ok(Some(Assertion::Lookahead { negated, body }))
            }
            _ => Ok(None),
        }
    }

    fn parse_atom(&mut self) -> Result<Atom, PatternError> {
        let unit = self.bump().expect("caller checked for end of input");
        match unit {
            u if u == u16::from(b'.') => {
                let mut builder = RangeBuilder::new();
                builder.add_escape('.');
                Ok(Atom::CharacterClass {
                    negated: false,
                    ranges: builder.finish(),
                })
            }
            u if u == u16::from(b'(') => {
                let capture = if self.peek() == Some(u16::from(b'?'))
                    && self.peek_at(1) == Some(u16::from(b':'))
                {
                    self.pos += 2;
                    None
                } else {
                    let index = self.next_capture;
                    self.next_capture += 1;
                    Some(index)
                };
                let body = self.parse_disjunction()?;
                if !self.eat(u16::from(b')')) {
                    return Err(PatternError::UnterminatedGroup);
                }
                Ok(Atom::Group { capture, body })
            }
            u if u == u16::from(b'[') => self.parse_class(),
            u if u == u16::from(b'\\') => self.parse_atom_escape(),
            u if u == u16::from(b'*') || u == u16::from(b'+') || u == u16::from(b'?') => {
                Err(PatternError::NothingToRepeat)
            }
            other => Ok(Atom::Character(other)),
        }
    }

    fn parse_atom_escape(&mut self) -> Result<Atom, PatternError> {
        let unit = self.bump().ok_or(PatternError::TrailingBackslash)?;
        let ch = char::from_u32(u32::from(unit)).unwrap_or('\u{FFFD}');
        match ch {
            '1'..='9' => {
                let mut index = u32::from(unit) - u32::from(b'0');
                while let Some(next) = self.peek() {
                    if !(u16::from(b'0')..=u16::from(b'9')).contains(&next) {
                        break;
                    }
                    index = index * 10 + (u32::from(next) - u32::from(b'0'));
                    self.pos += 1;
                }
                Ok(Atom::BackReference(index))
            }
            '0' => Ok(Atom::Character(0)),
            'd' | 'D' | 's' | 'S' | 'w' | 'W' => {
                let mut builder = RangeBuilder::new();
                builder.add_escape(ch);
                Ok(Atom::CharacterClass {
                    negated: false,
                    ranges: builder.finish(),
                })
            }
            'f' => Ok(Atom::Character(0x0C)),
            'n' => Ok(Atom::Character(0x0A)),
            'r' => Ok(Atom::Character(0x0D)),
            't' => Ok(Atom::Character(0x09)),
            'v' => Ok(Atom::Character(0x0B)),
            'c' => match self.peek().and_then(|u| char::from_u32(u32::from(u))) {
                Some(letter) if letter.is_ascii_alphabetic() => {
                    self.pos += 1;
                    Ok(Atom::Character(u16::from(letter as u8 % 32)))
                }
                // Annex B: '\c' followed by a non-letter is a literal backslash
                _ => Ok(Atom::Character(u16::from(b'\\'))),
            },
            'x' => Ok(Atom::Character(
                self.parse_hex_escape(2).unwrap_or(u16::from(b'x')),
            )),
            'u' => Ok(Atom::Character(
                self.parse_hex_escape(4).unwrap_or(u16::from(b'u')),
            )),
            _ => Ok(Atom::Character(unit)),
        }
    }

    /// Parse `count` hex digits; on failure leave the position untouched
    /// so the escape letter becomes an identity escape.
    fn parse_hex_escape(&mut self, count: usize) -> Option<u16> {
        let start = self.pos;
        let mut value: u32 = 0;
        for _ in 0..count {
            let digit = self
                .peek()
                .and_then(|u| char::from_u32(u32::from(u)))
                .and_then(|c| c.to_digit(16));
            match digit {
                Some(d) => {
                    value = value * 16 + d;
                    self.pos += 1;
                }
                None => {
                    self.pos = start;
                    return None;
                }
            }
        }
        Some(value as u16)
    }

    fn try_parse_quantifier(&mut self) -> Result<Option<(u32, Option<u32>, bool)>, PatternError> {
        let (min, max) = match self.peek() {
            Some(u) if u == u16::from(b'*') => {
                self.pos += 1;
                (0, None)
            }
            Some(u) if u == u16::from(b'+') => {
                self.pos += 1;
                (1, None)
            }
            Some(u) if u == u16::from(b'?') => {
                self.pos += 1;
                (0, Some(1))
            }
            Some(u) if u == u16::from(b'{') => {
                let start = self.pos;
                match self.try_parse_braced_quantifier()? {
                    Some(bounds) => bounds,
                    None => {
                        // Annex B: not a quantifier, '{' is a literal.
                        self.pos = start;
                        return Ok(None);
                    }
                }
            }
            _ => return Ok(None),
        };
        let greedy = !self.eat(u16::from(b'?'));
        Ok(Some((min, max, greedy)))
    }

    fn try_parse_braced_quantifier(&mut self) -> Result<Option<(u32, Option<u32>)>, PatternError> {
        debug_assert_eq!(self.peek(), Some(u16::from(b'{')));
        self.pos += 1;
        let min = match self.parse_decimal() {
            Some(n) => n,
            None => return Ok(None),
        };
        if self.eat(u16::from(b'}')) {
            return Ok(Some((min, Some(min))));
        }
        if !self.eat(u16::from(b',')) {
            return Ok(None);
        }
        if self.eat(u16::from(b'}')) {
            return Ok(Some((min, None)));
        }
        let max = match self.parse_decimal() {
            Some(n) => n,
            None => return Ok(None),
        };
        if !self.eat(u16::from(b'}')) {
            return Ok(None);
        }
        if max < min {
            return Err(PatternError::QuantifierOutOfOrder);
        }
        Ok(Some((min, Some(max))))
    }

    fn parse_decimal(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(unit) = self.peek() {
            if !(u16::from(b'0')..=u16::from(b'9')).contains(&unit) {
                break;
            }
            let digit = u32::from(unit) - u32::from(b'0');
            value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit));
            self.pos += 1;
        }
        value
    }

    fn parse_class(&mut self) -> Result<Atom, PatternError> {
        let negated = self.eat(u16::from(b'^'));
        let mut builder = RangeBuilder::new();
        loop {
            let unit = self.bump().ok_or(PatternError::UnterminatedClass)?;
            if unit == u16::from(b']') {
                break;
            }
            let first = self.parse_class_atom(unit)?;
            // A class escape (e.g. `[\d]`) contributes its ranges and can
            // never be the start of an `a-z` range.
            let first = match first {
                ClassAtom::Unit(u) => u,
                ClassAtom::Escape(letter) => {
                    builder.add_escape(letter);
                    continue;
                }
            };
            if self.peek() == Some(u16::from(b'-'))
                && self.peek_at(1).is_some()
                && self.peek_at(1) != Some(u16::from(b']'))
            {
                self.pos += 1;
                let next = self.bump().ok_or(PatternError::UnterminatedClass)?;
                match self.parse_class_atom(next)? {
                    ClassAtom::Unit(last) => {
                        if !RangeBuilder::is_valid_range(first, last) {
                            return Err(PatternError::InvalidClassRange);
                        }
                        builder.add_range(first, last);
                    }
                    ClassAtom::Escape(letter) => {
                        // Annex B: `[a-\d]` treats '-' as a literal.
                        builder.add(first);
                        builder.add(u16::from(b'-'));
                        builder.add_escape(letter);
                    }
                }
            } else {
                builder.add(first);
            }
        }
        Ok(Atom::CharacterClass {
            negated,
            ranges: builder.finish(),
        })
    }

    fn parse_class_atom(&mut self, unit: u16) -> Result<ClassAtom, PatternError> {
        if unit != u16::from(b'\\') {
            return Ok(ClassAtom::Unit(unit));
        }
        let escaped = self.bump().ok_or(PatternError::UnterminatedClass)?;
        let ch = char::from_u32(u32::from(escaped)).unwrap_or('\u{FFFD}');
        Ok(match ch {
            'd' | 'D' | 's' | 'S' | 'w' | 'W' => ClassAtom::Escape(ch),
            'b' => ClassAtom::Unit(0x08),
            'f' => ClassAtom::Unit(0x0C),
            'n' => ClassAtom::Unit(0x0A),
            'r' => ClassAtom::Unit(0x0D),
            't' => ClassAtom::Unit(0x09),
            'v' => ClassAtom::Unit(0x0B),
            'x' => ClassAtom::Unit(self.parse_hex_escape(2).unwrap_or(u16::from(b'x'))),
            'u' => ClassAtom::Unit(self.parse_hex_escape(4).unwrap_or(u16::from(b'u'))),
            'c' => match self.peek().and_then(|u| char::from_u32(u32::from(u))) {
                Some(letter) if letter.is_ascii_alphabetic() => {
                    self.pos += 1;
                    ClassAtom::Unit(u16::from(letter as u8 % 32))
                }
                _ => ClassAtom::Unit(u16::from(b'\\')),
            },
            '0' => ClassAtom::Unit(0),
            _ => ClassAtom::Unit(escaped),
        })
    }
}

enum ClassAtom {
    Unit(u16),
    Escape(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Pattern {
        parse(source, RegExpFlags::default()).unwrap()
    }

    fn first_term(pattern: &Pattern) -> &Term {
        &pattern.root.alternatives[0].terms[0]
    }

    #[test]
    fn test_literal_sequence() {
        let pattern = parse_ok("abc");
        assert_eq!(pattern.captures, 0);
        let terms = &pattern.root.alternatives[0].terms;
        assert_eq!(terms.len(), 3);
        assert!(matches!(terms[0], Term::Atom(Atom::Character(c)) if c == u16::from(b'a')));
    }

    #[test]
    fn test_alternation() {
        let pattern = parse_ok("a|b|c");
        assert_eq!(pattern.root.alternatives.len(), 3);
    }

    #[test]
    fn test_capture_counting() {
        let pattern = parse_ok("(a)(?:b)((c))");
        assert_eq!(pattern.captures, 3);
    }

    #[test]
    fn test_quantifiers() {
        let pattern = parse_ok("a*?");
        match first_term(&pattern) {
            Term::Quantified {
                min, max, greedy, ..
            } => {
                assert_eq!(*min, 0);
                assert_eq!(*max, None);
                assert!(!greedy);
            }
            other => panic!("expected quantified term, got {other:?}"),
        }
    }

    #[test]
    fn test_braced_quantifier() {
        let pattern = parse_ok("a{2,5}");
        match first_term(&pattern) {
            Term::Quantified { min, max, .. } => {
                assert_eq!(*min, 2);
                assert_eq!(*max, Some(5));
            }
            other => panic!("expected quantified term, got {other:?}"),
        }
    }

    #[test]
    fn test_literal_brace() {
        let pattern = parse_ok("a{b");
        assert_eq!(pattern.root.alternatives[0].terms.len(), 3);
    }

    #[test]
    fn test_quantifier_out_of_order() {
        assert!(matches!(
            parse("a{3,1}", RegExpFlags::default()),
            Err(PatternError::QuantifierOutOfOrder)
        ));
    }

    #[test]
    fn test_assertions() {
        let pattern = parse_ok("^a$");
        let terms = &pattern.root.alternatives[0].terms;
        assert!(matches!(terms[0], Term::Assertion(Assertion::StartOfInput)));
        assert!(matches!(terms[2], Term::Assertion(Assertion::EndOfInput)));
    }

    #[test]
    fn test_lookahead() {
        let pattern = parse_ok("(?=a)(?!b)");
        let terms = &pattern.root.alternatives[0].terms;
        assert!(
            matches!(&terms[0], Term::Assertion(Assertion::Lookahead { negated: false, .. }))
        );
        assert!(
            matches!(&terms[1], Term::Assertion(Assertion::Lookahead { negated: true, .. }))
        );
        assert_eq!(pattern.captures, 0);
    }

    #[test]
    fn test_back_reference() {
        let pattern = parse_ok(r"(a)\1");
        let terms = &pattern.root.alternatives[0].terms;
        assert!(matches!(terms[1], Term::Atom(Atom::BackReference(1))));
    }

    #[test]
    fn test_class_with_range() {
        let pattern = parse_ok("[a-cx]");
        match first_term(&pattern) {
            Term::Atom(Atom::CharacterClass { negated, ranges }) => {
                assert!(!negated);
                assert_eq!(
                    ranges,
                    &vec![
                        (u16::from(b'a'), u16::from(b'c')),
                        (u16::from(b'x'), u16::from(b'x'))
                    ]
                );
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn test_negated_class() {
        let pattern = parse_ok("[^0-9]");
        assert!(matches!(
            first_term(&pattern),
            Term::Atom(Atom::CharacterClass { negated: true, .. })
        ));
    }

    #[test]
    fn test_invalid_class_range() {
        assert!(matches!(
            parse("[z-a]", RegExpFlags::default()),
            Err(PatternError::InvalidClassRange)
        ));
    }

    #[test]
    fn test_unmatched_paren() {
        assert!(matches!(
            parse("a)", RegExpFlags::default()),
            Err(PatternError::UnmatchedParen)
        ));
        assert!(matches!(
            parse("(a", RegExpFlags::default()),
            Err(PatternError::UnterminatedGroup)
        ));
    }

    #[test]
    fn test_hex_and_unicode_escapes() {
        let pattern = parse_ok(r"\x41B");
        let terms = &pattern.root.alternatives[0].terms;
        assert!(matches!(terms[0], Term::Atom(Atom::Character(0x41))));
        assert!(matches!(terms[1], Term::Atom(Atom::Character(0x42))));
    }

    #[test]
    fn test_incomplete_hex_is_identity() {
        let pattern = parse_ok(r"\x4");
        let terms = &pattern.root.alternatives[0].terms;
        assert!(matches!(terms[0], Term::Atom(Atom::Character(c)) if c == u16::from(b'x')));
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn test_empty_pattern() {
        let pattern = parse_ok("");
        assert_eq!(pattern.root.alternatives.len(), 1);
        assert!(pattern.root.alternatives[0].terms.is_empty());
    }
}
