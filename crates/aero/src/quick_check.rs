//! First-character quick check
//!
//! Walks a parsed pattern and collects the set of code units a match could
//! possibly start with, as a 256-bit bitmap keyed by the low byte of the
//! code unit. The matcher skips candidate positions whose first code unit
//! is not admitted, without invoking the match primitive at all.
//!
//! The approximation gives up (and the caller disables the filter) on any
//! construct that could make the first character unconstrained or
//! data-dependent: assertions, lookaheads, back-references, character
//! classes, quantifiers, and empty alternatives.

use crate::ast::{Alternative, Atom, Disjunction, Pattern, Term};

/// Bitmap of admissible first code units, keyed by low byte.
///
/// Keying by the low byte makes the filter conservative for non-Latin-1
/// units: two units sharing a low byte are admitted together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstCharFilter {
    bits: [u64; 4],
}

impl FirstCharFilter {
    /// Admit `ch`.
    #[inline]
    pub fn add(&mut self, ch: u16) {
        let byte = (ch & 0xFF) as usize;
        self.bits[byte >> 6] |= 1u64 << (byte & 63);
    }

    /// Whether `ch` may start a match.
    #[inline]
    pub fn accepts(&self, ch: u16) -> bool {
        let byte = (ch & 0xFF) as usize;
        self.bits[byte >> 6] & (1u64 << (byte & 63)) != 0
    }

    /// Whether no unit is admitted
    pub fn is_empty(&self) -> bool {
        self.bits == [0; 4]
    }
}

/// The quick-check visitor.
pub struct QuickCheck {
    filter: FirstCharFilter,
    failed: bool,
    ignore_case: bool,
}

impl QuickCheck {
    /// Compute the filter for `pattern`, or `None` when the approximation
    /// does not hold and the pre-filter must stay disabled.
    pub fn emit(pattern: &Pattern) -> Option<FirstCharFilter> {
        let mut check = Self {
            filter: FirstCharFilter::default(),
            failed: false,
            ignore_case: pattern.flags.ignore_case,
        };
        check.visit_disjunction(&pattern.root);
        if check.failed || check.filter.is_empty() {
            None
        } else {
            Some(check.filter)
        }
    }

    fn fail(&mut self) {
        self.failed = true;
    }

    fn visit_disjunction(&mut self, disjunction: &Disjunction) {
        for alternative in &disjunction.alternatives {
            if self.failed {
                return;
            }
            self.visit_alternative(alternative);
        }
    }

    /// Only the first term constrains the leading character; later terms
    /// cannot. An empty alternative matches the empty string anywhere, so
    /// no first-character constraint exists at all.
    fn visit_alternative(&mut self, alternative: &Alternative) {
        match alternative.terms.first() {
            Some(term) => self.visit_term(term),
            None => self.fail(),
        }
    }

    fn visit_term(&mut self, term: &Term) {
        match term {
            Term::Assertion(_) => self.fail(),
            Term::Quantified { .. } => self.fail(),
            Term::Atom(atom) => self.visit_atom(atom),
        }
    }

    fn visit_atom(&mut self, atom: &Atom) {
        match atom {
            Atom::Character(ch) => self.add_character(*ch),
            Atom::CharacterClass { .. } => self.fail(),
            Atom::BackReference(_) => self.fail(),
            Atom::Group { body, .. } => self.visit_disjunction(body),
        }
    }

    fn add_character(&mut self, ch: u16) {
        if self.ignore_case {
            let upper = to_upper_case(ch);
            let lower = to_lower_case(ch);
            if !(upper == lower && upper == ch) {
                if upper == ch || lower == ch {
                    self.filter.add(upper);
                    self.filter.add(lower);
                } else {
                    self.filter.add(ch);
                    self.filter.add(upper);
                    self.filter.add(lower);
                }
                return;
            }
        }
        self.filter.add(ch);
    }
}

/// Simple (single-unit) uppercase mapping; identity when the mapping
/// leaves the BMP or expands.
fn to_upper_case(ch: u16) -> u16 {
    let Some(c) = char::from_u32(u32::from(ch)) else {
        return ch;
    };
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) if (u as u32) <= 0xFFFF => u as u16,
        _ => ch,
    }
}

/// Simple (single-unit) lowercase mapping; identity when the mapping
/// leaves the BMP or expands.
fn to_lower_case(ch: u16) -> u16 {
    let Some(c) = char::from_u32(u32::from(ch)) else {
        return ch;
    };
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) if (l as u32) <= 0xFFFF => l as u16,
        _ => ch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::RegExpFlags;
    use crate::parser::parse;

    fn filter_for(pattern: &str, flags: &str) -> Option<FirstCharFilter> {
        let flags = RegExpFlags::parse(flags).unwrap();
        let parsed = parse(pattern, flags).unwrap();
        QuickCheck::emit(&parsed)
    }

    fn unit(ch: char) -> u16 {
        ch as u16
    }

    #[test]
    fn test_literal_admits_only_first() {
        let filter = filter_for("abc", "").unwrap();
        assert!(filter.accepts(unit('a')));
        assert!(!filter.accepts(unit('b')));
        assert!(!filter.accepts(unit('c')));
        assert!(!filter.accepts(unit('x')));
    }

    #[test]
    fn test_ignore_case_admits_both_forms() {
        let filter = filter_for("abc", "i").unwrap();
        assert!(filter.accepts(unit('a')));
        assert!(filter.accepts(unit('A')));
        assert!(!filter.accepts(unit('b')));
    }

    #[test]
    fn test_alternation_admits_each_head() {
        let filter = filter_for("a|b", "").unwrap();
        assert!(filter.accepts(unit('a')));
        assert!(filter.accepts(unit('b')));
        assert!(!filter.accepts(unit('c')));
    }

    #[test]
    fn test_leading_assertion_fails() {
        assert!(filter_for("^abc", "").is_none());
        assert!(filter_for("$", "").is_none());
        assert!(filter_for(r"\babc", "").is_none());
        assert!(filter_for("(?=a)bc", "").is_none());
    }

    #[test]
    fn test_quantifier_fails() {
        assert!(filter_for("a*bc", "").is_none());
        assert!(filter_for("a{2}b", "").is_none());
    }

    #[test]
    fn test_class_fails() {
        assert!(filter_for("[ab]c", "").is_none());
        assert!(filter_for(r"\d+", "").is_none());
        assert!(filter_for(".x", "").is_none());
    }

    #[test]
    fn test_back_reference_fails() {
        assert!(filter_for(r"(a)\1", "").is_some());
        assert!(filter_for(r"\1(a)", "").is_none());
    }

    #[test]
    fn test_group_head_constrains() {
        let filter = filter_for("(ab)c", "").unwrap();
        assert!(filter.accepts(unit('a')));
        assert!(!filter.accepts(unit('b')));
    }

    #[test]
    fn test_failing_alternative_fails_whole_filter() {
        assert!(filter_for("a|[bc]", "").is_none());
    }

    #[test]
    fn test_empty_pattern_disabled() {
        assert!(filter_for("", "").is_none());
        assert!(filter_for("(?:)", "").is_none());
        assert!(filter_for("a|", "").is_none());
    }
}
