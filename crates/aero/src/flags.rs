//! Regular expression flags

use crate::parser::PatternError;

/// Parsed `RegExp` flags (`g`, `i`, `m`, `u`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegExpFlags {
    /// `g`: iterate over every match
    pub global: bool,
    /// `i`: case-insensitive matching
    pub ignore_case: bool,
    /// `m`: `^`/`$` match at line terminators
    pub multiline: bool,
    /// `u`: full UTF-16 (surrogate-pair aware) matching
    pub unicode: bool,
}

impl RegExpFlags {
    /// Parse a flag string, rejecting unknown and duplicate flags.
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let mut flags = Self::default();
        for ch in source.chars() {
            let slot = match ch {
                'g' => &mut flags.global,
                'i' => &mut flags.ignore_case,
                'm' => &mut flags.multiline,
                'u' => &mut flags.unicode,
                other => return Err(PatternError::InvalidFlag(other)),
            };
            if *slot {
                return Err(PatternError::DuplicateFlag(ch));
            }
            *slot = true;
        }
        Ok(flags)
    }
}

impl std::fmt::Display for RegExpFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.global {
            f.write_str("g")?;
        }
        if self.ignore_case {
            f.write_str("i")?;
        }
        if self.multiline {
            f.write_str("m")?;
        }
        if self.unicode {
            f.write_str("u")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        let flags = RegExpFlags::parse("gimu").unwrap();
        assert!(flags.global && flags.ignore_case && flags.multiline && flags.unicode);
        assert_eq!(flags.to_string(), "gimu");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(RegExpFlags::parse("").unwrap(), RegExpFlags::default());
    }

    #[test]
    fn test_reject_duplicate() {
        assert!(matches!(
            RegExpFlags::parse("gg"),
            Err(PatternError::DuplicateFlag('g'))
        ));
    }

    #[test]
    fn test_reject_unknown() {
        assert!(matches!(
            RegExpFlags::parse("x"),
            Err(PatternError::InvalidFlag('x'))
        ));
    }
}
