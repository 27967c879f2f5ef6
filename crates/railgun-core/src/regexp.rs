//! Compiled regular expressions
//!
//! `JsRegExp` pairs the opaque backend matcher with the aero analysis
//! front end: the pattern is handed to the backend for execution and to the
//! aero parser for the quick-check first-character filter. `match_at` is
//! the whole matching contract the string runtime consumes: a match is a
//! `(start, end)` span plus one optional span per capture group.

use aero::{FirstCharFilter, QuickCheck, RegExpFlags};
use railgun_gc::object::tags;
use railgun_gc::{GcHeader, GcTraceable};

use crate::error::{VmError, VmResult};
use crate::string::JsString;

/// One regex match: the overall span and the capture spans.
///
/// A `None` capture did not participate in the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchData {
    /// Start of the whole match, in code units
    pub start: usize,
    /// End of the whole match, in code units
    pub end: usize,
    /// Capture spans, in group order
    pub captures: Vec<Option<(usize, usize)>>,
}

/// A compiled regular expression cell.
pub struct JsRegExp {
    source: String,
    flags: RegExpFlags,
    regex: regress::Regex,
    quick_check: Option<FirstCharFilter>,
    captures: u32,
}

impl JsRegExp {
    /// Compile `source` under `flags`.
    ///
    /// Pattern or flag errors surface as `SyntaxError`.
    pub fn new(source: &str, flag_source: &str) -> VmResult<Self> {
        let flags =
            RegExpFlags::parse(flag_source).map_err(|e| VmError::syntax_error(e.to_string()))?;
        // The backend parses the same flag letters; `g` only drives the
        // iteration strategy here and is ignored by the matcher.
        let regex = regress::Regex::with_flags(source, regress::Flags::from(flag_source))
            .map_err(|e| VmError::syntax_error(format!("invalid regular expression: {e}")))?;

        // The aero front end is an analysis pass only; a pattern it cannot
        // parse just runs without the pre-filter.
        let parsed = aero::parse(source, flags).ok();
        let quick_check = parsed.as_ref().and_then(QuickCheck::emit);
        let captures = parsed.map(|p| p.captures).unwrap_or(0);

        Ok(Self {
            source: source.to_string(),
            flags,
            regex,
            quick_check,
            captures,
        })
    }

    /// The pattern source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed flags
    pub fn flags(&self) -> RegExpFlags {
        self.flags
    }

    /// Whether the `g` flag is set
    pub fn global(&self) -> bool {
        self.flags.global
    }

    /// Number of capturing groups reported by the front end
    pub fn capture_count(&self) -> u32 {
        self.captures
    }

    /// The quick-check filter, when the pattern admits one
    pub fn quick_check(&self) -> Option<&FirstCharFilter> {
        self.quick_check.as_ref()
    }

    /// Find the first match at or after `start`.
    ///
    /// When a quick-check filter exists, positions whose first code unit
    /// the filter rejects are skipped without consulting the backend.
    pub fn match_at(&self, text: &[u16], start: usize) -> Option<MatchData> {
        if start > text.len() {
            return None;
        }
        let mut from = start;
        if let Some(filter) = &self.quick_check {
            while from < text.len() && !filter.accepts(text[from]) {
                from += 1;
            }
            if from == text.len() {
                return None;
            }
        }
        let found = if self.flags.unicode {
            self.regex.find_from_utf16(text, from).next()
        } else {
            self.regex.find_from_ucs2(text, from).next()
        }?;
        Some(MatchData {
            start: found.range.start,
            end: found.range.end,
            captures: found
                .captures
                .iter()
                .map(|capture| capture.as_ref().map(|r| (r.start, r.end)))
                .collect(),
        })
    }

    /// Convenience wrapper matching against a string cell.
    pub fn match_string(&self, text: &JsString, start: usize) -> Option<MatchData> {
        self.match_at(text.as_units(), start)
    }
}

impl GcTraceable for JsRegExp {
    const NEEDS_TRACE: bool = false;
    const TYPE_ID: u8 = tags::REGEXP;

    fn trace(&self, _tracer: &mut dyn FnMut(*const GcHeader)) {
        // Regexes reference no other cells.
    }
}

impl std::fmt::Debug for JsRegExp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}
