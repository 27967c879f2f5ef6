//! String replace/split runtime (ES5.1 §15.5.4.11, §15.5.4.14)
//!
//! The replace engine interprets the `$`-substitution mini-language over
//! regex match results and drives single or global iteration; the split
//! engine handles string and regex separators with capture expansion and
//! the `limit` cap. Both work directly on UTF-16 code units.

use railgun_gc::GcRef;

use crate::array::JsArray;
use crate::character;
use crate::conversions;
use crate::error::VmResult;
use crate::regexp::{JsRegExp, MatchData};
use crate::string::{JsString, StringBuilder};
use crate::value::Value;

/// A replacement callable supplied by the embedder: receives the argument
/// list `(match, cap1, …, capN, position, whole)` and returns the
/// replacement value, which is coerced with `ToString`.
pub type ReplacerFn<'a> = &'a mut dyn FnMut(&[Value]) -> VmResult<Value>;

/// The `replaceValue` argument: a `$`-template or a function.
pub enum Replacement<'a> {
    /// String template interpreted by the `$` mini-language
    Template(GcRef<JsString>),
    /// Embedder-supplied callable
    Function(ReplacerFn<'a>),
}

/// `String.prototype.replace` with a regex search value.
pub fn replace_regexp(
    subject: GcRef<JsString>,
    regexp: &JsRegExp,
    replacement: &mut Replacement<'_>,
) -> VmResult<GcRef<JsString>> {
    let units = subject.as_units();
    let mut builder = StringBuilder::new();
    if regexp.global() {
        replace_global(&mut builder, subject, units, regexp, replacement)?;
    } else {
        replace_single(&mut builder, subject, units, regexp, replacement)?;
    }
    Ok(builder.build_cell())
}

fn replace_single(
    builder: &mut StringBuilder,
    subject: GcRef<JsString>,
    units: &[u16],
    regexp: &JsRegExp,
    replacement: &mut Replacement<'_>,
) -> VmResult<()> {
    match regexp.match_at(units, 0) {
        Some(res) => {
            builder.append_units(&units[..res.start]);
            do_replace(builder, subject, units, &res, replacement)?;
            builder.append_units(&units[res.end..]);
        }
        None => builder.append_units(units),
    }
    Ok(())
}

fn replace_global(
    builder: &mut StringBuilder,
    subject: GcRef<JsString>,
    units: &[u16],
    regexp: &JsRegExp,
    replacement: &mut Replacement<'_>,
) -> VmResult<()> {
    let size = units.len();
    let mut previous_index = 0usize;
    let mut not_matched_index = 0usize;
    loop {
        let Some(res) = regexp.match_at(units, previous_index) else {
            break;
        };
        builder.append_units(&units[not_matched_index..res.start]);
        not_matched_index = res.end;
        if previous_index == res.end {
            // Zero-length match: step one code unit or the loop never
            // advances.
            previous_index += 1;
        } else {
            previous_index = res.end;
        }
        do_replace(builder, subject, units, &res, replacement)?;
        if previous_index > size {
            break;
        }
    }
    builder.append_units(&units[not_matched_index..]);
    Ok(())
}

fn do_replace(
    builder: &mut StringBuilder,
    subject: GcRef<JsString>,
    units: &[u16],
    res: &MatchData,
    replacement: &mut Replacement<'_>,
) -> VmResult<()> {
    match replacement {
        Replacement::Template(template) => {
            append_substitution(builder, units, template.as_units(), res);
            Ok(())
        }
        Replacement::Function(function) => {
            let mut args = Vec::with_capacity(3 + res.captures.len());
            args.push(Value::string(JsString::alloc_units(
                units[res.start..res.end].to_vec(),
            )));
            for capture in &res.captures {
                match capture {
                    Some((start, end)) => args.push(Value::string(JsString::alloc_units(
                        units[*start..*end].to_vec(),
                    ))),
                    // A capture that did not participate passes undefined,
                    // not an empty string.
                    None => args.push(Value::undefined()),
                }
            }
            args.push(Value::uint32(res.start as u32));
            args.push(Value::string(subject));
            let result = function(&args)?;
            builder.append_str(&conversions::value_to_string(&result));
            Ok(())
        }
    }
}

#[derive(PartialEq)]
enum ReplaceState {
    Normal,
    Dollar,
    Digit,
    DigitZero,
}

fn append_capture(builder: &mut StringBuilder, units: &[u16], capture: Option<(usize, usize)>) {
    if let Some((start, end)) = capture {
        builder.append_units(&units[start..end]);
    }
}

/// Interpret the `$` substitution language over one match.
///
/// `$$` `$&` `` $` `` `$'` and `$n`/`$nn` back-references; two digits bind
/// greedily with single-digit fallback; `$0` is not a back-reference and
/// passes through literally, as does a dangling `$` or an unknown escape.
fn append_substitution(
    builder: &mut StringBuilder,
    units: &[u16],
    template: &[u16],
    res: &MatchData,
) {
    let captures = &res.captures;
    let mut state = ReplaceState::Normal;
    let mut upper_digit: u16 = 0;

    for &ch in template {
        match state {
            ReplaceState::Normal => {
                if ch == u16::from(b'$') {
                    state = ReplaceState::Dollar;
                } else {
                    builder.append(ch);
                }
            }
            ReplaceState::Dollar => match ch {
                c if c == u16::from(b'$') => {
                    state = ReplaceState::Normal;
                    builder.append(u16::from(b'$'));
                }
                c if c == u16::from(b'&') => {
                    state = ReplaceState::Normal;
                    builder.append_units(&units[res.start..res.end]);
                }
                c if c == u16::from(b'`') => {
                    state = ReplaceState::Normal;
                    builder.append_units(&units[..res.start]);
                }
                c if c == u16::from(b'\'') => {
                    state = ReplaceState::Normal;
                    builder.append_units(&units[res.end..]);
                }
                c if character::is_decimal_digit(c) => {
                    state = if c == u16::from(b'0') {
                        ReplaceState::DigitZero
                    } else {
                        ReplaceState::Digit
                    };
                    upper_digit = c;
                }
                other => {
                    state = ReplaceState::Normal;
                    builder.append(u16::from(b'$'));
                    builder.append(other);
                }
            },
            ReplaceState::Digit => {
                if character::is_decimal_digit(ch) {
                    let single = character::radix36_value(upper_digit).unwrap_or(0) as usize;
                    let twin = single * 10 + character::radix36_value(ch).unwrap_or(0) as usize;
                    if captures.len() >= twin {
                        append_capture(builder, units, captures[twin - 1]);
                    } else {
                        // Two digits name no capture: retry as one digit
                        // with the second digit literal.
                        if captures.len() >= single {
                            append_capture(builder, units, captures[single - 1]);
                        } else {
                            builder.append(u16::from(b'$'));
                            builder.append(upper_digit);
                        }
                        builder.append(ch);
                    }
                } else {
                    let single = character::radix36_value(upper_digit).unwrap_or(0) as usize;
                    if captures.len() >= single {
                        append_capture(builder, units, captures[single - 1]);
                    } else {
                        builder.append(u16::from(b'$'));
                        builder.append(upper_digit);
                    }
                    builder.append(ch);
                }
                state = ReplaceState::Normal;
            }
            ReplaceState::DigitZero => {
                if character::is_decimal_digit(ch) {
                    let twin = character::radix36_value(ch).unwrap_or(0) as usize;
                    if twin >= 1 && captures.len() >= twin {
                        append_capture(builder, units, captures[twin - 1]);
                    } else {
                        builder.append_str("$0");
                        builder.append(ch);
                    }
                } else {
                    // $0 is not a back-reference in this engine.
                    builder.append_str("$0");
                    builder.append(ch);
                }
                state = ReplaceState::Normal;
            }
        }
    }

    match state {
        ReplaceState::Dollar => builder.append(u16::from(b'$')),
        ReplaceState::Digit => {
            let single = character::radix36_value(upper_digit).unwrap_or(0) as usize;
            if captures.len() >= single {
                append_capture(builder, units, captures[single - 1]);
            } else {
                builder.append(u16::from(b'$'));
                builder.append(upper_digit);
            }
        }
        ReplaceState::DigitZero => builder.append_str("$0"),
        ReplaceState::Normal => {}
    }
}

/// `String.prototype.replace` with a string search value: first occurrence
/// only, `$n` has no captures to name and passes through.
pub fn replace_string(
    subject: GcRef<JsString>,
    search: GcRef<JsString>,
    replacement: &mut Replacement<'_>,
) -> VmResult<GcRef<JsString>> {
    let units = subject.as_units();
    let Some(loc) = subject.index_of(search.as_units(), 0) else {
        // Not found: the subject passes through unchanged.
        return Ok(subject);
    };
    let mut builder = StringBuilder::new();
    builder.append_units(&units[..loc]);
    match replacement {
        Replacement::Template(template) => {
            append_literal_substitution(&mut builder, units, &search, loc, template.as_units());
        }
        Replacement::Function(function) => {
            let args = [
                Value::string(search),
                Value::uint32(loc as u32),
                Value::string(subject),
            ];
            let result = function(&args)?;
            builder.append_str(&conversions::value_to_string(&result));
        }
    }
    builder.append_units(&units[loc + search.len()..]);
    Ok(builder.build_cell())
}

/// The `$` language without back-references, for literal-search replace.
fn append_literal_substitution(
    builder: &mut StringBuilder,
    units: &[u16],
    search: &JsString,
    loc: usize,
    template: &[u16],
) {
    let mut dollar = false;
    for &ch in template {
        if !dollar {
            if ch == u16::from(b'$') {
                dollar = true;
            } else {
                builder.append(ch);
            }
            continue;
        }
        dollar = false;
        match ch {
            c if c == u16::from(b'$') => builder.append(u16::from(b'$')),
            c if c == u16::from(b'&') => builder.append_units(search.as_units()),
            c if c == u16::from(b'`') => builder.append_units(&units[..loc]),
            c if c == u16::from(b'\'') => {
                builder.append_units(&units[loc + search.len()..]);
            }
            other => {
                builder.append(u16::from(b'$'));
                builder.append(other);
            }
        }
    }
    if dollar {
        builder.append(u16::from(b'$'));
    }
}

/// `String.prototype.search`: the start of the first match, or `None`.
pub fn search(subject: &JsString, regexp: &JsRegExp) -> Option<usize> {
    regexp.match_string(subject, 0).map(|res| res.start)
}

/// The `separator` argument of `split`.
pub enum Separator<'a> {
    /// `undefined`: the subject is the only piece
    Undefined,
    /// A literal string separator
    Literal(GcRef<JsString>),
    /// A regex separator with capture expansion
    Pattern(&'a JsRegExp),
}

/// `String.prototype.split`.
pub fn split(
    subject: GcRef<JsString>,
    separator: Separator<'_>,
    limit: u32,
) -> VmResult<GcRef<JsArray>> {
    let array = JsArray::alloc();
    if limit == 0 {
        return Ok(array);
    }
    match separator {
        Separator::Undefined => {
            array.set(0, Value::string(subject))?;
            Ok(array)
        }
        Separator::Literal(sep) => split_string(array, subject, sep, limit),
        Separator::Pattern(regexp) => split_regexp(array, subject, regexp, limit),
    }
}

fn split_string(
    array: GcRef<JsArray>,
    subject: GcRef<JsString>,
    separator: GcRef<JsString>,
    limit: u32,
) -> VmResult<GcRef<JsArray>> {
    let units = subject.as_units();
    let sep = separator.as_units();

    if sep.is_empty() {
        // "".split("") is empty; otherwise enumerate code units.
        let mut length = 0u32;
        for &unit in units {
            array.set(length, Value::string(JsString::alloc_units(vec![unit])))?;
            length += 1;
            if length == limit {
                break;
            }
        }
        return Ok(array);
    }

    if sep.len() == 1 {
        return split_single_char(array, units, sep[0], limit);
    }

    let size = units.len();
    let mut p = 0usize;
    let mut q = 0usize;
    let mut length = 0u32;
    while q != size {
        match split_match(units, q, sep) {
            None => q += 1,
            Some(end) => {
                if end == p {
                    q += 1;
                } else {
                    array.set(
                        length,
                        Value::string(JsString::alloc_units(units[p..q].to_vec())),
                    )?;
                    length += 1;
                    if length == limit {
                        return Ok(array);
                    }
                    p = end;
                    q = end;
                }
            }
        }
    }
    array.set(
        length,
        Value::string(JsString::alloc_units(units[p..size].to_vec())),
    )?;
    Ok(array)
}

/// Prefix match of `separator` at `q`; returns the end position.
fn split_match(units: &[u16], q: usize, separator: &[u16]) -> Option<usize> {
    if q + separator.len() > units.len() {
        return None;
    }
    if &units[q..q + separator.len()] != separator {
        return None;
    }
    Some(q + separator.len())
}

fn split_single_char(
    array: GcRef<JsArray>,
    units: &[u16],
    separator: u16,
    limit: u32,
) -> VmResult<GcRef<JsArray>> {
    let mut piece_start = 0usize;
    let mut length = 0u32;
    for (index, &unit) in units.iter().enumerate() {
        if unit != separator {
            continue;
        }
        array.set(
            length,
            Value::string(JsString::alloc_units(units[piece_start..index].to_vec())),
        )?;
        length += 1;
        if length == limit {
            return Ok(array);
        }
        piece_start = index + 1;
    }
    array.set(
        length,
        Value::string(JsString::alloc_units(units[piece_start..].to_vec())),
    )?;
    Ok(array)
}

fn split_regexp(
    array: GcRef<JsArray>,
    subject: GcRef<JsString>,
    regexp: &JsRegExp,
    limit: u32,
) -> VmResult<GcRef<JsArray>> {
    let units = subject.as_units();
    let size = units.len();

    if size == 0 {
        // An empty subject splits to [] when the separator matches empty,
        // [subject] otherwise.
        if regexp.match_at(units, 0).is_some() {
            return Ok(array);
        }
        array.set(0, Value::string(subject))?;
        return Ok(array);
    }

    let mut p = 0usize;
    let mut q = 0usize;
    let mut length = 0u32;
    while q != size {
        let Some(res) = regexp.match_at(units, q) else {
            break;
        };
        if res.start == size {
            break;
        }
        if q == res.end && res.end == p {
            // Zero-length match at the piece start: advance, do not split.
            q += 1;
        } else {
            array.set(
                length,
                Value::string(JsString::alloc_units(units[p..res.start].to_vec())),
            )?;
            length += 1;
            if length == limit {
                return Ok(array);
            }
            for capture in &res.captures {
                let piece = match capture {
                    Some((start, end)) => {
                        Value::string(JsString::alloc_units(units[*start..*end].to_vec()))
                    }
                    None => Value::undefined(),
                };
                array.set(length, piece)?;
                length += 1;
                if length == limit {
                    return Ok(array);
                }
            }
            p = res.end;
            q = res.end;
        }
    }
    array.set(
        length,
        Value::string(JsString::alloc_units(units[p..size].to_vec())),
    )?;
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(s: &str) -> GcRef<JsString> {
        JsString::alloc(s)
    }

    fn template(s: &str) -> Replacement<'static> {
        Replacement::Template(JsString::alloc(s))
    }

    fn replace_re(text: &str, pattern: &str, flags: &str, rep: &str) -> String {
        let re = JsRegExp::new(pattern, flags).unwrap();
        let result = replace_regexp(subject(text), &re, &mut template(rep)).unwrap();
        result.to_string_lossy()
    }

    fn replace_str(text: &str, search: &str, rep: &str) -> String {
        let result = replace_string(subject(text), subject(search), &mut template(rep)).unwrap();
        result.to_string_lossy()
    }

    fn split_to_vec(text: &str, separator: Separator<'_>, limit: u32) -> Vec<Option<String>> {
        let array = split(subject(text), separator, limit).unwrap();
        (0..array.length())
            .map(|i| {
                array
                    .get(i)
                    .filter(|v| !v.is_undefined())
                    .and_then(|v| v.as_string())
                    .map(|s| s.to_string_lossy())
            })
            .collect()
    }

    fn split_str(text: &str, sep: &str, limit: u32) -> Vec<String> {
        split_to_vec(text, Separator::Literal(subject(sep)), limit)
            .into_iter()
            .map(Option::unwrap)
            .collect()
    }

    fn split_re(text: &str, pattern: &str, limit: u32) -> Vec<Option<String>> {
        let re = JsRegExp::new(pattern, "").unwrap();
        split_to_vec(text, Separator::Pattern(&re), limit)
    }

    #[test]
    fn test_replace_string_dollar_escape() {
        assert_eq!(replace_str("abc", "b", "$$"), "a$c");
    }

    #[test]
    fn test_replace_string_match_patterns() {
        assert_eq!(replace_str("abc", "b", "[$&]"), "a[b]c");
        assert_eq!(replace_str("abc", "b", "$`"), "aac");
        assert_eq!(replace_str("abc", "b", "$'"), "acc");
        assert_eq!(replace_str("abc", "b", "$1"), "a$1c");
        assert_eq!(replace_str("abc", "b", "x$"), "ax$c");
        assert_eq!(replace_str("abc", "z", "x"), "abc");
    }

    #[test]
    fn test_replace_whole_match() {
        assert_eq!(replace_re("abc", "b", "", "$&$&"), "abbc");
    }

    #[test]
    fn test_replace_prefix_suffix() {
        assert_eq!(replace_re("abc", "b", "", "$`$'"), "aacc");
    }

    #[test]
    fn test_replace_global() {
        assert_eq!(replace_re("aaa", "a", "g", "b"), "bbb");
    }

    #[test]
    fn test_replace_zero_length_global() {
        assert_eq!(replace_re("abc", "(?:)", "g", "x"), "xaxbxcx");
    }

    #[test]
    fn test_replace_capture() {
        assert_eq!(replace_re("abc", "(b)", "", "[$1]"), "a[b]c");
    }

    #[test]
    fn test_replace_two_digit_fallback() {
        assert_eq!(replace_re("abc", "(b)", "", "[$01]"), "a[b]c");
    }

    #[test]
    fn test_replace_missing_capture_is_literal() {
        assert_eq!(replace_re("abc", "(b)", "", "[$2]"), "a[$2]c");
    }

    #[test]
    fn test_replace_nonparticipating_capture_is_empty() {
        assert_eq!(replace_re("ab", "(x)?(b)", "", "[$1][$2]"), "a[][b]");
    }

    #[test]
    fn test_replace_two_digit_capture() {
        // Eleven groups; $11 names the eleventh.
        let pattern = "(a)(b)(c)(d)(e)(f)(g)(h)(i)(j)(k)";
        assert_eq!(
            replace_re("abcdefghijk", pattern, "", "<$11>"),
            "<k>"
        );
    }

    #[test]
    fn test_replace_dollar_zero_literal() {
        assert_eq!(replace_re("abc", "b", "", "[$0]"), "a[$0]c");
        assert_eq!(replace_re("abc", "(b)", "", "[$00]"), "a[$00]c");
    }

    #[test]
    fn test_replace_trailing_digit_state() {
        assert_eq!(replace_re("abc", "(b)", "", "[$1"), "a[bc");
        assert_eq!(replace_re("abc", "b", "", "$9"), "a$9c");
    }

    #[test]
    fn test_replace_function() {
        let re = JsRegExp::new("(b)", "").unwrap();
        let mut seen = Vec::new();
        let mut function = |args: &[Value]| -> VmResult<Value> {
            seen = args.to_vec();
            Ok(Value::string(JsString::alloc("X")))
        };
        let mut replacement = Replacement::Function(&mut function);
        let result = replace_regexp(subject("abc"), &re, &mut replacement).unwrap();
        assert_eq!(result.to_string_lossy(), "aXc");
        // (match, cap1, position, whole)
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].as_string().unwrap().to_string_lossy(), "b");
        assert_eq!(seen[1].as_string().unwrap().to_string_lossy(), "b");
        assert_eq!(seen[2].as_int32(), Some(1));
        assert_eq!(seen[3].as_string().unwrap().to_string_lossy(), "abc");
    }

    #[test]
    fn test_replace_function_nonparticipating_capture_is_undefined() {
        let re = JsRegExp::new("(x)?(b)", "").unwrap();
        let mut captured = Vec::new();
        let mut function = |args: &[Value]| -> VmResult<Value> {
            captured = args.to_vec();
            Ok(Value::string(JsString::alloc("")))
        };
        let mut replacement = Replacement::Function(&mut function);
        replace_regexp(subject("ab"), &re, &mut replacement).unwrap();
        assert!(captured[1].is_undefined());
        assert!(!captured[2].is_undefined());
    }

    #[test]
    fn test_split_basic() {
        assert_eq!(split_str("a,b,c", ",", u32::MAX), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_empty_separator() {
        assert!(split_str("", "", u32::MAX).is_empty());
        assert_eq!(split_str("abc", "", u32::MAX), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_limit() {
        assert_eq!(split_str("a,b,c", ",", 2), vec!["a", "b"]);
        assert!(split_str("a,b", ",", 0).is_empty());
    }

    #[test]
    fn test_split_undefined_separator() {
        let pieces = split_to_vec("a,b", Separator::Undefined, u32::MAX);
        assert_eq!(pieces, vec![Some("a,b".to_string())]);
    }

    #[test]
    fn test_split_multi_char_separator() {
        assert_eq!(split_str("a::b::c", "::", u32::MAX), vec!["a", "b", "c"]);
        assert_eq!(split_str("abc", "::", u32::MAX), vec!["abc"]);
    }

    #[test]
    fn test_split_adjacent_separators() {
        assert_eq!(split_str("a,,b", ",", u32::MAX), vec!["a", "", "b"]);
        assert_eq!(split_str(",a,", ",", u32::MAX), vec!["", "a", ""]);
    }

    #[test]
    fn test_split_regexp_zero_length_advances() {
        let pieces = split_re("ab", "a*?", u32::MAX);
        assert_eq!(
            pieces,
            vec![Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[test]
    fn test_split_regexp_captures() {
        let pieces = split_re("a1b2c", r"(\d)", u32::MAX);
        assert_eq!(
            pieces,
            vec![
                Some("a".to_string()),
                Some("1".to_string()),
                Some("b".to_string()),
                Some("2".to_string()),
                Some("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_regexp_nonparticipating_capture_is_undefined() {
        let pieces = split_re("ab", "(x)?b", u32::MAX);
        assert_eq!(pieces, vec![Some("a".to_string()), None, Some("".to_string())]);
    }

    #[test]
    fn test_split_regexp_captures_count_toward_limit() {
        let pieces = split_re("a1b2c", r"(\d)", 2);
        assert_eq!(pieces, vec![Some("a".to_string()), Some("1".to_string())]);
    }

    #[test]
    fn test_split_regexp_empty_subject() {
        assert!(split_re("", "x?", u32::MAX).is_empty());
        assert_eq!(split_re("", "x", u32::MAX), vec![Some(String::new())]);
    }

    #[test]
    fn test_search() {
        let re = JsRegExp::new("b+", "").unwrap();
        assert_eq!(search(&JsString::new("abbc"), &re), Some(1));
        let miss = JsRegExp::new("z", "").unwrap();
        assert_eq!(search(&JsString::new("abbc"), &miss), None);
    }
}
