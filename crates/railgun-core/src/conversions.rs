//! Numeric and string conversions (ES5.1 §9)

use crate::value::Value;

/// ToInteger (ES5.1 §9.4)
pub fn to_integer(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    if value == 0.0 || value.is_infinite() {
        return value;
    }
    value.signum() * value.abs().floor()
}

/// ToUint32 (ES5.1 §9.6)
pub fn to_uint32(value: f64) -> u32 {
    if value.is_nan() || value.is_infinite() || value == 0.0 {
        return 0;
    }
    let int = value.signum() * value.abs().floor();
    let modulo = int.rem_euclid(4_294_967_296.0);
    modulo as u32
}

/// Simplified ToNumber (ES5.1 §9.3): objects coerce to NaN rather than
/// through `valueOf`.
pub fn value_to_number(value: &Value) -> f64 {
    if let Some(n) = value.as_number() {
        return n;
    }
    if value.is_undefined() || value.is_hole() {
        return f64::NAN;
    }
    if value.is_null() {
        return 0.0;
    }
    if let Some(b) = value.as_boolean() {
        return if b { 1.0 } else { 0.0 };
    }
    if let Some(s) = value.as_string() {
        let text = s.to_string_lossy();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return 0.0;
        }
        return trimmed.parse::<f64>().unwrap_or(f64::NAN);
    }
    f64::NAN
}

/// ToString for numbers (ES5.1 §9.8.1), via itoa/ryu shortest forms.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        let mut buffer = itoa::Buffer::new();
        return buffer.format(n as i64).to_string();
    }
    let mut buffer = ryu::Buffer::new();
    let formatted = buffer.format(n);
    // ryu prints `1e21`; JS prints `1e+21`.
    if let Some(pos) = formatted.find('e') {
        if formatted.as_bytes().get(pos + 1) != Some(&b'-') {
            let mut owned = formatted.to_string();
            owned.insert(pos + 1, '+');
            return owned;
        }
    }
    formatted.to_string()
}

/// Simplified ToString (ES5.1 §9.8): objects stringify to their class tag
/// rather than through `toString`.
pub fn value_to_string(value: &Value) -> String {
    if value.is_undefined() || value.is_hole() {
        return "undefined".to_string();
    }
    if value.is_null() {
        return "null".to_string();
    }
    if let Some(b) = value.as_boolean() {
        return if b { "true" } else { "false" }.to_string();
    }
    if let Some(n) = value.as_number() {
        return number_to_string(n);
    }
    if let Some(s) = value.as_string() {
        return s.to_string_lossy();
    }
    if value.as_array().is_some() {
        return "[object Array]".to_string();
    }
    if let Some(r) = value.as_regexp() {
        return format!("/{}/{}", r.source(), r.flags());
    }
    "[object Object]".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_integer() {
        assert_eq!(to_integer(3.7), 3.0);
        assert_eq!(to_integer(-3.7), -3.0);
        assert_eq!(to_integer(f64::NAN), 0.0);
        assert_eq!(to_integer(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_to_uint32() {
        assert_eq!(to_uint32(0.0), 0);
        assert_eq!(to_uint32(1.0), 1);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
        assert_eq!(to_uint32(4_294_967_296.0), 0);
        assert_eq!(to_uint32(f64::NAN), 0);
        assert_eq!(to_uint32(3.9), 3);
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(0.0), "0");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-7.0), "-7");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&Value::undefined()), "undefined");
        assert_eq!(value_to_string(&Value::boolean(true)), "true");
        assert_eq!(value_to_string(&Value::int32(5)), "5");
        let s = crate::string::JsString::alloc("x");
        assert_eq!(value_to_string(&Value::string(s)), "x");
    }

    #[test]
    fn test_value_to_number() {
        assert!(value_to_number(&Value::undefined()).is_nan());
        assert_eq!(value_to_number(&Value::null()), 0.0);
        assert_eq!(value_to_number(&Value::boolean(true)), 1.0);
        let s = crate::string::JsString::alloc("  12.5 ");
        assert_eq!(value_to_number(&Value::string(s)), 12.5);
    }
}
