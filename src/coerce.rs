use serde_json::Value;

/// Tokens that stand in for "no value" in scraped tables and extracted text.
const NULL_TOKENS: [&str; 5] = ["nan", "none", "null", "—", "-"];

/// Coerce an arbitrary raw value into a finite number, or null.
///
/// This is a total function: heterogeneous financial data is expected to be
/// messy, and a single bad field must never abort the whole report. Rules,
/// in order:
///
/// 1. Null input is null.
/// 2. Numeric input passes through, rejecting non-finite values.
/// 3. Strings are trimmed; placeholder tokens ("", "-", "—", "nan", "none",
///    "null", case-insensitive) are null.
/// 4. A trailing `%` means a percentage: parse and divide by 100.
/// 5. Otherwise strip comma thousands-separators and parse as a float.
/// 6. Anything else (booleans, arrays, objects, unparseable text) is null.
pub fn coerce(raw: &Value) -> Option<f64> {
    match raw {
        Value::Null => None,
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => coerce_str(s),
        _ => None,
    }
}

/// String half of [`coerce`], usable directly on scraped cell text.
pub fn coerce_str(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if NULL_TOKENS.contains(&lowered.as_str()) {
        return None;
    }

    if let Some(body) = trimmed.strip_suffix('%') {
        return body
            .trim()
            .parse::<f64>()
            .ok()
            .map(|v| v / 100.0)
            .filter(|v| v.is_finite());
    }

    trimmed
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
