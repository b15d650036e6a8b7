//! FeatureScript construction.
//!
//! Any string that did not originate in this crate must reach a script only
//! through [`string_literal`] or [`escape`].

use std::fmt::Write;

/// Encode every UTF-16 code unit of `s` as a `\uXXXX` escape.
///
/// Characters are escaped whether or not they are special to the script
/// language, so no raw character of `s` appears in the output.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 6);
    for unit in s.encode_utf16() {
        // Writing to a String cannot fail.
        let _ = write!(out, "\\u{unit:04x}");
    }
    out
}

/// A double-quoted script string literal holding `s`.
pub fn string_literal(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

/// Wrap statements in the calling convention of the evaluation endpoint.
pub fn build_script(body: &str) -> String {
    format!("function (context is Context, queries is map) {{ {body} }}")
}

/// Render `attempts` as consecutive `try silent` blocks, in order, followed
/// by `default`.
///
/// The first attempt that returns wins; an attempt that throws falls
/// through to the next one.
pub fn fallback_body<S: AsRef<str>>(attempts: &[S], default: &str) -> String {
    let mut body = String::new();
    for attempt in attempts {
        let _ = write!(body, "try silent {{ {} }} ", attempt.as_ref());
    }
    body.push_str(default);
    body
}

/// A FeatureScript map literal built from already-rendered key/value
/// expressions.
pub fn map_literal<K: AsRef<str>, V: AsRef<str>>(entries: &[(K, V)]) -> String {
    let fields: Vec<String> = entries
        .iter()
        .map(|(k, v)| format!("{} : {}", k.as_ref(), v.as_ref()))
        .collect();
    format!("{{ {} }}", fields.join(", "))
}

#[cfg(test)]
pub(crate) fn unescape(s: &str) -> Option<String> {
    let mut units = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        let hex = rest.strip_prefix("\\u")?;
        let digits = hex.get(..4)?;
        units.push(u16::from_str_radix(digits, 16).ok()?);
        rest = &hex[4..];
    }
    String::from_utf16(&units).ok()
}
