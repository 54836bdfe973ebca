//! String escaping for the REST wire format.
//!
//! The server HTML-escapes string content in responses (`&` arrives as
//! `&amp;`), and expects non-ASCII characters in outgoing JSON as `\uXXXX`
//! escapes.

use std::fmt::Write as _;

use serde_json::Value;

/// Escapes every non-ASCII character in serialized JSON to `\uXXXX` form.
///
/// Astral characters become UTF-16 surrogate pairs. Safe to apply to a whole
/// JSON document: non-ASCII characters can only occur inside string
/// literals, where `\u` escapes are valid.
pub(crate) fn escape_non_ascii(json: &str) -> String {
    if json.is_ascii() {
        return json.to_string();
    }
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut units = [0_u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    out
}

/// Recursively HTML-unescapes every string leaf of a decoded JSON value.
pub(crate) fn unescape_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(unescape_html(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(unescape_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, unescape_value(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Decodes the HTML entities the server emits.
///
/// Named entities for the five characters the server escapes, plus decimal
/// (`&#38;`) and hex (`&#x26;`) character references. Unknown or malformed
/// entities pass through verbatim.
pub(crate) fn unescape_html(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        // Entities are short; bound the scan so a stray '&' stays cheap.
        let semi = rest
            .char_indices()
            .take(10)
            .find_map(|(i, c)| (c == ';').then_some(i));
        let Some(semi) = semi else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        match decode_entity(entity) {
            Some(decoded) => {
                out.push(decoded);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = digits
                .strip_prefix(['x', 'X'])
                .map_or_else(|| digits.parse::<u32>().ok(), |h| u32::from_str_radix(h, 16).ok())?;
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escape_leaves_ascii_alone() {
        let json = r#"{"name":"Acme & Sons"}"#;
        assert_eq!(escape_non_ascii(json), json);
    }

    #[test]
    fn escape_encodes_bmp_characters() {
        assert_eq!(escape_non_ascii("\"caf\u{e9}\""), "\"caf\\u00e9\"");
    }

    #[test]
    fn escape_encodes_surrogate_pairs() {
        // U+1F600 -> d83d de00
        assert_eq!(escape_non_ascii("\"\u{1f600}\""), "\"\\ud83d\\ude00\"");
    }

    #[test]
    fn escaped_output_round_trips_through_serde() {
        let escaped = escape_non_ascii("\"caf\u{e9} \u{1f600}\"");
        let back: String = serde_json::from_str(&escaped).unwrap();
        assert_eq!(back, "caf\u{e9} \u{1f600}");
    }

    #[test]
    fn unescape_named_entities() {
        assert_eq!(unescape_html("Smith &amp; Jones"), "Smith & Jones");
        assert_eq!(unescape_html("&lt;b&gt;&quot;x&quot;&apos;"), "<b>\"x\"'");
    }

    #[test]
    fn unescape_numeric_entities() {
        assert_eq!(unescape_html("&#38;&#x26;&#X26;"), "&&&");
        assert_eq!(unescape_html("&#233;"), "é");
    }

    #[test]
    fn unescape_passes_through_unknown_entities() {
        assert_eq!(unescape_html("&nope; & &amp"), "&nope; & &amp");
        assert_eq!(unescape_html("a && b"), "a && b");
        // Multi-byte characters near the ampersand must not trip the scan.
        assert_eq!(unescape_html("&é; &amp; ü"), "&é; & ü");
    }

    #[test]
    fn unescape_value_walks_nested_structures() {
        let value = json!({
            "entry_list": [{"name_value_list": {"name": {"value": "A &amp; B"}}}],
            "count": 1
        });
        let unescaped = unescape_value(value);
        assert_eq!(
            unescaped["entry_list"][0]["name_value_list"]["name"]["value"],
            "A & B"
        );
        assert_eq!(unescaped["count"], 1);
    }
}
