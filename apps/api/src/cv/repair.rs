//! Best-effort repair of almost-JSON returned by the LLM.

use serde_json::Value;

use crate::llm_client::strip_json_fences;

/// Parses LLM output as a JSON object, repairing common defects on the way:
/// code fences, prose around the object, smart quotes, trailing commas and
/// truncation (unterminated strings, unclosed objects/arrays).
///
/// Each repair is applied only if the previous form failed to parse.
pub fn parse_llm_json(raw: &str) -> Option<Value> {
    let text = strip_json_fences(raw);
    if let Some(value) = parse_object(text) {
        return Some(value);
    }

    let sliced = slice_object(text)?;
    if let Some(value) = parse_object(sliced) {
        return Some(value);
    }

    let requoted = normalize_quotes(sliced);
    let without_commas = remove_trailing_commas(&requoted);
    if let Some(value) = parse_object(&without_commas) {
        return Some(value);
    }

    let closed = close_open_structures(&without_commas);
    parse_object(&remove_trailing_commas(&closed))
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// From the first `{` to the last `}`; or to the end when no `}` follows.
fn slice_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    match text.rfind('}') {
        Some(end) if end > start => Some(&text[start..=end]),
        _ => Some(&text[start..]),
    }
}

fn normalize_quotes(text: &str) -> String {
    text.replace(['\u{201c}', '\u{201d}', '\u{201e}', '\u{2033}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/// Drops commas directly followed (modulo whitespace) by `}` or `]`,
/// leaving string contents untouched.
fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Terminates an unterminated string and closes open arrays/objects in
/// nesting order. A dangling `,` is dropped and a dangling `:` gets `null`.
fn close_open_structures(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = text.to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    } else if out.ends_with(':') {
        out.push_str("null");
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_json_passes_through() {
        assert_eq!(parse_llm_json(r#"{"a": 1}"#), Some(json!({"a": 1})));
    }

    #[test]
    fn test_fenced_and_wrapped_in_prose() {
        let raw = "Here is the data:\n{\"full_name\": \"Jane\"}\nHope this helps!";
        assert_eq!(parse_llm_json(raw), Some(json!({"full_name": "Jane"})));
        let fenced = "```json\n{\"a\": [1, 2]}\n```";
        assert_eq!(parse_llm_json(fenced), Some(json!({"a": [1, 2]})));
    }

    #[test]
    fn test_trailing_commas_and_smart_quotes() {
        let raw = "{\u{201c}skills\u{201d}: [\"Rust\", \"Go\",], \"note\": \"a, ]\",}";
        assert_eq!(
            parse_llm_json(raw),
            Some(json!({"skills": ["Rust", "Go"], "note": "a, ]"}))
        );
    }

    #[test]
    fn test_truncated_output_is_closed() {
        let raw = r#"{"full_name": "Jane Doe", "skills": ["Rust", "Postgr"#;
        assert_eq!(
            parse_llm_json(raw),
            Some(json!({"full_name": "Jane Doe", "skills": ["Rust", "Postgr"]}))
        );

        let dangling_key = r#"{"full_name": "Jane", "email":"#;
        assert_eq!(
            parse_llm_json(dangling_key),
            Some(json!({"full_name": "Jane", "email": null}))
        );

        let dangling_comma = r#"{"experience": [{"company": "Acme"},"#;
        assert_eq!(
            parse_llm_json(dangling_comma),
            Some(json!({"experience": [{"company": "Acme"}]}))
        );
    }

    #[test]
    fn test_non_objects_rejected() {
        assert_eq!(parse_llm_json("[1, 2, 3]"), None);
        assert_eq!(parse_llm_json("no json here"), None);
    }
}
