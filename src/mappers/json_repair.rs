//! Python-literal → JSON repair for tool-call argument strings
//! (spec.md §4.4). Applied only when the raw string fails to parse as
//! JSON outright; the original is always preserved on failure.

/// Attempts to repair a Python-dict-literal-looking string into valid
/// JSON: single-quoted keys/values become double-quoted, bare
/// `True`/`False`/`None` become `true`/`false`/`null`, and trailing
/// commas before a closing bracket are dropped.
///
/// Returns `Some(repaired)` only if the result actually parses as
/// JSON; otherwise `None` and the caller keeps the original string.
pub fn repair_python_literal(raw: &str) -> Option<String> {
    if serde_json::from_str::<serde_json::Value>(raw).is_ok() {
        return None;
    }

    let converted = convert_literals(raw);
    let trimmed = strip_trailing_commas(&converted);

    match serde_json::from_str::<serde_json::Value>(&trimmed) {
        Ok(value) => serde_json::to_string(&value).ok(),
        Err(_) => None,
    }
}

/// Ensures a tool-call argument string is renderable JSON: empty
/// becomes `"{}"`, otherwise the string is returned unchanged unless a
/// repair is both needed and successful.
pub fn ensure_json_arguments(raw: &str) -> String {
    if raw.is_empty() {
        return "{}".to_string();
    }
    if serde_json::from_str::<serde_json::Value>(raw).is_ok() {
        return raw.to_string();
    }
    repair_python_literal(raw).unwrap_or_else(|| raw.to_string())
}

/// Rewrites `'`-quoted strings to `"`-quoted and bare Python keywords
/// to their JSON equivalents, tracking whether we're inside a
/// double-quoted span (left untouched) as we scan.
fn convert_literals(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_double_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if !in_double_quotes => {
                in_double_quotes = true;
                out.push(c);
            }
            '"' if in_double_quotes => {
                in_double_quotes = false;
                out.push(c);
            }
            '\\' if in_double_quotes => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\'' if !in_double_quotes => {
                out.push('"');
                for inner in chars.by_ref() {
                    if inner == '\\' {
                        out.push(inner);
                        continue;
                    }
                    if inner == '\'' {
                        out.push('"');
                        break;
                    }
                    if inner == '"' {
                        out.push('\\');
                        out.push('"');
                        continue;
                    }
                    out.push(inner);
                }
            }
            _ if !in_double_quotes => {
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    replace_bare_keywords(&out)
}

fn replace_bare_keywords(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    let bytes = input.as_bytes();

    while let Some((i, c)) = chars.next() {
        if c == '"' {
            out.push(c);
            for (_, inner) in chars.by_ref() {
                out.push(inner);
                if inner == '"' {
                    break;
                }
            }
            continue;
        }
        if c.is_alphabetic() {
            let start = i;
            let mut end = i + c.len_utf8();
            while end < bytes.len() && (bytes[end] as char).is_alphanumeric() {
                end += 1;
            }
            let word = &input[start..end];
            match word {
                "True" => out.push_str("true"),
                "False" => out.push_str("false"),
                "None" => out.push_str("null"),
                other => out.push_str(other),
            }
            for _ in 0..(word.chars().count() - 1) {
                chars.next();
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repairs_single_quotes_and_bool_none() {
        let raw = "{'path': '/tmp', 'recursive': True, 'extra': None}";
        let repaired = repair_python_literal(raw).expect("should repair");
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["path"], "/tmp");
        assert_eq!(value["recursive"], true);
        assert_eq!(value["extra"], serde_json::Value::Null);
    }

    #[test]
    fn valid_json_is_left_alone() {
        let raw = r#"{"path":"/tmp"}"#;
        assert_eq!(repair_python_literal(raw), None);
    }

    #[test]
    fn unrepairable_garbage_stays_none() {
        let raw = "not json at all {{{";
        assert_eq!(repair_python_literal(raw), None);
    }

    #[test]
    fn ensure_json_arguments_defaults_empty_to_object() {
        assert_eq!(ensure_json_arguments(""), "{}");
    }

    #[test]
    fn trailing_comma_is_stripped() {
        let raw = "{\"a\": 1, \"b\": 2,}";
        let repaired = repair_python_literal(raw).expect("should repair");
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["a"], 1);
    }
}
