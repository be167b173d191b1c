//! SQL text helpers shared by the tool handlers: identifier and literal
//! quoting, JSON path parsing and read-only statement detection.

use crate::error::{McpError, Result, ToolError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

/// One unquoted identifier part.
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("Invalid regex: identifier pattern")
});

/// Data-modifying keywords that turn a `WITH` query into a write.
static WRITE_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|MERGE|TRUNCATE|DROP|ALTER|CREATE|GRANT|REVOKE)\b")
        .expect("Invalid regex: write keyword pattern")
});

static LEADING_COMMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s|--[^\n]*\n?|/\*.*?\*/)*").expect("Invalid regex: leading comment pattern")
});

const READ_ONLY_KEYWORDS: &[&str] = &["SELECT", "WITH", "EXPLAIN", "SHOW", "VALUES", "TABLE"];

/// Quote a possibly schema-qualified identifier (`schema.table` or `table`).
pub fn quote_ident(name: &str) -> Result<String> {
    let name = name.trim();
    let parts: Vec<&str> = name.split('.').collect();
    if name.is_empty() || parts.len() > 2 {
        return Err(ToolError::InvalidArguments(format!("Invalid identifier: '{}'", name)).into());
    }

    let quoted = parts
        .iter()
        .map(|part| {
            if IDENTIFIER.is_match(part) {
                Ok(format!("\"{}\"", part))
            } else {
                Err(McpError::from(ToolError::InvalidArguments(format!(
                    "Invalid identifier: '{}'",
                    name
                ))))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(quoted.join("."))
}

/// Quote a list of column identifiers, comma separated.
pub fn quote_ident_list(names: &[String]) -> Result<String> {
    if names.is_empty() {
        return Err(ToolError::InvalidArguments("At least one column is required".into()).into());
    }
    Ok(names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Result<Vec<_>>>()?
        .join(", "))
}

/// Split `schema.table` into its parts; the schema defaults to `public`.
pub fn split_qualified(name: &str) -> (&str, &str) {
    match name.trim().split_once('.') {
        Some((schema, table)) => (schema, table),
        None => ("public", name.trim()),
    }
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a JSON value as a `jsonb` literal.
pub fn jsonb_literal(value: &Value) -> String {
    format!("{}::jsonb", quote_literal(&value.to_string()))
}

/// Render path segments as a `text[]` literal, e.g. `'{"a","0"}'`.
pub fn text_array_literal(segments: &[String]) -> String {
    let inner = segments
        .iter()
        .map(|s| format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",");
    quote_literal(&format!("{{{}}}", inner))
}

/// Parse a JSON path given as `a.b.0`, `$.a.b`, `{a,b}` or `["a", 0]`.
pub fn parse_json_path(path: &Value) -> Result<Vec<String>> {
    let segments: Vec<String> = match path {
        Value::String(s) => {
            let s = s.trim();
            let s = s.strip_prefix("$.").or_else(|| s.strip_prefix('$')).unwrap_or(s);
            let s = s
                .strip_prefix('{')
                .and_then(|inner| inner.strip_suffix('}'))
                .map(|inner| inner.replace(',', "."))
                .unwrap_or_else(|| s.to_string());
            s.split('.')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect()
        }
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(ToolError::InvalidArguments(format!(
                    "Invalid JSON path segment: {}",
                    other
                ))),
            })
            .collect::<std::result::Result<_, _>>()?,
        other => {
            return Err(
                ToolError::InvalidArguments(format!("Invalid JSON path: {}", other)).into(),
            );
        }
    };

    if segments.is_empty() {
        return Err(ToolError::InvalidArguments("JSON path must not be empty".into()).into());
    }
    Ok(segments)
}

/// The statement with leading whitespace and comments removed.
pub fn strip_leading_comments(sql: &str) -> Cow<'_, str> {
    LEADING_COMMENTS.replace(sql, "")
}

/// Whether a statement only reads data.
pub fn is_read_only(sql: &str) -> bool {
    let body = strip_leading_comments(sql);
    let body = body.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    let keyword: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase();

    match keyword.as_str() {
        "WITH" => !WRITE_KEYWORDS.is_match(body),
        k => READ_ONLY_KEYWORDS.contains(&k),
    }
}

/// Append an optional raw `WHERE` fragment.
pub fn where_clause(filter: Option<&str>) -> String {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(filter) => format!(" WHERE {}", filter),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users").unwrap(), "\"users\"");
        assert_eq!(quote_ident("sales.orders").unwrap(), "\"sales\".\"orders\"");
        assert!(quote_ident("users; DROP TABLE x").is_err());
        assert!(quote_ident("a.b.c").is_err());
        assert!(quote_ident("").is_err());
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_jsonb_literal() {
        assert_eq!(jsonb_literal(&json!({"a": "it's"})), "'{\"a\":\"it''s\"}'::jsonb");
    }

    #[test]
    fn test_parse_json_path() {
        let expected = vec!["address".to_string(), "city".to_string()];
        assert_eq!(parse_json_path(&json!("address.city")).unwrap(), expected);
        assert_eq!(parse_json_path(&json!("$.address.city")).unwrap(), expected);
        assert_eq!(parse_json_path(&json!("{address,city}")).unwrap(), expected);
        assert_eq!(
            parse_json_path(&json!(["tags", 0])).unwrap(),
            vec!["tags".to_string(), "0".to_string()]
        );
        assert!(parse_json_path(&json!("")).is_err());
        assert!(parse_json_path(&json!(5)).is_err());
    }

    #[test]
    fn test_text_array_literal() {
        let segments = vec!["a".to_string(), "b\"c".to_string()];
        assert_eq!(text_array_literal(&segments), "'{\"a\",\"b\\\"c\"}'");
    }

    #[test]
    fn test_strip_leading_comments() {
        assert_eq!(strip_leading_comments("-- c\n  /* d */ SHOW x"), "SHOW x");
        assert_eq!(strip_leading_comments("SELECT 1 -- tail"), "SELECT 1 -- tail");
    }

    #[test]
    fn test_is_read_only() {
        assert!(is_read_only("SELECT * FROM users"));
        assert!(is_read_only("  -- comment\nselect 1"));
        assert!(is_read_only("/* hint */ WITH t AS (SELECT 1) SELECT * FROM t"));
        assert!(is_read_only("(SELECT 1) UNION (SELECT 2)"));
        assert!(!is_read_only("WITH d AS (DELETE FROM t RETURNING *) SELECT * FROM d"));
        assert!(!is_read_only("UPDATE users SET name = 'x'"));
        assert!(!is_read_only("INSERT INTO t VALUES (1)"));
    }

    #[test]
    fn test_where_clause() {
        assert_eq!(where_clause(Some("id = 1")), " WHERE id = 1");
        assert_eq!(where_clause(Some("  ")), "");
        assert_eq!(where_clause(None), "");
    }
}
