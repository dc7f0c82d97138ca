//! SQL text helpers
//!
//! Identifier quoting, literal formatting for dump generation, and the
//! statement splitter the import engine feeds from. Everything here works
//! on MySQL syntax only.

use crate::engine::types::Value;

/// Quote an identifier, doubling internal backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Format a fully qualified `database`.`table` name.
pub fn qualified(database: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(database), quote_ident(table))
}

/// Format a value as a SQL literal for dump output.
pub fn format_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => escape_string(s),
        Value::Bytes(b) => format_bytes(b),
        Value::Json(j) => {
            let json = serde_json::to_string(j).unwrap_or_else(|_| "null".to_string());
            escape_string(&json)
        }
    }
}

/// Escape a string literal. Quotes and backslashes are backslash-escaped;
/// control characters that would break the one-row-per-line dump layout
/// are escaped as well.
fn escape_string(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('\0', "\\0");
    format!("'{}'", escaped)
}

fn format_bytes(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("X'{}'", hex)
}

/// True for statements that produce a result set.
pub fn is_select(sql: &str) -> bool {
    let trimmed = sql.trim_start().to_uppercase();
    trimmed.starts_with("SELECT")
        || trimmed.starts_with("SHOW")
        || trimmed.starts_with("DESCRIBE")
        || trimmed.starts_with("EXPLAIN")
}

/// Splits dump text into single statements at top-level `;`.
///
/// Semicolons inside string literals, quoted identifiers, and comments do
/// not terminate a statement. Fragments that contain nothing but
/// whitespace and comments are discarded.
pub fn split_statements(sql: &str) -> Vec<String> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        SingleQuote,
        DoubleQuote,
        Backtick,
        LineComment,
        BlockComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_content = false;
    let mut state = State::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            State::Normal => match ch {
                ';' => {
                    if has_content {
                        statements.push(current.trim().to_string());
                    }
                    current.clear();
                    has_content = false;
                    continue;
                }
                '\'' => {
                    state = State::SingleQuote;
                    has_content = true;
                }
                '"' => {
                    state = State::DoubleQuote;
                    has_content = true;
                }
                '`' => {
                    state = State::Backtick;
                    has_content = true;
                }
                '#' => state = State::LineComment,
                '-' if chars.peek() == Some(&'-') => {
                    current.push(ch);
                    current.push(chars.next().unwrap_or('-'));
                    state = State::LineComment;
                    continue;
                }
                '/' if chars.peek() == Some(&'*') => {
                    current.push(ch);
                    current.push(chars.next().unwrap_or('*'));
                    state = State::BlockComment;
                    continue;
                }
                c if !c.is_whitespace() => has_content = true,
                _ => {}
            },
            State::SingleQuote => match ch {
                '\\' => {
                    current.push(ch);
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                    continue;
                }
                '\'' => state = State::Normal,
                _ => {}
            },
            State::DoubleQuote => match ch {
                '\\' => {
                    current.push(ch);
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                    continue;
                }
                '"' => state = State::Normal,
                _ => {}
            },
            State::Backtick => {
                if ch == '`' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if ch == '\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    current.push(ch);
                    current.push(chars.next().unwrap_or('/'));
                    state = State::Normal;
                    continue;
                }
            }
        }
        current.push(ch);
    }

    if has_content {
        let tail = current.trim();
        if !tail.is_empty() {
            statements.push(tail.to_string());
        }
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "`users`");
        assert_eq!(quote_ident("user`name"), "`user``name`");
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified("shop", "orders"), "`shop`.`orders`");
    }

    #[test]
    fn test_format_literal_scalars() {
        assert_eq!(format_literal(&Value::Null), "NULL");
        assert_eq!(format_literal(&Value::Int(42)), "42");
        assert_eq!(format_literal(&Value::Float(1.5)), "1.5");
        assert_eq!(format_literal(&Value::Bool(true)), "1");
        assert_eq!(format_literal(&Value::Bool(false)), "0");
    }

    #[test]
    fn test_format_literal_strings() {
        assert_eq!(
            format_literal(&Value::Text("it's".to_string())),
            r"'it\'s'"
        );
        assert_eq!(
            format_literal(&Value::Text("a\\b".to_string())),
            r"'a\\b'"
        );
        assert_eq!(
            format_literal(&Value::Text("line1\nline2".to_string())),
            r"'line1\nline2'"
        );
    }

    #[test]
    fn test_format_literal_bytes() {
        assert_eq!(
            format_literal(&Value::Bytes(vec![0xde, 0xad])),
            "X'dead'"
        );
    }

    #[test]
    fn test_is_select() {
        assert!(is_select("SELECT 1"));
        assert!(is_select("  show tables"));
        assert!(is_select("DESCRIBE t"));
        assert!(is_select("EXPLAIN SELECT 1"));
        assert!(!is_select("INSERT INTO t VALUES (1)"));
        assert!(!is_select("TRUNCATE TABLE t"));
    }

    #[test]
    fn test_split_basic() {
        let parts = split_statements("SELECT 1;\nSELECT 2;\n");
        assert_eq!(parts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_split_keeps_semicolon_in_string() {
        let parts = split_statements("INSERT INTO t VALUES ('a;b');SELECT 1;");
        assert_eq!(parts, vec!["INSERT INTO t VALUES ('a;b')", "SELECT 1"]);
    }

    #[test]
    fn test_split_handles_escaped_quote() {
        let parts = split_statements(r"INSERT INTO t VALUES ('it\'s; fine');");
        assert_eq!(parts, vec![r"INSERT INTO t VALUES ('it\'s; fine')"]);
    }

    #[test]
    fn test_split_handles_backtick_identifiers() {
        let parts = split_statements("SELECT `a;b` FROM t;");
        assert_eq!(parts, vec!["SELECT `a;b` FROM t"]);
    }

    #[test]
    fn test_split_ignores_comment_semicolons() {
        let parts = split_statements("-- note; not a boundary\nSELECT 1;\n/* x; y */ SELECT 2;");
        assert_eq!(parts.len(), 2);
        assert!(parts[0].ends_with("SELECT 1"));
        assert!(parts[1].ends_with("SELECT 2"));
    }

    #[test]
    fn test_split_discards_blank_and_comment_only_fragments() {
        let parts = split_statements("SELECT 1;\n\n  \n-- trailing note\n");
        assert_eq!(parts, vec!["SELECT 1"]);
        assert!(split_statements(";;;").is_empty());
    }

    #[test]
    fn test_split_hash_comment() {
        let parts = split_statements("# header; stuff\nSELECT 1;");
        assert_eq!(parts.len(), 1);
        assert!(parts[0].ends_with("SELECT 1"));
    }
}
