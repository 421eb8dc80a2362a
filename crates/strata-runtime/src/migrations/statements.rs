//! Splitting raw SQL payloads into individual statements.

use std::iter::Peekable;
use std::str::Chars;

enum State {
    Normal,
    Quoted(char),
    LineComment,
    BlockComment,
    DollarQuoted(String),
}

/// Split SQL into individual statements.
///
/// Semicolons inside string literals, quoted identifiers, comments and
/// dollar-quoted bodies (PL/pgSQL functions) do not end a statement.
/// Comment-only fragments are dropped.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        let next = match &state {
            State::Normal => match c {
                '\'' | '"' => Some(State::Quoted(c)),
                '-' if chars.peek() == Some(&'-') => {
                    consume(&mut chars, &mut current);
                    Some(State::LineComment)
                }
                '/' if chars.peek() == Some(&'*') => {
                    consume(&mut chars, &mut current);
                    Some(State::BlockComment)
                }
                '$' => read_dollar_tag(&mut chars, &mut current).map(State::DollarQuoted),
                ';' => {
                    push_statement(&mut statements, &current);
                    current.clear();
                    None
                }
                _ => None,
            },
            // A doubled quote closes and immediately reopens, which is still correct.
            State::Quoted(quote) => (c == *quote).then_some(State::Normal),
            State::LineComment => (c == '\n').then_some(State::Normal),
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    consume(&mut chars, &mut current);
                    Some(State::Normal)
                } else {
                    None
                }
            }
            State::DollarQuoted(tag) => {
                if c == '$' {
                    match read_dollar_tag(&mut chars, &mut current) {
                        Some(closing) if closing == *tag => Some(State::Normal),
                        _ => None,
                    }
                } else {
                    None
                }
            }
        };

        if let Some(next) = next {
            state = next;
        }
    }

    push_statement(&mut statements, &current);
    statements
}

fn consume(chars: &mut Peekable<Chars<'_>>, current: &mut String) {
    if let Some(c) = chars.next() {
        current.push(c);
    }
}

/// Having just read a `$`, read the rest of a `$tag$` delimiter if there is one.
fn read_dollar_tag(chars: &mut Peekable<Chars<'_>>, current: &mut String) -> Option<String> {
    let mut tag = String::from("$");

    while let Some(&next) = chars.peek() {
        if next == '$' {
            chars.next();
            current.push('$');
            tag.push('$');
            return Some(tag);
        } else if next.is_alphanumeric() || next == '_' {
            chars.next();
            current.push(next);
            tag.push(next);
        } else {
            break;
        }
    }

    None
}

fn push_statement(statements: &mut Vec<String>, fragment: &str) {
    let stmt = fragment.trim().trim_end_matches(';').trim();
    let comment_only = stmt.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with("--")
    });

    if !comment_only {
        statements.push(stmt.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_statements() {
        let stmts = split_sql_statements("SELECT 1; SELECT 2; SELECT 3;");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn test_trailing_statement_without_semicolon() {
        let stmts = split_sql_statements("CREATE TABLE a (id INT);\nDROP TABLE b");
        assert_eq!(stmts, vec!["CREATE TABLE a (id INT)", "DROP TABLE b"]);
    }

    #[test]
    fn test_split_with_dollar_quoted_function() {
        let sql = r#"
CREATE FUNCTION test() RETURNS void AS $$
BEGIN
    SELECT 1;
    SELECT 2;
END;
$$ LANGUAGE plpgsql;

SELECT 3;
"#;
        let stmts = split_sql_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("CREATE FUNCTION"));
        assert!(stmts[0].contains("$$ LANGUAGE plpgsql"));
        assert!(stmts[1].contains("SELECT 3"));
    }

    #[test]
    fn test_named_dollar_tags() {
        let sql = "DO $body$ BEGIN PERFORM 1; END $body$; SELECT $1;";
        let stmts = split_sql_statements(sql);
        assert_eq!(stmts, vec!["DO $body$ BEGIN PERFORM 1; END $body$", "SELECT $1"]);
    }

    #[test]
    fn test_semicolons_in_strings_and_comments() {
        let sql = r#"
-- leading comment; not a statement
INSERT INTO notes (body) VALUES ('a;b'), ('it''s; fine');
/* block; comment */ UPDATE "odd;name" SET x = 1;
"#;
        let stmts = split_sql_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].ends_with("('it''s; fine')"));
        assert!(stmts[1].contains("UPDATE \"odd;name\" SET x = 1"));
    }

    #[test]
    fn test_comment_only_input() {
        assert!(split_sql_statements("-- nothing here\n\n-- at all").is_empty());
        assert!(split_sql_statements("   ").is_empty());
    }
}
