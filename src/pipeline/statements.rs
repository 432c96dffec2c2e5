/// Split a SQL script on top-level `;`.
///
/// Semicolons inside quoted strings, quoted identifiers, comments and
/// dollar-quoted bodies do not terminate a statement. Blank statements are
/// dropped and the terminator is not kept.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = script.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '\'' | '"' => {
                let end = scan_quoted(&chars, i, ch);
                current.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|c| *c == '\n')
                    .map_or(chars.len(), |offset| i + offset);
                current.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = scan_block_comment(&chars, i);
                current.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '$' => {
                if let Some(tag) = dollar_tag(&chars, i) {
                    let end = scan_dollar_body(&chars, i, &tag);
                    current.extend(&chars[i..end]);
                    i = end;
                    continue;
                }
            }
            ';' => {
                push_statement(&mut statements, &current);
                current.clear();
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(ch);
        i += 1;
    }

    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && !is_only_comments(trimmed) {
        statements.push(trimmed.to_string());
    }
}

/// True when nothing but `--` and `/* */` comments and whitespace remain.
fn is_only_comments(sql: &str) -> bool {
    let mut rest = sql.trim_start();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |idx| &after[idx + 1..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |idx| &after[idx + 2..]);
        } else {
            return false;
        }
        rest = rest.trim_start();
    }
    true
}

/// Index just past the closing quote. Doubled quotes are escapes.
fn scan_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn scan_block_comment(chars: &[char], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

/// `$tag$` or `$$` starting at `start`, if any.
fn dollar_tag(chars: &[char], start: usize) -> Option<String> {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '$' {
            return Some(chars[start..=i].iter().collect());
        }
        if !(c.is_alphanumeric() || c == '_') || (i == start + 1 && c.is_ascii_digit()) {
            return None;
        }
        i += 1;
    }
    None
}

fn scan_dollar_body(chars: &[char], start: usize, tag: &str) -> usize {
    let tag: Vec<char> = tag.chars().collect();
    let mut i = start + tag.len();
    while i + tag.len() <= chars.len() {
        if chars[i..i + tag.len()] == tag[..] {
            return i + tag.len();
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolons() {
        let parts = split_statements("CREATE TABLE a (id int);\nCREATE TABLE b (id int);");
        assert_eq!(
            parts,
            vec!["CREATE TABLE a (id int)", "CREATE TABLE b (id int)"]
        );
    }

    #[test]
    fn ignores_semicolons_in_literals_and_comments() {
        let sql = "INSERT INTO t VALUES ('a;b');\n-- note; here\nCREATE TABLE \"x;y\" (id int);\n/* ; */";
        let parts = split_statements(sql);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "INSERT INTO t VALUES ('a;b')");
        assert!(parts[1].ends_with("CREATE TABLE \"x;y\" (id int)"));
    }

    #[test]
    fn keeps_dollar_quoted_bodies_intact() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $body$ BEGIN RETURN 1; END; $body$ LANGUAGE plpgsql;\nSELECT 1";
        let parts = split_statements(sql);
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("RETURN 1; END;"));
        assert_eq!(parts[1], "SELECT 1");
    }

    #[test]
    fn positional_parameters_are_not_dollar_quotes() {
        let parts = split_statements("SELECT $1; SELECT 2");
        assert_eq!(parts, vec!["SELECT $1", "SELECT 2"]);
    }

    #[test]
    fn drops_blank_and_comment_only_statements() {
        assert!(split_statements(" ; ;\n-- only a comment\n").is_empty());
    }

    #[test]
    fn trailing_block_comment_is_not_a_statement() {
        let parts = split_statements("CREATE TABLE a (id int);\n/* generated\n by cds */\n");
        assert_eq!(parts, vec!["CREATE TABLE a (id int)"]);
        assert!(split_statements("/* a */ -- b\n/* c */").is_empty());
    }

    #[test]
    fn comment_before_statement_keeps_the_statement() {
        let parts = split_statements("/* header */ CREATE TABLE a (id int)");
        assert_eq!(parts, vec!["/* header */ CREATE TABLE a (id int)"]);
    }
}
