/// Quote-aware splitting of one comma-separated line.
///
/// Fields wrapped in double quotes may contain commas; a doubled quote
/// inside a quoted field is an escaped quote. Returned fields are trimmed
/// and have their surrounding quotes removed.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_fields() {
        assert_eq!(split_line("a,b, c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_quoted_field_with_comma() {
        let fields = split_line(r#"Date,Time,"Flow, Observed (m3/s)",2"#);
        assert_eq!(fields, vec!["Date", "Time", "Flow, Observed (m3/s)", "2"]);
    }

    #[test]
    fn test_split_escaped_quote() {
        assert_eq!(split_line(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_split_trailing_empty_field() {
        assert_eq!(split_line("1,2,"), vec!["1", "2", ""]);
    }

    #[test]
    fn test_split_empty_line() {
        assert_eq!(split_line(""), vec![""]);
    }
}
