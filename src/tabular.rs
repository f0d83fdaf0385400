//! Minimal CSV record codec for the manifest and the audit log.
//!
//! Fields containing the separator, quotes or newlines are double-quoted,
//! with embedded quotes doubled. The codec is line-oriented: callers split
//! the input into lines first, so a quoted field spanning lines cannot be
//! read back. Writers keep every field single-line (see
//! `audit::clean_message`).

/// Split one CSV record into its fields. `line` must be a single line;
/// a quoted newline inside a field is not supported.
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    fields.push(field);

    fields
}

/// Join fields into one CSV record, without a trailing newline.
pub fn write_record(fields: &[&str]) -> String {
    let escaped: Vec<String> = fields.iter().map(|field| escape_field(field)).collect();
    escaped.join(",")
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_record() {
        assert_eq!(split_record("1,a,b"), vec!["1", "a", "b"]);
    }

    #[test]
    fn splits_quoted_separator() {
        assert_eq!(
            split_record(r#"1,"a,b",c"#),
            vec!["1", "a,b", "c"]
        );
    }

    #[test]
    fn splits_escaped_quote() {
        assert_eq!(split_record(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn keeps_empty_fields() {
        assert_eq!(split_record("a,,b,"), vec!["a", "", "b", ""]);
    }

    #[test]
    fn writes_and_reads_back() {
        let fields = ["12", "http://a.b/c?d=e,f", r#"we "quote" things"#, ""];
        let line = write_record(&fields);
        assert_eq!(split_record(&line), fields);
    }

    #[test]
    fn plain_fields_stay_unquoted() {
        assert_eq!(write_record(&["1", "ok", "2.5"]), "1,ok,2.5");
    }
}
