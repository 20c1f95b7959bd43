//! Minimal markup escaping for values embedded in attribute or element text.
//!
//! Only `"` `<` `>` are rewritten; everything else passes through untouched.
//! That is the full set needed for double-quoted attributes and text nodes in
//! the generated form.

/// Escaped form of one character, or `None` when it passes through as-is.
pub fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '"' => Some("&quot;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        _ => None,
    }
}

/// Appends `text` to `out`, escaping as it goes.
pub fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match escape_char(c) {
            Some(ent) => out.push_str(ent),
            None => out.push(c),
        }
    }
}

/// Owned-string form of [`escape_into`].
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_the_three_specials() {
        assert_eq!(escape(r#"a"b<c>d"#), "a&quot;b&lt;c&gt;d");
    }

    #[test]
    fn passes_everything_else() {
        assert_eq!(escape("p&q 'r' é"), "p&q 'r' é");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn append_form_extends_in_place() {
        let mut s = String::from("x=");
        escape_into(&mut s, "<y>");
        assert_eq!(s, "x=&lt;y&gt;");
    }
}
