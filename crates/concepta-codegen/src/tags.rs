//! Tag markers embedded in generated text.
//!
//! A marker is the literal `/*@name*/`, where `name` is made of ASCII
//! letters, digits and `_ . : -`. Text that merely starts like a marker
//! (`/*@ not a tag */`) is left alone.

const OPEN: &str = "/*@";
const CLOSE: &str = "*/";

/// Renders the marker for tag `name`.
pub fn marker(name: &str) -> String {
    format!("{OPEN}{name}{CLOSE}")
}

pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

/// A marker found in a text, with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker<'a> {
    pub name: &'a str,
    pub start: usize,
    pub end: usize,
}

/// All markers in `text`, left to right.
pub fn scan(text: &str) -> Vec<Marker<'_>> {
    let mut markers = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(OPEN) {
        let start = pos + offset;
        let name_start = start + OPEN.len();
        let name_len = text[name_start..]
            .find(|c: char| !is_name_char(c))
            .unwrap_or(text.len() - name_start);
        let name_end = name_start + name_len;

        if name_len > 0 && text[name_end..].starts_with(CLOSE) {
            let end = name_end + CLOSE.len();
            markers.push(Marker {
                name: &text[name_start..name_end],
                start,
                end,
            });
            pos = end;
        } else {
            pos = name_start;
        }
    }

    markers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_roundtrips_through_scan() {
        let text = format!("class A {{\n{}}}\n", marker("properties"));
        let found = scan(&text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "properties");
        assert_eq!(&text[found[0].start..found[0].end], "/*@properties*/");
    }

    #[test]
    fn adjacent_markers_are_separate() {
        let names: Vec<&str> = scan("/*@a*//*@b.c:d-e*/").iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["a", "b.c:d-e"]);
    }

    #[test]
    fn lookalikes_are_ignored() {
        assert!(scan("/*@ spaced */ /*@*/ /*@open").is_empty());
        assert!(scan("plain /* comment */ text").is_empty());
    }

    #[test]
    fn name_validation() {
        assert!(is_valid_name("Book.Title:compare"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("star*"));
    }
}
