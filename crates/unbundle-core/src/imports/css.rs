//! `@import` scanning for stylesheets.

use super::scan::LineIndex;
use super::{ImportKind, ImportRecord};
use crate::error::ScanError;

const AT_IMPORT: &[u8] = b"@import";

/// Scan a stylesheet for `@import "x"`, `@import 'x'` and `@import url(x)`.
pub(super) fn scan_css(source: &str) -> Result<Vec<ImportRecord>, ScanError> {
    let bytes = source.as_bytes();
    let lines = LineIndex::new(source);
    let mut records = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => match source[i + 2..].find("*/") {
                Some(offset) => i += 2 + offset + 2,
                None => return Err(lines.error(source, i, "Unterminated comment")),
            },
            b'\'' | b'"' => {
                let (_, end) = quoted(bytes, i)
                    .ok_or_else(|| lines.error(source, i, "Unterminated string"))?;
                i = end + 1;
            }
            b'@' if starts_with_at_import(bytes, i) => {
                i += AT_IMPORT.len();
                while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
                    i += 1;
                }
                let Some((start, end, next)) = import_target(bytes, i) else {
                    return Err(lines.error(source, i, "Malformed @import"));
                };
                records.push(ImportRecord {
                    raw_specifier: source[start..end].to_string(),
                    kind: ImportKind::Static,
                    start,
                    end,
                    computed: false,
                    clause: None,
                    line: lines.line(start),
                });
                i = next;
            }
            _ => i += 1,
        }
    }

    Ok(records)
}

fn starts_with_at_import(bytes: &[u8], i: usize) -> bool {
    bytes
        .get(i..i + AT_IMPORT.len())
        .is_some_and(|s| s.eq_ignore_ascii_case(AT_IMPORT))
        && !bytes
            .get(i + AT_IMPORT.len())
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'-')
}

/// Content range of the quoted string at `i`, and the index of the closing quote.
fn quoted(bytes: &[u8], i: usize) -> Option<(usize, usize)> {
    let quote = bytes[i];
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' => return None,
            b if b == quote => return Some((i + 1, j)),
            _ => j += 1,
        }
    }
    None
}

/// Target of an `@import`: `(start, end, resume)`.
fn import_target(bytes: &[u8], i: usize) -> Option<(usize, usize, usize)> {
    match bytes.get(i)? {
        b'\'' | b'"' => {
            let (start, close) = quoted(bytes, i)?;
            Some((start, close, close + 1))
        }
        _ if bytes.get(i..i + 4)?.eq_ignore_ascii_case(b"url(") => {
            let mut j = i + 4;
            while bytes.get(j).is_some_and(u8::is_ascii_whitespace) {
                j += 1;
            }
            if matches!(bytes.get(j), Some(b'\'' | b'"')) {
                let (start, close) = quoted(bytes, j)?;
                let paren = close + 1 + bytes[close + 1..].iter().position(|&b| b == b')')?;
                return Some((start, close, paren + 1));
            }
            let paren = j + bytes[j..].iter().position(|&b| b == b')')?;
            let mut end = paren;
            while end > j && bytes[end - 1].is_ascii_whitespace() {
                end -= 1;
            }
            Some((j, end, paren + 1))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_forms() {
        let src = "@import \"./base.css\";\n@import 'theme.css';\n@import url(./reset.css);\n@IMPORT url( \"https://fonts.example.com/a.css\" );";
        let records = scan_css(src).unwrap();
        let specs: Vec<&str> = records.iter().map(|r| r.raw_specifier.as_str()).collect();
        assert_eq!(
            specs,
            vec![
                "./base.css",
                "theme.css",
                "./reset.css",
                "https://fonts.example.com/a.css"
            ]
        );
        for r in &records {
            assert_eq!(&src[r.start..r.end], r.raw_specifier);
            assert_eq!(r.kind, ImportKind::Static);
        }
        assert_eq!(records[2].line, 3);
    }

    #[test]
    fn test_comments_and_strings_are_skipped() {
        let src = "/* @import 'no.css'; */\n.a::before { content: \"@import 'nope'\"; }\n@import './yes.css';";
        let records = scan_css(src).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_specifier, "./yes.css");
    }

    #[test]
    fn test_other_at_rules_are_ignored() {
        let src = "@imports-are-not-this { }\n@media screen { .a { color: red; } }";
        assert!(scan_css(src).unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_comment() {
        let err = scan_css("a { }\n/* open").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
