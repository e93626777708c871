//! Import scanner for JavaScript and TypeScript sources.
//!
//! A byte-level lexer. It understands comments, strings, template literals
//! and regular expression literals well enough to never mistake their
//! contents for import syntax, and records the byte range of every specifier
//! so the rewriter can splice in place.

use super::{ImportKind, ImportRecord};
use crate::error::ScanError;

/// Scan a JavaScript/TypeScript module.
pub(super) fn scan_js(source: &str) -> Result<Vec<ImportRecord>, ScanError> {
    Lexer::new(source).run()
}

/// Byte offsets of line starts, for 1-indexed line/column reporting.
pub(super) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(super) fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    pub(super) fn line(&self, pos: usize) -> u32 {
        u32::try_from(self.starts.partition_point(|&s| s <= pos)).unwrap_or(u32::MAX)
    }

    pub(super) fn error(&self, source: &str, pos: usize, message: &str) -> ScanError {
        let line = self.line(pos);
        let start = self.starts[(line as usize).saturating_sub(1)];
        let column = source
            .get(start..pos)
            .map_or(1, |prefix| prefix.chars().count() + 1);
        ScanError {
            line,
            column: u32::try_from(column).unwrap_or(u32::MAX),
            message: message.to_string(),
        }
    }
}

/// The previous significant token, enough to tell a regex from a division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    Start,
    Punct(u8),
    /// A single `.` (member access). Spread `...` is recorded as punctuation.
    Dot,
    /// A keyword after which an expression starts.
    Keyword,
    Value,
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    last: Last,
    brace_depth: usize,
    /// `(brace depth at ${, template start)` for each open substitution.
    template_stack: Vec<(usize, usize)>,
    lines: LineIndex,
    records: Vec<ImportRecord>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            last: Last::Start,
            brace_depth: 0,
            template_stack: Vec::new(),
            lines: LineIndex::new(src),
            records: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<ImportRecord>, ScanError> {
        while let Some(b) = self.peek(0) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                b'/' if self.regex_allowed() => {
                    self.skip_regex()?;
                    self.last = Last::Value;
                }
                b'\'' | b'"' => {
                    self.skip_string()?;
                    self.last = Last::Value;
                }
                b'`' => {
                    let start = self.pos;
                    self.pos += 1;
                    self.skip_template(start)?;
                }
                b'{' => {
                    self.brace_depth += 1;
                    self.pos += 1;
                    self.last = Last::Punct(b'{');
                }
                b'}' => self.close_brace()?,
                b'.' => self.dot(),
                b'0'..=b'9' => {
                    self.skip_number();
                    self.last = Last::Value;
                }
                _ if is_ident_start(b) => self.identifier()?,
                _ => {
                    self.pos += 1;
                    self.last = Last::Punct(b);
                }
            }
        }

        if let Some(&(_, start)) = self.template_stack.first() {
            return Err(self.error(start, "Unterminated template literal"));
        }
        Ok(self.records)
    }

    // ---- token helpers ----

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error(&self, pos: usize, message: &str) -> ScanError {
        self.lines.error(self.src, pos, message)
    }

    fn regex_allowed(&self) -> bool {
        match self.last {
            Last::Start | Last::Keyword => true,
            Last::Punct(c) => !matches!(c, b')' | b']'),
            Last::Dot | Last::Value => false,
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(b) = self.peek(0) {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ScanError> {
        let start = self.pos;
        match self.src[self.pos + 2..].find("*/") {
            Some(offset) => {
                self.pos += 2 + offset + 2;
                Ok(())
            }
            None => Err(self.error(start, "Unterminated comment")),
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), ScanError> {
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c), _) => self.pos += 1,
                (Some(b'/'), Some(b'/')) => self.skip_line_comment(),
                (Some(b'/'), Some(b'*')) => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    /// Skip a quoted string at `pos`. Returns the byte range of its contents.
    fn skip_string(&mut self) -> Result<(usize, usize), ScanError> {
        let start = self.pos;
        let quote = self.bytes[start];
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => break,
                _ if b == quote => {
                    self.pos += 1;
                    return Ok((start + 1, self.pos - 1));
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error(start, "Unterminated string literal"))
    }

    /// Continue a template literal body until its closing backtick or the next `${`.
    fn skip_template(&mut self, start: usize) -> Result<(), ScanError> {
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    self.last = Last::Value;
                    return Ok(());
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    self.template_stack.push((self.brace_depth, start));
                    self.brace_depth += 1;
                    self.pos += 2;
                    self.last = Last::Punct(b'{');
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error(start, "Unterminated template literal"))
    }

    fn close_brace(&mut self) -> Result<(), ScanError> {
        self.pos += 1;
        self.brace_depth = self.brace_depth.saturating_sub(1);
        match self.template_stack.last() {
            Some(&(depth, start)) if depth == self.brace_depth => {
                self.template_stack.pop();
                self.skip_template(start)
            }
            _ => {
                self.last = Last::Punct(b'}');
                Ok(())
            }
        }
    }

    fn skip_regex(&mut self) -> Result<(), ScanError> {
        let start = self.pos;
        self.pos += 1;
        let mut in_class = false;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => break,
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => {
                    self.pos += 1;
                    while self.peek(0).is_some_and(is_ident_continue) {
                        self.pos += 1;
                    }
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error(start, "Unterminated regular expression"))
    }

    fn skip_number(&mut self) {
        while self
            .peek(0)
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_')
        {
            self.pos += 1;
        }
    }

    fn dot(&mut self) {
        if self.peek(1).is_some_and(|b| b.is_ascii_digit()) {
            self.skip_number();
            self.last = Last::Value;
        } else if self.peek(1) == Some(b'.') && self.peek(2) == Some(b'.') {
            self.pos += 3;
            self.last = Last::Punct(b',');
        } else {
            self.pos += 1;
            self.last = Last::Dot;
        }
    }

    fn read_ident(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek(0).is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn peek_ident(&self) -> Option<&'a str> {
        let start = self.pos;
        if !self.peek(0).is_some_and(is_ident_start) {
            return None;
        }
        let len = self.bytes[start..]
            .iter()
            .take_while(|&&b| is_ident_continue(b))
            .count();
        Some(&self.src[start..start + len])
    }

    fn identifier(&mut self) -> Result<(), ScanError> {
        let start = self.pos;
        let after_dot = self.last == Last::Dot;
        let word = self.read_ident();
        match word {
            "import" if !after_dot => self.import(start),
            "export" if !after_dot => self.export(),
            _ => {
                self.last = if !after_dot && is_expression_keyword(word) {
                    Last::Keyword
                } else {
                    Last::Value
                };
                Ok(())
            }
        }
    }

    fn push(&mut self, kind: ImportKind, start: usize, end: usize, clause: Option<String>) {
        self.records.push(ImportRecord {
            raw_specifier: self.src[start..end].to_string(),
            kind,
            start,
            end,
            computed: false,
            clause,
            line: self.lines.line(start),
        });
    }

    // ---- import forms ----

    /// `pos` is just past the `import` keyword starting at `start`.
    fn import(&mut self, start: usize) -> Result<(), ScanError> {
        let resume = self.pos;
        self.skip_trivia()?;
        match self.peek(0) {
            Some(b'(') => self.dynamic_import(),
            Some(b'.') => self.meta_glob(start, resume),
            Some(b'\'' | b'"') => {
                let (s, e) = self.skip_string()?;
                self.push(ImportKind::Static, s, e, None);
                self.last = Last::Value;
                Ok(())
            }
            _ => self.static_import(resume),
        }
    }

    fn static_import(&mut self, resume: usize) -> Result<(), ScanError> {
        let clause_start = self.pos;
        loop {
            self.skip_trivia()?;
            match self.peek(0) {
                Some(b'{') => match find_matching(self.bytes, self.pos) {
                    Some(close) => self.pos = close + 1,
                    None => break,
                },
                Some(b'*' | b',') => self.pos += 1,
                Some(b) if is_ident_start(b) => {
                    let word_start = self.pos;
                    if self.read_ident() != "from" {
                        continue;
                    }
                    self.skip_trivia()?;
                    if matches!(self.peek(0), Some(b'\'' | b'"')) {
                        let clause = self.src[clause_start..word_start].trim().to_string();
                        let (s, e) = self.skip_string()?;
                        self.push(ImportKind::Static, s, e, Some(clause));
                        self.last = Last::Value;
                        return Ok(());
                    }
                }
                _ => break,
            }
        }
        // Not a declaration we understand (`import x = require(...)`, `import.meta`...)
        self.pos = resume;
        self.last = Last::Value;
        Ok(())
    }

    /// `pos` is at the `(` of `import(...)`.
    fn dynamic_import(&mut self) -> Result<(), ScanError> {
        let open = self.pos;
        self.pos += 1;
        self.skip_trivia()?;
        let arg_start = self.pos;

        match self.peek(0) {
            Some(b'\'' | b'"') => {
                let (s, e) = self.skip_string()?;
                self.skip_trivia()?;
                if matches!(self.peek(0), Some(b')' | b',')) {
                    self.push(ImportKind::Dynamic, s, e, None);
                    self.last = Last::Value;
                    return Ok(());
                }
            }
            Some(b'`') => {
                if let Some(close) = plain_template_end(self.bytes, arg_start) {
                    self.pos = close + 1;
                    self.skip_trivia()?;
                    if matches!(self.peek(0), Some(b')' | b',')) {
                        self.push(ImportKind::Dynamic, arg_start + 1, close, None);
                        self.last = Last::Value;
                        return Ok(());
                    }
                }
            }
            _ => {}
        }

        // Computed argument: record it for a warning, then lex the expression normally
        if let Some(close) = find_matching(self.bytes, open) {
            let expression = self.src[arg_start..close].trim_end();
            if !expression.is_empty() {
                let end = arg_start + expression.len();
                self.records.push(ImportRecord {
                    raw_specifier: expression.to_string(),
                    kind: ImportKind::Dynamic,
                    start: arg_start,
                    end,
                    computed: true,
                    clause: None,
                    line: self.lines.line(arg_start),
                });
            }
        }
        self.pos = open + 1;
        self.last = Last::Punct(b'(');
        Ok(())
    }

    /// `import.meta.glob("pattern")` / `import.meta.globEager("pattern")`.
    ///
    /// The record's range covers the whole call, since the call is replaced.
    fn meta_glob(&mut self, start: usize, resume: usize) -> Result<(), ScanError> {
        let Some(eager) = self.glob_callee()? else {
            self.pos = resume;
            self.last = Last::Value;
            return Ok(());
        };

        let open = self.pos;
        self.pos += 1;
        self.skip_trivia()?;
        let kind = ImportKind::Glob { eager };

        if matches!(self.peek(0), Some(b'\'' | b'"')) {
            let (s, e) = self.skip_string()?;
            self.skip_trivia()?;
            if let Some(close) = find_matching(self.bytes, open) {
                self.records.push(ImportRecord {
                    raw_specifier: self.src[s..e].to_string(),
                    kind,
                    start,
                    end: close + 1,
                    computed: false,
                    clause: None,
                    line: self.lines.line(start),
                });
                self.pos = close + 1;
                self.last = Last::Value;
                return Ok(());
            }
        }

        if let Some(close) = find_matching(self.bytes, open) {
            let arg_start = open + 1;
            self.records.push(ImportRecord {
                raw_specifier: self.src[arg_start..close].trim().to_string(),
                kind,
                start,
                end: close + 1,
                computed: true,
                clause: None,
                line: self.lines.line(start),
            });
        }
        self.pos = open + 1;
        self.last = Last::Punct(b'(');
        Ok(())
    }

    /// Match `.meta.glob(` or `.meta.globEager(`, leaving `pos` at the `(`.
    fn glob_callee(&mut self) -> Result<Option<bool>, ScanError> {
        for expected in ["meta", "glob"] {
            if self.peek(0) != Some(b'.') {
                return Ok(None);
            }
            self.pos += 1;
            self.skip_trivia()?;
            let word = self.read_ident();
            let matched = match expected {
                "glob" => matches!(word, "glob" | "globEager"),
                _ => word == expected,
            };
            if !matched {
                return Ok(None);
            }
            self.skip_trivia()?;
            if expected == "glob" {
                return Ok((self.peek(0) == Some(b'(')).then_some(word == "globEager"));
            }
        }
        Ok(None)
    }

    // ---- export forms ----

    /// `pos` is just past the `export` keyword.
    fn export(&mut self) -> Result<(), ScanError> {
        let resume = self.pos;
        self.skip_trivia()?;
        let clause_start = self.pos;

        if self.peek_ident() == Some("type") {
            self.read_ident();
            self.skip_trivia()?;
        }

        let kind = match self.peek(0) {
            Some(b'*') => {
                self.pos += 1;
                self.skip_trivia()?;
                if self.peek_ident() == Some("as") {
                    self.read_ident();
                    self.skip_trivia()?;
                    if matches!(self.peek(0), Some(b'\'' | b'"')) {
                        self.skip_string()?;
                    } else {
                        self.read_ident();
                    }
                    self.skip_trivia()?;
                }
                ImportKind::ExportAll
            }
            Some(b'{') => match find_matching(self.bytes, self.pos) {
                Some(close) => {
                    self.pos = close + 1;
                    self.skip_trivia()?;
                    ImportKind::ExportFrom
                }
                None => {
                    self.pos = resume;
                    self.last = Last::Keyword;
                    return Ok(());
                }
            },
            _ => {
                // `export default`, `export const`... carry no specifier
                self.pos = resume;
                self.last = Last::Keyword;
                return Ok(());
            }
        };

        let from_start = self.pos;
        if self.peek_ident() == Some("from") {
            self.read_ident();
            self.skip_trivia()?;
            if matches!(self.peek(0), Some(b'\'' | b'"')) {
                let clause = self.src[clause_start..from_start].trim().to_string();
                let (s, e) = self.skip_string()?;
                self.push(kind, s, e, Some(clause));
                self.last = Last::Value;
                return Ok(());
            }
        }

        // `export { a, b };` has no source module
        self.pos = from_start;
        self.last = Last::Punct(b'}');
        Ok(())
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b == b'\\' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// Keywords after which a `/` starts a regular expression.
fn is_expression_keyword(word: &str) -> bool {
    matches!(
        word,
        "return"
            | "typeof"
            | "instanceof"
            | "in"
            | "of"
            | "new"
            | "delete"
            | "void"
            | "throw"
            | "case"
            | "do"
            | "else"
            | "yield"
            | "await"
            | "default"
    )
}

/// End of a template literal at `start` that contains no `${` substitution.
fn plain_template_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Some(i),
            b'$' if bytes.get(i + 1) == Some(&b'{') => return None,
            _ => i += 1,
        }
    }
    None
}

/// Index of the bracket closing the one at `open`, skipping strings, templates and comments.
pub(super) fn find_matching(bytes: &[u8], open: usize) -> Option<usize> {
    let mut stack = vec![closer(bytes[open])?];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_quoted(bytes, i)?,
            b'`' => i = skip_template_nested(bytes, i)?,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let rest = bytes.get(i + 2..)?;
                let offset = rest.windows(2).position(|w| w == b"*/")?;
                i += 2 + offset + 1;
            }
            b @ (b'(' | b'[' | b'{') => stack.push(closer(b)?),
            b @ (b')' | b']' | b'}') => {
                if stack.last() == Some(&b) {
                    stack.pop();
                    if stack.is_empty() {
                        return Some(i);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn closer(open: u8) -> Option<u8> {
    match open {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

/// Index of the closing quote of the string at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b if b == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Index of the closing backtick of the template at `start`, descending into `${}`.
fn skip_template_nested(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Some(i),
            b'$' if bytes.get(i + 1) == Some(&b'{') => i = find_matching(bytes, i + 1)? + 1,
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(source: &str) -> Vec<(String, ImportKind)> {
        scan_js(source)
            .unwrap()
            .into_iter()
            .map(|r| (r.raw_specifier, r.kind))
            .collect()
    }

    #[test]
    fn test_static_imports() {
        let src = r#"
import React from "react";
import { useState, useEffect } from 'react';
import * as path from "path-browserify";
import "./styles.css";
import def, { named } from './mod.js';
"#;
        assert_eq!(
            specs(src),
            vec![
                ("react".to_string(), ImportKind::Static),
                ("react".to_string(), ImportKind::Static),
                ("path-browserify".to_string(), ImportKind::Static),
                ("./styles.css".to_string(), ImportKind::Static),
                ("./mod.js".to_string(), ImportKind::Static),
            ]
        );
    }

    #[test]
    fn test_range_covers_specifier_text() {
        let src = "import {flatten} from 'array-flatten';";
        let records = scan_js(src).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(&src[r.start..r.end], "array-flatten");
        assert_eq!(r.clause.as_deref(), Some("{flatten}"));
        assert_eq!(r.line, 1);
    }

    #[test]
    fn test_exports_with_and_without_from() {
        let src = r#"
export { a, b } from "./ab.js";
export * from "./all.js";
export * as ns from "./ns.js";
export { local };
export const x = 1;
export default function () {}
"#;
        assert_eq!(
            specs(src),
            vec![
                ("./ab.js".to_string(), ImportKind::ExportFrom),
                ("./all.js".to_string(), ImportKind::ExportAll),
                ("./ns.js".to_string(), ImportKind::ExportAll),
            ]
        );
    }

    #[test]
    fn test_dynamic_imports() {
        let src = r#"
const a = await import("./lazy.js");
const b = import(`./tpl.js`);
const c = import("./pages/" + name);
const d = import(`./pages/${name}.js`);
"#;
        let records = scan_js(src).unwrap();
        let summary: Vec<(&str, bool)> = records
            .iter()
            .map(|r| (r.raw_specifier.as_str(), r.computed))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("./lazy.js", false),
                ("./tpl.js", false),
                ("\"./pages/\" + name", true),
                ("`./pages/${name}.js`", true),
            ]
        );
        assert!(records.iter().all(|r| r.kind == ImportKind::Dynamic));
        assert_eq!(records[2].line, 4);
    }

    #[test]
    fn test_glob_calls() {
        let src = "const pages = import.meta.glob('./pages/*.js');\nconst eager = import.meta.globEager(\"./data/*.json\");\nconsole.log(import.meta.url);";
        let records = scan_js(src).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, ImportKind::Glob { eager: false });
        assert_eq!(records[0].raw_specifier, "./pages/*.js");
        assert_eq!(
            &src[records[0].start..records[0].end],
            "import.meta.glob('./pages/*.js')"
        );
        assert_eq!(records[1].kind, ImportKind::Glob { eager: true });
        assert_eq!(records[1].line, 2);
    }

    #[test]
    fn test_ignores_comments_strings_templates_and_regex() {
        let src = r#"
// import a from "commented";
/* import b from "block"; */
const s = "import c from 'string'";
const t = `import d from "${x}" and import("e")`;
const r = /import f from "regex"/g;
const q = a / b; import g from "real";
"#;
        assert_eq!(specs(src), vec![("real".to_string(), ImportKind::Static)]);
    }

    #[test]
    fn test_member_import_is_not_a_keyword() {
        let src = "obj.import('x'); loader.export = 1; import y from 'y';";
        assert_eq!(specs(src), vec![("y".to_string(), ImportKind::Static)]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let src = "import a from './a.js';\nimport './a.js';\nimport('./a.js');";
        assert_eq!(scan_js(src).unwrap().len(), 3);
    }

    #[test]
    fn test_nested_template_substitutions() {
        let src = "const s = `${`${a}`}`; import z from 'z';";
        assert_eq!(specs(src), vec![("z".to_string(), ImportKind::Static)]);
    }

    #[test]
    fn test_typescript_forms() {
        let src = "import type { Props } from './types';\nexport type { T } from './t';\nimport fs = require('fs');";
        assert_eq!(
            specs(src),
            vec![
                ("./types".to_string(), ImportKind::Static),
                ("./t".to_string(), ImportKind::ExportFrom),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_reports_position() {
        let err = scan_js("const a = 1;\nimport x from 'oops\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 15);
        assert_eq!(err.message, "Unterminated string literal");
    }

    #[test]
    fn test_unterminated_comment_and_template() {
        assert!(scan_js("/* never closed").is_err());
        assert!(scan_js("const t = `abc").is_err());
    }

    #[test]
    fn test_multiline_clause() {
        let src = "import {\n  a,\n  b as c,\n} from \"pkg\";";
        let records = scan_js(src).unwrap();
        assert_eq!(records[0].raw_specifier, "pkg");
        assert_eq!(records[0].line, 4);
    }
}
