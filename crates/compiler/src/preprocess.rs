//! The script preprocessor: `#include`, `#define`, conditionals.
//!
//! Runs before the lexer. Comments are stripped first, continuation lines
//! joined, then directives are executed and macros expanded. Included
//! files are fetched through the `SourceLoader` the caller supplies (the
//! driver routes this through the virtual filesystem), and their lines are
//! attributed to the `#include` line of the including file so diagnostics
//! always point into the file being compiled.

use crate::error::CompileError;
use std::collections::HashMap;

/// How include files are fetched. Paths are virtual: `#include <x.h>`
/// resolves under `/include`, `#include "x.h"` relative to the including
/// file's directory.
pub trait SourceLoader {
    fn read_include(&mut self, path: &str) -> Option<String>;
}

/// A no-include loader for strings compiled on the fly (`compile_string`).
pub struct NoIncludes;

impl SourceLoader for NoIncludes {
    fn read_include(&mut self, _path: &str) -> Option<String> {
        None
    }
}

/// One post-expansion line, tagged with the line of the file under
/// compilation that produced it.
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub text: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
struct Macro {
    /// `None` for object-like macros.
    params: Option<Vec<String>>,
    body: String,
}

/// Expansion and include recursion cap.
const MAX_DEPTH: usize = 8;

pub fn preprocess(
    path: &str,
    source: &str,
    loader: &mut dyn SourceLoader,
) -> Result<Vec<SourceLine>, CompileError> {
    let mut pp = Preprocessor {
        path: path.to_string(),
        macros: HashMap::new(),
        loader,
        out: Vec::new(),
        cond_stack: Vec::new(),
    };
    pp.run(source, None, 0)?;
    if !pp.cond_stack.is_empty() {
        return Err(CompileError::new(path, 0, "unterminated #ifdef"));
    }
    Ok(pp.out)
}

struct Preprocessor<'a> {
    path: String,
    macros: HashMap<String, Macro>,
    loader: &'a mut dyn SourceLoader,
    out: Vec<SourceLine>,
    /// One entry per open conditional: is the current branch active?
    cond_stack: Vec<bool>,
}

impl Preprocessor<'_> {
    /// Process one file. `pinned_line` is set for included files: every
    /// line they produce is attributed to the include site.
    fn run(
        &mut self,
        source: &str,
        pinned_line: Option<u32>,
        depth: usize,
    ) -> Result<(), CompileError> {
        if depth > MAX_DEPTH {
            let line = pinned_line.unwrap_or(0);
            return Err(CompileError::new(&self.path, line, "includes nested too deeply"));
        }
        let clean = strip_comments(source);
        let mut lines = clean.lines().enumerate().peekable();
        while let Some((idx, first)) = lines.next() {
            let report_line = pinned_line.unwrap_or(idx as u32 + 1);
            // join continuation lines
            let mut text = first.to_string();
            while text.ends_with('\\') {
                text.pop();
                match lines.next() {
                    Some((_, next)) => text.push_str(next),
                    None => break,
                }
            }
            let trimmed = text.trim_start();
            if let Some(directive) = trimmed.strip_prefix('#') {
                self.directive(directive.trim(), report_line, depth)?;
            } else if self.active() {
                let expanded = self.expand(&text, report_line, 0)?;
                self.out.push(SourceLine {
                    text: expanded,
                    line: report_line,
                });
            }
        }
        Ok(())
    }

    fn active(&self) -> bool {
        self.cond_stack.iter().all(|&b| b)
    }

    fn directive(&mut self, rest: &str, line: u32, depth: usize) -> Result<(), CompileError> {
        let (word, args) = split_word(rest);
        match word {
            "ifdef" | "ifndef" => {
                let name = split_word(args).0;
                let defined = self.macros.contains_key(name);
                self.cond_stack
                    .push(if word == "ifdef" { defined } else { !defined });
            }
            "else" => match self.cond_stack.last_mut() {
                Some(top) => *top = !*top,
                None => return Err(CompileError::new(&self.path, line, "#else without #ifdef")),
            },
            "endif" => {
                if self.cond_stack.pop().is_none() {
                    return Err(CompileError::new(&self.path, line, "#endif without #ifdef"));
                }
            }
            _ if !self.active() => {}
            "include" => self.include(args.trim(), line, depth)?,
            "define" => self.define(args, line)?,
            "undef" => {
                self.macros.remove(split_word(args).0);
            }
            other => {
                return Err(CompileError::new(
                    &self.path,
                    line,
                    format!("unknown preprocessor directive #{other}"),
                ));
            }
        }
        Ok(())
    }

    fn include(&mut self, spec: &str, line: u32, depth: usize) -> Result<(), CompileError> {
        let target = if let Some(inner) = spec.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            format!("/include/{inner}")
        } else if let Some(inner) = spec.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            if inner.starts_with('/') {
                inner.to_string()
            } else {
                let dir = self.path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
                format!("{dir}/{inner}")
            }
        } else {
            return Err(CompileError::new(&self.path, line, "malformed #include"));
        };
        let Some(source) = self.loader.read_include(&target) else {
            return Err(CompileError::new(
                &self.path,
                line,
                format!("cannot read include file {target}"),
            ));
        };
        self.run(&source, Some(line), depth + 1)
    }

    fn define(&mut self, args: &str, line: u32) -> Result<(), CompileError> {
        let args = args.trim_start();
        let name_end = args
            .find(|c: char| !c.is_alphanumeric() && c != '_')
            .unwrap_or(args.len());
        let name = &args[..name_end];
        if name.is_empty() {
            return Err(CompileError::new(&self.path, line, "#define needs a name"));
        }
        let rest = &args[name_end..];
        // a parameter list counts only when the paren touches the name
        if let Some(body_start) = rest.strip_prefix('(') {
            let close = body_start.find(')').ok_or_else(|| {
                CompileError::new(&self.path, line, "unterminated macro parameter list")
            })?;
            let params = body_start[..close]
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            self.macros.insert(
                name.to_string(),
                Macro {
                    params: Some(params),
                    body: body_start[close + 1..].trim().to_string(),
                },
            );
        } else {
            self.macros.insert(
                name.to_string(),
                Macro {
                    params: None,
                    body: rest.trim().to_string(),
                },
            );
        }
        Ok(())
    }

    /// Expand macros in one line of code, leaving string literals alone.
    fn expand(&self, text: &str, line: u32, depth: usize) -> Result<String, CompileError> {
        if depth > MAX_DEPTH {
            return Err(CompileError::new(&self.path, line, "macro expansion too deep"));
        }
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '"' {
                // copy the string literal verbatim
                out.push(c);
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    if chars[i] == '"' {
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                continue;
            }
            if c.is_alphabetic() || c == '_' {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                match self.macros.get(&ident) {
                    Some(mac) => match &mac.params {
                        None => {
                            let expanded = self.expand(&mac.body, line, depth + 1)?;
                            out.push_str(&expanded);
                        }
                        Some(params) => {
                            // function-like macros need their argument list
                            // on the same line
                            while i < chars.len() && chars[i].is_whitespace() {
                                i += 1;
                            }
                            if i >= chars.len() || chars[i] != '(' {
                                out.push_str(&ident);
                                continue;
                            }
                            let (args, next) = collect_macro_args(&chars, i, &self.path, line)?;
                            i = next;
                            if args.len() != params.len() {
                                return Err(CompileError::new(
                                    &self.path,
                                    line,
                                    format!(
                                        "macro {ident} expects {} argument(s), got {}",
                                        params.len(),
                                        args.len()
                                    ),
                                ));
                            }
                            let substituted = substitute_params(&mac.body, params, &args);
                            let expanded = self.expand(&substituted, line, depth + 1)?;
                            out.push_str(&expanded);
                        }
                    },
                    None => out.push_str(&ident),
                }
                continue;
            }
            out.push(c);
            i += 1;
        }
        Ok(out)
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}

/// Collect `(a, b, ...)` starting at the opening paren; returns the raw
/// argument texts and the index just past the closing paren.
fn collect_macro_args(
    chars: &[char],
    open: usize,
    path: &str,
    line: u32,
) -> Result<(Vec<String>, usize), CompileError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut nesting = 0usize;
    let mut i = open;
    loop {
        i += 1;
        if i >= chars.len() {
            return Err(CompileError::new(path, line, "unterminated macro arguments"));
        }
        match chars[i] {
            '(' => {
                nesting += 1;
                current.push('(');
            }
            ')' if nesting > 0 => {
                nesting -= 1;
                current.push(')');
            }
            ')' => {
                let trimmed = current.trim();
                if !trimmed.is_empty() || !args.is_empty() {
                    args.push(trimmed.to_string());
                }
                return Ok((args, i + 1));
            }
            ',' if nesting == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
}

fn substitute_params(body: &str, params: &[String], args: &[String]) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            match params.iter().position(|p| *p == ident) {
                Some(pos) => out.push_str(&args[pos]),
                None => out.push_str(&ident),
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

/// Replace `//` and `/* */` comments with spaces, preserving newlines so
/// line numbers survive.
fn strip_comments(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    let mut in_str = false;
    while i < chars.len() {
        let c = chars[i];
        if in_str {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_str = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_str = true;
                out.push(c);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() {
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        out.push('\n');
                    }
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pp(src: &str) -> Vec<SourceLine> {
        preprocess("/test/file", src, &mut NoIncludes).unwrap()
    }

    #[test]
    fn test_object_macro_expansion() {
        let lines = pp("#define MAX 10\nx = MAX;\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text.trim(), "x = 10;");
        assert_eq!(lines[0].line, 2);
    }

    #[test]
    fn test_function_macro_with_args() {
        let lines = pp("#define greet(X) say(\"hi\", X)\ngreet(who);\n");
        assert_eq!(lines[0].text.trim(), "say(\"hi\", who);");
    }

    #[test]
    fn test_macro_not_expanded_in_string() {
        let lines = pp("#define MAX 10\ns = \"MAX\";\n");
        assert_eq!(lines[0].text.trim(), "s = \"MAX\";");
    }

    #[test]
    fn test_ifdef_filters_inactive_branch() {
        let src = "#define DEBUG\n#ifdef DEBUG\na;\n#else\nb;\n#endif\n#ifndef DEBUG\nc;\n#endif\n";
        let lines = pp(src);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.trim()).collect();
        assert_eq!(texts, vec!["a;"]);
    }

    #[test]
    fn test_continuation_lines_join() {
        let lines = pp("#define TWO(A,B) A + \\\n  B\nx = TWO(1,2);\n");
        assert_eq!(lines[0].text.trim(), "x = 1 +   2;");
    }

    #[test]
    fn test_comments_removed_but_lines_kept() {
        let lines = pp("/* banner\n   more */\nx; // trailing\ny;\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line, 3);
        assert_eq!(lines[0].text.trim(), "x;");
        assert_eq!(lines[1].line, 4);
    }

    #[test]
    fn test_expansion_depth_is_bounded() {
        let err = preprocess("/t", "#define A B\n#define B A\nA;\n", &mut NoIncludes);
        assert!(err.is_err());
    }

    struct OneInclude;
    impl SourceLoader for OneInclude {
        fn read_include(&mut self, path: &str) -> Option<String> {
            (path == "/include/sys.h").then(|| "#define OK 1\n".to_string())
        }
    }

    #[test]
    fn test_include_resolves_under_include_root() {
        let lines = preprocess("/obj/t", "#include <sys.h>\nx = OK;\n", &mut OneInclude).unwrap();
        assert_eq!(lines[0].text.trim(), "x = 1;");
    }

    #[test]
    fn test_missing_include_is_an_error() {
        let err = preprocess("/obj/t", "#include <nope.h>\n", &mut OneInclude).unwrap_err();
        assert!(err.message.contains("/include/nope.h"));
        assert_eq!(err.line, 1);
    }
}
