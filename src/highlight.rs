// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Line tokenizer shared by the terminal view and the video frames
//!
//! Approximate and language-agnostic: it knows the common keywords of the C-family and
//! scripting languages, strings, numbers, comments, and shell commands written inside
//! comments. The tokens of a line always concatenate back to the line.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{anychar, char, digit1, one_of, satisfy},
    combinator::{map, opt, recognize, rest},
};

const DECLARATION_KEYWORDS: &[&str] = &[
    "const", "let", "var", "function", "class", "interface", "type", "enum", "def", "fn",
    "export", "default", "true", "false", "null", "undefined",
];
const CONTROL_FLOW_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "break", "continue", "return", "try",
    "catch", "finally", "throw", "yield", "await", "async", "elif", "in", "of",
];
const OBJECT_KEYWORDS: &[&str] = &[
    "extends", "implements", "new", "this", "super", "private", "public", "protected",
    "static", "readonly", "abstract", "self",
];
const FRAMEWORKS: &[&str] = &[
    "react", "vue", "angular", "svelte", "nextjs", "nuxt", "gatsby", "express", "nestjs",
    "django", "flask", "spring", "laravel", "symfony", "rails", "flutter", "electron",
];
const TERMINAL_COMMANDS: &[&str] = &[
    "npm", "npx", "yarn", "pnpm", "node", "git", "docker", "docker-compose", "kubectl", "python",
    "pip", "go", "rustc", "cargo", "php", "composer", "dotnet", "flutter", "dart", "javac",
    "java", "scala", "sbt", "mvn", "gradle", "ng", "vue", "webpack", "babel", "tsc", "eslint",
    "prettier", "vite", "nuxt", "next", "nodemon",
];
const SHELL_COMMANDS: &[&str] = &[
    "cd", "ls", "dir", "mkdir", "touch", "rm", "cp", "mv", "cat", "echo", "find", "grep",
    "chmod", "chown", "sudo", "ssh", "curl", "wget", "tar", "zip", "unzip", "ps", "kill", "pwd",
    "env", "export", "xargs", "wc",
];
const BUILD_TOOLS: &[&str] = &[
    "make", "cmake", "ninja", "bazel", "grunt", "gulp", "rollup", "parcel", "esbuild", "swc",
];
const PACKAGE_MANAGERS: &[&str] = &[
    "gem", "brew", "apt", "apt-get", "yum", "dnf", "pacman", "chocolatey", "scoop", "winget",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Plain,
    Punctuation,
    Keyword,
    ControlFlow,
    ObjectKeyword,
    ImportKeyword,
    ModuleName,
    String,
    Number,
    Comment,
    FunctionName,
    Variable,
    Framework,
    TerminalCommand,
    ShellCommand,
    BuildTool,
    PackageManager,
    Flag,
    EnvVar,
    Path,
}

impl TokenClass {
    /// Dark theme colour. Both the terminal and the frame renderer use this palette.
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            TokenClass::Plain | TokenClass::Punctuation => [0xd4, 0xd4, 0xd4],
            TokenClass::Keyword | TokenClass::ObjectKeyword => [0x56, 0x9c, 0xd6],
            TokenClass::ControlFlow | TokenClass::ImportKeyword => [0xc5, 0x86, 0xc0],
            TokenClass::ModuleName | TokenClass::String | TokenClass::Path => [0xce, 0x91, 0x78],
            TokenClass::Number => [0xb5, 0xce, 0xa8],
            TokenClass::Comment => [0x6a, 0x99, 0x55],
            TokenClass::FunctionName | TokenClass::TerminalCommand => [0xdc, 0xdc, 0xaa],
            TokenClass::Variable | TokenClass::Flag => [0x9c, 0xdc, 0xfe],
            TokenClass::Framework => [0x4e, 0xc9, 0xb0],
            TokenClass::ShellCommand | TokenClass::EnvVar => [0x4f, 0xc1, 0xff],
            TokenClass::BuildTool => [0xd7, 0xba, 0x7d],
            TokenClass::PackageManager => [0xc5, 0x86, 0xc0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub class: TokenClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Space,
    Comment,
    Str,
    Number,
    Word,
    Punct,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    let (_, quote) = one_of("\"'`")(input)?;
    let mut escaped = false;
    for (i, c) in input.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            let end = i + c.len_utf8();
            return Ok((&input[end..], &input[..end]));
        }
    }
    // Unterminated: the string runs to the end of the line
    Ok(("", input))
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize((digit1, opt((char('.'), digit1)))).parse(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize((satisfy(is_ident_start), take_while(is_ident_char))).parse(input)
}

fn lexeme(input: &str) -> IResult<&str, (Lexeme, &str)> {
    alt((
        map(take_while1(char::is_whitespace), |s| (Lexeme::Space, s)),
        map(recognize((tag("//"), rest)), |s| (Lexeme::Comment, s)),
        map(string_literal, |s| (Lexeme::Str, s)),
        map(number, |s| (Lexeme::Number, s)),
        map(identifier, |s| (Lexeme::Word, s)),
        map(recognize(anychar), |s| (Lexeme::Punct, s)),
    ))
    .parse(input)
}

fn comment_chunk(input: &str) -> IResult<&str, &str> {
    alt((
        take_while1(char::is_whitespace),
        take_while1(|c: char| !c.is_whitespace()),
    ))
    .parse(input)
}

/// Split one line (no trailing newline) into classified tokens.
pub fn tokenize_line(line: &str) -> Vec<Token<'_>> {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];

    let mut tokens = Vec::new();
    if !indent.is_empty() {
        tokens.push(Token {
            text: indent,
            class: TokenClass::Plain,
        });
    }

    if trimmed.starts_with("//") || trimmed.starts_with('#') {
        tokenize_comment(trimmed, &mut tokens);
    } else {
        tokenize_code(trimmed, &mut tokens);
    }
    tokens
}

fn tokenize_code<'a>(code: &'a str, tokens: &mut Vec<Token<'a>>) {
    let import_line = code.starts_with("import ")
        || code.starts_with("from ")
        || (code.starts_with("export ") && code.contains(" from "));

    let mut lexemes = Vec::new();
    let mut input = code;
    while !input.is_empty() {
        match lexeme(input) {
            Ok((remaining, lex)) => {
                lexemes.push(lex);
                input = remaining;
            }
            Err(_) => {
                lexemes.push((Lexeme::Punct, input));
                break;
            }
        }
    }

    let significant = |i: usize, backwards: bool| -> Option<(Lexeme, &'a str)> {
        if backwards {
            lexemes[..i]
                .iter()
                .rev()
                .find(|(kind, _)| *kind != Lexeme::Space)
                .copied()
        } else {
            lexemes[i + 1..]
                .iter()
                .find(|(kind, _)| *kind != Lexeme::Space)
                .copied()
        }
    };

    for (i, &(kind, text)) in lexemes.iter().enumerate() {
        let class = match kind {
            Lexeme::Space => TokenClass::Plain,
            Lexeme::Comment => TokenClass::Comment,
            Lexeme::Number => TokenClass::Number,
            Lexeme::Punct => TokenClass::Punctuation,
            Lexeme::Str => {
                let prev = significant(i, true);
                let before_prev = prev.and_then(|_| {
                    let prev_index = lexemes[..i]
                        .iter()
                        .rposition(|(kind, _)| *kind != Lexeme::Space)?;
                    significant(prev_index, true)
                });
                let is_require_arg =
                    prev.map(|(_, t)| t) == Some("(") && before_prev.map(|(_, t)| t) == Some("require");
                if import_line || prev.map(|(_, t)| t) == Some("from") || is_require_arg {
                    TokenClass::ModuleName
                } else {
                    TokenClass::String
                }
            }
            Lexeme::Word => classify_word(
                text,
                significant(i, true).map(|(_, t)| t),
                significant(i, false).map(|(_, t)| t),
                import_line,
            ),
        };
        tokens.push(Token { text, class });
    }
}

fn classify_word(word: &str, prev: Option<&str>, next: Option<&str>, import_line: bool) -> TokenClass {
    if word == "require" || (import_line && matches!(word, "import" | "from" | "as")) {
        return TokenClass::ImportKeyword;
    }
    if DECLARATION_KEYWORDS.contains(&word) {
        return TokenClass::Keyword;
    }
    if CONTROL_FLOW_KEYWORDS.contains(&word) {
        return TokenClass::ControlFlow;
    }
    if OBJECT_KEYWORDS.contains(&word) {
        return TokenClass::ObjectKeyword;
    }
    if matches!(prev, Some("function" | "def" | "fn")) || next == Some("(") {
        return TokenClass::FunctionName;
    }
    if FRAMEWORKS.contains(&word.to_ascii_lowercase().as_str()) {
        return TokenClass::Framework;
    }
    TokenClass::Variable
}

fn tokenize_comment<'a>(comment: &'a str, tokens: &mut Vec<Token<'a>>) {
    let marker_len = if comment.starts_with("//") { 2 } else { 1 };
    tokens.push(Token {
        text: &comment[..marker_len],
        class: TokenClass::Comment,
    });

    let mut input = &comment[marker_len..];
    while let Ok((remaining, chunk)) = comment_chunk(input) {
        let class = if chunk.starts_with(char::is_whitespace) {
            TokenClass::Comment
        } else {
            classify_comment_word(chunk)
        };
        tokens.push(Token { text: chunk, class });
        input = remaining;
    }
}

fn classify_comment_word(word: &str) -> TokenClass {
    let bare = word.trim_end_matches([',', ';', ':', ')']);
    if TERMINAL_COMMANDS.contains(&bare) {
        TokenClass::TerminalCommand
    } else if SHELL_COMMANDS.contains(&bare) {
        TokenClass::ShellCommand
    } else if BUILD_TOOLS.contains(&bare) {
        TokenClass::BuildTool
    } else if PACKAGE_MANAGERS.contains(&bare) {
        TokenClass::PackageManager
    } else if is_flag(bare) {
        TokenClass::Flag
    } else if is_env_var(bare) {
        TokenClass::EnvVar
    } else if is_path(bare) {
        TokenClass::Path
    } else {
        TokenClass::Comment
    }
}

fn is_flag(word: &str) -> bool {
    let body = word.trim_start_matches('-');
    let dashes = word.len() - body.len();
    (1..=2).contains(&dashes)
        && !body.is_empty()
        && body.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_env_var(word: &str) -> bool {
    if let Some(name) = word.strip_prefix('$') {
        return name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '{' || c == '_');
    }
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    }
}

fn is_path(word: &str) -> bool {
    word.starts_with("./")
        || word.starts_with("../")
        || word.starts_with("~/")
        || (word.starts_with('/') && word.len() > 1 && !word.starts_with("//"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(line: &str) -> Vec<(&str, TokenClass)> {
        tokenize_line(line)
            .into_iter()
            .filter(|t| !t.text.trim().is_empty())
            .map(|t| (t.text, t.class))
            .collect()
    }

    fn rejoin(line: &str) -> String {
        tokenize_line(line).iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_tokens_rejoin_to_line() {
        for line in [
            "",
            "    const x = 'a\\'b' + 42.5; // trailing",
            "import { Component } from '@angular/core';",
            "// npm install react --save-dev",
            "  # pip install -r requirements.txt",
            "<div className=\"user\">{user.name}</div>",
            "const s = \"unterminated",
            "λ → ünïcode",
        ] {
            assert_eq!(rejoin(line), line);
        }
    }

    #[test]
    fn test_keywords_strings_numbers() {
        assert_eq!(
            classes("const total = 'sum' + 42;"),
            vec![
                ("const", TokenClass::Keyword),
                ("total", TokenClass::Variable),
                ("=", TokenClass::Punctuation),
                ("'sum'", TokenClass::String),
                ("+", TokenClass::Punctuation),
                ("42", TokenClass::Number),
                (";", TokenClass::Punctuation),
            ]
        );
    }

    #[test]
    fn test_control_flow_and_function_names() {
        let tokens = classes("function twoSum(nums) { return helper(nums); }");
        assert!(tokens.contains(&("function", TokenClass::Keyword)));
        assert!(tokens.contains(&("twoSum", TokenClass::FunctionName)));
        assert!(tokens.contains(&("return", TokenClass::ControlFlow)));
        assert!(tokens.contains(&("helper", TokenClass::FunctionName)));
        assert!(tokens.contains(&("nums", TokenClass::Variable)));
    }

    #[test]
    fn test_import_line() {
        let tokens = classes("import React, { useState } from 'react';");
        assert_eq!(tokens[0], ("import", TokenClass::ImportKeyword));
        assert!(tokens.contains(&("from", TokenClass::ImportKeyword)));
        assert!(tokens.contains(&("'react'", TokenClass::ModuleName)));
        assert!(tokens.contains(&("React", TokenClass::Framework)));
    }

    #[test]
    fn test_require_module_name() {
        let tokens = classes("const express = require('express');");
        assert!(tokens.contains(&("require", TokenClass::ImportKeyword)));
        assert!(tokens.contains(&("'express'", TokenClass::ModuleName)));
    }

    #[test]
    fn test_comment_line_with_shell_commands() {
        let tokens = classes("// cd ./project && npm ci --save-dev $HOME NODE_ENV=production make");
        assert_eq!(tokens[0], ("//", TokenClass::Comment));
        assert!(tokens.contains(&("cd", TokenClass::ShellCommand)));
        assert!(tokens.contains(&("./project", TokenClass::Path)));
        assert!(tokens.contains(&("npm", TokenClass::TerminalCommand)));
        assert!(tokens.contains(&("ci", TokenClass::Comment)));
        assert!(tokens.contains(&("--save-dev", TokenClass::Flag)));
        assert!(tokens.contains(&("$HOME", TokenClass::EnvVar)));
        assert!(tokens.contains(&("NODE_ENV=production", TokenClass::EnvVar)));
        assert!(tokens.contains(&("make", TokenClass::BuildTool)));
    }

    #[test]
    fn test_hash_comment() {
        let tokens = classes("# brew install ffmpeg");
        assert_eq!(tokens[0], ("#", TokenClass::Comment));
        assert!(tokens.contains(&("brew", TokenClass::PackageManager)));
        assert!(tokens.contains(&("ffmpeg", TokenClass::Comment)));
    }

    #[test]
    fn test_trailing_comment_is_one_token() {
        let tokens = classes("x = 1; // npm here");
        assert_eq!(tokens.last(), Some(&("// npm here", TokenClass::Comment)));
    }

    #[test]
    fn test_same_token_same_class_every_time() {
        let a = tokenize_line("let value = compute(1);");
        let b = tokenize_line("let value = compute(1);");
        assert_eq!(a, b);
    }

    #[test]
    fn test_palette_is_stable() {
        assert_eq!(TokenClass::String.rgb(), [0xce, 0x91, 0x78]);
        assert_eq!(TokenClass::Comment.rgb(), [0x6a, 0x99, 0x55]);
    }
}
