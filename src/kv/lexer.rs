//! Tokenizer for build config documents

use std::path::Path;

use crate::error::{ReplayError, ReplayResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Quoted or bare word
    Text(String),
    Open,
    Close,
    /// Contents of a `[...]` condition tag
    Condition(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '{' | '}' | '[' | ']' | '"')
}

/// Split `source` into tokens, dropping `//` and `/* */` comments.
///
/// Inside quotes only `\"` and `\\` are escapes, so Windows paths survive
/// untouched.
pub fn tokenize(source: &str, origin: &Path) -> ReplayResult<Vec<Token>> {
    let error = |line: usize, message: &str| {
        ReplayError::syntax(format!("{}:{}", origin.display(), line), message)
    };

    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::Open, line });
            }
            '}' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::Close, line });
            }
            ']' => return Err(error(line, "unexpected ']'")),
            '[' => {
                chars.next();
                let start = line;
                let mut tag = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some('\n') | None => return Err(error(start, "unterminated condition tag")),
                        Some(c) => tag.push(c),
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Condition(tag.trim().to_string()),
                    line: start,
                });
            }
            '"' => {
                chars.next();
                let start = line;
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek() {
                            Some('"') | Some('\\') => {
                                if let Some(escaped) = chars.next() {
                                    text.push(escaped);
                                }
                            }
                            _ => text.push('\\'),
                        },
                        Some('\n') => {
                            line += 1;
                            text.push('\n');
                        }
                        Some(c) => text.push(c),
                        None => return Err(error(start, "unterminated string")),
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Text(text),
                    line: start,
                });
            }
            '/' => {
                chars.next();
                match chars.peek() {
                    Some('/') => {
                        while let Some(&c) = chars.peek() {
                            if c == '\n' {
                                break;
                            }
                            chars.next();
                        }
                    }
                    Some('*') => {
                        chars.next();
                        let start = line;
                        let mut previous = '\0';
                        loop {
                            match chars.next() {
                                Some('/') if previous == '*' => break,
                                Some(c) => {
                                    if c == '\n' {
                                        line += 1;
                                    }
                                    previous = c;
                                }
                                None => return Err(error(start, "unterminated block comment")),
                            }
                        }
                    }
                    _ => {
                        let mut word = String::from('/');
                        while let Some(&c) = chars.peek() {
                            if !is_word_char(c) {
                                break;
                            }
                            word.push(c);
                            chars.next();
                        }
                        tokens.push(Token {
                            kind: TokenKind::Text(word),
                            line,
                        });
                    }
                }
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Text(word),
                    line,
                });
            }
        }
    }

    Ok(tokens)
}
