//! Recursive descent parser producing [`ConfigNode`] trees

use std::path::Path;
use std::sync::Arc;

use super::lexer::{tokenize, Token, TokenKind};
use super::{ConfigNode, NodeValue};
use crate::error::{ReplayError, ReplayResult};

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    origin: Arc<Path>,
}

impl Parser {
    fn error(&self, line: usize, message: impl Into<String>) -> ReplayError {
        ReplayError::syntax(format!("{}:{}", self.origin.display(), line), message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map(|t| t.line).unwrap_or(1)
    }

    fn take_condition(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Condition(tag),
                ..
            }) => {
                let tag = tag.clone();
                self.pos += 1;
                Some(tag)
            }
            _ => None,
        }
    }

    /// Parse nodes until end of input, or until the closing brace when
    /// `opened_at` names the line of the opening brace.
    fn parse_nodes(&mut self, opened_at: Option<usize>) -> ReplayResult<Vec<ConfigNode>> {
        let mut nodes = Vec::new();

        loop {
            let Some(token) = self.next() else {
                return match opened_at {
                    Some(line) => Err(self.error(line, "block is never closed")),
                    None => Ok(nodes),
                };
            };

            let key = match token.kind {
                TokenKind::Text(key) => key,
                TokenKind::Close if opened_at.is_some() => return Ok(nodes),
                TokenKind::Close => return Err(self.error(token.line, "unexpected '}'")),
                TokenKind::Open => return Err(self.error(token.line, "block has no key")),
                TokenKind::Condition(_) => {
                    return Err(self.error(token.line, "condition tag has no key"))
                }
            };

            let leading = self.take_condition();

            let value = match self.next() {
                Some(Token {
                    kind: TokenKind::Text(value),
                    ..
                }) => NodeValue::Scalar(value),
                Some(Token {
                    kind: TokenKind::Open,
                    line,
                }) => NodeValue::Sequence(self.parse_nodes(Some(line))?),
                Some(other) => {
                    return Err(self.error(other.line, format!("key '{}' has no value", key)))
                }
                None => {
                    return Err(self.error(self.last_line(), format!("key '{}' has no value", key)))
                }
            };

            let trailing = self.take_condition();
            let condition = match (leading, trailing) {
                (Some(_), Some(_)) => {
                    return Err(self.error(token.line, format!("key '{}' has two condition tags", key)))
                }
                (leading, trailing) => leading.or(trailing),
            };

            nodes.push(ConfigNode {
                key,
                value,
                condition,
                line: token.line,
                origin: Arc::clone(&self.origin),
            });
        }
    }
}

/// Parse a whole document
pub fn parse_document(source: &str, origin: &Path) -> ReplayResult<Vec<ConfigNode>> {
    let mut parser = Parser {
        tokens: tokenize(source, origin)?,
        pos: 0,
        origin: Arc::from(origin),
    };
    parser.parse_nodes(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ReplayResult<Vec<ConfigNode>> {
        parse_document(source, Path::new("test.txt"))
    }

    #[test]
    fn test_scalar_and_nested_nodes() {
        let nodes = parse(
            r#"
            $cmd "-crf 28"
            "final.mp4"
            {
                "00:10" "00:20"
                "other.mkv" { "1" "2" }
            }
            "#,
        )
        .unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].key, "$cmd");
        assert_eq!(nodes[0].value, NodeValue::Scalar("-crf 28".into()));
        let children = nodes[1].as_sequence().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].as_sequence().unwrap()[0].key, "1");
        assert_eq!(nodes[1].line, 3);
    }

    #[test]
    fn test_duplicate_keys_keep_order() {
        let nodes = parse(r#"$cmd "a" $cmd "b" $cmd "c""#).unwrap();
        let values: Vec<&str> = nodes.iter().map(|n| n.as_scalar().unwrap()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_condition_positions() {
        let nodes = parse(
            r#"
            "a" [$RAW$] { }
            "b" { } [!$RAW$]
            "c" "d" [$RAW$]
            "#,
        )
        .unwrap();
        let tags: Vec<Option<&str>> = nodes.iter().map(|n| n.condition.as_deref()).collect();
        assert_eq!(tags, vec![Some("$RAW$"), Some("!$RAW$"), Some("$RAW$")]);
    }

    #[test]
    fn test_two_conditions_rejected() {
        assert!(parse(r#""a" [$RAW$] { } [!$RAW$]"#).is_err());
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(matches!(parse(r#""a" {"#), Err(ReplayError::Syntax { .. })));
        assert!(matches!(parse("}"), Err(ReplayError::Syntax { .. })));
        assert!(matches!(parse(r#""lonely""#), Err(ReplayError::Syntax { .. })));
    }
}
