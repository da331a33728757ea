use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

const RESERVED_WORDS: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "finally", "for",
    "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Scalar literal written inside `${ ... }`.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// Productions the parser emits; the caller decides what they build.
pub trait ParseHooks {
    type Output;

    fn variable(&mut self, name: &str) -> Self::Output;
    fn value(&mut self, literal: Literal) -> Self::Output;
    fn object_get(&mut self, object: Self::Output, path: Vec<Self::Output>) -> Self::Output;
    fn negation(&mut self, value: Self::Output) -> Self::Output;
    fn concatenation(&mut self, values: Vec<Self::Output>) -> Self::Output;
    fn method_call(
        &mut self,
        name: &str,
        argv: Self::Output,
        args: Vec<(String, Self::Output)>,
    ) -> Self::Output;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected end of input, expected {expected}.")]
    UnexpectedEnd { expected: &'static str },
    #[error("Unexpected \"{found}\" at offset {offset}, expected {expected}.")]
    Unexpected {
        found: char,
        offset: usize,
        expected: &'static str,
    },
    #[error("\"{name}\" is a reserved word (offset {offset}).")]
    ReservedWord { name: String, offset: usize },
    #[error("Unterminated string literal starting at offset {offset}.")]
    UnterminatedString { offset: usize },
    #[error("Invalid number literal \"{text}\" at offset {offset}.")]
    InvalidNumber { text: String, offset: usize },
    #[error("Method call at offset {offset} must have exactly one \"@\" key.")]
    InvalidMethodCall { offset: usize },
}

pub fn has_interpolation(text: &str) -> bool {
    text.contains("${")
}

/// Parses a string template such as `"Hello ${ name }!"`.
///
/// Text without any `${` marker is a single literal value; a template made
/// of exactly one expression yields that expression; anything else is a
/// concatenation of its text and expression parts.
pub fn parse<H: ParseHooks>(input: &str, hooks: &mut H) -> Result<H::Output, ParseError> {
    let mut parser = Parser {
        input,
        pos: 0,
        hooks,
    };
    parser.parse_template()
}

fn identifier_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[$A-Za-z_][$0-9A-Za-z_]*").expect("identifier regex must compile")
    })
}

fn number_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^-?\d+(?:\.\d+)?").expect("number regex must compile"))
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '$' || ch == '_'
}

struct Parser<'a, H> {
    input: &'a str,
    pos: usize,
    hooks: &'a mut H,
}

impl<'a, H: ParseHooks> Parser<'a, H> {
    fn parse_template(&mut self) -> Result<H::Output, ParseError> {
        let mut parts = Vec::new();
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            if self.rest().starts_with("${") {
                if !text.is_empty() {
                    let literal = Literal::String(std::mem::take(&mut text));
                    parts.push(self.hooks.value(literal));
                }
                self.pos += 2;
                let expression = self.parse_expression()?;
                self.skip_whitespace();
                self.expect('}', "\"}\" closing the expression")?;
                parts.push(expression);
            } else {
                text.push(ch);
                self.pos += ch.len_utf8();
            }
        }

        if !text.is_empty() {
            parts.push(self.hooks.value(Literal::String(text)));
        }

        match parts.len() {
            0 => Ok(self.hooks.value(Literal::String(String::new()))),
            1 => Ok(parts.remove(0)),
            _ => Ok(self.hooks.concatenation(parts)),
        }
    }

    fn parse_expression(&mut self) -> Result<H::Output, ParseError> {
        let condition = self.parse_unary()?;
        self.skip_whitespace();
        if !self.eat('?') {
            return Ok(condition);
        }

        let then_branch = self.parse_expression()?;
        self.skip_whitespace();
        self.expect(':', "\":\" in conditional expression")?;
        let else_branch = self.parse_expression()?;

        Ok(self.hooks.method_call(
            "if",
            condition,
            vec![
                ("then".to_string(), then_branch),
                ("else".to_string(), else_branch),
            ],
        ))
    }

    fn parse_unary(&mut self) -> Result<H::Output, ParseError> {
        self.skip_whitespace();
        if self.eat('!') {
            let operand = self.parse_unary()?;
            return Ok(self.hooks.negation(operand));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<H::Output, ParseError> {
        let object = self.parse_primary()?;
        let mut path = Vec::new();

        loop {
            self.skip_whitespace();
            if self.eat('.') {
                self.skip_whitespace();
                let offset = self.pos;
                let Some(name) = self.read_identifier() else {
                    return Err(self.unexpected(offset, "property name"));
                };
                path.push(self.hooks.value(Literal::String(name)));
            } else if self.eat('[') {
                let fragment = self.parse_expression()?;
                self.skip_whitespace();
                self.expect(']', "\"]\" closing the index")?;
                path.push(fragment);
            } else {
                break;
            }
        }

        if path.is_empty() {
            Ok(object)
        } else {
            Ok(self.hooks.object_get(object, path))
        }
    }

    fn parse_primary(&mut self) -> Result<H::Output, ParseError> {
        self.skip_whitespace();
        let offset = self.pos;
        let Some(ch) = self.peek() else {
            return Err(ParseError::UnexpectedEnd {
                expected: "expression",
            });
        };

        match ch {
            '(' => {
                self.pos += 1;
                let inner = self.parse_expression()?;
                self.skip_whitespace();
                self.expect(')', "\")\" closing the group")?;
                Ok(inner)
            }
            '\'' | '"' => {
                let text = self.read_string()?;
                Ok(self.hooks.value(Literal::String(text)))
            }
            '{' => self.parse_method_call(),
            '-' | '0'..='9' => {
                let number = self.read_number()?;
                Ok(self.hooks.value(Literal::Number(number)))
            }
            _ => {
                let Some(name) = self.read_identifier() else {
                    return Err(self.unexpected(offset, "expression"));
                };
                match name.as_str() {
                    "undefined" => Ok(self.hooks.value(Literal::Undefined)),
                    "null" => Ok(self.hooks.value(Literal::Null)),
                    "true" => Ok(self.hooks.value(Literal::Bool(true))),
                    "false" => Ok(self.hooks.value(Literal::Bool(false))),
                    reserved if RESERVED_WORDS.contains(&reserved) => {
                        Err(ParseError::ReservedWord { name, offset })
                    }
                    _ => Ok(self.hooks.variable(&name)),
                }
            }
        }
    }

    /// `{ @name: argv, key: value, ... }`
    fn parse_method_call(&mut self) -> Result<H::Output, ParseError> {
        let offset = self.pos;
        self.expect('{', "\"{\"")?;

        let mut method: Option<(String, H::Output)> = None;
        let mut args = Vec::new();

        loop {
            self.skip_whitespace();
            let key_offset = self.pos;
            let is_method = self.eat('@');
            let key = match self.peek() {
                Some('\'' | '"') if !is_method => self.read_string()?,
                _ => self
                    .read_identifier()
                    .ok_or_else(|| self.unexpected(key_offset, "object key"))?,
            };
            self.skip_whitespace();
            self.expect(':', "\":\" after object key")?;
            let value = self.parse_expression()?;

            if is_method {
                if method.is_some() {
                    return Err(ParseError::InvalidMethodCall { offset });
                }
                method = Some((key, value));
            } else {
                args.push((key, value));
            }

            self.skip_whitespace();
            if self.eat(',') {
                continue;
            }
            self.expect('}', "\"}\" closing the method call")?;
            break;
        }

        let Some((name, argv)) = method else {
            return Err(ParseError::InvalidMethodCall { offset });
        };
        Ok(self.hooks.method_call(&name, argv, args))
    }

    fn read_identifier(&mut self) -> Option<String> {
        let found = identifier_regex().find(self.rest())?;
        let name = found.as_str().to_string();
        self.pos += found.end();
        Some(name)
    }

    fn read_number(&mut self) -> Result<f64, ParseError> {
        let offset = self.pos;
        let Some(found) = number_regex().find(self.rest()) else {
            return Err(self.unexpected(offset, "number"));
        };
        let text = found.as_str().to_string();
        self.pos += found.end();

        if self.peek().is_some_and(is_identifier_char) {
            let tail = self.rest().chars().take_while(|ch| is_identifier_char(*ch));
            return Err(ParseError::InvalidNumber {
                text: format!("{}{}", text, tail.collect::<String>()),
                offset,
            });
        }

        text.parse::<f64>()
            .map_err(|_| ParseError::InvalidNumber { text, offset })
    }

    fn read_string(&mut self) -> Result<String, ParseError> {
        let offset = self.pos;
        let Some(quote) = self.peek() else {
            return Err(ParseError::UnexpectedEnd {
                expected: "string literal",
            });
        };
        self.pos += quote.len_utf8();

        let mut out = String::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(ParseError::UnterminatedString { offset });
            };
            self.pos += ch.len_utf8();
            match ch {
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err(ParseError::UnterminatedString { offset });
                    };
                    self.pos += escaped.len_utf8();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                ch if ch == quote => return Ok(out),
                ch => out.push(ch),
            }
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char, description: &'static str) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(self.pos, description))
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn unexpected(&self, offset: usize, expected: &'static str) -> ParseError {
        match self.input[offset..].chars().next() {
            Some(found) => ParseError::Unexpected {
                found,
                offset,
                expected,
            },
            None => ParseError::UnexpectedEnd { expected },
        }
    }
}
