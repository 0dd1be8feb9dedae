use std::rc::Rc;

use crate::{
    common::{Position, Source, Span},
    error::LexError,
    token::{Keyword, Literal, Token, TokenKind},
};

#[derive(Debug, Clone)]
pub struct Lexer {
    source: Rc<Source>,
    chars: Vec<char>,
    position: Position,
}

impl Lexer {
    pub fn new(source: &Rc<Source>) -> Self {
        Lexer {
            source: Rc::clone(source),
            chars: source.text.chars().collect(),
            position: Position::default(),
        }
    }

    fn at_end(&self) -> bool {
        self.position.offset >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position.offset).copied()
    }

    fn advance(&mut self) {
        let current = self.peek();
        self.position.advance(current);
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(&self.source, start, self.position.snapshot())
    }

    fn create_token(&self, kind: TokenKind, value: Option<Literal>, start: Position) -> Token {
        Token::spanning(kind, value, &self.source, start, self.position.snapshot())
    }

    /// Consumes `second` if it comes next, choosing between the one- and
    /// two-character form of an operator whose first character is consumed.
    fn either(&mut self, second: char, double: TokenKind, single: TokenKind, start: Position) -> Token {
        if self.peek() == Some(second) {
            self.advance();
            self.create_token(double, None, start)
        } else {
            self.create_token(single, None, start)
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            self.advance();
            if c == '\n' {
                break;
            }
        }
    }

    fn lex_not_equal(&mut self, start: Position) -> Result<Token, LexError> {
        if self.peek() == Some('=') {
            self.advance();
            return Ok(self.create_token(TokenKind::BangEqual, None, start));
        }

        let end = if self.at_end() {
            self.position.snapshot()
        } else {
            self.position.next()
        };
        Err(LexError::ExpectedCharacter {
            details: "'=' (after '!')".into(),
            span: Span::new(&self.source, start, end),
        })
    }

    fn lex_string(&mut self, start: Position) -> Result<Token, LexError> {
        let mut text = String::new();

        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => {
                    return Err(LexError::ExpectedCharacter {
                        details: "'\"' to close string literal".into(),
                        span: self.span_from(start),
                    })
                }
            };
            self.advance();

            match c {
                '"' => break,
                '\\' => {
                    let escaped = match self.peek() {
                        Some(escaped) => escaped,
                        None => continue,
                    };
                    self.advance();

                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                _ => text.push(c),
            }
        }

        Ok(self.create_token(TokenKind::String, Some(Literal::Str(text)), start))
    }

    fn lex_number(&mut self, start: Position) -> Token {
        let mut text = String::new();
        let mut seen_dot = false;

        while let Some(c) = self.peek() {
            if c == '.' {
                if seen_dot {
                    break;
                }
                seen_dot = true;
            } else if !c.is_ascii_digit() {
                break;
            }

            text.push(c);
            self.advance();
        }

        // Digits with at most one dot always parse as a float.
        let float = text.parse::<f64>().unwrap_or_default();
        match text.parse::<i64>() {
            Ok(int) if !seen_dot => {
                self.create_token(TokenKind::Int, Some(Literal::Int(int)), start)
            }
            _ => self.create_token(TokenKind::Float, Some(Literal::Float(float)), start),
        }
    }

    fn lex_ident(&mut self, start: Position) -> Token {
        let mut text = String::new();

        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            text.push(c);
            self.advance();
        }

        match Keyword::from_keyword_str(&text) {
            Some(keyword) => self.create_token(TokenKind::Keyword(keyword), None, start),
            None => self.create_token(TokenKind::Identifier, Some(Literal::Name(text)), start),
        }
    }

    pub fn lex(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            let start = self.position.snapshot();

            let single = match c {
                '+' => Some(TokenKind::Plus),
                '*' => Some(TokenKind::Star),
                '/' => Some(TokenKind::Slash),
                '^' => Some(TokenKind::Caret),
                '(' => Some(TokenKind::LeftParen),
                ')' => Some(TokenKind::RightParen),
                '[' => Some(TokenKind::LeftBracket),
                ']' => Some(TokenKind::RightBracket),
                ',' => Some(TokenKind::Comma),
                ';' | '\n' => Some(TokenKind::Newline),
                _ => None,
            };
            if let Some(kind) = single {
                tokens.push(Token::at(kind, &self.source, start));
                self.advance();
                continue;
            }

            match c {
                ' ' | '\t' | '\r' => self.advance(),
                '#' => self.skip_comment(),
                '"' => {
                    self.advance();
                    tokens.push(self.lex_string(start)?);
                }
                '=' => {
                    self.advance();
                    tokens.push(self.either('=', TokenKind::EqualEqual, TokenKind::Equal, start));
                }
                '<' => {
                    self.advance();
                    tokens.push(self.either('=', TokenKind::LesserEqual, TokenKind::Lesser, start));
                }
                '>' => {
                    self.advance();
                    tokens.push(self.either(
                        '=',
                        TokenKind::GreaterEqual,
                        TokenKind::Greater,
                        start,
                    ));
                }
                '-' => {
                    self.advance();
                    tokens.push(self.either('>', TokenKind::Arrow, TokenKind::Minus, start));
                }
                '!' => {
                    self.advance();
                    tokens.push(self.lex_not_equal(start)?);
                }
                _ if c.is_ascii_digit() => tokens.push(self.lex_number(start)),
                _ if c.is_ascii_alphabetic() => tokens.push(self.lex_ident(start)),
                _ => {
                    return Err(LexError::IllegalCharacter {
                        details: format!("'{}'", c),
                        span: Span::new(&self.source, start, start.next()),
                    })
                }
            }
        }

        tokens.push(Token::at(TokenKind::Eof, &self.source, self.position.snapshot()));

        Ok(tokens)
    }
}

pub fn scan(source: &Rc<Source>) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).lex()
}
