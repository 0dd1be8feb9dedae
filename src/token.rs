use std::{fmt, rc::Rc};

use crate::common::{Position, Source, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Var,
    And,
    Or,
    Not,
    If,
    Elif,
    Else,
    For,
    To,
    Step,
    While,
    Fun,
    Then,
    End,
    Return,
    Continue,
    Break,
}

impl Keyword {
    pub fn from_keyword_str(name: &str) -> Option<Keyword> {
        match name {
            "VAR" => Some(Keyword::Var),
            "AND" => Some(Keyword::And),
            "OR" => Some(Keyword::Or),
            "NOT" => Some(Keyword::Not),
            "IF" => Some(Keyword::If),
            "ELIF" => Some(Keyword::Elif),
            "ELSE" => Some(Keyword::Else),
            "FOR" => Some(Keyword::For),
            "TO" => Some(Keyword::To),
            "STEP" => Some(Keyword::Step),
            "WHILE" => Some(Keyword::While),
            "FUN" => Some(Keyword::Fun),
            "THEN" => Some(Keyword::Then),
            "END" => Some(Keyword::End),
            "RETURN" => Some(Keyword::Return),
            "CONTINUE" => Some(Keyword::Continue),
            "BREAK" => Some(Keyword::Break),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Var => "VAR",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Not => "NOT",
            Keyword::If => "IF",
            Keyword::Elif => "ELIF",
            Keyword::Else => "ELSE",
            Keyword::For => "FOR",
            Keyword::To => "TO",
            Keyword::Step => "STEP",
            Keyword::While => "WHILE",
            Keyword::Fun => "FUN",
            Keyword::Then => "THEN",
            Keyword::End => "END",
            Keyword::Return => "RETURN",
            Keyword::Continue => "CONTINUE",
            Keyword::Break => "BREAK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Int,
    Float,
    String,
    Identifier,
    Keyword(Keyword),

    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Equal,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    EqualEqual,
    BangEqual,
    Lesser,
    Greater,
    LesserEqual,
    GreaterEqual,
    Comma,
    Arrow,

    Newline,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Int => "INT",
            TokenKind::Float => "FLOAT",
            TokenKind::String => "STRING",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Keyword(keyword) => keyword.as_str(),
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Caret => "^",
            TokenKind::Equal => "=",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Lesser => "<",
            TokenKind::Greater => ">",
            TokenKind::LesserEqual => "<=",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Comma => ",",
            TokenKind::Arrow => "->",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Eof => "EOF",
        };
        f.write_str(text)
    }
}

/// Payload carried by literal and name tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Option<Literal>,
    pub span: Span,
}

impl Token {
    /// A one-character token starting at `start`.
    pub fn at(kind: TokenKind, source: &Rc<Source>, start: Position) -> Self {
        Token {
            kind,
            value: None,
            span: Span::new(source, start, start.next()),
        }
    }

    pub fn spanning(
        kind: TokenKind,
        value: Option<Literal>,
        source: &Rc<Source>,
        start: Position,
        end: Position,
    ) -> Self {
        Token {
            kind,
            value,
            span: Span::new(source, start, end),
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    /// The identifier text, for `Identifier` tokens.
    pub fn name(&self) -> Option<&str> {
        match &self.value {
            Some(Literal::Name(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(Literal::Int(value)) => write!(f, "{}:{}", self.kind, value),
            Some(Literal::Float(value)) => write!(f, "{}:{}", self.kind, value),
            Some(Literal::Str(value)) => write!(f, "{}:{:?}", self.kind, value),
            Some(Literal::Name(value)) => write!(f, "{}:{}", self.kind, value),
            None => write!(f, "{}", self.kind),
        }
    }
}
