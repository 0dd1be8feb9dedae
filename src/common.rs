use std::{fmt, rc::Rc};

/// A named piece of source text. Shared by every span cut from it.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub text: String,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Rc<Self> {
        Rc::new(Source {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Returns line `index` (0-based) without its terminating newline.
    pub fn line(&self, index: usize) -> &str {
        self.text.split('\n').nth(index).unwrap_or("")
    }
}

/// A scan location. `offset` counts chars, `line` and `column` are 0-based.
///
/// Positions are plain `Copy` values: the lexer advances its own cursor and
/// hands out snapshots, so nothing ever holds a live reference to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn advance(&mut self, current: Option<char>) {
        self.offset += 1;
        self.column += 1;

        if current == Some('\n') {
            self.line += 1;
            self.column = 0;
        }
    }

    pub fn snapshot(&self) -> Position {
        *self
    }

    /// The position one character further along the same line.
    pub fn next(&self) -> Position {
        Position {
            offset: self.offset + 1,
            line: self.line,
            column: self.column + 1,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    pub source: Rc<Source>,
}

impl Span {
    pub fn new(source: &Rc<Source>, start: Position, end: Position) -> Self {
        Span {
            start,
            end,
            source: Rc::clone(source),
        }
    }

    /// A span covering `self` through the end of `other`.
    pub fn to(&self, other: &Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
            source: Rc::clone(&self.source),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.source.name
    }

    /// 1-based line of the span start, as shown to users.
    pub fn line_number(&self) -> usize {
        self.start.line + 1
    }

    /// The raw source text covered by the span.
    pub fn lexeme(&self) -> String {
        self.source
            .text
            .chars()
            .skip(self.start.offset)
            .take(self.end.offset.saturating_sub(self.start.offset))
            .collect()
    }

    /// Renders the lines touched by the span with a caret underline below
    /// the covered columns.
    pub fn excerpt(&self) -> String {
        let mut result = String::new();
        let last_line = self.end.line.max(self.start.line);

        for line_index in self.start.line..=last_line {
            let line = self.source.line(line_index).replace('\t', "");
            let width = line.chars().count();

            let from = if line_index == self.start.line {
                self.start.column
            } else {
                0
            };
            let to = if line_index == last_line {
                self.end.column
            } else {
                width
            };
            let carets = to.saturating_sub(from).max(1);

            result.push_str(&line);
            result.push('\n');
            result.push_str(&" ".repeat(from));
            result.push_str(&"^".repeat(carets));
            if line_index != last_line {
                result.push('\n');
            }
        }

        result
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}..{}:{}",
            self.source.name,
            self.start.line + 1,
            self.start.column,
            self.end.line + 1,
            self.end.column
        )
    }
}
