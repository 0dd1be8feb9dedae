use std::rc::Rc;

use thiserror::Error;

use crate::{common::Span, context::Context};

/// Identical traceback lines shown before the rest of a run is collapsed.
const REPEATED_FRAME_LIMIT: usize = 3;

#[derive(Debug, Clone, Error)]
pub enum LexError {
    #[error("Illegal Character: {details}")]
    IllegalCharacter { details: String, span: Span },

    #[error("Expected Character: {details}")]
    ExpectedCharacter { details: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> &Span {
        match self {
            LexError::IllegalCharacter { span, .. } | LexError::ExpectedCharacter { span, .. } => {
                span
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid Syntax: {details}")]
pub struct SyntaxError {
    pub details: String,
    /// The token descriptions that would have been accepted at `span`.
    pub expected: Vec<&'static str>,
    pub span: Span,
}

impl SyntaxError {
    pub fn expected(expected: &[&'static str], span: &Span) -> Self {
        SyntaxError {
            details: format!("Expected {}", describe_alternatives(expected)),
            expected: expected.to_vec(),
            span: span.clone(),
        }
    }
}

fn describe_alternatives(expected: &[&'static str]) -> String {
    match expected {
        [] => "something else".to_string(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

#[derive(Debug, Clone, Error)]
#[error("Runtime Error: {details}")]
pub struct RuntimeError {
    pub details: String,
    pub span: Span,
    pub context: Rc<Context>,
}

impl RuntimeError {
    pub fn new(details: impl Into<String>, span: Span, context: &Rc<Context>) -> Self {
        RuntimeError {
            details: details.into(),
            span,
            context: Rc::clone(context),
        }
    }
}

/// Raised when nested calls exceed the configured depth.
#[derive(Debug, Clone, Error)]
#[error("Recursion Error: {details}")]
pub struct RecursionError {
    pub details: String,
    pub span: Span,
    pub context: Rc<Context>,
}

impl RecursionError {
    pub fn new(limit: usize, span: Span, context: &Rc<Context>) -> Self {
        RecursionError {
            details: format!("maximum call depth of {} exceeded", limit),
            span,
            context: Rc::clone(context),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Recursion(#[from] RecursionError),
}

impl Error {
    pub fn span(&self) -> &Span {
        match self {
            Error::Lex(error) => error.span(),
            Error::Syntax(error) => &error.span,
            Error::Runtime(error) => &error.span,
            Error::Recursion(error) => &error.span,
        }
    }

    /// The full diagnostic: a traceback for errors raised while evaluating,
    /// the offending file and line otherwise, then the underlined excerpt.
    pub fn render(&self) -> String {
        let span = self.span();

        match self {
            Error::Runtime(RuntimeError { context, .. })
            | Error::Recursion(RecursionError { context, .. }) => format!(
                "{}{}\n\n{}",
                traceback(span, context),
                self,
                span.excerpt()
            ),
            Error::Lex(_) | Error::Syntax(_) => format!(
                "{}\nFile {}, line {}\n\n{}",
                self,
                span.file_name(),
                span.line_number(),
                span.excerpt()
            ),
        }
    }
}

fn traceback(span: &Span, context: &Context) -> String {
    let lines = context
        .frames(span)
        .into_iter()
        .rev()
        .map(|(site, name)| {
            format!(
                "  File {}, line {}, in {}\n",
                site.file_name(),
                site.line_number(),
                name
            )
        })
        .collect::<Vec<_>>();

    let mut result = String::from("Traceback (most recent call last):\n");
    let mut index = 0;

    while index < lines.len() {
        let run = lines[index..]
            .iter()
            .take_while(|line| **line == lines[index])
            .count();

        for line in lines[index..index + run.min(REPEATED_FRAME_LIMIT)].iter() {
            result.push_str(line);
        }
        if run > REPEATED_FRAME_LIMIT {
            result.push_str(&format!(
                "  [Previous line repeated {} more times]\n",
                run - REPEATED_FRAME_LIMIT
            ));
        }

        index += run;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::{Position, Source},
        context::{Context, Scope},
    };
    use pretty_assertions::assert_eq;

    fn span_at(source: &Rc<Source>, line: usize, column: usize, width: usize) -> Span {
        let offset = source
            .text
            .split('\n')
            .take(line)
            .map(|text| text.chars().count() + 1)
            .sum::<usize>()
            + column;

        Span::new(
            source,
            Position {
                offset,
                line,
                column,
            },
            Position {
                offset: offset + width,
                line,
                column: column + width,
            },
        )
    }

    #[test]
    fn static_error_names_file_and_line() {
        let source = Source::new("demo.bas", "VAR a = 1\nVAR b = $");
        let error = Error::from(LexError::IllegalCharacter {
            details: "'$'".to_string(),
            span: span_at(&source, 1, 8, 1),
        });

        assert_eq!(
            error.render(),
            "Illegal Character: '$'\nFile demo.bas, line 2\n\nVAR b = $\n        ^"
        );
    }

    #[test]
    fn expected_alternatives_are_listed() {
        let source = Source::new("<test>", "VAR");
        let error = SyntaxError::expected(&["identifier", "'('"], &span_at(&source, 0, 0, 3));

        assert_eq!(error.to_string(), "Invalid Syntax: Expected identifier or '('");
        assert_eq!(error.expected, vec!["identifier", "'('"]);
    }

    #[test]
    fn runtime_error_renders_traceback_oldest_first() {
        let source = Source::new("main.bas", "FUN f() -> y\nf()");
        let root = Context::root("<program>", Scope::new_root());
        let frame = Context::call_frame("f", &root, span_at(&source, 1, 0, 3), Scope::new_root());

        let error = Error::from(RuntimeError::new(
            "'y' is not defined",
            span_at(&source, 0, 11, 1),
            &frame,
        ));

        assert_eq!(
            error.render(),
            "Traceback (most recent call last):\n\
             \x20 File main.bas, line 2, in <program>\n\
             \x20 File main.bas, line 1, in f\n\
             Runtime Error: 'y' is not defined\n\
             \n\
             FUN f() -> y\n\
             \x20          ^"
        );
    }

    #[test]
    fn repeated_frames_collapse() {
        let source = Source::new("loop.bas", "FUN f() -> f()\nf()");
        let mut context = Context::root("<program>", Scope::new_root());
        context = Context::call_frame("f", &context, span_at(&source, 1, 0, 3), Scope::new_root());
        for _ in 0..10 {
            context =
                Context::call_frame("f", &context, span_at(&source, 0, 11, 3), Scope::new_root());
        }

        let rendered = Error::from(RecursionError::new(10, span_at(&source, 0, 11, 3), &context))
            .render();

        assert!(rendered.contains("  [Previous line repeated 8 more times]\n"));
        assert_eq!(rendered.matches("in f\n").count(), 3);
    }
}
