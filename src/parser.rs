use tracing::{debug, trace};

use crate::{
    ast::{
        BinaryOp, BinaryOperator, BreakStmt, CallExpr, ContinueStmt, ElseCase, ForStmt, FunDef,
        IfCase, IfExpr, ListLit, Node, NodeKind, NumberLit, ReturnStmt, StatementList, StringLit,
        UnaryOp, UnaryOperator, VarAccess, VarAssign, WhileStmt,
    },
    common::{Position, Source, Span},
    error::SyntaxError,
    stack::ensure_sufficient_stack,
    token::{Keyword, Literal, Token, TokenKind},
    value::Number,
};

const EXPRESSION_START: &[&str] = &[
    "'VAR'", "'IF'", "'FOR'", "'WHILE'", "'FUN'", "int", "float", "string", "identifier", "'+'",
    "'-'", "'('", "'['", "'NOT'",
];

const STATEMENT_START: &[&str] = &[
    "'RETURN'", "'CONTINUE'", "'BREAK'", "'VAR'", "'IF'", "'FOR'", "'WHILE'", "'FUN'", "int",
    "float", "string", "identifier", "'+'", "'-'", "'('", "'['", "'NOT'",
];

const ATOM_START: &[&str] = &[
    "int", "float", "string", "identifier", "'('", "'['", "'IF'", "'FOR'", "'WHILE'", "'FUN'",
];

const ARGUMENT_START: &[&str] = &[
    "')'", "'VAR'", "'IF'", "'FOR'", "'WHILE'", "'FUN'", "int", "float", "string", "identifier",
    "'+'", "'-'", "'('", "'['", "'NOT'",
];

const ELEMENT_START: &[&str] = &[
    "']'", "'VAR'", "'IF'", "'FOR'", "'WHILE'", "'FUN'", "int", "float", "string", "identifier",
    "'+'", "'-'", "'('", "'['", "'NOT'",
];

type ParseResult = Result<Node, SyntaxError>;

/// How a compound statement's body was written. Only a bare inline body
/// keeps its value; the END-terminated forms evaluate to unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyForm {
    Inline,
    ClosedInline,
    Block,
}

impl BodyForm {
    fn suppresses_value(self) -> bool {
        self != BodyForm::Inline
    }
}

#[derive(Debug, Clone)]
struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    /// The most recent tentative parse that failed, with the token index it
    /// started from.
    abandoned: Option<(usize, SyntaxError)>,
    /// Whether the last statement sequence stopped where another statement
    /// could have started.
    expecting_statement: bool,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            current: 0,
            abandoned: None,
            expecting_statement: false,
        }
    }

    /// The current token. The trailing EOF is returned forever once reached.
    fn peek(&self) -> &'a Token {
        let tokens = self.tokens;
        &tokens[self.current.min(tokens.len() - 1)]
    }

    fn previous(&self) -> &'a Token {
        let tokens = self.tokens;
        &tokens[self.current.saturating_sub(1).min(tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_keyword(keyword)
    }

    fn error_here(&self, expected: &[&'static str]) -> SyntaxError {
        SyntaxError::expected(expected, &self.peek().span)
    }

    fn expect(&mut self, kind: TokenKind, expected: &[&'static str]) -> Result<&'a Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(expected))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<&'a Token, SyntaxError> {
        self.expect(TokenKind::Keyword(keyword), &[keyword_expectation(keyword)])
    }

    fn expect_name(&mut self, expected: &[&'static str]) -> Result<String, SyntaxError> {
        match self.peek().name() {
            Some(name) if self.check(TokenKind::Identifier) => {
                self.advance();
                Ok(name.to_string())
            }
            _ => Err(self.error_here(expected)),
        }
    }

    fn skip_newlines(&mut self) -> usize {
        let mut count = 0;
        while self.check(TokenKind::Newline) {
            self.advance();
            count += 1;
        }
        count
    }

    /// A span from `start` through the last consumed token.
    fn span_from(&self, start: &Span) -> Span {
        start.to(&self.previous().span)
    }

    /// Runs `parse`, rewinding to where it started when it fails.
    fn attempt<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>) -> Option<T> {
        let checkpoint = self.current;

        match parse(self) {
            Ok(node) => Some(node),
            Err(error) => {
                trace!(rewound = self.current - checkpoint, %error, "abandoned tentative parse");
                self.current = checkpoint;
                self.abandoned = Some((checkpoint, error));
                None
            }
        }
    }

    /// The error of a tentative parse that failed at the current token after
    /// getting past it. It describes the problem better than a complaint
    /// about the current token itself.
    fn deeper_abandoned(&mut self) -> Option<SyntaxError> {
        let here = self.peek().span.start.offset;

        match self.abandoned.take() {
            Some((at, error)) if at == self.current && error.span.start.offset > here => Some(error),
            _ => None,
        }
    }

    /// Swaps `error` for a list of what could start the construct when the
    /// failing parse never got past its first token.
    fn generic_unless_consumed(
        &self,
        checkpoint: usize,
        error: SyntaxError,
        expected: &[&'static str],
    ) -> SyntaxError {
        if self.current == checkpoint {
            self.error_here(expected)
        } else {
            error
        }
    }

    /// The error for a token that ends a statement sequence without being
    /// one of its `terminators`.
    fn unexpected_in_sequence(&mut self, terminators: &[&'static str]) -> SyntaxError {
        if let Some(error) = self.deeper_abandoned() {
            return error;
        }

        if self.expecting_statement {
            let expected = STATEMENT_START
                .iter()
                .chain(terminators)
                .copied()
                .collect::<Vec<_>>();
            self.error_here(&expected)
        } else {
            self.error_here(terminators)
        }
    }

    fn block_end(&mut self, expected: &[&'static str]) -> Result<(), SyntaxError> {
        if self.check_keyword(Keyword::End) {
            self.advance();
            return Ok(());
        }

        Err(self.unexpected_in_sequence(expected))
    }

    fn statements(&mut self) -> ParseResult {
        let start = self.peek().span.clone();
        let mut statements = Vec::new();

        self.skip_newlines();
        let mut expecting_statement = true;
        while let Some(statement) = self.attempt(Self::statement) {
            statements.push(statement);

            if self.skip_newlines() == 0 {
                expecting_statement = false;
                break;
            }
        }
        self.expecting_statement = expecting_statement;

        let span = match (statements.first(), statements.last()) {
            (Some(first), Some(last)) => first.span.to(&last.span),
            _ => start,
        };
        Ok(Node::new(StatementList { statements }, span))
    }

    fn statement(&mut self) -> ParseResult {
        let token = self.peek();

        match token.kind {
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = self.attempt(Self::expression);
                let span = match &value {
                    Some(value) => token.span.to(&value.span),
                    None => token.span.clone(),
                };
                Ok(Node::new(
                    ReturnStmt {
                        value: value.map(Box::new),
                    },
                    span,
                ))
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                Ok(Node::new(ContinueStmt, token.span.clone()))
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                Ok(Node::new(BreakStmt, token.span.clone()))
            }
            _ => {
                let checkpoint = self.current;
                self.expression()
                    .map_err(|error| self.generic_unless_consumed(checkpoint, error, STATEMENT_START))
            }
        }
    }

    fn expression(&mut self) -> ParseResult {
        ensure_sufficient_stack(|| self.assignment())
    }

    fn assignment(&mut self) -> ParseResult {
        if self.check_keyword(Keyword::Var) {
            let start = self.advance().span.clone();
            let name = self.expect_name(&["identifier"])?;
            self.expect(TokenKind::Equal, &["'='"])?;
            let value = self.expression()?;

            let span = start.to(&value.span);
            return Ok(Node::new(
                VarAssign {
                    name,
                    value: Box::new(value),
                },
                span,
            ));
        }

        let checkpoint = self.current;
        self.binary_operation(
            Self::comparison,
            &[BinaryOperator::And, BinaryOperator::Or],
            Self::comparison,
        )
        .map_err(|error| self.generic_unless_consumed(checkpoint, error, EXPRESSION_START))
    }

    fn comparison(&mut self) -> ParseResult {
        if self.check_keyword(Keyword::Not) {
            let start = self.advance().span.clone();
            let operand = ensure_sufficient_stack(|| self.comparison())?;

            let span = start.to(&operand.span);
            return Ok(Node::new(
                UnaryOp {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }

        self.binary_operation(
            Self::arithmetic,
            &[
                BinaryOperator::Eq,
                BinaryOperator::Ne,
                BinaryOperator::Lt,
                BinaryOperator::Gt,
                BinaryOperator::Lte,
                BinaryOperator::Gte,
            ],
            Self::arithmetic,
        )
    }

    fn arithmetic(&mut self) -> ParseResult {
        self.binary_operation(
            Self::term,
            &[BinaryOperator::Add, BinaryOperator::Sub],
            Self::term,
        )
    }

    fn term(&mut self) -> ParseResult {
        self.binary_operation(
            Self::factor,
            &[BinaryOperator::Mul, BinaryOperator::Div],
            Self::factor,
        )
    }

    fn factor(&mut self) -> ParseResult {
        ensure_sufficient_stack(|| self.unary())
    }

    fn unary(&mut self) -> ParseResult {
        let op = match self.peek().kind {
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Minus => UnaryOperator::Minus,
            _ => return self.power(),
        };

        let start = self.advance().span.clone();
        let operand = self.factor()?;

        let span = start.to(&operand.span);
        Ok(Node::new(
            UnaryOp {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// The right operand is a full factor, so `2 ^ -1` parses.
    fn power(&mut self) -> ParseResult {
        self.binary_operation(Self::call, &[BinaryOperator::Pow], Self::factor)
    }

    fn call(&mut self) -> ParseResult {
        let mut node = self.atom()?;

        while self.check(TokenKind::LeftParen) {
            self.advance();
            let mut args = Vec::new();

            if !self.check(TokenKind::RightParen) {
                let checkpoint = self.current;
                let first = self
                    .expression()
                    .map_err(|error| self.generic_unless_consumed(checkpoint, error, ARGUMENT_START))?;
                args.push(first);

                while self.check(TokenKind::Comma) {
                    self.advance();
                    args.push(self.expression()?);
                }
            }
            self.expect(TokenKind::RightParen, &["','", "')'"])?;

            let span = self.span_from(&node.span);
            node = Node::new(
                CallExpr {
                    callee: Box::new(node),
                    args,
                },
                span,
            );
        }

        Ok(node)
    }

    fn atom(&mut self) -> ParseResult {
        let token = self.peek();

        let node = match (&token.kind, &token.value) {
            (TokenKind::Int, Some(Literal::Int(value))) => Node::new(
                NumberLit {
                    value: Number::Int(*value),
                },
                token.span.clone(),
            ),
            (TokenKind::Float, Some(Literal::Float(value))) => Node::new(
                NumberLit {
                    value: Number::Float(*value),
                },
                token.span.clone(),
            ),
            (TokenKind::String, Some(Literal::Str(value))) => Node::new(
                StringLit {
                    value: value.clone(),
                },
                token.span.clone(),
            ),
            (TokenKind::Identifier, Some(Literal::Name(name))) => Node::new(
                VarAccess { name: name.clone() },
                token.span.clone(),
            ),
            (TokenKind::LeftParen, _) => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RightParen, &["')'"])?;
                return Ok(inner);
            }
            (TokenKind::LeftBracket, _) => return self.list_expr(),
            (TokenKind::Keyword(Keyword::If), _) => return self.if_expr(),
            (TokenKind::Keyword(Keyword::For), _) => return self.for_stmt(),
            (TokenKind::Keyword(Keyword::While), _) => return self.while_stmt(),
            (TokenKind::Keyword(Keyword::Fun), _) => return self.fun_def(),
            _ => return Err(self.error_here(ATOM_START)),
        };

        self.advance();
        Ok(node)
    }

    fn list_expr(&mut self) -> ParseResult {
        let start = self.expect(TokenKind::LeftBracket, &["'['"])?.span.clone();
        let mut elements = Vec::new();

        if !self.check(TokenKind::RightBracket) {
            let checkpoint = self.current;
            let first = self
                .expression()
                .map_err(|error| self.generic_unless_consumed(checkpoint, error, ELEMENT_START))?;
            elements.push(first);

            while self.check(TokenKind::Comma) {
                self.advance();
                elements.push(self.expression()?);
            }
        }
        self.expect(TokenKind::RightBracket, &["','", "']'"])?;

        Ok(Node::new(ListLit { elements }, self.span_from(&start)))
    }

    fn if_expr(&mut self) -> ParseResult {
        let start = self.expect_keyword(Keyword::If)?.span.clone();
        let mut cases = Vec::new();
        let mut else_case = None;
        let mut closed_inline = false;

        loop {
            let condition = self.expression()?;
            self.expect_keyword(Keyword::Then)?;

            if self.check(TokenKind::Newline) {
                self.advance();
                let body = self.statements()?;
                cases.push(IfCase {
                    condition,
                    body,
                    suppress_value: true,
                });

                match self.peek().kind {
                    TokenKind::Keyword(Keyword::End) => {
                        self.advance();
                        break;
                    }
                    TokenKind::Keyword(Keyword::Elif) => {
                        self.advance();
                    }
                    TokenKind::Keyword(Keyword::Else) => {
                        else_case = Some(self.else_case()?.0);
                        break;
                    }
                    _ => return Err(self.unexpected_in_sequence(&["'END'", "'ELIF'", "'ELSE'"])),
                }
            } else {
                let body = self.statement()?;
                cases.push(IfCase {
                    condition,
                    body,
                    suppress_value: false,
                });

                match self.peek().kind {
                    TokenKind::Keyword(Keyword::Elif) => {
                        self.advance();
                    }
                    TokenKind::Keyword(Keyword::Else) => {
                        let (case, form) = self.else_case()?;
                        closed_inline = form == BodyForm::ClosedInline;
                        else_case = Some(case);
                        break;
                    }
                    TokenKind::Keyword(Keyword::End) => {
                        self.advance();
                        closed_inline = true;
                        break;
                    }
                    _ => break,
                }
            }
        }

        if closed_inline {
            for case in cases.iter_mut() {
                case.suppress_value = true;
            }
        }

        Ok(Node::new(IfExpr { cases, else_case }, self.span_from(&start)))
    }

    fn else_case(&mut self) -> Result<(ElseCase, BodyForm), SyntaxError> {
        self.expect_keyword(Keyword::Else)?;
        let (body, form) = self.body()?;

        Ok((
            ElseCase {
                body: Box::new(body),
                suppress_value: form.suppresses_value(),
            },
            form,
        ))
    }

    /// A block body (NEWLINE, statements, END) or an inline statement with
    /// an optional closing END.
    fn body(&mut self) -> Result<(Node, BodyForm), SyntaxError> {
        if self.check(TokenKind::Newline) {
            self.advance();
            let body = self.statements()?;
            self.block_end(&["'END'"])?;
            return Ok((body, BodyForm::Block));
        }

        let body = self.statement()?;
        if self.check_keyword(Keyword::End) {
            self.advance();
            return Ok((body, BodyForm::ClosedInline));
        }
        Ok((body, BodyForm::Inline))
    }

    fn for_stmt(&mut self) -> ParseResult {
        let start = self.expect_keyword(Keyword::For)?.span.clone();
        let var_name = self.expect_name(&["identifier"])?;
        self.expect(TokenKind::Equal, &["'='"])?;
        let start_value = self.expression()?;
        self.expect_keyword(Keyword::To)?;
        let end_value = self.expression()?;

        let step = if self.check_keyword(Keyword::Step) {
            self.advance();
            Some(Box::new(self.expression()?))
        } else {
            None
        };

        self.expect_keyword(Keyword::Then)?;
        let (body, form) = self.body()?;

        Ok(Node::new(
            ForStmt {
                var_name,
                start: Box::new(start_value),
                end: Box::new(end_value),
                step,
                body: Box::new(body),
                suppress_value: form.suppresses_value(),
            },
            self.span_from(&start),
        ))
    }

    fn while_stmt(&mut self) -> ParseResult {
        let start = self.expect_keyword(Keyword::While)?.span.clone();
        let condition = self.expression()?;
        self.expect_keyword(Keyword::Then)?;
        let (body, form) = self.body()?;

        Ok(Node::new(
            WhileStmt {
                condition: Box::new(condition),
                body: Box::new(body),
                suppress_value: form.suppresses_value(),
            },
            self.span_from(&start),
        ))
    }

    fn fun_def(&mut self) -> ParseResult {
        let start = self.expect_keyword(Keyword::Fun)?.span.clone();

        let name = if self.check(TokenKind::Identifier) {
            let name = self.expect_name(&["identifier"])?;
            self.expect(TokenKind::LeftParen, &["'('"])?;
            Some(name)
        } else {
            self.expect(TokenKind::LeftParen, &["identifier", "'('"])?;
            None
        };

        let mut params = Vec::new();
        if self.check(TokenKind::Identifier) {
            params.push(self.expect_name(&["identifier"])?);
            while self.check(TokenKind::Comma) {
                self.advance();
                params.push(self.expect_name(&["identifier"])?);
            }
            self.expect(TokenKind::RightParen, &["','", "')'"])?;
        } else {
            self.expect(TokenKind::RightParen, &["identifier", "')'"])?;
        }

        let (body, auto_return) = if self.check(TokenKind::Arrow) {
            self.advance();
            (self.expression()?, true)
        } else if self.check(TokenKind::Newline) {
            self.advance();
            let body = self.statements()?;
            self.block_end(&["'END'"])?;
            (body, false)
        } else {
            return Err(self.error_here(&["'->'", "NEWLINE"]));
        };

        Ok(Node::new(
            FunDef {
                name,
                params,
                body: body.into(),
                auto_return,
            },
            self.span_from(&start),
        ))
    }

    fn binary_operation(
        &mut self,
        left: fn(&mut Self) -> ParseResult,
        ops: &[BinaryOperator],
        right: fn(&mut Self) -> ParseResult,
    ) -> ParseResult {
        let mut node = left(self)?;

        while let Some(op) = ops
            .iter()
            .copied()
            .find(|op| self.peek().kind == op.token_kind())
        {
            self.advance();
            let operand = right(self)?;

            let span = node.span.to(&operand.span);
            node = Node::new(
                BinaryOp {
                    op,
                    left: Box::new(node),
                    right: Box::new(operand),
                },
                span,
            );
        }

        Ok(node)
    }
}

fn keyword_expectation(keyword: Keyword) -> &'static str {
    match keyword {
        Keyword::Var => "'VAR'",
        Keyword::And => "'AND'",
        Keyword::Or => "'OR'",
        Keyword::Not => "'NOT'",
        Keyword::If => "'IF'",
        Keyword::Elif => "'ELIF'",
        Keyword::Else => "'ELSE'",
        Keyword::For => "'FOR'",
        Keyword::To => "'TO'",
        Keyword::Step => "'STEP'",
        Keyword::While => "'WHILE'",
        Keyword::Fun => "'FUN'",
        Keyword::Then => "'THEN'",
        Keyword::End => "'END'",
        Keyword::Return => "'RETURN'",
        Keyword::Continue => "'CONTINUE'",
        Keyword::Break => "'BREAK'",
    }
}

/// Parses a whole program. `tokens` is expected to end with EOF, as produced
/// by the lexer.
pub fn parse(tokens: &[Token]) -> ParseResult {
    if tokens.is_empty() {
        let source = Source::new("<empty>", "");
        let span = Span::new(&source, Position::default(), Position::default());
        return Ok(Node::new(StatementList { statements: vec![] }, span));
    }

    let mut parser = Parser::new(tokens);
    let program = parser.statements()?;

    if !parser.check(TokenKind::Eof) {
        if parser.expecting_statement {
            return Err(parser.unexpected_in_sequence(&["NEWLINE", "EOF"]));
        }
        return Err(parser.deeper_abandoned().unwrap_or_else(|| SyntaxError {
            details: "Token cannot appear after previous tokens".to_string(),
            expected: vec!["NEWLINE", "EOF"],
            span: parser.peek().span.clone(),
        }));
    }

    if let NodeKind::StatementList(list) = &program.kind {
        debug!(statements = list.statements.len(), "parsed program");
    }

    Ok(program)
}
