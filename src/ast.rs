use std::{mem, rc::Rc};

use derive_more::{From, TryInto};

use crate::{common::Span, token::TokenKind, value::Number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

impl BinaryOperator {
    pub fn token_kind(&self) -> TokenKind {
        use crate::token::Keyword;

        match self {
            Self::Add => TokenKind::Plus,
            Self::Sub => TokenKind::Minus,
            Self::Mul => TokenKind::Star,
            Self::Div => TokenKind::Slash,
            Self::Pow => TokenKind::Caret,
            Self::Eq => TokenKind::EqualEqual,
            Self::Ne => TokenKind::BangEqual,
            Self::Lt => TokenKind::Lesser,
            Self::Lte => TokenKind::LesserEqual,
            Self::Gt => TokenKind::Greater,
            Self::Gte => TokenKind::GreaterEqual,
            Self::And => TokenKind::Keyword(Keyword::And),
            Self::Or => TokenKind::Keyword(Keyword::Or),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NumberLit {
    pub value: Number,
}

#[derive(Debug, Clone)]
pub struct StringLit {
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ListLit {
    pub elements: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct VarAccess {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct VarAssign {
    pub name: String,
    pub value: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct UnaryOp {
    pub op: UnaryOperator,
    pub operand: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct BinaryOp {
    pub op: BinaryOperator,
    pub left: Box<Node>,
    pub right: Box<Node>,
}

/// One `IF`/`ELIF` arm. Block-form bodies (closed by `END`) suppress their
/// value and evaluate to unit.
#[derive(Debug, Clone)]
pub struct IfCase {
    pub condition: Node,
    pub body: Node,
    pub suppress_value: bool,
}

#[derive(Debug, Clone)]
pub struct ElseCase {
    pub body: Box<Node>,
    pub suppress_value: bool,
}

#[derive(Debug, Clone)]
pub struct IfExpr {
    pub cases: Vec<IfCase>,
    pub else_case: Option<ElseCase>,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub var_name: String,
    pub start: Box<Node>,
    pub end: Box<Node>,
    pub step: Option<Box<Node>>,
    pub body: Box<Node>,
    pub suppress_value: bool,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: Box<Node>,
    pub body: Box<Node>,
    pub suppress_value: bool,
}

#[derive(Debug, Clone)]
pub struct BreakStmt;

#[derive(Debug, Clone)]
pub struct ContinueStmt;

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Box<Node>>,
}

/// A function literal. The body is shared with every function value built
/// from it.
#[derive(Debug, Clone)]
pub struct FunDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Node>,
    pub auto_return: bool,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: Box<Node>,
    pub args: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct StatementList {
    pub statements: Vec<Node>,
}

#[derive(Debug, Clone, From, TryInto)]
pub enum NodeKind {
    Number(NumberLit),
    String(StringLit),
    List(ListLit),
    VarAccess(VarAccess),
    VarAssign(VarAssign),
    UnaryOp(UnaryOp),
    BinaryOp(BinaryOp),
    If(IfExpr),
    For(ForStmt),
    While(WhileStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
    Return(ReturnStmt),
    FunDef(FunDef),
    Call(CallExpr),
    StatementList(StatementList),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: impl Into<NodeKind>, span: Span) -> Self {
        Node {
            kind: kind.into(),
            span,
        }
    }

    /// Moves the payload out, leaving an empty leaf behind for `Drop`.
    pub fn into_kind(mut self) -> NodeKind {
        mem::replace(&mut self.kind, NodeKind::Break(BreakStmt))
    }
}

/// Long operator chains nest as deeply as they are long, so children are
/// released from a work list instead of by recursive drop glue.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_children(&mut self.kind, &mut pending);

        while let Some(mut node) = pending.pop() {
            detach_children(&mut node.kind, &mut pending);
        }
    }
}

fn detach_children(kind: &mut NodeKind, pending: &mut Vec<Node>) {
    match mem::replace(kind, NodeKind::Break(BreakStmt)) {
        NodeKind::Number(_)
        | NodeKind::String(_)
        | NodeKind::VarAccess(_)
        | NodeKind::Break(_)
        | NodeKind::Continue(_) => {}
        NodeKind::List(list) => pending.extend(list.elements),
        NodeKind::VarAssign(assign) => pending.push(*assign.value),
        NodeKind::UnaryOp(unary) => pending.push(*unary.operand),
        NodeKind::BinaryOp(binary) => {
            pending.push(*binary.left);
            pending.push(*binary.right);
        }
        NodeKind::If(if_expr) => {
            for case in if_expr.cases {
                pending.push(case.condition);
                pending.push(case.body);
            }
            if let Some(else_case) = if_expr.else_case {
                pending.push(*else_case.body);
            }
        }
        NodeKind::For(for_stmt) => {
            pending.push(*for_stmt.start);
            pending.push(*for_stmt.end);
            pending.extend(for_stmt.step.map(|step| *step));
            pending.push(*for_stmt.body);
        }
        NodeKind::While(while_stmt) => {
            pending.push(*while_stmt.condition);
            pending.push(*while_stmt.body);
        }
        NodeKind::Return(ret) => pending.extend(ret.value.map(|value| *value)),
        // Function values built from this literal may still share the body.
        NodeKind::FunDef(def) => pending.extend(Rc::try_unwrap(def.body).ok()),
        NodeKind::Call(call) => {
            pending.push(*call.callee);
            pending.extend(call.args);
        }
        NodeKind::StatementList(list) => pending.extend(list.statements),
    }
}
