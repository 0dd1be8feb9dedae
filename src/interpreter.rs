use std::rc::Rc;

use tracing::{debug, trace};

use crate::{
    ast::{BinaryOperator, CallExpr, ForStmt, FunDef, IfExpr, Node, NodeKind, UnaryOperator, WhileStmt},
    builtins::{self, Builtin, Host},
    common::{Source, Span},
    config::Config,
    context::{Context, Scope, ScopeRef},
    error::{Error, RecursionError, RuntimeError},
    lexer, parser,
    signal::{unwind, Signal},
    stack::ensure_sufficient_stack,
    value::{Function, Number, Operation, Value, ValueKind},
};

pub struct Interpreter<'h> {
    pub(crate) host: &'h mut dyn Host,
    config: Config,
    globals: ScopeRef,
    call_depth: usize,
}

impl<'h> Interpreter<'h> {
    /// Creates an interpreter whose global scope holds the constants and
    /// built-ins. The globals live as long as the interpreter, so bindings
    /// made by one `run` are visible to the next.
    pub fn new(host: &'h mut dyn Host, config: Config) -> Self {
        let globals = Scope::new_root();
        builtins::install(&mut globals.borrow_mut());

        Interpreter {
            host,
            config,
            globals,
            call_depth: 0,
        }
    }

    pub fn globals(&self) -> &ScopeRef {
        &self.globals
    }

    /// Runs `text` under the configured source name.
    pub fn run(&mut self, text: &str) -> Result<Value, Error> {
        let name = self.config.source_name.clone();
        self.run_source(&name, text)
    }

    /// Scans, parses and evaluates one program against the global scope.
    pub fn run_source(&mut self, name: &str, text: &str) -> Result<Value, Error> {
        let source = Source::new(name, text);

        let tokens = lexer::scan(&source)?;
        debug!(source = name, tokens = tokens.len(), "scanned");

        let program = parser::parse(&tokens)?;
        let context = Context::root("<program>", Rc::clone(&self.globals));
        self.execute(&program, &context)
    }

    /// Evaluates a parsed program. A top-level `RETURN` ends it with its
    /// value; a `BREAK` or `CONTINUE` that reaches this far is an error.
    pub fn execute(&mut self, program: &Node, context: &Rc<Context>) -> Result<Value, Error> {
        let mut signal = self.evaluate(program, context);

        if let Some(error) = signal.error.take() {
            return Err(error);
        }
        if signal.loop_control() {
            return Err(stray_loop_control(&signal, &program.span, context).into());
        }
        if let Some(value) = signal.function_return {
            return Ok(value);
        }

        Ok(signal.value.unwrap_or_else(Value::null))
    }

    pub fn evaluate(&mut self, node: &Node, context: &Rc<Context>) -> Signal {
        ensure_sufficient_stack(|| self.evaluate_node(node, context))
    }

    fn evaluate_node(&mut self, node: &Node, context: &Rc<Context>) -> Signal {
        match &node.kind {
            NodeKind::Number(number) => Signal::success(
                Value::number(number.value)
                    .set_span(node.span.clone())
                    .set_context(context),
            ),
            NodeKind::String(string) => Signal::success(
                Value::string(string.value.clone())
                    .set_span(node.span.clone())
                    .set_context(context),
            ),
            NodeKind::List(list) => {
                let mut elements = Vec::with_capacity(list.elements.len());
                for element in &list.elements {
                    elements.push(unwind!(self.evaluate(element, context)));
                }

                Signal::success(stamp(Value::list(elements), node, context))
            }
            NodeKind::StatementList(list) => {
                let mut values = Vec::with_capacity(list.statements.len());
                for statement in &list.statements {
                    values.push(unwind!(self.evaluate(statement, context)));
                }

                Signal::success(stamp(Value::list(values), node, context))
            }
            NodeKind::VarAccess(access) => {
                let value = context.scope.borrow().get(&access.name);
                match value {
                    Some(value) => Signal::success(stamp(value, node, context)),
                    None => Signal::failure(RuntimeError::new(
                        format!("'{}' is not defined", access.name),
                        node.span.clone(),
                        context,
                    )),
                }
            }
            NodeKind::VarAssign(assign) => {
                let value = unwind!(self.evaluate(&assign.value, context));
                context
                    .scope
                    .borrow_mut()
                    .set(assign.name.clone(), value.clone());

                Signal::success(value)
            }
            NodeKind::UnaryOp(unary) => {
                let operand = unwind!(self.evaluate(&unary.operand, context));
                let result = match unary.op {
                    UnaryOperator::Plus => Ok(operand),
                    UnaryOperator::Minus => operand.neg(),
                    UnaryOperator::Not => operand.not(),
                };

                operation_signal(result, node, context)
            }
            NodeKind::BinaryOp(binary) => {
                let left = unwind!(self.evaluate(&binary.left, context));
                let right = unwind!(self.evaluate(&binary.right, context));
                let result = match binary.op {
                    BinaryOperator::Add => left.add(&right),
                    BinaryOperator::Sub => left.sub(&right),
                    BinaryOperator::Mul => left.mul(&right),
                    BinaryOperator::Div => left.div(&right),
                    BinaryOperator::Pow => left.pow(&right),
                    BinaryOperator::Eq => left.eq(&right),
                    BinaryOperator::Ne => left.ne(&right),
                    BinaryOperator::Lt => left.lt(&right),
                    BinaryOperator::Lte => left.lte(&right),
                    BinaryOperator::Gt => left.gt(&right),
                    BinaryOperator::Gte => left.gte(&right),
                    BinaryOperator::And => left.and(&right),
                    BinaryOperator::Or => left.or(&right),
                };

                operation_signal(result, node, context)
            }
            NodeKind::If(if_expr) => self.evaluate_if(if_expr, node, context),
            NodeKind::For(for_stmt) => self.evaluate_for(for_stmt, node, context),
            NodeKind::While(while_stmt) => self.evaluate_while(while_stmt, node, context),
            NodeKind::Break(_) => Signal::loop_break(node.span.clone()),
            NodeKind::Continue(_) => Signal::loop_continue(node.span.clone()),
            NodeKind::Return(ret) => {
                let value = match &ret.value {
                    Some(value) => unwind!(self.evaluate(value, context)),
                    None => Value::null(),
                };

                Signal::function_return(value)
            }
            NodeKind::FunDef(def) => self.evaluate_fun_def(def, node, context),
            NodeKind::Call(call) => self.evaluate_call(call, node, context),
        }
    }

    fn evaluate_if(&mut self, if_expr: &IfExpr, node: &Node, context: &Rc<Context>) -> Signal {
        for case in &if_expr.cases {
            let condition = unwind!(self.evaluate(&case.condition, context));
            if condition.is_true() {
                let value = unwind!(self.evaluate(&case.body, context));
                return Signal::success(body_result(value, case.suppress_value, node, context));
            }
        }

        match &if_expr.else_case {
            Some(else_case) => {
                let value = unwind!(self.evaluate(&else_case.body, context));
                Signal::success(body_result(value, else_case.suppress_value, node, context))
            }
            None => Signal::success(Value::null()),
        }
    }

    /// Evaluates a loop bound, which has to be a number.
    fn bound(&mut self, node: &Node, context: &Rc<Context>) -> Result<Number, Signal> {
        let signal = self.evaluate(node, context);
        if signal.should_unwind() {
            return Err(signal);
        }

        let value = signal.value.unwrap_or_else(Value::null);
        value.as_number().ok_or_else(|| {
            Signal::failure(RuntimeError::new(
                format!("Loop bound must be a number, not a {}", value.type_name()),
                node.span.clone(),
                context,
            ))
        })
    }

    fn evaluate_for(&mut self, for_stmt: &ForStmt, node: &Node, context: &Rc<Context>) -> Signal {
        let start = match self.bound(&for_stmt.start, context) {
            Ok(start) => start,
            Err(signal) => return signal,
        };
        let end = match self.bound(&for_stmt.end, context) {
            Ok(end) => end,
            Err(signal) => return signal,
        };
        let step = match &for_stmt.step {
            Some(step_node) => match self.bound(step_node, context) {
                Ok(step) if step.is_zero() => {
                    return Signal::failure(RuntimeError::new(
                        "Loop step cannot be zero",
                        step_node.span.clone(),
                        context,
                    ))
                }
                Ok(step) => step,
                Err(signal) => return signal,
            },
            None => Number::Int(1),
        };

        let ascending = !step.is_negative();
        let mut elements = Vec::new();
        let mut current = start;

        loop {
            let in_range = current.compare(end).map_or(false, |ordering| {
                if ascending {
                    ordering.is_lt()
                } else {
                    ordering.is_gt()
                }
            });
            if !in_range {
                break;
            }

            context
                .scope
                .borrow_mut()
                .set(for_stmt.var_name.clone(), Value::number(current));
            current = current.add(step);

            let signal = self.evaluate(&for_stmt.body, context);
            match loop_step(signal) {
                LoopStep::Value(value) => elements.push(value),
                LoopStep::Continue => continue,
                LoopStep::Break => break,
                LoopStep::Unwind(signal) => return signal,
            }
        }

        Signal::success(loop_result(elements, for_stmt.suppress_value, node, context))
    }

    fn evaluate_while(
        &mut self,
        while_stmt: &WhileStmt,
        node: &Node,
        context: &Rc<Context>,
    ) -> Signal {
        let mut elements = Vec::new();

        loop {
            let condition = unwind!(self.evaluate(&while_stmt.condition, context));
            if !condition.is_true() {
                break;
            }

            let signal = self.evaluate(&while_stmt.body, context);
            match loop_step(signal) {
                LoopStep::Value(value) => elements.push(value),
                LoopStep::Continue => continue,
                LoopStep::Break => break,
                LoopStep::Unwind(signal) => return signal,
            }
        }

        Signal::success(loop_result(elements, while_stmt.suppress_value, node, context))
    }

    fn evaluate_fun_def(&mut self, def: &FunDef, node: &Node, context: &Rc<Context>) -> Signal {
        let function = Value::function(Function {
            name: def.name.clone(),
            params: def.params.clone(),
            body: Rc::clone(&def.body),
            auto_return: def.auto_return,
            closure: Rc::clone(context),
        });
        let function = stamp(function, node, context);

        if let Some(name) = &def.name {
            context
                .scope
                .borrow_mut()
                .set(name.clone(), function.clone());
        }

        Signal::success(function)
    }

    fn evaluate_call(&mut self, call: &CallExpr, node: &Node, context: &Rc<Context>) -> Signal {
        let callee = unwind!(self.evaluate(&call.callee, context));
        let callee = stamp(callee, node, context);

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(unwind!(self.evaluate(arg, context)));
        }

        let mut signal = match &callee.kind {
            ValueKind::Function(function) => {
                self.call_function(Rc::clone(function), &callee, args, node, context)
            }
            ValueKind::Builtin(builtin) => {
                self.call_builtin(*builtin, &callee, args, call, node, context)
            }
            _ => {
                return Signal::failure(
                    callee
                        .illegal_operation(None)
                        .into_runtime(&node.span, context),
                )
            }
        };

        signal.value = signal.value.map(|value| stamp(value, node, context));
        signal
    }

    /// Checks the call depth and argument count shared by every callable.
    fn enter_call(
        &self,
        callee: &Value,
        params: &[String],
        args: &[Value],
        node: &Node,
        context: &Rc<Context>,
    ) -> Result<(), Error> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(RecursionError::new(
                self.config.max_call_depth,
                node.span.clone(),
                context,
            )
            .into());
        }

        let details = if args.len() > params.len() {
            format!(
                "{} too many arguments passed into {}",
                args.len() - params.len(),
                callee
            )
        } else if args.len() < params.len() {
            format!(
                "{} too few arguments passed into {}",
                params.len() - args.len(),
                callee
            )
        } else {
            return Ok(());
        };

        Err(RuntimeError::new(details, node.span.clone(), context).into())
    }

    fn call_function(
        &mut self,
        function: Rc<Function>,
        callee: &Value,
        args: Vec<Value>,
        node: &Node,
        context: &Rc<Context>,
    ) -> Signal {
        if let Err(error) = self.enter_call(callee, &function.params, &args, node, context) {
            return Signal::failure(error);
        }

        let frame = Context::call_frame(
            function.display_name(),
            context,
            node.span.clone(),
            Scope::child(&function.closure.scope),
        );
        for (param, arg) in function.params.iter().zip(args) {
            frame
                .scope
                .borrow_mut()
                .set(param.clone(), arg.set_context(&frame));
        }

        self.call_depth += 1;
        trace!(function = function.display_name(), depth = self.call_depth, "call");
        let mut signal = self.evaluate(&function.body, &frame);
        self.call_depth -= 1;

        if let Some(error) = signal.error.take() {
            return Signal::failure(error);
        }
        if signal.loop_control() {
            return Signal::failure(stray_loop_control(&signal, &node.span, &frame));
        }

        let body_value = if function.auto_return {
            signal.value
        } else {
            None
        };
        Signal::success(
            body_value
                .or(signal.function_return)
                .unwrap_or_else(Value::null),
        )
    }

    fn call_builtin(
        &mut self,
        builtin: Builtin,
        callee: &Value,
        args: Vec<Value>,
        call: &CallExpr,
        node: &Node,
        context: &Rc<Context>,
    ) -> Signal {
        let params = builtin
            .params()
            .iter()
            .map(|param| param.to_string())
            .collect::<Vec<_>>();
        if let Err(error) = self.enter_call(callee, &params, &args, node, context) {
            return Signal::failure(error);
        }

        let frame = Context::call_frame(
            builtin.name(),
            context,
            node.span.clone(),
            Scope::child(&context.scope),
        );
        let mut args = args;

        self.call_depth += 1;
        trace!(builtin = builtin.name(), depth = self.call_depth, "call");
        let signal = self.execute_builtin(builtin, &mut args, &node.span, &frame);
        self.call_depth -= 1;

        if signal.error.is_none() && builtin.mutates_first_argument() {
            if let Some(NodeKind::VarAccess(access)) = call.args.first().map(|arg| &arg.kind) {
                let updated = args.swap_remove(0);
                context.scope.borrow_mut().replace(&access.name, updated);
            }
        }

        signal
    }
}

enum LoopStep {
    Value(Value),
    Continue,
    Break,
    Unwind(Signal),
}

/// Decides what a loop does with the signal of one body evaluation.
fn loop_step(signal: Signal) -> LoopStep {
    if signal.loop_continue {
        LoopStep::Continue
    } else if signal.loop_break {
        LoopStep::Break
    } else if signal.should_unwind() {
        LoopStep::Unwind(signal)
    } else {
        LoopStep::Value(signal.value.unwrap_or_else(Value::null))
    }
}

fn stamp(value: Value, node: &Node, context: &Rc<Context>) -> Value {
    value.set_span(node.span.clone()).set_context(context)
}

fn operation_signal(
    result: Operation,
    node: &Node,
    context: &Rc<Context>,
) -> Signal {
    match result {
        Ok(value) => Signal::success(stamp(value, node, context)),
        Err(error) => Signal::failure(error.into_runtime(&node.span, context)),
    }
}

fn body_result(value: Value, suppress_value: bool, node: &Node, context: &Rc<Context>) -> Value {
    if suppress_value {
        Value::null()
    } else {
        stamp(value, node, context)
    }
}

fn loop_result(
    elements: Vec<Value>,
    suppress_value: bool,
    node: &Node,
    context: &Rc<Context>,
) -> Value {
    if suppress_value {
        Value::null()
    } else {
        stamp(Value::list(elements), node, context)
    }
}

fn stray_loop_control(signal: &Signal, fallback: &Span, context: &Rc<Context>) -> RuntimeError {
    RuntimeError::new(
        format!("'{}' outside of a loop", signal.keyword()),
        signal.origin.clone().unwrap_or_else(|| fallback.clone()),
        context,
    )
}
