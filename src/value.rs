use std::{cmp::Ordering, fmt, rc::Rc};

use crate::{
    ast::Node,
    builtins::Builtin,
    common::Span,
    context::Context,
    error::RuntimeError,
};

/// Longest string, in bytes, that `*` may build.
const MAX_REPEATED_LENGTH: usize = 1 << 28;

#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    pub fn is_negative(self) -> bool {
        self.as_f64() < 0.0
    }

    pub fn from_bool(value: bool) -> Number {
        Number::Int(value as i64)
    }

    /// Integer arithmetic when both sides are integers and the result fits,
    /// float arithmetic otherwise.
    fn combine(
        self,
        other: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Number {
        if let (Number::Int(left), Number::Int(right)) = (self, other) {
            if let Some(result) = int_op(left, right) {
                return Number::Int(result);
            }
        }

        Number::Float(float_op(self.as_f64(), other.as_f64()))
    }

    pub fn add(self, other: Number) -> Number {
        self.combine(other, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(self, other: Number) -> Number {
        self.combine(other, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(self, other: Number) -> Number {
        self.combine(other, i64::checked_mul, |a, b| a * b)
    }

    pub fn pow(self, other: Number) -> Number {
        self.combine(
            other,
            |base, exponent| {
                u32::try_from(exponent)
                    .ok()
                    .and_then(|exponent| base.checked_pow(exponent))
            },
            f64::powf,
        )
    }

    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(left), Number::Int(right)) => Some(left.cmp(&right)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }

    /// Interprets the number as a list index, counting negative indices from
    /// the end. Fractional numbers are never valid indices.
    pub fn to_index(self, len: usize) -> Option<usize> {
        let index = match self {
            Number::Int(value) => value,
            Number::Float(value) if value.fract() == 0.0 => value as i64,
            Number::Float(_) => return None,
        };

        let index = if index < 0 {
            index + len as i64
        } else {
            index
        };

        usize::try_from(index).ok().filter(|index| *index < len)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.compare(*other) == Some(Ordering::Equal)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(value) => write!(f, "{}", value),
            Number::Float(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 => {
                write!(f, "{:.1}", value)
            }
            Number::Float(value) => write!(f, "{}", value),
        }
    }
}

/// A user-defined function. `closure` is the context the literal was
/// evaluated in; calls resolve free variables through its scope.
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Node>,
    pub auto_return: bool,
    pub closure: Rc<Context>,
}

impl Function {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.display_name())
            .field("params", &self.params)
            .field("auto_return", &self.auto_return)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ValueKind {
    Number(Number),
    String(String),
    List(Vec<Value>),
    Function(Rc<Function>),
    Builtin(Builtin),
}

impl PartialEq for ValueKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            (Self::List(left), Self::List(right)) => left == right,
            (Self::Function(left), Self::Function(right)) => {
                Rc::ptr_eq(&left.body, &right.body) && Rc::ptr_eq(&left.closure, &right.closure)
            }
            (Self::Builtin(left), Self::Builtin(right)) => left == right,
            _ => false,
        }
    }
}

/// A runtime value. Besides its payload it records where it was produced and
/// in which frame, purely so errors can point at it.
///
/// `Clone` is the language-level copy: lists duplicate their element storage,
/// so a copy never aliases the original.
#[derive(Debug, Clone)]
pub struct Value {
    pub kind: ValueKind,
    pub span: Option<Span>,
    pub context: Option<Rc<Context>>,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// A failed value operation. The interpreter fills in whatever location the
/// operands could not provide.
#[derive(Debug, Clone)]
pub struct OperationError {
    pub details: String,
    pub span: Option<Span>,
    pub context: Option<Rc<Context>>,
}

impl OperationError {
    pub fn into_runtime(self, fallback_span: &Span, fallback_context: &Rc<Context>) -> RuntimeError {
        RuntimeError::new(
            self.details,
            self.span.unwrap_or_else(|| fallback_span.clone()),
            &self.context.unwrap_or_else(|| Rc::clone(fallback_context)),
        )
    }
}

pub type Operation = Result<Value, OperationError>;

fn join_spans(left: &Option<Span>, right: &Option<Span>) -> Option<Span> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left.to(right)),
        (Some(span), None) | (None, Some(span)) => Some(span.clone()),
        (None, None) => None,
    }
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Value {
            kind,
            span: None,
            context: None,
        }
    }

    pub fn number(number: Number) -> Self {
        Value::new(ValueKind::Number(number))
    }

    pub fn int(value: i64) -> Self {
        Value::number(Number::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Value::number(Number::Float(value))
    }

    pub fn boolean(value: bool) -> Self {
        Value::number(Number::from_bool(value))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Value::new(ValueKind::String(text.into()))
    }

    pub fn list(elements: Vec<Value>) -> Self {
        Value::new(ValueKind::List(elements))
    }

    pub fn function(function: Function) -> Self {
        Value::new(ValueKind::Function(Rc::new(function)))
    }

    pub fn builtin(builtin: Builtin) -> Self {
        Value::new(ValueKind::Builtin(builtin))
    }

    /// The unit value produced by statements and block bodies (`NULL`).
    pub fn null() -> Self {
        Value::int(0)
    }

    pub fn set_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn set_context(mut self, context: &Rc<Context>) -> Self {
        self.context = Some(Rc::clone(context));
        self
    }

    pub fn as_number(&self) -> Option<Number> {
        match self.kind {
            ValueKind::Number(number) => Some(number),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match &self.kind {
            ValueKind::List(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ValueKind::Function(_) | ValueKind::Builtin(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ValueKind::Number(_) => "number",
            ValueKind::String(_) => "string",
            ValueKind::List(_) => "list",
            ValueKind::Function(_) => "function",
            ValueKind::Builtin(_) => "built-in function",
        }
    }

    fn error(&self, details: impl Into<String>, span: Option<Span>) -> OperationError {
        OperationError {
            details: details.into(),
            span,
            context: self.context.clone(),
        }
    }

    pub fn illegal_operation(&self, other: Option<&Value>) -> OperationError {
        let span = match other {
            Some(other) => join_spans(&self.span, &other.span),
            None => self.span.clone(),
        };
        self.error("Illegal operation", span)
    }

    fn derived(&self, kind: ValueKind) -> Value {
        Value {
            kind,
            span: None,
            context: self.context.clone(),
        }
    }

    fn numbers(&self, other: &Value) -> Option<(Number, Number)> {
        Some((self.as_number()?, other.as_number()?))
    }

    pub fn add(&self, other: &Value) -> Operation {
        match (&self.kind, &other.kind) {
            (ValueKind::Number(left), ValueKind::Number(right)) => {
                Ok(self.derived(ValueKind::Number(left.add(*right))))
            }
            (ValueKind::String(left), ValueKind::String(right)) => {
                Ok(self.derived(ValueKind::String(format!("{}{}", left, right))))
            }
            (ValueKind::List(elements), _) => {
                let mut elements = elements.clone();
                elements.push(other.clone());
                Ok(self.derived(ValueKind::List(elements)))
            }
            _ => Err(self.illegal_operation(Some(other))),
        }
    }

    pub fn sub(&self, other: &Value) -> Operation {
        match (&self.kind, &other.kind) {
            (ValueKind::Number(left), ValueKind::Number(right)) => {
                Ok(self.derived(ValueKind::Number(left.sub(*right))))
            }
            (ValueKind::List(elements), ValueKind::Number(index)) => {
                let index = index.to_index(elements.len()).ok_or_else(|| {
                    self.error(
                        format!(
                            "index out of bounds: cannot remove element {} from a list of length {}",
                            index,
                            elements.len()
                        ),
                        other.span.clone(),
                    )
                })?;

                let mut elements = elements.clone();
                elements.remove(index);
                Ok(self.derived(ValueKind::List(elements)))
            }
            _ => Err(self.illegal_operation(Some(other))),
        }
    }

    pub fn mul(&self, other: &Value) -> Operation {
        match (&self.kind, &other.kind) {
            (ValueKind::Number(left), ValueKind::Number(right)) => {
                Ok(self.derived(ValueKind::Number(left.mul(*right))))
            }
            (ValueKind::String(text), ValueKind::Number(Number::Int(count))) => {
                let count = usize::try_from(*count).unwrap_or(0);
                match text.len().checked_mul(count) {
                    Some(length) if length <= MAX_REPEATED_LENGTH => {
                        Ok(self.derived(ValueKind::String(text.repeat(count))))
                    }
                    _ => Err(self.error("String repetition too large", other.span.clone())),
                }
            }
            (ValueKind::List(left), ValueKind::List(right)) => {
                let mut elements = left.clone();
                elements.extend(right.iter().cloned());
                Ok(self.derived(ValueKind::List(elements)))
            }
            _ => Err(self.illegal_operation(Some(other))),
        }
    }

    pub fn div(&self, other: &Value) -> Operation {
        match (&self.kind, &other.kind) {
            (ValueKind::Number(left), ValueKind::Number(right)) => {
                if right.is_zero() {
                    return Err(self.error("Division by zero", other.span.clone()));
                }
                Ok(self.derived(ValueKind::Number(Number::Float(
                    left.as_f64() / right.as_f64(),
                ))))
            }
            (ValueKind::List(elements), ValueKind::Number(index)) => {
                match index.to_index(elements.len()) {
                    Some(index) => Ok(elements[index].clone()),
                    None => Err(self.error(
                        format!(
                            "index out of bounds: cannot retrieve element {} from a list of length {}",
                            index,
                            elements.len()
                        ),
                        other.span.clone(),
                    )),
                }
            }
            _ => Err(self.illegal_operation(Some(other))),
        }
    }

    pub fn pow(&self, other: &Value) -> Operation {
        match self.numbers(other) {
            Some((left, right)) => Ok(self.derived(ValueKind::Number(left.pow(right)))),
            None => Err(self.illegal_operation(Some(other))),
        }
    }

    pub fn eq(&self, other: &Value) -> Operation {
        Ok(self.derived(ValueKind::Number(Number::from_bool(self == other))))
    }

    pub fn ne(&self, other: &Value) -> Operation {
        Ok(self.derived(ValueKind::Number(Number::from_bool(self != other))))
    }

    fn ordering(&self, other: &Value, accept: fn(Ordering) -> bool) -> Operation {
        match self.numbers(other) {
            Some((left, right)) => {
                let holds = left.compare(right).map_or(false, accept);
                Ok(self.derived(ValueKind::Number(Number::from_bool(holds))))
            }
            None => Err(self.illegal_operation(Some(other))),
        }
    }

    pub fn lt(&self, other: &Value) -> Operation {
        self.ordering(other, Ordering::is_lt)
    }

    pub fn lte(&self, other: &Value) -> Operation {
        self.ordering(other, Ordering::is_le)
    }

    pub fn gt(&self, other: &Value) -> Operation {
        self.ordering(other, Ordering::is_gt)
    }

    pub fn gte(&self, other: &Value) -> Operation {
        self.ordering(other, Ordering::is_ge)
    }

    pub fn and(&self, other: &Value) -> Operation {
        match self.numbers(other) {
            Some((left, right)) => Ok(self.derived(ValueKind::Number(Number::from_bool(
                !left.is_zero() && !right.is_zero(),
            )))),
            None => Err(self.illegal_operation(Some(other))),
        }
    }

    pub fn or(&self, other: &Value) -> Operation {
        match self.numbers(other) {
            Some((left, right)) => Ok(self.derived(ValueKind::Number(Number::from_bool(
                !left.is_zero() || !right.is_zero(),
            )))),
            None => Err(self.illegal_operation(Some(other))),
        }
    }

    pub fn neg(&self) -> Operation {
        match self.kind {
            ValueKind::Number(number) => {
                Ok(self.derived(ValueKind::Number(Number::Int(0).sub(number))))
            }
            _ => Err(self.illegal_operation(None)),
        }
    }

    pub fn not(&self) -> Operation {
        match self.kind {
            ValueKind::Number(number) => {
                Ok(self.derived(ValueKind::Number(Number::from_bool(number.is_zero()))))
            }
            _ => Err(self.illegal_operation(None)),
        }
    }

    pub fn is_true(&self) -> bool {
        match &self.kind {
            ValueKind::Number(number) => !number.is_zero(),
            ValueKind::String(text) => !text.is_empty(),
            _ => false,
        }
    }

    /// The quoted form used by the REPL.
    pub fn repr(&self) -> String {
        match &self.kind {
            ValueKind::String(text) => format!("\"{}\"", text),
            ValueKind::List(elements) => format!(
                "[{}]",
                elements
                    .iter()
                    .map(Value::repr)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValueKind::Number(number) => write!(f, "{}", number),
            ValueKind::String(text) => f.write_str(text),
            ValueKind::List(elements) => write!(
                f,
                "{}",
                elements
                    .iter()
                    .map(|element| element.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ValueKind::Function(function) => write!(f, "<function {}>", function.display_name()),
            ValueKind::Builtin(builtin) => write!(f, "<built-in function {}>", builtin.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn list(values: &[i64]) -> Value {
        Value::list(values.iter().map(|value| Value::int(*value)).collect())
    }

    #[test]
    fn integer_arithmetic_promotes_on_float_operand() {
        assert_eq!(Value::int(2).add(&Value::int(3)).unwrap(), Value::int(5));
        assert!(matches!(
            Value::int(2).add(&Value::float(0.5)).unwrap().as_number(),
            Some(Number::Float(value)) if value == 2.5
        ));
    }

    #[test]
    fn string_repetition_is_bounded() {
        assert_eq!(Value::string("ab").mul(&Value::int(3)).unwrap(), Value::string("ababab"));
        assert_eq!(Value::string("ab").mul(&Value::int(-2)).unwrap(), Value::string(""));

        let error = Value::string("ab").mul(&Value::int(i64::MAX)).unwrap_err();
        assert_eq!(error.details, "String repetition too large");
    }

    #[test]
    fn division_always_yields_float() {
        let result = Value::int(7).div(&Value::int(2)).unwrap();
        assert_eq!(result.to_string(), "3.5");

        let whole = Value::int(4).div(&Value::int(2)).unwrap();
        assert_eq!(whole.to_string(), "2.0");
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let error = Value::int(1).div(&Value::int(0)).unwrap_err();
        assert_eq!(error.details, "Division by zero");
    }

    #[test]
    fn negative_exponent_yields_float() {
        let result = Value::int(2).pow(&Value::int(-3)).unwrap();
        assert_eq!(result.to_string(), "0.125");
        assert_eq!(Value::int(2).pow(&Value::int(10)).unwrap(), Value::int(1024));
    }

    #[test]
    fn integer_overflow_promotes_to_float() {
        let result = Value::int(i64::MAX).add(&Value::int(1)).unwrap();
        assert!(matches!(result.as_number(), Some(Number::Float(_))));
    }

    #[test]
    fn comparisons_produce_truth_numbers() {
        assert_eq!(Value::int(1).lt(&Value::int(2)).unwrap(), Value::int(1));
        assert_eq!(Value::int(2).lte(&Value::float(1.5)).unwrap(), Value::int(0));
        assert_eq!(Value::int(1).eq(&Value::float(1.0)).unwrap(), Value::int(1));
        assert_eq!(Value::int(1).eq(&Value::string("1")).unwrap(), Value::int(0));
    }

    #[test]
    fn strings_concatenate_and_repeat() {
        let joined = Value::string("ab").add(&Value::string("cd")).unwrap();
        assert_eq!(joined.to_string(), "abcd");

        let repeated = Value::string("ab").mul(&Value::int(3)).unwrap();
        assert_eq!(repeated.to_string(), "ababab");

        assert!(Value::string("a").sub(&Value::string("a")).is_err());
    }

    #[test]
    fn list_operators_return_fresh_lists() {
        let original = list(&[1, 2, 3]);

        let appended = original.add(&Value::int(4)).unwrap();
        let removed = original.sub(&Value::int(0)).unwrap();
        let joined = original.mul(&list(&[9])).unwrap();

        assert_eq!(original, list(&[1, 2, 3]));
        assert_eq!(appended, list(&[1, 2, 3, 4]));
        assert_eq!(removed, list(&[2, 3]));
        assert_eq!(joined, list(&[1, 2, 3, 9]));
    }

    #[test]
    fn list_indexing() {
        let values = list(&[1, 2, 3]);
        assert_eq!(values.div(&Value::int(1)).unwrap(), Value::int(2));
        assert_eq!(values.div(&Value::int(-1)).unwrap(), Value::int(3));

        let error = values.div(&Value::int(9)).unwrap_err();
        assert!(error.details.contains("index out of bounds"));
    }

    #[test]
    fn copied_list_does_not_alias() {
        let original = list(&[1, 2]);
        let mut copy = original.clone();
        assert_eq!(copy, original);

        if let ValueKind::List(elements) = &mut copy.kind {
            elements.push(Value::int(3));
        }

        assert_eq!(original, list(&[1, 2]));
        assert_eq!(copy, list(&[1, 2, 3]));
    }

    #[test]
    fn truthiness() {
        assert!(Value::int(3).is_true());
        assert!(!Value::null().is_true());
        assert!(Value::string("x").is_true());
        assert!(!Value::string("").is_true());
        assert!(!list(&[1]).is_true());
    }

    #[test]
    fn not_is_only_defined_for_numbers() {
        assert_eq!(Value::int(0).not().unwrap(), Value::int(1));
        assert_eq!(Value::int(5).not().unwrap(), Value::int(0));
        assert_eq!(Value::string("x").not().unwrap_err().details, "Illegal operation");
    }

    #[test]
    fn display_and_repr() {
        let values = Value::list(vec![Value::int(1), Value::string("a"), Value::float(2.5)]);
        assert_eq!(values.to_string(), "1, a, 2.5");
        assert_eq!(values.repr(), "[1, \"a\", 2.5]");
        assert_eq!(Value::builtin(Builtin::Print).to_string(), "<built-in function print>");
    }
}
