use crate::{common::Span, error::Error, value::Value};

/// The outcome of evaluating one node. Anything other than a plain value
/// makes the enclosing evaluation stop and hand the signal upwards until a
/// loop (break, continue) or a call (return) intercepts it.
#[derive(Debug, Default)]
pub struct Signal {
    pub value: Option<Value>,
    pub error: Option<Error>,
    pub function_return: Option<Value>,
    pub loop_continue: bool,
    pub loop_break: bool,
    /// Where a `BREAK` or `CONTINUE` was raised.
    pub origin: Option<Span>,
}

impl Signal {
    pub fn success(value: Value) -> Self {
        Signal {
            value: Some(value),
            ..Signal::default()
        }
    }

    pub fn failure(error: impl Into<Error>) -> Self {
        Signal {
            error: Some(error.into()),
            ..Signal::default()
        }
    }

    pub fn function_return(value: Value) -> Self {
        Signal {
            function_return: Some(value),
            ..Signal::default()
        }
    }

    pub fn loop_break(origin: Span) -> Self {
        Signal {
            loop_break: true,
            origin: Some(origin),
            ..Signal::default()
        }
    }

    pub fn loop_continue(origin: Span) -> Self {
        Signal {
            loop_continue: true,
            origin: Some(origin),
            ..Signal::default()
        }
    }

    pub fn should_unwind(&self) -> bool {
        self.error.is_some() || self.function_return.is_some() || self.loop_control()
    }

    /// True for a pending `BREAK` or `CONTINUE`.
    pub fn loop_control(&self) -> bool {
        self.loop_break || self.loop_continue
    }

    pub fn keyword(&self) -> &'static str {
        if self.loop_break {
            "BREAK"
        } else {
            "CONTINUE"
        }
    }
}

/// Evaluates to the signal's value, or returns the signal from the enclosing
/// function when it has to unwind.
macro_rules! unwind {
    ($signal:expr) => {{
        let signal: $crate::signal::Signal = $signal;
        if signal.should_unwind() {
            return signal;
        }
        signal.value.unwrap_or_else($crate::value::Value::null)
    }};
}

pub(crate) use unwind;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Position, Source};

    fn origin() -> Span {
        let source = Source::new("<test>", "BREAK");
        Span::new(&source, Position::default(), Position::default().next())
    }

    fn first_of(signals: Vec<Signal>) -> Signal {
        for signal in signals {
            let value = unwind!(signal);
            if value.is_true() {
                return Signal::success(value);
            }
        }
        Signal::success(Value::null())
    }

    #[test]
    fn plain_values_do_not_unwind() {
        assert!(!Signal::success(Value::int(1)).should_unwind());
    }

    #[test]
    fn every_control_flag_unwinds() {
        assert!(Signal::function_return(Value::null()).should_unwind());
        assert!(Signal::loop_break(origin()).should_unwind());
        assert!(Signal::loop_continue(origin()).should_unwind());
    }

    #[test]
    fn unwind_stops_at_first_control_signal() {
        let signal = first_of(vec![
            Signal::success(Value::int(0)),
            Signal::loop_break(origin()),
            Signal::success(Value::int(7)),
        ]);

        assert!(signal.loop_break);
        assert_eq!(signal.keyword(), "BREAK");
        assert!(signal.value.is_none());
    }
}
