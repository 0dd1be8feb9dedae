use std::{
    f64::consts::PI,
    fs,
    io::{self, BufRead, Write},
    rc::Rc,
};

use tracing::debug;

use crate::{
    common::Span,
    context::{Context, Scope},
    error::RuntimeError,
    interpreter::Interpreter,
    signal::Signal,
    value::{Value, ValueKind},
};

/// Everything the built-ins need from the outside world.
pub trait Host {
    fn write_line(&mut self, text: &str) -> io::Result<()>;

    /// Reads one line without its terminator, `None` once input is exhausted.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    fn clear_screen(&mut self) -> io::Result<()>;

    fn read_source(&mut self, path: &str) -> io::Result<String>;
}

/// Terminal and file system.
#[derive(Debug, Default)]
pub struct StdHost;

impl Host for StdHost {
    fn write_line(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", text)?;
        stdout.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(&['\r', '\n'][..]).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "\x1B[2J\x1B[1;1H")?;
        stdout.flush()
    }

    fn read_source(&mut self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    PrintRet,
    Input,
    InputInt,
    Clear,
    IsNumber,
    IsString,
    IsList,
    IsFunction,
    Append,
    Pop,
    Extend,
    Len,
    Run,
}

/// Global names bound to each built-in. `CLS` is an alias of `CLEAR`.
const GLOBAL_FUNCTIONS: &[(&str, Builtin)] = &[
    ("PRINT", Builtin::Print),
    ("PRINT_RET", Builtin::PrintRet),
    ("INPUT", Builtin::Input),
    ("INPUT_INT", Builtin::InputInt),
    ("CLEAR", Builtin::Clear),
    ("CLS", Builtin::Clear),
    ("IS_NUM", Builtin::IsNumber),
    ("IS_STR", Builtin::IsString),
    ("IS_LIST", Builtin::IsList),
    ("IS_FUN", Builtin::IsFunction),
    ("APPEND", Builtin::Append),
    ("POP", Builtin::Pop),
    ("EXTEND", Builtin::Extend),
    ("LEN", Builtin::Len),
    ("RUN", Builtin::Run),
];

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::PrintRet => "print_ret",
            Builtin::Input => "input",
            Builtin::InputInt => "input_int",
            Builtin::Clear => "clear",
            Builtin::IsNumber => "is_number",
            Builtin::IsString => "is_string",
            Builtin::IsList => "is_list",
            Builtin::IsFunction => "is_function",
            Builtin::Append => "append",
            Builtin::Pop => "pop",
            Builtin::Extend => "extend",
            Builtin::Len => "len",
            Builtin::Run => "run",
        }
    }

    pub fn params(&self) -> &'static [&'static str] {
        match self {
            Builtin::Print
            | Builtin::PrintRet
            | Builtin::IsNumber
            | Builtin::IsString
            | Builtin::IsList
            | Builtin::IsFunction => &["value"],
            Builtin::Input | Builtin::InputInt | Builtin::Clear => &[],
            Builtin::Append => &["list", "value"],
            Builtin::Pop => &["list", "index"],
            Builtin::Extend => &["first_list", "second_list"],
            Builtin::Len => &["list"],
            Builtin::Run => &["fn"],
        }
    }

    /// Built-ins that update the list passed as their first argument.
    pub fn mutates_first_argument(&self) -> bool {
        matches!(self, Builtin::Append | Builtin::Pop | Builtin::Extend)
    }
}

/// Populates a fresh global scope with the constants and built-ins every
/// program starts with.
pub fn install(scope: &mut Scope) {
    scope.set("NULL", Value::null());
    scope.set("FALSE", Value::boolean(false));
    scope.set("TRUE", Value::boolean(true));
    scope.set("MATH_PI", Value::float(PI));

    for (name, builtin) in GLOBAL_FUNCTIONS {
        scope.set(*name, Value::builtin(*builtin));
    }
}

impl Interpreter<'_> {
    /// Runs `builtin` with arity-checked `args`. List-mutating built-ins
    /// leave the updated list in `args[0]`.
    pub(crate) fn execute_builtin(
        &mut self,
        builtin: Builtin,
        args: &mut [Value],
        call_site: &Span,
        frame: &Rc<Context>,
    ) -> Signal {
        let fail = |details: String| Signal::failure(RuntimeError::new(details, call_site.clone(), frame));
        let io_fail = |error: io::Error| fail(format!("I/O failure in {}: {}", builtin.name(), error));

        let value = match builtin {
            Builtin::Print => {
                if let Err(error) = self.host.write_line(&args[0].to_string()) {
                    return io_fail(error);
                }
                Value::null()
            }
            Builtin::PrintRet => Value::string(args[0].to_string()),
            Builtin::Input => match self.host.read_line() {
                Ok(Some(line)) => Value::string(line),
                Ok(None) => return fail("input stream is closed".to_string()),
                Err(error) => return io_fail(error),
            },
            Builtin::InputInt => loop {
                let line = match self.host.read_line() {
                    Ok(Some(line)) => line,
                    Ok(None) => return fail("input stream is closed".to_string()),
                    Err(error) => return io_fail(error),
                };

                match line.trim().parse::<i64>() {
                    Ok(number) => break Value::int(number),
                    Err(_) => {
                        let retry = format!("'{}' must be an integer. Try again!", line);
                        if let Err(error) = self.host.write_line(&retry) {
                            return io_fail(error);
                        }
                    }
                }
            },
            Builtin::Clear => {
                if let Err(error) = self.host.clear_screen() {
                    return io_fail(error);
                }
                Value::null()
            }
            Builtin::IsNumber => Value::boolean(matches!(args[0].kind, ValueKind::Number(_))),
            Builtin::IsString => Value::boolean(matches!(args[0].kind, ValueKind::String(_))),
            Builtin::IsList => Value::boolean(matches!(args[0].kind, ValueKind::List(_))),
            Builtin::IsFunction => Value::boolean(args[0].is_callable()),
            Builtin::Append => {
                let element = args[1].clone();
                match &mut args[0].kind {
                    ValueKind::List(elements) => elements.push(element),
                    _ => return fail("First argument must be list".to_string()),
                }
                Value::null()
            }
            Builtin::Pop => {
                let index = match args[1].as_number() {
                    Some(index) => index,
                    None => return fail("Second argument must be number".to_string()),
                };

                match &mut args[0].kind {
                    ValueKind::List(elements) => match index.to_index(elements.len()) {
                        Some(index) => elements.remove(index),
                        None => {
                            return fail(
                                "Element at this index could not be removed from list because index is out of bounds"
                                    .to_string(),
                            )
                        }
                    },
                    _ => return fail("First argument must be list".to_string()),
                }
            }
            Builtin::Extend => {
                let extra = match &args[1].kind {
                    ValueKind::List(elements) => elements.clone(),
                    _ => return fail("Second argument must be list".to_string()),
                };

                match &mut args[0].kind {
                    ValueKind::List(elements) => elements.extend(extra),
                    _ => return fail("First argument must be list".to_string()),
                }
                Value::null()
            }
            Builtin::Len => match &args[0].kind {
                ValueKind::List(elements) => Value::int(elements.len() as i64),
                _ => return fail("Argument must be list".to_string()),
            },
            Builtin::Run => {
                let path = match &args[0].kind {
                    ValueKind::String(path) => path.clone(),
                    _ => return fail("Argument must be string".to_string()),
                };

                let text = match self.host.read_source(&path) {
                    Ok(text) => text,
                    Err(error) => {
                        return fail(format!("Failed to load script \"{}\"\n{}", path, error))
                    }
                };

                debug!(script = %path, "running nested script");
                if let Err(error) = self.run_source(&path, &text) {
                    return fail(format!(
                        "Failed to finish executing script \"{}\"\n{}",
                        path,
                        error.render()
                    ));
                }
                Value::null()
            }
        };

        Signal::success(value)
    }
}
