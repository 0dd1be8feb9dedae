use basalt::{Config, Host, Interpreter, Value, ValueKind};
use rustyline::{error::ReadlineError, DefaultEditor};
use tracing::debug;

const PROMPT: &str = "basalt > ";

/// Reads lines until EOF, evaluating each against one interpreter so global
/// bindings carry over between lines.
pub fn run(host: &mut dyn Host, config: Config) -> Result<(), ReadlineError> {
    let mut editor = DefaultEditor::new()?;
    let mut interpreter = Interpreter::new(host, config);

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return Ok(()),
            Err(error) => return Err(error),
        };

        if line.trim().is_empty() {
            continue;
        }
        editor.add_history_entry(line.as_str())?;

        match interpreter.run(&line) {
            Ok(value) => {
                if let Some(text) = display(&value) {
                    println!("{}", text);
                }
            }
            Err(error) => {
                debug!(%error, "line failed");
                eprintln!("{}", error.render());
            }
        }
    }
}

/// The text echoed for a line's statement values: the single value's repr,
/// or the whole list when the line held several statements.
fn display(value: &Value) -> Option<String> {
    match &value.kind {
        ValueKind::List(values) if values.is_empty() => None,
        ValueKind::List(values) if values.len() == 1 => Some(values[0].repr()),
        _ => Some(value.repr()),
    }
}
