//! A small dynamically typed scripting language: source text is scanned into
//! tokens, parsed by recursive descent and evaluated by a tree-walking
//! interpreter with lexical closures, lists and traceback-carrying errors.
//!
//! ```no_run
//! let value = basalt::run("<demo>", "FUN add(a, b) -> a + b\nadd(2, 3)").unwrap();
//! assert_eq!(value.to_string(), "<function add>, 5");
//! ```

pub mod ast;
pub mod builtins;
pub mod common;
pub mod config;
pub mod context;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod signal;
mod stack;
pub mod token;
pub mod value;

pub use builtins::{Builtin, Host, StdHost};
pub use config::Config;
pub use error::Error;
pub use interpreter::Interpreter;
pub use value::{Number, Value, ValueKind};

/// Runs one program against a fresh global scope, talking to the terminal.
pub fn run(source_name: &str, text: &str) -> Result<Value, Error> {
    let mut host = StdHost;
    let config = Config::default().with_source_name(source_name);
    Interpreter::new(&mut host, config).run(text)
}
