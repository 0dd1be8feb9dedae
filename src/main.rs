use std::{fs, path::PathBuf, process};

use basalt::{Config, Interpreter, StdHost};
use clap::{ArgAction, Parser};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod repl;

#[derive(Debug, Parser)]
#[command(name = "basalt", version, about = "Run basalt scripts or start a REPL")]
struct Cli {
    /// Script to run
    #[arg(value_name = "FILE", conflicts_with = "eval")]
    file: Option<PathBuf>,

    /// Run CODE instead of a file
    #[arg(short, long, value_name = "CODE")]
    eval: Option<String>,

    /// Nested calls allowed before a recursion error
    #[arg(long, value_name = "N", default_value_t = Config::default().max_call_depth)]
    max_depth: usize,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "basalt=debug",
        _ => "basalt=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::default().with_max_call_depth(cli.max_depth);
    let mut host = StdHost;

    let (name, text) = match (cli.file, cli.eval) {
        (Some(path), _) => match fs::read_to_string(&path) {
            Ok(text) => (path.display().to_string(), text),
            Err(error) => {
                eprintln!("Failed to load script \"{}\"\n{}", path.display(), error);
                process::exit(1);
            }
        },
        (None, Some(code)) => ("<eval>".to_string(), code),
        (None, None) => {
            if let Err(error) = repl::run(&mut host, config) {
                eprintln!("{}", error);
                process::exit(1);
            }
            return;
        }
    };

    let mut interpreter = Interpreter::new(&mut host, config.with_source_name(name));
    if let Err(error) = interpreter.run(&text) {
        eprintln!("{}", error.render());
        process::exit(1);
    }
}
