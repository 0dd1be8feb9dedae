use std::{
    collections::{HashMap, VecDeque},
    io,
    rc::Rc,
};

use basalt::{
    common::Source,
    context::ScopeRef,
    error::{Error, LexError},
    lexer::scan,
    token::TokenKind,
    Config, Host, Interpreter, Value,
};
use pretty_assertions::assert_eq;

#[derive(Debug, Default)]
struct CaptureHost {
    output: Vec<String>,
    input: VecDeque<String>,
    files: HashMap<String, String>,
    clears: usize,
}

impl CaptureHost {
    fn with_input(lines: &[&str]) -> Self {
        CaptureHost {
            input: lines.iter().map(|line| line.to_string()).collect(),
            ..CaptureHost::default()
        }
    }

    fn with_file(mut self, path: &str, text: &str) -> Self {
        self.files.insert(path.to_string(), text.to_string());
        self
    }
}

impl Host for CaptureHost {
    fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.output.push(text.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.input.pop_front())
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        self.clears += 1;
        Ok(())
    }

    fn read_source(&mut self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }
}

struct Outcome {
    result: Result<Value, Error>,
    globals: ScopeRef,
    host: CaptureHost,
}

impl Outcome {
    fn global(&self, name: &str) -> Value {
        self.globals
            .borrow()
            .get(name)
            .unwrap_or_else(|| panic!("'{}' is not bound", name))
    }

    /// The value of the last top-level statement.
    fn last(&self) -> Value {
        let values = self.result.as_ref().expect("program failed");
        values.as_list().and_then(|values| values.last()).cloned().expect("no statements")
    }

    fn error(&self) -> &Error {
        self.result.as_ref().err().expect("program succeeded")
    }
}

fn run_with(mut host: CaptureHost, config: Config, text: &str) -> Outcome {
    let (result, globals) = {
        let mut interpreter = Interpreter::new(&mut host, config.with_source_name("test.bas"));
        let result = interpreter.run(text);
        (result, Rc::clone(interpreter.globals()))
    };

    Outcome {
        result,
        globals,
        host,
    }
}

fn run(text: &str) -> Outcome {
    run_with(CaptureHost::default(), Config::default(), text)
}

fn ints(values: &[i64]) -> Value {
    Value::list(values.iter().map(|value| Value::int(*value)).collect())
}

#[test]
fn assignment_follows_precedence() {
    assert_eq!(run("VAR x = 1 + 2 * 3").global("x"), Value::int(7));
}

#[test]
fn for_loop_end_is_exclusive() {
    let outcome = run("VAR s = 0\nFOR i = 0 TO 3 THEN VAR s = s + i END");

    assert_eq!(outcome.global("s"), Value::int(3));
    assert_eq!(outcome.global("i"), Value::int(2));
    assert_eq!(outcome.last(), Value::null());
}

#[test]
fn arrow_function_returns_expression() {
    assert_eq!(run("FUN add(a, b) -> a + b\nadd(2, 3)").last(), Value::int(5));
}

#[test]
fn list_indexing_and_bounds() {
    assert_eq!(run("VAR l = [1,2,3]\nl/1").last(), Value::int(2));

    let outcome = run("VAR l = [1,2,3]\nl/9");
    let error = outcome.error();
    assert!(error.to_string().contains("index out of bounds"));
    assert_eq!(error.span().lexeme(), "9");
}

#[test]
fn while_break_terminates() {
    assert_eq!(run("WHILE TRUE THEN BREAK END").last(), Value::null());
}

#[test]
fn undefined_variable_has_one_frame_traceback() {
    let outcome = run("PRINT(y)");

    assert_eq!(outcome.error().to_string(), "Runtime Error: 'y' is not defined");
    assert_eq!(
        outcome.error().render(),
        "Traceback (most recent call last):\n  \
         File test.bas, line 1, in <program>\n\
         Runtime Error: 'y' is not defined\n\
         \n\
         PRINT(y)\n      ^"
    );
    assert!(outcome.host.output.is_empty());
}

#[test]
fn traceback_lists_every_call_frame() {
    let outcome = run("FUN inner() -> 1 / 0\nFUN outer()\n  RETURN inner()\nEND\nouter()");

    assert_eq!(
        outcome.error().render(),
        "Traceback (most recent call last):\n  \
         File test.bas, line 5, in <program>\n  \
         File test.bas, line 3, in outer\n  \
         File test.bas, line 1, in inner\n\
         Runtime Error: Division by zero\n\
         \n\
         FUN inner() -> 1 / 0\n                   ^"
    );
}

#[test]
fn loop_and_if_bodies_share_the_enclosing_scope() {
    let outcome = run("VAR n = 0\nWHILE n < 3 THEN\n  VAR seen = n\n  VAR n = n + 1\nEND\nIF 1 THEN VAR flag = 9");

    assert_eq!(outcome.global("seen"), Value::int(2));
    assert_eq!(outcome.global("flag"), Value::int(9));
}

#[test]
fn function_locals_stay_inside_the_call() {
    let outcome = run("FUN f()\n  VAR local = 1\nEND\nf()\nlocal");
    assert_eq!(outcome.error().to_string(), "Runtime Error: 'local' is not defined");

    let outcome = run("VAR x = 1\nFUN g() -> VAR x = 2\ng()\nx");
    assert_eq!(outcome.last(), Value::int(1));
}

#[test]
fn closures_see_later_assignments_in_their_defining_scope() {
    let program = "\
FUN make()
  FUN get() -> later
  VAR later = 42
  RETURN get
END
VAR g = make()
g()";

    assert_eq!(run(program).last(), Value::int(42));
}

#[test]
fn break_exits_only_the_innermost_loop() {
    let program = "\
VAR count = 0
FOR i = 0 TO 3 THEN
  FOR j = 0 TO 10 THEN
    IF j == 2 THEN BREAK
    VAR count = count + 1
  END
END";

    assert_eq!(run(program).global("count"), Value::int(6));
}

#[test]
fn continue_skips_only_the_current_iteration() {
    let program = "\
VAR total = 0
FOR i = 0 TO 5 THEN
  IF i == 2 THEN CONTINUE
  VAR total = total + i
END";
    assert_eq!(run(program).global("total"), Value::int(8));

    assert_eq!(
        run("FOR i = 0 TO 4 THEN IF i == 1 THEN CONTINUE ELSE i").last(),
        ints(&[0, 2, 3])
    );
}

#[test]
fn return_unwinds_nested_loops() {
    let program = "\
FUN find(limit)
  FOR i = 0 TO limit THEN
    WHILE TRUE THEN
      IF i == 3 THEN RETURN i * 10
      BREAK
    END
  END
  RETURN -1
END
VAR found = find(10)
VAR missing = find(2)";
    let outcome = run(program);

    assert_eq!(outcome.global("found"), Value::int(30));
    assert_eq!(outcome.global("missing"), Value::int(-1));
}

#[test]
fn arity_errors_report_the_exact_count() {
    let outcome = run("FUN f(a, b) -> a\nf(1, 2, 3)");
    assert_eq!(
        outcome.error().to_string(),
        "Runtime Error: 1 too many arguments passed into <function f>"
    );

    let outcome = run("FUN f(a, b, c) -> a\nf(1)");
    assert_eq!(
        outcome.error().to_string(),
        "Runtime Error: 2 too few arguments passed into <function f>"
    );

    let outcome = run("LEN()");
    assert_eq!(
        outcome.error().to_string(),
        "Runtime Error: 1 too few arguments passed into <built-in function len>"
    );
}

#[test]
fn copied_lists_do_not_alias() {
    let outcome = run("VAR a = [1, 2]\nVAR b = a\nAPPEND(b, 3)\nVAR c = a + 9\nPOP(c, 0)");

    assert_eq!(outcome.global("a"), ints(&[1, 2]));
    assert_eq!(outcome.global("b"), ints(&[1, 2, 3]));
    assert_eq!(outcome.global("c"), ints(&[2, 9]));
    assert_eq!(outcome.last(), Value::int(1));
}

#[test]
fn list_builtins() {
    let outcome = run("VAR l = [1]\nEXTEND(l, [2, 3])\nVAR n = LEN(l)\nPOP(l, -1)");

    assert_eq!(outcome.global("l"), ints(&[1, 2]));
    assert_eq!(outcome.global("n"), Value::int(3));
    assert_eq!(outcome.last(), Value::int(3));

    let outcome = run("APPEND(1, 2)");
    assert_eq!(outcome.error().to_string(), "Runtime Error: First argument must be list");
}

#[test]
fn printing_uses_display_form() {
    let outcome = run("PRINT([1, \"a\", 7 / 2, 4 / 2])\nVAR s = PRINT_RET(\"x\" * 3)\nCLS()");

    assert_eq!(outcome.host.output, vec!["1, a, 3.5, 2.0".to_string()]);
    assert_eq!(outcome.global("s"), Value::string("xxx"));
    assert_eq!(outcome.host.clears, 1);
}

#[test]
fn type_predicates() {
    let outcome = run("[IS_NUM(1), IS_STR(\"s\"), IS_LIST([]), IS_FUN(PRINT), IS_FUN(1)]");
    assert_eq!(outcome.last(), ints(&[1, 1, 1, 1, 0]));
}

#[test]
fn input_int_prompts_until_valid() {
    let host = CaptureHost::with_input(&["abc", " 12 "]);
    let outcome = run_with(host, Config::default(), "VAR name = INPUT_INT()");

    assert_eq!(outcome.global("name"), Value::int(12));
    assert_eq!(
        outcome.host.output,
        vec!["'abc' must be an integer. Try again!".to_string()]
    );
}

#[test]
fn input_reads_lines_until_closed() {
    let host = CaptureHost::with_input(&["hello"]);
    let outcome = run_with(host, Config::default(), "VAR a = INPUT()\nVAR b = INPUT()");

    assert_eq!(outcome.global("a"), Value::string("hello"));
    assert_eq!(
        outcome.error().to_string(),
        "Runtime Error: input stream is closed"
    );
}

#[test]
fn run_shares_the_global_scope() {
    let host = CaptureHost::default().with_file("lib.bas", "VAR shared = 7\nFUN twice(x) -> x * 2");
    let outcome = run_with(host, Config::default(), "RUN(\"lib.bas\")\ntwice(shared)");

    assert_eq!(outcome.last(), Value::int(14));
}

#[test]
fn run_wraps_nested_failures() {
    let host = CaptureHost::default().with_file("bad.bas", "VAR a = 1 / 0");
    let outcome = run_with(host, Config::default(), "RUN(\"bad.bas\")");
    let message = outcome.error().to_string();

    assert!(message.starts_with("Runtime Error: Failed to finish executing script \"bad.bas\"\n"));
    assert!(message.contains("File bad.bas, line 1, in <program>"));
    assert!(message.contains("Division by zero"));

    let outcome = run("RUN(\"missing.bas\")");
    assert!(outcome
        .error()
        .to_string()
        .starts_with("Runtime Error: Failed to load script \"missing.bas\""));
}

#[test]
fn illegal_operation_spans_both_operands() {
    let outcome = run("VAR x = 1 + \"a\"");

    assert_eq!(outcome.error().to_string(), "Runtime Error: Illegal operation");
    assert_eq!(outcome.error().span().lexeme(), "1 + \"a\"");
}

#[test]
fn oversized_string_repetition_is_a_runtime_error() {
    let outcome = run("\"ab\" * 9223372036854775807");

    assert_eq!(outcome.error().to_string(), "Runtime Error: String repetition too large");
    assert_eq!(outcome.error().span().lexeme(), "9223372036854775807");
}

#[test]
fn deeply_nested_source_runs_without_exhausting_the_stack() {
    let text = format!("VAR x = 1{}", " + 1".repeat(20_000));
    assert_eq!(run(&text).global("x"), Value::int(20_001));

    let text = format!("{}7{}", "(".repeat(5_000), ")".repeat(5_000));
    assert_eq!(run(&text).last(), Value::int(7));
}

#[test]
fn stray_token_where_a_statement_belongs() {
    let outcome = run(")");
    let message = outcome.error().to_string();

    assert!(message.starts_with("Invalid Syntax: Expected 'RETURN', 'CONTINUE'"));
    assert!(message.ends_with("NEWLINE or EOF"));

    let outcome = run("FUN f()\n  )\nEND");
    assert!(outcome.error().to_string().ends_with("'NOT' or 'END'"));
}

#[test]
fn functions_compare_by_identity() {
    let outcome = run("FUN f() -> 1\nFUN h() -> 1\nVAR g = f\n[g == f, h == f, [1, [2]] == [1, [2]], 1 == \"1\"]");
    assert_eq!(outcome.last(), ints(&[1, 0, 1, 0]));
}

#[test]
fn unterminated_string_fails_to_scan() {
    let outcome = run("VAR s = \"abc");

    assert!(matches!(
        outcome.error(),
        Error::Lex(LexError::ExpectedCharacter { .. })
    ));
    assert!(outcome.error().render().contains("File test.bas, line 1"));
}

#[test]
fn syntax_errors_surface_through_the_pipeline() {
    let outcome = run("VAR x = (1 + 2");
    assert_eq!(outcome.error().to_string(), "Invalid Syntax: Expected ')'");
}

#[test]
fn deep_recursion_within_the_limit_succeeds() {
    let outcome = run("FUN sum(n) -> IF n == 0 THEN 0 ELSE n + sum(n - 1)\nsum(500)");
    assert_eq!(outcome.last(), Value::int(125250));
}

#[test]
fn runaway_recursion_is_a_recursion_error() {
    let config = Config::default().with_max_call_depth(64);
    let outcome = run_with(CaptureHost::default(), config, "FUN f(n) -> f(n + 1)\nf(0)");

    assert!(matches!(outcome.error(), Error::Recursion(_)));
    assert_eq!(
        outcome.error().to_string(),
        "Recursion Error: maximum call depth of 64 exceeded"
    );
}

#[test]
fn globals_persist_between_runs() {
    let mut host = CaptureHost::default();
    let mut interpreter = Interpreter::new(&mut host, Config::default());

    interpreter.run("VAR counter = 1").unwrap();
    let value = interpreter.run("VAR counter = counter + 1\ncounter").unwrap();
    assert_eq!(value, ints(&[2, 2]));
}

#[test]
fn token_spans_reconstruct_the_source() {
    let programs = [
        "VAR x = 1 + 2 * 3",
        "FUN add(a, b) -> a + b\nadd(2, 3)",
        "FOR i = 0 TO 10 STEP 2 THEN\n\tPRINT(i)\nEND",
        "IF a >= 1 THEN [1, 2] ELSE b != c",
    ];

    for text in programs {
        let tokens = scan(&Source::new("<test>", text)).unwrap();
        let rebuilt = tokens
            .iter()
            .filter(|token| token.kind != TokenKind::Eof)
            .map(|token| token.span.lexeme())
            .collect::<String>();
        let expected = text
            .chars()
            .filter(|c| *c != ' ' && *c != '\t')
            .collect::<String>();

        assert_eq!(rebuilt, expected);
    }
}
