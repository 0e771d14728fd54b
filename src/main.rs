use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::process::ExitCode;

use minischeme::Error;
use minischeme::ast::{Value, render};
use minischeme::environment::Environment;
use minischeme::evaluator::{EvalConfig, create_global_env};
use minischeme::runner::{RunOptions, needs_more_input, run_file, run_source};

/// Evaluation recurses on the host stack, so it runs on a thread with room for deep programs.
const INTERPRETER_STACK_SIZE: usize = 512 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "minischeme", version, about = "A minimal Scheme interpreter")]
struct Cli {
    /// Source file to run; starts the REPL when neither a file nor --eval is given
    file: Option<PathBuf>,

    /// Evaluate the given source text and exit
    #[arg(short = 'e', long = "eval", value_name = "EXPR", conflicts_with = "file")]
    eval: Option<String>,

    /// Maximum evaluation depth (0 for unbounded)
    #[arg(long, value_name = "N", default_value_t = 10_000)]
    max_depth: usize,

    /// Keep unreachable frames instead of sweeping them after each form
    #[arg(long)]
    no_gc: bool,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            eval: EvalConfig {
                max_depth: (self.max_depth > 0).then_some(self.max_depth),
            },
            collect_garbage: !self.no_gc,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let worker = std::thread::Builder::new()
        .name("minischeme".to_owned())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || run(&cli));

    match worker.map(|handle| handle.join()) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => {
            eprintln!("minischeme: the interpreter encountered an unexpected error and must exit");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("minischeme: cannot start interpreter thread: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> ExitCode {
    let options = cli.run_options();
    let mut env = create_global_env();

    let summary = if let Some(source) = &cli.eval {
        run_source(source, &mut env, &options, print_result)
    } else if let Some(path) = &cli.file {
        match run_file(path, &mut env, &options, print_result) {
            Ok(summary) => summary,
            Err(e) => {
                println!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        return run_repl(&mut env, &options);
    };

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_result(result: &Result<Value, Error>) {
    match result {
        Ok(value) => {
            if let Some(text) = render(value) {
                println!("{text}");
            }
        }
        Err(e) => println!("Error: {e}"),
    }
}

fn run_repl(env: &mut Environment, options: &RunOptions) -> ExitCode {
    println!("minischeme {}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            println!("Error: could not initialize line editor: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Lines of an expression still waiting for its closing parenthesis
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            "minischeme> "
        } else {
            "...> "
        };

        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    match line.trim() {
                        "" => continue,
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(env);
                            continue;
                        }
                        ":quit" | ":exit" | "exit" => break,
                        _ => {}
                    }
                }

                pending.push_str(&line);
                pending.push('\n');
                if needs_more_input(&pending) {
                    continue;
                }

                let _ = rl.add_history_entry(pending.trim_end());
                run_source(&pending, env, options, print_result);
                pending.clear();
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => break,
            Err(err) => {
                println!("Error: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    println!("Goodbye!");
    ExitCode::SUCCESS
}

fn print_help() {
    println!("Commands:");
    println!("  :help        - Show this help message");
    println!("  :env         - Show global bindings");
    println!("  :quit, :exit - Exit the interpreter (so does `exit` or Ctrl+D)");
    println!();
    println!("Language:");
    println!("  Numbers: 42, -5, 2.5    Booleans: #t #f    Comments: ; to end of line");
    println!("  Special forms: if, define, lambda, and, or");
    println!("  Primitives: + - * / = < > <= >= not");
    println!();
    println!("Examples:");
    println!("  (define add-one (lambda (x) (+ x 1)))");
    println!("  (add-one 99)");
    println!("  (and #t (> 5 3))");
    println!();
}

fn print_environment(env: &Environment) {
    let (primitives, user_defined): (Vec<_>, Vec<_>) = env
        .global_bindings()
        .into_iter()
        .partition(|(_, value)| matches!(value, Value::Primitive { .. }));

    if !primitives.is_empty() {
        println!("Primitives ({}):", primitives.len());
        for row in primitives.chunks(6) {
            let names: Vec<String> = row.iter().map(|(name, _)| format!("{name:<6}")).collect();
            println!("  {}", names.join(" ").trim_end());
        }
        println!();
    }

    if user_defined.is_empty() {
        println!("No user-defined bindings.");
    } else {
        println!("User-defined ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
