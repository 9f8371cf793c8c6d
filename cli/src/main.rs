// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A thin embedding example for `tiny42js_engine` (spec §1's "REPL
//! driver" / "command-line wrapper", both explicitly excluded from the
//! core). Registers `print` as a trivial host native — the only
//! built-in library content this demo supplies — and formats uncaught
//! errors by hand via `console` rather than pulling in `anyhow`.

use clap::{Parser as ClapParser, Subcommand};
use console::style;
use tiny42js_engine::{new_engine, ConsoleLevel, Options};

#[derive(Debug, ClapParser)]
#[command(name = "tiny42js")]
#[command(about = "An embeddable JavaScript-like script runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Runs a script file to completion.
    #[command(arg_required_else_help = true)]
    Run {
        path: String,
        /// Upper bound on nested function call depth before a
        /// `RangeError` is raised (spec §4.7's recursion guard).
        #[arg(long, default_value_t = 1024)]
        max_call_depth: u32,
    },
    /// Runs a script file and prints its last expression's value.
    #[command(arg_required_else_help = true)]
    Eval {
        path: String,
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },
}

fn main() -> std::process::ExitCode {
    let args = Cli::parse();
    match args.command {
        Commands::Run { path, max_call_depth } => run(&path, max_call_depth),
        Commands::Eval { path, verbose } => eval(&path, verbose),
    }
}

fn new_demo_engine(max_call_depth: u32) -> tiny42js_engine::Engine {
    let mut engine = new_engine(Options { max_call_depth, ..Options::default() });
    engine.set_console(|level, message| {
        let tag = match level {
            ConsoleLevel::Error => style("error").red().to_string(),
            ConsoleLevel::Warn => style("warn").yellow().to_string(),
            ConsoleLevel::Info => style("info").cyan().to_string(),
            ConsoleLevel::Log => style("log").dim().to_string(),
        };
        println!("[{tag}] {message}");
    });
    engine
        .add_native("function print(message)", |ctx| {
            let text = ctx.engine.to_string_value(ctx.arg(0)).map_err(|c| ctx.engine.completion_to_js_error(c))?;
            println!("{text}");
            ctx.engine.console_write(ConsoleLevel::Log, &text);
            Ok(tiny42js_engine::value::Value::Undefined)
        })
        .expect("well-formed native signature");
    engine
}

fn run(path: &str, max_call_depth: u32) -> std::process::ExitCode {
    let Ok(source) = std::fs::read_to_string(path) else {
        eprintln!("{} could not read {path}", style("error:").red().bold());
        return std::process::ExitCode::FAILURE;
    };
    let mut engine = new_demo_engine(max_call_depth);
    match engine.execute(&source, path) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            report_error(path, &err);
            std::process::ExitCode::FAILURE
        }
    }
}

fn eval(path: &str, verbose: bool) -> std::process::ExitCode {
    let Ok(source) = std::fs::read_to_string(path) else {
        eprintln!("{} could not read {path}", style("error:").red().bold());
        return std::process::ExitCode::FAILURE;
    };
    let mut engine = new_demo_engine(1024);
    match engine.evaluate(&source, path) {
        Ok(value) => {
            println!("{value}");
            std::process::ExitCode::SUCCESS
        }
        Err(err) => {
            if verbose {
                eprintln!("{err:?}");
            }
            report_error(path, &err);
            std::process::ExitCode::FAILURE
        }
    }
}

fn report_error(path: &str, err: &tiny42js_engine::error::JsError) {
    eprintln!("{} {}: {}", style("uncaught").red().bold(), err.kind.name(), err.message);
    eprintln!("  {} {path} ({})", style("at").dim(), err.at);
}
