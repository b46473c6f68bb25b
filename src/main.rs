// ABOUTME: CLI entry point and the interactive REPL driver

use arena_lisp::config;
use arena_lisp::eval::Interp;
use arena_lisp::reader::{Parsed, Reader};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::path::PathBuf;

/// Lisp interpreter on a fixed cell arena with mark/sweep collection
#[derive(Parser, Debug)]
#[command(name = "arena-lisp")]
#[command(version = config::VERSION)]
#[command(about = "A small Common-Lisp-flavored interpreter")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Number of memory cells in the arena
    #[arg(long = "cells", value_name = "N", default_value_t = config::MEMORY_CELLS)]
    cells: usize,

    /// Used-memory percentage that triggers a collection
    #[arg(long = "gc-trigger", value_name = "PCT", default_value_t = config::GC_TRIGGER_PCT)]
    gc_trigger: u32,
}

fn main() {
    let args = CliArgs::parse();
    if let Err(error) = run(args) {
        println!("\n{}\nExiting.", error);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut interp = Interp::new(args.cells, args.gc_trigger)?;

    if let Some(script) = args.script {
        let path = script.to_string_lossy().to_string();
        if !interp.run_file(&path)? {
            return Err(format!("Cannot read script file {}", path).into());
        }
        return Ok(());
    }

    banner(&interp);
    repl(&mut interp)
}

fn banner(interp: &Interp) {
    let cells = interp.heap.capacity();
    println!(
        "{} memory cells available ({} KB)",
        cells,
        cells * interp.heap.bytes_per_cell() / 1024
    );
    println!("Type ?<enter> for help.");
}

fn repl(interp: &mut Interp) -> Result<(), Box<dyn std::error::Error>> {
    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl = DefaultEditor::with_config(rl_config)
        .map_err(|error| format!("Failed to initialize REPL: {}", error))?;
    let _ = rl.load_history(config::HISTORY_FILE);
    let mut last_line = String::new();

    loop {
        let prompt = format!("{}% REPL> ", interp.heap.used_pct());
        match rl.readline(&prompt) {
            Ok(line) => {
                let mut line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if line == "?" {
                    println!("{}", config::REPL_HELP);
                    continue;
                }
                if line == "+" {
                    println!("{}", last_line);
                    line = last_line.clone();
                }

                let mut reader = Reader::from_line(&line);
                let parsed = reader.parse(&mut interp.heap)?;
                let expr = match parsed {
                    Parsed::Expr(addr) if reader.ok() => addr,
                    Parsed::EndOfInput if reader.ok() => {
                        last_line = line;
                        continue;
                    }
                    _ => interp.heap.nil()?,
                };
                let result = interp.eval_top(expr)?;
                println!("{}", interp.heap.display(result));
                last_line = line;
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => {
                eprintln!("Error: {}", error);
                break;
            }
        }
    }

    let _ = rl.save_history(config::HISTORY_FILE);
    Ok(())
}
