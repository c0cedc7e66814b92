extern crate env_logger;
extern crate rustyline;
extern crate treadle;

use std::env::args;
use std::fs::File;
use std::io::Read;
use std::process::exit;

use rustyline::error::ReadlineError;

use treadle::interpreter::interpret;
use treadle::vm::{default_env, GcShared, Scope};

fn main() {
    env_logger::init();

    let arguments: Vec<String> = args().skip(1).collect();
    match arguments.len() {
        0 => run_stdin(),
        1 if arguments[0] == "-i" || arguments[0] == "--interactive" => run_repl(),
        1 => run_file(&arguments[0]),
        _ => {
            eprintln!("usage: treadle [-i | path to file]");
            exit(2);
        }
    }
}

fn run_stdin() {
    let mut source = String::new();
    if let Err(error) = ::std::io::stdin().read_to_string(&mut source) {
        eprintln!("error reading standard input: {}", error);
        exit(1);
    }
    run(&source);
}

fn run_file(path: &str) {
    let mut source = String::new();
    let read = File::open(path).and_then(|mut file| file.read_to_string(&mut source));
    if let Err(error) = read {
        eprintln!("error reading {}: {}", path, error);
        exit(1);
    }
    run(&source);
}

fn run(source: &str) {
    let environment = default_env();
    match interpret(source, &environment) {
        Ok(value) => println!("{}", value),
        Err(error) => {
            eprintln!("error: {}", error);
            exit(1);
        }
    }
}

fn run_repl() {
    let mut editor = match rustyline::DefaultEditor::new() {
        Ok(editor) => editor,
        Err(error) => {
            eprintln!("error: {}", error);
            exit(1);
        }
    };

    let environment: GcShared<Scope> = default_env();

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(error) => {
                eprintln!("error: {}", error);
                break;
            }
        };

        let _ = editor.add_history_entry(line.as_str());

        match interpret(&line, &environment) {
            Ok(value) => println!("{}", value),
            Err(error) => eprintln!("error: {}", error),
        }
    }
}
