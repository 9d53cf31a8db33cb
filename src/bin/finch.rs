use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{fmt, fs};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use finch::{printer, Error, Interpreter};

const EXIT_USAGE: u8 = 64;
const EXIT_DATA: u8 = 65;
const EXIT_SOFTWARE: u8 = 70;

/// Run a finch script, or start the interactive prompt when no script is given.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path of the script to run.
    script: Option<PathBuf>,

    /// Print the scanned tokens before running.
    #[arg(long)]
    tokens: bool,

    /// Print the parsed program instead of running it.
    #[arg(long)]
    ast: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match &args.script {
        Some(path) => run_file(path, &args),
        None => run_prompt(&args),
    }
}

fn run_file(path: &Path, args: &Args) -> ExitCode {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => {
            eprintln!("Could not read script at '{}': {error}", path.display());
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let mut output_writer = io::stdout();
    let mut interpreter = Interpreter::new(&mut output_writer);
    match run(&contents, &mut interpreter, args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            display_error(&error);
            match error {
                Error::Scan(_) | Error::Parse(_) => ExitCode::from(EXIT_DATA),
                Error::Runtime(_) => ExitCode::from(EXIT_SOFTWARE),
            }
        }
    }
}

fn run_prompt(args: &Args) -> ExitCode {
    println!("Welcome to the interactive prompt for the finch interpreter.\n");

    let stdin = io::stdin();
    let mut output_writer = io::stdout();
    let mut interpreter = Interpreter::new(&mut output_writer);
    let mut buffer = String::new();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return ExitCode::from(EXIT_USAGE);
        }

        buffer.clear();
        match stdin.lock().read_line(&mut buffer) {
            // end of input
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(error) => {
                eprintln!("Could not read from stdin: {error}");
                return ExitCode::from(EXIT_USAGE);
            }
        }

        if let Err(error) = run(&buffer, &mut interpreter, args) {
            display_error(&error);
        }
    }
}

fn run(code: &str, interpreter: &mut Interpreter, args: &Args) -> Result<(), Error> {
    let tokens = finch::scan(code)?;
    if args.tokens {
        for token in &tokens {
            println!("{token}");
        }
    }

    let statements = finch::parse(&tokens)?;
    if args.ast {
        print!("{}", printer::print_program(&statements));
        return Ok(());
    }

    interpreter.interpret_all(&statements)?;
    Ok(())
}

fn display_error(error: &impl fmt::Display) {
    eprintln!(" *** An error occurred while running the script ***");
    eprintln!("{error}\n");
}
