use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use rq_api::RunScriptOptions;
use rq_core::{ScriptContext, ScriptKind, ScriptResult};
use rq_engine::ScriptRunner;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "rq-cli")]
#[command(about = "reqscript engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Run a script against a context file and emit the result as JSON.
    Run(RunArgs),
    /// Compile-check a script without executing it.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long = "script")]
    script: PathBuf,
    #[arg(long = "context")]
    context: PathBuf,
    #[arg(long = "kind")]
    kind: String,
    #[arg(long = "result-out")]
    result_out: Option<PathBuf>,
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,
    #[arg(long = "seed")]
    seed: Option<u32>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[arg(long = "script")]
    script: PathBuf,
    #[arg(long = "kind", default_value = "pre-request")]
    kind: String,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse context {path}: {source}")]
    ParseContext {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write result {path}: {source}")]
    WriteResult {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize result: {0}")]
    SerializeResult(serde_json::Error),
    #[error("{0}")]
    InvalidKind(String),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {}", error);
            1
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Mode::Run(args) => run_script_file(args),
        Mode::Check(args) => check_script_file(args),
    }
}

fn run_script_file(args: RunArgs) -> Result<i32, CliError> {
    let script_text = read_file(&args.script)?;
    let context = load_context(&args.context)?;
    let kind = parse_kind(&args.kind)?;

    let options = RunScriptOptions {
        timeout: args.timeout_ms.map(Duration::from_millis),
        cancel: None,
        random_seed: args.seed,
    };
    let result = rq_api::run_script(&script_text, &context, kind, options);
    emit_result(&result, args.result_out.as_deref())?;

    Ok(if result.succeeded { 0 } else { 2 })
}

fn check_script_file(args: CheckArgs) -> Result<i32, CliError> {
    let script_text = read_file(&args.script)?;
    let kind = parse_kind(&args.kind)?;

    match ScriptRunner::default().check(&script_text, kind) {
        Ok(()) => {
            println!("ok");
            Ok(0)
        }
        Err(error) => {
            eprintln!("{}", error);
            Ok(2)
        }
    }
}

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn load_context(path: &Path) -> Result<ScriptContext, CliError> {
    let text = read_file(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::ParseContext {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_kind(value: &str) -> Result<ScriptKind, CliError> {
    value.parse().map_err(CliError::InvalidKind)
}

fn emit_result(result: &ScriptResult, result_out: Option<&Path>) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(result).map_err(CliError::SerializeResult)?;
    match result_out {
        Some(path) => fs::write(path, json).map_err(|source| CliError::WriteResult {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}
