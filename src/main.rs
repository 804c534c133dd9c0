//! gqlc: GraphQL client document compiler
//!
//! Usage:
//!   gqlc compile <schema> <documents>...   Compile and print the documents
//!   gqlc check <schema> <documents>...     Report diagnostics only

use std::env;
use std::process::ExitCode;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gqlc::cli::{check_command, compile_command, CompileArgs};

fn main() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(ExitCode::SUCCESS);
    }

    let ok = match args[1].as_str() {
        "compile" => {
            setup_logging();
            compile_command(&CompileArgs::parse(&args[2..])?)?
        }
        "check" => {
            setup_logging();
            check_command(&CompileArgs::parse(&args[2..])?)?
        }
        "help" | "--help" | "-h" => {
            print_usage();
            true
        }
        "--version" | "-V" | "version" => {
            print_version();
            true
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            false
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_usage() {
    println!(
        r#"gqlc: GraphQL client document compiler

USAGE:
    gqlc <COMMAND> <SCHEMA> <DOCUMENTS>... [OPTIONS]

COMMANDS:
    compile                Compile documents and print the rewritten documents
    check                  Compile documents and report diagnostics only
    help                   Show this help message

OPTIONS:
    --config <FILE>        Project configuration (JSON)
    --db <PATH>            Keep the IR in a SQLite file instead of memory

EXAMPLES:
    gqlc check schema.graphql src/queries/*.graphql
    gqlc compile schema.graphql app.graphql --config gqlc.json --db .gqlc/ir.db

Set RUST_LOG=debug for per-document logging.
"#
    );
}

fn print_version() {
    println!("gqlc {}", env!("CARGO_PKG_VERSION"));
}

fn setup_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
