//! Command implementations for CLI operations

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::config::ProjectConfig;
use crate::printer::print_all;
use crate::{CompileOutput, Compiler};

use super::db_utils::{open_store, read_documents, read_file};

/// Inputs shared by `compile` and `check`
#[derive(Debug, Clone, Default)]
pub struct CompileArgs {
    pub schema: PathBuf,
    pub documents: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub db: Option<PathBuf>,
}

impl CompileArgs {
    /// Parse `<schema> <documents>... [--config file] [--db path]`
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut config = None;
        let mut db = None;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--config needs a file"))?;
                    config = Some(PathBuf::from(value));
                }
                "--db" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--db needs a path"))?;
                    db = Some(PathBuf::from(value));
                }
                _ => positional.push(PathBuf::from(arg)),
            }
        }

        if positional.is_empty() {
            anyhow::bail!("Missing schema file");
        }
        let schema = positional.remove(0);
        Ok(Self {
            schema,
            documents: positional,
            config,
            db,
        })
    }
}

fn run(args: &CompileArgs) -> Result<(Compiler, CompileOutput)> {
    let config = match &args.config {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::default(),
    };
    let schema = read_file(&args.schema)?;
    let documents = read_documents(&args.documents)?;
    info!("Compiling {} documents", documents.len());

    let store = open_store(args.db.as_deref(), config.worker_count())?;
    let compiler = Compiler::new(store, config);
    let output = compiler.compile(&schema, &documents)?;
    Ok((compiler, output))
}

fn report(output: &CompileOutput) {
    if !output.diagnostics.is_empty() {
        eprintln!("{}", output.diagnostics);
    }
    let stats = &output.stats;
    eprintln!("\nCompile complete!");
    eprintln!("  Documents: {}", stats.documents);
    eprintln!("  Selections: {}", stats.selections);
    eprintln!("  Lists: {}", stats.lists);
    eprintln!("  Fragment clones: {}", stats.fragment_clones);
    if !output.diagnostics.is_empty() {
        eprintln!("  Diagnostics: {}", output.diagnostics.len());
    }
}

/// Compile and print every resulting document. Returns whether the compile
/// was free of errors.
pub fn compile_command(args: &CompileArgs) -> Result<bool> {
    let (compiler, output) = run(args)?;
    if !output.diagnostics.has_errors() {
        let conn = compiler.store().connection()?;
        println!("{}", print_all(&conn)?);
    }
    report(&output);
    Ok(!output.diagnostics.has_errors())
}

/// Compile and report diagnostics only
pub fn check_command(args: &CompileArgs) -> Result<bool> {
    let (_, output) = run(args)?;
    report(&output);
    Ok(!output.diagnostics.has_errors())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let args = CompileArgs::parse(&strings(&[
            "schema.graphql",
            "a.graphql",
            "--db",
            "out/ir.db",
            "b.graphql",
            "--config",
            "gqlc.json",
        ]))
        .unwrap();
        assert_eq!(args.schema, PathBuf::from("schema.graphql"));
        assert_eq!(
            args.documents,
            vec![PathBuf::from("a.graphql"), PathBuf::from("b.graphql")]
        );
        assert_eq!(args.db, Some(PathBuf::from("out/ir.db")));
        assert_eq!(args.config, Some(PathBuf::from("gqlc.json")));
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(CompileArgs::parse(&[]).is_err());
        assert!(CompileArgs::parse(&strings(&["schema.graphql", "--db"])).is_err());
    }

    #[test]
    fn test_check_command() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.graphql");
        std::fs::write(&schema, "type User { id: ID! name: String } type Query { user: User }").unwrap();
        let good = dir.path().join("good.graphql");
        std::fs::write(&good, "query Good { user { id name } }").unwrap();
        let bad = dir.path().join("bad.graphql");
        std::fs::write(&bad, "query Bad { user { id @required } }").unwrap();

        let args = CompileArgs {
            schema: schema.clone(),
            documents: vec![good.clone()],
            ..Default::default()
        };
        assert!(check_command(&args).unwrap());
        assert!(compile_command(&args).unwrap());

        let args = CompileArgs {
            schema,
            documents: vec![good, bad],
            db: Some(dir.path().join("ir.db")),
            ..Default::default()
        };
        assert!(!check_command(&args).unwrap());
    }
}
