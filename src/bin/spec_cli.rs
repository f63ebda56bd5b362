//! elevenlabs-spec: 操作规范树的验证、列举与查询工具
//!
//! Usage:
//!   elevenlabs-spec validate [--file <path>]       Validate a spec tree
//!   elevenlabs-spec list [--file <path>]           List all operation ids
//!   elevenlabs-spec show <operation> [--file <path>]  Show one operation

use anyhow::{bail, Context, Result};
use elevenlabs_rust::protocol::{OperationRegistry, SpecLoader, SpecTree};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let outcome = match args[1].as_str() {
        "validate" => cmd_validate(&args[2..]).await,
        "list" => cmd_list(&args[2..]).await,
        "show" => cmd_show(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"elevenlabs-spec: ElevenLabs 操作规范命令行工具

USAGE:
    elevenlabs-spec <COMMAND> [OPTIONS]

COMMANDS:
    validate [--file <path>]          Validate a spec tree (JSON or YAML)
    list [--file <path>]              List all operation ids
    show <operation> [--file <path>]  Show the request shape of one operation
    version                           Show version information
    help                              Show this help message

ENVIRONMENT:
    ELEVENLABS_SPEC_PATH              Spec tree used when --file is not given
                                      (defaults to the embedded tree)"#
    );
}

fn cmd_version() {
    println!("elevenlabs-spec {}", env!("CARGO_PKG_VERSION"));
}

fn resolve_spec_path(args: &[String]) -> Option<PathBuf> {
    for (i, arg) in args.iter().enumerate() {
        if arg == "--file" {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    std::env::var("ELEVENLABS_SPEC_PATH").ok().map(PathBuf::from)
}

async fn load_tree(args: &[String]) -> Result<(String, SpecTree)> {
    let loader = SpecLoader::new();
    match resolve_spec_path(args) {
        Some(path) => {
            let tree = loader
                .load_from_file(&path)
                .await
                .with_context(|| format!("loading {}", path.display()))?;
            Ok((path.display().to_string(), tree))
        }
        None => Ok(("<embedded>".to_string(), loader.embedded()?)),
    }
}

async fn cmd_validate(args: &[String]) -> Result<()> {
    let (source, tree) = load_tree(args).await?;
    println!("Spec tree: {source}");

    let registry = OperationRegistry::from_tree(&tree).context("validation failed")?;
    println!(
        "{} operation(s) across {} top-level resource(s) are valid.",
        registry.len(),
        tree.children.len()
    );
    Ok(())
}

async fn cmd_list(args: &[String]) -> Result<()> {
    let (source, tree) = load_tree(args).await?;
    let registry = OperationRegistry::from_tree(&tree)?;

    println!("Operations in {source}:");
    println!();
    for id in registry.ids() {
        let spec = registry.get(id)?;
        let marker = if spec.is_streaming() { " (stream)" } else { "" };
        println!(
            "  {:<40} {:<6} {}{}",
            id, spec.request.method, spec.request.path.template, marker
        );
    }
    println!();
    println!("Total: {} operation(s)", registry.len());
    Ok(())
}

async fn cmd_show(args: &[String]) -> Result<()> {
    let Some(id) = args.first().filter(|a| !a.starts_with("--")) else {
        bail!("Usage: elevenlabs-spec show <operation> [--file <path>]");
    };
    let (_, tree) = load_tree(&args[1..]).await?;
    let registry = OperationRegistry::from_tree(&tree)?;
    let spec = registry.get(id)?;

    println!("Operation: {id}");
    if let Some(doc) = &spec.doc {
        println!("  {doc}");
    }
    println!();
    println!("Request:");
    println!("  method:     {}", spec.request.method);
    println!("  path:       {}", spec.request.path.template);
    println!("  streaming:  {}", spec.is_streaming());
    println!("  multipart:  {}", spec.request.force_multipart || !spec.request.files.is_empty());

    if !spec.positional_params.is_empty() || !spec.keyword_params.is_empty() {
        println!();
        println!("Parameters:");
        for decl in &spec.positional_params {
            let need = if decl.has_default() { "positional" } else { "required" };
            println!("  {:<32} {need}", decl.name);
        }
        for decl in &spec.keyword_params {
            let default = if decl.has_default() {
                decl.default
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            } else {
                "-".to_string()
            };
            println!("  {:<32} optional (default {default})", decl.name);
        }
    }

    if !spec.request.query.is_empty() {
        println!();
        println!("Query:");
        for entry in &spec.request.query {
            println!("  {}", entry.name);
        }
    }

    if !spec.request.files.is_empty() {
        println!();
        println!("Files:");
        for mapping in &spec.request.files {
            println!("  {}", mapping.name);
        }
    }

    println!();
    println!("{}", serde_json::to_string_pretty(&spec.request)?);
    Ok(())
}
