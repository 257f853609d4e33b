//! Concept compiler CLI.
//!
//! Provides the `concepta` binary. Every subcommand reads a JSON array of
//! concepts (the parser's output), runs it through the standard library's
//! plugins and prints a JSON summary on stdout. Logs and diagnostics go to
//! stderr.
//!
//! - `expand` stops at the expansion fixpoint,
//! - `check` also validates,
//! - `compile` emits artifacts into `--out` and flushes order records.
//!
//! All three share `concepta_codegen`'s pipeline functions, so their results
//! agree with library callers.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use concepta_codegen::{
    check_input, compile_with, expand_input, Artifact, CompileError, CompileOptions, Expanded,
};
use concepta_core::concept::ConceptSpec;
use concepta_storage::{InMemoryOrderStore, OrderStore, SqliteOrderStore};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str =
    "warn,concepta=info,concepta_core=info,concepta_check=info,concepta_codegen=info,concepta_storage=info";

/// Concept expansion and code generation.
#[derive(Parser)]
#[command(name = "concepta", about = "Concept expansion and code generation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every subcommand.
#[derive(Args, Debug)]
struct Pipeline {
    /// JSON file with the input concepts.
    #[arg(short, long)]
    input: PathBuf,

    /// SQLite order repository (default: in memory, discarded on exit).
    #[arg(long)]
    orders: Option<String>,

    /// JSON file with compile options; flags override it.
    #[arg(long)]
    options: Option<PathBuf>,

    /// Expansion scans before giving up on a fixpoint.
    #[arg(long)]
    max_iterations: Option<usize>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Expand the input to a fixpoint and list the resulting concepts.
    Expand {
        #[command(flatten)]
        pipeline: Pipeline,
    },

    /// Expand and validate the input.
    Check {
        #[command(flatten)]
        pipeline: Pipeline,
    },

    /// Compile the input and write one file per destination.
    Compile {
        #[command(flatten)]
        pipeline: Pipeline,

        /// Output directory.
        #[arg(short, long, default_value = "./generated")]
        out: PathBuf,

        /// Emit destinations in parallel.
        #[arg(long)]
        parallel: bool,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Expand { pipeline } => run_expand(&pipeline),
        Commands::Check { pipeline } => run_check(&pipeline),
        Commands::Compile {
            pipeline,
            out,
            parallel,
        } => run_compile(&pipeline, &out, parallel),
    };
    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Everything a subcommand needs before running the pipeline.
struct Loaded {
    input: Vec<ConceptSpec>,
    options: CompileOptions,
    store: Box<dyn OrderStore>,
}

/// Reads the input, options and order store named by `pipeline`.
///
/// On failure the error is already printed; the exit code is returned.
fn load(pipeline: &Pipeline, parallel: bool) -> Result<Loaded, i32> {
    let input = read_json::<Vec<ConceptSpec>>(&pipeline.input)?;

    let mut options = match &pipeline.options {
        Some(path) => read_json::<CompileOptions>(path)?,
        None => CompileOptions::default(),
    };
    if let Some(max_iterations) = pipeline.max_iterations {
        options.max_iterations = max_iterations;
    }
    options.parallel_emission |= parallel;

    let store: Box<dyn OrderStore> = match &pipeline.orders {
        Some(path) => match SqliteOrderStore::new(path) {
            Ok(store) => Box::new(store),
            Err(e) => {
                eprintln!("Error: failed to open order repository '{}': {}", path, e);
                return Err(3);
            }
        },
        None => Box::new(InMemoryOrderStore::new()),
    };

    tracing::debug!(concepts = input.len(), ?options, "input loaded");
    Ok(Loaded {
        input,
        options,
        store,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, i32> {
    let text = fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        3
    })?;
    serde_json::from_str(&text).map_err(|e| {
        eprintln!("Error: invalid JSON in '{}': {}", path.display(), e);
        3
    })
}

/// Prints `err` and maps it to an exit code: 1 = compilation error,
/// 2 = validation failure, 3 = I/O or storage error.
fn report_error(err: &CompileError) -> i32 {
    match err {
        CompileError::Validation(report) => {
            eprintln!("Validation failed with {} error(s):", report.len());
            for error in &report.errors {
                eprintln!("  - {}", error);
            }
            2
        }
        CompileError::Emission(failures) => {
            eprintln!("Emission failed for {} destination(s):", failures.len());
            for failure in failures {
                eprintln!("  - {}", failure);
            }
            1
        }
        CompileError::Storage(e) => {
            eprintln!("Storage error: {}", e);
            3
        }
        CompileError::Publish(reason) => {
            eprintln!("Error: {}", reason);
            3
        }
        CompileError::Core(e) => {
            eprintln!("Compilation error: {}", e);
            1
        }
    }
}

fn print_json(value: &serde_json::Value) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

/// Summary of a fixpoint graph; nothing is written back to the store.
fn expanded_json(expanded: &Expanded) -> serde_json::Value {
    let graph = &expanded.graph;
    let concepts: Vec<serde_json::Value> = graph
        .iter()
        .map(|(id, _)| {
            json!({
                "id": id,
                "concept": graph.describe(id),
                "origin": graph.origin(id).map(|origin| origin.rule.clone()),
            })
        })
        .collect();
    json!({
        "expansion": expanded.report,
        "concepts": concepts,
        "order_records_pending": expanded.orders.pending().len(),
    })
}

/// Execute the expand subcommand.
fn run_expand(pipeline: &Pipeline) -> i32 {
    let loaded = match load(pipeline, false) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let records = match loaded.store.load_records() {
        Ok(records) => records,
        Err(e) => return report_error(&CompileError::Storage(e)),
    };
    match expand_input(&loaded.input, &concepta_stdlib::registry(), records, &loaded.options) {
        Ok(expanded) => {
            print_json(&expanded_json(&expanded));
            0
        }
        Err(e) => report_error(&e),
    }
}

/// Execute the check subcommand.
fn run_check(pipeline: &Pipeline) -> i32 {
    let loaded = match load(pipeline, false) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let records = match loaded.store.load_records() {
        Ok(records) => records,
        Err(e) => return report_error(&CompileError::Storage(e)),
    };
    match check_input(&loaded.input, &concepta_stdlib::registry(), records, &loaded.options) {
        Ok(expanded) => {
            print_json(&expanded_json(&expanded));
            0
        }
        Err(e) => report_error(&e),
    }
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 = success, 1 = compilation error,
/// 2 = validation failure, 3 = I/O or storage error.
///
/// Files are written before order records are flushed, so a failed write
/// leaves the order repository as it was.
fn run_compile(pipeline: &Pipeline, out: &Path, parallel: bool) -> i32 {
    let mut loaded = match load(pipeline, parallel) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let mut files = Vec::new();
    let output = match compile_with(
        &loaded.input,
        &concepta_stdlib::registry(),
        loaded.store.as_mut(),
        &loaded.options,
        |artifacts| write_artifacts(out, artifacts, &mut files),
    ) {
        Ok(output) => output,
        Err(e) => return report_error(&e),
    };

    print_json(&json!({
        "artifacts": files,
        "expansion": output.expansion,
        "concepts": output.concepts,
        "order_records_added": output.order_records_added,
    }));
    0
}

/// Writes `<out>/<destination>.cs` for every artifact, recording each file.
fn write_artifacts(
    out: &Path,
    artifacts: &[Artifact],
    files: &mut Vec<serde_json::Value>,
) -> Result<(), CompileError> {
    fs::create_dir_all(out).map_err(|e| {
        CompileError::Publish(format!("failed to create '{}': {}", out.display(), e))
    })?;
    for artifact in artifacts {
        let path = out.join(format!("{}.cs", artifact.destination));
        fs::write(&path, &artifact.text).map_err(|e| {
            CompileError::Publish(format!("failed to write '{}': {}", path.display(), e))
        })?;
        files.push(json!({
            "destination": artifact.destination,
            "path": path.display().to_string(),
        }));
    }
    Ok(())
}
