//! Henry command-line interface.
//!
//! JSON goes to stdout, logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use henry_core::{
    ImportResult, ImportWorker, InpOptions, ReductionOptions, Settings, SolverOptions,
    import_file, import_geometry, parse_zc_mat, probe, run_solver, write_inp,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "henry")]
#[command(about = "Reduce STEP geometry to FastHenry filaments and run the solver", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (RON); defaults are used when absent
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report the preferred available CAD backend
    Probe,

    /// Import a STEP file into nodes and segments
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// CAD backend (opencascade, native)
        #[arg(long)]
        backend: Option<String>,

        /// Run the kernel in this process instead of an isolated worker
        #[arg(long)]
        in_process: bool,

        /// Merge tolerance in model units
        #[arg(long)]
        tolerance: Option<f64>,

        /// Also write a FastHenry input file
        #[arg(long, value_name = "OUT")]
        inp: Option<PathBuf>,
    },

    /// Isolated import worker (internal)
    #[command(hide = true)]
    Worker {
        path: PathBuf,
        backend: String,
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Run the field solver on a FastHenry input file
    Solve {
        #[arg(value_name = "INP")]
        input: PathBuf,

        #[command(flatten)]
        options: SolveArgs,

        /// Exit with an error when the solver exits nonzero
        #[arg(long)]
        strict: bool,
    },

    /// Browse the example library
    Examples {
        #[command(subcommand)]
        command: ExamplesCommand,
    },

    /// Parse a Zc.mat impedance matrix file
    Results {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ExamplesCommand {
    /// List example files
    List,
    /// Print one example file
    Show { name: String },
}

#[derive(clap::Args)]
struct SolveArgs {
    /// Solution technique (-s)
    #[arg(long)]
    solver: Option<String>,
    /// Matrix-vector product method (-m)
    #[arg(long)]
    matvec: Option<String>,
    /// Preconditioner (-p)
    #[arg(long)]
    precond: Option<String>,
    /// Multipole expansion order (-o)
    #[arg(long)]
    order: Option<u32>,
    /// Iterative tolerance (-t)
    #[arg(long)]
    tol: Option<f64>,
    /// Maximum iterations (-c)
    #[arg(long)]
    maxiters: Option<u32>,
}

impl From<SolveArgs> for SolverOptions {
    fn from(args: SolveArgs) -> Self {
        Self {
            solver: args.solver,
            matvec: args.matvec,
            precond: args.precond,
            order: args.order,
            tol: args.tol,
            maxiters: args.maxiters,
        }
    }
}

fn main() -> Result<ExitCode> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "henry_cli=info,henry_core=info,henry_cad=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Probe => {
            print_json(&probe())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Import {
            file,
            backend,
            in_process,
            tolerance,
            inp,
        } => run_import(&settings, &file, backend, in_process, tolerance, inp.as_deref()),
        Command::Worker {
            path,
            backend,
            tolerance,
        } => {
            let options = reduction(&settings, tolerance);
            report(import_file(&path, &backend, &options))
        }
        Command::Solve {
            input,
            options,
            strict,
        } => {
            let inp = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let output = run_solver(&inp, &settings.solver, &options.into())?;
            print_json(&output)?;
            if strict {
                if let Err(err) = output.check() {
                    eprintln!("{}", err);
                    return Ok(ExitCode::FAILURE);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Examples { command } => {
            match command {
                ExamplesCommand::List => print_json(&settings.library.list()?)?,
                ExamplesCommand::Show { name } => match settings.library.fetch(&name)? {
                    Some(text) => print!("{}", text),
                    None => {
                        eprintln!("example '{}' not found", name);
                        return Ok(ExitCode::FAILURE);
                    }
                },
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Results { file } => {
            let text =
                fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            print_json(&parse_zc_mat(&text))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_import(
    settings: &Settings,
    file: &Path,
    backend: Option<String>,
    in_process: bool,
    tolerance: Option<f64>,
    inp: Option<&Path>,
) -> Result<ExitCode> {
    let data = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let options = reduction(settings, tolerance);
    let backend = backend.or_else(|| settings.import.backend.clone());

    let result = if in_process {
        import_geometry(&data, backend.as_deref(), &options)
    } else {
        ImportWorker::current_exe()
            .map(|worker| worker.with_timeout(settings.import.timeout()))
            .and_then(|worker| worker.run(&data, backend.as_deref(), &options))
    };

    if let (Ok(model), Some(out)) = (&result, inp) {
        let title = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let options = InpOptions {
            title,
            ..Default::default()
        };
        fs::write(out, write_inp(model, &options))
            .with_context(|| format!("writing {}", out.display()))?;
        tracing::info!("Wrote {}", out.display());
    }

    report(result)
}

fn reduction(settings: &Settings, tolerance: Option<f64>) -> ReductionOptions {
    let mut options = settings.import.reduction();
    if let Some(tolerance) = tolerance {
        options.merge_tolerance = tolerance;
    }
    options
}

/// Print a result or a structured error; the error message is also the last
/// stderr line, which is what a parent falls back to
fn report(result: henry_core::Result<ImportResult>) -> Result<ExitCode> {
    match result {
        Ok(model) => {
            print_json(&model)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_json(&err.to_payload())?;
            eprintln!("{}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
