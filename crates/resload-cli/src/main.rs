#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod logging;

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result};
use resload_core::{LoadError, LoadOptions, LoaderConfig, Resolved, Structure};
use resload_runtime::{Loaded, Loader};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "resload")]
#[command(author, version, about = "Load local or remote resources, executing code modules", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit a JSON document on stdout and JSON log lines on stderr
    #[arg(long)]
    json: bool,

    /// Directory or base URL that relative references resolve against
    #[arg(long, value_name = "PATH_OR_URL")]
    base_path: Option<String>,

    /// Directory context for code modules, overriding their own location
    #[arg(long, value_name = "DIR")]
    dirname: Option<PathBuf>,

    /// References to load: paths or URLs
    #[arg(required = true, value_name = "REFERENCE")]
    references: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json);

    let mut options = LoadOptions::new();
    if let Some(base) = &cli.base_path {
        options = options.with_base_path(base.as_str());
    }
    if let Some(dirname) = &cli.dirname {
        options = options.with_dirname(dirname.as_path());
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    rt.block_on(run(&cli, &options))
}

async fn run(cli: &Cli, options: &LoadOptions) -> Result<()> {
    let loader = Loader::with_config(LoaderConfig::from_env()).map_err(diagnostic)?;

    let structure: Structure<()> =
        Structure::List(cli.references.iter().map(Structure::reference).collect());
    let resolved = loader
        .load_structure(structure, options)
        .await
        .map_err(diagnostic)?;

    let Resolved::List(items) = resolved else {
        return Err(miette!("unexpected result shape"));
    };

    if cli.json {
        let mut document = serde_json::Map::new();
        for (reference, item) in cli.references.iter().zip(&items) {
            document.insert(reference.clone(), to_json(item)?);
        }
        let text = serde_json::to_string_pretty(&Value::Object(document)).into_diagnostic()?;
        println!("{text}");
        return Ok(());
    }

    for item in &items {
        match item.as_loaded() {
            Some(Loaded::Text(text)) => print!("{text}"),
            Some(loaded @ Loaded::Module(_)) => {
                let exports = loaded.to_json().map_err(diagnostic)?;
                println!("{}", serde_json::to_string_pretty(&exports).into_diagnostic()?);
            }
            None => {}
        }
    }
    Ok(())
}

fn to_json(item: &Resolved<Loaded, ()>) -> Result<Value> {
    item.as_loaded()
        .map_or(Ok(Value::Null), Loaded::to_json)
        .map_err(diagnostic)
}

fn diagnostic(err: LoadError) -> miette::Report {
    miette!(code = err.code(), "{err}")
}
