//! looptile Command Line Interface
//!
//! Usage:
//!   looptile [OPTIONS] <input-file>
//!   looptile --help
//!
//! Examples:
//!   looptile add.kern                          # untiled + tiled C++ side by side
//!   looptile --target=c --tile-size=32 add.kern  # C, with T bound to 32
//!   looptile --emit=tiled-ir add.kern          # dump the tiled IR tree
//!   looptile --emit=json --no-tiling add.kern  # untiled IR as JSON

use clap::{Parser, ValueEnum};
use looptile::codegen::{self, EmitConfig, Target};
use looptile::frontend::TensorTable;
use looptile::utils::errors::{LexerError, ParseError, SemanticError};
use looptile::utils::location::{SourceMap, Span};
use looptile::utils::pretty::PrettyPrint;
use looptile::TileConfig;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Result, Context};
use log::{info, debug, error};

/// looptile - tile two-level loop nests and emit C/C++
#[derive(Parser, Debug)]
#[command(name = "looptile")]
#[command(version)]
#[command(about = "Tile two-level loop nests and emit C/C++", long_about = None)]
struct Cli {
    /// Input kernel description
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// What to emit
    #[arg(long, default_value = "code")]
    emit: EmitKind,

    /// Code generation target
    #[arg(short, long, default_value = "cpp")]
    target: TargetArg,

    /// Bind the tile-size symbol to this value in generated code
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(i64).range(1..))]
    tile_size: Option<i64>,

    /// Name of the tile-size symbol
    #[arg(long, value_name = "NAME", default_value = "T")]
    tile_symbol: String,

    /// Disable loop tiling
    #[arg(long)]
    no_tiling: bool,

    /// Kernel base name (defaults to the input file stem)
    #[arg(long)]
    name: Option<String>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetArg {
    /// C99 with a MIN macro
    C,
    /// C++ with std::min
    Cpp,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::C => Target::C,
            TargetArg::Cpp => Target::Cpp,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitKind {
    /// Generated source code
    Code,
    /// IR tree before tiling
    Ir,
    /// IR tree after tiling
    TiledIr,
    /// Final IR tree as JSON
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("looptile v{}", looptile::VERSION);
    debug!("Input file: {:?}", cli.input);

    // Read input file
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read input file: {:?}", cli.input))?;

    info!("Parsing...");
    let kernel = match looptile::parse_kernel(&source, &TensorTable::with_defaults()) {
        Ok(kernel) => kernel,
        Err(e) => {
            report_source_error(&source, &e);
            return Err(e.context("Failed to parse input"));
        }
    };

    let tile_config = TileConfig::default()
        .with_tiling(!cli.no_tiling)
        .with_tile_symbol(cli.tile_symbol.as_str());
    debug!("Tile config: {:?}", tile_config);
    let tile = || {
        info!("Tiling...");
        looptile::tile_kernel(&kernel, &tile_config)
    };

    let output = match cli.emit {
        EmitKind::Ir => kernel.pretty(),
        EmitKind::TiledIr => tile()?.pretty(),
        EmitKind::Json => serde_json::to_string_pretty(&tile()?).context("Failed to serialize IR")?,
        EmitKind::Code => {
            let emit_config = build_emit_config(&cli);
            debug!("Emit config: {:?}", emit_config);
            info!("Generating code...");
            if cli.no_tiling {
                codegen::generate(&kernel, &emit_config)?
            } else {
                codegen::generate_pair(&kernel, &tile()?, &emit_config)?
            }
        }
    };

    write_output(&cli.output, &output)
}

fn build_emit_config(cli: &Cli) -> EmitConfig {
    let mut config = EmitConfig::default()
        .with_target(cli.target.into())
        .with_name(kernel_name(cli))
        .with_tile_symbol(cli.tile_symbol.as_str());
    config.tile_size = cli.tile_size;
    config
}

/// The `--name` value, or the input file stem made into a C identifier.
fn kernel_name(cli: &Cli) -> String {
    if let Some(name) = &cli.name {
        return name.clone();
    }
    let stem = Path::new(&cli.input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "kernel_");
    }
    name
}

/// Log the offending source line for front-end errors that carry a span.
fn report_source_error(source: &str, err: &anyhow::Error) {
    let span: Option<Span> = if let Some(e) = err.downcast_ref::<ParseError>() {
        Some(e.span)
    } else if let Some(e) = err.downcast_ref::<LexerError>() {
        Some(e.span)
    } else {
        err.downcast_ref::<SemanticError>().map(|e| e.span)
    };

    error!("{}", err);
    if let Some(snippet) = span.and_then(|s| SourceMap::new(source).snippet(&s)) {
        error!("\n{}", snippet);
    }
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)
                .with_context(|| format!("Failed to write output file: {:?}", p))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
