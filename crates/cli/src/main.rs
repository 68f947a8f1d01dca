#![deny(unsafe_code)]
//! CLI binary for the modicum GL resource layer.
//!
//! Subcommands:
//! - `formats`: list the format registry
//! - `inspect <vert> <frag>`: compile headlessly and print the program interface
//! - `upgrade <vert> <frag>`: print ES 3.00 versions of the sources

mod error;

use clap::{Parser, Subcommand};
use error::CliError;
use modicum_core::{dialect, Context, ContextOptions, FormatRegistry, HeadlessGl, Interface, ShaderStage};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::sync::Once;

#[derive(Parser)]
#[command(name = "modicum", about = "GL resource layer developer tools")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Log filter when RUST_LOG is unset (e.g. "debug").
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every registered shader type.
    Formats,
    /// Compile a vertex/fragment pair and print its uniforms and attributes.
    Inspect {
        vert: PathBuf,
        frag: PathBuf,

        /// Upgrade ES 1.00 sources to ES 3.00 before compiling.
        #[arg(long)]
        upgrade: bool,
    },
    /// Print the ES 3.00 upgrade of a vertex/fragment pair.
    Upgrade { vert: PathBuf, frag: PathBuf },
}

static LOGGER: Once = Once::new();

fn init_logging(default_filter: &str) {
    LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        match std::env::var("RUST_LOG") {
            Ok(filter) => builder.parse_filters(&filter),
            Err(_) => builder.parse_filters(default_filter),
        };
        builder.init();
        log::debug!("logging initialized");
    });
}

fn read_source(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::Io(format!("{}: {e}", path.display())))
}

/// Compiles a source pair against the headless backend.
fn inspect(vert: &str, frag: &str, upgrade: bool) -> Result<Interface, CliError> {
    let options = ContextOptions {
        upgrade_shaders: upgrade,
        ..ContextOptions::default()
    };
    let context = Context::new(Rc::new(HeadlessGl::new()), options)?;
    let mut program = context.make_program(vert, frag)?;
    let interface = program.interface().clone();
    program.destroy();
    Ok(interface)
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Formats => {
            let registry = FormatRegistry::new();
            if cli.json {
                let formats: Vec<_> = registry.iter().collect();
                println!("{}", serde_json::to_string_pretty(&formats)?);
            } else {
                for format in registry.iter() {
                    println!(
                        "0x{:04X}  {:<12} stride {:<2} {:<7} {}",
                        format.native_type,
                        format.symbol,
                        format.stride,
                        format.kind.name(),
                        format.op_name
                    );
                }
            }
        }
        Command::Inspect {
            vert,
            frag,
            upgrade,
        } => {
            let interface = inspect(&read_source(&vert)?, &read_source(&frag)?, upgrade)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&interface)?);
            } else {
                println!("Uniforms:");
                for (name, slot) in &interface.uniforms {
                    println!("  {name}: {} x{}", slot.format.symbol, slot.size);
                }
                println!("Attributes:");
                for (name, slot) in &interface.attributes {
                    println!("  {name}: {} @{}", slot.format.symbol, slot.index);
                }
            }
        }
        Command::Upgrade { vert, frag } => {
            let vertex = dialect::upgrade(&read_source(&vert)?, ShaderStage::Vertex);
            let fragment = dialect::upgrade(&read_source(&frag)?, ShaderStage::Fragment);
            if cli.json {
                let info = serde_json::json!({
                    "vertex": vertex,
                    "fragment": fragment,
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("// {}\n{vertex}\n", vert.display());
                println!("// {}\n{fragment}", frag.display());
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log);
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}
