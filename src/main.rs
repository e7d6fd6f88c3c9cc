use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use yas6502::error::Severity;
use yas6502::Assembler;

/// A two-pass assembler for the MOS 6502.
#[derive(Parser)]
#[command(author, version, about, disable_version_flag = true)]
struct Cli {
    /// Assembly source file to read.
    input: PathBuf,

    /// Where to write the sparse object file. Defaults to the source file's
    /// name with its extension replaced by `.o`.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Where to write the listing file. Implies `-L`.
    #[arg(short = 'l', long)]
    listing: Option<PathBuf>,

    /// Write a listing file, named after the source file with `.lst`
    /// unless `--listing` gives an explicit path.
    #[arg(short = 'L', long)]
    print_listing: bool,

    /// Print the version and exit.
    #[arg(short = 'v', long)]
    version: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let source = match fs::read_to_string(&cli.input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{}: {}: {err}", "error".red().bold(), cli.input.display());
            return ExitCode::from(1);
        }
    };

    let mut assembler = Assembler::new();
    let result = assembler.assemble(&source);

    for diagnostic in result.diagnostics.sorted_for_display() {
        let label = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        };
        eprintln!("{}:{}: {}: {}", cli.input.display(), diagnostic.line, label, diagnostic.message);
    }

    let succeeded = result.succeeded;

    if cli.print_listing || cli.listing.is_some() {
        let listing_path = cli.listing.clone().unwrap_or_else(|| cli.input.with_extension("lst"));
        let listing = assembler.render_listing(&source);
        if let Err(err) = fs::write(&listing_path, listing) {
            eprintln!("{}: {}: {err}", "error".red().bold(), listing_path.display());
            return ExitCode::from(1);
        }
    }

    if !succeeded {
        eprintln!("{}: assembly failed", "error".red().bold());
        return ExitCode::from(1);
    }

    let object_path = cli.output.clone().unwrap_or_else(|| cli.input.with_extension("o"));
    let object = assembler.render_object_file();
    if let Err(err) = fs::write(&object_path, object) {
        eprintln!("{}: {}: {err}", "error".red().bold(), object_path.display());
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}
