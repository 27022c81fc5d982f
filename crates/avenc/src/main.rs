//! The Aven compiler CLI.
//!
//! Provides the `avenc` command with the following subcommands:
//!
//! - `avenc check <file>` - Parse and type-check a source file
//! - `avenc air <file>`   - Check and print the AIR text form
//!
//! Diagnostics render through ariadne; `--json` emits them as JSON for
//! tooling. The exit code is 1 iff any issue has error severity.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use aven_common::Issue;

#[derive(Parser)]
#[command(name = "avenc", version, about = "The Aven compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and type-check a source file, reporting diagnostics
    Check {
        /// Path to the `.aven` source file
        file: PathBuf,

        /// Emit diagnostics as JSON instead of rendered reports
        #[arg(long)]
        json: bool,
    },
    /// Type-check a source file and print its AIR
    Air {
        /// Path to the `.aven` source file
        file: PathBuf,

        /// Emit diagnostics as JSON instead of rendered reports
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let (file, json, emit_air) = match cli.command {
        Commands::Check { file, json } => (file, json, false),
        Commands::Air { file, json } => (file, json, true),
    };
    match run(&file, json, emit_air) {
        Ok(code) => process::exit(code),
        Err(message) => {
            eprintln!("error: {message}");
            process::exit(2);
        }
    }
}

/// Execute the pipeline: read -> parse -> analyze -> (optionally) lower.
fn run(file: &Path, json: bool, emit_air: bool) -> Result<i32, String> {
    let source = std::fs::read_to_string(file)
        .map_err(|e| format!("failed to read '{}': {e}", file.display()))?;
    let module_name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main")
        .to_string();

    let parsed = aven_parser::parse(&source, &module_name);
    let sema = aven_sema::analyze(&parsed.module);

    let issues: Vec<&Issue> = parsed.issues.iter().chain(sema.issues.iter()).collect();
    if json {
        let rendered = serde_json::to_string_pretty(&issues)
            .map_err(|e| format!("failed to serialize diagnostics: {e}"))?;
        println!("{rendered}");
    } else {
        let rendered =
            aven_sema::diagnostics::render_all(issues.iter().copied(), &source);
        eprint!("{rendered}");
    }

    let failed = parsed.issues.has_errors() || sema.issues.has_errors();
    if failed {
        return Ok(1);
    }

    if emit_air {
        let unit = aven_air::lower::lower(&parsed.module, &sema, &module_name);
        print!("{unit}");
    }
    Ok(0)
}
