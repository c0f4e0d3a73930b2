mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::allocate::AllocateArgs;
use commands::screen::ScreenArgs;

/// Loan-to-facility funding assignment
#[derive(Parser)]
#[command(
    name = "fund",
    version,
    about = "Assign incoming loans to bank funding facilities",
    long_about = "Streams loans, in arrival order, onto the cheapest facility whose \
                  own and bank covenants accept the loan and whose remaining capacity \
                  covers it. Reads a JSON book or a directory of CSV record files."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign every loan in the book and report the ledger and facility yields
    Allocate(AllocateArgs),
    /// Explain per facility whether one loan is fundable at its arrival
    Screen(ScreenArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Allocate(args) => commands::allocate::run_allocate(args),
        Commands::Screen(args) => commands::screen::run_screen(args),
        Commands::Version => {
            println!("fund {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
