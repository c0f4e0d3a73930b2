use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use funding_core::allocation::book;

use crate::input;
use crate::output::report;

/// Arguments for streaming a loan book through the facilities
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to JSON input file (banks, facilities, covenants, loans)
    #[arg(long, conflicts_with = "data_dir")]
    pub input: Option<String>,

    /// Directory holding banks.csv, facilities.csv, covenants.csv, loans.csv
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Weight on remaining capacity after the draw (tie-break)
    #[arg(long)]
    pub capacity_weight: Option<Decimal>,

    /// Weight on how exclusive a facility has been for past loans (tie-break)
    #[arg(long)]
    pub scarcity_weight: Option<Decimal>,

    /// Write loan_id,facility_id rows for funded loans to this CSV file
    #[arg(long)]
    pub assignments_out: Option<String>,

    /// Write facility_id,expected_yield rows to this CSV file
    #[arg(long)]
    pub yields_out: Option<String>,
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut book_input = input::load_book(args.input.as_deref(), args.data_dir.as_deref())?;

    if let Some(w) = args.capacity_weight {
        book_input.weights.capacity_weight = w;
    }
    if let Some(w) = args.scarcity_weight {
        book_input.weights.scarcity_weight = w;
    }

    let result = book::run_allocation(&book_input)?;

    if let Some(path) = &args.assignments_out {
        report::write_assignments(path, &result.result)?;
    }
    if let Some(path) = &args.yields_out {
        report::write_yields(path, &result.result)?;
    }

    Ok(serde_json::to_value(result)?)
}
