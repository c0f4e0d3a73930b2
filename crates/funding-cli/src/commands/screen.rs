use clap::Args;
use serde_json::Value;

use funding_core::allocation::book;
use funding_core::LoanId;

use crate::input;

/// Arguments for explaining one loan's eligibility at arrival
#[derive(Args)]
pub struct ScreenArgs {
    /// Path to JSON input file (banks, facilities, covenants, loans)
    #[arg(long, conflicts_with = "data_dir")]
    pub input: Option<String>,

    /// Directory holding banks.csv, facilities.csv, covenants.csv, loans.csv
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Loan to screen; loans ahead of it in the stream are assigned first
    #[arg(long)]
    pub loan_id: String,
}

pub fn run_screen(args: ScreenArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let book_input = input::load_book(args.input.as_deref(), args.data_dir.as_deref())?;
    let result = book::screen_loan(&book_input, &LoanId::new(args.loan_id))?;
    Ok(serde_json::to_value(result)?)
}
