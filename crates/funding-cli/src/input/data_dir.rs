use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

use funding_core::allocation::{
    AllocationInput, BankSpec, CovenantRule, CovenantSpec, FacilitySpec, Loan, TieBreakWeights,
};
use funding_core::{BankId, FacilityId, LoanId, StateCode};

use super::file::resolve_dir;

#[derive(Debug, Deserialize)]
struct BankRow {
    id: BankId,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacilityRow {
    id: FacilityId,
    bank_id: BankId,
    #[serde(with = "rust_decimal::serde::str")]
    interest_rate: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct CovenantRow {
    bank_id: BankId,
    #[serde(default)]
    facility_id: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    max_default_likelihood: Option<Decimal>,
    #[serde(default)]
    banned_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoanRow {
    id: LoanId,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    interest_rate: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    default_likelihood: Option<Decimal>,
    #[serde(default)]
    state: Option<String>,
}

/// Read the four record files from `dir`. `covenants.csv` and `loans.csv`
/// may be absent; the bank and facility files are required.
pub fn read_data_dir(dir: &str) -> Result<AllocationInput, Box<dyn std::error::Error>> {
    let root = resolve_dir(dir)?;

    let banks: Vec<BankRow> = read_rows(&root.join("banks.csv"))?;
    let facilities: Vec<FacilityRow> = read_rows(&root.join("facilities.csv"))?;
    let covenants: Vec<CovenantRow> = read_optional_rows(&root.join("covenants.csv"))?;
    let loans: Vec<LoanRow> = read_optional_rows(&root.join("loans.csv"))?;

    Ok(AllocationInput {
        banks: banks
            .into_iter()
            .map(|r| BankSpec {
                id: r.id,
                name: non_blank(r.name),
            })
            .collect(),
        facilities: facilities
            .into_iter()
            .map(|r| FacilitySpec {
                id: r.id,
                bank_id: r.bank_id,
                interest_rate: r.interest_rate,
                capacity: r.amount,
            })
            .collect(),
        covenants: covenants.into_iter().flat_map(covenant_specs).collect(),
        loans: loans.into_iter().map(to_loan).collect(),
        weights: TieBreakWeights::default(),
    })
}

/// One covenant row carries a likelihood ceiling, a banned state, or both.
fn covenant_specs(row: CovenantRow) -> Vec<CovenantSpec> {
    let facility_id = non_blank(row.facility_id).map(FacilityId::new);
    let mut specs = Vec::with_capacity(2);

    if let Some(threshold) = row.max_default_likelihood {
        specs.push(CovenantSpec {
            bank_id: row.bank_id.clone(),
            facility_id: facility_id.clone(),
            rule: CovenantRule::MaxDefaultLikelihood { threshold },
        });
    }
    if let Some(state) = non_blank(row.banned_state) {
        specs.push(CovenantSpec {
            bank_id: row.bank_id,
            facility_id,
            rule: CovenantRule::BannedStates {
                states: vec![StateCode::new(state)],
            },
        });
    }
    specs
}

fn to_loan(row: LoanRow) -> Loan {
    let mut loan = Loan::new(row.id, row.amount);
    if let Some(rate) = row.interest_rate {
        loan = loan.with_interest_rate(rate);
    }
    if let Some(p) = row.default_likelihood {
        loan = loan.with_default_likelihood(p);
    }
    if let Some(state) = non_blank(row.state) {
        loan = loan.with_state(state);
    }
    loan
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| format!("Failed to open '{}': {}", path.display(), e))?;

    let mut rows = Vec::new();
    for (i, row) in rdr.deserialize().enumerate() {
        // Line 1 is the header.
        let row: T = row.map_err(|e| format!("{} line {}: {}", path.display(), i + 2, e))?;
        rows.push(row);
    }
    Ok(rows)
}

fn read_optional_rows<T: DeserializeOwned>(
    path: &Path,
) -> Result<Vec<T>, Box<dyn std::error::Error>> {
    if path.exists() {
        read_rows(path)
    } else {
        Ok(Vec::new())
    }
}
