use std::fs::File;

use funding_core::allocation::AllocationOutput;

/// Write `loan_id,facility_id` for every funded loan, in arrival order.
pub fn write_assignments(
    path: &str,
    output: &AllocationOutput,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path).map_err(|e| format!("Failed to create '{}': {}", path, e))?;
    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(["loan_id", "facility_id"])?;
    for record in &output.assignments {
        if let Some(facility_id) = record.assigned_facility() {
            wtr.write_record([record.loan_id.as_str(), facility_id.as_str()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Write `facility_id,expected_yield` for every facility, rounded to whole
/// currency units.
pub fn write_yields(
    path: &str,
    output: &AllocationOutput,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path).map_err(|e| format!("Failed to create '{}': {}", path, e))?;
    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(["facility_id", "expected_yield"])?;
    for facility in &output.facilities {
        wtr.write_record([
            facility.facility_id.as_str(),
            &facility.expected_yield.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
